use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;

enum SlotState<T> {
    Empty,
    /// Produced before anyone waited.
    Buffered(T),
    /// A waiter registered first; resolving hands the value straight to it.
    Waiting(oneshot::Sender<T>),
    /// Delivered (or handed to a waiter). Terminal.
    Resolved,
}

/// Single-resolution mailbox: the first `resolve` wins, later ones are rejected.
///
/// Works regardless of whether the producer or the waiter arrives first.
pub struct ResultSlot<T> {
    state: Mutex<SlotState<T>>,
}

impl<T> Default for ResultSlot<T> {
    fn default() -> Self {
        Self {
            state: Mutex::new(SlotState::Empty),
        }
    }
}

impl<T> ResultSlot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SlotState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Offer a result. Returns `false` if the slot was already resolved.
    pub fn resolve(&self, value: T) -> bool {
        let mut state = self.lock();
        match std::mem::replace(&mut *state, SlotState::Resolved) {
            SlotState::Empty => {
                *state = SlotState::Buffered(value);
                true
            }
            SlotState::Waiting(tx) => {
                // A dropped waiter means nobody wants the value; it is still consumed.
                let _ = tx.send(value);
                true
            }
            previous @ (SlotState::Buffered(_) | SlotState::Resolved) => {
                *state = previous;
                false
            }
        }
    }

    /// Wait for the result. Only the first waiter receives it; any other call gets `None`.
    pub async fn wait(&self) -> Option<T> {
        let rx = {
            let mut state = self.lock();
            match std::mem::replace(&mut *state, SlotState::Resolved) {
                SlotState::Buffered(value) => return Some(value),
                SlotState::Empty => {
                    let (tx, rx) = oneshot::channel();
                    *state = SlotState::Waiting(tx);
                    rx
                }
                previous @ (SlotState::Waiting(_) | SlotState::Resolved) => {
                    *state = previous;
                    return None;
                }
            }
        };
        rx.await.ok()
    }
}
