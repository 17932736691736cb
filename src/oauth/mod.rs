//! Google OAuth: authorization URL, code/refresh grants, profile lookup, and the
//! throwaway localhost listener that receives the browser redirect.

pub mod callback_server;
pub mod endpoints;
mod slot;

pub use callback_server::{CALLBACK_PATH, CallbackPayload, OAuthCallbackServer};
pub use endpoints::{GoogleOauthEndpoints, TokenGrant};
pub use slot::ResultSlot;
