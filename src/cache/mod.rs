//! Bounded, ordered per-account display cache.
//!
//! Independent of credential storage: a record can outlive its credential only while it
//! is the active account.

mod account_cache;
mod record;

pub use account_cache::{AccountCache, AccountDisplay};
pub use record::{AccountCacheState, CachedAccountRecord, compare_records, trim_records};
