//! Persistent per-account OAuth credentials with soft-delete tombstones.
//!
//! Layout:
//! - `models.rs`: the stored credential row
//! - `schema.rs`: SQL DDL (SQLite)
//! - `store.rs`: the store itself

mod models;
mod schema;
mod store;

pub use models::OAuthCredential;
pub use schema::SQLITE_INIT;
pub use store::CredentialStore;
