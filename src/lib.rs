pub mod browser;
pub mod cache;
pub mod config;
pub mod credentials;
pub mod error;
pub mod injector;
pub mod manager;
pub mod oauth;
mod oauth_utils;
pub mod probe;
pub mod supervisor;
pub mod usage;
pub mod utils;

pub use config::Config;
pub use credentials::{CredentialStore, OAuthCredential};
pub use error::CastorError;
pub use manager::{AccountManager, AddPhase, Collaborators};
