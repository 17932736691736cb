mod castor;
mod oauth;
mod usage;

pub use castor::CastorError;
pub(crate) use oauth::preview as oauth_body_preview;
pub use oauth::OauthError;
pub use usage::UsageError;
