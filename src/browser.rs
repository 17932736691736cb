use crate::error::CastorError;
use url::Url;

/// Opens the authorization URL for the user.
pub trait BrowserOpener: Send + Sync {
    fn open(&self, url: &Url) -> Result<(), CastorError>;
}

/// The platform default browser, via the `open` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBrowser;

impl BrowserOpener for SystemBrowser {
    fn open(&self, url: &Url) -> Result<(), CastorError> {
        open::that(url.as_str()).map_err(|e| CastorError::BrowserOpenFailed(e.to_string()))
    }
}
