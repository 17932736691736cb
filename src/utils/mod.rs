pub mod fs;
pub mod identity;
pub(crate) mod logging;
