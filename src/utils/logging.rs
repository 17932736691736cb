use serde::Serialize;
use tracing::debug;

/// Emit `value` as pretty JSON at DEBUG level, tagged with the account identity.
///
/// Serialization is skipped entirely unless DEBUG is enabled.
pub(crate) fn debug_json<T: Serialize>(what: &str, identity: &str, value: &T) {
    if !tracing::enabled!(tracing::Level::DEBUG) {
        return;
    }

    let pretty_json = serde_json::to_string_pretty(value)
        .unwrap_or_else(|error| format!("<pretty serialize failed: {error}>"));
    debug!(identity = %identity, "{what}:\n{pretty_json}");
}
