//! The two token payload shapes the foreign application persists.
//!
//! inner   = {1: access_token, 2: "Bearer", 3: refresh_token, 4: {1: expiry_secs}}
//! unified = {1: {1: "oauthTokenInfoSentinelKey", 2: {1: base64(inner)}}}
//! legacy  = <existing fields minus 1, 2, 6> ++ {2: email} ++ {6: inner}

use crate::credentials::OAuthCredential;
use crate::error::CastorError;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use castor_wire::{MessageBuilder, find_string, replace_fields};

pub const UNIFIED_TOKEN_KEY: &str = "antigravityUnifiedStateSync.oauthToken";
pub const LEGACY_STATE_KEY: &str = "jetskiStateSync.agentManagerInitState";
pub const ONBOARDING_KEY: &str = "antigravityOnboarding";

const OAUTH_SENTINEL: &str = "oauthTokenInfoSentinelKey";
const TOKEN_TYPE: &str = "Bearer";

const LEGACY_EMAIL_FIELD: u32 = 2;
const LEGACY_OAUTH_FIELD: u32 = 6;
const LEGACY_REPLACED_FIELDS: [u32; 3] = [1, LEGACY_EMAIL_FIELD, LEGACY_OAUTH_FIELD];

fn expiry_seconds(credential: &OAuthCredential) -> u64 {
    u64::try_from(credential.expiry.timestamp()).unwrap_or(0)
}

/// Token message shared by both shapes.
pub fn oauth_token_message(credential: &OAuthCredential) -> MessageBuilder {
    let expiry = MessageBuilder::new().varint(1, expiry_seconds(credential));
    MessageBuilder::new()
        .string(1, &credential.access_token)
        .string(2, TOKEN_TYPE)
        .string(3, &credential.refresh_token)
        .message(4, &expiry)
}

/// Base64 value for [`UNIFIED_TOKEN_KEY`]; replaces whatever was stored.
pub fn unified_value(credential: &OAuthCredential) -> String {
    let inner = STANDARD.encode(oauth_token_message(credential).as_bytes());
    let wrapped = MessageBuilder::new().string(1, &inner);
    let entry = MessageBuilder::new()
        .string(1, OAUTH_SENTINEL)
        .message(2, &wrapped);
    let outer = MessageBuilder::new().message(1, &entry);
    STANDARD.encode(outer.as_bytes())
}

/// Rewrite an existing [`LEGACY_STATE_KEY`] value for `credential`.
///
/// Fields other than 1, 2 and 6 are carried over byte-for-byte in their original order.
pub fn merge_legacy_value(
    existing_b64: &str,
    credential: &OAuthCredential,
) -> Result<String, CastorError> {
    let existing = decode_base64(existing_b64)?;
    let replacement = MessageBuilder::new()
        .string(LEGACY_EMAIL_FIELD, &credential.email)
        .message(LEGACY_OAUTH_FIELD, &oauth_token_message(credential));
    let merged = replace_fields(&existing, &LEGACY_REPLACED_FIELDS, replacement.as_bytes())?;
    Ok(STANDARD.encode(merged))
}

/// Email recorded in a legacy value (field 2), if any.
pub fn legacy_email(value_b64: &str) -> Result<Option<String>, CastorError> {
    let bytes = decode_base64(value_b64)?;
    Ok(find_string(&bytes, LEGACY_EMAIL_FIELD)?)
}

fn decode_base64(value: &str) -> Result<Vec<u8>, CastorError> {
    Ok(STANDARD.decode(value.trim())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use castor_wire::{Fields, WireType, decode_varint};
    use chrono::{TimeZone, Utc};

    fn credential() -> OAuthCredential {
        OAuthCredential {
            email: "new@example.com".to_string(),
            access_token: "ya29.access".to_string(),
            refresh_token: "1//refresh".to_string(),
            expiry: Utc.timestamp_opt(1_900_000_000, 0).unwrap(),
            updated_at: Utc::now(),
        }
    }

    fn field_payload(message: &[u8], number: u32) -> Vec<u8> {
        Fields::new(message)
            .map(Result::unwrap)
            .find(|f| f.number == number)
            .map(|f| f.payload.to_vec())
            .unwrap()
    }

    #[test]
    fn inner_message_layout() {
        let inner = oauth_token_message(&credential()).finish();
        assert_eq!(field_payload(&inner, 1), b"ya29.access");
        assert_eq!(field_payload(&inner, 2), b"Bearer");
        assert_eq!(field_payload(&inner, 3), b"1//refresh");
        let expiry = field_payload(&inner, 4);
        let seconds = Fields::new(&expiry).next().unwrap().unwrap();
        assert_eq!(seconds.wire_type, WireType::Varint);
        assert_eq!(decode_varint(seconds.payload).unwrap().0, 1_900_000_000);
    }

    #[test]
    fn unified_value_wraps_base64_inner_under_sentinel() {
        let outer = STANDARD.decode(unified_value(&credential())).unwrap();
        let entry = field_payload(&outer, 1);
        assert_eq!(field_payload(&entry, 1), OAUTH_SENTINEL.as_bytes());
        let wrapped = field_payload(&entry, 2);
        let inner_b64 = String::from_utf8(field_payload(&wrapped, 1)).unwrap();
        let inner = STANDARD.decode(inner_b64).unwrap();
        assert_eq!(inner, oauth_token_message(&credential()).finish());
    }

    #[test]
    fn legacy_merge_preserves_unrelated_fields_in_order() {
        let existing = MessageBuilder::new()
            .string(1, "stale-1")
            .string(3, "keep-3")
            .string(2, "old@example.com")
            .varint(7, 42)
            .bytes(6, b"old-oauth")
            .string(9, "keep-9")
            .finish();
        let merged_b64 = merge_legacy_value(&STANDARD.encode(&existing), &credential()).unwrap();
        let merged = STANDARD.decode(merged_b64).unwrap();

        let numbers: Vec<u32> = Fields::new(&merged).map(|f| f.unwrap().number).collect();
        assert_eq!(numbers, [3, 7, 9, 2, 6]);

        let kept = MessageBuilder::new()
            .string(3, "keep-3")
            .varint(7, 42)
            .string(9, "keep-9")
            .finish();
        assert!(merged.starts_with(&kept));
        assert_eq!(field_payload(&merged, 2), b"new@example.com");
        assert_eq!(
            field_payload(&merged, 6),
            oauth_token_message(&credential()).finish()
        );
    }

    #[test]
    fn legacy_email_reads_field_two() {
        let value = STANDARD.encode(MessageBuilder::new().string(2, "who@example.com").finish());
        assert_eq!(legacy_email(&value).unwrap().as_deref(), Some("who@example.com"));
        let empty = STANDARD.encode(MessageBuilder::new().string(3, "x").finish());
        assert_eq!(legacy_email(&empty).unwrap(), None);
    }

    #[test]
    fn malformed_legacy_value_is_rejected() {
        assert!(merge_legacy_value("not base64!!", &credential()).is_err());
        let bad_wire = STANDARD.encode([0x0b_u8, 0x00]);
        assert!(matches!(
            merge_legacy_value(&bad_wire, &credential()),
            Err(CastorError::Wire(_))
        ));
    }
}
