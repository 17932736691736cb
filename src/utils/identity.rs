/// Normalize an account identity: trimmed, lowercased. `None` when empty.
pub fn normalize_identity(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_lowercase())
}

/// Case-insensitive identity comparison after normalization.
pub fn same_identity(lhs: &str, rhs: &str) -> bool {
    normalize_identity(lhs) == normalize_identity(rhs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_trims_and_lowercases() {
        assert_eq!(
            normalize_identity("  Alice@Example.COM \n").as_deref(),
            Some("alice@example.com")
        );
    }

    #[test]
    fn blank_identity_is_none() {
        assert_eq!(normalize_identity("   "), None);
        assert_eq!(normalize_identity(""), None);
    }

    #[test]
    fn same_identity_ignores_case_and_whitespace() {
        assert!(same_identity(" Bob@x.io", "bob@X.IO "));
        assert!(!same_identity("bob@x.io", "rob@x.io"));
    }
}
