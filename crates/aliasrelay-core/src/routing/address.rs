//! Address normalization
//!
//! Every comparison the router makes is case-insensitive, so addresses are
//! trimmed and lowercased once here and compared verbatim afterwards.

/// A recipient or destination address in canonical form
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NormalizedAddress {
    /// Local part, empty when the address is invalid
    pub local: String,
    /// Domain, empty when the address is invalid
    pub domain: String,
    /// The whole trimmed, lowercased input
    pub full: String,
}

impl NormalizedAddress {
    /// Whether both the local part and the domain are present
    pub fn is_valid(&self) -> bool {
        !self.local.is_empty() && !self.domain.is_empty()
    }
}

/// Canonicalize a raw address into `{local, domain, full}`.
///
/// Splits on the last `@`. A missing `@` or an empty local part yields an
/// empty `local` and `domain` while `full` is preserved.
pub fn normalize(raw: &str) -> NormalizedAddress {
    let full = raw.trim().to_lowercase();

    match full.rsplit_once('@') {
        Some((local, domain)) if !local.is_empty() => NormalizedAddress {
            local: local.to_string(),
            domain: domain.to_string(),
            full,
        },
        _ => NormalizedAddress {
            local: String::new(),
            domain: String::new(),
            full,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_normalize_lowercases_and_trims() {
        let addr = normalize("  Hello+Promo@Example.COM \r\n");
        assert_eq!(addr.local, "hello+promo");
        assert_eq!(addr.domain, "example.com");
        assert_eq!(addr.full, "hello+promo@example.com");
        assert!(addr.is_valid());
    }

    #[test]
    fn test_normalize_splits_on_last_at() {
        let addr = normalize("\"odd@local\"@example.com");
        assert_eq!(addr.local, "\"odd@local\"");
        assert_eq!(addr.domain, "example.com");
    }

    #[test]
    fn test_normalize_invalid_addresses() {
        let no_at = normalize("Postmaster");
        assert_eq!(no_at.local, "");
        assert_eq!(no_at.domain, "");
        assert_eq!(no_at.full, "postmaster");
        assert!(!no_at.is_valid());

        let empty_local = normalize("@Example.com");
        assert_eq!(empty_local.local, "");
        assert_eq!(empty_local.domain, "");
        assert_eq!(empty_local.full, "@example.com");

        let empty = normalize("   ");
        assert_eq!(empty.full, "");
        assert!(!empty.is_valid());
    }

    #[test]
    fn test_normalize_empty_domain_is_invalid() {
        let addr = normalize("user@");
        assert_eq!(addr.local, "user");
        assert_eq!(addr.domain, "");
        assert!(!addr.is_valid());
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let inputs = [
            "Hello@Example.com",
            " a+b+c@EXAMPLE.com ",
            "no-at-sign",
            "@example.com",
            "user@",
            "ÜSER@Bücher.example",
            "",
        ];

        for input in inputs {
            let once = normalize(input);
            let twice = normalize(&once.full);
            assert_eq!(once, twice, "normalize not idempotent for {:?}", input);
            assert_eq!(once.full, input.trim().to_lowercase());
        }
    }
}
