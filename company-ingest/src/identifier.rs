use std::fmt;

use sha2::{Digest, Sha256};

/// Length of a document id, in hex characters.
///
/// Truncating the digest keeps store keys short at the cost of collision
/// resistance; 108 bits still make an accidental collision between company
/// domains negligible.
pub const DOCUMENT_ID_LENGTH: usize = 27;

/// Store identifier of a company document, derived from its domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn from_domain(domain: &str) -> Self {
        let digest = Sha256::digest(domain.as_bytes());
        let mut hex = format!("{:x}", digest);
        hex.truncate(DOCUMENT_ID_LENGTH);
        DocumentId(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_digest_prefix() {
        // sha256("acme.com") = 1194228da8fdbdeefd261bd7b6595cfd70a50d70c6407bcf013de96d4efb17de
        assert_eq!(
            DocumentId::from_domain("acme.com").as_str(),
            "1194228da8fdbdeefd261bd7b65"
        );
    }

    #[test]
    fn empty_domain_digest() {
        assert_eq!(
            DocumentId::from_domain("").as_str(),
            "e3b0c44298fc1c149afbf4c8996"
        );
    }

    #[test]
    fn fixed_length_lowercase_hex() {
        for domain in ["a.io", "example.com", "xn--bcher-kva.example", "a-very-long-domain-name.co.uk"] {
            let id = DocumentId::from_domain(domain);
            assert_eq!(id.as_str().len(), DOCUMENT_ID_LENGTH);
            assert!(id
                .as_str()
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
        }
    }

    #[test]
    fn deterministic_and_distinct() {
        assert_eq!(
            DocumentId::from_domain("acme.com"),
            DocumentId::from_domain("acme.com")
        );
        assert_ne!(
            DocumentId::from_domain("acme.com"),
            DocumentId::from_domain("acme.co")
        );
    }
}
