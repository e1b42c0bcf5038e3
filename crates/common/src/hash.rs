//! DOM content fingerprinting
//!
//! Hashes rendered markup with SHA-256 after stripping attributes whose values
//! change on every render (timestamps, request ids, nonces), so identical
//! static content always yields the same fingerprint.

use regex::Regex;
use sha2::{Digest, Sha256};

/// Attributes stripped before hashing unless the caller supplies its own list
pub const DEFAULT_VOLATILE_ATTRIBUTES: &[&str] = &[
    "data-timestamp",
    "data-request-id",
    "nonce",
    "data-reactid",
    "csrf-token",
];

/// Compute SHA-256 of data as lowercase hex
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Removes volatile attributes from markup before hashing
#[derive(Debug, Clone)]
pub struct ContentHasher {
    pattern: Option<Regex>,
}

impl ContentHasher {
    pub fn new<S: AsRef<str>>(volatile_attributes: &[S]) -> Self {
        let names: Vec<String> = volatile_attributes
            .iter()
            .map(|a| a.as_ref().trim())
            .filter(|a| !a.is_empty())
            .map(regex::escape)
            .collect();

        let pattern = if names.is_empty() {
            None
        } else {
            // The names are escaped, so the pattern always compiles
            Regex::new(&format!(
                r#"(?i)\s+(?:{})\s*=\s*(?:"[^"]*"|'[^']*'|[^\s>]+)"#,
                names.join("|")
            ))
            .ok()
        };

        Self { pattern }
    }

    /// Strip volatile attributes from the markup
    pub fn normalize<'a>(&self, html: &'a str) -> std::borrow::Cow<'a, str> {
        match &self.pattern {
            Some(pattern) => pattern.replace_all(html, ""),
            None => std::borrow::Cow::Borrowed(html),
        }
    }

    pub fn hash(&self, html: &str) -> String {
        sha256_hex(self.normalize(html).as_bytes())
    }
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new(DEFAULT_VOLATILE_ATTRIBUTES)
    }
}

/// Hash markup ignoring the given volatile attributes
pub fn content_hash<S: AsRef<str>>(html: &str, volatile_attributes: &[S]) -> String {
    ContentHasher::new(volatile_attributes).hash(html)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_vector() {
        assert_eq!(
            sha256_hex(b"hello world"),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_identical_content_identical_hash() {
        let html = "<html><body><h1>Hi</h1></body></html>";
        assert_eq!(
            content_hash(html, DEFAULT_VOLATILE_ATTRIBUTES),
            content_hash(html, DEFAULT_VOLATILE_ATTRIBUTES)
        );
    }

    #[test]
    fn test_volatile_attributes_ignored() {
        let hasher = ContentHasher::default();
        let a = r#"<div id="main" data-timestamp="1700000000">ok</div><script nonce='abc'></script>"#;
        let b = r#"<div id="main" data-timestamp="1799999999">ok</div><script nonce='xyz'></script>"#;
        assert_eq!(hasher.hash(a), hasher.hash(b));
        assert_eq!(
            hasher.normalize(a),
            r#"<div id="main">ok</div><script></script>"#
        );
    }

    #[test]
    fn test_static_changes_change_hash() {
        let hasher = ContentHasher::default();
        assert_ne!(
            hasher.hash(r#"<p class="a">one</p>"#),
            hasher.hash(r#"<p class="a">two</p>"#)
        );
    }

    #[test]
    fn test_empty_attribute_list_hashes_raw_markup() {
        let none: [&str; 0] = [];
        let html = r#"<div data-timestamp="1">x</div>"#;
        assert_eq!(content_hash(html, &none), sha256_hex(html.as_bytes()));
    }
}
