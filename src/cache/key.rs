//! Cache key derivation.
//!
//! A key has the form `<prefix><hash>_<len>_<snippet>`:
//!
//! - `hash`: hash of the normalized text (see [`KeyHash`])
//! - `len`: character count of the normalized text
//! - `snippet`: ASCII alphanumerics among the first 20 normalized characters
//!
//! Length and snippet are secondary disambiguators. With the default rolling
//! hash two different texts can still collide; [`KeyHash::Sha256`] makes that
//! practically impossible at the cost of longer keys.
//!
//! Author: kelexine (<https://github.com/kelexine>)

use crate::config::KeyHash;
use sha2::{Digest, Sha256};

const SNIPPET_CHARS: usize = 20;

/// Bytes of the SHA-256 digest kept in the key.
const DIGEST_BYTES: usize = 16;

/// Trim, lowercase and collapse whitespace runs to one space.
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// 32-bit polynomial hash (`h = h * 31 + c`, wrapping), absolute value.
pub fn rolling_hash(normalized: &str) -> u32 {
    normalized
        .chars()
        .fold(0i32, |h, c| h.wrapping_mul(31).wrapping_add(c as i32))
        .unsigned_abs()
}

fn sha256_hex(normalized: &str) -> String {
    let digest = Sha256::digest(normalized.as_bytes());
    hex::encode(&digest[..DIGEST_BYTES])
}

/// Derive the store key for `text`.
///
/// Equal normalized texts always map to the same key.
pub fn derive_key(prefix: &str, text: &str, key_hash: KeyHash) -> String {
    let normalized = normalize(text);

    let hash = match key_hash {
        KeyHash::Rolling => rolling_hash(&normalized).to_string(),
        KeyHash::Sha256 => sha256_hex(&normalized),
    };

    let snippet: String = normalized
        .chars()
        .take(SNIPPET_CHARS)
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();

    format!(
        "{}{}_{}_{}",
        prefix,
        hash,
        normalized.chars().count(),
        snippet
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const PREFIX: &str = "explanium_cache_";

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Hello \t\n  World  "), "hello world");
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "");
    }

    #[test]
    fn test_equivalent_inputs_share_key() {
        let a = derive_key(PREFIX, "Hello   World", KeyHash::Rolling);
        let b = derive_key(PREFIX, "hello world", KeyHash::Rolling);
        assert_eq!(a, b);
    }

    #[test]
    fn test_key_layout() {
        let key = derive_key(PREFIX, "Hello, World!", KeyHash::Rolling);
        let expected_hash = rolling_hash("hello, world!");
        assert_eq!(key, format!("{}{}_13_helloworld", PREFIX, expected_hash));
    }

    #[test]
    fn test_rolling_hash_known_value() {
        // "ab" = 97 * 31 + 98
        assert_eq!(rolling_hash("ab"), 3105);
        assert_eq!(rolling_hash(""), 0);
    }

    #[test]
    fn test_rolling_hash_wraps_without_panicking() {
        let long = "z".repeat(10_000);
        let _ = rolling_hash(&long);
    }

    #[test]
    fn test_snippet_limited_to_first_twenty_chars() {
        let key = derive_key(PREFIX, "abcdefghij klmnopqrstuvwxyz", KeyHash::Rolling);
        assert!(key.ends_with("_27_abcdefghijklmnopqrs"));
    }

    #[test]
    fn test_sha256_key_is_fixed_width() {
        let key = derive_key(PREFIX, "Photosynthesis", KeyHash::Sha256);
        let rest = key.strip_prefix(PREFIX).unwrap();
        let hash = rest.split('_').next().unwrap();
        assert_eq!(hash.len(), DIGEST_BYTES * 2);
        assert!(key.ends_with("_14_photosynthesis"));
    }

    #[test]
    fn test_different_texts_differ() {
        let a = derive_key(PREFIX, "entropy", KeyHash::Rolling);
        let b = derive_key(PREFIX, "enthalpy", KeyHash::Rolling);
        assert_ne!(a, b);
    }

    proptest! {
        #[test]
        fn prop_derivation_is_deterministic(text in ".{0,200}") {
            prop_assert_eq!(
                derive_key(PREFIX, &text, KeyHash::Rolling),
                derive_key(PREFIX, &text, KeyHash::Rolling)
            );
            prop_assert_eq!(
                derive_key(PREFIX, &text, KeyHash::Sha256),
                derive_key(PREFIX, &text, KeyHash::Sha256)
            );
        }

        #[test]
        fn prop_whitespace_and_case_do_not_matter(words in proptest::collection::vec("[a-zA-Z0-9]{1,8}", 1..6)) {
            let spaced = format!("  {}  ", words.join("   "));
            let compact = words.join(" ").to_lowercase();
            prop_assert_eq!(
                derive_key(PREFIX, &spaced, KeyHash::Rolling),
                derive_key(PREFIX, &compact, KeyHash::Rolling)
            );
        }

        #[test]
        fn prop_key_stays_in_namespace(text in ".{0,100}") {
            prop_assert!(derive_key(PREFIX, &text, KeyHash::Rolling).starts_with(PREFIX));
        }
    }
}
