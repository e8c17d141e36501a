//! Validation codes gating the final handoff.

use rand::Rng;
use serde::Deserialize;
use std::fmt;

/// Uppercase letters and digits without the look-alikes `0 O 1 I`.
const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// The secret issued to the buyer at delivery creation.
///
/// Generated once and never regenerated. `Debug` is redacted so the code never reaches
/// the logs; use [`ValidationCode::expose`] when it has to leave the process.
#[derive(Clone, PartialEq, Eq)]
pub struct ValidationCode(String);

impl ValidationCode {
    pub fn generate(length: usize) -> Self {
        let mut rng = rand::thread_rng();
        let code = (0..length)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect();
        Self(code)
    }

    /// Wraps a code read back from storage.
    pub fn from_stored(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Compares against a code typed or scanned by a person.
    ///
    /// Surrounding whitespace and letter case are ignored. The comparison visits every
    /// byte regardless of where the first difference is.
    pub fn matches(&self, supplied: &SuppliedCode) -> bool {
        let supplied = supplied.0.trim().to_ascii_uppercase();
        if supplied.len() != self.0.len() {
            return false;
        }
        self.0
            .bytes()
            .zip(supplied.bytes())
            .fold(0u8, |diff, (a, b)| diff | (a ^ b))
            == 0
    }
}

impl fmt::Debug for ValidationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ValidationCode(****)")
    }
}

/// A code presented at confirmation time.
#[derive(Clone, Deserialize)]
#[serde(transparent)]
pub struct SuppliedCode(String);

impl SuppliedCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }
}

impl fmt::Debug for SuppliedCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SuppliedCode(****)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_code_uses_alphabet() {
        let code = ValidationCode::generate(12);
        assert_eq!(code.expose().len(), 12);
        assert!(code.expose().bytes().all(|b| ALPHABET.contains(&b)));
    }

    #[test]
    fn test_matches_ignores_case_and_whitespace() {
        let code = ValidationCode::from_stored("K7PX2M9Q");
        assert!(code.matches(&SuppliedCode::new(" k7px2m9q\n")));
        assert!(!code.matches(&SuppliedCode::new("K7PX2M9")));
        assert!(!code.matches(&SuppliedCode::new("K7PX2M9R")));
    }

    #[test]
    fn test_debug_is_redacted() {
        let code = ValidationCode::from_stored("SECRET42");
        assert!(!format!("{code:?}").contains("SECRET42"));
        assert!(!format!("{:?}", SuppliedCode::new("SECRET42")).contains("SECRET42"));
    }
}
