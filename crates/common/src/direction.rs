//! Direction of a field traversal.

use std::fmt;

/// Which transform a traversal applies to tagged fields.
///
/// The direction decides the guard applied before the transform runs:
/// [`Direction::Encrypt`] transforms every non-empty tagged value, while
/// [`Direction::Decrypt`] and [`Direction::Rekey`] only touch values that look
/// like a token (non-empty and containing the separator). Plaintext left over
/// from rows written before encryption was enabled is therefore passed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Plaintext → token, before a write.
    Encrypt,
    /// Token → plaintext, after a read.
    Decrypt,
    /// Token under an old key → token under the current default key.
    Rekey,
}

impl Direction {
    /// Returns `true` if the transform only applies to values that look like tokens.
    pub fn requires_token(self) -> bool {
        matches!(self, Direction::Decrypt | Direction::Rekey)
    }

    /// Lower-case verb used in diagnostics.
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Encrypt => "encrypt",
            Direction::Decrypt => "decrypt",
            Direction::Rekey => "rekey",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_encrypt_skips_the_token_guard() {
        assert!(!Direction::Encrypt.requires_token());
        assert!(Direction::Decrypt.requires_token());
        assert!(Direction::Rekey.requires_token());
    }

    #[test]
    fn display_is_lower_case_verb() {
        assert_eq!(Direction::Decrypt.to_string(), "decrypt");
    }
}
