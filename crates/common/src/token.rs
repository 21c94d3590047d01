//! The encrypted field wire format.
//!
//! ```text
//! <key id>|<base64(nonce)>|<base64(ciphertext+tag)>
//! ```
//!
//! Base64 is the standard alphabet with padding. That alphabet never contains
//! `|`, so a split bounded to the first two separators is unambiguous and the
//! key id may be read without any key material.
//!
//! The empty string is its own encoding: empty plaintext encrypts to `""` and
//! `""` decrypts to empty plaintext without touching a cipher.

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::error::CryptoError;

/// Separator between the three token segments.
pub const TOKEN_SEPARATOR: char = '|';

/// Byte length of an AES-256-GCM nonce (96 bits).
pub const NONCE_LEN: usize = 12;

/// Byte length of the GCM authentication tag appended to the ciphertext.
pub const TAG_LEN: usize = 16;

/// Returns `true` if `value` could be a token: non-empty and containing the
/// separator.
///
/// Decrypt-direction traversal skips anything else so that plaintext left in
/// legacy rows does not surface as [`CryptoError::MalformedToken`].
pub fn looks_like_token(value: &str) -> bool {
    !value.is_empty() && value.contains(TOKEN_SEPARATOR)
}

/// Return the key id segment of `token`: everything before the first
/// separator.
///
/// Needs no key material, so it can audit which key wrote a value even when
/// that key is no longer registered. No validation happens here. A value
/// without a separator is returned whole, and a leading separator yields an
/// empty id.
pub fn extract_key_id(token: &str) -> &str {
    token
        .split_once(TOKEN_SEPARATOR)
        .map_or(token, |(key_id, _)| key_id)
}

/// The three undecoded segments of a token, borrowed from the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenParts<'a> {
    /// Key id segment.
    pub key_id: &'a str,
    nonce: &'a str,
    ciphertext: &'a str,
}

impl<'a> TokenParts<'a> {
    /// Split `token` on the first two separators.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::MalformedToken`] unless the split yields exactly
    /// three non-empty segments.
    pub fn split(token: &'a str) -> Result<Self, CryptoError> {
        let mut parts = token.splitn(3, TOKEN_SEPARATOR);
        let (Some(key_id), Some(nonce), Some(ciphertext)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(CryptoError::MalformedToken("expected id|nonce|ciphertext"));
        };
        if key_id.is_empty() || nonce.is_empty() || ciphertext.is_empty() {
            return Err(CryptoError::MalformedToken("empty token segment"));
        }
        Ok(Self {
            key_id,
            nonce,
            ciphertext,
        })
    }

    /// Base64-decode the nonce and ciphertext segments.
    ///
    /// The nonce length is not checked here; a wrong-length nonce is an
    /// authentication failure, reported by the engine.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::MalformedToken`] if either segment is not valid
    /// standard base64.
    pub fn decode(&self) -> Result<EncryptedToken, CryptoError> {
        let nonce = STANDARD
            .decode(self.nonce)
            .map_err(|_| CryptoError::MalformedToken("nonce is not valid base64"))?;
        let ciphertext = STANDARD
            .decode(self.ciphertext)
            .map_err(|_| CryptoError::MalformedToken("ciphertext is not valid base64"))?;
        Ok(EncryptedToken {
            key_id: self.key_id.to_owned(),
            nonce,
            ciphertext,
        })
    }
}

/// A decoded token.
///
/// `Display` produces the wire string; serde reads and writes the wire string.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EncryptedToken {
    /// Id of the key that sealed this value.
    pub key_id: String,
    /// Raw nonce bytes.
    pub nonce: Vec<u8>,
    /// Raw ciphertext followed by the authentication tag.
    pub ciphertext: Vec<u8>,
}

impl EncryptedToken {
    /// Parse a wire string into its decoded parts.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::MalformedToken`] on a bad split or bad base64.
    pub fn parse(token: &str) -> Result<Self, CryptoError> {
        TokenParts::split(token)?.decode()
    }
}

impl fmt::Display for EncryptedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{sep}{}{sep}{}",
            self.key_id,
            STANDARD.encode(&self.nonce),
            STANDARD.encode(&self.ciphertext),
            sep = TOKEN_SEPARATOR,
        )
    }
}

impl fmt::Debug for EncryptedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Lengths only; never the bytes.
        f.debug_struct("EncryptedToken")
            .field("key_id", &self.key_id)
            .field("nonce_len", &self.nonce.len())
            .field("ciphertext_len", &self.ciphertext.len())
            .finish()
    }
}

impl TryFrom<String> for EncryptedToken {
    type Error = CryptoError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<EncryptedToken> for String {
    fn from(token: EncryptedToken) -> Self {
        token.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> EncryptedToken {
        EncryptedToken {
            key_id: "2".into(),
            nonce: vec![7u8; NONCE_LEN],
            ciphertext: vec![1, 2, 3, 4, 5],
        }
    }

    #[test]
    fn display_matches_wire_format() {
        let s = sample().to_string();
        assert_eq!(s, "2|BwcHBwcHBwcHBwcH|AQIDBAU=");
        assert_eq!(EncryptedToken::parse(&s).unwrap(), sample());
    }

    #[test]
    fn split_rejects_too_few_parts() {
        assert_eq!(
            TokenParts::split("1|abc"),
            Err(CryptoError::MalformedToken("expected id|nonce|ciphertext"))
        );
        assert!(TokenParts::split("no separator").is_err());
    }

    #[test]
    fn split_rejects_empty_segments() {
        assert!(TokenParts::split("|abc|def").is_err());
        assert!(TokenParts::split("1||def").is_err());
        assert!(TokenParts::split("1|abc|").is_err());
    }

    #[test]
    fn split_is_bounded_to_three_parts() {
        let parts = TokenParts::split("1|AAAA|def|ghi").unwrap();
        assert_eq!(parts.key_id, "1");
        assert_eq!(parts.nonce, "AAAA");
        assert_eq!(parts.ciphertext, "def|ghi");
        // The extra separator stays in the ciphertext segment and fails base64.
        assert_eq!(
            parts.decode(),
            Err(CryptoError::MalformedToken("ciphertext is not valid base64"))
        );
    }

    #[test]
    fn decode_rejects_bad_base64() {
        let parts = TokenParts::split("1|!!!|AQID").unwrap();
        assert_eq!(
            parts.decode(),
            Err(CryptoError::MalformedToken("nonce is not valid base64"))
        );
    }

    #[test]
    fn extract_key_id_needs_no_decoding() {
        assert_eq!(extract_key_id("2|<nonce>|<ct>"), "2");
        assert_eq!(extract_key_id("10|a"), "10");
        assert_eq!(extract_key_id(""), "");
        assert_eq!(extract_key_id("plaintext"), "plaintext");
        assert_eq!(extract_key_id("|a|b"), "");
    }

    #[test]
    fn looks_like_token_requires_separator() {
        assert!(looks_like_token("1|a|b"));
        assert!(!looks_like_token("alice@example.com"));
        assert!(!looks_like_token(""));
    }

    #[test]
    fn debug_hides_bytes() {
        let dbg = format!("{:?}", sample());
        assert!(dbg.contains("nonce_len: 12"));
        assert!(!dbg.contains("BwcH"));
    }

    #[test]
    fn serde_uses_wire_string() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert_eq!(json, "\"2|BwcHBwcHBwcHBwcH|AQIDBAU=\"");
        let back: EncryptedToken = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sample());
        assert!(serde_json::from_str::<EncryptedToken>("\"garbage\"").is_err());
    }
}
