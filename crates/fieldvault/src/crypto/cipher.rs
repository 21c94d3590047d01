//! AES-256-GCM sealing and opening of individual field values.
//!
//! **Nonces:** every seal draws a fresh 96-bit nonce from the OS CSPRNG. GCM
//! nonce reuse under one key breaks both confidentiality and authentication,
//! so nonces are never derived from the plaintext or from a counter.

use aes_gcm::{
    aead::{Aead, AeadCore, OsRng},
    Aes256Gcm, Nonce,
};
use common::{CryptoError, EncryptedToken, NONCE_LEN};

use crate::keys::EncryptionKey;

/// Seal `plaintext` under `key` with no associated data.
///
/// # Errors
///
/// Returns [`CryptoError::EncryptionFailed`] if the AEAD refuses the input
/// (only reachable for plaintexts beyond the GCM length limit).
pub fn seal(key: &EncryptionKey, plaintext: &[u8]) -> Result<EncryptedToken, CryptoError> {
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = key
        .cipher()
        .encrypt(&nonce, plaintext)
        .map_err(|_| CryptoError::EncryptionFailed)?;
    Ok(EncryptedToken {
        key_id: key.id().to_owned(),
        nonce: nonce.to_vec(),
        ciphertext,
    })
}

/// Authenticate and decrypt `token` with `key`.
///
/// A nonce of the wrong length, a truncated ciphertext, a wrong key and
/// tampered bytes all report the same error.
///
/// # Errors
///
/// Returns [`CryptoError::DecryptionFailed`] if authentication fails.
pub fn open(key: &EncryptionKey, token: &EncryptedToken) -> Result<Vec<u8>, CryptoError> {
    if token.nonce.len() != NONCE_LEN {
        return Err(CryptoError::DecryptionFailed);
    }
    let nonce = Nonce::from_slice(&token.nonce);
    key.cipher()
        .decrypt(nonce, token.ciphertext.as_ref())
        .map_err(|_| CryptoError::DecryptionFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KEY_LEN;
    use aes_gcm::aead::rand_core::RngCore;
    use common::TAG_LEN;

    fn random_key(id: &str) -> EncryptionKey {
        let mut raw = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut raw);
        EncryptionKey::new(id, &raw).unwrap()
    }

    #[test]
    fn seal_open_round_trip() {
        let key = random_key("1");
        let token = seal(&key, b"123-45-6789").unwrap();
        assert_eq!(token.key_id, "1");
        assert_eq!(token.nonce.len(), NONCE_LEN);
        assert_eq!(token.ciphertext.len(), b"123-45-6789".len() + TAG_LEN);
        assert_eq!(open(&key, &token).unwrap(), b"123-45-6789");
    }

    #[test]
    fn wrong_key_fails_authentication() {
        let token = seal(&random_key("1"), b"secret").unwrap();
        assert_eq!(
            open(&random_key("1"), &token),
            Err(CryptoError::DecryptionFailed)
        );
    }

    #[test]
    fn tampered_ciphertext_fails_authentication() {
        let key = random_key("1");
        let mut token = seal(&key, b"tamper me").unwrap();
        token.ciphertext[0] ^= 0x01;
        assert_eq!(open(&key, &token), Err(CryptoError::DecryptionFailed));
    }

    #[test]
    fn truncated_nonce_fails_authentication() {
        let key = random_key("1");
        let mut token = seal(&key, b"x").unwrap();
        token.nonce.truncate(8);
        assert_eq!(open(&key, &token), Err(CryptoError::DecryptionFailed));
    }

    #[test]
    fn truncated_ciphertext_fails_authentication() {
        let key = random_key("1");
        let mut token = seal(&key, b"hello").unwrap();
        token.ciphertext.truncate(4);
        assert_eq!(open(&key, &token), Err(CryptoError::DecryptionFailed));
    }
}
