//! Decryption of the device tokens stored in the registry.
//!
//! Each stored value is `base64(nonce || ciphertext || tag)` sealed with
//! AES-GCM under a key made of the raw UTF-8 bytes of the shared secret.
//! A 16-, 24- or 32-byte secret selects AES-128, AES-192 or AES-256.

use aes_gcm::aead::consts::U12;
use aes_gcm::aead::{Aead, KeyInit, generic_array::GenericArray};
use aes_gcm::{Aes128Gcm, Aes256Gcm, AesGcm, Nonce, aes::Aes192};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

type Aes192Gcm = AesGcm<Aes192, U12>;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token secret must be 16, 24 or 32 bytes, got {0}")]
    InvalidKeyLength(usize),

    #[error("token is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("token is too short ({0} bytes)")]
    TooShort(usize),

    #[error("token failed authentication")]
    Decrypt,

    #[error("decrypted token is not UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

enum Cipher {
    Aes128(Box<Aes128Gcm>),
    Aes192(Box<Aes192Gcm>),
    Aes256(Box<Aes256Gcm>),
}

/// AES-GCM opener for registry tokens.
pub struct TokenCipher {
    cipher: Cipher,
}

impl std::fmt::Debug for TokenCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bits = match self.cipher {
            Cipher::Aes128(_) => 128,
            Cipher::Aes192(_) => 192,
            Cipher::Aes256(_) => 256,
        };
        f.debug_struct("TokenCipher").field("bits", &bits).finish()
    }
}

impl TokenCipher {
    pub fn new(secret: &str) -> Result<Self, TokenError> {
        let key = secret.as_bytes();
        let cipher = match key.len() {
            16 => Cipher::Aes128(Box::new(Aes128Gcm::new(GenericArray::from_slice(key)))),
            24 => Cipher::Aes192(Box::new(Aes192Gcm::new(GenericArray::from_slice(key)))),
            32 => Cipher::Aes256(Box::new(Aes256Gcm::new(GenericArray::from_slice(key)))),
            other => return Err(TokenError::InvalidKeyLength(other)),
        };
        Ok(Self { cipher })
    }

    /// Opens one stored token. The tag is verified as part of the single
    /// authenticated decryption.
    pub fn decrypt(&self, encoded: &str) -> Result<String, TokenError> {
        let sealed = STANDARD.decode(encoded.trim())?;
        if sealed.len() <= NONCE_LEN + TAG_LEN {
            return Err(TokenError::TooShort(sealed.len()));
        }

        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce);
        let plain = match &self.cipher {
            Cipher::Aes128(c) => c.decrypt(nonce, ciphertext),
            Cipher::Aes192(c) => c.decrypt(nonce, ciphertext),
            Cipher::Aes256(c) => c.decrypt(nonce, ciphertext),
        }
        .map_err(|_| TokenError::Decrypt)?;

        Ok(String::from_utf8(plain)?)
    }

    /// Decrypts every token, dropping the ones that fail.
    pub fn decrypt_all<'a, I>(&self, encoded: I) -> Vec<String>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        encoded
            .into_iter()
            .filter_map(|(id, value)| match self.decrypt(value) {
                Ok(token) => Some(token),
                Err(e) => {
                    tracing::warn!(recipient = id, error = %e, "dropping undecryptable token");
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
pub(crate) fn seal_for_test(secret: &str, nonce: [u8; NONCE_LEN], plain: &str) -> String {
    let key = secret.as_bytes();
    let nonce_ref = Nonce::from_slice(&nonce);
    let sealed = match key.len() {
        16 => Aes128Gcm::new(GenericArray::from_slice(key)).encrypt(nonce_ref, plain.as_bytes()),
        24 => Aes192Gcm::new(GenericArray::from_slice(key)).encrypt(nonce_ref, plain.as_bytes()),
        32 => Aes256Gcm::new(GenericArray::from_slice(key)).encrypt(nonce_ref, plain.as_bytes()),
        _ => panic!("test secret must be 16, 24 or 32 bytes"),
    }
    .unwrap();

    let mut full = nonce.to_vec();
    full.extend(sealed);
    STANDARD.encode(full)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET_128: &str = "0123456789abcdef";
    const SECRET_192: &str = "0123456789abcdef01234567";
    const SECRET_256: &str = "0123456789abcdef0123456789abcdef";
    const DEVICE: &str = "a1b2c3d4e5f60718293a4b5c6d7e8f90a1b2c3d4e5f60718293a4b5c6d7e8f90";

    #[test]
    fn rejects_unsupported_key_length() {
        assert!(matches!(
            TokenCipher::new("short"),
            Err(TokenError::InvalidKeyLength(5))
        ));
    }

    #[test]
    fn opens_tokens_for_every_key_size() {
        for secret in [SECRET_128, SECRET_192, SECRET_256] {
            let cipher = TokenCipher::new(secret).unwrap();
            let sealed = seal_for_test(secret, [7; NONCE_LEN], DEVICE);
            assert_eq!(cipher.decrypt(&sealed).unwrap(), DEVICE);
        }
    }

    #[test]
    fn wrong_secret_fails_authentication() {
        let sealed = seal_for_test(SECRET_128, [1; NONCE_LEN], DEVICE);
        let cipher = TokenCipher::new("fedcba9876543210").unwrap();
        assert!(matches!(cipher.decrypt(&sealed), Err(TokenError::Decrypt)));
    }

    #[test]
    fn tampered_tag_fails_authentication() {
        let sealed = seal_for_test(SECRET_128, [2; NONCE_LEN], DEVICE);
        let mut raw = STANDARD.decode(&sealed).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        let cipher = TokenCipher::new(SECRET_128).unwrap();
        assert!(matches!(
            cipher.decrypt(&STANDARD.encode(raw)),
            Err(TokenError::Decrypt)
        ));
    }

    #[test]
    fn short_and_garbled_input() {
        let cipher = TokenCipher::new(SECRET_128).unwrap();
        assert!(matches!(
            cipher.decrypt(&STANDARD.encode([0u8; 20])),
            Err(TokenError::TooShort(20))
        ));
        assert!(matches!(
            cipher.decrypt("not base64 at all!"),
            Err(TokenError::Base64(_))
        ));
    }

    #[test]
    fn decrypt_all_drops_failures() {
        let cipher = TokenCipher::new(SECRET_128).unwrap();
        let good = seal_for_test(SECRET_128, [3; NONCE_LEN], DEVICE);
        let other = seal_for_test(SECRET_128, [4; NONCE_LEN], "beef");
        let tokens = cipher.decrypt_all([
            ("u1", good.as_str()),
            ("u2", "garbage"),
            ("u3", other.as_str()),
        ]);
        assert_eq!(tokens, vec![DEVICE.to_string(), "beef".to_string()]);
    }
}
