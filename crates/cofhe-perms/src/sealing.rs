//! Sealing keys: NaCl `crypto_box` encryption of single integer values.
//!
//! A permit carries a sealing keypair. The threshold network encrypts a
//! decrypted value to the permit's public key ("seals" it) so only the permit
//! holder can read it in transit.
//!
//! ## Format
//!
//! Keys are 32-byte X25519 keys held as 64-character hex strings (no prefix).
//! A sealed value is `{ data, public_key, nonce }`: the XSalsa20-Poly1305
//! ciphertext, the sender's ephemeral public key, and a 24-byte nonce. The
//! plaintext is the value's minimal big-endian encoding.

use crypto_box::aead::Aead;
use crypto_box::{Nonce, PublicKey, SalsaBox, SecretKey};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

use cofhe_core::U256;

use crate::error::{PermsError, Result};

const PRIVATE_KEY_LENGTH: usize = 64;
const PUBLIC_KEY_LENGTH: usize = 64;
const NONCE_LENGTH: usize = 24;

/// A value sealed to a recipient's public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EthEncryptedData {
    pub data: Vec<u8>,
    pub public_key: Vec<u8>,
    pub nonce: Vec<u8>,
}

/// An X25519 keypair used to seal and unseal values.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "SealingKeyParts")]
pub struct SealingKey {
    private_key: String,
    public_key: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SealingKeyParts {
    private_key: String,
    public_key: String,
}

impl TryFrom<SealingKeyParts> for SealingKey {
    type Error = PermsError;

    fn try_from(parts: SealingKeyParts) -> Result<Self> {
        SealingKey::new(parts.private_key, parts.public_key)
    }
}

impl SealingKey {
    /// Construct from hex-encoded halves.
    pub fn new(private_key: impl Into<String>, public_key: impl Into<String>) -> Result<Self> {
        let private_key = private_key.into();
        let public_key = public_key.into();

        if private_key.len() != PRIVATE_KEY_LENGTH {
            return Err(PermsError::KeyLength(format!(
                "Private key must be of length {}",
                PRIVATE_KEY_LENGTH
            )));
        }
        if public_key.len() != PUBLIC_KEY_LENGTH {
            return Err(PermsError::KeyLength(format!(
                "Public key must be of length {}",
                PUBLIC_KEY_LENGTH
            )));
        }
        decode_key(&private_key)?;
        decode_key(&public_key)?;

        Ok(Self {
            private_key,
            public_key,
        })
    }

    /// Generate a fresh random keypair.
    pub fn generate() -> Self {
        let secret = SecretKey::generate(&mut rand::rngs::OsRng);
        let public = secret.public_key();
        Self {
            private_key: hex::encode(secret.to_bytes()),
            public_key: hex::encode(public.as_bytes()),
        }
    }

    /// Hex-encoded private key.
    pub fn private_key(&self) -> &str {
        &self.private_key
    }

    /// Hex-encoded public key.
    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    /// Seal `value` to `public_key` using a fresh ephemeral key and nonce.
    pub fn seal(value: U256, public_key: &str) -> Result<EthEncryptedData> {
        let ephemeral = SecretKey::generate(&mut rand::rngs::OsRng);
        let mut nonce = [0u8; NONCE_LENGTH];
        rand::rngs::OsRng.fill_bytes(&mut nonce);
        Self::seal_with(value, public_key, ephemeral.to_bytes(), nonce)
    }

    /// Seal with a caller-supplied ephemeral secret and nonce. Deterministic.
    pub fn seal_with(
        value: U256,
        public_key: &str,
        ephemeral_secret: [u8; 32],
        nonce: [u8; NONCE_LENGTH],
    ) -> Result<EthEncryptedData> {
        let recipient = PublicKey::from(decode_key(public_key)?);
        let ephemeral = SecretKey::from(ephemeral_secret);
        let salsa_box = SalsaBox::new(&recipient, &ephemeral);

        let plaintext = value.to_be_bytes_trimmed_vec();
        let data = salsa_box
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_slice())
            .map_err(|e| PermsError::Encryption(format!("seal failed: {}", e)))?;

        Ok(EthEncryptedData {
            data,
            public_key: ephemeral.public_key().as_bytes().to_vec(),
            nonce: nonce.to_vec(),
        })
    }

    /// Open a sealed value with this key's private half.
    pub fn unseal(&self, sealed: &EthEncryptedData) -> Result<U256> {
        if sealed.nonce.len() != NONCE_LENGTH {
            return Err(PermsError::Decryption(format!(
                "nonce must be {} bytes, got {}",
                NONCE_LENGTH,
                sealed.nonce.len()
            )));
        }
        let ephemeral: [u8; 32] = sealed.public_key.as_slice().try_into().map_err(|_| {
            PermsError::Decryption(format!(
                "ephemeral public key must be 32 bytes, got {}",
                sealed.public_key.len()
            ))
        })?;

        let secret = SecretKey::from(decode_key(&self.private_key)?);
        let salsa_box = SalsaBox::new(&PublicKey::from(ephemeral), &secret);

        let plaintext = salsa_box
            .decrypt(Nonce::from_slice(&sealed.nonce), sealed.data.as_slice())
            .map_err(|_| PermsError::Decryption("Failed to decrypt message".to_string()))?;

        U256::try_from_be_slice(&plaintext).ok_or_else(|| {
            PermsError::Decryption(format!(
                "sealed value is {} bytes, more than a 256-bit word",
                plaintext.len()
            ))
        })
    }
}

impl fmt::Debug for SealingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SealingKey")
            .field("public_key", &self.public_key)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

fn decode_key(key: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(key).map_err(|e| PermsError::InvalidHex(e.to_string()))?;
    bytes
        .try_into()
        .map_err(|_| PermsError::KeyLength("key must decode to 32 bytes".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_key_lengths() {
        let key = SealingKey::generate();
        assert_eq!(key.private_key().len(), 64);
        assert_eq!(key.public_key().len(), 64);
    }

    #[test]
    fn test_bad_key_length_rejected() {
        let key = SealingKey::generate();
        assert!(matches!(
            SealingKey::new(&key.private_key()[..62], key.public_key()),
            Err(PermsError::KeyLength(_))
        ));
        assert!(matches!(
            SealingKey::new(key.private_key(), format!("{}00", key.public_key())),
            Err(PermsError::KeyLength(_))
        ));
    }

    #[test]
    fn test_seal_unseal_roundtrip() {
        let key = SealingKey::generate();
        let values = [
            U256::ZERO,
            U256::from(1u8),
            U256::from(u32::MAX),
            U256::from(u128::MAX),
        ];
        for value in values {
            let sealed = SealingKey::seal(value, key.public_key()).unwrap();
            assert_eq!(key.unseal(&sealed).unwrap(), value);
        }
    }

    #[test]
    fn test_seal_bool_encoding() {
        let key = SealingKey::generate();
        for b in [false, true] {
            let value = U256::from(u8::from(b));
            let sealed = SealingKey::seal(value, key.public_key()).unwrap();
            assert_eq!(key.unseal(&sealed).unwrap(), value);
        }
    }

    #[test]
    fn test_seal_with_is_deterministic() {
        let key = SealingKey::generate();
        let a =
            SealingKey::seal_with(U256::from(7u8), key.public_key(), [9u8; 32], [1u8; 24])
                .unwrap();
        let b =
            SealingKey::seal_with(U256::from(7u8), key.public_key(), [9u8; 32], [1u8; 24])
                .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_unseal_wrong_key_fails() {
        let key = SealingKey::generate();
        let other = SealingKey::generate();
        let sealed = SealingKey::seal(U256::from(42u8), key.public_key()).unwrap();
        assert!(matches!(
            other.unseal(&sealed),
            Err(PermsError::Decryption(_))
        ));
    }

    #[test]
    fn test_unseal_tampered_fails() {
        let key = SealingKey::generate();
        let mut sealed = SealingKey::seal(U256::from(42u8), key.public_key()).unwrap();
        sealed.data[0] ^= 0xff;
        assert!(key.unseal(&sealed).is_err());

        let mut short_nonce = SealingKey::seal(U256::from(42u8), key.public_key()).unwrap();
        short_nonce.nonce.truncate(10);
        assert!(key.unseal(&short_nonce).is_err());
    }

    #[test]
    fn test_serde_validates_lengths() {
        let key = SealingKey::generate();
        let json = serde_json::to_value(&key).unwrap();
        assert!(json["privateKey"].is_string());
        let back: SealingKey = serde_json::from_value(json).unwrap();
        assert_eq!(back, key);

        let bad = serde_json::json!({ "privateKey": "00", "publicKey": key.public_key() });
        assert!(serde_json::from_value::<SealingKey>(bad).is_err());
    }

    #[test]
    fn test_debug_redacts_private_key() {
        let key = SealingKey::generate();
        assert!(!format!("{:?}", key).contains(key.private_key()));
    }
}
