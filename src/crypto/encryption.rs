use aes_gcm::{ aead::{ Aead, AeadCore, KeyInit, OsRng }, Aes256Gcm, Nonce };
use secrecy::SecretSlice;

use crate::crypto::key_store::KeyStore;
use crate::error::{ AppError, Result };

/// Key store entry holding the hex-encoded AES-256 key.
pub const ENCRYPTION_KEY_ITEM: &str = "wallet_encryption_key";

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// AES-256-GCM encryption for private-key material.
///
/// Ciphertexts are hex(nonce || ciphertext || tag) with a fresh random
/// nonce per call. The key is read-only after construction, so one
/// instance can be shared across concurrent tasks.
pub struct Encryptor {
    cipher: Aes256Gcm,
}

impl Encryptor {
    pub fn new(key: &[u8]) -> Result<Self> {
        if key.len() != KEY_LEN {
            return Err(AppError::Encryption("Encryption key must be 32 bytes".to_string()));
        }

        let cipher = Aes256Gcm::new_from_slice(key).map_err(|e|
            AppError::Encryption(e.to_string())
        )?;

        Ok(Self { cipher })
    }

    /// Load the process-wide key from the store, generating and persisting
    /// one on first run.
    pub async fn initialize(store: &dyn KeyStore) -> Result<Self> {
        let existing = store
            .get_item(ENCRYPTION_KEY_ITEM).await
            .map_err(|e| AppError::SecurityInit(format!("Key store unavailable: {}", e)))?;

        if let Some(encoded) = existing {
            let key = hex
                ::decode(encoded.trim())
                .map_err(|_| AppError::SecurityInit("Stored encryption key is not hex".to_string()))?;
            if key.len() != KEY_LEN {
                return Err(AppError::SecurityInit("Stored encryption key has wrong length".to_string()));
            }

            tracing::debug!("Loaded encryption key from key store");
            return Self::new(&key).map_err(|e| AppError::SecurityInit(e.to_string()));
        }

        let key = Aes256Gcm::generate_key(&mut OsRng);
        store
            .set_item(ENCRYPTION_KEY_ITEM, &hex::encode(key.as_slice())).await
            .map_err(|e| AppError::SecurityInit(format!("Failed to persist encryption key: {}", e)))?;

        tracing::info!("Generated new encryption key");

        Ok(Self { cipher: Aes256Gcm::new(&key) })
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<String> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

        let ciphertext = self.cipher
            .encrypt(&nonce, plaintext)
            .map_err(|e| AppError::Encryption(e.to_string()))?;

        // Combine nonce + ciphertext and encode as hex
        let mut combined = nonce.to_vec();
        combined.extend_from_slice(&ciphertext);

        Ok(hex::encode(combined))
    }

    /// Decrypt into a zeroizing buffer. Callers should keep the result in
    /// scope only for the signing call that needs it.
    pub fn decrypt(&self, encrypted_hex: &str) -> Result<SecretSlice<u8>> {
        let combined = hex
            ::decode(encrypted_hex)
            .map_err(|e| AppError::Decryption(format!("Invalid hex: {}", e)))?;

        if combined.len() < NONCE_LEN {
            return Err(AppError::Decryption("Encrypted data too short".to_string()));
        }

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        // aes-gcm errors are opaque; say nothing more than that auth failed
        let plaintext = self.cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| AppError::Decryption("Authentication failed".to_string()))?;

        Ok(SecretSlice::from(plaintext))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::key_store::MemoryKeyStore;
    use async_trait::async_trait;
    use secrecy::ExposeSecret;

    #[test]
    fn test_encrypt_decrypt() {
        let key = [0u8; 32];
        let encryptor = Encryptor::new(&key).unwrap();

        let plaintext = b"test private key 0x1234567890abcdef";
        let encrypted = encryptor.encrypt(plaintext).unwrap();
        let decrypted = encryptor.decrypt(&encrypted).unwrap();

        assert_eq!(decrypted.expose_secret(), plaintext);
    }

    #[test]
    fn test_round_trip_edge_lengths() {
        let encryptor = Encryptor::new(&[7u8; 32]).unwrap();

        let empty = encryptor.encrypt(&[]).unwrap();
        assert!(encryptor.decrypt(&empty).unwrap().expose_secret().is_empty());

        // 64 bytes is the largest key material any adapter produces (Solana keypair)
        let keypair = [0xabu8; 64];
        let encrypted = encryptor.encrypt(&keypair).unwrap();
        assert_eq!(encryptor.decrypt(&encrypted).unwrap().expose_secret(), &keypair[..]);
    }

    #[test]
    fn test_different_nonces() {
        let key = [0u8; 32];
        let encryptor = Encryptor::new(&key).unwrap();

        let plaintext = b"same plaintext";
        let encrypted1 = encryptor.encrypt(plaintext).unwrap();
        let encrypted2 = encryptor.encrypt(plaintext).unwrap();

        // Different nonces should produce different ciphertexts
        assert_ne!(encrypted1, encrypted2);

        // But both should decrypt to the same plaintext
        assert_eq!(encryptor.decrypt(&encrypted1).unwrap().expose_secret(), plaintext);
        assert_eq!(encryptor.decrypt(&encrypted2).unwrap().expose_secret(), plaintext);
    }

    #[test]
    fn test_malformed_ciphertext() {
        let encryptor = Encryptor::new(&[1u8; 32]).unwrap();

        assert!(matches!(encryptor.decrypt("zz"), Err(AppError::Decryption(_))));
        assert!(matches!(encryptor.decrypt("00ff"), Err(AppError::Decryption(_))));

        let mut tampered = encryptor.encrypt(b"secret").unwrap();
        let last = tampered.pop().unwrap();
        tampered.push(if last == '0' { '1' } else { '0' });
        assert!(matches!(encryptor.decrypt(&tampered), Err(AppError::Decryption(_))));
    }

    #[test]
    fn test_wrong_key_fails() {
        let a = Encryptor::new(&[1u8; 32]).unwrap();
        let b = Encryptor::new(&[2u8; 32]).unwrap();

        let encrypted = a.encrypt(b"secret").unwrap();
        assert!(matches!(b.decrypt(&encrypted), Err(AppError::Decryption(_))));
    }

    #[test]
    fn test_rejects_short_key() {
        assert!(matches!(Encryptor::new(&[0u8; 16]), Err(AppError::Encryption(_))));
    }

    #[tokio::test]
    async fn test_initialize_generates_then_reuses_key() {
        let store = MemoryKeyStore::new();

        let first = Encryptor::initialize(&store).await.unwrap();
        let stored = store.get_item(ENCRYPTION_KEY_ITEM).await.unwrap().unwrap();
        assert_eq!(stored.len(), 64);

        let ciphertext = first.encrypt(b"persisted").unwrap();

        let second = Encryptor::initialize(&store).await.unwrap();
        assert_eq!(store.get_item(ENCRYPTION_KEY_ITEM).await.unwrap().unwrap(), stored);
        assert_eq!(second.decrypt(&ciphertext).unwrap().expose_secret(), b"persisted");
    }

    #[tokio::test]
    async fn test_initialize_rejects_corrupt_stored_key() {
        let store = MemoryKeyStore::new();
        store.set_item(ENCRYPTION_KEY_ITEM, "abcd").await.unwrap();

        assert!(matches!(Encryptor::initialize(&store).await, Err(AppError::SecurityInit(_))));
    }

    struct UnreachableStore;

    #[async_trait]
    impl KeyStore for UnreachableStore {
        async fn get_item(&self, _key: &str) -> Result<Option<String>> {
            Err(AppError::KeyStore("offline".to_string()))
        }

        async fn set_item(&self, _key: &str, _value: &str) -> Result<()> {
            Err(AppError::KeyStore("offline".to_string()))
        }

        async fn remove_item(&self, _key: &str) -> Result<()> {
            Err(AppError::KeyStore("offline".to_string()))
        }
    }

    #[tokio::test]
    async fn test_initialize_fails_when_store_unreachable() {
        assert!(
            matches!(Encryptor::initialize(&UnreachableStore).await, Err(AppError::SecurityInit(_)))
        );
    }
}
