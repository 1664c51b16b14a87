use secrecy::SecretSlice;
use solana_keypair::Keypair;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signer::Signer;
use std::str::FromStr;

use crate::error::{ AppError, Result };
use crate::providers::KeyPair;

/// Fresh ed25519 key pair. The secret material is the 64-byte keypair
/// encoding (seed followed by public key) that Solana tooling expects.
pub fn generate_key_pair() -> Result<KeyPair> {
    let keypair = Keypair::new();
    let pubkey = keypair.pubkey();

    Ok(KeyPair {
        address: pubkey.to_string(),
        public_key: pubkey.to_bytes().to_vec(),
        private_key: SecretSlice::from(keypair.to_bytes().to_vec()),
    })
}

/// Base58 address of a raw 32-byte ed25519 public key.
pub fn derive_address(public_key: &[u8]) -> Result<String> {
    let pubkey = Pubkey::try_from(public_key).map_err(|_|
        AppError::InvalidInput("Invalid ed25519 public key".to_string())
    )?;

    Ok(pubkey.to_string())
}

pub fn keypair_from_secret(secret: &[u8]) -> Result<Keypair> {
    Keypair::try_from(secret).map_err(|_| AppError::InvalidPrivateKey)
}

pub fn parse_address(address: &str) -> Result<Pubkey> {
    Pubkey::from_str(address).map_err(|_| AppError::InvalidAddress)
}

pub fn validate_address(address: &str) -> bool {
    parse_address(address).is_ok()
}
