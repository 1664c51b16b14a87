use bitcoin::key::PrivateKey;
use bitcoin::secp256k1::{ rand::thread_rng, Secp256k1, SecretKey };
use bitcoin::{ Address, CompressedPublicKey, Network };
use secrecy::SecretSlice;
use std::str::FromStr;

use crate::error::{ AppError, Result };
use crate::providers::KeyPair;

pub fn network(testnet: bool) -> Network {
    if testnet { Network::Testnet } else { Network::Bitcoin }
}

/// Fresh native SegWit (P2WPKH) key pair. The secret material is the raw
/// 32-byte secp256k1 scalar.
pub fn generate_key_pair(testnet: bool) -> Result<KeyPair> {
    let secp = Secp256k1::new();
    let secret_key = SecretKey::new(&mut thread_rng());
    let private_key = PrivateKey::new(secret_key, network(testnet));

    let public_key = CompressedPublicKey::from_private_key(&secp, &private_key).map_err(|e|
        AppError::Internal(format!("Failed to derive public key: {}", e))
    )?;
    let address = Address::p2wpkh(&public_key, network(testnet));

    Ok(KeyPair {
        address: address.to_string(),
        public_key: public_key.to_bytes().to_vec(),
        private_key: SecretSlice::from(secret_key.secret_bytes().to_vec()),
    })
}

/// Bech32 P2WPKH address for a compressed SEC1 public key.
pub fn derive_address(public_key: &[u8], testnet: bool) -> Result<String> {
    let public_key = CompressedPublicKey::from_slice(public_key).map_err(|_|
        AppError::InvalidInput("Invalid compressed public key".to_string())
    )?;

    Ok(Address::p2wpkh(&public_key, network(testnet)).to_string())
}

pub fn secret_key_from_bytes(secret: &[u8]) -> Result<SecretKey> {
    SecretKey::from_slice(secret).map_err(|_| AppError::InvalidPrivateKey)
}

/// Parse an address and check it belongs to the configured network.
pub fn parse_address(address: &str, testnet: bool) -> Result<Address> {
    Address::from_str(address)
        .map_err(|_| AppError::InvalidAddress)?
        .require_network(network(testnet))
        .map_err(|_| AppError::InvalidAddress)
}

pub fn validate_address(address: &str, testnet: bool) -> bool {
    parse_address(address, testnet).is_ok()
}
