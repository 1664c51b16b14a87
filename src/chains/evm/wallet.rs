use ethers::core::k256::ecdsa::{ SigningKey, VerifyingKey };
use ethers::core::rand::thread_rng;
use ethers::signers::{ LocalWallet, Signer };
use ethers::types::{
    transaction::eip2718::TypedTransaction,
    Address,
    TransactionRequest as EthTxRequest,
    H160,
    H256,
    U256,
};
use ethers::utils::{ keccak256, public_key_to_address, to_checksum };
use secrecy::SecretSlice;

use crate::error::{ AppError, Result };
use crate::providers::KeyPair;

/// Gas consumed by a plain value transfer.
pub const TRANSFER_GAS_LIMIT: u64 = 21_000;

pub fn generate_key_pair() -> Result<KeyPair> {
    let signing_key = SigningKey::random(&mut thread_rng());
    let verifying_key = signing_key.verifying_key();

    let address = to_checksum(&public_key_to_address(verifying_key), None);
    let public_key = verifying_key.to_encoded_point(false).as_bytes().to_vec();

    Ok(KeyPair {
        address,
        public_key,
        private_key: SecretSlice::from(signing_key.to_bytes().to_vec()),
    })
}

/// Checksummed address for a SEC1-encoded secp256k1 public key.
pub fn derive_address(public_key: &[u8]) -> Result<String> {
    let verifying_key = VerifyingKey::from_sec1_bytes(public_key).map_err(|_|
        AppError::InvalidInput("Invalid secp256k1 public key".to_string())
    )?;

    Ok(to_checksum(&public_key_to_address(&verifying_key), None))
}

pub fn wallet_from_secret(secret: &[u8]) -> Result<LocalWallet> {
    LocalWallet::from_bytes(secret).map_err(|_| AppError::InvalidPrivateKey)
}

/// `0x` followed by 40 hex digits. Mixed-case input must carry a valid
/// EIP-55 checksum.
pub fn validate_address(address: &str) -> bool {
    let Some(hex_part) = address.strip_prefix("0x") else {
        return false;
    };
    if hex_part.len() != 40 {
        return false;
    }

    let Ok(parsed) = address.parse::<H160>() else {
        return false;
    };

    let is_single_case =
        hex_part == hex_part.to_lowercase() || hex_part == hex_part.to_uppercase();
    is_single_case || to_checksum(&parsed, None) == address
}

/// Fully specified legacy transfer, ready to sign.
pub struct LegacyTransfer {
    pub to: Address,
    pub value: U256,
    pub nonce: U256,
    pub gas_price: U256,
    pub chain_id: u64,
}

/// Sign an EIP-155 legacy transfer. Returns (tx hash, raw RLP bytes).
pub fn sign_transfer(wallet: &LocalWallet, transfer: &LegacyTransfer) -> Result<(String, Vec<u8>)> {
    let wallet = wallet.clone().with_chain_id(transfer.chain_id);

    let tx: TypedTransaction = EthTxRequest::new()
        .from(wallet.address())
        .to(transfer.to)
        .value(transfer.value)
        .gas(TRANSFER_GAS_LIMIT)
        .gas_price(transfer.gas_price)
        .nonce(transfer.nonce)
        .chain_id(transfer.chain_id)
        .into();

    let signature = wallet
        .sign_transaction_sync(&tx)
        .map_err(|e| AppError::Chain(format!("Failed to sign transaction: {}", e)))?;

    let raw = tx.rlp_signed(&signature);
    let tx_hash = format!("{:?}", H256::from(keccak256(&raw)));

    Ok((tx_hash, raw.to_vec()))
}
