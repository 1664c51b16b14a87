use async_trait::async_trait;
use secrecy::SecretSlice;
use serde::{ Deserialize, Serialize };

use crate::enums::{ Chain, TransferStage, TxStatus };
use crate::error::Result;

/// Freshly generated key pair. `private_key` is zeroized on drop.
pub struct KeyPair {
    pub address: String,
    pub public_key: Vec<u8>,
    pub private_key: SecretSlice<u8>,
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("address", &self.address)
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

/// Outgoing native transfer, amounts in smallest units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRequest {
    pub from: String,
    pub to: String,
    pub amount: u128,
    /// Chain-specific fee rate override: wei per gas on Ethereum, sat/vB on
    /// Bitcoin. Solana fees are fixed and ignore it.
    pub fee_hint: Option<u64>,
}

/// A signed transaction ready for broadcast.
#[derive(Debug, Clone)]
pub struct SignedTransfer {
    pub chain: Chain,
    pub tx_hash: String,
    /// Wire bytes exactly as they will be broadcast.
    pub raw_tx: Vec<u8>,
    /// Network fee in smallest units.
    pub fee: u128,
    pub stage: TransferStage,
}

impl SignedTransfer {
    pub fn new(chain: Chain, tx_hash: String, raw_tx: Vec<u8>, fee: u128) -> Result<Self> {
        let stage = TransferStage::Built.advance(TransferStage::Signed)?;
        Ok(Self {
            chain,
            tx_hash,
            raw_tx,
            fee,
            stage,
        })
    }

    pub fn into_submitted(self, tx_hash: String) -> Result<SubmittedTransfer> {
        let stage = self.stage.advance(TransferStage::Submitted)?;
        Ok(SubmittedTransfer {
            chain: self.chain,
            tx_hash,
            fee: self.fee,
            stage,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmittedTransfer {
    pub chain: Chain,
    pub tx_hash: String,
    pub fee: u128,
    pub stage: TransferStage,
}

#[async_trait]
pub trait ChainAdapter: Send + Sync {
    fn chain(&self) -> Chain;

    /// Generate a fresh key pair from a cryptographically secure source
    fn generate_key_pair(&self) -> Result<KeyPair>;

    /// Encode a public key as this chain's address format
    fn derive_address(&self, public_key: &[u8]) -> Result<String>;

    /// Validate address format without touching the network
    fn validate_address(&self, address: &str) -> bool;

    /// Native balance in smallest units
    async fn get_balance(&self, address: &str) -> Result<u128>;

    /// Build and sign a native transfer
    async fn build_and_sign_transfer(
        &self,
        private_key: &SecretSlice<u8>,
        request: &TransferRequest
    ) -> Result<SignedTransfer>;

    /// Broadcast a signed transfer. Never retried by callers.
    async fn submit(&self, signed: SignedTransfer) -> Result<SubmittedTransfer>;

    /// Current network view of a submitted transaction
    async fn confirmation_status(&self, tx_hash: &str) -> Result<TxStatus>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_transfer_stages() {
        let signed = SignedTransfer::new(Chain::Eth, "0xabc".to_string(), vec![1, 2], 21).unwrap();
        assert_eq!(signed.stage, TransferStage::Signed);

        let submitted = signed.into_submitted("0xabc".to_string()).unwrap();
        assert_eq!(submitted.stage, TransferStage::Submitted);
        assert_eq!(submitted.fee, 21);
    }

    #[test]
    fn test_key_pair_debug_redacts_secret() {
        let pair = KeyPair {
            address: "addr".to_string(),
            public_key: vec![2; 33],
            private_key: SecretSlice::from(vec![0x42u8; 32]),
        };

        let debug = format!("{:?}", pair);
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("66"));
    }
}
