use async_trait::async_trait;
use ethers::{
    providers::{ Http, Middleware, Provider },
    types::{ Address, BlockNumber, Bytes, H256, U256, U64 },
};
use secrecy::{ ExposeSecret, SecretSlice };
use std::sync::Arc;

use crate::chains::evm::wallet::{ self, LegacyTransfer, TRANSFER_GAS_LIMIT };
use crate::enums::{ Chain, TxStatus };
use crate::error::{ AppError, Result };
use crate::providers::{
    ChainAdapter,
    KeyPair,
    SignedTransfer,
    SubmittedTransfer,
    TransferRequest,
};
use crate::units::format_units;

#[derive(Clone)]
pub struct EvmAdapter {
    provider: Arc<Provider<Http>>,
    chain_id: u64,
}

impl EvmAdapter {
    pub fn new(rpc_url: &str, chain_id: u64) -> Result<Self> {
        let provider = Provider::<Http>
            ::try_from(rpc_url)
            .map_err(|e| AppError::Rpc(format!("Failed to create provider: {}", e)))?;

        Ok(Self {
            provider: Arc::new(provider),
            chain_id,
        })
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn resolve_gas_price(&self, fee_hint: Option<u64>) -> Result<U256> {
        if let Some(gas_price) = fee_hint {
            return Ok(U256::from(gas_price));
        }

        self.provider
            .get_gas_price().await
            .map_err(|e| AppError::Rpc(format!("Failed to get gas price: {}", e)))
    }

    async fn balance_of(&self, address: Address) -> Result<U256> {
        self.provider
            .get_balance(address, None).await
            .map_err(|e| AppError::BalanceQuery(format!("Failed to get balance: {}", e)))
    }
}

fn to_u128(value: U256, what: &str) -> Result<u128> {
    u128::try_from(value).map_err(|_| AppError::Chain(format!("{} does not fit in u128", what)))
}

#[async_trait]
impl ChainAdapter for EvmAdapter {
    fn chain(&self) -> Chain {
        Chain::Eth
    }

    fn generate_key_pair(&self) -> Result<KeyPair> {
        wallet::generate_key_pair()
    }

    fn derive_address(&self, public_key: &[u8]) -> Result<String> {
        wallet::derive_address(public_key)
    }

    fn validate_address(&self, address: &str) -> bool {
        wallet::validate_address(address)
    }

    async fn get_balance(&self, address: &str) -> Result<u128> {
        let addr: Address = address.parse().map_err(|_| AppError::InvalidAddress)?;
        let balance = self.balance_of(addr).await?;
        to_u128(balance, "Balance")
    }

    async fn build_and_sign_transfer(
        &self,
        private_key: &SecretSlice<u8>,
        request: &TransferRequest
    ) -> Result<SignedTransfer> {
        if !wallet::validate_address(&request.to) {
            return Err(AppError::InvalidAddress);
        }
        let to: Address = request.to.parse().map_err(|_| AppError::InvalidAddress)?;

        let signer = wallet::wallet_from_secret(private_key.expose_secret())?;
        let from = ethers::signers::Signer::address(&signer);

        let expected_from: Address = request.from.parse().map_err(|_| AppError::InvalidAddress)?;
        if from != expected_from {
            return Err(AppError::InvalidPrivateKey);
        }

        let gas_price = self.resolve_gas_price(request.fee_hint).await?;
        let fee = gas_price
            .checked_mul(U256::from(TRANSFER_GAS_LIMIT))
            .ok_or_else(|| AppError::Chain("Fee overflow".to_string()))?;
        let value = U256::from(request.amount);

        let balance = self.balance_of(from).await?;
        let required = value
            .checked_add(fee)
            .ok_or_else(|| AppError::Chain("Amount overflow".to_string()))?;
        if required > balance {
            return Err(AppError::InsufficientFunds {
                requested: format_units(to_u128(required, "Required amount")?, 18),
                available: format_units(to_u128(balance, "Balance")?, 18),
            });
        }

        let nonce = self.provider
            .get_transaction_count(from, Some(BlockNumber::Pending.into())).await
            .map_err(|e| AppError::Rpc(format!("Failed to get nonce: {}", e)))?;

        let (tx_hash, raw) = wallet::sign_transfer(&signer, &LegacyTransfer {
            to,
            value,
            nonce,
            gas_price,
            chain_id: self.chain_id,
        })?;

        tracing::debug!(tx_hash = %tx_hash, nonce = %nonce, gas_price = %gas_price, "Signed ETH transfer");

        SignedTransfer::new(Chain::Eth, tx_hash, raw, to_u128(fee, "Fee")?)
    }

    async fn submit(&self, signed: SignedTransfer) -> Result<SubmittedTransfer> {
        let pending_tx = self.provider
            .send_raw_transaction(Bytes::from(signed.raw_tx.clone())).await
            .map_err(|e| AppError::Broadcast(format!("eth_sendRawTransaction failed: {}", e)))?;

        let tx_hash = format!("{:?}", pending_tx.tx_hash());
        if tx_hash != signed.tx_hash {
            tracing::warn!(expected = %signed.tx_hash, returned = %tx_hash, "Node returned a different tx hash");
        }

        signed.into_submitted(tx_hash)
    }

    async fn confirmation_status(&self, tx_hash: &str) -> Result<TxStatus> {
        let hash: H256 = tx_hash
            .parse()
            .map_err(|_| AppError::InvalidInput(format!("Invalid tx hash: {}", tx_hash)))?;

        let receipt = self.provider
            .get_transaction_receipt(hash).await
            .map_err(|e| AppError::Rpc(format!("Failed to get receipt: {}", e)))?;

        Ok(match receipt.and_then(|r| r.status) {
            Some(status) if status == U64::from(1u64) => TxStatus::Confirmed,
            Some(_) => TxStatus::Failed,
            None => TxStatus::Pending,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Unroutable endpoint; tests below must fail before any request is made.
    fn offline_adapter() -> EvmAdapter {
        EvmAdapter::new("http://127.0.0.1:9", 11155111).unwrap()
    }

    #[test]
    fn test_rejects_malformed_rpc_url() {
        assert!(matches!(EvmAdapter::new("not a url", 1), Err(AppError::Rpc(_))));
    }

    #[tokio::test]
    async fn test_invalid_destination_fails_before_network() {
        let adapter = offline_adapter();
        let pair = adapter.generate_key_pair().unwrap();

        let request = TransferRequest {
            from: pair.address.clone(),
            to: "not-an-address".to_string(),
            amount: 1,
            fee_hint: Some(1),
        };

        let result = adapter.build_and_sign_transfer(&pair.private_key, &request).await;
        assert!(matches!(result, Err(AppError::InvalidAddress)));
    }

    #[tokio::test]
    async fn test_key_must_match_sender() {
        let adapter = offline_adapter();
        let pair = adapter.generate_key_pair().unwrap();
        let other = adapter.generate_key_pair().unwrap();

        let request = TransferRequest {
            from: other.address.clone(),
            to: pair.address.clone(),
            amount: 1,
            fee_hint: Some(1),
        };

        let result = adapter.build_and_sign_transfer(&pair.private_key, &request).await;
        assert!(matches!(result, Err(AppError::InvalidPrivateKey)));
    }
}
