use async_trait::async_trait;
use secrecy::{ ExposeSecret, SecretSlice };
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_commitment_config::CommitmentConfig;
use solana_sdk::{ signature::{ Signature, Signer }, transaction::Transaction };
use std::str::FromStr;
use std::sync::Arc;

use crate::chains::solana::wallet;
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

/// Base fee charged per transaction signature.
pub const LAMPORTS_PER_SIGNATURE: u64 = 5_000;
/// Rent-exempt minimum for a zero-data system account.
pub const RENT_EXEMPT_MINIMUM: u64 = 890_880;

#[derive(Clone)]
pub struct SolanaAdapter {
    client: Arc<RpcClient>,
}

impl SolanaAdapter {
    pub fn new(rpc_url: &str) -> Self {
        let client = RpcClient::new_with_commitment(
            rpc_url.to_string(),
            CommitmentConfig::confirmed()
        );

        Self { client: Arc::new(client) }
    }

    async fn lamports_of(&self, address: &str) -> Result<u64> {
        let pubkey = wallet::parse_address(address)?;

        self.client
            .get_balance(&pubkey).await
            .map_err(|e| AppError::BalanceQuery(format!("Failed to get balance: {}", e)))
    }
}

/// A system account must end a transfer either closed or rent exempt.
fn check_remaining_balance(balance: u64, amount: u64, fee: u64) -> Result<()> {
    let required = amount.saturating_add(fee);
    if required > balance {
        return Err(AppError::InsufficientFunds {
            requested: format_units(required as u128, 9),
            available: format_units(balance as u128, 9),
        });
    }

    let remaining = balance - required;
    if remaining != 0 && remaining < RENT_EXEMPT_MINIMUM {
        return Err(
            AppError::InvalidInput(
                format!(
                    "Transfer would leave {} SOL, below the rent-exempt minimum of {} SOL",
                    format_units(remaining as u128, 9),
                    format_units(RENT_EXEMPT_MINIMUM as u128, 9)
                )
            )
        );
    }

    Ok(())
}

#[async_trait]
impl ChainAdapter for SolanaAdapter {
    fn chain(&self) -> Chain {
        Chain::Solana
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
        Ok(self.lamports_of(address).await? as u128)
    }

    async fn build_and_sign_transfer(
        &self,
        private_key: &SecretSlice<u8>,
        request: &TransferRequest
    ) -> Result<SignedTransfer> {
        let to = wallet::parse_address(&request.to)?;
        let keypair = wallet::keypair_from_secret(private_key.expose_secret())?;
        if keypair.pubkey().to_string() != request.from {
            return Err(AppError::InvalidPrivateKey);
        }

        let lamports = u64::try_from(request.amount).map_err(|_|
            AppError::InvalidInput("Amount exceeds the SOL supply".to_string())
        )?;
        if lamports == 0 {
            return Err(AppError::InvalidInput("Amount must be greater than zero".to_string()));
        }

        // Single signer, so the base fee is fixed
        let fee = LAMPORTS_PER_SIGNATURE;

        let balance = self.lamports_of(&request.from).await?;
        check_remaining_balance(balance, lamports, fee)?;

        // A new recipient account must be funded up to the rent-exempt minimum
        if lamports < RENT_EXEMPT_MINIMUM && self.lamports_of(&request.to).await? == 0 {
            return Err(
                AppError::InvalidInput(
                    format!(
                        "Recipient account does not exist; send at least {} SOL",
                        format_units(RENT_EXEMPT_MINIMUM as u128, 9)
                    )
                )
            );
        }

        let instruction = solana_system_interface::instruction::transfer(
            &keypair.pubkey(),
            &to,
            lamports
        );

        let recent_blockhash = self.client
            .get_latest_blockhash().await
            .map_err(|e| AppError::Rpc(format!("Failed to get recent blockhash: {}", e)))?;

        let transaction = Transaction::new_signed_with_payer(
            &[instruction],
            Some(&keypair.pubkey()),
            &[&keypair],
            recent_blockhash
        );

        let tx_hash = transaction.signatures
            .first()
            .map(|s| s.to_string())
            .ok_or_else(|| AppError::Chain("Transaction was not signed".to_string()))?;
        let raw = bincode
            ::serialize(&transaction)
            .map_err(|e| AppError::Chain(format!("Failed to serialize transaction: {}", e)))?;

        tracing::debug!(tx_hash = %tx_hash, lamports, "Signed SOL transfer");

        SignedTransfer::new(Chain::Solana, tx_hash, raw, fee as u128)
    }

    async fn submit(&self, signed: SignedTransfer) -> Result<SubmittedTransfer> {
        let transaction: Transaction = bincode
            ::deserialize(&signed.raw_tx)
            .map_err(|e| AppError::Internal(format!("Corrupt signed transaction: {}", e)))?;

        let signature = self.client
            .send_transaction(&transaction).await
            .map_err(|e| AppError::Broadcast(format!("sendTransaction failed: {}", e)))?;

        signed.into_submitted(signature.to_string())
    }

    async fn confirmation_status(&self, tx_hash: &str) -> Result<TxStatus> {
        let signature = Signature::from_str(tx_hash).map_err(|_|
            AppError::InvalidInput(format!("Invalid signature: {}", tx_hash))
        )?;

        let statuses = self.client
            .get_signature_statuses(&[signature]).await
            .map_err(|e| AppError::Rpc(format!("Failed to get signature status: {}", e)))?;

        Ok(match statuses.value.into_iter().next().flatten() {
            Some(status) if status.err.is_some() => TxStatus::Failed,
            Some(status) if status.satisfies_commitment(CommitmentConfig::confirmed()) =>
                TxStatus::Confirmed,
            _ => TxStatus::Pending,
        })
    }
}
