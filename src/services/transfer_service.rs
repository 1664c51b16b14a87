use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::config::NetworkPolicy;
use crate::db::{ entity::transaction, NewTransaction, TransactionRepository };
use crate::enums::{ Chain, TxDirection, TxStatus };
use crate::error::{ AppError, Result };
use crate::providers::TransferRequest;
use crate::rpc::AdapterRegistry;
use crate::services::locks::WalletLocks;
use crate::services::WalletService;
use crate::units::{ format_units, parse_units };

/// Transaction orchestrator: validates, signs, submits and tracks sends.
pub struct TransferService {
    wallets: Arc<WalletService>,
    transactions: Arc<TransactionRepository>,
    adapters: Arc<AdapterRegistry>,
    locks: Arc<WalletLocks>,
    policy: NetworkPolicy,
}

impl TransferService {
    pub fn new(
        wallets: Arc<WalletService>,
        transactions: Arc<TransactionRepository>,
        adapters: Arc<AdapterRegistry>,
        locks: Arc<WalletLocks>,
        policy: NetworkPolicy
    ) -> Self {
        Self {
            wallets,
            transactions,
            adapters,
            locks,
            policy,
        }
    }

    /// Sign and broadcast a native transfer of `amount` (native units) and
    /// record it as pending.
    ///
    /// Sends from the same wallet are serialized; the amount plus fee is
    /// held as a pending debit until the transaction settles.
    pub async fn send_transfer(
        &self,
        wallet_id: Uuid,
        to_address: &str,
        amount: &str,
        fee_hint: Option<u64>
    ) -> Result<transaction::Model> {
        let wallet = self.wallets.get_wallet(wallet_id).await?;
        let chain = wallet.chain()?;
        let adapter = self.adapters.get_adapter(chain).await?;

        let to_address = to_address.trim();
        if !adapter.validate_address(to_address) {
            return Err(AppError::InvalidAddress);
        }

        let decimals = chain.decimals();
        let amount_units = parse_units(amount, decimals)?;
        if amount_units == 0 {
            return Err(AppError::InvalidInput("Amount must be greater than zero".to_string()));
        }

        let _guard = self.locks.acquire(wallet_id).await;

        // Re-read under the lock so pending debits from earlier sends count
        let wallet = self.wallets.get_wallet(wallet_id).await?;
        let available = wallet.available_units()?;
        if amount_units > available {
            return Err(AppError::InsufficientFunds {
                requested: format_units(amount_units, decimals),
                available: format_units(available, decimals),
            });
        }

        let request = TransferRequest {
            from: wallet.address.clone(),
            to: to_address.to_string(),
            amount: amount_units,
            fee_hint,
        };

        let timeout = self.policy.timeout(chain);
        let signed = {
            let private_key = self.wallets.decrypt_private_key(&wallet)?;
            with_timeout(chain, timeout, "signing", adapter.build_and_sign_transfer(&private_key, &request)).await.map_err(
                AppError::transfer_failed
            )?
        };

        let required = amount_units.saturating_add(signed.fee);
        if required > available {
            return Err(AppError::InsufficientFunds {
                requested: format_units(required, decimals),
                available: format_units(available, decimals),
            });
        }

        let fee = signed.fee;
        let submitted = with_timeout(chain, timeout, "broadcast", adapter.submit(signed)).await.map_err(
            AppError::transfer_failed
        )?;

        let pending_debit = wallet.pending_units()?.saturating_add(required);
        let record = self.transactions
            .record_send(
                NewTransaction {
                    wallet_id,
                    chain,
                    direction: TxDirection::Send,
                    amount: format_units(amount_units, decimals),
                    fee: format_units(fee, decimals),
                    from_address: wallet.address.clone(),
                    to_address: to_address.to_string(),
                    tx_hash: submitted.tx_hash.clone(),
                },
                format_units(pending_debit, decimals)
            ).await
            .inspect_err(|e| {
                tracing::error!(
                    wallet_id = %wallet_id,
                    tx_hash = %submitted.tx_hash,
                    error = %e,
                    "Transfer broadcast but not recorded"
                );
            })?;

        tracing::info!(
            wallet_id = %wallet_id,
            chain = %chain,
            tx_hash = %record.tx_hash,
            amount = %record.amount,
            fee = %record.fee,
            "Transfer submitted"
        );

        Ok(record)
    }

    pub async fn get_transaction(&self, tx_id: Uuid) -> Result<transaction::Model> {
        self.transactions.find_by_id(tx_id).await
    }

    /// Newest first.
    pub async fn list_transactions(
        &self,
        wallet_id: Uuid,
        limit: Option<u64>,
        offset: Option<u64>
    ) -> Result<Vec<transaction::Model>> {
        self.wallets.get_wallet(wallet_id).await?;
        self.transactions.find_by_wallet_id(wallet_id, limit, offset).await
    }

    /// Settle a pending transaction. Setting the current status again is a
    /// no-op; any other move out of a final state is rejected.
    pub async fn update_transaction_status(
        &self,
        tx_id: Uuid,
        status: TxStatus
    ) -> Result<transaction::Model> {
        let tx = self.transactions.find_by_id(tx_id).await?;
        let _guard = self.locks.acquire(tx.wallet_id).await;

        // Re-read under the lock so a debit is released at most once
        let tx = self.transactions.find_by_id(tx_id).await?;
        let current = tx.status()?;
        if current == status {
            return Ok(tx);
        }
        if !current.can_transition_to(status) {
            return Err(AppError::InvalidStatusTransition {
                from: current.to_string(),
                to: status.to_string(),
            });
        }

        if tx.direction.parse::<TxDirection>()? != TxDirection::Send {
            return self.transactions.update_status(tx_id, status).await;
        }

        let stage = current.transfer_stage().advance(status.transfer_stage())?;
        let wallet = self.wallets.get_wallet(tx.wallet_id).await?;
        let decimals = wallet.chain()?.decimals();
        let debit = parse_units(&tx.amount, decimals)?.saturating_add(parse_units(&tx.fee, decimals)?);
        let pending_debit = wallet.pending_units()?.saturating_sub(debit);

        let updated = self.transactions.settle_send(
            tx_id,
            status,
            wallet.id,
            format_units(pending_debit, decimals)
        ).await?;

        tracing::info!(
            tx_id = %tx_id,
            wallet_id = %wallet.id,
            tx_hash = %updated.tx_hash,
            stage = %stage,
            "Transaction settled"
        );
        Ok(updated)
    }

    /// Ask the chain about a pending transaction and apply the answer.
    /// Query failures leave the record untouched.
    pub async fn sync_transaction_status(&self, tx_id: Uuid) -> Result<transaction::Model> {
        let tx = self.transactions.find_by_id(tx_id).await?;
        if tx.status()?.is_final() {
            return Ok(tx);
        }

        let chain: Chain = tx.chain.parse()?;
        let adapter = self.adapters.get_adapter(chain).await?;

        let timeout = self.policy.timeout(chain);
        let status = match with_timeout(chain, timeout, "status query", adapter.confirmation_status(&tx.tx_hash)).await {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(tx_id = %tx_id, tx_hash = %tx.tx_hash, error = %e, "Status query failed");
                return Ok(tx);
            }
        };

        match status {
            TxStatus::Pending => Ok(tx),
            settled => self.update_transaction_status(tx_id, settled).await,
        }
    }
}

async fn with_timeout<T>(
    chain: Chain,
    timeout: Duration,
    stage: &str,
    fut: impl Future<Output = Result<T>>
) -> Result<T> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) =>
            Err(AppError::Broadcast(format!("{} {} timed out after {}s", chain, stage, timeout.as_secs()))),
    }
}
