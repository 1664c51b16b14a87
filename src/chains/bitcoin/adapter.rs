use async_trait::async_trait;
use bitcoin::absolute::LockTime;
use bitcoin::consensus::encode;
use bitcoin::ecdsa::Signature as EcdsaSignature;
use bitcoin::hashes::Hash;
use bitcoin::secp256k1::{ Message, Secp256k1 };
use bitcoin::sighash::{ EcdsaSighashType, SighashCache };
use bitcoin::transaction::Version;
use bitcoin::{
    Address,
    Amount,
    CompressedPublicKey,
    OutPoint,
    ScriptBuf,
    Sequence,
    Transaction,
    TxIn,
    TxOut,
    Txid,
    Witness,
};
use secrecy::{ ExposeSecret, SecretSlice };
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use crate::enums::{ Chain, TxStatus };
use crate::error::{ AppError, Result };
use crate::providers::{
    ChainAdapter,
    KeyPair,
    SignedTransfer,
    SubmittedTransfer,
    TransferRequest,
};

use super::utxo::{ self, Utxo };
use super::wallet;

/// Used when the fee estimate endpoint is unavailable.
pub const FALLBACK_FEE_RATE: f64 = 10.0;
/// Confirmation target (blocks) read from `/fee-estimates`.
const FEE_TARGET_BLOCKS: &str = "6";

#[derive(Clone)]
pub struct BitcoinAdapter {
    client: reqwest::Client,
    base_url: String,
    testnet: bool,
}

// ── Esplora API response types ──────────────────────────────────────

#[derive(Debug, Deserialize)]
struct EsploraAddressStats {
    funded_txo_sum: u64,
    spent_txo_sum: u64,
}

#[derive(Debug, Deserialize)]
struct EsploraAddress {
    chain_stats: EsploraAddressStats,
    mempool_stats: EsploraAddressStats,
}

#[derive(Debug, Deserialize)]
struct EsploraTxStatus {
    confirmed: bool,
}

// ── Implementation ──────────────────────────────────────────────────

impl BitcoinAdapter {
    pub fn new(base_url: &str, testnet: bool) -> Result<Self> {
        let client = reqwest::Client
            ::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| AppError::Rpc(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            testnet,
        })
    }

    async fn get_utxos(&self, address: &str) -> Result<Vec<Utxo>> {
        let url = format!("{}/address/{}/utxo", self.base_url, address);
        let resp = self.client
            .get(&url)
            .send().await
            .map_err(|e| AppError::Rpc(format!("Esplora request failed: {}", e)))?;

        if !resp.status().is_success() {
            return Err(AppError::Rpc(format!("Esplora API error: {}", resp.status())));
        }

        resp.json().await.map_err(|e| AppError::Rpc(format!("Failed to parse UTXOs: {}", e)))
    }

    async fn get_fee_rate(&self) -> f64 {
        let url = format!("{}/fee-estimates", self.base_url);
        let estimates = match self.client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() =>
                resp.json::<HashMap<String, f64>>().await.unwrap_or_default(),
            Ok(resp) => {
                tracing::warn!(status = %resp.status(), "Fee estimate request rejected, using fallback");
                HashMap::new()
            }
            Err(e) => {
                tracing::warn!(error = %e, "Fee estimate request failed, using fallback");
                HashMap::new()
            }
        };

        estimates.get(FEE_TARGET_BLOCKS).copied().unwrap_or(FALLBACK_FEE_RATE)
    }

    /// Assemble, order and sign a P2WPKH spend.
    fn sign_spend(
        &self,
        secret: &[u8],
        from: &Address,
        to: &Address,
        amount: u64,
        selection: &utxo::CoinSelection
    ) -> Result<Transaction> {
        let secp = Secp256k1::new();
        let secret_key = wallet::secret_key_from_bytes(secret)?;
        let public_key = CompressedPublicKey(secret_key.public_key(&secp));

        let own_script = ScriptBuf::new_p2wpkh(&public_key.wpubkey_hash());
        if own_script != from.script_pubkey() {
            return Err(AppError::InvalidPrivateKey);
        }

        let mut input = selection.inputs
            .iter()
            .map(|u| {
                let txid = Txid::from_str(&u.txid).map_err(|_|
                    AppError::Rpc(format!("Esplora returned invalid txid {}", u.txid))
                )?;
                Ok(TxIn {
                    previous_output: OutPoint { txid, vout: u.vout },
                    script_sig: ScriptBuf::new(),
                    sequence: Sequence::ENABLE_RBF_NO_LOCKTIME,
                    witness: Witness::default(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut output = vec![TxOut {
            value: Amount::from_sat(amount),
            script_pubkey: to.script_pubkey(),
        }];
        if selection.change > 0 {
            output.push(TxOut {
                value: Amount::from_sat(selection.change),
                script_pubkey: own_script.clone(),
            });
        }

        utxo::sort_inputs_bip69(&mut input);
        utxo::sort_outputs_bip69(&mut output);

        let mut tx = Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input,
            output,
        };

        // Every input spends our own P2WPKH output; look values up by outpoint
        let values: HashMap<(String, u32), u64> = selection.inputs
            .iter()
            .map(|u| ((u.txid.clone(), u.vout), u.value))
            .collect();

        let mut witnesses = Vec::with_capacity(tx.input.len());
        {
            let mut cache = SighashCache::new(&tx);
            for (index, txin) in tx.input.iter().enumerate() {
                let key = (txin.previous_output.txid.to_string(), txin.previous_output.vout);
                let value = values
                    .get(&key)
                    .copied()
                    .ok_or_else(|| AppError::Internal("Selected input vanished".to_string()))?;

                let sighash = cache
                    .p2wpkh_signature_hash(
                        index,
                        &own_script,
                        Amount::from_sat(value),
                        EcdsaSighashType::All
                    )
                    .map_err(|e| AppError::Chain(format!("Sighash computation failed: {}", e)))?;

                let message = Message::from_digest(sighash.to_byte_array());
                let signature = EcdsaSignature {
                    signature: secp.sign_ecdsa(&message, &secret_key),
                    sighash_type: EcdsaSighashType::All,
                };
                witnesses.push(Witness::p2wpkh(&signature, &public_key.0));
            }
        }

        for (txin, witness) in tx.input.iter_mut().zip(witnesses) {
            txin.witness = witness;
        }

        Ok(tx)
    }
}

#[async_trait]
impl ChainAdapter for BitcoinAdapter {
    fn chain(&self) -> Chain {
        Chain::Btc
    }

    fn generate_key_pair(&self) -> Result<KeyPair> {
        wallet::generate_key_pair(self.testnet)
    }

    fn derive_address(&self, public_key: &[u8]) -> Result<String> {
        wallet::derive_address(public_key, self.testnet)
    }

    fn validate_address(&self, address: &str) -> bool {
        wallet::validate_address(address, self.testnet)
    }

    async fn get_balance(&self, address: &str) -> Result<u128> {
        let url = format!("{}/address/{}", self.base_url, address);
        let resp = self.client
            .get(&url)
            .send().await
            .map_err(|e| AppError::BalanceQuery(format!("Esplora request failed: {}", e)))?;

        if !resp.status().is_success() {
            return Err(AppError::BalanceQuery(format!("Esplora API error: {}", resp.status())));
        }

        let addr_info: EsploraAddress = resp
            .json().await
            .map_err(|e| AppError::BalanceQuery(format!("Failed to parse address info: {}", e)))?;

        let confirmed_sats = addr_info.chain_stats.funded_txo_sum.saturating_sub(
            addr_info.chain_stats.spent_txo_sum
        );
        let funded_in_mempool = addr_info.mempool_stats.funded_txo_sum as i128;
        let spent_in_mempool = addr_info.mempool_stats.spent_txo_sum as i128;

        let total = (confirmed_sats as i128) + funded_in_mempool - spent_in_mempool;
        Ok(total.max(0) as u128)
    }

    async fn build_and_sign_transfer(
        &self,
        private_key: &SecretSlice<u8>,
        request: &TransferRequest
    ) -> Result<SignedTransfer> {
        let to = wallet::parse_address(&request.to, self.testnet)?;
        let from = wallet::parse_address(&request.from, self.testnet)?;

        let amount = u64::try_from(request.amount).map_err(|_|
            AppError::InvalidInput("Amount exceeds the Bitcoin supply".to_string())
        )?;

        let fee_rate = match request.fee_hint {
            Some(rate) => rate as f64,
            None => self.get_fee_rate().await,
        };

        let utxos = self.get_utxos(&request.from).await?;
        let selection = utxo::select_largest_first(&utxos, amount, fee_rate)?;

        let tx = self.sign_spend(private_key.expose_secret(), &from, &to, amount, &selection)?;
        let tx_hash = tx.compute_txid().to_string();

        tracing::debug!(
            tx_hash = %tx_hash,
            inputs = selection.inputs.len(),
            fee_sats = selection.fee,
            fee_rate,
            "Signed BTC transfer"
        );

        SignedTransfer::new(Chain::Btc, tx_hash, encode::serialize(&tx), selection.fee as u128)
    }

    async fn submit(&self, signed: SignedTransfer) -> Result<SubmittedTransfer> {
        let url = format!("{}/tx", self.base_url);
        let resp = self.client
            .post(&url)
            .body(hex::encode(&signed.raw_tx))
            .send().await
            .map_err(|e| AppError::Broadcast(format!("Esplora broadcast failed: {}", e)))?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(AppError::Broadcast(format!("Esplora rejected transaction ({}): {}", status, body)));
        }

        let txid = body.trim().to_string();
        let tx_hash = if txid.is_empty() { signed.tx_hash.clone() } else { txid };
        signed.into_submitted(tx_hash)
    }

    async fn confirmation_status(&self, tx_hash: &str) -> Result<TxStatus> {
        let url = format!("{}/tx/{}/status", self.base_url, tx_hash);
        let resp = self.client
            .get(&url)
            .send().await
            .map_err(|e| AppError::Rpc(format!("Esplora request failed: {}", e)))?;

        // Esplora drops evicted transactions; an unknown txid is not a failure yet
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(TxStatus::Pending);
        }
        if !resp.status().is_success() {
            return Err(AppError::Rpc(format!("Esplora API error: {}", resp.status())));
        }

        let status: EsploraTxStatus = resp
            .json().await
            .map_err(|e| AppError::Rpc(format!("Failed to parse tx status: {}", e)))?;

        Ok(if status.confirmed { TxStatus::Confirmed } else { TxStatus::Pending })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::utxo::UtxoStatus;
    use bitcoin::consensus::deserialize;

    fn adapter() -> BitcoinAdapter {
        BitcoinAdapter::new("http://127.0.0.1:9/api/", true).unwrap()
    }

    #[test]
    fn test_base_url_is_normalized() {
        assert_eq!(adapter().base_url, "http://127.0.0.1:9/api");
    }

    #[tokio::test]
    async fn test_invalid_destination_fails_before_network() {
        let adapter = adapter();
        let pair = adapter.generate_key_pair().unwrap();

        let request = TransferRequest {
            from: pair.address.clone(),
            to: "not-an-address".to_string(),
            amount: 10_000,
            fee_hint: Some(1),
        };

        let result = adapter.build_and_sign_transfer(&pair.private_key, &request).await;
        assert!(matches!(result, Err(AppError::InvalidAddress)));
    }

    #[tokio::test]
    async fn test_mainnet_destination_rejected_on_testnet() {
        let adapter = adapter();
        let pair = adapter.generate_key_pair().unwrap();

        let request = TransferRequest {
            from: pair.address.clone(),
            to: "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4".to_string(),
            amount: 10_000,
            fee_hint: Some(1),
        };

        let result = adapter.build_and_sign_transfer(&pair.private_key, &request).await;
        assert!(matches!(result, Err(AppError::InvalidAddress)));
    }

    #[test]
    fn test_sign_spend_produces_valid_witnesses() {
        let adapter = adapter();
        let sender = adapter.generate_key_pair().unwrap();
        let recipient = adapter.generate_key_pair().unwrap();

        let from = wallet::parse_address(&sender.address, true).unwrap();
        let to = wallet::parse_address(&recipient.address, true).unwrap();

        let selection = utxo::CoinSelection {
            inputs: vec![
                Utxo {
                    txid: "26aa6e6d8b9e49bb0630aac301db6757c02e3619feb4ee0eea81eb1672947024".to_string(),
                    vout: 1,
                    value: 60_000,
                    status: UtxoStatus { confirmed: true },
                },
                Utxo {
                    txid: "0e53ec5dfb2cb8a71fec32dc9a634a35b7e24799295ddd5278217822e0b31f57".to_string(),
                    vout: 0,
                    value: 50_000,
                    status: UtxoStatus { confirmed: true },
                }
            ],
            fee: 300,
            change: 9_700,
        };

        let tx = adapter
            .sign_spend(sender.private_key.expose_secret(), &from, &to, 100_000, &selection)
            .unwrap();

        // BIP69 ordering
        assert_eq!(tx.input[0].previous_output.vout, 0);
        assert_eq!(tx.output[0].value, Amount::from_sat(9_700));
        assert_eq!(tx.output[1].script_pubkey, to.script_pubkey());

        // Serialization round trip preserves the txid
        let decoded: Transaction = deserialize(&encode::serialize(&tx)).unwrap();
        assert_eq!(decoded.compute_txid(), tx.compute_txid());

        // Each witness signature verifies against the BIP143 sighash
        let secp = Secp256k1::verification_only();
        let prevouts = [
            TxOut { value: Amount::from_sat(50_000), script_pubkey: from.script_pubkey() },
            TxOut { value: Amount::from_sat(60_000), script_pubkey: from.script_pubkey() },
        ];
        let mut cache = SighashCache::new(&tx);
        for (index, prevout) in prevouts.iter().enumerate() {
            let witness = &tx.input[index].witness;
            assert_eq!(witness.len(), 2);

            let signature = EcdsaSignature::from_slice(witness.nth(0).unwrap()).unwrap();
            let public_key = CompressedPublicKey::from_slice(witness.nth(1).unwrap()).unwrap();

            let sighash = cache
                .p2wpkh_signature_hash(index, &from.script_pubkey(), prevout.value, EcdsaSighashType::All)
                .unwrap();
            let message = Message::from_digest(sighash.to_byte_array());
            secp.verify_ecdsa(&message, &signature.signature, &public_key.0).unwrap();
        }
    }

    #[test]
    fn test_sign_spend_rejects_foreign_key() {
        let adapter = adapter();
        let sender = adapter.generate_key_pair().unwrap();
        let stranger = adapter.generate_key_pair().unwrap();

        let from = wallet::parse_address(&sender.address, true).unwrap();
        let selection = utxo::CoinSelection {
            inputs: vec![Utxo {
                txid: "26aa6e6d8b9e49bb0630aac301db6757c02e3619feb4ee0eea81eb1672947024".to_string(),
                vout: 0,
                value: 20_000,
                status: UtxoStatus { confirmed: true },
            }],
            fee: 200,
            change: 0,
        };

        let result = adapter.sign_spend(
            stranger.private_key.expose_secret(),
            &from,
            &from,
            19_800,
            &selection
        );
        assert!(matches!(result, Err(AppError::InvalidPrivateKey)));
    }
}
