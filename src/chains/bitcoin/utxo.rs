//! Coin selection and transaction layout for P2WPKH spends.

use bitcoin::{ TxIn, TxOut };
use serde::Deserialize;

use crate::error::{ AppError, Result };
use crate::units::format_units;

/// Smallest P2WPKH output relayed under default policy.
pub const DUST_LIMIT_SATS: u64 = 294;

// vsize components: version/locktime/counts/segwit marker, one P2WPKH
// input with witness, one P2WPKH output.
const TX_OVERHEAD_VBYTES: u64 = 11;
const INPUT_VBYTES: u64 = 68;
const OUTPUT_VBYTES: u64 = 31;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Utxo {
    pub txid: String,
    pub vout: u32,
    pub value: u64,
    pub status: UtxoStatus,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UtxoStatus {
    pub confirmed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoinSelection {
    pub inputs: Vec<Utxo>,
    pub fee: u64,
    /// Zero when the leftover was below dust and went to the fee.
    pub change: u64,
}

impl CoinSelection {
    pub fn total_in(&self) -> u64 {
        self.inputs.iter().map(|u| u.value).sum()
    }
}

pub fn estimate_vsize(inputs: usize, outputs: usize) -> u64 {
    TX_OVERHEAD_VBYTES + INPUT_VBYTES * (inputs as u64) + OUTPUT_VBYTES * (outputs as u64)
}

pub fn fee_for(inputs: usize, outputs: usize, fee_rate: f64) -> u64 {
    ((estimate_vsize(inputs, outputs) as f64) * fee_rate).ceil() as u64
}

/// Largest-first selection over confirmed outputs.
///
/// Adds outputs in descending value until the amount plus fee is covered,
/// then decides whether a change output is worth creating.
pub fn select_largest_first(utxos: &[Utxo], amount: u64, fee_rate: f64) -> Result<CoinSelection> {
    if amount < DUST_LIMIT_SATS {
        return Err(
            AppError::InvalidInput(
                format!("Amount is below the dust limit of {} sats", DUST_LIMIT_SATS)
            )
        );
    }
    if !fee_rate.is_finite() || fee_rate <= 0.0 {
        return Err(AppError::InvalidInput(format!("Invalid fee rate: {}", fee_rate)));
    }

    let mut candidates: Vec<&Utxo> = utxos
        .iter()
        .filter(|u| u.status.confirmed)
        .collect();
    candidates.sort_by(|a, b| b.value.cmp(&a.value));

    let mut selected = Vec::new();
    let mut total: u64 = 0;

    for utxo in candidates {
        selected.push(utxo.clone());
        total = total.saturating_add(utxo.value);

        let n = selected.len();
        let fee_without_change = fee_for(n, 1, fee_rate);
        if total < amount.saturating_add(fee_without_change) {
            continue;
        }

        let fee_with_change = fee_for(n, 2, fee_rate);
        let leftover = total.saturating_sub(amount).saturating_sub(fee_with_change);
        if total >= amount.saturating_add(fee_with_change) && leftover >= DUST_LIMIT_SATS {
            return Ok(CoinSelection {
                inputs: selected,
                fee: fee_with_change,
                change: leftover,
            });
        }

        return Ok(CoinSelection {
            inputs: selected,
            fee: total - amount,
            change: 0,
        });
    }

    let needed = amount.saturating_add(fee_for(selected.len().max(1), 1, fee_rate));
    Err(AppError::InsufficientFunds {
        requested: format_units(needed as u128, 8),
        available: format_units(total as u128, 8),
    })
}

/// BIP69: inputs by previous txid (display order) then vout.
pub fn sort_inputs_bip69(inputs: &mut [TxIn]) {
    inputs.sort_by(|a, b| {
        a.previous_output.txid
            .to_string()
            .cmp(&b.previous_output.txid.to_string())
            .then_with(|| a.previous_output.vout.cmp(&b.previous_output.vout))
    });
}

/// BIP69: outputs by value then scriptPubKey bytes.
pub fn sort_outputs_bip69(outputs: &mut [TxOut]) {
    outputs.sort_by(|a, b| {
        a.value
            .cmp(&b.value)
            .then_with(|| a.script_pubkey.as_bytes().cmp(b.script_pubkey.as_bytes()))
    });
}
