use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

// ─── Chain ───────────────────────────────────────────────────────────

/// Supported blockchain networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Chain {
    Eth,
    Btc,
    Solana,
}

impl Chain {
    /// Canonical string stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Chain::Eth => "ETH",
            Chain::Btc => "BTC",
            Chain::Solana => "SOLANA",
        }
    }

    /// Native token symbol for the chain.
    pub fn native_symbol(&self) -> &'static str {
        match self {
            Chain::Eth => "ETH",
            Chain::Btc => "BTC",
            Chain::Solana => "SOL",
        }
    }

    /// Number of decimals between the native unit and the smallest unit
    /// (wei, satoshi, lamport).
    pub fn decimals(&self) -> u8 {
        match self {
            Chain::Eth => 18,
            Chain::Btc => 8,
            Chain::Solana => 9,
        }
    }

    /// EVM chain ID. Returns None for non-EVM chains.
    pub fn chain_id(&self, testnet: bool) -> Option<u64> {
        match (self, testnet) {
            (Chain::Eth, false) => Some(1),
            (Chain::Eth, true) => Some(11155111), // Sepolia
            (Chain::Btc, _) => None,
            (Chain::Solana, _) => None,
        }
    }

    /// Upper bound for a single network round trip on this chain.
    pub fn transaction_timeout(&self) -> Duration {
        match self {
            Chain::Eth => Duration::from_secs(5 * 60),
            Chain::Btc => Duration::from_secs(10 * 60),
            Chain::Solana => Duration::from_secs(60),
        }
    }

    /// Default block explorer URL.
    pub fn explorer_url(&self, testnet: bool) -> &'static str {
        match (self, testnet) {
            (Chain::Eth, false) => "https://etherscan.io",
            (Chain::Eth, true) => "https://sepolia.etherscan.io",
            (Chain::Btc, false) => "https://blockstream.info",
            (Chain::Btc, true) => "https://blockstream.info/testnet",
            (Chain::Solana, false) => "https://explorer.solana.com",
            (Chain::Solana, true) => "https://explorer.solana.com/?cluster=devnet",
        }
    }

    /// Human-readable display name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Chain::Eth => "Ethereum",
            Chain::Btc => "Bitcoin",
            Chain::Solana => "Solana",
        }
    }

    pub fn all() -> &'static [Chain] {
        &[Chain::Eth, Chain::Btc, Chain::Solana]
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Chain {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ETH" | "ETHEREUM" => Ok(Chain::Eth),
            "BTC" | "BITCOIN" => Ok(Chain::Btc),
            "SOLANA" | "SOL" => Ok(Chain::Solana),
            _ => Err(AppError::UnsupportedChain(s.to_string())),
        }
    }
}

// ─── TransactionStatus ──────────────────────────────────────────────

/// Status of a blockchain transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxStatus {
    Pending,
    Confirmed,
    Failed,
}

impl TxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxStatus::Pending => "pending",
            TxStatus::Confirmed => "confirmed",
            TxStatus::Failed => "failed",
        }
    }

    /// Pending may settle into confirmed or failed; settled states are final.
    pub fn can_transition_to(&self, next: TxStatus) -> bool {
        matches!((self, next), (TxStatus::Pending, TxStatus::Confirmed | TxStatus::Failed))
    }

    pub fn is_final(&self) -> bool {
        !matches!(self, TxStatus::Pending)
    }

    /// Stage reached by a broadcast transfer whose record has this status.
    pub fn transfer_stage(&self) -> TransferStage {
        match self {
            TxStatus::Pending => TransferStage::Submitted,
            TxStatus::Confirmed => TransferStage::Confirmed,
            TxStatus::Failed => TransferStage::Failed,
        }
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TxStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(TxStatus::Pending),
            "confirmed" => Ok(TxStatus::Confirmed),
            "failed" => Ok(TxStatus::Failed),
            _ => Err(AppError::InvalidInput(format!("Invalid tx status: {}", s))),
        }
    }
}

// ─── TxDirection ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxDirection {
    Send,
    Receive,
}

impl TxDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxDirection::Send => "send",
            TxDirection::Receive => "receive",
        }
    }
}

impl fmt::Display for TxDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TxDirection {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "send" => Ok(TxDirection::Send),
            "receive" => Ok(TxDirection::Receive),
            _ => Err(AppError::InvalidInput(format!("Invalid tx direction: {}", s))),
        }
    }
}

// ─── TransferStage ──────────────────────────────────────────────────

/// Lifecycle of an outgoing transfer inside a chain adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferStage {
    Built,
    Signed,
    Submitted,
    Confirmed,
    Failed,
}

impl TransferStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStage::Built => "built",
            TransferStage::Signed => "signed",
            TransferStage::Submitted => "submitted",
            TransferStage::Confirmed => "confirmed",
            TransferStage::Failed => "failed",
        }
    }

    /// Move to `next`, rejecting skipped or backward steps.
    pub fn advance(self, next: TransferStage) -> Result<TransferStage, AppError> {
        let allowed = matches!(
            (self, next),
            (TransferStage::Built, TransferStage::Signed) |
                (TransferStage::Signed, TransferStage::Submitted) |
                (TransferStage::Submitted, TransferStage::Confirmed | TransferStage::Failed)
        );

        if allowed {
            Ok(next)
        } else {
            Err(AppError::InvalidStatusTransition {
                from: self.as_str().to_string(),
                to: next.as_str().to_string(),
            })
        }
    }
}

impl fmt::Display for TransferStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_parsing() {
        assert_eq!("ethereum".parse::<Chain>().unwrap(), Chain::Eth);
        assert_eq!("BTC".parse::<Chain>().unwrap(), Chain::Btc);
        assert_eq!(" sol ".parse::<Chain>().unwrap(), Chain::Solana);
        assert!(matches!("dogecoin".parse::<Chain>(), Err(AppError::UnsupportedChain(_))));
    }

    #[test]
    fn test_chain_round_trips_through_storage_string() {
        for chain in Chain::all() {
            assert_eq!(chain.as_str().parse::<Chain>().unwrap(), *chain);
        }
    }

    #[test]
    fn test_decimals() {
        assert_eq!(Chain::Eth.decimals(), 18);
        assert_eq!(Chain::Btc.decimals(), 8);
        assert_eq!(Chain::Solana.decimals(), 9);
    }

    #[test]
    fn test_tx_status_never_moves_backward() {
        assert!(TxStatus::Pending.can_transition_to(TxStatus::Confirmed));
        assert!(TxStatus::Pending.can_transition_to(TxStatus::Failed));
        assert!(!TxStatus::Confirmed.can_transition_to(TxStatus::Pending));
        assert!(!TxStatus::Failed.can_transition_to(TxStatus::Confirmed));
        assert!(!TxStatus::Pending.can_transition_to(TxStatus::Pending));
    }

    #[test]
    fn test_transfer_stage_rejects_skips() {
        let stage = TransferStage::Built.advance(TransferStage::Signed).unwrap();
        let stage = stage.advance(TransferStage::Submitted).unwrap();
        assert_eq!(stage.advance(TransferStage::Confirmed).unwrap(), TransferStage::Confirmed);

        assert!(TransferStage::Built.advance(TransferStage::Submitted).is_err());
        assert!(TransferStage::Signed.advance(TransferStage::Confirmed).is_err());
        assert!(TransferStage::Confirmed.advance(TransferStage::Failed).is_err());
    }

    #[test]
    fn test_settled_status_ends_stage_machine() {
        let submitted = TxStatus::Pending.transfer_stage();
        assert_eq!(submitted, TransferStage::Submitted);

        for status in [TxStatus::Confirmed, TxStatus::Failed] {
            let stage = submitted.advance(status.transfer_stage()).unwrap();
            assert_eq!(stage.as_str(), status.as_str());
        }
    }
}
