pub mod app;
pub mod chains;
pub mod config;
pub mod crypto;
pub mod db;
pub mod enums;
pub mod error;
pub mod providers;
pub mod rpc;
pub mod services;
pub mod telemetry;
pub mod units;

#[cfg(test)]
mod testing;

pub use app::WalletCore;
pub use config::{ Config, NetworkPolicy };
pub use enums::{ Chain, TransferStage, TxDirection, TxStatus };
pub use error::{ AppError, Result };
