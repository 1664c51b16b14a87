pub mod locks;
pub mod transfer_service;
pub mod wallet_service;

pub use locks::WalletLocks;
pub use transfer_service::TransferService;
pub use wallet_service::WalletService;
