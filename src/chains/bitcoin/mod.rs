pub mod adapter;
pub mod utxo;
pub mod wallet;

pub use adapter::BitcoinAdapter;
