pub mod adapter;
pub mod wallet;

pub use adapter::EvmAdapter;
