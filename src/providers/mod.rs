pub mod chain_adapter;

pub use chain_adapter::{ ChainAdapter, KeyPair, SignedTransfer, SubmittedTransfer, TransferRequest };
