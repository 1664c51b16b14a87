pub mod wallet;
pub mod transaction;

pub use wallet::Entity as Wallet;
pub use transaction::Entity as Transaction;
