pub mod encryption;
pub mod key_store;
pub mod password;

pub use encryption::Encryptor;
pub use key_store::{ FileKeyStore, KeyStore, MemoryKeyStore };
pub use password::{ hash_password, verify_password };
