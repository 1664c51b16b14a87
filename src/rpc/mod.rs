pub mod manager;

pub use manager::AdapterRegistry;
