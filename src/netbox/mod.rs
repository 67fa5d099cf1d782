pub mod client;
pub mod error;
pub mod store;
pub mod types;

pub use client::NetBoxClient;
pub use error::{StoreError, StoreResult};
pub use store::NetBoxStore;
