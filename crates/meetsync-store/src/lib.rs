//! Credential vault and durable account registry.

pub mod accounts;
pub mod error;
pub mod vault;

pub use accounts::{AccountStore, NewAccount};
pub use error::{StoreError, StoreResult};
pub use vault::CredentialVault;
