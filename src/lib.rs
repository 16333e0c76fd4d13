//! TxVault - an in-memory key-value store with a line-oriented TCP protocol
//!
//! This library provides:
//! - A shared store with atomic increments
//! - A text command parser and dispatcher
//! - Per-connection MULTI/EXEC transactions
//! - A tokio TCP server and client

pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod protocol;
pub mod server;
pub mod session;
pub mod store;
pub mod transaction;

pub use client::Client;
pub use config::ServerConfig;
pub use error::{CommandError, Result, StoreError, TxVaultError};
pub use protocol::{Command, Reply};
pub use server::TxVaultServer;
pub use session::{Outcome, Session};
pub use store::{MemoryStore, Store};
pub use transaction::{TransactionId, TransactionTable};
