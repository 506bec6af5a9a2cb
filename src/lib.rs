//! A statement-driven JSON record store for user accounts.
//!
//! Statements are matched against a small set of pseudo-SQL shapes and run
//! against an in-memory document that is rewritten to disk after every
//! mutation.

pub mod accounts;
pub mod ast;
pub mod config;
pub mod database;
pub mod error;
pub mod executor;
pub mod matcher;
pub mod storage;

pub use accounts::{Accounts, FederatedProfile, NewAccount};
pub use ast::{Statement, Value};
pub use config::{Config, StoreConfig};
pub use database::{Record, Role, StoreDocument};
pub use error::{ConfigError, Result, StoreError};
pub use executor::{Outcome, RunResult, SharedStore, Store};
pub use storage::{JsonFileStorage, MemoryStorage, StorageEngine};

/// Match a statement without executing it.
pub fn prepare(sql: &str) -> Result<Statement> {
    matcher::parse(sql)
}
