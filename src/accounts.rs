//! Account operations issued by the auth backend.
//!
//! Everything here goes through the statement interface of [`Store`], using
//! the same statements the web backend sends. Password hashing and token
//! issuance happen before these calls; credentials arrive already hashed.

use crate::ast::Value;
use crate::database::{Record, Role};
use crate::error::{Result, StoreError};
use crate::executor::Store;
use crate::storage::StorageEngine;
use log::info;

const CREATE_USERS: &str = "CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    email TEXT UNIQUE NOT NULL,
    password TEXT,
    name TEXT,
    google_id TEXT UNIQUE,
    role TEXT NOT NULL DEFAULT 'community',
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
    updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
)";
const SELECT_BY_ID: &str = "SELECT * FROM users WHERE id = ?";
const SELECT_BY_EMAIL: &str = "SELECT * FROM users WHERE email = ?";
const SELECT_BY_GOOGLE_ID: &str = "SELECT * FROM users WHERE google_id = ?";
const SELECT_ALL: &str =
    "SELECT id, email, name, role, created_at FROM users ORDER BY id DESC";
const INSERT_LOCAL: &str = "INSERT INTO users (email, password, name, role) VALUES (?, ?, ?, ?)";
const INSERT_FEDERATED: &str =
    "INSERT INTO users (email, name, google_id, role) VALUES (?, ?, ?, ?)";
const LINK_GOOGLE_ID: &str =
    "UPDATE users SET google_id = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?";
const UPDATE_ROLE: &str = "UPDATE users SET role = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?";
const UPDATE_PASSWORD: &str =
    "UPDATE users SET password = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?";

/// Email/password registration input.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub password_hash: String,
    pub name: Option<String>,
    pub role: Role,
}

/// What an external identity provider tells us about a user.
#[derive(Debug, Clone)]
pub struct FederatedProfile {
    pub subject: String,
    pub email: String,
    pub name: Option<String>,
}

pub struct Accounts<'a, S: StorageEngine> {
    store: &'a mut Store<S>,
}

impl<'a, S: StorageEngine> Accounts<'a, S> {
    pub fn new(store: &'a mut Store<S>) -> Result<Self> {
        store.run(CREATE_USERS, &[])?;
        Ok(Accounts { store })
    }

    pub fn find_by_id(&self, id: u64) -> Result<Option<Record>> {
        self.store.get(SELECT_BY_ID, &[id.into()])
    }

    pub fn find_by_email(&self, email: &str) -> Result<Option<Record>> {
        self.store.get(SELECT_BY_EMAIL, &[email.into()])
    }

    pub fn find_by_google_id(&self, subject: &str) -> Result<Option<Record>> {
        self.store.get(SELECT_BY_GOOGLE_ID, &[subject.into()])
    }

    /// Newest accounts first.
    pub fn list_users(&self) -> Result<Vec<Record>> {
        self.store.all(SELECT_ALL, &[])
    }

    /// Create an email/password account.
    ///
    /// Uniqueness is checked with a read before the write. The store itself
    /// does not enforce it, so concurrent callers must serialize through
    /// [`SharedStore::with`](crate::SharedStore::with).
    pub fn register(&mut self, account: NewAccount) -> Result<Record> {
        if self.find_by_email(&account.email)?.is_some() {
            return Err(StoreError::Conflict(format!(
                "email {} is already registered",
                account.email
            )));
        }

        let id = self.insert(
            INSERT_LOCAL,
            [
                account.email.into(),
                account.password_hash.into(),
                account.name.into(),
                account.role.as_str().into(),
            ],
        )?;
        info!("Registered user {} with role {}", id, account.role);
        self.require(id)
    }

    /// Resolve a provider callback to an account: match by subject, else
    /// link the subject to an account with the same email, else create one.
    pub fn find_or_create_federated(&mut self, profile: FederatedProfile) -> Result<Record> {
        if let Some(existing) = self.find_by_google_id(&profile.subject)? {
            return Ok(existing);
        }

        if let Some(existing) = self.find_by_email(&profile.email)? {
            self.store.run(
                LINK_GOOGLE_ID,
                &[profile.subject.as_str().into(), existing.id.into()],
            )?;
            info!("Linked external identity to user {}", existing.id);
            return self.require(existing.id);
        }

        let id = self.insert(
            INSERT_FEDERATED,
            [
                profile.email.into(),
                profile.name.into(),
                profile.subject.into(),
                Role::Community.as_str().into(),
            ],
        )?;
        info!("Created user {} from external identity", id);
        self.require(id)
    }

    pub fn set_role(&mut self, id: u64, role: Role) -> Result<Record> {
        self.update_one(UPDATE_ROLE, role.as_str().into(), id)?;
        info!("User {} role set to {}", id, role);
        self.require(id)
    }

    pub fn change_password(&mut self, id: u64, password_hash: &str) -> Result<Record> {
        self.update_one(UPDATE_PASSWORD, password_hash.into(), id)?;
        self.require(id)
    }

    fn insert<const N: usize>(&mut self, sql: &str, params: [Value; N]) -> Result<u64> {
        self.store
            .run(sql, &params)?
            .last_insert_id
            .ok_or_else(|| StoreError::unsupported("INSERT returned no id"))
    }

    fn update_one(&mut self, sql: &str, value: Value, id: u64) -> Result<()> {
        let result = self.store.run(sql, &[value, id.into()])?;
        if result.changes == 0 {
            return Err(StoreError::NotFound(format!("user {}", id)));
        }
        Ok(())
    }

    fn require(&self, id: u64) -> Result<Record> {
        self.find_by_id(id)?
            .ok_or_else(|| StoreError::NotFound(format!("user {}", id)))
    }
}
