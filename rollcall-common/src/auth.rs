//! Principals and credential verification
//!
//! Every request acts as exactly one [`Principal`]: a student, a faculty member
//! or an administrator. Passwords are stored as salted SHA-256 digests in the
//! `credentials` table, keyed by `(role, principal_id)`.
//!
//! The HTTP layer only sees the [`CredentialVerifier`] trait, so a different
//! identity provider can replace [`SqliteCredentialVerifier`] without touching
//! request handling.

use crate::time::{format_timestamp, Clock, SystemClock};
use crate::{Error, Result};
use async_trait::async_trait;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::{Sqlite, SqlitePool};
use std::fmt;
use std::str::FromStr;

// ========================================
// Roles and principals
// ========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Faculty,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Faculty => "faculty",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "faculty" => Ok(Role::Faculty),
            "admin" => Ok(Role::Admin),
            other => Err(Error::InvalidInput(format!("Unknown role: {}", other))),
        }
    }
}

/// Authenticated caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", content = "id", rename_all = "lowercase")]
pub enum Principal {
    /// Enrollment number
    Student(String),
    /// Faculty id
    Faculty(String),
    Admin(String),
}

impl Principal {
    pub fn role(&self) -> Role {
        match self {
            Principal::Student(_) => Role::Student,
            Principal::Faculty(_) => Role::Faculty,
            Principal::Admin(_) => Role::Admin,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Principal::Student(id) | Principal::Faculty(id) | Principal::Admin(id) => id,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Principal::Admin(_))
    }

    fn from_parts(role: Role, id: String) -> Self {
        match role {
            Role::Student => Principal::Student(id),
            Role::Faculty => Principal::Faculty(id),
            Role::Admin => Principal::Admin(id),
        }
    }
}

/// Credentials presented by a caller
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub role: Role,
    pub id: String,
    pub password: String,
}

// Keep passwords out of logs
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("role", &self.role)
            .field("id", &self.id)
            .field("password", &"<redacted>")
            .finish()
    }
}

// ========================================
// Verification seam
// ========================================

/// Resolves presented credentials to a principal
///
/// `Ok(None)` means the credentials were well-formed but wrong; `Err` is
/// reserved for infrastructure failures.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify(&self, credentials: &Credentials) -> Result<Option<Principal>>;
}

/// Verifier backed by the `credentials` table
#[derive(Clone)]
pub struct SqliteCredentialVerifier {
    db: SqlitePool,
}

impl SqliteCredentialVerifier {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CredentialVerifier for SqliteCredentialVerifier {
    async fn verify(&self, credentials: &Credentials) -> Result<Option<Principal>> {
        let row: Option<(String, String)> = sqlx::query_as(
            "SELECT password_hash, password_salt FROM credentials WHERE role = ? AND principal_id = ?",
        )
        .bind(credentials.role.as_str())
        .bind(&credentials.id)
        .fetch_optional(&self.db)
        .await?;

        let Some((stored_hash, salt)) = row else {
            return Ok(None);
        };

        let presented = hash_password(&credentials.password, &salt);
        if constant_time_eq(presented.as_bytes(), stored_hash.as_bytes()) {
            Ok(Some(Principal::from_parts(
                credentials.role,
                credentials.id.clone(),
            )))
        } else {
            Ok(None)
        }
    }
}

// ========================================
// Credential storage
// ========================================

/// Create or replace the password for `(role, id)`
pub async fn set_password(db: &SqlitePool, role: Role, id: &str, password: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(Error::InvalidInput("Principal id must not be empty".to_string()));
    }
    if password.is_empty() {
        return Err(Error::InvalidInput("Password must not be empty".to_string()));
    }

    let salt = generate_salt();
    let hash = hash_password(password, &salt);

    sqlx::query(
        r#"
        INSERT INTO credentials (role, principal_id, password_hash, password_salt, updated_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(role, principal_id) DO UPDATE SET
            password_hash = excluded.password_hash,
            password_salt = excluded.password_salt,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(role.as_str())
    .bind(id)
    .bind(&hash)
    .bind(&salt)
    .bind(format_timestamp(&SystemClock.now()))
    .execute(db)
    .await?;

    Ok(())
}

/// Remove the credential for `(role, id)`, if any
///
/// Takes any executor so roster deletes can run it inside their transaction.
pub async fn delete_credentials<'e, E>(executor: E, role: Role, id: &str) -> Result<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query("DELETE FROM credentials WHERE role = ? AND principal_id = ?")
        .bind(role.as_str())
        .bind(id)
        .execute(executor)
        .await?;
    Ok(())
}

/// SHA-256 of `salt || password`, as 64 hex characters
pub fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// 16 random bytes, hex encoded
pub fn generate_salt() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Comparison whose running time does not depend on where the inputs differ
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
