//! Startup seeding of the first super admin.

use anyhow::{anyhow, Context, Result};
use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use tracing::info;

use super::password::{hash_password, valid_password};
use super::storage::insert_super_admin;
use super::utils::{normalize_email, valid_email};

pub const DEFAULT_ADMIN_NAME: &str = "Super Admin";

/// Credentials for the bootstrap super admin.
#[derive(Debug, Clone)]
pub struct BootstrapAdmin {
    email: String,
    password: SecretString,
    name: String,
}

impl BootstrapAdmin {
    /// # Errors
    /// Returns an error for a malformed email or a too short password.
    pub fn new(email: &str, password: SecretString) -> Result<Self> {
        let email = normalize_email(email);
        if !valid_email(&email) {
            return Err(anyhow!("invalid bootstrap admin email: {email}"));
        }
        if !valid_password(password.expose_secret()) {
            return Err(anyhow!("bootstrap admin password is too short"));
        }
        Ok(Self {
            email,
            password,
            name: DEFAULT_ADMIN_NAME.to_string(),
        })
    }

    #[must_use]
    pub fn with_name(mut self, name: &str) -> Self {
        let name = name.trim();
        if !name.is_empty() {
            self.name = name.to_string();
        }
        self
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Create the super admin unless an account with the email already exists.
///
/// Returns `true` when a new account was created.
///
/// # Errors
/// Returns an error if hashing or the insert fails.
pub async fn seed_super_admin(pool: &PgPool, admin: &BootstrapAdmin) -> Result<bool> {
    let hashed = hash_password(admin.password.expose_secret().to_string()).await?;
    let created = insert_super_admin(pool, &admin.name, &admin.email, &hashed)
        .await
        .context("failed to seed bootstrap super admin")?;
    if created {
        info!(email = %admin.email, "bootstrap super admin created");
    } else {
        info!(email = %admin.email, "bootstrap super admin already present");
    }
    Ok(created)
}
