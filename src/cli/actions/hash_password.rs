use crate::api::handlers::auth::password::{hash_password, valid_password, MIN_PASSWORD_LENGTH};
use anyhow::{anyhow, Result};
use secrecy::{ExposeSecret, SecretString};

#[derive(Debug)]
pub struct Args {
    pub password: SecretString,
}

/// bcrypt hash of `password` at the cost the server uses.
///
/// # Errors
/// Returns an error if the password is too short for the server to accept or
/// hashing fails.
pub async fn hash(args: Args) -> Result<String> {
    let password = args.password.expose_secret();
    if !valid_password(password) {
        return Err(anyhow!("password must be at least {MIN_PASSWORD_LENGTH} characters"));
    }
    hash_password(password.to_string()).await
}

/// Print the bcrypt hash of the given password to stdout.
/// # Errors
/// See [`hash`].
pub async fn execute(args: Args) -> Result<()> {
    println!("{}", hash(args).await?);
    Ok(())
}
