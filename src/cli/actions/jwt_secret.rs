use anyhow::{Context, Result};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};

/// Random bytes behind a generated secret (64 characters once encoded).
pub const SECRET_BYTES: usize = 48;

/// URL-safe base64 secret suitable for `--jwt-secret`.
///
/// # Errors
/// Returns an error if the OS random source fails.
pub fn generate() -> Result<String> {
    let mut bytes = [0u8; SECRET_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate JWT secret")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

/// Print a fresh secret to stdout.
/// # Errors
/// Returns an error if the OS random source fails.
pub fn execute() -> Result<()> {
    println!("{}", generate()?);
    Ok(())
}
