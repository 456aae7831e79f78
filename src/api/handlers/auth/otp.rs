//! One-time codes for email verification and password reset.
//!
//! A code is six random digits. Only its SHA-256 digest is stored, tagged with
//! the purpose it unlocks, next to an expiry and a count of guesses. Consuming a
//! code compares digests inside a conditional update that clears it, so it
//! cannot be replayed, and a code is dropped after `MAX_OTP_ATTEMPTS` guesses.

use rand::{rngs::OsRng, Rng};
use sha2::{Digest, Sha256};
use std::{fmt, str::FromStr};

pub const OTP_LENGTH: usize = 6;

/// Guesses allowed against one code, the correct one included.
pub const MAX_OTP_ATTEMPTS: i32 = 5;

/// What a stored code unlocks. A reset code cannot verify an account.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OtpPurpose {
    Verification,
    Reset,
}

impl OtpPurpose {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Verification => "verification",
            Self::Reset => "reset",
        }
    }
}

impl fmt::Display for OtpPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OtpPurpose {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "verification" => Ok(Self::Verification),
            "reset" => Ok(Self::Reset),
            other => Err(format!("unknown OTP purpose: {other}")),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OtpCheck {
    /// A code for this purpose is pending and may be guessed.
    Pending,
    Expired,
    Exhausted,
    Missing,
}

/// Generate a zero padded six digit code from the OS RNG.
#[must_use]
pub fn generate_otp() -> String {
    let code: u32 = OsRng.gen_range(0..1_000_000);
    format!("{code:06}")
}

/// Digest stored in place of the raw code.
#[must_use]
pub fn hash_otp(code: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(code.trim().as_bytes());
    hasher.finalize().to_vec()
}

/// Decide whether a guess may be made against the stored code.
///
/// Expiry wins over everything else: an expired code is rejected even when the
/// guess would have matched.
#[must_use]
pub fn check_otp(
    pending: Option<OtpPurpose>,
    wanted: OtpPurpose,
    expired: bool,
    attempts: i32,
) -> OtpCheck {
    if pending != Some(wanted) {
        return OtpCheck::Missing;
    }
    if expired {
        return OtpCheck::Expired;
    }
    if attempts >= MAX_OTP_ATTEMPTS {
        OtpCheck::Exhausted
    } else {
        OtpCheck::Pending
    }
}

/// Cheap shape check before touching the database.
#[must_use]
pub fn well_formed(code: &str) -> bool {
    let code = code.trim();
    code.len() == OTP_LENGTH && code.bytes().all(|b| b.is_ascii_digit())
}
