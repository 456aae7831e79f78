//! Identity, credentials and access control.
//!
//! ## Tokens
//!
//! Sessions are stateless HS256 tokens carrying user id, email and role, issued
//! by `TokenService` with a configurable lifetime (floor 60 seconds). A refresh
//! re-issues the presented token's claims with a fresh expiry. There is no
//! revocation list.
//!
//! ## Roles
//!
//! Access is decided by explicit allow-sets (`policy`). Route groups attach a
//! role middleware from `principal`; handlers narrow further with
//! `AuthContext::authorize` when one method of a group needs a smaller set.
//!
//! ## One-time codes
//!
//! Verification and password reset share the OTP columns on the user row, but a
//! stored code is tagged with its purpose and only unlocks that flow. Only the
//! SHA-256 digest is kept. A code is single-use: consuming it clears it in the
//! same statement that checks it. Each code allows five guesses; the fifth miss
//! clears it.
//!
//! ## Rate limiting
//!
//! Auth, user and admin routes sit in the strict tier (20 requests/minute/IP by
//! default); question routes in the default tier (250). Buckets are keyed by
//! the TCP peer address unless `--trust-proxy-headers` is set.

pub(crate) mod bootstrap;
pub(crate) mod login;
pub(crate) mod otp;
pub(crate) mod password;
pub(crate) mod password_reset;
pub(crate) mod policy;
pub(crate) mod principal;
pub(crate) mod rate_limit;
pub(crate) mod register;
mod state;
pub(crate) mod storage;
pub(crate) mod token;
pub(crate) mod types;
pub(crate) mod utils;
pub(crate) mod verification;
pub(crate) mod withdrawal;

pub use bootstrap::{seed_super_admin, BootstrapAdmin};
pub use policy::{AllowSet, Role};
pub use principal::AuthContext;
pub use rate_limit::{ClientLimit, GovernorLimiter, NoopRateLimiter, RateLimiter};
pub use state::{AuthConfig, AuthState};
