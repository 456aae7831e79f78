use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

use crate::api::handlers::auth::BootstrapAdmin;

pub const ARG_JWT_SECRET: &str = "jwt-secret";
pub const ARG_JWT_EXPIRY_SECONDS: &str = "jwt-expiry-seconds";
pub const ARG_OTP_VERIFICATION_TTL_SECONDS: &str = "otp-verification-ttl-seconds";
pub const ARG_OTP_RESET_TTL_SECONDS: &str = "otp-reset-ttl-seconds";
pub const ARG_ALLOWED_EMAIL_DOMAINS: &str = "allowed-email-domains";
pub const ARG_ADMIN_EMAIL: &str = "admin-email";
pub const ARG_ADMIN_PASSWORD: &str = "admin-password";
pub const ARG_ADMIN_NAME: &str = "admin-name";

#[derive(Debug, Clone)]
pub struct Options {
    pub jwt_secret: Option<SecretString>,
    pub jwt_expiry_seconds: u64,
    pub otp_verification_ttl_seconds: u64,
    pub otp_reset_ttl_seconds: u64,
    pub allowed_email_domains: Vec<String>,
    pub admin_seed: Option<BootstrapAdmin>,
}

impl Options {
    /// Parse token, OTP and registration arguments from matches.
    ///
    /// # Errors
    /// Returns an error if only part of the bootstrap admin credentials is given,
    /// or if they are malformed.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let read_optional = |id: &str| -> Option<String> {
            matches
                .get_one::<String>(id)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let allowed_email_domains = read_optional(ARG_ALLOWED_EMAIL_DOMAINS)
            .map(|domains| parse_domains(&domains))
            .unwrap_or_default();

        let admin_seed = match (
            read_optional(ARG_ADMIN_EMAIL),
            read_optional(ARG_ADMIN_PASSWORD),
        ) {
            (Some(email), Some(password)) => {
                let admin = BootstrapAdmin::new(&email, SecretString::from(password))?;
                Some(match read_optional(ARG_ADMIN_NAME) {
                    Some(name) => admin.with_name(&name),
                    None => admin,
                })
            }
            (None, None) => None,
            _ => {
                return Err(anyhow::anyhow!(
                    "--{ARG_ADMIN_EMAIL} and --{ARG_ADMIN_PASSWORD} must be provided together"
                ))
            }
        };

        Ok(Self {
            jwt_secret: read_optional(ARG_JWT_SECRET).map(SecretString::from),
            jwt_expiry_seconds: matches
                .get_one::<u64>(ARG_JWT_EXPIRY_SECONDS)
                .copied()
                .unwrap_or(86_400),
            otp_verification_ttl_seconds: matches
                .get_one::<u64>(ARG_OTP_VERIFICATION_TTL_SECONDS)
                .copied()
                .unwrap_or(600),
            otp_reset_ttl_seconds: matches
                .get_one::<u64>(ARG_OTP_RESET_TTL_SECONDS)
                .copied()
                .unwrap_or(1800),
            allowed_email_domains,
            admin_seed,
        })
    }
}

/// Split a comma separated domain list, dropping blanks and leading `@`.
fn parse_domains(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|domain| domain.trim().trim_start_matches('@').to_lowercase())
        .filter(|domain| !domain.is_empty())
        .collect()
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = with_token_args(command);
    let command = with_otp_args(command);
    with_admin_args(command)
}

fn with_token_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_JWT_SECRET)
                .long(ARG_JWT_SECRET)
                .help("HMAC secret used to sign session tokens")
                .long_help("HMAC secret used to sign session tokens. Must be at least 32 bytes in production.")
                .env("RECRUITMENT_JWT_SECRET")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_JWT_EXPIRY_SECONDS)
                .long(ARG_JWT_EXPIRY_SECONDS)
                .help("Session token lifetime in seconds (minimum 60)")
                .env("RECRUITMENT_JWT_EXPIRY_SECONDS")
                .default_value("86400")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_ALLOWED_EMAIL_DOMAINS)
                .long(ARG_ALLOWED_EMAIL_DOMAINS)
                .help("Comma separated email domains accepted at registration (empty: any)")
                .env("RECRUITMENT_ALLOWED_EMAIL_DOMAINS"),
        )
}

fn with_otp_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_OTP_VERIFICATION_TTL_SECONDS)
                .long(ARG_OTP_VERIFICATION_TTL_SECONDS)
                .help("Email verification code lifetime in seconds")
                .env("RECRUITMENT_OTP_VERIFICATION_TTL_SECONDS")
                .default_value("600")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_OTP_RESET_TTL_SECONDS)
                .long(ARG_OTP_RESET_TTL_SECONDS)
                .help("Password reset code lifetime in seconds")
                .env("RECRUITMENT_OTP_RESET_TTL_SECONDS")
                .default_value("1800")
                .value_parser(clap::value_parser!(u64)),
        )
}

fn with_admin_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_ADMIN_EMAIL)
                .long(ARG_ADMIN_EMAIL)
                .help("Email of the bootstrap super admin created at startup")
                .env("RECRUITMENT_ADMIN_EMAIL"),
        )
        .arg(
            Arg::new(ARG_ADMIN_PASSWORD)
                .long(ARG_ADMIN_PASSWORD)
                .help("Password of the bootstrap super admin")
                .env("RECRUITMENT_ADMIN_PASSWORD")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_ADMIN_NAME)
                .long(ARG_ADMIN_NAME)
                .help("Full name of the bootstrap super admin")
                .env("RECRUITMENT_ADMIN_NAME"),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    const ENV_KEYS: [&str; 8] = [
        "RECRUITMENT_JWT_SECRET",
        "RECRUITMENT_JWT_EXPIRY_SECONDS",
        "RECRUITMENT_OTP_VERIFICATION_TTL_SECONDS",
        "RECRUITMENT_OTP_RESET_TTL_SECONDS",
        "RECRUITMENT_ALLOWED_EMAIL_DOMAINS",
        "RECRUITMENT_ADMIN_EMAIL",
        "RECRUITMENT_ADMIN_PASSWORD",
        "RECRUITMENT_ADMIN_NAME",
    ];

    fn env_with(
        overrides: &[(&'static str, &'static str)],
    ) -> Vec<(&'static str, Option<&'static str>)> {
        ENV_KEYS
            .iter()
            .map(|key| {
                let value = overrides
                    .iter()
                    .find(|(name, _)| name == key)
                    .map(|(_, value)| *value);
                (*key, value)
            })
            .collect()
    }

    #[test]
    fn defaults() {
        temp_env::with_vars(env_with(&[]), || {
            let matches = with_args(Command::new("test")).get_matches_from(vec!["test"]);
            let options = Options::parse(&matches);
            assert!(options.is_ok());
            if let Ok(options) = options {
                assert!(options.jwt_secret.is_none());
                assert_eq!(options.jwt_expiry_seconds, 86_400);
                assert_eq!(options.otp_verification_ttl_seconds, 600);
                assert_eq!(options.otp_reset_ttl_seconds, 1800);
                assert!(options.allowed_email_domains.is_empty());
                assert!(options.admin_seed.is_none());
            }
        });
    }

    #[test]
    fn env_values_are_read() {
        let vars = env_with(&[
            ("RECRUITMENT_JWT_SECRET", "s3cr3t"),
            (
                "RECRUITMENT_ALLOWED_EMAIL_DOMAINS",
                "@Allowed.edu, staff.allowed.edu,",
            ),
            ("RECRUITMENT_ADMIN_EMAIL", "root@allowed.edu"),
            ("RECRUITMENT_ADMIN_PASSWORD", "changeme"),
        ]);
        temp_env::with_vars(vars, || {
            let matches = with_args(Command::new("test")).get_matches_from(vec!["test"]);
            let options = Options::parse(&matches);
            assert!(options.is_ok());
            if let Ok(options) = options {
                assert_eq!(
                    options.jwt_secret.as_ref().map(|s| s.expose_secret().to_string()),
                    Some("s3cr3t".to_string())
                );
                assert_eq!(
                    options.allowed_email_domains,
                    vec!["allowed.edu".to_string(), "staff.allowed.edu".to_string()]
                );
                let seed = options.admin_seed;
                assert!(seed.is_some());
                if let Some(seed) = seed {
                    assert_eq!(seed.email(), "root@allowed.edu");
                    assert_eq!(seed.name(), "Super Admin");
                }
            }
        });
    }

    #[test]
    fn partial_admin_seed_is_rejected() {
        let vars = env_with(&[("RECRUITMENT_ADMIN_EMAIL", "root@allowed.edu")]);
        temp_env::with_vars(vars, || {
            let matches = with_args(Command::new("test")).get_matches_from(vec!["test"]);
            assert!(Options::parse(&matches).is_err());
        });
    }

    #[test]
    fn malformed_admin_seed_is_rejected() {
        let vars = env_with(&[
            ("RECRUITMENT_ADMIN_EMAIL", "not-an-email"),
            ("RECRUITMENT_ADMIN_PASSWORD", "changeme"),
        ]);
        temp_env::with_vars(vars, || {
            let matches = with_args(Command::new("test")).get_matches_from(vec!["test"]);
            assert!(Options::parse(&matches).is_err());
        });
    }
}
