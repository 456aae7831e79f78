use crate::{
    api::{
        self,
        email::{MailWorkerConfig, SmtpConfig},
        handlers::{applications::ApplicationPolicy, auth::AuthConfig},
        Environment, HttpConfig, ServerConfig,
    },
    cli::commands::{auth, http, mail},
};
use anyhow::Result;
use secrecy::SecretString;
use tracing::info;
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub environment: Environment,
    pub jwt_secret: SecretString,
    pub auth: auth::Options,
    pub http: http::Options,
    pub mail: mail::Options,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the configuration is rejected or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);
    api::new(server_config(args)).await
}

fn server_config(args: Args) -> ServerConfig {
    let auth = AuthConfig::new(args.jwt_secret)
        .with_token_ttl_seconds(args.auth.jwt_expiry_seconds)
        .with_verification_ttl_seconds(args.auth.otp_verification_ttl_seconds)
        .with_reset_ttl_seconds(args.auth.otp_reset_ttl_seconds)
        .with_allowed_email_domains(args.auth.allowed_email_domains);

    let http = HttpConfig::new(args.environment)
        .with_cors_allowed_origins(args.http.cors_allowed_origins)
        .with_rate_limits(args.http.auth_rate_limit, args.http.default_rate_limit)
        .with_trust_proxy_headers(args.http.trust_proxy_headers);

    let policy = ApplicationPolicy::new()
        .with_max_applications_per_user(args.http.max_applications_per_user);

    let mail = MailWorkerConfig::new()
        .with_queue_capacity(args.mail.queue_capacity)
        .with_idle_timeout_seconds(args.mail.idle_timeout_seconds)
        .with_max_attempts(args.mail.max_attempts);

    let smtp = args.mail.smtp_host.map(|host| {
        let config = SmtpConfig::new(host, args.mail.smtp_from).with_port(args.mail.smtp_port);
        match (args.mail.smtp_username, args.mail.smtp_password) {
            (Some(username), Some(password)) => config.with_credentials(username, password),
            _ => config,
        }
    });

    ServerConfig {
        port: args.port,
        dsn: args.dsn,
        http,
        auth,
        policy,
        mail,
        smtp,
        admin_seed: args.auth.admin_seed,
    }
}

fn log_startup_args(args: &Args) {
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        ("dsn", redact_dsn(&args.dsn)),
        ("environment", args.environment.to_string()),
        (
            "cors_allowed_origins",
            if args.http.cors_allowed_origins.is_empty() {
                "*".to_string()
            } else {
                args.http.cors_allowed_origins.join(",")
            },
        ),
        (
            "rate_limits",
            format!(
                "auth={}/min default={}/min trust_proxy_headers={}",
                args.http.auth_rate_limit,
                args.http.default_rate_limit,
                args.http.trust_proxy_headers
            ),
        ),
        (
            "smtp_host",
            args.mail
                .smtp_host
                .clone()
                .unwrap_or_else(|| "none (log only)".to_string()),
        ),
        (
            "admin_seed",
            args.auth
                .admin_seed
                .as_ref()
                .map_or_else(|| "n/a".to_string(), |seed| seed.email().to_string()),
        ),
    ];
    log_entries("Startup configuration", &entries);
}

fn redact_dsn(dsn: &str) -> String {
    match Url::parse(dsn) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("REDACTED"));
            }
            parsed.to_string()
        }
        Err(_) => "invalid-dsn".to_string(),
    }
}

fn log_entries(title: &str, entries: &[(&str, String)]) {
    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!(
        "{} {} - {}\n\n{title}:",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        short_commit(crate::GIT_COMMIT_HASH)
    );
    for (key, value) in entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn short_commit(hash: &str) -> &str {
    let trimmed = hash.trim();
    trimmed.get(..7).unwrap_or(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dsn_password_is_redacted() {
        assert_eq!(
            redact_dsn("postgres://app:hunter2@db:5432/recruitment"),
            "postgres://app:REDACTED@db:5432/recruitment"
        );
        assert_eq!(
            redact_dsn("postgres://db:5432/recruitment"),
            "postgres://db:5432/recruitment"
        );
        assert_eq!(redact_dsn("not a url"), "invalid-dsn");
    }

    #[test]
    fn short_commit_truncates() {
        assert_eq!(short_commit("0123456789abcdef"), "0123456");
        assert_eq!(short_commit("abc"), "abc");
    }
}
