use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_SMTP_HOST: &str = "smtp-host";
pub const ARG_SMTP_PORT: &str = "smtp-port";
pub const ARG_SMTP_USERNAME: &str = "smtp-username";
pub const ARG_SMTP_PASSWORD: &str = "smtp-password";
pub const ARG_SMTP_FROM: &str = "smtp-from";
pub const ARG_MAIL_QUEUE_CAPACITY: &str = "mail-queue-capacity";
pub const ARG_MAIL_IDLE_TIMEOUT_SECONDS: &str = "mail-idle-timeout-seconds";
pub const ARG_MAIL_MAX_ATTEMPTS: &str = "mail-max-attempts";

#[derive(Debug, Clone)]
pub struct Options {
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<SecretString>,
    pub smtp_from: String,
    pub queue_capacity: usize,
    pub idle_timeout_seconds: u64,
    pub max_attempts: u32,
}

impl Options {
    /// Parse SMTP and mail worker arguments from matches.
    ///
    /// # Errors
    /// Returns an error if SMTP credentials are only partially configured.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let read_optional = |id: &str| -> Option<String> {
            matches
                .get_one::<String>(id)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let smtp_username = read_optional(ARG_SMTP_USERNAME);
        let smtp_password = read_optional(ARG_SMTP_PASSWORD);
        if smtp_username.is_some() != smtp_password.is_some() {
            return Err(anyhow::anyhow!(
                "--{ARG_SMTP_USERNAME} and --{ARG_SMTP_PASSWORD} must be provided together"
            ));
        }

        Ok(Self {
            smtp_host: read_optional(ARG_SMTP_HOST),
            smtp_port: matches.get_one::<u16>(ARG_SMTP_PORT).copied().unwrap_or(587),
            smtp_username,
            smtp_password: smtp_password.map(SecretString::from),
            smtp_from: read_optional(ARG_SMTP_FROM)
                .unwrap_or_else(|| "no-reply@localhost".to_string()),
            queue_capacity: matches
                .get_one::<usize>(ARG_MAIL_QUEUE_CAPACITY)
                .copied()
                .unwrap_or(100),
            idle_timeout_seconds: matches
                .get_one::<u64>(ARG_MAIL_IDLE_TIMEOUT_SECONDS)
                .copied()
                .unwrap_or(30),
            max_attempts: matches
                .get_one::<u32>(ARG_MAIL_MAX_ATTEMPTS)
                .copied()
                .unwrap_or(3),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = with_smtp_args(command);
    with_worker_args(command)
}

fn with_smtp_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SMTP_HOST)
                .long(ARG_SMTP_HOST)
                .help("SMTP relay host (unset: emails are only logged)")
                .env("RECRUITMENT_SMTP_HOST"),
        )
        .arg(
            Arg::new(ARG_SMTP_PORT)
                .long(ARG_SMTP_PORT)
                .help("SMTP relay port (STARTTLS)")
                .env("RECRUITMENT_SMTP_PORT")
                .default_value("587")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_SMTP_USERNAME)
                .long(ARG_SMTP_USERNAME)
                .help("SMTP username")
                .env("RECRUITMENT_SMTP_USERNAME"),
        )
        .arg(
            Arg::new(ARG_SMTP_PASSWORD)
                .long(ARG_SMTP_PASSWORD)
                .help("SMTP password")
                .env("RECRUITMENT_SMTP_PASSWORD")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_SMTP_FROM)
                .long(ARG_SMTP_FROM)
                .help("Sender address for outbound email")
                .env("RECRUITMENT_SMTP_FROM")
                .default_value("no-reply@localhost"),
        )
}

fn with_worker_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_MAIL_QUEUE_CAPACITY)
                .long(ARG_MAIL_QUEUE_CAPACITY)
                .help("Number of pending emails held before new ones are rejected")
                .env("RECRUITMENT_MAIL_QUEUE_CAPACITY")
                .default_value("100")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new(ARG_MAIL_IDLE_TIMEOUT_SECONDS)
                .long(ARG_MAIL_IDLE_TIMEOUT_SECONDS)
                .help("Seconds without mail before the SMTP session is closed")
                .env("RECRUITMENT_MAIL_IDLE_TIMEOUT_SECONDS")
                .default_value("30")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_MAIL_MAX_ATTEMPTS)
                .long(ARG_MAIL_MAX_ATTEMPTS)
                .help("Delivery attempts per email before it is dropped")
                .env("RECRUITMENT_MAIL_MAX_ATTEMPTS")
                .default_value("3")
                .value_parser(clap::value_parser!(u32)),
        )
}
