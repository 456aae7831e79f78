pub mod auth;
pub mod http;
pub mod logging;
pub mod mail;

use clap::{
    builder::{
        styling::{AnsiColor, Effects, Styles},
        PossibleValuesParser,
    },
    Arg, ArgAction, ColorChoice, Command,
};

pub const ARG_PORT: &str = "port";
pub const ARG_DSN: &str = "dsn";
pub const ARG_ENVIRONMENT: &str = "environment";
pub const ARG_HEALTH_CHECK: &str = "health-check";
pub const ARG_PASSWORD: &str = "password";

pub const CMD_JWT_SECRET: &str = "jwt-secret";
pub const CMD_HASH_PASSWORD: &str = "hash-password";

/// Offline helpers for operators; they never touch the database.
fn operator_commands(command: Command) -> Command {
    command
        .subcommand_negates_reqs(true)
        .subcommand(
            Command::new(CMD_JWT_SECRET).about("Print a random secret for --jwt-secret"),
        )
        .subcommand(
            Command::new(CMD_HASH_PASSWORD)
                .about("Print the bcrypt hash of a password")
                .arg(
                    Arg::new(ARG_PASSWORD)
                        .help("Password to hash")
                        .required(true),
                ),
        )
}

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("recruitment")
        .about("Recruitment management API")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long(ARG_PORT)
                .help("Port to listen on")
                .default_value("8080")
                .env("RECRUITMENT_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_DSN)
                .short('d')
                .long(ARG_DSN)
                .help("Database connection string")
                .env("RECRUITMENT_DSN")
                .required(true),
        )
        .arg(
            Arg::new(ARG_ENVIRONMENT)
                .long(ARG_ENVIRONMENT)
                .help("Deployment environment")
                .env("RECRUITMENT_ENV")
                .default_value("development")
                .value_parser(PossibleValuesParser::new([
                    "development",
                    "testing",
                    "production",
                ])),
        )
        .arg(
            Arg::new(ARG_HEALTH_CHECK)
                .long(ARG_HEALTH_CHECK)
                .help("Check database connectivity and exit (0 healthy, 1 unhealthy)")
                .action(ArgAction::SetTrue),
        );

    let command = auth::with_args(command);
    let command = http::with_args(command);
    let command = mail::with_args(command);
    let command = logging::with_args(command);
    operator_commands(command)
}
