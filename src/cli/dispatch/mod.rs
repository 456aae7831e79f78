use crate::{
    api::Environment,
    cli::{
        actions::{hash_password, health_check, server, Action},
        commands::{self, auth, http, mail},
    },
};
use anyhow::{Context, Result};
use secrecy::SecretString;

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    match matches.subcommand_name() {
        Some(commands::CMD_JWT_SECRET) => return Ok(Action::GenerateJwtSecret),
        Some(commands::CMD_HASH_PASSWORD) => {
            let password = matches
                .subcommand_matches(commands::CMD_HASH_PASSWORD)
                .context("arguments not found")?
                .get_one::<String>(commands::ARG_PASSWORD)
                .cloned()
                .context("missing required argument: <password>")?;
            return Ok(Action::HashPassword(hash_password::Args {
                password: SecretString::from(password),
            }));
        }
        _ => {}
    }

    let dsn = matches
        .get_one::<String>(commands::ARG_DSN)
        .cloned()
        .context("missing required argument: --dsn")?;

    if matches.get_flag(commands::ARG_HEALTH_CHECK) {
        return Ok(Action::HealthCheck(health_check::Args { dsn }));
    }

    let port = matches
        .get_one::<u16>(commands::ARG_PORT)
        .copied()
        .unwrap_or(8080);
    let environment = matches
        .get_one::<String>(commands::ARG_ENVIRONMENT)
        .map_or(Ok(Environment::Development), |value| value.parse())?;

    let mut auth_options = auth::Options::parse(matches)?;
    let jwt_secret = auth_options
        .jwt_secret
        .take()
        .with_context(|| format!("missing required argument: --{}", auth::ARG_JWT_SECRET))?;

    Ok(Action::Server(server::Args {
        port,
        dsn,
        environment,
        jwt_secret,
        auth: auth_options,
        http: http::Options::parse(matches)?,
        mail: mail::Options::parse(matches)?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    const ENV_KEYS: [&str; 6] = [
        "RECRUITMENT_PORT",
        "RECRUITMENT_DSN",
        "RECRUITMENT_ENV",
        "RECRUITMENT_JWT_SECRET",
        "RECRUITMENT_ADMIN_EMAIL",
        "RECRUITMENT_ADMIN_PASSWORD",
    ];

    fn clean_env() -> Vec<(&'static str, Option<&'static str>)> {
        ENV_KEYS.iter().map(|key| (*key, None)).collect()
    }

    #[test]
    fn server_action_from_args() {
        temp_env::with_vars(clean_env(), || {
            let matches = commands::new().get_matches_from(vec![
                "recruitment",
                "--dsn",
                "postgres://localhost/recruitment",
                "--port",
                "9000",
                "--environment",
                "testing",
                "--jwt-secret",
                "0123456789abcdef0123456789abcdef",
            ]);
            let action = handler(&matches);
            assert!(action.is_ok());
            if let Ok(Action::Server(args)) = action {
                assert_eq!(args.port, 9000);
                assert_eq!(args.environment, Environment::Testing);
                assert_eq!(args.dsn, "postgres://localhost/recruitment");
            } else {
                panic!("expected server action");
            }
        });
    }

    #[test]
    fn server_requires_jwt_secret() {
        temp_env::with_vars(clean_env(), || {
            let matches = commands::new()
                .get_matches_from(vec!["recruitment", "--dsn", "postgres://localhost/db"]);
            assert!(handler(&matches).is_err());
        });
    }

    #[test]
    fn health_check_does_not_need_jwt_secret() {
        temp_env::with_vars(clean_env(), || {
            let matches = commands::new().get_matches_from(vec![
                "recruitment",
                "--dsn",
                "postgres://localhost/db",
                "--health-check",
            ]);
            assert!(matches!(handler(&matches), Ok(Action::HealthCheck(_))));
        });
    }

    #[test]
    fn operator_subcommands_dispatch_without_server_args() {
        temp_env::with_vars(clean_env(), || {
            let matches = commands::new().get_matches_from(vec!["recruitment", "jwt-secret"]);
            assert!(matches!(handler(&matches), Ok(Action::GenerateJwtSecret)));

            let matches = commands::new().get_matches_from(vec![
                "recruitment",
                "hash-password",
                "correct-horse",
            ]);
            match handler(&matches) {
                Ok(Action::HashPassword(args)) => {
                    assert_eq!(args.password.expose_secret(), "correct-horse");
                }
                other => panic!("expected hash-password action, got {other:?}"),
            }
        });
    }
}
