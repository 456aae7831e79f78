use clap::{Arg, ArgAction, ArgMatches, Command};

pub const ARG_CORS_ALLOWED_ORIGINS: &str = "cors-allowed-origins";
pub const ARG_AUTH_RATE_LIMIT: &str = "auth-rate-limit";
pub const ARG_DEFAULT_RATE_LIMIT: &str = "default-rate-limit";
pub const ARG_MAX_APPLICATIONS_PER_USER: &str = "max-applications-per-user";
pub const ARG_TRUST_PROXY_HEADERS: &str = "trust-proxy-headers";

#[derive(Debug, Clone)]
pub struct Options {
    pub cors_allowed_origins: Vec<String>,
    pub auth_rate_limit: u32,
    pub default_rate_limit: u32,
    pub max_applications_per_user: i64,
    pub trust_proxy_headers: bool,
}

impl Options {
    /// Parse HTTP surface and application policy arguments from matches.
    ///
    /// # Errors
    /// Returns an error if a rate limit or the application quota is zero.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let cors_allowed_origins = matches
            .get_one::<String>(ARG_CORS_ALLOWED_ORIGINS)
            .map(|origins| {
                origins
                    .split(',')
                    .map(|origin| origin.trim().trim_end_matches('/').to_string())
                    .filter(|origin| !origin.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let read_positive = |id: &str, default: u32| -> anyhow::Result<u32> {
            let value = matches.get_one::<u32>(id).copied().unwrap_or(default);
            if value == 0 {
                return Err(anyhow::anyhow!("--{id} must be greater than zero"));
            }
            Ok(value)
        };

        Ok(Self {
            cors_allowed_origins,
            auth_rate_limit: read_positive(ARG_AUTH_RATE_LIMIT, 20)?,
            default_rate_limit: read_positive(ARG_DEFAULT_RATE_LIMIT, 250)?,
            max_applications_per_user: i64::from(read_positive(
                ARG_MAX_APPLICATIONS_PER_USER,
                2,
            )?),
            trust_proxy_headers: matches.get_flag(ARG_TRUST_PROXY_HEADERS),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_CORS_ALLOWED_ORIGINS)
                .long(ARG_CORS_ALLOWED_ORIGINS)
                .help("Comma separated list of allowed CORS origins (empty: any, not allowed in production)")
                .env("RECRUITMENT_CORS_ALLOWED_ORIGINS"),
        )
        .arg(
            Arg::new(ARG_AUTH_RATE_LIMIT)
                .long(ARG_AUTH_RATE_LIMIT)
                .help("Requests per minute per client IP on auth, users and admin routes")
                .env("RECRUITMENT_AUTH_RATE_LIMIT")
                .default_value("20")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_DEFAULT_RATE_LIMIT)
                .long(ARG_DEFAULT_RATE_LIMIT)
                .help("Requests per minute per client IP on question routes")
                .env("RECRUITMENT_DEFAULT_RATE_LIMIT")
                .default_value("250")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_MAX_APPLICATIONS_PER_USER)
                .long(ARG_MAX_APPLICATIONS_PER_USER)
                .help("Maximum number of applications a single user may open")
                .env("RECRUITMENT_MAX_APPLICATIONS_PER_USER")
                .default_value("2")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_TRUST_PROXY_HEADERS)
                .long(ARG_TRUST_PROXY_HEADERS)
                .help("Rate limit by X-Forwarded-For/X-Real-IP; only behind a proxy that sets them")
                .env("RECRUITMENT_TRUST_PROXY_HEADERS")
                .action(ArgAction::SetTrue),
        )
}
