use crate::api::{
    email::{spawn_mail_worker, LogTransport, Mailer, MailWorkerConfig, SmtpConfig, SmtpTransport},
    handlers::{
        applications::ApplicationPolicy,
        auth::{seed_super_admin, AuthConfig, AuthState, BootstrapAdmin, GovernorLimiter},
    },
};
use anyhow::{anyhow, Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, Request,
    },
    Extension, Router,
};
use secrecy::ExposeSecret;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{fmt, net::SocketAddr, str::FromStr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, warn, Span};
use ulid::Ulid;
use utoipa_swagger_ui::SwaggerUi;

pub mod email;
pub mod handlers;
mod openapi;

pub use openapi::{openapi, RateLimits};

/// Minimum JWT secret length accepted in production.
pub const MIN_JWT_SECRET_BYTES: usize = 32;

/// How long shutdown waits for the mail worker to drain its queue.
const MAIL_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

const REQUEST_ID: &str = "x-request-id";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Development,
    Testing,
    Production,
}

impl Environment {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Testing => "testing",
            Self::Production => "production",
        }
    }

    #[must_use]
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "development" => Ok(Self::Development),
            "testing" => Ok(Self::Testing),
            "production" => Ok(Self::Production),
            other => Err(anyhow!("unknown environment: {other}")),
        }
    }
}

/// HTTP surface settings: environment, CORS and rate-limit tiers.
#[derive(Clone, Debug)]
pub struct HttpConfig {
    environment: Environment,
    cors_allowed_origins: Vec<String>,
    auth_rate_limit: u32,
    default_rate_limit: u32,
    trust_proxy_headers: bool,
}

impl HttpConfig {
    #[must_use]
    pub fn new(environment: Environment) -> Self {
        Self {
            environment,
            cors_allowed_origins: Vec::new(),
            auth_rate_limit: 20,
            default_rate_limit: 250,
            trust_proxy_headers: false,
        }
    }

    #[must_use]
    pub fn with_cors_allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_allowed_origins = origins;
        self
    }

    /// Requests per minute per client IP for the strict and default tiers.
    #[must_use]
    pub fn with_rate_limits(mut self, auth: u32, default: u32) -> Self {
        self.auth_rate_limit = auth;
        self.default_rate_limit = default;
        self
    }

    /// Key rate limits on proxy headers instead of the TCP peer address.
    #[must_use]
    pub fn with_trust_proxy_headers(mut self, trust: bool) -> Self {
        self.trust_proxy_headers = trust;
        self
    }

    #[must_use]
    pub fn environment(&self) -> Environment {
        self.environment
    }

    #[must_use]
    pub fn cors_allowed_origins(&self) -> &[String] {
        &self.cors_allowed_origins
    }

    #[must_use]
    pub fn rate_limits(&self) -> RateLimits {
        RateLimits {
            strict: Arc::new(GovernorLimiter::per_minute(self.auth_rate_limit)),
            default: Arc::new(GovernorLimiter::per_minute(self.default_rate_limit)),
            trust_proxy_headers: self.trust_proxy_headers,
        }
    }
}

/// Everything the server needs at startup.
#[derive(Debug)]
pub struct ServerConfig {
    pub port: u16,
    pub dsn: String,
    pub http: HttpConfig,
    pub auth: AuthConfig,
    pub policy: ApplicationPolicy,
    pub mail: MailWorkerConfig,
    /// `None` delivers mail to the log only.
    pub smtp: Option<SmtpConfig>,
    pub admin_seed: Option<BootstrapAdmin>,
}

impl ServerConfig {
    /// Check the configuration for the selected environment.
    ///
    /// # Errors
    /// In production: a JWT secret shorter than 32 bytes, missing or wildcard CORS
    /// origins, or no SMTP host. Other environments only warn about the secret.
    pub fn validate(&self) -> Result<()> {
        let secret_len = self.auth.jwt_secret().expose_secret().len();
        let production = self.http.environment().is_production();

        if secret_len < MIN_JWT_SECRET_BYTES {
            if production {
                return Err(anyhow!(
                    "JWT secret must be at least {MIN_JWT_SECRET_BYTES} bytes in production"
                ));
            }
            warn!(
                "JWT secret is shorter than {MIN_JWT_SECRET_BYTES} bytes, \
                 this is only acceptable outside production"
            );
        }

        if production {
            let origins = self.http.cors_allowed_origins();
            if origins.is_empty() {
                return Err(anyhow!("CORS allowed origins must be configured in production"));
            }
            if origins.iter().any(|origin| origin == "*") {
                return Err(anyhow!("Wildcard CORS origin is not allowed in production"));
            }
            if self.smtp.is_none() {
                return Err(anyhow!("SMTP host must be configured in production"));
            }
        }

        Ok(())
    }
}

/// Shared services injected into every request.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub auth: Arc<AuthState>,
    pub policy: ApplicationPolicy,
    pub mailer: Mailer,
}

/// Build the full application router: documented routes, docs UI outside
/// production, and the request-id/trace/CORS stack.
///
/// # Errors
/// Returns an error if a configured CORS origin is not a valid header value.
pub fn app(state: AppState, http: &HttpConfig, limits: &RateLimits) -> Result<Router> {
    let (router, openapi) = openapi::api_router(limits).split_for_parts();

    let router = if http.environment().is_production() {
        router
    } else {
        router.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi))
    };

    let cors = cors_layer(http)?;

    Ok(router.layer(
        ServiceBuilder::new()
            .layer(SetRequestHeaderLayer::if_not_present(
                HeaderName::from_static(REQUEST_ID),
                |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
            ))
            .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                REQUEST_ID,
            )))
            .layer(TraceLayer::new_for_http().make_span_with(make_span))
            .layer(cors)
            .layer(Extension(state.pool))
            .layer(Extension(state.auth))
            .layer(Extension(state.policy))
            .layer(Extension(state.mailer)),
    ))
}

fn cors_layer(http: &HttpConfig) -> Result<CorsLayer> {
    let layer = CorsLayer::new()
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            HeaderName::from_static(REQUEST_ID),
        ])
        .allow_methods([
            Method::GET,
            Method::HEAD,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .expose_headers([
            HeaderName::from_static(REQUEST_ID),
            HeaderName::from_static("x-ratelimit-limit"),
            HeaderName::from_static("x-ratelimit-remaining"),
            HeaderName::from_static("x-ratelimit-reset"),
            HeaderName::from_static("retry-after"),
        ]);

    let origins = http.cors_allowed_origins();
    if origins.is_empty() || origins.iter().any(|origin| origin == "*") {
        return Ok(layer.allow_origin(AllowOrigin::any()));
    }

    let origins = origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin)
                .with_context(|| format!("Invalid CORS origin: {origin}"))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(layer.allow_origin(AllowOrigin::list(origins)))
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get(REQUEST_ID)
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

/// Start the server
/// # Errors
/// Return error if configuration is invalid, the database is unreachable,
/// migrations fail, seeding fails or the listener cannot be bound.
pub async fn new(config: ServerConfig) -> Result<()> {
    config.validate()?;
    info!(environment = %config.http.environment(), "starting recruitment API");

    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(10)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&config.dsn)
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;
    info!("Database migrations applied");

    if let Some(admin) = &config.admin_seed {
        let created = seed_super_admin(&pool, admin)
            .await
            .context("Failed to seed super admin")?;
        if !created {
            info!(email = %admin.email(), "super admin already exists, seed skipped");
        }
    }

    let (mailer, mail_worker) = match config.smtp {
        Some(smtp) => {
            info!(host = %smtp.host(), port = smtp.port(), "using SMTP mail transport");
            spawn_mail_worker(SmtpTransport::new(smtp), config.mail)
        }
        None => {
            warn!("No SMTP host configured, emails will only be logged");
            spawn_mail_worker(LogTransport, config.mail)
        }
    };

    let state = AppState {
        pool: pool.clone(),
        auth: Arc::new(AuthState::new(config.auth)),
        policy: config.policy,
        mailer,
    };
    let app = app(state, &config.http, &config.http.rate_limits())?;

    let listener = TcpListener::bind(format!("::0:{}", config.port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.port))?;

    info!("Listening on [::]:{}", config.port);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    // The router held the last `Mailer`; the worker now drains and exits.
    if tokio::time::timeout(MAIL_DRAIN_TIMEOUT, mail_worker)
        .await
        .is_err()
    {
        warn!("Mail worker did not finish draining before shutdown");
    }

    pool.close().await;
    info!("Gracefully shutdown");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for ctrl-c: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!("Failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::auth::{NoopRateLimiter, Role};
    use axum::{extract::ConnectInfo, http::StatusCode};
    use secrecy::SecretString;
    use tower::ServiceExt;
    use uuid::Uuid;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn config(environment: Environment, secret: &str) -> ServerConfig {
        ServerConfig {
            port: 8080,
            dsn: "postgres://localhost/recruitment".to_string(),
            http: HttpConfig::new(environment),
            auth: AuthConfig::new(SecretString::from(secret)),
            policy: ApplicationPolicy::new(),
            mail: MailWorkerConfig::new(),
            smtp: None,
            admin_seed: None,
        }
    }

    #[test]
    fn environment_parses() -> Result<()> {
        assert_eq!("Production".parse::<Environment>()?, Environment::Production);
        assert_eq!(" testing ".parse::<Environment>()?, Environment::Testing);
        assert!("staging".parse::<Environment>().is_err());
        Ok(())
    }

    #[test]
    fn development_accepts_short_secret_and_open_cors() {
        assert!(config(Environment::Development, "short").validate().is_ok());
    }

    #[test]
    fn production_requires_strict_settings() {
        let mut prod = config(Environment::Production, "short");
        prod.http = prod
            .http
            .with_cors_allowed_origins(vec!["https://apply.example.edu".to_string()]);
        prod.smtp = Some(SmtpConfig::new(
            "smtp.example.edu".to_string(),
            "no-reply@example.edu".to_string(),
        ));
        assert!(prod.validate().is_err(), "short secret");

        prod.auth = AuthConfig::new(SecretString::from(SECRET));
        assert!(prod.validate().is_ok());

        prod.smtp = None;
        assert!(prod.validate().is_err(), "missing smtp");
    }

    #[test]
    fn production_rejects_wildcard_and_empty_cors() {
        let mut prod = config(Environment::Production, SECRET);
        prod.smtp = Some(SmtpConfig::new(
            "smtp.example.edu".to_string(),
            "no-reply@example.edu".to_string(),
        ));
        assert!(prod.validate().is_err(), "empty origins");

        prod.http = prod.http.with_cors_allowed_origins(vec!["*".to_string()]);
        assert!(prod.validate().is_err(), "wildcard origin");
    }

    #[test]
    fn invalid_cors_origin_is_rejected() {
        let http = HttpConfig::new(Environment::Development)
            .with_cors_allowed_origins(vec!["https://bad\norigin".to_string()]);
        assert!(cors_layer(&http).is_err());
    }

    fn test_state() -> Result<(AppState, Arc<AuthState>)> {
        let pool = PgPoolOptions::new()
            .acquire_timeout(Duration::from_millis(200))
            .connect_lazy("postgres://recruitment@127.0.0.1:1/recruitment")?;
        let auth = Arc::new(AuthState::new(AuthConfig::new(SecretString::from(SECRET))));
        let (mailer, _worker) = spawn_mail_worker(LogTransport, MailWorkerConfig::new());
        let state = AppState {
            pool,
            auth: auth.clone(),
            policy: ApplicationPolicy::new(),
            mailer,
        };
        Ok((state, auth))
    }

    fn test_app(
        environment: Environment,
        limits: &RateLimits,
    ) -> Result<(Router, Arc<AuthState>)> {
        let (state, auth) = test_state()?;
        let app = app(state, &HttpConfig::new(environment), limits)?;
        Ok((app, auth))
    }

    fn bearer(auth: &AuthState, role: Role) -> Result<String> {
        let issued = auth
            .tokens()
            .issue(Uuid::new_v4(), "someone@example.edu", role)?;
        Ok(format!("Bearer {}", issued.token))
    }

    fn get(uri: &str, authorization: Option<&str>) -> Result<Request<Body>> {
        let mut builder = Request::builder().uri(uri);
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        Ok(builder.body(Body::empty())?)
    }

    #[tokio::test]
    async fn health_reports_unavailable_database_with_request_id() -> Result<()> {
        let (app, _) = test_app(Environment::Development, &RateLimits::unlimited())?;
        let response = app.oneshot(get("/health", None)?).await?;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(response.headers().contains_key(REQUEST_ID));
        Ok(())
    }

    #[tokio::test]
    async fn request_id_is_propagated() -> Result<()> {
        let (app, _) = test_app(Environment::Development, &RateLimits::unlimited())?;
        let request = Request::builder()
            .uri("/health")
            .header(REQUEST_ID, "01HZZZTESTREQUEST")
            .body(Body::empty())?;
        let response = app.oneshot(request).await?;
        assert_eq!(
            response.headers().get(REQUEST_ID).and_then(|v| v.to_str().ok()),
            Some("01HZZZTESTREQUEST")
        );
        Ok(())
    }

    #[tokio::test]
    async fn protected_routes_require_a_token() -> Result<()> {
        let (app, _) = test_app(Environment::Development, &RateLimits::unlimited())?;
        for uri in [
            "/api/v1/auth/profile",
            "/api/v1/applications/me",
            "/api/v1/users",
            "/api/v1/reviews/stats",
        ] {
            let response = app.clone().oneshot(get(uri, None)?).await?;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
        }

        let response = app
            .oneshot(get("/api/v1/users", Some("Bearer not-a-token"))?)
            .await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn group_allow_sets_reject_other_roles() -> Result<()> {
        let (app, auth) = test_app(Environment::Development, &RateLimits::unlimited())?;
        let applicant = bearer(&auth, Role::Applicant)?;
        let admin = bearer(&auth, Role::Admin)?;

        let response = app
            .clone()
            .oneshot(get("/api/v1/users", Some(&applicant))?)
            .await?;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app
            .clone()
            .oneshot(get("/api/v1/reviews/applications", Some(&applicant))?)
            .await?;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let verify = Request::builder()
            .method(Method::PUT)
            .uri(format!("/api/v1/admin/users/{}/verify", Uuid::new_v4()))
            .header(AUTHORIZATION, admin)
            .body(Body::empty())?;
        let response = app.oneshot(verify).await?;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        Ok(())
    }

    #[tokio::test]
    async fn questions_require_department_parameter() -> Result<()> {
        let (app, _) = test_app(Environment::Development, &RateLimits::unlimited())?;
        let response = app.clone().oneshot(get("/api/v1/questions", None)?).await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(get("/api/v1/questions?dept=marketing", None)?)
            .await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    fn from_peer(uri: &str, peer: SocketAddr, forwarded_for: &str) -> Result<Request<Body>> {
        let mut request = Request::builder()
            .uri(uri)
            .header("x-forwarded-for", forwarded_for)
            .body(Body::empty())?;
        request.extensions_mut().insert(ConnectInfo(peer));
        Ok(request)
    }

    #[tokio::test]
    async fn strict_tier_limits_auth_routes() -> Result<()> {
        let limits = RateLimits {
            strict: Arc::new(GovernorLimiter::per_minute(1)),
            default: Arc::new(NoopRateLimiter),
            trust_proxy_headers: false,
        };
        let (app, _) = test_app(Environment::Development, &limits)?;

        let first = app
            .clone()
            .oneshot(get("/api/v1/auth/profile", None)?)
            .await?;
        assert_eq!(first.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            first
                .headers()
                .get("x-ratelimit-remaining")
                .and_then(|v| v.to_str().ok()),
            Some("0")
        );

        let second = app.oneshot(get("/api/v1/auth/profile", None)?).await?;
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(second.headers().contains_key("retry-after"));
        Ok(())
    }

    #[tokio::test]
    async fn spoofed_forwarded_for_shares_the_peer_bucket() -> Result<()> {
        let limits = RateLimits {
            strict: Arc::new(GovernorLimiter::per_minute(1)),
            default: Arc::new(NoopRateLimiter),
            trust_proxy_headers: false,
        };
        let (app, _) = test_app(Environment::Development, &limits)?;
        let peer: SocketAddr = "198.51.100.7:40000".parse()?;

        let mut limited = 0;
        for n in 0..20u8 {
            let request = from_peer("/api/v1/auth/profile", peer, &format!("203.0.113.{n}"))?;
            let response = app.clone().oneshot(request).await?;
            if response.status() == StatusCode::TOO_MANY_REQUESTS {
                limited += 1;
            }
        }
        assert_eq!(limited, 19);

        let other_peer = from_peer("/api/v1/auth/profile", "198.51.100.8:40000".parse()?, "x")?;
        let response = app.oneshot(other_peer).await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn trusted_proxy_headers_key_per_client() -> Result<()> {
        let limits = RateLimits {
            strict: Arc::new(GovernorLimiter::per_minute(1)),
            default: Arc::new(NoopRateLimiter),
            trust_proxy_headers: true,
        };
        let (app, _) = test_app(Environment::Development, &limits)?;
        let proxy: SocketAddr = "10.0.0.2:8443".parse()?;

        for client in ["203.0.113.1", "203.0.113.2"] {
            let response = app
                .clone()
                .oneshot(from_peer("/api/v1/auth/profile", proxy, client)?)
                .await?;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }
        let repeat = app
            .oneshot(from_peer("/api/v1/auth/profile", proxy, "203.0.113.1")?)
            .await?;
        assert_eq!(repeat.status(), StatusCode::TOO_MANY_REQUESTS);
        Ok(())
    }

    #[tokio::test]
    async fn docs_are_hidden_in_production() -> Result<()> {
        let (dev, _) = test_app(Environment::Development, &RateLimits::unlimited())?;
        let response = dev.oneshot(get("/api-docs/openapi.json", None)?).await?;
        assert_eq!(response.status(), StatusCode::OK);

        let (prod, _) = test_app(Environment::Production, &RateLimits::unlimited())?;
        let response = prod.oneshot(get("/api-docs/openapi.json", None)?).await?;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        Ok(())
    }
}
