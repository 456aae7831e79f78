//! Auth configuration and shared auth state.

use secrecy::SecretString;

use super::token::{TokenService, DEFAULT_TOKEN_TTL_SECONDS};

const DEFAULT_VERIFICATION_TTL_SECONDS: u64 = 10 * 60;
const DEFAULT_RESET_TTL_SECONDS: u64 = 30 * 60;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    jwt_secret: SecretString,
    token_ttl_seconds: u64,
    verification_ttl_seconds: u64,
    reset_ttl_seconds: u64,
    allowed_email_domains: Vec<String>,
}

impl AuthConfig {
    #[must_use]
    pub fn new(jwt_secret: SecretString) -> Self {
        Self {
            jwt_secret,
            token_ttl_seconds: DEFAULT_TOKEN_TTL_SECONDS,
            verification_ttl_seconds: DEFAULT_VERIFICATION_TTL_SECONDS,
            reset_ttl_seconds: DEFAULT_RESET_TTL_SECONDS,
            allowed_email_domains: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_token_ttl_seconds(mut self, seconds: u64) -> Self {
        self.token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_verification_ttl_seconds(mut self, seconds: u64) -> Self {
        self.verification_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_reset_ttl_seconds(mut self, seconds: u64) -> Self {
        self.reset_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_allowed_email_domains(mut self, domains: Vec<String>) -> Self {
        self.allowed_email_domains = domains
            .into_iter()
            .map(|domain| domain.trim().trim_start_matches('@').to_lowercase())
            .filter(|domain| !domain.is_empty())
            .collect();
        self
    }

    #[must_use]
    pub fn jwt_secret(&self) -> &SecretString {
        &self.jwt_secret
    }

    #[must_use]
    pub fn token_ttl_seconds(&self) -> u64 {
        self.token_ttl_seconds
    }

    #[must_use]
    pub fn verification_ttl_seconds(&self) -> u64 {
        self.verification_ttl_seconds
    }

    #[must_use]
    pub fn reset_ttl_seconds(&self) -> u64 {
        self.reset_ttl_seconds
    }

    #[must_use]
    pub fn allowed_email_domains(&self) -> &[String] {
        &self.allowed_email_domains
    }

    /// An empty allow list accepts every domain.
    #[must_use]
    pub fn email_domain_allowed(&self, email_normalized: &str) -> bool {
        if self.allowed_email_domains.is_empty() {
            return true;
        }
        email_normalized
            .rsplit_once('@')
            .is_some_and(|(_, domain)| self.allowed_email_domains.iter().any(|d| d == domain))
    }
}

#[derive(Debug)]
pub struct AuthState {
    config: AuthConfig,
    tokens: TokenService,
}

impl AuthState {
    #[must_use]
    pub fn new(config: AuthConfig) -> Self {
        let tokens = TokenService::new(config.jwt_secret(), config.token_ttl_seconds());
        Self { config, tokens }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = AuthConfig::new(SecretString::from("secret"));
        assert_eq!(config.token_ttl_seconds(), 86_400);
        assert_eq!(config.verification_ttl_seconds(), 600);
        assert_eq!(config.reset_ttl_seconds(), 1800);
        assert!(config.allowed_email_domains().is_empty());
        assert!(config.email_domain_allowed("anyone@anywhere.org"));
    }

    #[test]
    fn domain_restriction() {
        let config = AuthConfig::new(SecretString::from("secret"))
            .with_allowed_email_domains(vec!["@Allowed.edu".to_string(), " ".to_string()]);
        assert_eq!(config.allowed_email_domains(), ["allowed.edu".to_string()]);
        assert!(config.email_domain_allowed("a@allowed.edu"));
        assert!(!config.email_domain_allowed("a@sub.allowed.edu"));
        assert!(!config.email_domain_allowed("a@elsewhere.com"));
        assert!(!config.email_domain_allowed("no-at-sign"));
    }

    #[test]
    fn state_uses_configured_ttl() {
        let state = AuthState::new(
            AuthConfig::new(SecretString::from("0123456789abcdef0123456789abcdef"))
                .with_token_ttl_seconds(120),
        );
        assert_eq!(state.tokens().ttl_seconds(), 120);
    }
}
