use crate::cli::actions::{hash_password, health_check, jwt_secret, server, Action};
use anyhow::Result;

/// Execute the provided action.
/// # Errors
/// Returns an error if the action fails.
pub async fn execute(action: Action) -> Result<()> {
    match action {
        Action::Server(args) => server::execute(args).await,
        Action::HealthCheck(args) => health_check::execute(args).await,
        Action::GenerateJwtSecret => jwt_secret::execute(),
        Action::HashPassword(args) => hash_password::execute(args).await,
    }
}
