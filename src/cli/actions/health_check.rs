use anyhow::{Context, Result};
use sqlx::{postgres::PgPoolOptions, Connection};
use std::time::Duration;
use tracing::error;

/// Overall budget for connecting and pinging.
pub const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub struct Args {
    pub dsn: String,
}

async fn check(dsn: &str) -> Result<()> {
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(HEALTH_CHECK_TIMEOUT)
        .connect(dsn)
        .await
        .context("Failed to connect to database")?;

    let result = async {
        let mut conn = pool.acquire().await?;
        conn.ping().await
    }
    .await
    .context("Failed to ping database");

    pool.close().await;
    result
}

/// Probe the database once and exit with `0` when healthy, `1` otherwise.
/// # Errors
/// Never returns on failure; the process exits with status 1.
pub async fn execute(args: Args) -> Result<()> {
    match tokio::time::timeout(HEALTH_CHECK_TIMEOUT, check(&args.dsn)).await {
        Ok(Ok(())) => {
            println!("Health check passed");
            Ok(())
        }
        Ok(Err(err)) => {
            error!("Health check failed: {err:#}");
            eprintln!("Health check failed: {err:#}");
            std::process::exit(1);
        }
        Err(_) => {
            error!("Health check timed out after {HEALTH_CHECK_TIMEOUT:?}");
            eprintln!("Health check timed out after {HEALTH_CHECK_TIMEOUT:?}");
            std::process::exit(1);
        }
    }
}
