//! Outbound mail queue and delivery worker.
//!
//! Handlers hand messages to a `Mailer`, which pushes them onto a bounded
//! channel without waiting. A single worker task drains the channel and delivers
//! through a `MailTransport`:
//!
//! - **Backpressure:** a full queue is reported to the caller as `MailError::QueueFull`
//!   instead of blocking the request.
//! - **Retries:** failed deliveries are retried with exponential backoff and jitter
//!   up to `max_attempts`, then dropped with an error log.
//! - **Connections:** the SMTP session is opened lazily on the first message and
//!   closed after `idle_timeout` without traffic.
//! - **Shutdown:** once every `Mailer` clone is dropped the worker drains what is
//!   left in the queue and exits.
//!
//! Without an SMTP host the `LogTransport` is used, which only logs recipients and subjects.

pub mod templates;

use anyhow::{Context, Result};
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use rand::Rng;
use secrecy::{ExposeSecret, SecretString};
use std::{future::Future, time::Duration};
use tokio::{
    sync::mpsc::{self, error::TrySendError},
    task::JoinHandle,
    time::{sleep, timeout},
};
use tracing::{debug, error, info, warn};

use crate::api::handlers::error::ApiError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MailError {
    #[error("mail queue is full")]
    QueueFull,
    #[error("mail worker is not running")]
    Closed,
}

impl From<MailError> for ApiError {
    fn from(err: MailError) -> Self {
        warn!("Email could not be queued: {err}");
        Self::Unavailable("Email service is temporarily unavailable, please try again later")
    }
}

/// Delivery backend driven by the mail worker.
pub trait MailTransport: Send + 'static {
    /// Deliver one message, opening a connection if needed.
    fn send(&mut self, message: &OutboundEmail) -> impl Future<Output = Result<()>> + Send;

    /// Drop any open connection. The next `send` reconnects.
    fn close(&mut self);
}

/// Transport used when no SMTP relay is configured.
#[derive(Clone, Debug, Default)]
pub struct LogTransport;

impl MailTransport for LogTransport {
    async fn send(&mut self, message: &OutboundEmail) -> Result<()> {
        info!(
            to_email = %message.to,
            subject = %message.subject,
            "email delivery stub"
        );
        Ok(())
    }

    fn close(&mut self) {}
}

#[derive(Clone, Debug)]
pub struct SmtpConfig {
    host: String,
    port: u16,
    username: Option<String>,
    password: Option<SecretString>,
    from: String,
}

impl SmtpConfig {
    #[must_use]
    pub fn new(host: String, from: String) -> Self {
        Self {
            host,
            port: 587,
            username: None,
            password: None,
            from,
        }
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn with_credentials(mut self, username: String, password: SecretString) -> Self {
        self.username = Some(username);
        self.password = Some(password);
        self
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    #[must_use]
    pub fn from(&self) -> &str {
        &self.from
    }
}

/// STARTTLS SMTP relay with a lazily opened, idle-closed session.
pub struct SmtpTransport {
    config: SmtpConfig,
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
}

impl SmtpTransport {
    #[must_use]
    pub fn new(config: SmtpConfig) -> Self {
        Self {
            config,
            transport: None,
        }
    }

    fn connect(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.host)
            .with_context(|| format!("invalid SMTP relay host: {}", self.config.host))?
            .port(self.config.port);

        if let (Some(username), Some(password)) = (&self.config.username, &self.config.password) {
            builder = builder.credentials(Credentials::new(
                username.clone(),
                password.expose_secret().to_string(),
            ));
        }

        Ok(builder.build())
    }
}

impl MailTransport for SmtpTransport {
    async fn send(&mut self, message: &OutboundEmail) -> Result<()> {
        if self.transport.is_none() {
            debug!("opening SMTP connection to {}", self.config.host);
            self.transport = Some(self.connect()?);
        }
        let transport = self
            .transport
            .as_ref()
            .context("SMTP transport is not connected")?;

        let email = Message::builder()
            .from(
                self.config
                    .from
                    .parse()
                    .with_context(|| format!("invalid sender address: {}", self.config.from))?,
            )
            .to(message
                .to
                .parse()
                .with_context(|| format!("invalid recipient address: {}", message.to))?)
            .subject(message.subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(message.body.clone())
            .context("failed to build email")?;

        transport.send(email).await.context("SMTP delivery failed")?;
        Ok(())
    }

    fn close(&mut self) {
        if self.transport.take().is_some() {
            debug!("closing SMTP connection to {}", self.config.host);
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct MailWorkerConfig {
    queue_capacity: usize,
    idle_timeout: Duration,
    max_attempts: u32,
    backoff_base: Duration,
    backoff_max: Duration,
}

impl MailWorkerConfig {
    /// Default worker config: 100 queued messages, 30s idle timeout,
    /// 3 attempts, and 1s->30s exponential backoff with jitter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            queue_capacity: 100,
            idle_timeout: Duration::from_secs(30),
            max_attempts: 3,
            backoff_base: Duration::from_secs(1),
            backoff_max: Duration::from_secs(30),
        }
    }

    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_idle_timeout_seconds(mut self, seconds: u64) -> Self {
        self.idle_timeout = Duration::from_secs(seconds);
        self
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    #[must_use]
    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.backoff_base = base;
        self.backoff_max = max;
        self
    }

    #[must_use]
    pub fn normalize(self) -> Self {
        let idle_timeout = if self.idle_timeout.is_zero() {
            Duration::from_secs(1)
        } else {
            self.idle_timeout
        };
        let backoff_max = if self.backoff_max < self.backoff_base {
            self.backoff_base
        } else {
            self.backoff_max
        };
        Self {
            queue_capacity: self.queue_capacity.max(1),
            idle_timeout,
            max_attempts: self.max_attempts.max(1),
            backoff_base: self.backoff_base,
            backoff_max,
        }
    }

    #[must_use]
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

impl Default for MailWorkerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Producer handle for the mail queue.
#[derive(Clone, Debug)]
pub struct Mailer {
    tx: mpsc::Sender<OutboundEmail>,
}

impl Mailer {
    /// Queue a message without waiting for room.
    ///
    /// # Errors
    /// `MailError::QueueFull` when the queue is at capacity, `MailError::Closed`
    /// when the worker has stopped.
    pub fn enqueue(&self, message: OutboundEmail) -> Result<(), MailError> {
        self.tx.try_send(message).map_err(|err| match err {
            TrySendError::Full(_) => MailError::QueueFull,
            TrySendError::Closed(_) => MailError::Closed,
        })
    }
}

/// Spawn the single mail worker and return the producer handle.
pub fn spawn_mail_worker<T: MailTransport>(
    transport: T,
    config: MailWorkerConfig,
) -> (Mailer, JoinHandle<()>) {
    let config = config.normalize();
    let (tx, rx) = mpsc::channel(config.queue_capacity());
    let handle = tokio::spawn(run_worker(rx, transport, config));
    (Mailer { tx }, handle)
}

async fn run_worker<T: MailTransport>(
    mut rx: mpsc::Receiver<OutboundEmail>,
    mut transport: T,
    config: MailWorkerConfig,
) {
    let mut connected = false;

    loop {
        match timeout(config.idle_timeout(), rx.recv()).await {
            Ok(Some(message)) => {
                deliver(&mut transport, &message, &config).await;
                connected = true;
            }
            Ok(None) => {
                transport.close();
                info!("mail worker stopped");
                break;
            }
            Err(_) => {
                if connected {
                    debug!("mail transport idle, closing connection");
                    transport.close();
                    connected = false;
                }
            }
        }
    }
}

async fn deliver<T: MailTransport>(
    transport: &mut T,
    message: &OutboundEmail,
    config: &MailWorkerConfig,
) {
    for attempt in 1..=config.max_attempts {
        match transport.send(message).await {
            Ok(()) => {
                debug!(to_email = %message.to, attempt, "email delivered");
                return;
            }
            Err(err) => {
                warn!(to_email = %message.to, attempt, "email delivery failed: {err:#}");
                transport.close();
                if attempt < config.max_attempts {
                    sleep(backoff_delay(attempt, config.backoff_base, config.backoff_max)).await;
                }
            }
        }
    }
    error!(
        to_email = %message.to,
        attempts = config.max_attempts,
        "dropping email after repeated delivery failures"
    );
}

fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let shift = attempt.saturating_sub(1).min(31);
    let factor = 1u32 << shift;
    let delay = base.checked_mul(factor).unwrap_or(max);
    let capped = if delay > max { max } else { delay };
    jitter_delay(capped)
}

fn jitter_delay(delay: Duration) -> Duration {
    let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
    if delay_ms < 2 {
        return delay;
    }
    let half = delay_ms / 2;
    let jitter = rand::thread_rng().gen_range(0..=half);
    Duration::from_millis(half + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct RecordingTransport {
        sent: Arc<Mutex<Vec<OutboundEmail>>>,
        closes: Arc<Mutex<u32>>,
        failures_left: Arc<Mutex<u32>>,
    }

    impl MailTransport for RecordingTransport {
        async fn send(&mut self, message: &OutboundEmail) -> Result<()> {
            {
                let mut failures = self.failures_left.lock().unwrap_or_else(|e| e.into_inner());
                if *failures > 0 {
                    *failures -= 1;
                    return Err(anyhow::anyhow!("transient failure"));
                }
            }
            self.sent
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(message.clone());
            Ok(())
        }

        fn close(&mut self) {
            *self.closes.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        }
    }

    fn email(to: &str) -> OutboundEmail {
        OutboundEmail {
            to: to.to_string(),
            subject: "subject".to_string(),
            body: "body".to_string(),
        }
    }

    fn fast_config() -> MailWorkerConfig {
        MailWorkerConfig::new()
            .with_max_attempts(3)
            .with_backoff(Duration::from_millis(1), Duration::from_millis(2))
    }

    #[tokio::test]
    async fn worker_drains_queue_on_shutdown() -> Result<()> {
        let transport = RecordingTransport::default();
        let sent = transport.sent.clone();
        let (mailer, handle) = spawn_mail_worker(transport, fast_config());

        mailer.enqueue(email("a@allowed.edu"))?;
        mailer.enqueue(email("b@allowed.edu"))?;
        drop(mailer);
        handle.await?;

        let sent = sent.lock().unwrap_or_else(|e| e.into_inner());
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].to, "a@allowed.edu");
        assert_eq!(sent[1].to, "b@allowed.edu");
        Ok(())
    }

    #[tokio::test]
    async fn transient_failures_are_retried() -> Result<()> {
        let transport = RecordingTransport::default();
        *transport.failures_left.lock().unwrap_or_else(|e| e.into_inner()) = 2;
        let sent = transport.sent.clone();
        let (mailer, handle) = spawn_mail_worker(transport, fast_config());

        mailer.enqueue(email("a@allowed.edu"))?;
        drop(mailer);
        handle.await?;

        assert_eq!(sent.lock().unwrap_or_else(|e| e.into_inner()).len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn full_queue_is_reported() -> Result<()> {
        let (tx, _rx) = mpsc::channel(1);
        let mailer = Mailer { tx };
        mailer.enqueue(email("a@allowed.edu"))?;
        assert_eq!(
            mailer.enqueue(email("b@allowed.edu")),
            Err(MailError::QueueFull)
        );
        Ok(())
    }

    #[tokio::test]
    async fn closed_queue_is_reported() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let mailer = Mailer { tx };
        assert_eq!(mailer.enqueue(email("a@allowed.edu")), Err(MailError::Closed));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_connection_is_closed() -> Result<()> {
        let transport = RecordingTransport::default();
        let closes = transport.closes.clone();
        let config = fast_config().with_idle_timeout_seconds(5);
        let (mailer, handle) = spawn_mail_worker(transport, config);

        mailer.enqueue(email("a@allowed.edu"))?;
        tokio::time::sleep(Duration::from_secs(12)).await;
        assert_eq!(*closes.lock().unwrap_or_else(|e| e.into_inner()), 1);

        drop(mailer);
        handle.await?;
        assert_eq!(*closes.lock().unwrap_or_else(|e| e.into_inner()), 2);
        Ok(())
    }

    #[test]
    fn backoff_is_capped() {
        let base = Duration::from_secs(1);
        let max = Duration::from_secs(30);
        for attempt in 1..10 {
            let delay = backoff_delay(attempt, base, max);
            assert!(delay <= max);
        }
        let first = backoff_delay(1, base, max);
        assert!(first >= Duration::from_millis(500) && first <= base);
    }

    #[test]
    fn normalize_fixes_degenerate_values() {
        let config = MailWorkerConfig::new()
            .with_queue_capacity(0)
            .with_idle_timeout_seconds(0)
            .with_max_attempts(0)
            .normalize();
        assert_eq!(config.queue_capacity(), 1);
        assert_eq!(config.idle_timeout(), Duration::from_secs(1));
        assert_eq!(config.max_attempts(), 1);
    }
}
