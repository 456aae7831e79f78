//! Log subscriber setup with an optional OTLP/gRPC span exporter.
//!
//! Spans are exported only when `OTEL_EXPORTER_OTLP_ENDPOINT` is set. `https`
//! endpoints are dialed with TLS against the platform's native roots.

use anyhow::{anyhow, Context, Result};
use opentelemetry::{global, propagation::TextMapCompositePropagator, trace::TracerProvider as _};
use opentelemetry::KeyValue;
use opentelemetry_otlp::{Compression, SpanExporter, WithExportConfig, WithTonicConfig};
use opentelemetry_sdk::{
    propagation::{BaggagePropagator, TraceContextPropagator},
    trace::{SdkTracerProvider, Tracer},
    Resource,
};
use std::{env::var, sync::OnceLock, time::Duration};
use tonic::{
    metadata::{Ascii, MetadataKey, MetadataMap, MetadataValue},
    transport::ClientTlsConfig,
};
use tracing::{debug, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};
use ulid::Ulid;

const ENDPOINT_ENV: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";
const EXPORT_TIMEOUT: Duration = Duration::from_secs(3);

static PROVIDER: OnceLock<SdkTracerProvider> = OnceLock::new();

/// Where and how spans are shipped, read from the standard `OTEL_*` variables.
#[derive(Debug)]
struct ExporterSettings {
    endpoint: String,
    tls: bool,
    metadata: MetadataMap,
    instance_id: String,
}

impl ExporterSettings {
    fn from_env() -> Result<Self> {
        if let Ok(protocol) = var("OTEL_EXPORTER_OTLP_PROTOCOL") {
            if protocol != "grpc" {
                debug!(%protocol, "only the grpc OTLP protocol is supported, ignoring");
            }
        }

        let raw = var(ENDPOINT_ENV).with_context(|| format!("{ENDPOINT_ENV} is not set"))?;
        let endpoint = match raw.split_once("://") {
            Some(("http" | "https", _)) => raw.trim_end_matches('/').to_string(),
            Some((scheme, _)) => {
                return Err(anyhow!("unsupported OTLP endpoint scheme '{scheme}'"));
            }
            None => format!("http://{}", raw.trim_end_matches('/')),
        };

        Ok(Self {
            tls: endpoint.starts_with("https://"),
            endpoint,
            metadata: metadata_from(&var("OTEL_EXPORTER_OTLP_HEADERS").unwrap_or_default())?,
            instance_id: var("OTEL_SERVICE_INSTANCE_ID")
                .unwrap_or_else(|_| Ulid::new().to_string()),
        })
    }

    fn exporter(self) -> Result<SpanExporter> {
        let mut builder = SpanExporter::builder()
            .with_tonic()
            .with_endpoint(&self.endpoint)
            .with_compression(Compression::Gzip)
            .with_timeout(EXPORT_TIMEOUT)
            .with_metadata(self.metadata);
        if self.tls {
            builder = builder.with_tls_config(ClientTlsConfig::new().with_native_roots());
        }
        Ok(builder.build()?)
    }
}

/// Parse `key=value,key2=value2` into gRPC metadata. Pairs without `=` are skipped.
fn metadata_from(headers: &str) -> Result<MetadataMap> {
    let mut metadata = MetadataMap::new();
    for (key, value) in headers.split(',').filter_map(|pair| pair.split_once('=')) {
        let key = key.trim().to_ascii_lowercase();
        let name = MetadataKey::<Ascii>::from_bytes(key.as_bytes())
            .map_err(|e| anyhow!("invalid OTLP header name {key}: {e}"))?;
        let value: MetadataValue<Ascii> = value
            .trim()
            .parse()
            .map_err(|e| anyhow!("invalid OTLP header value for {key}: {e}"))?;
        metadata.insert(name, value);
    }
    Ok(metadata)
}

fn init_tracer() -> Result<Tracer> {
    let settings = ExporterSettings::from_env()?;
    let resource = Resource::builder_empty()
        .with_attributes([
            KeyValue::new("service.name", env!("CARGO_PKG_NAME")),
            KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
            KeyValue::new("service.instance.id", settings.instance_id.clone()),
        ])
        .build();

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(settings.exporter()?)
        .with_resource(resource)
        .build();

    let _ = PROVIDER.set(provider.clone());
    global::set_tracer_provider(provider.clone());
    global::set_text_map_propagator(TextMapCompositePropagator::new(vec![
        Box::new(TraceContextPropagator::new()),
        Box::new(BaggagePropagator::new()),
    ]));

    Ok(provider.tracer(env!("CARGO_PKG_NAME")))
}

/// Install the global subscriber. `None` verbosity logs errors only.
///
/// # Errors
///
/// Returns an error if the OTLP exporter cannot be configured or a global
/// subscriber is already installed.
pub fn init(verbosity_level: Option<Level>) -> Result<()> {
    let fmt_layer = fmt::layer()
        .with_file(false)
        .with_line_number(false)
        .with_target(false)
        .pretty();

    let filter = EnvFilter::builder()
        .with_default_directive(verbosity_level.unwrap_or(Level::ERROR).into())
        .from_env_lossy()
        .add_directive("hyper=error".parse()?)
        .add_directive("tokio=error".parse()?)
        .add_directive("sqlx=warn".parse()?)
        .add_directive("opentelemetry_sdk=warn".parse()?);

    let otel_layer = if var(ENDPOINT_ENV).is_ok() {
        Some(tracing_opentelemetry::layer().with_tracer(init_tracer()?))
    } else {
        None
    };

    let subscriber = Registry::default().with(fmt_layer).with(otel_layer).with(filter);
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Flush and stop the span exporter, if one was started.
pub fn shutdown_tracer() {
    if let Some(provider) = PROVIDER.get() {
        debug!("shutting down tracer provider");
        let _ = provider.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(vars: &[(&str, Option<&str>)]) -> Result<ExporterSettings> {
        temp_env::with_vars(vars, ExporterSettings::from_env)
    }

    #[test]
    fn bare_host_defaults_to_plaintext() -> Result<()> {
        let settings = settings(&[
            (ENDPOINT_ENV, Some("collector:4317/")),
            ("OTEL_EXPORTER_OTLP_HEADERS", None),
        ])?;
        assert_eq!(settings.endpoint, "http://collector:4317");
        assert!(!settings.tls);
        assert!(settings.metadata.is_empty());
        Ok(())
    }

    #[test]
    fn https_endpoint_enables_tls() -> Result<()> {
        let settings = settings(&[
            (ENDPOINT_ENV, Some("https://otel.recruitment.dev:4317")),
            ("OTEL_SERVICE_INSTANCE_ID", Some("node-a")),
        ])?;
        assert_eq!(settings.endpoint, "https://otel.recruitment.dev:4317");
        assert!(settings.tls);
        assert_eq!(settings.instance_id, "node-a");
        Ok(())
    }

    #[test]
    fn unknown_scheme_is_rejected() {
        let err = settings(&[(ENDPOINT_ENV, Some("udp://collector:4317"))])
            .err()
            .map(|e| e.to_string())
            .unwrap_or_default();
        assert!(err.contains("unsupported OTLP endpoint scheme 'udp'"));
    }

    #[test]
    fn headers_become_lowercase_metadata() -> Result<()> {
        let metadata = metadata_from("Authorization = Bearer abc ,malformed, x-tenant=hr")?;
        assert_eq!(metadata.len(), 2);
        assert_eq!(
            metadata.get("authorization").and_then(|v| v.to_str().ok()),
            Some("Bearer abc")
        );
        assert!(metadata.get("x-tenant").is_some());
        Ok(())
    }

    #[test]
    fn invalid_header_name_is_an_error() {
        assert!(metadata_from("bad key=value").is_err());
    }

    #[test]
    fn shutdown_without_provider_is_a_noop() {
        shutdown_tracer();
    }
}
