//! Tracing subscriber setup for the memory engine.
//!
//! One structured `fmt` layer with span close events, so turn handling and
//! compression cycles report their latency in the log stream, plus an
//! optional OpenTelemetry stdout exporter bridged from the same spans.
//! `RUST_LOG` overrides the configured filter when set.

use engram_types::config::TelemetryConfig;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Owns the installed telemetry pipeline.
///
/// Hold the guard for the life of the process; dropping it flushes and
/// shuts down the OpenTelemetry exporter when one was enabled.
pub struct Telemetry {
    provider: Option<SdkTracerProvider>,
}

impl Telemetry {
    /// Install the global tracing subscriber per `config`.
    ///
    /// # Errors
    ///
    /// Fails if a global subscriber is already set.
    pub fn init(config: &TelemetryConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE);
        let registry = tracing_subscriber::registry().with(filter).with(fmt_layer);

        let provider = if config.otel_export {
            let provider = SdkTracerProvider::builder()
                .with_simple_exporter(opentelemetry_stdout::SpanExporter::default())
                .build();
            let tracer = provider.tracer("engram");
            registry
                .with(tracing_opentelemetry::layer().with_tracer(tracer))
                .try_init()?;
            opentelemetry::global::set_tracer_provider(provider.clone());
            Some(provider)
        } else {
            registry.try_init()?;
            None
        };

        Ok(Self { provider })
    }
}

impl Drop for Telemetry {
    fn drop(&mut self) {
        if let Some(provider) = self.provider.take() {
            if let Err(error) = provider.shutdown() {
                eprintln!("telemetry shutdown: {error}");
            }
        }
    }
}
