//! Observability for the Engram memory engine: config-driven tracing
//! subscriber setup with optional OpenTelemetry export, owned by a guard.

pub mod telemetry;

pub use telemetry::Telemetry;
