//! Observability setup for ledgerbot: tracing subscriber with optional
//! OpenTelemetry export.

pub mod tracing_setup;
