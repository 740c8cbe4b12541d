//! OpenTelemetry observability infrastructure.
//!
//! Provides:
//! - Structured tracing via `tracing-subscriber`
//! - OTLP metrics for checks, placements and storage failures

pub mod metrics;
pub mod tracing;
