//! # callroute-observability
//!
//! Observability-Crate fuer Callroute:
//! - Prometheus-kompatible Metriken des Routing-Automaten
//! - Structured Logging via tracing-subscriber (Text oder JSON)

pub mod logging;
pub mod metrics;

pub use logging::logging_initialisieren;
pub use metrics::RoutingMetrics;
