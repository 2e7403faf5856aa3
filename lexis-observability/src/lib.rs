//! # lexis-observability
//!
//! Subscriber installation, span macros, and named structured events.
//! Library crates only emit events; the host decides whether to call
//! [`init_tracing`].

pub mod tracing_setup;

pub use tracing_setup::{events, init_tracing, init_tracing_with_filter, LOG_ENV_VAR};
