//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Client, interceptors and backends produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters and histograms via the `metrics` facade)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → whatever metrics recorder the application installs
//! ```
//!
//! # Design Decisions
//! - Structured fields on every event (method, url, status, elapsed)
//! - The library never installs a metrics recorder; without one, recording
//!   is a no-op
//! - `RUST_LOG` overrides the configured level

pub mod logging;
pub mod metrics;
