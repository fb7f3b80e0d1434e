//! Observability for pipeline execution
//!
//! - Structured logging (JSON lines)
//! - Atomic counters
//! - Typed lifecycle events
//!
//! Observability is read-only: nothing here influences execution results.

mod events;
mod logger;
mod metrics;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{ExecutionMetrics, MetricsSnapshot};
