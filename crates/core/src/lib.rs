//! Folio core services
//!
//! Shared plumbing for the site crates: the observer list and event bus that
//! components talk through, fault classification with retry bookkeeping,
//! and the performance monitor.

pub mod error_handler;
pub mod events;
pub mod export;
pub mod performance;

// Re-export common types
pub use error_handler::{
    ErrorCategory, ErrorHandler, ErrorHandlerConfig, ErrorInfo, ErrorRecord, Failure, Fault,
    FaultKind, HandleOptions, LogFilter, RetryError, RetryFn, RetryOptions, Severity,
};
pub use events::{
    Event, EventBus, ListenerError, ListenerResult, ObserverId, ObserverList, Subscription,
};
pub use export::{ExportError, ExportFormat};
pub use performance::{
    HeapMeter, Metric, MetricEntry, MetricFilter, PerformanceMonitor, PerformanceReport,
    ThresholdPatch, Thresholds,
};
