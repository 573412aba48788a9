//! Error classification, retry bookkeeping and the bounded error log
//!
//! Faults raised anywhere on the site are turned into one of five
//! user-facing categories. Classification is heuristic: it looks at the
//! [`FaultKind`] the error reports and at substrings of its message.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::export::{write_csv, ExportError, ExportFormat};

/// Default number of attempts per retry context
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default capacity of the error log
pub const DEFAULT_MAX_LOG_SIZE: usize = 100;

/// Coarse kind of a fault, used ahead of message heuristics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// The request never produced a response (connection, DNS, timeout)
    Transport,
    /// A payload could not be parsed
    Syntax,
    /// Anything else
    Other,
}

/// Errors that can be classified by the [`ErrorHandler`]
pub trait Fault: std::error::Error {
    /// Kind used before falling back to message heuristics
    fn fault_kind(&self) -> FaultKind {
        FaultKind::Other
    }

    /// Short type name recorded in the error log
    fn type_name(&self) -> &'static str {
        "Error"
    }
}

impl Fault for serde_json::Error {
    fn fault_kind(&self) -> FaultKind {
        FaultKind::Syntax
    }

    fn type_name(&self) -> &'static str {
        "SyntaxError"
    }
}

impl Fault for std::io::Error {
    fn type_name(&self) -> &'static str {
        "IoError"
    }
}

/// Ad-hoc fault for callers that have no error type of their own
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct Failure {
    pub kind: FaultKind,
    pub message: String,
}

impl Failure {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl Fault for Failure {
    fn fault_kind(&self) -> FaultKind {
        self.kind
    }
}

/// User-facing error categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Network,
    Parse,
    Resource,
    Permission,
    Generic,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "network",
            ErrorCategory::Parse => "parse",
            ErrorCategory::Resource => "resource",
            ErrorCategory::Permission => "permission",
            ErrorCategory::Generic => "generic",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "Network connection error",
            ErrorCategory::Parse => "Data parsing error",
            ErrorCategory::Resource => "Resource failed to load",
            ErrorCategory::Permission => "Access denied",
            ErrorCategory::Generic => "Operation failed",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            ErrorCategory::Network => {
                "Unable to reach the server, check your connection and try again"
            }
            ErrorCategory::Parse => "The server returned malformed data, please try again later",
            ErrorCategory::Resource => "The requested resource does not exist or has moved",
            ErrorCategory::Permission => "You do not have permission to access this resource",
            ErrorCategory::Generic => "An unknown error occurred, please try again later",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "🌐",
            ErrorCategory::Parse => "📄",
            ErrorCategory::Resource => "📁",
            ErrorCategory::Permission => "🔒",
            ErrorCategory::Generic => "⚠️",
        }
    }

    pub fn suggestions(&self) -> &'static [&'static str] {
        match self {
            ErrorCategory::Network => &[
                "Check your network connection",
                "Try again later",
                "Contact support",
            ],
            ErrorCategory::Parse => &[
                "Refresh the page",
                "Clear the browser cache",
                "Contact support",
            ],
            ErrorCategory::Resource => &[
                "Check that the URL is correct",
                "Contact the site owner",
                "Return to the home page",
            ],
            ErrorCategory::Permission => &[
                "Check that you are signed in",
                "Ask the site owner for access",
                "Return to the home page",
            ],
            ErrorCategory::Generic => &["Refresh the page", "Try again later", "Contact support"],
        }
    }

    /// Whether the UI can recover without a reload
    pub fn recoverable(&self) -> bool {
        matches!(
            self,
            ErrorCategory::Network | ErrorCategory::Parse | ErrorCategory::Generic
        )
    }

    /// Whether retrying the same operation makes sense
    pub fn retryable(&self) -> bool {
        self.recoverable()
    }

    /// Classify a fault by kind first, then by message substrings
    pub fn classify(kind: FaultKind, message: &str) -> Self {
        match kind {
            FaultKind::Transport => return ErrorCategory::Network,
            FaultKind::Syntax => return ErrorCategory::Parse,
            FaultKind::Other => {}
        }

        let lower = message.to_lowercase();
        if lower.contains("404") || lower.contains("not found") {
            ErrorCategory::Resource
        } else if lower.contains("403") || lower.contains("unauthorized") {
            ErrorCategory::Permission
        } else {
            ErrorCategory::Generic
        }
    }
}

/// Severity attached to a logged error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

/// Options for [`ErrorHandler::handle_error`]
#[derive(Debug, Clone, Copy)]
pub struct HandleOptions {
    pub severity: Severity,
    pub recoverable: bool,
}

impl Default for HandleOptions {
    fn default() -> Self {
        Self {
            severity: Severity::Error,
            recoverable: true,
        }
    }
}

/// User-facing description of a handled error
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorInfo {
    pub category: ErrorCategory,
    pub title: &'static str,
    pub message: &'static str,
    pub icon: &'static str,
    pub recoverable: bool,
    pub retryable: bool,
    pub suggestions: &'static [&'static str],
}

impl From<ErrorCategory> for ErrorInfo {
    fn from(category: ErrorCategory) -> Self {
        Self {
            category,
            title: category.title(),
            message: category.message(),
            icon: category.icon(),
            recoverable: category.recoverable(),
            retryable: category.retryable(),
            suggestions: category.suggestions(),
        }
    }
}

/// One entry in the error log
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorRecord {
    pub timestamp: DateTime<Utc>,
    pub context: String,
    pub message: String,
    pub error_type: String,
    pub category: ErrorCategory,
    pub severity: Severity,
    pub recoverable: bool,
}

/// Filters for [`ErrorHandler::error_log`]
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    /// Substring of the context
    pub context: Option<String>,
    pub severity: Option<Severity>,
    pub error_type: Option<String>,
    pub since: Option<DateTime<Utc>>,
}

/// Error handler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorHandlerConfig {
    pub max_retries: u32,
    pub max_log_size: usize,
}

impl Default for ErrorHandlerConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            max_log_size: DEFAULT_MAX_LOG_SIZE,
        }
    }
}

/// Classifies faults, keeps the error log and per-context retry counters
#[derive(Debug)]
pub struct ErrorHandler {
    log: Mutex<VecDeque<ErrorRecord>>,
    retry_attempts: Mutex<HashMap<String, u32>>,
    config: ErrorHandlerConfig,
}

impl Default for ErrorHandler {
    fn default() -> Self {
        Self::new(ErrorHandlerConfig::default())
    }
}

impl ErrorHandler {
    pub fn new(config: ErrorHandlerConfig) -> Self {
        Self {
            log: Mutex::new(VecDeque::with_capacity(config.max_log_size)),
            retry_attempts: Mutex::new(HashMap::new()),
            config,
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.config.max_retries
    }

    /// Record the fault and describe it for the user
    pub fn handle_error<E>(&self, error: &E, context: &str, options: HandleOptions) -> ErrorInfo
    where
        E: Fault + ?Sized,
    {
        let message = error.to_string();
        let category = ErrorCategory::classify(error.fault_kind(), &message);

        log::error!("[{}] {} ({})", context, message, category.as_str());

        self.log_error(ErrorRecord {
            timestamp: Utc::now(),
            context: context.to_string(),
            message,
            error_type: error.type_name().to_string(),
            category,
            severity: options.severity,
            recoverable: options.recoverable,
        });

        ErrorInfo::from(category)
    }

    fn log_error(&self, record: ErrorRecord) {
        let mut log = self.log.lock();
        log.push_back(record);
        while log.len() > self.config.max_log_size {
            log.pop_front();
        }
    }

    /// Whether `context` has attempts left
    pub fn can_retry(&self, context: &str) -> bool {
        self.retry_count(context) < self.config.max_retries
    }

    /// Current attempt count for `context`
    pub fn retry_count(&self, context: &str) -> u32 {
        self.retry_attempts.lock().get(context).copied().unwrap_or(0)
    }

    /// Bump the attempt count and return the new value
    pub fn increment_retry(&self, context: &str) -> u32 {
        let mut attempts = self.retry_attempts.lock();
        let count = attempts.entry(context.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    pub fn reset_retry(&self, context: &str) {
        self.retry_attempts.lock().remove(context);
    }

    /// Wrap `operation` so each call is one delayed, counted attempt.
    ///
    /// See [`RetryFn::call`] for the attempt semantics.
    pub fn create_retry_function<F>(
        self: &Arc<Self>,
        operation: F,
        context: impl Into<String>,
        options: RetryOptions,
    ) -> RetryFn<F> {
        RetryFn {
            handler: Arc::clone(self),
            context: context.into(),
            options,
            operation,
        }
    }

    /// Matching log entries, newest first
    pub fn error_log(&self, filter: &LogFilter) -> Vec<ErrorRecord> {
        let mut records: Vec<ErrorRecord> = self
            .log
            .lock()
            .iter()
            .filter(|r| {
                filter
                    .context
                    .as_deref()
                    .map_or(true, |c| r.context.contains(c))
            })
            .filter(|r| filter.severity.map_or(true, |s| r.severity == s))
            .filter(|r| {
                filter
                    .error_type
                    .as_deref()
                    .map_or(true, |t| r.error_type == t)
            })
            .filter(|r| filter.since.map_or(true, |since| r.timestamp >= since))
            .cloned()
            .collect();

        records.reverse();
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        records
    }

    pub fn log_len(&self) -> usize {
        self.log.lock().len()
    }

    /// Clear the log and every retry counter
    pub fn clear_error_log(&self) {
        self.log.lock().clear();
        self.retry_attempts.lock().clear();
    }

    pub fn export_error_log(&self, format: ExportFormat) -> Result<String, ExportError> {
        let log = self.log.lock();
        match format {
            ExportFormat::Json => {
                let records: Vec<&ErrorRecord> = log.iter().collect();
                Ok(serde_json::to_string_pretty(&records)?)
            }
            ExportFormat::Csv => {
                let rows: Vec<Vec<String>> = log
                    .iter()
                    .map(|r| {
                        vec![
                            r.timestamp.to_rfc3339(),
                            r.context.clone(),
                            r.error_type.clone(),
                            r.severity.as_str().to_string(),
                            r.message.clone(),
                        ]
                    })
                    .collect();
                Ok(write_csv(
                    &["Timestamp", "Context", "Type", "Severity", "Message"],
                    &rows,
                )?)
            }
        }
    }
}

/// Delay settings for [`RetryFn`]
#[derive(Debug, Clone, Copy)]
pub struct RetryOptions {
    /// Delay before the first attempt
    pub delay: Duration,
    /// Multiplier applied per further attempt
    pub backoff: f64,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(1000),
            backoff: 2.0,
        }
    }
}

impl RetryOptions {
    /// Delay before attempt `attempt` (1-based): `delay * backoff^(attempt-1)`
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        self.delay.mul_f64(self.backoff.powi(exponent))
    }
}

/// Failure of a single [`RetryFn::call`]
#[derive(Error, Debug)]
pub enum RetryError<E> {
    /// No attempts were left when the call was made
    #[error("Maximum retry attempts ({max}) exceeded for {context}")]
    LimitExceeded { context: String, max: u32 },

    /// The attempt failed and more attempts remain
    #[error("Attempt {attempt} failed: {source}")]
    Attempt { attempt: u32, source: E },

    /// The last permitted attempt failed; the counter has been reset
    #[error("Operation failed after {attempts} attempts: {source}")]
    Exhausted { attempts: u32, source: E },
}

impl<E> RetryError<E> {
    /// Whether this is the final failure after all attempts
    pub fn is_exhausted(&self) -> bool {
        matches!(self, RetryError::Exhausted { .. })
    }

    /// The underlying operation error, if an attempt was made
    pub fn into_inner(self) -> Option<E> {
        match self {
            RetryError::Attempt { source, .. } | RetryError::Exhausted { source, .. } => {
                Some(source)
            }
            RetryError::LimitExceeded { .. } => None,
        }
    }
}

/// Operation wrapped with the handler's retry counter for one context
pub struct RetryFn<F> {
    handler: Arc<ErrorHandler>,
    context: String,
    options: RetryOptions,
    operation: F,
}

impl<F> std::fmt::Debug for RetryFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryFn")
            .field("context", &self.context)
            .field("options", &self.options)
            .finish()
    }
}

impl<F, Fut, T, E> RetryFn<F>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    pub fn context(&self) -> &str {
        &self.context
    }

    /// Make one attempt.
    ///
    /// Waits `delay * backoff^(attempt-1)` first. Success resets the
    /// counter. A failure with attempts left yields [`RetryError::Attempt`];
    /// a failure on the last attempt resets the counter and yields
    /// [`RetryError::Exhausted`].
    pub async fn call(&self) -> Result<T, RetryError<E>> {
        if !self.handler.can_retry(&self.context) {
            return Err(RetryError::LimitExceeded {
                context: self.context.clone(),
                max: self.handler.max_retries(),
            });
        }

        let attempt = self.handler.increment_retry(&self.context);
        let delay = self.options.delay_for_attempt(attempt);
        log::debug!(
            "retry {} attempt {} after {:?}",
            self.context,
            attempt,
            delay
        );
        tokio::time::sleep(delay).await;

        match (self.operation)().await {
            Ok(value) => {
                self.handler.reset_retry(&self.context);
                Ok(value)
            }
            Err(source) if self.handler.can_retry(&self.context) => {
                Err(RetryError::Attempt { attempt, source })
            }
            Err(source) => {
                self.handler.reset_retry(&self.context);
                log::warn!("{} failed after {} attempts", self.context, attempt);
                Err(RetryError::Exhausted {
                    attempts: attempt,
                    source,
                })
            }
        }
    }

    /// Keep calling until success or a final failure
    pub async fn run(&self) -> Result<T, RetryError<E>> {
        loop {
            match self.call().await {
                Err(RetryError::Attempt { .. }) => continue,
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(message: &str) -> Failure {
        Failure::new(FaultKind::Other, message)
    }

    #[test]
    fn test_classification() {
        assert_eq!(
            ErrorCategory::classify(FaultKind::Transport, "connection refused"),
            ErrorCategory::Network
        );
        assert_eq!(
            ErrorCategory::classify(FaultKind::Syntax, "unexpected token"),
            ErrorCategory::Parse
        );
        assert_eq!(
            ErrorCategory::classify(FaultKind::Other, "HTTP error! status: 404"),
            ErrorCategory::Resource
        );
        assert_eq!(
            ErrorCategory::classify(FaultKind::Other, "page Not Found"),
            ErrorCategory::Resource
        );
        assert_eq!(
            ErrorCategory::classify(FaultKind::Other, "403 forbidden"),
            ErrorCategory::Permission
        );
        assert_eq!(
            ErrorCategory::classify(FaultKind::Other, "something odd"),
            ErrorCategory::Generic
        );
    }

    #[test]
    fn test_handle_error_records_and_describes() {
        let handler = ErrorHandler::default();
        let info = handler.handle_error(
            &failure("template not found"),
            "AppContent.loadTemplate",
            HandleOptions {
                severity: Severity::High,
                recoverable: true,
            },
        );

        assert_eq!(info.category, ErrorCategory::Resource);
        assert!(!info.retryable);
        assert_eq!(info.suggestions.len(), 3);

        let log = handler.error_log(&LogFilter::default());
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].context, "AppContent.loadTemplate");
        assert_eq!(log[0].severity, Severity::High);
    }

    #[test]
    fn test_json_errors_classify_as_parse() {
        let handler = ErrorHandler::default();
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let info = handler.handle_error(&err, "parse", HandleOptions::default());
        assert_eq!(info.category, ErrorCategory::Parse);
        assert_eq!(
            handler.error_log(&LogFilter::default())[0].error_type,
            "SyntaxError"
        );
    }

    #[test]
    fn test_error_log_is_bounded() {
        let handler = ErrorHandler::new(ErrorHandlerConfig {
            max_log_size: 3,
            ..Default::default()
        });
        for i in 0..5 {
            handler.handle_error(&failure(&format!("e{}", i)), "ctx", HandleOptions::default());
        }

        assert_eq!(handler.log_len(), 3);
        let messages: Vec<String> = handler
            .error_log(&LogFilter::default())
            .into_iter()
            .map(|r| r.message)
            .collect();
        assert!(!messages.contains(&"e0".to_string()));
        assert!(!messages.contains(&"e1".to_string()));
        assert!(messages.contains(&"e4".to_string()));
    }

    #[test]
    fn test_error_log_filters() {
        let handler = ErrorHandler::default();
        handler.handle_error(&failure("a"), "Content.load", HandleOptions::default());
        handler.handle_error(
            &failure("b"),
            "Header.render",
            HandleOptions {
                severity: Severity::Critical,
                recoverable: false,
            },
        );

        let by_context = handler.error_log(&LogFilter {
            context: Some("Content".into()),
            ..Default::default()
        });
        assert_eq!(by_context.len(), 1);
        assert_eq!(by_context[0].message, "a");

        let by_severity = handler.error_log(&LogFilter {
            severity: Some(Severity::Critical),
            ..Default::default()
        });
        assert_eq!(by_severity.len(), 1);
        assert!(!by_severity[0].recoverable);
    }

    #[test]
    fn test_retry_counters() {
        let handler = ErrorHandler::default();
        assert!(handler.can_retry("ctx"));
        handler.increment_retry("ctx");
        handler.increment_retry("ctx");
        assert!(handler.can_retry("ctx"));
        handler.increment_retry("ctx");
        assert!(!handler.can_retry("ctx"));
        handler.reset_retry("ctx");
        assert_eq!(handler.retry_count("ctx"), 0);
    }

    #[test]
    fn test_clear_error_log_resets_counters() {
        let handler = ErrorHandler::default();
        handler.handle_error(&failure("x"), "ctx", HandleOptions::default());
        handler.increment_retry("ctx");
        handler.clear_error_log();
        assert_eq!(handler.log_len(), 0);
        assert_eq!(handler.retry_count("ctx"), 0);
    }

    #[test]
    fn test_export_csv() {
        let handler = ErrorHandler::default();
        handler.handle_error(&failure("bad, \"quoted\""), "ctx", HandleOptions::default());
        let csv = handler.export_error_log(ExportFormat::Csv).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("Timestamp,Context,Type,Severity,Message"));
        assert!(lines.next().unwrap().ends_with(",ctx,Error,error,\"bad, \"\"quoted\"\"\""));
    }

    #[test]
    fn test_delay_for_attempt() {
        let options = RetryOptions {
            delay: Duration::from_millis(100),
            backoff: 2.0,
        };
        assert_eq!(options.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(options.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(options.delay_for_attempt(3), Duration::from_millis(400));
    }
}
