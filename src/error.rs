use serde::{Serialize, Deserialize};
use std::fmt;
use thiserror::Error;

pub type Result<T, E = CoachError> = std::result::Result<T, E>;

/// Errors returned to callers of the coach.
///
/// Validation, conflict and not-found errors leave learner state untouched.
/// Collaborator errors are absorbed by the schedule and correction paths and
/// only appear here when a caller talks to a generator directly.
#[derive(Debug, Error)]
pub enum CoachError {
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("learner '{learner_id}' already has activity '{in_flight}' in flight")]
    Conflict { learner_id: String, in_flight: String },

    #[error("{what} '{id}' not found")]
    NotFound { what: &'static str, id: String },

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoachError {
    pub fn validation<S: Into<String>>(field: &'static str, reason: S) -> Self {
        CoachError::Validation { field, reason: reason.into() }
    }

    pub fn not_found<S: Into<String>>(what: &'static str, id: S) -> Self {
        CoachError::NotFound { what, id: id.into() }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, CoachError::Validation { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, CoachError::Conflict { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CoachError::NotFound { .. })
    }
}

/// Reject non-finite values and values outside `[min, max]`.
pub(crate) fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<f64> {
    if !value.is_finite() {
        return Err(CoachError::validation(field, format!("must be finite, got {}", value)));
    }
    if value < min || value > max {
        return Err(CoachError::validation(
            field,
            format!("must be within [{}, {}], got {}", min, max, value),
        ));
    }
    Ok(value)
}

/// Failure talking to the external schedule generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollaboratorError {
    pub message: String,
    pub stage: String,
    pub retry_attempted: bool,
    pub context: Option<String>,
    pub source: Option<String>,
}

impl CollaboratorError {
    pub fn new<S: Into<String>>(message: S, stage: &'static str) -> Self {
        CollaboratorError {
            message: message.into(),
            stage: stage.to_string(),
            retry_attempted: false,
            context: None,
            source: None,
        }
    }

    pub fn timeout(after_secs: f64) -> Self {
        CollaboratorError::new(format!("generator timed out after {:.1}s", after_secs), "timeout")
    }

    pub fn transport<S: Into<String>>(message: S) -> Self {
        CollaboratorError::new(message, "transport")
    }

    pub fn malformed<S: Into<String>>(message: S) -> Self {
        CollaboratorError::new(message, "malformed_response")
    }

    pub fn unavailable<S: Into<String>>(message: S) -> Self {
        CollaboratorError::new(message, "unavailable")
    }

    pub fn cancelled() -> Self {
        CollaboratorError::new("generator call cancelled by caller", "cancelled")
    }

    /// Mark whether the failure happened after retrying
    pub fn with_retry(mut self, attempted: bool) -> Self {
        self.retry_attempted = attempted;
        self
    }

    pub fn with_context<S: Into<String>>(mut self, context: S) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_source<S: Into<String>>(mut self, source: S) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn is_timeout(&self) -> bool {
        self.stage == "timeout"
    }
}

impl fmt::Display for CollaboratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.stage, self.message)?;
        if let Some(ref context) = self.context {
            write!(f, " (context: {})", context)?;
        }
        if let Some(ref source) = self.source {
            write!(f, " (source: {})", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for CollaboratorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

impl From<reqwest::Error> for CollaboratorError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return CollaboratorError::new(format!("HTTP timeout: {}", err), "timeout")
                .with_source("reqwest");
        }
        CollaboratorError::transport(format!("HTTP error: {}", err)).with_source("reqwest")
    }
}

impl From<serde_json::Error> for CollaboratorError {
    fn from(err: serde_json::Error) -> Self {
        CollaboratorError::malformed(format!("JSON error: {}", err)).with_source("serde_json")
    }
}

impl From<tokio::time::error::Elapsed> for CollaboratorError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        CollaboratorError::new("Operation timed out", "timeout").with_source("tokio::time")
    }
}

impl From<anyhow::Error> for CollaboratorError {
    fn from(err: anyhow::Error) -> Self {
        CollaboratorError::new(format!("{:#}", err), "unknown").with_source("anyhow")
    }
}
