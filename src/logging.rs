use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Install the JSON tracing subscriber.
/// Call once from the host process; the library never installs one itself.
pub fn init_logging() {
    if let Err(e) = try_init_logging() {
        // A host that already installed a subscriber keeps it.
        tracing::debug!(error = %e, "Tracing subscriber already installed");
        return;
    }
    tracing::info!("Structured logging initialized");
}

/// Like [`init_logging`] but reports an already-installed global subscriber.
pub fn try_init_logging() -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .json()
        );

    tracing::subscriber::set_global_default(subscriber)
}

/// Log a fallback from the external generator to a local path
pub fn log_fallback(learner_id: &str, path: &'static str, reason: &str) {
    tracing::warn!(learner_id = learner_id, path = path, reason = reason, "Fallback triggered");
}

/// Log a collaborator timeout
pub fn log_timeout(stage: &str, duration_ms: u64) {
    tracing::warn!(stage = stage, duration_ms = duration_ms, "Timeout exceeded");
}
