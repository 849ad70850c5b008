//! Tracing initialization for embedding applications.

use crate::error::{GraphError, Result};
use tracing_subscriber::{fmt, EnvFilter};

/// Filter directive applied when the caller passes an empty string.
const DEFAULT_DIRECTIVE: &str = "graft=info";

/// Installs the global tracing subscriber. `level` is an env-filter
/// directive string ("debug", "graft=trace", ...); an empty string selects
/// the crate default.
pub fn init_logging(level: &str) -> Result<()> {
    let directive = if level.is_empty() {
        DEFAULT_DIRECTIVE
    } else {
        level
    };
    let filter = EnvFilter::try_new(directive).map_err(|e| {
        GraphError::InvalidArgument(format!("invalid log filter '{directive}': {e}"))
    })?;
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|_| GraphError::InvalidState("logging already initialized".into()))
}
