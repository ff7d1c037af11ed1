//! Log output for applications embedding the engine.
//!
//! The engine only emits `tracing` events; nothing is printed until a
//! subscriber is installed. [`init`] installs a `fmt` subscriber filtered by
//! an explicit directive string or, failing that, `RUST_LOG`.
//!
//! ```ignore
//! tally::logging::init(Some("tally_runtime=debug"))?;
//! ```

use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Filter used when neither an explicit filter nor `RUST_LOG` is set.
pub const DEFAULT_FILTER: &str = "info";

#[derive(Debug, Error)]
pub enum LoggingError {
    /// The filter string is not a valid `EnvFilter` directive list.
    #[error("invalid log filter {filter:?}: {message}")]
    Filter { filter: String, message: String },

    #[error("a global tracing subscriber is already installed")]
    AlreadyInstalled,
}

/// Install the global `fmt` subscriber.
///
/// `filter` takes precedence over `RUST_LOG`; with neither,
/// [`DEFAULT_FILTER`] applies.
///
/// # Errors
///
/// [`LoggingError::Filter`] for a malformed explicit filter,
/// [`LoggingError::AlreadyInstalled`] if another subscriber won the race.
pub fn init(filter: Option<&str>) -> Result<(), LoggingError> {
    let env_filter = resolve_filter(filter)?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init()
        .map_err(|_| LoggingError::AlreadyInstalled)
}

fn resolve_filter(filter: Option<&str>) -> Result<EnvFilter, LoggingError> {
    match filter {
        Some(directives) => EnvFilter::try_new(directives).map_err(|e| LoggingError::Filter {
            filter: directives.to_owned(),
            message: e.to_string(),
        }),
        None => Ok(EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_filter_parses() {
        let filter = resolve_filter(Some("tally_runtime=debug,warn")).unwrap();
        assert!(filter.to_string().contains("tally_runtime=debug"));
    }

    #[test]
    fn malformed_filter_is_rejected() {
        let err = resolve_filter(Some("tally_runtime=loud")).unwrap_err();
        assert!(matches!(err, LoggingError::Filter { .. }));
        assert!(err.to_string().contains("tally_runtime=loud"));
    }
}
