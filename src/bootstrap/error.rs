use std::time::Duration;
use thiserror::Error;

/// Errors surfaced to whoever starts the bootstrap process.
///
/// Everything else (discovery hiccups, unreachable contact points, decider
/// failures) is retried internally and only shows up in the logs.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("invalid bootstrap settings: {0}")]
    InvalidSettings(String),

    #[error(
        "self contact point was not set within {0:?}; the management HTTP endpoint must be bound \
         before bootstrap starts, since every probe target is derived from it"
    )]
    SelfContactPointTimeout(Duration),

    #[error("bootstrap coordinator is not running")]
    CoordinatorStopped,
}
