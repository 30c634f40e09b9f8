use chrono::TimeDelta;
use thiserror::Error;

/// Why a handle refused to arm.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("Invalid delayed function: delay {0} is negative")]
    NegativeDelay(TimeDelta),

    #[error("Invalid delayed function: no callback set")]
    MissingCallback,

    #[error("No tokio runtime available to arm the timer")]
    NoRuntime,
}
