use alarmclock_common::ParseError;
use thiserror::Error;

use crate::shutdown::Interrupted;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("timed out fetching calendar")]
    Timeout,
    #[error("calendar server answered HTTP {0}")]
    Http(u16),
    #[error("transport error: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlarmError {
    #[error("calendar fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("calendar could not be parsed: {0}")]
    Parse(#[from] ParseError),
    #[error("interrupted by shutdown")]
    Interrupted,
}

impl From<Interrupted> for AlarmError {
    fn from(_: Interrupted) -> Self {
        Self::Interrupted
    }
}
