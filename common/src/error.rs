use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} must be provided")]
    Missing(&'static str),
    #[error("{key} has an invalid value: {value:?}")]
    Invalid { key: &'static str, value: String },
    #[error("GPIO was requested but this build has no gpio support; set ALARMCLOCK_NO_GPIO or rebuild with --features gpio")]
    GpioUnavailable,
}

/// Reasons a calendar payload is rejected as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("calendar payload is not valid UTF-8")]
    Encoding,
    #[error("payload does not contain a VCALENDAR")]
    MissingCalendar,
    #[error("unbalanced component: {reason}")]
    Unbalanced { reason: String },
    #[error("malformed content line: {reason}")]
    MalformedLine { reason: String },
    #[error("event is missing required property {property}")]
    MissingProperty { property: &'static str },
    #[error("invalid date or date-time value {value:?}")]
    InvalidDateTime { value: String },
    #[error("invalid duration value {value:?}")]
    InvalidDuration { value: String },
    #[error("invalid recurrence rule: {reason}")]
    Recurrence { reason: String },
}
