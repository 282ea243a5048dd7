pub mod alarm;
pub mod config;
pub mod error;
pub mod ics;
pub mod occurrence;
pub mod recurrence;
pub mod summary;
pub mod types;

pub use alarm::{AlarmAction, AlarmEngine, Presence};
pub use config::{AlarmConfig, AlarmTiming};
pub use error::{ConfigError, ParseError};
pub use ics::{Calendar, EventEntry, EventTime};
pub use occurrence::{changed, Fingerprint, Occurrence, OccurrenceSet, Window};
pub use types::AlarmState;
