use std::{str::FromStr, time::Duration};

use chrono_tz::Tz;

use crate::error::ConfigError;

pub const ENV_URL: &str = "ALARMCLOCK_URL";
pub const ENV_RELAY_PIN: &str = "ALARMCLOCK_RELAY_PIN";
pub const ENV_SENSOR_PIN: &str = "ALARMCLOCK_SENSOR_PIN";
pub const ENV_REFRESH_FREQUENCY: &str = "ALARMCLOCK_REFRESH_FREQUENCY";
pub const ENV_NO_GPIO: &str = "ALARMCLOCK_NO_GPIO";
pub const ENV_TIMEZONE: &str = "ALARMCLOCK_TIMEZONE";
pub const ENV_METRICS_PORT: &str = "ALARMCLOCK_METRICS_PORT";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmTiming {
    pub tick_ms: u64,
    pub pulse_ms: u64,
    pub pulse_pause_ms: u64,
    pub fetch_timeout_ms: u64,
    pub refresh_interval_ms: u64,
    pub empty_poll_interval_ms: u64,
    pub window_days: i64,
}

impl Default for AlarmTiming {
    fn default() -> Self {
        Self {
            tick_ms: 1_000,
            pulse_ms: 1_000,
            pulse_pause_ms: 3_000,
            fetch_timeout_ms: 5_000,
            refresh_interval_ms: 300_000,
            empty_poll_interval_ms: 300_000,
            window_days: 7,
        }
    }
}

impl AlarmTiming {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn empty_poll_interval(&self) -> Duration {
        Duration::from_millis(self.empty_poll_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlarmConfig {
    pub url: String,
    pub relay_pin: u8,
    pub sensor_pin: u8,
    pub refresh_frequency_secs: u64,
    pub use_gpio: bool,
    /// Zone used for floating and all-day calendar values; `None` means system local time.
    pub timezone: Option<Tz>,
    /// Port of the Prometheus endpoint; 0 disables it.
    pub metrics_port: u16,
}

impl AlarmConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let url = lookup(ENV_URL).ok_or(ConfigError::Missing(ENV_URL))?;

        let refresh_frequency_secs = parse_var(&lookup, ENV_REFRESH_FREQUENCY, 300u64)?;
        if refresh_frequency_secs == 0 {
            return Err(ConfigError::Invalid {
                key: ENV_REFRESH_FREQUENCY,
                value: "0".to_string(),
            });
        }

        let timezone = match lookup(ENV_TIMEZONE) {
            Some(value) => Some(value.parse::<Tz>().map_err(|_| ConfigError::Invalid {
                key: ENV_TIMEZONE,
                value,
            })?),
            None => None,
        };

        Ok(Self {
            url,
            relay_pin: parse_var(&lookup, ENV_RELAY_PIN, 4u8)?,
            sensor_pin: parse_var(&lookup, ENV_SENSOR_PIN, 17u8)?,
            refresh_frequency_secs,
            use_gpio: !lookup(ENV_NO_GPIO).is_some_and(|value| is_truthy(&value)),
            timezone,
            metrics_port: parse_var(&lookup, ENV_METRICS_PORT, 8000u16)?,
        })
    }

    pub fn timing(&self) -> AlarmTiming {
        let refresh_ms = self.refresh_frequency_secs.saturating_mul(1_000);
        AlarmTiming {
            refresh_interval_ms: refresh_ms,
            empty_poll_interval_ms: refresh_ms,
            ..AlarmTiming::default()
        }
    }
}

fn parse_var<T, F>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) => value
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

fn is_truthy(value: &str) -> bool {
    !matches!(
        value.to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}
