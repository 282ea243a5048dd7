use std::time::Duration;

use alarmclock_common::{AlarmConfig, Presence};
#[cfg(feature = "gpio")]
use anyhow::Context;
use tracing::debug;

#[cfg(feature = "gpio")]
use crate::gpio::GpioActuator;
use crate::shutdown::{Interrupted, Shutdown};
#[cfg(not(feature = "gpio"))]
use alarmclock_common::ConfigError;

/// Shaker relay output plus the optional occupancy sensor.
pub trait Actuator {
    fn has_sensor(&self) -> bool;
    fn is_present(&self) -> bool;
    fn energize(&mut self);
    fn de_energize(&mut self);
    fn is_energized(&self) -> bool;
}

pub fn presence(actuator: &impl Actuator) -> Presence {
    if !actuator.has_sensor() {
        Presence::Unmonitored
    } else if actuator.is_present() {
        Presence::Present
    } else {
        Presence::Absent
    }
}

/// Energizes the relay for `duration`. The relay is released even when the
/// wait is interrupted.
pub async fn pulse<A: Actuator>(
    actuator: &mut A,
    duration: Duration,
    shutdown: &Shutdown,
) -> Result<(), Interrupted> {
    actuator.energize();
    let result = shutdown.sleep(duration).await;
    actuator.de_energize();
    result
}

#[derive(Debug, Default)]
pub struct NoopActuator {
    energized: bool,
}

impl Actuator for NoopActuator {
    fn has_sensor(&self) -> bool {
        false
    }

    fn is_present(&self) -> bool {
        false
    }

    fn energize(&mut self) {
        debug!("relay on (no-op)");
        self.energized = true;
    }

    fn de_energize(&mut self) {
        debug!("relay off (no-op)");
        self.energized = false;
    }

    fn is_energized(&self) -> bool {
        self.energized
    }
}

/// Driver chosen once at startup.
#[derive(Debug)]
pub enum Driver {
    Noop(NoopActuator),
    #[cfg(feature = "gpio")]
    Gpio(GpioActuator),
}

impl Driver {
    pub fn from_config(config: &AlarmConfig) -> anyhow::Result<Self> {
        if !config.use_gpio {
            return Ok(Self::Noop(NoopActuator::default()));
        }

        open_gpio(config)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Noop(_) => "noop",
            #[cfg(feature = "gpio")]
            Self::Gpio(_) => "gpio",
        }
    }
}

#[cfg(feature = "gpio")]
fn open_gpio(config: &AlarmConfig) -> anyhow::Result<Driver> {
    let gpio = GpioActuator::open(config.relay_pin, config.sensor_pin).with_context(|| {
        format!(
            "failed to open relay pin {} and sensor pin {}",
            config.relay_pin, config.sensor_pin
        )
    })?;
    Ok(Driver::Gpio(gpio))
}

#[cfg(not(feature = "gpio"))]
fn open_gpio(_config: &AlarmConfig) -> anyhow::Result<Driver> {
    Err(ConfigError::GpioUnavailable.into())
}

impl Actuator for Driver {
    fn has_sensor(&self) -> bool {
        match self {
            Self::Noop(inner) => inner.has_sensor(),
            #[cfg(feature = "gpio")]
            Self::Gpio(inner) => inner.has_sensor(),
        }
    }

    fn is_present(&self) -> bool {
        match self {
            Self::Noop(inner) => inner.is_present(),
            #[cfg(feature = "gpio")]
            Self::Gpio(inner) => inner.is_present(),
        }
    }

    fn energize(&mut self) {
        match self {
            Self::Noop(inner) => inner.energize(),
            #[cfg(feature = "gpio")]
            Self::Gpio(inner) => inner.energize(),
        }
    }

    fn de_energize(&mut self) {
        match self {
            Self::Noop(inner) => inner.de_energize(),
            #[cfg(feature = "gpio")]
            Self::Gpio(inner) => inner.de_energize(),
        }
    }

    fn is_energized(&self) -> bool {
        match self {
            Self::Noop(inner) => inner.is_energized(),
            #[cfg(feature = "gpio")]
            Self::Gpio(inner) => inner.is_energized(),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::{testing::RecordingActuator, *};
    use crate::shutdown;

    fn config(use_gpio: bool) -> AlarmConfig {
        AlarmConfig {
            url: "http://calendar.test/alarms.ics".to_string(),
            relay_pin: 4,
            sensor_pin: 17,
            refresh_frequency_secs: 300,
            use_gpio,
            timezone: None,
            metrics_port: 0,
        }
    }

    #[test]
    fn presence_reflects_sensor() {
        assert_eq!(presence(&NoopActuator::default()), Presence::Unmonitored);
        assert_eq!(presence(&RecordingActuator::with_presence(true)), Presence::Present);
        assert_eq!(presence(&RecordingActuator::with_presence(false)), Presence::Absent);
    }

    #[test]
    fn no_gpio_selects_noop_driver() {
        let driver = Driver::from_config(&config(false)).unwrap();
        assert_eq!(driver.name(), "noop");
        assert!(!driver.has_sensor());
    }

    #[cfg(not(feature = "gpio"))]
    #[test]
    fn gpio_request_without_feature_is_a_config_error() {
        let err = Driver::from_config(&config(true)).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ConfigError>(),
            Some(&ConfigError::GpioUnavailable)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn pulse_releases_relay_after_duration() {
        let mut actuator = RecordingActuator::with_presence(true);
        let (_trigger, shutdown) = shutdown::channel();
        let started = tokio::time::Instant::now();

        pulse(&mut actuator, Duration::from_secs(1), &shutdown).await.unwrap();

        assert_eq!(started.elapsed(), Duration::from_secs(1));
        assert_eq!(actuator.energize_count, 1);
        assert!(!actuator.is_energized());
    }

    #[tokio::test(start_paused = true)]
    async fn interrupted_pulse_still_releases_relay() {
        let mut actuator = RecordingActuator::with_presence(true);
        let (trigger, shutdown) = shutdown::channel();

        let stop = async {
            tokio::time::sleep(Duration::from_millis(300)).await;
            trigger.trigger();
        };
        let (result, ()) = tokio::join!(
            pulse(&mut actuator, Duration::from_secs(1), &shutdown),
            stop
        );

        assert_eq!(result, Err(Interrupted));
        assert!(!actuator.is_energized());
    }
}
