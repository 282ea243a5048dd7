use rppal::gpio::{Gpio, InputPin, OutputPin};

use crate::actuator::Actuator;

/// Relay on an active-high output, occupancy sensor on a pulled-up input
/// that reads low while someone is in bed.
#[derive(Debug)]
pub struct GpioActuator {
    relay: OutputPin,
    sensor: InputPin,
}

impl GpioActuator {
    pub fn open(relay_pin: u8, sensor_pin: u8) -> Result<Self, rppal::gpio::Error> {
        let gpio = Gpio::new()?;
        let relay = gpio.get(relay_pin)?.into_output_low();
        let sensor = gpio.get(sensor_pin)?.into_input_pullup();
        Ok(Self { relay, sensor })
    }
}

impl Actuator for GpioActuator {
    fn has_sensor(&self) -> bool {
        true
    }

    fn is_present(&self) -> bool {
        self.sensor.is_low()
    }

    fn energize(&mut self) {
        self.relay.set_high();
    }

    fn de_energize(&mut self) {
        self.relay.set_low();
    }

    fn is_energized(&self) -> bool {
        self.relay.is_set_high()
    }
}
