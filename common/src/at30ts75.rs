use embedded_hal::{delay::DelayNs, i2c::I2c};

use crate::{error::SensorError, node::TemperatureSensor};

pub const DEFAULT_ADDRESS: u8 = 0x48;

const REG_TEMPERATURE: u8 = 0x00;
const REG_CONFIGURATION: u8 = 0x01;

const CONFIG_SHUTDOWN: u8 = 1 << 0;
const CONFIG_RESOLUTION_12BIT: u8 = 0b11 << 5;
const CONFIG_ONE_SHOT: u8 = 1 << 7;

const BASE_CONFIG: u8 = CONFIG_RESOLUTION_12BIT | CONFIG_SHUTDOWN;

// 12-bit conversions take 250-300 ms.
pub const CONVERSION_TIME_MS: u32 = 350;

pub struct At30ts75<I2C, D> {
    i2c: I2C,
    delay: D,
    address: u8,
}

impl<I2C, D> At30ts75<I2C, D>
where
    I2C: I2c,
    D: DelayNs,
{
    pub fn new(i2c: I2C, delay: D, address: u8) -> Self {
        Self {
            i2c,
            delay,
            address,
        }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn init(&mut self) -> Result<(), SensorError<I2C::Error>> {
        self.i2c
            .write(self.address, &[REG_CONFIGURATION, BASE_CONFIG])
            .map_err(SensorError::Bus)
    }

    pub fn convert(&mut self) -> Result<i32, SensorError<I2C::Error>> {
        self.i2c
            .write(
                self.address,
                &[REG_CONFIGURATION, BASE_CONFIG | CONFIG_ONE_SHOT],
            )
            .map_err(SensorError::Bus)?;

        self.delay.delay_ms(CONVERSION_TIME_MS);

        let mut raw = [0_u8; 2];
        self.i2c
            .write_read(self.address, &[REG_TEMPERATURE], &mut raw)
            .map_err(SensorError::Bus)?;

        Ok(raw_to_millicelsius(raw))
    }

    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }
}

impl<I2C, D> TemperatureSensor for At30ts75<I2C, D>
where
    I2C: I2c,
    D: DelayNs,
{
    type Error = SensorError<I2C::Error>;

    fn read_millicelsius(&mut self) -> Result<i32, Self::Error> {
        self.convert()
    }
}

// Left-justified 12-bit two's complement, 0.0625 °C per count.
pub fn raw_to_millicelsius(raw: [u8; 2]) -> i32 {
    let counts = i16::from_be_bytes(raw) >> 4;
    i32::from(counts) * 125 / 2
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use embedded_hal::i2c::{ErrorKind, ErrorType, Operation};
    use pretty_assertions::assert_eq;

    use super::*;

    #[derive(Default)]
    struct ScriptedBus {
        writes: Vec<(u8, Vec<u8>)>,
        reads: VecDeque<[u8; 2]>,
        fail: bool,
    }

    impl ErrorType for ScriptedBus {
        type Error = ErrorKind;
    }

    impl I2c for ScriptedBus {
        fn transaction(
            &mut self,
            address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            if self.fail {
                return Err(ErrorKind::Other);
            }
            for operation in operations {
                match operation {
                    Operation::Write(bytes) => self.writes.push((address, bytes.to_vec())),
                    Operation::Read(buffer) => {
                        let raw = self.reads.pop_front().ok_or(ErrorKind::Other)?;
                        buffer.copy_from_slice(&raw[..buffer.len()]);
                    }
                }
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingDelay {
        total_ns: u64,
    }

    impl DelayNs for CountingDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.total_ns += u64::from(ns);
        }
    }

    #[test]
    fn converts_register_values() {
        assert_eq!(raw_to_millicelsius([0x19, 0x00]), 25_000);
        assert_eq!(raw_to_millicelsius([0x19, 0x90]), 25_562);
        assert_eq!(raw_to_millicelsius([0x00, 0x10]), 62);
        assert_eq!(raw_to_millicelsius([0x00, 0x00]), 0);
        assert_eq!(raw_to_millicelsius([0xFF, 0xF0]), -62);
        assert_eq!(raw_to_millicelsius([0xE7, 0x00]), -25_000);
        assert_eq!(raw_to_millicelsius([0x7F, 0xF0]), 127_937);
    }

    #[test]
    fn one_shot_conversion_sequence() {
        let bus = ScriptedBus {
            reads: VecDeque::from([[0x15, 0x80]]),
            ..ScriptedBus::default()
        };
        let mut sensor = At30ts75::new(bus, CountingDelay::default(), DEFAULT_ADDRESS);

        sensor.init().unwrap();
        let millicelsius = sensor.read_millicelsius().unwrap();

        assert_eq!(millicelsius, 21_500);
        let (bus, delay) = sensor.release();
        assert_eq!(
            bus.writes,
            vec![
                (0x48, vec![REG_CONFIGURATION, 0x61]),
                (0x48, vec![REG_CONFIGURATION, 0xE1]),
                (0x48, vec![REG_TEMPERATURE]),
            ]
        );
        assert_eq!(delay.total_ns, u64::from(CONVERSION_TIME_MS) * 1_000_000);
    }

    #[test]
    fn bus_errors_surface_as_sensor_errors() {
        let bus = ScriptedBus {
            fail: true,
            ..ScriptedBus::default()
        };
        let mut sensor = At30ts75::new(bus, CountingDelay::default(), DEFAULT_ADDRESS);

        let err = sensor.read_millicelsius().unwrap_err();
        assert!(matches!(err, SensorError::Bus(ErrorKind::Other)));
    }
}
