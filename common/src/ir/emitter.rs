use embedded_hal::delay::DelayNs;

use super::pulse::PulseTrain;

pub trait CarrierEmitter {
    type Error: std::error::Error + Send + Sync + 'static;

    fn set_carrier(&mut self, on: bool) -> Result<(), Self::Error>;
}

// Blocks until the last space ends.
pub trait IrTransmitter {
    type Error: std::error::Error + Send + Sync + 'static;

    fn transmit(&mut self, train: &PulseTrain) -> Result<(), Self::Error>;
}

pub struct BitBangTransmitter<E, D> {
    emitter: E,
    delay: D,
}

impl<E, D> BitBangTransmitter<E, D>
where
    E: CarrierEmitter,
    D: DelayNs,
{
    pub fn new(emitter: E, delay: D) -> Self {
        Self { emitter, delay }
    }

    pub fn emitter(&self) -> &E {
        &self.emitter
    }

    pub fn into_parts(self) -> (E, D) {
        (self.emitter, self.delay)
    }

    fn drive(&mut self, train: &PulseTrain) -> Result<(), E::Error> {
        for symbol in train.symbols() {
            self.emitter.set_carrier(true)?;
            self.delay.delay_us(symbol.mark_us);
            self.emitter.set_carrier(false)?;
            self.delay.delay_us(symbol.space_us);
        }
        Ok(())
    }
}

impl<E, D> IrTransmitter for BitBangTransmitter<E, D>
where
    E: CarrierEmitter,
    D: DelayNs,
{
    type Error = E::Error;

    fn transmit(&mut self, train: &PulseTrain) -> Result<(), Self::Error> {
        let result = self.drive(train);
        if result.is_err() {
            // Never leave the LED lit after a fault.
            let _ = self.emitter.set_carrier(false);
        }
        result
    }
}
