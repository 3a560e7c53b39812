use anyhow::{anyhow, Context};
use esp_idf_hal::{
    delay::FreeRtos,
    gpio::{AnyIOPin, AnyOutputPin, OutputPin},
    i2c::{I2cConfig, I2cDriver, I2C0},
    peripheral::Peripheral,
    prelude::Peripherals,
    rmt::{
        config::{CarrierConfig, DutyPercent, TransmitConfig},
        PinState, Pulse, PulseTicks, RmtChannel, TxRmtDriver, VariableLengthSignal, RMT,
    },
    units::FromValueType,
};
use esp_idf_svc::log::EspLogger;
use esp_idf_sys::{
    esp, esp_deep_sleep_start, esp_light_sleep_start, esp_sleep_disable_wakeup_source,
    esp_sleep_enable_timer_wakeup, esp_sleep_source_t_ESP_SLEEP_WAKEUP_ALL, EspError,
};
use log::{info, warn};

use realtemp_common::{
    ir::MIDEA_CARRIER, At30ts75, IrHardwareConfig, IrTransmitter, PulseTrain, RuntimeConfig,
    SensorHardwareConfig, SensorNode, SleepPeriod, Sleeper,
};

// One RMT tick per microsecond off the 80 MHz APB clock.
const IR_TICK_DIVIDER: u8 = 80;

pub fn run() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();
    EspLogger::initialize_default();

    let mut runtime = RuntimeConfig::default();
    runtime.sanitize();

    info!(
        "sensor node boot: wake {}s, transmit {}s, delta {}°C, IR {} Hz",
        runtime.node.wake_interval_secs,
        runtime.node.transmit_interval_secs,
        runtime.node.delta_threshold_c,
        MIDEA_CARRIER.frequency_hz,
    );

    let Peripherals { i2c0, rmt, .. } = Peripherals::take()?;

    let i2c = init_i2c(i2c0, &runtime.sensor).context("failed to init I2C bus")?;
    let mut sensor = At30ts75::new(i2c, FreeRtos, runtime.sensor.i2c_address);
    match sensor.init() {
        Ok(()) => info!("AT30TS75 configured at 0x{:02X}", sensor.address()),
        // The next one-shot conversion rewrites the configuration anyway.
        Err(err) => warn!("failed to configure AT30TS75: {err}"),
    }

    let transmitter = init_ir_transmitter(rmt, &runtime.ir)?;
    info!(
        "IR transmitter initialized on RMT channel{} / GPIO{}",
        runtime.ir.rmt_channel, runtime.ir.tx_pin
    );

    let mut node = SensorNode::new(runtime.node, sensor, transmitter, LightSleeper);
    node.run().context("sensor node halted")?;
    Ok(())
}

fn init_i2c(i2c0: I2C0, sensor: &SensorHardwareConfig) -> anyhow::Result<I2cDriver<'static>> {
    if sensor.sda_pin < 0 || sensor.scl_pin < 0 {
        return Err(anyhow!(
            "invalid I2C pins: sda {} scl {}",
            sensor.sda_pin,
            sensor.scl_pin
        ));
    }

    let config = I2cConfig::new().baudrate(sensor.bus_hz.Hz());
    let (sda, scl) = unsafe { (AnyIOPin::new(sensor.sda_pin), AnyIOPin::new(sensor.scl_pin)) };

    Ok(I2cDriver::new(i2c0, sda, scl, &config)?)
}

fn init_ir_transmitter(rmt: RMT, ir: &IrHardwareConfig) -> anyhow::Result<RmtTransmitter> {
    if ir.tx_pin < 0 {
        return Err(anyhow!("invalid tx pin: {}", ir.tx_pin));
    }

    let pin = ir.tx_pin;

    match ir.rmt_channel {
        0 => unsafe { RmtTransmitter::new(rmt.channel0, AnyOutputPin::new(pin)) },
        1 => unsafe { RmtTransmitter::new(rmt.channel1, AnyOutputPin::new(pin)) },
        2 => unsafe { RmtTransmitter::new(rmt.channel2, AnyOutputPin::new(pin)) },
        3 => unsafe { RmtTransmitter::new(rmt.channel3, AnyOutputPin::new(pin)) },
        #[cfg(any(esp32, esp32s3))]
        4 => unsafe { RmtTransmitter::new(rmt.channel4, AnyOutputPin::new(pin)) },
        #[cfg(any(esp32, esp32s3))]
        5 => unsafe { RmtTransmitter::new(rmt.channel5, AnyOutputPin::new(pin)) },
        #[cfg(any(esp32, esp32s3))]
        6 => unsafe { RmtTransmitter::new(rmt.channel6, AnyOutputPin::new(pin)) },
        #[cfg(any(esp32, esp32s3))]
        7 => unsafe { RmtTransmitter::new(rmt.channel7, AnyOutputPin::new(pin)) },
        _ => Err(anyhow!("unsupported RMT channel: {}", ir.rmt_channel)),
    }
}

// The RMT peripheral generates the carrier and clocks out the marks and spaces.
struct RmtTransmitter {
    tx: TxRmtDriver<'static>,
}

impl RmtTransmitter {
    fn new<C, P>(
        channel: impl Peripheral<P = C> + 'static,
        pin: impl Peripheral<P = P> + 'static,
    ) -> anyhow::Result<Self>
    where
        C: RmtChannel,
        P: OutputPin,
    {
        let carrier = CarrierConfig::new()
            .frequency(MIDEA_CARRIER.frequency_hz.Hz())
            .carrier_level(PinState::High)
            .duty_percent(DutyPercent::new(MIDEA_CARRIER.duty_percent)?);

        let config = TransmitConfig::new()
            .clock_divider(IR_TICK_DIVIDER)
            .carrier(Some(carrier))
            .idle(Some(PinState::Low));

        let tx = TxRmtDriver::new(channel, pin, &config).context("failed to init RMT IR driver")?;
        Ok(Self { tx })
    }
}

impl IrTransmitter for RmtTransmitter {
    type Error = EspError;

    fn transmit(&mut self, train: &PulseTrain) -> Result<(), Self::Error> {
        if train.is_empty() {
            return Ok(());
        }

        let mut pulses = Vec::with_capacity(train.len() * 2);
        for (index, duration_us) in train.raw_timings().enumerate() {
            let level = if index % 2 == 0 {
                PinState::High
            } else {
                PinState::Low
            };
            pulses.push(Pulse::new(level, ticks(duration_us)?));
        }

        let mut signal = VariableLengthSignal::with_capacity(pulses.len());
        signal.push(pulses.iter())?;
        self.tx.start_blocking(&signal)
    }
}

// PulseTicks::new rejects anything past the 15-bit tick counter.
fn ticks(us: u32) -> Result<PulseTicks, EspError> {
    PulseTicks::new(u16::try_from(us).unwrap_or(u16::MAX))
}

// Light sleep keeps RAM, so the decision state survives between wakes.
struct LightSleeper;

impl Sleeper for LightSleeper {
    fn suspend(&mut self, period: SleepPeriod) {
        match period {
            SleepPeriod::Seconds(secs) => {
                let wake_after_us = u64::from(secs) * 1_000_000;
                let slept = esp!(unsafe { esp_sleep_enable_timer_wakeup(wake_after_us) })
                .and_then(|()| esp!(unsafe { esp_light_sleep_start() }));

                if let Err(err) = slept {
                    warn!("light sleep unavailable ({err}); idling instead");
                    FreeRtos::delay_ms(u32::from(secs) * 1_000);
                }
            }
            SleepPeriod::Indefinitely => {
                info!("entering deep sleep with no wake source");
                unsafe {
                    esp_sleep_disable_wakeup_source(esp_sleep_source_t_ESP_SLEEP_WAKEUP_ALL);
                    esp_deep_sleep_start();
                }
            }
        }
    }
}
