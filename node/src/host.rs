use std::{
    convert::Infallible,
    io::ErrorKind,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use anyhow::Context;
use embedded_hal::delay::DelayNs;
use tracing::{debug, info, warn};

use realtemp_common::{
    ir::MIDEA_CARRIER, BitBangTransmitter, CarrierEmitter, CycleOutcome, RuntimeConfig,
    SensorNode, SleepPeriod, Sleeper, TemperatureSensor,
};

const SLEEP_SLICE: Duration = Duration::from_millis(100);

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let store = ConfigStore::new();
    let mut runtime = store.load_runtime_config().unwrap_or_else(|err| {
        warn!("failed to load runtime config from store: {err:#}");
        RuntimeConfig::default()
    });

    if let Some(secs) = env_u16("REALTEMP_WAKE_SECS") {
        runtime.node.wake_interval_secs = secs;
    }
    if let Some(secs) = env_u16("REALTEMP_TRANSMIT_SECS") {
        runtime.node.transmit_interval_secs = secs;
    }
    runtime.sanitize();

    let fail_every = std::env::var("REALTEMP_SIM_FAIL_EVERY")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0);

    let shutdown = Arc::new(AtomicBool::new(false));
    let mut worker = tokio::task::spawn_blocking({
        let shutdown = shutdown.clone();
        move || run_node(runtime, fail_every, shutdown)
    });

    tokio::select! {
        joined = &mut worker => return joined.context("node worker panicked")?,
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for ctrl-c")?;
            info!("shutdown requested");
            shutdown.store(true, Ordering::Relaxed);
        }
    }

    worker.await.context("node worker panicked")?
}

fn run_node(
    runtime: RuntimeConfig,
    fail_every: Option<u64>,
    shutdown: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let sensor = SimulatedSensor::new(fail_every);
    let transmitter = BitBangTransmitter::new(VirtualEmitter::default(), SpinDelay);
    let sleeper = SimulatedSleeper {
        shutdown: shutdown.clone(),
    };

    let mut node = SensorNode::new(runtime.node.clone(), sensor, transmitter, sleeper);

    info!(
        "sensor node started (wake every {}s, report at least every {} wake(s), delta {}°C, virtual carrier {} Hz)",
        node.config().wake_interval_secs,
        node.config().transmit_ratio(),
        node.config().delta_threshold_c,
        MIDEA_CARRIER.frequency_hz
    );

    while !shutdown.load(Ordering::Relaxed) {
        let outcome = node.step().context("sensor node halted")?;

        if let CycleOutcome::Transmitted { .. } = outcome {
            let emitter = node.transmitter().emitter();
            info!(
                "virtual emitter: {} carrier bursts, {:?} lit in total",
                emitter.bursts, emitter.lit
            );
        }

        debug!("{}", serde_json::to_string(&node.diagnostics())?);

        if node.config().is_one_shot() {
            break;
        }
    }

    info!(
        "sensor node stopped: {}",
        serde_json::to_string(&node.diagnostics())?
    );
    Ok(())
}

// Sawtooth between 22.0 and 25.85 °C.
struct SimulatedSensor {
    tick: u64,
    fail_every: Option<u64>,
}

impl SimulatedSensor {
    fn new(fail_every: Option<u64>) -> Self {
        Self {
            tick: 0,
            fail_every,
        }
    }
}

impl TemperatureSensor for SimulatedSensor {
    type Error = String;

    fn read_millicelsius(&mut self) -> Result<i32, Self::Error> {
        self.tick = self.tick.saturating_add(1);

        if self.fail_every.is_some_and(|every| self.tick % every == 0) {
            return Err(format!("simulated bus fault on read {}", self.tick));
        }

        Ok(22_000 + (self.tick % 12) as i32 * 350)
    }
}

#[derive(Default)]
struct VirtualEmitter {
    on_since: Option<Instant>,
    bursts: u64,
    lit: Duration,
}

impl CarrierEmitter for VirtualEmitter {
    type Error = Infallible;

    fn set_carrier(&mut self, on: bool) -> Result<(), Self::Error> {
        match (on, self.on_since) {
            (true, None) => {
                self.on_since = Some(Instant::now());
                self.bursts = self.bursts.saturating_add(1);
            }
            (false, Some(since)) => {
                self.lit += since.elapsed();
                self.on_since = None;
            }
            _ => {}
        }
        Ok(())
    }
}

// thread::sleep is too coarse for 560 µs symbols.
struct SpinDelay;

impl DelayNs for SpinDelay {
    fn delay_ns(&mut self, ns: u32) {
        let deadline = Instant::now() + Duration::from_nanos(u64::from(ns));
        while Instant::now() < deadline {
            std::hint::spin_loop();
        }
    }
}

struct SimulatedSleeper {
    shutdown: Arc<AtomicBool>,
}

impl Sleeper for SimulatedSleeper {
    fn suspend(&mut self, period: SleepPeriod) {
        let deadline = match period {
            SleepPeriod::Seconds(secs) => Some(Instant::now() + Duration::from_secs(secs.into())),
            SleepPeriod::Indefinitely => {
                info!("suspended indefinitely; ctrl-c to exit");
                None
            }
        };

        while !self.shutdown.load(Ordering::Relaxed) {
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return;
            }
            thread::sleep(SLEEP_SLICE);
        }
    }
}

struct ConfigStore {
    runtime_path: PathBuf,
}

impl ConfigStore {
    fn new() -> Self {
        let data_dir = std::env::var("REALTEMP_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./.realtemp"));

        Self {
            runtime_path: data_dir.join("runtime.json"),
        }
    }

    fn load_runtime_config(&self) -> anyhow::Result<RuntimeConfig> {
        match std::fs::read(&self.runtime_path) {
            Ok(raw) => RuntimeConfig::from_json_slice(&raw)
                .with_context(|| format!("invalid {}", self.runtime_path.display())),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(RuntimeConfig::default()),
            Err(err) => Err(err.into()),
        }
    }
}

fn env_u16(key: &str) -> Option<u16> {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
}
