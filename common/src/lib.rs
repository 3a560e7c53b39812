pub mod at30ts75;
pub mod config;
pub mod error;
pub mod ir;
pub mod node;
pub mod report;

pub use at30ts75::At30ts75;
pub use config::{IrHardwareConfig, NodeConfig, RuntimeConfig, SensorHardwareConfig, SleepPeriod};
pub use error::{ConfigError, NodeError, SensorError};
pub use ir::{BitBangTransmitter, CarrierEmitter, FollowMeCelsius, IrTransmitter, MideaFrame, PulseTrain};
pub use node::{CycleOutcome, NodeDiagnostics, SensorNode, Sleeper, TemperatureSensor};
pub use report::{CyclePhase, Decision, DecisionState, ReportPolicy, TransmitReason};
