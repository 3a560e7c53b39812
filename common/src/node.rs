use core::fmt::Debug;

use log::{debug, info, warn};
use serde::Serialize;

use crate::{
    config::{NodeConfig, SleepPeriod},
    error::NodeError,
    ir::{FollowMeCelsius, IrTransmitter, MideaFrame},
    report::{whole_celsius, CyclePhase, Decision, DecisionState, ReportPolicy, TransmitReason},
};

pub trait TemperatureSensor {
    type Error: Debug;

    fn read_millicelsius(&mut self) -> Result<i32, Self::Error>;
}

// With SleepPeriod::Indefinitely real hardware never returns.
pub trait Sleeper {
    fn suspend(&mut self, period: SleepPeriod);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    SensorFailed,
    Held {
        temp_c: i32,
    },
    Transmitted {
        reason: TransmitReason,
        temp_c: i32,
        frame: MideaFrame,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeDiagnostics {
    pub phase: &'static str,
    #[serde(rename = "lastReportedTempC")]
    pub last_reported_temp_c: Option<i32>,
    #[serde(rename = "cyclesSinceLastTransmit")]
    pub cycles_since_last_transmit: u32,
    #[serde(rename = "transmitRatio")]
    pub transmit_ratio: u32,
    #[serde(rename = "wakeIntervalSecs")]
    pub wake_interval_secs: u16,
    pub cycles: u64,
    pub transmissions: u64,
    #[serde(rename = "sensorFailures")]
    pub sensor_failures: u64,
}

pub struct SensorNode<S, T, Z> {
    config: NodeConfig,
    policy: ReportPolicy,
    state: DecisionState,
    phase: CyclePhase,
    sensor: S,
    transmitter: T,
    sleeper: Z,
    cycles: u64,
    transmissions: u64,
    sensor_failures: u64,
}

impl<S, T, Z> SensorNode<S, T, Z>
where
    S: TemperatureSensor,
    T: IrTransmitter,
    Z: Sleeper,
{
    pub fn new(mut config: NodeConfig, sensor: S, transmitter: T, sleeper: Z) -> Self {
        config.sanitize();
        Self {
            policy: ReportPolicy::from_config(&config),
            config,
            state: DecisionState::default(),
            phase: CyclePhase::Asleep,
            sensor,
            transmitter,
            sleeper,
            cycles: 0,
            transmissions: 0,
            sensor_failures: 0,
        }
    }

    pub fn with_state(mut self, state: DecisionState) -> Self {
        self.state = state;
        self
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn state(&self) -> &DecisionState {
        &self.state
    }

    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    pub fn transmitter(&self) -> &T {
        &self.transmitter
    }

    pub fn sleeper(&self) -> &Z {
        &self.sleeper
    }

    pub fn run_cycle(&mut self) -> Result<CycleOutcome, NodeError> {
        self.cycles = self.cycles.saturating_add(1);
        self.state.wake();

        self.phase = CyclePhase::Sampling;
        let millicelsius = match self.sensor.read_millicelsius() {
            Ok(value) => value,
            Err(err) => {
                self.sensor_failures = self.sensor_failures.saturating_add(1);
                warn!("temperature read failed, skipping cycle: {err:?}");
                self.phase = CyclePhase::Asleep;
                return Ok(CycleOutcome::SensorFailed);
            }
        };

        self.phase = CyclePhase::Deciding;
        let temp_c = whole_celsius(millicelsius);

        let reason = match self.policy.evaluate(&self.state, temp_c) {
            Decision::Transmit(reason) => reason,
            Decision::Hold => {
                debug!(
                    "holding at {temp_c}°C ({millicelsius} m°C), last report {:?}, {} cycle(s) since",
                    self.state.last_reported_temp_c(),
                    self.state.cycles_since_last_transmit()
                );
                self.phase = CyclePhase::Asleep;
                return Ok(CycleOutcome::Held { temp_c });
            }
        };

        self.phase = CyclePhase::Transmitting;
        let frame = MideaFrame::follow_me(FollowMeCelsius::clamped(
            temp_c,
            self.config.max_follow_me_c,
        ));
        let train = frame.pulse_train();

        info!(
            "reporting {temp_c}°C ({}), frame {:02X?}, {} µs on air",
            reason.as_str(),
            frame.bytes(),
            train.total_us()
        );

        self.transmitter
            .transmit(&train)
            .map_err(|err| NodeError::Transmit(Box::new(err)))?;

        self.state.record_transmit(temp_c);
        self.transmissions = self.transmissions.saturating_add(1);
        self.phase = CyclePhase::Asleep;

        Ok(CycleOutcome::Transmitted {
            reason,
            temp_c,
            frame,
        })
    }

    pub fn sleep(&mut self) {
        self.phase = CyclePhase::Asleep;
        let period = self.config.sleep_period();
        debug!("suspending for {period:?}");
        self.sleeper.suspend(period);
    }

    pub fn step(&mut self) -> Result<CycleOutcome, NodeError> {
        let outcome = self.run_cycle()?;
        self.sleep();
        Ok(outcome)
    }

    pub fn run(&mut self) -> Result<(), NodeError> {
        loop {
            self.step()?;
            if self.config.is_one_shot() {
                return Ok(());
            }
        }
    }

    pub fn diagnostics(&self) -> NodeDiagnostics {
        NodeDiagnostics {
            phase: self.phase.as_str(),
            last_reported_temp_c: self.state.last_reported_temp_c(),
            cycles_since_last_transmit: self.state.cycles_since_last_transmit(),
            transmit_ratio: self.policy.transmit_ratio(),
            wake_interval_secs: self.config.wake_interval_secs,
            cycles: self.cycles,
            transmissions: self.transmissions,
            sensor_failures: self.sensor_failures,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::VecDeque, convert::Infallible};

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::ir::PulseTrain;

    #[derive(Debug)]
    struct ReadFailed;

    struct ScriptedSensor {
        readings: VecDeque<Result<i32, ReadFailed>>,
    }

    impl ScriptedSensor {
        fn new(readings: impl IntoIterator<Item = Result<i32, ReadFailed>>) -> Self {
            Self {
                readings: readings.into_iter().collect(),
            }
        }

        fn steady(millicelsius: i32) -> Self {
            Self::new(std::iter::repeat_with(move || Ok(millicelsius)).take(64))
        }
    }

    impl TemperatureSensor for ScriptedSensor {
        type Error = ReadFailed;

        fn read_millicelsius(&mut self) -> Result<i32, Self::Error> {
            self.readings.pop_front().unwrap_or(Err(ReadFailed))
        }
    }

    #[derive(Default)]
    struct RecordingTransmitter {
        trains: Vec<PulseTrain>,
    }

    impl IrTransmitter for RecordingTransmitter {
        type Error = Infallible;

        fn transmit(&mut self, train: &PulseTrain) -> Result<(), Self::Error> {
            self.trains.push(train.clone());
            Ok(())
        }
    }

    #[derive(Debug, thiserror::Error)]
    #[error("carrier timer fault")]
    struct TimerFault;

    struct BrokenTransmitter;

    impl IrTransmitter for BrokenTransmitter {
        type Error = TimerFault;

        fn transmit(&mut self, _train: &PulseTrain) -> Result<(), Self::Error> {
            Err(TimerFault)
        }
    }

    #[derive(Default)]
    struct RecordingSleeper {
        periods: Vec<SleepPeriod>,
    }

    impl Sleeper for RecordingSleeper {
        fn suspend(&mut self, period: SleepPeriod) {
            self.periods.push(period);
        }
    }

    fn node(
        sensor: ScriptedSensor,
    ) -> SensorNode<ScriptedSensor, RecordingTransmitter, RecordingSleeper> {
        SensorNode::new(
            NodeConfig::default(),
            sensor,
            RecordingTransmitter::default(),
            RecordingSleeper::default(),
        )
    }

    #[test]
    fn startup_report_carries_golden_frame() {
        let mut node = node(ScriptedSensor::steady(25_400));

        let outcome = node.step().unwrap();

        let CycleOutcome::Transmitted {
            reason,
            temp_c,
            frame,
        } = outcome.clone()
        else {
            panic!("expected a transmission, got {outcome:?}");
        };
        assert_eq!(reason, TransmitReason::FirstReport);
        assert_eq!(temp_c, 25);
        assert_eq!(frame.bytes(), &[0xA4, 0x82, 0x48, 0x7F, 0x1A, 0x4C]);
        assert_eq!(node.transmitter().trains, vec![frame.pulse_train()]);
        assert_eq!(node.sleeper().periods, vec![SleepPeriod::Seconds(10)]);
        assert_eq!(node.state(), &DecisionState::with_last_report(25, 0));
        assert_eq!(node.phase(), CyclePhase::Asleep);
    }

    #[test]
    fn unchanged_temperature_reports_when_interval_elapses() {
        let mut node =
            node(ScriptedSensor::steady(25_000)).with_state(DecisionState::with_last_report(25, 0));

        assert_eq!(node.step().unwrap(), CycleOutcome::Held { temp_c: 25 });
        assert_eq!(node.state().cycles_since_last_transmit(), 1);

        let outcome = node.step().unwrap();
        assert!(matches!(
            outcome,
            CycleOutcome::Transmitted {
                reason: TransmitReason::Elapsed,
                temp_c: 25,
                ..
            }
        ));
        assert_eq!(node.state(), &DecisionState::with_last_report(25, 0));
        assert_eq!(node.transmitter().trains.len(), 1);
    }

    #[test]
    fn small_drift_only_sends_startup_report() {
        let config = NodeConfig {
            wake_interval_secs: 10,
            transmit_interval_secs: 600,
            ..NodeConfig::default()
        };
        let readings = [22_100, 22_900, 22_450, 22_999, 22_000, 22_700]
            .into_iter()
            .map(Ok);
        let mut node = SensorNode::new(
            config,
            ScriptedSensor::new(readings),
            RecordingTransmitter::default(),
            RecordingSleeper::default(),
        );

        let outcomes: Vec<_> = (0..6).map(|_| node.step().unwrap()).collect();

        assert!(matches!(
            outcomes[0],
            CycleOutcome::Transmitted {
                reason: TransmitReason::FirstReport,
                ..
            }
        ));
        assert!(outcomes[1..]
            .iter()
            .all(|outcome| *outcome == CycleOutcome::Held { temp_c: 22 }));
        assert_eq!(node.transmitter().trains.len(), 1);
        assert_eq!(node.state().cycles_since_last_transmit(), 5);
    }

    #[test]
    fn whole_degree_change_reports_early() {
        let readings = [20_500, 20_800, 21_050].into_iter().map(Ok);
        let mut node = node(ScriptedSensor::new(readings));

        node.step().unwrap();
        assert_eq!(node.step().unwrap(), CycleOutcome::Held { temp_c: 20 });

        let outcome = node.step().unwrap();
        assert!(matches!(
            outcome,
            CycleOutcome::Transmitted {
                reason: TransmitReason::Delta,
                temp_c: 21,
                ..
            }
        ));
    }

    #[test]
    fn sensor_failure_skips_straight_to_sleep() {
        let readings = [Ok(24_000), Err(ReadFailed), Ok(24_000)];
        let mut node = node(ScriptedSensor::new(readings));
        node.step().unwrap();

        let outcome = node.step().unwrap();

        assert_eq!(outcome, CycleOutcome::SensorFailed);
        assert_eq!(node.state().last_reported_temp_c(), Some(24));
        // The wake still counts toward the transmit interval.
        assert_eq!(node.state().cycles_since_last_transmit(), 1);
        assert_eq!(node.transmitter().trains.len(), 1);
        assert_eq!(node.sleeper().periods.len(), 2);
        assert_eq!(node.diagnostics().sensor_failures, 1);

        assert!(matches!(
            node.step().unwrap(),
            CycleOutcome::Transmitted {
                reason: TransmitReason::Elapsed,
                temp_c: 24,
                ..
            }
        ));
    }

    #[test]
    fn failure_before_first_report_keeps_it_pending() {
        let readings = [Err(ReadFailed), Ok(19_000)];
        let mut node = node(ScriptedSensor::new(readings));

        assert_eq!(node.step().unwrap(), CycleOutcome::SensorFailed);
        assert_eq!(node.state().last_reported_temp_c(), None);

        assert!(matches!(
            node.step().unwrap(),
            CycleOutcome::Transmitted {
                reason: TransmitReason::FirstReport,
                ..
            }
        ));
    }

    #[test]
    fn hot_room_is_clamped_in_frame_but_remembered_as_read() {
        let readings = [35_200, 35_600].into_iter().map(Ok);
        let mut node = node(ScriptedSensor::new(readings));

        let CycleOutcome::Transmitted { frame, temp_c, .. } = node.step().unwrap() else {
            panic!("expected startup report");
        };
        assert_eq!(temp_c, 35);
        assert_eq!(frame.bytes()[4], 31);
        assert_eq!(node.state().last_reported_temp_c(), Some(35));

        assert_eq!(node.step().unwrap(), CycleOutcome::Held { temp_c: 35 });
    }

    #[test]
    fn transmit_fault_is_fatal_and_keeps_state() {
        let mut node = SensorNode::new(
            NodeConfig::default(),
            ScriptedSensor::steady(21_000),
            BrokenTransmitter,
            RecordingSleeper::default(),
        );

        let err = node.step().unwrap_err();

        assert!(matches!(err, NodeError::Transmit(_)));
        assert_eq!(node.state().last_reported_temp_c(), None);
        assert!(node.sleeper().periods.is_empty());
    }

    #[test]
    fn one_shot_mode_sleeps_forever_after_one_cycle() {
        let config = NodeConfig {
            wake_interval_secs: 0,
            ..NodeConfig::default()
        };
        let mut node = SensorNode::new(
            config,
            ScriptedSensor::steady(18_000),
            RecordingTransmitter::default(),
            RecordingSleeper::default(),
        );

        node.run().unwrap();

        assert_eq!(node.transmitter().trains.len(), 1);
        assert_eq!(node.sleeper().periods, vec![SleepPeriod::Indefinitely]);
    }

    #[test]
    fn diagnostics_track_counters() {
        let mut node = node(ScriptedSensor::steady(23_000));
        for _ in 0..4 {
            node.step().unwrap();
        }

        let diagnostics = node.diagnostics();
        assert_eq!(diagnostics.cycles, 4);
        assert_eq!(diagnostics.transmissions, 2);
        assert_eq!(diagnostics.cycles_since_last_transmit, 1);
        assert_eq!(diagnostics.phase, "ASLEEP");
    }
}
