use crate::config::NodeConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Sampling,
    Deciding,
    Transmitting,
    Asleep,
}

impl CyclePhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sampling => "AWAKE_SAMPLING",
            Self::Deciding => "AWAKE_DECIDING",
            Self::Transmitting => "AWAKE_TRANSMITTING",
            Self::Asleep => "ASLEEP",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransmitReason {
    FirstReport,
    Delta,
    Elapsed,
}

impl TransmitReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FirstReport => "first report",
            Self::Delta => "temperature change",
            Self::Elapsed => "transmit interval elapsed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Transmit(TransmitReason),
    Hold,
}

// RAM only. A reset starts over from the default, which forces a report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecisionState {
    last_reported_temp_c: Option<i32>,
    cycles_since_last_transmit: u32,
}

impl DecisionState {
    pub fn with_last_report(temp_c: i32, cycles_since_last_transmit: u32) -> Self {
        Self {
            last_reported_temp_c: Some(temp_c),
            cycles_since_last_transmit,
        }
    }

    pub fn last_reported_temp_c(&self) -> Option<i32> {
        self.last_reported_temp_c
    }

    pub fn cycles_since_last_transmit(&self) -> u32 {
        self.cycles_since_last_transmit
    }

    pub fn wake(&mut self) {
        self.cycles_since_last_transmit = self.cycles_since_last_transmit.saturating_add(1);
    }

    pub fn record_transmit(&mut self, temp_c: i32) {
        self.last_reported_temp_c = Some(temp_c);
        self.cycles_since_last_transmit = 0;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportPolicy {
    delta_threshold_c: u32,
    transmit_ratio: u32,
}

impl ReportPolicy {
    pub fn new(delta_threshold_c: u32, transmit_ratio: u32) -> Self {
        Self {
            delta_threshold_c: delta_threshold_c.max(1),
            transmit_ratio: transmit_ratio.max(1),
        }
    }

    pub fn from_config(config: &NodeConfig) -> Self {
        Self::new(
            config.delta_threshold_c.unsigned_abs(),
            config.transmit_ratio(),
        )
    }

    pub fn delta_threshold_c(&self) -> u32 {
        self.delta_threshold_c
    }

    pub fn transmit_ratio(&self) -> u32 {
        self.transmit_ratio
    }

    pub fn evaluate(&self, state: &DecisionState, temp_c: i32) -> Decision {
        let Some(last) = state.last_reported_temp_c else {
            return Decision::Transmit(TransmitReason::FirstReport);
        };

        if temp_c.abs_diff(last) >= self.delta_threshold_c {
            Decision::Transmit(TransmitReason::Delta)
        } else if state.cycles_since_last_transmit >= self.transmit_ratio {
            Decision::Transmit(TransmitReason::Elapsed)
        } else {
            Decision::Hold
        }
    }
}

pub fn whole_celsius(millicelsius: i32) -> i32 {
    millicelsius / 1000
}
