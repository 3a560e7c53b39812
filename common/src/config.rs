use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const MAX_FOLLOW_ME_C: u8 = 30;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeConfig {
    pub wake_interval_secs: u16,
    pub transmit_interval_secs: u16,
    pub delta_threshold_c: i32,
    pub max_follow_me_c: u8,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            wake_interval_secs: 10,
            transmit_interval_secs: 20,
            delta_threshold_c: 1,
            max_follow_me_c: MAX_FOLLOW_ME_C,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepPeriod {
    Seconds(u16),
    Indefinitely,
}

impl SleepPeriod {
    pub fn from_secs(secs: u16) -> Self {
        if secs == 0 {
            Self::Indefinitely
        } else {
            Self::Seconds(secs)
        }
    }
}

impl NodeConfig {
    pub fn sanitize(&mut self) {
        self.delta_threshold_c = self.delta_threshold_c.clamp(1, 10);
        self.max_follow_me_c = self.max_follow_me_c.min(MAX_FOLLOW_ME_C);

        if self.wake_interval_secs > 0 && self.transmit_interval_secs < self.wake_interval_secs {
            self.transmit_interval_secs = self.wake_interval_secs;
        }
    }

    pub fn transmit_ratio(&self) -> u32 {
        if self.wake_interval_secs == 0 {
            return 1;
        }
        (u32::from(self.transmit_interval_secs) / u32::from(self.wake_interval_secs)).max(1)
    }

    pub fn sleep_period(&self) -> SleepPeriod {
        SleepPeriod::from_secs(self.wake_interval_secs)
    }

    pub fn is_one_shot(&self) -> bool {
        self.wake_interval_secs == 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IrHardwareConfig {
    pub tx_pin: i32,
    pub rmt_channel: u8,
}

impl Default for IrHardwareConfig {
    fn default() -> Self {
        Self {
            tx_pin: 4,
            rmt_channel: 0,
        }
    }
}

impl IrHardwareConfig {
    pub fn sanitize(&mut self) {
        if self.tx_pin < 0 {
            self.tx_pin = 4;
        }

        if self.rmt_channel > 7 {
            self.rmt_channel = 0;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SensorHardwareConfig {
    pub sda_pin: i32,
    pub scl_pin: i32,
    pub i2c_address: u8,
    pub bus_hz: u32,
}

impl Default for SensorHardwareConfig {
    fn default() -> Self {
        Self {
            sda_pin: 21,
            scl_pin: 22,
            i2c_address: crate::at30ts75::DEFAULT_ADDRESS,
            bus_hz: 10_000,
        }
    }
}

impl SensorHardwareConfig {
    pub fn sanitize(&mut self) {
        // AT30TS75 only answers on 0x48..=0x4F.
        if !(0x48..=0x4F).contains(&self.i2c_address) {
            self.i2c_address = crate::at30ts75::DEFAULT_ADDRESS;
        }
        self.bus_hz = self.bus_hz.clamp(1_000, 400_000);
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub ir: IrHardwareConfig,
    #[serde(default)]
    pub sensor: SensorHardwareConfig,
}

impl RuntimeConfig {
    pub fn from_json_slice(raw: &[u8]) -> Result<Self, ConfigError> {
        let mut runtime: Self = serde_json::from_slice(raw)?;
        runtime.sanitize();
        Ok(runtime)
    }

    pub fn sanitize(&mut self) {
        self.node.sanitize();
        self.ir.sanitize();
        self.sensor.sanitize();
    }
}
