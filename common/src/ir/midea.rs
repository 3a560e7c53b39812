use crate::config::MAX_FOLLOW_ME_C;

use super::pulse::{Carrier, PulseTrain};

pub const MIDEA_TICK_US: u32 = 560;
pub const HEADER_MARK_US: u32 = 8 * MIDEA_TICK_US;
pub const HEADER_SPACE_US: u32 = 8 * MIDEA_TICK_US;
pub const BIT_MARK_US: u32 = MIDEA_TICK_US;
pub const BIT_ONE_SPACE_US: u32 = 3 * MIDEA_TICK_US;
pub const BIT_ZERO_SPACE_US: u32 = MIDEA_TICK_US;
pub const FOOTER_MARK_US: u32 = MIDEA_TICK_US;
pub const FOOTER_SPACE_US: u32 = 10 * MIDEA_TICK_US;

pub const MIDEA_CARRIER: Carrier = Carrier::new(38_000, 50);

pub const FRAME_LEN: usize = 6;
pub const FRAME_BITS: usize = FRAME_LEN * 8;

const OFFSET_FOLLOW_ME: usize = 4;
const OFFSET_CHECKSUM: usize = 5;

// Byte 0: 10100 header, 100 message type (follow me).
const FOLLOW_ME_HEADER: u8 = 0xA4;
// Byte 1: power on, sleep off, fan auto, mode auto.
const POWER_MODE_FAN: u8 = 0x82;
// Byte 2: target 25 °C, Celsius.
const TARGET_TEMP: u8 = 0x48;
// Byte 3: beeper off, auto-off timer disabled.
const TIMER_BEEPER: u8 = 0x7F;

// Receiver leaves follow-me mode when set.
pub const FOLLOW_ME_DISABLE_BIT: u8 = 0x80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FollowMeCelsius(u8);

impl FollowMeCelsius {
    pub fn clamped(temp_c: i32, max_c: u8) -> Self {
        let max_c = max_c.min(MAX_FOLLOW_ME_C);
        Self(temp_c.clamp(0, i32::from(max_c)) as u8)
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MideaFrame {
    bytes: [u8; FRAME_LEN],
}

impl MideaFrame {
    pub fn follow_me(temp: FollowMeCelsius) -> Self {
        let mut bytes = [
            FOLLOW_ME_HEADER,
            POWER_MODE_FAN,
            TARGET_TEMP,
            TIMER_BEEPER,
            temp.get() + 1,
            0x00,
        ];
        bytes[OFFSET_CHECKSUM] = checksum(&bytes);
        debug_assert_eq!(bytes[OFFSET_FOLLOW_ME] & FOLLOW_ME_DISABLE_BIT, 0);

        Self { bytes }
    }

    pub fn bytes(&self) -> &[u8; FRAME_LEN] {
        &self.bytes
    }

    pub fn pulse_train(&self) -> PulseTrain {
        modulate(&self.bytes)
    }
}

// Subtract each bit-reversed byte from a running sum, then reverse the sum.
pub fn checksum(frame: &[u8; FRAME_LEN]) -> u8 {
    frame[..OFFSET_CHECKSUM]
        .iter()
        .fold(0_u8, |sum, byte| sum.wrapping_sub(byte.reverse_bits()))
        .reverse_bits()
}

pub fn verify(frame: &[u8; FRAME_LEN]) -> bool {
    checksum(frame) == frame[OFFSET_CHECKSUM]
}

// Header, 48 bits MSB first, footer; then all of it again with every bit
// inverted.
pub fn modulate(frame: &[u8; FRAME_LEN]) -> PulseTrain {
    let mut train = PulseTrain::with_capacity(2 * (FRAME_BITS + 2));

    for invert in [false, true] {
        train.push(HEADER_MARK_US, HEADER_SPACE_US);

        for byte in frame {
            for shift in (0..8).rev() {
                let bit = ((byte >> shift) & 1 == 1) != invert;
                let space_us = if bit {
                    BIT_ONE_SPACE_US
                } else {
                    BIT_ZERO_SPACE_US
                };
                train.push(BIT_MARK_US, space_us);
            }
        }

        train.push(FOOTER_MARK_US, FOOTER_SPACE_US);
    }

    train
}
