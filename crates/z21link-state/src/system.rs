use serde::Serialize;

use crate::error::{LengthRule, Result};

const CS_TRACK_VOLTAGE_OFF: u8 = 0x02;
const CS_SHORT_CIRCUIT: u8 = 0x04;
const CS_PROGRAMMING_MODE: u8 = 0x20;

/// Station telemetry from `LAN_SYSTEMSTATE_DATACHANGED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SystemState {
    /// Main track current in mA.
    pub main_current: i16,
    /// Programming track current in mA.
    pub prog_current: i16,
    /// Smoothed main track current in mA.
    pub filtered_main_current: i16,
    /// Internal temperature in °C.
    pub temperature: i16,
    /// Supply voltage in mV.
    pub supply_voltage: u16,
    /// Track voltage in mV.
    pub vcc_voltage: u16,
    pub central_state: u8,
    pub central_state_ex: u8,
    pub reserved: u8,
    pub capabilities: u8,
}

impl SystemState {
    pub const LEN: usize = 16;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        LengthRule::Exactly(Self::LEN).check("SystemState", data.len())?;

        let i16_at = |i: usize| i16::from_le_bytes([data[i], data[i + 1]]);
        let u16_at = |i: usize| u16::from_le_bytes([data[i], data[i + 1]]);

        Ok(Self {
            main_current: i16_at(0),
            prog_current: i16_at(2),
            filtered_main_current: i16_at(4),
            temperature: i16_at(6),
            supply_voltage: u16_at(8),
            vcc_voltage: u16_at(10),
            central_state: data[12],
            central_state_ex: data[13],
            reserved: data[14],
            capabilities: data[15],
        })
    }

    pub fn is_track_voltage_off(&self) -> bool {
        self.central_state & CS_TRACK_VOLTAGE_OFF != 0
    }

    pub fn is_short_circuit(&self) -> bool {
        self.central_state & CS_SHORT_CIRCUIT != 0
    }

    pub fn is_programming_mode(&self) -> bool {
        self.central_state & CS_PROGRAMMING_MODE != 0
    }
}
