use serde::Serialize;
use z21link_frame::ThrottleSteps;

use crate::error::{LengthRule, Result};

/// Number of function slots, F0 to F31.
pub const FUNCTION_COUNT: usize = 32;

/// Locomotive state from a `LOCO_INFO` reply or broadcast.
///
/// The station sends between 2 and 9 data bytes; fields beyond the received
/// length stay `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocoState {
    pub address: u16,
    pub is_busy: Option<bool>,
    pub steps: Option<ThrottleSteps>,
    /// Signed percentage of full speed; negative when travelling in reverse.
    pub speed_percentage: Option<f64>,
    pub reverse: Option<bool>,
    pub double_traction: Option<bool>,
    pub smart_search: Option<bool>,
    pub functions: Option<[bool; FUNCTION_COUNT]>,
}

impl LocoState {
    pub const MIN_LEN: usize = 2;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        LengthRule::AtLeast(Self::MIN_LEN).check("LocoState", data.len())?;

        let mut state = Self {
            address: (u16::from(data[0] & 0x3F) << 8) | u16::from(data[1]),
            is_busy: None,
            steps: None,
            speed_percentage: None,
            reverse: None,
            double_traction: None,
            smart_search: None,
            functions: None,
        };

        if let Some(&status) = data.get(2) {
            state.is_busy = Some(status & 0x08 != 0);
            state.steps = ThrottleSteps::try_from(status).ok();
        }

        if let Some(&speed) = data.get(3) {
            let reverse = speed & 0x80 == 0;
            state.reverse = Some(reverse);
            state.speed_percentage = state.steps.map(|steps| {
                let percent = f64::from(speed & 0x7F) / f64::from(steps.max_speed()) * 100.0;
                if reverse {
                    -percent
                } else {
                    percent
                }
            });
        }

        if let Some(&db4) = data.get(4) {
            state.double_traction = Some(db4 & 0x40 != 0);
            state.smart_search = Some(db4 & 0x20 != 0);

            let mut functions = [false; FUNCTION_COUNT];
            functions[0] = db4 & 0x10 != 0;
            fill_bits(&mut functions[1..5], db4);

            // F5-F12, F13-F20, F21-F28, then F29-F31 in the low three bits.
            for (byte, start) in data.iter().skip(5).zip([5usize, 13, 21, 29]) {
                let end = (start + 8).min(FUNCTION_COUNT);
                fill_bits(&mut functions[start..end], *byte);
            }
            state.functions = Some(functions);
        }

        Ok(state)
    }

    /// State of function `index`, if the station reported it.
    pub fn function(&self, index: usize) -> Option<bool> {
        self.functions.as_ref()?.get(index).copied()
    }

    /// Headlights are function F0.
    pub fn headlights(&self) -> Option<bool> {
        self.function(0)
    }
}

fn fill_bits(slots: &mut [bool], byte: u8) {
    for (bit, slot) in slots.iter_mut().enumerate() {
        *slot = byte & (1 << bit) != 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StateError;

    #[test]
    fn address_only() {
        let state = LocoState::from_bytes(&[0x00, 0x03]).unwrap();
        assert_eq!(state.address, 3);
        assert_eq!(state.is_busy, None);
        assert_eq!(state.steps, None);
        assert_eq!(state.speed_percentage, None);
        assert_eq!(state.reverse, None);
        assert_eq!(state.functions, None);
    }

    #[test]
    fn long_address_marker_is_stripped() {
        assert_eq!(LocoState::from_bytes(&[0x04, 0xD2]).unwrap().address, 1234);
        assert_eq!(LocoState::from_bytes(&[0xC4, 0xD2]).unwrap().address, 1234);
    }

    #[test]
    fn speed_and_direction() {
        let state = LocoState::from_bytes(&[0x00, 0x03, 0x04, 0xC0]).unwrap();
        assert_eq!(state.steps, Some(ThrottleSteps::Steps128));
        assert_eq!(state.is_busy, Some(false));
        assert_eq!(state.reverse, Some(false));
        assert_eq!(state.speed_percentage, Some(50.0));

        let state = LocoState::from_bytes(&[0x00, 0x03, 0x0A, 0x0E]).unwrap();
        assert_eq!(state.steps, Some(ThrottleSteps::Steps28));
        assert_eq!(state.is_busy, Some(true));
        assert_eq!(state.reverse, Some(true));
        assert_eq!(state.speed_percentage, Some(-50.0));
    }

    #[test]
    fn invalid_steps_leave_speed_absent() {
        let state = LocoState::from_bytes(&[0x00, 0x03, 0x03, 0xC0]).unwrap();
        assert_eq!(state.steps, None);
        assert_eq!(state.reverse, Some(false));
        assert_eq!(state.speed_percentage, None);
    }

    #[test]
    fn functions_f0_to_f4() {
        let state = LocoState::from_bytes(&[0x00, 0x03, 0x04, 0x80, 0x75]).unwrap();
        assert_eq!(state.double_traction, Some(true));
        assert_eq!(state.smart_search, Some(true));
        assert_eq!(state.headlights(), Some(true));
        assert_eq!(state.function(1), Some(true));
        assert_eq!(state.function(2), Some(false));
        assert_eq!(state.function(3), Some(true));
        assert_eq!(state.function(4), Some(false));
        assert_eq!(state.function(5), Some(false));
        assert_eq!(state.function(32), None);
    }

    #[test]
    fn all_function_banks() {
        let state = LocoState::from_bytes(&[
            0x00, 0x03, 0x04, 0x80, 0x00, 0x01, 0x80, 0x02, 0xFF,
        ])
        .unwrap();
        let functions = state.functions.unwrap();
        assert!(functions[5]);
        assert!(!functions[12]);
        assert!(functions[20]);
        assert!(functions[22]);
        assert!(functions[29] && functions[30] && functions[31]);
        assert_eq!(functions.iter().filter(|on| **on).count(), 6);
    }

    #[test]
    fn too_short() {
        let err = LocoState::from_bytes(&[0x00]).unwrap_err();
        assert_eq!(
            err,
            StateError::Length {
                record: "LocoState",
                expected: LengthRule::AtLeast(2),
                actual: 1,
            }
        );
    }

    #[test]
    fn serializes_steps_as_count() {
        let state = LocoState::from_bytes(&[0x00, 0x03, 0x02, 0x80]).unwrap();
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["steps"], 28);
        assert_eq!(json["address"], 3);
    }
}
