//! Core state types shared by the background worker and the foreground mirror

use serde::{Deserialize, Serialize};

/// Latest known sensor and battery values.
///
/// Mutated only by the background sensor handler; the foreground holds its
/// own copy updated exclusively through state-sync reply messages, never
/// through shared memory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceState {
    /// Latest accepted accelerometer sample, raw axis values
    pub x: i16,
    pub y: i16,
    pub z: i16,
    /// Raw heart rate (bpm)
    pub heart_rate: i32,
    /// Vendor-filtered heart rate (bpm)
    pub heart_rate_filtered: i32,
    /// Battery charge (0-100)
    pub battery_level: u8,
    pub battery_charging: bool,
    pub battery_plugged: bool,
}

/// Whether the background worker is currently logging.
///
/// Transitions only via explicit start/stop commands; the choice survives
/// process restart through the persisted flag store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoggingStatus {
    Running,
    Disabled,
}

impl LoggingStatus {
    /// Wire value carried in status messages
    pub fn as_u16(self) -> u16 {
        match self {
            LoggingStatus::Running => 0,
            LoggingStatus::Disabled => 1,
        }
    }

    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(LoggingStatus::Running),
            1 => Some(LoggingStatus::Disabled),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LoggingStatus::Running => "running",
            LoggingStatus::Disabled => "disabled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_round_trip() {
        for status in [LoggingStatus::Running, LoggingStatus::Disabled] {
            assert_eq!(LoggingStatus::from_u16(status.as_u16()), Some(status));
        }
        assert_eq!(LoggingStatus::from_u16(7), None);
    }

    #[test]
    fn test_device_state_defaults_to_zero() {
        let state = DeviceState::default();
        assert_eq!(state.x, 0);
        assert_eq!(state.heart_rate, 0);
        assert_eq!(state.battery_level, 0);
        assert!(!state.battery_charging);
    }
}
