//! State-synchronization protocol between the two processes
//!
//! The background worker and the foreground display exchange small typed
//! messages: a u16 key plus three u16 payload words. Sends are
//! fire-and-forget; a reply is itself a later message, and delivery is
//! assumed in order between the two contexts. Messages with a key neither
//! side recognizes are silently ignored.
//!
//! The device-state snapshot does not fit one message, so a DEVICE_STATE
//! request is answered with three follow-up messages (accel, heart-rate,
//! battery), each carrying part of the snapshot in its payload words.

use crate::types::{DeviceState, LoggingStatus};

/// Message keys, fixed by the protocol
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKey {
    StartLogging = 0,
    StopLogging = 1,
    ToggleLogging = 2,
    Status = 3,
    DeviceState = 4,
    DeviceStateAccel = 5,
    DeviceStateBattery = 6,
    DeviceStateHeartRate = 7,
}

impl MessageKey {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(MessageKey::StartLogging),
            1 => Some(MessageKey::StopLogging),
            2 => Some(MessageKey::ToggleLogging),
            3 => Some(MessageKey::Status),
            4 => Some(MessageKey::DeviceState),
            5 => Some(MessageKey::DeviceStateAccel),
            6 => Some(MessageKey::DeviceStateBattery),
            7 => Some(MessageKey::DeviceStateHeartRate),
            _ => None,
        }
    }

    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

/// One protocol message: key plus three fixed-width payload words.
///
/// Signed values ride the words two's-complement; the receiving side casts
/// them back to their declared width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerMessage {
    pub key: u16,
    pub data: [u16; 3],
}

impl WorkerMessage {
    /// Payload-free command (start/stop/toggle and the two request keys)
    pub fn command(key: MessageKey) -> Self {
        Self {
            key: key.as_u16(),
            data: [0; 3],
        }
    }

    /// Status reply carrying the worker's current logging status
    pub fn status(status: LoggingStatus) -> Self {
        Self {
            key: MessageKey::Status.as_u16(),
            data: [status.as_u16(), 0, 0],
        }
    }

    /// Accelerometer part of a device-state reply
    pub fn device_state_accel(x: i16, y: i16, z: i16) -> Self {
        Self {
            key: MessageKey::DeviceStateAccel.as_u16(),
            data: [x as u16, y as u16, z as u16],
        }
    }

    /// Battery part of a device-state reply
    pub fn device_state_battery(level: u8, charging: bool, plugged: bool) -> Self {
        Self {
            key: MessageKey::DeviceStateBattery.as_u16(),
            data: [u16::from(level), u16::from(charging), u16::from(plugged)],
        }
    }

    /// Heart-rate part of a device-state reply.
    ///
    /// Rates ride a single payload word each; readings are bounded far below
    /// u16 range.
    pub fn device_state_heart_rate(raw: i32, filtered: i32) -> Self {
        Self {
            key: MessageKey::DeviceStateHeartRate.as_u16(),
            data: [raw as u16, filtered as u16, 0],
        }
    }
}

/// Foreground copy of the worker's state, updated only by reply messages.
///
/// The mirror never reads shared memory: it folds STATUS and DEVICE_STATE_*
/// messages into its own `DeviceState` and status fields.
#[derive(Debug, Clone, Copy)]
pub struct StateMirror {
    pub device_state: DeviceState,
    pub status: LoggingStatus,
}

impl Default for StateMirror {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMirror {
    pub fn new() -> Self {
        Self {
            device_state: DeviceState::default(),
            status: LoggingStatus::Disabled,
        }
    }

    /// Fold one message into the mirror.
    ///
    /// Returns the key that was applied, so a display can react per update;
    /// unrecognized keys return `None` and change nothing.
    pub fn apply(&mut self, message: &WorkerMessage) -> Option<MessageKey> {
        let key = MessageKey::from_u16(message.key)?;
        match key {
            MessageKey::Status => {
                if let Some(status) = LoggingStatus::from_u16(message.data[0]) {
                    self.status = status;
                }
            }
            MessageKey::DeviceStateAccel => {
                self.device_state.x = message.data[0] as i16;
                self.device_state.y = message.data[1] as i16;
                self.device_state.z = message.data[2] as i16;
            }
            MessageKey::DeviceStateBattery => {
                self.device_state.battery_level = message.data[0] as u8;
                self.device_state.battery_charging = message.data[1] != 0;
                self.device_state.battery_plugged = message.data[2] != 0;
            }
            MessageKey::DeviceStateHeartRate => {
                self.device_state.heart_rate = i32::from(message.data[0]);
                self.device_state.heart_rate_filtered = i32::from(message.data[1]);
            }
            // command keys travel the other direction
            _ => {}
        }
        Some(key)
    }
}
