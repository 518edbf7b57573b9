//! Telemetry channel table and open/append/close lifecycle
//!
//! Four independent append-only channels exist whenever logging is active.
//! Channel ids and record sizes are fixed; any downstream decoder relies on
//! them, so they must not change:
//!
//! | Channel | Id | Append unit |
//! |---|---|---|
//! | acceleration | 1 | 25 samples x 14 bytes = 350 bytes |
//! | heart-rate raw | 2 | 12 bytes |
//! | heart-rate filtered | 3 | 12 bytes |
//! | battery level | 4 | 11 bytes |

use crate::error::{LoggerError, SinkError};
use crate::sink::{LogSink, SessionRef};

/// Numeric id of a logical telemetry stream
pub type ChannelId = u32;

pub const ACCELERATION_LOG: ChannelId = 1;
pub const HEART_RATE_LOG: ChannelId = 2;
pub const HEART_RATE_FILTERED_LOG: ChannelId = 3;
pub const BATTERY_LEVEL_LOG: ChannelId = 4;

/// Encoded size of one accelerometer sample: ts(8) + x(2) + y(2) + z(2)
pub const ACCELERATION_SAMPLE_SIZE: usize = 14;
/// Samples collected into one acceleration append
pub const ACCELERATION_BATCH: usize = 25;
/// One acceleration append carries a whole batch
pub const ACCELERATION_RECORD_SIZE: usize = ACCELERATION_SAMPLE_SIZE * ACCELERATION_BATCH;
/// Heart-rate record: ts(8) + bpm(4)
pub const HEART_RATE_RECORD_SIZE: usize = 12;
/// Battery record: ts(8) + percent(1) + charging(1) + plugged(1)
pub const BATTERY_LEVEL_RECORD_SIZE: usize = 11;

/// The four logical telemetry streams
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryChannel {
    Acceleration,
    HeartRateRaw,
    HeartRateFiltered,
    BatteryLevel,
}

impl TelemetryChannel {
    pub const ALL: [TelemetryChannel; 4] = [
        TelemetryChannel::Acceleration,
        TelemetryChannel::HeartRateRaw,
        TelemetryChannel::HeartRateFiltered,
        TelemetryChannel::BatteryLevel,
    ];

    pub fn id(self) -> ChannelId {
        match self {
            TelemetryChannel::Acceleration => ACCELERATION_LOG,
            TelemetryChannel::HeartRateRaw => HEART_RATE_LOG,
            TelemetryChannel::HeartRateFiltered => HEART_RATE_FILTERED_LOG,
            TelemetryChannel::BatteryLevel => BATTERY_LEVEL_LOG,
        }
    }

    /// Exact byte length of one append to this channel
    pub fn record_size(self) -> usize {
        match self {
            TelemetryChannel::Acceleration => ACCELERATION_RECORD_SIZE,
            TelemetryChannel::HeartRateRaw => HEART_RATE_RECORD_SIZE,
            TelemetryChannel::HeartRateFiltered => HEART_RATE_RECORD_SIZE,
            TelemetryChannel::BatteryLevel => BATTERY_LEVEL_RECORD_SIZE,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TelemetryChannel::Acceleration => "acceleration",
            TelemetryChannel::HeartRateRaw => "heart-rate",
            TelemetryChannel::HeartRateFiltered => "heart-rate-filtered",
            TelemetryChannel::BatteryLevel => "battery-level",
        }
    }

    fn index(self) -> usize {
        match self {
            TelemetryChannel::Acceleration => 0,
            TelemetryChannel::HeartRateRaw => 1,
            TelemetryChannel::HeartRateFiltered => 2,
            TelemetryChannel::BatteryLevel => 3,
        }
    }
}

/// Open sessions for all four channels, held while logging is active.
///
/// Exactly one writer exists per channel: the background sensor handler owns
/// the set and every append goes through it.
#[derive(Debug, Default)]
pub struct ChannelSet {
    sessions: [Option<SessionRef>; 4],
}

impl ChannelSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open all four channels. All-or-nothing from the caller's perspective:
    /// if any open fails, the channels already opened are closed again and
    /// the error is returned.
    pub fn open_all(&mut self, sink: &mut dyn LogSink) -> Result<(), LoggerError> {
        for channel in TelemetryChannel::ALL {
            match sink.open(channel.id(), channel.record_size()) {
                Ok(session) => self.sessions[channel.index()] = Some(session),
                Err(source) => {
                    self.close_all(sink);
                    return Err(LoggerError::ChannelOpen {
                        id: channel.id(),
                        source,
                    });
                }
            }
        }
        Ok(())
    }

    /// Append one record of exactly `channel.record_size()` bytes.
    pub fn append(
        &mut self,
        sink: &mut dyn LogSink,
        channel: TelemetryChannel,
        record: &[u8],
    ) -> Result<(), SinkError> {
        let session = self.sessions[channel.index()].ok_or(SinkError::NotFound)?;
        sink.append(session, record)
    }

    /// Close every open channel. Best-effort; close failures are not
    /// escalated and the set can be reopened afterwards.
    pub fn close_all(&mut self, sink: &mut dyn LogSink) {
        for slot in &mut self.sessions {
            if let Some(session) = slot.take() {
                sink.close(session);
            }
        }
    }

    pub fn is_open(&self, channel: TelemetryChannel) -> bool {
        self.sessions[channel.index()].is_some()
    }
}
