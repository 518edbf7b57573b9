//! Sensor callback handling
//!
//! [`SensorHandler`] is the single writer behind all four telemetry channels.
//! It has two states: Disabled (no channels open, no subscriptions) and
//! Running (all four channels open, subscribed to accelerometer, battery and
//! health callbacks). Each callback encodes one record, appends it to the
//! matching channel and updates the in-process [`DeviceState`] mirror.
//!
//! Append failures are logged with the sink's diagnostic description and the
//! record is dropped; there is no retry queue, so data loss on a transient
//! sink failure is accepted.

use crate::batcher::{last_accepted, AccelBatcher};
use crate::channels::{
    ChannelSet, TelemetryChannel, ACCELERATION_BATCH, BATTERY_LEVEL_RECORD_SIZE,
    HEART_RATE_RECORD_SIZE,
};
use crate::codec;
use crate::error::LoggerError;
use crate::sensors::{
    AccelSample, BatterySnapshot, HealthEvent, HeartRateMetric, SensorGateway,
};
use crate::sink::LogSink;
use crate::types::DeviceState;

pub struct SensorHandler {
    channels: ChannelSet,
    batcher: AccelBatcher,
    device_state: DeviceState,
    running: bool,
}

impl Default for SensorHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorHandler {
    pub fn new() -> Self {
        Self {
            channels: ChannelSet::new(),
            batcher: AccelBatcher::new(),
            device_state: DeviceState::default(),
            running: false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Latest known sensor values, owned by this handler
    pub fn device_state(&self) -> &DeviceState {
        &self.device_state
    }

    /// Disabled -> Running.
    ///
    /// Opens all four channels, then subscribes to the three sources. The
    /// current battery state and heart rate are sampled and pushed once
    /// before their subscriptions arm, so each channel holds a record even
    /// before the first asynchronous event arrives. If opening fails nothing
    /// is subscribed and the handler stays Disabled.
    pub fn start(
        &mut self,
        sink: &mut dyn LogSink,
        gateway: &mut dyn SensorGateway,
        now_ms: u64,
    ) -> Result<(), LoggerError> {
        if self.running {
            return Ok(());
        }
        self.channels.open_all(sink)?;
        self.running = true;

        gateway.subscribe_accel(ACCELERATION_BATCH);

        let snapshot = gateway.peek_battery();
        self.on_battery(sink, now_ms, snapshot);
        gateway.subscribe_battery();

        self.on_health_event(sink, gateway, now_ms, HealthEvent::HeartRateUpdate);
        gateway.subscribe_health();

        Ok(())
    }

    /// Running -> Disabled.
    ///
    /// Unsubscribes from all sources first, then closes the channels, so no
    /// callback can fire into a half-closed channel. Close failures are not
    /// escalated.
    pub fn stop(&mut self, sink: &mut dyn LogSink, gateway: &mut dyn SensorGateway) {
        if !self.running {
            return;
        }
        gateway.unsubscribe_accel();
        gateway.unsubscribe_battery();
        gateway.unsubscribe_health();

        self.channels.close_all(sink);
        self.running = false;
    }

    /// Accelerometer callback: batch, append, mirror the last accepted sample.
    pub fn on_accel_batch(&mut self, sink: &mut dyn LogSink, samples: &[AccelSample]) {
        let record = self.batcher.encode(samples);
        if let Err(err) = self
            .channels
            .append(sink, TelemetryChannel::Acceleration, record)
        {
            log::error!("failed to add acceleration data to the logging channel: {err}");
        }
        if let Some(last) = last_accepted(samples) {
            self.device_state.x = last.x;
            self.device_state.y = last.y;
            self.device_state.z = last.z;
        }
    }

    /// Battery callback: encode {ts, percent, charging, plugged}, append,
    /// mirror.
    pub fn on_battery(&mut self, sink: &mut dyn LogSink, now_ms: u64, snapshot: BatterySnapshot) {
        let mut record = [0u8; BATTERY_LEVEL_RECORD_SIZE];
        let at = codec::put_u64(&mut record, 0, now_ms);
        let at = codec::put_u8(&mut record, at, snapshot.percent);
        let at = codec::put_u8(&mut record, at, u8::from(snapshot.charging));
        codec::put_u8(&mut record, at, u8::from(snapshot.plugged));

        self.device_state.battery_level = snapshot.percent;
        self.device_state.battery_charging = snapshot.charging;
        self.device_state.battery_plugged = snapshot.plugged;

        if let Err(err) = self
            .channels
            .append(sink, TelemetryChannel::BatteryLevel, &record)
        {
            log::error!("failed to add battery level data to the logging channel: {err}");
        }
    }

    /// Health callback. Only heart-rate updates are acted on: the filtered
    /// and raw readings are queried at that moment and appended to their
    /// channels, both stamped with the same timestamp captured once per
    /// invocation.
    pub fn on_health_event(
        &mut self,
        sink: &mut dyn LogSink,
        gateway: &mut dyn SensorGateway,
        now_ms: u64,
        event: HealthEvent,
    ) {
        if event != HealthEvent::HeartRateUpdate {
            return;
        }

        let mut record = [0u8; HEART_RATE_RECORD_SIZE];
        let bpm_at = codec::put_u64(&mut record, 0, now_ms);

        let filtered = gateway.peek_heart_rate(HeartRateMetric::FilteredBpm);
        codec::put_i32(&mut record, bpm_at, filtered);
        self.device_state.heart_rate_filtered = filtered;
        if let Err(err) =
            self.channels
                .append(sink, TelemetryChannel::HeartRateFiltered, &record)
        {
            log::error!("failed to add filtered heart rate data to the logging channel: {err}");
        }

        // same timestamp prefix, only the bpm field is rewritten
        let raw = gateway.peek_heart_rate(HeartRateMetric::RawBpm);
        codec::put_i32(&mut record, bpm_at, raw);
        self.device_state.heart_rate = raw;
        if let Err(err) = self
            .channels
            .append(sink, TelemetryChannel::HeartRateRaw, &record)
        {
            log::error!("failed to add raw heart rate data to the logging channel: {err}");
        }
    }
}
