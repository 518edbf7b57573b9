//! Sensor sample types and the platform sensor gateway
//!
//! The raw subscription mechanism is a platform collaborator: it delivers
//! samples whenever it has them, on the background scheduling queue, and each
//! callback runs to completion. The crate only defines the data it receives
//! and the [`SensorGateway`] surface it drives subscriptions through.

use serde::{Deserialize, Serialize};

/// One raw accelerometer sample as delivered by the platform.
///
/// Ephemeral: produced by the sensor callback and consumed immediately by the
/// batch encoder, never stored individually.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccelSample {
    /// Milliseconds since epoch
    pub timestamp: u64,
    pub x: i16,
    pub y: i16,
    pub z: i16,
    /// Set when the sample was captured while the vibration motor ran;
    /// such samples measure the buzz, not the wearer, and are dropped.
    pub did_vibrate: bool,
}

/// Battery snapshot delivered on change and available on demand
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatterySnapshot {
    /// Charge percentage (0-100)
    pub percent: u8,
    pub charging: bool,
    pub plugged: bool,
}

/// Discrete health events delivered by the platform.
///
/// Only [`HealthEvent::HeartRateUpdate`] triggers any work; the other kinds
/// exist because the platform delivers them on the same subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthEvent {
    SignificantUpdate,
    MovementUpdate,
    SleepUpdate,
    HeartRateUpdate,
}

/// Which heart-rate reading to fetch from the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartRateMetric {
    RawBpm,
    FilteredBpm,
}

/// Subscription and synchronous-query surface of the platform sensor stack.
///
/// Subscribing arms the platform to deliver callbacks into the background
/// event queue; unsubscribing stops delivery. The peek methods answer
/// immediately with the platform's current reading.
pub trait SensorGateway {
    /// Arm accelerometer delivery, `samples_per_batch` samples per callback
    fn subscribe_accel(&mut self, samples_per_batch: usize);
    fn unsubscribe_accel(&mut self);

    fn subscribe_battery(&mut self);
    fn unsubscribe_battery(&mut self);

    fn subscribe_health(&mut self);
    fn unsubscribe_health(&mut self);

    /// Current battery state, queried synchronously
    fn peek_battery(&mut self) -> BatterySnapshot;

    /// Current heart-rate reading (bpm), queried synchronously
    fn peek_heart_rate(&mut self, metric: HeartRateMetric) -> i32;
}
