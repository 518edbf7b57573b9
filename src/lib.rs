//! Pulselog - on-wrist telemetry capture core for wearable sensor loggers
//!
//! Pulselog turns raw sensor callbacks into fixed-layout binary records and
//! feeds them to append-only logging channels through a deterministic path:
//! sensor callback → encode → batch → channel append. A second, independent
//! path mirrors a small device-state snapshot to a foreground process over a
//! typed message protocol and keeps the logging on/off choice across
//! restarts.
//!
//! ## Modules
//!
//! - **Capture Pipeline**: codec, batcher, channels, handler — from raw
//!   samples to appended records
//! - **State Sync**: protocol, worker, persist — commands in, status and
//!   device-state replies out
//!
//! The platform pieces (sensor subscriptions, the append-only store, durable
//! flag storage) are traits; the crate ships in-memory implementations for
//! tests and host-side simulation.

pub mod batcher;
pub mod channels;
pub mod clock;
pub mod codec;
pub mod error;
pub mod handler;
pub mod persist;
pub mod protocol;
pub mod sensors;
pub mod sink;
pub mod types;
pub mod worker;

pub use batcher::AccelBatcher;
pub use channels::{ChannelSet, TelemetryChannel};
pub use error::{LoggerError, SinkError};
pub use handler::SensorHandler;
pub use persist::{FileFlagStore, FlagStore, MemoryFlagStore};
pub use protocol::{MessageKey, StateMirror, WorkerMessage};
pub use sensors::{AccelSample, BatterySnapshot, HealthEvent, HeartRateMetric, SensorGateway};
pub use sink::{LogSink, MemorySink, SessionRef};
pub use types::{DeviceState, LoggingStatus};
pub use worker::{Worker, WorkerEvent};

/// Crate version embedded in simulator output
pub const PULSELOG_VERSION: &str = env!("CARGO_PKG_VERSION");
