//! Background worker
//!
//! The worker owns every piece of mutable logging state: the sink, the
//! sensor gateway, the flag store, the sensor handler and the current
//! logging status. It consumes a single event queue carrying both foreground
//! commands and sensor callbacks; each event runs to completion before the
//! next, which is what makes the batch encoder's buffer reuse safe.
//!
//! Replies to the foreground are fire-and-forget messages on the outbound
//! channel; a disconnected foreground is ignored.

use std::sync::mpsc::{Receiver, Sender};

use crate::clock::Clock;
use crate::handler::SensorHandler;
use crate::persist::FlagStore;
use crate::protocol::{MessageKey, WorkerMessage};
use crate::sensors::{AccelSample, BatterySnapshot, HealthEvent, SensorGateway};
use crate::sink::LogSink;
use crate::types::{DeviceState, LoggingStatus};

/// Logging state assumed on first run, before any flag has been persisted
pub const DEFAULT_LOGGING_ENABLED: bool = true;

/// Everything the background queue can deliver: foreground protocol messages
/// and platform sensor callbacks, in arrival order.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Message(WorkerMessage),
    AccelBatch(Vec<AccelSample>),
    Battery(BatterySnapshot),
    Health(HealthEvent),
}

pub struct Worker<S, G, F, C> {
    sink: S,
    gateway: G,
    flags: F,
    clock: C,
    handler: SensorHandler,
    status: LoggingStatus,
    outbox: Sender<WorkerMessage>,
}

impl<S, G, F, C> Worker<S, G, F, C>
where
    S: LogSink,
    G: SensorGateway,
    F: FlagStore,
    C: Clock,
{
    pub fn new(sink: S, gateway: G, flags: F, clock: C, outbox: Sender<WorkerMessage>) -> Self {
        Self {
            sink,
            gateway,
            flags,
            clock,
            handler: SensorHandler::new(),
            status: LoggingStatus::Disabled,
            outbox,
        }
    }

    pub fn status(&self) -> LoggingStatus {
        self.status
    }

    pub fn device_state(&self) -> &DeviceState {
        self.handler.device_state()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn flags(&self) -> &F {
        &self.flags
    }

    /// Restore the persisted logging choice and start if it says so.
    ///
    /// An absent flag means first run: the default is assumed and written
    /// back, so the next boot finds a value.
    pub fn init(&mut self) {
        log::info!("background worker launched");
        let enabled = match self.flags.read() {
            Ok(Some(enabled)) => enabled,
            Ok(None) => {
                if let Err(err) = self.flags.write(DEFAULT_LOGGING_ENABLED) {
                    log::error!("failed to persist default logging flag: {err}");
                }
                DEFAULT_LOGGING_ENABLED
            }
            Err(err) => {
                log::error!("failed to read logging flag: {err}");
                DEFAULT_LOGGING_ENABLED
            }
        };
        if enabled {
            self.start();
        }
    }

    /// Drain the event queue until it closes, then shut down.
    pub fn run(&mut self, inbox: Receiver<WorkerEvent>) {
        self.init();
        for event in inbox.iter() {
            self.dispatch(event);
        }
        self.shutdown();
    }

    /// Stop logging cooperatively and log the exit.
    pub fn shutdown(&mut self) {
        self.stop();
        log::info!("background worker quit");
    }

    /// Process one event to completion.
    ///
    /// Sensor events reach the handler only while Running; after a stop the
    /// subscriptions are gone, so anything still in flight is dropped here.
    pub fn dispatch(&mut self, event: WorkerEvent) {
        match event {
            WorkerEvent::Message(message) => self.handle_message(message),
            WorkerEvent::AccelBatch(samples) => {
                if self.status == LoggingStatus::Running {
                    self.handler.on_accel_batch(&mut self.sink, &samples);
                }
            }
            WorkerEvent::Battery(snapshot) => {
                if self.status == LoggingStatus::Running {
                    let now = self.clock.now_ms();
                    self.handler.on_battery(&mut self.sink, now, snapshot);
                }
            }
            WorkerEvent::Health(event) => {
                if self.status == LoggingStatus::Running {
                    let now = self.clock.now_ms();
                    self.handler
                        .on_health_event(&mut self.sink, &mut self.gateway, now, event);
                }
            }
        }
    }

    fn handle_message(&mut self, message: WorkerMessage) {
        let Some(key) = MessageKey::from_u16(message.key) else {
            log::debug!("ignoring message with unrecognized key {}", message.key);
            return;
        };
        match key {
            MessageKey::StartLogging => self.set_logging(true),
            MessageKey::StopLogging => self.set_logging(false),
            MessageKey::ToggleLogging => {
                self.set_logging(self.status == LoggingStatus::Disabled)
            }
            MessageKey::Status => self.send_status(),
            MessageKey::DeviceState => self.send_device_state(),
            // reply keys travel background -> foreground only
            _ => {}
        }
    }

    /// Persist and apply a logging choice. Already being in the target state
    /// is a complete no-op: no transition, no duplicate persist write, no
    /// status push.
    fn set_logging(&mut self, enable: bool) {
        let target = if enable {
            LoggingStatus::Running
        } else {
            LoggingStatus::Disabled
        };
        if self.status == target {
            return;
        }
        if let Err(err) = self.flags.write(enable) {
            log::error!("failed to persist logging flag: {err}");
        }
        if enable {
            self.start();
        } else {
            self.stop();
        }
    }

    fn start(&mut self) {
        if self.status == LoggingStatus::Running {
            return;
        }
        let now = self.clock.now_ms();
        match self.handler.start(&mut self.sink, &mut self.gateway, now) {
            Ok(()) => self.status = LoggingStatus::Running,
            // stay Disabled; the status push below tells the foreground
            Err(err) => log::error!("failed to start logging: {err}"),
        }
        self.send_status();
    }

    fn stop(&mut self) {
        if self.status == LoggingStatus::Disabled {
            return;
        }
        self.handler.stop(&mut self.sink, &mut self.gateway);
        self.status = LoggingStatus::Disabled;
        self.send_status();
    }

    fn send_status(&self) {
        let _ = self.outbox.send(WorkerMessage::status(self.status));
    }

    /// Reply to a DEVICE_STATE request: the snapshot split across three
    /// messages (accel, heart-rate, battery), whatever the transport's
    /// per-message payload limit.
    fn send_device_state(&self) {
        let state = self.handler.device_state();
        let _ = self
            .outbox
            .send(WorkerMessage::device_state_accel(state.x, state.y, state.z));
        let _ = self.outbox.send(WorkerMessage::device_state_heart_rate(
            state.heart_rate,
            state.heart_rate_filtered,
        ));
        let _ = self.outbox.send(WorkerMessage::device_state_battery(
            state.battery_level,
            state.battery_charging,
            state.battery_plugged,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::{ACCELERATION_LOG, BATTERY_LEVEL_LOG, HEART_RATE_LOG};
    use crate::clock::FixedClock;
    use crate::persist::MemoryFlagStore;
    use crate::protocol::StateMirror;
    use crate::sensors::HeartRateMetric;
    use crate::sink::MemorySink;
    use std::sync::mpsc;

    #[derive(Debug, Default)]
    struct FakeGateway {
        battery: BatterySnapshot,
        raw_bpm: i32,
        filtered_bpm: i32,
    }

    impl SensorGateway for FakeGateway {
        fn subscribe_accel(&mut self, _samples_per_batch: usize) {}
        fn unsubscribe_accel(&mut self) {}
        fn subscribe_battery(&mut self) {}
        fn unsubscribe_battery(&mut self) {}
        fn subscribe_health(&mut self) {}
        fn unsubscribe_health(&mut self) {}
        fn peek_battery(&mut self) -> BatterySnapshot {
            self.battery
        }
        fn peek_heart_rate(&mut self, metric: HeartRateMetric) -> i32 {
            match metric {
                HeartRateMetric::RawBpm => self.raw_bpm,
                HeartRateMetric::FilteredBpm => self.filtered_bpm,
            }
        }
    }

    type TestWorker = Worker<MemorySink, FakeGateway, MemoryFlagStore, FixedClock>;

    fn make_worker(flags: MemoryFlagStore) -> (TestWorker, mpsc::Receiver<WorkerMessage>) {
        let (tx, rx) = mpsc::channel();
        let worker = Worker::new(
            MemorySink::new(),
            FakeGateway::default(),
            flags,
            FixedClock(1000),
            tx,
        );
        (worker, rx)
    }

    fn drain(rx: &mpsc::Receiver<WorkerMessage>) -> Vec<WorkerMessage> {
        rx.try_iter().collect()
    }

    #[test]
    fn test_first_run_defaults_to_enabled_and_writes_default() {
        let (mut worker, rx) = make_worker(MemoryFlagStore::new());
        worker.init();

        assert_eq!(worker.status(), LoggingStatus::Running);
        assert_eq!(worker.flags().read().unwrap(), Some(true));
        assert_eq!(worker.flags().write_count(), 1);
        // the transition pushed a status message
        let pushed = drain(&rx);
        assert_eq!(pushed, vec![WorkerMessage::status(LoggingStatus::Running)]);
    }

    #[test]
    fn test_persisted_disabled_flag_keeps_worker_idle() {
        let (mut worker, rx) = make_worker(MemoryFlagStore::with_value(false));
        worker.init();

        assert_eq!(worker.status(), LoggingStatus::Disabled);
        assert_eq!(worker.flags().write_count(), 0);
        assert_eq!(worker.sink().open_session_count(), 0);
        assert!(drain(&rx).is_empty());
    }

    #[test]
    fn test_stop_while_disabled_is_a_complete_no_op() {
        let (mut worker, rx) = make_worker(MemoryFlagStore::with_value(false));
        worker.init();
        drain(&rx);

        worker.dispatch(WorkerEvent::Message(WorkerMessage::command(
            MessageKey::StopLogging,
        )));
        assert_eq!(worker.status(), LoggingStatus::Disabled);
        assert_eq!(worker.flags().write_count(), 0);
        assert!(drain(&rx).is_empty());
    }

    #[test]
    fn test_start_while_running_is_a_complete_no_op() {
        let (mut worker, rx) = make_worker(MemoryFlagStore::with_value(true));
        worker.init();
        drain(&rx);
        let writes = worker.flags().write_count();

        worker.dispatch(WorkerEvent::Message(WorkerMessage::command(
            MessageKey::StartLogging,
        )));
        assert_eq!(worker.status(), LoggingStatus::Running);
        assert_eq!(worker.flags().write_count(), writes);
        assert!(drain(&rx).is_empty());
    }

    #[test]
    fn test_toggle_flips_state_and_persists() {
        let (mut worker, rx) = make_worker(MemoryFlagStore::with_value(true));
        worker.init();
        drain(&rx);

        worker.dispatch(WorkerEvent::Message(WorkerMessage::command(
            MessageKey::ToggleLogging,
        )));
        assert_eq!(worker.status(), LoggingStatus::Disabled);
        assert_eq!(worker.flags().read().unwrap(), Some(false));
        assert_eq!(
            drain(&rx),
            vec![WorkerMessage::status(LoggingStatus::Disabled)]
        );

        worker.dispatch(WorkerEvent::Message(WorkerMessage::command(
            MessageKey::ToggleLogging,
        )));
        assert_eq!(worker.status(), LoggingStatus::Running);
        assert_eq!(worker.flags().read().unwrap(), Some(true));
    }

    #[test]
    fn test_status_request_gets_a_reply() {
        let (mut worker, rx) = make_worker(MemoryFlagStore::with_value(false));
        worker.init();

        worker.dispatch(WorkerEvent::Message(WorkerMessage::command(
            MessageKey::Status,
        )));
        assert_eq!(
            drain(&rx),
            vec![WorkerMessage::status(LoggingStatus::Disabled)]
        );
    }

    #[test]
    fn test_unrecognized_key_is_silently_ignored() {
        let (mut worker, rx) = make_worker(MemoryFlagStore::with_value(false));
        worker.init();

        worker.dispatch(WorkerEvent::Message(WorkerMessage {
            key: 999,
            data: [1, 2, 3],
        }));
        assert_eq!(worker.status(), LoggingStatus::Disabled);
        assert!(drain(&rx).is_empty());
    }

    #[test]
    fn test_sensor_events_are_dropped_while_disabled() {
        let (mut worker, _rx) = make_worker(MemoryFlagStore::with_value(false));
        worker.init();

        worker.dispatch(WorkerEvent::Battery(BatterySnapshot {
            percent: 10,
            charging: false,
            plugged: false,
        }));
        worker.dispatch(WorkerEvent::Health(HealthEvent::HeartRateUpdate));
        assert_eq!(worker.sink().record_count(BATTERY_LEVEL_LOG), 0);
        assert_eq!(worker.sink().record_count(HEART_RATE_LOG), 0);
    }

    #[test]
    fn test_device_state_request_mirrors_exact_snapshot() {
        let (mut worker, rx) = make_worker(MemoryFlagStore::with_value(true));
        worker.gateway.raw_bpm = 62;
        worker.gateway.filtered_bpm = 58;
        worker.gateway.battery = BatterySnapshot {
            percent: 90,
            charging: true,
            plugged: false,
        };
        worker.init();

        worker.dispatch(WorkerEvent::AccelBatch(vec![AccelSample {
            timestamp: 2000,
            x: -100,
            y: 0,
            z: 250,
            did_vibrate: false,
        }]));
        worker.dispatch(WorkerEvent::Health(HealthEvent::HeartRateUpdate));
        drain(&rx);

        worker.dispatch(WorkerEvent::Message(WorkerMessage::command(
            MessageKey::DeviceState,
        )));
        let replies = drain(&rx);
        assert_eq!(replies.len(), 3);

        let mut mirror = StateMirror::new();
        for reply in &replies {
            assert!(mirror.apply(reply).is_some());
        }
        assert_eq!(mirror.device_state.x, -100);
        assert_eq!(mirror.device_state.y, 0);
        assert_eq!(mirror.device_state.z, 250);
        assert_eq!(mirror.device_state.heart_rate, 62);
        assert_eq!(mirror.device_state.heart_rate_filtered, 58);
        assert_eq!(mirror.device_state.battery_level, 90);
        assert!(mirror.device_state.battery_charging);
        assert!(!mirror.device_state.battery_plugged);
    }

    #[test]
    fn test_run_loop_drains_queue_and_shuts_down() {
        let (worker, rx) = make_worker(MemoryFlagStore::new());
        let (event_tx, event_rx) = mpsc::channel();

        let background = std::thread::spawn(move || {
            let mut worker = worker;
            worker.run(event_rx);
            worker
        });

        event_tx
            .send(WorkerEvent::AccelBatch(vec![AccelSample {
                timestamp: 1,
                x: 1,
                y: 2,
                z: 3,
                did_vibrate: false,
            }]))
            .unwrap();
        event_tx
            .send(WorkerEvent::Message(WorkerMessage::command(
                MessageKey::StopLogging,
            )))
            .unwrap();
        drop(event_tx);

        let worker = background.join().unwrap();
        assert_eq!(worker.status(), LoggingStatus::Disabled);
        assert_eq!(worker.sink().record_count(ACCELERATION_LOG), 1);
        assert_eq!(worker.flags().read().unwrap(), Some(false));
        // init pushed Running, the stop pushed Disabled
        let pushed = drain(&rx);
        assert_eq!(
            pushed,
            vec![
                WorkerMessage::status(LoggingStatus::Running),
                WorkerMessage::status(LoggingStatus::Disabled),
            ]
        );
    }
}
