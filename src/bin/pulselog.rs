//! Pulselog CLI - host-side capture simulator
//!
//! Commands:
//! - simulate: Run a scripted capture session across two threads and report
//!   what was logged
//! - channels: Print the telemetry channel table

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc;
use std::thread;

use pulselog::channels::TelemetryChannel;
use pulselog::clock::{Clock, SystemClock};
use pulselog::persist::FileFlagStore;
use pulselog::protocol::{MessageKey, StateMirror, WorkerMessage};
use pulselog::sensors::{
    AccelSample, BatterySnapshot, HealthEvent, HeartRateMetric, SensorGateway,
};
use pulselog::sink::MemorySink;
use pulselog::types::DeviceState;
use pulselog::worker::{Worker, WorkerEvent};
use pulselog::PULSELOG_VERSION;

/// Pulselog - on-wrist telemetry capture core
#[derive(Parser)]
#[command(name = "pulselog")]
#[command(version = PULSELOG_VERSION)]
#[command(about = "Simulate an on-wrist telemetry capture session", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scripted capture session and report what was logged
    Simulate {
        /// Accelerometer callback cycles to deliver
        #[arg(long, default_value = "20")]
        cycles: u32,

        /// Toggle logging off at this cycle and back on two cycles later
        #[arg(long)]
        toggle_at: Option<u32>,

        /// Path of the persisted logging flag
        #[arg(long, default_value = "pulselog-flag.json")]
        state_file: PathBuf,

        /// Seed for the deterministic sample generator
        #[arg(long, default_value = "7")]
        seed: u64,

        /// Force JSON output even on a terminal
        #[arg(long)]
        json: bool,
    },

    /// Print the telemetry channel table
    Channels {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate {
            cycles,
            toggle_at,
            state_file,
            seed,
            json,
        } => cmd_simulate(cycles, toggle_at, state_file, seed, json),
        Commands::Channels { json } => cmd_channels(json),
    }
}

/// Small deterministic generator so sessions replay identically per seed
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0 >> 16
    }
}

/// Sensor stack double: answers peeks deterministically, tracks nothing else
struct SimulatedSensors {
    lcg: Lcg,
}

impl SimulatedSensors {
    fn new(seed: u64) -> Self {
        Self { lcg: Lcg(seed) }
    }
}

impl SensorGateway for SimulatedSensors {
    fn subscribe_accel(&mut self, _samples_per_batch: usize) {}
    fn unsubscribe_accel(&mut self) {}
    fn subscribe_battery(&mut self) {}
    fn unsubscribe_battery(&mut self) {}
    fn subscribe_health(&mut self) {}
    fn unsubscribe_health(&mut self) {}

    fn peek_battery(&mut self) -> BatterySnapshot {
        BatterySnapshot {
            percent: 60 + (self.lcg.next() % 40) as u8,
            charging: false,
            plugged: false,
        }
    }

    fn peek_heart_rate(&mut self, metric: HeartRateMetric) -> i32 {
        let raw = 58 + (self.lcg.next() % 30) as i32;
        match metric {
            HeartRateMetric::RawBpm => raw,
            HeartRateMetric::FilteredBpm => raw - 3,
        }
    }
}

#[derive(Serialize)]
struct ChannelReport {
    name: &'static str,
    id: u32,
    records: usize,
    bytes: usize,
}

#[derive(Serialize)]
struct SessionReport {
    version: &'static str,
    status: String,
    device_state: DeviceState,
    channels: Vec<ChannelReport>,
}

fn cmd_simulate(
    cycles: u32,
    toggle_at: Option<u32>,
    state_file: PathBuf,
    seed: u64,
    json: bool,
) -> ExitCode {
    let (reply_tx, reply_rx) = mpsc::channel::<WorkerMessage>();
    let (event_tx, event_rx) = mpsc::channel::<WorkerEvent>();

    let worker = Worker::new(
        MemorySink::new(),
        SimulatedSensors::new(seed),
        FileFlagStore::new(&state_file),
        SystemClock,
        reply_tx,
    );
    let background = thread::spawn(move || {
        let mut worker = worker;
        worker.run(event_rx);
        worker
    });

    let mut lcg = Lcg(seed ^ 0xA5A5_A5A5);
    let mut mirror = StateMirror::new();
    let clock = SystemClock;

    for cycle in 0..cycles {
        let samples: Vec<AccelSample> = (0..pulselog::channels::ACCELERATION_BATCH)
            .map(|_| {
                AccelSample {
                    timestamp: clock.now_ms(),
                    x: (lcg.next() % 4000) as i16 - 2000,
                    y: (lcg.next() % 4000) as i16 - 2000,
                    z: (lcg.next() % 4000) as i16 - 2000,
                    did_vibrate: lcg.next() % 12 == 0,
                }
            })
            .collect();
        let _ = event_tx.send(WorkerEvent::AccelBatch(samples));

        if cycle % 3 == 0 {
            let _ = event_tx.send(WorkerEvent::Health(HealthEvent::HeartRateUpdate));
        }
        if cycle % 5 == 0 {
            let _ = event_tx.send(WorkerEvent::Battery(BatterySnapshot {
                percent: (95u32.saturating_sub(cycle)) as u8,
                charging: false,
                plugged: false,
            }));
        }
        if toggle_at == Some(cycle) || toggle_at == Some(cycle.wrapping_sub(2)) {
            let _ = event_tx.send(WorkerEvent::Message(WorkerMessage::command(
                MessageKey::ToggleLogging,
            )));
        }
        if cycle % 4 == 0 {
            let _ = event_tx.send(WorkerEvent::Message(WorkerMessage::command(
                MessageKey::DeviceState,
            )));
        }
        for reply in reply_rx.try_iter() {
            mirror.apply(&reply);
        }
    }

    let _ = event_tx.send(WorkerEvent::Message(WorkerMessage::command(
        MessageKey::Status,
    )));
    let _ = event_tx.send(WorkerEvent::Message(WorkerMessage::command(
        MessageKey::DeviceState,
    )));
    drop(event_tx);

    let worker = match background.join() {
        Ok(worker) => worker,
        Err(_) => {
            eprintln!("background worker panicked");
            return ExitCode::FAILURE;
        }
    };
    for reply in reply_rx.try_iter() {
        mirror.apply(&reply);
    }

    let channels = TelemetryChannel::ALL
        .iter()
        .map(|&channel| {
            let records = worker.sink().record_count(channel.id());
            ChannelReport {
                name: channel.name(),
                id: channel.id(),
                records,
                bytes: records * channel.record_size(),
            }
        })
        .collect();
    let report = SessionReport {
        version: PULSELOG_VERSION,
        status: mirror.status.as_str().to_string(),
        device_state: mirror.device_state,
        channels,
    };

    if json || !atty::is(atty::Stream::Stdout) {
        match serde_json::to_string(&report) {
            Ok(out) => println!("{out}"),
            Err(err) => {
                eprintln!("failed to serialize report: {err}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        print_report(&report);
    }
    ExitCode::SUCCESS
}

fn print_report(report: &SessionReport) {
    println!("pulselog v{} capture session", report.version);
    println!("status: {}", report.status);
    let state = &report.device_state;
    println!(
        "device state: x={} y={} z={} hr={} hr_filtered={} battery={}% charging={} plugged={}",
        state.x,
        state.y,
        state.z,
        state.heart_rate,
        state.heart_rate_filtered,
        state.battery_level,
        state.battery_charging,
        state.battery_plugged,
    );
    println!("{:<22}{:>4}{:>10}{:>10}", "channel", "id", "records", "bytes");
    for channel in &report.channels {
        println!(
            "{:<22}{:>4}{:>10}{:>10}",
            channel.name, channel.id, channel.records, channel.bytes
        );
    }
}

fn cmd_channels(json: bool) -> ExitCode {
    if json {
        let table: Vec<_> = TelemetryChannel::ALL
            .iter()
            .map(|&channel| {
                serde_json::json!({
                    "name": channel.name(),
                    "id": channel.id(),
                    "record_size": channel.record_size(),
                })
            })
            .collect();
        match serde_json::to_string(&table) {
            Ok(out) => println!("{out}"),
            Err(err) => {
                eprintln!("failed to serialize channel table: {err}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        println!("{:<22}{:>4}{:>14}", "channel", "id", "record bytes");
        for channel in TelemetryChannel::ALL {
            println!(
                "{:<22}{:>4}{:>14}",
                channel.name(),
                channel.id(),
                channel.record_size()
            );
        }
    }
    ExitCode::SUCCESS
}
