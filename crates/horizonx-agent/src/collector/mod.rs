// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Agent-side telemetry pipeline.
//!
//! Every 5 s the collector samples raw counters through [`SystemReader`],
//! converts delta series (disk I/O, network bytes, CPU energy) with elapsed
//! wall time, smooths every numeric with a per-series half-life EMA, and
//! publishes the sample three ways: the in-memory buffer (≤ 10, serves
//! `metrics_collect` jobs), the local capped stream (buffer of last resort,
//! flushed on shutdown), and the WebSocket write pump.
//!
//! Counter resets clamp to zero; package power readings above 300 W are
//! treated as sensor glitches and clamped to zero as well.

pub mod ema;
pub mod reader;

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::{Notify, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use horizonx_core::domain::{
    CpuMetric, DiskMetric, FilesystemUsage, GpuMetric, MemoryMetric, Metrics, NetworkMetric,
    Signal,
};
use horizonx_core::registry::StreamRegistry;

use ema::Ema;
use reader::{CpuTimes, SystemReader};

/// Sampling cadence.
pub const SAMPLE_INTERVAL: Duration = Duration::from_secs(5);

/// In-memory buffer size.
const BUFFER_CAP: usize = 10;

/// Cap of the agent's local stream.
const STREAM_CAP: usize = 5000;

/// Package power above this is a sensor glitch.
const MAX_PLAUSIBLE_WATTS: f64 = 300.0;

const MB: f64 = 1024.0 * 1024.0;
const KB_TO_GB: f64 = 1024.0 * 1024.0;
const BYTES_TO_GB: f64 = 1024.0 * 1024.0 * 1024.0;

fn stream_key(server_id: Uuid) -> String {
    format!("metrics:agent:{}:stream", server_id)
}

#[derive(Default)]
struct DiskIoState {
    read_bytes: u64,
    write_bytes: u64,
    io_time_ms: u64,
}

struct DiskEmas {
    read: Ema,
    write: Ema,
    util: Ema,
    temperature: Ema,
}

struct GpuEmas {
    usage: Ema,
    clock: Ema,
    power: Ema,
    temperature: Ema,
}

struct SamplerState {
    last_tick: Option<Instant>,

    prev_cpu: Option<CpuTimes>,
    prev_cores: Vec<CpuTimes>,
    prev_energy_uj: Option<u64>,
    prev_disk: HashMap<String, DiskIoState>,
    prev_net: Option<(u64, u64)>,

    cpu_usage_ema: Ema,
    cpu_freq_ema: Ema,
    cpu_power_ema: Ema,
    cpu_temp_ema: Ema,
    per_core_ema: Vec<Ema>,

    disk_emas: HashMap<String, DiskEmas>,
    gpu_emas: HashMap<String, GpuEmas>,

    net_rx_ema: Ema,
    net_tx_ema: Ema,
}

impl SamplerState {
    fn new() -> Self {
        Self {
            last_tick: None,
            prev_cpu: None,
            prev_cores: Vec::new(),
            prev_energy_uj: None,
            prev_disk: HashMap::new(),
            prev_net: None,
            cpu_usage_ema: Ema::new(Duration::from_secs(15)),
            cpu_freq_ema: Ema::new(Duration::from_secs(20)),
            cpu_power_ema: Ema::new(Duration::from_secs(20)),
            cpu_temp_ema: Ema::new(Duration::from_secs(30)),
            per_core_ema: Vec::new(),
            disk_emas: HashMap::new(),
            gpu_emas: HashMap::new(),
            net_rx_ema: Ema::new(Duration::from_secs(15)),
            net_tx_ema: Ema::new(Duration::from_secs(15)),
        }
    }
}

pub struct Collector {
    server_id: Uuid,
    reader: Arc<dyn SystemReader>,
    registry: Arc<dyn StreamRegistry>,
    outbound: mpsc::Sender<Metrics>,

    buffer: Mutex<VecDeque<Metrics>>,
    state: Mutex<SamplerState>,
    shutdown: Arc<Notify>,
}

impl Collector {
    pub fn new(
        server_id: Uuid,
        reader: Arc<dyn SystemReader>,
        registry: Arc<dyn StreamRegistry>,
        outbound: mpsc::Sender<Metrics>,
    ) -> Self {
        Self {
            server_id,
            reader,
            registry,
            outbound,
            buffer: Mutex::new(VecDeque::with_capacity(BUFFER_CAP)),
            state: Mutex::new(SamplerState::new()),
            shutdown: Arc::new(Notify::new()),
        }
    }

    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    /// Newest buffered sample; served to `metrics_collect` jobs.
    pub fn latest(&self) -> Option<Metrics> {
        self.buffer
            .lock()
            .expect("buffer lock poisoned")
            .back()
            .cloned()
    }

    /// Run the sampling loop until shutdown; flushes the buffer to the
    /// local stream before returning.
    pub async fn run(&self) {
        if let Err(e) = self.load_buffer_from_stream().await {
            error!(error = %e, "failed to load buffered metrics from stream");
        }

        info!(interval_secs = SAMPLE_INTERVAL.as_secs(), "metrics collector started");

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.notified() => {
                    self.flush_buffer_to_stream().await;
                    info!("metrics collector stopped");
                    return;
                }

                _ = tokio::time::sleep(SAMPLE_INTERVAL) => {
                    self.tick().await;
                }
            }
        }
    }

    async fn tick(&self) {
        let sample = {
            let mut state = self.state.lock().expect("sampler lock poisoned");
            let now = Instant::now();
            let dt = state
                .last_tick
                .map(|last| now.duration_since(last))
                .unwrap_or(SAMPLE_INTERVAL);
            state.last_tick = Some(now);
            self.sample(&mut state, dt)
        };

        {
            let mut buffer = self.buffer.lock().expect("buffer lock poisoned");
            if buffer.len() >= BUFFER_CAP {
                buffer.pop_front();
            }
            buffer.push_back(sample.clone());
        }

        match serde_json::to_value(&sample) {
            Ok(payload) => {
                if let Err(e) = self
                    .registry
                    .append(&stream_key(self.server_id), payload, STREAM_CAP)
                    .await
                {
                    error!(error = %e, "failed to append sample to local stream");
                }
            }
            Err(e) => error!(error = %e, "failed to serialize sample"),
        }

        if self.outbound.try_send(sample).is_err() {
            warn!("metrics channel full, sample dropped");
        }
    }

    /// Build one sample from raw counters; `dt` is the wall time since the
    /// previous sample.
    fn sample(&self, state: &mut SamplerState, dt: Duration) -> Metrics {
        let dt_secs = dt.as_secs_f64().max(0.001);

        let mut metrics = Metrics {
            server_id: self.server_id,
            recorded_at: Utc::now(),
            uptime_seconds: self.reader.uptime_seconds(),
            ..Default::default()
        };

        metrics.cpu = self.sample_cpu(state, dt, dt_secs);
        metrics.gpu = self.sample_gpus(state, dt);
        metrics.memory = sample_memory(self.reader.as_ref());
        metrics.disk = self.sample_disks(state, dt, dt_secs);
        metrics.network = self.sample_network(state, dt, dt_secs);

        metrics
    }

    fn sample_cpu(&self, state: &mut SamplerState, dt: Duration, dt_secs: f64) -> CpuMetric {
        let snapshot = self.reader.cpu();
        let mut cpu = CpuMetric::default();

        // Usage from jiffy deltas; the first sample has no baseline.
        let usage_raw = state
            .prev_cpu
            .map(|prev| usage_percent(prev, snapshot.aggregate))
            .unwrap_or(0.0);
        state.prev_cpu = Some(snapshot.aggregate);

        cpu.usage = Signal {
            raw: usage_raw,
            ema: state.cpu_usage_ema.update(usage_raw, dt),
        };

        while state.per_core_ema.len() < snapshot.per_core.len() {
            state.per_core_ema.push(Ema::new(Duration::from_secs(15)));
        }
        for (i, core) in snapshot.per_core.iter().enumerate() {
            let raw = state
                .prev_cores
                .get(i)
                .map(|prev| usage_percent(*prev, *core))
                .unwrap_or(0.0);
            cpu.per_core.push(Signal {
                raw,
                ema: state.per_core_ema[i].update(raw, dt),
            });
        }
        state.prev_cores = snapshot.per_core.clone();

        cpu.temperature = Signal {
            raw: snapshot.temperature_c,
            ema: state.cpu_temp_ema.update(snapshot.temperature_c, dt),
        };
        cpu.frequency = Signal {
            raw: snapshot.frequency_mhz,
            ema: state.cpu_freq_ema.update(snapshot.frequency_mhz, dt),
        };

        // Package power from the cumulative energy counter.
        let mut watts = 0.0;
        if let (Some(prev), Some(current)) = (state.prev_energy_uj, snapshot.energy_uj) {
            if current >= prev {
                watts = (current - prev) as f64 / dt_secs / 1_000_000.0;
            }
        }
        if !(0.0..=MAX_PLAUSIBLE_WATTS).contains(&watts) {
            watts = 0.0;
        }
        state.prev_energy_uj = snapshot.energy_uj;

        cpu.power_watt = Signal {
            raw: watts,
            ema: state.cpu_power_ema.update(watts, dt),
        };

        cpu
    }

    fn sample_gpus(&self, state: &mut SamplerState, dt: Duration) -> Vec<GpuMetric> {
        self.reader
            .gpus()
            .into_iter()
            .map(|gpu| {
                let emas = state.gpu_emas.entry(gpu.name.clone()).or_insert_with(|| GpuEmas {
                    usage: Ema::new(Duration::from_secs(15)),
                    clock: Ema::new(Duration::from_secs(20)),
                    power: Ema::new(Duration::from_secs(20)),
                    temperature: Ema::new(Duration::from_secs(30)),
                });

                let power = if (0.0..=MAX_PLAUSIBLE_WATTS).contains(&gpu.power_watt) {
                    gpu.power_watt
                } else {
                    0.0
                };

                GpuMetric {
                    name: gpu.name,
                    vendor: gpu.vendor,
                    usage: Signal {
                        raw: gpu.usage_percent,
                        ema: emas.usage.update(gpu.usage_percent, dt),
                    },
                    clock_mhz: Signal {
                        raw: gpu.clock_mhz,
                        ema: emas.clock.update(gpu.clock_mhz, dt),
                    },
                    power_watt: Signal {
                        raw: power,
                        ema: emas.power.update(power, dt),
                    },
                    temperature: Signal {
                        raw: gpu.temperature_c,
                        ema: emas.temperature.update(gpu.temperature_c, dt),
                    },
                    vram_used_gb: gpu.vram_used_bytes as f64 / BYTES_TO_GB,
                    vram_total_gb: gpu.vram_total_bytes as f64 / BYTES_TO_GB,
                }
            })
            .collect()
    }

    fn sample_disks(&self, state: &mut SamplerState, dt: Duration, dt_secs: f64) -> Vec<DiskMetric> {
        self.reader
            .disks()
            .into_iter()
            .map(|disk| {
                let prev = state.prev_disk.get(&disk.name);

                let (read_raw, write_raw, util_raw) = match prev {
                    Some(prev) => (
                        delta_rate(prev.read_bytes, disk.read_bytes, dt_secs) / MB,
                        delta_rate(prev.write_bytes, disk.write_bytes, dt_secs) / MB,
                        (delta_rate(prev.io_time_ms, disk.io_time_ms, dt_secs) / 1000.0 * 100.0)
                            .min(100.0),
                    ),
                    None => (0.0, 0.0, 0.0),
                };

                state.prev_disk.insert(
                    disk.name.clone(),
                    DiskIoState {
                        read_bytes: disk.read_bytes,
                        write_bytes: disk.write_bytes,
                        io_time_ms: disk.io_time_ms,
                    },
                );

                let emas = state.disk_emas.entry(disk.name.clone()).or_insert_with(|| DiskEmas {
                    read: Ema::new(Duration::from_secs(20)),
                    write: Ema::new(Duration::from_secs(20)),
                    util: Ema::new(Duration::from_secs(20)),
                    temperature: Ema::new(Duration::from_secs(30)),
                });

                let filesystems = disk
                    .filesystems
                    .iter()
                    .map(|fs| {
                        let total_gb = fs.total_bytes as f64 / BYTES_TO_GB;
                        let free_gb = fs.free_bytes as f64 / BYTES_TO_GB;
                        let used_gb = (total_gb - free_gb).max(0.0);
                        FilesystemUsage {
                            device: fs.device.clone(),
                            mountpoint: fs.mountpoint.clone(),
                            total_gb,
                            used_gb,
                            free_gb,
                            percent: if total_gb > 0.0 {
                                used_gb / total_gb * 100.0
                            } else {
                                0.0
                            },
                        }
                    })
                    .collect();

                DiskMetric {
                    name: disk.name,
                    raw_size_gb: disk.size_bytes as f64 / BYTES_TO_GB,
                    read_mbps: Signal {
                        raw: read_raw,
                        ema: emas.read.update(read_raw, dt),
                    },
                    write_mbps: Signal {
                        raw: write_raw,
                        ema: emas.write.update(write_raw, dt),
                    },
                    util_pct: Signal {
                        raw: util_raw,
                        ema: emas.util.update(util_raw, dt),
                    },
                    temperature: Signal {
                        raw: disk.temperature_c,
                        ema: emas.temperature.update(disk.temperature_c, dt),
                    },
                    filesystems,
                }
            })
            .collect()
    }

    fn sample_network(&self, state: &mut SamplerState, dt: Duration, dt_secs: f64) -> NetworkMetric {
        let Some(net) = self.reader.network() else {
            return NetworkMetric::default();
        };

        let (rx_raw, tx_raw) = match state.prev_net {
            Some((prev_rx, prev_tx)) => (
                delta_rate(prev_rx, net.rx_bytes, dt_secs) / MB,
                delta_rate(prev_tx, net.tx_bytes, dt_secs) / MB,
            ),
            None => (0.0, 0.0),
        };
        state.prev_net = Some((net.rx_bytes, net.tx_bytes));

        NetworkMetric {
            rx_bytes: net.rx_bytes,
            tx_bytes: net.tx_bytes,
            rx_speed_mbs: Signal {
                raw: rx_raw,
                ema: state.net_rx_ema.update(rx_raw, dt),
            },
            tx_speed_mbs: Signal {
                raw: tx_raw,
                ema: state.net_tx_ema.update(tx_raw, dt),
            },
        }
    }

    async fn load_buffer_from_stream(&self) -> Result<(), horizonx_core::registry::RegistryError> {
        let entries = self
            .registry
            .range_desc(&stream_key(self.server_id), BUFFER_CAP)
            .await?;
        if entries.is_empty() {
            return Ok(());
        }

        let mut buffer = self.buffer.lock().expect("buffer lock poisoned");
        for entry in entries.iter().rev() {
            if let Ok(sample) = entry.decode::<Metrics>() {
                buffer.push_back(sample);
            }
        }
        info!(count = buffer.len(), "loaded buffered metrics from stream");
        Ok(())
    }

    async fn flush_buffer_to_stream(&self) {
        let samples: Vec<Metrics> = {
            let mut buffer = self.buffer.lock().expect("buffer lock poisoned");
            buffer.drain(..).collect()
        };
        if samples.is_empty() {
            return;
        }

        debug!(count = samples.len(), "flushing buffered metrics to stream");
        for sample in samples {
            match serde_json::to_value(&sample) {
                Ok(payload) => {
                    if let Err(e) = self
                        .registry
                        .append(&stream_key(self.server_id), payload, STREAM_CAP)
                        .await
                    {
                        error!(error = %e, "failed to flush sample to stream");
                    }
                }
                Err(e) => error!(error = %e, "failed to serialize sample"),
            }
        }
    }
}

fn sample_memory(reader: &dyn SystemReader) -> MemoryMetric {
    let stats = reader.memory();

    let total_gb = stats.total_kb as f64 / KB_TO_GB;
    let available_gb = stats.available_kb as f64 / KB_TO_GB;
    let used_gb = (total_gb - available_gb).max(0.0);
    let swap_total_gb = stats.swap_total_kb as f64 / KB_TO_GB;
    let swap_free_gb = stats.swap_free_kb as f64 / KB_TO_GB;

    MemoryMetric {
        total_gb,
        available_gb,
        used_gb,
        usage_percent: if total_gb > 0.0 {
            used_gb / total_gb * 100.0
        } else {
            0.0
        },
        swap_total_gb,
        swap_free_gb,
        swap_used_gb: (swap_total_gb - swap_free_gb).max(0.0),
    }
}

fn usage_percent(prev: CpuTimes, current: CpuTimes) -> f64 {
    let total = current.total.saturating_sub(prev.total);
    if total == 0 {
        return 0.0;
    }
    let busy = current.busy.saturating_sub(prev.busy);
    (busy as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
}

/// Per-second rate from a cumulative counter; resets clamp to zero.
fn delta_rate(prev: u64, current: u64, dt_secs: f64) -> f64 {
    if current < prev {
        return 0.0;
    }
    (current - prev) as f64 / dt_secs
}

#[cfg(test)]
mod tests {
    use super::*;
    use horizonx_core::registry::MemoryStreamRegistry;
    use reader::{CpuSnapshot, DiskStats, MemoryStats, NetStats};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use horizonx_core::domain::OsInfo;

    /// Reader replaying a script of counter snapshots.
    struct ScriptedReader {
        step: AtomicUsize,
        cpu: Vec<CpuSnapshot>,
        net: Vec<NetStats>,
        disks: Vec<Vec<DiskStats>>,
    }

    impl ScriptedReader {
        fn position(&self, len: usize) -> usize {
            let step = self.step.load(Ordering::SeqCst);
            step.min(len.saturating_sub(1))
        }

        fn advance(&self) {
            self.step.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl SystemReader for ScriptedReader {
        fn os_info(&self) -> OsInfo {
            OsInfo {
                hostname: "test".into(),
                name: "linux".into(),
                arch: "x86_64".into(),
                kernel_version: "6.0".into(),
            }
        }

        fn uptime_seconds(&self) -> u64 {
            1000
        }

        fn cpu(&self) -> CpuSnapshot {
            self.cpu[self.position(self.cpu.len())].clone()
        }

        fn memory(&self) -> MemoryStats {
            MemoryStats {
                total_kb: 16 * 1024 * 1024,
                available_kb: 8 * 1024 * 1024,
                swap_total_kb: 0,
                swap_free_kb: 0,
            }
        }

        fn disks(&self) -> Vec<DiskStats> {
            self.disks
                .get(self.position(self.disks.len()))
                .cloned()
                .unwrap_or_default()
        }

        fn network(&self) -> Option<NetStats> {
            self.net.get(self.position(self.net.len())).cloned()
        }

        fn gpus(&self) -> Vec<reader::GpuStats> {
            Vec::new()
        }
    }

    fn collector(reader: Arc<ScriptedReader>) -> Collector {
        let (tx, _rx) = mpsc::channel(16);
        Collector::new(
            Uuid::new_v4(),
            reader,
            Arc::new(MemoryStreamRegistry::new()),
            tx,
        )
    }

    fn cpu_snapshot(busy: u64, total: u64, energy_uj: Option<u64>) -> CpuSnapshot {
        CpuSnapshot {
            aggregate: CpuTimes { busy, total },
            per_core: Vec::new(),
            temperature_c: 50.0,
            frequency_mhz: 2400.0,
            energy_uj,
        }
    }

    #[test]
    fn test_cpu_usage_from_deltas() {
        let reader = Arc::new(ScriptedReader {
            step: AtomicUsize::new(0),
            cpu: vec![
                cpu_snapshot(100, 1000, None),
                cpu_snapshot(350, 2000, None),
            ],
            net: Vec::new(),
            disks: Vec::new(),
        });
        let collector = collector(reader.clone());
        let mut state = SamplerState::new();

        let first = collector.sample(&mut state, Duration::from_secs(5));
        assert_eq!(first.cpu.usage.raw, 0.0, "no baseline on first sample");

        reader.advance();
        let second = collector.sample(&mut state, Duration::from_secs(5));
        // 250 busy of 1000 total jiffies elapsed.
        assert!((second.cpu.usage.raw - 25.0).abs() < 1e-9);
        assert!(second.cpu.usage.ema > 0.0);
    }

    #[test]
    fn test_power_clamps_glitches_to_zero() {
        let reader = Arc::new(ScriptedReader {
            step: AtomicUsize::new(0),
            cpu: vec![
                cpu_snapshot(0, 1000, Some(1_000_000)),
                // 10 kJ in 5 s = 2000 W: implausible, must clamp.
                cpu_snapshot(0, 2000, Some(10_001_000_000)),
                // Counter reset: negative delta, must clamp.
                cpu_snapshot(0, 3000, Some(500_000)),
            ],
            net: Vec::new(),
            disks: Vec::new(),
        });
        let collector = collector(reader.clone());
        let mut state = SamplerState::new();

        collector.sample(&mut state, Duration::from_secs(5));

        reader.advance();
        let glitch = collector.sample(&mut state, Duration::from_secs(5));
        assert_eq!(glitch.cpu.power_watt.raw, 0.0);

        reader.advance();
        let reset = collector.sample(&mut state, Duration::from_secs(5));
        assert_eq!(reset.cpu.power_watt.raw, 0.0);
    }

    #[test]
    fn test_network_rates_and_reset_clamp() {
        let iface = |rx: u64, tx: u64| NetStats {
            interface: "eth0".into(),
            rx_bytes: rx,
            tx_bytes: tx,
        };
        let reader = Arc::new(ScriptedReader {
            step: AtomicUsize::new(0),
            cpu: vec![cpu_snapshot(0, 1000, None)],
            net: vec![
                iface(0, 0),
                iface(5 * 1024 * 1024, 1024 * 1024),
                // rx counter reset.
                iface(1024, 2 * 1024 * 1024),
            ],
            disks: Vec::new(),
        });
        let collector = collector(reader.clone());
        let mut state = SamplerState::new();

        collector.sample(&mut state, Duration::from_secs(5));

        reader.advance();
        let second = collector.sample(&mut state, Duration::from_secs(5));
        assert!((second.network.rx_speed_mbs.raw - 1.0).abs() < 1e-9);
        assert!((second.network.tx_speed_mbs.raw - 0.2).abs() < 1e-9);

        reader.advance();
        let reset = collector.sample(&mut state, Duration::from_secs(5));
        assert_eq!(reset.network.rx_speed_mbs.raw, 0.0, "reset clamps to zero");
        assert!(reset.network.tx_speed_mbs.raw > 0.0);
    }

    #[test]
    fn test_disk_rates_from_deltas() {
        let disk = |read: u64, write: u64, io_ms: u64| DiskStats {
            name: "sda".into(),
            size_bytes: 500 * 1024 * 1024 * 1024,
            read_bytes: read,
            write_bytes: write,
            io_time_ms: io_ms,
            temperature_c: 30.0,
            filesystems: Vec::new(),
        };
        let reader = Arc::new(ScriptedReader {
            step: AtomicUsize::new(0),
            cpu: vec![cpu_snapshot(0, 1000, None)],
            net: Vec::new(),
            disks: vec![
                vec![disk(0, 0, 0)],
                vec![disk(10 * 1024 * 1024, 20 * 1024 * 1024, 2500)],
            ],
        });
        let collector = collector(reader.clone());
        let mut state = SamplerState::new();

        collector.sample(&mut state, Duration::from_secs(5));

        reader.advance();
        let second = collector.sample(&mut state, Duration::from_secs(5));
        let disk = &second.disk[0];
        assert!((disk.read_mbps.raw - 2.0).abs() < 1e-9);
        assert!((disk.write_mbps.raw - 4.0).abs() < 1e-9);
        // 2500 ms of busy time over a 5000 ms window.
        assert!((disk.util_pct.raw - 50.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_buffer_caps_at_ten() {
        let reader = Arc::new(ScriptedReader {
            step: AtomicUsize::new(0),
            cpu: vec![cpu_snapshot(0, 1000, None)],
            net: Vec::new(),
            disks: Vec::new(),
        });
        let collector = collector(reader);

        for _ in 0..15 {
            collector.tick().await;
        }

        assert_eq!(collector.buffer.lock().unwrap().len(), BUFFER_CAP);
        assert!(collector.latest().is_some());
    }
}
