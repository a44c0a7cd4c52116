// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Telemetry sample types.
//!
//! Every smoothed numeric travels as a [`Signal`] carrying both the raw
//! reading and its exponential moving average, so the control plane never
//! needs to know the smoothing parameters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A raw reading paired with its smoothed value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub raw: f64,
    pub ema: f64,
}

/// CPU block of a sample.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CpuMetric {
    pub usage: Signal,
    #[serde(default)]
    pub per_core: Vec<Signal>,
    pub temperature: Signal,
    pub frequency: Signal,
    pub power_watt: Signal,
}

/// One GPU device block of a sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpuMetric {
    pub name: String,
    pub vendor: String,
    pub usage: Signal,
    pub clock_mhz: Signal,
    pub power_watt: Signal,
    pub temperature: Signal,
    pub vram_used_gb: f64,
    pub vram_total_gb: f64,
}

/// Memory block of a sample.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryMetric {
    pub total_gb: f64,
    pub available_gb: f64,
    pub used_gb: f64,
    pub usage_percent: f64,
    pub swap_total_gb: f64,
    pub swap_free_gb: f64,
    pub swap_used_gb: f64,
}

/// Usage of one mounted filesystem.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilesystemUsage {
    pub device: String,
    pub mountpoint: String,
    pub total_gb: f64,
    pub used_gb: f64,
    pub free_gb: f64,
    pub percent: f64,
}

/// One disk device block of a sample. Read/write rates and utilization are
/// deltas converted with elapsed wall time by the sampler.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiskMetric {
    pub name: String,
    pub raw_size_gb: f64,
    pub read_mbps: Signal,
    pub write_mbps: Signal,
    pub util_pct: Signal,
    pub temperature: Signal,
    #[serde(default)]
    pub filesystems: Vec<FilesystemUsage>,
}

/// Network block of a sample.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkMetric {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub rx_speed_mbs: Signal,
    pub tx_speed_mbs: Signal,
}

/// One full telemetry sample, keyed by server id and recorded-at.
///
/// `recorded_at` is agent-supplied UTC and authoritative.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metrics {
    #[serde(default)]
    pub server_id: Uuid,
    pub cpu: CpuMetric,
    #[serde(default)]
    pub gpu: Vec<GpuMetric>,
    pub memory: MemoryMetric,
    #[serde(default)]
    pub disk: Vec<DiskMetric>,
    pub network: NetworkMetric,
    pub uptime_seconds: u64,
    #[serde(default = "Utc::now")]
    pub recorded_at: DateTime<Utc>,
}

/// One point of the capped CPU usage history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CpuUsageSample {
    pub usage_percent: f64,
    pub at: DateTime<Utc>,
}

/// One point of the capped network speed history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NetworkSpeedSample {
    pub rx_mbs: f64,
    pub tx_mbs: f64,
    pub at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_round_trip() {
        let mut sample = Metrics::default();
        sample.server_id = Uuid::new_v4();
        sample.cpu.usage = Signal { raw: 42.0, ema: 40.5 };
        sample.network.rx_speed_mbs = Signal { raw: 1.5, ema: 1.2 };

        let json = serde_json::to_string(&sample).unwrap();
        let back: Metrics = serde_json::from_str(&json).unwrap();
        assert_eq!(back.server_id, sample.server_id);
        assert_eq!(back.cpu.usage, sample.cpu.usage);
        assert_eq!(back.network.rx_speed_mbs, sample.network.rx_speed_mbs);
    }

    #[test]
    fn test_signal_carries_both_values() {
        let value = serde_json::to_value(Signal { raw: 10.0, ema: 8.0 }).unwrap();
        assert_eq!(value["raw"], 10.0);
        assert_eq!(value["ema"], 8.0);
    }
}
