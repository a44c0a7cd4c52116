// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Raw system counters behind the `SystemReader` seam.
//!
//! The collector consumes this trait; the pipeline (deltas, EMA, clamps)
//! never touches `/proc` directly, so tests drive it with a scripted
//! reader. `LinuxReader` is a thin best-effort implementation: every
//! accessor degrades to zero/empty on unreadable sources rather than
//! failing the sample.

use std::fs;
use std::path::Path;

use horizonx_core::domain::OsInfo;

/// Aggregate CPU jiffies from one `/proc/stat` line.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CpuTimes {
    pub busy: u64,
    pub total: u64,
}

/// One CPU observation.
#[derive(Debug, Clone, Default)]
pub struct CpuSnapshot {
    pub aggregate: CpuTimes,
    pub per_core: Vec<CpuTimes>,
    pub temperature_c: f64,
    pub frequency_mhz: f64,
    /// Cumulative package energy, if a RAPL counter is exposed.
    pub energy_uj: Option<u64>,
}

/// Memory counters in KiB.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryStats {
    pub total_kb: u64,
    pub available_kb: u64,
    pub swap_total_kb: u64,
    pub swap_free_kb: u64,
}

/// Usage of one mounted filesystem in bytes.
#[derive(Debug, Clone, Default)]
pub struct FilesystemStats {
    pub device: String,
    pub mountpoint: String,
    pub total_bytes: u64,
    pub free_bytes: u64,
}

/// One block device with its cumulative I/O counters.
#[derive(Debug, Clone, Default)]
pub struct DiskStats {
    pub name: String,
    pub size_bytes: u64,
    pub read_bytes: u64,
    pub write_bytes: u64,
    pub io_time_ms: u64,
    pub temperature_c: f64,
    pub filesystems: Vec<FilesystemStats>,
}

/// Cumulative byte counters of the default interface.
#[derive(Debug, Clone, Default)]
pub struct NetStats {
    pub interface: String,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

/// One GPU observation, already in display units.
#[derive(Debug, Clone, Default)]
pub struct GpuStats {
    pub name: String,
    pub vendor: String,
    pub usage_percent: f64,
    pub clock_mhz: f64,
    pub power_watt: f64,
    pub temperature_c: f64,
    pub vram_used_bytes: u64,
    pub vram_total_bytes: u64,
}

/// Raw counter source for the sampler.
pub trait SystemReader: Send + Sync {
    fn os_info(&self) -> OsInfo;
    fn uptime_seconds(&self) -> u64;
    fn cpu(&self) -> CpuSnapshot;
    fn memory(&self) -> MemoryStats;
    fn disks(&self) -> Vec<DiskStats>;
    fn network(&self) -> Option<NetStats>;
    fn gpus(&self) -> Vec<GpuStats>;
}

/// `/proc` + `/sys` backed reader.
#[derive(Default)]
pub struct LinuxReader;

impl LinuxReader {
    pub fn new() -> Self {
        Self
    }

    fn read_string(path: &str) -> Option<String> {
        fs::read_to_string(path).ok()
    }

    fn read_u64(path: &str) -> Option<u64> {
        Self::read_string(path)?.trim().parse().ok()
    }

    fn parse_cpu_line(line: &str) -> Option<CpuTimes> {
        let fields: Vec<u64> = line
            .split_whitespace()
            .skip(1)
            .filter_map(|f| f.parse().ok())
            .collect();
        if fields.len() < 5 {
            return None;
        }
        let total: u64 = fields.iter().sum();
        let idle = fields[3] + fields.get(4).copied().unwrap_or(0);
        Some(CpuTimes {
            busy: total.saturating_sub(idle),
            total,
        })
    }

    fn default_interface() -> Option<String> {
        // The default route's interface: destination 00000000 in the
        // kernel route table.
        let routes = Self::read_string("/proc/net/route")?;
        routes.lines().skip(1).find_map(|line| {
            let mut fields = line.split_whitespace();
            let iface = fields.next()?;
            let destination = fields.next()?;
            (destination == "00000000").then(|| iface.to_string())
        })
    }
}

impl SystemReader for LinuxReader {
    fn os_info(&self) -> OsInfo {
        let hostname = Self::read_string("/proc/sys/kernel/hostname")
            .map(|s| s.trim().to_string())
            .unwrap_or_default();
        let kernel_version = Self::read_string("/proc/sys/kernel/osrelease")
            .map(|s| s.trim().to_string())
            .unwrap_or_default();

        let name = Self::read_string("/etc/os-release")
            .and_then(|content| {
                content.lines().find_map(|line| {
                    line.strip_prefix("PRETTY_NAME=")
                        .map(|v| v.trim_matches('"').to_string())
                })
            })
            .unwrap_or_else(|| "linux".to_string());

        OsInfo {
            hostname,
            name,
            arch: std::env::consts::ARCH.to_string(),
            kernel_version,
        }
    }

    fn uptime_seconds(&self) -> u64 {
        Self::read_string("/proc/uptime")
            .and_then(|s| {
                s.split_whitespace()
                    .next()
                    .and_then(|v| v.parse::<f64>().ok())
            })
            .map(|secs| secs as u64)
            .unwrap_or(0)
    }

    fn cpu(&self) -> CpuSnapshot {
        let mut snapshot = CpuSnapshot::default();

        if let Some(stat) = Self::read_string("/proc/stat") {
            for line in stat.lines() {
                if line.starts_with("cpu ") {
                    if let Some(times) = Self::parse_cpu_line(line) {
                        snapshot.aggregate = times;
                    }
                } else if line.starts_with("cpu") {
                    if let Some(times) = Self::parse_cpu_line(line) {
                        snapshot.per_core.push(times);
                    }
                }
            }
        }

        snapshot.temperature_c = Self::read_u64("/sys/class/thermal/thermal_zone0/temp")
            .map(|millis| millis as f64 / 1000.0)
            .unwrap_or(0.0);
        snapshot.frequency_mhz =
            Self::read_u64("/sys/devices/system/cpu/cpu0/cpufreq/scaling_cur_freq")
                .map(|khz| khz as f64 / 1000.0)
                .unwrap_or(0.0);
        snapshot.energy_uj = Self::read_u64("/sys/class/powercap/intel-rapl:0/energy_uj");

        snapshot
    }

    fn memory(&self) -> MemoryStats {
        let mut stats = MemoryStats::default();
        let Some(meminfo) = Self::read_string("/proc/meminfo") else {
            return stats;
        };

        for line in meminfo.lines() {
            let mut fields = line.split_whitespace();
            let (Some(key), Some(value)) = (fields.next(), fields.next()) else {
                continue;
            };
            let Ok(value) = value.parse::<u64>() else {
                continue;
            };
            match key {
                "MemTotal:" => stats.total_kb = value,
                "MemAvailable:" => stats.available_kb = value,
                "SwapTotal:" => stats.swap_total_kb = value,
                "SwapFree:" => stats.swap_free_kb = value,
                _ => {}
            }
        }
        stats
    }

    fn disks(&self) -> Vec<DiskStats> {
        const SECTOR_BYTES: u64 = 512;

        let Some(diskstats) = Self::read_string("/proc/diskstats") else {
            return Vec::new();
        };

        let mut disks = Vec::new();
        for line in diskstats.lines() {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 13 {
                continue;
            }
            let name = fields[2];

            // Whole devices only, not partitions.
            let is_whole_device = (name.starts_with("sd") || name.starts_with("vd"))
                && !name.ends_with(|c: char| c.is_ascii_digit())
                || (name.starts_with("nvme") && !name.contains('p'));
            if !is_whole_device {
                continue;
            }

            let read_sectors: u64 = fields[5].parse().unwrap_or(0);
            let write_sectors: u64 = fields[9].parse().unwrap_or(0);
            let io_time_ms: u64 = fields[12].parse().unwrap_or(0);

            let size_bytes = Self::read_u64(&format!("/sys/block/{}/size", name))
                .map(|sectors| sectors * SECTOR_BYTES)
                .unwrap_or(0);

            disks.push(DiskStats {
                name: name.to_string(),
                size_bytes,
                read_bytes: read_sectors * SECTOR_BYTES,
                write_bytes: write_sectors * SECTOR_BYTES,
                io_time_ms,
                temperature_c: 0.0,
                filesystems: root_filesystem(),
            });
        }
        disks
    }

    fn network(&self) -> Option<NetStats> {
        let interface = Self::default_interface()?;
        let dev = Self::read_string("/proc/net/dev")?;

        for line in dev.lines() {
            let line = line.trim();
            let Some((name, rest)) = line.split_once(':') else {
                continue;
            };
            if name.trim() != interface {
                continue;
            }
            let fields: Vec<u64> = rest
                .split_whitespace()
                .filter_map(|f| f.parse().ok())
                .collect();
            if fields.len() < 9 {
                return None;
            }
            return Some(NetStats {
                interface,
                rx_bytes: fields[0],
                tx_bytes: fields[8],
            });
        }
        None
    }

    fn gpus(&self) -> Vec<GpuStats> {
        // GPU sampling needs vendor tooling; hosts without it report none.
        Vec::new()
    }
}

/// Usage of the root filesystem via statvfs.
fn root_filesystem() -> Vec<FilesystemStats> {
    let Ok(stat) = nix::sys::statvfs::statvfs(Path::new("/")) else {
        return Vec::new();
    };
    let block = stat.fragment_size() as u64;
    let total = stat.blocks() as u64 * block;
    let free = stat.blocks_available() as u64 * block;
    vec![FilesystemStats {
        device: "/".to_string(),
        mountpoint: "/".to_string(),
        total_bytes: total,
        free_bytes: free,
    }]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cpu_line() {
        let times =
            LinuxReader::parse_cpu_line("cpu  100 0 50 800 50 0 0 0 0 0").unwrap();
        assert_eq!(times.total, 1000);
        assert_eq!(times.busy, 150);
    }

    #[test]
    fn test_parse_cpu_line_too_short() {
        assert!(LinuxReader::parse_cpu_line("cpu 1 2").is_none());
    }
}
