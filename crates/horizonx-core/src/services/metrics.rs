// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Control-plane side of the telemetry pipeline.
//!
//! Ingest fans one sample into four places: the per-server "latest" map
//! (plus its length-1 stream), the capped CPU and net-speed streams with
//! their in-memory rings, and the batch buffer feeding the bulk inserter.
//! A background flusher writes batches at 10 samples or every 15 s
//! (whichever first, gated by a try-lock); a broadcaster re-publishes each
//! server's latest sample every 10 s.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Notify;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::bus::{Bus, topics};
use crate::domain::{CpuUsageSample, Event, Metrics, NetworkSpeedSample};
use crate::error::{CoreError, Result};
use crate::persistence::MetricsRepository;
use crate::registry::StreamRegistry;

/// Bulk-insert batch size.
const BATCH_SIZE: usize = 10;

/// Interval of the background flusher tick.
const FLUSH_INTERVAL: Duration = Duration::from_secs(15);

/// Interval of the latest-sample broadcaster.
const BROADCAST_INTERVAL: Duration = Duration::from_secs(10);

/// In-memory history window for the CPU / net rings.
const HISTORY_RETENTION: Duration = Duration::from_secs(15 * 60);

/// Cap of the per-server CPU and net-speed streams.
const STREAM_CAP: usize = 900;

fn latest_key(server_id: Uuid) -> String {
    format!("metrics:server:{}:latest", server_id)
}

fn cpu_key(server_id: Uuid) -> String {
    format!("metrics:server:{}:cpu_usage", server_id)
}

fn net_key(server_id: Uuid) -> String {
    format!("metrics:server:{}:net_speed", server_id)
}

pub struct MetricsService {
    repo: Arc<dyn MetricsRepository>,
    registry: Arc<dyn StreamRegistry>,
    bus: Arc<Bus>,

    buffer: Mutex<Vec<Metrics>>,
    latest: Mutex<HashMap<Uuid, Metrics>>,
    cpu_history: Mutex<HashMap<Uuid, Vec<CpuUsageSample>>>,
    net_history: Mutex<HashMap<Uuid, Vec<NetworkSpeedSample>>>,

    flush_gate: tokio::sync::Mutex<()>,
    shutdown: Arc<Notify>,
}

impl MetricsService {
    pub fn new(
        repo: Arc<dyn MetricsRepository>,
        registry: Arc<dyn StreamRegistry>,
        bus: Arc<Bus>,
    ) -> Self {
        Self {
            repo,
            registry,
            bus,
            buffer: Mutex::new(Vec::with_capacity(BATCH_SIZE)),
            latest: Mutex::new(HashMap::new()),
            cpu_history: Mutex::new(HashMap::new()),
            net_history: Mutex::new(HashMap::new()),
            flush_gate: tokio::sync::Mutex::new(()),
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Handle used to stop the background tasks.
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    /// Spawn the background flusher and broadcaster.
    pub fn start(self: &Arc<Self>) {
        let flusher = self.clone();
        tokio::spawn(async move {
            info!(interval_secs = FLUSH_INTERVAL.as_secs(), "metrics flusher started");
            loop {
                tokio::select! {
                    biased;

                    _ = flusher.shutdown.notified() => {
                        // Drain whatever is buffered before stopping.
                        flusher.try_flush().await;
                        info!("metrics flusher stopped");
                        break;
                    }

                    _ = tokio::time::sleep(FLUSH_INTERVAL) => {
                        flusher.try_flush().await;
                    }
                }
            }
        });

        let broadcaster = self.clone();
        tokio::spawn(async move {
            info!(
                interval_secs = BROADCAST_INTERVAL.as_secs(),
                "metrics broadcaster started"
            );
            loop {
                tokio::select! {
                    biased;

                    _ = broadcaster.shutdown.notified() => {
                        info!("metrics broadcaster stopped");
                        break;
                    }

                    _ = tokio::time::sleep(BROADCAST_INTERVAL) => {
                        broadcaster.broadcast_latest();
                    }
                }
            }
        });
    }

    /// Ingest one sample from an agent.
    pub async fn ingest(&self, sample: Metrics) -> Result<()> {
        let server_id = sample.server_id;
        let at = sample.recorded_at;

        self.record_latest(&sample).await;
        self.record_cpu(server_id, sample.cpu.usage.ema, at).await;
        self.record_net(
            server_id,
            sample.network.rx_speed_mbs.ema,
            sample.network.tx_speed_mbs.ema,
            at,
        )
        .await;

        let buffered = {
            let mut buffer = self.buffer.lock().expect("buffer lock poisoned");
            buffer.push(sample);
            buffer.len()
        };
        debug!(buffer_size = buffered, "metrics buffered");

        if buffered >= BATCH_SIZE {
            self.try_flush().await;
        }

        Ok(())
    }

    /// Latest sample for a server: in-memory map first, then the length-1
    /// stream.
    pub async fn latest(&self, server_id: Uuid) -> Result<Metrics> {
        if let Some(sample) = self
            .latest
            .lock()
            .expect("latest lock poisoned")
            .get(&server_id)
        {
            return Ok(sample.clone());
        }

        if let Ok(Some(entry)) = self.registry.latest(&latest_key(server_id)).await {
            if let Ok(sample) = entry.decode::<Metrics>() {
                return Ok(sample);
            }
        }

        Err(CoreError::NotFound { entity: "metrics" })
    }

    /// Ordered (oldest first) CPU usage history for a server.
    pub async fn cpu_usage_history(&self, server_id: Uuid) -> Result<Vec<CpuUsageSample>> {
        if let Some(samples) = self
            .cpu_history
            .lock()
            .expect("cpu ring lock poisoned")
            .get(&server_id)
        {
            if !samples.is_empty() {
                return Ok(samples.clone());
            }
        }

        let entries = self
            .registry
            .range_desc(&cpu_key(server_id), STREAM_CAP)
            .await
            .map_err(|e| CoreError::Database {
                operation: "registry_range",
                details: e.to_string(),
            })?;

        let mut samples: Vec<CpuUsageSample> = entries
            .iter()
            .filter_map(|e| e.decode().ok())
            .collect();
        samples.reverse();

        if samples.is_empty() {
            return Err(CoreError::NotFound { entity: "metrics" });
        }

        self.cpu_history
            .lock()
            .expect("cpu ring lock poisoned")
            .insert(server_id, samples.clone());
        Ok(samples)
    }

    /// Ordered (oldest first) network speed history for a server.
    pub async fn net_speed_history(&self, server_id: Uuid) -> Result<Vec<NetworkSpeedSample>> {
        if let Some(samples) = self
            .net_history
            .lock()
            .expect("net ring lock poisoned")
            .get(&server_id)
        {
            if !samples.is_empty() {
                return Ok(samples.clone());
            }
        }

        let entries = self
            .registry
            .range_desc(&net_key(server_id), STREAM_CAP)
            .await
            .map_err(|e| CoreError::Database {
                operation: "registry_range",
                details: e.to_string(),
            })?;

        let mut samples: Vec<NetworkSpeedSample> = entries
            .iter()
            .filter_map(|e| e.decode().ok())
            .collect();
        samples.reverse();

        if samples.is_empty() {
            return Err(CoreError::NotFound { entity: "metrics" });
        }

        self.net_history
            .lock()
            .expect("net ring lock poisoned")
            .insert(server_id, samples.clone());
        Ok(samples)
    }

    /// Delete persisted samples older than `cutoff`.
    pub async fn cleanup(&self, server_id: Uuid, cutoff: DateTime<Utc>) -> Result<u64> {
        self.repo.cleanup(server_id, cutoff).await
    }

    async fn record_latest(&self, sample: &Metrics) {
        self.latest
            .lock()
            .expect("latest lock poisoned")
            .insert(sample.server_id, sample.clone());

        if let Ok(payload) = serde_json::to_value(sample) {
            if let Err(e) = self
                .registry
                .append(&latest_key(sample.server_id), payload, 1)
                .await
            {
                error!(server_id = %sample.server_id, error = %e, "failed to append latest sample");
            }
        }
    }

    async fn record_cpu(&self, server_id: Uuid, usage_ema: f64, at: DateTime<Utc>) {
        let sample = CpuUsageSample {
            usage_percent: usage_ema,
            at,
        };

        {
            let mut rings = self.cpu_history.lock().expect("cpu ring lock poisoned");
            let points = rings.entry(server_id).or_default();
            points.push(sample);
            let cutoff = at - chrono::Duration::from_std(HISTORY_RETENTION).unwrap_or_default();
            points.retain(|p| p.at > cutoff);
        }

        if let Ok(payload) = serde_json::to_value(sample) {
            if let Err(e) = self
                .registry
                .append(&cpu_key(server_id), payload, STREAM_CAP)
                .await
            {
                error!(server_id = %server_id, error = %e, "failed to append CPU sample");
            }
        }
    }

    async fn record_net(&self, server_id: Uuid, rx_mbs: f64, tx_mbs: f64, at: DateTime<Utc>) {
        let sample = NetworkSpeedSample { rx_mbs, tx_mbs, at };

        {
            let mut rings = self.net_history.lock().expect("net ring lock poisoned");
            let points = rings.entry(server_id).or_default();
            points.push(sample);
            let cutoff = at - chrono::Duration::from_std(HISTORY_RETENTION).unwrap_or_default();
            points.retain(|p| p.at > cutoff);
        }

        if let Ok(payload) = serde_json::to_value(sample) {
            if let Err(e) = self
                .registry
                .append(&net_key(server_id), payload, STREAM_CAP)
                .await
            {
                error!(server_id = %server_id, error = %e, "failed to append net sample");
            }
        }
    }

    /// Flush the buffer unless another flush is already running.
    async fn try_flush(&self) {
        let Ok(_gate) = self.flush_gate.try_lock() else {
            return;
        };

        let batch = {
            let mut buffer = self.buffer.lock().expect("buffer lock poisoned");
            if buffer.is_empty() {
                return;
            }
            std::mem::replace(&mut *buffer, Vec::with_capacity(BATCH_SIZE))
        };

        debug!(count = batch.len(), "flushing metrics batch");
        if let Err(e) = self.repo.bulk_insert(&batch).await {
            error!(count = batch.len(), error = %e, "failed to bulk insert metrics");
        }
    }

    fn broadcast_latest(&self) {
        let samples: Vec<Metrics> = self
            .latest
            .lock()
            .expect("latest lock poisoned")
            .values()
            .cloned()
            .collect();

        if samples.is_empty() {
            return;
        }

        for sample in samples {
            self.bus.publish(
                topics::SERVER_METRICS_RECEIVED,
                &Event::ServerMetricsReceived(sample),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MemoryStreamRegistry;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingRepo {
        calls: AtomicUsize,
        rows: AtomicUsize,
    }

    #[async_trait]
    impl MetricsRepository for CountingRepo {
        async fn bulk_insert(&self, samples: &[Metrics]) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.rows.fetch_add(samples.len(), Ordering::SeqCst);
            Ok(())
        }

        async fn cleanup(&self, _server_id: Uuid, _cutoff: DateTime<Utc>) -> Result<u64> {
            Ok(0)
        }
    }

    fn sample(server_id: Uuid, cpu_ema: f64) -> Metrics {
        let mut m = Metrics::default();
        m.server_id = server_id;
        m.cpu.usage.ema = cpu_ema;
        m.recorded_at = Utc::now();
        m
    }

    fn service() -> (Arc<MetricsService>, Arc<CountingRepo>) {
        let repo = Arc::new(CountingRepo::default());
        let svc = Arc::new(MetricsService::new(
            repo.clone(),
            Arc::new(MemoryStreamRegistry::new()),
            Arc::new(Bus::new()),
        ));
        (svc, repo)
    }

    #[tokio::test]
    async fn test_latest_tracks_last_ingested_sample() {
        let (svc, _repo) = service();
        let server_id = Uuid::new_v4();

        for i in 0..25 {
            svc.ingest(sample(server_id, i as f64)).await.unwrap();
        }

        let latest = svc.latest(server_id).await.unwrap();
        assert_eq!(latest.cpu.usage.ema, 24.0);
    }

    #[tokio::test]
    async fn test_burst_flushes_in_batches() {
        let (svc, repo) = service();
        let server_id = Uuid::new_v4();

        for i in 0..25 {
            svc.ingest(sample(server_id, i as f64)).await.unwrap();
        }

        // 25 ingests: two full batches flushed, five samples still buffered.
        assert_eq!(repo.calls.load(Ordering::SeqCst), 2);
        assert_eq!(repo.rows.load(Ordering::SeqCst), 20);

        // The ticker (simulated here) drains the remainder.
        svc.try_flush().await;
        assert_eq!(repo.calls.load(Ordering::SeqCst), 3);
        assert_eq!(repo.rows.load(Ordering::SeqCst), 25);
    }

    #[tokio::test]
    async fn test_cpu_history_in_order() {
        let (svc, _repo) = service();
        let server_id = Uuid::new_v4();

        for i in 0..5 {
            svc.ingest(sample(server_id, i as f64)).await.unwrap();
        }

        let history = svc.cpu_usage_history(server_id).await.unwrap();
        assert_eq!(history.len(), 5);
        let usages: Vec<f64> = history.iter().map(|s| s.usage_percent).collect();
        assert_eq!(usages, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    }

    #[tokio::test]
    async fn test_cpu_history_repopulates_from_stream() {
        let (svc, _repo) = service();
        let server_id = Uuid::new_v4();

        for i in 0..3 {
            svc.ingest(sample(server_id, i as f64)).await.unwrap();
        }

        // Simulate a restart losing the ring but keeping the stream.
        svc.cpu_history.lock().unwrap().clear();

        let history = svc.cpu_usage_history(server_id).await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].usage_percent, 0.0);
        assert_eq!(history[2].usage_percent, 2.0);
    }

    #[tokio::test]
    async fn test_missing_server_metrics_is_not_found() {
        let (svc, _repo) = service();
        let err = svc.latest(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
    }
}
