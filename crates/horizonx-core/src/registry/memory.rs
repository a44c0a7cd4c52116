// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-memory stream registry backend.
//!
//! Per-key ring of entries behind one mutex, with a monotonic id counter
//! shared across keys. This backend serves the in-process capped windows and
//! tests; an external stream store plugs in behind the same trait.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{RegistryError, StreamEntry, StreamRegistry};

#[derive(Default)]
struct State {
    next_id: u64,
    streams: HashMap<String, VecDeque<StreamEntry>>,
}

/// Capped in-memory stream store.
#[derive(Default)]
pub struct MemoryStreamRegistry {
    state: Mutex<State>,
}

impl MemoryStreamRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StreamRegistry for MemoryStreamRegistry {
    async fn append(
        &self,
        key: &str,
        payload: serde_json::Value,
        max_len: usize,
    ) -> Result<u64, RegistryError> {
        let mut state = self.state.lock().expect("registry lock poisoned");
        state.next_id += 1;
        let id = state.next_id;

        let stream = state.streams.entry(key.to_string()).or_default();
        stream.push_back(StreamEntry { id, payload });
        while stream.len() > max_len {
            stream.pop_front();
        }

        Ok(id)
    }

    async fn range_asc(&self, key: &str, limit: usize) -> Result<Vec<StreamEntry>, RegistryError> {
        let state = self.state.lock().expect("registry lock poisoned");
        Ok(state
            .streams
            .get(key)
            .map(|s| s.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn range_desc(&self, key: &str, limit: usize) -> Result<Vec<StreamEntry>, RegistryError> {
        let state = self.state.lock().expect("registry lock poisoned");
        Ok(state
            .streams
            .get(key)
            .map(|s| s.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn latest(&self, key: &str) -> Result<Option<StreamEntry>, RegistryError> {
        let state = self.state.lock().expect("registry lock poisoned");
        Ok(state.streams.get(key).and_then(|s| s.back().cloned()))
    }

    async fn ack(&self, key: &str, ids: &[u64]) -> Result<(), RegistryError> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut state = self.state.lock().expect("registry lock poisoned");
        if let Some(stream) = state.streams.get_mut(key) {
            stream.retain(|entry| !ids.contains(&entry.id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_append_assigns_increasing_ids() {
        let registry = MemoryStreamRegistry::new();
        let a = registry.append("k", json!(1), 10).await.unwrap();
        let b = registry.append("k", json!(2), 10).await.unwrap();
        assert!(b > a);
    }

    #[tokio::test]
    async fn test_cap_evicts_oldest() {
        let registry = MemoryStreamRegistry::new();
        for i in 0..5 {
            registry.append("k", json!(i), 3).await.unwrap();
        }

        let entries = registry.range_asc("k", 10).await.unwrap();
        assert_eq!(entries.len(), 3);
        let values: Vec<i64> = entries
            .iter()
            .map(|e| e.payload.as_i64().unwrap())
            .collect();
        assert_eq!(values, vec![2, 3, 4]);
    }

    #[tokio::test]
    async fn test_range_desc_and_latest() {
        let registry = MemoryStreamRegistry::new();
        for i in 0..4 {
            registry.append("k", json!(i), 10).await.unwrap();
        }

        let desc = registry.range_desc("k", 2).await.unwrap();
        assert_eq!(desc[0].payload, json!(3));
        assert_eq!(desc[1].payload, json!(2));

        let latest = registry.latest("k").await.unwrap().unwrap();
        assert_eq!(latest.payload, json!(3));
    }

    #[tokio::test]
    async fn test_latest_cap_of_one_keeps_newest() {
        let registry = MemoryStreamRegistry::new();
        for i in 0..3 {
            registry.append("latest", json!(i), 1).await.unwrap();
        }
        let entries = registry.range_asc("latest", 10).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].payload, json!(2));
    }

    #[tokio::test]
    async fn test_ack_removes_specific_ids() {
        let registry = MemoryStreamRegistry::new();
        let a = registry.append("k", json!("a"), 10).await.unwrap();
        let b = registry.append("k", json!("b"), 10).await.unwrap();
        let c = registry.append("k", json!("c"), 10).await.unwrap();

        registry.ack("k", &[a, c]).await.unwrap();

        let entries = registry.range_asc("k", 10).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, b);
    }

    #[tokio::test]
    async fn test_missing_key_yields_empty() {
        let registry = MemoryStreamRegistry::new();
        assert!(registry.range_asc("nope", 5).await.unwrap().is_empty());
        assert!(registry.latest("nope").await.unwrap().is_none());
        registry.ack("nope", &[1]).await.unwrap();
    }
}
