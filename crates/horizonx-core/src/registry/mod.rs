// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Capped append-only stream registry.
//!
//! A thin abstraction over a capped stream store keyed by topic. Id order
//! equals insertion order; appending past `max_len` evicts the oldest
//! entries. The metrics pipeline uses per-server caps (~900 samples for the
//! history windows, 1 for "latest") and the agent uses a local
//! buffer-of-last-resort stream (cap 5000).

pub mod memory;

pub use memory::MemoryStreamRegistry;

use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by a stream registry backend.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("registry backend error: {0}")]
    Backend(String),
}

/// One stored stream entry. Ids are assigned by the store and strictly
/// increase in insertion order within a key.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEntry {
    pub id: u64,
    pub payload: serde_json::Value,
}

impl StreamEntry {
    /// Decode the payload into a typed value.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T, RegistryError> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }
}

/// Capped append-only stream store keyed by topic.
#[async_trait]
pub trait StreamRegistry: Send + Sync {
    /// Append a payload; entries beyond `max_len` are evicted oldest-first.
    /// Returns the store-assigned id.
    async fn append(
        &self,
        key: &str,
        payload: serde_json::Value,
        max_len: usize,
    ) -> Result<u64, RegistryError>;

    /// Up to `limit` entries in ascending id order.
    async fn range_asc(&self, key: &str, limit: usize) -> Result<Vec<StreamEntry>, RegistryError>;

    /// Up to `limit` entries in descending id order.
    async fn range_desc(&self, key: &str, limit: usize) -> Result<Vec<StreamEntry>, RegistryError>;

    /// The newest single entry, if any.
    async fn latest(&self, key: &str) -> Result<Option<StreamEntry>, RegistryError>;

    /// Remove specific ids from a stream.
    async fn ack(&self, key: &str, ids: &[u64]) -> Result<(), RegistryError>;
}
