// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Operator user entity.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// An operator account.
///
/// `password` holds the argon2 hash and is never serialized. Email is unique
/// among rows that are not soft-deleted.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub role_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
