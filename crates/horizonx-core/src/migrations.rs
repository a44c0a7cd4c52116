// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Database migrations for the control plane.
//!
//! Exposes the embedded migrator so the server can run pending migrations on
//! startup and the `migrate` CLI can drive them explicitly.

use sqlx::migrate::MigrateError;

/// PostgreSQL migrator with all control-plane migrations embedded.
pub static POSTGRES: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Apply all pending migrations. Safe to call multiple times; already-applied
/// migrations are skipped.
pub async fn run(pool: &sqlx::PgPool) -> Result<(), MigrateError> {
    POSTGRES.run(pool).await
}
