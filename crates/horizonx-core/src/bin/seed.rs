// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Seed the owner account.
//!
//! Idempotent: upserts on email, so running twice leaves one row carrying
//! the latest password. The password comes from `DB_OWNER_PASSWORD` or
//! falls back to a development default.

use std::process::ExitCode;
use std::sync::Arc;

use horizonx_core::persistence::UserRepository;
use horizonx_core::persistence::postgres::PgUserRepository;
use horizonx_core::services::AuthService;

const OWNER_NAME: &str = "Super Owner";
const OWNER_EMAIL: &str = "owner@horizonx.local";
const OWNER_ROLE: i64 = 1;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let database_url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("DATABASE_URL is not set");
            return ExitCode::FAILURE;
        }
    };

    let password =
        std::env::var("DB_OWNER_PASSWORD").unwrap_or_else(|_| "password".to_string());

    match seed(&database_url, &password).await {
        Ok(()) => {
            println!("seeding success");
            println!("user: {}", OWNER_EMAIL);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("seeding failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn seed(database_url: &str, password: &str) -> anyhow::Result<()> {
    let pool = sqlx::PgPool::connect(database_url).await?;
    let users = Arc::new(PgUserRepository::new(pool.clone()));

    let hash = AuthService::hash_password(password)?;
    users
        .upsert_by_email(OWNER_NAME, OWNER_EMAIL, &hash, OWNER_ROLE)
        .await?;

    pool.close().await;
    Ok(())
}
