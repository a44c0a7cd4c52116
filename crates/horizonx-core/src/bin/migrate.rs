// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Migration CLI.
//!
//! Usage:
//!   migrate -op=up [-steps=<n>]      apply pending migrations
//!   migrate -op=down -steps=<n>      revert the last n migrations
//!   migrate -op=version              print the current schema version
//!   migrate -op=force -steps=<v>     mark version v as current without running
//!
//! Reads `DATABASE_URL` from the environment (or `.env`). Exit 0 on
//! success, non-zero with a human message on failure.

use std::process::ExitCode;

use horizonx_core::migrations;

struct Args {
    op: String,
    steps: i64,
}

fn parse_args() -> Result<Args, String> {
    let mut op = String::new();
    let mut steps = 0i64;

    for arg in std::env::args().skip(1) {
        if let Some(value) = arg.strip_prefix("-op=") {
            op = value.to_string();
        } else if let Some(value) = arg.strip_prefix("-steps=") {
            steps = value
                .parse()
                .map_err(|_| format!("invalid -steps value: {}", value))?;
        } else {
            return Err(format!("unknown argument: {}", arg));
        }
    }

    if op.is_empty() {
        return Err("usage: migrate -op=[up|down|version|force] -steps=[n]".to_string());
    }

    Ok(Args { op, steps })
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let args = match parse_args() {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{}", message);
            return ExitCode::FAILURE;
        }
    };

    let database_url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("DATABASE_URL is not set");
            return ExitCode::FAILURE;
        }
    };

    match run(&args, &database_url).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("migration failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &Args, database_url: &str) -> anyhow::Result<()> {
    let pool = sqlx::PgPool::connect(database_url).await?;

    match args.op.as_str() {
        "up" => {
            migrations::run(&pool).await?;
            println!("migration success");
        }
        "down" => {
            if args.steps <= 0 {
                anyhow::bail!("-steps is required for down");
            }
            let target = current_version(&pool).await?.saturating_sub(args.steps);
            migrations::POSTGRES.undo(&pool, target).await?;
            println!("reverted to version {}", target);
        }
        "version" => match current_version(&pool).await? {
            0 => println!("no migrations applied"),
            version => println!("version: {}", version),
        },
        "force" => {
            if args.steps <= 0 {
                anyhow::bail!("-steps (the target version) is required for force");
            }
            // Drop the bookkeeping rows above the target so the next `up`
            // re-applies from there. The schema itself is left untouched.
            sqlx::query("DELETE FROM _sqlx_migrations WHERE version > $1")
                .bind(args.steps)
                .execute(&pool)
                .await?;
            println!("forced version {}", args.steps);
        }
        other => anyhow::bail!("unknown operation: {}", other),
    }

    pool.close().await;
    Ok(())
}

async fn current_version(pool: &sqlx::PgPool) -> anyhow::Result<i64> {
    // A missing bookkeeping table means nothing was ever applied.
    let version: Option<Option<i64>> =
        sqlx::query_scalar("SELECT MAX(version) FROM _sqlx_migrations WHERE success")
            .fetch_optional(pool)
            .await
            .ok()
            .flatten();
    Ok(version.flatten().unwrap_or(0))
}
