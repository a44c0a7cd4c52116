// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Request handlers: decode → validate → service → envelope.

pub mod applications;
pub mod auth;
pub mod deployments;
pub mod jobs;
pub mod logs;
pub mod metrics;
pub mod servers;

use crate::domain::ListOptions;

/// Build [`ListOptions`] from the common `page, limit, search, paginate`
/// query arguments. Query structs carry the fields inline; the form codec
/// cannot deserialize flattened numeric fields.
pub fn list_options(
    page: Option<i64>,
    limit: Option<i64>,
    search: Option<String>,
    paginate: Option<bool>,
) -> ListOptions {
    ListOptions {
        page: page.unwrap_or_default(),
        limit: limit.unwrap_or_default(),
        search: search.unwrap_or_default(),
        paginate: paginate.unwrap_or_default(),
    }
}
