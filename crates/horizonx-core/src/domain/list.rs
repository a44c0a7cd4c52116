// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! List-query options and pagination metadata.

use serde::{Deserialize, Serialize};

/// Common query options for list endpoints.
///
/// With `paginate` unset, `limit` caps the result (default 1000) and no
/// counting query runs.
#[derive(Debug, Clone, Deserialize)]
pub struct ListOptions {
    #[serde(default)]
    pub page: i64,
    #[serde(default)]
    pub limit: i64,
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub paginate: bool,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            page: 0,
            limit: 0,
            search: String::new(),
            paginate: false,
        }
    }
}

impl ListOptions {
    /// Apply the defaulting rules: paginated queries get page ≥ 1 and
    /// limit ≥ 1 (default 10); unpaginated queries get a 1000-row cap.
    pub fn normalized(mut self) -> Self {
        if self.paginate {
            if self.page <= 0 {
                self.page = 1;
            }
            if self.limit <= 0 {
                self.limit = 10;
            }
        } else if self.limit <= 0 {
            self.limit = 1000;
        }
        self
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).max(0) * self.limit
    }
}

/// Pagination metadata returned alongside paginated data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

impl Meta {
    pub fn calculate(total: i64, page: i64, limit: i64) -> Self {
        let total_pages = if limit > 0 {
            (total + limit - 1) / limit
        } else {
            0
        };
        Self {
            total,
            page,
            limit,
            total_pages,
        }
    }
}

/// A list result; `meta` is present only for paginated queries. `data` is
/// always a list, never null.
#[derive(Debug, Clone, Serialize)]
pub struct ListResult<T> {
    pub data: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_paginated_defaults() {
        let opts = ListOptions {
            paginate: true,
            ..Default::default()
        }
        .normalized();
        assert_eq!(opts.page, 1);
        assert_eq!(opts.limit, 10);
        assert_eq!(opts.offset(), 0);
    }

    #[test]
    fn test_normalized_unpaginated_cap() {
        let opts = ListOptions::default().normalized();
        assert_eq!(opts.limit, 1000);
        assert!(!opts.paginate);
    }

    #[test]
    fn test_meta_rounds_up() {
        let meta = Meta::calculate(25, 2, 10);
        assert_eq!(meta.total_pages, 3);
        assert_eq!(meta.total, 25);
    }

    #[test]
    fn test_meta_empty_total() {
        let meta = Meta::calculate(0, 1, 10);
        assert_eq!(meta.total, 0);
        assert_eq!(meta.total_pages, 0);
    }

    #[test]
    fn test_empty_list_serializes_as_array() {
        let result: ListResult<i64> = ListResult {
            data: Vec::new(),
            meta: Some(Meta::calculate(0, 1, 10)),
        };
        let value = serde_json::to_value(&result).unwrap();
        assert!(value["data"].is_array());
        assert_eq!(value["meta"]["total"], 0);
    }
}
