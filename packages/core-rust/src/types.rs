use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Free-form key/value filter passed to query operations.
///
/// Uses `BTreeMap` for deterministic query-string order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterParams(pub BTreeMap<String, String>);

impl FilterParams {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Window into a result set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PagingParams {
    /// Number of items to skip from the start.
    pub skip: Option<u64>,
    /// Maximum number of items to return.
    pub take: Option<u64>,
    /// Whether the total count should be calculated.
    pub total: bool,
}

impl PagingParams {
    #[must_use]
    pub fn new(skip: Option<u64>, take: Option<u64>, total: bool) -> Self {
        Self { skip, take, total }
    }

    /// `skip`, or `default` when unset.
    #[must_use]
    pub fn skip_or(&self, default: u64) -> u64 {
        self.skip.unwrap_or(default)
    }

    /// `take` bounded by `max`.
    #[must_use]
    pub fn take_or(&self, max: u64) -> u64 {
        self.take.map_or(max, |t| t.min(max))
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPage<T> {
    pub data: Vec<T>,
    /// Total number of matching items, when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

impl<T> DataPage<T> {
    #[must_use]
    pub fn new(data: Vec<T>, total: Option<u64>) -> Self {
        Self { data, total }
    }
}
