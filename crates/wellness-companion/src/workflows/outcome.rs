//! Primary results paired with the best-effort steps that failed along the way

use serde::Serialize;
use tracing::warn;

use crate::metrics;

/// A best-effort step that failed without failing the request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecondaryFailure {
    pub step: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<T> {
    pub value: T,
    pub warnings: Vec<SecondaryFailure>,
}

impl<T> Outcome<T> {
    pub fn with_warnings(value: T, warnings: Vec<SecondaryFailure>) -> Self {
        Self { value, warnings }
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn into_value(self) -> T {
        self.value
    }
}

/// Log, count, and describe a swallowed failure
pub fn record_secondary_failure(step: &'static str, user_id: i64, err: &anyhow::Error) -> SecondaryFailure {
    warn!("Best-effort step {} failed for user {}: {:#}", step, user_id, err);
    metrics::inc_secondary_failure(step);
    SecondaryFailure {
        step,
        message: format!("{:#}", err),
    }
}
