// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Concurrent batches of independent store writes.

use futures::future::{join_all, try_join_all};
use std::fmt::Display;
use std::future::Future;
use tracing::warn;

use crate::error::ApiError;

/// How a batch reacts to a failing item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BatchPolicy {
    /// The first failure aborts the batch and is returned as the error.
    #[default]
    FailFast,
    /// Every item runs; failures are collected per key.
    CollectAll,
}

/// Per-key outcome of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport<K> {
    pub succeeded: Vec<K>,
    pub failed: Vec<(K, ApiError)>,
}

impl<K> BatchReport<K> {
    /// Returns true if every item succeeded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K> Default for BatchReport<K> {
    fn default() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }
}

/// Runs `op` for every item concurrently.
///
/// Items are independent: no ordering between them is guaranteed.
///
/// # Arguments
///
/// * `items` - The keys to process
/// * `policy` - What to do when an item fails
/// * `op` - The operation to run per key
///
/// # Errors
///
/// With `BatchPolicy::FailFast`, returns `ApiError::BatchFailed` naming
/// the first item that failed. Items still in flight are dropped. With
/// `BatchPolicy::CollectAll` this never fails; see the report instead.
pub async fn run_batch<K, F, Fut>(
    items: Vec<K>,
    policy: BatchPolicy,
    op: F,
) -> Result<BatchReport<K>, ApiError>
where
    K: Clone + Display,
    F: Fn(K) -> Fut,
    Fut: Future<Output = Result<(), ApiError>>,
{
    match policy {
        BatchPolicy::FailFast => {
            let calls = items.into_iter().map(|key| {
                let call: Fut = op(key.clone());
                async move {
                    match call.await {
                        Ok(()) => Ok(key),
                        Err(source) => Err(ApiError::BatchFailed {
                            key: key.to_string(),
                            source: Box::new(source),
                        }),
                    }
                }
            });
            let succeeded: Vec<K> = try_join_all(calls).await?;
            Ok(BatchReport {
                succeeded,
                failed: Vec::new(),
            })
        }
        BatchPolicy::CollectAll => {
            let calls = items.into_iter().map(|key| {
                let call: Fut = op(key.clone());
                async move { (key, call.await) }
            });
            let mut report: BatchReport<K> = BatchReport::default();
            for (key, outcome) in join_all(calls).await {
                match outcome {
                    Ok(()) => report.succeeded.push(key),
                    Err(err) => {
                        warn!(%key, error = %err, "Batch item failed");
                        report.failed.push((key, err));
                    }
                }
            }
            Ok(report)
        }
    }
}
