// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded waits on external calls.
//!
//! The call runs detached on its own task. When the deadline fires the
//! waiter stops waiting and the eventual result is dropped; the call
//! itself is not cancelled.

use std::future::Future;
use std::time::Duration;

use kindred_core::KindredError;

/// Outcome of a deadline-bounded call.
#[derive(Debug)]
pub enum Bounded<T> {
    Done(Result<T, KindredError>),
    TimedOut,
}

/// Run `fut` on its own task and wait at most `limit` for it.
pub async fn within<T, F>(limit: Duration, fut: F) -> Bounded<T>
where
    F: Future<Output = Result<T, KindredError>> + Send + 'static,
    T: Send + 'static,
{
    let call = tokio::spawn(fut);
    match tokio::time::timeout(limit, call).await {
        Ok(Ok(result)) => Bounded::Done(result),
        Ok(Err(join)) => Bounded::Done(Err(KindredError::Internal(format!(
            "external call task failed: {join}"
        )))),
        // Dropping the JoinHandle detaches the task; its value is discarded.
        Err(_) => Bounded::TimedOut,
    }
}
