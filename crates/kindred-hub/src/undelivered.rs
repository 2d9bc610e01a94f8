// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Holding area for events that could not be delivered to a session.
//!
//! Buckets are keyed by `session_id + client_id` and replayed once when a
//! session with the same key registers again.

use std::collections::VecDeque;

use dashmap::DashMap;
use tracing::warn;

use crate::codec::Event;

/// Bucket key for a session.
pub fn bucket_key(session_id: &str, client_id: &str) -> String {
    format!("{session_id}{client_id}")
}

/// Per-key FIFO of undelivered events with a capacity cap.
pub struct UndeliveredBuffer {
    buckets: DashMap<String, VecDeque<Event>>,
    per_key: usize,
}

impl UndeliveredBuffer {
    pub fn new(per_key: usize) -> Self {
        Self {
            buckets: DashMap::new(),
            per_key: per_key.max(1),
        }
    }

    /// Append an event, dropping the oldest when the bucket is full.
    pub fn put(&self, key: &str, event: Event) {
        let mut bucket = self.buckets.entry(key.to_string()).or_default();
        if bucket.len() >= self.per_key
            && let Some(dropped) = bucket.pop_front()
        {
            warn!(
                key,
                dropped = dropped.kind(),
                cap = self.per_key,
                "undelivered bucket full, dropping oldest event"
            );
        }
        bucket.push_back(event);
    }

    /// Remove and return everything buffered under `key`, oldest first.
    pub fn drain(&self, key: &str) -> Vec<Event> {
        self.buckets
            .remove(key)
            .map(|(_, bucket)| bucket.into())
            .unwrap_or_default()
    }

    /// Number of events waiting under `key`.
    pub fn pending(&self, key: &str) -> usize {
        self.buckets.get(key).map(|b| b.len()).unwrap_or(0)
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tracing_test::traced_test;

    use super::*;

    fn ack(id: &str) -> Event {
        Event::Ack { id: id.into() }
    }

    #[test]
    fn drain_returns_in_order_and_deletes() {
        let buf = UndeliveredBuffer::new(8);
        buf.put("k", ack("1"));
        buf.put("k", ack("2"));
        buf.put("other", ack("x"));

        assert_eq!(buf.drain("k"), vec![ack("1"), ack("2")]);
        assert!(buf.drain("k").is_empty());
        assert_eq!(buf.pending("other"), 1);
        assert_eq!(buf.bucket_count(), 1);
    }

    #[test]
    #[traced_test]
    fn cap_drops_oldest_first() {
        let buf = UndeliveredBuffer::new(2);
        buf.put("k", ack("1"));
        buf.put("k", ack("2"));
        buf.put("k", ack("3"));
        assert_eq!(buf.drain("k"), vec![ack("2"), ack("3")]);
        assert!(logs_contain("dropping oldest event"));
    }

    #[test]
    fn bucket_key_concatenates() {
        assert_eq!(bucket_key("session-1", "client-a"), "session-1client-a");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_puts_are_not_lost() {
        let buf = Arc::new(UndeliveredBuffer::new(1000));
        let mut handles = Vec::new();
        for t in 0..4 {
            let buf = buf.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..50 {
                    buf.put("k", ack(&format!("{t}-{i}")));
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(buf.drain("k").len(), 200);
    }
}
