//! Message types for actor communication
//!
//! Collectors are controlled through an mpsc command channel and report
//! what they did through shared atomic counters, so the orchestrator can
//! surface drop rates without talking to the actor.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::oneshot;

/// Commands that can be sent to a collector actor
#[derive(Debug)]
pub enum CollectorCommand {
    /// Run one collection cycle immediately (statistics collector only)
    ///
    /// Used for testing and manual refresh operations.
    PollNow {
        /// Channel to send the result back
        respond_to: oneshot::Sender<anyhow::Result<()>>,
    },

    /// Stop the collector
    ///
    /// The actor finishes the line or cycle it is working on and exits.
    Shutdown,
}

/// Which of the two per-server collectors an actor is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectorKind {
    /// Follows the `MONITOR` stream
    Command,
    /// Polls `INFO`
    Stats,
}

impl fmt::Display for CollectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectorKind::Command => write!(f, "command"),
            CollectorKind::Stats => write!(f, "stats"),
        }
    }
}

/// Counters shared between a collector and its handle
#[derive(Debug, Default)]
pub struct CollectorStats {
    /// Raw lines read (command) or cycles run (stats)
    pub received: AtomicU64,
    /// Rows handed to storage successfully
    pub stored: AtomicU64,
    /// Events dropped on purpose (`INFO`, `MONITOR`)
    pub filtered: AtomicU64,
    /// Lines without an event (heartbeats)
    pub skipped: AtomicU64,
    pub parse_failures: AtomicU64,
    pub storage_failures: AtomicU64,
    pub protocol_failures: AtomicU64,
}

impl CollectorStats {
    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CollectorCounts {
        CollectorCounts {
            received: self.received.load(Ordering::Relaxed),
            stored: self.stored.load(Ordering::Relaxed),
            filtered: self.filtered.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            parse_failures: self.parse_failures.load(Ordering::Relaxed),
            storage_failures: self.storage_failures.load(Ordering::Relaxed),
            protocol_failures: self.protocol_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`CollectorStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CollectorCounts {
    pub received: u64,
    pub stored: u64,
    pub filtered: u64,
    pub skipped: u64,
    pub parse_failures: u64,
    pub storage_failures: u64,
    pub protocol_failures: u64,
}

impl CollectorCounts {
    pub fn failures(&self) -> u64 {
        self.parse_failures + self.storage_failures + self.protocol_failures
    }
}

/// Final report of one collector
#[derive(Debug, Clone, Serialize)]
pub struct CollectorSummary {
    pub server_id: String,
    pub kind: CollectorKind,
    pub counts: CollectorCounts,
}

impl fmt::Display for CollectorSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = &self.counts;
        write!(
            f,
            "{} [{}] received={} stored={} filtered={} skipped={} failures={}",
            self.server_id,
            self.kind,
            c.received,
            c.stored,
            c.filtered,
            c.skipped,
            c.failures()
        )
    }
}
