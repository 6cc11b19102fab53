//! Global atomic counters for qaboard observability.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. when the CLI exits).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters.
pub struct Metrics {
    references_resolved: AtomicU64,
    resolution_failures: AtomicU64,
    replies_submitted: AtomicU64,
    reply_sync_failures: AtomicU64,
    users_provisioned: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            references_resolved: AtomicU64::new(0),
            resolution_failures: AtomicU64::new(0),
            replies_submitted: AtomicU64::new(0),
            reply_sync_failures: AtomicU64::new(0),
            users_provisioned: AtomicU64::new(0),
        }
    }

    /// One reply reference materialized.
    pub fn inc_references_resolved(&self) {
        self.references_resolved.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "references_resolved", "counter incremented");
    }

    /// One reply slot failed to resolve.
    pub fn inc_resolution_failures(&self) {
        self.resolution_failures.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "resolution_failures", "counter incremented");
    }

    pub fn inc_replies_submitted(&self) {
        self.replies_submitted.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "replies_submitted", "counter incremented");
    }

    pub fn inc_reply_sync_failures(&self) {
        self.reply_sync_failures.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "reply_sync_failures", "counter incremented");
    }

    pub fn inc_users_provisioned(&self) {
        self.users_provisioned.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "users_provisioned", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            references_resolved = self.references_resolved(),
            resolution_failures = self.resolution_failures(),
            replies_submitted = self.replies_submitted(),
            reply_sync_failures = self.reply_sync_failures(),
            users_provisioned = self.users_provisioned(),
        );
    }

    pub fn references_resolved(&self) -> u64 {
        self.references_resolved.load(Ordering::Relaxed)
    }

    pub fn resolution_failures(&self) -> u64 {
        self.resolution_failures.load(Ordering::Relaxed)
    }

    pub fn replies_submitted(&self) -> u64 {
        self.replies_submitted.load(Ordering::Relaxed)
    }

    pub fn reply_sync_failures(&self) -> u64 {
        self.reply_sync_failures.load(Ordering::Relaxed)
    }

    pub fn users_provisioned(&self) -> u64 {
        self.users_provisioned.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.references_resolved.store(0, Ordering::Relaxed);
        self.resolution_failures.store(0, Ordering::Relaxed);
        self.replies_submitted.store(0, Ordering::Relaxed);
        self.reply_sync_failures.store(0, Ordering::Relaxed);
        self.users_provisioned.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment() {
        let m = Metrics::new();
        assert_eq!(m.references_resolved(), 0);
        m.inc_references_resolved();
        m.inc_references_resolved();
        assert_eq!(m.references_resolved(), 2);

        m.inc_resolution_failures();
        assert_eq!(m.resolution_failures(), 1);

        m.inc_replies_submitted();
        m.inc_reply_sync_failures();
        m.inc_users_provisioned();
        assert_eq!(m.replies_submitted(), 1);
        assert_eq!(m.reply_sync_failures(), 1);
        assert_eq!(m.users_provisioned(), 1);
    }

    #[test]
    fn reset_zeroes_all() {
        let m = Metrics::new();
        m.inc_references_resolved();
        m.inc_replies_submitted();
        m.inc_users_provisioned();
        m.reset();
        assert_eq!(m.references_resolved(), 0);
        assert_eq!(m.replies_submitted(), 0);
        assert_eq!(m.users_provisioned(), 0);
    }
}
