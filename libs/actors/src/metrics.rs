//! System Metrics
//!
//! Lock-free counters updated from every activation. Read them through
//! [`SystemMetrics::snapshot`].

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// System-wide counters
#[derive(Debug, Default)]
pub struct SystemMetrics {
    pub actors_spawned: AtomicU64,
    pub actors_stopped: AtomicU64,
    pub messages_processed: AtomicU64,
    pub total_processing_time_ns: AtomicU64,

    // Message classes
    pub system_messages: AtomicU64,
    pub user_messages: AtomicU64,
    pub dead_letters: AtomicU64,
    pub unhandled_messages: AtomicU64,

    // Supervision
    pub failures: AtomicU64,
    pub actor_restarts: AtomicU64,
    pub restart_failures: AtomicU64,
}

impl SystemMetrics {
    pub fn record_actor_spawned(&self) {
        self.actors_spawned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_actor_stopped(&self) {
        self.actors_stopped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_message_handled(&self, duration: Duration) {
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
        self.total_processing_time_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    pub fn record_system_message(&self) {
        self.system_messages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_user_message(&self) {
        self.user_messages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dead_letter(&self) {
        self.dead_letters.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unhandled(&self) {
        self.unhandled_messages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record actor restart event
    pub fn record_actor_restart(&self, success: bool) {
        self.actor_restarts.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.restart_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn avg_processing_time_ns(&self) -> f64 {
        let count = self.messages_processed.load(Ordering::Relaxed);
        if count == 0 {
            return 0.0;
        }
        let total = self.total_processing_time_ns.load(Ordering::Relaxed);
        total as f64 / count as f64
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let actor_restarts = self.actor_restarts.load(Ordering::Relaxed);
        let restart_failures = self.restart_failures.load(Ordering::Relaxed);
        let restart_success_rate = if actor_restarts > 0 {
            ((actor_restarts - restart_failures) as f64 / actor_restarts as f64) * 100.0
        } else {
            100.0
        };

        MetricsSnapshot {
            actors_spawned: self.actors_spawned.load(Ordering::Relaxed),
            actors_stopped: self.actors_stopped.load(Ordering::Relaxed),
            messages_processed: self.messages_processed.load(Ordering::Relaxed),
            avg_processing_time_ns: self.avg_processing_time_ns(),
            system_messages: self.system_messages.load(Ordering::Relaxed),
            user_messages: self.user_messages.load(Ordering::Relaxed),
            dead_letters: self.dead_letters.load(Ordering::Relaxed),
            unhandled_messages: self.unhandled_messages.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            actor_restarts,
            restart_failures,
            restart_success_rate,
        }
    }
}

/// Point-in-time copy of [`SystemMetrics`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub actors_spawned: u64,
    pub actors_stopped: u64,
    pub messages_processed: u64,
    pub avg_processing_time_ns: f64,
    pub system_messages: u64,
    pub user_messages: u64,
    pub dead_letters: u64,
    pub unhandled_messages: u64,
    pub failures: u64,
    pub actor_restarts: u64,
    pub restart_failures: u64,
    pub restart_success_rate: f64,
}

impl MetricsSnapshot {
    /// Actors spawned and not yet stopped
    pub fn live_actors(&self) -> u64 {
        self.actors_spawned.saturating_sub(self.actors_stopped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processing_average() {
        let metrics = SystemMetrics::default();
        assert_eq!(metrics.avg_processing_time_ns(), 0.0);

        metrics.record_message_handled(Duration::from_nanos(100));
        metrics.record_message_handled(Duration::from_nanos(300));
        assert_eq!(metrics.avg_processing_time_ns(), 200.0);
    }

    #[test]
    fn test_restart_success_rate() {
        let metrics = SystemMetrics::default();
        assert_eq!(metrics.snapshot().restart_success_rate, 100.0);

        metrics.record_actor_restart(true);
        metrics.record_actor_restart(true);
        metrics.record_actor_restart(true);
        metrics.record_actor_restart(false);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.actor_restarts, 4);
        assert_eq!(snapshot.restart_failures, 1);
        assert_eq!(snapshot.restart_success_rate, 75.0);
    }

    #[test]
    fn test_live_actors() {
        let metrics = SystemMetrics::default();
        for _ in 0..5 {
            metrics.record_actor_spawned();
        }
        metrics.record_actor_stopped();
        assert_eq!(metrics.snapshot().live_actors(), 4);
    }
}
