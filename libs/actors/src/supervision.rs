//! Supervision
//!
//! A parent evaluates its [`SupervisorStrategy`] whenever a child reports a
//! fault. The one-for-one policy keeps a sliding window of failures per
//! child: failures older than the window are evicted, and only once the
//! remaining count reaches `max_retries` is the decider consulted. Below the
//! threshold the child simply resumes.

use crate::error::ActorError;
use crate::path::ActorPath;
use kernel_config::SupervisionSettings;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Supervision directive for error handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// Keep the current instance; the failing message is dropped
    Resume,
    /// Replace the instance, keeping path and mailbox
    Restart,
    /// Stop the child
    Stop,
    /// Fail the supervisor itself with the child's fault
    Escalate,
}

/// Maps a fault to a directive
pub type Decider = Arc<dyn Fn(&ActorError) -> Directive + Send + Sync>;

/// Stop on initialization, kill and death pact faults; restart otherwise
///
/// Escalated faults are judged by their root cause.
pub fn default_decider(fault: &ActorError) -> Directive {
    match fault.root_cause() {
        ActorError::Initialization { .. }
        | ActorError::Killed { .. }
        | ActorError::DeathPact { .. } => Directive::Stop,
        _ => Directive::Restart,
    }
}

/// One recorded failure
#[derive(Debug, Clone)]
pub struct FailureRecord {
    pub fault: ActorError,
    pub at: Instant,
}

/// Sliding window of failures for one child
#[derive(Debug, Default, Clone)]
pub struct Failures {
    entries: VecDeque<FailureRecord>,
}

impl Failures {
    /// Record a failure and evict entries older than `now - window`
    ///
    /// An entry exactly `window` old is kept. Returns the count left inside
    /// the window, including the new entry.
    pub fn record(&mut self, fault: ActorError, now: Instant, window: Duration) -> usize {
        self.entries.push_back(FailureRecord { fault, at: now });
        if let Some(horizon) = now.checked_sub(window) {
            while self.entries.front().is_some_and(|entry| entry.at < horizon) {
                self.entries.pop_front();
            }
        }
        self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn latest(&self) -> Option<&FailureRecord> {
        self.entries.back()
    }
}

/// One-for-one fault decision policy
#[derive(Clone)]
pub struct SupervisorStrategy {
    max_retries: u32,
    window: Duration,
    decider: Decider,
    failures: HashMap<ActorPath, Failures>,
}

impl SupervisorStrategy {
    /// Consult the decider once `max_retries` failures fall inside `window`
    pub fn one_for_one(max_retries: u32, window: Duration) -> Self {
        Self {
            max_retries,
            window,
            decider: Arc::new(default_decider),
            failures: HashMap::new(),
        }
    }

    pub fn from_settings(settings: &SupervisionSettings) -> Self {
        Self::one_for_one(settings.max_retries, settings.window())
    }

    /// Every child failure fails the supervisor
    pub fn escalate_all() -> Self {
        Self::one_for_one(0, Duration::from_secs(1)).with_decider(|_| Directive::Escalate)
    }

    pub fn with_decider<F>(mut self, decider: F) -> Self
    where
        F: Fn(&ActorError) -> Directive + Send + Sync + 'static,
    {
        self.decider = Arc::new(decider);
        self
    }

    /// Record `fault` for `child` and choose a directive
    ///
    /// The decider runs when the windowed count is `>= max_retries`.
    pub fn decide(&mut self, child: &ActorPath, fault: &ActorError, now: Instant) -> Directive {
        let count = self
            .failures
            .entry(child.clone())
            .or_default()
            .record(fault.clone(), now, self.window);

        if count >= self.max_retries as usize {
            (self.decider)(fault)
        } else {
            Directive::Resume
        }
    }

    pub fn failure_count(&self, child: &ActorPath) -> usize {
        self.failures.get(child).map(Failures::len).unwrap_or(0)
    }

    /// Drop the history of a child that is gone
    pub fn forget(&mut self, child: &ActorPath) {
        self.failures.remove(child);
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

impl Default for SupervisorStrategy {
    fn default() -> Self {
        Self::from_settings(&SupervisionSettings::default())
    }
}

impl fmt::Debug for SupervisorStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupervisorStrategy")
            .field("max_retries", &self.max_retries)
            .field("window", &self.window)
            .field("children_tracked", &self.failures.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fault() -> ActorError {
        ActorError::application("boom")
    }

    fn at(base: Instant, secs: u64) -> Instant {
        base + Duration::from_secs(secs)
    }

    #[test]
    fn test_default_decider() {
        assert_eq!(
            default_decider(&ActorError::initialization("/user/a", "bad")),
            Directive::Stop
        );
        assert_eq!(
            default_decider(&ActorError::Killed {
                path: "/user/a".into()
            }),
            Directive::Stop
        );
        assert_eq!(
            default_decider(&ActorError::DeathPact {
                subject: "/user/b".into()
            }),
            Directive::Stop
        );
        assert_eq!(default_decider(&fault()), Directive::Restart);

        let escalated_kill = ActorError::escalated(
            "/user/a",
            ActorError::Killed {
                path: "/user/a/b".into(),
            },
        );
        assert_eq!(default_decider(&escalated_kill), Directive::Stop);
    }

    #[test]
    fn test_window_threshold_and_expiry() {
        let base = Instant::now();
        let child = ActorPath::parse("/user/worker");
        let mut strategy = SupervisorStrategy::one_for_one(3, Duration::from_secs(10));

        assert_eq!(strategy.decide(&child, &fault(), at(base, 0)), Directive::Resume);
        assert_eq!(strategy.decide(&child, &fault(), at(base, 1)), Directive::Resume);
        // Third failure inside the window reaches max_retries
        assert_eq!(strategy.decide(&child, &fault(), at(base, 2)), Directive::Restart);
        assert_eq!(strategy.failure_count(&child), 3);

        // At t=11 the t=0 entry is evicted; t=1 is exactly on the horizon and kept
        assert_eq!(strategy.decide(&child, &fault(), at(base, 11)), Directive::Restart);
        assert_eq!(strategy.failure_count(&child), 3);

        // At t=13 only t=11 remains before the new entry
        assert_eq!(strategy.decide(&child, &fault(), at(base, 13)), Directive::Resume);
        assert_eq!(strategy.failure_count(&child), 2);
    }

    #[test]
    fn test_children_tracked_independently() {
        let now = Instant::now();
        let a = ActorPath::parse("/user/a");
        let b = ActorPath::parse("/user/b");
        let mut strategy = SupervisorStrategy::one_for_one(2, Duration::from_secs(60));

        assert_eq!(strategy.decide(&a, &fault(), now), Directive::Resume);
        assert_eq!(strategy.decide(&b, &fault(), now), Directive::Resume);
        assert_eq!(strategy.decide(&a, &fault(), now), Directive::Restart);

        strategy.forget(&a);
        assert_eq!(strategy.failure_count(&a), 0);
        assert_eq!(strategy.failure_count(&b), 1);
    }

    #[test]
    fn test_custom_decider_and_escalate_all() {
        let now = Instant::now();
        let child = ActorPath::parse("/user/a");

        let mut resume_all =
            SupervisorStrategy::one_for_one(1, Duration::from_secs(60)).with_decider(|_| Directive::Resume);
        assert_eq!(resume_all.decide(&child, &fault(), now), Directive::Resume);

        let mut escalate = SupervisorStrategy::escalate_all();
        assert_eq!(escalate.decide(&child, &fault(), now), Directive::Escalate);
    }

    #[test]
    fn test_default_strategy_acts_on_first_failure() {
        let mut strategy = SupervisorStrategy::default();
        assert_eq!(strategy.max_retries(), 1);
        assert_eq!(
            strategy.decide(&ActorPath::parse("/user/a"), &fault(), Instant::now()),
            Directive::Restart
        );
    }
}
