//! Event Stream and Dead Letters
//!
//! Undeliverable messages are wrapped in a [`DeadLetter`] and sent to the
//! `/deadLetters` actor, which logs them and publishes them on the system
//! [`EventStream`] together with unhandled-message notifications.

use crate::actor::Actor;
use crate::actor_ref::ActorRef;
use crate::context::Context;
use crate::error::ActorError;
use crate::message::{AnyMessage, Message};
use crate::metrics::SystemMetrics;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, warn};

/// A message that could not be delivered
#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub message: Message,
    pub sender: ActorRef,
    pub recipient: ActorRef,
}

/// A user message no behavior handled
#[derive(Clone)]
pub struct UnhandledMessage {
    pub message: AnyMessage,
    pub sender: ActorRef,
    pub recipient: ActorRef,
}

impl std::fmt::Debug for UnhandledMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnhandledMessage")
            .field("sender", &self.sender)
            .field("recipient", &self.recipient)
            .finish_non_exhaustive()
    }
}

/// Events published on the system event stream
#[derive(Debug, Clone)]
pub enum KernelEvent {
    DeadLetter(DeadLetter),
    Unhandled(UnhandledMessage),
}

/// Fan-out of [`KernelEvent`]s to subscribed actors
#[derive(Debug, Default)]
pub struct EventStream {
    subscribers: RwLock<Vec<ActorRef>>,
}

impl EventStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver every future event to `subscriber` as a `KernelEvent` message
    pub fn subscribe(&self, subscriber: ActorRef) {
        let mut subscribers = self.subscribers.write();
        if !subscribers.contains(&subscriber) {
            subscribers.push(subscriber);
        }
    }

    pub fn unsubscribe(&self, subscriber: &ActorRef) {
        self.subscribers.write().retain(|s| s != subscriber);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    pub fn publish(&self, event: KernelEvent) {
        let mut stale = false;
        for subscriber in self.subscribers.read().iter() {
            if subscriber.is_terminated() {
                stale = true;
                continue;
            }
            subscriber.tell(event.clone(), &ActorRef::no_sender());
        }
        if stale {
            self.subscribers.write().retain(|s| !s.is_terminated());
        }
    }
}

/// Body of `/deadLetters`
pub(crate) struct DeadLetterActor {
    stream: Arc<EventStream>,
    metrics: Arc<SystemMetrics>,
    log_dead_letters: bool,
}

impl DeadLetterActor {
    pub(crate) fn new(stream: Arc<EventStream>, metrics: Arc<SystemMetrics>, log_dead_letters: bool) -> Self {
        Self {
            stream,
            metrics,
            log_dead_letters,
        }
    }
}

impl Actor for DeadLetterActor {
    fn receive(&mut self, _ctx: &mut Context<'_>, msg: &AnyMessage) -> Result<(), ActorError> {
        let Some(letter) = (**msg).downcast_ref::<DeadLetter>() else {
            return Ok(());
        };

        self.metrics.record_dead_letter();
        let kind = match &letter.message {
            Message::System(system) => system.kind(),
            Message::User(_) => "user",
        };
        if self.log_dead_letters {
            warn!(
                recipient = %letter.recipient.path(),
                sender = %letter.sender.path(),
                kind,
                "Dead letter"
            );
        } else {
            debug!(recipient = %letter.recipient.path(), kind, "Dead letter");
        }
        self.stream.publish(KernelEvent::DeadLetter(letter.clone()));
        Ok(())
    }
}
