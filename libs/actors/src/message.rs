//! Message Types
//!
//! User messages are type-erased `Arc<dyn Any + Send + Sync>` values, so one
//! mailbox can carry any payload without serialization and handlers resolve
//! them by `TypeId`. Control traffic is the closed [`SystemMessage`] enum,
//! which always goes through the mailbox's system queue.

use crate::actor_ref::ActorRef;
use crate::error::ActorError;
use parking_lot::Mutex;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Type-erased user message
pub type AnyMessage = Arc<dyn Any + Send + Sync>;

/// Anything a mailbox can carry
#[derive(Clone)]
pub enum Message {
    System(SystemMessage),
    User(AnyMessage),
}

impl Message {
    /// Wrap a user payload
    pub fn user<M: Any + Send + Sync>(payload: M) -> Self {
        Message::User(Arc::new(payload))
    }

    /// Classify an arbitrary value
    ///
    /// A `Message` passes through unchanged, a `SystemMessage` goes to the
    /// system queue, an already-erased `AnyMessage` is not wrapped twice, and
    /// anything else becomes a user message.
    pub fn from_value<M: Any + Send + Sync>(value: M) -> Self {
        let boxed: Box<dyn Any + Send + Sync> = Box::new(value);
        let boxed = match boxed.downcast::<Message>() {
            Ok(message) => return *message,
            Err(other) => other,
        };
        let boxed = match boxed.downcast::<SystemMessage>() {
            Ok(system) => return Message::System(*system),
            Err(other) => other,
        };
        match boxed.downcast::<AnyMessage>() {
            Ok(erased) => Message::User(*erased),
            Err(other) => Message::User(Arc::from(other)),
        }
    }

    pub fn is_system(&self) -> bool {
        matches!(self, Message::System(_))
    }

    /// Borrow the user payload as `M`
    pub fn downcast_ref<M: Any>(&self) -> Option<&M> {
        match self {
            Message::User(payload) => (**payload).downcast_ref::<M>(),
            Message::System(_) => None,
        }
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::System(system) => write!(f, "System({:?})", system),
            Message::User(payload) => write!(f, "User({:?})", (**payload).type_id()),
        }
    }
}

/// Control messages handled by the kernel before any user behavior
#[derive(Clone, Debug)]
pub enum SystemMessage {
    /// Sent to a subject: record the carried watcher
    Watch(ActorRef),
    /// Sent to a subject: forget the carried watcher
    Unwatch(ActorRef),
    /// Sent to each watcher when the carried subject stops
    DeathWatchNotification(ActorRef),
    /// Sent to the parent when the carried child has fully stopped
    ChildTerminated(ActorRef),
    /// Fail with `ActorError::Killed`, leaving the outcome to the supervisor
    Kill,
    /// Stop the receiving actor
    PoisonPill,
    /// Sent by a parent to the child it wants stopped
    StopChild,
    /// Sent by a parent: replace the instance, keeping path and mailbox
    RestartChild(ActorError),
    /// Run the carried completion inside the receiving actor's activation
    CompleteFuture(Completion),
    /// Answered with [`Pong`]
    Ping,
    /// Answered with [`ActorIdentity`] carrying the same correlation id
    Identify(u64),
    /// Sent by a failing child to its parent
    SuperviseChild { child: ActorRef, fault: ActorError },
}

impl SystemMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            SystemMessage::Watch(_) => "watch",
            SystemMessage::Unwatch(_) => "unwatch",
            SystemMessage::DeathWatchNotification(_) => "death_watch_notification",
            SystemMessage::ChildTerminated(_) => "child_terminated",
            SystemMessage::Kill => "kill",
            SystemMessage::PoisonPill => "poison_pill",
            SystemMessage::StopChild => "stop_child",
            SystemMessage::RestartChild(_) => "restart_child",
            SystemMessage::CompleteFuture(_) => "complete_future",
            SystemMessage::Ping => "ping",
            SystemMessage::Identify(_) => "identify",
            SystemMessage::SuperviseChild { .. } => "supervise_child",
        }
    }
}

/// One-shot closure carried by `CompleteFuture`
///
/// Clones share the closure; whichever clone runs first consumes it.
#[derive(Clone)]
pub struct Completion {
    action: Arc<Mutex<Option<Box<dyn FnOnce() + Send>>>>,
}

impl Completion {
    pub fn new(action: impl FnOnce() + Send + 'static) -> Self {
        Self {
            action: Arc::new(Mutex::new(Some(Box::new(action)))),
        }
    }

    /// Run the closure; returns false if it already ran
    pub fn run(&self) -> bool {
        let action = self.action.lock().take();
        match action {
            Some(action) => {
                action();
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pending = self.action.lock().is_some();
        f.debug_struct("Completion").field("pending", &pending).finish()
    }
}

/// Reply to `SystemMessage::Ping`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pong;

/// Reply to `SystemMessage::Identify`
#[derive(Debug, Clone)]
pub struct ActorIdentity {
    pub correlation_id: u64,
    /// `None` when the identified actor is already stopped
    pub actor: Option<ActorRef>,
}

/// Delivered to a watcher's behavior when a watched actor stops
#[derive(Debug, Clone)]
pub struct Terminated {
    pub actor: ActorRef,
}

/// Message plus the reference it came from
#[derive(Clone, Debug)]
pub struct Envelope {
    sender: ActorRef,
    message: Message,
}

impl Envelope {
    pub fn new(message: Message, sender: ActorRef) -> Self {
        Self { sender, message }
    }

    pub fn sender(&self) -> &ActorRef {
        &self.sender
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn is_system(&self) -> bool {
        self.message.is_system()
    }

    pub fn into_parts(self) -> (Message, ActorRef) {
        (self.message, self.sender)
    }
}
