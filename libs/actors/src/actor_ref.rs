//! Actor References
//!
//! An [`ActorRef`] is an opaque, cloneable handle whose only capability is
//! `tell`. The variants differ in where the message goes:
//!
//! - local: the target cell's mailbox
//! - no-sender: nowhere (the sentinel swallows messages)
//! - remote: a [`RemoteTransport`] owned by an external collaborator
//! - broadcast: every target of a wildcard selection
//! - unresolved: dead letters (a selection that matched nothing)
//!
//! Identity is the path: two references to the same path compare equal.

use crate::cell::ActorCell;
use crate::context::current_actor;
use crate::event_stream::DeadLetter;
use crate::message::{Envelope, Message, SystemMessage};
use crate::path::ActorPath;
use once_cell::sync::Lazy;
use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

static NO_SENDER_PATH: Lazy<ActorPath> = Lazy::new(|| ActorPath::parse("/noSender"));

/// Outbound half of an out-of-process transport
///
/// Implementations serialize (message, sender path, target path) and hand
/// them to their wire. Inbound deliveries come back through
/// `ActorSystem::deliver_inbound`.
pub trait RemoteTransport: Send + Sync {
    fn deliver(&self, target: &ActorPath, message: Message, sender: &ActorRef);
}

#[derive(Clone)]
enum RefKind {
    Local(Arc<ActorCell>),
    NoSender,
    Remote {
        path: ActorPath,
        transport: Arc<dyn RemoteTransport>,
    },
    Broadcast {
        path: ActorPath,
        targets: Arc<Vec<ActorRef>>,
    },
    Unresolved {
        path: ActorPath,
        dead_letters: Box<ActorRef>,
    },
}

/// Location-transparent handle to an actor
#[derive(Clone)]
pub struct ActorRef {
    kind: RefKind,
}

impl ActorRef {
    pub(crate) fn local(cell: Arc<ActorCell>) -> Self {
        Self {
            kind: RefKind::Local(cell),
        }
    }

    /// Sentinel sender; telling it is a no-op
    pub fn no_sender() -> Self {
        Self {
            kind: RefKind::NoSender,
        }
    }

    /// Reference to an actor living behind `transport`
    pub fn remote(path: ActorPath, transport: Arc<dyn RemoteTransport>) -> Self {
        Self {
            kind: RefKind::Remote { path, transport },
        }
    }

    pub(crate) fn broadcast(path: ActorPath, targets: Vec<ActorRef>) -> Self {
        Self {
            kind: RefKind::Broadcast {
                path,
                targets: Arc::new(targets),
            },
        }
    }

    pub(crate) fn unresolved(path: ActorPath, dead_letters: ActorRef) -> Self {
        Self {
            kind: RefKind::Unresolved {
                path,
                dead_letters: Box::new(dead_letters),
            },
        }
    }

    pub fn path(&self) -> &ActorPath {
        match &self.kind {
            RefKind::Local(cell) => cell.path(),
            RefKind::NoSender => &NO_SENDER_PATH,
            RefKind::Remote { path, .. }
            | RefKind::Broadcast { path, .. }
            | RefKind::Unresolved { path, .. } => path,
        }
    }

    /// Send `msg` with an explicit sender
    ///
    /// Never blocks and never fails: a message for a stopped actor is
    /// redirected to dead letters.
    pub fn tell<M: Any + Send + Sync>(&self, msg: M, sender: &ActorRef) {
        self.send_message(Message::from_value(msg), sender);
    }

    /// Send `msg` with the currently executing actor (if any) as sender
    pub fn send<M: Any + Send + Sync>(&self, msg: M) {
        let sender = current_actor().unwrap_or_else(ActorRef::no_sender);
        self.tell(msg, &sender);
    }

    /// Send an already classified message
    pub fn send_message(&self, message: Message, sender: &ActorRef) {
        match &self.kind {
            RefKind::Local(cell) => cell.post(Envelope::new(message, sender.clone())),
            RefKind::NoSender => {}
            RefKind::Remote { path, transport } => transport.deliver(path, message, sender),
            RefKind::Broadcast { targets, .. } => {
                for target in targets.iter() {
                    target.send_message(message.clone(), sender);
                }
            }
            RefKind::Unresolved { dead_letters, .. } => {
                dead_letters.tell(
                    DeadLetter {
                        message,
                        sender: sender.clone(),
                        recipient: self.clone(),
                    },
                    &ActorRef::no_sender(),
                );
            }
        }
    }

    pub(crate) fn send_system(&self, message: SystemMessage, sender: &ActorRef) {
        self.send_message(Message::System(message), sender);
    }

    pub fn is_no_sender(&self) -> bool {
        matches!(self.kind, RefKind::NoSender)
    }

    pub fn is_local(&self) -> bool {
        matches!(self.kind, RefKind::Local(_))
    }

    pub fn is_remote(&self) -> bool {
        matches!(self.kind, RefKind::Remote { .. })
    }

    /// Targets of a broadcast reference; empty for every other variant
    pub fn targets(&self) -> &[ActorRef] {
        match &self.kind {
            RefKind::Broadcast { targets, .. } => targets.as_slice(),
            _ => &[],
        }
    }

    /// True once a local actor has stopped; unknown (false) for other variants
    /// except unresolved references, which never reach an actor
    pub fn is_terminated(&self) -> bool {
        match &self.kind {
            RefKind::Local(cell) => cell.is_terminated(),
            RefKind::Unresolved { .. } => true,
            _ => false,
        }
    }

    pub(crate) fn local_cell(&self) -> Option<&Arc<ActorCell>> {
        match &self.kind {
            RefKind::Local(cell) => Some(cell),
            _ => None,
        }
    }

    /// Same live cell, not merely the same path
    pub(crate) fn is_cell(&self, cell: &ActorCell) -> bool {
        self.local_cell()
            .is_some_and(|own| std::ptr::eq(Arc::as_ptr(own), cell))
    }
}

impl PartialEq for ActorRef {
    fn eq(&self, other: &Self) -> bool {
        self.path() == other.path()
    }
}

impl Eq for ActorRef {}

impl Hash for ActorRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path().hash(state);
    }
}

impl fmt::Debug for ActorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.kind {
            RefKind::Local(_) => "local",
            RefKind::NoSender => "no-sender",
            RefKind::Remote { .. } => "remote",
            RefKind::Broadcast { .. } => "broadcast",
            RefKind::Unresolved { .. } => "unresolved",
        };
        write!(f, "ActorRef({} {})", kind, self.path())
    }
}

impl fmt::Display for ActorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.path(), f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingTransport {
        delivered: Mutex<Vec<(ActorPath, String, ActorPath)>>,
    }

    impl RemoteTransport for RecordingTransport {
        fn deliver(&self, target: &ActorPath, message: Message, sender: &ActorRef) {
            let text = message.downcast_ref::<String>().cloned().unwrap_or_default();
            self.delivered
                .lock()
                .push((target.clone(), text, sender.path().clone()));
        }
    }

    #[test]
    fn test_no_sender_swallows() {
        let sentinel = ActorRef::no_sender();
        sentinel.tell("ignored".to_string(), &ActorRef::no_sender());
        assert!(sentinel.is_no_sender());
        assert_eq!(sentinel.path().to_string(), "/noSender");
    }

    #[test]
    fn test_remote_ref_hands_message_to_transport() {
        let transport = Arc::new(RecordingTransport::default());
        let remote = ActorRef::remote(ActorPath::parse("/user/far"), transport.clone());
        let sender = ActorRef::remote(ActorPath::parse("/user/near"), transport.clone());

        remote.tell("hello".to_string(), &sender);
        // Outside any actor the ambient sender is the sentinel
        remote.send("again".to_string());

        let delivered = transport.delivered.lock();
        assert_eq!(delivered.len(), 2);
        assert_eq!(delivered[0].0, ActorPath::parse("/user/far"));
        assert_eq!(delivered[0].1, "hello");
        assert_eq!(delivered[0].2, ActorPath::parse("/user/near"));
        assert_eq!(delivered[1].2.to_string(), "/noSender");
    }

    #[test]
    fn test_equality_is_by_path() {
        let transport = Arc::new(RecordingTransport::default());
        let a = ActorRef::remote(ActorPath::parse("/user/a"), transport.clone());
        let b = ActorRef::remote(ActorPath::parse("/user/a"), transport);
        assert_eq!(a, b);
        assert_ne!(a, ActorRef::no_sender());
        assert!(a.is_remote());
        assert!(!a.is_terminated());
    }

    #[test]
    fn test_broadcast_fans_out() {
        let transport = Arc::new(RecordingTransport::default());
        let targets = vec![
            ActorRef::remote(ActorPath::parse("/user/a"), transport.clone()),
            ActorRef::remote(ActorPath::parse("/user/b"), transport.clone()),
        ];
        let all = ActorRef::broadcast(ActorPath::parse("/user/*"), targets);
        all.tell("tick".to_string(), &ActorRef::no_sender());

        assert_eq!(all.targets().len(), 2);
        assert_eq!(transport.delivered.lock().len(), 2);
    }
}
