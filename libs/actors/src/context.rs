//! Actor Context
//!
//! [`Context`] is the explicit handle passed to every handler invocation. It
//! exposes the actor's identity, the current sender, child management, death
//! watch and behavior switching.
//!
//! The kernel also keeps the executing actor in a thread-local slot for the
//! duration of one activation (or one actor construction). Only
//! `ActorRef::send` reads it, to fill in an implicit sender. The slot is
//! installed by a guard that restores the previous value on drop, so nested
//! constructions (a `pre_start` spawning children) unwind correctly.

use crate::actor::{Behavior, Props};
use crate::actor_ref::ActorRef;
use crate::ask::{self, AskFuture};
use crate::cell::{ActorCell, Links};
use crate::error::Result;
use crate::message::{Message, SystemMessage};
use crate::path::ActorPath;
use crate::selection;
use crate::system::ActorSystem;
use std::any::Any;
use std::cell::RefCell;
use std::sync::Arc;
use tracing::debug;

thread_local! {
    static CURRENT_ACTOR: RefCell<Option<ActorRef>> = const { RefCell::new(None) };
}

/// Actor whose activation is running on this thread, if any
pub fn current_actor() -> Option<ActorRef> {
    CURRENT_ACTOR.with(|current| current.borrow().clone())
}

/// Installs an actor as the ambient sender; restores the previous one on drop
pub(crate) struct AmbientGuard {
    previous: Option<ActorRef>,
}

impl AmbientGuard {
    pub(crate) fn enter(actor: ActorRef) -> Self {
        let previous = CURRENT_ACTOR.with(|current| current.replace(Some(actor)));
        Self { previous }
    }
}

impl Drop for AmbientGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT_ACTOR.with(|current| *current.borrow_mut() = previous);
    }
}

/// Deferred requests applied by the cell once the handler returns
pub(crate) enum PendingOp {
    Become(Box<dyn Behavior>),
    Unbecome,
    StopSelf,
}

/// Handle given to an actor while it processes one message
pub struct Context<'a> {
    cell: &'a Arc<ActorCell>,
    sender: ActorRef,
    message: Option<Message>,
    links: &'a mut Links,
    pending: Vec<PendingOp>,
    unhandled: bool,
}

impl<'a> Context<'a> {
    pub(crate) fn new(
        cell: &'a Arc<ActorCell>,
        sender: ActorRef,
        message: Option<Message>,
        links: &'a mut Links,
    ) -> Self {
        Self {
            cell,
            sender,
            message,
            links,
            pending: Vec::new(),
            unhandled: false,
        }
    }

    pub(crate) fn finish(self) -> (Vec<PendingOp>, bool) {
        (self.pending, self.unhandled)
    }

    /// Reference to this actor
    pub fn self_ref(&self) -> ActorRef {
        self.cell.self_ref()
    }

    pub fn parent(&self) -> &ActorRef {
        self.cell.parent()
    }

    /// Sender of the message being processed; the sentinel during lifecycle hooks
    pub fn sender(&self) -> &ActorRef {
        &self.sender
    }

    pub fn path(&self) -> &ActorPath {
        self.cell.path()
    }

    /// Owning actor system; `None` once every system handle was dropped
    pub fn system(&self) -> Option<ActorSystem> {
        self.cell.system().map(ActorSystem::from_inner)
    }

    /// Message being processed; `None` during lifecycle hooks
    pub fn message(&self) -> Option<&Message> {
        self.message.as_ref()
    }

    /// Spawn a child; `None` picks a generated `$n` name
    pub fn actor_of<'n>(&mut self, props: Props, name: impl Into<Option<&'n str>>) -> Result<ActorRef> {
        self.cell.spawn_child(props, name.into())
    }

    pub fn child(&self, name: &str) -> Option<ActorRef> {
        self.cell.child(name)
    }

    pub fn children(&self) -> Vec<ActorRef> {
        self.cell.children()
    }

    /// Stop this actor, one of its children, or (by poison pill) any other actor
    pub fn stop(&mut self, target: &ActorRef) {
        if target.is_cell(self.cell) {
            self.stop_self();
        } else if self.cell.is_child(target) {
            self.cell.stop_child(self.links, target);
        } else {
            target.send_system(SystemMessage::PoisonPill, &self.self_ref());
        }
    }

    /// Stop this actor once the current handler returns
    pub fn stop_self(&mut self) {
        self.pending.push(PendingOp::StopSelf);
    }

    /// Unwatch and stop every child
    pub fn stop_all_children(&mut self) {
        for child in self.cell.children() {
            if self.links.watchees.contains(&child) {
                self.unwatch(&child);
            }
            self.cell.stop_child(self.links, &child);
        }
    }

    /// Receive `Terminated` when `subject` stops
    pub fn watch(&mut self, subject: &ActorRef) {
        if subject.is_cell(self.cell) || subject.is_no_sender() {
            return;
        }
        if self.links.watchees.insert(subject.clone()) {
            debug!(actor_path = %self.cell.path(), subject = %subject.path(), "Watching actor");
            subject.send_system(SystemMessage::Watch(self.self_ref()), &self.self_ref());
        }
    }

    pub fn unwatch(&mut self, subject: &ActorRef) {
        if self.links.watchees.remove(subject) {
            debug!(actor_path = %self.cell.path(), subject = %subject.path(), "Unwatching actor");
            subject.send_system(SystemMessage::Unwatch(self.self_ref()), &self.self_ref());
        }
    }

    pub fn is_watching(&self, subject: &ActorRef) -> bool {
        self.links.watchees.contains(subject)
    }

    /// Push `behavior`; it handles messages from the next one on
    pub fn become_behavior<B: Behavior>(&mut self, behavior: B) {
        self.pending.push(PendingOp::Become(Box::new(behavior)));
    }

    /// Pop the top behavior; does nothing when only the initial behavior is left
    pub fn unbecome(&mut self) {
        self.pending.push(PendingOp::Unbecome);
    }

    /// Tell the current sender
    pub fn reply<M: Any + Send + Sync>(&self, msg: M) {
        self.sender.tell(msg, &self.self_ref());
    }

    /// Send the current message on to `target`, keeping the original sender
    pub fn forward(&self, target: &ActorRef) {
        if let Some(message) = &self.message {
            target.send_message(message.clone(), &self.sender);
        }
    }

    /// Tell `target` with this actor as sender
    pub fn tell<M: Any + Send + Sync>(&self, target: &ActorRef, msg: M) {
        target.tell(msg, &self.self_ref());
    }

    /// Ask `target`; the result is published inside this actor's own activation
    pub fn ask<M: Any + Send + Sync>(&self, target: &ActorRef, msg: M) -> AskFuture {
        match self.cell.system() {
            Some(system) => ask::ask_with(&system, target, Message::from_value(msg), self.self_ref()),
            None => AskFuture::failed(
                target.path().clone(),
                crate::error::KernelError::system_terminated("<dropped>"),
            ),
        }
    }

    /// Resolve a selection relative to this actor (absolute when it starts with `/`)
    pub fn actor_selection(&self, expr: &str) -> ActorRef {
        match self.cell.system() {
            Some(system) => selection::select(&system, self.self_ref(), expr),
            None => ActorRef::no_sender(),
        }
    }

    /// Mark the current message as not handled
    pub fn unhandled(&mut self) {
        self.unhandled = true;
    }
}
