//! Actor Cell
//!
//! The live execution context of one actor: identity, mailbox, dispatcher,
//! children registry and the per-instance state (lifecycle, behavior stack,
//! watch sets, lazily built supervisor strategy).
//!
//! # Activation
//!
//! A drain is scheduled on the cell's dispatcher whenever a post wins the
//! mailbox's `IDLE -> BUSY` transition. The drain takes envelopes one at a
//! time and runs [`ActorCell::invoke`] for each: system messages go through a
//! fixed dispatch table, user messages through the top of the behavior stack
//! (or the actor's own `receive` when the stack is empty). Any fault or panic
//! is caught here and sent to the parent as `SuperviseChild`; the drain then
//! carries on with the next envelope.
//!
//! # Locking
//!
//! `state` is only locked by the cell's own activation (or by the thread
//! constructing the cell before the mailbox is activated), so it is never
//! contended. User code runs while it is held, which is why nothing reachable
//! from a handler may lock the state of the cell it runs in.
//!
//! `children` is read by other threads (selection, inbound remote
//! resolution). Entries are removed only by the owning activation, when a
//! child's `ChildTerminated` arrives, so a name stays reserved until the
//! previous holder has fully stopped. Inserts happen on the thread that calls
//! `actor_of`: the owning activation for `Context::actor_of`, any thread for
//! the guardians behind `ActorSystem::actor_of` and the `/temp` ask actors.
//! Those inserts are the one place the map has more than one writer; the
//! write lock makes the name check and the insert atomic. No user code runs
//! while it is held.
//!
//! # Stopping and restarting
//!
//! A child whose stop was requested stays registered and is tracked in
//! `Links::terminating`. A stopping cell runs `post_stop` only once that set
//! is empty, and a restarting cell builds its fresh instance only then;
//! user messages arriving in between are stashed and replayed in order.

use crate::actor::{Actor, Behavior, Props};
use crate::actor_ref::ActorRef;
use crate::context::{AmbientGuard, Context, PendingOp};
use crate::dispatcher::Dispatcher;
use crate::error::{ActorError, KernelError, Result};
use crate::event_stream::{DeadLetter, KernelEvent, UnhandledMessage};
use crate::mailbox::{Admission, Mailbox};
use crate::message::{ActorIdentity, AnyMessage, Envelope, Message, Pong, SystemMessage, Terminated};
use crate::path::ActorPath;
use crate::supervision::{Directive, SupervisorStrategy};
use crate::system::SystemInner;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Actor lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Created,
    Started,
    Running,
    Restarting,
    Stopping,
    Stopped,
}

/// Kernel-internal role of a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CellRole {
    Ordinary,
    /// Top of the tree; its stop terminates the system
    Root,
    /// The dead-letter sink; undeliverable messages to it are dropped
    DeadLetters,
}

/// Watch sets and children being stopped
#[derive(Debug, Default)]
pub(crate) struct Links {
    /// Actors to notify when this one stops
    pub(crate) watchers: HashSet<ActorRef>,
    /// Actors this one watches
    pub(crate) watchees: HashSet<ActorRef>,
    /// Children asked to stop that have not confirmed it yet
    pub(crate) terminating: Vec<ActorRef>,
}

impl Links {
    pub(crate) fn is_terminating(&self, child: &ActorRef) -> bool {
        child
            .local_cell()
            .is_some_and(|cell| self.terminating.iter().any(|pending| pending.is_cell(cell)))
    }
}

struct CellState {
    lifecycle: Lifecycle,
    instance: Option<Box<dyn Actor>>,
    behaviors: Vec<Box<dyn Behavior>>,
    strategy: Option<SupervisorStrategy>,
    restarts: u64,
    links: Links,
    /// Set while a restart waits for the old children to stop
    restart_cause: Option<ActorError>,
    /// User messages held back until the fresh instance exists
    stash: Vec<Envelope>,
}

pub struct ActorCell {
    path: ActorPath,
    parent: ActorRef,
    props: Props,
    system: Weak<SystemInner>,
    mailbox: Mailbox,
    dispatcher: Arc<dyn Dispatcher>,
    children: RwLock<HashMap<String, ActorRef>>,
    state: Mutex<CellState>,
    role: CellRole,
    anonymous: AtomicU64,
}

impl ActorCell {
    pub(crate) fn new(
        path: ActorPath,
        parent: ActorRef,
        props: Props,
        system: Weak<SystemInner>,
        dispatcher: Arc<dyn Dispatcher>,
        role: CellRole,
    ) -> Self {
        Self {
            path,
            parent,
            props,
            system,
            mailbox: Mailbox::new(),
            dispatcher,
            children: RwLock::new(HashMap::new()),
            state: Mutex::new(CellState {
                lifecycle: Lifecycle::Created,
                instance: None,
                behaviors: Vec::new(),
                strategy: None,
                restarts: 0,
                links: Links::default(),
                restart_cause: None,
                stash: Vec::new(),
            }),
            role,
            anonymous: AtomicU64::new(0),
        }
    }

    pub fn path(&self) -> &ActorPath {
        &self.path
    }

    pub(crate) fn parent(&self) -> &ActorRef {
        &self.parent
    }

    pub(crate) fn self_ref(self: &Arc<Self>) -> ActorRef {
        ActorRef::local(Arc::clone(self))
    }

    pub(crate) fn system(&self) -> Option<Arc<SystemInner>> {
        self.system.upgrade()
    }

    pub(crate) fn is_terminated(&self) -> bool {
        self.mailbox.is_closed()
    }

    pub(crate) fn child(&self, name: &str) -> Option<ActorRef> {
        self.children.read().get(name).cloned()
    }

    pub(crate) fn children(&self) -> Vec<ActorRef> {
        self.children.read().values().cloned().collect()
    }

    /// True when `child` is the live cell registered under its name
    pub(crate) fn is_child(&self, child: &ActorRef) -> bool {
        self.children
            .read()
            .get(child.path().name())
            .is_some_and(|registered| child.local_cell().is_some_and(|c| registered.is_cell(c)))
    }

    // ---- spawning -------------------------------------------------------

    pub(crate) fn spawn_child(self: &Arc<Self>, props: Props, name: Option<&str>) -> Result<ActorRef> {
        let name = match name {
            Some(name) => {
                validate_name(name)?;
                name.to_string()
            }
            None => format!("${}", self.anonymous.fetch_add(1, Ordering::Relaxed)),
        };
        self.spawn_with_role(props, name, CellRole::Ordinary)
    }

    pub(crate) fn spawn_with_role(
        self: &Arc<Self>,
        props: Props,
        name: String,
        role: CellRole,
    ) -> Result<ActorRef> {
        let system = self
            .system()
            .ok_or_else(|| KernelError::system_terminated(self.path.to_string()))?;
        if self.mailbox.is_closed() {
            return Err(KernelError::actor_stopped(self.path.to_string()));
        }
        let dispatcher = system.dispatchers.lookup(props.dispatcher_id())?;

        let cell = Arc::new(ActorCell::new(
            self.path.child(&name),
            self.self_ref(),
            props,
            Arc::downgrade(&system),
            dispatcher,
            role,
        ));
        let child = ActorRef::local(Arc::clone(&cell));

        // Register before construction so the name is reserved and the
        // child's own pre_start already sees a complete tree above it
        {
            let mut children = self.children.write();
            if children.contains_key(&name) {
                return Err(KernelError::name_taken(self.path.to_string(), name));
            }
            children.insert(name, child.clone());
        }

        cell.start();
        Ok(child)
    }

    /// Build the first instance and activate the mailbox
    pub(crate) fn start(self: &Arc<Self>) {
        let _ambient = AmbientGuard::enter(self.self_ref());
        {
            let mut state = self.state.lock();
            state.lifecycle = Lifecycle::Started;
            if let Some(system) = self.system() {
                system.metrics.record_actor_spawned();
            }

            match self.create_instance(&mut state, None) {
                Ok(()) => {
                    if state.lifecycle == Lifecycle::Started {
                        state.lifecycle = Lifecycle::Running;
                    }
                    debug!(actor_path = %self.path, "Actor started");
                }
                Err(fault) => self.report_failure(fault),
            }
        }
        self.activate();
    }

    fn activate(self: &Arc<Self>) {
        if self.mailbox.release() {
            self.schedule();
        }
    }

    // ---- scheduling -----------------------------------------------------

    /// Enqueue an envelope and schedule a drain if the mailbox was idle
    pub(crate) fn post(self: &Arc<Self>, envelope: Envelope) {
        match self.mailbox.post(envelope) {
            Ok(Admission::Schedule) => self.schedule(),
            Ok(Admission::Pending) => {}
            Err(rejected) => self.undeliverable(rejected),
        }
    }

    fn schedule(self: &Arc<Self>) {
        let cell = Arc::clone(self);
        self.dispatcher.schedule(Box::new(move || cell.run()));
    }

    /// One activation: drain, hand the flag back, reschedule if work raced in
    fn run(self: &Arc<Self>) {
        let throughput = self.dispatcher.throughput();
        self.mailbox.drain(throughput, |envelope| self.invoke(envelope));
        if self.mailbox.release() {
            self.schedule();
        }
    }

    // ---- message processing ---------------------------------------------

    fn invoke(self: &Arc<Self>, envelope: Envelope) {
        let started = Instant::now();
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if state.lifecycle == Lifecycle::Stopped {
            drop(guard);
            self.undeliverable(envelope);
            return;
        }

        let _ambient = AmbientGuard::enter(self.self_ref());
        let (message, sender) = envelope.into_parts();
        let outcome = match message {
            Message::System(system) => self.handle_system(state, system, sender),
            Message::User(payload) => {
                if state.lifecycle == Lifecycle::Stopping {
                    self.undeliverable(Envelope::new(Message::User(payload), sender));
                    return;
                }
                if state.restart_cause.is_some() {
                    state.stash.push(Envelope::new(Message::User(payload), sender));
                    return;
                }
                self.deliver(state, sender, payload)
            }
        };

        if let Err(fault) = outcome {
            self.report_failure(fault);
        }
        if let Some(system) = self.system() {
            system.metrics.record_message_handled(started.elapsed());
        }
    }

    /// Run a user message through the current behavior
    fn deliver(
        self: &Arc<Self>,
        state: &mut CellState,
        sender: ActorRef,
        payload: AnyMessage,
    ) -> std::result::Result<(), ActorError> {
        let CellState {
            instance,
            behaviors,
            links,
            ..
        } = &mut *state;

        let Some(instance) = instance.as_mut() else {
            // Construction failed; the supervisor has not decided yet
            self.undeliverable(Envelope::new(Message::User(payload), sender));
            return Ok(());
        };

        let mut ctx = Context::new(self, sender.clone(), Some(Message::User(payload.clone())), links);
        let outcome = guarded(|| match behaviors.last_mut() {
            Some(behavior) => behavior.handle(&mut ctx, &payload),
            None => instance.receive(&mut ctx, &payload),
        });
        let (pending, unhandled) = ctx.finish();
        self.apply_pending(state, pending);

        if let Some(system) = self.system() {
            system.metrics.record_user_message();
        }

        outcome?;
        if unhandled {
            self.on_unhandled(sender, payload)?;
        }
        Ok(())
    }

    fn on_unhandled(self: &Arc<Self>, sender: ActorRef, payload: AnyMessage) -> std::result::Result<(), ActorError> {
        if let Some(terminated) = (*payload).downcast_ref::<Terminated>() {
            return Err(ActorError::DeathPact {
                subject: terminated.actor.path().to_string(),
            });
        }

        debug!(actor_path = %self.path, sender = %sender.path(), "Unhandled message");
        if let Some(system) = self.system() {
            system.metrics.record_unhandled();
            system.event_stream.publish(KernelEvent::Unhandled(UnhandledMessage {
                message: payload,
                sender,
                recipient: self.self_ref(),
            }));
        }
        Ok(())
    }

    /// Fixed dispatch table for control traffic; never reaches user behaviors
    /// except for the `Terminated` produced by a death-watch notification
    fn handle_system(
        self: &Arc<Self>,
        state: &mut CellState,
        message: SystemMessage,
        sender: ActorRef,
    ) -> std::result::Result<(), ActorError> {
        if let Some(system) = self.system() {
            system.metrics.record_system_message();
        }

        match message {
            SystemMessage::Watch(watcher) => {
                if !watcher.is_cell(self) {
                    debug!(actor_path = %self.path, watcher = %watcher.path(), "Watcher added");
                    state.links.watchers.insert(watcher);
                }
                Ok(())
            }
            SystemMessage::Unwatch(watcher) => {
                state.links.watchers.remove(&watcher);
                Ok(())
            }
            SystemMessage::DeathWatchNotification(subject) => {
                if state.lifecycle == Lifecycle::Stopping || !state.links.watchees.remove(&subject) {
                    return Ok(());
                }
                let notification: AnyMessage = Arc::new(Terminated {
                    actor: subject.clone(),
                });
                if state.restart_cause.is_some() {
                    state.stash.push(Envelope::new(Message::User(notification), subject));
                    return Ok(());
                }
                self.deliver(state, subject, notification)
            }
            SystemMessage::ChildTerminated(child) => {
                self.on_child_terminated(state, child);
                Ok(())
            }
            SystemMessage::Kill => Err(ActorError::Killed {
                path: self.path.to_string(),
            }),
            SystemMessage::PoisonPill | SystemMessage::StopChild => {
                self.stop(state);
                Ok(())
            }
            SystemMessage::RestartChild(cause) => {
                self.restart(state, cause);
                Ok(())
            }
            SystemMessage::CompleteFuture(completion) => {
                completion.run();
                Ok(())
            }
            SystemMessage::Ping => {
                sender.tell(Pong, &self.self_ref());
                Ok(())
            }
            SystemMessage::Identify(correlation_id) => {
                sender.tell(
                    ActorIdentity {
                        correlation_id,
                        actor: Some(self.self_ref()),
                    },
                    &self.self_ref(),
                );
                Ok(())
            }
            SystemMessage::SuperviseChild { child, fault } => self.supervise(state, child, fault),
        }
    }

    fn apply_pending(self: &Arc<Self>, state: &mut CellState, pending: Vec<PendingOp>) {
        for op in pending {
            match op {
                PendingOp::Become(behavior) => state.behaviors.push(behavior),
                PendingOp::Unbecome => {
                    if state.behaviors.pop().is_none() {
                        debug!(actor_path = %self.path, "unbecome on initial behavior ignored");
                    }
                }
                PendingOp::StopSelf => self.stop(state),
            }
        }
    }

    // ---- instances ------------------------------------------------------

    /// Construct an instance and run `pre_start` (or `post_restart` after a failure)
    fn create_instance(
        self: &Arc<Self>,
        state: &mut CellState,
        cause: Option<&ActorError>,
    ) -> std::result::Result<(), ActorError> {
        let mut instance = guarded(|| self.props.create()).map_err(|e| self.initialization_fault(e))?;

        let mut ctx = Context::new(self, ActorRef::no_sender(), None, &mut state.links);
        let started = guarded(|| match cause {
            None => instance.pre_start(&mut ctx),
            Some(cause) => instance.post_restart(&mut ctx, cause),
        });
        let (pending, _) = ctx.finish();

        state.instance = Some(instance);
        self.apply_pending(state, pending);
        started.map_err(|e| self.initialization_fault(e))
    }

    fn initialization_fault(&self, fault: ActorError) -> ActorError {
        match fault {
            ActorError::Initialization { .. } => fault,
            other => ActorError::initialization(self.path.to_string(), other.to_string()),
        }
    }

    // ---- supervision ----------------------------------------------------

    /// Send a fault to the parent, or bring the system down at the root
    fn report_failure(self: &Arc<Self>, fault: ActorError) {
        error!(
            actor_path = %self.path,
            category = fault.category(),
            error = %fault,
            "Actor failed"
        );
        if let Some(system) = self.system() {
            system.metrics.record_failure();
        }

        if self.parent.is_no_sender() {
            if let Some(system) = self.system() {
                system.fatal(&fault);
            }
            return;
        }
        let self_ref = self.self_ref();
        self.parent.send_system(
            SystemMessage::SuperviseChild {
                child: self_ref.clone(),
                fault,
            },
            &self_ref,
        );
    }

    fn supervise(
        self: &Arc<Self>,
        state: &mut CellState,
        child: ActorRef,
        fault: ActorError,
    ) -> std::result::Result<(), ActorError> {
        if !self.is_child(&child) || state.links.is_terminating(&child) {
            debug!(actor_path = %self.path, child = %child.path(), "Ignoring failure of child that is not running");
            return Ok(());
        }

        if state.strategy.is_none() {
            let strategy = state
                .instance
                .as_ref()
                .and_then(|instance| instance.supervisor_strategy())
                .or_else(|| {
                    self.system()
                        .map(|system| SupervisorStrategy::from_settings(&system.settings.supervision))
                })
                .unwrap_or_default();
            state.strategy = Some(strategy);
        }
        let directive = match state.strategy.as_mut() {
            Some(strategy) => strategy.decide(child.path(), &fault, Instant::now()),
            None => Directive::Restart,
        };

        warn!(
            actor_path = %self.path,
            child = %child.path(),
            category = fault.category(),
            directive = ?directive,
            "Supervising failed child"
        );

        match directive {
            Directive::Resume => Ok(()),
            Directive::Restart => {
                child.send_system(SystemMessage::RestartChild(fault), &self.self_ref());
                Ok(())
            }
            Directive::Stop => {
                if let Some(strategy) = state.strategy.as_mut() {
                    strategy.forget(child.path());
                }
                self.stop_child(&mut state.links, &child);
                Ok(())
            }
            Directive::Escalate => Err(ActorError::escalated(child.path().to_string(), fault)),
        }
    }

    /// Replace the instance in place; path, mailbox and watchers are kept
    ///
    /// The fresh instance is built once every child stopped by `pre_restart`
    /// has confirmed its stop.
    fn restart(self: &Arc<Self>, state: &mut CellState, cause: ActorError) {
        if matches!(state.lifecycle, Lifecycle::Stopping | Lifecycle::Stopped) {
            return;
        }
        state.lifecycle = Lifecycle::Restarting;

        if let Some(mut failed) = state.instance.take() {
            let mut ctx = Context::new(self, ActorRef::no_sender(), None, &mut state.links);
            let hook = guarded(|| {
                failed.pre_restart(&mut ctx, &cause);
                Ok(())
            });
            // Behavior switches and self-stops requested by a dying instance are moot
            let _ = ctx.finish();
            if let Err(fault) = hook {
                warn!(actor_path = %self.path, error = %fault, "pre_restart failed");
            }
        }
        state.behaviors.clear();
        state.restarts += 1;
        state.restart_cause = Some(cause);

        if state.links.terminating.is_empty() {
            self.finish_restart(state);
        } else {
            debug!(
                actor_path = %self.path,
                children = state.links.terminating.len(),
                "Restart waiting for children to stop"
            );
        }
    }

    fn finish_restart(self: &Arc<Self>, state: &mut CellState) {
        let Some(cause) = state.restart_cause.take() else {
            return;
        };

        let outcome = self.create_instance(state, Some(&cause));
        if let Some(system) = self.system() {
            system.metrics.record_actor_restart(outcome.is_ok());
        }
        if state.lifecycle == Lifecycle::Restarting {
            state.lifecycle = Lifecycle::Running;
        }
        match outcome {
            Ok(()) => {
                info!(actor_path = %self.path, restarts = state.restarts, cause = %cause, "Actor restarted");
            }
            Err(fault) => self.report_failure(fault),
        }

        for envelope in std::mem::take(&mut state.stash) {
            let (message, sender) = envelope.into_parts();
            let Message::User(payload) = message else {
                continue;
            };
            if state.lifecycle != Lifecycle::Running {
                self.undeliverable(Envelope::new(Message::User(payload), sender));
                continue;
            }
            if let Err(fault) = self.deliver(state, sender, payload) {
                self.report_failure(fault);
            }
        }
    }

    // ---- stopping -------------------------------------------------------

    /// Ask a registered child to stop; its name stays reserved until it confirms
    pub(crate) fn stop_child(self: &Arc<Self>, links: &mut Links, child: &ActorRef) {
        if !self.is_child(child) || links.is_terminating(child) {
            return;
        }
        child.send_system(SystemMessage::StopChild, &self.self_ref());
        links.terminating.push(child.clone());
    }

    /// Stop children first; the actor itself finishes once all of them confirmed
    fn stop(self: &Arc<Self>, state: &mut CellState) {
        if matches!(state.lifecycle, Lifecycle::Stopping | Lifecycle::Stopped) {
            return;
        }

        let self_ref = self.self_ref();
        for child in self.children() {
            if !state.links.is_terminating(&child) {
                child.send_system(SystemMessage::StopChild, &self_ref);
                state.links.terminating.push(child);
            }
        }
        if state.links.terminating.is_empty() {
            self.finish_stop(state);
            return;
        }

        debug!(actor_path = %self.path, children = state.links.terminating.len(), "Stopping children");
        state.lifecycle = Lifecycle::Stopping;
    }

    fn on_child_terminated(self: &Arc<Self>, state: &mut CellState, child: ActorRef) {
        let Some(cell) = child.local_cell() else {
            return;
        };
        state.links.terminating.retain(|pending| !pending.is_cell(cell));
        {
            let mut children = self.children.write();
            if children
                .get(child.path().name())
                .is_some_and(|entry| entry.is_cell(cell))
            {
                children.remove(child.path().name());
            }
        }
        if let Some(strategy) = state.strategy.as_mut() {
            strategy.forget(child.path());
        }

        if !state.links.terminating.is_empty() {
            return;
        }
        match state.lifecycle {
            Lifecycle::Stopping => self.finish_stop(state),
            Lifecycle::Restarting => self.finish_restart(state),
            _ => {}
        }
    }

    fn finish_stop(self: &Arc<Self>, state: &mut CellState) {
        state.lifecycle = Lifecycle::Stopped;

        if let Some(mut instance) = state.instance.take() {
            let mut ctx = Context::new(self, ActorRef::no_sender(), None, &mut state.links);
            let hook = guarded(|| {
                instance.post_stop(&mut ctx);
                Ok(())
            });
            let _ = ctx.finish();
            if let Err(fault) = hook {
                warn!(actor_path = %self.path, error = %fault, "post_stop failed");
            }
        }
        state.behaviors.clear();
        state.restart_cause = None;

        // From here on every post is redirected; leftovers in the queues are
        // routed the same way by the remaining drain
        self.mailbox.close();
        for envelope in std::mem::take(&mut state.stash) {
            self.undeliverable(envelope);
        }

        let self_ref = self.self_ref();
        if !self.parent.is_no_sender() {
            self.parent
                .send_system(SystemMessage::ChildTerminated(self_ref.clone()), &self_ref);
        }
        for watcher in state.links.watchers.drain() {
            watcher.send_system(SystemMessage::DeathWatchNotification(self_ref.clone()), &self_ref);
        }
        for watchee in state.links.watchees.drain() {
            watchee.send_system(SystemMessage::Unwatch(self_ref.clone()), &self_ref);
        }

        debug!(actor_path = %self.path, restarts = state.restarts, "Actor stopped");
        if let Some(system) = self.system() {
            system.metrics.record_actor_stopped();
            if self.role == CellRole::Root {
                system.on_root_stopped();
            }
        }
    }

    /// Release the strong references of a subtree whose system is gone
    ///
    /// Children maps are emptied and idle cells drop their instance and
    /// links. Cells busy in an activation are skipped.
    pub(crate) fn detach_tree(self: &Arc<Self>) {
        let mut pending = vec![Arc::clone(self)];
        while let Some(cell) = pending.pop() {
            cell.mailbox.close();
            let children: Vec<ActorRef> = match cell.children.try_write() {
                Some(mut children) => children.drain().map(|(_, child)| child).collect(),
                None => Vec::new(),
            };
            pending.extend(children.iter().filter_map(|child| child.local_cell().cloned()));

            if let Some(mut state) = cell.state.try_lock() {
                state.instance = None;
                state.behaviors.clear();
                state.links = Links::default();
                state.restart_cause = None;
                state.stash.clear();
            }
        }
    }

    // ---- dead letters ---------------------------------------------------

    /// Handle an envelope this cell can no longer process
    pub(crate) fn undeliverable(self: &Arc<Self>, envelope: Envelope) {
        let (message, sender) = envelope.into_parts();
        let self_ref = self.self_ref();

        match &message {
            // Watching a dead actor yields an immediate notification
            Message::System(SystemMessage::Watch(watcher)) => {
                watcher.send_system(SystemMessage::DeathWatchNotification(self_ref.clone()), &self_ref);
                return;
            }
            Message::System(SystemMessage::Identify(correlation_id)) => {
                sender.tell(
                    ActorIdentity {
                        correlation_id: *correlation_id,
                        actor: None,
                    },
                    &self_ref,
                );
                return;
            }
            Message::System(SystemMessage::Unwatch(_))
            | Message::System(SystemMessage::ChildTerminated(_))
            | Message::System(SystemMessage::DeathWatchNotification(_))
            | Message::System(SystemMessage::PoisonPill)
            | Message::System(SystemMessage::StopChild) => return,
            Message::User(payload)
                if (**payload).is::<KernelEvent>() || (**payload).is::<DeadLetter>() =>
            {
                return;
            }
            _ => {}
        }

        if self.role == CellRole::DeadLetters {
            debug!(actor_path = %self.path, "Dropping message to stopped dead-letter sink");
            return;
        }
        match self.system().and_then(|system| system.dead_letters()) {
            Some(dead_letters) => dead_letters.tell(
                DeadLetter {
                    message,
                    sender,
                    recipient: self_ref,
                },
                &ActorRef::no_sender(),
            ),
            None => debug!(actor_path = %self.path, "Dropping undeliverable message"),
        }
    }
}

impl std::fmt::Debug for ActorCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorCell")
            .field("path", &self.path)
            .field("mailbox", &self.mailbox)
            .finish()
    }
}

/// Run user code, turning panics into faults
fn guarded<T, F>(f: F) -> std::result::Result<T, ActorError>
where
    F: FnOnce() -> std::result::Result<T, ActorError>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(outcome) => outcome,
        Err(payload) => Err(ActorError::panicked(payload)),
    }
}

/// Names chosen by users; `$`-prefixed names are reserved for generated ones
pub(crate) fn validate_name(name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        "name must not be empty"
    } else if name.contains('/') {
        "name must not contain '/'"
    } else if name.starts_with('$') {
        "names starting with '$' are reserved"
    } else if matches!(name, "." | ".." | "*") {
        "name is a selection token"
    } else {
        return Ok(());
    };
    Err(KernelError::invalid_name(name, reason))
}
