//! Actor System
//!
//! Owns the dispatcher registry, the event stream, the metrics and the
//! guardian tree:
//!
//! ```text
//! /                root guardian (escalates everything; its failure is fatal)
//! ├── deadLetters  sink for undeliverable messages
//! ├── user         parent of every actor created with `ActorSystem::actor_of`
//! ├── system       parent of kernel-level actors
//! └── temp         future actors of pending asks
//! ```
//!
//! `shutdown` stops the root, which stops the whole tree bottom-up. Once the
//! root has stopped the dispatchers are shut down and `terminated` resolves.
//! Dropping the last `ActorSystem` handle without `shutdown` shuts the
//! dispatchers down and detaches the tree instead; no `post_stop` runs then.
//!
//! # Lock Ordering
//!
//! A cell's `state` may be held while taking any `children` lock; a
//! `children` lock is never held while taking another lock.

use crate::actor::{Actor, Props};
use crate::actor_ref::ActorRef;
use crate::ask::{self, AskFuture};
use crate::cell::{ActorCell, CellRole};
use crate::context::{current_actor, Context};
use crate::dispatcher::{Dispatcher, Dispatchers};
use crate::error::{ActorError, KernelError, Result};
use crate::event_stream::{DeadLetter, DeadLetterActor, EventStream};
use crate::message::{AnyMessage, Message, SystemMessage};
use crate::metrics::{MetricsSnapshot, SystemMetrics};
use crate::path::ActorPath;
use crate::selection;
use crate::supervision::SupervisorStrategy;
use kernel_config::KernelSettings;
use once_cell::sync::OnceCell;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Well-known top-level actors
struct Guardians {
    root: ActorRef,
    user: ActorRef,
    system: ActorRef,
    temp: ActorRef,
    dead_letters: ActorRef,
}

/// Shared state of one actor system; cells keep a weak reference to it
pub(crate) struct SystemInner {
    pub(crate) name: String,
    pub(crate) uid: Uuid,
    pub(crate) settings: KernelSettings,
    pub(crate) dispatchers: Dispatchers,
    pub(crate) event_stream: Arc<EventStream>,
    pub(crate) metrics: Arc<SystemMetrics>,
    guardians: OnceCell<Guardians>,
    terminated: watch::Sender<bool>,
}

impl SystemInner {
    pub(crate) fn root(&self) -> Option<ActorRef> {
        self.guardians.get().map(|g| g.root.clone())
    }

    pub(crate) fn dead_letters(&self) -> Option<ActorRef> {
        self.guardians.get().map(|g| g.dead_letters.clone())
    }

    pub(crate) fn temp_guardian(&self) -> Option<Arc<ActorCell>> {
        self.guardians
            .get()
            .and_then(|g| g.temp.local_cell().cloned())
    }

    /// An escalation reached the root guardian
    pub(crate) fn fatal(&self, fault: &ActorError) {
        error!(
            system = %self.name,
            category = fault.root_cause().category(),
            error = %fault,
            "Unhandled failure reached the root guardian, shutting down"
        );
        self.shutdown();
    }

    pub(crate) fn shutdown(&self) {
        if let Some(root) = self.root() {
            root.send_system(SystemMessage::StopChild, &ActorRef::no_sender());
        }
    }

    pub(crate) fn on_root_stopped(&self) {
        info!(system = %self.name, uid = %self.uid, "Actor system terminated");
        self.terminated.send_replace(true);
        self.dispatchers.shutdown_all();
    }
}

impl Drop for SystemInner {
    /// Last handle gone without `shutdown`: stop the workers and break the
    /// parent/child reference cycles so the cells can be freed
    fn drop(&mut self) {
        if *self.terminated.borrow() {
            return;
        }
        debug!(system = %self.name, "Actor system dropped without shutdown");
        self.dispatchers.shutdown_all();
        if let Some(root) = self.root() {
            if let Some(cell) = root.local_cell() {
                cell.detach_tree();
            }
        }
    }
}

/// Top of the tree; any failure below it that gets this far is fatal
struct RootGuardian;

impl Actor for RootGuardian {
    fn receive(&mut self, ctx: &mut Context<'_>, _msg: &AnyMessage) -> std::result::Result<(), ActorError> {
        ctx.unhandled();
        Ok(())
    }

    fn supervisor_strategy(&self) -> Option<SupervisorStrategy> {
        Some(SupervisorStrategy::escalate_all())
    }
}

/// `/user`, `/system` and `/temp`
struct Guardian {
    strategy: Option<SupervisorStrategy>,
}

impl Actor for Guardian {
    fn receive(&mut self, ctx: &mut Context<'_>, _msg: &AnyMessage) -> std::result::Result<(), ActorError> {
        ctx.unhandled();
        Ok(())
    }

    fn supervisor_strategy(&self) -> Option<SupervisorStrategy> {
        self.strategy.clone()
    }
}

/// Builder for [`ActorSystem`]
pub struct ActorSystemBuilder {
    settings: KernelSettings,
    default_dispatcher: Option<Arc<dyn Dispatcher>>,
    dispatchers: HashMap<String, Arc<dyn Dispatcher>>,
    guardian_strategy: Option<SupervisorStrategy>,
}

impl ActorSystemBuilder {
    pub fn new() -> Self {
        Self {
            settings: KernelSettings::default(),
            default_dispatcher: None,
            dispatchers: HashMap::new(),
            guardian_strategy: None,
        }
    }

    pub fn settings(mut self, settings: KernelSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.settings.system_name = name.into();
        self
    }

    /// Use `dispatcher` instead of a thread pool built from settings
    pub fn default_dispatcher(mut self, dispatcher: Arc<dyn Dispatcher>) -> Self {
        self.default_dispatcher = Some(dispatcher);
        self
    }

    /// Register a named dispatcher for `Props::with_dispatcher(id)`
    pub fn dispatcher(mut self, id: impl Into<String>, dispatcher: Arc<dyn Dispatcher>) -> Self {
        self.dispatchers.insert(id.into(), dispatcher);
        self
    }

    /// Strategy `/user` applies to top-level actors
    pub fn guardian_strategy(mut self, strategy: SupervisorStrategy) -> Self {
        self.guardian_strategy = Some(strategy);
        self
    }

    pub fn build(self) -> Result<ActorSystem> {
        self.settings
            .validate()
            .map_err(|e| KernelError::configuration(format!("{:#}", e), None))?;

        let dispatchers =
            Dispatchers::from_settings(&self.settings, self.default_dispatcher, self.dispatchers)?;
        let (terminated, _) = watch::channel(false);
        let inner = Arc::new(SystemInner {
            name: self.settings.system_name.clone(),
            uid: Uuid::new_v4(),
            event_stream: Arc::new(EventStream::new()),
            metrics: Arc::new(SystemMetrics::default()),
            settings: self.settings,
            dispatchers,
            guardians: OnceCell::new(),
            terminated,
        });

        let root_cell = Arc::new(ActorCell::new(
            ActorPath::root(),
            ActorRef::no_sender(),
            Props::new(|| RootGuardian),
            Arc::downgrade(&inner),
            Arc::clone(inner.dispatchers.default_dispatcher()),
            CellRole::Root,
        ));
        root_cell.start();
        let root = ActorRef::local(Arc::clone(&root_cell));

        let dead_letters = {
            let stream = Arc::clone(&inner.event_stream);
            let metrics = Arc::clone(&inner.metrics);
            let log = inner.settings.log_dead_letters;
            root_cell.spawn_with_role(
                Props::new(move || DeadLetterActor::new(Arc::clone(&stream), Arc::clone(&metrics), log)),
                "deadLetters".to_string(),
                CellRole::DeadLetters,
            )?
        };
        let guardian = |strategy: Option<SupervisorStrategy>| {
            Props::new(move || Guardian {
                strategy: strategy.clone(),
            })
        };
        let user = root_cell.spawn_with_role(guardian(self.guardian_strategy), "user".to_string(), CellRole::Ordinary)?;
        let system = root_cell.spawn_with_role(guardian(None), "system".to_string(), CellRole::Ordinary)?;
        let temp = root_cell.spawn_with_role(guardian(None), "temp".to_string(), CellRole::Ordinary)?;

        let guardians = Guardians {
            root,
            user,
            system,
            temp,
            dead_letters,
        };
        if inner.guardians.set(guardians).is_err() {
            return Err(KernelError::configuration("guardians initialised twice", None));
        }

        info!(system = %inner.name, uid = %inner.uid, "Actor system started");
        Ok(ActorSystem { inner })
    }
}

impl Default for ActorSystemBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a running actor system
#[derive(Clone)]
pub struct ActorSystem {
    inner: Arc<SystemInner>,
}

impl ActorSystem {
    /// Start a system with default settings under `name`
    pub fn new(name: impl Into<String>) -> Result<Self> {
        Self::builder().name(name).build()
    }

    pub fn with_settings(settings: KernelSettings) -> Result<Self> {
        Self::builder().settings(settings).build()
    }

    pub fn builder() -> ActorSystemBuilder {
        ActorSystemBuilder::new()
    }

    pub(crate) fn from_inner(inner: Arc<SystemInner>) -> Self {
        Self { inner }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Unique id of this system instance
    pub fn uid(&self) -> Uuid {
        self.inner.uid
    }

    pub fn settings(&self) -> &KernelSettings {
        &self.inner.settings
    }

    fn guardians(&self) -> Result<&Guardians> {
        self.inner
            .guardians
            .get()
            .ok_or_else(|| KernelError::system_terminated(self.inner.name.clone()))
    }

    fn spawn_under<'n>(&self, guardian: &ActorRef, props: Props, name: impl Into<Option<&'n str>>) -> Result<ActorRef> {
        let cell = guardian
            .local_cell()
            .ok_or_else(|| KernelError::system_terminated(self.inner.name.clone()))?;
        let actor = cell.spawn_child(props, name.into())?;
        debug!(actor_path = %actor.path(), "Actor spawned");
        Ok(actor)
    }

    /// Create a top-level actor under `/user`; `None` picks a generated name
    pub fn actor_of<'n>(&self, props: Props, name: impl Into<Option<&'n str>>) -> Result<ActorRef> {
        let user = self.guardians()?.user.clone();
        self.spawn_under(&user, props, name)
    }

    /// Create a kernel-level actor under `/system`
    pub fn system_actor_of<'n>(&self, props: Props, name: impl Into<Option<&'n str>>) -> Result<ActorRef> {
        let system = self.guardians()?.system.clone();
        self.spawn_under(&system, props, name)
    }

    /// Resolve a selection anchored at the root guardian
    pub fn actor_selection(&self, expr: &str) -> ActorRef {
        match self.root() {
            Some(root) => selection::select(&self.inner, root, expr),
            None => ActorRef::no_sender(),
        }
    }

    pub fn root(&self) -> Option<ActorRef> {
        self.inner.root()
    }

    pub fn user_guardian(&self) -> Option<ActorRef> {
        self.inner.guardians.get().map(|g| g.user.clone())
    }

    pub fn dead_letters(&self) -> Option<ActorRef> {
        self.inner.dead_letters()
    }

    /// Ask `target`; from inside an actor the answer is completed on its mailbox
    pub fn ask<M: Any + Send + Sync>(&self, target: &ActorRef, msg: M) -> AskFuture {
        let respond_to = current_actor().unwrap_or_else(ActorRef::no_sender);
        ask::ask_with(&self.inner, target, Message::from_value(msg), respond_to)
    }

    /// Ask with a deadline; `None` uses the configured default
    pub async fn ask_timeout<M: Any + Send + Sync>(
        &self,
        target: &ActorRef,
        msg: M,
        timeout: Option<Duration>,
    ) -> Result<AnyMessage> {
        let timeout = timeout.unwrap_or_else(|| self.inner.settings.ask.timeout());
        self.ask(target, msg).with_timeout(timeout).await
    }

    /// Hand a message arriving from a remote transport to the local actor at `target`
    ///
    /// Unknown targets are reported as dead letters.
    pub fn deliver_inbound(&self, target: &ActorPath, message: Message, sender: ActorRef) {
        match self.resolve_local(target) {
            Some(actor) => actor.send_message(message, &sender),
            None => {
                debug!(target = %target, sender = %sender.path(), "Inbound message for unknown actor");
                if let Some(dead_letters) = self.dead_letters() {
                    let recipient = ActorRef::unresolved(target.clone(), dead_letters.clone());
                    dead_letters.tell(
                        DeadLetter {
                            message,
                            sender,
                            recipient,
                        },
                        &ActorRef::no_sender(),
                    );
                }
            }
        }
    }

    /// Live local actor at `path`
    pub fn resolve_local(&self, path: &ActorPath) -> Option<ActorRef> {
        let mut current = self.root()?;
        for segment in path.segments() {
            let next = current.local_cell()?.child(segment)?;
            current = next;
        }
        Some(current)
    }

    pub fn event_stream(&self) -> &Arc<EventStream> {
        &self.inner.event_stream
    }

    /// Receive `KernelEvent`s (dead letters, unhandled messages) at `subscriber`
    pub fn subscribe(&self, subscriber: ActorRef) {
        self.inner.event_stream.subscribe(subscriber);
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    /// Stop an actor from outside the tree
    pub fn stop(&self, actor: &ActorRef) {
        actor.send_system(SystemMessage::PoisonPill, &ActorRef::no_sender());
    }

    /// Stop every actor, then the dispatchers
    pub fn shutdown(&self) {
        info!(system = %self.inner.name, "Actor system shutting down");
        self.inner.shutdown();
    }

    /// Resolves once the root guardian has stopped
    pub async fn terminated(&self) {
        let mut rx = self.inner.terminated.subscribe();
        // The sender lives as long as `self`
        let _ = rx.wait_for(|terminated| *terminated).await;
    }

    pub fn is_terminated(&self) -> bool {
        *self.inner.terminated.borrow()
    }
}

impl fmt::Debug for ActorSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorSystem")
            .field("name", &self.inner.name)
            .field("uid", &self.inner.uid)
            .field("terminated", &self.is_terminated())
            .finish()
    }
}
