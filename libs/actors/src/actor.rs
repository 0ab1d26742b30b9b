//! Actor Traits
//!
//! [`Actor`] is the state plus initial behavior of one actor instance,
//! [`Behavior`] is a handler that can be pushed over it with
//! `Context::become_behavior`, and [`Props`] is the recipe a cell uses to
//! build (and rebuild on restart) instances.

use crate::context::Context;
use crate::error::ActorError;
use crate::message::AnyMessage;
use crate::supervision::SupervisorStrategy;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// One actor instance
///
/// All methods run inside the actor's own activation, never concurrently.
pub trait Actor: Send + 'static {
    /// Initial behavior; used whenever the behavior stack is empty
    fn receive(&mut self, ctx: &mut Context<'_>, msg: &AnyMessage) -> Result<(), ActorError>;

    /// Called once the instance is constructed; may spawn children
    fn pre_start(&mut self, _ctx: &mut Context<'_>) -> Result<(), ActorError> {
        Ok(())
    }

    /// Called when the actor stops, after all of its children stopped
    fn post_stop(&mut self, _ctx: &mut Context<'_>) {}

    /// Called on the failed instance before it is replaced
    ///
    /// The fresh instance is only built after every child stopped here has
    /// run its own `post_stop`.
    fn pre_restart(&mut self, ctx: &mut Context<'_>, _cause: &ActorError) {
        ctx.stop_all_children();
        self.post_stop(ctx);
    }

    /// Called on the fresh instance after a restart
    fn post_restart(&mut self, ctx: &mut Context<'_>, _cause: &ActorError) -> Result<(), ActorError> {
        self.pre_start(ctx)
    }

    /// Strategy applied to this actor's children; `None` uses the system default
    fn supervisor_strategy(&self) -> Option<SupervisorStrategy> {
        None
    }
}

/// Handler pushed on an actor's behavior stack
pub trait Behavior: Send + 'static {
    fn handle(&mut self, ctx: &mut Context<'_>, msg: &AnyMessage) -> Result<(), ActorError>;
}

/// Behavior built from a closure, see [`behavior_fn`]
pub struct FnBehavior<F>(F);

impl<F> Behavior for FnBehavior<F>
where
    F: FnMut(&mut Context<'_>, &AnyMessage) -> Result<(), ActorError> + Send + 'static,
{
    fn handle(&mut self, ctx: &mut Context<'_>, msg: &AnyMessage) -> Result<(), ActorError> {
        (self.0)(ctx, msg)
    }
}

/// Wrap a closure as a [`Behavior`]
pub fn behavior_fn<F>(handler: F) -> FnBehavior<F>
where
    F: FnMut(&mut Context<'_>, &AnyMessage) -> Result<(), ActorError> + Send + 'static,
{
    FnBehavior(handler)
}

type Handler = Box<dyn FnMut(&mut Context<'_>, &AnyMessage) -> Result<(), ActorError> + Send>;

/// Handler table keyed by message type
///
/// Built once, then every message is resolved with a single `TypeId`
/// lookup. Messages without a handler go to the fallback, or are reported
/// as unhandled.
#[derive(Default)]
pub struct Receive {
    handlers: HashMap<TypeId, Handler>,
    fallback: Option<Handler>,
}

impl Receive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle messages of type `M`
    pub fn on<M, F>(mut self, mut handler: F) -> Self
    where
        M: Any + Send + Sync,
        F: FnMut(&mut Context<'_>, &M) -> Result<(), ActorError> + Send + 'static,
    {
        let erased: Handler = Box::new(move |ctx: &mut Context<'_>, msg: &AnyMessage| {
            match (**msg).downcast_ref::<M>() {
                Some(typed) => handler(ctx, typed),
                None => {
                    ctx.unhandled();
                    Ok(())
                }
            }
        });
        self.handlers.insert(TypeId::of::<M>(), erased);
        self
    }

    /// Handle every message no typed handler matched
    pub fn otherwise<F>(mut self, handler: F) -> Self
    where
        F: FnMut(&mut Context<'_>, &AnyMessage) -> Result<(), ActorError> + Send + 'static,
    {
        self.fallback = Some(Box::new(handler));
        self
    }

    pub fn handles<M: Any>(&self) -> bool {
        self.handlers.contains_key(&TypeId::of::<M>())
    }

    pub fn dispatch(&mut self, ctx: &mut Context<'_>, msg: &AnyMessage) -> Result<(), ActorError> {
        if let Some(handler) = self.handlers.get_mut(&(**msg).type_id()) {
            return handler(ctx, msg);
        }
        match self.fallback.as_mut() {
            Some(fallback) => fallback(ctx, msg),
            None => {
                ctx.unhandled();
                Ok(())
            }
        }
    }
}

impl Behavior for Receive {
    fn handle(&mut self, ctx: &mut Context<'_>, msg: &AnyMessage) -> Result<(), ActorError> {
        self.dispatch(ctx, msg)
    }
}

impl Actor for Receive {
    fn receive(&mut self, ctx: &mut Context<'_>, msg: &AnyMessage) -> Result<(), ActorError> {
        self.dispatch(ctx, msg)
    }
}

impl fmt::Debug for Receive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Receive")
            .field("handlers", &self.handlers.len())
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

/// Builds actor instances
pub type ActorFactory = Arc<dyn Fn() -> Result<Box<dyn Actor>, ActorError> + Send + Sync>;

/// Recipe for an actor: factory plus deployment options
#[derive(Clone)]
pub struct Props {
    factory: ActorFactory,
    dispatcher_id: Option<String>,
    router_config: Option<Arc<dyn Any + Send + Sync>>,
}

impl Props {
    /// Props from an infallible constructor
    pub fn new<A, F>(factory: F) -> Self
    where
        A: Actor,
        F: Fn() -> A + Send + Sync + 'static,
    {
        Self::from_factory(Arc::new(move || {
            Ok::<_, ActorError>(Box::new(factory()) as Box<dyn Actor>)
        }))
    }

    /// Props from a constructor that can fail; a failure is an initialization fault
    pub fn try_new<A, F>(factory: F) -> Self
    where
        A: Actor,
        F: Fn() -> Result<A, ActorError> + Send + Sync + 'static,
    {
        Self::from_factory(Arc::new(move || factory().map(|a| Box::new(a) as Box<dyn Actor>)))
    }

    pub fn from_factory(factory: ActorFactory) -> Self {
        Self {
            factory,
            dispatcher_id: None,
            router_config: None,
        }
    }

    /// Run on the dispatcher registered under `id`
    pub fn with_dispatcher(mut self, id: impl Into<String>) -> Self {
        self.dispatcher_id = Some(id.into());
        self
    }

    /// Attach an opaque routing configuration for an external router
    pub fn with_router_config<R: Any + Send + Sync>(mut self, config: R) -> Self {
        self.router_config = Some(Arc::new(config));
        self
    }

    pub fn dispatcher_id(&self) -> Option<&str> {
        self.dispatcher_id.as_deref()
    }

    pub fn router_config<R: Any>(&self) -> Option<&R> {
        self.router_config.as_deref().and_then(|c| c.downcast_ref::<R>())
    }

    pub(crate) fn create(&self) -> Result<Box<dyn Actor>, ActorError> {
        (self.factory)()
    }
}

impl fmt::Debug for Props {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Props")
            .field("dispatcher_id", &self.dispatcher_id)
            .field("router_config", &self.router_config.is_some())
            .finish()
    }
}
