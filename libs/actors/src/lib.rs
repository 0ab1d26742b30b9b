//! Actor Execution Kernel
//!
//! Hierarchical actors with mailboxes, pluggable dispatchers, one-for-one
//! supervision, death watch and the ask pattern.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐ tell  ┌──────────────────────────┐ schedule ┌──────────────┐
//! │  ActorRef    │──────▶│ Mailbox                  │─────────▶│  Dispatcher  │
//! │ local/remote │       │  system queue (priority) │  (once   │ thread pool, │
//! └──────────────┘       │  user queue   (FIFO)     │  per     │ tokio, manual│
//!                        │  IDLE/BUSY flag          │  burst)  └──────┬───────┘
//!                        └──────────────────────────┘                 │ drain
//!                                                        ┌────────────▼───────┐
//!                                                        │ ActorCell          │
//!                                                        │  system dispatch   │
//!                                                        │  behavior stack    │
//!                                                        │  faults → parent   │
//!                                                        └────────────────────┘
//! ```
//!
//! Each actor processes at most one message at a time; different actors run
//! in parallel on their dispatcher. Faults (errors and panics) raised by an
//! actor never escape its cell: they become `SuperviseChild` requests to the
//! parent, whose [`SupervisorStrategy`] answers resume, restart, stop or
//! escalate.
//!
//! # Examples
//!
//! ```rust
//! use actor_kernel::{ActorSystem, ManualDispatcher, Props, Receive};
//! use std::sync::Arc;
//!
//! let dispatcher = Arc::new(ManualDispatcher::new("manual", 10));
//! let system = ActorSystem::builder()
//!     .name("demo")
//!     .default_dispatcher(dispatcher.clone())
//!     .build()?;
//!
//! let greeter = system.actor_of(
//!     Props::new(|| {
//!         Receive::new().on(|ctx, name: &String| {
//!             ctx.reply(format!("hello {}", name));
//!             Ok(())
//!         })
//!     }),
//!     "greeter",
//! )?;
//!
//! let mut answer = system.ask(&greeter, "world".to_string());
//! dispatcher.run_until_idle();
//! let reply = answer.try_take().expect("answered")?;
//! assert_eq!(reply.downcast_ref::<String>().map(String::as_str), Some("hello world"));
//!
//! system.shutdown();
//! dispatcher.run_until_idle();
//! assert!(system.is_terminated());
//! # Ok::<(), actor_kernel::KernelError>(())
//! ```

pub mod actor;
pub mod actor_ref;
pub mod ask;
mod cell;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod event_stream;
pub mod mailbox;
pub mod message;
pub mod metrics;
pub mod path;
mod selection;
pub mod supervision;
pub mod system;

pub use actor::{behavior_fn, Actor, ActorFactory, Behavior, FnBehavior, Props, Receive};
pub use actor_ref::{ActorRef, RemoteTransport};
pub use ask::AskFuture;
pub use context::{current_actor, Context};
pub use dispatcher::{
    Dispatcher, Dispatchers, ManualDispatcher, ThreadPoolDispatcher, TokioDispatcher, Work,
};
pub use error::{ActorError, KernelError, Result};
pub use event_stream::{DeadLetter, EventStream, KernelEvent, UnhandledMessage};
pub use mailbox::{Admission, Mailbox};
pub use message::{
    ActorIdentity, AnyMessage, Completion, Envelope, Message, Pong, SystemMessage, Terminated,
};
pub use metrics::{MetricsSnapshot, SystemMetrics};
pub use path::{ActorPath, PathElement};
pub use supervision::{default_decider, Decider, Directive, SupervisorStrategy};
pub use system::{ActorSystem, ActorSystemBuilder};

pub use kernel_config::{DispatcherKind, DispatcherSettings, KernelSettings, SupervisionSettings};
