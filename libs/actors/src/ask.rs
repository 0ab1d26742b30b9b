//! Ask Pattern
//!
//! `ask` spawns a short-lived future actor under `/temp` and sends the
//! question with it as sender. The first message the future actor receives
//! is the answer: it stops itself and hands a completion closure to the
//! asker. When the asker is an actor the closure runs inside the asker's own
//! activation (via `CompleteFuture`), so the result never races with the
//! asker's state; from outside any actor it runs immediately.

use crate::actor::{behavior_fn, Actor, Props};
use crate::actor_ref::ActorRef;
use crate::context::Context;
use crate::error::{ActorError, KernelError, Result};
use crate::message::{AnyMessage, Completion, Message, SystemMessage};
use crate::path::ActorPath;
use crate::system::SystemInner;
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::debug;

/// Write-once result cell shared by the future actor and its props
#[derive(Clone)]
struct ResultSlot {
    sender: Arc<Mutex<Option<oneshot::Sender<AnyMessage>>>>,
}

impl ResultSlot {
    fn new() -> (Self, oneshot::Receiver<AnyMessage>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                sender: Arc::new(Mutex::new(Some(tx))),
            },
            rx,
        )
    }

    fn take(&self) -> Option<oneshot::Sender<AnyMessage>> {
        self.sender.lock().take()
    }
}

/// Body of a `/temp/$n` actor
struct FutureActor {
    slot: ResultSlot,
    respond_to: ActorRef,
}

impl Actor for FutureActor {
    fn receive(&mut self, ctx: &mut Context<'_>, msg: &AnyMessage) -> std::result::Result<(), ActorError> {
        let Some(tx) = self.slot.take() else {
            return Ok(());
        };

        // Late or duplicate answers are swallowed until the stop completes
        ctx.become_behavior(behavior_fn(|_ctx, _msg| Ok(())));
        ctx.stop_self();

        let reply = Arc::clone(msg);
        let completion = Completion::new(move || {
            // The asker may have given up already
            let _ = tx.send(reply);
        });
        if self.respond_to.is_no_sender() {
            completion.run();
        } else {
            self.respond_to
                .send_system(SystemMessage::CompleteFuture(completion), &ctx.self_ref());
        }
        Ok(())
    }

    fn post_stop(&mut self, ctx: &mut Context<'_>) {
        // Dropping an unused sender cancels the waiting AskFuture
        if self.slot.take().is_some() {
            debug!(actor_path = %ctx.path(), "Ask abandoned without answer");
        }
    }
}

enum AskState {
    Waiting(oneshot::Receiver<AnyMessage>),
    Failed(KernelError),
    Done,
}

/// Pending answer of an `ask`
///
/// Resolves to the first message sent back to the future actor. Dropping it
/// does not cancel the question; use [`AskFuture::with_timeout`] to bound it.
pub struct AskFuture {
    target: ActorPath,
    state: AskState,
    future_actor: Option<ActorRef>,
}

impl AskFuture {
    /// An ask that could not be started
    pub(crate) fn failed(target: ActorPath, error: KernelError) -> Self {
        Self {
            target,
            state: AskState::Failed(error),
            future_actor: None,
        }
    }

    /// Path of the actor that was asked
    pub fn target(&self) -> &ActorPath {
        &self.target
    }

    /// Reference to the `/temp` actor collecting the answer
    pub fn future_actor(&self) -> Option<&ActorRef> {
        self.future_actor.as_ref()
    }

    /// Take the answer if it already arrived, without waiting
    pub fn try_take(&mut self) -> Option<Result<AnyMessage>> {
        match std::mem::replace(&mut self.state, AskState::Done) {
            AskState::Waiting(mut rx) => match rx.try_recv() {
                Ok(reply) => Some(Ok(reply)),
                Err(oneshot::error::TryRecvError::Empty) => {
                    self.state = AskState::Waiting(rx);
                    None
                }
                Err(oneshot::error::TryRecvError::Closed) => {
                    Some(Err(KernelError::ask_cancelled(self.target.to_string())))
                }
            },
            AskState::Failed(error) => Some(Err(error)),
            AskState::Done => None,
        }
    }

    /// Wait at most `timeout`; on expiry the future actor is stopped
    pub async fn with_timeout(self, timeout: Duration) -> Result<AnyMessage> {
        let target = self.target.to_string();
        let future_actor = self.future_actor.clone();
        match tokio::time::timeout(timeout, self).await {
            Ok(outcome) => outcome,
            Err(_) => {
                if let Some(future_actor) = future_actor {
                    future_actor.send_system(SystemMessage::PoisonPill, &ActorRef::no_sender());
                }
                Err(KernelError::ask_timeout(target, timeout.as_millis() as u64))
            }
        }
    }

    /// Block the calling thread until the answer arrives
    ///
    /// Must not be called from an async context or from inside an actor.
    pub fn blocking_wait(self) -> Result<AnyMessage> {
        match self.state {
            AskState::Waiting(rx) => rx
                .blocking_recv()
                .map_err(|_| KernelError::ask_cancelled(self.target.to_string())),
            AskState::Failed(error) => Err(error),
            AskState::Done => Err(KernelError::ask_cancelled(self.target.to_string())),
        }
    }
}

impl Future for AskFuture {
    type Output = Result<AnyMessage>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        let outcome = match &mut this.state {
            AskState::Waiting(rx) => match Pin::new(rx).poll(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Ok(reply)) => Ok(reply),
                Poll::Ready(Err(_)) => Err(KernelError::ask_cancelled(this.target.to_string())),
            },
            AskState::Failed(error) => Err(error.clone()),
            AskState::Done => Err(KernelError::ask_cancelled(this.target.to_string())),
        };
        this.state = AskState::Done;
        Poll::Ready(outcome)
    }
}

impl std::fmt::Debug for AskFuture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.state {
            AskState::Waiting(_) => "waiting",
            AskState::Failed(_) => "failed",
            AskState::Done => "done",
        };
        f.debug_struct("AskFuture")
            .field("target", &self.target)
            .field("state", &state)
            .finish()
    }
}

/// Spawn a future actor and send `message` to `target` on its behalf
pub(crate) fn ask_with(
    system: &Arc<SystemInner>,
    target: &ActorRef,
    message: Message,
    respond_to: ActorRef,
) -> AskFuture {
    let (slot, rx) = ResultSlot::new();
    let props = {
        let slot = slot.clone();
        let respond_to = respond_to.clone();
        Props::new(move || FutureActor {
            slot: slot.clone(),
            respond_to: respond_to.clone(),
        })
    };

    let spawned = system
        .temp_guardian()
        .ok_or_else(|| KernelError::system_terminated(system.name.clone()))
        .and_then(|temp| temp.spawn_child(props, None));
    let future_actor = match spawned {
        Ok(future_actor) => future_actor,
        Err(error) => return AskFuture::failed(target.path().clone(), error),
    };

    debug!(target = %target.path(), future_actor = %future_actor.path(), "Ask started");
    target.send_message(message, &future_actor);

    AskFuture {
        target: target.path().clone(),
        state: AskState::Waiting(rx),
        future_actor: Some(future_actor),
    }
}
