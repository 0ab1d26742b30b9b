//! Shared helpers for kernel integration tests
#![allow(dead_code)]

use actor_kernel::{
    Actor, ActorError, ActorRef, ActorSystem, AnyMessage, Context, ManualDispatcher, Props,
    SupervisorStrategy,
};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;

/// System whose drains only run when the test says so
pub fn manual_system(name: &str) -> (ActorSystem, Arc<ManualDispatcher>) {
    manual_system_with(name, None)
}

pub fn manual_system_with(
    name: &str,
    guardian_strategy: Option<SupervisorStrategy>,
) -> (ActorSystem, Arc<ManualDispatcher>) {
    kernel_config::init_test_tracing();
    let dispatcher = Arc::new(ManualDispatcher::new("manual", 10));
    let mut builder = ActorSystem::builder()
        .name(name)
        .default_dispatcher(dispatcher.clone());
    if let Some(strategy) = guardian_strategy {
        builder = builder.guardian_strategy(strategy);
    }
    let system = builder.build().expect("system starts");
    dispatcher.run_until_idle();
    (system, dispatcher)
}

/// Forwards every user message to a channel the test reads
pub struct Probe {
    tx: Sender<AnyMessage>,
}

impl Actor for Probe {
    fn receive(&mut self, _ctx: &mut Context<'_>, msg: &AnyMessage) -> Result<(), ActorError> {
        let _ = self.tx.send(Arc::clone(msg));
        Ok(())
    }
}

pub struct ProbeHandle {
    pub actor: ActorRef,
    rx: Receiver<AnyMessage>,
}

impl ProbeHandle {
    /// Everything received so far
    pub fn drain(&self) -> Vec<AnyMessage> {
        self.rx.try_iter().collect()
    }

    /// Received messages of type `M`, others are discarded
    pub fn drain_of<M: Clone + Send + Sync + 'static>(&self) -> Vec<M> {
        self.drain()
            .into_iter()
            .filter_map(|msg| msg.downcast_ref::<M>().cloned())
            .collect()
    }

    /// Wait for one message of type `M` (for real thread pools)
    pub fn expect<M: Clone + Send + Sync + 'static>(&self, timeout: Duration) -> M {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            let left = deadline.saturating_duration_since(std::time::Instant::now());
            let msg = self.rx.recv_timeout(left).expect("probe timed out");
            if let Some(typed) = msg.downcast_ref::<M>() {
                return typed.clone();
            }
        }
    }
}

pub fn probe(system: &ActorSystem, name: &str) -> ProbeHandle {
    let (tx, rx) = unbounded();
    let actor = system
        .actor_of(Props::new(move || Probe { tx: tx.clone() }), name)
        .expect("probe spawns");
    ProbeHandle { actor, rx }
}

/// Poll `condition` until it holds or `timeout` passes
pub fn eventually(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = std::time::Instant::now() + timeout;
    while std::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}
