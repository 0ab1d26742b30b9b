//! Child Stop and Restart Ordering Tests
//!
//! A child asked to stop keeps its name until it has run `post_stop`; a
//! stopping parent finishes after every such child, and a restarting parent
//! builds its fresh instance only after the old children are gone.

mod common;

use actor_kernel::{Actor, ActorError, ActorRef, AnyMessage, Context, Props};
use common::{manual_system, probe};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

type Log = Arc<Mutex<Vec<String>>>;

/// Numbers its instances and logs their start and stop
struct Worker {
    instances: Arc<AtomicUsize>,
    id: usize,
    log: Log,
}

impl Actor for Worker {
    fn pre_start(&mut self, _ctx: &mut Context<'_>) -> Result<(), ActorError> {
        self.id = self.instances.fetch_add(1, Ordering::SeqCst) + 1;
        self.log.lock().push(format!("child#{} pre_start", self.id));
        Ok(())
    }

    fn receive(&mut self, _ctx: &mut Context<'_>, _msg: &AnyMessage) -> Result<(), ActorError> {
        Ok(())
    }

    fn post_stop(&mut self, _ctx: &mut Context<'_>) {
        self.log.lock().push(format!("child#{} post_stop", self.id));
    }
}

#[derive(Debug, Clone, Copy)]
enum Cmd {
    Fail,
    Replace,
    Spawn,
    StopBoth,
}

/// Owns one `Worker` named "w"
struct Host {
    instances: Arc<AtomicUsize>,
    log: Log,
}

impl Host {
    fn worker(&self) -> Props {
        let (instances, log) = (self.instances.clone(), self.log.clone());
        Props::new(move || Worker {
            instances: instances.clone(),
            id: 0,
            log: log.clone(),
        })
    }
}

impl Actor for Host {
    fn pre_start(&mut self, ctx: &mut Context<'_>) -> Result<(), ActorError> {
        ctx.actor_of(self.worker(), "w")?;
        Ok(())
    }

    fn receive(&mut self, ctx: &mut Context<'_>, msg: &AnyMessage) -> Result<(), ActorError> {
        match msg.downcast_ref::<Cmd>() {
            Some(Cmd::Fail) => return Err(ActorError::application("host failure")),
            Some(Cmd::Replace) => {
                if let Some(old) = ctx.child("w") {
                    ctx.stop(&old);
                }
                let outcome = match ctx.actor_of(self.worker(), "w") {
                    Ok(_) => "spawned".to_string(),
                    Err(err) => err.category().to_string(),
                };
                ctx.reply(outcome);
            }
            Some(Cmd::Spawn) => {
                let outcome = match ctx.actor_of(self.worker(), "w") {
                    Ok(_) => "spawned".to_string(),
                    Err(err) => err.category().to_string(),
                };
                ctx.reply(outcome);
            }
            Some(Cmd::StopBoth) => {
                if let Some(w) = ctx.child("w") {
                    ctx.stop(&w);
                }
                ctx.stop_self();
            }
            None => ctx.unhandled(),
        }
        Ok(())
    }

    fn post_stop(&mut self, _ctx: &mut Context<'_>) {
        self.log.lock().push("parent post_stop".to_string());
    }
}

fn host_props(log: &Log) -> Props {
    let instances = Arc::new(AtomicUsize::new(0));
    let log = log.clone();
    Props::new(move || Host {
        instances: instances.clone(),
        log: log.clone(),
    })
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().clone()
}

#[test]
fn test_restart_builds_new_children_after_old_ones_stopped() {
    let (system, dispatcher) = manual_system("restart-order");
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let host = system.actor_of(host_props(&log), "host").unwrap();
    dispatcher.run_until_idle();
    let first = system.actor_selection("/user/host/w");

    host.tell(Cmd::Fail, &ActorRef::no_sender());
    dispatcher.run_until_idle();

    assert_eq!(
        entries(&log),
        vec![
            "child#1 pre_start",
            "parent post_stop",
            "child#1 post_stop",
            "child#2 pre_start",
        ]
    );
    let second = system.actor_selection("/user/host/w");
    assert!(first.is_terminated());
    assert!(!second.is_terminated());
    assert_eq!(second.path(), first.path());
    assert_eq!(system.metrics().actor_restarts, 1);
}

#[test]
fn test_user_messages_wait_for_deferred_restart() {
    let (system, dispatcher) = manual_system("restart-stash");
    let replies = probe(&system, "replies");
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let host = system.actor_of(host_props(&log), "host").unwrap();
    dispatcher.run_until_idle();

    host.tell(Cmd::Fail, &ActorRef::no_sender());
    assert!(dispatcher.run_next(), "host handles the failure");
    assert!(dispatcher.run_next(), "guardian orders the restart");

    // Arrives while the restart waits for the old child to stop
    host.tell(Cmd::Spawn, &replies.actor);
    dispatcher.run_until_idle();

    // Replayed on the fresh instance, which already owns a new "w"
    assert_eq!(replies.drain_of::<String>(), vec!["name_taken".to_string()]);
    assert_eq!(system.metrics().dead_letters, 0);
    assert_eq!(
        entries(&log),
        vec![
            "child#1 pre_start",
            "parent post_stop",
            "child#1 post_stop",
            "child#2 pre_start",
        ]
    );
}

#[test]
fn test_name_reserved_until_child_stopped() {
    let (system, dispatcher) = manual_system("reserved");
    let replies = probe(&system, "replies");
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let host = system.actor_of(host_props(&log), "host").unwrap();
    dispatcher.run_until_idle();
    let old = system.actor_selection("/user/host/w");

    host.tell(Cmd::Replace, &replies.actor);
    dispatcher.run_until_idle();
    assert_eq!(replies.drain_of::<String>(), vec!["name_taken".to_string()]);
    assert!(old.is_terminated());
    assert!(system.actor_selection("/user/host/w").is_terminated());

    host.tell(Cmd::Spawn, &replies.actor);
    dispatcher.run_until_idle();
    assert_eq!(replies.drain_of::<String>(), vec!["spawned".to_string()]);
    assert_eq!(
        entries(&log),
        vec!["child#1 pre_start", "child#1 post_stop", "child#2 pre_start"]
    );
}

#[test]
fn test_stopping_parent_waits_for_child_it_already_stopped() {
    let (system, dispatcher) = manual_system("stop-order");
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let host = system.actor_of(host_props(&log), "host").unwrap();
    dispatcher.run_until_idle();

    host.tell(Cmd::StopBoth, &ActorRef::no_sender());
    dispatcher.run_until_idle();

    assert_eq!(
        entries(&log),
        vec!["child#1 pre_start", "child#1 post_stop", "parent post_stop"]
    );
    assert!(host.is_terminated());
}
