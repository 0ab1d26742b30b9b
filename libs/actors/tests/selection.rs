//! Actor Selection Tests

mod common;

use actor_kernel::{
    Actor, ActorError, ActorPath, ActorRef, ActorSystem, AnyMessage, Context, KernelEvent,
    ManualDispatcher, Props,
};
use common::{manual_system, probe, ProbeHandle};
use std::sync::Arc;

/// Spawns the named children, answers `String` messages with its own path
struct Branch {
    children: Vec<&'static str>,
}

impl Actor for Branch {
    fn pre_start(&mut self, ctx: &mut Context<'_>) -> Result<(), ActorError> {
        for name in &self.children {
            ctx.actor_of(Props::new(|| Branch { children: Vec::new() }), *name)?;
        }
        Ok(())
    }

    fn receive(&mut self, ctx: &mut Context<'_>, msg: &AnyMessage) -> Result<(), ActorError> {
        if let Some(expr) = msg.downcast_ref::<Select>() {
            let found = ctx.actor_selection(&expr.0);
            ctx.reply(found.path().clone());
        } else if msg.is::<String>() {
            ctx.reply(ctx.path().clone());
        }
        Ok(())
    }
}

/// Ask a branch to resolve a selection relative to itself
#[derive(Debug, Clone)]
struct Select(String);

fn tree() -> (ActorSystem, Arc<ManualDispatcher>, ProbeHandle) {
    let (system, dispatcher) = manual_system("selection");
    let replies = probe(&system, "replies");
    system
        .actor_of(
            Props::new(|| Branch {
                children: vec!["b", "c"],
            }),
            "a",
        )
        .unwrap();
    dispatcher.run_until_idle();
    (system, dispatcher, replies)
}

#[test]
fn test_exact_selection_reaches_actor() {
    let (system, dispatcher, replies) = tree();

    let b = system.actor_selection("/user/a/b");
    assert!(b.is_local());
    assert_eq!(b.path(), &ActorPath::parse("/user/a/b"));

    b.tell("who".to_string(), &replies.actor);
    dispatcher.run_until_idle();
    assert_eq!(replies.drain_of::<ActorPath>(), vec![ActorPath::parse("/user/a/b")]);
}

#[test]
fn test_wildcard_fans_out() {
    let (system, dispatcher, replies) = tree();

    let all = system.actor_selection("/user/a/*");
    assert_eq!(all.targets().len(), 2);
    all.tell("who".to_string(), &replies.actor);
    dispatcher.run_until_idle();

    let mut paths: Vec<String> = replies
        .drain_of::<ActorPath>()
        .iter()
        .map(ToString::to_string)
        .collect();
    paths.sort();
    assert_eq!(paths, vec!["/user/a/b", "/user/a/c"]);
}

#[test]
fn test_parent_and_root_tokens() {
    let (system, _dispatcher, _replies) = tree();

    assert_eq!(system.actor_selection("/user/a/b/..").path(), &ActorPath::parse("/user/a"));
    assert_eq!(system.actor_selection("/user/a/./user").path(), &ActorPath::parse("/user"));
    assert!(system.actor_selection("/..").path().is_root());
    assert!(system.actor_selection("").path().is_root());
}

#[test]
fn test_relative_selection_from_actor() {
    let (system, dispatcher, replies) = tree();
    let b = system.actor_selection("/user/a/b");

    b.tell(Select("../c".to_string()), &replies.actor);
    b.tell(Select("../../a".to_string()), &replies.actor);
    dispatcher.run_until_idle();

    assert_eq!(
        replies.drain_of::<ActorPath>(),
        vec![ActorPath::parse("/user/a/c"), ActorPath::parse("/user/a")]
    );
}

#[test]
fn test_missing_selection_goes_to_dead_letters() {
    let (system, dispatcher, replies) = tree();
    system.subscribe(replies.actor.clone());

    let missing = system.actor_selection("/user/a/zzz");
    assert!(missing.is_terminated());
    assert_eq!(missing.path(), &ActorPath::parse("/user/a/zzz"));

    missing.tell(7u8, &ActorRef::no_sender());
    dispatcher.run_until_idle();

    let dead: Vec<ActorPath> = replies
        .drain_of::<KernelEvent>()
        .into_iter()
        .filter_map(|event| match event {
            KernelEvent::DeadLetter(letter) => Some(letter.recipient.path().clone()),
            KernelEvent::Unhandled(_) => None,
        })
        .collect();
    assert_eq!(dead, vec![ActorPath::parse("/user/a/zzz")]);
}
