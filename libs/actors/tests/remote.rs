//! Remote Boundary Tests
//!
//! Two systems in one process joined by a loopback transport. Outbound
//! messages leave through `RemoteTransport::deliver`; the receiving side
//! re-enters through `ActorSystem::deliver_inbound`, with the sender
//! rewritten to a remote reference pointing back at the origin.

mod common;

use actor_kernel::{
    ActorPath, ActorRef, ActorSystem, KernelEvent, Message, Props, Receive, RemoteTransport,
};
use common::{manual_system, probe};
use once_cell::sync::OnceCell;
use std::sync::Arc;

struct Loopback {
    peer: ActorSystem,
    back: OnceCell<Arc<Loopback>>,
}

impl Loopback {
    fn pair(a: &ActorSystem, b: &ActorSystem) -> (Arc<Loopback>, Arc<Loopback>) {
        let to_b = Arc::new(Loopback {
            peer: b.clone(),
            back: OnceCell::new(),
        });
        let to_a = Arc::new(Loopback {
            peer: a.clone(),
            back: OnceCell::new(),
        });
        let _ = to_b.back.set(to_a.clone());
        let _ = to_a.back.set(to_b.clone());
        (to_b, to_a)
    }
}

impl RemoteTransport for Loopback {
    fn deliver(&self, target: &ActorPath, message: Message, sender: &ActorRef) {
        let reply_to = match self.back.get() {
            Some(back) if !sender.is_no_sender() => {
                ActorRef::remote(sender.path().clone(), back.clone() as Arc<dyn RemoteTransport>)
            }
            _ => ActorRef::no_sender(),
        };
        self.peer.deliver_inbound(target, message, reply_to);
    }
}

#[test]
fn test_round_trip_across_systems() {
    let (alpha, alpha_dispatcher) = manual_system("alpha");
    let (beta, beta_dispatcher) = manual_system("beta");
    let (to_beta, _to_alpha) = Loopback::pair(&alpha, &beta);

    let replies = probe(&alpha, "replies");
    beta.actor_of(
        Props::new(|| {
            Receive::new().on(|ctx, text: &String| {
                assert!(ctx.sender().is_remote());
                ctx.reply(format!("beta saw {}", text));
                Ok(())
            })
        }),
        "echo",
    )
    .unwrap();

    let echo = ActorRef::remote(ActorPath::parse("/user/echo"), to_beta);
    echo.tell("ping".to_string(), &replies.actor);

    beta_dispatcher.run_until_idle();
    alpha_dispatcher.run_until_idle();

    assert_eq!(replies.drain_of::<String>(), vec!["beta saw ping".to_string()]);
}

#[test]
fn test_inbound_for_unknown_path_is_a_dead_letter() {
    let (alpha, _alpha_dispatcher) = manual_system("alpha");
    let (beta, beta_dispatcher) = manual_system("beta");
    let (to_beta, _to_alpha) = Loopback::pair(&alpha, &beta);

    let events = probe(&beta, "events");
    beta.subscribe(events.actor.clone());

    let nobody = ActorRef::remote(ActorPath::parse("/user/nobody"), to_beta);
    nobody.tell(5u64, &ActorRef::no_sender());
    beta_dispatcher.run_until_idle();

    let dead: Vec<String> = events
        .drain_of::<KernelEvent>()
        .into_iter()
        .filter_map(|event| match event {
            KernelEvent::DeadLetter(letter) => Some(letter.recipient.path().to_string()),
            KernelEvent::Unhandled(_) => None,
        })
        .collect();
    assert_eq!(dead, vec!["/user/nobody".to_string()]);
}
