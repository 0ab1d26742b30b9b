//! Actor Selection
//!
//! Walks the live tree from an anchor following a selection expression.
//! A single exact match yields that actor's own reference; a wildcard yields
//! a broadcast reference over every match; no match yields an unresolved
//! reference whose messages go to dead letters.

use crate::actor_ref::ActorRef;
use crate::path::{ActorPath, PathElement};
use crate::system::SystemInner;
use std::sync::Arc;
use tracing::debug;

pub(crate) fn select(system: &Arc<SystemInner>, anchor: ActorRef, expr: &str) -> ActorRef {
    let Some(root) = system.root() else {
        return ActorRef::no_sender();
    };

    let elements = PathElement::parse_selection(expr);
    let mut current = vec![anchor.clone()];
    let mut fan_out = false;

    for element in &elements {
        current = match element {
            PathElement::Root => vec![root.clone()],
            PathElement::Parent => {
                let mut parents: Vec<ActorRef> = Vec::with_capacity(current.len());
                for actor in &current {
                    let parent = parent_of(actor, &root);
                    if !parents.contains(&parent) {
                        parents.push(parent);
                    }
                }
                parents
            }
            PathElement::Wildcard => {
                fan_out = true;
                current.iter().flat_map(children_of).collect()
            }
            PathElement::Child(name) => current
                .iter()
                .filter_map(|actor| actor.local_cell().and_then(|cell| cell.child(name)))
                .collect(),
        };
        if current.is_empty() {
            break;
        }
    }

    let path = selection_path(anchor.path(), &elements);
    match (current.len(), fan_out) {
        (0, _) => {
            debug!(selection = expr, anchor = %anchor.path(), "Selection matched nothing");
            match system.dead_letters() {
                Some(dead_letters) => ActorRef::unresolved(path, dead_letters),
                None => ActorRef::no_sender(),
            }
        }
        (1, false) => current.remove(0),
        _ => ActorRef::broadcast(path, current),
    }
}

/// Parent of a local actor; the root is its own parent
fn parent_of(actor: &ActorRef, root: &ActorRef) -> ActorRef {
    match actor.local_cell() {
        Some(cell) if !cell.parent().is_no_sender() => cell.parent().clone(),
        _ => root.clone(),
    }
}

fn children_of(actor: &ActorRef) -> Vec<ActorRef> {
    actor
        .local_cell()
        .map(|cell| cell.children())
        .unwrap_or_default()
}

/// Nominal path of the selection, used by broadcast and unresolved refs
fn selection_path(anchor: &ActorPath, elements: &[PathElement]) -> ActorPath {
    let mut path = anchor.clone();
    for element in elements {
        path = match element {
            PathElement::Root => ActorPath::root(),
            PathElement::Parent => path.parent().unwrap_or_else(ActorPath::root),
            PathElement::Wildcard => path.child("*"),
            PathElement::Child(name) => path.child(name),
        };
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_path_relative_and_absolute() {
        let anchor = ActorPath::parse("/user/a");
        let nominal = |expr: &str| selection_path(&anchor, &PathElement::parse_selection(expr));

        assert_eq!(nominal("b/c"), ActorPath::parse("/user/a/b/c"));
        assert_eq!(nominal("../b"), ActorPath::parse("/user/b"));
        assert_eq!(nominal("/system/x"), ActorPath::parse("/system/x"));
        assert_eq!(nominal("../*"), ActorPath::parse("/user/*"));
        assert_eq!(nominal("../../.."), ActorPath::root());
    }
}
