mod common;

use std::cell::Cell;
use std::rc::Rc;

use bt_runtime::nodes::{Repeat, Sequence};
use bt_runtime::{Graph, GraphBuilder, NodeId, Status};
use common::{count, ctx, entries, init_tracing, log, Probe};

#[test]
fn action_completing_on_start_leaves_nothing_active() {
    init_tracing();
    let log = log();
    let mut b = GraphBuilder::new("single");
    let a = b.action(Probe::new("a", &log).starting(Status::Success));
    b.root(a);
    let mut graph = Graph::new(b.build().unwrap());

    assert_eq!(graph.start().unwrap(), Status::Success);
    assert!(!graph.is_running());

    let root = graph.root_module().borrow();
    assert_eq!(root.status(a), Status::Success);
    assert_eq!(root.active_nodes().count(), 0);
    assert_eq!(root.queued_nodes().count(), 0);
    assert_eq!(entries(&log), ["start:a", "end:a"]);
}

#[test]
fn sequence_starts_next_child_in_the_same_tick() {
    let log = log();
    let mut b = GraphBuilder::new("cascade");
    let first = b.action(Probe::new("first", &log).then(Status::Success));
    let second = b.action(Probe::new("second", &log));
    let seq = b.composite(Sequence::new(), [first, second]);
    b.root(seq);
    let mut module = b.build().unwrap();

    assert_eq!(module.start(), Status::Waiting);
    assert_eq!(entries(&log), ["start:first"]);
    assert_eq!(module.queued_nodes().collect::<Vec<_>>(), [first]);

    module.tick(&ctx(1)).unwrap();
    assert_eq!(
        entries(&log),
        ["start:first", "update:first", "end:first", "start:second"]
    );
    assert_eq!(module.status(first), Status::Success);
    assert_eq!(module.status(second), Status::Running);
    assert_eq!(module.status(seq), Status::Waiting);
    assert_eq!(module.queued_nodes().collect::<Vec<_>>(), [second]);

    // `second` started during tick 1, so its first update happens on tick 2.
    module.tick(&ctx(2)).unwrap();
    assert_eq!(count(&log, "update:second"), 1);
}

#[test]
fn repeat_restarts_its_child_once_per_completion() {
    let log = log();
    let mut b = GraphBuilder::new("repeat");
    let child = b.action(
        Probe::new("child", &log)
            .then(Status::Success)
            .then(Status::Failure)
            .cycle(),
    );
    let repeat = b.modifier(Repeat::forever(), child);
    b.root(repeat);
    let mut module = b.build().unwrap();

    module.start();
    let ticks = 7;
    for tick in 1..=ticks {
        module.tick(&ctx(tick)).unwrap();
        assert!(module.status(repeat).is_running());
    }
    assert_eq!(count(&log, "start:child"), ticks as usize + 1);
    assert_eq!(count(&log, "update:child"), ticks as usize);
}

#[test]
fn running_node_is_updated_once_per_tick() {
    let log = log();
    let mut b = GraphBuilder::new("steady");
    let a = b.action(Probe::new("a", &log));
    b.root(a);
    let mut module = b.build().unwrap();

    module.start();
    for tick in 1..=3 {
        module.tick(&ctx(tick)).unwrap();
    }
    assert_eq!(count(&log, "update:a"), 3);
    // Re-queued by the next tick's rebuild, not by the update itself.
    assert_eq!(module.queued_nodes().count(), 0);
    assert!(module.is_active(a));
}

#[test]
fn waiting_node_is_not_updated_until_awoken() {
    let log = log();
    let mut b = GraphBuilder::new("idle");
    let a = b.action(Probe::new("a", &log).starting(Status::Waiting));
    b.root(a);
    let mut module = b.build().unwrap();

    module.start();
    for tick in 1..=3 {
        module.tick(&ctx(tick)).unwrap();
    }
    assert_eq!(count(&log, "update:a"), 0);

    assert!(module.awake_node(a));
    module.tick(&ctx(4)).unwrap();
    assert_eq!(count(&log, "update:a"), 1);
}

#[test]
fn instant_children_complete_during_start() {
    let log = log();
    let mut b = GraphBuilder::new("instant");
    let children: Vec<NodeId> = ["a", "b", "c"]
        .into_iter()
        .map(|name| b.action(Probe::new(name, &log).starting(Status::Success)))
        .collect();
    let seq = b.composite(Sequence::new(), children);
    b.root(seq);
    let mut module = b.build().unwrap();

    assert_eq!(module.start(), Status::Success);
    assert_eq!(
        entries(&log),
        ["start:a", "end:a", "start:b", "end:b", "start:c", "end:c"]
    );
    assert!(!module.is_running());
}

#[test]
fn empty_child_slot_reports_success() {
    let log = log();
    let mut b = GraphBuilder::new("slots");
    let a = b.action(Probe::new("a", &log));
    let seq = b.composite_slots(Sequence::new(), [None, Some(a)]);
    b.root(seq);
    let mut module = b.build().unwrap();

    assert_eq!(module.start(), Status::Waiting);
    assert_eq!(entries(&log), ["start:a"]);
}

#[test]
fn starting_an_active_node_again_is_ignored() {
    let log = log();
    let mut b = GraphBuilder::new("twice");
    let a = b.action(Probe::new("a", &log));
    b.root(a);
    let mut module = b.build().unwrap();

    module.start();
    assert_eq!(module.start_node(a), Status::Running);
    assert_eq!(count(&log, "start:a"), 1);
    assert_eq!(module.queued_nodes().count(), 1);
}

#[test]
fn empty_module_start_is_a_noop() {
    let mut module = GraphBuilder::new("empty").build().unwrap();
    assert_eq!(module.start(), Status::Uninitialized);
    assert!(!module.is_running());
    module.tick(&ctx(1)).unwrap();
}

#[test]
fn status_changes_are_reported_once_per_tick() {
    let log = log();
    let mut b = GraphBuilder::new("listener");
    let first = b.action(Probe::new("first", &log).then(Status::Success));
    let second = b.action(Probe::new("second", &log).starting(Status::Waiting));
    let seq = b.composite(Sequence::new(), [first, second]);
    b.root(seq);
    let mut module = b.build().unwrap();

    let fired = Rc::new(Cell::new(0));
    let changed = Rc::new(Cell::new(0));
    {
        let (fired, changed) = (fired.clone(), changed.clone());
        module.on_status_changed(move |event| {
            fired.set(fired.get() + 1);
            changed.set(event.nodes.len());
        });
    }

    module.start();
    assert_eq!(fired.get(), 1);

    module.tick(&ctx(1)).unwrap();
    assert_eq!(fired.get(), 2);
    // first -> Success, second -> Waiting, seq stays Waiting after its update
    assert!(changed.get() >= 2);

    // Everything is waiting now; an idle tick reports nothing.
    module.tick(&ctx(2)).unwrap();
    assert_eq!(fired.get(), 2);
}

#[test]
fn restart_ends_the_current_activation_first() {
    let log = log();
    let mut b = GraphBuilder::new("restart");
    let a = b.action(Probe::new("a", &log));
    b.root(a);
    let mut module = b.build().unwrap();

    module.start();
    assert_eq!(module.restart(), Status::Running);
    assert_eq!(entries(&log), ["start:a", "end:a", "start:a"]);
    assert!(module.is_running());
}
