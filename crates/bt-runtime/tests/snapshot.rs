mod common;

use bt_core::NodeGuid;
use bt_runtime::nodes::{RunSubgraph, Sequence, StartOnEvent};
use bt_runtime::{
    share, Graph, GraphBuilder, GraphError, GraphModule, ModuleSnapshot, NodeId, NodeSnapshot,
    Status,
};
use common::{count, ctx, log, Log, Probe};
use serde_json::json;

fn sequence_module(log: &Log) -> (GraphModule, [NodeId; 3]) {
    let mut b = GraphBuilder::new("snap");
    let done = b.action(Probe::new("done", log).starting(Status::Success));
    let busy = b.action(Probe::new("busy", log).then(Status::Success));
    let seq = b.composite(Sequence::new(), [done, busy]);
    b.root(seq);
    (b.build().unwrap(), [seq, done, busy])
}

#[test]
fn nodes_missing_from_the_snapshot_are_uninitialized() {
    let log = log();
    let (idle, _) = sequence_module(&log);
    let empty = idle.serialize().unwrap();
    assert!(empty.nodes.is_empty());

    let (mut module, [seq, _, busy]) = sequence_module(&log);
    module.start();
    assert_eq!(module.root_status(), Status::Waiting);

    module.deserialize(&empty).unwrap();
    assert!(!module.is_running());
    assert_eq!(module.root_status(), Status::Uninitialized);
    assert_eq!(module.status(seq), Status::Uninitialized);
    assert_eq!(module.status(busy), Status::Uninitialized);
}

#[test]
fn snapshot_covers_live_nodes_only() {
    let log = log();
    let (mut module, [seq, done, busy]) = sequence_module(&log);
    module.start();

    let snapshot = module.serialize().unwrap();
    let guid = |id: NodeId| module.node(id).unwrap().guid();
    assert_eq!(snapshot.module, "snap");
    assert_eq!(snapshot.nodes.len(), 2);
    assert!(!snapshot.contains(guid(done)));

    let seq_entry = snapshot.node(guid(seq)).unwrap();
    assert_eq!(seq_entry.status, Status::Waiting);
    assert_eq!(seq_entry.state, Some(json!({ "current": 1 })));
    assert_eq!(snapshot.node(guid(busy)).unwrap().status, Status::Running);
    assert_eq!(snapshot.queue, [guid(busy)]);
}

#[test]
fn restored_module_resumes_where_it_left_off() {
    let log = log();
    let (mut module, _) = sequence_module(&log);
    module.start();
    let snapshot = module.serialize().unwrap();

    let fresh_log = common::log();
    let (mut restored, [seq, _, busy]) = sequence_module(&fresh_log);
    restored.deserialize(&snapshot).unwrap();
    assert_eq!(restored.serialize().unwrap(), snapshot);
    assert!(restored.is_running());
    assert_eq!(restored.status(busy), Status::Running);

    // No hooks besides the state hook ran during the restore.
    assert_eq!(count(&fresh_log, "start:busy"), 0);

    restored.tick(&ctx(1)).unwrap();
    assert_eq!(restored.status(seq), Status::Success);
    assert_eq!(count(&fresh_log, "start:done"), 0);
}

#[test]
fn snapshot_json_round_trip() {
    let log = log();
    let (mut module, _) = sequence_module(&log);
    module.start();
    let snapshot = module.serialize().unwrap();

    let json = snapshot.to_json().unwrap();
    assert_eq!(ModuleSnapshot::from_json(&json).unwrap(), snapshot);
}

#[test]
fn unknown_nodes_are_skipped() {
    let log = log();
    let (mut module, _) = sequence_module(&log);
    module.start();
    let mut snapshot = module.serialize().unwrap();
    let stranger = NodeGuid::from_u128(0xDEAD_BEEF);
    snapshot.nodes.push(NodeSnapshot {
        id: stranger,
        name: "Ghost".to_string(),
        status: Status::Running,
        state: None,
    });
    snapshot.queue.push(stranger);

    let (mut restored, _) = sequence_module(&common::log());
    restored.deserialize(&snapshot).unwrap();
    assert_eq!(restored.active_nodes().count(), 2);
    assert_eq!(restored.queued_nodes().count(), 1);
}

#[test]
fn restore_rejects_foreign_or_corrupt_snapshots() {
    let log = log();
    let (mut module, [seq, _, _]) = sequence_module(&log);
    module.start();
    let mut snapshot = module.serialize().unwrap();

    let mut other = GraphBuilder::new("other");
    let a = other.action(Probe::new("a", &log));
    other.root(a);
    let mut other = other.build().unwrap();
    assert!(matches!(
        other.deserialize(&snapshot),
        Err(GraphError::SnapshotMismatch { .. })
    ));

    let seq_guid = module.node(seq).unwrap().guid();
    for entry in &mut snapshot.nodes {
        if entry.id == seq_guid {
            entry.state = Some(json!("not a cursor"));
        }
    }
    let (mut restored, _) = sequence_module(&common::log());
    match restored.deserialize(&snapshot) {
        Err(GraphError::NodeState { node, .. }) => assert_eq!(node, seq_guid),
        other => panic!("unexpected result: {other:?}"),
    }
}

fn listener_module(log: &Log) -> GraphModule {
    let mut b = GraphBuilder::new("listener");
    b.blackboard_mut().define_channel("alarm");
    let child = b.action(Probe::new("respond", log));
    let root = b.modifier(StartOnEvent::new("alarm"), child);
    b.root(root);
    b.build().unwrap()
}

#[test]
fn pending_events_survive_a_restore() {
    let log = log();
    let mut module = listener_module(&log);
    module.start();
    for n in 0..3 {
        module.blackboard_mut().send_event("alarm", json!(n));
    }
    module.tick(&ctx(1)).unwrap();

    let snapshot = module.serialize().unwrap();
    let root_guid = module.node(module.root().unwrap()).unwrap().guid();
    let state = snapshot.node(root_guid).unwrap().state.clone().unwrap();
    assert_eq!(state["pending"], json!([1, 2]));
    assert_eq!(state["child_started"], json!(true));

    let fresh_log = common::log();
    let mut restored = listener_module(&fresh_log);
    restored.deserialize(&snapshot).unwrap();
    assert_eq!(restored.serialize().unwrap(), snapshot);

    // The channel subscription is re-established by the state hook: a new message is queued
    // while the oldest pending one is consumed (and dropped, the child is still running).
    restored.blackboard_mut().send_event("alarm", json!(9));
    restored.tick(&ctx(2)).unwrap();
    let state = restored.serialize().unwrap().node(root_guid).unwrap().state.clone().unwrap();
    assert_eq!(state["pending"], json!([2, 9]));
    assert_eq!(count(&fresh_log, "start:respond"), 0);
}

#[test]
fn graph_snapshot_includes_subgraphs() {
    let log = log();
    let mut sub = GraphBuilder::new("sub");
    let step = sub.action(Probe::new("step", &log));
    sub.root(step);
    let sub = share(sub.build().unwrap());

    let mut b = GraphBuilder::new("main");
    let run = b.action(RunSubgraph::new(sub.clone()));
    b.root(run);
    let mut graph = Graph::new(b.build().unwrap()).with_subgraph(sub);
    graph.start().unwrap();

    let snapshot = graph.serialize().unwrap();
    assert_eq!(snapshot.modules.len(), 2);
    assert_eq!(snapshot.modules[1].module, "sub");
    assert_eq!(snapshot.modules[1].nodes.len(), 1);

    graph.end().unwrap();
    assert!(!graph.is_running());
    graph.deserialize(&snapshot).unwrap();
    assert!(graph.is_running());
    assert_eq!(graph.serialize().unwrap(), snapshot);
}
