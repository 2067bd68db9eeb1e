mod common;

use bt_runtime::nodes::{Inverter, Parallel, Repeat, Selector, Sequence};
use bt_runtime::{GraphBuilder, GraphModule, NodeId, Status};
use bt_tools::{TraceLog, TRACE_LOG};
use common::{ctx, log, Log, Probe};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Shape {
    Leaf { start: Status, script: Vec<Status> },
    Sequence(Vec<Shape>),
    Selector(Vec<Shape>),
    Parallel(Vec<Shape>),
    Repeat(u32, Box<Shape>),
    Invert(Box<Shape>),
}

fn status() -> impl Strategy<Value = Status> {
    prop_oneof![
        Just(Status::Running),
        Just(Status::Waiting),
        Just(Status::Success),
        Just(Status::Failure),
    ]
}

fn shape() -> impl Strategy<Value = Shape> {
    let leaf = (status(), prop::collection::vec(status(), 0..4))
        .prop_map(|(start, script)| Shape::Leaf { start, script });
    leaf.prop_recursive(4, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 1..4).prop_map(Shape::Sequence),
            prop::collection::vec(inner.clone(), 1..4).prop_map(Shape::Selector),
            prop::collection::vec(inner.clone(), 1..4).prop_map(Shape::Parallel),
            (1u32..3, inner.clone()).prop_map(|(n, s)| Shape::Repeat(n, Box::new(s))),
            inner.prop_map(|s| Shape::Invert(Box::new(s))),
        ]
    })
}

fn add(b: &mut GraphBuilder, shape: &Shape, log: &Log) -> NodeId {
    match shape {
        Shape::Leaf { start, script } => {
            let name = format!("leaf{}", b.len());
            let probe = script
                .iter()
                .fold(Probe::new(&name, log).starting(*start), |p, s| p.then(*s))
                .otherwise(Status::Success);
            b.action(probe)
        }
        Shape::Sequence(children) => {
            let ids: Vec<NodeId> = children.iter().map(|c| add(b, c, log)).collect();
            b.composite(Sequence::new(), ids)
        }
        Shape::Selector(children) => {
            let ids: Vec<NodeId> = children.iter().map(|c| add(b, c, log)).collect();
            b.composite(Selector::new(), ids)
        }
        Shape::Parallel(children) => {
            let ids: Vec<NodeId> = children.iter().map(|c| add(b, c, log)).collect();
            b.composite(Parallel::default(), ids)
        }
        Shape::Repeat(times, child) => {
            let id = add(b, child, log);
            b.modifier(Repeat::times(*times), id)
        }
        Shape::Invert(child) => {
            let id = add(b, child, log);
            b.modifier(Inverter, id)
        }
    }
}

fn build(shape: &Shape) -> GraphModule {
    let log = log();
    let mut b = GraphBuilder::new("prop");
    b.blackboard_mut().set(TRACE_LOG, TraceLog::default());
    let root = add(&mut b, shape, &log);
    b.root(root);
    b.build().unwrap()
}

fn starts(module: &GraphModule, node: NodeId) -> usize {
    module
        .blackboard()
        .get(TRACE_LOG)
        .map(|log| {
            log.with_tag("bt.node.start")
                .filter(|e| e.a == node.index() as u64)
                .count()
        })
        .unwrap_or(0)
}

fn check_between_ticks(module: &GraphModule) -> Result<(), TestCaseError> {
    for node in module.queued_nodes() {
        prop_assert_eq!(module.status(node), Status::Running, "queued node {} is not Running", node);
    }
    for node in module.active_nodes() {
        prop_assert!(module.status(node).is_running(), "active node {} has finished", node);
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(96))]

    #[test]
    fn queue_and_status_invariants_hold(shape in shape(), ticks in 1u64..8) {
        let mut module = build(&shape);
        module.start();
        check_between_ticks(&module)?;

        let ids: Vec<NodeId> = module
            .nodes()
            .iter()
            .filter_map(|node| module.find(node.guid()))
            .collect();
        for tick in 1..=ticks {
            let before: Vec<(Status, usize)> =
                ids.iter().map(|&id| (module.status(id), starts(&module, id))).collect();
            module.tick(&ctx(tick)).unwrap();
            check_between_ticks(&module)?;

            for (&id, (status, started)) in ids.iter().zip(before) {
                if status.is_terminal() && module.status(id).is_running() {
                    prop_assert!(
                        starts(&module, id) > started,
                        "node {} went from {:?} back to running without a start",
                        id,
                        status
                    );
                }
            }
        }
    }

    #[test]
    fn ending_the_root_clears_the_scheduler(shape in shape(), ticks in 0u64..4) {
        let mut module = build(&shape);
        module.start();
        for tick in 1..=ticks {
            module.tick(&ctx(tick)).unwrap();
        }
        let root = module.root().unwrap();
        module.end_node(root);
        prop_assert_eq!(module.active_nodes().count(), 0);
        prop_assert_eq!(module.queued_nodes().count(), 0);
        prop_assert!(!module.is_ending_branch());
    }
}
