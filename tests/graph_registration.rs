// tests/graph_registration.rs

use assetdag::dag::{Task, TaskGraph};
use assetdag::errors::GraphError;

fn none() -> Vec<String> {
    Vec::new()
}

#[test]
fn duplicate_task_is_rejected() {
    let mut graph = TaskGraph::new();
    graph.register(Task::group("styles", none())).unwrap();

    let err = graph.register(Task::group("styles", ["fonts"])).unwrap_err();
    assert_eq!(err, GraphError::DuplicateTask("styles".into()));
    assert!(graph.prerequisites_of("styles").is_empty());
}

#[test]
fn self_reference_is_a_cycle() {
    let mut graph = TaskGraph::new();
    let err = graph.register(Task::group("loop", ["loop"])).unwrap_err();
    assert_eq!(
        err,
        GraphError::Cycle {
            path: vec!["loop".into(), "loop".into()]
        }
    );
    assert!(graph.is_empty());
}

#[test]
fn long_cycle_is_detected_whatever_its_length() {
    for len in 2..8 {
        let mut graph = TaskGraph::new();
        // t0 <- t1 <- ... <- t{len-1}, then t0 depends on the last one.
        for i in 1..len {
            graph
                .register(Task::group(format!("t{i}"), [format!("t{}", i - 1)]))
                .unwrap();
        }
        let err = graph
            .register(Task::group("t0", [format!("t{}", len - 1)]))
            .unwrap_err();

        match err {
            GraphError::Cycle { path } => {
                assert_eq!(path.len(), len + 1, "cycle path for length {len}");
                assert_eq!(path.first(), path.last());
            }
            other => panic!("expected cycle, got {other:?}"),
        }
        assert!(!graph.contains("t0"));
    }
}

#[test]
fn forward_references_are_fine_until_validate() {
    let mut graph = TaskGraph::new();
    graph.register(Task::group("html", ["styles"])).unwrap();

    assert_eq!(
        graph.validate().unwrap_err(),
        GraphError::UnknownPrerequisite {
            task: "html".into(),
            prerequisite: "styles".into(),
        }
    );

    graph.register(Task::group("styles", none())).unwrap();
    graph.validate().unwrap();
    assert_eq!(graph.dependents_of("styles").to_vec(), vec!["html".to_string()]);
}

#[test]
fn sinks_are_tasks_nothing_depends_on() {
    let mut graph = TaskGraph::new();
    graph.register(Task::group("fonts", none())).unwrap();
    graph.register(Task::group("styles", ["fonts"])).unwrap();
    graph.register(Task::group("scripts", none())).unwrap();
    graph.register(Task::group("html", ["styles"])).unwrap();

    assert_eq!(graph.sinks(), vec!["html".to_string(), "scripts".to_string()]);

    let order = graph.topological_order();
    let pos = |n: &str| order.iter().position(|t| t == n).unwrap();
    assert!(pos("fonts") < pos("styles"));
    assert!(pos("styles") < pos("html"));
}
