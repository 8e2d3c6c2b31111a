// tests/scheduler_properties.rs

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use proptest::prelude::*;

use assetdag::dag::{Scheduler, TaskGraph, TaskState};
use assetdag::engine::TaskOutcome;
use assetdag::errors::SharedError;
use assetdag_test_utils::GraphBuilder;

// Acyclic by construction: task N may only depend on tasks 0..N-1.
fn dag_strategy(max_tasks: usize) -> impl Strategy<Value = TaskGraph> {
    (1..=max_tasks).prop_flat_map(|num_tasks| {
        proptest::collection::vec(
            proptest::collection::vec(any::<usize>(), 0..num_tasks),
            num_tasks,
        )
        .prop_map(move |raw_deps| {
            let mut builder = GraphBuilder::new();
            for (i, potential) in raw_deps.into_iter().enumerate() {
                let deps: HashSet<String> = potential
                    .into_iter()
                    .filter(|_| i > 0)
                    .map(|d| format!("task_{}", d % i))
                    .collect();
                let deps: Vec<&str> = deps.iter().map(String::as_str).collect();
                builder = builder.task(&format!("task_{i}"), &deps);
            }
            builder.build()
        })
    })
}

/// Transitive prerequisites of `task`, including itself.
fn closure(graph: &TaskGraph, task: &str) -> HashSet<String> {
    let mut seen = HashSet::new();
    let mut stack = vec![task.to_string()];
    while let Some(name) = stack.pop() {
        if seen.insert(name.clone()) {
            stack.extend(graph.prerequisites_of(&name).iter().cloned());
        }
    }
    seen
}

proptest! {
    #[test]
    fn every_prerequisite_runs_once_and_first(
        graph in dag_strategy(10),
        requests in proptest::collection::vec(0..10usize, 1..6),
        failing in proptest::collection::hash_set(0..10usize, 0..3),
    ) {
        let graph = Arc::new(graph);
        let names: Vec<String> = graph.task_names().map(str::to_string).collect();
        let requested: Vec<String> = requests.iter().map(|i| names[i % names.len()].clone()).collect();
        let failing: HashSet<String> = failing
            .iter()
            .filter(|&&i| i < names.len())
            .map(|&i| names[i].clone())
            .collect();

        let mut s = Scheduler::new(Arc::clone(&graph));
        let g = s.start_generation();

        let mut started: Vec<String> = Vec::new();
        let mut running: Vec<String> = Vec::new();
        let mut resolved: HashMap<u64, bool> = HashMap::new();

        for (id, task) in requested.iter().enumerate() {
            let step = s.request_run(id as u64, task, g);
            for t in step.newly_scheduled {
                running.push(t.name.clone());
                started.push(t.name);
            }
            for (rid, r) in step.resolved {
                resolved.insert(rid, r.is_ok());
            }
        }

        let mut steps = 0;
        while let Some(task) = running.pop() {
            steps += 1;
            prop_assert!(steps < 1000, "scheduler did not settle");

            // Every prerequisite succeeded before this task started.
            for prereq in graph.prerequisites_of(&task) {
                prop_assert_eq!(s.state_of(prereq, g), TaskState::Succeeded);
            }

            let outcome = if failing.contains(&task) {
                TaskOutcome::Failed(SharedError::new(anyhow::anyhow!("{task} failed")))
            } else {
                TaskOutcome::success()
            };
            let step = s.complete(&task, g, outcome);
            for t in step.newly_scheduled {
                running.push(t.name.clone());
                started.push(t.name);
            }
            for (rid, r) in step.resolved {
                resolved.insert(rid, r.is_ok());
            }
        }

        // Each task started at most once in the generation.
        let unique: HashSet<&String> = started.iter().collect();
        prop_assert_eq!(unique.len(), started.len());

        // Every caller got an answer, and the scheduler settled.
        prop_assert_eq!(resolved.len(), requested.len());
        prop_assert!(s.is_quiescent(g));

        for (id, task) in requested.iter().enumerate() {
            let needed = closure(&graph, task);
            let blocked = needed.iter().any(|t| failing.contains(t));
            prop_assert_eq!(resolved[&(id as u64)], !blocked, "outcome for {}", task);

            if !blocked {
                for t in &needed {
                    prop_assert!(started.contains(t), "{} never ran", t);
                }
            }
        }

        // Every dispatched task reached a terminal outcome.
        for task in &started {
            let state = s.state_of(task, g);
            prop_assert!(matches!(state, TaskState::Succeeded | TaskState::Failed));
        }
    }
}
