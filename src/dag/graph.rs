// src/dag/graph.rs

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::errors::GraphError;
use crate::pipeline::Pipeline;
use crate::types::TaskName;

/// A named unit of work.
///
/// A task with no action is a pure grouping node: it succeeds as soon as its
/// prerequisites have.
#[derive(Clone)]
pub struct Task {
    pub name: TaskName,
    pub prerequisites: Vec<TaskName>,
    pub action: Option<Arc<Pipeline>>,
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("prerequisites", &self.prerequisites)
            .field("action", &self.action.as_ref().map(|p| p.stage_names()))
            .finish()
    }
}

impl Task {
    pub fn group<N, P>(name: N, prerequisites: P) -> Self
    where
        N: Into<TaskName>,
        P: IntoIterator,
        P::Item: Into<TaskName>,
    {
        Self {
            name: name.into(),
            prerequisites: prerequisites.into_iter().map(Into::into).collect(),
            action: None,
        }
    }

    pub fn with_pipeline(mut self, pipeline: Pipeline) -> Self {
        self.action = Some(Arc::new(pipeline));
        self
    }

    pub fn is_group(&self) -> bool {
        self.action.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Visiting,
    Done,
}

/// Task graph keyed by task name. Edges point from a task to its
/// prerequisites; the graph is kept acyclic on every insert.
#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    tasks: BTreeMap<TaskName, Task>,
    /// Reverse edges: prerequisite -> tasks that list it.
    dependents: HashMap<TaskName, Vec<TaskName>>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a task definition.
    ///
    /// Prerequisites that are not registered yet are allowed here; call
    /// [`TaskGraph::validate`] once every task is in.
    pub fn register(&mut self, task: Task) -> Result<(), GraphError> {
        if self.tasks.contains_key(&task.name) {
            return Err(GraphError::DuplicateTask(task.name));
        }

        let name = task.name.clone();
        let prerequisites = task.prerequisites.clone();
        self.tasks.insert(name.clone(), task);

        if let Some(path) = self.find_cycle_from(&name) {
            self.tasks.remove(&name);
            return Err(GraphError::Cycle { path });
        }

        let mut seen = HashSet::new();
        for prereq in prerequisites {
            if seen.insert(prereq.clone()) {
                self.dependents.entry(prereq).or_default().push(name.clone());
            }
        }
        Ok(())
    }

    /// Reject prerequisites that name unregistered tasks.
    pub fn validate(&self) -> Result<(), GraphError> {
        for task in self.tasks.values() {
            for prereq in &task.prerequisites {
                if !self.tasks.contains_key(prereq) {
                    return Err(GraphError::UnknownPrerequisite {
                        task: task.name.clone(),
                        prerequisite: prereq.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Depth-first search from `start` through prerequisites. Reaching a
    /// node that is still being visited closes a cycle; the returned path
    /// runs along the loop and repeats its first task at the end.
    fn find_cycle_from(&self, start: &str) -> Option<Vec<TaskName>> {
        let mut marks: HashMap<&str, Mark> = HashMap::new();
        let mut stack: Vec<&str> = Vec::new();
        self.visit(start, &mut marks, &mut stack)
    }

    fn visit<'a>(
        &'a self,
        name: &'a str,
        marks: &mut HashMap<&'a str, Mark>,
        stack: &mut Vec<&'a str>,
    ) -> Option<Vec<TaskName>> {
        match marks.get(name).copied().unwrap_or(Mark::Unvisited) {
            Mark::Done => return None,
            Mark::Visiting => {
                let start = stack.iter().position(|n| *n == name).unwrap_or(0);
                let mut path: Vec<TaskName> =
                    stack[start..].iter().map(|n| n.to_string()).collect();
                path.push(name.to_string());
                return Some(path);
            }
            Mark::Unvisited => {}
        }

        // Dangling prerequisite; `validate` reports it.
        let task = self.tasks.get(name)?;

        marks.insert(name, Mark::Visiting);
        stack.push(name);
        for prereq in &task.prerequisites {
            if let Some(cycle) = self.visit(prereq, marks, stack) {
                return Some(cycle);
            }
        }
        stack.pop();
        marks.insert(name, Mark::Done);
        None
    }

    pub fn get(&self, name: &str) -> Option<&Task> {
        self.tasks.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// All task names, sorted.
    pub fn task_names(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(|s| s.as_str())
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    /// Immediate prerequisites of a task.
    pub fn prerequisites_of(&self, name: &str) -> &[TaskName] {
        self.tasks
            .get(name)
            .map(|t| t.prerequisites.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate dependents of a task (tasks that list it as a prerequisite).
    pub fn dependents_of(&self, name: &str) -> &[TaskName] {
        self.dependents
            .get(name)
            .map(|d| d.as_slice())
            .unwrap_or(&[])
    }

    /// Tasks nothing depends on. These are the natural build targets.
    pub fn sinks(&self) -> Vec<TaskName> {
        self.tasks
            .keys()
            .filter(|name| self.dependents_of(name).is_empty())
            .cloned()
            .collect()
    }

    /// Every task, prerequisites before dependents.
    pub fn topological_order(&self) -> Vec<TaskName> {
        // Edge direction: prerequisite -> task.
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
        for name in self.tasks.keys() {
            graph.add_node(name.as_str());
        }
        for task in self.tasks.values() {
            for prereq in &task.prerequisites {
                if self.tasks.contains_key(prereq) {
                    graph.add_edge(prereq.as_str(), task.name.as_str(), ());
                }
            }
        }

        match toposort(&graph, None) {
            Ok(order) => order.into_iter().map(str::to_string).collect(),
            // `register` keeps the graph acyclic.
            Err(_) => self.tasks.keys().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toposort_puts_prerequisites_first() {
        let mut graph = TaskGraph::new();
        graph.register(Task::group("html", ["styles", "scripts"])).unwrap();
        graph.register(Task::group("styles", Vec::<String>::new())).unwrap();
        graph.register(Task::group("scripts", Vec::<String>::new())).unwrap();

        let order = graph.topological_order();
        let pos = |n: &str| order.iter().position(|t| t == n).unwrap();
        assert!(pos("styles") < pos("html"));
        assert!(pos("scripts") < pos("html"));
        assert_eq!(graph.sinks(), vec!["html".to_string()]);
    }

    #[test]
    fn rejected_cycle_leaves_graph_unchanged() {
        let mut graph = TaskGraph::new();
        graph.register(Task::group("a", ["b"])).unwrap();
        let err = graph.register(Task::group("b", ["a"])).unwrap_err();
        assert!(matches!(err, GraphError::Cycle { .. }));
        assert!(!graph.contains("b"));
        assert!(graph.dependents_of("a").is_empty());
    }
}
