// src/dag/state_manager.rs

//! Per-generation state and its transitions.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::dag::TaskGraph;
use crate::dag::scheduler_step::{RequestId, RunResult, SchedulerStep};
use crate::dag::task_info::{RunState, ScheduledTask};
use crate::errors::TaskError;
use crate::reload::ReloadEvent;
use crate::types::{Generation, TaskName};

/// Everything the scheduler remembers about one build generation.
#[derive(Debug, Default)]
pub struct GenerationState {
    /// Tasks requested in this generation. Absent means idle.
    pub(crate) tasks: HashMap<TaskName, RunState>,
    /// Callers waiting for a task to reach a terminal state.
    pub(crate) waiters: HashMap<TaskName, Vec<RequestId>>,
    /// Set once any task failed or was skipped.
    pub(crate) failed: bool,
    /// Reload events gathered from successful pipelines.
    pub(crate) reloads: Vec<ReloadEvent>,
    pub(crate) full_reload_requested: bool,
    /// Set when the generation went quiescent and was reported; cleared if
    /// new work is requested in it afterwards.
    pub(crate) finished: bool,
}

impl GenerationState {
    pub fn state_of(&self, task: &str) -> Option<&RunState> {
        self.tasks.get(task)
    }

    /// No task pending or running.
    pub fn is_quiescent(&self) -> bool {
        self.tasks.values().all(RunState::is_terminal)
    }

    /// Outcome of a task that reached a terminal state in this generation.
    pub fn outcome_of(&self, task: &str) -> Option<RunResult> {
        match self.tasks.get(task)? {
            RunState::Succeeded => Some(Ok(())),
            RunState::Failed(cause) => Some(Err(TaskError::Failure {
                task: task.to_string(),
                cause: cause.clone(),
            })),
            RunState::Skipped {
                failed_prerequisite,
            } => Some(Err(TaskError::SkippedDueToDependency {
                task: task.to_string(),
                failed_prerequisite: failed_prerequisite.clone(),
            })),
            RunState::Pending | RunState::Running => None,
        }
    }

    pub(crate) fn names_in(&self, pred: impl Fn(&RunState) -> bool) -> Vec<TaskName> {
        let mut names: Vec<TaskName> = self
            .tasks
            .iter()
            .filter(|(_, s)| pred(s))
            .map(|(n, _)| n.clone())
            .collect();
        names.sort();
        names
    }
}

enum PrerequisiteStatus {
    Ready,
    Waiting,
    /// Carries the task whose failure blocks this one.
    Blocked(TaskName),
}

/// Applies state transitions to one generation.
pub struct StateManager<'a> {
    graph: &'a TaskGraph,
    state: &'a mut GenerationState,
    generation: Generation,
}

impl<'a> StateManager<'a> {
    pub fn new(
        graph: &'a TaskGraph,
        state: &'a mut GenerationState,
        generation: Generation,
    ) -> Self {
        Self {
            graph,
            state,
            generation,
        }
    }

    /// Record a state, flagging the generation on failure.
    pub fn set(&mut self, task: &str, state: RunState) {
        if matches!(state, RunState::Failed(_) | RunState::Skipped { .. }) {
            self.state.failed = true;
        }
        self.state.tasks.insert(task.to_string(), state);
    }

    pub fn record_reloads(&mut self, events: impl IntoIterator<Item = ReloadEvent>) {
        self.state.reloads.extend(events);
    }

    /// Include `root` and its transitive prerequisites in this generation.
    ///
    /// Tasks already present keep their state, so a prerequisite that
    /// already succeeded in this generation is not run again.
    pub fn mark_with_prerequisites_pending(&mut self, root: &str) -> usize {
        let mut stack: Vec<TaskName> = vec![root.to_string()];
        let mut visited: HashSet<TaskName> = HashSet::new();
        let mut added = 0;

        while let Some(name) = stack.pop() {
            if !visited.insert(name.clone()) {
                continue;
            }
            if !self.graph.contains(&name) {
                warn!(task = %name, "prerequisite missing from task graph");
                continue;
            }

            if !self.state.tasks.contains_key(&name) {
                self.state.tasks.insert(name.clone(), RunState::Pending);
                debug!(task = %name, generation = self.generation, "marked Pending");
                added += 1;
            }

            stack.extend(self.graph.prerequisites_of(&name).iter().cloned());
        }

        added
    }

    fn prerequisite_status(&self, task: &str) -> PrerequisiteStatus {
        let mut waiting = false;
        for prereq in self.graph.prerequisites_of(task) {
            match self.state.tasks.get(prereq) {
                Some(RunState::Succeeded) => {}
                Some(RunState::Failed(_)) => return PrerequisiteStatus::Blocked(prereq.clone()),
                Some(RunState::Skipped {
                    failed_prerequisite,
                }) => return PrerequisiteStatus::Blocked(failed_prerequisite.clone()),
                Some(RunState::Pending) | Some(RunState::Running) | None => waiting = true,
            }
        }
        if waiting {
            PrerequisiteStatus::Waiting
        } else {
            PrerequisiteStatus::Ready
        }
    }

    /// Move every pending task forward as far as possible.
    ///
    /// - prerequisites all succeeded: pipelines are scheduled, grouping
    ///   tasks succeed on the spot;
    /// - a prerequisite failed or was skipped: the task is skipped.
    ///
    /// Repeats until nothing changes, since a grouping task succeeding or a
    /// skip can unblock further tasks.
    pub fn advance(&mut self, step: &mut SchedulerStep) {
        loop {
            let mut progressed = false;
            let pending = self
                .state
                .names_in(|s| matches!(s, RunState::Pending));

            for name in pending {
                match self.prerequisite_status(&name) {
                    PrerequisiteStatus::Waiting => {}
                    PrerequisiteStatus::Blocked(failed_prerequisite) => {
                        debug!(
                            task = %name,
                            generation = self.generation,
                            failed = %failed_prerequisite,
                            "prerequisite failed; skipping"
                        );
                        self.set(
                            &name,
                            RunState::Skipped {
                                failed_prerequisite,
                            },
                        );
                        step.newly_skipped.push(name.clone());
                        self.resolve_waiters(&name, step);
                        progressed = true;
                    }
                    PrerequisiteStatus::Ready => {
                        let action = self.graph.get(&name).and_then(|t| t.action.clone());
                        match action {
                            None => {
                                debug!(task = %name, generation = self.generation, "grouping task satisfied");
                                self.state.tasks.insert(name.clone(), RunState::Succeeded);
                                self.resolve_waiters(&name, step);
                                progressed = true;
                            }
                            Some(pipeline) => {
                                info!(
                                    task = %name,
                                    generation = self.generation,
                                    "prerequisites satisfied; scheduling task"
                                );
                                self.state.tasks.insert(name.clone(), RunState::Running);
                                step.newly_scheduled.push(ScheduledTask {
                                    name: name.clone(),
                                    generation: self.generation,
                                    pipeline,
                                });
                            }
                        }
                    }
                }
            }

            if !progressed {
                break;
            }
        }
    }

    /// Skip every pending task downstream of `failed_task` in this
    /// generation.
    pub fn mark_dependents_skipped(&mut self, failed_task: &str, step: &mut SchedulerStep) {
        let mut stack: Vec<TaskName> = self.graph.dependents_of(failed_task).to_vec();

        while let Some(name) = stack.pop() {
            if matches!(self.state.tasks.get(&name), Some(RunState::Pending)) {
                debug!(
                    task = %name,
                    generation = self.generation,
                    failed = %failed_task,
                    "skipping dependent of failed task"
                );
                self.set(
                    &name,
                    RunState::Skipped {
                        failed_prerequisite: failed_task.to_string(),
                    },
                );
                step.newly_skipped.push(name.clone());
                self.resolve_waiters(&name, step);
                stack.extend(self.graph.dependents_of(&name).iter().cloned());
            }
        }
    }

    /// Hand the task's terminal outcome to everyone waiting on it.
    pub fn resolve_waiters(&mut self, task: &str, step: &mut SchedulerStep) {
        let Some(outcome) = self.state.outcome_of(task) else {
            return;
        };
        if let Some(waiters) = self.state.waiters.remove(task) {
            for request in waiters {
                step.resolved.push((request, outcome.clone()));
            }
        }
    }
}
