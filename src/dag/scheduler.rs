// src/dag/scheduler.rs

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::dag::graph::TaskGraph;
use crate::dag::scheduler_step::{GenerationSummary, RequestId, SchedulerStep};
use crate::dag::state_manager::{GenerationState, StateManager};
use crate::dag::task_info::{RunState, TaskState};
use crate::engine::TaskOutcome;
use crate::errors::TaskError;
use crate::reload::{self, ReloadEvent};
use crate::types::Generation;

/// How many finished generations are kept around for late `run` calls.
pub const DEFAULT_RETAINED_GENERATIONS: usize = 16;

/// Scheduler holds the immutable task graph plus per-generation state.
///
/// It is responsible for:
/// - handing out build generations
/// - deciding when a requested task is ready (prerequisites succeeded)
/// - joining repeated requests for the same task and generation
/// - skipping dependents when a task fails
/// - collecting reload events and flushing them when a generation finishes
///
/// It performs no IO; every method returns a [`SchedulerStep`] describing
/// what changed.
#[derive(Debug)]
pub struct Scheduler {
    graph: Arc<TaskGraph>,
    generation_counter: Generation,
    generations: BTreeMap<Generation, GenerationState>,
    retain: usize,
}

/// Resolve a generation, distinguishing never-started from pruned.
fn lookup(
    generations: &mut BTreeMap<Generation, GenerationState>,
    counter: Generation,
    generation: Generation,
) -> Result<&mut GenerationState, TaskError> {
    if generation == 0 || generation > counter {
        return Err(TaskError::UnknownGeneration(generation));
    }
    generations
        .get_mut(&generation)
        .ok_or(TaskError::GenerationPruned(generation))
}

impl Scheduler {
    pub fn new(graph: Arc<TaskGraph>) -> Self {
        Self {
            graph,
            generation_counter: 0,
            generations: BTreeMap::new(),
            retain: DEFAULT_RETAINED_GENERATIONS,
        }
    }

    /// Keep at most `retain` finished generations (at least one).
    pub fn with_retention(mut self, retain: usize) -> Self {
        self.retain = retain.max(1);
        self
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    /// Most recently started generation, 0 before the first.
    pub fn current_generation(&self) -> Generation {
        self.generation_counter
    }

    /// Start a new build generation. Task state from earlier generations
    /// never satisfies prerequisites in the new one.
    pub fn start_generation(&mut self) -> Generation {
        self.generation_counter += 1;
        let generation = self.generation_counter;
        self.generations
            .insert(generation, GenerationState::default());
        debug!(generation, "scheduler: starting new build generation");
        generation
    }

    /// Read-only view of a task's state in a generation.
    pub fn state_of(&self, task: &str, generation: Generation) -> TaskState {
        self.generations
            .get(&generation)
            .and_then(|g| g.state_of(task))
            .into()
    }

    /// Whether nothing is pending or running in `generation`.
    pub fn is_quiescent(&self, generation: Generation) -> bool {
        self.generations
            .get(&generation)
            .is_none_or(GenerationState::is_quiescent)
    }

    /// Whether no retained generation has work in flight.
    pub fn is_idle(&self) -> bool {
        self.generations.values().all(GenerationState::is_quiescent)
    }

    pub fn retained_generations(&self) -> Vec<Generation> {
        self.generations.keys().copied().collect()
    }

    /// Request `task` (and, transitively, its prerequisites) in `generation`.
    ///
    /// - already terminal in this generation: resolved immediately with the
    ///   recorded outcome;
    /// - pending or running: the request joins the in-flight execution;
    /// - otherwise the task and its unsatisfied prerequisites become pending.
    pub fn request_run(
        &mut self,
        request: RequestId,
        task: &str,
        generation: Generation,
    ) -> SchedulerStep {
        let mut step = SchedulerStep::default();

        if !self.graph.contains(task) {
            warn!(task = %task, "run requested for unknown task");
            step.resolved
                .push((request, Err(TaskError::UnknownTask(task.to_string()))));
            return step;
        }

        let state = match lookup(&mut self.generations, self.generation_counter, generation) {
            Ok(state) => state,
            Err(err) => {
                warn!(task = %task, generation, error = %err, "run requested for unavailable generation");
                step.resolved.push((request, Err(err)));
                return step;
            }
        };

        if let Some(outcome) = state.outcome_of(task) {
            debug!(task = %task, generation, "task already terminal in this generation");
            step.resolved.push((request, outcome));
            return step;
        }

        let joining = state.tasks.contains_key(task);
        state
            .waiters
            .entry(task.to_string())
            .or_default()
            .push(request);

        if joining {
            debug!(task = %task, generation, "joining in-flight task");
            return step;
        }

        let mut manager = StateManager::new(&self.graph, state, generation);
        manager.mark_with_prerequisites_pending(task);
        manager.advance(&mut step);
        state.finished = false;

        self.maybe_finish(generation, &mut step);
        step
    }

    /// Record the outcome of a dispatched task.
    pub fn complete(
        &mut self,
        task: &str,
        generation: Generation,
        outcome: TaskOutcome,
    ) -> SchedulerStep {
        let mut step = SchedulerStep::default();

        let state = match lookup(&mut self.generations, self.generation_counter, generation) {
            Ok(state) => state,
            Err(err) => {
                warn!(task = %task, generation, error = %err, "completion for unavailable generation; ignoring");
                return step;
            }
        };

        if !matches!(state.tasks.get(task), Some(RunState::Running)) {
            warn!(task = %task, generation, "completion for task that is not running; ignoring");
            return step;
        }

        let mut manager = StateManager::new(&self.graph, state, generation);
        match outcome {
            TaskOutcome::Success { written } => {
                info!(task = %task, generation, written = written.len(), "task succeeded");
                if let Some(pipeline) = self.graph.get(task).and_then(|t| t.action.as_ref()) {
                    manager.record_reloads(reload::policy(pipeline.kind(), &written));
                }
                manager.set(task, RunState::Succeeded);
                manager.resolve_waiters(task, &mut step);
            }
            TaskOutcome::Failed(cause) => {
                warn!(task = %task, generation, error = %cause, "task failed; skipping dependents in this generation");
                manager.set(task, RunState::Failed(cause));
                step.newly_failed.push(task.to_string());
                manager.resolve_waiters(task, &mut step);
                manager.mark_dependents_skipped(task, &mut step);
            }
        }
        manager.advance(&mut step);

        self.maybe_finish(generation, &mut step);
        step
    }

    /// Ask for a full page reload once `generation` finishes cleanly.
    ///
    /// If the generation already finished, the reload is emitted right away
    /// (unless the generation failed).
    pub fn request_full_reload(&mut self, generation: Generation) -> SchedulerStep {
        let mut step = SchedulerStep::default();
        let state = match lookup(&mut self.generations, self.generation_counter, generation) {
            Ok(state) => state,
            Err(err) => {
                warn!(generation, error = %err, "reload requested for unavailable generation");
                return step;
            }
        };

        if state.finished {
            if !state.failed {
                step.reloads.push(ReloadEvent::FullReload);
            }
        } else {
            state.full_reload_requested = true;
        }
        step
    }

    /// If `generation` just went quiescent, summarize it, flush its reload
    /// events and prune old generations.
    fn maybe_finish(&mut self, generation: Generation, step: &mut SchedulerStep) {
        let Some(state) = self.generations.get_mut(&generation) else {
            return;
        };
        if state.finished || state.tasks.is_empty() || !state.is_quiescent() {
            return;
        }
        state.finished = true;

        let summary = GenerationSummary {
            generation,
            succeeded: state.names_in(|s| matches!(s, RunState::Succeeded)),
            failed: state.names_in(|s| matches!(s, RunState::Failed(_))),
            skipped: state.names_in(|s| matches!(s, RunState::Skipped { .. })),
        };

        let mut events: Vec<ReloadEvent> = state.reloads.drain(..).collect();
        if std::mem::take(&mut state.full_reload_requested) {
            events.push(ReloadEvent::FullReload);
        }
        if state.failed {
            debug!(generation, discarded = events.len(), "generation failed; no reload");
        } else {
            step.reloads = reload::coalesce(events);
        }

        info!(
            generation,
            succeeded = summary.succeeded.len(),
            failed = summary.failed.len(),
            skipped = summary.skipped.len(),
            "build generation finished"
        );
        step.generation_finished = Some(summary);

        self.prune();
    }

    /// Drop the oldest finished generations beyond the retention limit.
    fn prune(&mut self) {
        let finished: Vec<Generation> = self
            .generations
            .iter()
            .filter(|(_, g)| g.finished)
            .map(|(id, _)| *id)
            .collect();

        if finished.len() <= self.retain {
            return;
        }
        for id in &finished[..finished.len() - self.retain] {
            self.generations.remove(id);
            debug!(generation = *id, "pruned build generation");
        }
    }
}
