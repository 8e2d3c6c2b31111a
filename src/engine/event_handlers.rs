// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use crate::dag::{GenerationSummary, RequestId, RunResult, ScheduledTask, Scheduler, SchedulerStep};
use crate::engine::TaskOutcome;
use crate::reload::ReloadEvent;
use crate::types::Generation;

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone)]
pub enum CoreCommand {
    /// Send these tasks to the executor.
    DispatchTasks(Vec<ScheduledTask>),
    /// Deliver outcomes to waiting callers.
    Resolve(Vec<(RequestId, RunResult)>),
    /// Push these events to live-reload clients.
    Broadcast(Vec<ReloadEvent>),
    /// A generation has nothing pending or running any more.
    GenerationFinished(GenerationSummary),
}

/// Decision returned by the core after handling a single event.
#[derive(Debug, Clone)]
pub struct CoreStep {
    /// Commands the IO shell should execute, in order.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    fn continuing(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }
}

/// Translate a scheduler step into shell commands.
///
/// Tasks are dispatched before callers are resolved, and reloads go out
/// before the generation is reported finished.
fn commands_from_step(step: SchedulerStep) -> Vec<CoreCommand> {
    let mut commands = Vec::new();

    if !step.newly_scheduled.is_empty() {
        commands.push(CoreCommand::DispatchTasks(step.newly_scheduled));
    }
    if !step.resolved.is_empty() {
        commands.push(CoreCommand::Resolve(step.resolved));
    }
    if !step.reloads.is_empty() {
        commands.push(CoreCommand::Broadcast(step.reloads));
    }
    if let Some(summary) = step.generation_finished {
        commands.push(CoreCommand::GenerationFinished(summary));
    }

    commands
}

/// Handle a run request for `task` in `generation`.
pub fn handle_run_request(
    scheduler: &mut Scheduler,
    request: RequestId,
    task: &str,
    generation: Generation,
) -> CoreStep {
    let step = scheduler.request_run(request, task, generation);
    CoreStep::continuing(commands_from_step(step))
}

/// Handle a task completion event.
pub fn handle_task_completion(
    scheduler: &mut Scheduler,
    task: &str,
    generation: Generation,
    outcome: TaskOutcome,
) -> CoreStep {
    let step = scheduler.complete(task, generation, outcome);
    CoreStep::continuing(commands_from_step(step))
}

/// Handle a request for a full reload after `generation`.
pub fn handle_reload_request(scheduler: &mut Scheduler, generation: Generation) -> CoreStep {
    let step = scheduler.request_full_reload(generation);
    CoreStep::continuing(commands_from_step(step))
}
