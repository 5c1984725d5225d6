//! Staged concurrent executor.
//!
//! The Executor consumes an execution plan and the task set, running
//! stages strictly in order. All runnable tasks within a stage launch
//! concurrently; the stage does not advance until every task in it has
//! settled. One task's terminal state never aborts its siblings:
//! failures are captured as `TaskResult` values and propagate only
//! structurally, by skipping dependents.

use crate::core::{ExecutionPlan, RunId, SectionTask, TaskResult};
use crate::error::{Error, Result};
use crate::orchestration::retry::RetryPolicy;
use crate::provider::{ContentProvider, ProviderError, ProviderRegistry, SectionRequest};
use crate::{flog, flog_debug, flog_warn};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

/// Default per-attempt timeout (60 seconds).
pub const DEFAULT_ATTEMPT_TIMEOUT_SECS: u64 = 60;

/// Tuning knobs for a run.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Retry policy applied to transient provider failures.
    pub retry: RetryPolicy,
    /// How long a single provider attempt may run.
    pub attempt_timeout: Duration,
    /// Cap on concurrently running tasks within a stage. None = unbounded.
    pub stage_concurrency: Option<usize>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            attempt_timeout: Duration::from_secs(DEFAULT_ATTEMPT_TIMEOUT_SECS),
            stage_concurrency: None,
        }
    }
}

/// Events emitted by the executor for run lifecycle changes.
///
/// These events allow external components (like the CLI progress
/// printer) to react to state changes without polling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    /// A stage has started; its tasks are about to launch.
    StageStarted {
        /// Zero-based stage index.
        index: usize,
        /// Names of the tasks in the stage.
        tasks: Vec<String>,
    },
    /// A task has been launched.
    TaskStarted {
        /// The task that started.
        task: String,
    },
    /// A task reached a terminal state.
    TaskFinished {
        /// The task that settled.
        task: String,
        /// Its terminal result.
        result: TaskResult,
    },
    /// Every task in the plan has settled.
    RunCompleted {
        /// The run that completed.
        run_id: RunId,
    },
}

/// Per-run diagnostics summary.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Identifier of this run.
    pub run_id: RunId,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
    /// Number of tasks that produced content.
    pub succeeded: usize,
    /// Number of tasks that failed terminally.
    pub failed: usize,
    /// Number of tasks skipped (upstream failure or cancellation).
    pub skipped: usize,
    /// Provider attempts per task. Zero for preemptively skipped tasks.
    pub attempts: HashMap<String, u32>,
    /// Whether the run was cancelled before all stages settled.
    pub cancelled: bool,
}

/// Everything a run produces: the results map plus diagnostics.
///
/// The run always completes (absent a hard cancellation) and returns a
/// full results map; callers decide what overall outcome the map
/// represents.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Terminal result for every task in the plan, keyed by name.
    pub results: HashMap<String, TaskResult>,
    /// Diagnostics for the run.
    pub report: RunReport,
}

impl RunOutcome {
    /// The run identifier.
    pub fn run_id(&self) -> RunId {
        self.report.run_id
    }

    /// Check if every task succeeded.
    pub fn is_complete_success(&self) -> bool {
        self.results.values().all(|r| r.is_success())
    }
}

/// Staged concurrent executor for section-generation runs.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use folio::core::{ExecutionPlan, TaskGraph};
/// use folio::orchestration::{Executor, ExecutorConfig};
/// use folio::provider::{DegradedProvider, ProviderRegistry};
///
/// let registry = Arc::new(ProviderRegistry::new(Arc::new(DegradedProvider::new())));
/// let executor = Executor::new(registry, ExecutorConfig::default());
/// let outcome = executor.execute(&plan, &graph.task_map()).await?;
/// ```
pub struct Executor {
    /// Provider selection per task.
    registry: Arc<ProviderRegistry>,
    /// Run tuning knobs.
    config: ExecutorConfig,
    /// Cooperative cancellation for the whole run.
    cancel: CancellationToken,
    /// Optional channel for run lifecycle events.
    event_tx: Option<mpsc::Sender<RunEvent>>,
}

impl Executor {
    /// Create a new executor.
    pub fn new(registry: Arc<ProviderRegistry>, config: ExecutorConfig) -> Self {
        Self {
            registry,
            config,
            cancel: CancellationToken::new(),
            event_tx: None,
        }
    }

    /// Attach an event channel for run lifecycle notifications.
    pub fn with_events(mut self, event_tx: mpsc::Sender<RunEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// Token callers can use to cancel the run cooperatively.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    async fn emit(&self, event: RunEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event).await;
        }
    }

    /// Run the plan to completion.
    ///
    /// Stages are processed strictly in plan order. Within a stage,
    /// tasks whose dependencies all succeeded launch concurrently on a
    /// JoinSet; tasks with a non-success dependency settle immediately
    /// as `Skipped` without invoking their provider. The results map is
    /// written only here, one write per task name, at settle time.
    ///
    /// # Errors
    /// Returns `TaskNotFound` if the plan names a task missing from
    /// `tasks`, and `TaskJoin` if a provider panicked. Task-level
    /// provider failures are never errors; they settle as results.
    pub async fn execute(
        &self,
        plan: &ExecutionPlan,
        tasks: &HashMap<String, SectionTask>,
    ) -> Result<RunOutcome> {
        let run_id = RunId::new();
        let started_at = Utc::now();
        flog!(
            "run {} starting: {} task(s) in {} stage(s)",
            run_id.short(),
            plan.task_count(),
            plan.stage_count()
        );

        let mut results: HashMap<String, TaskResult> = HashMap::with_capacity(plan.task_count());
        let mut attempts: HashMap<String, u32> = HashMap::with_capacity(plan.task_count());
        let semaphore = self
            .config
            .stage_concurrency
            .map(|n| Arc::new(Semaphore::new(n.max(1))));

        for (index, stage) in plan.stages().iter().enumerate() {
            if self.cancel.is_cancelled() {
                flog_warn!("run {} cancelled before stage {}", run_id.short(), index);
                for later in &plan.stages()[index..] {
                    for name in later.members() {
                        let result = TaskResult::Skipped {
                            reason: "run cancelled".to_string(),
                        };
                        self.emit(RunEvent::TaskFinished {
                            task: name.clone(),
                            result: result.clone(),
                        })
                        .await;
                        attempts.insert(name.clone(), 0);
                        results.insert(name.clone(), result);
                    }
                }
                break;
            }

            self.emit(RunEvent::StageStarted {
                index,
                tasks: stage.members().to_vec(),
            })
            .await;
            flog_debug!("stage {} starting: {:?}", index, stage.members());

            // Launch order within the stage: priority hint, then name.
            // Stage membership is fixed by the plan; this only orders
            // the spawns.
            let mut launch_order = Vec::with_capacity(stage.len());
            for name in stage.members() {
                let task = tasks
                    .get(name)
                    .ok_or_else(|| Error::TaskNotFound(name.clone()))?;
                launch_order.push(task);
            }
            launch_order
                .sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.name.cmp(&b.name)));

            let mut join_set: JoinSet<(String, u32, TaskResult)> = JoinSet::new();

            for task in launch_order {
                // Structural failure isolation: a dependent of a
                // non-success upstream settles without a provider call.
                let blocker = task
                    .depends_on
                    .iter()
                    .find(|dep| !results.get(*dep).map(TaskResult::is_success).unwrap_or(false));
                if let Some(blocker) = blocker {
                    let result = TaskResult::Skipped {
                        reason: format!("upstream dependency failed: {}", blocker),
                    };
                    flog_debug!("task {} skipped: upstream {} not successful", task.name, blocker);
                    self.emit(RunEvent::TaskFinished {
                        task: task.name.clone(),
                        result: result.clone(),
                    })
                    .await;
                    attempts.insert(task.name.clone(), 0);
                    results.insert(task.name.clone(), result);
                    continue;
                }

                // Only successful upstream content reaches the provider.
                let inputs: HashMap<String, String> = task
                    .depends_on
                    .iter()
                    .filter_map(|dep| {
                        results
                            .get(dep)
                            .and_then(TaskResult::content)
                            .map(|content| (dep.clone(), content.to_string()))
                    })
                    .collect();

                let provider = self.registry.provider_for(&task.name);
                let policy = self.config.retry.clone();
                let attempt_timeout = self.config.attempt_timeout;
                let cancel = self.cancel.clone();
                let semaphore = semaphore.clone();
                let task = task.clone();

                self.emit(RunEvent::TaskStarted {
                    task: task.name.clone(),
                })
                .await;

                join_set.spawn(async move {
                    let _permit = match &semaphore {
                        Some(sem) => sem.clone().acquire_owned().await.ok(),
                        None => None,
                    };
                    let name = task.name.clone();
                    let (attempt_count, result) =
                        run_with_retry(task, inputs, provider, policy, attempt_timeout, cancel)
                            .await;
                    (name, attempt_count, result)
                });
            }

            // Stage barrier: wait for every launched task to settle.
            while let Some(joined) = join_set.join_next().await {
                let (name, attempt_count, result) =
                    joined.map_err(|e| Error::TaskJoin(e.to_string()))?;
                flog_debug!("task {} settled after {} attempt(s): {}", name, attempt_count, result);
                self.emit(RunEvent::TaskFinished {
                    task: name.clone(),
                    result: result.clone(),
                })
                .await;
                attempts.insert(name.clone(), attempt_count);
                results.insert(name, result);
            }
        }

        let finished_at = Utc::now();
        let succeeded = results.values().filter(|r| r.is_success()).count();
        let failed = results
            .values()
            .filter(|r| matches!(r, TaskResult::Failed { .. }))
            .count();
        let skipped = results
            .values()
            .filter(|r| matches!(r, TaskResult::Skipped { .. }))
            .count();

        flog!(
            "run {} finished: {} succeeded, {} failed, {} skipped",
            run_id.short(),
            succeeded,
            failed,
            skipped
        );
        self.emit(RunEvent::RunCompleted { run_id }).await;

        Ok(RunOutcome {
            results,
            report: RunReport {
                run_id,
                started_at,
                finished_at,
                succeeded,
                failed,
                skipped,
                attempts,
                cancelled: self.cancel.is_cancelled(),
            },
        })
    }
}

/// Drive one task through its attempts until it settles.
///
/// Returns the number of attempts made and the terminal result.
/// Transient errors (including per-attempt timeouts) retry with
/// backoff up to the policy bound; permanent errors settle at once.
/// Cancellation wins any race and settles the task as skipped.
async fn run_with_retry(
    task: SectionTask,
    inputs: HashMap<String, String>,
    provider: Arc<dyn ContentProvider>,
    policy: RetryPolicy,
    attempt_timeout: Duration,
    cancel: CancellationToken,
) -> (u32, TaskResult) {
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        let request = SectionRequest {
            task_name: &task.name,
            prompt: &task.prompt,
            inputs: &inputs,
        };

        let attempt_outcome = tokio::select! {
            _ = cancel.cancelled() => {
                return (
                    attempt.saturating_sub(1),
                    TaskResult::Skipped {
                        reason: "run cancelled".to_string(),
                    },
                );
            }
            outcome = timeout(attempt_timeout, provider.produce(request)) => outcome,
        };

        let error = match attempt_outcome {
            Ok(Ok(content)) => return (attempt, TaskResult::Success { content }),
            Ok(Err(e)) => e,
            Err(_) => ProviderError::Transient(format!(
                "attempt timed out after {:?}",
                attempt_timeout
            )),
        };

        match error {
            ProviderError::Permanent(message) => {
                return (attempt, TaskResult::Failed { error: message });
            }
            ProviderError::Transient(message) => {
                if !policy.allows_retry(attempt) {
                    return (
                        attempt,
                        TaskResult::Failed {
                            error: format!("{} (after {} attempt(s))", message, attempt),
                        },
                    );
                }
                let delay = policy.delay_for(attempt);
                tokio::select! {
                    _ = cancel.cancelled() => {
                        return (
                            attempt,
                            TaskResult::Skipped {
                                reason: "run cancelled".to_string(),
                            },
                        );
                    }
                    _ = sleep(delay) => {}
                }
            }
        }
    }
}
