use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;
use std::sync::mpsc;
use std::thread;

use tracing::{error, info};

use crate::app::runner::{PromptRunner, RunConfig};
use crate::domain::{Notation, RunError};
use crate::infra::corpus::CorpusLayout;
use crate::infra::llm::{LlmProvider, canonical_provider_name, create_provider};

/// Builds one adapter per task attempt. Injectable so batch tests can run
/// without credentials or network access.
pub type ProviderFactory = dyn Fn(&str) -> Result<Box<dyn LlmProvider>, RunError> + Sync;

#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub providers: Vec<String>,
    pub file_ids: Vec<String>,
    pub notations: Vec<Notation>,
    pub context: bool,
    pub dataset: String,
    pub exam_date: Option<String>,
    pub temperature: f32,
    pub max_output_tokens: Option<u32>,
    pub save: bool,
    pub overwrite: bool,
    pub workers: usize,
    pub retries: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchTask {
    pub provider: String,
    pub file_id: String,
    pub notation: Notation,
}

impl fmt::Display for BatchTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.provider, self.file_id, self.notation)
    }
}

#[derive(Debug, Clone)]
pub struct TaskFailure {
    pub task: BatchTask,
    pub error: RunError,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failures: Vec<TaskFailure>,
}

impl BatchReport {
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}

enum TaskOutcome {
    Succeeded,
    Skipped,
    Failed(RunError),
}

/// Runs the provider x file x notation cross product on a bounded pool of
/// worker threads, then retries transient failures in bounded passes.
pub struct BatchRunner<'a> {
    layout: &'a CorpusLayout,
    config: BatchConfig,
    factory: &'a ProviderFactory,
}

impl<'a> BatchRunner<'a> {
    pub fn new(layout: &'a CorpusLayout, config: BatchConfig) -> Self {
        Self::with_factory(layout, config, &dispatch_factory)
    }

    pub fn with_factory(
        layout: &'a CorpusLayout,
        config: BatchConfig,
        factory: &'a ProviderFactory,
    ) -> Self {
        Self {
            layout,
            config,
            factory,
        }
    }

    pub fn expand_tasks(&self) -> Vec<BatchTask> {
        let mut tasks = Vec::new();
        for provider in &self.config.providers {
            for file_id in &self.config.file_ids {
                for notation in &self.config.notations {
                    tasks.push(BatchTask {
                        provider: provider.clone(),
                        file_id: file_id.clone(),
                        notation: *notation,
                    });
                }
            }
        }
        tasks
    }

    pub fn run(&self) -> Result<BatchReport, RunError> {
        let tasks = self.expand_tasks();
        let mut report = BatchReport {
            attempted: tasks.len(),
            ..BatchReport::default()
        };
        info!(
            tasks = tasks.len(),
            workers = self.config.workers,
            retries = self.config.retries,
            "starting batch"
        );

        let mut pending = tasks;
        for pass in 0..=self.config.retries {
            if pending.is_empty() {
                break;
            }
            if pass > 0 {
                info!(pass, remaining = pending.len(), "retrying failed tasks");
            }
            let outcomes = self.execute_pass(&pending)?;
            let mut next = Vec::new();
            for (task, outcome) in pending.into_iter().zip(outcomes) {
                match outcome {
                    TaskOutcome::Succeeded => report.succeeded += 1,
                    TaskOutcome::Skipped => report.skipped += 1,
                    TaskOutcome::Failed(err) => {
                        if pass < self.config.retries && err.is_retryable() {
                            next.push(task);
                        } else {
                            error!(task = %task, error = %err, "task failed");
                            report.failures.push(TaskFailure { task, error: err });
                        }
                    }
                }
            }
            pending = next;
        }

        info!(
            attempted = report.attempted,
            succeeded = report.succeeded,
            skipped = report.skipped,
            failed = report.failures.len(),
            "batch finished"
        );
        Ok(report)
    }

    fn execute_pass(&self, tasks: &[BatchTask]) -> Result<Vec<TaskOutcome>, RunError> {
        if tasks.is_empty() {
            return Ok(Vec::new());
        }
        let queue: Mutex<VecDeque<usize>> = Mutex::new((0..tasks.len()).collect());
        let (sender, receiver) = mpsc::channel::<(usize, TaskOutcome)>();
        let workers = self.config.workers.clamp(1, tasks.len());

        thread::scope(|scope| {
            for _ in 0..workers {
                let sender = sender.clone();
                let queue = &queue;
                scope.spawn(move || {
                    loop {
                        let index = match queue.lock() {
                            Ok(mut indices) => indices.pop_front(),
                            Err(_) => None,
                        };
                        let Some(index) = index else {
                            break;
                        };
                        let outcome = self.run_task(&tasks[index]);
                        if sender.send((index, outcome)).is_err() {
                            break;
                        }
                    }
                });
            }
        });
        drop(sender);

        let mut outcomes: Vec<Option<TaskOutcome>> =
            (0..tasks.len()).map(|_| None).collect();
        for (index, outcome) in receiver {
            outcomes[index] = Some(outcome);
        }
        outcomes
            .into_iter()
            .map(|slot| slot.ok_or_else(|| RunError::internal("a worker dropped a task result")))
            .collect()
    }

    fn run_task(&self, task: &BatchTask) -> TaskOutcome {
        match self.try_task(task) {
            Ok(outcome) => outcome,
            Err(err) => TaskOutcome::Failed(err),
        }
    }

    fn try_task(&self, task: &BatchTask) -> Result<TaskOutcome, RunError> {
        let label = canonical_provider_name(&task.provider).unwrap_or(task.provider.as_str());
        let runner = PromptRunner::new(self.layout, self.run_config(task));
        // Skip-if-exists only applies when this batch would persist outputs.
        if self.config.save && !self.config.overwrite {
            let output_path = runner.output_path(label);
            if output_path.exists() {
                info!(task = %task, path = %output_path.display(), "output exists, skipping");
                return Ok(TaskOutcome::Skipped);
            }
        }
        let provider = (self.factory)(&task.provider)?;
        runner.run(provider.as_ref())?;
        Ok(TaskOutcome::Succeeded)
    }

    fn run_config(&self, task: &BatchTask) -> RunConfig {
        RunConfig {
            file_id: task.file_id.clone(),
            notation: task.notation,
            context: self.config.context,
            dataset: self.config.dataset.clone(),
            exam_date: self.config.exam_date.clone(),
            temperature: self.config.temperature,
            model_override: None,
            max_output_tokens: self.config.max_output_tokens,
            save: self.config.save,
        }
    }
}

fn dispatch_factory(name: &str) -> Result<Box<dyn LlmProvider>, RunError> {
    create_provider(name)
}
