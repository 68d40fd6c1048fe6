use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use theorybench::app::{BatchConfig, BatchRunner};
use theorybench::domain::{Notation, PromptRequest, RunError};
use theorybench::infra::llm::LlmProvider;

#[path = "support/corpus_fixture.rs"]
mod corpus_fixture;
use corpus_fixture::CorpusFixture;

#[derive(Debug)]
struct ScriptedProvider {
    id: String,
    attempts: Arc<AtomicUsize>,
    failures_before_success: usize,
    error: RunError,
}

impl LlmProvider for ScriptedProvider {
    fn provider_id(&self) -> &str {
        &self.id
    }

    fn query(&self, _request: &PromptRequest) -> Result<String, RunError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failures_before_success {
            Err(self.error.clone())
        } else {
            Ok(format!("response from {}", self.id))
        }
    }
}

fn write_corpus(prefix: &str) -> CorpusFixture {
    let fixture = CorpusFixture::new(prefix);
    fixture.write("data/prompts/base/base_abc.md", "Answer using ABC notation.\n");
    fixture.write("data/encoded/abc/Q1a.abc", "X:1\nK:C\nCDEF|\n");
    fixture.write(
        "data/prompts/questions/no_context/abc/Q1a.nocontext.txt",
        "Identify the mode.\n",
    );
    fixture
}

fn batch_config(providers: &[&str], retries: u32) -> BatchConfig {
    BatchConfig {
        providers: providers.iter().map(|s| s.to_string()).collect(),
        file_ids: vec!["Q1a".to_string()],
        notations: vec![Notation::Abc],
        context: false,
        dataset: "fux-counterpoint".to_string(),
        exam_date: None,
        temperature: 0.0,
        max_output_tokens: None,
        save: true,
        overwrite: false,
        workers: 2,
        retries,
    }
}

#[test]
fn batch_runs_every_task_and_writes_outputs() {
    let fixture = write_corpus("batch-success");
    let layout = fixture.layout();
    let attempts = Arc::new(AtomicUsize::new(0));
    let factory_attempts = Arc::clone(&attempts);
    let factory = move |name: &str| -> Result<Box<dyn LlmProvider>, RunError> {
        Ok(Box::new(ScriptedProvider {
            id: name.to_string(),
            attempts: Arc::clone(&factory_attempts),
            failures_before_success: 0,
            error: RunError::RateLimited,
        }))
    };

    let runner = BatchRunner::with_factory(
        &layout,
        batch_config(&["chatgpt", "claude"], 0),
        &factory,
    );
    let report = runner.run().expect("batch should run");

    assert_eq!(report.attempted, 2);
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.skipped, 0);
    assert!(report.all_succeeded());
    assert_eq!(attempts.load(Ordering::SeqCst), 2);

    let chatgpt_output = fixture.path("outputs/chatgpt/fux-counterpoint_Q1a_abc_nocontext.txt");
    let claude_output = fixture.path("outputs/claude/fux-counterpoint_Q1a_abc_nocontext.txt");
    assert_eq!(
        fs::read_to_string(chatgpt_output).expect("chatgpt output should exist"),
        "response from chatgpt"
    );
    assert_eq!(
        fs::read_to_string(claude_output).expect("claude output should exist"),
        "response from claude"
    );
}

#[test]
fn existing_outputs_are_skipped_without_building_a_provider() {
    let fixture = write_corpus("batch-skip");
    fixture.write(
        "outputs/chatgpt/fux-counterpoint_Q1a_abc_nocontext.txt",
        "earlier response",
    );
    let layout = fixture.layout();
    let factory = |_name: &str| -> Result<Box<dyn LlmProvider>, RunError> {
        panic!("factory must not be called for a skipped task");
    };

    let runner = BatchRunner::with_factory(&layout, batch_config(&["chatgpt"], 0), &factory);
    let report = runner.run().expect("batch should run");

    assert_eq!(report.attempted, 1);
    assert_eq!(report.succeeded, 0);
    assert_eq!(report.skipped, 1);
    assert!(report.all_succeeded());
    assert_eq!(
        fs::read_to_string(fixture.path("outputs/chatgpt/fux-counterpoint_Q1a_abc_nocontext.txt"))
            .expect("existing output should remain"),
        "earlier response"
    );
}

#[test]
fn save_off_queries_every_task_without_persisting_or_skipping() {
    let fixture = write_corpus("batch-nosave");
    fixture.write(
        "outputs/chatgpt/fux-counterpoint_Q1a_abc_nocontext.txt",
        "earlier response",
    );
    let layout = fixture.layout();
    let attempts = Arc::new(AtomicUsize::new(0));
    let factory_attempts = Arc::clone(&attempts);
    let factory = move |name: &str| -> Result<Box<dyn LlmProvider>, RunError> {
        Ok(Box::new(ScriptedProvider {
            id: name.to_string(),
            attempts: Arc::clone(&factory_attempts),
            failures_before_success: 0,
            error: RunError::RateLimited,
        }))
    };

    let mut config = batch_config(&["chatgpt"], 0);
    config.save = false;
    let runner = BatchRunner::with_factory(&layout, config, &factory);
    let report = runner.run().expect("batch should run");

    // Existing outputs do not short-circuit a run that is not persisting.
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.skipped, 0);
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    assert_eq!(
        fs::read_to_string(fixture.path("outputs/chatgpt/fux-counterpoint_Q1a_abc_nocontext.txt"))
            .expect("existing output should be untouched"),
        "earlier response"
    );
}

#[test]
fn overwrite_reruns_tasks_with_existing_outputs() {
    let fixture = write_corpus("batch-overwrite");
    fixture.write(
        "outputs/chatgpt/fux-counterpoint_Q1a_abc_nocontext.txt",
        "earlier response",
    );
    let layout = fixture.layout();
    let attempts = Arc::new(AtomicUsize::new(0));
    let factory_attempts = Arc::clone(&attempts);
    let factory = move |name: &str| -> Result<Box<dyn LlmProvider>, RunError> {
        Ok(Box::new(ScriptedProvider {
            id: name.to_string(),
            attempts: Arc::clone(&factory_attempts),
            failures_before_success: 0,
            error: RunError::RateLimited,
        }))
    };

    let mut config = batch_config(&["chatgpt"], 0);
    config.overwrite = true;
    let runner = BatchRunner::with_factory(&layout, config, &factory);
    let report = runner.run().expect("batch should run");

    assert_eq!(report.succeeded, 1);
    assert_eq!(report.skipped, 0);
    assert_eq!(
        fs::read_to_string(fixture.path("outputs/chatgpt/fux-counterpoint_Q1a_abc_nocontext.txt"))
            .expect("output should be rewritten"),
        "response from chatgpt"
    );
}

#[test]
fn transient_failure_succeeds_on_retry_pass() {
    let fixture = write_corpus("batch-retry");
    let layout = fixture.layout();
    let attempts = Arc::new(AtomicUsize::new(0));
    let factory_attempts = Arc::clone(&attempts);
    let factory = move |name: &str| -> Result<Box<dyn LlmProvider>, RunError> {
        Ok(Box::new(ScriptedProvider {
            id: name.to_string(),
            attempts: Arc::clone(&factory_attempts),
            failures_before_success: 1,
            error: RunError::RateLimited,
        }))
    };

    let runner = BatchRunner::with_factory(&layout, batch_config(&["chatgpt"], 1), &factory);
    let report = runner.run().expect("batch should run");

    assert_eq!(report.succeeded, 1);
    assert!(report.all_succeeded());
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[test]
fn exhausted_retries_record_the_failing_task() {
    let fixture = write_corpus("batch-exhausted");
    let layout = fixture.layout();
    let attempts = Arc::new(AtomicUsize::new(0));
    let factory_attempts = Arc::clone(&attempts);
    let factory = move |name: &str| -> Result<Box<dyn LlmProvider>, RunError> {
        Ok(Box::new(ScriptedProvider {
            id: name.to_string(),
            attempts: Arc::clone(&factory_attempts),
            failures_before_success: usize::MAX,
            error: RunError::RateLimited,
        }))
    };

    let runner = BatchRunner::with_factory(&layout, batch_config(&["chatgpt"], 2), &factory);
    let report = runner.run().expect("batch should run");

    assert_eq!(report.succeeded, 0);
    assert_eq!(report.failures.len(), 1);
    assert!(!report.all_succeeded());
    assert_eq!(report.failures[0].task.to_string(), "chatgpt/Q1a/abc");
    assert!(matches!(report.failures[0].error, RunError::RateLimited));
    // Initial pass plus two retry passes.
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[test]
fn non_retryable_failures_are_not_retried() {
    let fixture = write_corpus("batch-nonretryable");
    let layout = fixture.layout();
    let attempts = Arc::new(AtomicUsize::new(0));
    let factory_attempts = Arc::clone(&attempts);
    let factory = move |name: &str| -> Result<Box<dyn LlmProvider>, RunError> {
        Ok(Box::new(ScriptedProvider {
            id: name.to_string(),
            attempts: Arc::clone(&factory_attempts),
            failures_before_success: usize::MAX,
            error: RunError::validation("temperature rejected by provider"),
        }))
    };

    let runner = BatchRunner::with_factory(&layout, batch_config(&["chatgpt"], 3), &factory);
    let report = runner.run().expect("batch should run");

    assert_eq!(report.failures.len(), 1);
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

#[test]
fn two_by_two_grid_recovers_from_one_transient_failure() {
    let fixture = write_corpus("batch-grid");
    fixture.write("data/encoded/abc/Q2b.abc", "X:2\nK:G\nGABc|\n");
    fixture.write(
        "data/prompts/questions/no_context/abc/Q2b.nocontext.txt",
        "Identify the cadence.\n",
    );
    let layout = fixture.layout();
    let chatgpt_attempts = Arc::new(AtomicUsize::new(0));
    let claude_attempts = Arc::new(AtomicUsize::new(0));
    let factory_chatgpt = Arc::clone(&chatgpt_attempts);
    let factory_claude = Arc::clone(&claude_attempts);
    let factory = move |name: &str| -> Result<Box<dyn LlmProvider>, RunError> {
        let (attempts, failures_before_success) = if name == "claude" {
            (Arc::clone(&factory_claude), 1)
        } else {
            (Arc::clone(&factory_chatgpt), 0)
        };
        Ok(Box::new(ScriptedProvider {
            id: name.to_string(),
            attempts,
            failures_before_success,
            error: RunError::Timeout,
        }))
    };

    let mut config = batch_config(&["chatgpt", "claude"], 1);
    config.file_ids = vec!["Q1a".to_string(), "Q2b".to_string()];
    let runner = BatchRunner::with_factory(&layout, config, &factory);
    let report = runner.run().expect("batch should run");

    assert_eq!(report.attempted, 4);
    assert_eq!(report.succeeded, 4);
    assert!(report.all_succeeded());
    assert_eq!(chatgpt_attempts.load(Ordering::SeqCst), 2);
    // One claude task failed on the first pass and succeeded on the retry.
    assert_eq!(claude_attempts.load(Ordering::SeqCst), 3);
}

#[test]
fn one_failing_task_does_not_block_the_others() {
    let fixture = write_corpus("batch-partial");
    let layout = fixture.layout();
    let factory = |name: &str| -> Result<Box<dyn LlmProvider>, RunError> {
        if name == "claude" {
            Err(RunError::config(
                "Anthropic API key is missing (set ANTHROPIC_API_KEY)",
            ))
        } else {
            Ok(Box::new(ScriptedProvider {
                id: name.to_string(),
                attempts: Arc::new(AtomicUsize::new(0)),
                failures_before_success: 0,
                error: RunError::RateLimited,
            }))
        }
    };

    let runner = BatchRunner::with_factory(
        &layout,
        batch_config(&["chatgpt", "claude"], 0),
        &factory,
    );
    let report = runner.run().expect("batch should run");

    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].task.provider, "claude");
    assert!(
        fixture
            .path("outputs/chatgpt/fux-counterpoint_Q1a_abc_nocontext.txt")
            .exists()
    );
}
