use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use theorybench::app::{BatchConfig, BatchRunner, PromptRunner, RunConfig};
use theorybench::domain::{Notation, RunError, RunErrorCategory};
use theorybench::infra::corpus::{
    CorpusLayout, list_file_ids, list_guide_names, list_notations,
};
use theorybench::infra::llm::{CANONICAL_PROVIDERS, canonical_provider_name, create_provider};

const EXIT_FAILURE: u8 = 1;
const EXIT_CONFIG: u8 = 2;

#[derive(Parser)]
#[command(
    name = "theorybench",
    version,
    about = "Run music-theory prompts against hosted LLM providers"
)]
struct Cli {
    /// Enable debug logging (RUST_LOG overrides this)
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one prompt against one provider
    Single(SingleArgs),
    /// Run the provider x file x notation cross product
    Batch(BatchArgs),
}

#[derive(Args)]
struct CorpusArgs {
    /// Root folder holding encoded/ and prompts/
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Where responses and input bundles are written
    #[arg(long, default_value = "outputs")]
    outputs_dir: PathBuf,
}

#[derive(Args)]
struct SingleArgs {
    #[command(flatten)]
    corpus: CorpusArgs,

    /// Provider name or alias (chatgpt, claude, gemini, deepseek)
    #[arg(long)]
    provider: Option<String>,

    /// Encoded file id (e.g. Q1a)
    #[arg(long)]
    file: Option<String>,

    /// Encoding format (mei, musicxml, abc, humdrum)
    #[arg(long)]
    notation: Option<String>,

    /// Include contextual guides
    #[arg(long)]
    context: bool,

    #[arg(long, default_value = "fux-counterpoint")]
    dataset: String,

    /// Legacy exam folder under encoded/ (e.g. August2024)
    #[arg(long)]
    exam_date: Option<String>,

    /// Sampling temperature (0.0..=1.0)
    #[arg(long, default_value_t = 0.0)]
    temperature: f32,

    /// Optional cap on response tokens
    #[arg(long)]
    max_tokens: Option<u32>,

    /// Per-run model override passed to the provider
    #[arg(long)]
    model: Option<String>,

    /// Save the response and input bundle under the outputs directory
    #[arg(long)]
    save: bool,

    /// List encoded file ids and exit
    #[arg(long)]
    list_files: bool,

    /// List populated encoding formats and exit
    #[arg(long)]
    list_notations: bool,

    /// List guide documents and exit
    #[arg(long)]
    list_guides: bool,

    /// List supported providers and exit
    #[arg(long)]
    list_providers: bool,
}

#[derive(Args)]
struct BatchArgs {
    #[command(flatten)]
    corpus: CorpusArgs,

    /// Comma-separated provider names, or 'all'
    #[arg(long, default_value = "all")]
    providers: String,

    /// Encoded file ids (default: everything under encoded/)
    #[arg(long, num_args = 1..)]
    files: Vec<String>,

    /// Encoding formats (default: every populated format)
    #[arg(long, num_args = 1..)]
    notations: Vec<String>,

    /// Include contextual guides
    #[arg(long)]
    context: bool,

    #[arg(long, default_value = "fux-counterpoint")]
    dataset: String,

    /// Legacy exam folder under encoded/ (e.g. August2024)
    #[arg(long)]
    exam_date: Option<String>,

    /// Sampling temperature (0.0..=1.0)
    #[arg(long, default_value_t = 0.0)]
    temperature: f32,

    /// Optional cap on response tokens
    #[arg(long)]
    max_tokens: Option<u32>,

    /// Save responses and input bundles under the outputs directory
    #[arg(long)]
    save: bool,

    /// Re-run tasks whose output file already exists
    #[arg(long)]
    overwrite: bool,

    /// Number of parallel worker threads
    #[arg(long, default_value_t = 1)]
    jobs: usize,

    /// Retry passes over transient failures
    #[arg(long, default_value_t = 0)]
    retries: u32,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Command::Single(args) => run_single(args),
        Command::Batch(args) => run_batch(args),
    }
}

fn init_tracing(verbose: bool) {
    let default_directive = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn exit_code_for(err: &RunError) -> ExitCode {
    match err.category() {
        RunErrorCategory::Configuration => ExitCode::from(EXIT_CONFIG),
        _ => ExitCode::from(EXIT_FAILURE),
    }
}

fn run_single(args: SingleArgs) -> ExitCode {
    let layout = CorpusLayout::new(&args.corpus.data_dir, &args.corpus.outputs_dir);
    match try_single(&layout, &args) {
        Ok(code) => code,
        Err(err) => {
            error!("{err}");
            exit_code_for(&err)
        }
    }
}

fn try_single(layout: &CorpusLayout, args: &SingleArgs) -> Result<ExitCode, RunError> {
    if args.list_providers {
        print_lines(CANONICAL_PROVIDERS.iter().map(|s| s.to_string()));
        return Ok(ExitCode::SUCCESS);
    }
    if args.list_files {
        print_lines(list_file_ids(layout)?.into_iter());
        return Ok(ExitCode::SUCCESS);
    }
    if args.list_notations {
        print_lines(list_notations(layout)?.into_iter().map(|n| n.to_string()));
        return Ok(ExitCode::SUCCESS);
    }
    if args.list_guides {
        print_lines(list_guide_names(layout)?.into_iter());
        return Ok(ExitCode::SUCCESS);
    }

    let provider_name = args
        .provider
        .as_deref()
        .ok_or_else(|| RunError::config("--provider is required"))?;
    let file_id = args
        .file
        .as_deref()
        .ok_or_else(|| RunError::config("--file is required"))?;
    let notation = args
        .notation
        .as_deref()
        .ok_or_else(|| RunError::config("--notation is required"))?
        .parse::<Notation>()?;

    let provider = create_provider(provider_name)?;
    let runner = PromptRunner::new(
        layout,
        RunConfig {
            file_id: file_id.to_string(),
            notation,
            context: args.context,
            dataset: args.dataset.clone(),
            exam_date: args.exam_date.clone(),
            temperature: args.temperature,
            model_override: args.model.clone(),
            max_output_tokens: args.max_tokens,
            save: args.save,
        },
    );
    let outcome = runner.run(provider.as_ref())?;

    println!("\n=== Model Response ===\n");
    println!("{}", outcome.response);
    if let Some(path) = outcome.output_path {
        println!("\nSaved response to: {}", path.display());
    }
    Ok(ExitCode::SUCCESS)
}

fn run_batch(args: BatchArgs) -> ExitCode {
    let layout = CorpusLayout::new(&args.corpus.data_dir, &args.corpus.outputs_dir);
    match try_batch(&layout, &args) {
        Ok(code) => code,
        Err(err) => {
            error!("{err}");
            exit_code_for(&err)
        }
    }
}

fn try_batch(layout: &CorpusLayout, args: &BatchArgs) -> Result<ExitCode, RunError> {
    let providers = resolve_providers(&args.providers)?;
    let file_ids = if args.files.is_empty() {
        let discovered = list_file_ids(layout)?;
        if discovered.is_empty() {
            return Err(RunError::config(format!(
                "no encoded files found under {}",
                layout.encoded_dir.display()
            )));
        }
        discovered
    } else {
        args.files.clone()
    };
    let notations = if args.notations.is_empty() {
        let discovered = list_notations(layout)?;
        if discovered.is_empty() {
            return Err(RunError::config(format!(
                "no populated notation directories under {}",
                layout.encoded_dir.display()
            )));
        }
        discovered
    } else {
        args.notations
            .iter()
            .map(|name| name.parse::<Notation>())
            .collect::<Result<Vec<_>, _>>()?
    };

    let runner = BatchRunner::new(
        layout,
        BatchConfig {
            providers,
            file_ids,
            notations,
            context: args.context,
            dataset: args.dataset.clone(),
            exam_date: args.exam_date.clone(),
            temperature: args.temperature,
            max_output_tokens: args.max_tokens,
            save: args.save,
            overwrite: args.overwrite,
            workers: args.jobs,
            retries: args.retries,
        },
    );
    let report = runner.run()?;
    if report.all_succeeded() {
        Ok(ExitCode::SUCCESS)
    } else {
        for failure in &report.failures {
            error!(task = %failure.task, "{}", failure.error);
        }
        Ok(ExitCode::from(EXIT_FAILURE))
    }
}

fn resolve_providers(spec: &str) -> Result<Vec<String>, RunError> {
    if spec.trim().eq_ignore_ascii_case("all") {
        return Ok(CANONICAL_PROVIDERS.iter().map(|s| s.to_string()).collect());
    }
    spec.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| {
            canonical_provider_name(name)
                .map(str::to_string)
                .ok_or_else(|| {
                    RunError::config(format!(
                        "unknown provider '{name}'; supported: {}",
                        CANONICAL_PROVIDERS.join(", ")
                    ))
                })
        })
        .collect()
}

fn print_lines(lines: impl Iterator<Item = String>) {
    for line in lines {
        println!("{line}");
    }
}
