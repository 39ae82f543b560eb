//! Command-line entry point for the mixtape orchestrator.
//!
//! A single `claude` subcommand reads a task prompt (inline or from file),
//! validates it against the configured limits, and drives one orchestrated
//! session to completion.

mod error;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

pub use error::CliError;

use mixtape_core::config::OrchestratorConfig;
use mixtape_core::diagnostic_log::{resolve_log_path, DiagnosticLog};
use mixtape_core::orchestrator::{AgentProviders, Orchestrator};
use mixtape_core::provider::mock::MockProviderPort;

#[derive(Parser, Debug)]
#[command(
    name = "mixtape",
    version,
    about = "Architect plans, driver implements, navigator reviews."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one orchestrated task end to end.
    Claude(ClaudeArgs),
}

#[derive(clap::Args, Debug, Default)]
pub struct ClaudeArgs {
    /// Task prompt, given inline.
    #[arg(short = 'p', long = "prompt")]
    pub prompt: Option<String>,

    /// Task prompt, read from a file (mutually exclusive with --prompt).
    #[arg(short = 'f', long = "file")]
    pub file: Option<PathBuf>,

    /// Project directory the task applies to.
    #[arg(long = "path")]
    pub path: Option<String>,
}

/// Resolves and validates the task prompt from `--prompt` or `--file`
/// against `config`'s length and file-size limits.
fn resolve_task(args: &ClaudeArgs, config: &OrchestratorConfig) -> Result<String, CliError> {
    let task = match (&args.prompt, &args.file) {
        (Some(_), Some(_)) => {
            return Err(CliError::Validation(
                "--prompt and --file are mutually exclusive".into(),
            ))
        }
        (None, None) => {
            return Err(CliError::Validation(
                "one of --prompt or --file is required".into(),
            ))
        }
        (Some(prompt), None) => prompt.clone(),
        (None, Some(path)) => {
            let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
            let path = PathBuf::from(expanded);
            let metadata = std::fs::metadata(&path).map_err(|source| CliError::PromptFile {
                path: path.display().to_string(),
                source,
            })?;
            if !metadata.is_file() {
                return Err(CliError::Validation(format!(
                    "{} is not a regular file",
                    path.display()
                )));
            }
            if metadata.len() as usize > config.max_prompt_file_size {
                return Err(CliError::Validation(format!(
                    "{} exceeds the maximum prompt file size of {} bytes",
                    path.display(),
                    config.max_prompt_file_size
                )));
            }
            std::fs::read_to_string(&path).map_err(|source| CliError::PromptFile {
                path: path.display().to_string(),
                source,
            })?
        }
    };

    if task.is_empty() || task.len() > config.max_prompt_length {
        return Err(CliError::Validation(format!(
            "task prompt must be between 1 and {} characters",
            config.max_prompt_length
        )));
    }

    Ok(task)
}

/// Validates `--path`, expanding `~`, if given.
fn resolve_project_path(args: &ClaudeArgs) -> Result<Option<PathBuf>, CliError> {
    let Some(path) = &args.path else {
        return Ok(None);
    };
    let expanded = shellexpand::tilde(path).into_owned();
    let path = PathBuf::from(expanded);
    if !path.is_dir() {
        return Err(CliError::Validation(format!(
            "{} does not exist or is not a directory",
            path.display()
        )));
    }
    Ok(Some(path))
}

/// Runs the `claude` subcommand to completion, returning the process exit
/// code. `0` for normal completion (including a driver that never gets a
/// review verdict, which still counts as a graceful stop); `1` for any
/// validation or orchestrator failure.
///
/// Everything fallible happens in [`run_claude_inner`]; this is just the
/// outermost boundary that turns an `anyhow::Error` into an exit code.
pub async fn run_claude(args: ClaudeArgs) -> i32 {
    match run_claude_inner(args).await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {err}");
            1
        }
    }
}

async fn run_claude_inner(args: ClaudeArgs) -> anyhow::Result<()> {
    let config = OrchestratorConfig::from_env()?;
    let task = resolve_task(&args, &config)?;
    resolve_project_path(&args)?;

    let diagnostic_log = resolve_log_path()
        .ok()
        .and_then(|path| DiagnosticLog::open(path).ok())
        .map(Arc::new);

    let providers = AgentProviders {
        architect: Arc::new(MockProviderPort::new()),
        navigator: Arc::new(MockProviderPort::new()),
        driver: Arc::new(MockProviderPort::new()),
    };
    let orchestrator = Orchestrator::new(config, providers, diagnostic_log);

    println!("mixtape v{}", env!("CARGO_PKG_VERSION"));
    println!("task: {task}\n");

    let outcome = orchestrator.run(&task).await?;
    println!("plan:\n{}\n", outcome.plan);
    println!("driver:\n{}\n", outcome.final_driver_text);
    if outcome.review_passed {
        println!("review: passed");
    } else {
        println!("review: stopped without a verdict");
    }
    Ok(())
}
