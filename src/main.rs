//! critic: AI-assisted pull request reviewer.
//!
//! Entry point and error handling boundary. Uses `anyhow` for
//! ergonomic error propagation and user-facing messages.

mod cli;

use critic::cancel;
use critic::config;
use critic::constants;
use critic::diff;
use critic::env;
use critic::models;
use critic::orchestrator;
use critic::providers;
use critic::publish;

use std::path::Path;
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::args::{Cli, Command, PublishTarget, ReviewArgs};
use config::Config;
use env::Env;
use models::{InputMode, ReviewMode};
use orchestrator::{PipelineError, ReviewPipeline};
use providers::rig::RigBackend;
use providers::{BackendError, ReviewClient};
use publish::{ChangeRequestApi, GithubApi, StdoutApi};

/// Exit code after Ctrl-C, following the shell convention for SIGINT.
const EXIT_CANCELLED: i32 = 130;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("Error: {err:#}");
            process::exit(1);
        }
    }
}

/// Install the stderr log subscriber.
///
/// `CRITIC_LOG` wins over `RUST_LOG`; without either, `-v` flags pick
/// the level for this crate.
fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "critic=info",
        1 => "critic=debug",
        _ => "critic=trace",
    };
    let filter = std::env::var(constants::ENV_LOG)
        .ok()
        .and_then(|v| EnvFilter::try_new(v).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Review(args) => run_review(*args).await,
        Command::Modes => run_modes(),
        Command::Version => run_version(),
    }
}

/// Print detailed version and build information.
fn run_version() -> Result<i32> {
    use colored::Colorize;

    println!(
        "{} {}",
        constants::APP_NAME.bold(),
        constants::VERSION.green().bold()
    );
    println!("{}     {}", "target:".dimmed(), constants::TARGET);
    Ok(0)
}

/// List the available review modes.
fn run_modes() -> Result<i32> {
    use colored::Colorize;
    use strum::IntoEnumIterator;

    for mode in ReviewMode::iter() {
        let marker = if mode == ReviewMode::default() {
            " (default)".dimmed().to_string()
        } else {
            String::new()
        };
        println!(
            "  {:<12} {}{marker}",
            mode.to_string().bold(),
            mode.description().dimmed()
        );
    }
    Ok(0)
}

async fn run_review(args: ReviewArgs) -> Result<i32> {
    let input_mode = args
        .validate_input()
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    // Resolve repo / working directory from --path (default: cwd)
    let base_dir = std::fs::canonicalize(&args.path)
        .with_context(|| format!("--path directory not found: {}", args.path.display()))?;
    let repo_root = match diff::git::find_repo_root(&base_dir).await {
        Ok(root) => root,
        Err(_) => base_dir.display().to_string(),
    };
    let repo_root_path = Path::new(&repo_root);

    let mut config = Config::load(Some(repo_root_path), &Env::real())
        .context("failed to load configuration")?;
    args.apply_overrides(&mut config);
    tracing::debug!(?config, "resolved configuration");

    let raw_diff = diff::read_raw_diff(&input_mode, repo_root_path)
        .await
        .context("failed to read diff")?;
    if raw_diff.trim().is_empty() {
        eprintln!("No changes to review.");
        return Ok(0);
    }

    let api: Arc<dyn ChangeRequestApi> = match args.publish {
        PublishTarget::Stdout => Arc::new(StdoutApi::new()),
        PublishTarget::Github => {
            if config.github.commit.is_none() {
                if let InputMode::GitRange { ref head, .. } = input_mode {
                    config.github.commit = diff::git::resolve_commit(repo_root_path, head).await.ok();
                }
            }
            Arc::new(GithubApi::from_config(&config.github).context("cannot publish to GitHub")?)
        }
    };

    let backend = match RigBackend::new(config.provider.clone()) {
        Ok(backend) => backend,
        Err(BackendError::InvalidCredential(msg)) => return Ok(fail_credential(&msg)),
        Err(err) => return Err(err).context("failed to set up model provider"),
    };
    let client = ReviewClient::new(
        Arc::new(backend),
        config.provider.model.clone(),
        config.provider.retry_policy(),
        config.provider.timeout(),
    );
    let pipeline = ReviewPipeline::new(client, api, &config.review)
        .context("invalid review settings")?;

    let (handle, token) = cancel::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted; finishing completed chunks");
            handle.cancel();
        }
    });

    let report = match pipeline.run(&raw_diff, &token).await {
        Ok(report) => report,
        Err(PipelineError::InvalidCredential(msg)) => return Ok(fail_credential(&msg)),
        Err(err) => return Err(err).context("review failed"),
    };

    print_status(&report);
    Ok(if report.cancelled { EXIT_CANCELLED } else { 0 })
}

/// Report an unusable credential and return the exit code.
fn fail_credential(msg: &str) -> i32 {
    use colored::Colorize;
    eprintln!(
        "\n  {} {}\n  {}\n",
        "✖".red().bold(),
        "The model provider rejected the credential.".red(),
        msg.dimmed(),
    );
    1
}

/// One-line run status on stderr.
fn print_status(report: &models::RunReport) {
    use colored::Colorize;

    let failures = report.failures().count();
    let breakdown = report
        .severity_breakdown()
        .map(|b| format!(" ({b})"))
        .unwrap_or_default();
    let line = format!(
        "Reviewed {} file(s) in {}/{} chunk(s): {} comment(s) posted{breakdown}, {} already present, {} skipped",
        report.files_reviewed,
        report.chunks_reviewed,
        report.chunks_planned,
        report.comments_posted,
        report.comments_duplicate,
        failures,
    );
    if report.cancelled {
        eprintln!("{} {}", "⚠".yellow().bold(), format!("{line} (cancelled)").yellow());
    } else if failures > 0 {
        eprintln!("{} {line}", "⚠".yellow().bold());
    } else {
        eprintln!("{} {line}", "✔".green().bold());
    }
}
