use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use diffsentry::adapters::llm::{create_backend, BackendConfig};
use diffsentry::config::{Config, Settings};
use diffsentry::core::walker;
use diffsentry::github::GithubClient;
use diffsentry::Orchestrator;

#[derive(Parser)]
#[command(name = "diffsentry")]
#[command(about = "Posts LLM review comments on labeled pull requests", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Review the target pull request and post comments
    Run {
        #[arg(long, help = "Repository as owner/name (defaults to GITHUB_REPOSITORY)")]
        repo: Option<String>,

        #[arg(long, help = "Pull request number (defaults to PR_NUMBER)")]
        pr: Option<u64>,

        #[arg(long, help = "Trigger label (defaults to TRIGGER_LABEL)")]
        label: Option<String>,

        #[arg(long, help = "LLM provider: anthropic or openai")]
        provider: Option<String>,

        #[arg(long, help = "Model name override")]
        model: Option<String>,
    },
    /// Print a minified dump of the repository for prompt debugging
    Context {
        #[arg(default_value = ".")]
        path: PathBuf,

        #[arg(long, default_value_t = 60000)]
        max_chars: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Run {
            repo,
            pr,
            label,
            provider,
            model,
        } => {
            run_command(repo, pr, label, provider, model).await?;
        }
        Commands::Context { path, max_chars } => {
            let context = walker::collect_repo_context(&path, max_chars)?;
            println!("{context}");
        }
    }

    Ok(())
}

async fn run_command(
    repo: Option<String>,
    pr: Option<u64>,
    label: Option<String>,
    provider: Option<String>,
    model: Option<String>,
) -> Result<()> {
    let mut config = Config::load().unwrap_or_default();
    config.apply_env();
    config.merge_with_cli(repo, label, provider, model);

    let settings = Settings::resolve(&config, pr)?;
    info!(
        repo = %format!("{}/{}", settings.owner, settings.repo),
        pr = settings.pr_number,
        provider = %settings.provider,
        "starting review run"
    );

    let github = GithubClient::new(&settings)?;
    let backend = create_backend(&settings.provider, &BackendConfig::from_settings(&settings))?;

    let report = Orchestrator::new(&settings, &github, backend.as_ref())
        .run()
        .await?;

    if !report.eligible {
        info!("pull request not eligible for review, nothing to do");
    }

    Ok(())
}
