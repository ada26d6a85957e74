use std::io::Read;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tfcomment::config::Config;
use tfcomment::notify::{Notifier, RunParameters};
use tfcomment::terraform::OutputParser;

#[derive(Parser)]
#[command(name = "tfcomment", about = "Posts Terraform results as pull request comments")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Pull request number
    #[arg(long)]
    pr: Option<u64>,

    /// Commit revision, used when no PR number is known
    #[arg(long)]
    sha: Option<String>,

    /// CI platform name (e.g. "github-actions")
    #[arg(long, default_value = "")]
    ci_name: String,

    /// Exit code of the terraform command whose output is on stdin
    #[arg(long, default_value_t = 0)]
    exit_code: i32,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Notify the result of `terraform plan`
    Plan,
    /// Notify the result of `terraform apply`
    Apply,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(pr) = cli.pr {
        config.pr.number = Some(pr);
    }
    if let Some(sha) = cli.sha {
        config.pr.revision = sha;
    }

    let parser = match cli.command {
        Command::Plan => OutputParser::plan(),
        Command::Apply => OutputParser::apply(),
    };

    let mut combined_output = String::new();
    std::io::stdin().read_to_string(&mut combined_output)?;

    let notifier = Notifier::github(config, parser)?;
    let params = RunParameters {
        stdout: combined_output.clone(),
        stderr: String::new(),
        combined_output,
        exit_code: cli.exit_code,
        ci_name: cli.ci_name,
    };

    match notifier.notify(params).await {
        Ok(outcome) => std::process::exit(outcome.exit_code),
        Err(e) => {
            tracing::error!(error = %e, "notification failed");
            std::process::exit(if e.exit_code != 0 { e.exit_code } else { 1 });
        }
    }
}
