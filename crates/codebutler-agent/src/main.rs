use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use codebutler_agent::dev;
use codebutler_agent::{Agent, Collaborators};
use codebutler_core::config::ButlerConfig;
use codebutler_core::paths::ButlerPaths;
use codebutler_core::types::Role;

/// One CodeButler agent process, bound to a single role.
#[derive(Debug, Parser)]
#[command(name = "codebutler", version, about)]
struct Cli {
    /// Role to run: pm, coder, reviewer, researcher, artist, or lead.
    #[arg(long)]
    role: Role,

    /// Repository root the agent serves.
    #[arg(long, default_value = ".")]
    repo: PathBuf,

    /// Explicit config path (default: <repo>/.codebutler/config.json).
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "codebutler=info".into()),
        )
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "agent exited with error");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let paths = ButlerPaths::new(&cli.repo);
    let config = ButlerConfig::load(&paths.config_file(), cli.config.as_deref())?;

    // No platform transport is wired here; the console stand-ins make the
    // binary usable for local development and smoke tests.
    let (transport, probes, executor) = dev::console_collaborators();
    let store = Arc::new(codebutler_mappings::SqliteMappingStore::open(
        &paths.mappings_db(),
    )?);

    let agent = Arc::new(Agent::new(
        cli.role,
        config,
        &paths,
        Collaborators {
            transport,
            probes,
            executor,
            store,
            runner: Arc::new(codebutler_worktree::SystemCommandRunner),
            clock: Arc::new(codebutler_core::clock::SystemClock),
        },
    )?);

    Arc::clone(agent.lifecycle()).install_signal_handlers();
    let result = agent.run().await;

    // Normal return path: same hooks, shorter deadline.
    agent.lifecycle().run_quick_hooks().await;
    info!("agent stopped");
    result.map_err(Into::into)
}
