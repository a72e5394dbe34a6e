//! trackgit CLI - drive a snapshot-backed host from the shell.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use trackgit_core::{
    BuildNumber, BuildOutcome, BuildReference, EnvVars, HostError, ProjectId, ProjectRegistry,
    Revision, ScmKind, TrackingStrategy, TRACKING_BUILD_ENV,
};
use trackgit_engine::{Prediction, PropagationHook, ProvenanceQuery, TrackingForecast};
use trackgit_host::{BuildLifecycle, HostConfig, HostSnapshot, MemoryHost};

#[derive(Parser)]
#[command(name = "trackgit")]
#[command(about = "Pin builds to the revision of the upstream build they track", long_about = None)]
struct Cli {
    /// Snapshot file holding the host state
    #[arg(long, env = "TRACKGIT_STATE", default_value = "trackgit.json", global = true)]
    state: PathBuf,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Set host settings
    Init {
        /// Base URL builds are browsable under
        #[arg(long)]
        base_url: Option<String>,
        /// Let builds continue when tracking fails
        #[arg(long)]
        keep_going: bool,
    },
    #[command(flatten)]
    Host(HostCommand),
}

/// Commands that run against a loaded host.
#[derive(Subcommand)]
enum HostCommand {
    /// Register a project
    Project {
        /// Project name
        name: String,
        /// Source control: git, other or none
        #[arg(long, default_value = "git")]
        scm: String,
    },
    /// Record a finished build without running the hook
    Record {
        /// Project name
        project: String,
        /// Build outcome
        #[arg(long, default_value = "success")]
        outcome: BuildOutcome,
        /// Revision the build checked out
        #[arg(long)]
        sha: Option<String>,
    },
    /// Make a project track another one
    Configure {
        /// Dependent project
        project: String,
        /// Project to track
        #[arg(long)]
        source: String,
        /// Which build of the source to track
        #[arg(long, default_value = "last-stable")]
        strategy: TrackingStrategy,
        /// Variable holding the build number, for by-number
        #[arg(long)]
        variable: Option<String>,
    },
    /// Stop tracking
    Untrack {
        /// Dependent project
        project: String,
    },
    /// Show which build the next build of a project would track
    Resolve {
        /// Dependent project
        project: String,
    },
    /// Run a build of a project with tracking enabled
    Start {
        /// Project name
        project: String,
        /// Build parameters
        #[arg(long = "env", value_parser = parse_key_val)]
        env: Vec<(String, String)>,
        /// Branch head the checkout would use when nothing is pinned
        #[arg(long)]
        head: Option<String>,
        /// Outcome to finish the build with
        #[arg(long, default_value = "success")]
        outcome: BuildOutcome,
    },
    /// Show the provenance of a build
    Provenance {
        /// Project name
        project: String,
        /// Build number
        number: BuildNumber,
    },
    /// List the builds of a project
    History {
        /// Project name
        project: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();

    let mut snapshot = load_snapshot(&cli.state).await?;
    let command = match cli.command {
        Commands::Init { base_url, keep_going } => {
            snapshot.settings = HostConfig {
                base_url,
                fail_build_on_setup_error: !keep_going,
            };
            snapshot.save(&cli.state).await?;
            println!("Initialized {}", cli.state.display());
            return Ok(());
        }
        Commands::Host(command) => command,
    };

    let host = Arc::new(snapshot.into_host()?);
    let result = run(command, &host);

    // Failed builds are recorded too, so save before reporting errors.
    save_host(&host, &cli.state).await?;
    result
}

fn run(command: HostCommand, host: &Arc<MemoryHost>) -> Result<()> {
    let registry: Arc<dyn ProjectRegistry> = host.clone();

    match command {
        HostCommand::Project { name, scm } => {
            let scm = parse_scm(&scm).ok_or_else(|| anyhow!("unknown scm '{scm}'"))?;
            host.add_project(name.as_str(), scm)?;
            println!("Registered project {name}");
        }
        HostCommand::Record { project, outcome, sha } => {
            let revision = sha.as_deref().map(Revision::parse).transpose()?;
            let reference = host.record_build(&ProjectId::new(project), outcome, revision)?;
            println!("Recorded {reference}: {outcome}");
        }
        HostCommand::Configure { project, source, strategy, variable } => {
            let config = host.configure_tracking(
                &ProjectId::new(project.as_str()),
                &source,
                strategy,
                variable.as_deref(),
            )?;
            println!(
                "{} tracks {} ({})",
                project,
                config.source_project(),
                config.strategy()
            );
        }
        HostCommand::Untrack { project } => {
            host.clear_tracking(&ProjectId::new(project.as_str()))?;
            println!("{project} tracks nothing");
        }
        HostCommand::Resolve { project } => {
            let config = tracking_of(host, &project)?;
            let forecast = TrackingForecast::new(registry);
            match forecast.next_tracked_build(&config)? {
                Prediction::Next(reference) => println!("{reference}"),
                Prediction::Unpredictable => println!("unpredictable"),
            }
        }
        HostCommand::Start { project, env, head, outcome } => {
            let head = head.as_deref().map(Revision::parse).transpose()?;
            let lifecycle =
                BuildLifecycle::new().with_listener(Arc::new(PropagationHook::new(registry)));
            let parameters: EnvVars = env.into_iter().collect();
            let project = ProjectId::new(project);

            let pending = match host.start_build(&lifecycle, &project, parameters) {
                Ok(pending) => pending,
                Err(err) => {
                    print_failed_log(host, &project)?;
                    return Err(err.into());
                }
            };
            if let Some(url) = pending.environment().get(TRACKING_BUILD_ENV) {
                println!("{TRACKING_BUILD_ENV}={url}");
            }
            let reference = pending.reference().clone();
            let done = pending.finish(head, outcome)?;

            for line in host.console_log(&reference)? {
                println!("{line}");
            }
            match done.build_data {
                Some(data) => println!("{reference}: {outcome} at {}", data.last_built_revision),
                None => println!("{reference}: {outcome}"),
            }
        }
        HostCommand::Provenance { project, number } => {
            let reference = BuildReference::new(project, number);
            let query = ProvenanceQuery::new(registry);
            let Some(record) = query.of_build(&reference)? else {
                println!("{reference} tracked nothing");
                return Ok(());
            };
            let view = query.view(&record);
            println!(
                "{} tracked {} #{}",
                reference,
                view.tracked_project_id(),
                view.tracked_build_number()
            );
            println!("  Attached: {}", record.attached_at());
            match view.tracked_build_url() {
                Some(url) => println!("  URL: {url}"),
                None => println!("  URL: unavailable"),
            }
        }
        HostCommand::History { project } => {
            let id = ProjectId::new(project);
            let found = host
                .lookup_project(&id)?
                .ok_or_else(|| HostError::UnknownProject(id.clone()))?;
            println!("Builds of {} ({})", id, found.history.len());
            for build in found.history.iter() {
                let outcome = build
                    .outcome
                    .map(|o| o.to_string())
                    .unwrap_or_else(|| "RUNNING".to_string());
                let revision = build
                    .build_data
                    .as_ref()
                    .map(|d| d.last_built_revision.short())
                    .unwrap_or_else(|| "-".to_string());
                let tracked = build
                    .provenance
                    .as_ref()
                    .map(|p| format!(" <- {}", p.tracked()))
                    .unwrap_or_default();
                println!("  #{} | {} | {}{}", build.number, outcome, revision, tracked);
            }
        }
    }

    Ok(())
}

async fn load_snapshot(path: &Path) -> Result<HostSnapshot> {
    if !path.exists() {
        debug!("{} does not exist, starting empty", path.display());
        return Ok(HostSnapshot::default());
    }
    HostSnapshot::load(path)
        .await
        .with_context(|| format!("reading {}", path.display()))
}

async fn save_host(host: &MemoryHost, path: &Path) -> Result<()> {
    HostSnapshot::capture(host)?
        .save(path)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    info!("Saved {}", path.display());
    Ok(())
}

fn tracking_of(host: &MemoryHost, project: &str) -> Result<trackgit_core::TrackingConfiguration> {
    let id = ProjectId::new(project);
    let found = host
        .lookup_project(&id)?
        .ok_or_else(|| HostError::UnknownProject(id.clone()))?;
    found
        .tracking
        .ok_or_else(|| anyhow!("{project} does not track any project"))
}

fn print_failed_log(host: &MemoryHost, project: &ProjectId) -> Result<()> {
    let Some(found) = host.lookup_project(project)? else {
        return Ok(());
    };
    if let Some(last) = found.history.last_build() {
        for line in host.console_log(&last.reference())? {
            println!("{line}");
        }
    }
    Ok(())
}

fn parse_scm(s: &str) -> Option<ScmKind> {
    match s.to_lowercase().as_str() {
        "git" => Some(ScmKind::Git),
        "other" => Some(ScmKind::Other),
        "none" => Some(ScmKind::None),
        _ => None,
    }
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_init_is_parsed_apart_from_host_commands() {
        let cli = Cli::try_parse_from(["trackgit", "init", "--keep-going"]).unwrap();
        assert!(matches!(cli.command, Commands::Init { keep_going: true, .. }));

        let cli = Cli::try_parse_from([
            "trackgit", "start", "b", "--env", "REV=3", "--outcome", "unstable",
        ])
        .unwrap();
        match cli.command {
            Commands::Host(HostCommand::Start { project, env, outcome, .. }) => {
                assert_eq!(project, "b");
                assert_eq!(env, vec![("REV".to_string(), "3".to_string())]);
                assert_eq!(outcome, BuildOutcome::Unstable);
            }
            _ => panic!("expected start"),
        }
    }
}
