mod cli;
mod compat;
mod config;
mod download;
mod error;
mod extract;
mod github;
mod install;
mod logging;
mod platform;
mod select;
mod types;
mod updater;
mod versions;

use anyhow::{bail, Result};
use clap::Parser;
use cli::{Cli, Commands};
use compat::AssetFilter;
use config::Config;
use console::{style, Term};
use github::GitHubClient;
use platform::{FixedArch, UnameProbe};
use indexmap::IndexMap;
use std::process::ExitCode;
use updater::{Failure, Outcome, Updater};
use versions::VersionStore;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(Commands::Version) = cli.command {
        println!("binmgr v{}", env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }

    let config = Config::load(cli.config.as_deref());
    let log_dir = match (&cli.command, &config) {
        (Some(Commands::List), _) | (_, Err(_)) => None,
        (_, Ok(config)) => Some(config.log_dir.as_path()),
    };
    match logging::setup_logging(cli.verbose, cli.quiet, log_dir) {
        Ok(Some(path)) => tracing::debug!("Logging to {}", path.display()),
        Ok(None) => {}
        Err(e) => {
            eprintln!("Failed to set up logging: {:#}", e);
            let _ = logging::setup_logging(cli.verbose, cli.quiet, None);
        }
    }

    let result = match config {
        Ok(config) => match cli.command {
            Some(Commands::List) => list_programs(&config),
            Some(Commands::Update { only, no_retry }) => {
                update_programs(&config, &only, no_retry, cli.quiet).await
            }
            None => update_programs(&config, &[], false, cli.quiet).await,
            Some(Commands::Version) => Ok(true),
        },
        Err(e) => Err(e),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("Fatal error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Keeps the config file order; unknown names are an error.
fn selected_programs(config: &Config, only: &[String]) -> Result<IndexMap<String, String>> {
    if let Some(name) = only.iter().find(|name| !config.programs.contains_key(*name)) {
        bail!(
            "'{}' is not configured in {}",
            name,
            config.path.display()
        );
    }
    Ok(config
        .programs
        .iter()
        .filter(|(name, _)| only.is_empty() || only.contains(*name))
        .map(|(name, repo)| (name.clone(), repo.clone()))
        .collect())
}

/// Returns whether every selected program ended up current.
async fn update_programs(config: &Config, only: &[String], no_retry: bool, quiet: bool) -> Result<bool> {
    let programs = selected_programs(config, only)?;
    config.ensure_directories()?;

    let result = run_updates(config, &programs, no_retry, quiet).await;
    if let Err(e) = config.cleanup() {
        tracing::warn!("{:#}", e);
    }
    result
}

async fn run_updates(
    config: &Config,
    programs: &IndexMap<String, String>,
    no_retry: bool,
    quiet: bool,
) -> Result<bool> {
    let filter = match std::env::var(config::ARCH_ENV) {
        Ok(arch) if !arch.is_empty() => AssetFilter::new(&FixedArch(arch)),
        _ => AssetFilter::new(&UnameProbe),
    };
    tracing::debug!("Host architecture: {}", filter.host_arch());
    let mut updater = Updater::new(config, GitHubClient::new()?, filter, !quiet)?;

    let mut failures = updater.run(programs).await;
    if failures.is_empty() {
        return Ok(true);
    }

    report_failures(&failures);
    if no_retry || !prompt_retry() {
        return Ok(false);
    }

    let retry: IndexMap<String, String> = failures
        .drain(..)
        .filter_map(|f| programs.get(&f.program).map(|repo| (f.program, repo.clone())))
        .collect();
    for (program, repo) in &retry {
        match updater.process_program(program, repo).await {
            Ok(outcome) => log_outcome(program, &outcome),
            Err(error) => {
                tracing::error!(program = %program, "Retry failed: {:#}", error);
                failures.push(Failure {
                    program: program.clone(),
                    error,
                });
            }
        }
    }
    Ok(failures.is_empty())
}

fn log_outcome(program: &str, outcome: &Outcome) {
    match outcome {
        Outcome::Updated { version, path } => {
            tracing::info!(program, "Updated to {} at {}", version, path.display())
        }
        Outcome::UpToDate { version } => tracing::info!(program, "Already at {}", version),
    }
}

fn report_failures(failures: &[Failure]) {
    eprintln!();
    eprintln!("{}", style("The following programs failed to update:").yellow());
    for failure in failures {
        eprintln!("  {}: {:#}", style(&failure.program).red(), failure.error);
    }
}

fn prompt_retry() -> bool {
    let term = Term::stderr();
    if !term.is_term() {
        return false;
    }
    if term
        .write_str("\nWould you like to retry failed updates? (y/n): ")
        .is_err()
    {
        return false;
    }
    match term.read_line() {
        Ok(answer) => answer.trim().eq_ignore_ascii_case("y"),
        Err(_) => false,
    }
}

fn list_programs(config: &Config) -> Result<bool> {
    let versions = VersionStore::load(&config.version_file)?;

    println!("--- Configured programs ({}) ---", config.path.display());
    if config.programs.is_empty() {
        println!("  No programs configured.");
        return Ok(true);
    }
    for (program, repo) in &config.programs {
        match versions.get(program) {
            Some(record) => println!(
                "  - {} ({}) {} installed {}",
                program,
                repo,
                record.version,
                record.installation_date.format("%Y-%m-%d %H:%M")
            ),
            None => println!("  - {} ({}) not installed", program, repo),
        }
    }
    Ok(true)
}
