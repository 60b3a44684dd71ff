use clap::{Parser, Subcommand};
use std::path::PathBuf;

fn get_version() -> &'static str {
    const BASE_VERSION: &str = env!("CARGO_PKG_VERSION");

    // If there's a git tag at HEAD, use just the tag (release build)
    if let Some(tag) = option_env!("BINMGR_GIT_TAG") {
        return tag;
    }

    let commit = option_env!("BINMGR_GIT_COMMIT").unwrap_or("unknown");
    let branch = option_env!("BINMGR_GIT_BRANCH").unwrap_or("unknown");

    // Leaked once at startup
    let version = format!("v{}-{} ({})", BASE_VERSION, commit, branch);
    Box::leak(version.into_boxed_str())
}

#[derive(Parser)]
#[command(name = "binmgr")]
#[command(about = "Keeps Linux binaries installed from the latest GitHub release of their projects")]
#[command(version = get_version(), propagate_version = true)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (use multiple times for more detail)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Reduce output to errors only
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Install or update configured programs (default)
    Update {
        /// Only process these programs
        #[arg(long = "only", value_name = "PROGRAM")]
        only: Vec<String>,

        /// Do not offer to retry failed programs
        #[arg(long)]
        no_retry: bool,
    },

    /// List configured programs and their installed versions
    List,

    /// Show the current version
    Version,
}
