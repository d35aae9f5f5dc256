//! CLI command definitions and execution
//!
//! Every file command goes through the same steps: load configuration, build
//! the backend registry, parse the URIs, and hand the operation to the
//! Manager.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use filer_core::{
    BackendRegistry, Config, ConfigManager, Error, LOCAL_SCHEME, LocalBackend, Manager,
    OBJECT_STORE_SCHEME, Uri, parse_uri,
};
use filer_s3::S3Backend;

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

mod completions;
mod cp;
mod ls;
mod mkdir;
mod mv;
mod rm;

/// filer - file manager across local disk and cloud object storage
///
/// URIs without a scheme are local paths; `gs://bucket/key` addresses the
/// object store.
#[derive(Parser, Debug)]
#[command(name = "filer")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format: human-readable or JSON
    #[arg(long, global = true, default_value = "false")]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true, default_value = "false")]
    pub no_color: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true, default_value = "false")]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(short, long, global = true, default_value = "false")]
    pub verbose: bool,

    /// Configuration file
    #[arg(long, global = true, env = "FILER_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Copy files and directories (local<->gs, gs<->gs)
    Cp(cp::CpArgs),

    /// Move files and directories (copy + delete source)
    Mv(mv::MvArgs),

    /// List a directory
    Ls(ls::LsArgs),

    /// Remove files and directories
    Rm(rm::RmArgs),

    /// Create a directory, or a bucket for `gs://bucket`
    Mkdir(mkdir::MkdirArgs),

    /// Generate shell completion scripts
    Completions(completions::CompletionsArgs),
}

/// Execute the CLI command and return an exit code
pub async fn execute(cli: Cli) -> ExitCode {
    let formatter = Formatter::new(OutputConfig {
        json: cli.json,
        no_color: cli.no_color,
        quiet: cli.quiet,
    });

    if let Commands::Completions(args) = cli.command {
        return completions::execute(args);
    }

    let config = match load_config(cli.config) {
        Ok(config) => config,
        Err(e) => return fail(&formatter, &e),
    };
    let registry = build_registry(&config);
    let manager = Manager::new(&registry);

    match cli.command {
        Commands::Cp(args) => cp::execute(args, &manager, &formatter).await,
        Commands::Mv(args) => mv::execute(args, &manager, &formatter).await,
        Commands::Ls(args) => ls::execute(args, &manager, &formatter).await,
        Commands::Rm(args) => rm::execute(args, &manager, &formatter).await,
        Commands::Mkdir(args) => mkdir::execute(args, &manager, &formatter).await,
        Commands::Completions(args) => completions::execute(args),
    }
}

fn load_config(path: Option<PathBuf>) -> filer_core::Result<Config> {
    let manager = match path {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new()?,
    };
    tracing::debug!(path = %manager.config_path().display(), "loading configuration");
    manager.load_with_env()
}

/// Register the local backend and the object-store backend
pub fn build_registry(config: &Config) -> BackendRegistry {
    BackendRegistry::new()
        .with_backend(LOCAL_SCHEME, Arc::new(LocalBackend::new()))
        .with_backend(OBJECT_STORE_SCHEME, Arc::new(S3Backend::new(config.gs.clone())))
}

/// Print an error and map it to its exit code
fn fail(formatter: &Formatter, err: &Error) -> ExitCode {
    formatter.error(&err.to_string());
    ExitCode::from(err)
}

/// Parse a source/target pair, reporting the first invalid one
fn parse_pair(source: &str, target: &str) -> filer_core::Result<(Uri, Uri)> {
    Ok((parse_uri(source)?, parse_uri(target)?))
}
