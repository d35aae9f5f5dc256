//! filer - file manager across local disk and cloud object storage
//!
//! Copies, moves, lists and deletes files on the local filesystem and on
//! Google Cloud Storage (`gs://`) with one set of commands.

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use filer_cli::commands::{self, Cli};

/// Log filter used with `--verbose` when RUST_LOG is unset
const VERBOSE_FILTER: &str = "warn,filer_core=debug,filer_s3=debug,filer_cli=debug";

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    // RUST_LOG takes precedence over --verbose
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if cli.verbose { VERBOSE_FILTER } else { "warn" })
    });
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(!cli.no_color),
        )
        .with(filter)
        .init();

    commands::execute(cli).await.into()
}
