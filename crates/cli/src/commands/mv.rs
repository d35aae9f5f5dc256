//! mv command - Move files and directories
//!
//! Moves are a copy followed by a delete of the source. If the delete fails
//! the copy is kept and the command fails.

use clap::Args;
use filer_core::Manager;
use serde::Serialize;

use super::{fail, parse_pair};
use crate::exit_code::ExitCode;
use crate::output::Formatter;

/// Move files and directories
#[derive(Args, Debug)]
pub struct MvArgs {
    /// Source URI (local path or gs://bucket/key)
    pub source: String,

    /// Destination URI (local path or gs://bucket/key)
    pub target: String,

    /// Move directories recursively
    #[arg(short, long)]
    pub recursive: bool,
}

#[derive(Debug, Serialize)]
struct MvOutput {
    status: &'static str,
    source: String,
    target: String,
}

/// Execute the mv command
pub async fn execute(args: MvArgs, manager: &Manager<'_>, formatter: &Formatter) -> ExitCode {
    let (source, target) = match parse_pair(&args.source, &args.target) {
        Ok(pair) => pair,
        Err(e) => return fail(formatter, &e),
    };
    tracing::debug!(source = %source, target = %target, "mv");

    let moved = match manager.move_node(&source, &target, args.recursive).await {
        Ok(moved) => moved,
        Err(e) => return fail(formatter, &e),
    };

    formatter.done(
        &MvOutput {
            status: "success",
            source: source.to_string(),
            target: moved.to_string(),
        },
        &format!("Moved {source} -> {moved}"),
    );
    ExitCode::Success
}
