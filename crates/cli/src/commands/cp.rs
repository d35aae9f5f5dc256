//! cp command - Copy files and directories
//!
//! Copies between the local filesystem and the object store, or within
//! either one.

use clap::Args;
use filer_core::Manager;
use serde::Serialize;

use super::{fail, parse_pair};
use crate::exit_code::ExitCode;
use crate::output::Formatter;

/// Copy files and directories
#[derive(Args, Debug)]
pub struct CpArgs {
    /// Source URI (local path or gs://bucket/key)
    pub source: String,

    /// Destination URI (local path or gs://bucket/key)
    pub target: String,

    /// Copy directories recursively
    #[arg(short, long)]
    pub recursive: bool,
}

#[derive(Debug, Serialize)]
struct CpOutput {
    status: &'static str,
    source: String,
    target: String,
    recursive: bool,
}

/// Execute the cp command
pub async fn execute(args: CpArgs, manager: &Manager<'_>, formatter: &Formatter) -> ExitCode {
    let (source, target) = match parse_pair(&args.source, &args.target) {
        Ok(pair) => pair,
        Err(e) => return fail(formatter, &e),
    };
    tracing::debug!(source = %source, target = %target, "cp");

    let copied = match manager.copy(&source, &target, args.recursive).await {
        Ok(copied) => copied,
        Err(e) => return fail(formatter, &e),
    };

    formatter.done(
        &CpOutput {
            status: "success",
            source: source.to_string(),
            target: copied.to_string(),
            recursive: args.recursive,
        },
        &format!("Copied {source} -> {copied}"),
    );
    ExitCode::Success
}
