//! rm command - Remove files and directories

use clap::Args;
use filer_core::{Manager, parse_uri};
use serde::Serialize;

use super::fail;
use crate::exit_code::ExitCode;
use crate::output::Formatter;

/// Remove files and directories
#[derive(Args, Debug)]
pub struct RmArgs {
    /// URI to remove (local path, gs://bucket/key or gs://bucket)
    pub path: String,

    /// Remove directories and their contents recursively
    #[arg(short, long)]
    pub recursive: bool,
}

#[derive(Debug, Serialize)]
struct RmOutput {
    status: &'static str,
    deleted: String,
}

/// Execute the rm command
pub async fn execute(args: RmArgs, manager: &Manager<'_>, formatter: &Formatter) -> ExitCode {
    let uri = match parse_uri(&args.path) {
        Ok(uri) => uri,
        Err(e) => return fail(formatter, &e),
    };

    if let Err(e) = manager.delete(&uri, args.recursive).await {
        return fail(formatter, &e);
    }

    formatter.done(
        &RmOutput {
            status: "success",
            deleted: uri.to_string(),
        },
        &format!("Removed {uri}"),
    );
    ExitCode::Success
}
