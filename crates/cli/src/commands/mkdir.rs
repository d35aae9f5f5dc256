//! mkdir command - Create a directory
//!
//! On the object store a directory is a zero-length `key/` marker object;
//! `gs://bucket` on its own creates the bucket.

use clap::Args;
use filer_core::{Manager, parse_uri};

use super::fail;
use crate::exit_code::ExitCode;
use crate::output::Formatter;

/// Create a directory
#[derive(Args, Debug)]
pub struct MkdirArgs {
    /// Directory URI (local path, gs://bucket/dir or gs://bucket)
    pub path: String,
}

/// Execute the mkdir command
pub async fn execute(args: MkdirArgs, manager: &Manager<'_>, formatter: &Formatter) -> ExitCode {
    let uri = match parse_uri(&args.path) {
        Ok(uri) => uri,
        Err(e) => return fail(formatter, &e),
    };

    match manager.mkdir(&uri).await {
        Ok(node) => {
            formatter.done(&node, &format!("Created {}", node.uri));
            ExitCode::Success
        }
        Err(e) => fail(formatter, &e),
    }
}
