//! ls command - List a directory
//!
//! Prints one entry per line; directories end with `/`. Listing a file
//! prints the file itself.

use clap::Args;
use filer_core::{Manager, Node, SEPARATOR, parse_uri};
use serde::Serialize;

use super::fail;
use crate::exit_code::ExitCode;
use crate::output::Formatter;

/// List a directory
#[derive(Args, Debug)]
pub struct LsArgs {
    /// Directory URI (local path or gs://bucket[/prefix])
    #[arg(default_value = ".")]
    pub path: String,

    /// List recursively
    #[arg(short, long)]
    pub recursive: bool,
}

/// Output structure for ls command (JSON format)
#[derive(Debug, Serialize)]
struct LsOutput {
    items: Vec<Node>,
    total: usize,
}

/// Execute the ls command
pub async fn execute(args: LsArgs, manager: &Manager<'_>, formatter: &Formatter) -> ExitCode {
    let uri = match parse_uri(&args.path) {
        Ok(uri) => uri,
        Err(e) => return fail(formatter, &e),
    };

    let nodes = match manager.list(&uri, args.recursive).await {
        Ok(nodes) => nodes,
        Err(e) => return fail(formatter, &e),
    };

    let text = render_listing(&nodes);
    formatter.listing(
        &LsOutput {
            total: nodes.len(),
            items: nodes,
        },
        &text,
    );
    ExitCode::Success
}

fn render_listing(nodes: &[Node]) -> String {
    nodes
        .iter()
        .map(|node| {
            let location = node.uri.to_string();
            if node.is_dir && !location.ends_with(SEPARATOR) {
                format!("{location}{SEPARATOR}")
            } else {
                location
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
