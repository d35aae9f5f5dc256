//! Filesystem entries returned by backend queries

use serde::{Deserialize, Serialize};

use crate::uri::Uri;

/// A single entry (file or directory) in a listing or a stat result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Location of the entry
    pub uri: Uri,

    /// Whether this is a directory (or a prefix on an object store)
    pub is_dir: bool,
}

impl Node {
    pub fn new(uri: Uri, is_dir: bool) -> Self {
        Self { uri, is_dir }
    }

    /// Create a new Node for a file
    pub fn file(uri: Uri) -> Self {
        Self::new(uri, false)
    }

    /// Create a new Node for a directory/prefix
    pub fn dir(uri: Uri) -> Self {
        Self::new(uri, true)
    }

    pub fn name(&self) -> &str {
        self.uri.name()
    }
}
