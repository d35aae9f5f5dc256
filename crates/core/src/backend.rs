//! Backend trait definition
//!
//! Every storage provider implements [`Backend`]. The manager only ever talks
//! to providers through this trait, so backend-specific behavior (simulated
//! directories, sessions, multipart uploads) stays inside each implementation.

use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::error::Result;
use crate::node::Node;
use crate::uri::Uri;

/// Sequential byte source opened by [`Backend::reader`]
pub type NodeReader = Box<dyn AsyncRead + Send + Unpin>;

/// Sequential byte sink opened by [`Backend::writer`]
///
/// Data is only committed by [`NodeWriter::close`]. A writer dropped without
/// being closed leaves the destination in a backend-defined state.
#[async_trait]
pub trait NodeWriter: Send {
    /// Append a chunk
    async fn write(&mut self, buf: &[u8]) -> Result<()>;

    /// Flush and commit everything written so far
    async fn close(self: Box<Self>) -> Result<()>;

    /// Discard the pending write
    async fn abort(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

/// Capability interface of a storage provider
///
/// `connect` must be called before any other method and `disconnect` after
/// the operation completes; the manager takes care of both.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Backend: Send + Sync {
    /// Establish the session; a no-op for backends without one
    async fn connect(&self) -> Result<()>;

    /// Release the session
    async fn disconnect(&self) -> Result<()>;

    /// Open a destination for sequential writing, creating it if absent
    async fn writer(&self, uri: &Uri) -> Result<Box<dyn NodeWriter>>;

    /// Open a source for sequential reading
    async fn reader(&self, uri: &Uri) -> Result<NodeReader>;

    /// Remove a file, or a directory tree when `recursive` is set
    async fn delete(&self, uri: &Uri, recursive: bool) -> Result<()>;

    /// Native copy within this backend
    async fn copy(&self, src: &Uri, dst: &Uri, recursive: bool) -> Result<()>;

    /// Enumerate one directory level, or the full subtree when `recursive`
    async fn list(&self, dir: &Uri, recursive: bool) -> Result<Vec<Node>>;

    /// Stat a single path
    async fn get(&self, uri: &Uri) -> Result<Node>;

    /// Create a directory, including missing parents
    async fn mkdir(&self, uri: &Uri) -> Result<Node>;
}
