//! Cross-backend orchestration
//!
//! The [`Manager`] runs every operation through the same lifecycle: resolve
//! the backend of each URI, connect each distinct backend once, execute, then
//! disconnect everything that was connected. Copy and move pick a native
//! backend copy when both ends live on the same backend and fall back to
//! streaming otherwise.

use std::sync::Arc;

use tokio::io::AsyncReadExt;

use crate::backend::{Backend, NodeReader, NodeWriter};
use crate::error::{Error, Result};
use crate::local::canonical_uri;
use crate::node::Node;
use crate::registry::BackendRegistry;
use crate::uri::Uri;

/// Chunk size of the cross-backend stream copy
const TRANSFER_BUFFER_SIZE: usize = 64 * 1024;

/// Runs file operations against the backends of a registry
#[derive(Debug, Clone, Copy)]
pub struct Manager<'a> {
    registry: &'a BackendRegistry,
}

/// Backends connected for the duration of one operation
struct Session {
    /// Backend of each URI passed to `open`, in order
    resolved: Vec<Arc<dyn Backend>>,

    /// Distinct connected backends with their scheme
    connected: Vec<(String, Arc<dyn Backend>)>,
}

impl Session {
    fn backend(&self, index: usize) -> &Arc<dyn Backend> {
        &self.resolved[index]
    }

    /// Disconnect every backend and merge the outcome with `result`
    ///
    /// An error from the operation itself takes priority; disconnect failures
    /// are then only logged.
    async fn close<T>(self, result: Result<T>) -> Result<T> {
        let mut failure = None;
        for (scheme, backend) in &self.connected {
            tracing::debug!(scheme = %scheme, "disconnecting backend");
            if let Err(e) = backend.disconnect().await {
                tracing::warn!(scheme = %scheme, "failed to disconnect backend: {e}");
                if failure.is_none() {
                    failure = Some(Error::Disconnect {
                        scheme: scheme.clone(),
                        source: Box::new(e),
                    });
                }
            }
        }

        match (result, failure) {
            (Err(e), _) => Err(e),
            (Ok(_), Some(e)) => Err(e),
            (Ok(value), None) => Ok(value),
        }
    }
}

impl<'a> Manager<'a> {
    pub fn new(registry: &'a BackendRegistry) -> Self {
        Self { registry }
    }

    /// Resolve and connect the backends of `uris`
    async fn open(&self, uris: &[&Uri]) -> Result<Session> {
        let mut resolved = Vec::with_capacity(uris.len());
        for uri in uris {
            resolved.push(self.registry.resolve(uri)?);
        }

        let mut session = Session {
            resolved,
            connected: Vec::new(),
        };

        for (uri, backend) in uris.iter().zip(session.resolved.clone()) {
            if session
                .connected
                .iter()
                .any(|(_, connected)| Arc::ptr_eq(connected, &backend))
            {
                continue;
            }

            let scheme = uri.scheme().to_string();
            tracing::debug!(scheme = %scheme, "connecting backend");
            if let Err(e) = backend.connect().await {
                let error = Error::Connect {
                    scheme,
                    source: Box::new(e),
                };
                // Release what this operation already holds
                return session.close(Err(error)).await;
            }
            session.connected.push((scheme, backend));
        }

        Ok(session)
    }

    /// Copy `src` to `dst`
    ///
    /// The destination is `dst/<name of src>` when `dst` ends with a
    /// separator, when `src` is a directory, or when `dst` is an existing
    /// directory; otherwise it is `dst` itself. Returns that destination.
    ///
    /// On a single backend the destination must not be `src` or lie inside
    /// it; that is rejected with [`Error::Overlap`] before anything is
    /// written.
    pub async fn copy(&self, src: &Uri, dst: &Uri, recursive: bool) -> Result<Uri> {
        let session = self.open(&[src, dst]).await?;
        let result = copy_between(session.backend(0), session.backend(1), src, dst, recursive).await;
        session.close(result).await
    }

    /// Move `src` to `dst`: a copy followed by a delete of the source
    ///
    /// Not atomic. If deleting the source fails, both copies are left in
    /// place and the delete error is returned. Destinations resolve as for
    /// [`Manager::copy`].
    pub async fn move_node(&self, src: &Uri, dst: &Uri, recursive: bool) -> Result<Uri> {
        let session = self.open(&[src, dst]).await?;
        let result = move_between(session.backend(0), session.backend(1), src, dst, recursive).await;
        session.close(result).await
    }

    /// List the entries under `dir`
    pub async fn list(&self, dir: &Uri, recursive: bool) -> Result<Vec<Node>> {
        let session = self.open(&[dir]).await?;
        let result = session.backend(0).list(dir, recursive).await;
        session.close(result).await
    }

    /// Delete a file, or a directory tree when `recursive` is set
    pub async fn delete(&self, uri: &Uri, recursive: bool) -> Result<()> {
        let session = self.open(&[uri]).await?;
        let result = session.backend(0).delete(uri, recursive).await;
        session.close(result).await
    }

    /// Create a directory
    pub async fn mkdir(&self, uri: &Uri) -> Result<Node> {
        let session = self.open(&[uri]).await?;
        let result = session.backend(0).mkdir(uri).await;
        session.close(result).await
    }
}

/// Copy and return the resolved destination
async fn copy_between(
    src_backend: &Arc<dyn Backend>,
    dst_backend: &Arc<dyn Backend>,
    src: &Uri,
    dst: &Uri,
    recursive: bool,
) -> Result<Uri> {
    let node = src_backend.get(src).await?;
    let target = resolve_destination(dst_backend.as_ref(), &node, dst).await?;
    tracing::debug!(src = %src, dst = %target, recursive, "copying");

    if Arc::ptr_eq(src_backend, dst_backend) {
        check_overlap(src, &target).await?;
        src_backend.copy(src, &target, recursive).await?;
        return Ok(target);
    }

    if !node.is_dir {
        transfer(src_backend.as_ref(), src, dst_backend.as_ref(), &target).await?;
        return Ok(target);
    }

    ensure_dir(dst_backend.as_ref(), &target).await?;
    for child in src_backend.list(src, recursive).await? {
        let relative = child
            .uri
            .relative_to(src)
            .ok_or_else(|| Error::Walk(format!("{} is not under {src}", child.uri)))?;
        if relative.is_empty() {
            continue;
        }

        let dest = target.join(relative);
        if child.is_dir {
            ensure_dir(dst_backend.as_ref(), &dest).await?;
        } else {
            transfer(src_backend.as_ref(), &child.uri, dst_backend.as_ref(), &dest).await?;
        }
    }
    Ok(target)
}

async fn move_between(
    src_backend: &Arc<dyn Backend>,
    dst_backend: &Arc<dyn Backend>,
    src: &Uri,
    dst: &Uri,
    recursive: bool,
) -> Result<Uri> {
    if !recursive {
        let node = src_backend.get(src).await?;
        if node.is_dir && !src_backend.list(src, false).await?.is_empty() {
            return Err(Error::DirectoryNotEmpty(src.to_string()));
        }
    }

    let target = copy_between(src_backend, dst_backend, src, dst, recursive).await?;

    if let Err(e) = src_backend.delete(src, recursive).await {
        tracing::warn!(
            "moved {src} to {target} but could not delete the source; both copies remain"
        );
        return Err(e);
    }
    Ok(target)
}

/// Fail when `target` is `src` or lies inside it
///
/// Local paths are canonicalized first so that `.`, `..` and symbolic links
/// cannot hide the overlap; other schemes compare paths lexically.
async fn check_overlap(src: &Uri, target: &Uri) -> Result<()> {
    let overlaps = if src.is_local() && target.is_local() {
        canonical_uri(src).await.contains(&canonical_uri(target).await)
    } else {
        src.contains(target)
    };
    if overlaps {
        return Err(Error::Overlap {
            src: src.to_string(),
            dst: target.to_string(),
        });
    }
    Ok(())
}

async fn resolve_destination(backend: &dyn Backend, src: &Node, dst: &Uri) -> Result<Uri> {
    if dst.has_trailing_separator() || src.is_dir {
        return Ok(dst.join(src.name()));
    }
    match backend.get(dst).await {
        Ok(existing) if existing.is_dir => Ok(dst.join(src.name())),
        Ok(_) => Ok(dst.clone()),
        Err(e) if e.is_not_found() => Ok(dst.clone()),
        Err(e) => Err(e),
    }
}

/// Create a directory, reusing an existing one
async fn ensure_dir(backend: &dyn Backend, uri: &Uri) -> Result<()> {
    match backend.mkdir(uri).await {
        Ok(_) => Ok(()),
        Err(Error::AlreadyExists(path)) => match backend.get(uri).await {
            Ok(node) if node.is_dir => Ok(()),
            _ => Err(Error::AlreadyExists(path)),
        },
        Err(e) => Err(e),
    }
}

/// Stream one file from `src` to `dst`
async fn transfer(src_backend: &dyn Backend, src: &Uri, dst_backend: &dyn Backend, dst: &Uri) -> Result<()> {
    tracing::debug!(src = %src, dst = %dst, "streaming file");
    let mut reader = src_backend.reader(src).await?;
    let mut writer = dst_backend.writer(dst).await?;

    match pump(&mut reader, writer.as_mut(), src).await {
        Ok(bytes) => {
            writer.close().await?;
            tracing::debug!(dst = %dst, bytes, "file committed");
            Ok(())
        }
        Err(e) => {
            if let Err(abort_err) = writer.abort().await {
                tracing::warn!(dst = %dst, "failed to abort write: {abort_err}");
            }
            Err(e)
        }
    }
}

async fn pump(reader: &mut NodeReader, writer: &mut dyn NodeWriter, src: &Uri) -> Result<u64> {
    let mut buf = vec![0u8; TRANSFER_BUFFER_SIZE];
    let mut total = 0u64;
    loop {
        let n = reader
            .read(&mut buf)
            .await
            .map_err(|e| Error::from_io(e, "read", src.to_string()))?;
        if n == 0 {
            return Ok(total);
        }
        writer.write(&buf[..n]).await?;
        total += n as u64;
    }
}
