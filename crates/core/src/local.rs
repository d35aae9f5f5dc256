//! Local filesystem backend
//!
//! Implements [`Backend`] over the host filesystem. URI paths are used as
//! native paths, relative ones resolving against the working directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::backend::{Backend, NodeReader, NodeWriter};
use crate::error::{Error, Result};
use crate::node::Node;
use crate::uri::Uri;

/// Backend over the host filesystem
#[derive(Debug, Default, Clone)]
pub struct LocalBackend;

impl LocalBackend {
    pub fn new() -> Self {
        Self
    }

    async fn is_empty_dir(&self, uri: &Uri) -> Result<bool> {
        let mut entries = fs::read_dir(uri.path())
            .await
            .map_err(|e| Error::from_io(e, "read directory", uri.to_string()))?;
        let first = entries
            .next_entry()
            .await
            .map_err(|e| Error::from_io(e, "read directory", uri.to_string()))?;
        Ok(first.is_none())
    }

    async fn copy_file(&self, src: &Uri, dst: &Uri) -> Result<()> {
        // Copying a file onto itself would truncate it
        if let (Ok(from), Ok(to)) = (
            fs::canonicalize(src.path()).await,
            fs::canonicalize(dst.path()).await,
        ) && from == to
        {
            return Err(overlap(src, dst));
        }
        create_parent(dst).await?;
        fs::copy(src.path(), dst.path())
            .await
            .map_err(|e| Error::from_io(e, "copy", format!("{src} -> {dst}")))?;
        Ok(())
    }

    async fn ensure_dir(&self, uri: &Uri) -> Result<()> {
        fs::create_dir_all(uri.path())
            .await
            .map_err(|e| Error::from_io(e, "create directory", uri.to_string()))
    }
}

/// Resolve a local URI to its canonical form
///
/// The longest existing ancestor is canonicalized and the missing components
/// are appended unchanged, so the path need not exist. Falls back to the URI
/// as given when nothing along the path resolves.
pub(crate) async fn canonical_uri(uri: &Uri) -> Uri {
    let mut existing = if uri.path().is_empty() {
        PathBuf::from(".")
    } else {
        PathBuf::from(uri.path())
    };
    let mut missing = Vec::new();

    loop {
        if let Ok(resolved) = fs::canonicalize(&existing).await {
            let full = missing
                .iter()
                .rev()
                .fold(resolved, |path: PathBuf, name| path.join(name));
            return uri.with_path(full.to_string_lossy().into_owned());
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = if parent.as_os_str().is_empty() {
                    PathBuf::from(".")
                } else {
                    parent.to_path_buf()
                };
            }
            _ => return uri.clone(),
        }
    }
}

fn overlap(src: &Uri, dst: &Uri) -> Error {
    Error::Overlap {
        src: src.to_string(),
        dst: dst.to_string(),
    }
}

/// Create the missing parent directories of `uri`
async fn create_parent(uri: &Uri) -> Result<()> {
    if let Some(parent) = Path::new(uri.path()).parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::from_io(e, "create directory", parent.display().to_string()))?;
    }
    Ok(())
}

async fn stat(uri: &Uri) -> Result<std::fs::Metadata> {
    fs::metadata(uri.path())
        .await
        .map_err(|e| Error::from_io(e, "stat", uri.to_string()))
}

/// Writer over a local file
struct LocalWriter {
    file: fs::File,
    uri: Uri,
}

#[async_trait]
impl NodeWriter for LocalWriter {
    async fn write(&mut self, buf: &[u8]) -> Result<()> {
        self.file
            .write_all(buf)
            .await
            .map_err(|e| Error::from_io(e, "write", self.uri.to_string()))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let LocalWriter { mut file, uri } = *self;
        file.flush()
            .await
            .map_err(|e| Error::from_io(e, "flush", uri.to_string()))?;
        file.shutdown()
            .await
            .map_err(|e| Error::from_io(e, "close", uri.to_string()))
    }
}

#[async_trait]
impl Backend for LocalBackend {
    async fn connect(&self) -> Result<()> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }

    async fn writer(&self, uri: &Uri) -> Result<Box<dyn NodeWriter>> {
        create_parent(uri).await?;
        let file = fs::File::create(uri.path())
            .await
            .map_err(|e| Error::from_io(e, "create", uri.to_string()))?;
        Ok(Box::new(LocalWriter {
            file,
            uri: uri.clone(),
        }))
    }

    async fn reader(&self, uri: &Uri) -> Result<NodeReader> {
        let file = fs::File::open(uri.path())
            .await
            .map_err(|e| Error::from_io(e, "open", uri.to_string()))?;
        Ok(Box::new(file))
    }

    async fn delete(&self, uri: &Uri, recursive: bool) -> Result<()> {
        let meta = stat(uri).await?;
        if !meta.is_dir() {
            return fs::remove_file(uri.path())
                .await
                .map_err(|e| Error::from_io(e, "remove", uri.to_string()));
        }

        if recursive {
            fs::remove_dir_all(uri.path())
                .await
                .map_err(|e| Error::from_io(e, "remove", uri.to_string()))
        } else {
            if !self.is_empty_dir(uri).await? {
                return Err(Error::DirectoryNotEmpty(uri.to_string()));
            }
            fs::remove_dir(uri.path())
                .await
                .map_err(|e| Error::from_io(e, "remove", uri.to_string()))
        }
    }

    async fn copy(&self, src: &Uri, dst: &Uri, recursive: bool) -> Result<()> {
        let src_meta = stat(src).await?;

        if !src_meta.is_dir() {
            match fs::metadata(dst.path()).await {
                Ok(meta) if !meta.is_dir() => return Err(Error::AlreadyExists(dst.to_string())),
                Ok(_) => return self.copy_file(src, &dst.join(src.name())).await,
                Err(_) => return self.copy_file(src, dst).await,
            }
        }

        if canonical_uri(src).await.contains(&canonical_uri(dst).await) {
            return Err(overlap(src, dst));
        }

        // Depth-first: a directory is created before anything inside it
        self.ensure_dir(dst).await?;
        for node in self.list(src, recursive).await? {
            let relative = node
                .uri
                .relative_to(src)
                .ok_or_else(|| Error::Walk(format!("{} is outside {src}", node.uri)))?;
            let target = dst.join(relative);
            if node.is_dir {
                self.ensure_dir(&target).await?;
            } else {
                self.copy_file(&node.uri, &target).await?;
            }
        }
        Ok(())
    }

    async fn list(&self, dir: &Uri, recursive: bool) -> Result<Vec<Node>> {
        let meta = stat(dir).await?;
        if !meta.is_dir() {
            return Ok(vec![Node::file(dir.clone())]);
        }

        let root = dir.clone();
        tokio::task::spawn_blocking(move || -> Result<Vec<Node>> {
            let path = PathBuf::from(root.path());
            let real = std::fs::canonicalize(&path)
                .map_err(|e| Error::Walk(format!("{}: {e}", path.display())))?;
            let mut nodes = Vec::new();
            walk(&root, &path, recursive, &mut vec![real], &mut nodes)?;
            Ok(nodes)
        })
        .await
        .map_err(|e| Error::Walk(e.to_string()))?
    }

    async fn get(&self, uri: &Uri) -> Result<Node> {
        let meta = stat(uri).await?;
        Ok(Node::new(uri.clone(), meta.is_dir()))
    }

    async fn mkdir(&self, uri: &Uri) -> Result<Node> {
        let exists = fs::try_exists(uri.path())
            .await
            .map_err(|e| Error::from_io(e, "stat", uri.to_string()))?;
        if exists {
            return Err(Error::AlreadyExists(uri.to_string()));
        }
        self.ensure_dir(uri).await?;
        Ok(Node::dir(uri.clone()))
    }
}

/// Pre-order walk with entries sorted by name
///
/// `ancestors` holds the canonical paths of the directories being walked,
/// innermost last. A symbolic link back to one of them is listed as a
/// directory but not descended into.
fn walk(
    parent: &Uri,
    path: &Path,
    recursive: bool,
    ancestors: &mut Vec<PathBuf>,
    nodes: &mut Vec<Node>,
) -> Result<()> {
    let read_dir =
        std::fs::read_dir(path).map_err(|e| Error::Walk(format!("{}: {e}", path.display())))?;

    let mut entries = Vec::new();
    for entry in read_dir {
        let entry = entry.map_err(|e| Error::Walk(format!("{}: {e}", path.display())))?;
        let file_type = entry
            .file_type()
            .map_err(|e| Error::Walk(format!("{}: {e}", entry.path().display())))?;
        let is_link = file_type.is_symlink();
        let is_dir = if is_link {
            entry.path().is_dir()
        } else {
            file_type.is_dir()
        };
        entries.push((entry.file_name().to_string_lossy().into_owned(), is_dir, is_link));
    }
    entries.sort();

    for (name, is_dir, is_link) in entries {
        let uri = parent.join(&name);
        nodes.push(Node::new(uri.clone(), is_dir));
        if !is_dir || !recursive {
            continue;
        }

        let child = path.join(&name);
        let real = match ancestors.last() {
            Some(current) if !is_link => current.join(&name),
            _ => std::fs::canonicalize(&child)
                .map_err(|e| Error::Walk(format!("{}: {e}", child.display())))?,
        };
        if ancestors.contains(&real) {
            tracing::debug!(path = %child.display(), "not following symlink cycle");
            continue;
        }

        ancestors.push(real);
        walk(&uri, &child, recursive, ancestors, nodes)?;
        ancestors.pop();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    fn uri(dir: &TempDir, rel: &str) -> Uri {
        Uri::local(dir.path().join(rel).to_string_lossy().into_owned())
    }

    fn tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("src/sub/deep")).unwrap();
        std::fs::write(dir.path().join("src/a.txt"), b"alpha").unwrap();
        std::fs::write(dir.path().join("src/sub/b.txt"), b"beta").unwrap();
        std::fs::write(dir.path().join("src/sub/deep/c.txt"), b"gamma").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_writer_and_reader() {
        let dir = TempDir::new().unwrap();
        let backend = LocalBackend::new();
        let target = uri(&dir, "nested/out.bin");

        let mut writer = backend.writer(&target).await.unwrap();
        writer.write(b"hello ").await.unwrap();
        writer.write(b"world").await.unwrap();
        writer.close().await.unwrap();

        let mut reader = backend.reader(&target).await.unwrap();
        let mut content = Vec::new();
        reader.read_to_end(&mut content).await.unwrap();
        assert_eq!(content, b"hello world");
    }

    #[tokio::test]
    async fn test_reader_not_found() {
        let dir = TempDir::new().unwrap();
        let result = LocalBackend::new().reader(&uri(&dir, "missing")).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_non_recursive() {
        let dir = tree();
        let nodes = LocalBackend::new().list(&uri(&dir, "src"), false).await.unwrap();
        let names: Vec<(&str, bool)> = nodes.iter().map(|n| (n.name(), n.is_dir)).collect();
        assert_eq!(names, vec![("a.txt", false), ("sub", true)]);
    }

    #[tokio::test]
    async fn test_list_recursive_is_pre_order() {
        let dir = tree();
        let root = uri(&dir, "src");
        let nodes = LocalBackend::new().list(&root, true).await.unwrap();
        let relative: Vec<&str> = nodes.iter().map(|n| n.uri.relative_to(&root).unwrap()).collect();
        assert_eq!(
            relative,
            vec!["a.txt", "sub", "sub/b.txt", "sub/deep", "sub/deep/c.txt"]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_list_recursive_stops_at_symlink_cycle() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("root")).unwrap();
        std::fs::write(dir.path().join("root/a.txt"), b"alpha").unwrap();
        std::os::unix::fs::symlink(dir.path().join("root"), dir.path().join("root/loop")).unwrap();

        let root = uri(&dir, "root");
        let nodes = LocalBackend::new().list(&root, true).await.unwrap();
        let names: Vec<(&str, bool)> = nodes.iter().map(|n| (n.name(), n.is_dir)).collect();
        assert_eq!(names, vec![("a.txt", false), ("loop", true)]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_list_recursive_follows_symlinked_dir() {
        let dir = tree();
        std::fs::create_dir(dir.path().join("root")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("src/sub"), dir.path().join("root/linked"))
            .unwrap();

        let root = uri(&dir, "root");
        let nodes = LocalBackend::new().list(&root, true).await.unwrap();
        let relative: Vec<&str> = nodes.iter().map(|n| n.uri.relative_to(&root).unwrap()).collect();
        assert_eq!(
            relative,
            vec!["linked", "linked/b.txt", "linked/deep", "linked/deep/c.txt"]
        );
    }

    #[tokio::test]
    async fn test_list_file_returns_itself() {
        let dir = tree();
        let file = uri(&dir, "src/a.txt");
        let nodes = LocalBackend::new().list(&file, true).await.unwrap();
        assert_eq!(nodes, vec![Node::file(file)]);
    }

    #[tokio::test]
    async fn test_list_not_found() {
        let dir = TempDir::new().unwrap();
        let result = LocalBackend::new().list(&uri(&dir, "nope"), true).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_get() {
        let dir = tree();
        let backend = LocalBackend::new();

        let node = backend.get(&uri(&dir, "src/sub")).await.unwrap();
        assert!(node.is_dir);
        assert_eq!(node.name(), "sub");

        let node = backend.get(&uri(&dir, "src/a.txt")).await.unwrap();
        assert!(!node.is_dir);

        let result = backend.get(&uri(&dir, "src/zzz")).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_file() {
        let dir = tree();
        let target = uri(&dir, "src/a.txt");
        LocalBackend::new().delete(&target, false).await.unwrap();
        assert!(!dir.path().join("src/a.txt").exists());
    }

    #[tokio::test]
    async fn test_delete_non_empty_dir_without_recursive() {
        let dir = tree();
        let result = LocalBackend::new().delete(&uri(&dir, "src"), false).await;
        assert!(matches!(result, Err(Error::DirectoryNotEmpty(_))));
        assert!(dir.path().join("src/sub/deep/c.txt").exists());
    }

    #[tokio::test]
    async fn test_delete_empty_dir_without_recursive() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("empty")).unwrap();
        LocalBackend::new().delete(&uri(&dir, "empty"), false).await.unwrap();
        assert!(!dir.path().join("empty").exists());
    }

    #[tokio::test]
    async fn test_delete_recursive() {
        let dir = tree();
        LocalBackend::new().delete(&uri(&dir, "src"), true).await.unwrap();
        assert!(!dir.path().join("src").exists());
    }

    #[tokio::test]
    async fn test_delete_not_found() {
        let dir = TempDir::new().unwrap();
        let result = LocalBackend::new().delete(&uri(&dir, "ghost"), true).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_copy_file() {
        let dir = tree();
        let backend = LocalBackend::new();
        backend
            .copy(&uri(&dir, "src/a.txt"), &uri(&dir, "copy.txt"), false)
            .await
            .unwrap();
        assert_eq!(std::fs::read(dir.path().join("copy.txt")).unwrap(), b"alpha");
    }

    #[tokio::test]
    async fn test_copy_file_into_existing_dir() {
        let dir = tree();
        std::fs::create_dir(dir.path().join("out")).unwrap();
        LocalBackend::new()
            .copy(&uri(&dir, "src/a.txt"), &uri(&dir, "out"), false)
            .await
            .unwrap();
        assert!(dir.path().join("out/a.txt").is_file());
    }

    #[tokio::test]
    async fn test_copy_file_onto_existing_file() {
        let dir = tree();
        std::fs::write(dir.path().join("taken.txt"), b"x").unwrap();
        let result = LocalBackend::new()
            .copy(&uri(&dir, "src/a.txt"), &uri(&dir, "taken.txt"), false)
            .await;
        assert!(matches!(result, Err(Error::AlreadyExists(_))));
        assert_eq!(std::fs::read(dir.path().join("taken.txt")).unwrap(), b"x");
    }

    #[tokio::test]
    async fn test_copy_dir_recursive() {
        let dir = tree();
        LocalBackend::new()
            .copy(&uri(&dir, "src"), &uri(&dir, "dst"), true)
            .await
            .unwrap();
        assert_eq!(std::fs::read(dir.path().join("dst/a.txt")).unwrap(), b"alpha");
        assert_eq!(std::fs::read(dir.path().join("dst/sub/b.txt")).unwrap(), b"beta");
        assert_eq!(
            std::fs::read(dir.path().join("dst/sub/deep/c.txt")).unwrap(),
            b"gamma"
        );
    }

    #[tokio::test]
    async fn test_copy_dir_non_recursive_mirrors_one_level() {
        let dir = tree();
        LocalBackend::new()
            .copy(&uri(&dir, "src"), &uri(&dir, "dst"), false)
            .await
            .unwrap();
        assert!(dir.path().join("dst/a.txt").is_file());
        assert!(dir.path().join("dst/sub").is_dir());
        assert!(!dir.path().join("dst/sub/b.txt").exists());
    }

    #[tokio::test]
    async fn test_copy_dir_onto_itself_keeps_content() {
        let dir = tree();
        let backend = LocalBackend::new();
        let src = uri(&dir, "src");
        let same = Uri::local(format!("{}/./", src.path()));

        let result = backend.copy(&src, &same, true).await;
        assert!(matches!(result, Err(Error::Overlap { .. })));
        assert_eq!(std::fs::read(dir.path().join("src/a.txt")).unwrap(), b"alpha");
    }

    #[tokio::test]
    async fn test_copy_dir_into_own_subtree_is_refused() {
        let dir = tree();
        let result = LocalBackend::new()
            .copy(&uri(&dir, "src"), &uri(&dir, "src/sub/inner"), true)
            .await;
        assert!(matches!(result, Err(Error::Overlap { .. })));
        assert!(!dir.path().join("src/sub/inner").exists());
    }

    #[tokio::test]
    async fn test_copy_file_onto_itself_does_not_truncate() {
        let dir = tree();
        let backend = LocalBackend::new();
        let file = uri(&dir, "src/a.txt");

        let result = backend.copy_file(&file, &file).await;
        assert!(matches!(result, Err(Error::Overlap { .. })));
        assert_eq!(std::fs::read(dir.path().join("src/a.txt")).unwrap(), b"alpha");
    }

    #[tokio::test]
    async fn test_canonical_uri_of_missing_path() {
        let dir = tree();
        let real = std::fs::canonicalize(dir.path()).unwrap();

        let resolved = canonical_uri(&uri(&dir, "src/../src/new/file.txt")).await;
        assert_eq!(
            resolved.path(),
            real.join("src/new/file.txt").to_string_lossy()
        );
    }

    #[tokio::test]
    async fn test_copy_not_found() {
        let dir = TempDir::new().unwrap();
        let result = LocalBackend::new()
            .copy(&uri(&dir, "nope"), &uri(&dir, "dst"), true)
            .await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_mkdir_creates_parents() {
        let dir = TempDir::new().unwrap();
        let target = uri(&dir, "a/b/c");
        let node = LocalBackend::new().mkdir(&target).await.unwrap();
        assert!(node.is_dir);
        assert_eq!(node.name(), "c");
        assert!(dir.path().join("a/b/c").is_dir());
    }

    #[tokio::test]
    async fn test_mkdir_twice_already_exists() {
        let dir = TempDir::new().unwrap();
        let backend = LocalBackend::new();
        let target = uri(&dir, "made");
        backend.mkdir(&target).await.unwrap();
        let result = backend.mkdir(&target).await;
        assert!(matches!(result, Err(Error::AlreadyExists(_))));
        assert!(dir.path().join("made").is_dir());
    }

    #[tokio::test]
    async fn test_mkdir_over_file_already_exists() {
        let dir = tree();
        let result = LocalBackend::new().mkdir(&uri(&dir, "src/a.txt")).await;
        assert!(matches!(result, Err(Error::AlreadyExists(_))));
    }
}
