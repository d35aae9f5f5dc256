//! URI parsing and resolution
//!
//! A URI has the form `[scheme://]path`. Without a scheme prefix the URI
//! points at the local filesystem. The only other registered scheme is the
//! cloud object store, whose paths are `bucket/key`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Scheme of the local filesystem
pub const LOCAL_SCHEME: &str = "";

/// Scheme of the cloud object store
pub const OBJECT_STORE_SCHEME: &str = "gs";

/// Path separator used by every backend
pub const SEPARATOR: char = '/';

const SCHEME_DELIMITER: &str = "://";

/// Check whether a scheme belongs to the registered set
pub fn is_valid_scheme(scheme: &str) -> bool {
    matches!(scheme, LOCAL_SCHEME | OBJECT_STORE_SCHEME)
}

/// A resource locator: scheme, backend-native path and the derived name
///
/// `name` is recomputed from `path` on every construction and cannot be set
/// on its own.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "UriRepr", from = "UriRepr")]
pub struct Uri {
    scheme: String,
    path: String,
    name: String,
}

impl Uri {
    /// Create a new URI; the name is the base component of `path`
    pub fn new(scheme: impl Into<String>, path: impl Into<String>) -> Self {
        let path = path.into();
        let name = base_name(&path).to_string();
        Self {
            scheme: scheme.into(),
            path,
            name,
        }
    }

    /// Create a URI on the local filesystem
    pub fn local(path: impl Into<String>) -> Self {
        Self::new(LOCAL_SCHEME, path)
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check if this URI points at the local filesystem
    pub fn is_local(&self) -> bool {
        self.scheme == LOCAL_SCHEME
    }

    /// Whether the path ends with a separator (explicit directory target)
    pub fn has_trailing_separator(&self) -> bool {
        self.path.ends_with(SEPARATOR)
    }

    /// Return a URI on the same backend with a different path
    pub fn with_path(&self, path: impl Into<String>) -> Self {
        Self::new(self.scheme.clone(), path)
    }

    /// Join a child path component
    pub fn join(&self, child: &str) -> Self {
        let child = child.trim_start_matches(SEPARATOR);
        let path = if self.path.is_empty() {
            child.to_string()
        } else if self.has_trailing_separator() {
            format!("{}{child}", self.path)
        } else {
            format!("{}{SEPARATOR}{child}", self.path)
        };
        self.with_path(path)
    }

    /// Path of `self` relative to `root`, without leading or trailing
    /// separators. Returns `None` when `self` is not below `root`.
    pub fn relative_to(&self, root: &Uri) -> Option<&str> {
        if self.scheme != root.scheme {
            return None;
        }
        let base = root.path.trim_end_matches(SEPARATOR);
        let rest = self.path.strip_prefix(base)?;
        if !base.is_empty() && !rest.is_empty() && !rest.starts_with(SEPARATOR) {
            return None;
        }
        Some(rest.trim_matches(SEPARATOR))
    }

    /// Whether `other` is this URI or lies below it
    ///
    /// Paths are compared by component after dropping empty and `.`
    /// components and folding `..`, so `src` contains `./src/sub/`. Symbolic
    /// links are not resolved.
    pub fn contains(&self, other: &Uri) -> bool {
        if self.scheme != other.scheme {
            return false;
        }
        let (root_abs, root) = lexical_components(&self.path);
        let (other_abs, other) = lexical_components(&other.path);
        root_abs == other_abs && other.starts_with(&root)
    }
}

/// Normalized components of a path and whether it is absolute
fn lexical_components(path: &str) -> (bool, Vec<&str>) {
    let mut components: Vec<&str> = Vec::new();
    for component in path.split(SEPARATOR) {
        match component {
            "" | "." => {}
            ".." if components.last().is_some_and(|last| *last != "..") => {
                components.pop();
            }
            _ => components.push(component),
        }
    }
    (path.starts_with(SEPARATOR), components)
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scheme.is_empty() {
            write!(f, "{}", self.path)
        } else {
            write!(f, "{}{SCHEME_DELIMITER}{}", self.scheme, self.path)
        }
    }
}

#[derive(Serialize, Deserialize)]
struct UriRepr {
    scheme: String,
    path: String,
    name: String,
}

impl From<Uri> for UriRepr {
    fn from(uri: Uri) -> Self {
        Self {
            scheme: uri.scheme,
            path: uri.path,
            name: uri.name,
        }
    }
}

impl From<UriRepr> for Uri {
    fn from(repr: UriRepr) -> Self {
        // The name is derived, never trusted from input
        Uri::new(repr.scheme, repr.path)
    }
}

/// Base component of a path, ignoring trailing separators
///
/// Returns `"."` for an empty path and `"/"` for a path made only of
/// separators.
pub fn base_name(path: &str) -> &str {
    if path.is_empty() {
        return ".";
    }
    let trimmed = path.trim_end_matches(SEPARATOR);
    if trimmed.is_empty() {
        return "/";
    }
    match trimmed.rfind(SEPARATOR) {
        Some(pos) => &trimmed[pos + 1..],
        None => trimmed,
    }
}

/// Parse a URI string
///
/// The grammar is `[scheme://]path` where the scheme is made of ASCII
/// letters, digits and underscores and the path is non-empty. A valid but
/// unregistered scheme yields `Error::UnknownScheme` carrying the parsed URI.
pub fn parse_uri(input: &str) -> Result<Uri> {
    if input.is_empty() {
        return Err(Error::InvalidUri("URI cannot be empty".into()));
    }

    let (scheme, path) = match input.split_once(SCHEME_DELIMITER) {
        Some((scheme, rest)) if is_scheme_token(scheme) => (scheme, rest),
        _ => (LOCAL_SCHEME, input),
    };

    if path.is_empty() {
        return Err(Error::InvalidUri(format!(
            "'{input}' has no path after the scheme"
        )));
    }

    let uri = Uri::new(scheme, path);
    if !is_valid_scheme(scheme) {
        return Err(Error::UnknownScheme(uri));
    }
    Ok(uri)
}

fn is_scheme_token(token: &str) -> bool {
    !token.is_empty()
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_object_store_uri() {
        let uri = parse_uri("gs://bucket/dir/file.txt").unwrap();
        assert_eq!(uri.scheme(), "gs");
        assert_eq!(uri.path(), "bucket/dir/file.txt");
        assert_eq!(uri.name(), "file.txt");
        assert!(!uri.is_local());
    }

    #[test]
    fn test_parse_local_uri() {
        let uri = parse_uri("tmp.txt").unwrap();
        assert!(uri.is_local());
        assert_eq!(uri.path(), "tmp.txt");

        let uri = parse_uri("/home/user/file.txt").unwrap();
        assert!(uri.is_local());
        assert_eq!(uri.name(), "file.txt");
    }

    #[test]
    fn test_parse_unknown_scheme() {
        let err = parse_uri("moc://x").unwrap_err();
        match err {
            Error::UnknownScheme(uri) => {
                assert_eq!(uri.scheme(), "moc");
                assert_eq!(uri.path(), "x");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_empty_uri() {
        assert!(matches!(parse_uri(""), Err(Error::InvalidUri(_))));
    }

    #[test]
    fn test_parse_scheme_without_path() {
        assert!(matches!(parse_uri("gs://"), Err(Error::InvalidUri(_))));
    }

    #[test]
    fn test_parse_non_token_prefix_is_local() {
        let uri = parse_uri("dir/a://b").unwrap();
        assert!(uri.is_local());
        assert_eq!(uri.path(), "dir/a://b");
    }

    #[test]
    fn test_display_round_trip() {
        for input in ["gs://bucket/dir/file.txt", "gs://bucket", "relative/file", "/abs/dir/"] {
            let uri = parse_uri(input).unwrap();
            assert_eq!(uri.to_string(), input);
            let again = parse_uri(&uri.to_string()).unwrap();
            assert_eq!(again.scheme(), uri.scheme());
            assert_eq!(again.path(), uri.path());
        }
    }

    #[test]
    fn test_base_name() {
        assert_eq!(base_name("a/b/c.txt"), "c.txt");
        assert_eq!(base_name("a/b/"), "b");
        assert_eq!(base_name("bucket"), "bucket");
        assert_eq!(base_name(""), ".");
        assert_eq!(base_name("///"), "/");
    }

    #[test]
    fn test_join() {
        let root = Uri::new("gs", "bucket");
        let dir = root.join("dir/");
        assert_eq!(dir.path(), "bucket/dir/");
        assert_eq!(dir.name(), "dir");

        let file = dir.join("file.txt");
        assert_eq!(file.path(), "bucket/dir/file.txt");
        assert_eq!(file.scheme(), "gs");
    }

    #[test]
    fn test_relative_to() {
        let root = Uri::local("/data/src/");
        let child = Uri::local("/data/src/sub/a.txt");
        assert_eq!(child.relative_to(&root), Some("sub/a.txt"));

        let sibling = Uri::local("/data/srcx/a.txt");
        assert_eq!(sibling.relative_to(&root), None);

        let dir = Uri::new("gs", "bucket/dir/sub/");
        assert_eq!(dir.relative_to(&Uri::new("gs", "bucket/dir")), Some("sub"));
        assert_eq!(dir.relative_to(&Uri::local("bucket/dir")), None);
    }

    #[test]
    fn test_contains() {
        let src = Uri::local("src");
        assert!(src.contains(&Uri::local("src")));
        assert!(src.contains(&Uri::local("./src/")));
        assert!(src.contains(&Uri::local("src/sub/src")));
        assert!(src.contains(&Uri::local("other/../src/a.txt")));
        assert!(!src.contains(&Uri::local("src2/src")));
        assert!(!src.contains(&Uri::local("/src")));
        assert!(!Uri::local("src/sub").contains(&src));

        let bucket = Uri::new("gs", "bucket");
        assert!(bucket.contains(&Uri::new("gs", "bucket/dir/a.txt")));
        assert!(!bucket.contains(&Uri::local("bucket/dir")));
        assert!(!Uri::new("gs", "bucket/dir").contains(&Uri::new("gs", "bucket/dirx")));
    }

    #[test]
    fn test_name_is_derived_on_deserialize() {
        let text = "scheme = \"gs\"\npath = \"bucket/a.txt\"\nname = \"bogus\"\n";
        let uri: Uri = toml::from_str(text).unwrap();
        assert_eq!(uri.name(), "a.txt");
    }
}
