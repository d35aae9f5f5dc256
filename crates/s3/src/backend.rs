//! Object-store backend
//!
//! Wraps aws-sdk-s3 and implements the Backend trait from filer-core. Paths
//! are `bucket/key`; directories are simulated with key prefixes and
//! zero-length marker objects whose key ends with `/`.

use std::collections::HashSet;

use async_trait::async_trait;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use aws_smithy_types::byte_stream::ByteStream;
use tokio::sync::Mutex;

use filer_core::{
    Backend, Error, Node, NodeReader, NodeWriter, OBJECT_STORE_SCHEME, ObjectStoreConfig, Result,
    SEPARATOR, Uri,
};

use crate::writer::S3Writer;

/// Maximum number of keys per DeleteObjects request
const DELETE_BATCH_SIZE: usize = 1000;

/// Backend over an S3-compatible object store
pub struct S3Backend {
    config: ObjectStoreConfig,
    client: Mutex<Option<aws_sdk_s3::Client>>,
}

/// Raw result of a prefix listing
#[derive(Debug, Default)]
struct Listing {
    prefixes: Vec<String>,
    keys: Vec<String>,
}

impl S3Backend {
    /// Create a disconnected backend from configuration
    pub fn new(config: ObjectStoreConfig) -> Self {
        Self {
            config,
            client: Mutex::new(None),
        }
    }

    async fn build_client(&self) -> Result<aws_sdk_s3::Client> {
        self.config.validate()?;

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(self.config.region.clone()))
            .endpoint_url(&self.config.endpoint);

        if let (Some(access_key), Some(secret_key)) =
            (&self.config.access_key, &self.config.secret_key)
        {
            let credentials = aws_credential_types::Credentials::new(
                access_key,
                secret_key,
                None, // session token
                None, // expiry
                "filer-static-credentials",
            );
            loader = loader.credentials_provider(credentials);
        }

        let sdk_config = loader.load().await;

        // Non-AWS endpoints reject the default flexible checksums
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(self.config.path_style)
            .request_checksum_calculation(
                aws_sdk_s3::config::RequestChecksumCalculation::WhenRequired,
            )
            .response_checksum_validation(
                aws_sdk_s3::config::ResponseChecksumValidation::WhenRequired,
            )
            .build();

        Ok(aws_sdk_s3::Client::from_conf(s3_config))
    }

    async fn client(&self) -> Result<aws_sdk_s3::Client> {
        self.client.lock().await.clone().ok_or_else(|| {
            Error::General(format!("{OBJECT_STORE_SCHEME} backend is not connected"))
        })
    }

    /// List everything under `prefix`, following continuation tokens
    async fn list_prefix(
        &self,
        client: &aws_sdk_s3::Client,
        bucket: &str,
        prefix: &str,
        recursive: bool,
    ) -> Result<Listing> {
        let mut listing = Listing::default();
        let mut continuation: Option<String> = None;

        loop {
            let mut request = client.list_objects_v2().bucket(bucket).prefix(prefix);
            if !recursive {
                request = request.delimiter(SEPARATOR);
            }
            if let Some(token) = &continuation {
                request = request.continuation_token(token);
            }

            let response = request
                .send()
                .await
                .map_err(|e| sdk_error(e, &format!("{bucket}/{prefix}")))?;

            listing.prefixes.extend(
                response
                    .common_prefixes()
                    .iter()
                    .filter_map(|p| p.prefix().map(str::to_string)),
            );
            listing.keys.extend(
                response
                    .contents()
                    .iter()
                    .filter_map(|o| o.key().map(str::to_string)),
            );

            continuation = match response.next_continuation_token() {
                Some(token) if response.is_truncated().unwrap_or(false) => Some(token.to_string()),
                _ => break,
            };
        }

        Ok(listing)
    }

    /// Write a zero-length directory marker
    async fn put_marker(&self, client: &aws_sdk_s3::Client, bucket: &str, key: &str) -> Result<()> {
        let marker = dir_prefix(key);
        client
            .put_object()
            .bucket(bucket)
            .key(&marker)
            .body(ByteStream::from_static(b""))
            .send()
            .await
            .map_err(|e| sdk_error(e, &format!("{bucket}/{marker}")))?;
        Ok(())
    }

    async fn copy_object(
        &self,
        client: &aws_sdk_s3::Client,
        src: (&str, &str),
        dst: (&str, &str),
    ) -> Result<()> {
        // Build copy source: bucket/key
        let copy_source = format!("{}/{}", src.0, src.1);
        client
            .copy_object()
            .copy_source(&copy_source)
            .bucket(dst.0)
            .key(dst.1)
            .send()
            .await
            .map_err(|e| sdk_error(e, &copy_source))?;
        Ok(())
    }

    async fn delete_keys(
        &self,
        client: &aws_sdk_s3::Client,
        bucket: &str,
        keys: &[String],
    ) -> Result<()> {
        for batch in keys.chunks(DELETE_BATCH_SIZE) {
            let objects = batch
                .iter()
                .map(|k| ObjectIdentifier::builder().key(k).build())
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| Error::General(e.to_string()))?;

            let delete = Delete::builder()
                .set_objects(Some(objects))
                .quiet(true)
                .build()
                .map_err(|e| Error::General(e.to_string()))?;

            let response = client
                .delete_objects()
                .bucket(bucket)
                .delete(delete)
                .send()
                .await
                .map_err(|e| sdk_error(e, bucket))?;

            if !response.errors().is_empty() {
                let error_keys: Vec<&str> =
                    response.errors().iter().filter_map(|e| e.key()).collect();
                tracing::warn!("Failed to delete some objects: {:?}", error_keys);
                return Err(Error::Network(format!(
                    "failed to delete {} objects in {bucket}",
                    error_keys.len()
                )));
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for S3Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Backend")
            .field("endpoint", &self.config.endpoint)
            .field("region", &self.config.region)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Backend for S3Backend {
    async fn connect(&self) -> Result<()> {
        let mut client = self.client.lock().await;
        if client.is_none() {
            tracing::debug!(endpoint = %self.config.endpoint, "connecting object store");
            *client = Some(self.build_client().await?);
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.client.lock().await.take();
        Ok(())
    }

    async fn writer(&self, uri: &Uri) -> Result<Box<dyn NodeWriter>> {
        let (bucket, key) = split_bucket_path(uri)?;
        if key.is_empty() || key.ends_with(SEPARATOR) {
            return Err(Error::InvalidUri(format!("{uri} does not name an object")));
        }
        let client = self.client().await?;
        Ok(Box::new(S3Writer::new(client, bucket, key, self.config.part_size)))
    }

    async fn reader(&self, uri: &Uri) -> Result<NodeReader> {
        let (bucket, key) = split_bucket_path(uri)?;
        let client = self.client().await?;
        let response = client
            .get_object()
            .bucket(bucket)
            .key(object_key(key))
            .send()
            .await
            .map_err(|e| sdk_error(e, &uri.to_string()))?;
        Ok(Box::new(Box::pin(response.body.into_async_read())))
    }

    async fn delete(&self, uri: &Uri, recursive: bool) -> Result<()> {
        let (bucket, key) = split_bucket_path(uri)?;
        let node = self.get(uri).await?;
        let client = self.client().await?;

        if !node.is_dir {
            client
                .delete_object()
                .bucket(bucket)
                .key(object_key(key))
                .send()
                .await
                .map_err(|e| sdk_error(e, &uri.to_string()))?;
            return Ok(());
        }

        let prefix = dir_prefix(key);
        let listing = self.list_prefix(&client, bucket, &prefix, true).await?;
        if !recursive && holds_content(&prefix, &listing.keys) {
            return Err(Error::DirectoryNotEmpty(uri.to_string()));
        }

        tracing::debug!(uri = %uri, objects = listing.keys.len(), "deleting prefix");
        self.delete_keys(&client, bucket, &listing.keys).await?;

        if key.is_empty() {
            client
                .delete_bucket()
                .bucket(bucket)
                .send()
                .await
                .map_err(|e| sdk_error(e, bucket))?;
        }
        Ok(())
    }

    async fn copy(&self, src: &Uri, dst: &Uri, recursive: bool) -> Result<()> {
        let (src_bucket, src_key) = split_bucket_path(src)?;
        let (dst_bucket, dst_key) = split_bucket_path(dst)?;
        let node = self.get(src).await?;
        let client = self.client().await?;

        if !node.is_dir {
            return self
                .copy_object(
                    &client,
                    (src_bucket, object_key(src_key)),
                    (dst_bucket, object_key(dst_key)),
                )
                .await;
        }

        if !dst_key.is_empty() {
            self.put_marker(&client, dst_bucket, dst_key).await?;
        }

        for child in self.list(src, recursive).await? {
            let Some(relative) = child.uri.relative_to(src) else {
                continue;
            };
            if relative.is_empty() {
                continue;
            }

            let target_key = join_key(dst_key, relative);
            if child.is_dir {
                self.put_marker(&client, dst_bucket, &target_key).await?;
            } else {
                let (_, child_key) = split_bucket_path(&child.uri)?;
                self.copy_object(&client, (src_bucket, child_key), (dst_bucket, &target_key))
                    .await?;
            }
        }
        Ok(())
    }

    async fn list(&self, dir: &Uri, recursive: bool) -> Result<Vec<Node>> {
        let node = self.get(dir).await?;
        if !node.is_dir {
            return Ok(vec![node]);
        }

        let (bucket, key) = split_bucket_path(dir)?;
        let client = self.client().await?;
        let prefix = dir_prefix(key);
        let listing = self.list_prefix(&client, bucket, &prefix, recursive).await?;

        let entries = if recursive {
            tree_entries(&prefix, &listing.keys)
        } else {
            level_entries(&prefix, &listing)
        };

        Ok(entries
            .into_iter()
            .map(|(key, is_dir)| Node::new(dir.with_path(format!("{bucket}/{key}")), is_dir))
            .collect())
    }

    async fn get(&self, uri: &Uri) -> Result<Node> {
        let (bucket, key) = split_bucket_path(uri)?;
        let client = self.client().await?;

        if key.is_empty() {
            client
                .head_bucket()
                .bucket(bucket)
                .send()
                .await
                .map_err(|e| sdk_error(e, &uri.to_string()))?;
            return Ok(Node::dir(uri.clone()));
        }

        let object = object_key(key);
        let exact = match client.head_object().bucket(bucket).key(object).send().await {
            Ok(_) => true,
            Err(e) => {
                let error = sdk_error(e, &uri.to_string());
                if !error.is_not_found() {
                    return Err(error);
                }
                false
            }
        };

        // An exact object wins over a prefix of the same name
        let under_prefix = !exact
            && !client
                .list_objects_v2()
                .bucket(bucket)
                .prefix(dir_prefix(object))
                .max_keys(1)
                .send()
                .await
                .map_err(|e| sdk_error(e, &uri.to_string()))?
                .contents()
                .is_empty();

        match node_kind(exact, under_prefix) {
            Some(is_dir) => Ok(Node::new(uri.clone(), is_dir)),
            None => Err(Error::NotFound(uri.to_string())),
        }
    }

    async fn mkdir(&self, uri: &Uri) -> Result<Node> {
        let (bucket, key) = split_bucket_path(uri)?;
        let client = self.client().await?;

        if key.is_empty() {
            client
                .create_bucket()
                .bucket(bucket)
                .send()
                .await
                .map_err(|e| sdk_error(e, &uri.to_string()))?;
            tracing::debug!(bucket = %bucket, "created bucket");
            return Ok(Node::dir(uri.clone()));
        }

        match self.get(uri).await {
            Ok(_) => return Err(Error::AlreadyExists(uri.to_string())),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        self.put_marker(&client, bucket, key).await?;
        Ok(Node::dir(uri.clone()))
    }
}

/// Split an object-store URI into bucket and key
pub fn split_bucket_path(uri: &Uri) -> Result<(&str, &str)> {
    let path = uri.path().trim_start_matches(SEPARATOR);
    let (bucket, key) = path.split_once(SEPARATOR).unwrap_or((path, ""));
    if bucket.is_empty() {
        return Err(Error::InvalidUri(format!("{uri} has no bucket")));
    }
    Ok((bucket, key))
}

/// Key of the object a path names, without trailing separators
fn object_key(key: &str) -> &str {
    key.trim_end_matches(SEPARATOR)
}

/// Classify a path from its lookups: `Some(false)` for an exact object,
/// `Some(true)` for a non-empty prefix, `None` when neither exists
fn node_kind(exact_object: bool, prefix_has_keys: bool) -> Option<bool> {
    match (exact_object, prefix_has_keys) {
        (true, _) => Some(false),
        (false, true) => Some(true),
        (false, false) => None,
    }
}

/// Whether a directory listing holds anything besides the directory's own
/// marker
fn holds_content(prefix: &str, keys: &[String]) -> bool {
    keys.iter().any(|k| k != prefix)
}

/// Key prefix of a directory: empty for the bucket root, else `key/`
fn dir_prefix(key: &str) -> String {
    let key = key.trim_end_matches(SEPARATOR);
    if key.is_empty() {
        String::new()
    } else {
        format!("{key}{SEPARATOR}")
    }
}

fn join_key(base: &str, relative: &str) -> String {
    let base = base.trim_end_matches(SEPARATOR);
    if base.is_empty() {
        relative.to_string()
    } else {
        format!("{base}{SEPARATOR}{relative}")
    }
}

/// Entries of one level: common prefixes and direct objects, in key order
fn level_entries(prefix: &str, listing: &Listing) -> Vec<(String, bool)> {
    let mut entries: Vec<(String, bool)> = listing
        .prefixes
        .iter()
        .map(|p| (p.clone(), true))
        .chain(
            listing
                .keys
                .iter()
                .filter(|k| k.as_str() != prefix)
                .map(|k| (k.clone(), false)),
        )
        .collect();
    entries.sort();
    entries
}

/// Entries of a full subtree
///
/// Intermediate prefixes and `/`-terminated marker objects become directory
/// entries, each emitted once and before anything beneath it.
fn tree_entries(prefix: &str, keys: &[String]) -> Vec<(String, bool)> {
    let mut entries = Vec::new();
    let mut seen_dirs = HashSet::new();

    for key in keys {
        let Some(relative) = key.strip_prefix(prefix) else {
            continue;
        };
        if relative.is_empty() {
            continue;
        }

        let components: Vec<&str> = relative.split(SEPARATOR).collect();
        let is_marker = relative.ends_with(SEPARATOR);
        let dir_depth = components.len() - 1;

        let mut dir = prefix.to_string();
        for component in &components[..dir_depth] {
            dir.push_str(component);
            dir.push(SEPARATOR);
            if seen_dirs.insert(dir.clone()) {
                entries.push((dir.clone(), true));
            }
        }

        if !is_marker {
            entries.push((key.clone(), false));
        }
    }
    entries
}

/// Map an SDK failure onto the error taxonomy
pub(crate) fn sdk_error<E>(err: SdkError<E, HttpResponse>, path: &str) -> Error
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    let status = err.raw_response().map(|r| r.status().as_u16());
    match (err.code(), status) {
        (Some("NoSuchKey" | "NoSuchBucket" | "NotFound"), _) | (_, Some(404)) => {
            Error::NotFound(path.to_string())
        }
        (Some("AccessDenied" | "InvalidAccessKeyId" | "SignatureDoesNotMatch"), _)
        | (_, Some(403)) => Error::Auth(format!("{path}: {}", DisplayErrorContext(&err))),
        (Some("BucketAlreadyExists" | "BucketAlreadyOwnedByYou"), _) => {
            Error::AlreadyExists(path.to_string())
        }
        (Some("BucketNotEmpty"), _) => Error::DirectoryNotEmpty(path.to_string()),
        _ => Error::Network(format!("{path}: {}", DisplayErrorContext(&err))),
    }
}
