//! Buffered object writer
//!
//! Small objects are sent with a single PUT on close. Once the buffered data
//! reaches the part size the writer switches to a multipart upload and sends
//! parts sequentially as they fill up.

use async_trait::async_trait;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_smithy_types::byte_stream::ByteStream;

use filer_core::{Error, NodeWriter, Result};

use crate::backend::sdk_error;

/// Minimum part size: 5 MiB (S3 requirement)
pub const MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

/// Maximum part size: 5 GiB
pub const MAX_PART_SIZE: u64 = 5 * 1024 * 1024 * 1024;

/// Maximum number of parts: 10,000 (S3 limit)
pub const MAX_PARTS: usize = 10_000;

/// Clamp a configured part size to the limits accepted by the service
pub fn clamp_part_size(size: u64) -> u64 {
    size.clamp(MIN_PART_SIZE, MAX_PART_SIZE)
}

/// Content type sent with an object, guessed from its key
pub fn content_type_for(key: &str) -> String {
    mime_guess::from_path(key)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// In-flight multipart upload
struct Multipart {
    upload_id: String,
    parts: Vec<CompletedPart>,
}

/// Writer committing an object on close
pub struct S3Writer {
    client: aws_sdk_s3::Client,
    bucket: String,
    key: String,
    part_size: usize,
    buffer: Vec<u8>,
    upload: Option<Multipart>,
}

impl S3Writer {
    pub(crate) fn new(client: aws_sdk_s3::Client, bucket: &str, key: &str, part_size: u64) -> Self {
        Self {
            client,
            bucket: bucket.to_string(),
            key: key.to_string(),
            part_size: clamp_part_size(part_size) as usize,
            buffer: Vec::new(),
            upload: None,
        }
    }

    fn location(&self) -> String {
        format!("{}/{}", self.bucket, self.key)
    }

    async fn start_upload(&self) -> Result<Multipart> {
        let response = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(&self.key)
            .content_type(content_type_for(&self.key))
            .send()
            .await
            .map_err(|e| sdk_error(e, &self.location()))?;

        let upload_id = response
            .upload_id()
            .ok_or_else(|| Error::Network(format!("no upload id returned for {}", self.location())))?
            .to_string();
        tracing::debug!(key = %self.key, upload_id = %upload_id, "started multipart upload");

        Ok(Multipart {
            upload_id,
            parts: Vec::new(),
        })
    }

    /// Send `data` as the next part of the current upload
    async fn upload_part(&mut self, data: Vec<u8>) -> Result<()> {
        if self.upload.is_none() {
            self.upload = Some(self.start_upload().await?);
        }
        let location = self.location();
        let Some(upload) = self.upload.as_mut() else {
            return Err(Error::General(format!("multipart upload for {location} was not started")));
        };

        if upload.parts.len() >= MAX_PARTS {
            return Err(Error::General(format!(
                "{location} exceeds {MAX_PARTS} parts; raise part_size"
            )));
        }

        let part_number = upload.parts.len() as i32 + 1;
        let response = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(&self.key)
            .upload_id(&upload.upload_id)
            .part_number(part_number)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| sdk_error(e, &location))?;

        upload.parts.push(
            CompletedPart::builder()
                .part_number(part_number)
                .set_e_tag(response.e_tag().map(str::to_string))
                .build(),
        );
        Ok(())
    }
}

#[async_trait]
impl NodeWriter for S3Writer {
    async fn write(&mut self, buf: &[u8]) -> Result<()> {
        self.buffer.extend_from_slice(buf);
        while self.buffer.len() >= self.part_size {
            let rest = self.buffer.split_off(self.part_size);
            let part = std::mem::replace(&mut self.buffer, rest);
            self.upload_part(part).await?;
        }
        Ok(())
    }

    async fn close(mut self: Box<Self>) -> Result<()> {
        if self.upload.is_none() {
            let body = std::mem::take(&mut self.buffer);
            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(&self.key)
                .content_type(content_type_for(&self.key))
                .body(ByteStream::from(body))
                .send()
                .await
                .map_err(|e| sdk_error(e, &self.location()))?;
            return Ok(());
        }

        if !self.buffer.is_empty() {
            let last = std::mem::take(&mut self.buffer);
            self.upload_part(last).await?;
        }

        let location = self.location();
        let Some(upload) = self.upload.take() else {
            return Ok(());
        };
        let part_count = upload.parts.len();
        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(&self.key)
            .upload_id(&upload.upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(upload.parts))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| sdk_error(e, &location))?;

        tracing::debug!(key = %self.key, parts = part_count, "completed multipart upload");
        Ok(())
    }

    async fn abort(mut self: Box<Self>) -> Result<()> {
        let Some(upload) = self.upload.take() else {
            return Ok(());
        };
        let location = self.location();
        self.client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(&self.key)
            .upload_id(&upload.upload_id)
            .send()
            .await
            .map_err(|e| sdk_error(e, &location))?;
        tracing::debug!(key = %self.key, "aborted multipart upload");
        Ok(())
    }
}
