//! filer-s3: Object-store backend for filer
//!
//! This crate provides the implementation of the Backend trait for the `gs`
//! scheme using the aws-sdk-s3 crate against an S3-compatible endpoint (the
//! Google Cloud Storage XML API by default). It is the only crate that
//! directly depends on the AWS SDK.

pub mod backend;
pub mod writer;

pub use backend::{S3Backend, split_bucket_path};
pub use writer::{MAX_PART_SIZE, MAX_PARTS, MIN_PART_SIZE, S3Writer, clamp_part_size};
