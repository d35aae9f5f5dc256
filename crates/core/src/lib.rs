//! filer-core: Core library for the filer file manager
//!
//! This crate provides the core functionality for filer, including:
//! - URI parsing and resolution
//! - The Backend trait every storage provider implements
//! - The local filesystem backend
//! - The backend registry and the cross-backend Manager
//! - Configuration loading
//!
//! This crate is independent of any cloud SDK; the object-store backend
//! lives in `filer-s3`.

pub mod backend;
pub mod config;
pub mod error;
pub mod local;
pub mod manager;
pub mod node;
pub mod registry;
pub mod uri;

pub use backend::{Backend, NodeReader, NodeWriter};
pub use config::{Config, ConfigManager, ObjectStoreConfig};
pub use error::{Error, Result};
pub use local::LocalBackend;
pub use manager::Manager;
pub use node::Node;
pub use registry::BackendRegistry;
pub use uri::{LOCAL_SCHEME, OBJECT_STORE_SCHEME, SEPARATOR, Uri, parse_uri};
