//! # jasset-db
//!
//! Asset database over five layered sources.
//!
//! Each [`AssetSource`] owns one [`Vfs`](jasset_vfs::Vfs). Lookups by path
//! walk the sources from Override down to BuiltIn, so a file in a higher
//! layer shadows the same path below it. Live assets are addressed by
//! packed [`AssetRef`] handles.
//!
//! ## Usage
//!
//! ```ignore
//! use jasset_db::{AssetDb, AssetRegistry, SourceMask};
//!
//! let config = jasset_config::config().clone();
//! let mut db = AssetDb::new(&config, AssetRegistry::with_defaults());
//! db.initialize(SourceMask::ALL);
//! let hero = db.find_asset("tex/hero.png");
//! ```

pub mod asset_ref;
mod db;
pub mod meta;
pub mod registry;
pub mod source;

use std::io;

use thiserror::Error;

pub use asset_ref::AssetRef;
pub use db::{Asset, AssetDb, SourceState, VfsSource};
pub use meta::{AssetMetaData, MetaFormat};
pub use registry::AssetRegistry;
pub use source::{AssetSource, SourceMask, SRC_COUNT};

/// Errors from asset database persistence and packaging
#[derive(Error, Debug)]
pub enum AssetDbError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Binary encoding error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("VFS error: {0}")]
    Vfs(#[from] jasset_vfs::VfsError),

    #[error("Cache error: {0}")]
    Cache(#[from] jasset_vfs::CacheError),

    #[error("Package error: {0}")]
    Pack(#[from] jasset_pack::PackError),

    #[error("Invalid asset: {0}")]
    InvalidAsset(String),
}

pub type Result<T> = std::result::Result<T, AssetDbError>;
