//! # jasset-vfs
//!
//! In-memory directory tree for one asset source.
//!
//! Entries live in a [`PoolAllocator`](jasset_pool::PoolAllocator) and are
//! addressed by generation-checked [`FileId`] handles. A path-hash index
//! keyed by [`Uuid8`](jasset_hash::Uuid8) resolves full paths in O(1);
//! hash collisions are chained and resolved by segment comparison.
//!
//! ```text
//! Vfs "Game"  (root_path = <project>/assets)
//! ├── Game/tex            folder
//! │   └── Game/tex/a.png  file on disk
//! └── Game/lvl/one.map    packed (position/size in a source stream)
//! ```

pub mod cache;
pub mod entry;
pub mod ignore;
pub mod monitor;
pub mod path;
pub mod source;
mod vfs;

use std::io;

use thiserror::Error;

pub use cache::{CacheError, CacheRecord, EntryType};
pub use entry::{EntryInfo, FileEntry, FileId, NULL_SOURCE};
pub use ignore::IgnoreMatcher;
pub use monitor::MonitorEvent;
#[cfg(feature = "notify")]
pub use monitor::DirectoryMonitor;
pub use source::{SourceAction, SourceStream};
pub use vfs::{BuildStats, Vfs, DEFAULT_MAX_DEPTH};

/// Errors surfaced by VFS data access
#[derive(Error, Debug)]
pub enum VfsError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Entry not found: {0}")]
    NotFound(String),

    #[error("Entry has no backing data: {0}")]
    NoData(String),

    #[error("Source is read-only: {0}")]
    ReadOnly(String),

    #[error("Invalid source stream {0}")]
    InvalidSource(u32),

    #[error("Path escapes source root: {0}")]
    Outside(String),
}

pub type Result<T> = std::result::Result<T, VfsError>;
