//! Backing streams for packed entries.
//!
//! A packed entry's `EntryInfo { position, size }` addresses a byte range in
//! one of these streams. Streams open lazily and can be closed to release
//! the handle without forgetting the path.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::debug;

/// What to do with an entry's backing stream when the entry is removed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceAction {
    /// Leave the stream as is
    #[default]
    None,
    /// Close the handle, keep the stream registered
    Close,
    /// Close the handle and unregister the stream
    Remove,
}

/// File handle with read/write intent, opened on demand
#[derive(Debug, Default)]
pub struct SourceStream {
    path: PathBuf,
    writable: bool,
    file: Option<File>,
}

impl SourceStream {
    pub fn new(path: impl Into<PathBuf>, writable: bool) -> Self {
        Self {
            path: path.into(),
            writable,
            file: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    pub fn open(&mut self) -> io::Result<()> {
        if self.file.is_none() {
            let file = OpenOptions::new()
                .read(true)
                .write(self.writable)
                .open(&self.path)?;
            debug!(path = %self.path.display(), "source stream opened");
            self.file = Some(file);
        }
        Ok(())
    }

    pub fn close(&mut self) {
        if self.file.take().is_some() {
            debug!(path = %self.path.display(), "source stream closed");
        }
    }

    /// Read exactly `size` bytes at `position`, opening the stream if needed.
    pub fn read_at(&mut self, position: u64, size: u64) -> io::Result<Vec<u8>> {
        self.open()?;
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "stream not open"))?;
        let size = usize::try_from(size)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "entry too large"))?;
        file.seek(SeekFrom::Start(position))?;
        let mut buf = vec![0u8; size];
        file.read_exact(&mut buf)?;
        Ok(buf)
    }
}
