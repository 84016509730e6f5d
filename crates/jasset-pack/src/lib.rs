//! # jasset-pack
//!
//! `JPAK` package container for shipped asset sources.
//!
//! A packed source replaces thousands of loose files with one container
//! that is memory-mapped at load time. Entries are addressed by their
//! position in the index, which is what the `.resdb` cache stores.
//!
//! ## Package Format
//!
//! ```text
//! +----------------+
//! | Header (32B)   |  Magic, version, entry count, offsets, index CRC
//! +----------------+
//! | Index Table    |  bincode [Path, Offset, Length] × N
//! +----------------+
//! | Blob Data      |  Raw concatenated entry bytes
//! +----------------+
//! ```

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use jasset_config::{log_pack_info, log_pack_warn};

/// Magic bytes for package identification
pub const PACK_MAGIC: &[u8; 4] = b"JPAK";
/// Current package format version
pub const PACK_VERSION: u32 = 1;
/// Size of the fixed header
pub const HEADER_SIZE: u64 = 32;

/// Errors that can occur during package operations
#[derive(Error, Debug)]
pub enum PackError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("Invalid package: {0}")]
    Invalid(String),

    #[error("Index checksum mismatch (expected {expected:08x}, got {actual:08x})")]
    Checksum { expected: u32, actual: u32 },

    #[error("Entry not found in package: {0}")]
    NotFound(String),

    #[error("Duplicate entry: {0}")]
    Duplicate(String),
}

pub type Result<T> = std::result::Result<T, PackError>;

/// Package header (fixed 32 bytes)
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PackHeader {
    magic: [u8; 4],
    version: u32,
    entry_count: u32,
    index_offset: u64,
    data_offset: u64,
    index_crc: u32,
}

impl PackHeader {
    fn new(entry_count: u32, index_offset: u64, data_offset: u64, index_crc: u32) -> Self {
        Self {
            magic: *PACK_MAGIC,
            version: PACK_VERSION,
            entry_count,
            index_offset,
            data_offset,
            index_crc,
        }
    }

    fn validate(&self, file_len: u64) -> Result<()> {
        if &self.magic != PACK_MAGIC {
            return Err(PackError::Invalid("Bad magic bytes".to_string()));
        }
        if self.version != PACK_VERSION {
            return Err(PackError::Invalid(format!(
                "Unsupported version: {}",
                self.version
            )));
        }
        if self.index_offset < HEADER_SIZE
            || self.index_offset > self.data_offset
            || self.data_offset > file_len
        {
            return Err(PackError::Invalid("Section offsets out of range".to_string()));
        }
        Ok(())
    }
}

/// Index entry for one packed file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackIndexEntry {
    /// Path below the source root
    pub path: String,
    /// Offset within the data section
    pub offset: u64,
    /// Length of the entry
    pub length: u64,
}

fn lookup_key(path: &str) -> String {
    path.trim_matches(['/', '\\'])
        .replace('\\', "/")
        .to_ascii_lowercase()
}

/// Memory-mapped package reader
pub struct PackReader {
    path: PathBuf,
    mmap: Mmap,
    entries: Vec<PackIndexEntry>,
    lookup: HashMap<String, u32>,
    data_offset: u64,
}

impl PackReader {
    /// Open a package for reading
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let file_len = file.metadata()?.len();
        if file_len < HEADER_SIZE {
            return Err(PackError::Invalid("File too small".to_string()));
        }
        let mmap = unsafe { Mmap::map(&file) }.map_err(io::Error::other)?;

        let header: PackHeader = bincode::deserialize(&mmap[..HEADER_SIZE as usize])?;
        header.validate(file_len)?;

        let index_bytes = &mmap[header.index_offset as usize..header.data_offset as usize];
        let actual = crc32fast::hash(index_bytes);
        if actual != header.index_crc {
            return Err(PackError::Checksum {
                expected: header.index_crc,
                actual,
            });
        }
        let entries: Vec<PackIndexEntry> = bincode::deserialize(index_bytes)?;
        if entries.len() != header.entry_count as usize {
            return Err(PackError::Invalid(format!(
                "Index holds {} entries, header says {}",
                entries.len(),
                header.entry_count
            )));
        }

        let data_len = file_len - header.data_offset;
        for entry in &entries {
            let end = entry.offset.checked_add(entry.length);
            if end.map_or(true, |end| end > data_len) {
                return Err(PackError::Invalid(format!(
                    "Entry extends past EOF: {}",
                    entry.path
                )));
            }
        }

        let lookup = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (lookup_key(&e.path), i as u32))
            .collect();

        log_pack_info!("Package opened", entries = entries.len());
        Ok(Self {
            path,
            mmap,
            entries,
            lookup,
            data_offset: header.data_offset,
        })
    }

    /// Position of `path` in the index (case-insensitive)
    pub fn find(&self, path: &str) -> Option<u32> {
        self.lookup.get(&lookup_key(path)).copied()
    }

    /// Index entry at `position`
    pub fn entry(&self, position: u32) -> Option<&PackIndexEntry> {
        self.entries.get(position as usize)
    }

    /// All index entries in package order
    pub fn entries(&self) -> &[PackIndexEntry] {
        &self.entries
    }

    /// Absolute `(offset, length)` of an entry within the package file
    pub fn file_range(&self, position: u32) -> Option<(u64, u64)> {
        self.entry(position)
            .map(|e| (self.data_offset + e.offset, e.length))
    }

    /// Entry bytes by position (zero-copy via mmap slice)
    pub fn get_at(&self, position: u32) -> Result<&[u8]> {
        let (start, length) = self
            .file_range(position)
            .ok_or_else(|| PackError::NotFound(format!("#{position}")))?;
        let start = start as usize;
        Ok(&self.mmap[start..start + length as usize])
    }

    /// Entry bytes by path
    pub fn get(&self, path: &str) -> Result<&[u8]> {
        let position = self
            .find(path)
            .ok_or_else(|| PackError::NotFound(path.to_string()))?;
        self.get_at(position)
    }

    /// Check if an entry exists in this package
    pub fn contains(&self, path: &str) -> bool {
        self.find(path).is_some()
    }

    /// Get package path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get number of entries in the package
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if package is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Builder for creating new packages
pub struct PackWriter {
    output_path: PathBuf,
    entries: Vec<PackIndexEntry>,
    seen: HashMap<String, u32>,
    data: Vec<u8>,
}

impl PackWriter {
    /// Create a new package writer
    pub fn new<P: AsRef<Path>>(output_path: P) -> Self {
        Self {
            output_path: output_path.as_ref().to_path_buf(),
            entries: Vec::new(),
            seen: HashMap::new(),
            data: Vec::new(),
        }
    }

    /// Add an entry. Returns its position in the index.
    pub fn add(&mut self, path: &str, data: &[u8]) -> Result<u32> {
        let key = lookup_key(path);
        if self.seen.contains_key(&key) {
            return Err(PackError::Duplicate(path.to_string()));
        }
        let position = u32::try_from(self.entries.len())
            .map_err(|_| PackError::Invalid("Too many entries".to_string()))?;

        self.entries.push(PackIndexEntry {
            path: path.replace('\\', "/"),
            offset: self.data.len() as u64,
            length: data.len() as u64,
        });
        self.seen.insert(key, position);
        self.data.extend_from_slice(data);
        Ok(position)
    }

    /// Add the contents of a file on disk under `path`.
    pub fn add_file(&mut self, path: &str, host_path: &Path) -> Result<u32> {
        let data = std::fs::read(host_path)?;
        self.add(path, &data)
    }

    /// Number of entries added so far
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the package to disk
    pub fn finish(self) -> Result<PathBuf> {
        if let Some(parent) = self.output_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(&self.output_path)?;
        let mut writer = BufWriter::new(file);

        // Reserve space for header (will write at end)
        writer.write_all(&[0u8; HEADER_SIZE as usize])?;

        let index_offset = HEADER_SIZE;
        let index_bytes = bincode::serialize(&self.entries)?;
        writer.write_all(&index_bytes)?;

        let data_offset = HEADER_SIZE + index_bytes.len() as u64;
        writer.write_all(&self.data)?;

        let header = PackHeader::new(
            self.entries.len() as u32,
            index_offset,
            data_offset,
            crc32fast::hash(&index_bytes),
        );
        let header_bytes = bincode::serialize(&header)?;
        if header_bytes.len() as u64 != HEADER_SIZE {
            log_pack_warn!("Unexpected header size", size = header_bytes.len());
            return Err(PackError::Invalid("Header encoding".to_string()));
        }

        writer.seek(SeekFrom::Start(0))?;
        writer.write_all(&header_bytes)?;
        writer.flush()?;

        log_pack_info!(
            "Package written",
            entries = self.entries.len(),
            bytes = self.data.len()
        );
        Ok(self.output_path)
    }
}
