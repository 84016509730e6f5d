//! `.resdb` cache files.
//!
//! A cache records the entries of one source so the next session can skip
//! the directory scan (or, for packed sources, replace it entirely).
//!
//! ```text
//! +----------------------+
//! | "ASDB"               |
//! | u32 entry count      |  written as 0, patched once all records are out
//! +----------------------+
//! | u32 len + path       |
//! | u8  entry type       |  0 folder, 1 file, 2 packed, 3 runtime
//! | i8  pak index        |  -1 when the entry is not packed
//! | u32 position         |
//! | u32 len + meta blob  |  bincode, len 0 = no metadata
//! +----------------------+  × count
//! ```
//!
//! All integers are little-endian. Paths are relative to the source root.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use jasset_config::log_vfs_warn;

use crate::entry::EntryInfo;

/// Magic bytes at the start of every cache file
pub const CACHE_MAGIC: &[u8; 4] = b"ASDB";

/// Upper bound for a single path or metadata blob
const MAX_FIELD_LEN: u32 = 16 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Metadata encoding error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("Bad cache magic")]
    BadMagic,

    #[error("Cache truncated")]
    Truncated,

    #[error("Invalid entry type {0}")]
    InvalidType(u8),

    #[error("Invalid record: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, CacheError>;

/// Kind tag stored per record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EntryType {
    Folder = 0,
    File = 1,
    Packed = 2,
    Runtime = 3,
}

impl EntryType {
    pub fn of(info: EntryInfo) -> Self {
        if info.is_folder() {
            EntryType::Folder
        } else if info.is_file() {
            EntryType::File
        } else if info.is_packed() {
            EntryType::Packed
        } else {
            EntryType::Runtime
        }
    }
}

impl TryFrom<u8> for EntryType {
    type Error = CacheError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(EntryType::Folder),
            1 => Ok(EntryType::File),
            2 => Ok(EntryType::Packed),
            3 => Ok(EntryType::Runtime),
            other => Err(CacheError::InvalidType(other)),
        }
    }
}

/// One persisted entry
#[derive(Debug, Clone, PartialEq)]
pub struct CacheRecord<M> {
    /// Path below the source root
    pub path: String,
    pub kind: EntryType,
    /// Package the entry lives in, -1 if none
    pub pak_index: i8,
    /// Entry index inside that package
    pub position: u32,
    pub meta: Option<M>,
}

impl<M> CacheRecord<M> {
    pub fn new(path: impl Into<String>, kind: EntryType) -> Self {
        Self {
            path: path.into(),
            kind,
            pak_index: -1,
            position: 0,
            meta: None,
        }
    }

    pub fn with_pak(mut self, pak_index: i8, position: u32) -> Self {
        self.pak_index = pak_index;
        self.position = position;
        self
    }

    pub fn with_meta(mut self, meta: Option<M>) -> Self {
        self.meta = meta;
        self
    }
}

/// Write `records` and patch the count into the header. Returns the count.
pub fn write_cache<'a, W, M, I>(mut writer: W, records: I) -> Result<u32>
where
    W: Write + Seek,
    M: Serialize + 'a,
    I: IntoIterator<Item = &'a CacheRecord<M>>,
{
    let start = writer.stream_position()?;
    writer.write_all(CACHE_MAGIC)?;
    writer.write_all(&0u32.to_le_bytes())?;

    let mut count: u32 = 0;
    for record in records {
        write_field(&mut writer, record.path.as_bytes())?;
        writer.write_all(&[record.kind as u8])?;
        writer.write_all(&record.pak_index.to_le_bytes())?;
        writer.write_all(&record.position.to_le_bytes())?;
        match &record.meta {
            Some(meta) => write_field(&mut writer, &bincode::serialize(meta)?)?,
            None => writer.write_all(&0u32.to_le_bytes())?,
        }
        count += 1;
    }

    let end = writer.stream_position()?;
    writer.seek(SeekFrom::Start(start + CACHE_MAGIC.len() as u64))?;
    writer.write_all(&count.to_le_bytes())?;
    writer.seek(SeekFrom::Start(end))?;
    writer.flush()?;
    Ok(count)
}

/// Read every record of a cache stream.
pub fn read_cache<R, M>(mut reader: R) -> Result<Vec<CacheRecord<M>>>
where
    R: Read,
    M: DeserializeOwned,
{
    let mut magic = [0u8; 4];
    read_exact(&mut reader, &mut magic)?;
    if &magic != CACHE_MAGIC {
        return Err(CacheError::BadMagic);
    }
    let count = read_u32(&mut reader)?;

    // Cap the preallocation; a corrupt count must not trigger a huge alloc
    let mut records = Vec::with_capacity(count.min(4096) as usize);
    for _ in 0..count {
        let path_bytes = read_field(&mut reader)?;
        let path = String::from_utf8(path_bytes)
            .map_err(|_| CacheError::Invalid("path is not UTF-8".to_string()))?;

        let mut tag = [0u8; 2];
        read_exact(&mut reader, &mut tag)?;
        let kind = EntryType::try_from(tag[0])?;
        let pak_index = i8::from_le_bytes([tag[1]]);
        let position = read_u32(&mut reader)?;

        let blob = read_field(&mut reader)?;
        let meta = if blob.is_empty() {
            None
        } else {
            Some(bincode::deserialize(&blob)?)
        };

        records.push(CacheRecord {
            path,
            kind,
            pak_index,
            position,
            meta,
        });
    }
    Ok(records)
}

/// Write a cache file at `path`, replacing any previous one.
pub fn save_cache<M: Serialize>(path: &Path, records: &[CacheRecord<M>]) -> Result<u32> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    let count = write_cache(BufWriter::new(file), records)?;
    debug!(path = %path.display(), count, "cache written");
    Ok(count)
}

/// Load a cache file. Missing or malformed caches are logged and read as
/// absent.
pub fn load_cache<M: DeserializeOwned>(path: &Path) -> Option<Vec<CacheRecord<M>>> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
        Err(e) => {
            log_vfs_warn!("Cache unreadable", error = e.to_string().as_str());
            return None;
        }
    };
    match read_cache(BufReader::new(file)) {
        Ok(records) => Some(records),
        Err(e) => {
            log_vfs_warn!("Cache rejected", error = e.to_string().as_str());
            None
        }
    }
}

fn write_field<W: Write>(writer: &mut W, bytes: &[u8]) -> Result<()> {
    let len = u32::try_from(bytes.len())
        .ok()
        .filter(|len| *len <= MAX_FIELD_LEN)
        .ok_or_else(|| CacheError::Invalid(format!("field of {} bytes", bytes.len())))?;
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(bytes)?;
    Ok(())
}

fn read_field<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    let len = read_u32(reader)?;
    if len > MAX_FIELD_LEN {
        return Err(CacheError::Invalid(format!("field of {len} bytes")));
    }
    let mut buf = vec![0u8; len as usize];
    read_exact(reader, &mut buf)?;
    Ok(buf)
}

fn read_u32<R: Read>(reader: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    read_exact(reader, &mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_exact<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => CacheError::Truncated,
        _ => CacheError::Io(e),
    })
}
