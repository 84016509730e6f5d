//! Asset metadata and its `.meta` sidecar files.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use jasset_config::log_assetdb_warn;
use jasset_hash::Uuid8;

use crate::Result;

/// Sidecar extension appended to the asset's own file name
pub const META_EXTENSION: &str = "meta";

/// Encoding for [`AssetMetaData`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaFormat {
    /// Human-editable JSON, used for sidecars
    Json,
    /// bincode, used inside `.resdb` caches
    Binary,
}

/// Persistent identity and classification of one asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetMetaData {
    pub uuid: Uuid8,
    #[serde(rename = "type", default)]
    pub type_name: String,
    #[serde(default)]
    pub flags: u32,
}

impl AssetMetaData {
    /// Metadata was generated by the database rather than authored
    pub const GENERATED: u32 = 1 << 0;

    pub fn new(uuid: Uuid8, type_name: impl Into<String>) -> Self {
        Self {
            uuid,
            type_name: type_name.into(),
            flags: 0,
        }
    }

    /// Fresh metadata for a source-relative path; identity is the path hash.
    pub fn generate(relative_path: &str, type_name: &str) -> Self {
        Self {
            uuid: Uuid8::from_path(relative_path),
            type_name: type_name.to_string(),
            flags: Self::GENERATED,
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        !self.uuid.is_empty()
    }

    pub fn serialize<W: Write>(&self, format: MetaFormat, sink: W) -> Result<()> {
        match format {
            MetaFormat::Json => serde_json::to_writer_pretty(sink, self)?,
            MetaFormat::Binary => bincode::serialize_into(sink, self)?,
        }
        Ok(())
    }

    pub fn deserialize<R: Read>(format: MetaFormat, source: R) -> Result<Self> {
        Ok(match format {
            MetaFormat::Json => serde_json::from_reader(source)?,
            MetaFormat::Binary => bincode::deserialize_from(source)?,
        })
    }
}

/// `<asset>.meta` next to the asset's host file
pub fn sidecar_path(host_path: &Path) -> PathBuf {
    let mut name = host_path.as_os_str().to_os_string();
    name.push(".");
    name.push(META_EXTENSION);
    PathBuf::from(name)
}

/// Read a sidecar. Missing, malformed or empty-identity sidecars read as
/// absent.
pub fn read_sidecar(host_path: &Path) -> Option<AssetMetaData> {
    let path = sidecar_path(host_path);
    let bytes = std::fs::read(&path).ok()?;
    match AssetMetaData::deserialize(MetaFormat::Json, bytes.as_slice()) {
        Ok(meta) if meta.is_valid() => Some(meta),
        Ok(_) => {
            log_assetdb_warn!("Sidecar has empty uuid", path = &*path.to_string_lossy());
            None
        }
        Err(e) => {
            log_assetdb_warn!(
                "Malformed sidecar",
                path = &*path.to_string_lossy(),
                error = e.to_string().as_str()
            );
            None
        }
    }
}

/// Write (or replace) the sidecar of `host_path`.
pub fn write_sidecar(host_path: &Path, meta: &AssetMetaData) -> Result<()> {
    let mut buf = Vec::new();
    meta.serialize(MetaFormat::Json, &mut buf)?;
    buf.push(b'\n');
    std::fs::write(sidecar_path(host_path), buf)?;
    Ok(())
}
