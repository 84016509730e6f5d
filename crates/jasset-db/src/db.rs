//! The asset database: one [`Vfs`] per [`AssetSource`] plus the live-asset
//! tables and metadata that sit on top of them.
//!
//! ```text
//! Uninitialized ──► Scanning ──► Validated ──► Ready
//!        │        (cache + scan)  (metadata)     ▲
//!        └──────── packed: .resdb + JPAK ────────┘
//! ```

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use jasset_config::path::ensure_writable_dir;
use jasset_config::{
    log_assetdb_debug, log_assetdb_error, log_assetdb_info, log_assetdb_warn, Config,
};
use jasset_hash::{BuildUuid8Hasher, Uuid8};
use jasset_pack::{PackReader, PackWriter};
use jasset_pool::{PoolAllocator, PoolKey};
use jasset_vfs::cache::{read_cache, save_cache};
use jasset_vfs::{
    CacheRecord, EntryInfo, EntryType, FileEntry, FileId, IgnoreMatcher, MonitorEvent, Vfs,
    NULL_SOURCE,
};

use crate::asset_ref::AssetRef;
use crate::meta::{read_sidecar, write_sidecar, AssetMetaData};
use crate::registry::AssetRegistry;
use crate::source::{AssetSource, SourceMask, SRC_COUNT};
use crate::{AssetDbError, Result};

/// Lifecycle of one source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceState {
    #[default]
    Uninitialized,
    Scanning,
    Validated,
    Ready,
}

impl SourceState {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceState::Uninitialized => "uninitialized",
            SourceState::Scanning => "scanning",
            SourceState::Validated => "validated",
            SourceState::Ready => "ready",
        }
    }
}

/// A live asset instance
#[derive(Debug, Clone)]
pub struct Asset {
    asset_ref: AssetRef,
    entry: FileId,
    path: String,
    meta: AssetMetaData,
}

impl Asset {
    pub fn asset_ref(&self) -> AssetRef {
        self.asset_ref
    }

    /// Backing entry in the source's VFS
    pub fn entry(&self) -> FileId {
        self.entry
    }

    /// Path below the source root
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn meta(&self) -> &AssetMetaData {
        &self.meta
    }

    pub fn uuid(&self) -> Uuid8 {
        self.meta.uuid
    }

    pub fn type_name(&self) -> &str {
        &self.meta.type_name
    }
}

/// One source's VFS with its metadata and live assets
pub struct VfsSource {
    kind: AssetSource,
    vfs: Vfs,
    state: SourceState,
    packed: bool,
    cache_path: PathBuf,
    package_path: PathBuf,
    metas: HashMap<FileId, AssetMetaData>,
    uuids: HashMap<Uuid8, FileId, BuildUuid8Hasher>,
    assets: PoolAllocator<Asset>,
    live: HashMap<FileId, PoolKey>,
    package: Option<PackReader>,
    package_stream: u32,
    #[cfg(feature = "monitor")]
    monitor: Option<jasset_vfs::DirectoryMonitor>,
}

impl VfsSource {
    fn new(kind: AssetSource, config: &Config, editor: bool) -> Self {
        let section = kind.config(config);
        let root = config.source_root(section);
        let stem = kind.file_stem();

        // Packed sources keep cache and package side by side in their root
        let cache_path = if section.packed {
            root.join(format!("{stem}.resdb"))
        } else {
            config.cache_dir().join(format!("{stem}.resdb"))
        };
        let package_path = root.join(format!("{stem}.jpak"));

        let vfs = Vfs::new(kind.name(), root)
            .with_ignore(IgnoreMatcher::with_patterns(&config.scan.ignore_patterns))
            .with_max_depth(config.scan.max_depth)
            .writable(editor && section.writable && !section.packed);

        Self {
            kind,
            vfs,
            state: SourceState::Uninitialized,
            packed: section.packed,
            cache_path,
            package_path,
            metas: HashMap::new(),
            uuids: HashMap::default(),
            assets: PoolAllocator::new(),
            live: HashMap::new(),
            package: None,
            package_stream: NULL_SOURCE,
            #[cfg(feature = "monitor")]
            monitor: None,
        }
    }

    pub fn kind(&self) -> AssetSource {
        self.kind
    }

    pub fn vfs(&self) -> &Vfs {
        &self.vfs
    }

    pub fn state(&self) -> SourceState {
        self.state
    }

    pub fn is_packed(&self) -> bool {
        self.packed
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    pub fn package_path(&self) -> &Path {
        &self.package_path
    }

    /// Validated metadata of a file entry
    pub fn meta(&self, id: FileId) -> Option<&AssetMetaData> {
        self.metas.get(&id)
    }

    /// Entry carrying `uuid`, or `FileId::NULL_ID`
    pub fn entry_by_uuid(&self, uuid: Uuid8) -> FileId {
        self.uuids.get(&uuid).copied().unwrap_or(FileId::NULL_ID)
    }

    /// Number of live assets
    pub fn asset_count(&self) -> usize {
        self.assets.len()
    }

    /// Files carrying metadata, from sidecars, caches or generated on scan
    pub fn meta_count(&self) -> usize {
        self.metas.len()
    }

    pub fn is_monitored(&self) -> bool {
        #[cfg(feature = "monitor")]
        {
            self.monitor.is_some()
        }
        #[cfg(not(feature = "monitor"))]
        {
            false
        }
    }

    fn file_entry(&self, path: &str) -> FileId {
        let id = self.vfs.index_of_file_entry(&self.vfs.full_path(path));
        if id.is_valid() && !id.is_folder() {
            id
        } else {
            FileId::NULL_ID
        }
    }

    /// Drop metadata and live assets whose entry left the tree.
    fn prune(&mut self) -> usize {
        let vfs = &self.vfs;
        self.metas.retain(|id, _| vfs.get_entry(*id).is_some());
        self.uuids.retain(|_, id| vfs.get_entry(*id).is_some());

        let dead: Vec<FileId> = self
            .live
            .keys()
            .filter(|id| vfs.get_entry(**id).is_none())
            .copied()
            .collect();
        for id in &dead {
            if let Some(key) = self.live.remove(id) {
                self.assets.deallocate(key);
            }
        }
        dead.len()
    }

    fn records(&self) -> Vec<CacheRecord<AssetMetaData>> {
        let mut records = Vec::with_capacity(self.vfs.entry_count());
        for id in self.vfs.walk() {
            if id == self.vfs.root() {
                continue;
            }
            let (Some(entry), Some(rel)) = (self.vfs.get_entry(id), self.vfs.relative_path(id))
            else {
                continue;
            };
            let kind = EntryType::of(entry.data_info());
            let mut record = CacheRecord::new(rel, kind).with_meta(self.metas.get(&id).cloned());
            if kind == EntryType::Packed {
                match self.package.as_ref().and_then(|p| p.find(&record.path)) {
                    Some(position) => record = record.with_pak(0, position),
                    None => {
                        warn!(path = %record.path, "Packed entry missing from package, not cached");
                        continue;
                    }
                }
            }
            records.push(record);
        }
        records
    }

    /// Add cached records to the tree. Returns the number restored.
    fn restore(&mut self, records: Vec<CacheRecord<AssetMetaData>>) -> usize {
        let mut restored = 0;
        for record in records {
            let (source, info) = match record.kind {
                EntryType::Folder => (NULL_SOURCE, EntryInfo::folder()),
                EntryType::File => (NULL_SOURCE, EntryInfo::file()),
                EntryType::Runtime => (NULL_SOURCE, EntryInfo::runtime(0)),
                EntryType::Packed => {
                    let range = match (&self.package, record.pak_index) {
                        (Some(package), 0) => package.file_range(record.position),
                        _ => None,
                    };
                    match range {
                        Some((offset, length)) => {
                            (self.package_stream, EntryInfo::packed(offset, length))
                        }
                        None => {
                            warn!(path = %record.path, pak = record.pak_index, "Packed record has no package entry");
                            continue;
                        }
                    }
                }
            };
            let full = self.vfs.full_path(&record.path);
            let (id, _) = self.vfs.add_entry(source, &full, info);
            if !id.is_valid() {
                continue;
            }
            if let Some(meta) = record.meta.filter(|m| m.is_valid() && !id.is_folder()) {
                self.metas.insert(id, meta);
            }
            restored += 1;
        }
        restored
    }
}

/// Asset database over every [`AssetSource`]
pub struct AssetDb {
    sources: Vec<VfsSource>,
    registry: AssetRegistry,
    editor: bool,
    write_cache_on_build: bool,
    #[cfg_attr(not(feature = "monitor"), allow(dead_code))]
    monitor_enabled: bool,
    #[cfg_attr(not(feature = "monitor"), allow(dead_code))]
    monitor_interval_ms: u64,
    #[cfg_attr(not(feature = "monitor"), allow(dead_code))]
    ignore: IgnoreMatcher,
}

impl AssetDb {
    /// Create the database. Sources stay `Uninitialized` until
    /// [`initialize`](Self::initialize).
    pub fn new(config: &Config, registry: AssetRegistry) -> Self {
        let editor = config.project.editor;
        let sources = AssetSource::ALL
            .into_iter()
            .map(|kind| VfsSource::new(kind, config, editor))
            .collect();
        Self {
            sources,
            registry,
            editor,
            write_cache_on_build: config.cache.write_on_build,
            monitor_enabled: config.monitor.enabled,
            monitor_interval_ms: config.monitor.poll_interval_ms,
            ignore: IgnoreMatcher::with_patterns(&config.scan.ignore_patterns),
        }
    }

    pub fn is_editor(&self) -> bool {
        self.editor
    }

    pub fn registry(&self) -> &AssetRegistry {
        &self.registry
    }

    pub fn source(&self, source: AssetSource) -> &VfsSource {
        &self.sources[source.index()]
    }

    fn source_mut(&mut self, source: AssetSource) -> &mut VfsSource {
        &mut self.sources[source.index()]
    }

    pub fn state(&self, source: AssetSource) -> SourceState {
        self.source(source).state
    }

    /// VFS of the source at `index` (`None` past `SRC_COUNT`)
    pub fn get_vfs(&self, index: usize) -> Option<&Vfs> {
        debug_assert_eq!(self.sources.len(), SRC_COUNT);
        self.sources.get(index).map(|s| &s.vfs)
    }

    /// Entry at `path` (relative to the source root)
    pub fn find_from_vfs(&self, path: &str, source: AssetSource) -> Option<&FileEntry> {
        let vfs = &self.source(source).vfs;
        vfs.find_entry(&vfs.full_path(path))
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Bring every source in `mask` to `Ready`. Returns how many made it.
    pub fn initialize(&mut self, mask: SourceMask) -> usize {
        let mut ready = 0;
        for source in mask.iter() {
            let ok = if self.source(source).packed {
                self.load_packed(source)
            } else {
                self.initialize_loose(source)
            };
            if ok {
                ready += 1;
            }
        }
        log_assetdb_info!("Asset database initialized", ready = ready);
        ready
    }

    fn initialize_loose(&mut self, source: AssetSource) -> bool {
        self.source_mut(source).state = SourceState::Scanning;

        match self.load_from_asset_db(source) {
            Ok(n) => log_assetdb_debug!("Cache restored", source = source.name(), restored = n),
            Err(AssetDbError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                log_assetdb_warn!("Cache ignored", source = source.name(), error = e.to_string().as_str());
            }
        }

        self.build_vfs(source.mask());
        self.validate_meta_data(source);

        if self.editor && self.write_cache_on_build {
            if let Err(e) = self.save_to_asset_db(source) {
                log_assetdb_warn!("Cache not written", source = source.name(), error = e.to_string().as_str());
            }
        }

        #[cfg(feature = "monitor")]
        self.start_monitor(source);

        self.source_mut(source).state = SourceState::Ready;
        true
    }

    fn load_packed(&mut self, source: AssetSource) -> bool {
        let s = self.source_mut(source);
        s.state = SourceState::Scanning;

        let package = match PackReader::open(&s.package_path) {
            Ok(p) => p,
            Err(e) => {
                log_assetdb_error!(
                    "Package unavailable",
                    source = source.name(),
                    error = e.to_string().as_str()
                );
                s.state = SourceState::Uninitialized;
                return false;
            }
        };
        s.package_stream = s.vfs.add_source_file(&s.package_path);
        s.package = Some(package);

        match self.load_from_asset_db(source) {
            Ok(n) => log_assetdb_debug!("Packed cache restored", source = source.name(), restored = n),
            Err(e) => {
                log_assetdb_warn!(
                    "Packed cache unusable, indexing package",
                    source = source.name(),
                    error = e.to_string().as_str()
                );
                let s = self.source_mut(source);
                let records: Vec<CacheRecord<AssetMetaData>> = s
                    .package
                    .as_ref()
                    .map(|p| {
                        (0..p.len() as u32)
                            .filter_map(|i| {
                                p.entry(i).map(|e| {
                                    CacheRecord::new(e.path.clone(), EntryType::Packed).with_pak(0, i)
                                })
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                s.restore(records);
            }
        }

        self.validate_meta_data(source);
        self.source_mut(source).state = SourceState::Ready;
        true
    }

    #[cfg(feature = "monitor")]
    fn start_monitor(&mut self, source: AssetSource) {
        if !self.editor || !self.monitor_enabled {
            return;
        }
        let interval = std::time::Duration::from_millis(self.monitor_interval_ms);
        let ignore = self.ignore.clone();
        let s = self.source_mut(source);
        if s.packed || s.monitor.is_some() || !s.vfs.root_path().is_dir() {
            return;
        }
        match jasset_vfs::DirectoryMonitor::new(s.vfs.root_path(), ignore, interval) {
            Ok(monitor) => s.monitor = Some(monitor),
            Err(e) => warn!(source = %source, error = %e, "Directory monitor unavailable"),
        }
    }

    /// Scan and reconcile every loose source in `mask` against disk.
    /// Returns the number of entries added plus removed.
    pub fn build_vfs(&mut self, mask: SourceMask) -> usize {
        let mut changed = 0;
        for source in mask.iter() {
            let s = self.source_mut(source);
            if s.packed {
                debug!(source = %source, "packed source, scan skipped");
                continue;
            }
            let stats = s.vfs.build_from_root();
            let removed = s.vfs.remove_missing();
            s.prune();
            changed += stats.added + removed;
        }
        changed
    }

    /// Check every file entry's metadata in `source`, reading `.meta`
    /// sidecars where the source is editable and regenerating what is
    /// missing, malformed or duplicated. Returns the number regenerated.
    pub fn validate_meta_data(&mut self, source: AssetSource) -> usize {
        let registry = &self.registry;
        let s = &mut self.sources[source.index()];
        let sidecars = s.vfs.is_writable();

        let files: Vec<(FileId, String, EntryInfo)> = s
            .vfs
            .walk()
            .into_iter()
            .filter_map(|id| {
                let entry = s.vfs.get_entry(id)?;
                if entry.is_folder() {
                    return None;
                }
                Some((id, s.vfs.relative_path(id)?, entry.data_info()))
            })
            .collect();

        let mut metas = HashMap::with_capacity(files.len());
        let mut uuids: HashMap<Uuid8, FileId, BuildUuid8Hasher> = HashMap::default();
        let mut regenerated = 0;

        for (id, rel, info) in files {
            let type_name = registry.classify(&rel);
            let host = if sidecars && info.is_file() {
                s.vfs.host_path(id)
            } else {
                None
            };

            let from_sidecar = host.as_deref().and_then(read_sidecar);
            let mut dirty = host.is_some() && from_sidecar.is_none();
            let mut meta = match from_sidecar
                .or_else(|| s.metas.get(&id).filter(|m| m.is_valid()).cloned())
            {
                Some(meta) => meta,
                None => {
                    regenerated += 1;
                    AssetMetaData::generate(&rel, type_name)
                }
            };
            if meta.type_name.is_empty() {
                meta.type_name = type_name.to_string();
                dirty = host.is_some();
            }

            // A copied asset brings its sidecar and thus a duplicate identity
            if uuids.contains_key(&meta.uuid) {
                let fresh = AssetMetaData::generate(&rel, &meta.type_name);
                if uuids.contains_key(&fresh.uuid) {
                    log_assetdb_warn!("Unresolvable duplicate uuid", path = rel.as_str());
                    continue;
                }
                log_assetdb_warn!("Duplicate uuid regenerated", path = rel.as_str());
                meta = fresh;
                regenerated += 1;
                dirty = host.is_some();
            }

            if dirty {
                if let Some(host) = &host {
                    if let Err(e) = write_sidecar(host, &meta) {
                        warn!(path = %host.display(), error = %e, "Failed to write sidecar");
                    }
                }
            }
            uuids.insert(meta.uuid, id);
            metas.insert(id, meta);
        }

        let live: Vec<(FileId, PoolKey)> = s.live.iter().map(|(id, key)| (*id, *key)).collect();
        for (id, key) in live {
            let Some(meta) = metas.get(&id) else { continue };
            if let Some(asset) = s.assets.get_mut(key) {
                asset.meta = meta.clone();
            }
        }

        s.metas = metas;
        s.uuids = uuids;
        if s.state == SourceState::Scanning {
            s.state = SourceState::Validated;
        }
        if regenerated > 0 {
            info!(source = %source, regenerated, "Metadata regenerated");
        }
        regenerated
    }

    /// Drain directory monitor events for `mask` and apply them.
    pub fn refresh(&mut self, mask: SourceMask) -> usize {
        let mut changed = 0;
        for source in mask.iter() {
            #[cfg(feature = "monitor")]
            let events = self
                .source(source)
                .monitor
                .as_ref()
                .map(|m| m.poll())
                .unwrap_or_default();
            #[cfg(not(feature = "monitor"))]
            let events: Vec<MonitorEvent> = Vec::new();

            if !events.is_empty() {
                changed += self.apply_events(source, &events);
            }
        }
        changed
    }

    /// Apply change events to a loose source and re-validate its metadata.
    pub fn apply_events(&mut self, source: AssetSource, events: &[MonitorEvent]) -> usize {
        let s = self.source_mut(source);
        if s.packed {
            return 0;
        }
        let changed = s.vfs.apply_changes(events);
        if changed > 0 {
            s.prune();
            self.validate_meta_data(source);
        }
        changed
    }

    // ========================================================================
    // Assets
    // ========================================================================

    /// Live asset for the file at `path` in `source`, created on first use.
    pub fn create_asset(&mut self, path: &str, source: AssetSource) -> AssetRef {
        let id = self.source(source).file_entry(path);
        self.create_asset_for_entry(source, id)
    }

    fn create_asset_for_entry(&mut self, source: AssetSource, id: FileId) -> AssetRef {
        let registry = &self.registry;
        let s = &mut self.sources[source.index()];
        if s.vfs.get_entry(id).is_none() || id.is_folder() {
            return AssetRef::NULL_ASSET;
        }
        if let Some(key) = s.live.get(&id) {
            return AssetRef::from_key(source, *key);
        }

        let Some(path) = s.vfs.relative_path(id) else {
            return AssetRef::NULL_ASSET;
        };
        let meta = s
            .metas
            .get(&id)
            .cloned()
            .unwrap_or_else(|| AssetMetaData::generate(&path, registry.classify(&path)));

        let asset = Asset {
            asset_ref: AssetRef::NULL_ASSET,
            entry: id,
            path,
            meta,
        };
        let Some(key) = s.assets.allocate_with(asset) else {
            log_assetdb_error!("Asset table exhausted", source = source.name());
            return AssetRef::NULL_ASSET;
        };
        if key.index() >= AssetRef::INDEX_MASK {
            s.assets.deallocate(key);
            log_assetdb_error!("Asset index out of range", source = source.name());
            return AssetRef::NULL_ASSET;
        }

        let asset_ref = AssetRef::from_key(source, key);
        if let Some(asset) = s.assets.get_mut(key) {
            asset.asset_ref = asset_ref;
        }
        s.live.insert(id, key);
        asset_ref
    }

    /// Resolve `path` across sources, Override first and BuiltIn last.
    pub fn find_asset(&mut self, path: &str) -> AssetRef {
        for source in AssetSource::PRECEDENCE {
            let id = self.source(source).file_entry(path);
            if id.is_valid() {
                return self.create_asset_for_entry(source, id);
            }
        }
        AssetRef::NULL_ASSET
    }

    /// Resolve a persistent identity across sources with the same precedence
    /// as [`find_asset`](Self::find_asset).
    pub fn find_asset_by_uuid(&mut self, uuid: Uuid8) -> AssetRef {
        if uuid.is_empty() {
            return AssetRef::NULL_ASSET;
        }
        for source in AssetSource::PRECEDENCE {
            let id = self.source(source).entry_by_uuid(uuid);
            if id.is_valid() {
                return self.create_asset_for_entry(source, id);
            }
        }
        AssetRef::NULL_ASSET
    }

    /// Live asset behind `asset_ref`; stale or malformed refs yield `None`.
    pub fn get_asset_by_uuid(&self, asset_ref: AssetRef) -> Option<&Asset> {
        let source = asset_ref.asset_source()?;
        if asset_ref.index() == AssetRef::INDEX_MASK {
            return None;
        }
        self.source(source).assets.get(asset_ref.key())
    }

    /// Drop a live asset. Its ref becomes stale.
    pub fn release_asset(&mut self, asset_ref: AssetRef) -> bool {
        let Some(source) = asset_ref.asset_source() else {
            return false;
        };
        let s = self.source_mut(source);
        match s.assets.deallocate(asset_ref.key()) {
            Some(asset) => {
                s.live.remove(&asset.entry);
                true
            }
            None => false,
        }
    }

    /// Bytes of a live asset, from disk or from its package.
    pub fn read_asset(&mut self, asset_ref: AssetRef) -> Result<Vec<u8>> {
        let entry = self
            .get_asset_by_uuid(asset_ref)
            .map(|a| a.entry)
            .ok_or_else(|| AssetDbError::InvalidAsset(format!("{asset_ref:?}")))?;
        let source = asset_ref
            .asset_source()
            .ok_or_else(|| AssetDbError::InvalidAsset(format!("{asset_ref:?}")))?;
        Ok(self.source_mut(source).vfs.read_entry(entry)?)
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Write the source's `.resdb` cache. Returns the record count.
    pub fn save_to_asset_db(&self, source: AssetSource) -> Result<u32> {
        let s = self.source(source);
        let records = s.records();
        let count = save_cache(&s.cache_path, &records)?;
        log_assetdb_debug!("Asset db saved", source = source.name(), count = count);
        Ok(count)
    }

    /// Merge the source's `.resdb` cache into its tree. Returns the number
    /// of entries restored.
    pub fn load_from_asset_db(&mut self, source: AssetSource) -> Result<usize> {
        let s = self.source_mut(source);
        let file = File::open(&s.cache_path)?;
        let records: Vec<CacheRecord<AssetMetaData>> = read_cache(BufReader::new(file))?;
        Ok(s.restore(records))
    }

    /// Package the selected sources into `destination` as
    /// `<source>.jpak` + `<source>.resdb` pairs. Returns the number of files
    /// packed, or `u32::MAX` on failure.
    pub fn pack_assets(&mut self, mask: SourceMask, destination: &Path) -> u32 {
        if !self.editor {
            log_assetdb_error!("Packaging requires editor mode");
            return u32::MAX;
        }
        let destination = match ensure_writable_dir(destination) {
            Ok(d) => d,
            Err(e) => {
                log_assetdb_error!("Invalid package destination", error = e.to_string().as_str());
                return u32::MAX;
            }
        };

        let mut total: u32 = 0;
        for source in mask.iter() {
            match self.pack_source(source, &destination) {
                Ok(n) => total = total.saturating_add(n),
                Err(e) => {
                    log_assetdb_error!(
                        "Packaging failed",
                        source = source.name(),
                        error = e.to_string().as_str()
                    );
                    return u32::MAX;
                }
            }
        }
        log_assetdb_info!("Assets packed", files = total);
        total
    }

    fn pack_source(&mut self, source: AssetSource, destination: &Path) -> Result<u32> {
        let stem = source.file_stem();
        let s = self.source_mut(source);
        let mut writer = PackWriter::new(destination.join(format!("{stem}.jpak")));
        let mut records = Vec::new();
        let mut packed = 0u32;

        for id in s.vfs.walk() {
            if id == s.vfs.root() {
                continue;
            }
            let (Some(info), Some(rel)) = (
                s.vfs.get_entry(id).map(FileEntry::data_info),
                s.vfs.relative_path(id),
            ) else {
                continue;
            };
            let meta = s.metas.get(&id).cloned();
            let record = if info.is_folder() {
                CacheRecord::new(rel, EntryType::Folder)
            } else if info.is_runtime() {
                CacheRecord::new(rel, EntryType::Runtime).with_meta(meta)
            } else {
                let bytes = s.vfs.read_entry(id)?;
                let position = writer.add(&rel, &bytes)?;
                packed += 1;
                CacheRecord::new(rel, EntryType::Packed)
                    .with_pak(0, position)
                    .with_meta(meta)
            };
            records.push(record);
        }

        writer.finish()?;
        save_cache(&destination.join(format!("{stem}.resdb")), &records)?;
        info!(source = %source, files = packed, "Source packed");
        Ok(packed)
    }
}
