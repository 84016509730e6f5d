//! One asset source's namespace: the entry tree, its path index and its
//! backing streams.
//!
//! The tree and the index are private and every mutation goes through a
//! method below that updates both, so a path resolves through the index
//! iff its entry is reachable from the root.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use jasset_config::path::{ensure_within, from_vfs_relative, to_vfs_relative};
use jasset_config::{log_vfs_debug, log_vfs_error, log_vfs_info, log_vfs_warn};
use jasset_hash::{BuildUuid8Hasher, Uuid8};
use jasset_pool::PoolAllocator;

use crate::entry::{EntryInfo, FileEntry, FileId, NULL_SOURCE};
use crate::ignore::IgnoreMatcher;
use crate::monitor::MonitorEvent;
use crate::path::{has_parent_segment, normalize_path, segments, segments_equal};
use crate::source::{SourceAction, SourceStream};
use crate::{Result, VfsError};

/// Default maximum scan depth below the root
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Outcome of a directory scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    /// Entries created by this scan
    pub added: usize,
    /// Entries that already existed
    pub existing: usize,
    /// Directory entries that could not be read or added
    pub skipped: usize,
}

/// Root entry name for `name`: one non-empty segment.
fn root_segment(name: &str) -> String {
    let normalized = normalize_path(name);
    let segment = if normalized.is_empty() {
        "root".to_string()
    } else {
        normalized.replace('/', "_")
    };
    if segment != name {
        log_vfs_warn!("VFS name adjusted", name = name, root = segment.as_str());
    }
    segment
}

/// Hierarchical namespace for one asset source
pub struct Vfs {
    name: String,
    root_path: PathBuf,
    root: FileId,
    entries: PoolAllocator<FileEntry>,
    index: HashMap<Uuid8, Vec<FileId>, BuildUuid8Hasher>,
    sources: PoolAllocator<SourceStream>,
    ignore: IgnoreMatcher,
    max_depth: usize,
    writable: bool,
}

impl Vfs {
    /// Create a VFS whose root entry is called `name` and mirrors `root_path`.
    ///
    /// Full VFS paths start with the root name: a VFS named `a` holds
    /// `a/b/c.txt`. The name is a single segment: separators become `_`
    /// and an empty name becomes `root`.
    pub fn new(name: &str, root_path: impl Into<PathBuf>) -> Self {
        let mut vfs = Self {
            name: root_segment(name),
            root_path: root_path.into(),
            root: FileId::NULL_ID,
            entries: PoolAllocator::new(),
            index: HashMap::default(),
            sources: PoolAllocator::new(),
            ignore: IgnoreMatcher::default(),
            max_depth: DEFAULT_MAX_DEPTH,
            writable: false,
        };
        vfs.init_root();
        vfs
    }

    pub fn with_ignore(mut self, ignore: IgnoreMatcher) -> Self {
        self.ignore = ignore;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    pub fn writable(mut self, writable: bool) -> Self {
        self.writable = writable;
        self
    }

    fn init_root(&mut self) {
        let name = self.name.clone();
        self.root = self
            .alloc_entry(FileId::NULL_ID, &name, NULL_SOURCE, EntryInfo::folder())
            .unwrap_or(FileId::NULL_ID);
        self.index_insert(self.root, &name);
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn root(&self) -> FileId {
        self.root
    }

    #[inline]
    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    #[inline]
    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// Number of live entries, root included
    #[inline]
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Resolve a handle. Stale or null handles yield `None`.
    pub fn get_entry(&self, id: FileId) -> Option<&FileEntry> {
        if !id.is_valid() {
            return None;
        }
        self.entries.get(id.key()).filter(|e| e.id() == id)
    }

    fn get_entry_mut(&mut self, id: FileId) -> Option<&mut FileEntry> {
        if !id.is_valid() {
            return None;
        }
        self.entries.get_mut(id.key()).filter(|e| e.id() == id)
    }

    /// Children of `id` in insertion order (empty for unknown ids)
    pub fn children(&self, id: FileId) -> &[FileId] {
        self.get_entry(id).map(FileEntry::children).unwrap_or(&[])
    }

    /// Full path of `id`, starting with the root name
    pub fn path_of(&self, id: FileId) -> Option<String> {
        self.get_entry(id).map(|e| e.build_path(self))
    }

    /// Path of `id` below the root (the root itself maps to "")
    pub fn relative_path(&self, id: FileId) -> Option<String> {
        let full = self.path_of(id)?;
        Some(
            full.get(self.name.len() + 1..)
                .map(str::to_string)
                .unwrap_or_default(),
        )
    }

    /// Prefix a root-relative path with the root name.
    pub fn full_path(&self, relative: &str) -> String {
        let relative = normalize_path(relative);
        if relative.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", self.name, relative)
        }
    }

    /// Host filesystem location of `id` below the root path
    pub fn host_path(&self, id: FileId) -> Option<PathBuf> {
        let relative = self.relative_path(id)?;
        Some(from_vfs_relative(&self.root_path, &relative))
    }

    fn alloc_entry(
        &mut self,
        parent: FileId,
        name: &str,
        source: u32,
        info: EntryInfo,
    ) -> Option<FileId> {
        let key = self.entries.allocate()?;
        let id = FileId::new(key, info.is_folder());
        if let Some(entry) = self.entries.get_mut(key) {
            entry.setup(id, parent, name, source, info);
        }
        Some(id)
    }

    fn index_insert(&mut self, id: FileId, normalized: &str) {
        if id.is_valid() {
            self.index
                .entry(Uuid8::from_path(normalized))
                .or_default()
                .push(id);
        }
    }

    fn index_remove(&mut self, id: FileId, hash: Uuid8) {
        if let Some(chain) = self.index.get_mut(&hash) {
            chain.retain(|c| *c != id);
            if chain.is_empty() {
                self.index.remove(&hash);
            }
        }
    }

    /// Add `path` (root name first), creating missing ancestor folders.
    ///
    /// Returns the leaf handle and whether it was newly created. An existing
    /// leaf keeps its handle and takes the new `source`/`info`. Adding a file
    /// below a file, or changing an entry between file and folder, is refused
    /// with `FileId::NULL_ID` and leaves the tree untouched.
    pub fn add_entry(&mut self, source: u32, path: &str, info: EntryInfo) -> (FileId, bool) {
        let normalized = normalize_path(path);
        if has_parent_segment(&normalized) {
            log_vfs_warn!("Parent segment in path", path = normalized.as_str());
            return (FileId::NULL_ID, false);
        }
        let mut segs = segments(&normalized);
        match segs.next() {
            Some(first) if segments_equal(first, &self.name) => {}
            _ => {
                log_vfs_warn!("Path outside VFS root", path = normalized.as_str(), root = self.name.as_str());
                return (FileId::NULL_ID, false);
            }
        }
        let rest: Vec<&str> = segs.collect();
        if rest.is_empty() {
            return (self.root, false);
        }

        // Walk the existing prefix without mutating anything
        let mut cur = self.root;
        let mut depth = 0;
        while depth < rest.len() {
            let Some(entry) = self.get_entry(cur) else { break };
            let child = entry.find_in_child(self, rest[depth]);
            if !child.is_valid() {
                break;
            }
            cur = child;
            depth += 1;
        }

        if depth == rest.len() {
            let leaf_is_folder = cur.is_folder();
            if leaf_is_folder != info.is_folder() {
                log_vfs_warn!("Entry kind mismatch", path = normalized.as_str());
                return (FileId::NULL_ID, false);
            }
            if !leaf_is_folder {
                if let Some(entry) = self.get_entry_mut(cur) {
                    entry.set_data(source, info);
                }
            }
            return (cur, false);
        }

        if !cur.is_folder() {
            log_vfs_warn!("Parent is not a folder", path = normalized.as_str());
            return (FileId::NULL_ID, false);
        }

        let mut prefix = self.name.clone();
        for seg in &rest[..depth] {
            prefix.push('/');
            prefix.push_str(seg);
        }

        let mut first_created = FileId::NULL_ID;
        for (i, seg) in rest.iter().enumerate().skip(depth) {
            let is_leaf = i + 1 == rest.len();
            let (src, inf) = if is_leaf {
                (source, info)
            } else {
                (NULL_SOURCE, EntryInfo::folder())
            };

            let Some(id) = self.alloc_entry(cur, seg, src, inf) else {
                log_vfs_error!("Entry pool exhausted", path = normalized.as_str());
                if first_created.is_valid() {
                    self.remove_entry_by_id(first_created, SourceAction::None);
                }
                return (FileId::NULL_ID, false);
            };
            if let Some(parent) = self.get_entry_mut(cur) {
                parent.push_child(id);
            }
            prefix.push('/');
            prefix.push_str(seg);
            self.index_insert(id, &prefix);

            if !first_created.is_valid() {
                first_created = id;
            }
            cur = id;
        }

        log_vfs_debug!("Entry added", path = normalized.as_str());
        (cur, true)
    }

    /// Resolve a full path through the index.
    pub fn index_of_file_entry(&self, path: &str) -> FileId {
        let normalized = normalize_path(path);
        if normalized.is_empty() {
            return FileId::NULL_ID;
        }
        self.index
            .get(&Uuid8::from_path(&normalized))
            .and_then(|chain| {
                chain.iter().copied().find(|id| {
                    self.get_entry(*id)
                        .is_some_and(|e| e.matches_path(self, &normalized))
                })
            })
            .unwrap_or(FileId::NULL_ID)
    }

    /// Resolve a full path to its entry
    pub fn find_entry(&self, path: &str) -> Option<&FileEntry> {
        self.get_entry(self.index_of_file_entry(path))
    }

    /// Remove `path` and its subtree. Returns the number of entries removed.
    pub fn remove_entry(&mut self, path: &str, action: SourceAction) -> usize {
        let id = self.index_of_file_entry(path);
        self.remove_entry_by_id(id, action)
    }

    /// Remove `id` and its subtree from tree and index.
    ///
    /// Removing the root clears its children but keeps the root itself.
    pub fn remove_entry_by_id(&mut self, id: FileId, action: SourceAction) -> usize {
        let Some(entry) = self.get_entry(id) else {
            return 0;
        };

        if id == self.root {
            let children = entry.children().to_vec();
            return children
                .into_iter()
                .map(|child| self.remove_entry_by_id(child, action))
                .sum();
        }

        let parent = entry.parent();
        let mut doomed: Vec<(FileId, Uuid8)> = Vec::new();
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            if let Some(e) = self.get_entry(cur) {
                doomed.push((cur, Uuid8::from_path(&e.build_path(self))));
                stack.extend(e.children().iter().copied());
            }
        }

        if let Some(parent) = self.get_entry_mut(parent) {
            parent.detach_child(id);
        }

        let mut touched_sources: Vec<u32> = Vec::new();
        for (cur, hash) in &doomed {
            self.index_remove(*cur, *hash);
            if let Some(entry) = self.entries.deallocate(cur.key()) {
                if entry.source() != NULL_SOURCE && !touched_sources.contains(&entry.source()) {
                    touched_sources.push(entry.source());
                }
            }
        }

        for source in touched_sources {
            match action {
                SourceAction::None => {}
                SourceAction::Close => {
                    self.close_source_file(source);
                }
                SourceAction::Remove => {
                    self.remove_source_file(source);
                }
            }
        }

        debug!(removed = doomed.len(), "subtree removed");
        doomed.len()
    }

    /// Remove everything below the root.
    pub fn clear(&mut self) -> usize {
        self.remove_entry_by_id(self.root, SourceAction::Remove)
    }

    /// Release entry pool chunks emptied by removals.
    pub fn trim(&mut self) -> usize {
        self.entries.trim() + self.sources.trim()
    }

    /// All entries reachable from `id` (itself included), parents before
    /// children, siblings in insertion order.
    pub fn descendants(&self, id: FileId) -> Vec<FileId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            if let Some(entry) = self.get_entry(cur) {
                out.push(cur);
                stack.extend(entry.children().iter().rev().copied());
            }
        }
        out
    }

    /// Every entry, root first
    pub fn walk(&self) -> Vec<FileId> {
        self.descendants(self.root)
    }

    /// Every entry with its full path, root first
    pub fn iter_paths(&self) -> impl Iterator<Item = (FileId, String)> + '_ {
        self.walk()
            .into_iter()
            .filter_map(|id| self.path_of(id).map(|path| (id, path)))
    }

    // ========================================================================
    // Disk reconciliation
    // ========================================================================

    /// Scan `root_path` and add every file and folder found.
    ///
    /// A missing root is logged and leaves the tree untouched.
    pub fn build_from_root(&mut self) -> BuildStats {
        if !self.root_path.is_dir() {
            warn!(root = %self.root_path.display(), vfs = %self.name, "Source root missing, scan skipped");
            return BuildStats::default();
        }
        let root_path = self.root_path.clone();
        let stats = self.scan_dir(&root_path);
        log_vfs_info!(
            "Scan complete",
            vfs = self.name.as_str(),
            added = stats.added,
            existing = stats.existing,
            skipped = stats.skipped
        );
        stats
    }

    fn scan_dir(&mut self, dir: &Path) -> BuildStats {
        let mut stats = BuildStats::default();
        let ignore = self.ignore.clone();
        let base_depth = to_vfs_relative(dir, &self.root_path)
            .map(|rel| segments(&rel).count())
            .unwrap_or(0);
        let max_depth = self.max_depth.saturating_sub(base_depth).max(1);

        let walker = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(max_depth)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !ignore.should_ignore_name(&e.file_name().to_string_lossy()));

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!(error = %e, "Failed to read directory entry");
                    stats.skipped += 1;
                    continue;
                }
            };

            let Some(relative) = to_vfs_relative(entry.path(), &self.root_path) else {
                stats.skipped += 1;
                continue;
            };
            if relative.is_empty() {
                continue;
            }

            let info = if entry.file_type().is_dir() {
                EntryInfo::folder()
            } else {
                EntryInfo::file()
            };
            let full = self.full_path(&relative);
            let (id, added) = self.add_entry(NULL_SOURCE, &full, info);
            if !id.is_valid() {
                stats.skipped += 1;
            } else if added {
                stats.added += 1;
            } else {
                stats.existing += 1;
            }
        }
        stats
    }

    /// Remove entries whose standalone file or folder no longer exists.
    ///
    /// Packed and runtime-only entries are kept, and so is any folder still
    /// holding such entries.
    pub fn remove_missing(&mut self) -> usize {
        let order = self.walk();
        let mut removed = 0;
        // Reverse pre-order visits children before their parent
        for id in order.into_iter().rev() {
            if id == self.root {
                continue;
            }
            let Some(entry) = self.get_entry(id) else { continue };
            let info = entry.data_info();
            let candidate = info.is_file() || (info.is_folder() && entry.children().is_empty());
            if !candidate {
                continue;
            }
            let exists = self
                .host_path(id)
                .is_some_and(|p| fs::symlink_metadata(p).is_ok());
            if !exists {
                removed += self.remove_entry_by_id(id, SourceAction::None);
            }
        }
        if removed > 0 {
            info!(vfs = %self.name, removed, "Removed stale entries");
        }
        removed
    }

    /// Apply queued directory monitor events. Returns the number of
    /// entries added or removed.
    pub fn apply_changes(&mut self, events: &[MonitorEvent]) -> usize {
        let mut changed = 0;
        for event in events {
            let path = event.path();
            let Some(relative) = to_vfs_relative(path, &self.root_path) else {
                continue;
            };
            if relative.is_empty() || self.ignore.should_ignore(Path::new(&relative)) {
                continue;
            }
            let full = self.full_path(&relative);

            match event {
                MonitorEvent::FileChanged { .. } | MonitorEvent::DirCreated { .. } => {
                    let is_dir = matches!(event, MonitorEvent::DirCreated { .. });
                    let info = if is_dir {
                        EntryInfo::folder()
                    } else {
                        EntryInfo::file()
                    };
                    let existing = self.index_of_file_entry(&full);
                    if existing.is_valid() && existing.is_folder() != is_dir {
                        changed += self.remove_entry_by_id(existing, SourceAction::None);
                    }
                    let before = self.entries.len();
                    let (id, _) = self.add_entry(NULL_SOURCE, &full, info);
                    // Missing ancestors count too
                    changed += self.entries.len().saturating_sub(before);
                    if is_dir && id.is_valid() {
                        changed += self.scan_dir(path).added;
                    }
                }
                MonitorEvent::Removed { .. } => {
                    changed += self.remove_entry(&full, SourceAction::None);
                }
            }
        }
        changed
    }

    // ========================================================================
    // Source streams
    // ========================================================================

    /// Register a packed container. Registering the same path twice returns
    /// the existing source index. Returns `NULL_SOURCE` if the pool is full.
    pub fn add_source_file(&mut self, path: impl Into<PathBuf>) -> u32 {
        let path = path.into();
        if let Some((key, _)) = self.sources.iter().find(|(_, s)| s.path() == path) {
            return key.index();
        }
        match self.sources.allocate_with(SourceStream::new(path, false)) {
            Some(key) => key.index(),
            None => {
                log_vfs_error!("Source stream pool exhausted", vfs = self.name.as_str());
                NULL_SOURCE
            }
        }
    }

    pub fn source_file(&self, source: u32) -> Option<&SourceStream> {
        let key = self.sources.key_at(source)?;
        self.sources.get(key)
    }

    fn source_file_mut(&mut self, source: u32) -> Option<&mut SourceStream> {
        let key = self.sources.key_at(source)?;
        self.sources.get_mut(key)
    }

    pub fn open_source_file(&mut self, source: u32) -> bool {
        match self.source_file_mut(source) {
            Some(stream) => match stream.open() {
                Ok(()) => true,
                Err(e) => {
                    warn!(path = %stream.path().display(), error = %e, "Failed to open source stream");
                    false
                }
            },
            None => false,
        }
    }

    pub fn close_source_file(&mut self, source: u32) -> bool {
        match self.source_file_mut(source) {
            Some(stream) => {
                stream.close();
                true
            }
            None => false,
        }
    }

    /// Unregister a source stream. Refused while any entry still reads
    /// from it.
    pub fn remove_source_file(&mut self, source: u32) -> bool {
        if self.entries.iter().any(|(_, e)| e.source() == source) {
            log_vfs_debug!("Source stream still referenced", vfs = self.name.as_str(), source = source);
            return false;
        }
        match self.sources.key_at(source) {
            Some(key) => self.sources.deallocate(key).is_some(),
            None => false,
        }
    }

    /// Number of registered source streams
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    // ========================================================================
    // Data access
    // ========================================================================

    /// Read an entry's bytes from disk or from its packed stream.
    pub fn read_entry(&mut self, id: FileId) -> Result<Vec<u8>> {
        let entry = self
            .get_entry(id)
            .ok_or_else(|| VfsError::NotFound(format!("{id:?}")))?;
        let info = entry.data_info();
        let source = entry.source();

        if info.is_file() {
            let host = self
                .host_path(id)
                .ok_or_else(|| VfsError::NotFound(format!("{id:?}")))?;
            return Ok(fs::read(host)?);
        }
        if info.is_packed() {
            let stream = self
                .source_file_mut(source)
                .ok_or(VfsError::InvalidSource(source))?;
            return Ok(stream.read_at(info.position, info.size)?);
        }
        Err(VfsError::NoData(self.path_of(id).unwrap_or_default()))
    }

    /// Delete the entry's file or folder on disk, then remove the subtree.
    pub fn delete_io(&mut self, id: FileId) -> Result<usize> {
        if !self.writable {
            return Err(VfsError::ReadOnly(self.name.clone()));
        }
        if id == self.root {
            return Err(VfsError::ReadOnly(format!("{} (root)", self.name)));
        }
        let entry = self
            .get_entry(id)
            .ok_or_else(|| VfsError::NotFound(format!("{id:?}")))?;
        let info = entry.data_info();

        if info.is_file() || info.is_folder() {
            let host = self
                .host_path(id)
                .ok_or_else(|| VfsError::NotFound(format!("{id:?}")))?;
            if fs::symlink_metadata(&host).is_ok() {
                let checked = ensure_within(&host, &self.root_path)
                    .map_err(|e| VfsError::Outside(e.to_string()))?;
                if info.is_folder() {
                    fs::remove_dir_all(&checked)?;
                } else {
                    fs::remove_file(&checked)?;
                }
                debug!(path = %checked.display(), "deleted from disk");
            }
        }
        Ok(self.remove_entry_by_id(id, SourceAction::None))
    }

    /// Check that the index is exactly the inverse of the tree.
    pub fn verify_index(&self) -> std::result::Result<(), String> {
        let reachable = self.walk();
        for id in &reachable {
            let Some(entry) = self.get_entry(*id) else {
                return Err(format!("{id:?} unreachable"));
            };
            let path = entry.build_path(self);
            let found = self.index_of_file_entry(&path);
            if found != *id {
                return Err(format!("{path} resolves to {found:?}, expected {id:?}"));
            }
            for child in entry.children() {
                match self.get_entry(*child) {
                    Some(c) if c.parent() == *id => {}
                    _ => return Err(format!("{path}: bad child {child:?}")),
                }
            }
            if entry.is_folder() != id.is_folder() {
                return Err(format!("{path}: folder flag mismatch"));
            }
        }
        let indexed: usize = self.index.values().map(Vec::len).sum();
        if reachable.len() != self.entries.len() || indexed != self.entries.len() {
            return Err(format!(
                "reachable {} / indexed {} / pooled {}",
                reachable.len(),
                indexed,
                self.entries.len()
            ));
        }
        Ok(())
    }
}
