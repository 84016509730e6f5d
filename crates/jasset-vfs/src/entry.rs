//! File entries, their handles and their data placement.

use std::fmt;

use jasset_pool::PoolKey;

use crate::path::segments_equal;
use crate::Vfs;

/// Entry has no backing source stream
pub const NULL_SOURCE: u32 = u32::MAX;

/// Where an entry's bytes live.
///
/// ```text
/// position  size   meaning
/// NPOS      NPOS   folder
/// valid     NPOS   standalone file on disk
/// valid     valid  packed: `size` bytes at `position` in a source stream
/// NPOS      valid  runtime-only, no backing bytes
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryInfo {
    pub position: u64,
    pub size: u64,
}

impl EntryInfo {
    pub const NPOS: u64 = u64::MAX;

    pub const fn folder() -> Self {
        Self {
            position: Self::NPOS,
            size: Self::NPOS,
        }
    }

    pub const fn file() -> Self {
        Self {
            position: 0,
            size: Self::NPOS,
        }
    }

    pub const fn packed(position: u64, size: u64) -> Self {
        Self { position, size }
    }

    pub const fn runtime(size: u64) -> Self {
        Self {
            position: Self::NPOS,
            size,
        }
    }

    #[inline]
    pub const fn is_folder(&self) -> bool {
        (self.position & self.size) == Self::NPOS
    }

    #[inline]
    pub const fn is_file(&self) -> bool {
        self.position != Self::NPOS && self.size == Self::NPOS
    }

    #[inline]
    pub const fn is_packed(&self) -> bool {
        self.position != Self::NPOS && self.size != Self::NPOS
    }

    #[inline]
    pub const fn is_runtime(&self) -> bool {
        self.position == Self::NPOS && self.size != Self::NPOS
    }
}

impl Default for EntryInfo {
    fn default() -> Self {
        Self::file()
    }
}

/// Handle to a pooled [`FileEntry`].
///
/// The packed 32-bit form carries a folder flag in the top bit and the pool
/// index in the low 31 bits. The slot generation travels alongside so a
/// handle to a removed entry never resolves to whatever reused its slot.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId {
    raw: u32,
    generation: u32,
}

impl FileId {
    pub const FOLDER_FLAG: u32 = 0x8000_0000;
    pub const INDEX_MASK: u32 = 0x7FFF_FFFF;

    pub const NULL_ID: FileId = FileId {
        raw: Self::INDEX_MASK,
        generation: 0,
    };

    pub(crate) fn new(key: PoolKey, is_folder: bool) -> Self {
        let flag = if is_folder { Self::FOLDER_FLAG } else { 0 };
        Self {
            raw: (key.index() & Self::INDEX_MASK) | flag,
            generation: key.generation(),
        }
    }

    pub(crate) fn key(&self) -> PoolKey {
        PoolKey::from_parts(self.index(), self.generation)
    }

    /// Packed 32-bit form
    #[inline]
    pub const fn raw(&self) -> u32 {
        self.raw
    }

    #[inline]
    pub const fn generation(&self) -> u32 {
        self.generation
    }

    #[inline]
    pub const fn index(&self) -> u32 {
        self.raw & Self::INDEX_MASK
    }

    #[inline]
    pub const fn is_folder(&self) -> bool {
        self.raw & Self::FOLDER_FLAG != 0
    }

    /// Whether this is anything but the null pattern. Does not prove the
    /// entry still exists; resolve through [`Vfs::get_entry`] for that.
    #[inline]
    pub const fn is_valid(&self) -> bool {
        self.index() != Self::INDEX_MASK
    }
}

impl Default for FileId {
    fn default() -> Self {
        Self::NULL_ID
    }
}

impl fmt::Debug for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_valid() {
            return write!(f, "FileId(NULL)");
        }
        write!(
            f,
            "FileId({}{}@{})",
            if self.is_folder() { "d" } else { "f" },
            self.index(),
            self.generation
        )
    }
}

/// One node of the directory tree
#[derive(Debug, Clone)]
pub struct FileEntry {
    parent: FileId,
    id: FileId,
    source: u32,
    data_info: EntryInfo,
    name: String,
    children: Vec<FileId>,
}

impl Default for FileEntry {
    fn default() -> Self {
        Self {
            parent: FileId::NULL_ID,
            id: FileId::NULL_ID,
            source: NULL_SOURCE,
            data_info: EntryInfo::folder(),
            name: String::new(),
            children: Vec::new(),
        }
    }
}

impl FileEntry {
    /// (Re)initialize a pooled slot. Any stale children list is dropped.
    pub fn setup(&mut self, id: FileId, parent: FileId, name: &str, source: u32, info: EntryInfo) {
        self.id = id;
        self.parent = parent;
        self.source = source;
        self.data_info = info;
        self.name.clear();
        self.name.push_str(name);
        self.children.clear();
    }

    #[inline]
    pub fn id(&self) -> FileId {
        self.id
    }

    #[inline]
    pub fn parent(&self) -> FileId {
        self.parent
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn source(&self) -> u32 {
        self.source
    }

    #[inline]
    pub fn data_info(&self) -> EntryInfo {
        self.data_info
    }

    /// Children in insertion order
    #[inline]
    pub fn children(&self) -> &[FileId] {
        &self.children
    }

    #[inline]
    pub fn is_folder(&self) -> bool {
        self.data_info.is_folder()
    }

    pub(crate) fn set_data(&mut self, source: u32, info: EntryInfo) {
        self.source = source;
        self.data_info = info;
    }

    pub(crate) fn push_child(&mut self, child: FileId) {
        self.children.push(child);
    }

    pub(crate) fn detach_child(&mut self, child: FileId) -> bool {
        match self.children.iter().position(|c| *c == child) {
            Some(pos) => {
                self.children.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Linear scan of the direct children for `name` (case-insensitive).
    pub fn find_in_child(&self, vfs: &Vfs, name: &str) -> FileId {
        self.children
            .iter()
            .copied()
            .find(|child| {
                vfs.get_entry(*child)
                    .is_some_and(|e| segments_equal(&e.name, name))
            })
            .unwrap_or(FileId::NULL_ID)
    }

    /// Number of ancestors above this entry (the root has depth 0).
    pub fn depth(&self, vfs: &Vfs) -> usize {
        let mut depth = 0;
        let mut cur = self.parent;
        while let Some(entry) = vfs.get_entry(cur) {
            depth += 1;
            cur = entry.parent;
        }
        depth
    }

    /// Byte length of the full path, including the root name.
    pub fn path_len(&self, vfs: &Vfs) -> usize {
        let mut len = self.name.len();
        let mut cur = self.parent;
        while let Some(entry) = vfs.get_entry(cur) {
            len += entry.name.len() + 1;
            cur = entry.parent;
        }
        len
    }

    /// Full path from the root, rebuilt by walking the parent chain.
    pub fn build_path(&self, vfs: &Vfs) -> String {
        let mut out = String::new();
        self.write_path(vfs, &mut out);
        out
    }

    /// Append the full path to `out`.
    ///
    /// The exact length is measured first and the names are written back to
    /// front, so the only allocation is growing `out` once.
    pub fn write_path(&self, vfs: &Vfs, out: &mut String) {
        let len = self.path_len(vfs);
        let mut bytes = std::mem::take(out).into_bytes();
        let start = bytes.len();
        bytes.resize(start + len, 0);

        let mut end = start + len;
        let mut entry = self;
        loop {
            let name = entry.name.as_bytes();
            bytes[end - name.len()..end].copy_from_slice(name);
            end -= name.len();
            match vfs.get_entry(entry.parent) {
                Some(parent) => {
                    end -= 1;
                    bytes[end] = b'/';
                    entry = parent;
                }
                None => break,
            }
        }
        debug_assert_eq!(end, start);

        *out = String::from_utf8(bytes)
            .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned());
    }

    /// Whether this entry's full path equals `normalized` (segment-wise,
    /// case-insensitive), checked leaf-first without building a string.
    pub(crate) fn matches_path(&self, vfs: &Vfs, normalized: &str) -> bool {
        let mut segs = crate::path::segments(normalized).rev();
        let mut entry = Some(self);
        while let Some(e) = entry {
            match segs.next() {
                Some(seg) if segments_equal(seg, &e.name) => {}
                _ => return false,
            }
            entry = vfs.get_entry(e.parent);
        }
        segs.next().is_none()
    }
}
