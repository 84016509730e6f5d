//! Packed 32-bit references to live assets.

use std::fmt;

use jasset_pool::PoolKey;

use crate::source::{AssetSource, SRC_COUNT};

/// `{source: 3 bits, index: 29 bits}` reference into a source's live-asset
/// table.
///
/// ```text
///  31   29 28                          0
/// +-------+-----------------------------+
/// |source |            index            |
/// +-------+-----------------------------+
/// ```
///
/// The slot generation travels beside the packed word, so a ref to a
/// released asset stops resolving once its slot is reused.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct AssetRef {
    raw: u32,
    generation: u32,
}

impl AssetRef {
    pub const SOURCE_SHIFT: u32 = 29;
    pub const INDEX_MASK: u32 = (1 << Self::SOURCE_SHIFT) - 1;

    /// Invalid reference: index bits all set
    pub const NULL_ASSET: AssetRef = AssetRef {
        raw: Self::INDEX_MASK,
        generation: 0,
    };

    /// Pack `source` (< 8) and `index` (< 2^29) at generation 0.
    /// Out-of-range bits are cut.
    pub const fn new(source: u8, index: u32) -> Self {
        Self::with_generation(source, index, 0)
    }

    pub const fn with_generation(source: u8, index: u32, generation: u32) -> Self {
        Self {
            raw: ((source as u32 & 0x7) << Self::SOURCE_SHIFT) | (index & Self::INDEX_MASK),
            generation,
        }
    }

    /// Ref to the live-asset slot `key` in `source`
    pub fn from_key(source: AssetSource, key: PoolKey) -> Self {
        Self::with_generation(source as u8, key.index(), key.generation())
    }

    pub const fn from_raw(raw: u32, generation: u32) -> Self {
        Self { raw, generation }
    }

    /// Packed 32-bit form
    #[inline]
    pub const fn raw(self) -> u32 {
        self.raw
    }

    #[inline]
    pub const fn generation(self) -> u32 {
        self.generation
    }

    #[inline]
    pub const fn source(self) -> u8 {
        (self.raw >> Self::SOURCE_SHIFT) as u8
    }

    /// Slot in the source's live-asset table
    #[inline]
    pub const fn index(self) -> u32 {
        self.raw & Self::INDEX_MASK
    }

    /// Pool key this ref was issued for
    pub fn key(self) -> PoolKey {
        PoolKey::from_parts(self.index(), self.generation)
    }

    /// Decoded source, `None` for sources past `SRC_COUNT`
    pub fn asset_source(self) -> Option<AssetSource> {
        AssetSource::from_index(self.source() as usize)
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self.index() != Self::INDEX_MASK && (self.source() as usize) < SRC_COUNT
    }
}

impl Default for AssetRef {
    fn default() -> Self {
        Self::NULL_ASSET
    }
}

impl fmt::Debug for AssetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_valid() {
            return write!(f, "AssetRef(NULL)");
        }
        write!(
            f,
            "AssetRef({}:{}@{})",
            self.source(),
            self.index(),
            self.generation
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_roundtrip() {
        for source in 0u8..8 {
            for index in [0u32, 1, 63, 64, 0x0ABC_DEF, (1 << 29) - 2, (1 << 29) - 1] {
                let r = AssetRef::new(source, index);
                assert_eq!(r.source(), source);
                assert_eq!(r.index(), index);
            }
        }
    }

    #[test]
    fn test_null_and_validity() {
        assert!(!AssetRef::NULL_ASSET.is_valid());
        assert_eq!(AssetRef::default(), AssetRef::NULL_ASSET);
        assert!(AssetRef::new(AssetSource::Game as u8, 3).is_valid());
        // Source 5..7 decode but name no source
        let beyond = AssetRef::new(6, 3);
        assert!(!beyond.is_valid());
        assert_eq!(beyond.asset_source(), None);
    }

    #[test]
    fn test_generation_distinguishes_refs() {
        let old = AssetRef::with_generation(2, 5, 0);
        let new = AssetRef::with_generation(2, 5, 1);
        assert_eq!(old.raw(), new.raw());
        assert_ne!(old, new);
        assert_eq!(new.key(), PoolKey::from_parts(5, 1));
        assert_eq!(AssetRef::from_raw(new.raw(), 1), new);
    }

    #[test]
    fn test_out_of_range_bits_are_cut() {
        let r = AssetRef::new(9, u32::MAX);
        assert_eq!(r.source(), 1);
        assert_eq!(r.index(), AssetRef::INDEX_MASK);
    }
}
