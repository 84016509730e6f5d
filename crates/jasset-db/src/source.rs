//! Asset sources and source masks.

use std::fmt;
use std::str::FromStr;

use jasset_config::{Config, SourceConfig};

/// Number of asset sources
pub const SRC_COUNT: usize = 5;

/// Logical namespace partition of the asset database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum AssetSource {
    BuiltIn = 0,
    Editor = 1,
    Game = 2,
    Runtime = 3,
    Override = 4,
}

impl AssetSource {
    /// All sources in index order
    pub const ALL: [AssetSource; SRC_COUNT] = [
        AssetSource::BuiltIn,
        AssetSource::Editor,
        AssetSource::Game,
        AssetSource::Runtime,
        AssetSource::Override,
    ];

    /// Lookup order for `find_asset`: later layers shadow earlier ones
    pub const PRECEDENCE: [AssetSource; SRC_COUNT] = [
        AssetSource::Override,
        AssetSource::Runtime,
        AssetSource::Game,
        AssetSource::Editor,
        AssetSource::BuiltIn,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Root entry name of the source's VFS
    pub fn name(self) -> &'static str {
        match self {
            AssetSource::BuiltIn => "BuiltIn",
            AssetSource::Editor => "Editor",
            AssetSource::Game => "Game",
            AssetSource::Runtime => "Runtime",
            AssetSource::Override => "Override",
        }
    }

    /// Stem used for the source's cache and package files
    pub fn file_stem(self) -> &'static str {
        match self {
            AssetSource::BuiltIn => "builtin",
            AssetSource::Editor => "editor",
            AssetSource::Game => "game",
            AssetSource::Runtime => "runtime",
            AssetSource::Override => "override",
        }
    }

    /// This source's section of the `[sources]` config
    pub fn config(self, config: &Config) -> &SourceConfig {
        let sources = &config.sources;
        match self {
            AssetSource::BuiltIn => &sources.built_in,
            AssetSource::Editor => &sources.editor,
            AssetSource::Game => &sources.game,
            AssetSource::Runtime => &sources.runtime,
            AssetSource::Override => &sources.override_,
        }
    }

    #[inline]
    pub fn mask(self) -> SourceMask {
        SourceMask(1 << self as u8)
    }
}

impl fmt::Display for AssetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AssetSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|src| src.name().eq_ignore_ascii_case(s) || src.file_stem() == s.to_ascii_lowercase())
            .ok_or_else(|| format!("unknown asset source: {s}"))
    }
}

/// Bit set of sources, one bit per `AssetSource` index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceMask(pub u8);

impl SourceMask {
    pub const NONE: SourceMask = SourceMask(0);
    pub const ALL: SourceMask = SourceMask((1 << SRC_COUNT) - 1);

    #[inline]
    pub fn contains(self, source: AssetSource) -> bool {
        self.0 & (1 << source as u8) != 0
    }

    /// Sources in this mask, in index order
    pub fn iter(self) -> impl Iterator<Item = AssetSource> {
        AssetSource::ALL
            .into_iter()
            .filter(move |src| self.contains(*src))
    }

    pub fn is_empty(self) -> bool {
        self.0 & Self::ALL.0 == 0
    }
}

impl From<AssetSource> for SourceMask {
    fn from(source: AssetSource) -> Self {
        source.mask()
    }
}

impl std::ops::BitOr for SourceMask {
    type Output = SourceMask;

    fn bitor(self, rhs: Self) -> Self {
        SourceMask(self.0 | rhs.0)
    }
}

impl std::ops::BitOr<AssetSource> for SourceMask {
    type Output = SourceMask;

    fn bitor(self, rhs: AssetSource) -> Self {
        SourceMask(self.0 | rhs.mask().0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_roundtrip() {
        for (i, src) in AssetSource::ALL.into_iter().enumerate() {
            assert_eq!(src.index(), i);
            assert_eq!(AssetSource::from_index(i), Some(src));
        }
        assert_eq!(AssetSource::from_index(SRC_COUNT), None);
    }

    #[test]
    fn test_parse() {
        assert_eq!("game".parse::<AssetSource>().unwrap(), AssetSource::Game);
        assert_eq!("BuiltIn".parse::<AssetSource>().unwrap(), AssetSource::BuiltIn);
        assert!("assets".parse::<AssetSource>().is_err());
    }

    #[test]
    fn test_mask() {
        let mask = AssetSource::Game.mask() | AssetSource::Override;
        assert!(mask.contains(AssetSource::Game));
        assert!(!mask.contains(AssetSource::Editor));
        assert_eq!(
            mask.iter().collect::<Vec<_>>(),
            vec![AssetSource::Game, AssetSource::Override]
        );
        assert_eq!(SourceMask::ALL.iter().count(), SRC_COUNT);
        assert!(SourceMask::NONE.is_empty());
    }

    #[test]
    fn test_precedence_covers_all() {
        let mut sorted = AssetSource::PRECEDENCE;
        sorted.sort();
        assert_eq!(sorted, AssetSource::ALL);
        assert_eq!(AssetSource::PRECEDENCE[0], AssetSource::Override);
    }
}
