//! `Uuid8` / `Uuid16` identifiers.
//!
//! A `Uuid8` is two CRC-32C half-hashes packed into one `u64`. Input is
//! streamed in blocks and block `k` is absorbed by half `k & 1`, so both
//! halves mix distinct regions of a large input in one pass. This is not a
//! cryptographic hash.
//!
//! Canonical text form is `XXXXXXXX-XXXXXXXX` (high half first).

use std::fmt;
use std::hash::{BuildHasherDefault, Hasher};
use std::io::{self, Read};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use tracing::warn;

use crate::crc::Crc32c;

/// Default streaming block size (64 KiB)
pub const DEFAULT_BLOCK_SIZE: usize = 64 * 1024;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseUuidError {
    #[error("invalid uuid length: {0}")]
    Length(usize),

    #[error("missing '-' separator")]
    Separator,

    #[error("invalid hex digits: {0}")]
    Hex(String),
}

/// 64-bit content or path hash.
///
/// The all-zero value is [`Uuid8::EMPTY`] and never names a real asset.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Uuid8(u64);

impl Uuid8 {
    pub const EMPTY: Uuid8 = Uuid8(0);

    #[inline]
    pub const fn from_u64(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn from_halves(hi: u32, lo: u32) -> Self {
        Self(((hi as u64) << 32) | lo as u64)
    }

    #[inline]
    pub const fn hi(&self) -> u32 {
        (self.0 >> 32) as u32
    }

    #[inline]
    pub const fn lo(&self) -> u32 {
        self.0 as u32
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Hash a stream in blocks of at most `block_size` bytes.
    ///
    /// Read errors are logged and yield [`Uuid8::EMPTY`].
    pub fn compute_hash<R: Read>(reader: R, block_size: usize) -> Self {
        match stream_halves(reader, block_size) {
            Ok((hash, _)) => hash,
            Err(e) => {
                warn!(error = %e, "hash input unreadable");
                Self::EMPTY
            }
        }
    }

    /// Hash an in-memory buffer with the same block alternation as
    /// [`Uuid8::compute_hash`].
    pub fn compute_hash_bytes(data: &[u8], block_size: usize) -> Self {
        let mut halves = [Crc32c::new(), Crc32c::new()];
        for (cur, block) in data.chunks(block_size.max(1)).enumerate() {
            halves[cur & 1].update(block);
        }
        combine(&halves)
    }

    /// Hash a path with backslashes folded to `/` and ASCII case folded, so
    /// `Textures\Hero.PNG` and `textures/hero.png` share one identifier.
    pub fn from_path(path: &str) -> Self {
        let mut halves = [Crc32c::new(), Crc32c::new()];
        let mut cur = 0usize;
        let mut in_block = 0usize;
        for b in path.bytes() {
            if in_block == DEFAULT_BLOCK_SIZE {
                cur += 1;
                in_block = 0;
            }
            halves[cur & 1].update_byte(fold_path_byte(b));
            in_block += 1;
        }
        combine(&halves)
    }

    /// Parse the canonical form, falling back to `default` on malformed input.
    pub fn parse_or(s: &str, default: Uuid8) -> Uuid8 {
        s.parse().unwrap_or(default)
    }
}

#[inline]
fn fold_path_byte(b: u8) -> u8 {
    if b == b'\\' {
        b'/'
    } else {
        b.to_ascii_lowercase()
    }
}

fn combine(halves: &[Crc32c; 2]) -> Uuid8 {
    Uuid8::from_halves(halves[1].finalize(), halves[0].finalize())
}

fn stream_halves<R: Read>(mut reader: R, block_size: usize) -> io::Result<(Uuid8, u64)> {
    let mut buf = vec![0u8; block_size.max(1)];
    let mut halves = [Crc32c::new(), Crc32c::new()];
    let mut cur = 0usize;
    let mut total = 0u64;
    loop {
        let n = read_block(&mut reader, &mut buf)?;
        if n == 0 {
            break;
        }
        halves[cur & 1].update(&buf[..n]);
        cur += 1;
        total += n as u64;
    }
    Ok((combine(&halves), total))
}

/// Fill `buf` as far as the reader allows so block boundaries do not depend
/// on how the reader splits its output.
fn read_block<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

impl fmt::Display for Uuid8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08X}-{:08X}", self.hi(), self.lo())
    }
}

impl fmt::Debug for Uuid8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Uuid8({self})")
    }
}

fn parse_hex32(s: &str) -> Result<u32, ParseUuidError> {
    if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ParseUuidError::Hex(s.to_string()));
    }
    u32::from_str_radix(s, 16).map_err(|_| ParseUuidError::Hex(s.to_string()))
}

impl FromStr for Uuid8 {
    type Err = ParseUuidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() != 17 {
            return Err(ParseUuidError::Length(s.len()));
        }
        let (hi, lo) = s.split_once('-').ok_or(ParseUuidError::Separator)?;
        Ok(Uuid8::from_halves(parse_hex32(hi)?, parse_hex32(lo)?))
    }
}

impl Serialize for Uuid8 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Uuid8 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// `Uuid8` plus the byte length of the hashed input.
///
/// Two inputs with colliding hashes but different sizes stay distinct.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Uuid16 {
    pub hash: Uuid8,
    pub length: u64,
}

impl Uuid16 {
    pub const EMPTY: Uuid16 = Uuid16 {
        hash: Uuid8::EMPTY,
        length: 0,
    };

    pub const fn new(hash: Uuid8, length: u64) -> Self {
        Self { hash, length }
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.hash.is_empty()
    }

    pub fn compute_hash<R: Read>(reader: R, block_size: usize) -> Self {
        match stream_halves(reader, block_size) {
            Ok((hash, length)) => Self { hash, length },
            Err(e) => {
                warn!(error = %e, "hash input unreadable");
                Self::EMPTY
            }
        }
    }

    pub fn compute_hash_bytes(data: &[u8], block_size: usize) -> Self {
        Self {
            hash: Uuid8::compute_hash_bytes(data, block_size),
            length: data.len() as u64,
        }
    }

    pub fn parse_or(s: &str, default: Uuid16) -> Uuid16 {
        s.parse().unwrap_or(default)
    }
}

impl fmt::Display for Uuid16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:016X}", self.hash, self.length)
    }
}

impl fmt::Debug for Uuid16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Uuid16({self})")
    }
}

impl FromStr for Uuid16 {
    type Err = ParseUuidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() != 34 {
            return Err(ParseUuidError::Length(s.len()));
        }
        let (hash, length) = s.split_at(17);
        let length = length.strip_prefix('-').ok_or(ParseUuidError::Separator)?;
        if !length.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ParseUuidError::Hex(length.to_string()));
        }
        let length =
            u64::from_str_radix(length, 16).map_err(|_| ParseUuidError::Hex(length.to_string()))?;
        Ok(Self {
            hash: hash.parse()?,
            length,
        })
    }
}

impl Serialize for Uuid16 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Uuid16 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Hasher that passes a `u64` key straight through.
///
/// Identifiers are already well-mixed CRC output, so tables keyed by
/// `Uuid8` use the raw value as the bucket hash.
#[derive(Default, Clone, Copy)]
pub struct Uuid8Hasher(u64);

impl Hasher for Uuid8Hasher {
    #[inline]
    fn finish(&self) -> u64 {
        self.0
    }

    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 = self.0.rotate_left(8) ^ b as u64;
        }
    }

    #[inline]
    fn write_u64(&mut self, n: u64) {
        self.0 = n;
    }
}

/// `BuildHasher` for `HashMap<Uuid8, _, BuildUuid8Hasher>`
pub type BuildUuid8Hasher = BuildHasherDefault<Uuid8Hasher>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Cursor;

    #[test]
    fn test_empty_input_is_empty() {
        assert!(Uuid8::compute_hash_bytes(b"", DEFAULT_BLOCK_SIZE).is_empty());
        assert!(Uuid8::compute_hash(Cursor::new(Vec::new()), DEFAULT_BLOCK_SIZE).is_empty());
    }

    #[test]
    fn test_deterministic() {
        let data = vec![7u8; 300_000];
        let a = Uuid8::compute_hash_bytes(&data, DEFAULT_BLOCK_SIZE);
        let b = Uuid8::compute_hash_bytes(&data, DEFAULT_BLOCK_SIZE);
        assert_eq!(a, b);
        assert!(!a.is_empty());
    }

    #[test]
    fn test_one_byte_difference() {
        let mut data = vec![0u8; 200_000];
        let a = Uuid8::compute_hash_bytes(&data, 4096);
        data[150_000] = 1;
        let b = Uuid8::compute_hash_bytes(&data, 4096);
        assert_ne!(a, b);
    }

    #[test]
    fn test_stream_matches_bytes() {
        let data: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
        let streamed = Uuid8::compute_hash(Cursor::new(&data), 1024);
        assert_eq!(streamed, Uuid8::compute_hash_bytes(&data, 1024));
    }

    #[test]
    fn test_blocks_alternate_halves() {
        // Single block only touches the low half
        let small = Uuid8::compute_hash_bytes(b"abcd", 4);
        assert_eq!(small.hi(), 0);
        assert_eq!(small.lo(), Crc32c::checksum(b"abcd"));

        // Blocks 0 and 2 go low, block 1 goes high
        let big = Uuid8::compute_hash_bytes(b"aaaabbbbcccc", 4);
        assert_eq!(big.hi(), Crc32c::checksum(b"bbbb"));
        assert_eq!(big.lo(), Crc32c::checksum(b"aaaacccc"));
    }

    #[test]
    fn test_path_hash_folds_case_and_slashes() {
        assert_eq!(
            Uuid8::from_path("Textures\\Hero.PNG"),
            Uuid8::from_path("textures/hero.png")
        );
        assert_ne!(
            Uuid8::from_path("textures/hero.png"),
            Uuid8::from_path("textures/hero.jpg")
        );
    }

    #[test]
    fn test_display_parse() {
        let id = Uuid8::from_halves(0xDEADBEEF, 0x0000_00FF);
        assert_eq!(id.to_string(), "DEADBEEF-000000FF");
        assert_eq!("deadbeef-000000ff".parse::<Uuid8>().unwrap(), id);
    }

    #[test]
    fn test_parse_or_keeps_default() {
        let default = Uuid8::from_u64(99);
        assert_eq!(Uuid8::parse_or("not-a-uuid", default), default);
        assert_eq!(Uuid8::parse_or("GGGGGGGG-00000000", default), default);
        assert_eq!(Uuid8::parse_or("0000000100000002", default), default);
        assert_eq!(
            Uuid8::parse_or("00000001-00000002", default),
            Uuid8::from_halves(1, 2)
        );
    }

    #[test]
    fn test_uuid16_length_discriminates() {
        let a = Uuid16::compute_hash_bytes(b"abc", DEFAULT_BLOCK_SIZE);
        let b = Uuid16::new(a.hash, 4);
        assert_ne!(a, b);
        assert_eq!(a.length, 3);

        let streamed = Uuid16::compute_hash(Cursor::new(b"abc"), DEFAULT_BLOCK_SIZE);
        assert_eq!(streamed, a);
        assert_eq!(a.to_string().parse::<Uuid16>().unwrap(), a);
    }

    #[test]
    fn test_serde_as_string() {
        let id = Uuid8::from_halves(1, 2);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"00000001-00000002\"");
        let back: Uuid8 = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_identity_hasher_table() {
        let mut table: HashMap<Uuid8, u32, BuildUuid8Hasher> = HashMap::default();
        table.insert(Uuid8::from_u64(5), 1);
        table.insert(Uuid8::from_u64(6), 2);
        assert_eq!(table.get(&Uuid8::from_u64(6)), Some(&2));
    }
}
