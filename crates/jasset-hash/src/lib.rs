//! # jasset-hash
//!
//! Identifier primitives for the jasset asset database.
//!
//! - [`Crc32c`]: streaming CRC-32C
//! - [`Uuid8`]: 64-bit content/path hash built from two CRC-32C halves
//! - [`Uuid16`]: `Uuid8` plus input length

pub mod crc;
pub mod uuid;

pub use crc::{Crc32c, CRC32C_POLY};
pub use uuid::{BuildUuid8Hasher, ParseUuidError, Uuid16, Uuid8, Uuid8Hasher, DEFAULT_BLOCK_SIZE};
