//! On-disk codecs for tables, version records and changes files.

pub mod changes;
pub mod encoding;
pub mod table;
pub mod version;

use bincode::config::{self, Config};

/// Digest used for table headers and entries: the first eight bytes of BLAKE3.
pub(crate) fn digest8(parts: &[&[u8]]) -> u64 {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(part);
    }
    let hash = hasher.finalize();
    let mut first = [0u8; 8];
    first.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(first)
}

fn record_config() -> impl Config {
    config::standard()
        .with_fixed_int_encoding()
        .with_little_endian()
}
