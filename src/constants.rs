//! Marker names, file suffixes, format versions and limits shared across the crate.

use crate::types::DocId;

/// Marker file identifying a whole chert database directory.
pub const CHERT_MARKER: &str = "iamchert";
/// Marker file identifying a whole glass database directory.
pub const GLASS_MARKER: &str = "iamglass";
/// Marker file left behind by a flint database.
pub const FLINT_MARKER: &str = "iamflint";
/// Marker file left behind by a brass database.
pub const BRASS_MARKER: &str = "iambrass";
/// Quartz never had an `iam*` marker; its record table is the tell.
pub const QUARTZ_MARKER: &str = "record_DB";

/// Table file suffix used by chert (and, historically, flint and brass).
pub const CHERT_TABLE_SUFFIX: &str = ".DB";
/// Table file suffix used by glass.
pub const GLASS_TABLE_SUFFIX: &str = ".glass";
/// Prefix of per-revision glass changes files (`changes<revision>`).
pub const CHANGES_FILE_PREFIX: &str = "changes";

/// Chert tables in check order. `record` goes first because it is committed
/// last and so carries the most reliable revision; `termlist` must precede
/// `postlist` so the doclen cross-check has data.
pub const CHERT_TABLES: [&str; 6] = [
    "record", "termlist", "postlist", "position", "spelling", "synonym",
];
/// Glass tables in check order (`termlist` before `postlist` for the same reason).
pub const GLASS_TABLES: [&str; 6] = [
    "docdata", "termlist", "postlist", "position", "spelling", "synonym",
];

/// Doclen cross-checking is skipped if the slot array would reach this size.
pub const DOCLEN_MEMORY_LIMIT: usize = 0x4000_0000;

/// Placeholder `last_docid` used when the real bound is unknown. Range checks
/// against it can never fail.
pub const UNKNOWN_LAST_DOCID: DocId = DocId::MAX;

pub const TABLE_MAGIC: [u8; 8] = *b"IXTABLE\0";
pub const TABLE_FORMAT_VERSION: u32 = 2;
pub const TABLE_HEADER_SIZE: usize = 40;
// [key_len: u16][reserved: u16][value_len: u32][digest: 8 bytes]
pub const ENTRY_HEADER_SIZE: usize = 16;
pub const MAX_KEY_LEN: usize = 252;

pub const CHERT_VERSION_MAGIC: [u8; 8] = *b"IXCHERT\0";
pub const CHERT_FORMAT_VERSION: u32 = 200_807;
pub const GLASS_VERSION_MAGIC: [u8; 8] = *b"IXGLASS\0";
pub const GLASS_FORMAT_VERSION: u32 = 201_411;
pub const CHANGES_MAGIC: [u8; 8] = *b"IXCHANGE";
pub const CHANGES_FORMAT_VERSION: u32 = 4;

/// Upper bound on metadata records (version files, changes files) read into memory.
pub const MAX_METADATA_BYTES: u64 = 16 * 1024 * 1024;
