//! Table file codec.
//!
//! A table is a 40-byte header followed by entries in strictly ascending key
//! order:
//!
//! ```text
//! header: [magic: 8][format: u32][backend: u8][reserved: 3][revision: u64][entries: u64][digest: u64]
//! entry:  [key_len: u16][reserved: u16][value_len: u32][digest: u64][key][value]
//! ```
//!
//! Integers are little-endian; digests are the first eight bytes of BLAKE3
//! over the preceding header bytes or over `key ++ value`.

use std::collections::BTreeMap;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use crate::constants::{
    ENTRY_HEADER_SIZE, MAX_KEY_LEN, TABLE_FORMAT_VERSION, TABLE_HEADER_SIZE, TABLE_MAGIC,
};
use crate::error::{CheckError, Result};
use crate::io::digest8;
use crate::types::{Backend, Revision};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableHeader {
    pub format: u32,
    /// Raw backend tag; see [`Backend::from_tag`].
    pub backend_tag: u8,
    pub revision: Revision,
    pub entry_count: u64,
}

impl TableHeader {
    #[must_use]
    pub fn new(backend: Backend, revision: Revision, entry_count: u64) -> Self {
        Self {
            format: TABLE_FORMAT_VERSION,
            backend_tag: backend.tag(),
            revision,
            entry_count,
        }
    }

    #[must_use]
    pub fn backend(&self) -> Option<Backend> {
        Backend::from_tag(self.backend_tag)
    }

    #[must_use]
    pub fn encode(&self) -> [u8; TABLE_HEADER_SIZE] {
        let mut buf = [0u8; TABLE_HEADER_SIZE];
        buf[..8].copy_from_slice(&TABLE_MAGIC);
        buf[8..12].copy_from_slice(&self.format.to_le_bytes());
        buf[12] = self.backend_tag;
        buf[16..24].copy_from_slice(&self.revision.to_le_bytes());
        buf[24..32].copy_from_slice(&self.entry_count.to_le_bytes());
        let digest = digest8(&[&buf[..32]]);
        buf[32..40].copy_from_slice(&digest.to_le_bytes());
        buf
    }

    pub fn decode(buf: &[u8; TABLE_HEADER_SIZE]) -> std::result::Result<Self, &'static str> {
        if buf[..8] != TABLE_MAGIC {
            return Err("bad table magic");
        }
        if digest8(&[&buf[..32]]) != le_u64(&buf[32..40]) {
            return Err("table header digest mismatch");
        }
        Ok(Self {
            format: le_u32(&buf[8..12]),
            backend_tag: buf[12],
            revision: le_u64(&buf[16..24]),
            entry_count: le_u64(&buf[24..32]),
        })
    }
}

/// One entry as read from disk. `digest_ok` is false when the stored digest
/// disagrees with the bytes; the key and value are then untrustworthy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    pub offset: u64,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub digest_ok: bool,
}

/// Streaming reader over a table file.
///
/// Entry lengths are validated against the file size before anything is
/// allocated, so a corrupt length field cannot trigger a huge allocation.
#[derive(Debug)]
pub struct TableReader {
    reader: BufReader<fs_err::File>,
    path: PathBuf,
    header: TableHeader,
    offset: u64,
    len: u64,
}

impl TableReader {
    pub fn open(path: &Path) -> Result<Self> {
        let file = fs_err::File::open(path).map_err(|err| CheckError::opening(path, &err))?;
        let len = file.metadata()?.len();
        if len < TABLE_HEADER_SIZE as u64 {
            return Err(CheckError::corrupt(path, 0, "file shorter than a table header"));
        }
        let mut reader = BufReader::new(file);
        let mut buf = [0u8; TABLE_HEADER_SIZE];
        reader.read_exact(&mut buf)?;
        let header =
            TableHeader::decode(&buf).map_err(|reason| CheckError::corrupt(path, 0, reason))?;
        Ok(Self {
            reader,
            path: path.to_path_buf(),
            header,
            offset: TABLE_HEADER_SIZE as u64,
            len,
        })
    }

    #[must_use]
    pub fn header(&self) -> &TableHeader {
        &self.header
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the next entry, `Ok(None)` at a clean end of file.
    ///
    /// Framing damage is returned as [`CheckError::Corrupt`]; there is no way
    /// to resynchronise after it, so callers should stop reading.
    pub fn next_entry(&mut self) -> Result<Option<RawEntry>> {
        if self.offset == self.len {
            return Ok(None);
        }
        let start = self.offset;
        let remaining = self.len - start;
        if remaining < ENTRY_HEADER_SIZE as u64 {
            return Err(CheckError::corrupt(
                &self.path,
                start,
                format!("{remaining} trailing bytes after the last entry"),
            ));
        }

        let mut head = [0u8; ENTRY_HEADER_SIZE];
        self.reader.read_exact(&mut head)?;
        let key_len = usize::from(u16::from_le_bytes([head[0], head[1]]));
        let value_len = u64::from(le_u32(&head[4..8]));
        let digest = le_u64(&head[8..16]);

        if key_len > MAX_KEY_LEN {
            return Err(CheckError::corrupt(
                &self.path,
                start,
                format!("key length {key_len} exceeds {MAX_KEY_LEN}"),
            ));
        }
        let body = key_len as u64 + value_len;
        if body > remaining - ENTRY_HEADER_SIZE as u64 {
            return Err(CheckError::corrupt(
                &self.path,
                start,
                "entry runs past the end of the file",
            ));
        }
        let value_len = usize::try_from(value_len).map_err(|_| {
            CheckError::corrupt(&self.path, start, "value length too large for platform")
        })?;

        let mut key = vec![0u8; key_len];
        self.reader.read_exact(&mut key)?;
        let mut value = vec![0u8; value_len];
        self.reader.read_exact(&mut value)?;
        self.offset = start + ENTRY_HEADER_SIZE as u64 + body;

        let digest_ok = digest8(&[&key, &value]) == digest;
        Ok(Some(RawEntry {
            offset: start,
            key,
            value,
            digest_ok,
        }))
    }
}

/// Read just the header of a table file.
pub fn read_table_header(path: &Path) -> Result<TableHeader> {
    TableReader::open(path).map(|reader| reader.header)
}

/// Builds a well-formed table file from sorted key/value pairs.
#[derive(Debug, Clone)]
pub struct TableBuilder {
    backend: Backend,
    revision: Revision,
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl TableBuilder {
    #[must_use]
    pub fn new(backend: Backend, revision: Revision) -> Self {
        Self {
            backend,
            revision,
            entries: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> &mut Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let header = TableHeader::new(self.backend, self.revision, self.entries.len() as u64);
        let mut bytes = header.encode().to_vec();
        for (key, value) in &self.entries {
            if key.is_empty() || key.len() > MAX_KEY_LEN {
                return Err(CheckError::Database {
                    reason: format!("key length {} outside 1..={MAX_KEY_LEN}", key.len()),
                });
            }
            let value_len = u32::try_from(value.len()).map_err(|_| CheckError::Database {
                reason: "table value longer than u32::MAX bytes".into(),
            })?;
            bytes.extend_from_slice(&(key.len() as u16).to_le_bytes());
            bytes.extend_from_slice(&[0u8; 2]);
            bytes.extend_from_slice(&value_len.to_le_bytes());
            bytes.extend_from_slice(&digest8(&[key, value]).to_le_bytes());
            bytes.extend_from_slice(key);
            bytes.extend_from_slice(value);
        }
        Ok(bytes)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        fs_err::write(path, self.to_bytes()?)?;
        Ok(())
    }
}

fn le_u32(bytes: &[u8]) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[..4]);
    u32::from_le_bytes(raw)
}

fn le_u64(bytes: &[u8]) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("termlist.DB");
        let mut builder = TableBuilder::new(Backend::Chert, 7);
        builder.insert(b"b".to_vec(), b"two".to_vec());
        builder.insert(b"a".to_vec(), b"one".to_vec());
        builder.write(&path).expect("write table");
        path
    }

    #[test]
    fn entries_come_back_sorted() {
        let dir = TempDir::new().expect("tempdir");
        let path = sample(&dir);
        let mut reader = TableReader::open(&path).expect("open");
        assert_eq!(reader.header().revision, 7);
        assert_eq!(reader.header().entry_count, 2);
        assert_eq!(reader.header().backend(), Some(Backend::Chert));

        let first = reader.next_entry().expect("read").expect("entry");
        assert_eq!(first.key, b"a");
        assert_eq!(first.offset, TABLE_HEADER_SIZE as u64);
        assert!(first.digest_ok);
        let second = reader.next_entry().expect("read").expect("entry");
        assert_eq!(second.value, b"two");
        assert!(reader.next_entry().expect("read").is_none());
    }

    #[test]
    fn flipped_value_byte_fails_digest_only() {
        let dir = TempDir::new().expect("tempdir");
        let path = sample(&dir);
        let mut bytes = std::fs::read(&path).expect("read");
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        std::fs::write(&path, bytes).expect("write");

        let mut reader = TableReader::open(&path).expect("open");
        assert!(reader.next_entry().expect("read").expect("entry").digest_ok);
        assert!(!reader.next_entry().expect("read").expect("entry").digest_ok);
    }

    #[test]
    fn truncated_entry_reports_offset() {
        let dir = TempDir::new().expect("tempdir");
        let path = sample(&dir);
        let bytes = std::fs::read(&path).expect("read");
        std::fs::write(&path, &bytes[..bytes.len() - 2]).expect("write");

        let mut reader = TableReader::open(&path).expect("open");
        reader.next_entry().expect("first entry intact");
        match reader.next_entry() {
            Err(CheckError::Corrupt { offset, reason, .. }) => {
                assert!(offset > TABLE_HEADER_SIZE as u64);
                assert!(reason.contains("past the end"), "reason: {reason}");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn damaged_header_is_rejected() {
        let dir = TempDir::new().expect("tempdir");
        let path = sample(&dir);
        let mut bytes = std::fs::read(&path).expect("read");
        bytes[20] ^= 0x01; // revision byte
        std::fs::write(&path, bytes).expect("write");

        let err = TableReader::open(&path).expect_err("digest should fail");
        assert!(err.is_database_error());
        assert!(err.to_string().contains("digest"));
    }

    #[test]
    fn builder_rejects_oversized_keys() {
        let mut builder = TableBuilder::new(Backend::Glass, 1);
        builder.insert(vec![b'k'; MAX_KEY_LEN + 1], Vec::new());
        assert!(builder.to_bytes().is_err());
    }
}
