//! Version records: `iamchert` and `iamglass`.
//!
//! Both share one frame: `[magic: 8][payload_len: u32][bincode payload][blake3: 32]`.

use std::io::Write;
use std::path::{Path, PathBuf};

use atomic_write_file::AtomicWriteFile;
use bincode::serde::{decode_from_slice, encode_to_vec};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{
    CHERT_FORMAT_VERSION, CHERT_MARKER, CHERT_VERSION_MAGIC, GLASS_FORMAT_VERSION, GLASS_MARKER,
    GLASS_VERSION_MAGIC, MAX_METADATA_BYTES,
};
use crate::error::{CheckError, Result};
use crate::io::record_config;
use crate::types::{DocId, Revision};

const FRAME_OVERHEAD: usize = 8 + 4 + 32;

/// Wrap `payload` in a magic/length/digest frame.
pub(crate) fn frame(magic: [u8; 8], payload: &[u8]) -> Result<Vec<u8>> {
    let len = u32::try_from(payload.len()).map_err(|_| CheckError::Database {
        reason: "metadata payload too large".into(),
    })?;
    let mut out = Vec::with_capacity(payload.len() + FRAME_OVERHEAD);
    out.extend_from_slice(&magic);
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(payload);
    out.extend_from_slice(blake3::hash(payload).as_bytes());
    Ok(out)
}

/// Read a framed file and return its verified payload.
pub(crate) fn read_frame(path: &Path, magic: [u8; 8]) -> Result<Vec<u8>> {
    let len = fs_err::metadata(path)
        .map_err(|err| CheckError::opening(path, &err))?
        .len();
    if len > MAX_METADATA_BYTES {
        return Err(CheckError::corrupt(
            path,
            0,
            format!("metadata file is {len} bytes, limit {MAX_METADATA_BYTES}"),
        ));
    }
    let bytes = fs_err::read(path).map_err(|err| CheckError::opening(path, &err))?;
    if bytes.len() < FRAME_OVERHEAD {
        return Err(CheckError::corrupt(path, 0, "metadata file truncated"));
    }
    if bytes[..8] != magic {
        return Err(CheckError::corrupt(path, 0, "bad metadata magic"));
    }
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[8..12]);
    let payload_len = u32::from_le_bytes(raw) as usize;
    if payload_len != bytes.len() - FRAME_OVERHEAD {
        return Err(CheckError::corrupt(path, 8, "metadata length does not match file size"));
    }
    let payload = &bytes[12..12 + payload_len];
    let digest = &bytes[12 + payload_len..];
    if blake3::hash(payload).as_bytes().as_slice() != digest {
        return Err(CheckError::corrupt(
            path,
            (12 + payload_len) as u64,
            "metadata digest mismatch",
        ));
    }
    Ok(payload.to_vec())
}

/// Replace `path` with `bytes` in one step.
pub(crate) fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = AtomicWriteFile::options().open(path)?;
    file.write_all(bytes)?;
    file.commit()?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct ChertVersionRecord {
    format: u32,
    uuid: [u8; 16],
}

/// The `iamchert` record of one database directory.
#[derive(Debug, Clone)]
pub struct ChertVersion {
    path: PathBuf,
}

impl ChertVersion {
    #[must_use]
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(CHERT_MARKER),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Validate the record and return the database UUID.
    pub fn read_and_check(&self) -> Result<[u8; 16]> {
        let payload = read_frame(&self.path, CHERT_VERSION_MAGIC)?;
        let (record, _): (ChertVersionRecord, usize) =
            decode_from_slice(&payload, record_config())?;
        if record.format != CHERT_FORMAT_VERSION {
            return Err(CheckError::Database {
                reason: format!(
                    "chert version {} not supported (expected {CHERT_FORMAT_VERSION})",
                    record.format
                ),
            });
        }
        Ok(record.uuid)
    }

    /// Write a fresh record with a new UUID, replacing whatever is there.
    pub fn create(&self) -> Result<[u8; 16]> {
        let record = ChertVersionRecord {
            format: CHERT_FORMAT_VERSION,
            uuid: Uuid::new_v4().into_bytes(),
        };
        let payload = encode_to_vec(record, record_config())?;
        write_atomically(&self.path, &frame(CHERT_VERSION_MAGIC, &payload)?)?;
        tracing::debug!(path = %self.path.display(), "created chert version record");
        Ok(record.uuid)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlassVersionRecord {
    pub format: u32,
    pub revision: Revision,
    pub last_docid: DocId,
    pub doccount: u32,
    pub uuid: [u8; 16],
}

impl GlassVersionRecord {
    #[must_use]
    pub fn new(revision: Revision, last_docid: DocId, doccount: u32) -> Self {
        Self {
            format: GLASS_FORMAT_VERSION,
            revision,
            last_docid,
            doccount,
            uuid: Uuid::new_v4().into_bytes(),
        }
    }
}

/// The `iamglass` record of one database directory.
#[derive(Debug, Clone)]
pub struct GlassVersion {
    path: PathBuf,
}

impl GlassVersion {
    #[must_use]
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(GLASS_MARKER),
        }
    }

    pub fn read(&self) -> Result<GlassVersionRecord> {
        let payload = read_frame(&self.path, GLASS_VERSION_MAGIC)?;
        let (record, _): (GlassVersionRecord, usize) =
            decode_from_slice(&payload, record_config())?;
        if record.format != GLASS_FORMAT_VERSION {
            return Err(CheckError::Database {
                reason: format!(
                    "glass version {} not supported (expected {GLASS_FORMAT_VERSION})",
                    record.format
                ),
            });
        }
        if record.doccount > record.last_docid {
            return Err(CheckError::Database {
                reason: format!(
                    "doccount {} exceeds last docid {}",
                    record.doccount, record.last_docid
                ),
            });
        }
        Ok(record)
    }

    pub fn write(&self, record: &GlassVersionRecord) -> Result<()> {
        let payload = encode_to_vec(record, record_config())?;
        write_atomically(&self.path, &frame(GLASS_VERSION_MAGIC, &payload)?)
    }
}
