use std::path::Path;

use crate::backend::table_check::{RevisionPolicy, TableCheck};
use crate::backend::{ChertBackend, ChertOpen, TableCheckRequest, TableChecker};
use crate::check::{DocLens, Output};
use crate::constants::CHERT_TABLE_SUFFIX;
use crate::error::{CheckError, Result};
use crate::io::encoding::{POSTLIST_METAINFO_KEY, decode_metainfo};
use crate::io::table::{TableReader, read_table_header};
use crate::io::version::ChertVersion;
use crate::types::Backend;

/// Chert databases stored in the native table format.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeChert;

impl NativeChert {
    fn tables() -> TableCheck {
        TableCheck::new(Backend::Chert, RevisionPolicy::Exact)
    }
}

impl TableChecker for NativeChert {
    fn check_table(
        &self,
        request: TableCheckRequest<'_>,
        doclens: &mut DocLens,
        out: &mut Output<'_>,
    ) -> usize {
        Self::tables().run(request, doclens, out)
    }
}

impl ChertBackend for NativeChert {
    /// Open the way a reader would: the version record must be valid and the
    /// record and postlist tables must agree on the revision.
    fn open(&self, dir: &Path) -> Result<ChertOpen> {
        ChertVersion::new(dir).read_and_check()?;
        let record = read_table_header(&dir.join(format!("record{CHERT_TABLE_SUFFIX}")))?;
        let mut postlist = TableReader::open(&dir.join(format!("postlist{CHERT_TABLE_SUFFIX}")))?;
        let revision = postlist.header().revision;
        if record.revision != revision {
            return Err(CheckError::Database {
                reason: format!(
                    "record table is at revision {} but postlist table is at revision {revision}",
                    record.revision
                ),
            });
        }

        // An empty database has no metainfo entry.
        let last_docid = match postlist.next_entry()? {
            Some(entry) if entry.key == POSTLIST_METAINFO_KEY => {
                let (last_docid, _) = decode_metainfo(&entry.value).map_err(|err| {
                    CheckError::corrupt(postlist.path(), entry.offset, err.to_string())
                })?;
                last_docid
            }
            _ => 0,
        };
        tracing::debug!(revision, last_docid, "opened chert database");
        Ok(ChertOpen {
            last_docid,
            revision,
        })
    }

    fn read_and_check_version(&self, dir: &Path) -> Result<()> {
        ChertVersion::new(dir).read_and_check().map(|_| ())
    }

    fn create_version(&self, dir: &Path) -> Result<()> {
        ChertVersion::new(dir).create().map(|_| ())
    }
}
