use std::path::Path;

use crate::backend::table_check::{RevisionPolicy, TableCheck, TableRole, finish};
use crate::backend::{ChangesReport, GlassBackend, GlassVersionInfo, TableCheckRequest, TableChecker};
use crate::check::{DocLens, Output, file_exists};
use crate::constants::GLASS_TABLE_SUFFIX;
use crate::error::{CheckError, Result};
use crate::io::changes::check_changes_file;
use crate::io::table::read_table_header;
use crate::io::version::GlassVersion;
use crate::types::Backend;

/// Glass databases stored in the native table format.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeGlass;

impl TableChecker for NativeGlass {
    /// Glass tables other than `postlist` may legitimately be absent, so
    /// presence is decided here rather than by the caller.
    fn check_table(
        &self,
        request: TableCheckRequest<'_>,
        doclens: &mut DocLens,
        out: &mut Output<'_>,
    ) -> usize {
        let tables = TableCheck::new(Backend::Glass, RevisionPolicy::NotNewer);
        if file_exists(&tables.table_file(request.path)) {
            return tables.run(request, doclens, out);
        }
        match TableRole::from_name(request.name) {
            TableRole::PostList => {
                check_log!(out, "Not present.");
                finish(out, 1);
                1
            }
            TableRole::TermList => {
                check_log!(out, "Not present.");
                check_log!(out);
                0
            }
            _ => {
                check_log!(out, "Lazily created, and not yet used.");
                check_log!(out);
                0
            }
        }
    }
}

impl GlassBackend for NativeGlass {
    fn open(&self, dir: &Path) -> Result<()> {
        let version = GlassVersion::new(dir).read()?;
        let postlist = read_table_header(&dir.join(format!("postlist{GLASS_TABLE_SUFFIX}")))?;
        if postlist.revision > version.revision {
            return Err(CheckError::Database {
                reason: format!(
                    "postlist table revision {} is newer than database revision {}",
                    postlist.revision, version.revision
                ),
            });
        }
        Ok(())
    }

    fn read_version(&self, dir: &Path) -> Result<GlassVersionInfo> {
        let record = GlassVersion::new(dir).read()?;
        Ok(GlassVersionInfo {
            revision: record.revision,
            last_docid: record.last_docid,
        })
    }

    fn check_changes(&self, path: &Path) -> ChangesReport {
        check_changes_file(path)
    }
}
