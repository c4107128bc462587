use std::path::Path;

use crate::backend::{ChertBackend, TableCheckRequest};
use crate::check::detect::file_exists;
use crate::check::{
    DocLenAllocator, DocLens, Output, SkipReason, report_open_failure, reserve_doclens,
};
use crate::constants::{CHERT_TABLE_SUFFIX, CHERT_TABLES, UNKNOWN_LAST_DOCID};
use crate::error::Result;
use crate::types::{CheckOptions, RevisionContext};

/// Check every table of a chert database directory.
///
/// `record` is checked first: it is committed last, so its revision is the
/// most reliable anchor when the database itself couldn't supply one.
pub(crate) fn check_database(
    backend: &dyn ChertBackend,
    dir: &Path,
    options: CheckOptions,
    allocator: &dyn DocLenAllocator,
    out: &mut Output<'_>,
) -> Result<usize> {
    let mut errors = 0;
    let (last_docid, mut revision, mut doclens) = match backend.open(dir) {
        Ok(open) => (
            open.last_docid,
            RevisionContext::trusting(open.revision),
            reserve_doclens(open.last_docid, allocator, out),
        ),
        Err(err) => {
            report_open_failure(&err, out);
            errors += 1;
            // Nothing to size the slots from, so don't try.
            (
                UNKNOWN_LAST_DOCID,
                RevisionContext::untrusted(),
                DocLens::skipped(SkipReason::UnknownLastDocid),
            )
        }
    };

    let before_tables = errors;
    for name in CHERT_TABLES {
        check_log!(out, "{name}:");
        let base = dir.join(name);
        if !matches!(name, "record" | "postlist")
            && !file_exists(&dir.join(format!("{name}{CHERT_TABLE_SUFFIX}")))
        {
            if name == "termlist" {
                check_log!(out, "Not present.");
            } else {
                check_log!(out, "Lazily created, and not yet used.");
            }
            check_log!(out);
            continue;
        }
        let request = TableCheckRequest {
            name,
            path: &base,
            revision: Some(&mut revision),
            options,
            last_docid,
        };
        let found = backend.check_table(request, &mut doclens, out);
        tracing::debug!(table = name, errors = found, "chert table checked");
        errors += found;
    }

    if errors == before_tables && options.fix() {
        repair_version(backend, dir, out)?;
    }
    Ok(errors)
}

/// Recreate the version record if it fails validation. Only called once the
/// tables are known to be sound.
fn repair_version(backend: &dyn ChertBackend, dir: &Path, out: &mut Output<'_>) -> Result<()> {
    match backend.read_and_check_version(dir) {
        Ok(()) => Ok(()),
        Err(err) if err.is_database_error() => {
            check_log!(out, "Version file is damaged ({err}), recreating it");
            backend.create_version(dir)?;
            tracing::info!(dir = %dir.display(), "recreated chert version record");
            check_log!(out, "Version file recreated");
            Ok(())
        }
        Err(err) => Err(err),
    }
}
