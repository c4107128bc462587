use std::path::{Path, PathBuf};

use crate::backend::{GlassBackend, TableCheckRequest};
use crate::check::{DocLenAllocator, Output, report_open_failure, reserve_doclens};
use crate::constants::GLASS_TABLES;
use crate::error::Result;
use crate::io::changes::parse_changes_revision;
use crate::types::{CheckOptions, Revision, RevisionContext};

/// Check a glass database directory: openability, the changes log, then
/// every table. A broken version record is fatal; everything else is counted.
pub(crate) fn check_database(
    backend: &dyn GlassBackend,
    dir: &Path,
    options: CheckOptions,
    allocator: &dyn DocLenAllocator,
    out: &mut Output<'_>,
) -> Result<usize> {
    let mut errors = 0;
    if let Err(err) = backend.open(dir) {
        report_open_failure(&err, out);
        errors += 1;
    }

    let version = backend.read_version(dir)?;
    errors += check_changes_log(backend, dir, version.revision, out)?;

    let mut doclens = reserve_doclens(version.last_docid, allocator, out);
    let mut revision = RevisionContext::trusting(version.revision);
    for name in GLASS_TABLES {
        check_log!(out, "{name}:");
        let base = dir.join(name);
        let request = TableCheckRequest {
            name,
            path: &base,
            revision: Some(&mut revision),
            options,
            last_docid: version.last_docid,
        };
        let found = backend.check_table(request, &mut doclens, out);
        tracing::debug!(table = name, errors = found, "glass table checked");
        errors += found;
    }
    Ok(errors)
}

/// Check each retained changes file from `current` down to revision 1.
///
/// Pruned revisions leave gaps, which are not errors. The directory is listed
/// once rather than probing every revision, since `current` comes from the
/// version record and may be arbitrarily large.
pub(crate) fn check_changes_log(
    backend: &dyn GlassBackend,
    dir: &Path,
    current: Revision,
    out: &mut Output<'_>,
) -> Result<usize> {
    let mut retained: Vec<(Revision, PathBuf)> = Vec::new();
    for entry in fs_err::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(revision) = name.to_str().and_then(parse_changes_revision) else {
            continue;
        };
        if revision <= current && entry.file_type()?.is_file() {
            retained.push((revision, entry.path()));
        }
    }
    retained.sort_unstable_by(|a, b| b.0.cmp(&a.0));

    let mut errors = 0;
    for (revision, path) in retained {
        let report = backend.check_changes(&path);
        for line in &report.diagnostics {
            check_log!(out, "{line}");
        }
        tracing::debug!(revision, errors = report.errors, "changes file checked");
        errors += report.errors;
    }
    Ok(errors)
}
