use std::path::Path;

use crate::backend::{TableCheckRequest, TableChecker};
use crate::check::{DocLens, Output};
use crate::constants::UNKNOWN_LAST_DOCID;
use crate::types::CheckOptions;

/// Check one table on its own. Without the rest of the database there is no
/// trustworthy revision or last document id, and nothing to cross-check.
pub(crate) fn check_single_table<C: TableChecker + ?Sized>(
    checker: &C,
    table: &str,
    base: &Path,
    options: CheckOptions,
    out: &mut Output<'_>,
) -> usize {
    let request = TableCheckRequest {
        name: table,
        path: base,
        revision: None,
        options,
        last_docid: UNKNOWN_LAST_DOCID,
    };
    checker.check_table(request, &mut DocLens::detached(), out)
}
