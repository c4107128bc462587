//! Storage backends as seen by the checker.
//!
//! The orchestrators in [`crate::check`] only talk to these traits, so a
//! backend can be swapped for a test double or compiled out entirely.

#[cfg(feature = "chert")]
mod chert;
#[cfg(feature = "glass")]
mod glass;
mod table_check;

use std::path::Path;

use crate::check::{DocLens, Output};
use crate::error::Result;
use crate::types::{CheckOptions, DocId, Revision, RevisionContext};

pub use crate::io::changes::ChangesReport;
#[cfg(feature = "chert")]
pub use chert::NativeChert;
#[cfg(feature = "glass")]
pub use glass::NativeGlass;
pub use table_check::{RevisionPolicy, TableCheck, TableRole};

/// Everything one table check needs apart from the shared doclens and sink.
#[derive(Debug)]
pub struct TableCheckRequest<'a> {
    /// Lower-cased table name, e.g. `postlist`.
    pub name: &'a str,
    /// Table path without the backend suffix (`<dir>/<name>`).
    pub path: &'a Path,
    /// `None` for a standalone table check.
    pub revision: Option<&'a mut RevisionContext>,
    pub options: CheckOptions,
    pub last_docid: DocId,
}

/// Per-table checking for one backend.
pub trait TableChecker {
    /// Check one table and return the number of problems found.
    ///
    /// Never fails: a table which cannot be read at all counts as errors.
    fn check_table(
        &self,
        request: TableCheckRequest<'_>,
        doclens: &mut DocLens,
        out: &mut Output<'_>,
    ) -> usize;
}

/// Result of opening a chert database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChertOpen {
    pub last_docid: DocId,
    pub revision: Revision,
}

pub trait ChertBackend: TableChecker {
    fn open(&self, dir: &Path) -> Result<ChertOpen>;
    fn read_and_check_version(&self, dir: &Path) -> Result<()>;
    /// Replace the version record with a fresh one.
    fn create_version(&self, dir: &Path) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlassVersionInfo {
    pub revision: Revision,
    pub last_docid: DocId,
}

pub trait GlassBackend: TableChecker {
    /// Check that the database opens; only the outcome matters.
    fn open(&self, dir: &Path) -> Result<()>;
    fn read_version(&self, dir: &Path) -> Result<GlassVersionInfo>;
    fn check_changes(&self, path: &Path) -> ChangesReport;
}
