//! Glass `changes<N>` files: one per retained revision, describing the
//! transition from `N - 1` to `N`.

use std::path::Path;

use bincode::serde::{decode_from_slice, encode_to_vec};
use serde::{Deserialize, Serialize};

use crate::constants::{CHANGES_FILE_PREFIX, CHANGES_FORMAT_VERSION, CHANGES_MAGIC, GLASS_TABLES};
use crate::error::Result;
use crate::io::record_config;
use crate::io::version::{frame, read_frame};
use crate::types::Revision;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangesRecord {
    pub format: u32,
    pub start_revision: Revision,
    pub end_revision: Revision,
    /// Tables modified by the transition.
    pub tables: Vec<String>,
}

impl ChangesRecord {
    #[must_use]
    pub fn new(end_revision: Revision, tables: &[&str]) -> Self {
        Self {
            format: CHANGES_FORMAT_VERSION,
            start_revision: end_revision.saturating_sub(1),
            end_revision,
            tables: tables.iter().map(|t| (*t).to_string()).collect(),
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let payload = encode_to_vec(self, record_config())?;
        fs_err::write(path, frame(CHANGES_MAGIC, &payload)?)?;
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self> {
        let payload = read_frame(path, CHANGES_MAGIC)?;
        let (record, _) = decode_from_slice(&payload, record_config())?;
        Ok(record)
    }
}

#[must_use]
pub fn changes_file_name(revision: Revision) -> String {
    format!("{CHANGES_FILE_PREFIX}{revision}")
}

/// Revision encoded in a changes file name. Only canonical decimal is
/// accepted: no sign, no leading zeros, no zero revision.
#[must_use]
pub fn parse_changes_revision(name: &str) -> Option<Revision> {
    let digits = name.strip_prefix(CHANGES_FILE_PREFIX)?;
    if digits.is_empty() || digits.starts_with('0') || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().filter(|rev| *rev > 0)
}

/// Outcome of checking one changes file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangesReport {
    pub errors: usize,
    pub diagnostics: Vec<String>,
}

impl ChangesReport {
    fn fail(&mut self, message: String) {
        self.errors += 1;
        self.diagnostics.push(message);
    }
}

/// Validate the changes file at `path`.
pub fn check_changes_file(path: &Path) -> ChangesReport {
    let mut report = ChangesReport::default();
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();
    let Some(expected) = parse_changes_revision(name) else {
        report.fail(format!("{}: not a changes file name", path.display()));
        return report;
    };

    let record = match ChangesRecord::read(path) {
        Ok(record) => record,
        Err(err) => {
            report.fail(format!("{name}: {err}"));
            return report;
        }
    };

    if record.format != CHANGES_FORMAT_VERSION {
        report.fail(format!(
            "{name}: changes format {} not supported (expected {CHANGES_FORMAT_VERSION})",
            record.format
        ));
    }
    if record.end_revision != record.start_revision.wrapping_add(1) {
        report.fail(format!(
            "{name}: covers revisions {} to {}, expected a single step",
            record.start_revision, record.end_revision
        ));
    }
    if record.end_revision != expected {
        report.fail(format!(
            "{name}: records end revision {} but is named for {expected}",
            record.end_revision
        ));
    }
    for table in &record.tables {
        if !GLASS_TABLES.contains(&table.as_str()) {
            report.fail(format!("{name}: unknown table '{table}'"));
        }
    }
    if report.errors == 0 {
        report
            .diagnostics
            .push(format!("{name}: revision {} -> {}", record.start_revision, record.end_revision));
    }
    report
}
