//! Classify a path as a whole database, a single table, or a retired format.

use std::path::{Path, PathBuf};

use crate::constants::{
    BRASS_MARKER, CHERT_MARKER, CHERT_TABLE_SUFFIX, FLINT_MARKER, GLASS_MARKER,
    GLASS_TABLE_SUFFIX, QUARTZ_MARKER,
};
use crate::error::{CheckError, Result, RetiredFormat};
use crate::types::{Backend, Layout};

/// Work out what `path` refers to.
///
/// Whole-database markers win over everything else. Retired formats are
/// reported as such, including a `.DB` table that sits in a flint or brass
/// directory. Anything else must resolve to a table file by suffix or by
/// probing `<path>.DB` then `<path>.glass`.
pub fn detect(path: impl AsRef<Path>) -> Result<Layout> {
    let path = path.as_ref();
    if file_exists(&path.join(CHERT_MARKER)) {
        return Ok(Layout::ChertDatabase {
            dir: path.to_path_buf(),
        });
    }
    if file_exists(&path.join(GLASS_MARKER)) {
        return Ok(Layout::GlassDatabase {
            dir: path.to_path_buf(),
        });
    }
    if let Some(retired) = retired_format(path, true) {
        return Err(CheckError::RetiredFormat(retired));
    }

    // Suffixes are matched on the OS string so non-UTF-8 names keep their
    // exact bytes in every path built from them.
    let Some(file_name) = path.file_name() else {
        return Err(CheckError::NotADatabase);
    };
    let (stem, backend) = match (path.file_stem(), path.extension()) {
        (Some(stem), Some(ext)) if ext.is_empty() => (stem, None),
        (Some(stem), Some(ext)) if ext == extension(CHERT_TABLE_SUFFIX) => {
            (stem, Some(Backend::Chert))
        }
        (Some(stem), Some(ext)) if ext == extension(GLASS_TABLE_SUFFIX) => {
            (stem, Some(Backend::Glass))
        }
        _ => (file_name, None),
    };
    let base = path.with_file_name(stem);

    let backend = match backend {
        Some(backend) => backend,
        None if file_exists(&with_suffix(&base, CHERT_TABLE_SUFFIX)) => Backend::Chert,
        None if file_exists(&with_suffix(&base, GLASS_TABLE_SUFFIX)) => Backend::Glass,
        None => return Err(CheckError::NotADatabase),
    };

    let table = stem.to_string_lossy().to_ascii_lowercase();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let layout = match backend {
        Backend::Chert => {
            if let Some(retired) = retired_format(&dir, false) {
                return Err(CheckError::RetiredFormat(retired));
            }
            Layout::ChertTable { dir, base, table }
        }
        Backend::Glass => Layout::GlassTable { dir, base, table },
    };
    tracing::debug!(path = %path.display(), layout = ?layout, "detected single table");
    Ok(layout)
}

/// Retired marker in `dir`, in fixed precedence. Quartz is only considered
/// for a directory given directly: its tell is a table file, not a marker.
fn retired_format(dir: &Path, include_quartz: bool) -> Option<RetiredFormat> {
    if file_exists(&dir.join(FLINT_MARKER)) {
        Some(RetiredFormat::Flint)
    } else if file_exists(&dir.join(BRASS_MARKER)) {
        Some(RetiredFormat::Brass)
    } else if include_quartz && file_exists(&dir.join(QUARTZ_MARKER)) {
        Some(RetiredFormat::Quartz)
    } else {
        None
    }
}

/// `base` with `suffix` appended to its final component, bytes untouched.
pub(crate) fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut path = base.as_os_str().to_os_string();
    path.push(suffix);
    PathBuf::from(path)
}

fn extension(suffix: &str) -> &str {
    suffix.trim_start_matches('.')
}

/// Existence test that treats unreadable metadata as absent.
pub(crate) fn file_exists(path: &Path) -> bool {
    fs_err::metadata(path).is_ok()
}
