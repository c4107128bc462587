use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::{CHERT_TABLE_SUFFIX, GLASS_TABLE_SUFFIX};

/// Document identifier. `0` is never a valid document.
pub type DocId = u32;
/// Document length or within-document frequency.
pub type TermCount = u32;
/// Committed revision of a table or database.
pub type Revision = u64;

/// Storage backend a table or database belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Single shared revision number per database generation.
    Chert,
    /// Version record plus per-revision changes files.
    Glass,
}

impl Backend {
    #[must_use]
    pub fn table_suffix(self) -> &'static str {
        match self {
            Self::Chert => CHERT_TABLE_SUFFIX,
            Self::Glass => GLASS_TABLE_SUFFIX,
        }
    }

    /// Tag byte stored in table headers.
    #[must_use]
    pub fn tag(self) -> u8 {
        match self {
            Self::Chert => b'C',
            Self::Glass => b'G',
        }
    }

    #[must_use]
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            b'C' => Some(Self::Chert),
            b'G' => Some(Self::Glass),
            _ => None,
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chert => f.write_str("chert"),
            Self::Glass => f.write_str("glass"),
        }
    }
}

/// What a path handed to [`crate::check`] turned out to be.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Layout {
    ChertDatabase {
        dir: PathBuf,
    },
    GlassDatabase {
        dir: PathBuf,
    },
    /// A lone chert table; `base` is the table path without its `.DB` suffix.
    ChertTable {
        dir: PathBuf,
        base: PathBuf,
        table: String,
    },
    /// A lone glass table; `base` is the table path without `.glass`.
    GlassTable {
        dir: PathBuf,
        base: PathBuf,
        table: String,
    },
}

impl Layout {
    #[must_use]
    pub fn backend(&self) -> Backend {
        match self {
            Self::ChertDatabase { .. } | Self::ChertTable { .. } => Backend::Chert,
            Self::GlassDatabase { .. } | Self::GlassTable { .. } => Backend::Glass,
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        match self {
            Self::ChertDatabase { dir }
            | Self::GlassDatabase { dir }
            | Self::ChertTable { dir, .. }
            | Self::GlassTable { dir, .. } => dir,
        }
    }

    #[must_use]
    pub fn is_whole_database(&self) -> bool {
        matches!(self, Self::ChertDatabase { .. } | Self::GlassDatabase { .. })
    }
}

/// Revision the table checks currently trust, threaded by `&mut` through a
/// run so a backend can adopt the revision of the first table it sees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RevisionContext {
    pub trusted: Option<Revision>,
}

impl RevisionContext {
    #[must_use]
    pub fn trusting(revision: Revision) -> Self {
        Self {
            trusted: Some(revision),
        }
    }

    #[must_use]
    pub fn untrusted() -> Self {
        Self { trusted: None }
    }
}
