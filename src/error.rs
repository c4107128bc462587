use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CheckError>;

/// On-disk formats that were once supported and are now rejected outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetiredFormat {
    Flint,
    Brass,
    Quartz,
}

impl RetiredFormat {
    /// Release in which support for the format was dropped.
    #[must_use]
    pub fn removed_in(self) -> &'static str {
        match self {
            Self::Flint => "1.3.0",
            Self::Brass => "1.3.2",
            Self::Quartz => "1.1.0",
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Flint => "Flint",
            Self::Brass => "Brass",
            Self::Quartz => "Quartz",
        }
    }
}

impl fmt::Display for RetiredFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error)]
pub enum CheckError {
    #[error("Chert database support isn't enabled")]
    ChertUnavailable,

    #[error("Glass database support isn't enabled")]
    GlassUnavailable,

    #[error("{} database support was removed in Xapian {}", .0.name(), .0.removed_in())]
    RetiredFormat(RetiredFormat),

    #[error("Not a Xapian database or database table")]
    NotADatabase,

    #[error("Couldn't open {}: {reason}", .path.display())]
    DatabaseOpening { path: PathBuf, reason: String },

    #[error("Database error: {reason}")]
    Database { reason: String },

    #[error("{} is corrupt at offset {offset}: {reason}", .path.display())]
    Corrupt {
        path: PathBuf,
        offset: u64,
        reason: String,
    },

    #[error("Failed to encode metadata record: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("Failed to decode metadata record: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CheckError {
    /// True for failures describing a broken or missing database, as opposed
    /// to configuration errors or environmental I/O trouble.
    #[must_use]
    pub fn is_database_error(&self) -> bool {
        matches!(
            self,
            Self::DatabaseOpening { .. }
                | Self::Database { .. }
                | Self::Corrupt { .. }
                | Self::Decode(_)
        )
    }

    /// True for errors that abort a check before any table is examined.
    #[must_use]
    pub fn is_unsupported_feature(&self) -> bool {
        matches!(
            self,
            Self::ChertUnavailable | Self::GlassUnavailable | Self::RetiredFormat(_)
        )
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, offset: u64, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.into(),
            offset,
            reason: reason.into(),
        }
    }

    pub(crate) fn opening(path: impl Into<PathBuf>, err: &std::io::Error) -> Self {
        Self::DatabaseOpening {
            path: path.into(),
            reason: err.to_string(),
        }
    }
}
