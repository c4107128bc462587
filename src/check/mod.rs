//! Entry points: detect what a path is, then run the matching orchestrator.

mod chert;
mod detect;
mod doclens;
mod glass;
mod output;
mod single;

use std::fmt;
use std::io::Write;
use std::path::Path;

use crate::backend::{ChertBackend, GlassBackend};
use crate::error::{CheckError, Result};
use crate::types::{CheckOptions, Layout};

pub use detect::detect;
pub(crate) use detect::file_exists;
pub use doclens::{
    DocLenAllocator, DocLenSlot, DocLens, ReserveFailure, SkipReason, SystemAllocator,
    reserve_doclens,
};
pub use output::Output;

/// Check the database or table at `path` with the backends compiled into
/// this build.
///
/// Returns the number of problems found. Unsupported or unrecognised formats
/// are errors; damage inside a database is counted, not returned.
pub fn check(
    path: impl AsRef<Path>,
    options: CheckOptions,
    sink: Option<&mut dyn Write>,
) -> Result<usize> {
    Checker::new().check(path, options, sink)
}

/// A configured checker: which backends are available and how doclen
/// storage is allocated.
pub struct Checker {
    chert: Option<Box<dyn ChertBackend>>,
    glass: Option<Box<dyn GlassBackend>>,
    allocator: Box<dyn DocLenAllocator>,
}

impl Checker {
    /// Native backends for every enabled cargo feature.
    #[must_use]
    #[allow(clippy::let_and_return)]
    pub fn new() -> Self {
        let checker = Self::without_backends();
        #[cfg(feature = "chert")]
        let checker = checker.with_chert(crate::backend::NativeChert);
        #[cfg(feature = "glass")]
        let checker = checker.with_glass(crate::backend::NativeGlass);
        checker
    }

    /// A checker that rejects both database formats until backends are added.
    #[must_use]
    pub fn without_backends() -> Self {
        Self {
            chert: None,
            glass: None,
            allocator: Box::new(SystemAllocator),
        }
    }

    pub fn with_chert(mut self, backend: impl ChertBackend + 'static) -> Self {
        self.chert = Some(Box::new(backend));
        self
    }

    pub fn with_glass(mut self, backend: impl GlassBackend + 'static) -> Self {
        self.glass = Some(Box::new(backend));
        self
    }

    pub fn with_allocator(mut self, allocator: impl DocLenAllocator + 'static) -> Self {
        self.allocator = Box::new(allocator);
        self
    }

    pub fn check(
        &self,
        path: impl AsRef<Path>,
        options: CheckOptions,
        sink: Option<&mut dyn Write>,
    ) -> Result<usize> {
        let layout = detect(path)?;
        self.check_layout(&layout, options, sink)
    }

    /// Check an already detected layout.
    pub fn check_layout(
        &self,
        layout: &Layout,
        options: CheckOptions,
        sink: Option<&mut dyn Write>,
    ) -> Result<usize> {
        let options = options.effective(sink.is_some());
        let mut out = Output::new(sink);
        tracing::debug!(layout = ?layout, options = ?options, "starting check");

        let errors = match layout {
            Layout::ChertDatabase { dir } => {
                chert::check_database(self.chert()?, dir, options, &*self.allocator, &mut out)?
            }
            Layout::GlassDatabase { dir } => {
                glass::check_database(self.glass()?, dir, options, &*self.allocator, &mut out)?
            }
            Layout::ChertTable { base, table, .. } => {
                single::check_single_table(self.chert()?, table, base, options, &mut out)
            }
            Layout::GlassTable { base, table, .. } => {
                single::check_single_table(self.glass()?, table, base, options, &mut out)
            }
        };
        out.finish()?;
        tracing::info!(errors, backend = %layout.backend(), "check finished");
        Ok(errors)
    }

    fn chert(&self) -> Result<&dyn ChertBackend> {
        self.chert.as_deref().ok_or(CheckError::ChertUnavailable)
    }

    fn glass(&self) -> Result<&dyn GlassBackend> {
        self.glass.as_deref().ok_or(CheckError::GlassUnavailable)
    }
}

impl Default for Checker {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Checker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Checker")
            .field("chert", &self.chert.is_some())
            .field("glass", &self.glass.is_some())
            .finish_non_exhaustive()
    }
}

/// Shared by both whole-database orchestrators.
fn report_open_failure(err: &CheckError, out: &mut Output<'_>) {
    tracing::warn!(error = %err, "database couldn't be opened; continuing");
    check_log!(out, "Database couldn't be opened for reading: {err}");
    check_log!(out, "Continuing check anyway");
}
