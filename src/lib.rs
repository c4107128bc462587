#![deny(clippy::all, clippy::pedantic)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![cfg_attr(
    test,
    allow(
        clippy::useless_vec,
        clippy::uninlined_format_args,
        clippy::cast_possible_truncation
    )
)]
#![allow(clippy::module_name_repetitions)]
//
// Documentation lints: internal helpers are self-describing; public APIs still
// carry docs.
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
//
// Casts are bounded by on-disk field widths (u16 key lengths, u32 docids).
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_lossless)]
//
// Style/complexity: the per-table checker is a long match over table roles.
#![allow(clippy::too_many_lines)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::similar_names)]
#![allow(clippy::manual_let_else)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::unreadable_literal)] // Magic numbers in binary formats are clearer as hex
#![allow(clippy::len_without_is_empty)]
#![allow(clippy::unnecessary_wraps)]

//! Consistency checking for multi-table search-index databases.
//!
//! A database is a directory holding a fixed set of B-tree tables (`record` or
//! `docdata`, `termlist`, `postlist`, `position`, `spelling`, `synonym`) and a
//! version record. Two layouts are understood:
//!
//! - **chert**: an `iamchert` marker; every table carries the same revision.
//! - **glass**: an `iamglass` version record plus `changes<N>` files for
//!   retained revisions.
//!
//! [`check`] accepts a database directory or a single table file and returns
//! the number of problems found. Formats which are no longer supported
//! (flint, brass, quartz) fail with [`CheckError::RetiredFormat`].
//!
//! ```no_run
//! use idxcheck::{CheckOptions, check};
//!
//! let mut report = Vec::new();
//! let errors = check("/srv/index", CheckOptions::FIX, Some(&mut report as &mut dyn std::io::Write))?;
//! if errors > 0 {
//!     eprintln!("{}", String::from_utf8_lossy(&report));
//! }
//! # Ok::<(), idxcheck::CheckError>(())
//! ```

/// The idxcheck crate version (matches `Cargo.toml`).
pub const IDXCHECK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Write one line of diagnostics to an [`check::Output`]; a no-op without a sink.
macro_rules! check_log {
    ($out:expr) => {
        $out.line(format_args!(""))
    };
    ($out:expr, $($arg:tt)*) => {
        $out.line(format_args!($($arg)*))
    };
}

pub mod backend;
pub mod check;
pub mod constants;
pub mod error;
pub mod io;
pub mod types;

pub use backend::{
    ChangesReport, ChertBackend, ChertOpen, GlassBackend, GlassVersionInfo, TableCheckRequest,
    TableChecker,
};
#[cfg(feature = "chert")]
pub use backend::NativeChert;
#[cfg(feature = "glass")]
pub use backend::NativeGlass;
pub use check::{
    Checker, DocLenAllocator, DocLenSlot, DocLens, Output, ReserveFailure, SkipReason,
    SystemAllocator, check, detect, reserve_doclens,
};
pub use constants::*;
pub use error::{CheckError, Result, RetiredFormat};
pub use types::{Backend, CheckOptions, DocId, Layout, Revision, RevisionContext, TermCount};
