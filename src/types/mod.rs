//! Public types exposed by the `idxcheck` crate.

pub mod common;
pub mod options;

pub use common::{Backend, DocId, Layout, Revision, RevisionContext, TermCount};
pub use options::CheckOptions;
