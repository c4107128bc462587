//! Option flags accepted by [`crate::check`].

use bitflags::bitflags;

bitflags! {
    /// Capability bitmask controlling what a check may print or change.
    ///
    /// Only [`CheckOptions::FIX`] alters behaviour; the remaining flags select
    /// extra output and are cleared when there is nowhere to write it.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CheckOptions: u32 {
        /// Print a short per-table summary of the entries seen.
        const SHORT_TREE = 1;
        /// Dump every key of every table.
        const FULL_TREE = 1 << 1;
        /// Print table statistics (revision, entry count).
        const SHOW_STATS = 1 << 3;
        /// Permit recreating a broken version record.
        const FIX = 1 << 4;
    }
}

impl CheckOptions {
    /// Flags which only change what is written to the output sink.
    pub const PRESENTATION: Self = Self::SHORT_TREE
        .union(Self::FULL_TREE)
        .union(Self::SHOW_STATS);

    /// Options as seen by the checkers for a run with or without a sink.
    #[must_use]
    pub fn effective(self, has_sink: bool) -> Self {
        if has_sink {
            self
        } else {
            self & Self::FIX
        }
    }

    #[must_use]
    pub fn fix(self) -> bool {
        self.contains(Self::FIX)
    }
}
