//! Bounded storage for the document-length cross-check.
//!
//! The termlist check records each document's length here and the postlist
//! check compares its own doclen entries against them. `last_docid` comes
//! from metadata that may itself be corrupt, so the slot array is capped and
//! allocation failure is reported rather than fatal.

use std::fmt;

use crate::check::Output;
use crate::constants::DOCLEN_MEMORY_LIMIT;
use crate::types::{DocId, TermCount};

/// One slot per document id; `None` until the termlist check fills it.
pub type DocLenSlot = Option<TermCount>;

/// Why the doclen cross-check will not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// The slot array would need at least [`DOCLEN_MEMORY_LIMIT`] bytes.
    TooLarge,
    AllocFailed,
    TooManyElements,
    /// The database couldn't be opened, so its last document id is unknown
    /// and no reservation was attempted.
    UnknownLastDocid,
}

impl SkipReason {
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Self::TooLarge => {
                "Cross-checking document lengths between the postlist and termlist tables would use more than 1GB of memory, so skipping that check"
            }
            Self::AllocFailed => {
                "Couldn't allocate enough memory for cross-checking document lengths between the postlist and termlist tables, so skipping that check"
            }
            Self::TooManyElements => {
                "Couldn't allocate enough elements for cross-checking document lengths between the postlist and termlist tables, so skipping that check"
            }
            Self::UnknownLastDocid => {
                "The last document id is unknown, so document lengths between the postlist and termlist tables won't be cross-checked"
            }
        }
    }

    /// Short tag used in per-table notes and log fields.
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Self::TooLarge => "too large",
            Self::AllocFailed => "allocation failed",
            Self::TooManyElements => "too many elements",
            Self::UnknownLastDocid => "last document id unknown",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Failure reported by a [`DocLenAllocator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReserveFailure {
    OutOfMemory,
    CapacityOverflow,
}

/// Hook that performs the actual reservation, replaceable in tests to
/// simulate exhaustion.
pub trait DocLenAllocator {
    fn reserve(&self, slots: &mut Vec<DocLenSlot>, count: usize) -> Result<(), ReserveFailure>;
}

/// Reserves through the global allocator without aborting on failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemAllocator;

impl DocLenAllocator for SystemAllocator {
    fn reserve(&self, slots: &mut Vec<DocLenSlot>, count: usize) -> Result<(), ReserveFailure> {
        let bytes = count
            .checked_mul(std::mem::size_of::<DocLenSlot>())
            .ok_or(ReserveFailure::CapacityOverflow)?;
        if bytes > isize::MAX as usize {
            return Err(ReserveFailure::CapacityOverflow);
        }
        slots
            .try_reserve_exact(count)
            .map_err(|_| ReserveFailure::OutOfMemory)
    }
}

#[derive(Debug)]
enum State {
    Reserved(Vec<DocLenSlot>),
    Skipped(SkipReason),
    /// Single-table runs: nothing is recorded and nothing is cross-checked.
    Detached,
}

/// Document lengths gathered during one run.
#[derive(Debug)]
pub struct DocLens {
    state: State,
    populated: bool,
    recorded: usize,
}

impl DocLens {
    fn with_state(state: State) -> Self {
        Self {
            state,
            populated: false,
            recorded: 0,
        }
    }

    #[must_use]
    pub fn detached() -> Self {
        Self::with_state(State::Detached)
    }

    #[must_use]
    pub fn skipped(reason: SkipReason) -> Self {
        Self::with_state(State::Skipped(reason))
    }

    #[must_use]
    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self.state {
            State::Skipped(reason) => Some(reason),
            _ => None,
        }
    }

    /// True when lengths can be recorded and compared.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self.state, State::Reserved(_))
    }

    #[must_use]
    pub fn is_detached(&self) -> bool {
        matches!(self.state, State::Detached)
    }

    /// Number of document ids that can be recorded (`last_docid + 1`).
    #[must_use]
    pub fn capacity(&self) -> usize {
        match &self.state {
            State::Reserved(slots) => slots.len(),
            _ => 0,
        }
    }

    /// Mark that a termlist has been scanned into this instance; until then
    /// the postlist check has nothing to compare against.
    pub fn mark_populated(&mut self) {
        self.populated = true;
    }

    #[must_use]
    pub fn is_populated(&self) -> bool {
        self.populated
    }

    /// Record the length of `did`. Returns false when the id is outside the
    /// reserved range; the array is never grown.
    pub fn record(&mut self, did: DocId, len: TermCount) -> bool {
        let State::Reserved(slots) = &mut self.state else {
            return false;
        };
        match slots.get_mut(did as usize) {
            Some(slot) => {
                if slot.is_none() {
                    self.recorded += 1;
                }
                *slot = Some(len);
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn get(&self, did: DocId) -> Option<TermCount> {
        match &self.state {
            State::Reserved(slots) => slots.get(did as usize).copied().flatten(),
            _ => None,
        }
    }

    /// Number of distinct documents recorded so far.
    #[must_use]
    pub fn recorded(&self) -> usize {
        self.recorded
    }

    /// Recorded documents in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (DocId, TermCount)> + '_ {
        let slots: &[DocLenSlot] = match &self.state {
            State::Reserved(slots) => slots,
            _ => &[],
        };
        slots
            .iter()
            .enumerate()
            .filter_map(|(did, len)| len.map(|len| (did as DocId, len)))
    }
}

/// Reserve one slot per document id up to `last_docid`.
///
/// Never fails: when the array would reach [`DOCLEN_MEMORY_LIMIT`] or the
/// allocator refuses, the cross-check is skipped and the reason is written to
/// `out`. The threshold test happens before the allocator is consulted.
pub fn reserve_doclens(
    last_docid: DocId,
    allocator: &dyn DocLenAllocator,
    out: &mut Output<'_>,
) -> DocLens {
    let limit = DOCLEN_MEMORY_LIMIT / std::mem::size_of::<DocLenSlot>();
    let reason = if last_docid as usize >= limit {
        SkipReason::TooLarge
    } else {
        let count = last_docid as usize + 1;
        let mut slots = Vec::new();
        match allocator.reserve(&mut slots, count) {
            Ok(()) if slots.capacity() >= count => {
                slots.resize(count, None);
                tracing::debug!(doclen.slots = count, "reserved doclen slots");
                return DocLens::with_state(State::Reserved(slots));
            }
            Ok(()) | Err(ReserveFailure::CapacityOverflow) => SkipReason::TooManyElements,
            Err(ReserveFailure::OutOfMemory) => SkipReason::AllocFailed,
        }
    };
    tracing::warn!(last_docid, reason = reason.tag(), "skipping doclen cross-check");
    check_log!(out, "{reason}");
    DocLens::skipped(reason)
}
