//! Per-table checker shared by the native backends.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::backend::TableCheckRequest;
use crate::check::{DocLens, Output};
use crate::constants::{TABLE_FORMAT_VERSION, UNKNOWN_LAST_DOCID};
use crate::io::encoding::{
    Malformed, PostlistKey, TermList, decode_doclen, decode_docid, decode_metainfo,
    decode_positions, decode_postings, decode_synonyms, split_position_key,
};
use crate::io::table::{RawEntry, TableHeader, TableReader};
use crate::types::{Backend, CheckOptions, DocId, Revision, RevisionContext};

/// How a table's revision must relate to the revision the run trusts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevisionPolicy {
    /// Every table carries the database revision. Without one, the first
    /// table checked supplies it.
    Exact,
    /// A table may lag the version record but never lead it.
    NotNewer,
}

/// What a table stores, derived from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableRole {
    /// `record` (chert) or `docdata` (glass).
    Documents,
    TermList,
    PostList,
    Position,
    Spelling,
    Synonym,
    Other,
}

impl TableRole {
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name {
            "record" | "docdata" => Self::Documents,
            "termlist" => Self::TermList,
            "postlist" => Self::PostList,
            "position" => Self::Position,
            "spelling" => Self::Spelling,
            "synonym" => Self::Synonym,
            _ => Self::Other,
        }
    }
}

/// Structural and content checks for one backend's table files.
#[derive(Debug, Clone, Copy)]
pub struct TableCheck {
    backend: Backend,
    policy: RevisionPolicy,
}

impl TableCheck {
    #[must_use]
    pub fn new(backend: Backend, policy: RevisionPolicy) -> Self {
        Self { backend, policy }
    }

    /// `<path><suffix>` for this backend.
    #[must_use]
    pub fn table_file(&self, base: &Path) -> PathBuf {
        let mut file = OsString::from(base.as_os_str());
        file.push(self.backend.table_suffix());
        PathBuf::from(file)
    }

    /// Check the table at `request.path` and write a closing verdict.
    pub fn run(
        &self,
        request: TableCheckRequest<'_>,
        doclens: &mut DocLens,
        out: &mut Output<'_>,
    ) -> usize {
        let file = self.table_file(request.path);
        let mut scan = TableScan::new(
            TableRole::from_name(request.name),
            request.options,
            request.last_docid,
        );
        match TableReader::open(&file) {
            Ok(reader) => {
                self.inspect_header(reader.header(), request.revision, &mut scan, out);
                scan.walk(reader, doclens, out);
            }
            Err(err) => scan.fail(out, format_args!("Failed to open table: {err}")),
        }
        tracing::debug!(
            table = request.name,
            backend = %self.backend,
            errors = scan.errors,
            "table checked"
        );
        finish(out, scan.errors);
        scan.errors
    }

    fn inspect_header(
        &self,
        header: &TableHeader,
        revision: Option<&mut RevisionContext>,
        scan: &mut TableScan,
        out: &mut Output<'_>,
    ) {
        if scan.options.contains(CheckOptions::SHOW_STATS) {
            check_log!(out, "Revision: {}", header.revision);
            check_log!(out, "Declared entries: {}", header.entry_count);
        }
        if header.format != TABLE_FORMAT_VERSION {
            scan.fail(
                out,
                format_args!(
                    "Table format {} not supported (expected {TABLE_FORMAT_VERSION})",
                    header.format
                ),
            );
        }
        if header.backend() != Some(self.backend) {
            scan.fail(
                out,
                format_args!(
                    "Table belongs to a different backend (tag {:#04x})",
                    header.backend_tag
                ),
            );
        }
        scan.declared = Some(header.entry_count);

        let Some(context) = revision else {
            return;
        };
        match (self.policy, context.trusted) {
            (RevisionPolicy::Exact, None) => {
                context.trusted = Some(header.revision);
                tracing::debug!(revision = header.revision, "adopted table revision");
            }
            (RevisionPolicy::Exact, Some(trusted)) if header.revision != trusted => {
                revision_mismatch(scan, out, header.revision, trusted, "doesn't match");
            }
            (RevisionPolicy::NotNewer, Some(trusted)) if header.revision > trusted => {
                revision_mismatch(scan, out, header.revision, trusted, "is newer than");
            }
            _ => {}
        }
    }
}

fn revision_mismatch(
    scan: &mut TableScan,
    out: &mut Output<'_>,
    found: Revision,
    trusted: Revision,
    relation: &str,
) {
    scan.fail(
        out,
        format_args!("Revision {found} {relation} the database revision {trusted}"),
    );
}

/// Closing line for a table, followed by a blank line.
pub(crate) fn finish(out: &mut Output<'_>, errors: usize) {
    match errors {
        0 => check_log!(out, "No errors found"),
        1 => check_log!(out, "1 error found"),
        n => check_log!(out, "{n} errors found"),
    }
    check_log!(out);
}

#[derive(Debug, Default)]
struct PostlistTally {
    metainfo: Option<(DocId, u64)>,
    total_length: u64,
    terms: usize,
    doclen_ids: Vec<DocId>,
}

struct TableScan {
    role: TableRole,
    options: CheckOptions,
    last_docid: DocId,
    errors: usize,
    entries: u64,
    declared: Option<u64>,
    previous_key: Option<Vec<u8>>,
    postlist: PostlistTally,
}

impl TableScan {
    fn new(role: TableRole, options: CheckOptions, last_docid: DocId) -> Self {
        Self {
            role,
            options,
            last_docid,
            errors: 0,
            entries: 0,
            declared: None,
            previous_key: None,
            postlist: PostlistTally::default(),
        }
    }

    fn fail(&mut self, out: &mut Output<'_>, message: std::fmt::Arguments<'_>) {
        self.errors += 1;
        check_log!(out, "{message}");
    }

    fn walk(&mut self, mut reader: TableReader, doclens: &mut DocLens, out: &mut Output<'_>) {
        let mut framing_intact = true;
        loop {
            match reader.next_entry() {
                Ok(Some(entry)) => self.inspect_entry(&entry, doclens, out),
                Ok(None) => break,
                Err(err) => {
                    self.fail(out, format_args!("{err}"));
                    framing_intact = false;
                    break;
                }
            }
        }

        if framing_intact {
            let found = self.entries;
            if let Some(declared) = self.declared {
                if declared != found {
                    self.fail(
                        out,
                        format_args!("Header declares {declared} entries but {found} were found"),
                    );
                }
            }
        }

        match self.role {
            TableRole::TermList if doclens.is_active() => doclens.mark_populated(),
            TableRole::PostList => self.finish_postlist(doclens, out),
            _ => {}
        }

        if self.options.contains(CheckOptions::SHORT_TREE) {
            self.summarise(doclens, out);
        }
    }

    fn inspect_entry(&mut self, entry: &RawEntry, doclens: &mut DocLens, out: &mut Output<'_>) {
        self.entries += 1;
        if !entry.digest_ok {
            self.fail(
                out,
                format_args!("Entry at offset {}: checksum mismatch", entry.offset),
            );
            return;
        }
        if entry.key.is_empty() {
            self.fail(out, format_args!("Entry at offset {}: empty key", entry.offset));
            return;
        }
        if let Some(previous) = self.previous_key.replace(entry.key.clone()) {
            if entry.key <= previous {
                self.fail(
                    out,
                    format_args!(
                        "Entry at offset {}: key {} not after {}",
                        entry.offset,
                        entry.key.escape_ascii(),
                        previous.escape_ascii()
                    ),
                );
            }
        }
        if self.options.contains(CheckOptions::FULL_TREE) {
            check_log!(
                out,
                "  {} ({} bytes)",
                entry.key.escape_ascii(),
                entry.value.len()
            );
        }

        let outcome = match self.role {
            TableRole::Documents => self.inspect_document(&entry.key),
            TableRole::TermList => self.inspect_termlist(entry, doclens),
            TableRole::PostList => self.inspect_postlist(entry, doclens, out),
            TableRole::Position => self.inspect_position(entry),
            TableRole::Synonym => decode_synonyms(&entry.value).map(|_| ()),
            TableRole::Spelling | TableRole::Other => Ok(()),
        };
        if let Err(Malformed(reason)) = outcome {
            self.fail(
                out,
                format_args!("Entry {}: {reason}", entry.key.escape_ascii()),
            );
        }
    }

    fn docid_in_range(&self, did: DocId) -> Result<DocId, Malformed> {
        if did == 0 {
            Err(Malformed("document id 0 is invalid"))
        } else if did > self.last_docid {
            Err(Malformed("document id beyond the last document id"))
        } else {
            Ok(did)
        }
    }

    fn inspect_document(&self, key: &[u8]) -> Result<(), Malformed> {
        self.docid_in_range(decode_docid(key)?).map(|_| ())
    }

    fn inspect_termlist(&self, entry: &RawEntry, doclens: &mut DocLens) -> Result<(), Malformed> {
        let did = self.docid_in_range(decode_docid(&entry.key)?)?;
        let list = TermList::decode(&entry.value)?;
        // A decodable length is still usable by the postlist cross-check.
        doclens.record(did, list.doclen);
        let mut previous: Option<&[u8]> = None;
        let mut wdf_sum = 0u64;
        for (term, wdf) in &list.terms {
            if previous.is_some_and(|p| term.as_slice() <= p) {
                return Err(Malformed("terms not in ascending order"));
            }
            previous = Some(term.as_slice());
            wdf_sum += u64::from(*wdf);
        }
        if wdf_sum != u64::from(list.doclen) {
            return Err(Malformed("document length differs from the sum of wdfs"));
        }
        Ok(())
    }

    fn inspect_postlist(
        &mut self,
        entry: &RawEntry,
        doclens: &DocLens,
        out: &mut Output<'_>,
    ) -> Result<(), Malformed> {
        match PostlistKey::classify(&entry.key) {
            PostlistKey::Metainfo => {
                let (last, total) = decode_metainfo(&entry.value)?;
                self.postlist.metainfo = Some((last, total));
                if self.last_docid != UNKNOWN_LAST_DOCID && last != self.last_docid {
                    return Err(Malformed("metainfo last document id disagrees with the database"));
                }
                Ok(())
            }
            PostlistKey::DocLen(did) => {
                let did = self.docid_in_range(did)?;
                let len = decode_doclen(&entry.value)?;
                self.postlist.total_length += u64::from(len);
                self.postlist.doclen_ids.push(did);
                if doclens.is_active() && doclens.is_populated() {
                    match doclens.get(did) {
                        None => self.fail(
                            out,
                            format_args!(
                                "Document {did} has a length in the postlist but no termlist entry"
                            ),
                        ),
                        Some(expected) if expected != len => self.fail(
                            out,
                            format_args!(
                                "Document {did} length {len} in the postlist, {expected} in the termlist"
                            ),
                        ),
                        Some(_) => {}
                    }
                }
                Ok(())
            }
            PostlistKey::Term(_) => {
                self.postlist.terms += 1;
                let postings = decode_postings(&entry.value)?;
                if postings.is_empty() {
                    return Err(Malformed("empty posting list"));
                }
                let mut previous = 0;
                for (did, wdf) in postings {
                    self.docid_in_range(did)?;
                    if did <= previous {
                        return Err(Malformed("postings not in ascending document order"));
                    }
                    if wdf == 0 {
                        return Err(Malformed("posting with zero wdf"));
                    }
                    previous = did;
                }
                // Postings wdf is not compared with termlist wdf: that needs
                // a full inversion of one table.
                Ok(())
            }
            PostlistKey::Invalid => Err(Malformed("unrecognised postlist key")),
        }
    }

    fn inspect_position(&self, entry: &RawEntry) -> Result<(), Malformed> {
        let (did, _term) = split_position_key(&entry.key)?;
        self.docid_in_range(did)?;
        let positions = decode_positions(&entry.value)?;
        if positions.windows(2).any(|pair| pair[1] <= pair[0]) {
            return Err(Malformed("positions not strictly ascending"));
        }
        Ok(())
    }

    fn finish_postlist(&mut self, doclens: &DocLens, out: &mut Output<'_>) {
        if let Some((_, total)) = self.postlist.metainfo {
            let summed = self.postlist.total_length;
            if total != summed {
                self.fail(
                    out,
                    format_args!(
                        "Total document length {total} in metainfo, {summed} summed from document lengths"
                    ),
                );
            }
        } else if self.entries > 0 {
            self.fail(out, format_args!("No metainfo entry"));
        }

        if let Some(reason) = doclens.skip_reason() {
            check_log!(out, "Document lengths not cross-checked ({})", reason.tag());
            return;
        }
        if !doclens.is_active() || !doclens.is_populated() {
            return;
        }
        let mut seen = std::mem::take(&mut self.postlist.doclen_ids);
        seen.sort_unstable();
        seen.dedup();
        let missing: Vec<DocId> = doclens
            .iter()
            .map(|(did, _)| did)
            .filter(|did| seen.binary_search(did).is_err())
            .collect();
        for did in missing {
            self.fail(
                out,
                format_args!("Document {did} is in the termlist but has no length in the postlist"),
            );
        }
    }

    fn summarise(&self, doclens: &DocLens, out: &mut Output<'_>) {
        check_log!(out, "{} entries", self.entries);
        match self.role {
            TableRole::TermList if doclens.is_active() => {
                check_log!(out, "{} document lengths recorded", doclens.recorded());
            }
            TableRole::PostList => {
                check_log!(
                    out,
                    "{} terms, {} document lengths",
                    self.postlist.terms,
                    self.postlist.doclen_ids.len()
                );
            }
            _ => {}
        }
    }
}
