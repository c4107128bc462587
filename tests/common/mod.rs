#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use idxcheck::io::changes::{ChangesRecord, changes_file_name};
use idxcheck::io::encoding::{
    POSTLIST_METAINFO_KEY, TermList, doclen_key, docid_key, encode_doclen, encode_metainfo,
    encode_positions, encode_postings, encode_synonyms, position_key,
};
use idxcheck::io::table::TableBuilder;
use idxcheck::io::version::{ChertVersion, GlassVersion, GlassVersionRecord};
use idxcheck::{Backend, CheckOptions, Checker, DocId, Revision};

/// One document: `(term, wdf, positions)`.
pub struct Doc {
    pub did: DocId,
    pub terms: Vec<(&'static str, u32, Vec<u32>)>,
}

impl Doc {
    pub fn new(did: DocId, terms: &[(&'static str, u32, &[u32])]) -> Self {
        Self {
            did,
            terms: terms
                .iter()
                .map(|(term, wdf, positions)| (*term, *wdf, positions.to_vec()))
                .collect(),
        }
    }

    fn doclen(&self) -> u32 {
        self.terms.iter().map(|(_, wdf, _)| *wdf).sum()
    }
}

/// A small, internally consistent database.
pub struct DbFixture {
    pub revision: Revision,
    pub docs: Vec<Doc>,
    /// Write spelling and synonym tables too.
    pub optional_tables: bool,
}

impl DbFixture {
    pub fn sample() -> Self {
        Self {
            revision: 5,
            docs: vec![
                Doc::new(1, &[("brown", 1, &[2]), ("fox", 2, &[3, 9]), ("quick", 1, &[1])]),
                Doc::new(2, &[("dog", 1, &[4]), ("lazy", 1, &[3])]),
                Doc::new(4, &[("fox", 3, &[1, 5, 8])]),
            ],
            optional_tables: true,
        }
    }

    pub fn last_docid(&self) -> DocId {
        self.docs.iter().map(|doc| doc.did).max().unwrap_or(0)
    }

    /// Every table as `(name, builder)`, in no particular order.
    pub fn tables(&self, backend: Backend) -> Vec<(&'static str, TableBuilder)> {
        let documents = match backend {
            Backend::Chert => "record",
            Backend::Glass => "docdata",
        };
        let mut record = TableBuilder::new(backend, self.revision);
        let mut termlist = TableBuilder::new(backend, self.revision);
        let mut postlist = TableBuilder::new(backend, self.revision);
        let mut position = TableBuilder::new(backend, self.revision);
        let mut postings: BTreeMap<&str, Vec<(DocId, u32)>> = BTreeMap::new();

        let total: u64 = self.docs.iter().map(|doc| u64::from(doc.doclen())).sum();
        postlist.insert(
            POSTLIST_METAINFO_KEY.to_vec(),
            encode_metainfo(self.last_docid(), total),
        );
        for doc in &self.docs {
            record.insert(docid_key(doc.did).to_vec(), format!("doc {}", doc.did).into_bytes());
            let terms: Vec<(&[u8], u32)> = doc
                .terms
                .iter()
                .map(|(term, wdf, _)| (term.as_bytes(), *wdf))
                .collect();
            termlist.insert(
                docid_key(doc.did).to_vec(),
                TermList::from_terms(&terms).encode().expect("termlist"),
            );
            postlist.insert(doclen_key(doc.did).to_vec(), encode_doclen(doc.doclen()).to_vec());
            for (term, wdf, positions) in &doc.terms {
                postings.entry(*term).or_default().push((doc.did, *wdf));
                if !positions.is_empty() {
                    position.insert(position_key(doc.did, term.as_bytes()), encode_positions(positions));
                }
            }
        }
        for (term, list) in &postings {
            postlist.insert(term.as_bytes().to_vec(), encode_postings(list));
        }

        let mut tables = vec![
            (documents, record),
            ("termlist", termlist),
            ("postlist", postlist),
            ("position", position),
        ];
        if self.optional_tables {
            let mut spelling = TableBuilder::new(backend, self.revision);
            spelling.insert(b"Wfox".to_vec(), 2u32.to_le_bytes().to_vec());
            let mut synonym = TableBuilder::new(backend, self.revision);
            synonym.insert(
                b"quick".to_vec(),
                encode_synonyms(&[b"fast".as_slice(), b"rapid".as_slice()]).expect("synonyms"),
            );
            tables.push(("spelling", spelling));
            tables.push(("synonym", synonym));
        }
        tables
    }

    pub fn write_chert(&self, dir: &Path) {
        for (name, table) in self.tables(Backend::Chert) {
            table
                .write(&dir.join(format!("{name}.DB")))
                .expect("write chert table");
        }
        ChertVersion::new(dir).create().expect("iamchert");
    }

    /// Write a glass database with changes files for `retained` revisions.
    pub fn write_glass(&self, dir: &Path, retained: &[Revision]) {
        for (name, table) in self.tables(Backend::Glass) {
            table
                .write(&dir.join(format!("{name}.glass")))
                .expect("write glass table");
        }
        let doccount = self.docs.len() as u32;
        GlassVersion::new(dir)
            .write(&GlassVersionRecord::new(self.revision, self.last_docid(), doccount))
            .expect("iamglass");
        for revision in retained {
            ChangesRecord::new(*revision, &["postlist", "termlist"])
                .write(&dir.join(changes_file_name(*revision)))
                .expect("changes");
        }
    }
}

pub fn touch(path: &Path) {
    std::fs::write(path, b"").expect("touch");
}

/// Flip one byte of a file in place.
pub fn flip_byte(path: &Path, offset_from_end: usize) {
    let mut bytes = std::fs::read(path).expect("read");
    let index = bytes.len() - 1 - offset_from_end;
    bytes[index] ^= 0x5A;
    std::fs::write(path, bytes).expect("write");
}

/// Run `checker` with a sink and return the count and captured text.
pub fn run_captured(checker: &Checker, path: &Path, options: CheckOptions) -> (usize, String) {
    let mut buf = Vec::new();
    let errors = {
        let sink: &mut dyn Write = &mut buf;
        checker.check(path, options, Some(sink)).expect("check")
    };
    (errors, String::from_utf8(buf).expect("utf8 output"))
}
