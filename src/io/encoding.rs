//! Key and value layouts for the content of each table role.
//!
//! Document ids in keys are big-endian so byte order matches numeric order;
//! everything inside values is little-endian.

use thiserror::Error;

use crate::types::{DocId, TermCount};

/// A value or key that does not follow its table's layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct Malformed(pub &'static str);

type Decoded<T> = std::result::Result<T, Malformed>;

#[must_use]
pub fn docid_key(did: DocId) -> [u8; 4] {
    did.to_be_bytes()
}

pub fn decode_docid(key: &[u8]) -> Decoded<DocId> {
    let raw: [u8; 4] = key
        .try_into()
        .map_err(|_| Malformed("document key is not four bytes"))?;
    Ok(DocId::from_be_bytes(raw))
}

/// Postlist key holding `[last_docid u32][total_length u64]`.
pub const POSTLIST_METAINFO_KEY: [u8; 2] = [0, 0];

#[must_use]
pub fn doclen_key(did: DocId) -> [u8; 5] {
    let mut key = [0u8; 5];
    key[1..].copy_from_slice(&did.to_be_bytes());
    key
}

/// What a postlist key refers to. Term keys never start with a zero byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostlistKey<'a> {
    Metainfo,
    DocLen(DocId),
    Term(&'a [u8]),
    Invalid,
}

impl<'a> PostlistKey<'a> {
    #[must_use]
    pub fn classify(key: &'a [u8]) -> Self {
        match key {
            [0, 0] => Self::Metainfo,
            [0, rest @ ..] => match decode_docid(rest) {
                Ok(did) => Self::DocLen(did),
                Err(_) => Self::Invalid,
            },
            [] => Self::Invalid,
            term => Self::Term(term),
        }
    }
}

#[must_use]
pub fn encode_metainfo(last_docid: DocId, total_length: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(12);
    out.extend_from_slice(&last_docid.to_le_bytes());
    out.extend_from_slice(&total_length.to_le_bytes());
    out
}

pub fn decode_metainfo(value: &[u8]) -> Decoded<(DocId, u64)> {
    if value.len() != 12 {
        return Err(Malformed("metainfo value is not twelve bytes"));
    }
    let mut cursor = Cursor::new(value);
    Ok((cursor.u32()?, cursor.u64()?))
}

#[must_use]
pub fn encode_doclen(len: TermCount) -> [u8; 4] {
    len.to_le_bytes()
}

pub fn decode_doclen(value: &[u8]) -> Decoded<TermCount> {
    let raw: [u8; 4] = value
        .try_into()
        .map_err(|_| Malformed("document length is not four bytes"))?;
    Ok(TermCount::from_le_bytes(raw))
}

/// Termlist value for one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TermList {
    pub doclen: TermCount,
    pub terms: Vec<(Vec<u8>, TermCount)>,
}

impl TermList {
    /// Build a termlist whose doclen is the sum of the wdfs.
    #[must_use]
    pub fn from_terms(terms: &[(&[u8], TermCount)]) -> Self {
        let doclen = terms.iter().map(|(_, wdf)| *wdf).sum();
        Self {
            doclen,
            terms: terms.iter().map(|(t, w)| (t.to_vec(), *w)).collect(),
        }
    }

    pub fn encode(&self) -> Decoded<Vec<u8>> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.doclen.to_le_bytes());
        for (term, wdf) in &self.terms {
            let len = u8::try_from(term.len()).map_err(|_| Malformed("term longer than 255 bytes"))?;
            out.push(len);
            out.extend_from_slice(term);
            out.extend_from_slice(&wdf.to_le_bytes());
        }
        Ok(out)
    }

    pub fn decode(value: &[u8]) -> Decoded<Self> {
        let mut cursor = Cursor::new(value);
        let doclen = cursor.u32()?;
        let mut terms = Vec::new();
        while !cursor.is_empty() {
            let term = cursor.short_bytes()?;
            if term.is_empty() {
                return Err(Malformed("empty term in termlist"));
            }
            terms.push((term.to_vec(), cursor.u32()?));
        }
        Ok(Self { doclen, terms })
    }
}

#[must_use]
pub fn encode_postings(postings: &[(DocId, TermCount)]) -> Vec<u8> {
    let mut out = Vec::with_capacity(postings.len() * 8);
    for (did, wdf) in postings {
        out.extend_from_slice(&did.to_le_bytes());
        out.extend_from_slice(&wdf.to_le_bytes());
    }
    out
}

pub fn decode_postings(value: &[u8]) -> Decoded<Vec<(DocId, TermCount)>> {
    if value.len() % 8 != 0 {
        return Err(Malformed("posting list length is not a multiple of eight"));
    }
    let mut cursor = Cursor::new(value);
    let mut out = Vec::with_capacity(value.len() / 8);
    while !cursor.is_empty() {
        out.push((cursor.u32()?, cursor.u32()?));
    }
    Ok(out)
}

#[must_use]
pub fn position_key(did: DocId, term: &[u8]) -> Vec<u8> {
    let mut key = did.to_be_bytes().to_vec();
    key.extend_from_slice(term);
    key
}

pub fn split_position_key(key: &[u8]) -> Decoded<(DocId, &[u8])> {
    if key.len() <= 4 {
        return Err(Malformed("position key lacks a term"));
    }
    let (did, term) = key.split_at(4);
    Ok((decode_docid(did)?, term))
}

#[must_use]
pub fn encode_positions(positions: &[u32]) -> Vec<u8> {
    positions.iter().flat_map(|p| p.to_le_bytes()).collect()
}

pub fn decode_positions(value: &[u8]) -> Decoded<Vec<u32>> {
    if value.is_empty() || value.len() % 4 != 0 {
        return Err(Malformed("position list length is not a non-zero multiple of four"));
    }
    let mut cursor = Cursor::new(value);
    let mut out = Vec::with_capacity(value.len() / 4);
    while !cursor.is_empty() {
        out.push(cursor.u32()?);
    }
    Ok(out)
}

pub fn encode_synonyms(synonyms: &[&[u8]]) -> Decoded<Vec<u8>> {
    let mut out = Vec::new();
    for synonym in synonyms {
        let len = u8::try_from(synonym.len()).map_err(|_| Malformed("synonym longer than 255 bytes"))?;
        out.push(len);
        out.extend_from_slice(synonym);
    }
    Ok(out)
}

pub fn decode_synonyms(value: &[u8]) -> Decoded<Vec<&[u8]>> {
    let mut cursor = Cursor::new(value);
    let mut out = Vec::new();
    while !cursor.is_empty() {
        let synonym = cursor.short_bytes()?;
        if synonym.is_empty() {
            return Err(Malformed("empty synonym"));
        }
        out.push(synonym);
    }
    if out.is_empty() {
        return Err(Malformed("synonym entry has no synonyms"));
    }
    Ok(out)
}

struct Cursor<'a> {
    rest: &'a [u8],
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { rest: bytes }
    }

    fn is_empty(&self) -> bool {
        self.rest.is_empty()
    }

    fn take(&mut self, n: usize) -> Decoded<&'a [u8]> {
        if self.rest.len() < n {
            return Err(Malformed("value truncated"));
        }
        let (head, tail) = self.rest.split_at(n);
        self.rest = tail;
        Ok(head)
    }

    fn u32(&mut self) -> Decoded<u32> {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(raw))
    }

    fn u64(&mut self) -> Decoded<u64> {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(raw))
    }

    fn short_bytes(&mut self) -> Decoded<&'a [u8]> {
        let len = self.take(1)?[0];
        self.take(usize::from(len))
    }
}
