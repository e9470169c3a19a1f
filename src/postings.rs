//! Postings lists built on integer streams.
//!
//! A segment is stored in three files:
//!
//! - `<segment>.doc`: doc id deltas of every term, one stream
//! - `<segment>.frq`: term frequencies, one value per doc id
//! - `<segment>.tim`: term metadata, including the start mark of each term
//!   in both streams
//!
//! Start marks are serialized relative to the previous term's, so terms
//! whose postings share a block cost a single byte per stream.

use std::io::{Read, Write};
use std::sync::Arc;

use ahash::AHashMap;
use log::debug;

use crate::codec::factory::IntStreamFactory;
use crate::codec::index::{BlockPosition, IndexEncoding, IndexEntryWriter};
use crate::codec::{IntStreamReader, IntStreamWriter};
use crate::error::{BlockpostError, Result};
use crate::storage::Storage;
use crate::util::varint;

/// A single posting in a posting list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Posting {
    /// Document ID.
    pub doc_id: u32,
    /// Term frequency in the document.
    pub frequency: u32,
}

impl Posting {
    pub fn new(doc_id: u32, frequency: u32) -> Self {
        Posting { doc_id, frequency }
    }
}

/// Where a term's postings live and how many there are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TermMeta {
    /// Number of documents containing the term.
    pub doc_freq: u32,
    /// Sum of the term's frequencies.
    pub total_freq: u64,
    /// Start of the term's doc id deltas.
    pub doc_start: BlockPosition,
    /// Start of the term's frequencies.
    pub freq_start: BlockPosition,
}

fn doc_file(segment: &str) -> String {
    format!("{segment}.doc")
}

fn freq_file(segment: &str) -> String {
    format!("{segment}.frq")
}

fn terms_file(segment: &str) -> String {
    format!("{segment}.tim")
}

/// Term being written.
#[derive(Debug)]
struct OpenTerm {
    term: String,
    meta: TermMeta,
    last_doc: Option<u32>,
}

/// Writes the postings of one segment, term by term in sorted order.
///
/// # Example
///
/// ```
/// use blockpost::codec::config::CodecConfig;
/// use blockpost::codec::factory::IntStreamFactory;
/// use blockpost::postings::{Posting, PostingsReader, PostingsWriter};
/// use blockpost::storage::memory::MemoryStorage;
/// use std::sync::Arc;
///
/// # fn main() -> blockpost::error::Result<()> {
/// let storage = Arc::new(MemoryStorage::new_default());
/// let factory = IntStreamFactory::new(CodecConfig::default())?;
///
/// let mut writer = PostingsWriter::create(storage.clone(), factory.clone(), "seg0")?;
/// writer.add_term("apple", &[Posting::new(1, 2), Posting::new(4, 1)])?;
/// writer.add_term("banana", &[Posting::new(4, 3)])?;
/// writer.close()?;
///
/// let reader = PostingsReader::open(storage, factory, "seg0")?;
/// let postings = reader.read_postings("apple")?;
/// assert_eq!(postings, vec![Posting::new(1, 2), Posting::new(4, 1)]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct PostingsWriter {
    storage: Arc<dyn Storage>,
    segment: String,
    docs: Box<dyn IntStreamWriter>,
    freqs: Box<dyn IntStreamWriter>,
    current: Option<OpenTerm>,
    terms: Vec<(String, TermMeta)>,
    closed: bool,
}

impl PostingsWriter {
    /// Create the doc and frequency streams of `segment`.
    pub fn create(
        storage: Arc<dyn Storage>,
        factory: IntStreamFactory,
        segment: &str,
    ) -> Result<Self> {
        let docs = factory.create_output(storage.as_ref(), &doc_file(segment))?;
        let freqs = factory.create_output(storage.as_ref(), &freq_file(segment))?;

        Ok(PostingsWriter {
            storage,
            segment: segment.to_string(),
            docs,
            freqs,
            current: None,
            terms: Vec::new(),
            closed: false,
        })
    }

    /// Begin the postings of `term`, which must sort after every earlier term.
    pub fn start_term(&mut self, term: &str) -> Result<()> {
        if self.closed {
            return Err(BlockpostError::storage("postings writer is closed"));
        }
        self.finish_term()?;

        if let Some((last, _)) = self.terms.last()
            && term <= last.as_str()
        {
            return Err(BlockpostError::invalid_argument(format!(
                "term {term:?} does not sort after {last:?}"
            )));
        }

        self.current = Some(OpenTerm {
            term: term.to_string(),
            meta: TermMeta {
                doc_freq: 0,
                total_freq: 0,
                doc_start: self.docs.mark()?,
                freq_start: self.freqs.mark()?,
            },
            last_doc: None,
        });
        Ok(())
    }

    /// Add a document to the current term. Doc ids must increase.
    pub fn add_doc(&mut self, doc_id: u32, frequency: u32) -> Result<()> {
        let open = self
            .current
            .as_mut()
            .ok_or_else(|| BlockpostError::invalid_argument("add_doc called without a term"))?;

        let delta = match open.last_doc {
            None => doc_id,
            Some(last) if doc_id > last => doc_id - last,
            Some(last) => {
                return Err(BlockpostError::invalid_argument(format!(
                    "doc id {doc_id} does not follow {last} in term {:?}",
                    open.term
                )));
            }
        };
        if frequency == 0 {
            return Err(BlockpostError::invalid_argument(format!(
                "zero frequency for doc {doc_id} in term {:?}",
                open.term
            )));
        }

        self.docs.write(delta)?;
        self.freqs.write(frequency)?;

        open.last_doc = Some(doc_id);
        open.meta.doc_freq += 1;
        open.meta.total_freq += frequency as u64;
        Ok(())
    }

    /// Write a whole posting list for `term`.
    pub fn add_term(&mut self, term: &str, postings: &[Posting]) -> Result<()> {
        self.start_term(term)?;
        for posting in postings {
            self.add_doc(posting.doc_id, posting.frequency)?;
        }
        self.finish_term()
    }

    /// Record the current term. Terms without documents are dropped.
    pub fn finish_term(&mut self) -> Result<()> {
        if let Some(open) = self.current.take()
            && open.meta.doc_freq > 0
        {
            self.terms.push((open.term, open.meta));
        }
        Ok(())
    }

    /// Number of terms recorded so far.
    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    /// Close both streams and write the term metadata file.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.finish_term()?;
        self.closed = true;

        let docs = self.docs.close();
        let freqs = self.freqs.close();
        docs.and(freqs)?;

        let mut bytes = Vec::new();
        write_terms(&mut bytes, &self.terms)?;

        let mut out = self.storage.create_output(&terms_file(&self.segment))?;
        let written = out.write_all(&bytes).map_err(BlockpostError::from);
        let released = out.close();
        written.and(released)?;

        debug!(
            "wrote segment {}: {} terms, {} postings",
            self.segment,
            self.terms.len(),
            self.docs.values_written()
        );
        Ok(())
    }
}

fn write_terms(out: &mut Vec<u8>, terms: &[(String, TermMeta)]) -> Result<()> {
    let mut doc_index = IndexEntryWriter::new();
    let mut freq_index = IndexEntryWriter::new();

    varint::write_u64(out, terms.len() as u64)?;
    for (term, meta) in terms {
        varint::write_u32(out, term.len() as u32)?;
        out.write_all(term.as_bytes())?;
        varint::write_u32(out, meta.doc_freq)?;
        varint::write_u64(out, meta.total_freq)?;
        doc_index.write_and_promote(out, meta.doc_start, IndexEncoding::Relative)?;
        freq_index.write_and_promote(out, meta.freq_start, IndexEncoding::Relative)?;
    }
    Ok(())
}

/// Reads the postings of one segment.
#[derive(Debug)]
pub struct PostingsReader {
    docs: Box<dyn IntStreamReader>,
    freqs: Box<dyn IntStreamReader>,
    terms: Vec<String>,
    metas: AHashMap<String, TermMeta>,
}

impl PostingsReader {
    /// Open the streams and load the term metadata of `segment`.
    pub fn open(storage: Arc<dyn Storage>, factory: IntStreamFactory, segment: &str) -> Result<Self> {
        let docs = factory.open_input(storage.as_ref(), &doc_file(segment))?;
        let freqs = factory.open_input(storage.as_ref(), &freq_file(segment))?;

        let mut input = storage.open_input(&terms_file(segment))?;
        let mut bytes = Vec::new();
        input.read_to_end(&mut bytes)?;
        input.close()?;

        let mut doc_index = docs.index_reader();
        let mut freq_index = freqs.index_reader();
        let mut source = bytes.as_slice();

        let count = varint::read_u64(&mut source).map_err(BlockpostError::truncated)?;
        let mut terms = Vec::new();
        let mut metas = AHashMap::new();
        for _ in 0..count {
            let term = read_term(&mut source)?;
            let doc_freq = varint::read_u32(&mut source).map_err(BlockpostError::truncated)?;
            let total_freq = varint::read_u64(&mut source).map_err(BlockpostError::truncated)?;
            let doc_start = doc_index
                .read(&mut source, IndexEncoding::Relative)
                .map_err(BlockpostError::truncated)?;
            let freq_start = freq_index
                .read(&mut source, IndexEncoding::Relative)
                .map_err(BlockpostError::truncated)?;

            metas.insert(
                term.clone(),
                TermMeta {
                    doc_freq,
                    total_freq,
                    doc_start,
                    freq_start,
                },
            );
            terms.push(term);
        }

        debug!("opened segment {segment}: {} terms", terms.len());
        Ok(PostingsReader {
            docs,
            freqs,
            terms,
            metas,
        })
    }

    /// Terms in sorted order.
    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().map(String::as_str)
    }

    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    pub fn term_meta(&self, term: &str) -> Option<&TermMeta> {
        self.metas.get(term)
    }

    /// Iterate the postings of `term`, or `None` for an unknown term.
    ///
    /// Each iterator owns its own stream cursors, so several may be open at
    /// once.
    pub fn postings(&self, term: &str) -> Result<Option<PostingsIterator>> {
        let Some(meta) = self.metas.get(term) else {
            return Ok(None);
        };

        let mut docs = self.docs.clone_reader()?;
        let mut freqs = self.freqs.clone_reader()?;
        docs.seek(meta.doc_start)?;
        freqs.seek(meta.freq_start)?;

        Ok(Some(PostingsIterator {
            docs,
            freqs,
            remaining: meta.doc_freq,
            last_doc: 0,
        }))
    }

    /// Collect the postings of `term`; empty for an unknown term.
    pub fn read_postings(&self, term: &str) -> Result<Vec<Posting>> {
        match self.postings(term)? {
            Some(iter) => iter.collect(),
            None => Ok(Vec::new()),
        }
    }

    pub fn close(&mut self) -> Result<()> {
        let docs = self.docs.close();
        let freqs = self.freqs.close();
        docs.and(freqs)
    }
}

fn read_term(source: &mut &[u8]) -> Result<String> {
    let len = varint::read_u32(source).map_err(BlockpostError::truncated)? as usize;
    if len > source.len() {
        return Err(BlockpostError::corruption(format!(
            "term of {len} bytes exceeds remaining {} bytes",
            source.len()
        )));
    }
    let data: &[u8] = source;
    let (bytes, rest) = data.split_at(len);
    *source = rest;
    String::from_utf8(bytes.to_vec())
        .map_err(|e| BlockpostError::corruption(format!("term is not UTF-8: {e}")))
}

/// Iterator over the postings of one term.
#[derive(Debug)]
pub struct PostingsIterator {
    docs: Box<dyn IntStreamReader>,
    freqs: Box<dyn IntStreamReader>,
    remaining: u32,
    last_doc: u32,
}

impl PostingsIterator {
    /// Postings not yet returned.
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    fn next_posting(&mut self) -> Result<Posting> {
        let delta = self.docs.next()?;
        let frequency = self.freqs.next()?;
        self.last_doc = self.last_doc.checked_add(delta).ok_or_else(|| {
            BlockpostError::corruption(format!(
                "doc id overflow: {} + {delta}",
                self.last_doc
            ))
        })?;
        self.remaining -= 1;
        Ok(Posting::new(self.last_doc, frequency))
    }
}

impl Iterator for PostingsIterator {
    type Item = Result<Posting>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let posting = self.next_posting();
        if posting.is_err() {
            self.remaining = 0;
        }
        Some(posting)
    }
}
