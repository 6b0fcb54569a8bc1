pub mod loading;
pub mod search;
pub mod vernacular;

use tantivy::collector::TopDocs;
use tantivy::query::TermQuery;
use tantivy::schema::{Field, IndexRecordOption, TextFieldIndexing, TextOptions};
use tantivy::tokenizer::{LowerCaser, RawTokenizer, TextAnalyzer};
use tantivy::{Index, IndexWriter, Searcher, TantivyDocument, Term};

use crate::errors::Error;


/// Tokenizer registered on indexes that match whole terms case
/// insensitively. The default tokenizers either split on whitespace or
/// preserve case, neither of which suits identifier-style name lookups.
pub const LOWERCASE_TERM: &str = "lowercase_term";

/// Page size for term queries that enumerate result sets. Queries loop with
/// an offset rather than truncating at the page bound, so a taxon with more
/// direct children than one page still walks completely.
pub const PAGE_SIZE: usize = 25_000;

/// Heap given to every index writer before it spills a segment.
pub const WRITER_MEMORY: usize = 256_000_000;


pub fn register_lowercase_term(index: &Index) {
    index.tokenizers().register(
        LOWERCASE_TERM,
        TextAnalyzer::builder(RawTokenizer::default()).filter(LowerCaser).build(),
    );
}

/// Field options for an exact-match, case-insensitive, stored field.
pub fn lowercase_term_options() -> TextOptions {
    TextOptions::default()
        .set_indexing_options(
            TextFieldIndexing::default()
                .set_tokenizer(LOWERCASE_TERM)
                .set_index_option(IndexRecordOption::Basic),
        )
        .set_stored()
}


/// Commit the writer, collapse the index down to a single segment and block
/// until the merge threads are done. Every index in the pipeline is written
/// once and read many times, so the merge cost is paid here rather than at
/// query time.
pub fn commit_and_merge(index: &Index, mut writer: IndexWriter) -> Result<(), Error> {
    writer.commit()?;

    let segments = index.searchable_segment_ids()?;
    if segments.len() > 1 {
        writer.merge(&segments).wait()?;
    }

    writer.wait_merging_threads()?;
    Ok(())
}


/// All documents matching an exact term, paging past the result bound.
/// Hits come back in document order so reruns enumerate identically.
pub fn term_query_all(searcher: &Searcher, field: Field, value: &str) -> Result<Vec<TantivyDocument>, Error> {
    let query = TermQuery::new(Term::from_field_text(field, value), IndexRecordOption::Basic);

    let mut addresses = Vec::new();
    let mut offset = 0;
    loop {
        let page = searcher.search(&query, &TopDocs::with_limit(PAGE_SIZE).and_offset(offset))?;
        let full = page.len() == PAGE_SIZE;
        addresses.extend(page.into_iter().map(|(_score, address)| address));

        if !full {
            break;
        }
        offset += PAGE_SIZE;
    }

    addresses.sort();

    let mut documents = Vec::with_capacity(addresses.len());
    for address in addresses {
        documents.push(searcher.doc::<TantivyDocument>(address)?);
    }
    Ok(documents)
}


/// The first document matching an exact term, if any.
pub fn term_query_first(searcher: &Searcher, field: Field, value: &str) -> Result<Option<TantivyDocument>, Error> {
    let query = TermQuery::new(Term::from_field_text(field, value), IndexRecordOption::Basic);
    let hits = searcher.search(&query, &TopDocs::with_limit(1))?;

    match hits.first() {
        Some((_score, address)) => Ok(Some(searcher.doc::<TantivyDocument>(*address)?)),
        None => Ok(None),
    }
}
