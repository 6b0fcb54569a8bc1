use std::path::Path;

use tantivy::schema::{Field, NumericOptions, Schema, Value, STORED, STRING};
use tantivy::{doc, Index, IndexWriter, ReloadPolicy, TantivyDocument};
use tracing::info;

use super::{
    commit_and_merge,
    lowercase_term_options,
    register_lowercase_term,
    term_query_all,
    WRITER_MEMORY,
};
use crate::errors::Error;
use crate::taxa::{Classification, RankedName};


/// Discriminator terms separating accepted concepts from synonyms within
/// the one index.
pub const DOC_TYPE_TAXON: &str = "taxon";
pub const DOC_TYPE_SYNONYM: &str = "synonym";


#[derive(Debug, Clone)]
pub struct SearchFields {
    pub doc_type: Field,
    pub name: Field,
    pub id: Field,
    pub lsid: Field,
    pub author: Field,
    pub rank: Field,
    pub rank_id: Field,
    pub left: Field,
    pub right: Field,

    pub kingdom: Field,
    pub kingdom_lsid: Field,
    pub phylum: Field,
    pub phylum_lsid: Field,
    pub class: Field,
    pub class_lsid: Field,
    pub order: Field,
    pub order_lsid: Field,
    pub family: Field,
    pub family_lsid: Field,
    pub genus: Field,
    pub genus_lsid: Field,
    pub species: Field,
    pub species_lsid: Field,

    pub accepted_id: Field,
    pub accepted_lsid: Field,
    pub status: Field,
}

impl SearchFields {
    fn from_schema(schema: &Schema) -> Result<SearchFields, Error> {
        Ok(SearchFields {
            doc_type: schema.get_field("doc_type")?,
            name: schema.get_field("name")?,
            id: schema.get_field("id")?,
            lsid: schema.get_field("lsid")?,
            author: schema.get_field("author")?,
            rank: schema.get_field("rank")?,
            rank_id: schema.get_field("rank_id")?,
            left: schema.get_field("left")?,
            right: schema.get_field("right")?,
            kingdom: schema.get_field("kingdom")?,
            kingdom_lsid: schema.get_field("kingdom_lsid")?,
            phylum: schema.get_field("phylum")?,
            phylum_lsid: schema.get_field("phylum_lsid")?,
            class: schema.get_field("class")?,
            class_lsid: schema.get_field("class_lsid")?,
            order: schema.get_field("order")?,
            order_lsid: schema.get_field("order_lsid")?,
            family: schema.get_field("family")?,
            family_lsid: schema.get_field("family_lsid")?,
            genus: schema.get_field("genus")?,
            genus_lsid: schema.get_field("genus_lsid")?,
            species: schema.get_field("species")?,
            species_lsid: schema.get_field("species_lsid")?,
            accepted_id: schema.get_field("accepted_id")?,
            accepted_lsid: schema.get_field("accepted_lsid")?,
            status: schema.get_field("status")?,
        })
    }
}

fn build_schema() -> Schema {
    let mut builder = Schema::builder();
    let numeric = NumericOptions::default().set_indexed().set_stored();

    builder.add_text_field("doc_type", STRING | STORED);
    builder.add_text_field("name", lowercase_term_options());
    builder.add_text_field("id", STRING | STORED);
    builder.add_text_field("lsid", STRING | STORED);
    builder.add_text_field("author", STORED);
    builder.add_text_field("rank", STRING | STORED);
    builder.add_i64_field("rank_id", numeric.clone());
    builder.add_i64_field("left", numeric.clone());
    builder.add_i64_field("right", numeric);

    for slot in ["kingdom", "phylum", "class", "order", "family", "genus", "species"] {
        builder.add_text_field(slot, lowercase_term_options());
        builder.add_text_field(&format!("{slot}_lsid"), STRING | STORED);
    }

    builder.add_text_field("accepted_id", STRING | STORED);
    builder.add_text_field("accepted_lsid", STRING | STORED);
    builder.add_text_field("status", STRING | STORED);

    builder.build()
}


/// An accepted concept enriched by the hierarchy walk.
#[derive(Debug, Clone, Default)]
pub struct TaxonDocument {
    pub canonical_name: String,
    pub id: String,
    pub lsid: String,
    pub author: String,
    pub rank: String,
    pub rank_id: i64,
    pub left: i64,
    pub right: i64,
    pub classification: Classification,
}

/// A synonym pointing at its accepted concept. Consumers resolve the
/// classification by following the accepted identifier at query time.
#[derive(Debug, Clone, Default)]
pub struct SynonymDocument {
    pub canonical_name: String,
    pub author: String,
    pub id: String,
    pub lsid: String,
    pub accepted_id: String,
    pub accepted_lsid: String,
    pub status: String,
}


/// Write side of the search index. Created against a fresh directory,
/// closed once both the walk and the synonym phase are done.
pub struct SearchIndexWriter {
    index: Index,
    writer: IndexWriter,
    fields: SearchFields,
    taxa: usize,
    synonyms: usize,
}

impl SearchIndexWriter {
    pub fn create(dir: &Path) -> Result<SearchIndexWriter, Error> {
        std::fs::create_dir_all(dir)?;

        let index = Index::create_in_dir(dir, build_schema())?;
        register_lowercase_term(&index);
        let fields = SearchFields::from_schema(&index.schema())?;
        let writer: IndexWriter = index.writer(WRITER_MEMORY)?;

        Ok(SearchIndexWriter {
            index,
            writer,
            fields,
            taxa: 0,
            synonyms: 0,
        })
    }

    pub fn add_taxon(&mut self, taxon: TaxonDocument) -> Result<(), Error> {
        let fields = &self.fields;

        let mut document = doc!(
            fields.doc_type => DOC_TYPE_TAXON,
            fields.name => taxon.canonical_name.as_str(),
            fields.id => taxon.id.as_str(),
            fields.lsid => taxon.lsid.as_str(),
            fields.author => taxon.author.as_str(),
            fields.rank => taxon.rank.as_str(),
            fields.rank_id => taxon.rank_id,
            fields.left => taxon.left,
            fields.right => taxon.right,
        );

        let mut slot = |name: Field, lsid: Field, entry: &Option<RankedName>| {
            if let Some(entry) = entry {
                document.add_text(name, &entry.name);
                document.add_text(lsid, &entry.lsid);
            }
        };
        slot(fields.kingdom, fields.kingdom_lsid, &taxon.classification.kingdom);
        slot(fields.phylum, fields.phylum_lsid, &taxon.classification.phylum);
        slot(fields.class, fields.class_lsid, &taxon.classification.class);
        slot(fields.order, fields.order_lsid, &taxon.classification.order);
        slot(fields.family, fields.family_lsid, &taxon.classification.family);
        slot(fields.genus, fields.genus_lsid, &taxon.classification.genus);
        slot(fields.species, fields.species_lsid, &taxon.classification.species);

        self.writer.add_document(document)?;
        self.taxa += 1;
        Ok(())
    }

    pub fn add_synonym(&mut self, synonym: SynonymDocument) -> Result<(), Error> {
        let fields = &self.fields;

        let document = doc!(
            fields.doc_type => DOC_TYPE_SYNONYM,
            fields.name => synonym.canonical_name.as_str(),
            fields.author => synonym.author.as_str(),
            fields.id => synonym.id.as_str(),
            fields.lsid => synonym.lsid.as_str(),
            fields.accepted_id => synonym.accepted_id.as_str(),
            fields.accepted_lsid => synonym.accepted_lsid.as_str(),
            fields.status => synonym.status.as_str(),
        );

        self.writer.add_document(document)?;
        self.synonyms += 1;
        Ok(())
    }

    pub fn taxa_written(&self) -> usize {
        self.taxa
    }

    pub fn synonyms_written(&self) -> usize {
        self.synonyms
    }

    pub fn close(self) -> Result<(), Error> {
        let SearchIndexWriter {
            index,
            writer,
            taxa,
            synonyms,
            ..
        } = self;

        commit_and_merge(&index, writer)?;
        info!(taxa, synonyms, "Search index committed");
        Ok(())
    }
}


/// A search index document read back out, taxon and synonym fields
/// overlaid. Which half is meaningful follows from `doc_type`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchHit {
    pub doc_type: String,
    pub name: String,
    pub id: String,
    pub lsid: String,
    pub author: String,
    pub rank: String,
    pub rank_id: i64,
    pub left: i64,
    pub right: i64,
    pub classification: Classification,
    pub accepted_id: String,
    pub accepted_lsid: String,
    pub status: String,
}

impl SearchHit {
    fn from_document(document: &TantivyDocument, fields: &SearchFields) -> SearchHit {
        let text = |field| {
            document
                .get_first(field)
                .and_then(|value| value.as_str())
                .unwrap_or_default()
                .to_string()
        };
        let number = |field| {
            document
                .get_first(field)
                .and_then(|value| value.as_i64())
                .unwrap_or_default()
        };
        let slot = |name, lsid| {
            document.get_first(name).and_then(|value| value.as_str()).map(|name| RankedName {
                name: name.to_string(),
                lsid: text(lsid),
            })
        };

        SearchHit {
            doc_type: text(fields.doc_type),
            name: text(fields.name),
            id: text(fields.id),
            lsid: text(fields.lsid),
            author: text(fields.author),
            rank: text(fields.rank),
            rank_id: number(fields.rank_id),
            left: number(fields.left),
            right: number(fields.right),
            classification: Classification {
                kingdom: slot(fields.kingdom, fields.kingdom_lsid),
                phylum: slot(fields.phylum, fields.phylum_lsid),
                class: slot(fields.class, fields.class_lsid),
                order: slot(fields.order, fields.order_lsid),
                family: slot(fields.family, fields.family_lsid),
                genus: slot(fields.genus, fields.genus_lsid),
                species: slot(fields.species, fields.species_lsid),
            },
            accepted_id: text(fields.accepted_id),
            accepted_lsid: text(fields.accepted_lsid),
            status: text(fields.status),
        }
    }
}


/// Read side of a committed search index.
pub struct SearchIndexReader {
    searcher: tantivy::Searcher,
    fields: SearchFields,
}

impl SearchIndexReader {
    pub fn open(dir: &Path) -> Result<SearchIndexReader, Error> {
        let index = Index::open_in_dir(dir)?;
        register_lowercase_term(&index);
        let fields = SearchFields::from_schema(&index.schema())?;
        let reader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into()?;

        Ok(SearchIndexReader {
            searcher: reader.searcher(),
            fields,
        })
    }

    /// Exact name lookup. The input is lowercased to match the analyzer.
    pub fn find_name(&self, name: &str) -> Result<Vec<SearchHit>, Error> {
        let documents = term_query_all(&self.searcher, self.fields.name, &name.to_lowercase())?;
        Ok(self.hits(&documents))
    }

    /// Every document of one type, in document order.
    pub fn all(&self, doc_type: &str) -> Result<Vec<SearchHit>, Error> {
        let documents = term_query_all(&self.searcher, self.fields.doc_type, doc_type)?;
        Ok(self.hits(&documents))
    }

    fn hits(&self, documents: &[TantivyDocument]) -> Vec<SearchHit> {
        documents
            .iter()
            .map(|document| SearchHit::from_document(document, &self.fields))
            .collect()
    }
}


/// Open a committed search index and run a single name query, returning a
/// printable line per hit.
pub fn test_search(dir: &Path, name: &str) -> Result<Vec<String>, Error> {
    let reader = SearchIndexReader::open(dir)?;

    let lines = reader
        .find_name(name)?
        .into_iter()
        .map(|hit| {
            if hit.doc_type == DOC_TYPE_SYNONYM {
                format!(
                    "synonym: {} [{}] status={} accepted={}",
                    hit.name, hit.lsid, hit.status, hit.accepted_lsid,
                )
            }
            else {
                format!(
                    "taxon: {} [{}] rank={} left={} right={}",
                    hit.name, hit.lsid, hit.rank, hit.left, hit.right,
                )
            }
        })
        .collect();

    Ok(lines)
}
