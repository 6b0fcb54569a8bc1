use std::path::Path;

use tantivy::schema::{Field, NumericOptions, Schema, Value, STORED, STRING};
use tantivy::{doc, Index, IndexWriter, ReloadPolicy, Searcher, TantivyDocument};
use tracing::{info, warn};

use super::{commit_and_merge, term_query_all, term_query_first, WRITER_MEMORY};
use crate::errors::{ConfigError, Error};
use crate::taxa::{str_to_taxon_rank, Concept, UNRANKED_SORT_ORDER};
use crate::utils::new_spinner_totals;


/// Field handles into the loading index schema. Identifiers are exact-match
/// terms under the raw, case-sensitive tokenizer; name parts are stored for
/// retrieval only.
#[derive(Debug, Clone)]
pub struct LoadingFields {
    pub id: Field,
    pub lsid: Field,
    pub parent_id: Field,
    pub accepted_id: Field,
    pub name: Field,
    pub author: Field,
    pub genus: Field,
    pub specific: Field,
    pub infraspecific: Field,
    pub rank: Field,
    pub rank_id: Field,
    pub is_synonym: Field,
    pub root: Field,
}

impl LoadingFields {
    fn from_schema(schema: &Schema) -> Result<LoadingFields, Error> {
        Ok(LoadingFields {
            id: schema.get_field("id")?,
            lsid: schema.get_field("lsid")?,
            parent_id: schema.get_field("parent_id")?,
            accepted_id: schema.get_field("accepted_id")?,
            name: schema.get_field("name")?,
            author: schema.get_field("author")?,
            genus: schema.get_field("genus")?,
            specific: schema.get_field("specific")?,
            infraspecific: schema.get_field("infraspecific")?,
            rank: schema.get_field("rank")?,
            rank_id: schema.get_field("rank_id")?,
            is_synonym: schema.get_field("is_synonym")?,
            root: schema.get_field("root")?,
        })
    }
}

fn build_schema() -> Schema {
    let mut builder = Schema::builder();

    builder.add_text_field("id", STRING | STORED);
    builder.add_text_field("lsid", STRING | STORED);
    builder.add_text_field("parent_id", STRING | STORED);
    builder.add_text_field("accepted_id", STRING | STORED);
    builder.add_text_field("name", STORED);
    builder.add_text_field("author", STORED);
    builder.add_text_field("genus", STORED);
    builder.add_text_field("specific", STORED);
    builder.add_text_field("infraspecific", STORED);
    builder.add_text_field("rank", STRING | STORED);
    builder.add_i64_field("rank_id", NumericOptions::default().set_indexed().set_stored());
    builder.add_text_field("is_synonym", STRING | STORED);
    // only present on root concepts. absence implies non-root
    builder.add_text_field("root", STRING);

    builder.build()
}


/// Build the loading index at the given directory from a stream of
/// concepts. The directory is recreated wholesale; a rerun replaces any
/// previous loading index. Row errors are logged and skipped, a directory
/// that cannot be written fails the run.
pub fn build<I>(dir: &Path, concepts: I) -> Result<usize, Error>
where
    I: Iterator<Item = Result<Concept, Error>>,
{
    if dir.exists() {
        std::fs::remove_dir_all(dir)?;
    }
    std::fs::create_dir_all(dir)?;

    let index = Index::create_in_dir(dir, build_schema())?;
    let fields = LoadingFields::from_schema(&index.schema())?;
    let mut writer: IndexWriter = index.writer(WRITER_MEMORY)?;

    let bar = new_spinner_totals("Concepts loaded");
    let mut total = 0;

    for concept in concepts {
        let concept = match concept {
            Ok(concept) => concept,
            Err(err) => {
                warn!(?err, "Skipping unreadable concept row");
                continue;
            }
        };

        let lsid = concept.lsid_or_id().to_string();
        let (rank, rank_id) = match str_to_taxon_rank(&concept.rank) {
            Ok(rank) => (rank.to_string(), rank.sort_order()),
            Err(_) => (concept.rank.clone(), UNRANKED_SORT_ORDER),
        };

        let mut document = doc!(
            fields.id => concept.id.as_str(),
            fields.lsid => lsid.as_str(),
            fields.parent_id => concept.parent_id.as_str(),
            fields.accepted_id => concept.accepted_id.as_str(),
            fields.name => concept.scientific_name.as_str(),
            fields.author => concept.authorship.as_str(),
            fields.genus => concept.genus.as_str(),
            fields.specific => concept.specific_epithet.as_str(),
            fields.infraspecific => concept.infraspecific_epithet.as_str(),
            fields.rank => rank.as_str(),
            fields.rank_id => rank_id,
            fields.is_synonym => if concept.is_synonym() { "T" } else { "F" },
        );
        if concept.is_root() {
            document.add_text(fields.root, "T");
        }

        writer.add_document(document)?;
        bar.inc(1);
        total += 1;
    }

    commit_and_merge(&index, writer)?;
    bar.finish();
    info!(total, dir = %dir.display(), "Loading index committed");

    Ok(total)
}


/// A concept read back out of the loading index during the hierarchy walk.
#[derive(Debug, Clone, Default)]
pub struct LoadedConcept {
    pub id: String,
    pub lsid: String,
    pub parent_id: String,
    pub accepted_id: String,
    pub name: String,
    pub author: String,
    pub rank: String,
    pub rank_id: i64,
    pub is_synonym: bool,
}

impl LoadedConcept {
    fn from_document(document: &TantivyDocument, fields: &LoadingFields) -> LoadedConcept {
        let text = |field| {
            document
                .get_first(field)
                .and_then(|value| value.as_str())
                .unwrap_or_default()
                .to_string()
        };

        LoadedConcept {
            id: text(fields.id),
            lsid: text(fields.lsid),
            parent_id: text(fields.parent_id),
            accepted_id: text(fields.accepted_id),
            name: text(fields.name),
            author: text(fields.author),
            rank: text(fields.rank),
            rank_id: document
                .get_first(fields.rank_id)
                .and_then(|value| value.as_i64())
                .unwrap_or(UNRANKED_SORT_ORDER),
            is_synonym: text(fields.is_synonym) == "T",
        }
    }
}


/// Read side of the committed loading index.
pub struct LoadingIndex {
    searcher: Searcher,
    fields: LoadingFields,
}

impl LoadingIndex {
    pub fn open(dir: &Path) -> Result<LoadingIndex, Error> {
        if !dir.join("meta.json").exists() {
            return Err(ConfigError::MissingLoadingIndex(dir.to_path_buf()).into());
        }

        let index = Index::open_in_dir(dir)?;
        let fields = LoadingFields::from_schema(&index.schema())?;
        let reader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into()?;

        Ok(LoadingIndex {
            searcher: reader.searcher(),
            fields,
        })
    }

    /// All root concepts, in document order.
    pub fn roots(&self) -> Result<Vec<LoadedConcept>, Error> {
        let documents = term_query_all(&self.searcher, self.fields.root, "T")?;
        Ok(self.concepts(&documents))
    }

    /// The direct children of a concept, looked up by parent link.
    pub fn children_of(&self, parent: &str) -> Result<Vec<LoadedConcept>, Error> {
        if parent.is_empty() {
            return Ok(Vec::new());
        }
        let documents = term_query_all(&self.searcher, self.fields.parent_id, parent)?;
        Ok(self.concepts(&documents))
    }

    /// Find a concept by identifier, trying the lsid first and falling back
    /// to the row id.
    pub fn lookup(&self, identifier: &str) -> Result<Option<LoadedConcept>, Error> {
        if identifier.is_empty() {
            return Ok(None);
        }

        let document = match term_query_first(&self.searcher, self.fields.lsid, identifier)? {
            Some(document) => Some(document),
            None => term_query_first(&self.searcher, self.fields.id, identifier)?,
        };

        Ok(document.map(|document| LoadedConcept::from_document(&document, &self.fields)))
    }

    fn concepts(&self, documents: &[TantivyDocument]) -> Vec<LoadedConcept> {
        documents
            .iter()
            .map(|document| LoadedConcept::from_document(document, &self.fields))
            .collect()
    }
}
