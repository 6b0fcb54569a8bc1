use std::path::Path;

use tantivy::schema::{Field, Schema, Value, STORED, STRING};
use tantivy::{doc, Index, IndexWriter, ReloadPolicy, TantivyDocument};
use tracing::info;

use super::{commit_and_merge, term_query_all, WRITER_MEMORY};
use crate::errors::Error;


/// Common name matching at query time is string equality, so the vernacular
/// sub-index stays on the raw, case-sensitive tokenizer.
#[derive(Debug, Clone)]
pub struct VernacularFields {
    pub vernacular_name: Field,
    pub scientific_name: Field,
    pub lsid: Field,
}

impl VernacularFields {
    fn from_schema(schema: &Schema) -> Result<VernacularFields, Error> {
        Ok(VernacularFields {
            vernacular_name: schema.get_field("vernacular_name")?,
            scientific_name: schema.get_field("scientific_name")?,
            lsid: schema.get_field("lsid")?,
        })
    }
}

fn build_schema() -> Schema {
    let mut builder = Schema::builder();

    builder.add_text_field("vernacular_name", STRING | STORED);
    builder.add_text_field("scientific_name", STORED);
    builder.add_text_field("lsid", STRING | STORED);

    builder.build()
}


pub struct VernacularIndexWriter {
    index: Index,
    writer: IndexWriter,
    fields: VernacularFields,
    written: usize,
}

impl VernacularIndexWriter {
    pub fn create(dir: &Path) -> Result<VernacularIndexWriter, Error> {
        std::fs::create_dir_all(dir)?;

        let index = Index::create_in_dir(dir, build_schema())?;
        let fields = VernacularFields::from_schema(&index.schema())?;
        let writer: IndexWriter = index.writer(WRITER_MEMORY)?;

        Ok(VernacularIndexWriter {
            index,
            writer,
            fields,
            written: 0,
        })
    }

    pub fn add(&mut self, vernacular_name: &str, scientific_name: &str, lsid: &str) -> Result<(), Error> {
        self.writer.add_document(doc!(
            self.fields.vernacular_name => vernacular_name,
            self.fields.scientific_name => scientific_name,
            self.fields.lsid => lsid,
        ))?;
        self.written += 1;
        Ok(())
    }

    pub fn close(self) -> Result<(), Error> {
        let VernacularIndexWriter { index, writer, written, .. } = self;

        commit_and_merge(&index, writer)?;
        info!(written, "Vernacular index committed");
        Ok(())
    }
}


#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VernacularHit {
    pub vernacular_name: String,
    pub scientific_name: String,
    pub lsid: String,
}

/// Read side of the committed vernacular sub-index. Lookups are exact and
/// case sensitive.
pub struct VernacularIndexReader {
    searcher: tantivy::Searcher,
    fields: VernacularFields,
}

impl VernacularIndexReader {
    pub fn open(dir: &Path) -> Result<VernacularIndexReader, Error> {
        let index = Index::open_in_dir(dir)?;
        let fields = VernacularFields::from_schema(&index.schema())?;
        let reader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into()?;

        Ok(VernacularIndexReader {
            searcher: reader.searcher(),
            fields,
        })
    }

    pub fn find(&self, vernacular_name: &str) -> Result<Vec<VernacularHit>, Error> {
        let documents = term_query_all(&self.searcher, self.fields.vernacular_name, vernacular_name)?;
        Ok(documents.iter().map(|document| self.hit(document)).collect())
    }

    pub fn total(&self) -> u64 {
        self.searcher.num_docs()
    }

    fn hit(&self, document: &TantivyDocument) -> VernacularHit {
        let text = |field| {
            document
                .get_first(field)
                .and_then(|value| value.as_str())
                .unwrap_or_default()
                .to_string()
        };

        VernacularHit {
            vernacular_name: text(self.fields.vernacular_name),
            scientific_name: text(self.fields.scientific_name),
            lsid: text(self.fields.lsid),
        }
    }
}
