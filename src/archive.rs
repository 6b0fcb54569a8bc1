use std::fs::File;
use std::path::PathBuf;

use serde::Deserialize;
use tracing::warn;

use crate::errors::{Error, ParseError};
use crate::taxa::Concept;


/// The archive descriptor, deserialized from `meta.xml`. Only the core table
/// matters here; extensions are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct Descriptor {
    pub core: Core,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Core {
    #[serde(rename = "@fieldsTerminatedBy", default)]
    pub fields_terminated_by: Option<String>,
    #[serde(rename = "@ignoreHeaderLines", default)]
    pub ignore_header_lines: Option<usize>,
    pub files: Files,
    pub id: Option<IdColumn>,
    #[serde(rename = "field", default)]
    pub fields: Vec<FieldColumn>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Files {
    pub location: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdColumn {
    #[serde(rename = "@index")]
    pub index: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FieldColumn {
    #[serde(rename = "@index", default)]
    pub index: Option<usize>,
    #[serde(rename = "@term")]
    pub term: String,
}

impl Core {
    /// The column delimiter, unescaping the `\t` form the descriptor uses
    /// for tab separated tables.
    pub fn delimiter(&self) -> u8 {
        match self.fields_terminated_by.as_deref() {
            Some("\\t") | Some("\t") => b'\t',
            Some(value) => value.bytes().next().unwrap_or(b','),
            None => b',',
        }
    }
}


/// The subset of darwin core terms the indexer reads, resolved to column
/// positions in the core table. Terms are matched by their local name so
/// both full URIs and bare names work.
#[derive(Debug, Clone, Default)]
struct ColumnMap {
    id: Option<usize>,
    taxon_id: Option<usize>,
    parent_id: Option<usize>,
    accepted_id: Option<usize>,
    scientific_name: Option<usize>,
    authorship: Option<usize>,
    genus: Option<usize>,
    specific_epithet: Option<usize>,
    infraspecific_epithet: Option<usize>,
    rank: Option<usize>,
    taxonomic_status: Option<usize>,
}

impl ColumnMap {
    fn from_core(core: &Core) -> ColumnMap {
        let mut columns = ColumnMap {
            id: core.id.as_ref().map(|id| id.index),
            ..Default::default()
        };

        for field in &core.fields {
            let Some(index) = field.index
            else {
                continue;
            };

            match local_name(&field.term) {
                "taxonID" => columns.taxon_id = Some(index),
                "parentNameUsageID" => columns.parent_id = Some(index),
                "acceptedNameUsageID" => columns.accepted_id = Some(index),
                "scientificName" => columns.scientific_name = Some(index),
                "scientificNameAuthorship" => columns.authorship = Some(index),
                "genus" => columns.genus = Some(index),
                "specificEpithet" => columns.specific_epithet = Some(index),
                "infraspecificEpithet" => columns.infraspecific_epithet = Some(index),
                "taxonRank" => columns.rank = Some(index),
                "taxonomicStatus" => columns.taxonomic_status = Some(index),
                _ => {}
            }
        }

        columns
    }

    /// The number of columns a row needs for every mapped term to resolve.
    fn width(&self) -> usize {
        [
            self.id,
            self.taxon_id,
            self.parent_id,
            self.accepted_id,
            self.scientific_name,
            self.authorship,
            self.genus,
            self.specific_epithet,
            self.infraspecific_epithet,
            self.rank,
            self.taxonomic_status,
        ]
        .iter()
        .flatten()
        .map(|index| index + 1)
        .max()
        .unwrap_or(0)
    }

    fn get(&self, record: &csv::StringRecord, index: Option<usize>) -> String {
        index
            .and_then(|index| record.get(index))
            .map(|value| value.trim().to_string())
            .unwrap_or_default()
    }

    fn concept(&self, record: &csv::StringRecord) -> Concept {
        Concept {
            id: self.get(record, self.id),
            lsid: self.get(record, self.taxon_id),
            parent_id: self.get(record, self.parent_id),
            accepted_id: self.get(record, self.accepted_id),
            scientific_name: self.get(record, self.scientific_name),
            authorship: self.get(record, self.authorship),
            genus: self.get(record, self.genus),
            specific_epithet: self.get(record, self.specific_epithet),
            infraspecific_epithet: self.get(record, self.infraspecific_epithet),
            rank: self.get(record, self.rank),
            taxonomic_status: self.get(record, self.taxonomic_status),
        }
    }
}

fn local_name(term: &str) -> &str {
    term.rsplit(['/', '#']).next().unwrap_or(term)
}


pub struct Archive {
    path: PathBuf,
}

impl Archive {
    pub fn new(path: PathBuf) -> Archive {
        Archive { path }
    }

    pub fn descriptor(&self) -> Result<Descriptor, Error> {
        let path = self.path.join("meta.xml");
        if !path.exists() {
            return Err(ParseError::FileNotFound("meta.xml".to_string()).into());
        }

        let xml = std::fs::read_to_string(&path)?;
        let descriptor = quick_xml::de::from_str(&xml).map_err(|err| Error::Parsing(ParseError::Xml(err)))?;
        Ok(descriptor)
    }

    /// Stream the concepts from the core table, lazily. Rows too short for
    /// the mapped columns are logged and skipped.
    pub fn concepts(&self) -> Result<ConceptReader, Error> {
        let descriptor = self.descriptor()?;
        let core = &descriptor.core;

        let path = self.path.join(&core.files.location);
        if !path.exists() {
            return Err(ParseError::FileNotFound(core.files.location.clone()).into());
        }

        let skip_rows = core.ignore_header_lines.unwrap_or(0);
        let mut rows = csv::ReaderBuilder::new()
            .delimiter(core.delimiter())
            .has_headers(false)
            .flexible(true)
            .from_path(&path)?
            .into_records();

        for _ in 0..skip_rows {
            rows.next();
        }

        let columns = ColumnMap::from_core(core);
        Ok(ConceptReader {
            rows,
            width: columns.width(),
            columns,
            row: skip_rows,
        })
    }
}


pub struct ConceptReader {
    rows: csv::StringRecordsIntoIter<File>,
    columns: ColumnMap,
    width: usize,
    row: usize,
}

impl Iterator for ConceptReader {
    type Item = Result<Concept, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let record = match self.rows.next()? {
                Ok(record) => record,
                Err(err) => return Some(Err(err.into())),
            };
            self.row += 1;

            if record.len() < self.width {
                warn!(row = self.row, columns = record.len(), "Skipping short row");
                continue;
            }

            return Some(Ok(self.columns.concept(&record)));
        }
    }
}
