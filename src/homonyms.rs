use std::path::Path;

use tantivy::schema::{Field, NumericOptions, Schema, STORED, STRING};
use tantivy::{doc, Index, IndexWriter};
use tracing::{info, warn};

use crate::archive::Archive;
use crate::errors::Error;
use crate::index::{commit_and_merge, lowercase_term_options, register_lowercase_term, WRITER_MEMORY};
use crate::names::Canonicalizer;
use crate::taxa::{str_to_taxon_rank, UNRANKED_SORT_ORDER};
use crate::utils::new_spinner_totals;


/// Cross-kingdom homonym checks at match time only need the name, its rank
/// and its identifier, so the IRMNG sub-index is a flat one-document-per
/// concept affair sharing the search index's case-insensitive analyzer.
#[derive(Debug, Clone)]
struct HomonymFields {
    name: Field,
    author: Field,
    rank: Field,
    rank_id: Field,
    lsid: Field,
}

fn build_schema() -> Schema {
    let mut builder = Schema::builder();

    builder.add_text_field("name", lowercase_term_options());
    builder.add_text_field("author", STORED);
    builder.add_text_field("rank", STRING | STORED);
    builder.add_i64_field("rank_id", NumericOptions::default().set_indexed().set_stored());
    builder.add_text_field("lsid", STRING | STORED);

    builder.build()
}

fn fields(schema: &Schema) -> Result<HomonymFields, Error> {
    Ok(HomonymFields {
        name: schema.get_field("name")?,
        author: schema.get_field("author")?,
        rank: schema.get_field("rank")?,
        rank_id: schema.get_field("rank_id")?,
        lsid: schema.get_field("lsid")?,
    })
}


/// Build the homonym sub-index from an IRMNG darwin core archive.
pub fn build(archive: &Archive, dir: &Path, names: &Canonicalizer) -> Result<usize, Error> {
    std::fs::create_dir_all(dir)?;

    let index = Index::create_in_dir(dir, build_schema())?;
    register_lowercase_term(&index);
    let fields = fields(&index.schema())?;
    let mut writer: IndexWriter = index.writer(WRITER_MEMORY)?;

    let bar = new_spinner_totals("Homonym concepts indexed");
    let mut total = 0;

    for concept in archive.concepts()? {
        let concept = match concept {
            Ok(concept) => concept,
            Err(err) => {
                warn!(?err, "Skipping unreadable homonym row");
                continue;
            }
        };

        let (rank, rank_id) = match str_to_taxon_rank(&concept.rank) {
            Ok(rank) => (rank.to_string(), rank.sort_order()),
            Err(_) => (concept.rank.clone(), UNRANKED_SORT_ORDER),
        };

        writer.add_document(doc!(
            fields.name => names.canonical(&concept.scientific_name).as_str(),
            fields.author => concept.authorship.as_str(),
            fields.rank => rank.as_str(),
            fields.rank_id => rank_id,
            fields.lsid => concept.lsid_or_id(),
        ))?;
        bar.inc(1);
        total += 1;
    }

    commit_and_merge(&index, writer)?;
    bar.finish();
    info!(total, dir = %dir.display(), "Homonym index committed");

    Ok(total)
}
