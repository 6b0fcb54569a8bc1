mod archive;
mod errors;
mod homonyms;
mod index;
mod names;
mod taxa;
mod utils;
mod vernacular;
mod walker;

use std::path::PathBuf;

use clap::{Args, Parser};
use tracing::{info, warn};
use tracing_subscriber::fmt::format::FmtSpan;

use crate::archive::Archive;
use crate::errors::{ConfigError, Error};
use crate::index::loading::LoadingIndex;
use crate::index::search::{SearchIndexWriter, SynonymDocument};
use crate::names::Canonicalizer;
use crate::walker::HierarchyWalker;


/// The taxonomic name indexer
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    paths: PathArgs,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Build the loading index from the darwin core archive
    Load,

    /// Build the search indexes from an existing loading index
    Search,

    /// Build the loading index and then the search indexes
    All,

    /// Query the built search index for a name and print the hits
    TestSearch { name: String },
}

#[derive(Args)]
struct PathArgs {
    /// The darwin core archive directory with the concepts to index
    #[arg(long)]
    dwca: Option<PathBuf>,

    /// An IRMNG darwin core archive, enables the homonym sub-index
    #[arg(long)]
    irmng: Option<PathBuf>,

    /// A tab delimited common names file, enables the vernacular sub-index
    #[arg(long)]
    common: Option<PathBuf>,

    /// The directory the search indexes are written to
    #[arg(long)]
    target: Option<PathBuf>,

    /// The directory holding the temporary loading index
    #[arg(long)]
    tmp: Option<PathBuf>,
}

impl PathArgs {
    fn dwca(&self) -> Result<&PathBuf, Error> {
        self.dwca.as_ref().ok_or(ConfigError::MissingArchive.into())
    }

    fn target(&self) -> PathBuf {
        self.target.clone().unwrap_or_else(|| path_from_env("NAME_INDEXER_TARGET", "name-index"))
    }

    fn tmp(&self) -> PathBuf {
        self.tmp.clone().unwrap_or_else(|| path_from_env("NAME_INDEXER_TMP", "loading-index"))
    }
}

fn path_from_env(var: &str, fallback: &str) -> PathBuf {
    std::env::var(var).map(PathBuf::from).unwrap_or_else(|_| PathBuf::from(fallback))
}


fn main() -> Result<(), Error> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::fmt()
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_level(false)
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::All) {
        Commands::Load => {
            run_load(&cli.paths)?;
        }
        Commands::Search => {
            run_search(&cli.paths)?;
        }
        Commands::All => {
            run_load(&cli.paths)?;
            run_search(&cli.paths)?;
        }
        Commands::TestSearch { name } => {
            let target = cli.paths.target();
            let hits = index::search::test_search(&target.join("cb"), &name)?;
            if hits.is_empty() {
                println!("no hits for '{name}'");
            }
            for hit in hits {
                println!("{hit}");
            }
        }
    }

    Ok(())
}


/// The load phase: stream the archive into the loading index.
fn run_load(paths: &PathArgs) -> Result<(), Error> {
    let dwca = paths.dwca()?;
    let tmp = paths.tmp();

    let archive = Archive::new(dwca.clone());
    index::loading::build(&tmp, archive.concepts()?)?;

    Ok(())
}

/// The search phase: walk the hierarchy out of the loading index, append
/// the synonyms, then join in the optional common name and homonym inputs.
fn run_search(paths: &PathArgs) -> Result<(), Error> {
    let dwca = paths.dwca()?;
    let tmp = paths.tmp();
    let target = paths.target();

    let loading = LoadingIndex::open(&tmp)?;
    utils::backup_and_recreate(&target).map_err(|_| ConfigError::UnwritableTarget(target.clone()))?;

    let names = Canonicalizer::new();
    let mut writer = SearchIndexWriter::create(&target.join("cb"))?;

    let walker = HierarchyWalker::new(&loading, &names);
    let taxa = walker.walk(&mut writer)?;
    info!(taxa, "Hierarchy walk finished");

    write_synonyms(&Archive::new(dwca.clone()), &loading, &names, &mut writer)?;
    info!(synonyms = writer.synonyms_written(), "Synonym phase finished");
    writer.close()?;

    if let Some(common) = &paths.common {
        vernacular::join(common, &loading, &target.join("vernacular"))?;
    }

    if let Some(irmng) = &paths.irmng {
        homonyms::build(&Archive::new(irmng.clone()), &target.join("irmng"), &names)?;
    }

    Ok(())
}

/// Re-stream the archive and emit a document for every synonym. The loading
/// index does not carry the taxonomic status, so this reads the source rows
/// rather than the loading documents.
fn write_synonyms(
    archive: &Archive,
    loading: &LoadingIndex,
    names: &Canonicalizer,
    writer: &mut SearchIndexWriter,
) -> Result<(), Error> {
    let bar = utils::new_spinner_totals("Synonyms written");

    for concept in archive.concepts()? {
        let concept = match concept {
            Ok(concept) => concept,
            Err(err) => {
                warn!(?err, "Skipping unreadable concept row");
                continue;
            }
        };

        if concept.is_accepted() {
            continue;
        }

        // resolve the accepted link to a stable lsid where the loading
        // index knows it. unreferenced synonyms keep the raw link
        let accepted_lsid = match loading.lookup(&concept.accepted_id)? {
            Some(accepted) => accepted.lsid,
            None => concept.accepted_id.clone(),
        };

        writer.add_synonym(SynonymDocument {
            canonical_name: names.canonical(&concept.scientific_name),
            author: concept.authorship.clone(),
            id: concept.id.clone(),
            lsid: concept.lsid_or_id().to_string(),
            accepted_id: concept.accepted_id.clone(),
            accepted_lsid,
            status: concept.taxonomic_status.clone(),
        })?;
        bar.inc(1);
    }

    bar.finish();
    Ok(())
}


#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::index::search::{SearchIndexReader, DOC_TYPE_SYNONYM, DOC_TYPE_TAXON};
    use crate::index::vernacular::VernacularIndexReader;

    static META: &str = r#"<archive xmlns="http://rs.tdwg.org/dwc/text/">
  <core encoding="UTF-8" fieldsTerminatedBy="\t" ignoreHeaderLines="0" rowType="http://rs.tdwg.org/dwc/terms/Taxon">
    <files>
      <location>taxa.txt</location>
    </files>
    <id index="0"/>
    <field index="1" term="http://rs.tdwg.org/dwc/terms/taxonID"/>
    <field index="2" term="http://rs.tdwg.org/dwc/terms/parentNameUsageID"/>
    <field index="3" term="http://rs.tdwg.org/dwc/terms/acceptedNameUsageID"/>
    <field index="4" term="http://rs.tdwg.org/dwc/terms/scientificName"/>
    <field index="5" term="http://rs.tdwg.org/dwc/terms/scientificNameAuthorship"/>
    <field index="6" term="http://rs.tdwg.org/dwc/terms/taxonRank"/>
    <field index="7" term="http://rs.tdwg.org/dwc/terms/taxonomicStatus"/>
  </core>
</archive>
"#;

    static ROWS: &str = "k1\tK1\t\t\tAnimalia\t\tkingdom\taccepted\n\
        g1\tG1\tk1\t\tFelis\t\tgenus\taccepted\n\
        s1\tS1\tg1\t\tFelis catus Linnaeus, 1758\tLinnaeus, 1758\tspecies\taccepted\n\
        s2\tS2\t\tS1\tFelis silvestris catus\t\tspecies\tsynonym\n";

    fn write_inputs(dir: &Path) -> PathArgs {
        let dwca = dir.join("dwca");
        std::fs::create_dir_all(&dwca).unwrap();
        std::fs::write(dwca.join("meta.xml"), META).unwrap();
        std::fs::write(dwca.join("taxa.txt"), ROWS).unwrap();

        let common = dir.join("common.txt");
        std::fs::write(
            &common,
            "s1\tS1\tFelis catus\tdomestic cat\ten\tAU\n\
             x9\tUNKNOWN\tGhost\tghost cat\ten\tAU\n",
        )
        .unwrap();

        PathArgs {
            dwca: Some(dwca),
            irmng: None,
            common: Some(common),
            target: Some(dir.join("target")),
            tmp: Some(dir.join("tmp")),
        }
    }

    #[test]
    fn the_full_pipeline_builds_all_indexes() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_inputs(dir.path());

        run_load(&paths).unwrap();
        run_search(&paths).unwrap();

        let target = paths.target();
        let reader = SearchIndexReader::open(&target.join("cb")).unwrap();

        let taxa = reader.all(DOC_TYPE_TAXON).unwrap();
        assert_eq!(taxa.len(), 3);

        let species = taxa.iter().find(|hit| hit.id == "s1").unwrap();
        assert_eq!(species.name, "Felis catus");
        assert_eq!(species.author, "Linnaeus, 1758");
        assert_eq!(species.rank_id, 7000);
        assert_eq!((species.left, species.right), (3, 4));
        assert_eq!(species.classification.kingdom.as_ref().unwrap().name, "Animalia");

        let synonyms = reader.all(DOC_TYPE_SYNONYM).unwrap();
        assert_eq!(synonyms.len(), 1);
        assert_eq!(synonyms[0].name, "Felis silvestris catus");
        assert_eq!(synonyms[0].lsid, "S2");
        assert_eq!(synonyms[0].accepted_id, "S1");
        assert_eq!(synonyms[0].accepted_lsid, "S1");
        assert_eq!(synonyms[0].status, "synonym");

        let vernacular = VernacularIndexReader::open(&target.join("vernacular")).unwrap();
        assert_eq!(vernacular.total(), 1);
        assert_eq!(vernacular.find("domestic cat").unwrap()[0].lsid, "S1");
    }

    #[test]
    fn name_queries_are_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_inputs(dir.path());

        run_load(&paths).unwrap();
        run_search(&paths).unwrap();

        let hits = index::search::test_search(&paths.target().join("cb"), "FELIS CATUS").unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].starts_with("taxon: Felis catus"));
    }

    #[test]
    fn a_rebuild_moves_the_previous_target_aside() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_inputs(dir.path());

        run_load(&paths).unwrap();
        run_search(&paths).unwrap();
        run_search(&paths).unwrap();

        let backups = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().starts_with("target_"))
            .count();
        assert_eq!(backups, 1);
    }

    #[test]
    fn searching_without_a_loading_index_fails_clearly() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_inputs(dir.path());

        let err = run_search(&paths).unwrap_err();
        assert!(matches!(
            err,
            Error::Configuration(ConfigError::MissingLoadingIndex(_))
        ));
    }
}
