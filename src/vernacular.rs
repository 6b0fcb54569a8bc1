use std::path::Path;

use tracing::{info, warn};

use crate::errors::Error;
use crate::index::loading::LoadingIndex;
use crate::index::vernacular::VernacularIndexWriter;
use crate::utils::new_spinner_totals;


/// Common name files are tab delimited with six columns:
/// taxon id, lsid, scientific name, vernacular name, language, country.
/// The last two are carried by the source but unused here.
const COLUMNS: usize = 6;

#[derive(Debug, Clone, Default)]
pub struct JoinStats {
    pub matched: usize,
    pub unmatched: usize,
    pub skipped: usize,
}

/// Join a common names file against the loading index and write the hits
/// into the vernacular sub-index. Rows whose identifier is unknown to the
/// loading index are counted and discarded.
pub fn join(path: &Path, loading: &LoadingIndex, dir: &Path) -> Result<JoinStats, Error> {
    let mut writer = VernacularIndexWriter::create(dir)?;
    let mut stats = JoinStats::default();

    let mut rows = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .quote(b'"')
        .escape(Some(b'\\'))
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let bar = new_spinner_totals("Common names joined");

    for (number, row) in rows.records().enumerate() {
        let record = match row {
            Ok(record) => record,
            Err(err) => {
                warn!(?err, "Skipping unreadable vernacular row");
                stats.skipped += 1;
                continue;
            }
        };

        if record.len() != COLUMNS {
            warn!(row = number + 1, columns = record.len(), "Skipping malformed vernacular row");
            stats.skipped += 1;
            continue;
        }

        let taxon_id = record.get(0).unwrap_or_default().trim();
        let lsid = record.get(1).unwrap_or_default().trim();
        let scientific_name = record.get(2).unwrap_or_default().trim();
        let vernacular_name = record.get(3).unwrap_or_default().trim();

        let identifier = if lsid.is_empty() { taxon_id } else { lsid };
        match loading.lookup(identifier)? {
            Some(concept) => {
                writer.add(vernacular_name, scientific_name, &concept.lsid)?;
                stats.matched += 1;
                bar.inc(1);
            }
            None => stats.unmatched += 1,
        }
    }

    writer.close()?;
    bar.finish();
    info!(
        matched = stats.matched,
        unmatched = stats.unmatched,
        skipped = stats.skipped,
        "Common name join finished"
    );

    Ok(stats)
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::loading;
    use crate::index::vernacular::VernacularIndexReader;
    use crate::taxa::Concept;

    fn species(id: &str, lsid: &str, name: &str) -> Concept {
        Concept {
            id: id.to_string(),
            lsid: lsid.to_string(),
            scientific_name: name.to_string(),
            rank: "species".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn only_rows_matching_a_loaded_concept_are_indexed() {
        let dir = tempfile::tempdir().unwrap();
        let tmp = dir.path().join("loading");
        let sub = dir.path().join("vernacular");

        loading::build(&tmp, vec![Ok(species("s1", "S1", "Felis catus"))].into_iter()).unwrap();
        let loading = loading::LoadingIndex::open(&tmp).unwrap();

        let csv = dir.path().join("common.txt");
        std::fs::write(
            &csv,
            "s1\tS1\tFelis catus\tdomestic cat\ten\tAU\n\
             x9\tUNKNOWN\tGhost\tghost cat\ten\tAU\n\
             too\tfew\tcolumns\n",
        )
        .unwrap();

        let stats = join(&csv, &loading, &sub).unwrap();
        assert_eq!(stats.matched, 1);
        assert_eq!(stats.unmatched, 1);
        assert_eq!(stats.skipped, 1);

        let reader = VernacularIndexReader::open(&sub).unwrap();
        assert_eq!(reader.total(), 1);

        let hits = reader.find("domestic cat").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].vernacular_name, "domestic cat");
        assert_eq!(hits[0].scientific_name, "Felis catus");
        assert_eq!(hits[0].lsid, "S1");

        // vernacular matching is case sensitive
        assert!(reader.find("Domestic Cat").unwrap().is_empty());
    }

    #[test]
    fn a_blank_lsid_falls_back_to_the_taxon_id() {
        let dir = tempfile::tempdir().unwrap();
        let tmp = dir.path().join("loading");
        let sub = dir.path().join("vernacular");

        loading::build(&tmp, vec![Ok(species("t1", "", "Vombatus ursinus"))].into_iter()).unwrap();
        let loading = loading::LoadingIndex::open(&tmp).unwrap();

        let csv = dir.path().join("common.txt");
        std::fs::write(&csv, "t1\t\tVombatus ursinus\tcommon wombat\ten\tAU\n").unwrap();

        let stats = join(&csv, &loading, &sub).unwrap();
        assert_eq!(stats.matched, 1);

        let hits = VernacularIndexReader::open(&sub).unwrap().find("common wombat").unwrap();
        assert_eq!(hits[0].lsid, "t1");
    }
}
