use indicatif::ProgressBar;
use tracing::info;

use crate::errors::Error;
use crate::index::loading::{LoadedConcept, LoadingIndex};
use crate::index::search::{SearchIndexWriter, TaxonDocument};
use crate::names::Canonicalizer;
use crate::taxa::Classification;
use crate::utils::new_spinner_totals;


/// Walks the parent/child links in the loading index depth first, assigning
/// nested set intervals and accumulating the higher classification on the
/// way down. One enriched document per accepted concept lands in the search
/// index; anything unreachable from a root is left out.
pub struct HierarchyWalker<'a> {
    loading: &'a LoadingIndex,
    names: &'a Canonicalizer,
}

impl<'a> HierarchyWalker<'a> {
    pub fn new(loading: &'a LoadingIndex, names: &'a Canonicalizer) -> HierarchyWalker<'a> {
        HierarchyWalker { loading, names }
    }

    pub fn walk(&self, writer: &mut SearchIndexWriter) -> Result<usize, Error> {
        let roots = self.loading.roots()?;
        info!(roots = roots.len(), "Walking taxonomy from the roots");

        let bar = new_spinner_totals("Concepts walked");
        let mut right = 0;

        for root in &roots {
            let left = right + 1;
            right = self.visit(root, left, Classification::default(), writer, &bar)?;
        }

        bar.finish();
        Ok(writer.taxa_written())
    }

    /// Visit one concept with `left` already assigned. Children claim the
    /// numbers in between and the concept's own `right` lands one past its
    /// last descendant, so a leaf takes `(left, left + 1)`. Returns the
    /// `right` it consumed so the caller can continue the numbering.
    fn visit(
        &self,
        concept: &LoadedConcept,
        left: i64,
        mut classification: Classification,
        writer: &mut SearchIndexWriter,
        bar: &ProgressBar,
    ) -> Result<i64, Error> {
        let canonical = self.names.canonical(&concept.name);
        classification.set(concept.rank_id, &canonical, &concept.lsid);

        let mut children = self.loading.children_of(&concept.id)?;
        if children.is_empty() && concept.lsid != concept.id {
            // some archives link children by lsid rather than row id
            children = self.loading.children_of(&concept.lsid)?;
        }

        let mut cursor = left;
        for child in &children {
            if child.is_synonym {
                continue;
            }
            cursor = self.visit(child, cursor + 1, classification.clone(), writer, bar)?;
        }

        let right = cursor + 1;
        writer.add_taxon(TaxonDocument {
            canonical_name: canonical,
            id: concept.id.clone(),
            lsid: concept.lsid.clone(),
            author: concept.author.clone(),
            rank: concept.rank.clone(),
            rank_id: concept.rank_id,
            left,
            right,
            classification,
        })?;
        bar.inc(1);

        Ok(right)
    }
}


#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::Path;

    use super::*;
    use crate::index::loading;
    use crate::index::search::{SearchHit, SearchIndexReader, DOC_TYPE_TAXON};
    use crate::taxa::Concept;

    fn concept(id: &str, lsid: &str, parent: &str, name: &str, rank: &str) -> Concept {
        Concept {
            id: id.to_string(),
            lsid: lsid.to_string(),
            parent_id: parent.to_string(),
            scientific_name: name.to_string(),
            rank: rank.to_string(),
            ..Default::default()
        }
    }

    fn run_walk(dir: &Path, concepts: Vec<Concept>) -> SearchIndexReader {
        let tmp = dir.join("loading");
        let cb = dir.join("cb");

        loading::build(&tmp, concepts.into_iter().map(Ok)).unwrap();
        let loading = loading::LoadingIndex::open(&tmp).unwrap();
        let names = Canonicalizer::new();

        let mut writer = SearchIndexWriter::create(&cb).unwrap();
        HierarchyWalker::new(&loading, &names).walk(&mut writer).unwrap();
        writer.close().unwrap();

        SearchIndexReader::open(&cb).unwrap()
    }

    fn by_id(reader: &SearchIndexReader) -> HashMap<String, SearchHit> {
        reader
            .all(DOC_TYPE_TAXON)
            .unwrap()
            .into_iter()
            .map(|hit| (hit.id.clone(), hit))
            .collect()
    }

    fn minimal_tree() -> Vec<Concept> {
        vec![
            concept("k1", "K1", "", "Animalia", "kingdom"),
            concept("g1", "G1", "k1", "Felis", "genus"),
            concept("s1", "S1", "g1", "Felis catus", "species"),
        ]
    }

    #[test]
    fn a_minimal_tree_gets_properly_nested_intervals() {
        let dir = tempfile::tempdir().unwrap();
        let taxa = by_id(&run_walk(dir.path(), minimal_tree()));

        assert_eq!(taxa.len(), 3);
        assert_eq!((taxa["k1"].left, taxa["k1"].right), (1, 6));
        assert_eq!((taxa["g1"].left, taxa["g1"].right), (2, 5));
        assert_eq!((taxa["s1"].left, taxa["s1"].right), (3, 4));
    }

    #[test]
    fn classification_accumulates_down_to_the_species() {
        let dir = tempfile::tempdir().unwrap();
        let taxa = by_id(&run_walk(dir.path(), minimal_tree()));

        let species = &taxa["s1"].classification;
        assert_eq!(species.kingdom.as_ref().unwrap().name, "Animalia");
        assert_eq!(species.kingdom.as_ref().unwrap().lsid, "K1");
        assert_eq!(species.genus.as_ref().unwrap().name, "Felis");
        assert_eq!(species.genus.as_ref().unwrap().lsid, "G1");
        assert_eq!(species.species.as_ref().unwrap().name, "Felis catus");
        assert_eq!(species.species.as_ref().unwrap().lsid, "S1");
        assert!(species.phylum.is_none());

        // slots below a concept's own rank stay empty
        let genus = &taxa["g1"].classification;
        assert_eq!(genus.genus.as_ref().unwrap().name, "Felis");
        assert!(genus.species.is_none());
    }

    #[test]
    fn lsid_linked_children_walk_identically() {
        let dir = tempfile::tempdir().unwrap();
        let taxa = by_id(&run_walk(
            dir.path(),
            vec![
                concept("k1", "K1", "", "Animalia", "kingdom"),
                concept("g1", "G1", "K1", "Felis", "genus"),
                concept("s1", "S1", "G1", "Felis catus", "species"),
            ],
        ));

        assert_eq!(taxa.len(), 3);
        assert_eq!((taxa["k1"].left, taxa["k1"].right), (1, 6));
        assert_eq!((taxa["g1"].left, taxa["g1"].right), (2, 5));
        assert_eq!((taxa["s1"].left, taxa["s1"].right), (3, 4));
    }

    #[test]
    fn orphans_are_left_out_of_the_search_index() {
        let dir = tempfile::tempdir().unwrap();
        let mut concepts = minimal_tree();
        concepts.push(concept("o1", "O1", "missing", "Ghost", "genus"));

        let taxa = by_id(&run_walk(dir.path(), concepts));
        assert_eq!(taxa.len(), 3);
        assert!(!taxa.contains_key("o1"));
    }

    #[test]
    fn sibling_roots_get_disjoint_intervals() {
        let dir = tempfile::tempdir().unwrap();
        let taxa = by_id(&run_walk(
            dir.path(),
            vec![
                concept("k1", "K1", "", "Animalia", "kingdom"),
                concept("g1", "G1", "k1", "Felis", "genus"),
                concept("k2", "K2", "", "Plantae", "kingdom"),
                concept("g2", "G2", "k2", "Acacia", "genus"),
            ],
        ));

        assert_eq!(taxa.len(), 4);
        assert_eq!((taxa["k1"].left, taxa["k1"].right), (1, 4));
        assert_eq!((taxa["g1"].left, taxa["g1"].right), (2, 3));
        assert_eq!((taxa["k2"].left, taxa["k2"].right), (5, 8));
        assert_eq!((taxa["g2"].left, taxa["g2"].right), (6, 7));
    }

    #[test]
    fn intervals_nest_or_are_disjoint_never_overlap() {
        let dir = tempfile::tempdir().unwrap();
        let taxa = by_id(&run_walk(
            dir.path(),
            vec![
                concept("k1", "K1", "", "Animalia", "kingdom"),
                concept("f1", "F1", "k1", "Felidae", "family"),
                concept("g1", "G1", "f1", "Felis", "genus"),
                concept("g2", "G2", "f1", "Panthera", "genus"),
                concept("s1", "S1", "g1", "Felis catus", "species"),
                concept("s2", "S2", "g2", "Panthera leo", "species"),
                concept("f2", "F2", "k1", "Canidae", "family"),
            ],
        ));

        let intervals: Vec<(i64, i64)> = taxa.values().map(|hit| (hit.left, hit.right)).collect();

        for (left, right) in &intervals {
            assert!(left < right);
        }
        for (a_left, a_right) in &intervals {
            for (b_left, b_right) in &intervals {
                let disjoint = a_right < b_left || b_right < a_left;
                let a_contains_b = a_left < b_left && b_right < a_right;
                let b_contains_a = b_left < a_left && a_right < b_right;
                let same = a_left == b_left && a_right == b_right;
                assert!(disjoint || a_contains_b || b_contains_a || same);
            }
        }

        // the ancestry containment check the intervals exist for
        let k1 = &taxa["k1"];
        let s1 = &taxa["s1"];
        let s2 = &taxa["s2"];
        assert!(k1.left < s1.left && s1.right < k1.right);
        assert!(s2.right < s1.left || s1.right < s2.left);
    }

    #[test]
    fn rebuilding_from_the_same_input_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let first = run_walk(&dir.path().join("a"), minimal_tree())
            .all(DOC_TYPE_TAXON)
            .unwrap();
        let second = run_walk(&dir.path().join("b"), minimal_tree())
            .all(DOC_TYPE_TAXON)
            .unwrap();

        assert_eq!(first, second);
    }
}
