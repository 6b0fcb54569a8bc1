use regex::Regex;

use crate::utils::titleize_first_word;


/// Infraspecific rank markers and hybrid signs that sit between epithets
/// but are not part of the canonical form.
const NAME_MARKERS: &[&str] = &["subsp.", "ssp.", "var.", "subvar.", "f.", "x", "×"];


/// The seam for scientific name parsing. Returns the canonical form when the
/// input looks like a parsable scientific name, or None when it does not.
pub trait NameParser {
    fn parse(&self, name: &str) -> Option<String>;
}


/// A pattern based parser that recognises uninomials, binomials and
/// trinomials, dropping subgenus placements, rank markers and trailing
/// authorship. It is a heuristic rather than a nomenclator. Names it cannot
/// recognise are left to the caller untouched.
pub struct ScientificNameParser {
    genus: Regex,
    subgenus: Regex,
    epithet: Regex,
}

impl Default for ScientificNameParser {
    fn default() -> Self {
        ScientificNameParser {
            genus: Regex::new(r"^\p{Lu}[\p{Ll}-]+$").expect("invalid genus pattern"),
            subgenus: Regex::new(r"^\(\p{Lu}[\p{Ll}-]+\)$").expect("invalid subgenus pattern"),
            epithet: Regex::new(r"^\p{Ll}[\p{Ll}-]+$").expect("invalid epithet pattern"),
        }
    }
}

impl NameParser for ScientificNameParser {
    fn parse(&self, name: &str) -> Option<String> {
        let trimmed = name.trim();
        let first = trimmed.split_whitespace().next()?;

        // legacy archives publish genera in full uppercase
        let name = if first.chars().all(|c| c.is_alphabetic() && c.is_uppercase()) {
            titleize_first_word(trimmed)
        }
        else {
            trimmed.to_string()
        };
        let mut words = name.split_whitespace();

        let genus = words.next()?;
        if !self.genus.is_match(genus) {
            return None;
        }

        let mut parts = vec![genus.to_string()];
        for word in words {
            if NAME_MARKERS.contains(&word) || self.subgenus.is_match(word) {
                continue;
            }
            // a trinomial is the deepest shape we recognise. anything past
            // the epithets, such as authorship, ends the canonical form
            if parts.len() < 3 && self.epithet.is_match(word) {
                parts.push(word.to_string());
                continue;
            }
            break;
        }

        Some(parts.join(" "))
    }
}


/// Wraps a name parser with the swallow-everything contract the indexing
/// pipeline expects: any input the parser rejects comes back verbatim.
pub struct Canonicalizer<P = ScientificNameParser> {
    parser: P,
}

impl Canonicalizer {
    pub fn new() -> Canonicalizer {
        Canonicalizer {
            parser: ScientificNameParser::default(),
        }
    }
}

impl<P: NameParser> Canonicalizer<P> {
    pub fn with_parser(parser: P) -> Canonicalizer<P> {
        Canonicalizer { parser }
    }

    pub fn canonical(&self, name: &str) -> String {
        match self.parser.parse(name) {
            Some(canonical) => canonical,
            None => name.to_string(),
        }
    }
}
