//! Substitute suggestions for ingredients a user cannot eat.
//!
//! Two sources feed the suggestions: a curated table (`data/substitutes.json`,
//! embedded at compile time) and a same-category head-noun heuristic over the
//! vocabulary, so "milk" can turn up "oat milk" without a table entry.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::allergens::{detect_allergens, Allergen, AllergenProfile};
use crate::canonical::{CanonicalIngredient, Vocabulary};
use crate::catalog::Catalog;
use crate::error::{CanonError, Result};
use crate::ingredient_parser::singular_key;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubstituteRule {
    pub name: String,
    #[serde(default)]
    pub ratio: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Deserialize)]
struct SubstituteFile {
    substitutes: HashMap<String, Vec<SubstituteRule>>,
}

/// Canonical name (in key form) to its ordered substitute rules.
#[derive(Debug, Clone, Default)]
pub struct SubstituteTable {
    rules: HashMap<String, Vec<SubstituteRule>>,
}

static BUILTIN_TABLE: LazyLock<SubstituteTable> = LazyLock::new(|| {
    let json = include_str!("../data/substitutes.json");
    SubstituteTable::from_json_str(json).expect("Failed to parse substitutes.json")
});

impl SubstituteTable {
    /// The table bundled with the crate.
    pub fn builtin() -> &'static SubstituteTable {
        &BUILTIN_TABLE
    }

    pub fn from_json_str(json: &str) -> std::result::Result<Self, serde_json::Error> {
        let file: SubstituteFile = serde_json::from_str(json)?;
        let mut table = Self::default();
        for (canonical, rules) in file.substitutes {
            table.insert(&canonical, rules);
        }
        Ok(table)
    }

    /// Load a table from a JSON file in the same format as the bundled one.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| CanonError::io(path, e))?;
        let table = Self::from_json_str(&json).map_err(|e| CanonError::json(path, e))?;
        tracing::info!(entries = table.len(), path = ?path, "loaded substitute table");
        Ok(table)
    }

    pub fn insert(&mut self, canonical: &str, rules: Vec<SubstituteRule>) {
        self.rules.entry(singular_key(canonical)).or_default().extend(rules);
    }

    pub fn rules_for(&self, canonical: &str) -> &[SubstituteRule] {
        self.rules
            .get(&singular_key(canonical))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubstituteSource {
    Table,
    SharedHeadNoun,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubstituteSuggestion {
    pub name: String,
    pub ratio: Option<String>,
    pub note: Option<String>,
    pub allergens: BTreeSet<Allergen>,
    /// A real product tagged with this substitute exists in the catalog.
    pub has_product: bool,
    pub source: SubstituteSource,
}

fn allergens_of(name: &str, vocab: &Vocabulary) -> BTreeSet<Allergen> {
    match vocab.get(name) {
        Some(entry) => entry.allergens.clone(),
        None => detect_allergens(name),
    }
}

/// Safe replacements for `canonical` under `profile`, best first, at most `max`.
pub fn suggest_substitutes(
    canonical: &CanonicalIngredient,
    profile: &AllergenProfile,
    vocab: &Vocabulary,
    catalog: &Catalog,
    table: &SubstituteTable,
    max: usize,
) -> Vec<SubstituteSuggestion> {
    let own_key = singular_key(&canonical.name);
    let mut seen: HashSet<String> = HashSet::from([own_key]);
    let mut candidates: Vec<SubstituteSuggestion> = Vec::new();

    let mut consider = |name: &str, ratio, note, source| {
        // Prefer the vocabulary's spelling when the name is a known canonical or alias.
        let name = vocab.get(name).map_or(name, |entry| entry.name.as_str());
        if !seen.insert(singular_key(name)) {
            return;
        }
        let allergens = allergens_of(name, vocab);
        if !profile.is_safe(&allergens) {
            return;
        }
        candidates.push(SubstituteSuggestion {
            name: name.to_string(),
            ratio,
            note,
            allergens,
            has_product: catalog.has_real_product(name, vocab),
            source,
        });
    };

    for rule in table.rules_for(&canonical.name) {
        consider(
            &rule.name,
            rule.ratio.clone(),
            rule.note.clone(),
            SubstituteSource::Table,
        );
    }

    if let Some(head) = canonical.head_noun() {
        for entry in vocab.iter() {
            if entry.category.eq_ignore_ascii_case(&canonical.category)
                && entry.head_noun().as_deref() == Some(head.as_str())
            {
                consider(&entry.name, None, None, SubstituteSource::SharedHeadNoun);
            }
        }
    }

    // Stable sort keeps table order and vocabulary order within each group.
    candidates.sort_by_key(|s| (!s.has_product, s.source));
    candidates.truncate(max);

    tracing::debug!(
        canonical = canonical.name.as_str(),
        suggestions = candidates.len(),
        "suggested substitutes"
    );
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::ConfidenceLevel;
    use crate::catalog::Product;

    fn vocab() -> Vocabulary {
        Vocabulary::from_entries(vec![
            CanonicalIngredient::new("milk", "Dairy").with_allergens(&[Allergen::Milk]),
            CanonicalIngredient::new("oat milk", "Dairy"),
            CanonicalIngredient::new("soy milk", "Dairy").with_allergens(&[Allergen::Soy]),
            CanonicalIngredient::new("almond milk", "Dairy").with_allergens(&[Allergen::TreeNut]),
            CanonicalIngredient::new("coconut milk", "Canned Goods"),
            CanonicalIngredient::new("peanut butter", "Condiments")
                .with_allergens(&[Allergen::Peanut]),
            CanonicalIngredient::new("sunflower seed butter", "Condiments"),
            CanonicalIngredient::new("butter", "Dairy").with_allergens(&[Allergen::Milk]),
        ])
        .unwrap()
    }

    #[test]
    fn test_builtin_table_parses() {
        let table = SubstituteTable::builtin();
        assert!(!table.is_empty());
        assert!(!table.rules_for("Butter").is_empty());
        assert!(!table.rules_for("eggs").is_empty());
        assert!(table.rules_for("saffron").is_empty());
    }

    #[test]
    fn test_unsafe_substitutes_are_dropped() {
        let v = vocab();
        let profile = AllergenProfile::new([Allergen::Milk, Allergen::TreeNut]);
        let suggestions = suggest_substitutes(
            v.get("milk").unwrap(),
            &profile,
            &v,
            &Catalog::default(),
            SubstituteTable::builtin(),
            10,
        );
        let names: Vec<_> = suggestions.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["oat milk", "soy milk", "coconut milk"]);
        assert!(suggestions.iter().all(|s| s.source == SubstituteSource::Table));
    }

    #[test]
    fn test_shared_head_noun_heuristic() {
        let v = vocab();
        let profile = AllergenProfile::new([Allergen::Peanut]);
        let suggestions = suggest_substitutes(
            v.get("peanut butter").unwrap(),
            &profile,
            &v,
            &Catalog::default(),
            &SubstituteTable::default(),
            5,
        );
        let names: Vec<_> = suggestions.iter().map(|s| s.name.as_str()).collect();
        // "butter" is Dairy, not Condiments, so it is not offered.
        assert_eq!(names, vec!["sunflower seed butter"]);
        assert_eq!(suggestions[0].source, SubstituteSource::SharedHeadNoun);
    }

    #[test]
    fn test_products_rank_first_and_max_applies() {
        let v = vocab();
        let catalog = Catalog::new(vec![Product::new("c1", "Thai Kitchen Coconut Milk")
            .with_tag("coconut milk", ConfidenceLevel::Confident)]);
        let profile = AllergenProfile::new([Allergen::Milk]);
        let suggestions = suggest_substitutes(
            v.get("milk").unwrap(),
            &profile,
            &v,
            &catalog,
            SubstituteTable::builtin(),
            2,
        );
        assert_eq!(suggestions.len(), 2);
        assert_eq!(suggestions[0].name, "coconut milk");
        assert!(suggestions[0].has_product);
        assert_eq!(suggestions[1].name, "oat milk");
    }

    #[test]
    fn test_table_and_heuristic_do_not_duplicate() {
        let v = vocab();
        let mut table = SubstituteTable::default();
        table.insert(
            "milk",
            vec![SubstituteRule {
                name: "Oat Milk".into(),
                ratio: Some("1:1".into()),
                note: None,
            }],
        );
        let suggestions = suggest_substitutes(
            v.get("milk").unwrap(),
            &AllergenProfile::new([Allergen::Milk]),
            &v,
            &Catalog::default(),
            &table,
            10,
        );
        let names: Vec<_> = suggestions.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["oat milk", "soy milk", "almond milk"]);
        assert_eq!(suggestions[0].source, SubstituteSource::Table);
        assert_eq!(suggestions[1].source, SubstituteSource::SharedHeadNoun);
    }
}
