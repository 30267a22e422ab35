//! Batch canonicalization of every messy name in a recipe set, plus product
//! tagging and generic product creation for the catalog.

use std::collections::HashSet;
use std::path::Path;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::canonical::{CanonicalMatch, ConfidenceLevel, MatchMethod, Vocabulary};
use crate::catalog::{Catalog, ProductRules};
use crate::error::{CanonError, Result};
use crate::ingredient_parser::clean_ingredient_name;
use crate::llm_resolver::Disambiguator;
use crate::recipe_analyzer::Recipe;

pub const MAPPINGS_FILE: &str = "mappings.json";
pub const UNMAPPED_FILE: &str = "unmapped.txt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackfillOptions {
    pub retag_all: bool,
    pub create_generic: bool,
}

impl Default for BackfillOptions {
    fn default() -> Self {
        Self {
            retag_all: false,
            create_generic: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackfillStats {
    pub messy_total: usize,
    pub confident: usize,
    pub suggested: usize,
    pub low: usize,
    pub unmapped: usize,
    pub products_tagged: usize,
    pub generic_created: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackfillReport {
    pub mappings: Vec<CanonicalMatch>,
    pub unmapped: Vec<String>,
    pub stats: BackfillStats,
}

impl BackfillReport {
    fn recount(&mut self) {
        let count = |level| {
            self.mappings
                .iter()
                .filter(|m| m.confidence == level)
                .count()
        };
        self.stats.confident = count(ConfidenceLevel::Confident);
        self.stats.suggested = count(ConfidenceLevel::Suggested);
        self.stats.low = count(ConfidenceLevel::Low);
        self.stats.unmapped = self.unmapped.len();
        self.stats.messy_total = self.mappings.len() + self.unmapped.len();
    }
}

/// Distinct non-empty ingredient lines across all recipes, trimmed, in order of
/// first appearance. Lines differing only in case count once.
pub fn collect_messy_names(recipes: &[Recipe]) -> Vec<String> {
    let mut seen = HashSet::new();
    recipes
        .iter()
        .flat_map(|r| r.ingredients.iter())
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .filter(|line| seen.insert(line.to_lowercase()))
        .map(str::to_string)
        .collect()
}

/// Map every messy name, tag the catalog and fill in generic products.
pub fn run_backfill(
    recipes: &[Recipe],
    vocab: &Vocabulary,
    catalog: &mut Catalog,
    options: BackfillOptions,
    rules: &ProductRules,
) -> BackfillReport {
    let names = collect_messy_names(recipes);
    tracing::info!(names = names.len(), "mapping messy names");

    // par_iter().collect() keeps input order.
    let results: Vec<(String, Option<CanonicalMatch>)> = names
        .par_iter()
        .map(|name| (name.clone(), vocab.find_canonical_mapping(name)))
        .collect();

    let mut report = BackfillReport::default();
    for (name, mapping) in results {
        match mapping {
            Some(m) => report.mappings.push(m),
            None => {
                tracing::debug!(messy = name.as_str(), "no canonical mapping");
                report.unmapped.push(name);
            }
        }
    }

    report.stats.products_tagged = catalog.tag_untagged(vocab, rules, options.retag_all);
    if options.create_generic {
        report.stats.generic_created = create_missing_generics(&report, vocab, catalog);
    }
    report.recount();

    tracing::info!(
        confident = report.stats.confident,
        suggested = report.stats.suggested,
        low = report.stats.low,
        unmapped = report.stats.unmapped,
        products_tagged = report.stats.products_tagged,
        generic_created = report.stats.generic_created,
        "backfill complete"
    );
    report
}

/// Add a generic product for each mapped canonical that has no product yet.
pub fn create_missing_generics(
    report: &BackfillReport,
    vocab: &Vocabulary,
    catalog: &mut Catalog,
) -> usize {
    let mut seen = HashSet::new();
    let mut created = 0;
    for mapping in &report.mappings {
        if !seen.insert(mapping.canonical.as_str()) {
            continue;
        }
        if let Some(entry) = vocab.get(&mapping.canonical) {
            if catalog.ensure_generic(entry, vocab) {
                created += 1;
            }
        }
    }
    created
}

/// Ask the resolver about every unmapped or low-confidence name. Picks become
/// `suggested` matches. Failed calls are logged and skipped. Returns the number
/// of names resolved.
pub async fn resolve_unmapped_with_llm<D: Disambiguator>(
    report: &mut BackfillReport,
    vocab: &Vocabulary,
    resolver: &D,
    k: usize,
) -> usize {
    let mut resolved = 0;

    for mapping in report
        .mappings
        .iter_mut()
        .filter(|m| m.confidence == ConfidenceLevel::Low)
    {
        let candidates = vocab.candidates(&mapping.cleaned_name, k);
        match resolver
            .disambiguate(&mapping.messy_name, &mapping.cleaned_name, &candidates)
            .await
        {
            Ok(Some(canonical)) => {
                let score = candidates
                    .iter()
                    .find(|c| c.canonical == canonical)
                    .map_or(mapping.score, |c| c.score);
                mapping.canonical = canonical;
                mapping.score = score;
                mapping.confidence = ConfidenceLevel::Suggested;
                mapping.method = MatchMethod::Llm;
                resolved += 1;
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(
                    messy = mapping.messy_name.as_str(),
                    error = %e,
                    "llm disambiguation failed"
                );
            }
        }
    }

    let mut still_unmapped = Vec::new();
    for messy in std::mem::take(&mut report.unmapped) {
        let cleaned = clean_ingredient_name(&messy);
        let candidates = vocab.candidates(&cleaned, k);
        if candidates.is_empty() {
            still_unmapped.push(messy);
            continue;
        }
        match resolver.disambiguate(&messy, &cleaned, &candidates).await {
            Ok(Some(canonical)) => {
                let score = candidates
                    .iter()
                    .find(|c| c.canonical == canonical)
                    .map_or(0.0, |c| c.score);
                report.mappings.push(CanonicalMatch {
                    messy_name: messy,
                    cleaned_name: cleaned,
                    canonical,
                    score,
                    confidence: ConfidenceLevel::Suggested,
                    method: MatchMethod::Llm,
                });
                resolved += 1;
            }
            Ok(None) => still_unmapped.push(messy),
            Err(e) => {
                tracing::warn!(messy = messy.as_str(), error = %e, "llm disambiguation failed");
                still_unmapped.push(messy);
            }
        }
    }
    report.unmapped = still_unmapped;
    report.recount();

    tracing::info!(resolved, unmapped = report.stats.unmapped, "llm resolution complete");
    resolved
}

/// Write `mappings.json` and `unmapped.txt` into `dir`, creating it if needed.
pub fn write_report(report: &BackfillReport, dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|e| CanonError::io(dir, e))?;

    let mappings_path = dir.join(MAPPINGS_FILE);
    let json = serde_json::to_string_pretty(&report.mappings)
        .map_err(|e| CanonError::json(&mappings_path, e))?;
    std::fs::write(&mappings_path, json).map_err(|e| CanonError::io(&mappings_path, e))?;

    let unmapped_path = dir.join(UNMAPPED_FILE);
    let mut text = report.unmapped.join("\n");
    if !text.is_empty() {
        text.push('\n');
    }
    std::fs::write(&unmapped_path, text).map_err(|e| CanonError::io(&unmapped_path, e))?;

    tracing::info!(dir = ?dir, "wrote backfill report");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allergens::Allergen;
    use crate::canonical::{CanonicalIngredient, ScoredCanonical};
    use crate::catalog::Product;

    fn vocab() -> Vocabulary {
        Vocabulary::from_entries(vec![
            CanonicalIngredient::new("garlic", "Produce"),
            CanonicalIngredient::new("butter", "Dairy").with_allergens(&[Allergen::Milk]),
            CanonicalIngredient::new("cumin", "Spices"),
            CanonicalIngredient::new("tomato", "Produce"),
        ])
        .unwrap()
    }

    fn recipes() -> Vec<Recipe> {
        vec![
            Recipe {
                id: "a".into(),
                title: "A".into(),
                ingredients: vec![
                    "3 cloves garlic, minced".into(),
                    "2 tbsp butter".into(),
                    "  ".into(),
                    "1 tsp za'atar".into(),
                ],
                instructions: vec![],
            },
            Recipe {
                id: "b".into(),
                title: "B".into(),
                ingredients: vec!["2 TBSP Butter".into(), "1 can diced tomatoes".into()],
                instructions: vec![],
            },
        ]
    }

    #[test]
    fn test_collect_messy_names() {
        assert_eq!(
            collect_messy_names(&recipes()),
            vec![
                "3 cloves garlic, minced",
                "2 tbsp butter",
                "1 tsp za'atar",
                "1 can diced tomatoes"
            ]
        );
    }

    #[test]
    fn test_run_backfill() {
        let v = vocab();
        let mut catalog = Catalog::new(vec![
            Product::new("p1", "Irish Butter"),
            Product::new("p2", "Paper Plates"),
        ]);
        let report = run_backfill(
            &recipes(),
            &v,
            &mut catalog,
            BackfillOptions::default(),
            &ProductRules::default(),
        );

        let mapped: Vec<_> = report.mappings.iter().map(|m| m.canonical.as_str()).collect();
        assert_eq!(mapped, vec!["garlic", "butter", "tomato"]);
        assert_eq!(report.unmapped, vec!["1 tsp za'atar"]);
        assert_eq!(report.stats.messy_total, 4);
        assert_eq!(report.stats.confident, 3);
        assert_eq!(report.stats.unmapped, 1);
        assert_eq!(report.stats.products_tagged, 1);
        // Butter has a real product now; garlic and tomato get generics.
        assert_eq!(report.stats.generic_created, 2);
        assert!(catalog.get("generic:garlic").is_some());
        assert!(catalog.get("generic:butter").is_none());

        let no_generic = BackfillOptions {
            create_generic: false,
            ..BackfillOptions::default()
        };
        let mut catalog = Catalog::default();
        let report = run_backfill(
            &recipes(),
            &v,
            &mut catalog,
            no_generic,
            &ProductRules::default(),
        );
        assert_eq!(report.stats.generic_created, 0);
        assert!(catalog.is_empty());
    }

    struct FirstCandidate;

    impl Disambiguator for FirstCandidate {
        async fn disambiguate(
            &self,
            _messy: &str,
            _cleaned: &str,
            candidates: &[ScoredCanonical],
        ) -> Result<Option<String>> {
            Ok(candidates.first().map(|c| c.canonical.clone()))
        }
    }

    struct AlwaysFails;

    impl Disambiguator for AlwaysFails {
        async fn disambiguate(
            &self,
            _messy: &str,
            _cleaned: &str,
            _candidates: &[ScoredCanonical],
        ) -> Result<Option<String>> {
            Err(CanonError::Llm(crate::api_connection::ApiConnectionError::EmptyResponse))
        }
    }

    #[tokio::test]
    async fn test_resolve_unmapped_with_llm() {
        let v = vocab();
        let mut report = BackfillReport {
            unmapped: vec!["1 tsp cumn seeds".into()],
            ..BackfillReport::default()
        };
        report.recount();

        let resolved = resolve_unmapped_with_llm(&mut report, &v, &FirstCandidate, 3).await;
        assert_eq!(resolved, 1);
        assert!(report.unmapped.is_empty());
        let m = &report.mappings[0];
        assert_eq!(m.canonical, "cumin");
        assert_eq!(m.method, MatchMethod::Llm);
        assert_eq!(m.confidence, ConfidenceLevel::Suggested);
        assert_eq!(report.stats.suggested, 1);
        assert_eq!(report.stats.unmapped, 0);
    }

    #[tokio::test]
    async fn test_failed_llm_calls_are_skipped() {
        let v = vocab();
        let mut report = BackfillReport {
            unmapped: vec!["mystery".into()],
            ..BackfillReport::default()
        };
        let resolved = resolve_unmapped_with_llm(&mut report, &v, &AlwaysFails, 3).await;
        assert_eq!(resolved, 0);
        assert_eq!(report.unmapped, vec!["mystery"]);
        assert_eq!(report.stats.unmapped, 1);
    }

    #[test]
    fn test_write_report() {
        let v = vocab();
        let mut catalog = Catalog::default();
        let report = run_backfill(
            &recipes(),
            &v,
            &mut catalog,
            BackfillOptions::default(),
            &ProductRules::default(),
        );

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        write_report(&report, &out).unwrap();

        let json = std::fs::read_to_string(out.join(MAPPINGS_FILE)).unwrap();
        let mappings: Vec<CanonicalMatch> = serde_json::from_str(&json).unwrap();
        assert_eq!(mappings, report.mappings);
        assert_eq!(
            std::fs::read_to_string(out.join(UNMAPPED_FILE)).unwrap(),
            "1 tsp za'atar\n"
        );
    }
}
