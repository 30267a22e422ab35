//! Per-recipe ingredient resolution against an allergen profile.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::allergens::{detect_allergens, Allergen, AllergenProfile};
use crate::canonical::{CanonicalMatch, Vocabulary};
use crate::catalog::{match_products, Catalog, ProductMatch, ProductRules};
use crate::error::{CanonError, Result};
use crate::ingredient_parser::{parse_ingredient_line, ParsedIngredient};
use crate::substitutes::{suggest_substitutes, SubstituteSuggestion, SubstituteTable};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: String,
    pub title: String,
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub instructions: Vec<String>,
}

/// Load recipes from a JSON array.
pub fn load_recipes(path: &Path) -> Result<Vec<Recipe>> {
    let content = std::fs::read_to_string(path).map_err(|e| CanonError::io(path, e))?;
    let recipes: Vec<Recipe> =
        serde_json::from_str(&content).map_err(|e| CanonError::json(path, e))?;
    tracing::info!(recipes = recipes.len(), path = ?path, "loaded recipes");
    Ok(recipes)
}

/// Everything the analyzer needs besides the recipe and the profile.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisContext<'a> {
    pub vocab: &'a Vocabulary,
    pub catalog: &'a Catalog,
    pub rules: &'a ProductRules,
    pub table: &'a SubstituteTable,
    pub max_substitutes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientResolution {
    pub parsed: ParsedIngredient,
    pub mapping: Option<CanonicalMatch>,
    pub allergens: BTreeSet<Allergen>,
    pub conflicts: BTreeSet<Allergen>,
    pub products: Vec<ProductMatch>,
    pub substitutes: Vec<SubstituteSuggestion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeReport {
    pub recipe_id: String,
    pub title: String,
    pub ingredients: Vec<IngredientResolution>,
    pub unmapped: usize,
    /// No ingredient conflicts with the profile.
    pub safe: bool,
    /// Every conflicting ingredient has at least one substitute.
    pub substitutable: bool,
}

fn resolve_line(
    line: &str,
    ctx: &AnalysisContext<'_>,
    profile: &AllergenProfile,
) -> IngredientResolution {
    let parsed = parse_ingredient_line(line);
    let mapping = ctx.vocab.find_canonical_mapping(line);
    let canonical = mapping.as_ref().and_then(|m| ctx.vocab.get(&m.canonical));

    let allergens = match canonical {
        Some(entry) => entry.allergens.clone(),
        None => detect_allergens(&parsed.cleaned_name),
    };
    let conflicts = profile.conflicts(&allergens);

    let mut products = Vec::new();
    let mut substitutes = Vec::new();
    if let Some(entry) = canonical {
        let selection = match_products(entry, ctx.catalog, ctx.vocab, profile, ctx.rules);
        products = selection.matches;
        if let Some(generic) = selection.generic {
            let generic_allergens = generic.allergens.clone();
            products.push(ProductMatch::from_product(&generic, generic_allergens));
        }
        if !conflicts.is_empty() {
            substitutes = suggest_substitutes(
                entry,
                profile,
                ctx.vocab,
                ctx.catalog,
                ctx.table,
                ctx.max_substitutes,
            );
        }
    }

    IngredientResolution {
        parsed,
        mapping,
        allergens,
        conflicts,
        products,
        substitutes,
    }
}

pub fn analyze_recipe(
    recipe: &Recipe,
    ctx: &AnalysisContext<'_>,
    profile: &AllergenProfile,
) -> RecipeReport {
    let ingredients: Vec<IngredientResolution> = recipe
        .ingredients
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| resolve_line(line, ctx, profile))
        .collect();

    let unmapped = ingredients.iter().filter(|i| i.mapping.is_none()).count();
    let mut conflicting = ingredients.iter().filter(|i| !i.conflicts.is_empty()).peekable();
    let safe = conflicting.peek().is_none();
    let substitutable = conflicting.all(|i| !i.substitutes.is_empty());

    tracing::debug!(
        recipe = recipe.id.as_str(),
        unmapped,
        safe,
        substitutable,
        "analyzed recipe"
    );

    RecipeReport {
        recipe_id: recipe.id.clone(),
        title: recipe.title.clone(),
        ingredients,
        unmapped,
        safe,
        substitutable,
    }
}

/// Reports of recipes the profile can cook: safe ones, plus those fixable by
/// substitution when `allow_substitutions` is set.
pub fn filter_recipes(reports: &[RecipeReport], allow_substitutions: bool) -> Vec<&RecipeReport> {
    reports
        .iter()
        .filter(|r| r.safe || (allow_substitutions && r.substitutable))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::{CanonicalIngredient, ConfidenceLevel};
    use crate::catalog::Product;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn vocab() -> Vocabulary {
        Vocabulary::from_entries(vec![
            CanonicalIngredient::new("butter", "Dairy").with_allergens(&[Allergen::Milk]),
            CanonicalIngredient::new("all-purpose flour", "Baking")
                .with_aliases(&["flour"])
                .with_allergens(&[Allergen::Wheat, Allergen::Gluten]),
            CanonicalIngredient::new("sugar", "Baking"),
            CanonicalIngredient::new("olive oil", "Oils"),
            CanonicalIngredient::new("garlic", "Produce"),
            CanonicalIngredient::new("saffron", "Spices"),
        ])
        .unwrap()
    }

    fn recipe(id: &str, lines: &[&str]) -> Recipe {
        Recipe {
            id: id.into(),
            title: id.to_uppercase(),
            ingredients: lines.iter().map(|l| l.to_string()).collect(),
            instructions: Vec::new(),
        }
    }

    #[test]
    fn test_analyze_recipe_flags_and_substitutes() {
        let v = vocab();
        let catalog = Catalog::new(vec![Product::new("o1", "Extra Virgin Olive Oil")
            .with_tag("olive oil", ConfidenceLevel::Confident)]);
        let rules = ProductRules::default();
        let ctx = AnalysisContext {
            vocab: &v,
            catalog: &catalog,
            rules: &rules,
            table: SubstituteTable::builtin(),
            max_substitutes: 3,
        };
        let profile = AllergenProfile::new([Allergen::Milk]);

        let lines = [
            "2 tbsp unsalted butter, melted",
            "3 cloves garlic",
            "1 pinch mystery spice",
            "",
        ];
        let report = analyze_recipe(&recipe("r1", &lines), &ctx, &profile);
        assert_eq!(report.ingredients.len(), 3);
        assert_eq!(report.unmapped, 1);
        assert!(!report.safe);
        assert!(report.substitutable);

        let butter = &report.ingredients[0];
        assert_eq!(butter.mapping.as_ref().unwrap().canonical, "butter");
        assert!(butter.conflicts.contains(&Allergen::Milk));
        assert!(butter.products.is_empty());
        assert_eq!(butter.substitutes[0].name, "olive oil");
        assert!(butter.substitutes[0].has_product);

        let garlic = &report.ingredients[1];
        assert!(garlic.conflicts.is_empty());
        assert_eq!(garlic.products.len(), 1);
        assert!(garlic.products[0].is_generic);
        assert!(garlic.substitutes.is_empty());
    }

    #[test]
    fn test_filter_recipes() {
        let v = vocab();
        let catalog = Catalog::default();
        let rules = ProductRules::default();
        let ctx = AnalysisContext {
            vocab: &v,
            catalog: &catalog,
            rules: &rules,
            table: &SubstituteTable::default(),
            max_substitutes: 3,
        };
        let profile = AllergenProfile::new([Allergen::Wheat]);

        let reports: Vec<_> = [
            recipe("plain", &["1 tbsp olive oil", "1 clove garlic"]),
            recipe("bread", &["2 cups flour", "1 tsp sugar"]),
        ]
        .iter()
        .map(|r| analyze_recipe(r, &ctx, &profile))
        .collect();

        assert!(reports[0].safe);
        assert!(!reports[1].safe);
        assert!(!reports[1].substitutable);

        let kept = filter_recipes(&reports, true);
        let ids: Vec<_> = kept.iter().map(|r| r.recipe_id.as_str()).collect();
        assert_eq!(ids, vec!["plain"]);
        assert_eq!(filter_recipes(&reports, false).len(), 1);
    }

    #[test]
    fn test_load_recipes() -> Result<()> {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"id": "r1", "title": "Toast", "ingredients": ["1 slice bread", "butter"]}}]"#
        )
        .unwrap();
        let recipes = load_recipes(file.path())?;
        assert_eq!(recipes.len(), 1);
        assert_eq!(recipes[0].ingredients.len(), 2);
        assert!(recipes[0].instructions.is_empty());

        let mut bad = NamedTempFile::new().unwrap();
        write!(bad, "not json").unwrap();
        assert!(matches!(load_recipes(bad.path()), Err(CanonError::Json { .. })));
        Ok(())
    }
}
