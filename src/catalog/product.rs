use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::allergens::{detect_allergens, Allergen};
use crate::canonical::{CanonicalIngredient, ConfidenceLevel, Vocabulary};
use crate::ingredient_parser::singular_key;

pub const GENERIC_ID_PREFIX: &str = "generic:";

/// A purchasable grocery product, or a generic placeholder for a canonical.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub brand: Option<String>,
    pub canonical_tag: Option<String>,
    pub confidence_level: Option<ConfidenceLevel>,
    /// Declared allergens; see [`Product::all_allergens`] for the full set.
    pub allergens: BTreeSet<Allergen>,
    pub ingredients_text: Option<String>,
    pub is_generic: bool,
}

impl Product {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            brand: None,
            canonical_tag: None,
            confidence_level: None,
            allergens: BTreeSet::new(),
            ingredients_text: None,
            is_generic: false,
        }
    }

    pub fn with_brand(mut self, brand: &str) -> Self {
        self.brand = Some(brand.to_string());
        self
    }

    pub fn with_tag(mut self, tag: &str, confidence: ConfidenceLevel) -> Self {
        self.canonical_tag = Some(tag.to_string());
        self.confidence_level = Some(confidence);
        self
    }

    pub fn with_ingredients(mut self, text: &str) -> Self {
        self.ingredients_text = Some(text.to_string());
        self
    }

    /// Declared allergens plus those detected in the name and ingredient statement.
    pub fn all_allergens(&self) -> BTreeSet<Allergen> {
        let mut all = self.allergens.clone();
        all.extend(detect_allergens(&self.name));
        if let Some(text) = &self.ingredients_text {
            all.extend(detect_allergens(text));
        }
        all
    }

    /// Whether the tag names `canonical`, directly or through one of its aliases.
    pub fn is_tagged_with(&self, canonical: &str, vocab: &Vocabulary) -> bool {
        self.canonical_tag
            .as_deref()
            .is_some_and(|tag| tag_matches(resolve_tag(tag, vocab), canonical))
    }
}

/// The canonical name a stored tag stands for. Tags outside the vocabulary come
/// back unchanged.
pub fn resolve_tag<'a>(tag: &'a str, vocab: &'a Vocabulary) -> &'a str {
    vocab.get(tag).map_or(tag, |entry| entry.name.as_str())
}

/// Tags compare in key space so "Tomatoes" and "tomato" are the same tag.
pub fn tag_matches(tag: &str, canonical: &str) -> bool {
    singular_key(tag) == singular_key(canonical)
}

pub fn slugify(name: &str) -> String {
    name.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

pub fn generic_id(canonical: &str) -> String {
    format!("{}{}", GENERIC_ID_PREFIX, slugify(canonical))
}

/// Placeholder product for a canonical with no real product.
pub fn generic_product_for(canonical: &CanonicalIngredient) -> Product {
    Product {
        id: generic_id(&canonical.name),
        name: canonical.name.clone(),
        brand: None,
        canonical_tag: Some(canonical.name.clone()),
        confidence_level: Some(ConfidenceLevel::Confident),
        allergens: canonical.allergens.clone(),
        ingredients_text: None,
        is_generic: true,
    }
}
