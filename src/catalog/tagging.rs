use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::product::{generic_product_for, Product};
use super::Catalog;
use crate::allergens::{Allergen, AllergenProfile};
use crate::canonical::matcher::find_token_run;
use crate::canonical::{CanonicalIngredient, ConfidenceLevel, Vocabulary};
use crate::ingredient_parser::{is_descriptor_word, normalize_tokens, singular_key};

/// Words that turn an ingredient into a different product when they follow it
/// ("garlic bread", "peanut butter cookies").
const DEFAULT_COMPOUND_WORDS: &[&str] = &[
    "bread", "breads", "chips", "crisps", "crackers", "cookies", "biscuits", "sauce",
    "dressing", "seasoning", "soup", "candy", "bar", "bars", "flavored", "flavoured",
    "flavor", "mix", "snack", "snacks", "spray", "cereal", "cake", "muffins", "pie",
    "pudding", "jerky", "rolls", "bagels", "pretzels", "tortillas", "dip", "spread", "drink",
    "beverage", "tea", "popcorn", "gummies", "marinade", "rub",
];

#[derive(Debug, Clone, PartialEq)]
pub struct ProductRules {
    /// Singularized compound-product words.
    pub compound_words: BTreeSet<String>,
    pub exclude_low_confidence: bool,
    pub create_generic: bool,
}

impl Default for ProductRules {
    fn default() -> Self {
        let mut rules = Self {
            compound_words: BTreeSet::new(),
            exclude_low_confidence: false,
            create_generic: true,
        };
        rules.add_compound_words(DEFAULT_COMPOUND_WORDS);
        rules
    }
}

impl ProductRules {
    pub fn add_compound_words<S: AsRef<str>>(&mut self, words: &[S]) {
        for word in words {
            // Multi-word entries contribute their last token.
            if let Some(last) = normalize_tokens(word.as_ref()).pop() {
                self.compound_words.insert(last);
            }
        }
    }

    pub fn is_compound_word(&self, token: &str) -> bool {
        self.compound_words.contains(token)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagReason {
    HeadNoun,
    Contained,
    CompoundProduct,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagAssignment {
    pub canonical: String,
    pub confidence: ConfidenceLevel,
    pub reason: TagReason,
}

fn is_filler(token: &str) -> bool {
    token.chars().any(|c| c.is_ascii_digit()) || is_descriptor_word(token)
}

/// Product name tokens with a leading brand removed.
pub(crate) fn product_tokens(product: &Product) -> Vec<String> {
    let mut tokens = normalize_tokens(&product.name);
    if let Some(brand) = &product.brand {
        let brand_tokens = normalize_tokens(brand);
        if !brand_tokens.is_empty()
            && tokens.len() > brand_tokens.len()
            && tokens.starts_with(&brand_tokens)
        {
            tokens.drain(..brand_tokens.len());
        }
    }
    tokens
}

/// Work out the canonical a product most plausibly is, from its name alone.
///
/// A vocabulary key ending the name (sizes and descriptors aside) is the head noun
/// and wins over keys further left: "Garlic Bread" is bread, not garlic.
pub fn assign_canonical_tag(
    product: &Product,
    vocab: &Vocabulary,
    rules: &ProductRules,
) -> Option<TagAssignment> {
    let tokens = product_tokens(product);
    if tokens.is_empty() {
        return None;
    }
    // End of the meaningful part of the name, ignoring trailing sizes and descriptors.
    let tail = tokens
        .iter()
        .rposition(|t| !is_filler(t))
        .map_or(tokens.len(), |i| i + 1);

    let (vk, pos) = vocab
        .keys
        .iter()
        .filter_map(|vk| find_token_run(&tokens, &vk.tokens).map(|pos| (vk, pos)))
        .max_by(|(a, a_pos), (b, b_pos)| {
            let a_tail = a_pos + a.tokens.len() >= tail;
            let b_tail = b_pos + b.tokens.len() >= tail;
            a_tail
                .cmp(&b_tail)
                .then(a.tokens.len().cmp(&b.tokens.len()))
                .then(a.key.len().cmp(&b.key.len()))
                .then(a_pos.cmp(b_pos))
                .then(b.is_alias.cmp(&a.is_alias))
        })?;

    let end = pos + vk.tokens.len();
    let (confidence, reason) = if end >= tail {
        (ConfidenceLevel::Confident, TagReason::HeadNoun)
    } else if tokens[end..]
        .iter()
        .find(|t| !is_filler(t))
        .is_some_and(|t| rules.is_compound_word(t))
    {
        (ConfidenceLevel::Low, TagReason::CompoundProduct)
    } else {
        (ConfidenceLevel::Suggested, TagReason::Contained)
    };

    Some(TagAssignment {
        canonical: vocab.entry(vk.entry).name.clone(),
        confidence,
        reason,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductMatch {
    pub product_id: String,
    pub name: String,
    pub brand: Option<String>,
    pub is_generic: bool,
    pub confidence: Option<ConfidenceLevel>,
    pub allergens: BTreeSet<Allergen>,
}

impl ProductMatch {
    pub(crate) fn from_product(product: &Product, allergens: BTreeSet<Allergen>) -> Self {
        Self {
            product_id: product.id.clone(),
            name: product.name.clone(),
            brand: product.brand.clone(),
            is_generic: product.is_generic,
            confidence: product.confidence_level,
            allergens,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "allergens", rename_all = "snake_case")]
pub enum ExclusionReason {
    Allergens(BTreeSet<Allergen>),
    LowConfidence,
    MisTagged,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExcludedProduct {
    pub product_id: String,
    pub name: String,
    pub reason: ExclusionReason,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSelection {
    pub canonical: String,
    pub matches: Vec<ProductMatch>,
    pub excluded: Vec<ExcludedProduct>,
    /// Offered when no tagged product survived and the canonical itself is safe.
    pub generic: Option<Product>,
}

impl ProductSelection {
    pub fn has_options(&self) -> bool {
        !self.matches.is_empty() || self.generic.is_some()
    }
}

/// True when the product name contains the canonical's name or one of its aliases.
pub(crate) fn name_supports_tag(product: &Product, canonical: &str, vocab: &Vocabulary) -> bool {
    let tokens = normalize_tokens(&product.name);
    let keys = vocab.keys_for(canonical);
    if keys.is_empty() {
        let key = normalize_tokens(canonical);
        return find_token_run(&tokens, &key).is_some();
    }
    keys.iter().any(|k| find_token_run(&tokens, k).is_some())
}

/// Products that can stand in for a canonical ingredient, with the unsafe and
/// unreliable ones set aside.
pub fn match_products(
    canonical: &CanonicalIngredient,
    catalog: &Catalog,
    vocab: &Vocabulary,
    profile: &AllergenProfile,
    rules: &ProductRules,
) -> ProductSelection {
    let mut matches = Vec::new();
    let mut excluded = Vec::new();

    for product in catalog.tagged_with(&canonical.name, vocab) {
        let allergens = product.all_allergens();
        let conflicts = profile.conflicts(&allergens);
        let reason = if !conflicts.is_empty() {
            Some(ExclusionReason::Allergens(conflicts))
        } else if rules.exclude_low_confidence
            && product.confidence_level == Some(ConfidenceLevel::Low)
        {
            Some(ExclusionReason::LowConfidence)
        } else if !product.is_generic && !name_supports_tag(product, &canonical.name, vocab) {
            Some(ExclusionReason::MisTagged)
        } else {
            None
        };

        match reason {
            Some(reason) => {
                tracing::debug!(
                    product = product.id.as_str(),
                    canonical = canonical.name.as_str(),
                    reason = ?reason,
                    "excluded product"
                );
                excluded.push(ExcludedProduct {
                    product_id: product.id.clone(),
                    name: product.name.clone(),
                    reason,
                });
            }
            None => matches.push(ProductMatch::from_product(product, allergens)),
        }
    }

    matches.sort_by(|a, b| {
        b.confidence
            .cmp(&a.confidence)
            .then(a.is_generic.cmp(&b.is_generic))
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });

    let generic = if matches.is_empty()
        && rules.create_generic
        && profile.is_safe(&canonical.allergens)
    {
        Some(generic_product_for(canonical))
    } else {
        None
    };

    ProductSelection {
        canonical: canonical.name.clone(),
        matches,
        excluded,
        generic,
    }
}

/// Does `outer` contain `inner` as a strictly larger token run?
pub(crate) fn key_strictly_contains(outer: &str, inner: &str) -> bool {
    let outer_tokens = normalize_tokens(outer);
    let inner_tokens = normalize_tokens(inner);
    outer_tokens.len() > inner_tokens.len()
        && find_token_run(&outer_tokens, &inner_tokens).is_some()
}

pub(crate) fn same_key(a: &str, b: &str) -> bool {
    singular_key(a) == singular_key(b)
}
