//! Grocery products: loading, canonical tagging and per-canonical product matching.

pub mod loader;
pub mod product;
pub mod tagging;

pub use loader::{load_products, save_products};
pub use product::{generic_product_for, resolve_tag, Product, GENERIC_ID_PREFIX};
pub use tagging::{
    assign_canonical_tag, match_products, ExcludedProduct, ExclusionReason, ProductMatch,
    ProductRules, ProductSelection, TagAssignment, TagReason,
};

use crate::canonical::{CanonicalIngredient, Vocabulary};

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    products: Vec<Product>,
}

impl Catalog {
    pub fn new(products: Vec<Product>) -> Self {
        Self { products }
    }

    pub fn get(&self, id: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Product> {
        self.products.iter_mut().find(|p| p.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Product> {
        self.products.iter()
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn push(&mut self, product: Product) {
        self.products.push(product);
    }

    /// Products tagged with `canonical` or with one of its aliases.
    pub fn tagged_with<'a>(
        &'a self,
        canonical: &'a str,
        vocab: &'a Vocabulary,
    ) -> impl Iterator<Item = &'a Product> {
        self.products
            .iter()
            .filter(move |p| p.is_tagged_with(canonical, vocab))
    }

    /// Whether a real (non-generic) product carries this canonical tag.
    pub fn has_real_product(&self, canonical: &str, vocab: &Vocabulary) -> bool {
        self.tagged_with(canonical, vocab).any(|p| !p.is_generic)
    }

    /// Tag products from their names. Only untagged products are touched unless
    /// `retag_all` is set. Returns the number of products whose tag changed.
    pub fn tag_untagged(
        &mut self,
        vocab: &Vocabulary,
        rules: &ProductRules,
        retag_all: bool,
    ) -> usize {
        let mut changed = 0;
        for product in self.products.iter_mut().filter(|p| !p.is_generic) {
            if product.canonical_tag.is_some() && !retag_all {
                continue;
            }
            let Some(assignment) = assign_canonical_tag(product, vocab, rules) else {
                continue;
            };
            if product.canonical_tag.as_deref() != Some(assignment.canonical.as_str())
                || product.confidence_level != Some(assignment.confidence)
            {
                tracing::debug!(
                    product = product.id.as_str(),
                    canonical = assignment.canonical.as_str(),
                    confidence = %assignment.confidence,
                    "tagged product"
                );
                product.canonical_tag = Some(assignment.canonical);
                product.confidence_level = Some(assignment.confidence);
                changed += 1;
            }
        }
        changed
    }

    /// Add a generic placeholder for a canonical with no real product and no
    /// generic yet. Returns whether one was added.
    pub fn ensure_generic(&mut self, canonical: &CanonicalIngredient, vocab: &Vocabulary) -> bool {
        if self.tagged_with(&canonical.name, vocab).next().is_some() {
            return false;
        }
        let generic = generic_product_for(canonical);
        if self.get(&generic.id).is_some() {
            return false;
        }
        tracing::debug!(canonical = canonical.name.as_str(), "created generic product");
        self.products.push(generic);
        true
    }
}
