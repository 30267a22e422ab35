//! Catalog consistency audit.
//!
//! Compares each product's stored canonical tag with what its name says today,
//! and fixes the tags that a fresh assignment can improve.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::canonical::{ConfidenceLevel, Vocabulary};
use crate::catalog::tagging::{key_strictly_contains, same_key};
use crate::catalog::{assign_canonical_tag, resolve_tag, Catalog, ProductRules, TagReason};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FindingKind {
    /// The tag is not a canonical in the vocabulary.
    UnknownTag { tag: String },
    /// The name contains no vocabulary key at all.
    MisTagged { tag: String },
    /// Tagged with a broader canonical than the name supports ("garlic" on garlic powder).
    BroadMapping { current: String, suggested: String },
    ConflictingTag { current: String, suggested: String },
    /// The tagged ingredient is only part of a compound product ("garlic bread").
    CompoundProduct { tag: String },
    MissingTag {
        suggested: String,
        confidence: ConfidenceLevel,
    },
}

impl FindingKind {
    pub fn label(&self) -> &'static str {
        match self {
            FindingKind::UnknownTag { .. } => "unknown_tag",
            FindingKind::MisTagged { .. } => "mis_tagged",
            FindingKind::BroadMapping { .. } => "broad_mapping",
            FindingKind::ConflictingTag { .. } => "conflicting_tag",
            FindingKind::CompoundProduct { .. } => "compound_product",
            FindingKind::MissingTag { .. } => "missing_tag",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub product_id: String,
    pub product_name: String,
    #[serde(flatten)]
    pub kind: FindingKind,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditSummary {
    pub products: usize,
    pub tagged: usize,
    pub generic: usize,
    pub findings_by_kind: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditReport {
    pub findings: Vec<Finding>,
    /// Canonicals with no tagged real product.
    pub canonicals_without_products: Vec<String>,
    pub tag_counts: BTreeMap<String, usize>,
    pub summary: AuditSummary,
}

pub fn audit_catalog(catalog: &Catalog, vocab: &Vocabulary, rules: &ProductRules) -> AuditReport {
    let mut report = AuditReport::default();

    for product in catalog.iter() {
        report.summary.products += 1;
        if product.is_generic {
            report.summary.generic += 1;
        }
        if let Some(tag) = &product.canonical_tag {
            report.summary.tagged += 1;
            let counted = vocab.get(tag).map_or(tag.as_str(), |c| c.name.as_str());
            *report.tag_counts.entry(counted.to_string()).or_default() += 1;
        }
        if product.is_generic {
            continue;
        }

        let assignment = assign_canonical_tag(product, vocab, rules);
        let kind = match (&product.canonical_tag, assignment) {
            (Some(tag), _) if !vocab.contains(tag) => {
                Some(FindingKind::UnknownTag { tag: tag.clone() })
            }
            (Some(tag), None) => Some(FindingKind::MisTagged { tag: tag.clone() }),
            (Some(tag), Some(a)) if a.reason == TagReason::CompoundProduct => {
                Some(FindingKind::CompoundProduct { tag: tag.clone() })
            }
            (Some(tag), Some(a)) if same_key(resolve_tag(tag, vocab), &a.canonical) => None,
            (Some(tag), Some(a))
                if key_strictly_contains(&a.canonical, resolve_tag(tag, vocab)) =>
            {
                Some(FindingKind::BroadMapping {
                    current: tag.clone(),
                    suggested: a.canonical,
                })
            }
            (Some(tag), Some(a)) => Some(FindingKind::ConflictingTag {
                current: tag.clone(),
                suggested: a.canonical,
            }),
            (None, Some(a)) => Some(FindingKind::MissingTag {
                suggested: a.canonical,
                confidence: a.confidence,
            }),
            (None, None) => None,
        };

        if let Some(kind) = kind {
            *report
                .summary
                .findings_by_kind
                .entry(kind.label().to_string())
                .or_default() += 1;
            report.findings.push(Finding {
                product_id: product.id.clone(),
                product_name: product.name.clone(),
                kind,
            });
        }
    }

    report.canonicals_without_products = vocab
        .iter()
        .filter(|c| !catalog.has_real_product(&c.name, vocab))
        .map(|c| c.name.clone())
        .collect();

    tracing::info!(
        products = report.summary.products,
        findings = report.findings.len(),
        uncovered = report.canonicals_without_products.len(),
        "catalog audit complete"
    );
    report
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixSummary {
    pub retagged: usize,
    pub cleared: usize,
    /// Compound products whose confidence was lowered to `low`.
    pub demoted: usize,
    pub skipped: usize,
}

/// Apply the fixes an audit found.
///
/// Retagging recomputes the assignment and only applies it at `min_confidence` or
/// above. Tags with no support in the name are cleared only when `clear_mistagged`.
pub fn apply_fixes(
    catalog: &mut Catalog,
    report: &AuditReport,
    vocab: &Vocabulary,
    rules: &ProductRules,
    min_confidence: ConfidenceLevel,
    clear_mistagged: bool,
) -> FixSummary {
    let mut summary = FixSummary::default();

    for finding in &report.findings {
        let Some(product) = catalog.get_mut(&finding.product_id) else {
            summary.skipped += 1;
            continue;
        };

        match &finding.kind {
            FindingKind::BroadMapping { .. }
            | FindingKind::ConflictingTag { .. }
            | FindingKind::MissingTag { .. } => {
                match assign_canonical_tag(product, vocab, rules) {
                    Some(a) if a.confidence >= min_confidence => {
                        tracing::debug!(
                            product = product.id.as_str(),
                            from = ?product.canonical_tag,
                            to = a.canonical.as_str(),
                            "retagged product"
                        );
                        product.canonical_tag = Some(a.canonical);
                        product.confidence_level = Some(a.confidence);
                        summary.retagged += 1;
                    }
                    _ => summary.skipped += 1,
                }
            }
            FindingKind::MisTagged { .. } | FindingKind::UnknownTag { .. } => {
                if clear_mistagged {
                    product.canonical_tag = None;
                    product.confidence_level = None;
                    summary.cleared += 1;
                } else {
                    summary.skipped += 1;
                }
            }
            FindingKind::CompoundProduct { .. } => {
                if product.confidence_level != Some(ConfidenceLevel::Low) {
                    product.confidence_level = Some(ConfidenceLevel::Low);
                    summary.demoted += 1;
                } else {
                    summary.skipped += 1;
                }
            }
        }
    }

    tracing::info!(
        retagged = summary.retagged,
        cleared = summary.cleared,
        demoted = summary.demoted,
        skipped = summary.skipped,
        "applied audit fixes"
    );
    summary
}
