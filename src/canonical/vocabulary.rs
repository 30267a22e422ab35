use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};

use super::confidence::MatchThresholds;
use crate::allergens::{parse_allergen_list, Allergen};
use crate::error::{CanonError, Result};
use crate::ingredient_parser::normalize_tokens;

const NAME_COL: &str = "name";
const ALIASES_COL: &str = "aliases";
const CATEGORY_COL: &str = "category";
const ALLERGENS_COL: &str = "allergens";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CanonicalIngredient {
    pub name: String,
    pub aliases: Vec<String>,
    pub category: String,
    pub allergens: BTreeSet<Allergen>,
}

impl CanonicalIngredient {
    pub fn new(name: &str, category: &str) -> Self {
        Self {
            name: name.to_string(),
            aliases: Vec::new(),
            category: category.to_string(),
            allergens: BTreeSet::new(),
        }
    }

    pub fn with_aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases = aliases.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn with_allergens(mut self, allergens: &[Allergen]) -> Self {
        self.allergens = allergens.iter().copied().collect();
        self
    }

    /// Last token of the name, e.g. "butter" for "peanut butter".
    pub fn head_noun(&self) -> Option<String> {
        normalize_tokens(&self.name).pop()
    }
}

/// A name or alias in normalized token form.
#[derive(Debug, Clone)]
pub(crate) struct VocabKey {
    pub key: String,
    pub tokens: Vec<String>,
    pub entry: usize,
    pub is_alias: bool,
}

/// The controlled vocabulary of canonical ingredients.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    entries: Vec<CanonicalIngredient>,
    pub(crate) keys: Vec<VocabKey>,
    pub(crate) index: HashMap<String, usize>,
    pub(crate) thresholds: MatchThresholds,
}

impl Vocabulary {
    /// Build the vocabulary and its key index. Names win over aliases on key collisions.
    pub fn from_entries(entries: Vec<CanonicalIngredient>) -> Result<Self> {
        let mut keys: Vec<VocabKey> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for (entry_idx, entry) in entries.iter().enumerate() {
            let tokens = normalize_tokens(&entry.name);
            let key = tokens.join(" ");
            if key.is_empty() {
                continue;
            }
            if index.contains_key(&key) {
                return Err(CanonError::DuplicateEntry {
                    kind: "canonical ingredient",
                    key: entry.name.clone(),
                });
            }
            index.insert(key.clone(), keys.len());
            keys.push(VocabKey {
                key,
                tokens,
                entry: entry_idx,
                is_alias: false,
            });
        }

        for (entry_idx, entry) in entries.iter().enumerate() {
            for alias in &entry.aliases {
                let tokens = normalize_tokens(alias);
                let key = tokens.join(" ");
                if key.is_empty() {
                    continue;
                }
                if let Some(&existing) = index.get(&key) {
                    if keys[existing].entry != entry_idx {
                        tracing::warn!(
                            alias = alias.as_str(),
                            canonical = entry.name.as_str(),
                            "alias collides with another vocabulary key, ignoring"
                        );
                    }
                    continue;
                }
                index.insert(key.clone(), keys.len());
                keys.push(VocabKey {
                    key,
                    tokens,
                    entry: entry_idx,
                    is_alias: true,
                });
            }
        }

        Ok(Self {
            entries,
            keys,
            index,
            thresholds: MatchThresholds::default(),
        })
    }

    pub fn with_thresholds(mut self, thresholds: MatchThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn thresholds(&self) -> &MatchThresholds {
        &self.thresholds
    }

    /// Look up a canonical ingredient by name (or alias), in any surface form.
    pub fn get(&self, name: &str) -> Option<&CanonicalIngredient> {
        let key = normalize_tokens(name).join(" ");
        self.index
            .get(&key)
            .map(|&k| &self.entries[self.keys[k].entry])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CanonicalIngredient> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn entry(&self, idx: usize) -> &CanonicalIngredient {
        &self.entries[idx]
    }

    /// Every key (name and aliases) belonging to the named canonical.
    pub fn keys_for(&self, name: &str) -> Vec<&[String]> {
        let Some(&k) = self.index.get(&normalize_tokens(name).join(" ")) else {
            return Vec::new();
        };
        let entry = self.keys[k].entry;
        self.keys
            .iter()
            .filter(|vk| vk.entry == entry)
            .map(|vk| vk.tokens.as_slice())
            .collect()
    }
}

fn split_multi(cell: &str) -> Vec<String> {
    cell.split('|')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Load the controlled vocabulary from CSV (`name,aliases,category,allergens`).
pub fn load_vocabulary(csv_path: &Path) -> Result<Vocabulary> {
    if !csv_path.exists() {
        return Err(CanonError::io(
            csv_path,
            std::io::Error::new(std::io::ErrorKind::NotFound, "vocabulary CSV file not found"),
        ));
    }

    let file = std::fs::File::open(csv_path).map_err(|e| CanonError::io(csv_path, e))?;
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers = rdr.headers().map_err(|e| CanonError::csv(csv_path, e))?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name))
            .ok_or_else(|| CanonError::missing_column(name, csv_path))
    };
    let name_idx = column(NAME_COL)?;
    let aliases_idx = column(ALIASES_COL)?;
    let category_idx = column(CATEGORY_COL)?;
    let allergens_idx = column(ALLERGENS_COL)?;

    let mut entries = Vec::new();
    for (row_index, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| CanonError::csv(csv_path, e))?;

        let name = record.get(name_idx).unwrap_or_default().to_lowercase();
        if name.is_empty() {
            tracing::warn!(row = row_index + 1, "skipping vocabulary row with empty name");
            continue;
        }

        entries.push(CanonicalIngredient {
            name,
            aliases: split_multi(&record.get(aliases_idx).unwrap_or_default().to_lowercase()),
            category: record.get(category_idx).unwrap_or_default().to_string(),
            allergens: parse_allergen_list(record.get(allergens_idx).unwrap_or_default())?,
        });
    }

    if entries.is_empty() {
        return Err(CanonError::EmptyDataset {
            path: csv_path.to_path_buf(),
        });
    }

    tracing::info!(entries = entries.len(), path = ?csv_path, "loaded canonical vocabulary");
    Vocabulary::from_entries(entries)
}
