use std::cmp::Ordering;
use std::collections::BinaryHeap;

use serde::{Deserialize, Serialize};
use strsim::jaro_winkler;

use super::confidence::ConfidenceLevel;
use super::vocabulary::Vocabulary;
use crate::ingredient_parser::{clean_ingredient_name, normalize_tokens};

const EXACT_SCORE: f32 = 1.0;
const ALIAS_SCORE: f32 = 0.95;
const HEAD_NOUN_SCORE: f32 = 0.90;
const CONTAINED_SCORE: f32 = 0.75;
const FUZZY_WEIGHT: f32 = 0.85;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    Exact,
    Alias,
    HeadNoun,
    Contained,
    Fuzzy,
    Llm,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CanonicalMatch {
    pub messy_name: String,
    pub cleaned_name: String,
    pub canonical: String,
    pub score: f32,
    pub confidence: ConfidenceLevel,
    pub method: MatchMethod,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredCanonical {
    pub canonical: String,
    pub score: f32,
}

#[derive(PartialEq)]
struct ScoredIndex {
    score: f32,
    index: usize,
}

impl Eq for ScoredIndex {}

impl PartialOrd for ScoredIndex {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScoredIndex {
    // Reversed so BinaryHeap pops the lowest score first; NaN sorts lowest.
    fn cmp(&self, other: &Self) -> Ordering {
        other.score.partial_cmp(&self.score).unwrap_or_else(|| {
            if self.score.is_nan() && !other.score.is_nan() {
                Ordering::Less
            } else if !self.score.is_nan() && other.score.is_nan() {
                Ordering::Greater
            } else {
                Ordering::Equal
            }
        })
    }
}

/// Position of the rightmost contiguous occurrence of `needle` in `haystack`.
pub(crate) fn find_token_run(haystack: &[String], needle: &[String]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    (0..=haystack.len() - needle.len())
        .rev()
        .find(|&start| haystack[start..start + needle.len()] == *needle)
}

impl Vocabulary {
    /// Map a messy name to its canonical ingredient.
    ///
    /// Tries exact and alias keys, then the most specific vocabulary phrase contained
    /// in the cleaned name, then Jaro-Winkler similarity above the fuzzy floor.
    pub fn find_canonical_mapping(&self, messy: &str) -> Option<CanonicalMatch> {
        let cleaned = clean_ingredient_name(messy);
        let tokens = normalize_tokens(&cleaned);
        if tokens.is_empty() {
            return None;
        }
        let key = tokens.join(" ");

        let (entry, score, method) = self
            .exact_match(&key)
            .or_else(|| self.phrase_match(&tokens))
            .or_else(|| self.fuzzy_match(&key))?;

        let found = CanonicalMatch {
            messy_name: messy.trim().to_string(),
            cleaned_name: cleaned,
            canonical: self.entry(entry).name.clone(),
            score,
            confidence: ConfidenceLevel::from_score(score, &self.thresholds),
            method,
        };
        tracing::debug!(
            messy = found.messy_name.as_str(),
            canonical = found.canonical.as_str(),
            score = found.score,
            method = ?found.method,
            "mapped messy name"
        );
        Some(found)
    }

    fn exact_match(&self, key: &str) -> Option<(usize, f32, MatchMethod)> {
        let vk = &self.keys[*self.index.get(key)?];
        if vk.is_alias {
            Some((vk.entry, ALIAS_SCORE, MatchMethod::Alias))
        } else {
            Some((vk.entry, EXACT_SCORE, MatchMethod::Exact))
        }
    }

    /// Most specific vocabulary key occurring as a token run: most tokens, then
    /// longest, then rightmost.
    fn phrase_match(&self, tokens: &[String]) -> Option<(usize, f32, MatchMethod)> {
        let (vk, pos) = self
            .keys
            .iter()
            .filter_map(|vk| find_token_run(tokens, &vk.tokens).map(|pos| (vk, pos)))
            .max_by(|(a, a_pos), (b, b_pos)| {
                a.tokens
                    .len()
                    .cmp(&b.tokens.len())
                    .then(a.key.len().cmp(&b.key.len()))
                    .then(a_pos.cmp(b_pos))
                    .then(b.is_alias.cmp(&a.is_alias))
            })?;

        if pos + vk.tokens.len() == tokens.len() {
            Some((vk.entry, HEAD_NOUN_SCORE, MatchMethod::HeadNoun))
        } else {
            Some((vk.entry, CONTAINED_SCORE, MatchMethod::Contained))
        }
    }

    fn fuzzy_match(&self, key: &str) -> Option<(usize, f32, MatchMethod)> {
        let (entry, similarity) = self
            .keys
            .iter()
            .map(|vk| (vk.entry, jaro_winkler(key, &vk.key) as f32))
            .filter(|(_, sim)| !sim.is_nan())
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal))?;

        if similarity < self.thresholds.fuzzy_floor {
            return None;
        }
        Some((entry, similarity * FUZZY_WEIGHT, MatchMethod::Fuzzy))
    }

    /// Top-k canonical entries by Jaro-Winkler similarity to a cleaned name,
    /// highest first. Each entry is scored by its best name or alias.
    pub fn candidates(&self, cleaned: &str, k: usize) -> Vec<ScoredCanonical> {
        let key = normalize_tokens(cleaned).join(" ");
        if key.is_empty() || k == 0 {
            return Vec::new();
        }

        let mut best = vec![f32::NEG_INFINITY; self.len()];
        for vk in &self.keys {
            let sim = jaro_winkler(&key, &vk.key) as f32;
            if sim > best[vk.entry] {
                best[vk.entry] = sim;
            }
        }

        let mut heap = BinaryHeap::with_capacity(k + 1);
        for (index, &score) in best.iter().enumerate() {
            if score == f32::NEG_INFINITY {
                continue;
            }
            heap.push(ScoredIndex { score, index });
            if heap.len() > k {
                heap.pop();
            }
        }

        heap.into_sorted_vec()
            .into_iter()
            .map(|si| ScoredCanonical {
                canonical: self.entry(si.index).name.clone(),
                score: si.score,
            })
            .collect()
    }
}
