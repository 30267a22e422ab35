//! Application configuration.
//!
//! Looked up from `--config <path>`, then `./ingredient-canon.toml`, then defaults.
//! CLI flags override config file values.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::api_connection::endpoints::OPENROUTER_CHAT_URL;
use crate::canonical::MatchThresholds;
use crate::catalog::ProductRules;
use crate::error::{CanonError, Result};

pub const CONFIG_FILE_NAME: &str = "ingredient-canon.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub products: ProductsConfig,
    #[serde(default)]
    pub substitutes: SubstitutesConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

/// `[paths]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_vocabulary")]
    pub vocabulary: PathBuf,
    #[serde(default = "default_products")]
    pub products: PathBuf,
    #[serde(default = "default_recipes")]
    pub recipes: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            vocabulary: default_vocabulary(),
            products: default_products(),
            recipes: default_recipes(),
            output_dir: default_output_dir(),
        }
    }
}

fn default_vocabulary() -> PathBuf {
    PathBuf::from("data/canonical_ingredients.csv")
}
fn default_products() -> PathBuf {
    PathBuf::from("data/products.csv")
}
fn default_recipes() -> PathBuf {
    PathBuf::from("data/recipes.json")
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("out")
}

/// `[matching]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    #[serde(default = "default_confident_threshold")]
    pub confident_threshold: f32,
    #[serde(default = "default_suggested_threshold")]
    pub suggested_threshold: f32,
    /// Minimum Jaro-Winkler similarity for a fuzzy canonical match.
    #[serde(default = "default_fuzzy_floor")]
    pub fuzzy_floor: f32,
    /// Candidates offered to the LLM resolver.
    #[serde(default = "default_candidate_count")]
    pub candidate_count: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            confident_threshold: default_confident_threshold(),
            suggested_threshold: default_suggested_threshold(),
            fuzzy_floor: default_fuzzy_floor(),
            candidate_count: default_candidate_count(),
        }
    }
}

fn default_confident_threshold() -> f32 {
    0.90
}
fn default_suggested_threshold() -> f32 {
    0.75
}
fn default_fuzzy_floor() -> f32 {
    0.85
}
fn default_candidate_count() -> usize {
    5
}

/// `[products]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductsConfig {
    /// Extra compound-product words on top of the built-in list.
    #[serde(default)]
    pub extra_compound_words: Vec<String>,
    #[serde(default)]
    pub exclude_low_confidence: bool,
    #[serde(default = "default_true")]
    pub create_generic: bool,
}

impl Default for ProductsConfig {
    fn default() -> Self {
        Self {
            extra_compound_words: Vec::new(),
            exclude_low_confidence: false,
            create_generic: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// `[substitutes]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubstitutesConfig {
    #[serde(default = "default_max_suggestions")]
    pub max_suggestions: usize,
}

impl Default for SubstitutesConfig {
    fn default() -> Self {
        Self {
            max_suggestions: default_max_suggestions(),
        }
    }
}

fn default_max_suggestions() -> usize {
    3
}

/// `[llm]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Name of the env var holding the API key (never the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            model: default_model(),
            endpoint: default_endpoint(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_model() -> String {
    "qwen/qwen3-32b".into()
}
fn default_endpoint() -> String {
    OPENROUTER_CHAT_URL.into()
}

impl AppConfig {
    pub fn thresholds(&self) -> MatchThresholds {
        MatchThresholds {
            confident: self.matching.confident_threshold,
            suggested: self.matching.suggested_threshold,
            fuzzy_floor: self.matching.fuzzy_floor,
        }
    }

    pub fn product_rules(&self) -> ProductRules {
        let mut rules = ProductRules::default();
        rules.add_compound_words(&self.products.extra_compound_words);
        rules.exclude_low_confidence = self.products.exclude_low_confidence;
        rules.create_generic = self.products.create_generic;
        rules
    }

    fn validate(self) -> Result<Self> {
        let m = &self.matching;
        if !(0.0..=1.0).contains(&m.confident_threshold)
            || !(0.0..=1.0).contains(&m.suggested_threshold)
            || m.suggested_threshold > m.confident_threshold
        {
            return Err(CanonError::Config(format!(
                "thresholds must satisfy 0 <= suggested ({}) <= confident ({}) <= 1",
                m.suggested_threshold, m.confident_threshold
            )));
        }
        if !(0.0..=1.0).contains(&m.fuzzy_floor) {
            return Err(CanonError::Config(format!(
                "fuzzy_floor must be within 0..=1, got {}",
                m.fuzzy_floor
            )));
        }
        Ok(self)
    }
}

/// Load config from an explicit path, or from `./ingredient-canon.toml` when present.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    match explicit {
        Some(path) => load_config_from(path),
        None => {
            let path = Path::new(CONFIG_FILE_NAME);
            if path.exists() {
                load_config_from(path)
            } else {
                tracing::debug!("no {} found, using defaults", CONFIG_FILE_NAME);
                Ok(AppConfig::default())
            }
        }
    }
}

pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| CanonError::io(path, e))?;
    let config: AppConfig = toml::from_str(&content)
        .map_err(|e| CanonError::Config(format!("failed to parse {}: {e}", path.display())))?;
    config.validate()
}
