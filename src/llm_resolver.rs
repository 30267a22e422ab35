//! LLM disambiguation for names the heuristics could not map confidently.
//!
//! The model is shown the top-k vocabulary candidates and answers with a
//! `best_match_index` (1-based, 0 for none) under a strict JSON schema.

use std::collections::HashMap;
use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::api_connection::endpoints::{
    ChatCompletionRequest, ChatMessage, JsonSchema, JsonSchemaDefinition, JsonSchemaProperty,
    Provider, ResponseFormat,
};
use crate::api_connection::ApiConnectionError;
use crate::canonical::ScoredCanonical;
use crate::config::LlmConfig;
use crate::error::Result;

const SYSTEM_PROMPT: &str = "/no_thinking
You are a grocery ingredient matching assistant. Your task is to choose the canonical ingredient that a messy recipe ingredient name refers to, from a numbered list of candidates.
Pay close attention to the form of the ingredient (e.g. 'powder', 'flour', 'oil', 'paste', 'dried', 'canned') and prefer candidates with the same form.
A compound product is not a match for its main ingredient: 'garlic bread' is not 'garlic'.

Respond ONLY with a JSON object strictly adhering to the provided schema: { \"best_match_index\": number }
The number is the 1-based index of the chosen candidate. If no candidate is a good match, respond with 0.";

#[derive(Debug, Serialize, Deserialize, Clone)]
struct DisambiguationResponse {
    best_match_index: i64,
}

fn disambiguation_schema(candidate_count: usize) -> JsonSchemaDefinition {
    let mut properties = HashMap::new();
    properties.insert(
        "best_match_index".to_string(),
        JsonSchemaProperty {
            property_type: "integer".to_string(),
            description: Some(format!(
                "The 1-based index of the best matching candidate (1 to {}). Respond with 0 if no candidate is a good match.",
                candidate_count
            )),
            r#enum: None,
            items: None,
        },
    );

    JsonSchemaDefinition {
        name: "disambiguation_schema".to_string(),
        strict: Some(true),
        schema: JsonSchema {
            schema_type: "object".to_string(),
            properties: Some(properties),
            required: Some(vec!["best_match_index".to_string()]),
            additional_properties: Some(false),
        },
    }
}

fn user_prompt(messy: &str, cleaned: &str, candidates: &[ScoredCanonical]) -> String {
    let list = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{}. \"{}\"", i + 1, c.canonical))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Recipe ingredient: \"{}\"
Cleaned name: \"{}\"

Candidate canonical ingredients:
{}

Which candidate (by number, 1 to {}) is the ingredient? If none are a good match, respond with 0.",
        messy,
        cleaned,
        list,
        candidates.len()
    )
}

/// Strip a surrounding markdown code fence (```json ... ``` or ``` ... ```).
pub fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

/// Map a model reply onto the candidate list. Out-of-range indexes mean no pick.
fn pick_candidate(
    content: &str,
    candidates: &[ScoredCanonical],
) -> std::result::Result<Option<String>, serde_json::Error> {
    let response: DisambiguationResponse = serde_json::from_str(strip_code_fences(content))?;
    let picked = usize::try_from(response.best_match_index)
        .ok()
        .filter(|&i| i >= 1)
        .and_then(|i| candidates.get(i - 1))
        .map(|c| c.canonical.clone());
    Ok(picked)
}

/// Chooses a canonical among candidates for a messy name.
pub trait Disambiguator {
    fn disambiguate(
        &self,
        messy: &str,
        cleaned: &str,
        candidates: &[ScoredCanonical],
    ) -> impl Future<Output = Result<Option<String>>> + Send;
}

pub struct LlmResolver {
    provider: Provider,
    model: String,
}

impl LlmResolver {
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            provider: Provider::openrouter(&config.api_key_env, &config.endpoint),
            model: config.model.clone(),
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.provider.has_api_key()
    }
}

impl Disambiguator for LlmResolver {
    async fn disambiguate(
        &self,
        messy: &str,
        cleaned: &str,
        candidates: &[ScoredCanonical],
    ) -> Result<Option<String>> {
        if candidates.is_empty() {
            return Ok(None);
        }

        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::system(SYSTEM_PROMPT),
                ChatMessage::user(user_prompt(messy, cleaned, candidates)),
            ],
            response_format: Some(ResponseFormat::json_schema(disambiguation_schema(
                candidates.len(),
            ))),
            temperature: Some(0.0),
            max_tokens: Some(50),
        };

        let response = self.provider.call_chat_completion(request).await?;
        let content = response
            .first_content()
            .ok_or(ApiConnectionError::EmptyResponse)?;
        let picked = pick_candidate(content, candidates).map_err(ApiConnectionError::from)?;

        tracing::debug!(messy, picked = ?picked, "llm disambiguation");
        Ok(picked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates() -> Vec<ScoredCanonical> {
        ["garlic", "garlic powder", "garlic salt"]
            .iter()
            .map(|c| ScoredCanonical {
                canonical: c.to_string(),
                score: 0.9,
            })
            .collect()
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{\"a\":1}```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("  {\"a\":1} "), "{\"a\":1}");
    }

    #[test]
    fn test_pick_candidate() {
        let c = candidates();
        assert_eq!(
            pick_candidate("{\"best_match_index\": 2}", &c).unwrap(),
            Some("garlic powder".to_string())
        );
        assert_eq!(pick_candidate("```json\n{\"best_match_index\": 0}\n```", &c).unwrap(), None);
        assert_eq!(pick_candidate("{\"best_match_index\": 4}", &c).unwrap(), None);
        assert_eq!(pick_candidate("{\"best_match_index\": -1}", &c).unwrap(), None);
        assert!(pick_candidate("garlic powder", &c).is_err());
    }

    #[test]
    fn test_prompt_lists_numbered_candidates() {
        let prompt = user_prompt("2 tsp garlic granules", "garlic granules", &candidates());
        assert!(prompt.contains("1. \"garlic\""));
        assert!(prompt.contains("3. \"garlic salt\""));
        assert!(prompt.contains("1 to 3"));
    }

    #[test]
    fn test_schema_requires_index() {
        let schema = disambiguation_schema(3);
        assert_eq!(schema.schema.required, Some(vec!["best_match_index".to_string()]));
        assert!(schema.schema.properties.unwrap().contains_key("best_match_index"));
    }
}
