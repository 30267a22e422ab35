use dotenv::dotenv;
use ingredient_canon::api_connection::{
    connection::ApiConnectionError,
    endpoints::{
        ChatCompletionRequest, ChatMessage, JsonSchema, JsonSchemaDefinition, JsonSchemaProperty,
        Provider, ResponseFormat, OPENROUTER_CHAT_URL,
    },
};
use ingredient_canon::canonical::ScoredCanonical;
use ingredient_canon::config::LlmConfig;
use ingredient_canon::llm_resolver::{strip_code_fences, Disambiguator, LlmResolver};
use std::collections::HashMap;
use std::env;

const TEST_API_KEY_ENV_VAR: &str = "OPENROUTER_API_KEY";
const TEST_MODEL: &str = "qwen/qwen3-32b";

fn setup_test_environment() {
    dotenv().ok();
}

fn hello_request() -> ChatCompletionRequest {
    ChatCompletionRequest {
        model: TEST_MODEL.to_string(),
        messages: vec![ChatMessage::user("Hello")],
        response_format: None,
        temperature: None,
        max_tokens: None,
    }
}

#[tokio::test]
async fn test_missing_api_key_error() {
    setup_test_environment();
    let provider =
        Provider::openrouter("THIS_KEY_SHOULD_NOT_EXIST_IN_ENV_ABXYZ", OPENROUTER_CHAT_URL);
    assert!(!provider.has_api_key());

    let result = provider.call_chat_completion(hello_request()).await;
    match result {
        Err(ApiConnectionError::MissingApiKey(key_name)) => {
            assert_eq!(key_name, "THIS_KEY_SHOULD_NOT_EXIST_IN_ENV_ABXYZ")
        }
        other => panic!("expected MissingApiKey, got {:?}", other.map(|r| r.id)),
    }
}

#[tokio::test]
async fn test_resolver_without_key_is_an_error_not_a_pick() {
    setup_test_environment();
    let config = LlmConfig {
        api_key_env: "ANOTHER_KEY_THAT_IS_NOT_SET_QWERTY".to_string(),
        ..LlmConfig::default()
    };
    let resolver = LlmResolver::new(&config);
    assert!(!resolver.has_api_key());

    let candidates = vec![ScoredCanonical {
        canonical: "garlic".to_string(),
        score: 0.9,
    }];
    let result = resolver
        .disambiguate("3 cloves garlic", "garlic", &candidates)
        .await;
    assert!(result.is_err());

    // No candidates short-circuits before any request is made.
    let result = resolver.disambiguate("mystery", "mystery", &[]).await;
    assert_eq!(result.unwrap(), None);
}

#[tokio::test]
#[ignore]
async fn test_successful_non_structured_call() {
    setup_test_environment();
    if env::var(TEST_API_KEY_ENV_VAR).is_err() {
        println!(
            "Skipping test_successful_non_structured_call: {} not set.",
            TEST_API_KEY_ENV_VAR
        );
        return;
    }

    let provider = Provider::openrouter_default(TEST_API_KEY_ENV_VAR);
    let request = ChatCompletionRequest {
        model: TEST_MODEL.to_string(),
        messages: vec![ChatMessage::user(
            "Name the main ingredient of guacamole in one word. /no_thinking",
        )],
        response_format: None,
        temperature: Some(0.0),
        max_tokens: Some(100),
    };

    let response = provider
        .call_chat_completion(request)
        .await
        .expect("API call failed");
    let content = response.first_content().expect("empty response");
    assert!(content.to_lowercase().contains("avocado"));
}

#[tokio::test]
#[ignore]
async fn test_successful_structured_call() {
    setup_test_environment();
    if env::var(TEST_API_KEY_ENV_VAR).is_err() {
        println!(
            "Skipping test_successful_structured_call: {} not set.",
            TEST_API_KEY_ENV_VAR
        );
        return;
    }
    let provider = Provider::openrouter_default(TEST_API_KEY_ENV_VAR);

    let mut properties = HashMap::new();
    properties.insert(
        "ingredient".to_string(),
        JsonSchemaProperty {
            property_type: "string".to_string(),
            description: Some("The ingredient name without quantity or unit.".to_string()),
            r#enum: None,
            items: None,
        },
    );
    properties.insert(
        "allergens".to_string(),
        JsonSchemaProperty {
            property_type: "array".to_string(),
            description: Some("Major allergens the ingredient contains.".to_string()),
            r#enum: None,
            items: Some(Box::new(JsonSchemaProperty {
                property_type: "string".to_string(),
                description: None,
                r#enum: None,
                items: None,
            })),
        },
    );

    let schema_def = JsonSchemaDefinition {
        name: "ingredient_details".to_string(),
        strict: Some(false),
        schema: JsonSchema {
            schema_type: "object".to_string(),
            properties: Some(properties),
            required: Some(vec!["ingredient".to_string(), "allergens".to_string()]),
            additional_properties: Some(true),
        },
    };

    let request = ChatCompletionRequest {
        model: TEST_MODEL.to_string(),
        messages: vec![
            ChatMessage::system(
                "You extract ingredient information as JSON following the provided schema. /no_thinking",
            ),
            ChatMessage::user("2 tbsp unsalted butter, softened"),
        ],
        response_format: Some(ResponseFormat::json_schema(schema_def)),
        temperature: Some(0.0),
        max_tokens: Some(300),
    };

    let response = provider
        .call_chat_completion(request)
        .await
        .expect("API call failed");
    let raw_content = response.first_content().expect("empty response");
    let parsed: serde_json::Value = serde_json::from_str(strip_code_fences(raw_content))
        .unwrap_or_else(|e| panic!("not valid JSON ({e}): '{raw_content}'"));
    assert!(parsed.get("ingredient").unwrap().is_string());
    assert!(parsed.get("allergens").unwrap().is_array());
}

#[tokio::test]
#[ignore]
async fn test_resolver_picks_candidate() {
    setup_test_environment();
    if env::var(TEST_API_KEY_ENV_VAR).is_err() {
        println!(
            "Skipping test_resolver_picks_candidate: {} not set.",
            TEST_API_KEY_ENV_VAR
        );
        return;
    }

    let resolver = LlmResolver::new(&LlmConfig::default());
    let candidates: Vec<ScoredCanonical> = ["garlic", "garlic powder", "garlic salt"]
        .iter()
        .map(|c| ScoredCanonical {
            canonical: c.to_string(),
            score: 0.8,
        })
        .collect();

    let picked = resolver
        .disambiguate("1 tsp granulated garlic powder", "garlic powder", &candidates)
        .await
        .expect("API call failed");
    assert_eq!(picked.as_deref(), Some("garlic powder"));
}

#[tokio::test]
#[ignore]
async fn test_api_error_with_invalid_key() {
    setup_test_environment();

    const INVALID_KEY_ENV_NAME_FOR_THIS_TEST: &str = "ENV_VAR_WITH_BAD_KEY_VALUE";
    env::set_var(
        INVALID_KEY_ENV_NAME_FOR_THIS_TEST,
        "this_is_a_deliberately_bad_api_key_string_for_testing",
    );

    let provider = Provider::openrouter_default(INVALID_KEY_ENV_NAME_FOR_THIS_TEST);
    let result = provider.call_chat_completion(hello_request()).await;
    match result {
        Err(ApiConnectionError::Api { status, .. }) => {
            assert!(status == 401 || status == 403, "unexpected status {}", status)
        }
        other => panic!("expected an API error, got {:?}", other.map(|r| r.id)),
    }
}
