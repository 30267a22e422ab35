pub mod allergens;
pub mod api_connection;
pub mod audit;
pub mod backfill;
pub mod canonical;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod ingredient_parser;
pub mod llm_resolver;
pub mod recipe_analyzer;
pub mod substitutes;

pub use error::{CanonError, Result};
