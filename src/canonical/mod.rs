pub mod confidence;
pub mod matcher;
pub mod vocabulary;

pub use confidence::{ConfidenceLevel, MatchThresholds};
pub use matcher::{CanonicalMatch, MatchMethod, ScoredCanonical};
pub use vocabulary::{load_vocabulary, CanonicalIngredient, Vocabulary};
