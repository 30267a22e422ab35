//! Messy ingredient name cleaning.
//!
//! Turns a raw recipe line ("2 cups fresh chopped garlic, minced") into a cleaned
//! name ("garlic") plus the quantity, unit and preparation notes that were stripped.
//! [`normalize_tokens`] defines the key space shared by the vocabulary, messy names
//! and product names.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ParsedIngredient {
    pub raw_text: String,
    pub quantity: Option<String>,
    pub unit: Option<String>,
    pub preparation_notes: Option<String>,
    pub cleaned_name: String,
}

const VULGAR_FRACTIONS: &[(char, &str)] = &[
    ('½', " 1/2"),
    ('¼', " 1/4"),
    ('¾', " 3/4"),
    ('⅓', " 1/3"),
    ('⅔', " 2/3"),
    ('⅛', " 1/8"),
    ('⅜', " 3/8"),
    ('⅝', " 5/8"),
    ('⅞', " 7/8"),
];

/// Clause openers that end the ingredient name proper.
const CLAUSE_BREAKS: &[&str] = &[
    " and/or ",
    " or ",
    " for ",
    " to taste",
    " as needed",
    " plus more",
    " if desired",
];

const NUMBER_WORDS: &[&str] = &[
    "a",
    "an",
    "one",
    "two",
    "three",
    "four",
    "five",
    "six",
    "seven",
    "eight",
    "nine",
    "ten",
    "eleven",
    "twelve",
    "few",
    "several",
    "some",
    "about",
    "approximately",
    "approx",
    "around",
    "couple",
    "dozen",
];

/// Volume and weight units. Dropped wherever they appear.
const MEASURE_UNITS: &[&str] = &[
    "fl", "fluid", "ounces", "ounce", "oz", "tablespoons", "tablespoon", "tbsp", "tbs", "tb",
    "teaspoons", "teaspoon", "tsp", "ts", "cups", "cup", "c", "gallons", "gallon", "gal",
    "quarts", "quart", "qt", "pints", "pint", "pt", "milliliters", "milliliter", "millilitres",
    "millilitre", "ml", "liters", "liter", "litres", "litre", "l", "pounds", "pound", "lbs",
    "lb", "kilograms", "kilogram", "kg", "grams", "gram", "g", "milligrams", "milligram", "mg",
];

/// Count units. Dropped right after a quantity, or trailing a name ("garlic cloves").
const COUNT_UNITS: &[&str] = &[
    "packages", "package", "pkgs", "pkg", "handfuls", "handful", "bottles", "bottle",
    "bunches", "bunch", "pinches", "pinch", "slices", "slice", "sprigs", "sprig", "stalks",
    "stalk", "pieces", "piece", "pcs", "pc", "cloves", "clove", "dashes", "dash", "drops",
    "drop", "heads", "head", "sticks", "stick", "cubes", "cube", "boxes", "box", "cans", "can",
    "jars", "jar", "bags", "bag", "containers", "container", "envelopes", "envelope",
];

/// Count units that may trail the name they measure.
const TRAILING_UNITS: &[&str] = &[
    "cloves", "clove", "stalks", "stalk", "sprigs", "sprig", "sticks", "stick", "heads", "head",
    "slices", "slice", "pieces", "piece",
];

const SIZE_WORDS: &[&str] = &[
    "small",
    "medium",
    "large",
    "extra-large",
    "xl",
    "jumbo",
    "big",
    "medium-size",
    "medium-sized",
    "large-size",
];

/// Preparation and descriptor words with no bearing on which ingredient is meant.
const NOISE_WORDS: &[&str] = &[
    "fresh",
    "freshly",
    "chopped",
    "minced",
    "diced",
    "sliced",
    "finely",
    "coarsely",
    "roughly",
    "thinly",
    "thickly",
    "grated",
    "shredded",
    "peeled",
    "crushed",
    "softened",
    "melted",
    "beaten",
    "lightly",
    "sifted",
    "packed",
    "firmly",
    "loosely",
    "halved",
    "quartered",
    "cubed",
    "julienned",
    "trimmed",
    "rinsed",
    "drained",
    "divided",
    "optional",
    "organic",
    "uncooked",
    "cooked",
    "boneless",
    "skinless",
    "pitted",
    "seeded",
    "deveined",
    "whole",
    "raw",
    "ripe",
    "unsalted",
    "salted",
    "low-sodium",
    "reduced-sodium",
    "low-fat",
    "reduced-fat",
    "fat-free",
    "nonfat",
    "good-quality",
    "quality",
    "store-bought",
    "homemade",
    "chilled",
    "room",
    "temperature",
    "at",
    "cut",
    "torn",
    "into",
    "plus",
    "very",
    "well",
];

/// Modifiers that make a trailing count word part of the name ("ground cloves").
const NAME_BEARING_MODIFIERS: &[&str] = &["ground", "whole", "dried"];

/// Words left unchanged by [`singularize`].
const INVARIANT_WORDS: &[&str] = &[
    "molasses",
    "hummus",
    "asparagus",
    "couscous",
    "swiss",
    "citrus",
    "grits",
    "oats",
    "chives",
    "series",
    "species",
    "bass",
    "watercress",
    "octopus",
    "hibiscus",
];

static NOISE_SET: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    NOISE_WORDS
        .iter()
        .chain(SIZE_WORDS.iter())
        .copied()
        .collect()
});

static ENCLOSED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(([^)]*)\)|\[([^\]]*)\]").expect("valid enclosed regex"));

static QUANTITY_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d+(?:\.\d+)?(?:/\d+)?(?:-\d+(?:\.\d+)?(?:/\d+)?)?x?$")
        .expect("valid quantity regex")
});

/// Sizes written as one token ("2-inch", "5cm").
static DIMENSION_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d+(?:[./]\d+)?-?(?:inch|inches|in|cm)$").expect("valid dimension regex")
});

/// Size units dropped only right after a number ("2 inch piece").
const DIMENSION_UNITS: &[&str] = &["inch", "inches", "in", "cm"];

/// Clean a messy ingredient name down to the words that identify the ingredient.
///
/// Returns an empty string when nothing identifying is left ("to taste", "2 cups").
pub fn clean_ingredient_name(raw: &str) -> String {
    parse_ingredient_line(raw).cleaned_name
}

/// Parse a raw recipe line into quantity, unit, notes and cleaned name.
pub fn parse_ingredient_line(raw: &str) -> ParsedIngredient {
    let raw_text = raw.trim().to_string();
    if raw_text.is_empty() {
        return ParsedIngredient::default();
    }

    let mut notes: Vec<String> = Vec::new();
    let mut text = replace_vulgar_fractions(&raw_text.to_lowercase());

    // Parenthesised or bracketed asides become notes.
    for caps in ENCLOSED.captures_iter(&text) {
        if let Some(inner) = caps.get(1).or_else(|| caps.get(2)) {
            let inner = inner.as_str().trim();
            if !inner.is_empty() {
                notes.push(inner.to_string());
            }
        }
    }
    text = ENCLOSED.replace_all(&text, " ").into_owned();

    if let Some(comma) = text.find(',') {
        let tail = text[comma + 1..].trim();
        if !tail.is_empty() {
            notes.push(tail.to_string());
        }
        text.truncate(comma);
    }

    let padded = format!(" {} ", text);
    if let Some(cut) = CLAUSE_BREAKS.iter().filter_map(|b| padded.find(b)).min() {
        let tail = padded[cut..].trim();
        if !tail.is_empty() {
            notes.push(tail.to_string());
        }
        text = padded[..cut].to_string();
    }

    let scrubbed: String = text
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, ' ' | '\'' | '-' | '.' | '/') {
                c
            } else {
                ' '
            }
        })
        .collect();

    let tokens = drop_dimensions(
        scrubbed
            .split_whitespace()
            .map(|t| t.trim_matches('.').to_string())
            .filter(|t| !t.is_empty()),
    );

    let (quantity, rest) = take_quantity(&tokens);
    let (unit, rest) = take_unit(rest, quantity.is_some());

    let mut name_tokens: Vec<&str> = rest
        .iter()
        .map(String::as_str)
        .filter(|t| !t.chars().any(|c| c.is_ascii_digit()))
        .filter(|t| !NOISE_SET.contains(t) && !MEASURE_UNITS.contains(t))
        .collect();

    while name_tokens.first() == Some(&"of") {
        name_tokens.remove(0);
    }

    if name_tokens.len() >= 2 {
        let last = name_tokens[name_tokens.len() - 1];
        let before = name_tokens[name_tokens.len() - 2];
        if TRAILING_UNITS.contains(&last) && !NAME_BEARING_MODIFIERS.contains(&before) {
            name_tokens.pop();
        }
    }

    let cleaned_name = name_tokens
        .iter()
        .map(|t| {
            t.chars()
                .filter(|c| c.is_alphabetic() || matches!(c, '\'' | '-'))
                .collect::<String>()
        })
        .map(|t| t.trim_matches(|c| c == '-' || c == '\'').to_string())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    ParsedIngredient {
        raw_text,
        quantity,
        unit,
        preparation_notes: if notes.is_empty() {
            None
        } else {
            Some(notes.join("; "))
        },
        cleaned_name,
    }
}

fn replace_vulgar_fractions(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match VULGAR_FRACTIONS.iter().find(|(f, _)| *f == c) {
            Some((_, ascii)) => out.push_str(ascii),
            None => out.push(c),
        }
    }
    out
}

fn is_quantity_token(token: &str) -> bool {
    QUANTITY_TOKEN.is_match(token) || NUMBER_WORDS.contains(&token)
}

/// Consume leading quantity tokens, including "1 to 2" ranges and mixed numbers.
fn take_quantity(tokens: &[String]) -> (Option<String>, &[String]) {
    let mut taken: Vec<&str> = Vec::new();
    let mut idx = 0;
    while idx < tokens.len() {
        let token = tokens[idx].as_str();
        if is_quantity_token(token) {
            taken.push(token);
            idx += 1;
        } else if token == "to"
            && !taken.is_empty()
            && tokens.get(idx + 1).is_some_and(|t| QUANTITY_TOKEN.is_match(t))
        {
            taken.push(token);
            idx += 1;
        } else {
            break;
        }
    }

    // Only number words is not a quantity when they are the whole line ("some").
    if idx == tokens.len() && taken.iter().all(|t| NUMBER_WORDS.contains(t)) {
        return (None, tokens);
    }

    let quantity = if taken.is_empty() {
        None
    } else {
        Some(taken.join(" "))
    };
    (quantity, &tokens[idx..])
}

/// Consume a leading unit (and a following "of"). Single-letter units need a quantity.
fn take_unit(tokens: &[String], has_quantity: bool) -> (Option<String>, &[String]) {
    let Some(first) = tokens.first() else {
        return (None, tokens);
    };

    if let Some(second) = tokens.get(1) {
        let pair = format!("{} {}", first, second);
        if matches!(
            pair.as_str(),
            "fl oz" | "fluid ounce" | "fluid ounces" | "fl ounce" | "fl ounces"
        ) {
            return (Some(pair), skip_of(&tokens[2..]));
        }
    }

    // After a quantity a lone unit is still the unit ("3 cloves" names nothing).
    let is_unit = MEASURE_UNITS.contains(&first.as_str()) || COUNT_UNITS.contains(&first.as_str());
    if is_unit && (has_quantity || (first.len() > 2 && tokens.len() > 1)) {
        return (Some(first.clone()), skip_of(&tokens[1..]));
    }
    (None, tokens)
}

fn drop_dimensions(tokens: impl Iterator<Item = String>) -> Vec<String> {
    let mut kept: Vec<String> = Vec::new();
    for token in tokens {
        let after_number = kept.last().is_some_and(|prev| QUANTITY_TOKEN.is_match(prev));
        if DIMENSION_TOKEN.is_match(&token)
            || (after_number && DIMENSION_UNITS.contains(&token.as_str()))
        {
            continue;
        }
        kept.push(token);
    }
    kept
}

fn skip_of(tokens: &[String]) -> &[String] {
    match tokens.first() {
        Some(t) if t == "of" => &tokens[1..],
        _ => tokens,
    }
}

/// True for unit, size and preparation words that never identify an ingredient.
/// Expects a lowercase (possibly singularized) token.
pub fn is_descriptor_word(token: &str) -> bool {
    NOISE_SET.contains(token) || MEASURE_UNITS.contains(&token) || COUNT_UNITS.contains(&token)
}

/// Singularize a single lowercase word with plain English suffix rules.
pub fn singularize(word: &str) -> String {
    if word.len() <= 3 || INVARIANT_WORDS.contains(&word) {
        return word.to_string();
    }
    if let Some(stem) = word.strip_suffix("ies") {
        if word.len() > 4 {
            return format!("{stem}y");
        }
    }
    if let Some(stem) = word.strip_suffix("oes") {
        return format!("{stem}o");
    }
    for suffix in ["ches", "shes", "sses", "xes"] {
        if word.ends_with(suffix) {
            return word[..word.len() - 2].to_string();
        }
    }
    if word.ends_with('s')
        && !word.ends_with("ss")
        && !word.ends_with("us")
        && !word.ends_with("is")
    {
        return word[..word.len() - 1].to_string();
    }
    word.to_string()
}

/// Lowercase alphanumeric tokens, each singularized. Apostrophes are dropped first.
pub fn normalize_tokens(text: &str) -> Vec<String> {
    text.to_lowercase()
        .replace(['\'', '’'], "")
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(singularize)
        .collect()
}

/// Matching key: normalized tokens joined by a single space.
pub fn singular_key(text: &str) -> String {
    normalize_tokens(text).join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_quantity_unit_and_prep_words() {
        assert_eq!(clean_ingredient_name("2 cups fresh chopped garlic, minced"), "garlic");
        assert_eq!(
            clean_ingredient_name("1 tbsp extra-virgin olive oil"),
            "extra-virgin olive oil"
        );
        assert_eq!(clean_ingredient_name("3 large eggs"), "eggs");
    }

    #[test]
    fn test_garlic_cloves_both_orders() {
        let parsed = parse_ingredient_line("3 cloves garlic, minced");
        assert_eq!(parsed.cleaned_name, "garlic");
        assert_eq!(parsed.quantity.as_deref(), Some("3"));
        assert_eq!(parsed.unit.as_deref(), Some("cloves"));
        assert_eq!(parsed.preparation_notes.as_deref(), Some("minced"));

        assert_eq!(clean_ingredient_name("4 garlic cloves"), "garlic");
        assert_eq!(clean_ingredient_name("1/2 tsp ground cloves"), "ground cloves");
    }

    #[test]
    fn test_parenthetical_can_size() {
        let parsed = parse_ingredient_line("1 (14.5 oz) can diced tomatoes");
        assert_eq!(parsed.cleaned_name, "tomatoes");
        assert_eq!(parsed.unit.as_deref(), Some("can"));
        assert_eq!(parsed.preparation_notes.as_deref(), Some("14.5 oz"));
    }

    #[test]
    fn test_clauses_are_cut() {
        assert_eq!(clean_ingredient_name("Salt, to taste"), "salt");
        assert_eq!(clean_ingredient_name("salt and pepper to taste"), "salt and pepper");
        assert_eq!(clean_ingredient_name("1/2 cup butter or margarine"), "butter");
        assert_eq!(clean_ingredient_name("vegetable oil for frying"), "vegetable oil");
    }

    #[test]
    fn test_fractions_and_ranges() {
        let parsed = parse_ingredient_line("1½ cups all-purpose flour");
        assert_eq!(parsed.quantity.as_deref(), Some("1 1/2"));
        assert_eq!(parsed.cleaned_name, "all-purpose flour");

        let parsed = parse_ingredient_line("2-3 medium potatoes");
        assert_eq!(parsed.quantity.as_deref(), Some("2-3"));
        assert_eq!(parsed.cleaned_name, "potatoes");

        let parsed = parse_ingredient_line("1 to 2 teaspoons of sugar");
        assert_eq!(parsed.quantity.as_deref(), Some("1 to 2"));
        assert_eq!(parsed.unit.as_deref(), Some("teaspoons"));
        assert_eq!(parsed.cleaned_name, "sugar");
    }

    #[test]
    fn test_number_words() {
        assert_eq!(clean_ingredient_name("a pinch of salt"), "salt");
        assert_eq!(clean_ingredient_name("a few sprigs thyme"), "thyme");
        assert_eq!(clean_ingredient_name("one 2-inch piece ginger"), "ginger");
    }

    #[test]
    fn test_size_words_need_a_number() {
        assert_eq!(clean_ingredient_name("1 2 inch piece ginger"), "ginger");
        assert_eq!(
            clean_ingredient_name("2 chicken thighs in adobo"),
            "chicken thighs in adobo"
        );
        assert_eq!(clean_ingredient_name("5cm cinnamon stick"), "cinnamon");
    }

    #[test]
    fn test_lone_unit_after_quantity_is_empty() {
        let parsed = parse_ingredient_line("3 cloves");
        assert_eq!(parsed.unit.as_deref(), Some("cloves"));
        assert_eq!(parsed.cleaned_name, "");
        assert_eq!(clean_ingredient_name("2 cups"), "");
        assert_eq!(clean_ingredient_name("cloves"), "cloves");
    }

    #[test]
    fn test_empty_and_noise_only() {
        assert_eq!(parse_ingredient_line("   "), ParsedIngredient::default());
        assert_eq!(clean_ingredient_name("2 cups"), "");
        assert_eq!(clean_ingredient_name("to taste"), "");
    }

    #[test]
    fn test_singularize() {
        assert_eq!(singularize("berries"), "berry");
        assert_eq!(singularize("tomatoes"), "tomato");
        assert_eq!(singularize("peaches"), "peach");
        assert_eq!(singularize("radishes"), "radish");
        assert_eq!(singularize("cloves"), "clove");
        assert_eq!(singularize("lentils"), "lentil");
        assert_eq!(singularize("molasses"), "molasses");
        assert_eq!(singularize("oats"), "oats");
        assert_eq!(singularize("asparagus"), "asparagus");
        assert_eq!(singularize("pies"), "pie");
        assert_eq!(singularize("egg"), "egg");
    }

    #[test]
    fn test_normalize_tokens_shared_key_space() {
        assert_eq!(singular_key("All-Purpose Flour"), "all purpose flour");
        assert_eq!(singular_key("Roma Tomatoes"), "roma tomato");
        assert_eq!(singular_key("Confectioners' Sugar"), "confectioner sugar");
        assert_eq!(singular_key(""), "");
    }
}
