//! Allergen taxonomy and keyword detection.
//!
//! Detection works on product names, ingredient statements and cleaned ingredient
//! names. Phrases such as "almond milk" or "gluten-free" are handled before the
//! keyword scan so they do not produce false positives.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CanonError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Allergen {
    Milk,
    Egg,
    Peanut,
    TreeNut,
    Wheat,
    Gluten,
    Soy,
    Fish,
    Shellfish,
    Sesame,
}

impl Allergen {
    pub const ALL: [Allergen; 10] = [
        Allergen::Milk,
        Allergen::Egg,
        Allergen::Peanut,
        Allergen::TreeNut,
        Allergen::Wheat,
        Allergen::Gluten,
        Allergen::Soy,
        Allergen::Fish,
        Allergen::Shellfish,
        Allergen::Sesame,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Allergen::Milk => "milk",
            Allergen::Egg => "egg",
            Allergen::Peanut => "peanut",
            Allergen::TreeNut => "tree_nut",
            Allergen::Wheat => "wheat",
            Allergen::Gluten => "gluten",
            Allergen::Soy => "soy",
            Allergen::Fish => "fish",
            Allergen::Shellfish => "shellfish",
            Allergen::Sesame => "sesame",
        }
    }

    fn keywords(&self) -> &'static [&'static str] {
        match self {
            Allergen::Milk => &[
                "milk", "butter", "buttermilk", "cheese", "cream", "yogurt", "yoghurt", "whey",
                "casein", "ghee", "parmesan", "mozzarella", "cheddar", "ricotta", "feta",
                "lactose", "custard", "half and half", "creme fraiche", "mascarpone",
            ],
            Allergen::Egg => &["egg", "mayonnaise", "mayo", "meringue", "albumin", "aioli"],
            Allergen::Peanut => &["peanut", "groundnut"],
            Allergen::TreeNut => &[
                "almond", "walnut", "pecan", "cashew", "pistachio", "hazelnut", "macadamia",
                "pine nut", "brazil nut", "praline", "marzipan", "nut",
            ],
            Allergen::Wheat => &[
                "wheat", "flour", "bread", "breadcrumb", "bread crumb", "panko", "pasta",
                "spaghetti", "penne", "macaroni", "noodle", "couscous", "semolina", "bulgur",
                "farro", "spelt", "tortilla", "cracker", "crouton", "seitan",
            ],
            Allergen::Gluten => &["barley", "rye", "malt", "seitan"],
            Allergen::Soy => &["soy", "soya", "soybean", "tofu", "edamame", "tempeh", "miso"],
            Allergen::Fish => &[
                "fish", "salmon", "tuna", "cod", "anchovy", "anchovies", "sardine", "tilapia",
                "halibut", "trout", "mackerel", "haddock", "worcestershire",
            ],
            Allergen::Shellfish => &[
                "shrimp", "prawn", "crab", "lobster", "scallop", "clam", "mussel", "oyster",
                "crawfish", "crayfish",
            ],
            Allergen::Sesame => &["sesame", "tahini"],
        }
    }

    /// Phrases removed before scanning for this allergen's keywords.
    fn exceptions(&self) -> &'static [&'static str] {
        match self {
            Allergen::Milk => &[
                "coconut milk", "almond milk", "oat milk", "soy milk", "rice milk",
                "cashew milk", "hemp milk", "coconut cream", "coconut yogurt", "peanut butter",
                "almond butter", "cashew butter", "sunflower seed butter", "seed butter",
                "apple butter", "cocoa butter", "shea butter", "cream of tartar", "vegan butter",
                "vegan cheese", "plant butter", "cream soda",
            ],
            Allergen::Egg => &["eggplant", "egg-free", "vegan mayo", "vegan mayonnaise"],
            Allergen::TreeNut => &["nutmeg", "coconut", "butternut", "water chestnut", "nut-free"],
            Allergen::Peanut => &["peanut-free"],
            Allergen::Wheat => &[
                "rice flour", "almond flour", "coconut flour", "corn flour", "cornflour",
                "chickpea flour", "tapioca flour", "potato flour", "oat flour",
                "buckwheat flour", "cassava flour", "rice noodle", "rice pasta",
                "corn tortilla", "rice cracker", "gluten-free", "gluten free",
                "buckwheat", "rice bread",
            ],
            Allergen::Gluten => &["gluten-free", "gluten free"],
            Allergen::Soy => &["soy-free"],
            Allergen::Fish => &["fish-free"],
            Allergen::Shellfish => &[],
            Allergen::Sesame => &["sesame-free"],
        }
    }
}

impl fmt::Display for Allergen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Allergen {
    type Err = CanonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        let allergen = match normalized.as_str() {
            "milk" | "dairy" | "lactose" => Allergen::Milk,
            "egg" | "eggs" => Allergen::Egg,
            "peanut" | "peanuts" => Allergen::Peanut,
            "tree_nut" | "tree_nuts" | "treenut" | "nut" | "nuts" => Allergen::TreeNut,
            "wheat" => Allergen::Wheat,
            "gluten" => Allergen::Gluten,
            "soy" | "soya" | "soybean" | "soybeans" => Allergen::Soy,
            "fish" => Allergen::Fish,
            "shellfish" | "crustacean" | "crustaceans" => Allergen::Shellfish,
            "sesame" => Allergen::Sesame,
            _ => return Err(CanonError::UnknownAllergen(s.trim().to_string())),
        };
        Ok(allergen)
    }
}

/// Parse a `|`- or `,`-separated allergen list. Empty input gives an empty set.
pub fn parse_allergen_list(list: &str) -> Result<BTreeSet<Allergen>, CanonError> {
    list.split(['|', ','])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect()
}

pub fn format_allergen_list(set: &BTreeSet<Allergen>) -> String {
    set.iter().map(Allergen::as_str).collect::<Vec<_>>().join("|")
}

/// "Free-from" markers and the allergens each one rules out.
const SUPPRESSORS: &[(&str, &[Allergen])] = &[
    ("dairy-free", &[Allergen::Milk]),
    ("dairy free", &[Allergen::Milk]),
    ("non-dairy", &[Allergen::Milk]),
    ("lactose-free", &[Allergen::Milk]),
    ("vegan", &[Allergen::Milk, Allergen::Egg, Allergen::Fish, Allergen::Shellfish]),
    ("plant-based", &[Allergen::Milk, Allergen::Egg]),
    ("gluten-free", &[Allergen::Wheat, Allergen::Gluten]),
    ("gluten free", &[Allergen::Wheat, Allergen::Gluten]),
    ("nut-free", &[Allergen::TreeNut, Allergen::Peanut]),
    ("peanut-free", &[Allergen::Peanut]),
    ("egg-free", &[Allergen::Egg]),
    ("soy-free", &[Allergen::Soy]),
];

struct AllergenPattern {
    allergen: Allergen,
    keywords: Regex,
    exceptions: Option<Regex>,
}

fn alternation(words: &[&str]) -> String {
    words
        .iter()
        .map(|w| regex::escape(w))
        .collect::<Vec<_>>()
        .join("|")
}

static PATTERNS: LazyLock<Vec<AllergenPattern>> = LazyLock::new(|| {
    Allergen::ALL
        .iter()
        .map(|&allergen| {
            let keywords = Regex::new(&format!(
                r"\b(?:{})(?:s|es)?\b",
                alternation(allergen.keywords())
            ))
            .expect("valid allergen keyword regex");
            let exceptions = if allergen.exceptions().is_empty() {
                None
            } else {
                Some(
                    Regex::new(&format!(r"\b(?:{})(?:s|es)?\b", alternation(allergen.exceptions())))
                        .expect("valid allergen exception regex"),
                )
            };
            AllergenPattern {
                allergen,
                keywords,
                exceptions,
            }
        })
        .collect()
});

/// Free-from markers, matched on word boundaries ("peanut-free" is not "nut-free").
static SUPPRESSOR_PATTERNS: LazyLock<Vec<(Regex, &'static [Allergen])>> = LazyLock::new(|| {
    SUPPRESSORS
        .iter()
        .map(|&(marker, allergens)| {
            let pattern = Regex::new(&format!(r"\b{}\b", regex::escape(marker)))
                .expect("valid free-from marker regex");
            (pattern, allergens)
        })
        .collect()
});

/// Detect allergens mentioned in free text. Wheat implies gluten.
pub fn detect_allergens(text: &str) -> BTreeSet<Allergen> {
    let lower = text.to_lowercase();
    let mut found = BTreeSet::new();
    if lower.trim().is_empty() {
        return found;
    }

    let suppressed: BTreeSet<Allergen> = SUPPRESSOR_PATTERNS
        .iter()
        .filter(|(marker, _)| marker.is_match(&lower))
        .flat_map(|(_, allergens)| allergens.iter().copied())
        .collect();

    for pattern in PATTERNS.iter() {
        if suppressed.contains(&pattern.allergen) {
            continue;
        }
        let scanned = match &pattern.exceptions {
            Some(exceptions) => exceptions.replace_all(&lower, " ").into_owned(),
            None => lower.clone(),
        };
        if pattern.keywords.is_match(&scanned) {
            found.insert(pattern.allergen);
        }
    }

    if found.contains(&Allergen::Wheat) && !suppressed.contains(&Allergen::Gluten) {
        found.insert(Allergen::Gluten);
    }
    found
}

/// The allergens a user must avoid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllergenProfile {
    pub avoid: BTreeSet<Allergen>,
}

impl AllergenProfile {
    pub fn new(avoid: impl IntoIterator<Item = Allergen>) -> Self {
        Self {
            avoid: avoid.into_iter().collect(),
        }
    }

    pub fn parse_list(list: &str) -> Result<Self, CanonError> {
        Ok(Self {
            avoid: parse_allergen_list(list)?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.avoid.is_empty()
    }

    pub fn conflicts(&self, allergens: &BTreeSet<Allergen>) -> BTreeSet<Allergen> {
        self.avoid.intersection(allergens).copied().collect()
    }

    pub fn is_safe(&self, allergens: &BTreeSet<Allergen>) -> bool {
        self.avoid.is_disjoint(allergens)
    }
}
