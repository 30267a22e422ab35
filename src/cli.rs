use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::canonical::ConfidenceLevel;
use crate::config::AppConfig;

/// Clean messy ingredient names, map them to canonical ingredients and match
/// grocery products safe for an allergen profile.
#[derive(Parser, Debug)]
#[command(name = "ingredient-canon", author, version)]
pub struct Cli {
    /// Config file (defaults to ./ingredient-canon.toml when present)
    #[arg(long, global = true, env = "INGREDIENT_CANON_CONFIG")]
    pub config: Option<PathBuf>,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log format
    #[arg(long, value_enum, default_value = "text", global = true)]
    pub log_format: LogFormat,

    #[command(flatten)]
    pub datasets: DatasetArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Dataset overrides. Unset paths come from the config.
#[derive(Args, Debug, Default, Clone)]
pub struct DatasetArgs {
    /// Canonical vocabulary CSV
    #[arg(long, global = true)]
    pub vocabulary: Option<PathBuf>,

    /// Product catalog CSV
    #[arg(long, global = true)]
    pub products: Option<PathBuf>,

    /// Recipes JSON
    #[arg(long, global = true)]
    pub recipes: Option<PathBuf>,
}

impl DatasetArgs {
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(path) = &self.vocabulary {
            config.paths.vocabulary = path.clone();
        }
        if let Some(path) = &self.products {
            config.paths.products = path.clone();
        }
        if let Some(path) = &self.recipes {
            config.paths.recipes = path.clone();
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Clean raw ingredient lines and show the parsed parts
    Clean {
        #[arg(required = true)]
        text: Vec<String>,
    },

    /// Map messy names to canonical ingredients
    Map {
        /// File with one messy name per line
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Ask the LLM about unmapped and low-confidence names
        #[arg(long)]
        llm: bool,

        text: Vec<String>,
    },

    /// Show the products for a canonical ingredient
    Products {
        canonical: String,

        /// Allergens to avoid, comma or pipe separated
        #[arg(long, default_value = "")]
        avoid: String,

        /// Exclude products tagged with low confidence
        #[arg(long)]
        exclude_low: bool,
    },

    /// Suggest substitutes for a canonical ingredient
    Substitutes {
        canonical: String,

        /// Allergens to avoid, comma or pipe separated
        #[arg(long)]
        avoid: String,

        /// Maximum number of suggestions
        #[arg(long)]
        max: Option<usize>,
    },

    /// Analyze recipes against an allergen profile
    Recipes {
        /// Only this recipe
        #[arg(long)]
        id: Option<String>,

        /// Allergens to avoid, comma or pipe separated
        #[arg(long, default_value = "")]
        avoid: String,

        /// Only print recipes the profile can cook
        #[arg(long)]
        safe_only: bool,

        /// With --safe-only, keep recipes fixable by substitution
        #[arg(long)]
        allow_substitutions: bool,
    },

    /// Audit product tags against the vocabulary
    Audit {
        /// Apply fixes and save the catalog
        #[arg(long)]
        fix: bool,

        /// Clear mis-tagged and unknown tags when fixing
        #[arg(long)]
        clear_mistagged: bool,

        /// Minimum confidence of a fresh assignment to retag with
        #[arg(long, default_value = "confident", value_parser = parse_confidence)]
        min_confidence: ConfidenceLevel,
    },

    /// Map every recipe ingredient, tag products and create generic products
    Backfill {
        /// Retag products that already have a tag
        #[arg(long)]
        retag_all: bool,

        /// Do not create generic products
        #[arg(long)]
        no_generic: bool,

        /// Ask the LLM about unmapped and low-confidence names
        #[arg(long)]
        llm: bool,

        /// Report directory (defaults to paths.output_dir)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Map and report without saving the catalog
        #[arg(long)]
        dry_run: bool,
    },
}

fn parse_confidence(s: &str) -> Result<ConfidenceLevel, String> {
    s.parse().map_err(|e: crate::error::CanonError| e.to_string())
}

pub fn parse_args() -> Cli {
    Cli::parse()
}

/// Initialize tracing based on CLI flags. `RUST_LOG` wins over `-v`.
pub fn init_tracing(verbose: u8, format: LogFormat) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = match verbose {
        0 => "ingredient_canon=info",
        1 => "ingredient_canon=debug",
        _ => "ingredient_canon=trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    // Logs go to stderr so stdout stays clean for JSON output.
    match format {
        LogFormat::Text => fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init(),
    }
}
