use anyhow::{bail, Context, Result};
use serde::Serialize;
use tokio::fs;

use ingredient_canon::allergens::AllergenProfile;
use ingredient_canon::audit::{apply_fixes, audit_catalog, AuditReport, FixSummary};
use ingredient_canon::backfill::{
    create_missing_generics, resolve_unmapped_with_llm, run_backfill, write_report,
    BackfillOptions, BackfillReport,
};
use ingredient_canon::canonical::{load_vocabulary, CanonicalIngredient, Vocabulary};
use ingredient_canon::catalog::{load_products, match_products, save_products, Catalog};
use ingredient_canon::cli::{init_tracing, parse_args, Command};
use ingredient_canon::config::{load_config, AppConfig};
use ingredient_canon::ingredient_parser::parse_ingredient_line;
use ingredient_canon::llm_resolver::LlmResolver;
use ingredient_canon::recipe_analyzer::{
    analyze_recipe, filter_recipes, load_recipes, AnalysisContext, RecipeReport,
};
use ingredient_canon::substitutes::{suggest_substitutes, SubstituteTable};

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}

fn open_vocabulary(config: &AppConfig) -> Result<Vocabulary> {
    let vocab = load_vocabulary(&config.paths.vocabulary).with_context(|| {
        format!("Failed to load vocabulary from {:?}", config.paths.vocabulary)
    })?;
    Ok(vocab.with_thresholds(config.thresholds()))
}

fn open_catalog(config: &AppConfig) -> Result<Catalog> {
    load_products(&config.paths.products)
        .with_context(|| format!("Failed to load products from {:?}", config.paths.products))
}

/// Accept a canonical name, an alias, or any messy name that maps to one.
fn resolve_canonical<'a>(vocab: &'a Vocabulary, name: &str) -> Result<&'a CanonicalIngredient> {
    if let Some(entry) = vocab.get(name) {
        return Ok(entry);
    }
    match vocab
        .find_canonical_mapping(name)
        .and_then(|m| vocab.get(&m.canonical))
    {
        Some(entry) => Ok(entry),
        None => bail!("'{}' does not match any canonical ingredient", name),
    }
}

async fn llm_pass(report: &mut BackfillReport, vocab: &Vocabulary, config: &AppConfig) -> usize {
    let resolver = LlmResolver::new(&config.llm);
    if !resolver.has_api_key() {
        tracing::warn!(
            env = config.llm.api_key_env.as_str(),
            "LLM API key not set, skipping LLM resolution"
        );
        return 0;
    }
    resolve_unmapped_with_llm(report, vocab, &resolver, config.matching.candidate_count).await
}

#[derive(Serialize)]
struct AuditOutput<'a> {
    report: &'a AuditReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    fixes: Option<FixSummary>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok(); // Load .env file for API keys

    let cli = parse_args();
    init_tracing(cli.verbose, cli.log_format);

    let mut config = load_config(cli.config.as_deref()).context("Failed to load configuration")?;
    cli.datasets.apply(&mut config);

    match cli.command {
        Command::Clean { text } => {
            for line in &text {
                let parsed = parse_ingredient_line(line);
                println!("{} -> {}", parsed.raw_text, parsed.cleaned_name);
                if let Some(quantity) = &parsed.quantity {
                    println!("    quantity: {}", quantity);
                }
                if let Some(unit) = &parsed.unit {
                    println!("    unit: {}", unit);
                }
                if let Some(notes) = &parsed.preparation_notes {
                    println!("    notes: {}", notes);
                }
            }
        }

        Command::Map { input, llm, text } => {
            let vocab = open_vocabulary(&config)?;
            let mut names = text;
            if let Some(path) = input {
                let content = fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("Failed to read input file {:?}", path))?;
                names.extend(
                    content
                        .lines()
                        .map(str::trim)
                        .filter(|l| !l.is_empty())
                        .map(str::to_string),
                );
            }
            if names.is_empty() {
                bail!("nothing to map: pass names or --input");
            }

            let mut report = BackfillReport::default();
            for name in names {
                match vocab.find_canonical_mapping(&name) {
                    Some(m) => report.mappings.push(m),
                    None => report.unmapped.push(name),
                }
            }
            if llm {
                llm_pass(&mut report, &vocab, &config).await;
            }
            print_json(&report)?;
        }

        Command::Products {
            canonical,
            avoid,
            exclude_low,
        } => {
            let vocab = open_vocabulary(&config)?;
            let catalog = open_catalog(&config)?;
            let entry = resolve_canonical(&vocab, &canonical)?;
            let profile = AllergenProfile::parse_list(&avoid)?;
            let mut rules = config.product_rules();
            rules.exclude_low_confidence |= exclude_low;

            print_json(&match_products(entry, &catalog, &vocab, &profile, &rules))?;
        }

        Command::Substitutes {
            canonical,
            avoid,
            max,
        } => {
            let vocab = open_vocabulary(&config)?;
            let catalog = open_catalog(&config)?;
            let entry = resolve_canonical(&vocab, &canonical)?;
            let profile = AllergenProfile::parse_list(&avoid)?;
            let max = max.unwrap_or(config.substitutes.max_suggestions);

            let suggestions = suggest_substitutes(
                entry,
                &profile,
                &vocab,
                &catalog,
                SubstituteTable::builtin(),
                max,
            );
            print_json(&suggestions)?;
        }

        Command::Recipes {
            id,
            avoid,
            safe_only,
            allow_substitutions,
        } => {
            let vocab = open_vocabulary(&config)?;
            let catalog = open_catalog(&config)?;
            let recipes = load_recipes(&config.paths.recipes).with_context(|| {
                format!("Failed to load recipes from {:?}", config.paths.recipes)
            })?;
            let profile = AllergenProfile::parse_list(&avoid)?;
            let rules = config.product_rules();
            let ctx = AnalysisContext {
                vocab: &vocab,
                catalog: &catalog,
                rules: &rules,
                table: SubstituteTable::builtin(),
                max_substitutes: config.substitutes.max_suggestions,
            };

            let reports: Vec<RecipeReport> = recipes
                .iter()
                .filter(|r| id.as_deref().map_or(true, |id| r.id == id))
                .map(|r| analyze_recipe(r, &ctx, &profile))
                .collect();
            if let Some(id) = &id {
                if reports.is_empty() {
                    bail!("no recipe with id '{}'", id);
                }
            }

            if safe_only {
                print_json(&filter_recipes(&reports, allow_substitutions))?;
            } else {
                print_json(&reports)?;
            }
        }

        Command::Audit {
            fix,
            clear_mistagged,
            min_confidence,
        } => {
            let vocab = open_vocabulary(&config)?;
            let mut catalog = open_catalog(&config)?;
            let rules = config.product_rules();

            let report = audit_catalog(&catalog, &vocab, &rules);
            let fixes = if fix {
                let summary = apply_fixes(
                    &mut catalog,
                    &report,
                    &vocab,
                    &rules,
                    min_confidence,
                    clear_mistagged,
                );
                save_products(&catalog, &config.paths.products).with_context(|| {
                    format!("Failed to save products to {:?}", config.paths.products)
                })?;
                Some(summary)
            } else {
                None
            };

            print_json(&AuditOutput {
                report: &report,
                fixes,
            })?;
        }

        Command::Backfill {
            retag_all,
            no_generic,
            llm,
            output,
            dry_run,
        } => {
            let vocab = open_vocabulary(&config)?;
            let mut catalog = open_catalog(&config)?;
            let recipes = load_recipes(&config.paths.recipes).with_context(|| {
                format!("Failed to load recipes from {:?}", config.paths.recipes)
            })?;
            let rules = config.product_rules();
            let options = BackfillOptions {
                retag_all,
                create_generic: rules.create_generic && !no_generic,
            };

            let mut report = run_backfill(&recipes, &vocab, &mut catalog, options, &rules);
            if llm && llm_pass(&mut report, &vocab, &config).await > 0 && options.create_generic {
                let created = create_missing_generics(&report, &vocab, &mut catalog);
                report.stats.generic_created += created;
            }

            let output_dir = output.unwrap_or_else(|| config.paths.output_dir.clone());
            write_report(&report, &output_dir)
                .with_context(|| format!("Failed to write report to {:?}", output_dir))?;
            if dry_run {
                tracing::info!("dry run, catalog not saved");
            } else {
                save_products(&catalog, &config.paths.products).with_context(|| {
                    format!("Failed to save products to {:?}", config.paths.products)
                })?;
            }

            print_json(&report.stats)?;
        }
    }

    Ok(())
}
