use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use ingredient_reconciler::catalog::IngredientCatalog;
use ingredient_reconciler::coverage::CoverageResult;
use ingredient_reconciler::export::{aggregate_to_csv, grocery_list_to_csv, render_json};
use ingredient_reconciler::grocery_list::{GroceryList, ReconcileMode};
use ingredient_reconciler::ingredient_model::{
    Ingredient, MealPlanAssignment, PantryItem, Recipe, RecipeId,
};
use ingredient_reconciler::pantry::PantrySnapshot;
use ingredient_reconciler::quantity_normalizer::round_for_display;
use ingredient_reconciler::{EngineConfig, ReconciliationEngine};
use serde::Deserialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const CONFIG_ENV: &str = "RECONCILER_CONFIG";

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
    Csv,
}

#[derive(Debug, Parser)]
#[command(
    name = "reconciler",
    about = "Pantry coverage, meal-plan aggregation and grocery list reconciliation"
)]
struct Cli {
    /// JSON file holding catalog, recipes, pantry, plan and previous list
    #[arg(short, long)]
    input: Option<PathBuf>,
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,
    /// Evaluate expirations as of this date (YYYY-MM-DD) instead of now
    #[arg(long)]
    today: Option<NaiveDate>,
    #[arg(long)]
    log_json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Coverage {
        #[arg(long)]
        recipe: String,
    },
    Rank {
        #[arg(long, default_value_t = 0)]
        min_coverage: u8,
    },
    Aggregate,
    Reconcile {
        /// Rebuild generated lines unchecked
        #[arg(long)]
        reset: bool,
    },
    Export {
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long)]
        reset: bool,
    },
    Config {
        #[arg(long)]
        init: bool,
        #[arg(long)]
        show: bool,
    },
}

/// Everything one invocation reasons over
#[derive(Debug, Default, Deserialize)]
struct EngineInput {
    #[serde(default)]
    catalog: Vec<Ingredient>,
    #[serde(default)]
    recipes: Vec<Recipe>,
    #[serde(default)]
    pantry: Vec<PantryItem>,
    #[serde(default)]
    plan: Vec<MealPlanAssignment>,
    #[serde(default)]
    previous: GroceryList,
}

impl EngineInput {
    fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed reading input: {}", path.display()))?;
        serde_json::from_str(&data)
            .with_context(|| format!("failed parsing input JSON: {}", path.display()))
    }
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config_path = cli
        .config
        .clone()
        .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
        .unwrap_or_else(EngineConfig::default_path);
    let config = EngineConfig::load(Some(&config_path))?;

    if matches!(cli.command, Commands::Config { .. }) {
        return handle_config_command(&cli.command, &config, &config_path);
    }

    let input_path = cli
        .input
        .as_deref()
        .ok_or_else(|| anyhow!("--input is required for this command"))?;
    let input = EngineInput::load(input_path)?;
    info!(
        "Loaded {} ingredients, {} recipes, {} pantry rows, {} plan entries from {}",
        input.catalog.len(),
        input.recipes.len(),
        input.pantry.len(),
        input.plan.len(),
        input_path.display()
    );

    let engine = ReconciliationEngine::with_standard_units(
        IngredientCatalog::new(input.catalog.clone()),
        config,
    );
    let pantry = engine.consolidate_pantry(input.pantry.clone())?;
    let now = resolve_now(cli.today)?;

    match &cli.command {
        Commands::Coverage { recipe } => {
            let id = RecipeId::new(recipe);
            let recipe = input
                .recipes
                .iter()
                .find(|r| r.id == id)
                .ok_or_else(|| anyhow!("recipe not found in input: {id}"))?;
            let result = engine.compute_coverage(recipe, &pantry, now)?;
            print_coverage(&[result], cli.output)?;
        }
        Commands::Rank { min_coverage } => {
            let ranked = engine.rank_recipes(&input.recipes, &pantry, now, *min_coverage)?;
            print_coverage(&ranked, cli.output)?;
        }
        Commands::Aggregate => {
            let aggregate = engine.aggregate_meal_plan(&input.plan, &input.recipes)?;
            match cli.output {
                OutputFormat::Json => println!("{}", render_json(&aggregate)?),
                OutputFormat::Csv | OutputFormat::Text => {
                    let places = engine.config().display.decimal_places;
                    print!(
                        "{}",
                        aggregate_to_csv(&aggregate, engine.catalog(), &engine.normalizer(), places)?
                    );
                }
            }
        }
        Commands::Reconcile { reset } => {
            let list = reconcile(&engine, &input, &pantry, *reset)?;
            print_grocery_list(&list, engine.config(), cli.output)?;
        }
        Commands::Export { out, reset } => {
            let list = reconcile(&engine, &input, &pantry, *reset)?;
            let rendered = match cli.output {
                OutputFormat::Json => render_json(&list)?,
                OutputFormat::Csv | OutputFormat::Text => {
                    grocery_list_to_csv(&list, &engine.config().grocery.category_order)?
                }
            };
            match out {
                Some(path) => {
                    fs::write(path, rendered)
                        .with_context(|| format!("failed writing export: {}", path.display()))?;
                    info!("Wrote {} grocery items to {}", list.len(), path.display());
                }
                None => print!("{rendered}"),
            }
        }
        Commands::Config { .. } => {}
    }

    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn resolve_now(today: Option<NaiveDate>) -> Result<DateTime<Utc>> {
    match today {
        Some(date) => date
            .and_hms_opt(12, 0, 0)
            .map(|dt| dt.and_utc())
            .ok_or_else(|| anyhow!("invalid --today date: {date}")),
        None => Ok(Utc::now()),
    }
}

fn reconcile(
    engine: &ReconciliationEngine,
    input: &EngineInput,
    pantry: &PantrySnapshot,
    reset: bool,
) -> Result<GroceryList> {
    let aggregate = engine.aggregate_meal_plan(&input.plan, &input.recipes)?;
    let review = aggregate.manual_reconciliation_cases().count();
    if review > 0 {
        warn!("{review} ingredients are needed in units that cannot be combined");
    }
    let mode = if reset {
        ReconcileMode::FullReset
    } else {
        ReconcileMode::Preserve
    };
    Ok(engine.reconcile_grocery_list_with_mode(&input.previous, &aggregate, pantry, mode)?)
}

fn handle_config_command(command: &Commands, config: &EngineConfig, config_path: &Path) -> Result<()> {
    let Commands::Config { init, show } = command else {
        return Ok(());
    };
    if *init {
        EngineConfig::write_template(config_path)?;
        println!("Wrote config template to {}", config_path.display());
    }
    if *show || !*init {
        println!("{}", render_json(config)?);
    }
    Ok(())
}

fn print_coverage(results: &[CoverageResult], output: OutputFormat) -> Result<()> {
    match output {
        OutputFormat::Json => println!("{}", render_json(&results)?),
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(vec![]);
            writer.write_record(["recipe", "coverage", "ranking_score", "missing_required", "boosted", "penalized"])?;
            for result in results {
                writer.write_record([
                    result.recipe.to_string(),
                    result.coverage_percent.to_string(),
                    result.ranking_score.normalize().to_string(),
                    missing_names(result),
                    result.expiration_boosted.to_string(),
                    result.penalized.to_string(),
                ])?;
            }
            print!("{}", String::from_utf8_lossy(&writer.into_inner()?));
        }
        OutputFormat::Text => {
            for result in results {
                let mut flags = Vec::new();
                if result.expiration_boosted {
                    flags.push("uses expiring items");
                }
                if result.penalized {
                    flags.push("penalized");
                }
                println!(
                    "{:<24} {:>3}%  score {:>4}  missing: {}{}",
                    result.recipe.as_str(),
                    result.coverage_percent,
                    round_for_display(result.ranking_score, 2).to_string(),
                    if result.can_cook() { "-".to_string() } else { missing_names(result) },
                    if flags.is_empty() { String::new() } else { format!("  ({})", flags.join(", ")) }
                );
            }
        }
    }
    Ok(())
}

fn missing_names(result: &CoverageResult) -> String {
    result
        .missing_required
        .iter()
        .map(|m| m.ingredient.to_string())
        .collect::<Vec<_>>()
        .join(";")
}

fn print_grocery_list(list: &GroceryList, config: &EngineConfig, output: OutputFormat) -> Result<()> {
    match output {
        OutputFormat::Json => println!("{}", render_json(list)?),
        OutputFormat::Csv => print!("{}", grocery_list_to_csv(list, &config.grocery.category_order)?),
        OutputFormat::Text => {
            for section in list.grouped(&config.grocery.category_order) {
                println!("{}", section.category);
                for item in section.items {
                    println!("  {item}");
                }
            }
        }
    }
    Ok(())
}
