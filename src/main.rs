//! Frontier Crafter
//!
//! Command-line front end for the blueprint catalog, requirement calculator
//! and crafting sessions.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use frontier_crafter::calculator::{self, Resolver};
use frontier_crafter::config::Settings;
use frontier_crafter::extract::{self, RawInputs};
use frontier_crafter::models::{CraftingSession, ItemId};
use frontier_crafter::{Catalog, SessionStore, sample};

#[derive(Parser)]
#[command(name = "frontier-crafter")]
#[command(about = "Blueprint calculator and crafting planner for EVE Frontier")]
struct Cli {
    /// Path to a TOML config file (defaults to ./crafter.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to the SQLite session database
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// Use the built-in sample data instead of the configured input files
    #[arg(long, global = true)]
    sample: bool,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the sample input files into a directory
    WriteSample {
        /// Target directory
        dir: PathBuf,
    },

    /// Show how many recipes, items and blueprints were loaded
    Stats,

    /// List the blueprints that produce an item
    Blueprints {
        item_id: ItemId,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Search items by name (case-insensitive substring)
    Search { name: String },

    /// Base resource needed to build an item
    Resolve {
        item_id: ItemId,

        /// Units of the item to build
        #[arg(short, long, default_value = "1")]
        quantity: f64,

        /// Base resource item id (defaults to the configured one)
        #[arg(short, long)]
        base: Option<ItemId>,

        /// Show the full requirement tree
        #[arg(short, long)]
        verbose: bool,
    },

    /// Manage crafting sessions
    #[command(subcommand)]
    Session(SessionCommand),
}

#[derive(Subcommand)]
enum SessionCommand {
    /// Create an empty session
    New,

    /// List sessions
    List,

    /// Show a session with its targets and ingredients
    Show {
        session: Uuid,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Add a crafting target
    Add {
        session: Uuid,
        item_id: ItemId,
        quantity: u32,
        /// Blueprint to build the item with
        #[arg(short, long)]
        blueprint: u32,
    },

    /// List the ingredients of a target
    Ingredients { session: Uuid, item_id: ItemId },

    /// Record crafted units of an ingredient (negative to undo)
    Craft {
        session: Uuid,
        target_item_id: ItemId,
        ingredient_item_id: ItemId,
        #[arg(allow_negative_numbers = true)]
        delta: i64,
    },

    /// Record crafted units of a target (negative to undo)
    Complete {
        session: Uuid,
        target_item_id: ItemId,
        #[arg(allow_negative_numbers = true)]
        delta: i64,
    },

    /// Show progress per target
    Progress { session: Uuid },
}

fn init_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_inputs(cli: &Cli, settings: &Settings) -> Result<RawInputs> {
    if cli.sample {
        return Ok(sample::sample_inputs()?);
    }
    extract::load_inputs(settings.inputs.paths()).with_context(|| {
        format!(
            "Failed to load inputs (recipe store {})",
            settings.inputs.recipe_store.display()
        )
    })
}

fn open_store(settings: &Settings) -> Result<SessionStore> {
    let store = SessionStore::open(&settings.database)
        .with_context(|| format!("Failed to open {}", settings.database.display()))?;
    Ok(store
        .with_retry(settings.store.retry_policy())
        .with_scaling(settings.ingredient_scaling))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_json);

    let mut settings = Settings::load(cli.config.as_deref()).context("Failed to load config")?;
    if let Some(database) = &cli.database {
        settings.database.clone_from(database);
    }

    match &cli.command {
        Commands::WriteSample { dir } => {
            sample::write_sample_files(dir)
                .with_context(|| format!("Failed to write sample files to {}", dir.display()))?;
            println!("Sample data written to {}", dir.display());
        }

        Commands::Stats => {
            let inputs = load_inputs(&cli, &settings)?;
            let catalog = inputs.build_catalog();
            println!("{}", inputs.stats);
            println!(
                "Catalog: {} producible items, {} blueprints",
                catalog.len(),
                catalog.blueprint_count()
            );
        }

        Commands::Blueprints { item_id, json } => {
            let catalog = load_inputs(&cli, &settings)?.build_catalog();
            let variants = catalog.lookup_item_blueprints(*item_id)?;
            if *json {
                println!("{}", serde_json::to_string_pretty(variants)?);
            } else {
                println!("{} ({})", catalog.item_name(*item_id), item_id);
                for v in variants {
                    println!(
                        "  Blueprint {}: {} per run, {}s, max {} runs",
                        v.blueprint_id,
                        v.product_count(*item_id),
                        v.time,
                        v.max_production
                    );
                    if !v.structures.is_empty() {
                        println!("    Structures: {}", v.structures.join(", "));
                    }
                    for m in &v.materials {
                        println!("    {:>8} x {} ({})", m.quantity, m.name, m.item_id);
                    }
                }
            }
        }

        Commands::Search { name } => {
            let catalog = load_inputs(&cli, &settings)?.build_catalog();
            let items = catalog.search_items(name);
            if items.is_empty() {
                println!("No items match '{}'", name);
            }
            for item in items {
                println!("{} ({})", item.name, item.id);
            }
        }

        Commands::Resolve {
            item_id,
            quantity,
            base,
            verbose,
        } => {
            let catalog = load_inputs(&cli, &settings)?.build_catalog();
            let base = base.unwrap_or(settings.base_resource);
            let mut resolver = Resolver::new(&catalog);
            let tree = resolver.breakdown(base, *item_id, *quantity)?;

            if *verbose {
                println!("Requirement tree:\n");
                println!("{}", calculator::format_breakdown(&tree, 0));
            }
            println!(
                "{:.2}x {} needs {:.2} {}",
                quantity,
                catalog.item_name(*item_id),
                tree.base_units,
                catalog.item_name(base)
            );
            let raw = tree.raw_inputs();
            if raw.keys().any(|&id| id != base) {
                println!("Other raw inputs:");
                for (id, amount) in raw.iter().filter(|(id, _)| **id != base) {
                    println!("  {:.2}x {} ({})", amount, catalog.item_name(*id), id);
                }
            }
        }

        Commands::Session(command) => run_session(&cli, &settings, command)?,
    }

    Ok(())
}

fn run_session(cli: &Cli, settings: &Settings, command: &SessionCommand) -> Result<()> {
    let mut store = open_store(settings)?;

    match command {
        SessionCommand::New => {
            println!("{}", store.create_session()?);
        }

        SessionCommand::List => {
            for id in store.list_sessions()? {
                println!("{}", id);
            }
        }

        SessionCommand::Show { session, json } => {
            let session = store.get_session(*session)?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&session)?);
            } else {
                print_session(&session, None);
            }
        }

        SessionCommand::Add {
            session,
            item_id,
            quantity,
            blueprint,
        } => {
            let catalog = load_inputs(cli, settings)?.build_catalog();
            let session = store.add_target(&catalog, *session, *item_id, *quantity, *blueprint)?;
            print_session(&session, Some(&catalog));
        }

        SessionCommand::Ingredients { session, item_id } => {
            for i in store.get_target_ingredients(*session, *item_id)? {
                println!("{:>8} / {:<8} {}", i.crafted_quantity, i.needed_quantity, i.item_id);
            }
        }

        SessionCommand::Craft {
            session,
            target_item_id,
            ingredient_item_id,
            delta,
        } => {
            let session = store.modify_ingredient_quantity(
                *session,
                *target_item_id,
                *ingredient_item_id,
                *delta,
            )?;
            print_session(&session, None);
        }

        SessionCommand::Complete {
            session,
            target_item_id,
            delta,
        } => {
            let session = store.modify_target_quantity(*session, *target_item_id, *delta)?;
            print_session(&session, None);
        }

        SessionCommand::Progress { session } => {
            for progress in store.get_session(*session)?.progress() {
                println!("{}", progress);
            }
        }
    }

    Ok(())
}

fn print_session(session: &CraftingSession, catalog: Option<&Catalog>) {
    let name = |id: ItemId| catalog.map_or_else(|| id.to_string(), |c| format!("{} ({})", c.item_name(id), id));

    println!("Session {} [{:?}]", session.session_id, session.state());
    for target in &session.targets {
        println!(
            "  {}: {}/{} via blueprint {}",
            name(target.item_id),
            target.crafted_quantity,
            target.needed_quantity,
            target.blueprint_id
        );
        for i in &target.ingredients {
            println!(
                "    {:>8} / {:<8} {}",
                i.crafted_quantity,
                i.needed_quantity,
                name(i.item_id)
            );
        }
    }
}
