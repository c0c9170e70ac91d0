//! # blscat
//!
//! Command-line front end for the Brillouin spectroscopy catalog.
//!
//! ## Usage
//!
//! ```bash
//! # Create a catalog with the standard schema
//! blscat init measurements.db
//!
//! # Ingest raw acquisitions
//! blscat ingest measurements.db data/*.DAT
//!
//! # Derive a frequency axis inside a container
//! blscat derive measurements.db --container containers/sample1.bls frequency
//!
//! # Push edited container attributes back into the catalog
//! blscat sync measurements.db --container containers/sample1.bls
//! ```

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};

use blscat::catalog::{CatalogStore, SchemaSync};
use blscat::container::{Container, RAW_DATASET};
use blscat::ingest::Ingestor;
use blscat::provenance::{derive, Axis, Operation};
use blscat::schema::SchemaDefinition;
use blscat::sync::sync_row;

/// blscat - Brillouin Spectroscopy Catalog & Container Tool
#[derive(Parser)]
#[command(name = "blscat")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbosity level (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new catalog file
    Init {
        /// Catalog file path
        #[arg(value_name = "CATALOG")]
        catalog: PathBuf,

        /// Schema configuration file (TOML); standard schema if omitted
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Ingest raw acquisition files into the catalog
    Ingest {
        /// Catalog file path
        #[arg(value_name = "CATALOG")]
        catalog: PathBuf,

        /// Raw files to ingest
        #[arg(value_name = "FILES", required = true)]
        files: Vec<PathBuf>,

        /// Schema configuration file (TOML); standard schema if omitted
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// List catalogued measurements
    List {
        /// Catalog file path
        #[arg(value_name = "CATALOG")]
        catalog: PathBuf,

        /// Show every column, not just the configured display set
        #[arg(long)]
        all: bool,

        /// Schema configuration file (TOML); standard schema if omitted
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Remove a measurement from the catalog
    Remove {
        /// Catalog file path
        #[arg(value_name = "CATALOG")]
        catalog: PathBuf,

        /// Container path of the row to remove
        #[arg(long, value_name = "PATH")]
        filepath: String,

        /// Also delete the container file (confirmed separately)
        #[arg(long)]
        delete_container: bool,

        /// Answer yes to all prompts
        #[arg(short, long)]
        yes: bool,

        /// Schema configuration file (TOML); standard schema if omitted
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Derive a new dataset inside a container
    Derive {
        /// Catalog file path
        #[arg(value_name = "CATALOG")]
        catalog: PathBuf,

        /// Container file to operate on
        #[arg(long, value_name = "PATH")]
        container: PathBuf,

        /// Parent dataset name
        #[arg(long, default_value = RAW_DATASET)]
        parent: String,

        /// Answer yes to the overwrite prompt
        #[arg(short, long)]
        yes: bool,

        /// Schema configuration file (TOML); standard schema if omitted
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        #[command(subcommand)]
        operation: DeriveOp,
    },

    /// Update a catalog row from its container's attributes
    Sync {
        /// Catalog file path
        #[arg(value_name = "CATALOG")]
        catalog: PathBuf,

        /// Container file to read attributes from
        #[arg(long, value_name = "PATH")]
        container: PathBuf,

        /// Schema configuration file (TOML); standard schema if omitted
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Display a container's attributes and provenance tree
    Info {
        /// Container file path
        #[arg(value_name = "CONTAINER")]
        container: PathBuf,
    },
}

#[derive(Subcommand)]
enum DeriveOp {
    /// Generate the frequency axis from the recorded scan amplitude
    Frequency,

    /// Sum a 2-D dataset along one axis over an index range
    Bin {
        /// Axis to sum along: rows or cols
        #[arg(long)]
        axis: Axis,

        /// First index of the half-open range
        #[arg(long)]
        start: usize,

        /// One past the last index of the half-open range
        #[arg(long)]
        stop: usize,
    },

    /// Register a noise subtraction pass
    Denoise {
        /// Smoothing window width in samples
        #[arg(long)]
        window: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    match cli.command {
        Commands::Init { catalog, config } => run_init(catalog, config),
        Commands::Ingest {
            catalog,
            files,
            config,
        } => run_ingest(catalog, files, config),
        Commands::List {
            catalog,
            all,
            config,
        } => run_list(catalog, all, config),
        Commands::Remove {
            catalog,
            filepath,
            delete_container,
            yes,
            config,
        } => run_remove(catalog, filepath, delete_container, yes, config),
        Commands::Derive {
            catalog,
            container,
            parent,
            yes,
            config,
            operation,
        } => run_derive(catalog, container, parent, yes, config, operation),
        Commands::Sync {
            catalog,
            container,
            config,
        } => run_sync(catalog, container, config),
        Commands::Info { container } => run_info(container),
    }
}

/// Load the schema, either from a TOML file or the built-in standard set.
fn load_schema(config: Option<PathBuf>) -> Result<SchemaDefinition> {
    match config {
        Some(path) => SchemaDefinition::from_toml_file(&path)
            .with_context(|| format!("Failed to load schema from {}", path.display())),
        None => Ok(SchemaDefinition::standard()),
    }
}

/// Ask a yes/no question on stdin unless `--yes` was given.
fn make_confirm(yes: bool) -> impl FnMut(&str) -> bool {
    move |question: &str| {
        if yes {
            return true;
        }
        print!("{question} [y/N] ");
        if std::io::stdout().flush().is_err() {
            return false;
        }
        let mut answer = String::new();
        if std::io::stdin().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }
}

/// Create a new catalog file
fn run_init(catalog: PathBuf, config: Option<PathBuf>) -> Result<()> {
    if catalog.exists() {
        anyhow::bail!("Catalog already exists: {}", catalog.display());
    }
    let schema = std::sync::Arc::new(load_schema(config)?);
    let store = CatalogStore::create(&catalog, schema).context("Failed to create catalog")?;

    info!("Created catalog {}", store.path().display());
    println!(
        "Created {} with {} columns",
        store.path().display(),
        store.schema().columns().len()
    );
    Ok(())
}

/// Ingest raw acquisition files
fn run_ingest(catalog: PathBuf, files: Vec<PathBuf>, config: Option<PathBuf>) -> Result<()> {
    let schema = std::sync::Arc::new(load_schema(config)?);
    let (store, sync) = CatalogStore::open(&catalog, schema).context("Failed to open catalog")?;
    report_schema_sync(&sync);

    let ingestor = Ingestor::new(&store);
    let mut failed = 0_usize;
    let rows = ingestor.ingest_all(&files, |path, error| {
        failed += 1;
        warn!("skipped {}: {error}", path.display());
    });

    for row in &rows {
        println!(
            "Ingested {} -> {}",
            row.name().unwrap_or("?"),
            row.filepath().unwrap_or("?")
        );
    }
    println!("{} ingested, {} skipped", rows.len(), failed);
    if failed > 0 && rows.is_empty() {
        anyhow::bail!("No file could be ingested");
    }
    Ok(())
}

/// List catalogued measurements
fn run_list(catalog: PathBuf, all: bool, config: Option<PathBuf>) -> Result<()> {
    let schema = std::sync::Arc::new(load_schema(config)?);
    let (store, sync) = CatalogStore::open(&catalog, schema).context("Failed to open catalog")?;
    report_schema_sync(&sync);

    let visible: Vec<&str> = if all {
        store.schema().columns().iter().map(|c| c.name.as_str()).collect()
    } else {
        store
            .schema()
            .default_visible_columns()
            .iter()
            .map(String::as_str)
            .collect()
    };

    let rows = store.fetch_all().context("Failed to scan catalog")?;
    println!("{}", visible.join("\t"));
    for row in &rows {
        let cells: Vec<String> = visible
            .iter()
            .map(|&column| {
                row.get(column)
                    .map(|value| value.to_string())
                    .unwrap_or_default()
            })
            .collect();
        println!("{}", cells.join("\t"));
    }
    println!("{} measurement(s)", rows.len());
    Ok(())
}

/// Remove a catalog row, optionally with its container file
fn run_remove(
    catalog: PathBuf,
    filepath: String,
    delete_container: bool,
    yes: bool,
    config: Option<PathBuf>,
) -> Result<()> {
    let schema = std::sync::Arc::new(load_schema(config)?);
    let (store, sync) = CatalogStore::open(&catalog, schema).context("Failed to open catalog")?;
    report_schema_sync(&sync);

    let mut confirm = make_confirm(yes);
    if !confirm(&format!("Remove the catalog row for '{filepath}'?")) {
        println!("Not removed");
        return Ok(());
    }
    store
        .delete_by_filepath(&filepath)
        .context("Failed to remove catalog row")?;
    println!("Removed catalog row for {filepath}");

    if delete_container && confirm(&format!("Also delete the container file '{filepath}'?")) {
        std::fs::remove_file(&filepath)
            .with_context(|| format!("Failed to delete container {filepath}"))?;
        println!("Deleted {filepath}");
    }
    Ok(())
}

/// Derive a dataset inside a container
fn run_derive(
    catalog: PathBuf,
    container_path: PathBuf,
    parent: String,
    yes: bool,
    config: Option<PathBuf>,
    operation: DeriveOp,
) -> Result<()> {
    let schema = std::sync::Arc::new(load_schema(config)?);
    let (store, sync) = CatalogStore::open(&catalog, schema).context("Failed to open catalog")?;
    report_schema_sync(&sync);

    let mut container =
        Container::load(&container_path).context("Failed to load container")?;
    if store
        .find_by_filepath(&container_path.display().to_string())
        .context("Catalog lookup failed")?
        .is_none()
    {
        warn!(
            "{} is not catalogued in {}",
            container_path.display(),
            catalog.display()
        );
    }

    let operation = match operation {
        DeriveOp::Frequency => Operation::MakeFrequencyAxis,
        DeriveOp::Bin { axis, start, stop } => Operation::Bin { axis, start, stop },
        DeriveOp::Denoise { window } => Operation::SubtractNoise { window },
    };

    let name = derive(&mut container, &parent, operation, make_confirm(yes))
        .context("Derive operation failed")?;
    container.save().context("Failed to save container")?;

    println!("Derived '{name}' from '{parent}' in {}", container_path.display());
    Ok(())
}

/// Update a catalog row from its container
fn run_sync(catalog: PathBuf, container_path: PathBuf, config: Option<PathBuf>) -> Result<()> {
    let schema = std::sync::Arc::new(load_schema(config)?);
    let (store, sync) = CatalogStore::open(&catalog, schema).context("Failed to open catalog")?;
    report_schema_sync(&sync);

    let container = Container::load(&container_path).context("Failed to load container")?;
    sync_row(&store, &container).context("Synchronization failed")?;
    println!("Synchronized catalog row for {}", container_path.display());
    Ok(())
}

/// Display a container's attributes and provenance tree
fn run_info(container_path: PathBuf) -> Result<()> {
    let container = Container::load(&container_path).context("Failed to load container")?;

    println!("Container: {}", container_path.display());
    println!("Format version: {}", container.format_version);
    println!();

    println!("Attributes:");
    for (key, value) in container.attributes.iter() {
        println!("  {key}: {value}");
    }
    println!();

    println!("Datasets:");
    for (name, dataset) in container.datasets() {
        let shape = dataset.payload.shape_string();
        match (&dataset.parent, &dataset.operation) {
            (Some(parent), Some(op)) => {
                println!("  {name} {shape} <- {parent} via {}", op.kind);
                for (param, value) in &op.parameters {
                    println!("      {param} = {value}");
                }
            }
            (Some(parent), None) => println!("  {name} {shape} <- {parent}"),
            _ => println!("  {name} {shape} (raw, acquired {})", dataset.created_at),
        }
    }
    Ok(())
}

/// Surface what the schema synchronizer did on open.
fn report_schema_sync(sync: &SchemaSync) {
    match sync {
        SchemaSync::UpToDate => {}
        SchemaSync::Created => info!("catalog table created"),
        SchemaSync::ColumnsAdded(columns) => {
            println!("Schema grew; added column(s): {}", columns.join(", "));
        }
    }
}
