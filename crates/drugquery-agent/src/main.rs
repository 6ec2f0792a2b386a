//! DrugQuery: docking result ranking, similarity search and export.
//! Entry point for the command line binary.

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use drugquery_agent::{user_message, DrugQueryService};
use drugquery_common::{CompoundId, Config, DrugQueryError};
use drugquery_db::{Catalog, InMemoryRepository};
use drugquery_export::SelectionPolicy;

#[derive(Parser)]
#[command(name = "drugquery")]
#[command(about = "Rank, search and export docking results", long_about = None)]
struct Cli {
    /// JSON catalog holding the entity tables
    #[arg(long, default_value = "catalog.json", env = "DRUGQUERY_CATALOG")]
    catalog: PathBuf,

    /// Config TOML file (defaults to DRUGQUERY_CONFIG or ./drugquery.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Gene, target, pocket and compound counts
    Stats,
    /// Best docking of a compound, with its ancestry
    Resolve { compound_id: CompoundId },
    /// Compound page: best docking plus prediction scores
    Detail { compound_id: CompoundId },
    /// Prediction score table of a compound
    Scores { compound_id: CompoundId },
    /// Compounds ranked by similarity to a SMILES query
    Search { smiles: String },
    /// Zip a compound's docking files, grouped by target
    Export {
        compound_id: CompoundId,
        /// Keep only the N best dockings (default: all)
        #[arg(long)]
        top: Option<usize>,
    },
    /// Submit a molecule for docking
    Upload {
        smiles: String,
        #[arg(long)]
        email: String,
    },
    /// Queue another docking run for a compound
    Redock { compound_id: CompoundId },
    /// Queued jobs, newest first
    Jobs,
    /// Genes by name, or one gene's targets
    Genes { name: Option<String> },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("drugquery=debug,info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let loaded = match &cli.config {
        Some(path) => Config::from_path(path),
        None => Config::load(),
    };
    let config = match loaded {
        Ok(c) => c,
        Err(e) => {
            warn!("Could not load configuration: {e}");
            warn!("Falling back to defaults (media ./media, tmp ./tmp).");
            Config::default()
        }
    };

    let catalog = if cli.catalog.exists() {
        Catalog::load(&cli.catalog).await?
    } else {
        warn!(path = %cli.catalog.display(), "Catalog not found, starting empty");
        Catalog::default()
    };
    let repo = Arc::new(InMemoryRepository::from_catalog(catalog)?);
    let service = DrugQueryService::new(config, repo.clone());

    match run(&service, cli.command).await {
        Ok(dirty) => {
            if dirty {
                repo.to_catalog().await.save(&cli.catalog).await?;
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", user_message(&e));
            Err(e.into())
        }
    }
}

/// Execute one command. Returns whether the repository changed.
async fn run(service: &DrugQueryService, command: Commands) -> Result<bool, DrugQueryError> {
    match command {
        Commands::Stats => print_json(&service.stats().await?)?,
        Commands::Resolve { compound_id } => {
            print_json(&service.resolve(compound_id).await?)?;
            return Ok(true);
        }
        Commands::Detail { compound_id } => {
            print_json(&service.compound_detail(compound_id).await?)?;
            return Ok(true);
        }
        Commands::Scores { compound_id } => print_json(&service.scores(compound_id).await?)?,
        Commands::Search { smiles } => {
            for hit in service.search_compounds(&smiles).await? {
                println!("{:.4}\t{}\t{}", hit.similarity, hit.compound.id, hit.compound.smiles);
            }
        }
        Commands::Export { compound_id, top } => {
            let policy = top.map_or(SelectionPolicy::All, SelectionPolicy::TopN);
            let archive = service.export(compound_id, policy).await?;
            println!("{}", archive.display());
        }
        Commands::Upload { smiles, email } => {
            print_json(&service.submit_upload(&smiles, &email).await?)?;
            return Ok(true);
        }
        Commands::Redock { compound_id } => {
            print_json(&service.redock_compound(compound_id).await?)?;
            return Ok(true);
        }
        Commands::Jobs => print_json(&service.jobs().await?)?,
        Commands::Genes { name: Some(name) } => print_json(&service.gene_detail(&name).await?)?,
        Commands::Genes { name: None } => print_json(&service.genes().await?)?,
    }
    Ok(false)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), DrugQueryError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| DrugQueryError::Repository(format!("serialization failed: {e}")))?;
    println!("{text}");
    Ok(())
}
