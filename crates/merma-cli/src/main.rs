//! `merma` loads shrinkage extracts into the star-schema datamart.
//!
//! # Usage
//!
//! ```text
//! merma provision                      # create missing tables
//! merma provision --recreate           # drop and recreate all tables
//! merma check --extract merma.csv      # parse only, no writes
//! merma run --extract merma.csv        # load the extract
//! merma stats                          # table counts and integrity
//! merma schema                         # schema for query consumers
//! ```
//!
//! Settings come from `merma.toml` (see `--config`), `MERMA_*` environment
//! variables and a `.env` file in the working directory.

mod render;
mod settings;

use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use merma_core::warehouse::Warehouse;
use merma_etl::{Pipeline, PipelineConfig, profile::profile};
use merma_store_sqlite::{ProvisionMode, SCHEMA_DESCRIPTION, SqliteWarehouse};
use settings::Settings;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Shrinkage datamart loader")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, global = true, default_value = "merma.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Create the warehouse tables.
  Provision {
    /// Drop existing tables first. Deletes all loaded data.
    #[arg(long)]
    recreate: bool,
  },
  /// Load an extract into the warehouse.
  Run {
    /// Extract file; overrides `[extract] path`.
    #[arg(short, long, value_name = "PATH")]
    extract: Option<PathBuf>,

    /// Print the run report as JSON.
    #[arg(long)]
    json: bool,
  },
  /// Parse an extract and summarise it without writing anything.
  Check {
    #[arg(short, long, value_name = "PATH")]
    extract: Option<PathBuf>,
  },
  /// Print table row counts and integrity checks.
  Stats,
  /// Print the schema description handed to query consumers.
  Schema,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  dotenvy::dotenv().ok();

  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();

  let extract_override = match &cli.command {
    Command::Run { extract, .. } | Command::Check { extract } => extract.as_deref(),
    _ => None,
  };
  let settings = Settings::load(&cli.config, extract_override)?;

  match cli.command {
    Command::Provision { recreate } => {
      let mode = if recreate { ProvisionMode::Recreate } else { ProvisionMode::IfMissing };
      let warehouse = open(&settings).await?;
      warehouse.provision(mode).await.context("provisioning failed")?;
      warehouse.close().await?;
      println!("warehouse ready at {}", settings.warehouse.path.display());
    }

    Command::Run { json, .. } => {
      let config = PipelineConfig { extract: settings.extract()?.clone() };
      let warehouse = open(&settings).await?;
      warehouse
        .verify_schema()
        .await
        .context("warehouse is not provisioned; run `merma provision` first")?;

      let mut pipeline = Pipeline::new(warehouse, config);
      let report = match pipeline.run().await {
        Ok(report) => report,
        Err(e) => {
          if let merma_etl::Error::Stage { report, .. } = &e {
            eprint!("{}", render::run_report(report));
          }
          return Err(e).with_context(|| {
            format!("run {} stopped after stage {}", pipeline.run_id(), pipeline.stage())
          });
        }
      };

      if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
      } else {
        print!("{}", render::run_report(&report));
      }
      pipeline.into_warehouse().close().await?;
    }

    Command::Check { .. } => {
      let options = settings.extract()?;
      let extract = merma_extract::read(options)
        .await
        .with_context(|| format!("failed to read extract {}", options.path.display()))?;
      print!("{}", render::profile(&profile(&extract)));
    }

    Command::Stats => {
      let warehouse = open(&settings).await?;
      warehouse.verify_schema().await?;
      let counts = warehouse.table_counts().await?;
      let integrity = warehouse.integrity().await?;
      print!("{}", render::stats(&counts, &integrity));
      warehouse.close().await?;
    }

    Command::Schema => print!("{SCHEMA_DESCRIPTION}"),
  }

  Ok(())
}

async fn open(settings: &Settings) -> anyhow::Result<SqliteWarehouse> {
  let path = &settings.warehouse.path;
  SqliteWarehouse::open(path)
    .await
    .with_context(|| format!("failed to open warehouse at {}", path.display()))
}
