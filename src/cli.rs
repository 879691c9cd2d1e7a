//! Command-line surface.
//!
//! Usage:
//!     stockscan scan --source clips/aisle3 --detections aisle3.json
//!     stockscan inventory adjust 4006381333931 -2

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;

use crate::db::Database;
use crate::inventory::{InventoryReconciler, ProductResolver, PromptResolver, SkipUnknown};
use crate::scanner::{
    ArtifactNaming, FileSourceOpener, FramePersister, ManifestDecoder, Orchestrator,
    ScanController, SourceSelector,
};
use crate::settings::{ScanMode, ScannerSettings};

#[derive(Parser, Debug)]
#[command(
    name = "stockscan",
    version,
    about = "Scan product codes from video frames into an inventory"
)]
pub struct Cli {
    /// Settings file
    #[arg(long, global = true, default_value = "stockscan.json", env = "STOCKSCAN_CONFIG")]
    pub config: PathBuf,

    /// Inventory database (overrides the settings file)
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,

    /// Debug-level logging unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Process a frame source and reconcile every detected code
    Scan(ScanArgs),
    /// Inspect or maintain the inventory
    #[command(subcommand)]
    Inventory(InventoryCommand),
    /// Manage the settings file
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Camera index, image file, or directory of frames
    #[arg(long)]
    pub source: SourceSelector,

    /// Recorded decoder output keyed by frame index
    #[arg(long)]
    pub detections: PathBuf,

    #[arg(long, value_enum)]
    pub mode: Option<ScanMode>,

    /// Seconds before a code may re-trigger in continuous mode
    #[arg(long)]
    pub window_secs: Option<u64>,

    /// Directory for annotated frames
    #[arg(long)]
    pub artifacts: Option<PathBuf>,

    #[arg(long, value_enum)]
    pub naming: Option<ArtifactNaming>,

    /// Process every Nth frame
    #[arg(long)]
    pub stride: Option<u64>,

    /// Skip unknown codes instead of asking for their details
    #[arg(long)]
    pub no_prompt: bool,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,
}

impl ScanArgs {
    fn apply(&self, settings: &mut ScannerSettings) {
        if let Some(mode) = self.mode {
            settings.mode = mode;
        }
        if let Some(window) = self.window_secs {
            settings.scan_reset_window_secs = window;
        }
        if let Some(dir) = &self.artifacts {
            settings.artifact_dir = dir.clone();
        }
        if let Some(naming) = self.naming {
            settings.artifact_naming = naming;
        }
        if let Some(stride) = self.stride {
            settings.frame_stride = stride;
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum InventoryCommand {
    /// List every product
    List {
        #[arg(long)]
        json: bool,
    },
    /// Show one product
    Show { product_id: String },
    /// Delete a product
    Remove { product_id: String },
    /// Change a product's quantity by a signed amount
    Adjust {
        product_id: String,
        #[arg(allow_negative_numbers = true)]
        delta: i64,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Write the default settings file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

pub async fn execute(cli: Cli) -> Result<()> {
    let mut settings = ScannerSettings::load_or_default(&cli.config)?;
    if let Some(database) = cli.database {
        settings.database_path = database;
    }

    match cli.command {
        Command::Scan(args) => {
            args.apply(&mut settings);
            scan(settings, args).await
        }
        Command::Inventory(command) => inventory(&settings, command).await,
        Command::Config(ConfigCommand::Init { force }) => {
            init_config(&cli.config, &settings, force)
        }
    }
}

async fn scan(settings: ScannerSettings, args: ScanArgs) -> Result<()> {
    let decoder = ManifestDecoder::load(&args.detections)?;
    let db = open_database(settings.database_path.clone()).await?;
    let resolver: Box<dyn ProductResolver> = if args.no_prompt {
        Box::new(SkipUnknown)
    } else {
        Box::new(PromptResolver::stdio())
    };

    let orchestrator = Orchestrator::new(
        InventoryReconciler::new(db, resolver),
        Box::new(decoder),
        FramePersister::new(&settings.artifact_dir),
        settings.dedup_policy(),
    )
    .with_naming(settings.artifact_naming)
    .with_frame_stride(settings.frame_stride());

    let mut controller = ScanController::new();
    let stop = controller.start(orchestrator, args.source, Arc::new(FileSourceOpener))?;

    let stop_on_signal = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Stop requested; finishing the current frame");
            stop.cancel();
        }
    });
    let finished = controller.wait().await;
    stop_on_signal.abort();

    let Some(finished) = finished? else {
        bail!("scan task ended without a result");
    };
    let report = finished.result.context("scan aborted")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{report}");
    }
    Ok(())
}

async fn inventory(settings: &ScannerSettings, command: InventoryCommand) -> Result<()> {
    let db = open_database(settings.database_path.clone()).await?;

    match command {
        InventoryCommand::List { json } => {
            let records = db.list_products().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else if records.is_empty() {
                println!("Inventory is empty");
            } else {
                for record in records {
                    println!("{record}");
                }
            }
        }
        InventoryCommand::Show { product_id } => match db.search_product(&product_id).await? {
            Some(record) => println!("{record}"),
            None => bail!("product {product_id} not found in inventory"),
        },
        InventoryCommand::Remove { product_id } => {
            db.remove_product(&product_id).await?;
            println!("Removed {product_id}");
        }
        InventoryCommand::Adjust { product_id, delta } => {
            let quantity = db.update_quantity(&product_id, delta).await?;
            println!("{product_id}: quantity now {quantity}");
        }
    }
    Ok(())
}

/// Opening waits for the worker thread to migrate the schema.
async fn open_database(path: PathBuf) -> Result<Database> {
    tokio::task::spawn_blocking(move || Database::new(path))
        .await
        .context("database open task failed")?
}

fn init_config(path: &std::path::Path, settings: &ScannerSettings, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists; pass --force to overwrite", path.display());
    }
    settings.save(path)?;
    println!("Wrote settings to {}", path.display());
    Ok(())
}
