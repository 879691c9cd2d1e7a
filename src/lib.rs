pub mod cli;
pub mod db;
pub mod inventory;
pub mod models;
pub mod scanner;
pub mod settings;
pub mod utils;

use anyhow::Context;
use clap::Parser;

pub use db::Database;

pub fn run() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    utils::logging::init(level);

    log::info!("stockscan starting up...");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("stockscan")
        .build()
        .context("failed to start async runtime")?;

    runtime.block_on(cli::execute(cli))
}
