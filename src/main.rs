use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod enrich;
mod identifier;
mod notify;
mod pipeline;
mod server;
mod store;
#[cfg(test)]
mod test_support;
mod util;

use cli::{Command, RecordsArgs, RootArgs, RunArgs, ServeArgs};
use pipeline::{Pipeline, PipelineRequest};
use store::ResultStore;

fn main() -> Result<()> {
    let args = RootArgs::parse();
    init_tracing();

    match args.command {
        Command::Serve(args) => cmd_serve(args),
        Command::Run(args) => cmd_run(args),
        Command::Records(args) => cmd_records(args),
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn build_pipeline(args: &cli::PipelineArgs) -> Result<Pipeline> {
    let config = args.to_config();
    config::validate_config(&config)?;
    Pipeline::from_config(&config)
}

fn cmd_serve(args: ServeArgs) -> Result<()> {
    let pipeline = Arc::new(build_pipeline(&args.pipeline)?);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("build tokio runtime")?;
    runtime.block_on(server::serve(args.bind, pipeline))
}

fn cmd_run(args: RunArgs) -> Result<()> {
    let pipeline = build_pipeline(&args.pipeline)?;
    let request = PipelineRequest {
        email: args.email,
        source: args.source,
    };
    let response = pipeline.run(&request)?;
    let text = serde_json::to_string_pretty(&response).context("serialize pipeline response")?;
    println!("{text}");
    Ok(())
}

fn cmd_records(args: RecordsArgs) -> Result<()> {
    let store = ResultStore::open_existing(args.db_path)?;
    let mut records = store.records()?;
    if let Some(limit) = args.limit {
        let skip = records.len().saturating_sub(limit);
        records = records.split_off(skip);
    }
    let text = serde_json::to_string_pretty(&records).context("serialize records")?;
    println!("{text}");
    Ok(())
}
