//! CLI argument parsing.
//!
//! Every pipeline setting can come from a flag or its environment variable;
//! `OPENAI_API_KEY` has no default, so `serve` and `run` refuse to start
//! without it.
use crate::config::{
    PipelineConfig, DEFAULT_API_BASE, DEFAULT_AUDIT_RECIPIENT, DEFAULT_BIND, DEFAULT_DB_PATH,
    DEFAULT_ENRICH_TIMEOUT_SECS, DEFAULT_IDENTIFIER_TIMEOUT_SECS, DEFAULT_IDENTIFIER_URL,
    DEFAULT_MODEL,
};
use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "enrich-pipeline",
    version,
    about = "Fetch identifiers, enrich them with an LM, and store the results",
    after_help = "Commands:\n  serve                          Serve POST /pipeline over HTTP\n  run --email <addr> --source <tag>  Run the pipeline once and print the report\n  records                        Print stored records as JSON\n\nExamples:\n  OPENAI_API_KEY=sk-... enrich-pipeline serve --bind 127.0.0.1:8000\n  OPENAI_API_KEY=sk-... enrich-pipeline run --email me@example.com --source cli\n  enrich-pipeline records --limit 10",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Serve(ServeArgs),
    Run(RunArgs),
    Records(RecordsArgs),
}

/// Settings shared by every command that builds a pipeline.
#[derive(Args, Debug)]
pub struct PipelineArgs {
    /// SQLite file holding the results table
    #[arg(long, value_name = "PATH", env = "PIPELINE_DB_PATH", default_value = DEFAULT_DB_PATH)]
    pub db_path: PathBuf,

    /// Endpoint returning {"uuid": "..."}
    #[arg(long, value_name = "URL", env = "PIPELINE_IDENTIFIER_URL", default_value = DEFAULT_IDENTIFIER_URL)]
    pub identifier_url: String,

    /// Identifier fetch timeout in seconds
    #[arg(long, value_name = "SECS", default_value_t = DEFAULT_IDENTIFIER_TIMEOUT_SECS)]
    pub identifier_timeout_secs: u64,

    /// Base URL of the OpenAI-compatible API
    #[arg(long, value_name = "URL", env = "OPENAI_BASE_URL", default_value = DEFAULT_API_BASE)]
    pub api_base: String,

    /// API key for the enrichment service
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Chat model used for enrichment
    #[arg(long, env = "PIPELINE_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Chat completion timeout in seconds
    #[arg(long, value_name = "SECS", default_value_t = DEFAULT_ENRICH_TIMEOUT_SECS)]
    pub enrich_timeout_secs: u64,

    /// Recipient notified on every run in addition to the requester
    #[arg(long, value_name = "ADDR", env = "PIPELINE_AUDIT_RECIPIENT", default_value = DEFAULT_AUDIT_RECIPIENT)]
    pub audit_recipient: String,
}

impl PipelineArgs {
    pub fn to_config(&self) -> PipelineConfig {
        PipelineConfig {
            db_path: self.db_path.clone(),
            identifier_url: self.identifier_url.clone(),
            identifier_timeout: Duration::from_secs(self.identifier_timeout_secs),
            api_base: self.api_base.clone(),
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            enrich_timeout: Duration::from_secs(self.enrich_timeout_secs),
            audit_recipient: self.audit_recipient.clone(),
        }
    }
}

#[derive(Parser, Debug)]
#[command(about = "Serve POST /pipeline over HTTP")]
pub struct ServeArgs {
    /// Listen address
    #[arg(long, value_name = "ADDR", env = "PIPELINE_BIND", default_value = DEFAULT_BIND)]
    pub bind: SocketAddr,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

#[derive(Parser, Debug)]
#[command(about = "Run the pipeline once and print the JSON report")]
pub struct RunArgs {
    /// Notification target
    #[arg(long, value_name = "ADDR")]
    pub email: String,

    /// Tag stored on every record
    #[arg(long, value_name = "TAG")]
    pub source: String,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

#[derive(Parser, Debug)]
#[command(about = "Print stored records as JSON")]
pub struct RecordsArgs {
    /// SQLite file holding the results table
    #[arg(long, value_name = "PATH", env = "PIPELINE_DB_PATH", default_value = DEFAULT_DB_PATH)]
    pub db_path: PathBuf,

    /// Only print the most recent N records
    #[arg(long, value_name = "N")]
    pub limit: Option<usize>,
}
