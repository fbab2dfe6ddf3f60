//! Command-line interface definitions and argument parsing

use clap::{Parser, Subcommand};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Bank customer churn scoring service and terminal dashboard
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load the per-country model bundles and serve the scoring API
    Serve(ServeArgs),
    /// Score a customer CSV through the API and print churn analytics
    Report(ReportArgs),
}

#[derive(clap::Args, Debug)]
pub struct ServeArgs {
    /// Address to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "8000")]
    pub port: u16,

    /// Directory holding model_france.json, model_spain.json and model_germany.json
    #[arg(short, long, env = "MODEL_DIR", default_value = "models")]
    pub model_dir: PathBuf,
}

impl ServeArgs {
    pub fn socket_addr(&self) -> crate::Result<SocketAddr> {
        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid HOST value: {}", self.host))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

#[derive(clap::Args, Debug)]
pub struct ReportArgs {
    /// Path to the customer CSV file
    #[arg(short, long)]
    pub input: PathBuf,

    /// Base URL of the scoring service
    #[arg(long, env = "API_URL", default_value = "http://localhost:8000")]
    pub api_url: String,

    /// Where to write the predictions
    #[arg(short, long, default_value = "churn_predictions.csv")]
    pub output: PathBuf,

    /// Number of highest-risk customers to list
    #[arg(long, default_value = "10")]
    pub top: usize,

    /// Request timeout in seconds
    #[arg(long, default_value = "30")]
    pub timeout_secs: u64,
}

impl ReportArgs {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
