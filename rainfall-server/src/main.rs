//! Binary crate for the `rainfall` prediction service.
//!
//! This crate focuses on:
//! - Parsing CLI arguments and layering them over the config file
//! - Logging setup
//! - The axum HTTP surface around `rainfall_core::PredictionService`

use clap::Parser;

mod cli;
mod http;
mod logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cmd = cli::Cli::parse();
    cmd.run().await
}
