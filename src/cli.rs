// src/cli.rs

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "webhook2matrix",
    version,
    about = "Relay authenticated webhook callbacks into a Matrix room"
)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", env = "WEBHOOK2MATRIX_CONFIG")]
    pub config: PathBuf,

    /// Emit logs as JSON
    #[arg(long, env = "WEBHOOK2MATRIX_JSON_LOGS")]
    pub json_logs: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
