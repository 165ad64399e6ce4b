//! Command-line / environment configuration

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser};

pub const DEFAULT_DATA_FILE: &str = "cleaned_data_final.csv";

/// Location of the backing exam file.
#[derive(Debug, Clone, Args)]
pub struct DataArgs {
    /// Exam records (.csv, .json or .parquet), re-read on every request
    #[arg(long = "data", env = "EXAM_DATA", default_value = DEFAULT_DATA_FILE)]
    pub path: PathBuf,
}

/// Dashboard service options.
#[derive(Debug, Parser)]
#[command(name = "exam-dashboard", version, about = "Filtered exam score summaries over HTTP")]
pub struct DashboardArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Address to listen on
    #[arg(long, env = "EXAM_BIND", default_value = "127.0.0.1:5000")]
    pub bind: SocketAddr,
}

/// Raw-data service options.
#[derive(Debug, Parser)]
#[command(name = "raw-data", version, about = "Serves every exam record as JSON")]
pub struct RawDataArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Address to listen on
    #[arg(long, env = "EXAM_RAW_BIND", default_value = "127.0.0.1:5001")]
    pub bind: SocketAddr,
}

/// `RUST_LOG`-driven logger, `info` unless overridden.
pub fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}
