//! Configuration for the ledger binaries
//!
//! Command line arguments with environment fallbacks, plus logger setup.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Asset ledger - repair tracking and repair-vs-replace estimates
#[derive(Parser, Debug, Clone)]
#[command(name = "asset_ledger")]
#[command(about = "Track asset repairs and decide when to replace")]
pub struct Args {
    /// Address the web server listens on
    #[arg(long, env = "LEDGER_LISTEN", default_value = "127.0.0.1:3000")]
    pub listen: SocketAddr,

    /// Workbook file holding the Assets and Repairs tables
    #[arg(long, env = "LEDGER_DATA_FILE", default_value = "database/ledger.bin.gz")]
    pub data_file: PathBuf,

    /// CSV of assets to import at startup (existing IDs are skipped)
    #[arg(long, env = "LEDGER_SEED_CSV")]
    pub seed_csv: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Load `.env` if present, then parse the process arguments.
    pub fn load() -> Self {
        let _ = dotenvy::dotenv();
        Args::parse()
    }
}

/// Start `env_logger`. `RUST_LOG` wins over the configured level when set.
pub fn init_logging(level: &str) {
    let env = env_logger::Env::default().default_filter_or(level);
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_flags() {
        let args = Args::parse_from(["asset_ledger"]);
        assert_eq!(args.data_file, PathBuf::from("database/ledger.bin.gz"));
        assert!(args.seed_csv.is_none());
    }

    #[test]
    fn flags_override_defaults() {
        let args = Args::parse_from([
            "asset_ledger",
            "--listen",
            "0.0.0.0:8080",
            "--data-file",
            "/tmp/ledger.bin.gz",
            "--seed-csv",
            "assets.csv",
            "--log-level",
            "debug",
        ]);
        assert_eq!(args.listen.port(), 8080);
        assert_eq!(args.data_file, PathBuf::from("/tmp/ledger.bin.gz"));
        assert_eq!(args.seed_csv, Some(PathBuf::from("assets.csv")));
        assert_eq!(args.log_level, "debug");
    }
}
