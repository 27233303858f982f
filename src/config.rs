//! Command-line / environment configuration for the ledger server.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use crate::chain::ChainOptions;
use crate::clock::SystemClock;
use crate::model::HashAlgorithm;

#[derive(Debug, Clone, Parser)]
#[command(name = "code-ledger", version, about = "Hash-linked ledger for generated codes")]
pub struct Config {
    /// Directory holding the ledger journal and its manifest.
    #[arg(long, env = "CODE_LEDGER_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// Address the HTTP server listens on.
    #[arg(long, env = "CODE_LEDGER_BIND", default_value = "127.0.0.1:3000")]
    pub bind: SocketAddr,

    /// Digest function (sha256 or blake3). Fixed once a ledger exists.
    #[arg(long = "hash", env = "CODE_LEDGER_HASH", default_value = "sha256")]
    pub algorithm: HashAlgorithm,

    /// Keep the ledger in memory only; nothing survives a restart.
    #[arg(long)]
    pub in_memory: bool,

    /// Accept an existing journal without walking it first.
    #[arg(long)]
    pub skip_verify_on_open: bool,

    /// Re-verify the whole chain every N seconds in the background.
    #[arg(long, env = "CODE_LEDGER_VERIFY_INTERVAL_SECS")]
    pub verify_interval_secs: Option<u64>,
}

impl Config {
    pub fn chain_options(&self) -> ChainOptions {
        ChainOptions {
            algorithm: self.algorithm,
            clock: Arc::new(SystemClock),
            data_dir: (!self.in_memory).then(|| self.data_dir.clone()),
            verify_on_open: !self.skip_verify_on_open,
        }
    }

    pub fn verify_interval(&self) -> Option<Duration> {
        self.verify_interval_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::parse_from(["code-ledger"]);
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.bind.port(), 3000);
        assert_eq!(config.algorithm, HashAlgorithm::Sha256);
        assert!(config.verify_interval().is_none());

        let opts = config.chain_options();
        assert_eq!(opts.data_dir, Some(PathBuf::from("data")));
        assert!(opts.verify_on_open);
    }

    #[test]
    fn flags_override() {
        let config = Config::parse_from([
            "code-ledger",
            "--hash",
            "blake3",
            "--in-memory",
            "--skip-verify-on-open",
            "--verify-interval-secs",
            "30",
        ]);
        let opts = config.chain_options();
        assert_eq!(opts.algorithm, HashAlgorithm::Blake3);
        assert!(opts.data_dir.is_none());
        assert!(!opts.verify_on_open);
        assert_eq!(config.verify_interval(), Some(Duration::from_secs(30)));
    }
}
