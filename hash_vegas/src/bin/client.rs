use std::{fs, net::SocketAddr, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use hash_vegas::{Config, RunError};
use tracing::Level;

#[derive(Parser, Debug)]
#[command(author, version, about = "Forge a high-value voucher by length extension", long_about = None)]
struct Args {
    /// address of the voucher oracle
    #[arg(short, long, default_value = "127.0.0.1:6380")]
    addr: SocketAddr,

    /// JSON run configuration, defaults are used for missing keys
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// bytes appended to the voucher, overrides the config
    #[arg(long)]
    suffix: Option<String>,

    /// number of concurrent sessions, overrides the config
    #[arg(short, long)]
    parallel: Option<usize>,

    /// log every state transition
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    let mut config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            Config::from_json(&text).with_context(|| format!("invalid config {}", path.display()))?
        }
        None => Config::default(),
    };
    if let Some(suffix) = args.suffix {
        config.suffix = suffix;
    }
    if let Some(parallel) = args.parallel {
        config.parallel_sessions = parallel;
    }

    match hash_vegas::run(args.addr, config).await {
        Ok(success) => {
            println!("{}", String::from_utf8_lossy(&success.redemption.payload));
            println!("{}", success.report);
            Ok(())
        }
        Err(RunError::Exhausted(report)) => {
            println!("{report}");
            anyhow::bail!("no forged voucher was accepted")
        }
        Err(err) => Err(err.into()),
    }
}
