//! Main entry point for the mmp-miner daemon.

use std::sync::Arc;

use clap::Parser;
use mmp_miner::config::SessionConfig;
use mmp_miner::daemon::Daemon;
use mmp_miner::hasher::{Assignment, FinalRound, Hasher, HasherBridge};
use mmp_miner::tracing;

#[derive(Parser, Debug)]
#[command(name = "mmpd", version, about = "MMP mining daemon")]
struct Args {
    /// Server host
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Server port
    #[arg(long, default_value_t = 8332)]
    port: u16,

    /// Login username
    #[arg(short, long)]
    user: String,

    /// Login password
    #[arg(short, long)]
    pass: String,

    /// Display name reported to the server
    #[arg(long)]
    name: Option<String>,

    /// Compute device identity string
    #[arg(long, default_value = "CPU")]
    device: String,

    /// Compute units available on the device
    #[arg(long, default_value_t = 1)]
    cores: u32,
}

/// Stand-in compute engine: accepts assignments and produces no
/// candidates. Real backends drive the [`HasherBridge`] from their own
/// threads.
struct IdleEngine;

impl Hasher for IdleEngine {
    fn assign(&self, _assignment: Assignment) {}
}

impl FinalRound for IdleEngine {
    fn finish(&self, midstate: &[u32; 8], _data: &[u32; 3], _nonce: u32) -> [u32; 8] {
        *midstate
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing::init();

    let args = Args::parse();

    let config = SessionConfig {
        addr: format!("{}:{}", args.host, args.port),
        username: args.user,
        password: args.pass,
        worker_name: args.name,
        device: args.device,
        cores: args.cores,
    };

    let bridge = Arc::new(HasherBridge::new());
    let engine = Arc::new(IdleEngine);

    Daemon::new()
        .run(config, bridge, engine.clone(), engine)
        .await
}
