//! `ecached`: run a reference cache node or talk to a cluster of them.
//!
//! # Usage
//!
//! ```text
//! ecached serve                                   # node on 127.0.0.1:6378
//! ecached serve -l 127.0.0.1:6379 --max-bytes 64M # second instance
//! ecached set foo "Hello infinity!" --nodes a:6378,b:6378,c:6378
//! ecached get foo --nodes a:6378,b:6378,c:6378
//! ecached ping --nodes a:6378,b:6378,c:6378
//! ecached bench -n 200 -s 65536 --nodes ...
//! ```

mod config;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use ecache_client::Client;
use ecache_net::{TcpTransport, Transport};
use ecache_node::{CacheNode, MemoryChunkStore};
use ecache_types::NodeAddr;
use tracing::info;

use config::CliConfig;

// -----------------------------------------------------------------------
// CLI definition
// -----------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "ecached", version, about = "Erasure-coded distributed cache")]
struct Cli {
    /// Path to TOML config file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a reference cache node.
    Serve {
        /// Override listen address (e.g. "127.0.0.1:6379").
        #[arg(short, long)]
        listen: Option<String>,

        /// Override memory limit in bytes.
        #[arg(long)]
        max_bytes: Option<u64>,
    },

    /// Store a value.
    Set {
        /// Key to store under.
        key: String,
        /// Value, stored as its UTF-8 bytes.
        value: String,
        #[command(flatten)]
        session: SessionArgs,
    },

    /// Fetch a value and print it.
    Get {
        /// Key to fetch.
        key: String,
        #[command(flatten)]
        session: SessionArgs,
    },

    /// Round-trip a ping to every node.
    Ping {
        #[command(flatten)]
        session: SessionArgs,
    },

    /// Sequential set/get loop against a running cluster.
    Bench {
        /// Number of values to write and read.
        #[arg(short = 'n', long, default_value = "100")]
        count: usize,

        /// Size of each value in bytes.
        #[arg(short, long, default_value = "1024")]
        size: usize,

        #[command(flatten)]
        session: SessionArgs,
    },
}

/// Flags shared by every command that talks to a cluster.
#[derive(Args)]
struct SessionArgs {
    /// Comma-separated, ordered node list (overrides `[cluster] nodes`).
    #[arg(long, env = "ECACHE_NODES")]
    nodes: Option<String>,

    /// Data chunks per value.
    #[arg(short = 'd', long)]
    data_chunks: Option<usize>,

    /// Parity chunks per value.
    #[arg(short = 'p', long)]
    parity_chunks: Option<usize>,

    /// Acknowledgements required for a write.
    #[arg(short = 'w', long)]
    write_quorum: Option<usize>,
}

// -----------------------------------------------------------------------
// Entrypoint
// -----------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = CliConfig::load(cli.config.as_deref()).context("failed to load config")?;

    setup_tracing(&config.log.level);

    match cli.command {
        Commands::Serve { listen, max_bytes } => {
            // CLI args override config file values.
            if let Some(addr) = listen {
                config.node.listen_addr = addr;
            }
            if let Some(max) = max_bytes {
                config.node.max_bytes = max;
            }
            cmd_serve(&config).await
        }
        Commands::Set {
            key,
            value,
            session,
        } => {
            let client = connect(&mut config, &session).await?;
            client.set(&key, value.as_bytes()).await?;
            println!("OK");
            Ok(())
        }
        Commands::Get { key, session } => {
            let client = connect(&mut config, &session).await?;
            let value = client.get(&key).await?;
            println!("{}", String::from_utf8_lossy(&value));
            Ok(())
        }
        Commands::Ping { session } => cmd_ping(&config, &session).await,
        Commands::Bench {
            count,
            size,
            session,
        } => {
            let client = connect(&mut config, &session).await?;
            cmd_bench(&client, count, size).await
        }
    }
}

/// Initialize the `tracing` subscriber with the given level filter.
///
/// Respects `RUST_LOG` env var if set, otherwise uses the config value.
fn setup_tracing(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Apply session flags over the config file and dial the cluster.
async fn connect(config: &mut CliConfig, session: &SessionArgs) -> Result<Client> {
    if let Some(d) = session.data_chunks {
        config.client.data_chunks = d;
    }
    if let Some(p) = session.parity_chunks {
        config.client.parity_chunks = p;
    }
    if session.write_quorum.is_some() {
        config.client.write_quorum = session.write_quorum;
    }
    let nodes = config.nodes(session.nodes.as_deref())?;

    let mut client = Client::with_config(config.client.clone())?;
    client
        .dial(&nodes)
        .await
        .with_context(|| format!("failed to dial {}", nodes.join(",")))?;
    Ok(client)
}

// -----------------------------------------------------------------------
// ecached serve
// -----------------------------------------------------------------------

async fn cmd_serve(config: &CliConfig) -> Result<()> {
    let store = Arc::new(MemoryChunkStore::new(config.node.max_bytes));
    let node = CacheNode::bind(config.node.listen_addr.as_str(), store)
        .await
        .with_context(|| format!("failed to bind {}", config.node.listen_addr))?;
    let handle = node.spawn()?;
    info!(addr = %handle.addr(), "node ready, press Ctrl-C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    info!("shutting down");

    let stats = handle.store().stats();
    handle.shutdown().await?;
    info!(chunks = stats.chunks, used_bytes = stats.used_bytes, "node stopped");
    Ok(())
}

// -----------------------------------------------------------------------
// ecached ping
// -----------------------------------------------------------------------

async fn cmd_ping(config: &CliConfig, session: &SessionArgs) -> Result<()> {
    let nodes = config.nodes(session.nodes.as_deref())?;
    let transport = TcpTransport::new(config.client.tcp_config());
    let timeout = config.client.op_timeout();

    let mut failed = 0usize;
    for node in &nodes {
        let addr = NodeAddr::parse(node)?;
        match transport.ping(&addr, timeout).await {
            Ok(rtt) => println!("{addr}  ok  {:.2} ms", rtt.as_secs_f64() * 1000.0),
            Err(e) => {
                failed += 1;
                println!("{addr}  FAILED  {e}");
            }
        }
    }
    anyhow::ensure!(failed == 0, "{failed} of {} nodes unreachable", nodes.len());
    Ok(())
}

// -----------------------------------------------------------------------
// ecached bench
// -----------------------------------------------------------------------

async fn cmd_bench(client: &Client, count: usize, size: usize) -> Result<()> {
    let redundancy = client.redundancy();
    println!("ecache benchmark");
    println!("  values:     {count}");
    println!("  size:       {size} bytes each");
    println!("  redundancy: {redundancy}");
    println!("  nodes:      {}", client.nodes().len());
    println!();

    let data = generate_bench_data(size);
    let total_bytes = count as u64 * size as u64;

    // --- Write ---
    print!("Writing {count} values... ");
    let start = Instant::now();
    for i in 0..count {
        client.set(&format!("bench-{i}"), &data).await?;
    }
    let write_dur = start.elapsed();
    let write_mbs = total_bytes as f64 / write_dur.as_secs_f64() / 1_048_576.0;
    println!("{:.2}s ({write_mbs:.1} MB/s)", write_dur.as_secs_f64());

    // --- Read ---
    print!("Reading {count} values... ");
    let start = Instant::now();
    for i in 0..count {
        let value = client.get(&format!("bench-{i}")).await?;
        anyhow::ensure!(value == data, "bench-{i} read back different bytes");
    }
    let read_dur = start.elapsed();
    let read_mbs = total_bytes as f64 / read_dur.as_secs_f64() / 1_048_576.0;
    println!("{:.2}s ({read_mbs:.1} MB/s)", read_dur.as_secs_f64());

    println!();
    println!("Summary:");
    println!("  Write throughput: {write_mbs:.1} MB/s");
    println!("  Read throughput:  {read_mbs:.1} MB/s");
    println!(
        "  Stored:           {:.1} MB ({:.1} MB with parity)",
        total_bytes as f64 / 1_048_576.0,
        total_bytes as f64 * redundancy.total() as f64
            / redundancy.data_chunks as f64
            / 1_048_576.0
    );

    Ok(())
}

/// Generate deterministic test data for benchmarking.
fn generate_bench_data(size: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(size);
    let mut state: u32 = 0xDEAD_BEEF;
    for _ in 0..size {
        state = state.wrapping_mul(1103515245).wrapping_add(12345);
        data.push((state >> 16) as u8);
    }
    data
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
