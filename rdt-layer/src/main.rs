//! Entry point for `rdt-sim`.
//!
//! Runs one transfer between a client and a server engine over a pair of
//! simulated unreliable channels and prints a summary.  All protocol work
//! lives in the library; `main.rs` owns only process setup (logging,
//! argument parsing) and the per-tick driving loop.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use rdt_layer::{RdtConfig, RdtLayer, SimulatorConfig, UnreliableChannel};

const DEFAULT_TEXT: &str = "The quick brown fox jumped over the lazy dog. \
Reliable delivery over an unreliable channel: every byte arrives once, \
in order, or the transfer keeps trying.";

/// Reliable data transfer over a simulated lossy channel.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Text to transfer.
    #[arg(short, long, conflicts_with = "file")]
    data: Option<String>,

    /// Read the data to transfer from a file.
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Payload bytes per data segment.
    #[arg(long, default_value_t = 4)]
    payload_size: usize,

    /// Flow-control window in bytes.
    #[arg(long, default_value_t = 15)]
    window: usize,

    /// Retransmit timeout in ticks.
    #[arg(long, default_value_t = 4)]
    timeout: u64,

    /// Probability a segment is dropped.
    #[arg(long, default_value_t = 0.1)]
    loss: f64,

    /// Probability a data segment is corrupted.
    #[arg(long, default_value_t = 0.1)]
    corrupt: f64,

    /// Probability a segment is duplicated.
    #[arg(long, default_value_t = 0.05)]
    duplicate: f64,

    /// Probability a segment is delayed.
    #[arg(long, default_value_t = 0.1)]
    delay: f64,

    /// Maximum extra ticks of delay.
    #[arg(long, default_value_t = 3)]
    max_delay: u64,

    /// Probability that segments ready in the same tick are shuffled.
    #[arg(long, default_value_t = 0.2)]
    reorder: f64,

    /// RNG seed for the fault model.
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Give up after this many ticks.
    #[arg(long, default_value_t = 100_000)]
    max_ticks: u64,
}

fn main() -> Result<()> {
    // Initialise env_logger; set RUST_LOG to control verbosity.
    env_logger::init();

    let cli = Cli::parse();

    let data = match (&cli.data, &cli.file) {
        (_, Some(path)) => {
            std::fs::read(path).with_context(|| format!("reading {}", path.display()))?
        }
        (Some(text), None) => text.clone().into_bytes(),
        (None, None) => DEFAULT_TEXT.as_bytes().to_vec(),
    };

    let config = RdtConfig {
        payload_size: cli.payload_size,
        window_size: cli.window,
        timeout_ticks: cli.timeout,
    };
    let faults = SimulatorConfig {
        loss_rate: cli.loss,
        corrupt_rate: cli.corrupt,
        duplicate_rate: cli.duplicate,
        delay_rate: cli.delay,
        max_delay: cli.max_delay,
        reorder_rate: cli.reorder,
    };

    let mut client = RdtLayer::new(config)?;
    let mut server = RdtLayer::new(config)?;
    client.configure_outbound_data(data.clone())?;

    let mut c2s = UnreliableChannel::new(faults.clone(), cli.seed)?;
    let mut s2c = UnreliableChannel::new(faults, cli.seed.wrapping_add(1))?;

    log::info!(
        "Transferring {} byte(s): payload={} window={} timeout={}",
        data.len(),
        config.payload_size,
        config.window_size,
        config.timeout_ticks
    );

    while server.delivered_data() != data.as_slice() && server.current_tick() < cli.max_ticks {
        client.tick(&mut c2s, &mut s2c);
        server.tick(&mut s2c, &mut c2s);
        c2s.advance();
        s2c.advance();

        if !data.starts_with(server.delivered_data()) {
            bail!(
                "delivered data diverged from source at tick {}",
                server.current_tick()
            );
        }
    }

    let client_stats = client.stats();
    let server_stats = server.stats();
    println!("ticks:               {}", server.current_tick());
    println!("bytes delivered:     {} / {}", server_stats.bytes_delivered, data.len());
    println!("segments sent:       {}", client_stats.segments_sent);
    println!("segment timeouts:    {}", client.timeout_count());
    println!("acks sent:           {}", server_stats.acks_sent);
    println!("checksum failures:   {}", server_stats.checksum_failures);
    println!("duplicates received: {}", server_stats.duplicates);
    println!("client→server:       {:?}", c2s.stats());
    println!("server→client:       {:?}", s2c.stats());
    println!("received:            {}", server.delivered_string());

    if server.delivered_data() != data.as_slice() {
        bail!("transfer incomplete after {} ticks", cli.max_ticks);
    }
    println!("transfer complete: data matches");
    Ok(())
}
