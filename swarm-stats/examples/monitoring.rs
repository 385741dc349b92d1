//! Monitoring example: publish the gauges of a swarm while its peers come
//! and go, and print the Prometheus scrape after every round.
//!
//! Run with:
//!   RUST_LOG=swarm_stats=debug cargo run --example monitoring -p swarm-stats -- --loss 0.02 --burst 4

use anyhow::{Context as _, Result};
use clap::Parser;
use prometheus_client::{encoding::text::encode, registry::Registry};
use std::sync::Arc;
use swarm_stats::{
    MetricsConfig, Reporter, register_all,
    testnet::{JoinOptions, LossModel, Nat, SessionOptions, Testnet, Topic},
};
use tracing::info;

#[derive(Parser)]
struct Command {
    /// number of servers the observed swarm connects to
    #[arg(long, default_value = "4")]
    peers: usize,

    /// one server leaves every round, until none is left
    #[arg(long, default_value = "3")]
    rounds: usize,

    /// bytes sent to every server each round
    #[arg(long, default_value = "65536")]
    bytes: u64,

    /// fraction of the packets that get lost, in [0, 1]
    #[arg(long, default_value = "0")]
    loss: f64,

    /// lose packets in bursts of this many packets on average
    #[arg(long)]
    burst: Option<f64>,

    #[arg(long, default_value = "0")]
    seed: u64,

    #[arg(long, default_value = "hyperswarm")]
    prefix: String,
}

fn main() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cmd = Command::parse();

    let loss = match cmd.burst {
        Some(burst) => LossModel::bursty(cmd.loss, burst),
        None => LossModel::independent(cmd.loss),
    }
    .context("invalid loss model")?;

    let testnet = Testnet::builder()
        .set_seed(cmd.seed)
        .set_loss_model(loss)
        .build()
        .context("invalid testnet settings")?;
    let topic = Topic::from([0x5e; 32]);

    let swarm = Arc::new(testnet.session(SessionOptions::default()));
    swarm.join(topic, JoinOptions::client())?;

    let mut servers = Vec::with_capacity(cmd.peers);
    for i in 0..cmd.peers {
        let nat = [Nat::Public, Nat::Open, Nat::Consistent, Nat::Random][i % 4];
        let server = testnet.session(SessionOptions { nat });
        server.join(topic, JoinOptions::server())?;
        servers.push(server);
    }
    let connected = testnet.flush();
    info!(connected, loss = cmd.loss, burst = ?cmd.burst, "swarm connected");

    let mut registry = Registry::default();
    let config = MetricsConfig::default().with_prefix(cmd.prefix);
    register_all(&Reporter::attach(Arc::clone(&swarm)), &mut registry, &config);

    for round in 1..=cmd.rounds {
        for server in &servers {
            swarm.send(server.id(), cmd.bytes)?;
            server.send(swarm.id(), cmd.bytes / 4)?;
        }

        if !servers.is_empty() {
            let leaving = servers.remove(0);
            leaving.destroy()?;
            info!(round, peer = %leaving.id(), "server left");
        }
        testnet.settle();

        let mut text = String::new();
        encode(&mut text, &registry).context("failed to encode the registry")?;
        println!("# round {round}");
        println!("{text}");
    }

    Ok(())
}
