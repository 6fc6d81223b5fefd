use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use gantry_broker::config::BrokerConfig;
use gantry_broker::coordination::InMemoryCoordination;
use gantry_broker::node::BrokerNode;
use gantry_broker::replication::{InProcessConnector, SyncService};
use gantry_mq::queue::InMemoryQueue;

/// gantry-broker - dependency-aware task broker node
#[derive(Parser)]
#[command(name = "gantry-broker")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Comma-separated coordination service hosts
    #[arg(
        long = "zookeeper",
        value_delimiter = ',',
        default_value = "localhost:2181"
    )]
    zookeeper: Vec<String>,

    /// Coordination session timeout in milliseconds
    #[arg(long = "zookeeper-timeout", default_value_t = 3000)]
    zookeeper_timeout: u64,

    /// Advertised host:port of this broker
    #[arg(long, default_value = "localhost:6783")]
    address: String,

    /// Bind port; defaults to the port in --address
    #[arg(long)]
    port: Option<u16>,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<BrokerConfig> {
        let mut config = BrokerConfig::new(self.address).context("invalid --address")?;
        config.coordination_hosts = self.zookeeper;
        config.coordination_timeout = Duration::from_millis(self.zookeeper_timeout);
        if let Some(port) = self.port {
            config.port = port;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Cli::parse().into_config()?;
    let address = config.address.clone();
    info!(
        %address,
        port = config.port,
        hosts = ?config.coordination_hosts,
        "starting broker (standalone: in-process coordination service)"
    );

    let coordination = InMemoryCoordination::new();
    let connector = Arc::new(InProcessConnector::<SyncService<InMemoryQueue>>::new());

    let node: BrokerNode<InMemoryQueue, _, _> =
        BrokerNode::new(config, coordination.session(), Arc::clone(&connector));
    connector.register(address, node.sync_service());

    node.start().await.context("broker startup failed")?;
    info!("broker running; press ctrl-c to stop");

    tokio::signal::ctrl_c()
        .await
        .context("could not listen for shutdown signal")?;
    node.shutdown().await;
    Ok(())
}
