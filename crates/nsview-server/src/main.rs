//! nsview server binary.
//!
//! Connects to the cluster, starts one watcher per tracked resource
//! kind, and serves the viewer API until interrupted.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use regex::Regex;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use nsview_broker::{Broker, BrokerConfig};
use nsview_redact::RedactionPolicy;
use nsview_server::{ServerConfig, ViewerServer};
use nsview_watch::{ClusterClient, WatchFilter, WatchPipeline, in_cluster};

/// Capacity of the queue between the watcher tasks and the pipeline.
const RAW_EVENT_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Parser)]
#[command(name = "nsview", version, about = "Real-time Kubernetes namespace viewer")]
struct Args {
    /// Address to bind the HTTP server to.
    #[arg(long, default_value = "0.0.0.0:8000", env = "NSVIEW_BIND")]
    bind: std::net::SocketAddr,

    /// Restrict watching and serving to a single namespace.
    #[arg(long, env = "NSVIEW_NAMESPACE")]
    namespace: Option<String>,

    /// Only publish resources whose name matches this regex.
    #[arg(long, env = "NSVIEW_NAME_FILTER")]
    name_filter: Option<String>,

    /// Seconds between heartbeat pings to every subscriber.
    #[arg(long, default_value_t = 10, env = "NSVIEW_HEARTBEAT_SECS")]
    heartbeat_secs: u64,

    /// Per-subscriber delivery channel capacity.
    #[arg(long, default_value_t = 64)]
    channel_capacity: usize,

    /// Maximum concurrent SSE connections.
    #[arg(long, default_value_t = 1000)]
    max_connections: usize,

    /// Track EndpointSlices instead of legacy Endpoints.
    #[arg(long)]
    endpoint_slices: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    info!(in_cluster = in_cluster(), bind = %args.bind, "starting nsview");

    // No cluster at all is the one fatal startup condition.
    let cluster = ClusterClient::connect()
        .await
        .context("failed to connect to the cluster")?
        .with_endpoint_slices(args.endpoint_slices);

    let broker = Broker::new(
        BrokerConfig::new()
            .with_channel_capacity(args.channel_capacity)
            .with_heartbeat_interval(Duration::from_secs(args.heartbeat_secs)),
    );
    let heartbeat = broker.spawn_heartbeat();

    let policy = Arc::new(RedactionPolicy::standard());

    let mut filter = WatchFilter::none();
    if let Some(ns) = &args.namespace {
        filter = filter.with_namespace(ns.clone());
    }
    if let Some(pattern) = &args.name_filter {
        let regex = Regex::new(pattern).context("invalid --name-filter regex")?;
        filter = filter.with_name_pattern(regex);
    }

    let (raw_tx, raw_rx) = mpsc::channel(RAW_EVENT_QUEUE_CAPACITY);
    let pipeline =
        WatchPipeline::new(broker.clone(), Arc::clone(&policy)).with_filter(filter);
    let pipeline_task = tokio::spawn(pipeline.run(raw_rx));

    let watchers = cluster.spawn_watchers(args.namespace.as_deref(), &raw_tx);
    drop(raw_tx);
    info!(watchers = watchers.len(), "cluster watchers started");

    let config = {
        let mut config = ServerConfig::new(args.bind)
            .with_max_sse_connections(args.max_connections);
        if let Some(ns) = &args.namespace {
            config = config.with_namespace(ns.clone());
        }
        config
    };

    let server = ViewerServer::new(config, broker, Arc::new(cluster), policy);
    server
        .serve_with_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;

    // Stop producing new events; in-flight deliveries need not drain.
    heartbeat.abort();
    for watcher in watchers {
        watcher.abort();
    }
    pipeline_task.abort();

    Ok(())
}
