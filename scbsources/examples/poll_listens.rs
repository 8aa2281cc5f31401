//! Poll a listens-history service and relay new plays to an in-memory
//! scrobble client.
//!
//! Usage:
//!
//! ```bash
//! cargo run --example poll_listens -- https://listens.example alice
//! ```

use scbcore::{PollerConfig, SourcePoller};
use scbdispatch::{FanoutDispatcher, MemoryClient};
use scbsources::{ListensClient, ListensSource};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,scbcore=debug".into()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let base_url = args.next().unwrap_or_else(|| "http://localhost:8080".to_string());
    let user = args.next().unwrap_or_else(|| "alice".to_string());

    let client = ListensClient::builder(base_url, user).build()?;
    let source = Arc::new(ListensSource::new(client, "listens"));

    let memory = Arc::new(MemoryClient::new("memory"));
    let dispatcher = Arc::new(FanoutDispatcher::new(vec![memory.clone()]));

    let poller = SourcePoller::builder(source, dispatcher)
        .config(PollerConfig::default())
        .clients(vec!["memory".to_string()])
        .build();
    poller.start();

    tokio::signal::ctrl_c().await?;
    poller.stop();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let status = poller.status();
    println!(
        "{} ({}): discovered {} tracks, last activity {}",
        status.name, status.kind, status.tracks_discovered, status.last_activity_at
    );
    for play in memory.scrobbled().await {
        println!("  {play}");
    }
    Ok(())
}
