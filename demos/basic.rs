//! Basic example demonstrating throttled writes and snapshot persistence.
//!
//! One client writes four values with a limit of 2 writes per client. The
//! third and fourth writes are throttled until the sweeper evicts the
//! exhausted counter. Run with `RUST_LOG=kv_throttle=debug` to see the
//! store's own logging.

use kv_throttle::{KvService, PutRequest};
use serde_json::json;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let snapshot_path = std::env::temp_dir().join("kv-throttle-demo.json");

    let service = KvService::builder()
        .with_rate_limit(2)
        .with_sweep_interval(Duration::from_secs(1))
        .with_snapshot_path(&snapshot_path)
        .build()?;
    service.start_sweeper();

    println!("=== Basic Throttling Example ===\n");
    println!("Limit: 2 writes per client, counters swept every second\n");

    let client = "127.0.0.1:50000";
    for (i, key) in ["a", "b", "c", "d"].iter().enumerate() {
        let request = PutRequest::new(*key, json!(i)).persisted();
        let outcome = service.put(client, request).await;
        println!(
            "put {:?} -> {} {:?}",
            key,
            outcome.status_code(),
            outcome
        );
    }

    println!("\nWaiting for the sweeper...\n");
    tokio::time::sleep(Duration::from_millis(1500)).await;

    let outcome = service.put(client, PutRequest::new("c", json!(2))).await;
    println!("put \"c\" after sweep -> {} {:?}", outcome.status_code(), outcome);

    for key in ["a", "c", "d"] {
        println!("get {:?} -> {}", key, service.get(key));
    }

    println!("\nSnapshot written to {}", snapshot_path.display());
    println!("Metrics: {:?}", service.metrics().snapshot());

    service.shutdown().await?;
    Ok(())
}
