use kv_throttle::infrastructure::mocks::{CorruptedStorage, MemorySnapshot};
use kv_throttle::{
    AddressHash, ClientId, GetOutcome, KvService, PutOutcome, PutRequest, Quota, RateLimiter,
    SnapshotStore, Store, Sweeper, SweeperConfig,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn in_memory_service() -> KvService {
    KvService::builder()
        .with_snapshot_store(Arc::new(MemorySnapshot::new()))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_write_then_read() {
    let service = in_memory_service();

    let outcome = service
        .put("127.0.0.1", PutRequest::new("greeting", json!("hello")))
        .await;

    assert!(outcome.is_stored());
    assert_eq!(service.get("greeting"), GetOutcome::Found(json!("hello")));
    assert_eq!(service.get("unknown").to_string(), "Not found");
}

#[tokio::test]
async fn test_throttled_write_changes_nothing() {
    let service = in_memory_service();

    service.put("127.0.0.1", PutRequest::new("a", json!(1))).await;
    service.put("127.0.0.1", PutRequest::new("a", json!(2))).await;
    let outcome = service.put("127.0.0.1", PutRequest::new("a", json!(3))).await;

    assert_eq!(outcome, PutOutcome::Throttled);
    assert_eq!(outcome.message(), "Try after some time");
    assert_eq!(service.get("a"), GetOutcome::Found(json!(2)));

    // The counter stays at the limit while denied
    let client = service.limiter().identify("127.0.0.1");
    assert_eq!(service.store().counter_get(client), Some(2));
}

#[tokio::test]
async fn test_clients_are_throttled_independently() {
    let service = KvService::builder()
        .with_snapshot_store(Arc::new(MemorySnapshot::new()))
        .with_rate_limit(1)
        .build()
        .unwrap();

    assert!(service.put("10.0.0.1", PutRequest::new("x", json!(1))).await.is_stored());
    assert!(service.put("10.0.0.2", PutRequest::new("y", json!(2))).await.is_stored());
    assert!(service.put("10.0.0.1", PutRequest::new("z", json!(3))).await.is_throttled());
    assert!(service.put("10.0.0.2", PutRequest::new("z", json!(3))).await.is_throttled());

    let metrics = service.metrics().snapshot();
    assert_eq!(metrics.requests_admitted, 2);
    assert_eq!(metrics.requests_denied, 2);
    assert_eq!(metrics.total_requests(), 4);
}

#[tokio::test]
async fn test_ip_only_identity_ignores_ports() {
    let service = KvService::builder()
        .with_snapshot_store(Arc::new(MemorySnapshot::new()))
        .with_rate_limit(1)
        .with_identity(Arc::new(AddressHash::ip_only()))
        .build()
        .unwrap();

    let first = service
        .put("192.0.2.10:40001", PutRequest::new("a", json!(1)))
        .await;
    let second = service
        .put("192.0.2.10:40002", PutRequest::new("b", json!(2)))
        .await;

    assert!(first.is_stored());
    assert!(second.is_throttled());
}

#[tokio::test]
async fn test_sweep_readmits_exhausted_clients() {
    let service = in_memory_service();

    for key in ["a", "b"] {
        service.put("127.0.0.1", PutRequest::new(key, json!(0))).await;
    }
    assert!(service
        .put("127.0.0.1", PutRequest::new("c", json!(0)))
        .await
        .is_throttled());

    assert_eq!(service.sweep_now(), 1);

    assert!(service
        .put("127.0.0.1", PutRequest::new("c", json!(0)))
        .await
        .is_stored());
    assert_eq!(service.metrics().counters_swept(), 1);
}

#[test]
fn test_limiter_and_sweeper_share_one_store() {
    let store = Arc::new(Store::new());
    let limiter = RateLimiter::new(Arc::clone(&store), Quota::new(3).unwrap());
    let sweeper = Sweeper::new(
        Arc::clone(&store),
        SweeperConfig::new(Duration::from_secs(30), 3).unwrap(),
    );

    let busy = ClientId::from_address("busy");
    let idle = ClientId::from_address("idle");
    for _ in 0..5 {
        limiter.check_client(busy);
    }
    limiter.check_client(idle);

    assert_eq!(sweeper.sweep_once(), 1);
    assert_eq!(store.counter_get(busy), None);
    assert_eq!(store.counter_get(idle), Some(1));
}

#[test]
fn test_corrupted_store_reads_from_snapshot() {
    let snapshot = Arc::new(MemorySnapshot::new());
    snapshot.flush("a", &json!(1)).unwrap();

    let store = Store::with_storage(CorruptedStorage::new()).with_snapshot(snapshot);
    store.put("a", json!("unreachable"));

    assert_eq!(store.get("a"), Some(json!(1)));
    assert_eq!(store.get("b"), None);
}

#[tokio::test]
async fn test_concurrent_writers_respect_quota() {
    let service = Arc::new(
        KvService::builder()
            .with_snapshot_store(Arc::new(MemorySnapshot::new()))
            .with_rate_limit(10)
            .build()
            .unwrap(),
    );

    let tasks: Vec<_> = (0..50)
        .map(|i| {
            let service = Arc::clone(&service);
            tokio::spawn(async move {
                service
                    .put("198.51.100.1", PutRequest::new(format!("k{}", i), json!(i)))
                    .await
            })
        })
        .collect();

    let mut stored = 0;
    for task in tasks {
        if task.await.unwrap().is_stored() {
            stored += 1;
        }
    }

    assert_eq!(stored, 10);
    assert_eq!(service.store().data_len(), 10);
}
