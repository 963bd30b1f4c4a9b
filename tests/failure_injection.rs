//! Failure injection tests for the load balancer.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use balancer_proxy::load_balancer::{Algorithm, Backend, SharedTarget};
use balancer_proxy::proxy::ForwardSettings;

mod common;

#[tokio::test]
async fn test_down_backend_fails_only_its_requests() {
    let live = common::start_mock_backend("live").await;
    let list: Vec<SharedTarget> = vec![
        Arc::new(Backend::new("127.0.0.1", live.port(), 1)),
        Arc::new(Backend::new("127.0.0.1", common::closed_port(), 1)),
    ];
    let lb = common::start_balancer(Algorithm::RoundRobin, list, ForwardSettings::default()).await;
    let client = reqwest::Client::new();

    // No failover: the dead backend keeps its turn.
    let mut statuses = Vec::new();
    for _ in 0..4 {
        statuses.push(common::get(&client, &lb.url("/")).await.0);
    }
    assert_eq!(statuses, [502, 200, 502, 200]);
    lb.shutdown.trigger();
}

#[tokio::test]
async fn test_upstream_error_status_passed_through() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let addr = common::start_programmable_backend(move |_| {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            (503, "Service Unavailable".into())
        }
    })
    .await;
    let list = common::targets(&[addr]);
    let lb = common::start_balancer(Algorithm::RoundRobin, common::shared(&list), ForwardSettings::default()).await;

    let (status, body) = common::get(&reqwest::Client::new(), &lb.url("/req/1")).await;

    assert_eq!(status, 503);
    assert_eq!(body, "Service Unavailable");
    // Never retried.
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    lb.shutdown.trigger();
}

#[tokio::test]
async fn test_slow_backend_times_out() {
    let addr = common::start_programmable_backend(|_| async {
        tokio::time::sleep(Duration::from_secs(3)).await;
        (200, "late".into())
    })
    .await;
    let list = common::targets(&[addr]);
    let settings = ForwardSettings {
        request_timeout: Duration::from_millis(200),
        ..ForwardSettings::default()
    };
    let lb = common::start_balancer(Algorithm::LowestLatency, common::shared(&list), settings).await;

    let (status, _) = common::get(&reqwest::Client::new(), &lb.url("/")).await;
    assert_eq!(status, 504);
    lb.shutdown.trigger();
}

#[tokio::test]
async fn test_graceful_shutdown_stops_accepting() {
    let addr = common::start_mock_backend("ok").await;
    let list = common::targets(&[addr]);
    let lb = common::start_balancer(Algorithm::RoundRobin, common::shared(&list), ForwardSettings::default()).await;

    let client = reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .build()
        .unwrap();
    assert_eq!(common::get(&client, &lb.url("/")).await.0, 200);

    lb.shutdown.trigger();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(client.get(lb.url("/")).send().await.is_err());
}
