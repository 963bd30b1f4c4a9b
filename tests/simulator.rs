//! The balancer in front of a simulated backend fleet.

use std::collections::HashSet;
use std::time::Duration;

use balancer_proxy::load_balancer::Algorithm;
use balancer_proxy::proxy::ForwardSettings;
use balancer_proxy::simulator::BackendFleet;

mod common;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_balancer_over_fleet() {
    let fleet = BackendFleet::builder()
        .backends(3)
        .host("127.0.0.1")
        .seed(5)
        .build()
        .await
        .unwrap();

    let lb = common::start_balancer(Algorithm::RoundRobin, fleet.targets(), ForwardSettings::default()).await;
    let client = reqwest::Client::new();

    let mut servers = HashSet::new();
    for i in 0..6 {
        let (status, body) = common::get(&client, &lb.url(&format!("/req/{}", i))).await;
        assert_eq!(status, 200);
        assert!(body.ends_with(&format!("handle request {}!", i)), "{}", body);
        servers.insert(body.split(',').next().unwrap().to_string());
    }
    assert_eq!(servers.len(), 3);

    // Every backend has reported metrics by now.
    assert!(fleet.backends().all(|b| {
        use balancer_proxy::Target;
        b.active_connections() >= 1 && b.cpu_load() > 0.0
    }));

    lb.shutdown.trigger();
    fleet.shutdown(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn test_resource_based_over_fleet() {
    let fleet = BackendFleet::builder()
        .backends(3)
        .host("127.0.0.1")
        .build()
        .await
        .unwrap();
    let backends: Vec<_> = fleet.backends().cloned().collect();
    backends[0].set_cpu_load(90.0);
    backends[1].set_cpu_load(5.5);
    backends[2].set_cpu_load(40.0);

    let lb = common::start_balancer(Algorithm::ResourceBase, fleet.targets(), ForwardSettings::default()).await;
    let (status, body) = common::get(&reqwest::Client::new(), &lb.url("/req/0")).await;

    assert_eq!(status, 200);
    assert_eq!(body, "Server 1, handle request 0!");

    lb.shutdown.trigger();
    fleet.shutdown(Duration::from_secs(5)).await.unwrap();
}
