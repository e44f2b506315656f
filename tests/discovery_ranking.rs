//! Discovery Ranking and Failover Tests
//!
//! Ranking: ascending latency, ties by descending uptime, then
//! registration order. Failover: ranked instances first, the authoritative
//! source last.

use std::sync::Arc;
use std::sync::Mutex;

use chrono::Utc;
use mirrornet::client::{execute_with_failover, failover_plan, DiscoveredInstance};
use mirrornet::discovery::{DiscoveryFilter, DiscoveryService};
use mirrornet::observability::MetricsRegistry;
use mirrornet::registry::{
    HealthCheckSample, InstanceMetadata, InstanceRegistry, RegistryConfig,
};
use uuid::Uuid;

fn setup() -> (Arc<InstanceRegistry>, DiscoveryService) {
    let metrics = Arc::new(MetricsRegistry::new());
    let registry = Arc::new(
        InstanceRegistry::new(RegistryConfig::default(), Arc::clone(&metrics)).unwrap(),
    );
    let discovery = DiscoveryService::new(Arc::clone(&registry), metrics);
    (registry, discovery)
}

/// Register an instance and feed it a probe history that lands on the
/// given rolling latency and uptime.
fn seed_instance(
    registry: &InstanceRegistry,
    url: &str,
    latency_ms: u64,
    failed_probes: usize,
    ok_probes: usize,
) -> Uuid {
    let record = registry.register(url, InstanceMetadata::default()).unwrap();
    for _ in 0..failed_probes {
        registry
            .record_sample(HealthCheckSample::failed(record.id, Utc::now(), 0, "blip"))
            .unwrap();
    }
    for _ in 0..ok_probes {
        registry
            .record_sample(HealthCheckSample::ok(record.id, Utc::now(), latency_ms))
            .unwrap();
    }
    record.id
}

// =============================================================================
// Ranking
// =============================================================================

/// A(50ms), B(10ms), C(30ms), equal uptime, all online → [B, C, A].
#[test]
fn test_latency_ranking_example() {
    let (registry, discovery) = setup();
    seed_instance(&registry, "http://a:7800", 50, 0, 4);
    seed_instance(&registry, "http://b:7800", 10, 0, 4);
    seed_instance(&registry, "http://c:7800", 30, 0, 4);

    let ranked = discovery.query(&DiscoveryFilter::default());
    let urls: Vec<&str> = ranked.iter().map(|r| r.url.as_str()).collect();

    assert_eq!(urls, vec!["http://b:7800", "http://c:7800", "http://a:7800"]);
}

/// Equal latency: higher uptime ranks first.
#[test]
fn test_uptime_tie_break() {
    let (registry, discovery) = setup();
    // One failed probe in the window lowers uptime below the other's
    seed_instance(&registry, "http://shakier:7800", 20, 1, 3);
    seed_instance(&registry, "http://steadier:7800", 20, 0, 4);

    let ranked = discovery.query(&DiscoveryFilter::default());
    assert_eq!(ranked[0].url, "http://steadier:7800");
    assert_eq!(ranked[1].url, "http://shakier:7800");
}

/// Fully tied metrics fall back to registration order.
#[test]
fn test_registration_order_tie_break() {
    let (registry, discovery) = setup();
    seed_instance(&registry, "http://first:7800", 20, 0, 2);
    seed_instance(&registry, "http://second:7800", 20, 0, 2);

    let ranked = discovery.query(&DiscoveryFilter::default());
    assert_eq!(ranked[0].url, "http://first:7800");
}

/// Every query is a fresh snapshot: new probe results reorder the next
/// query, not the one already returned.
#[test]
fn test_query_returns_fresh_snapshot() {
    let (registry, discovery) = setup();
    let fast = seed_instance(&registry, "http://fast:7800", 10, 0, 2);
    seed_instance(&registry, "http://slow:7800", 90, 0, 2);

    let before = discovery.query(&DiscoveryFilter::default());
    assert_eq!(before[0].url, "http://fast:7800");

    // The fast instance turns slow
    for _ in 0..50 {
        registry
            .record_sample(HealthCheckSample::ok(fast, Utc::now(), 500))
            .unwrap();
    }

    assert_eq!(before[0].url, "http://fast:7800");
    let after = discovery.query(&DiscoveryFilter::default());
    assert_eq!(after[0].url, "http://slow:7800");
}

// =============================================================================
// Failover
// =============================================================================

fn discovered(url: &str, latency: f64) -> DiscoveredInstance {
    DiscoveredInstance {
        id: Uuid::new_v4(),
        url: url.to_string(),
        location: None,
        status: "online".to_string(),
        average_latency_ms: latency,
        uptime_percentage: 99.0,
    }
}

/// Client selects B; B fails → retry C; C fails → retry A; A fails → fall
/// back to the authoritative source.
#[tokio::test]
async fn test_failover_walks_ranking_then_source() {
    let ranked = vec![
        discovered("http://b:7800", 10.0),
        discovered("http://c:7800", 30.0),
        discovered("http://a:7800", 50.0),
    ];
    let plan = failover_plan(&ranked, "http://source:7800");
    assert_eq!(
        plan,
        vec!["http://b:7800", "http://c:7800", "http://a:7800", "http://source:7800"]
    );

    let attempts = Mutex::new(Vec::new());
    let result = execute_with_failover(&plan, |url| {
        attempts.lock().unwrap().push(url.clone());
        async move {
            if url == "http://source:7800" {
                Ok("served by source")
            } else {
                Err(format!("{} unavailable", url))
            }
        }
    })
    .await
    .unwrap();

    assert_eq!(result, "served by source");
    assert_eq!(
        *attempts.lock().unwrap(),
        vec![
            "http://b:7800".to_string(),
            "http://c:7800".to_string(),
            "http://a:7800".to_string(),
            "http://source:7800".to_string(),
        ]
    );
}

/// The top-ranked instance answering means nothing else is contacted.
#[tokio::test]
async fn test_top_instance_short_circuits() {
    let plan = failover_plan(
        &[discovered("http://b:7800", 10.0), discovered("http://c:7800", 30.0)],
        "http://source:7800",
    );

    let attempts = Mutex::new(0usize);
    let result = execute_with_failover(&plan, |url| {
        *attempts.lock().unwrap() += 1;
        async move { Ok::<_, String>(url) }
    })
    .await
    .unwrap();

    assert_eq!(result, "http://b:7800");
    assert_eq!(*attempts.lock().unwrap(), 1);
}

/// Discovery-driven failover: rank from a live registry, then walk the
/// plan as instances fail.
#[tokio::test]
async fn test_ranked_registry_feeds_failover() {
    let (registry, discovery) = setup();
    seed_instance(&registry, "http://a:7800", 50, 0, 2);
    seed_instance(&registry, "http://b:7800", 10, 0, 2);
    seed_instance(&registry, "http://c:7800", 30, 0, 2);

    let ranked: Vec<DiscoveredInstance> = discovery
        .query(&DiscoveryFilter::default())
        .into_iter()
        .map(|r| DiscoveredInstance {
            id: r.id,
            url: r.url,
            location: r.location,
            status: r.status.as_str().to_string(),
            average_latency_ms: r.average_latency_ms,
            uptime_percentage: r.uptime_percentage,
        })
        .collect();

    let plan = failover_plan(&ranked, "http://source:7800");

    // B is down; C answers
    let result = execute_with_failover(&plan, |url| async move {
        if url == "http://b:7800" {
            Err("connection refused".to_string())
        } else {
            Ok(url)
        }
    })
    .await
    .unwrap();

    assert_eq!(result, "http://c:7800");
}
