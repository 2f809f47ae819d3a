//! Integration tests for the agent API endpoints

use axum::{
    body::{Body, Bytes},
    http::{Request, StatusCode},
    Router,
};
use chrono::{TimeZone, Utc};
use netstat_lib::{
    export::{
        api::{create_router, AppState},
        StoreCollector,
    },
    health::{components, HealthRegistry},
    models::{Sample, WorkloadSpec},
    observability::AgentMetrics,
    storage::SampleStore,
};
use prometheus::Registry;
use std::sync::Arc;
use tower::ServiceExt;

const METRICS_PATH: &str = "/metrics";

struct TestApp {
    router: Router,
    state: Arc<AppState>,
    metrics: AgentMetrics,
}

async fn setup_test_app() -> TestApp {
    let store = Arc::new(SampleStore::new(5));
    store.upsert(WorkloadSpec {
        name: "web".to_string(),
        image: "nginx:1.25".to_string(),
        pid: 4242,
        creation_time: Utc.timestamp_opt(1_699_999_000, 0).unwrap(),
    });
    let mut sample = Sample::empty(Utc.timestamp_opt(1_700_000_000, 0).unwrap());
    sample.tcp.established = 3;
    sample.udp6.rx_queued = 64;
    store.append_sample("web", sample).unwrap();

    store.upsert(WorkloadSpec {
        name: "idle".to_string(),
        image: String::new(),
        pid: 77,
        creation_time: Utc::now(),
    });

    let health_registry = HealthRegistry::new();
    for name in components::ALL {
        health_registry.register(name).await;
    }

    let registry = Registry::new();
    let metrics = AgentMetrics::new(&registry).unwrap();
    registry
        .register(Box::new(StoreCollector::new(store.clone()).unwrap()))
        .unwrap();

    let state = Arc::new(AppState::new(store, health_registry, registry));
    let router = create_router(state.clone(), METRICS_PATH);

    TestApp {
        router,
        state,
        metrics,
    }
}

async fn get(app: Router, uri: &str) -> (StatusCode, Bytes) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body)
}

#[tokio::test]
async fn test_healthz_returns_ok_when_healthy() {
    let app = setup_test_app().await;

    let (status, body) = get(app.router, "/healthz").await;

    assert_eq!(status, StatusCode::OK);
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "healthy");
    assert!(health["components"]["collector"].is_object());
    assert!(health["components"]["housekeeping"].is_object());
    assert!(health["components"]["discovery"].is_object());
}

#[tokio::test]
async fn test_healthz_returns_ok_when_degraded() {
    let app = setup_test_app().await;
    app.state
        .health_registry
        .set_degraded(components::DISCOVERY, "cgroup root unreadable")
        .await;

    let (status, body) = get(app.router, "/healthz").await;

    // Degraded is still operational
    assert_eq!(status, StatusCode::OK);
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "degraded");
}

#[tokio::test]
async fn test_healthz_returns_503_when_unhealthy() {
    let app = setup_test_app().await;
    app.state
        .health_registry
        .set_unhealthy(components::COLLECTOR, "stopped")
        .await;

    let (status, body) = get(app.router, "/healthz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "unhealthy");
}

#[tokio::test]
async fn test_readyz_follows_readiness() {
    let app = setup_test_app().await;

    let (status, _) = get(app.router.clone(), "/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    app.state.health_registry.set_ready(true).await;
    let (status, body) = get(app.router, "/readyz").await;

    assert_eq!(status, StatusCode::OK);
    let readiness: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(readiness["ready"], true);
}

#[tokio::test]
async fn test_list_containers() {
    let app = setup_test_app().await;

    let (status, body) = get(app.router, "/api/containers").await;

    assert_eq!(status, StatusCode::OK);
    let containers: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(containers.as_object().unwrap().len(), 2);
    assert_eq!(containers["web"]["spec"]["pid"], 4242);
    assert_eq!(containers["web"]["stats"][0]["tcp"]["established"], 3);
    assert_eq!(containers["idle"]["stats"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_get_container() {
    let app = setup_test_app().await;

    let (status, body) = get(app.router, "/api/containers/web").await;

    assert_eq!(status, StatusCode::OK);
    let record: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(record["spec"]["image"], "nginx:1.25");
    assert_eq!(record["stats"][0]["udp6"]["rx_queued"], 64);
}

#[tokio::test]
async fn test_get_unknown_container_returns_404() {
    let app = setup_test_app().await;

    let (status, _) = get(app.router, "/api/containers/missing").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_api_index_lists_resources() {
    let app = setup_test_app().await;

    let (status, body) = get(app.router, "/api/").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(String::from_utf8(body.to_vec()).unwrap().contains("containers"));
}

#[tokio::test]
async fn test_metrics_endpoint_returns_prometheus_format() {
    let app = setup_test_app().await;
    app.metrics.observe_collection_latency(0.001);
    app.metrics.observe_collection_latency(0.01);

    let response = app
        .router
        .oneshot(
            Request::builder()
                .uri(METRICS_PATH)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().contains("text/plain"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let metrics_text = String::from_utf8(body.to_vec()).unwrap();

    assert!(metrics_text.contains("netstat_agent_collection_latency_seconds_bucket"));
    assert!(metrics_text.contains("netstat_agent_collection_latency_seconds_count"));
    assert!(metrics_text.contains(
        r#"netstat_container_network_tcp_usage_total{id="web",image="nginx:1.25",tcp_state="established"} 3"#
    ));
    assert!(metrics_text
        .contains(r#"netstat_container_timestamp{id="web",image="nginx:1.25"} 1700000000"#));
    // Workloads without samples have no series
    assert!(!metrics_text.contains(r#"id="idle""#));
}

#[tokio::test]
async fn test_custom_prometheus_endpoint() {
    let app = setup_test_app().await;
    let router = create_router(app.state.clone(), "/custom/metrics");

    let (status, _) = get(router.clone(), "/custom/metrics").await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = get(router, METRICS_PATH).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
