//! HTTP API tests: the router is driven in-process, and delete fan-out runs
//! against a mock chunkserver listening on loopback.

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{Request, StatusCode},
    routing::delete,
    Router,
};
use chunkmaster::common::MasterConfig;
use chunkmaster::master::chunkserver_client::HttpChunkserverClient;
use chunkmaster::master::http::create_router;
use chunkmaster::master::persistence::MemoryPersistence;
use chunkmaster::MasterService;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tower::ServiceExt;

type Deletions = Arc<Mutex<Vec<(String, String, u64)>>>;

#[derive(Deserialize)]
struct ChunkParams {
    object_id: String,
    chunk_index: u64,
}

/// Serves `/{node}/api/chunk/delete`; node "broken" always answers 500 and
/// node "slow" answers only after two seconds.
async fn start_mock_chunkservers() -> (String, Deletions) {
    async fn delete_chunk(
        State(deletions): State<Deletions>,
        Path(node): Path<String>,
        Query(params): Query<ChunkParams>,
    ) -> StatusCode {
        match node.as_str() {
            "broken" => return StatusCode::INTERNAL_SERVER_ERROR,
            "slow" => tokio::time::sleep(Duration::from_secs(2)).await,
            _ => {}
        }
        deletions
            .lock()
            .unwrap()
            .push((node, params.object_id, params.chunk_index));
        StatusCode::OK
    }

    let deletions: Deletions = Arc::default();
    let app = Router::new()
        .route("/:node/api/chunk/delete", delete(delete_chunk))
        .with_state(deletions.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), deletions)
}

fn router(chunkservers: Vec<String>) -> Router {
    router_with_timeout(chunkservers, Duration::from_secs(2))
}

fn router_with_timeout(chunkservers: Vec<String>, delete_timeout: Duration) -> Router {
    let config = MasterConfig {
        chunkservers,
        ..Default::default()
    };
    let client = Arc::new(HttpChunkserverClient::new(delete_timeout).unwrap());
    let service = MasterService::new(&config, Arc::new(MemoryPersistence::new()), client).unwrap();
    create_router(Arc::new(service), config.max_body_bytes)
}

async fn call(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn delete_req(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn local_endpoints() -> Vec<String> {
    (1..=3)
        .map(|i| format!("http://localhost:900{}/chunkserver{}", i, i))
        .collect()
}

#[tokio::test]
async fn test_plan_and_lookup() {
    let router = router(local_endpoints());

    let (status, body) = call(
        &router,
        post_json(
            "/api/master/upload",
            json!({ "object_id": "photo-001", "size_bytes": 1_000_000 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["object_id"], "photo-001");
    assert_eq!(body["replication_factor_observed"], 3);
    assert_eq!(body["chunks"].as_array().unwrap().len(), 93);
    assert_eq!(body["chunks"][0]["chunk_index"], 0);
    assert_eq!(body["chunks"][0]["replica_index"], 0);

    let (status, record) = call(&router, get("/api/master/metadata?object_id=photo-001")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["id"], "photo-001");
    assert_eq!(record["size"], 1_000_000);
    assert_eq!(record["chunks"], body["chunks"]);
    assert!(record["created_at"].is_string());

    let (status, files) = call(&router, get("/api/master/files")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(files.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unknown_object_is_404() {
    let router = router(local_endpoints());

    let (status, body) = call(&router, get("/api/master/metadata?object_id=missing")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "error");
    assert_eq!(body["kind"], "not_found");

    let (status, _) = call(&router, delete_req("/api/master/delete?object_id=missing")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_requests_rejected() {
    let router = router(local_endpoints());

    let (status, body) = call(
        &router,
        post_json(
            "/api/master/upload",
            json!({ "object_id": "neg", "size_bytes": -5 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalid_request");

    let (status, _) = call(
        &router,
        post_json(
            "/api/master/upload",
            json!({ "object_id": "", "size_bytes": 5 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(
        &router,
        post_json("/api/master/upload", json!({ "imagenId": "x", "size": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");

    let (status, _) = call(&router, get("/api/master/metadata")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, files) = call(&router, get("/api/master/files")).await;
    assert!(files.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_oversized_plan_rejected() {
    let router = router(local_endpoints());
    let (status, body) = call(
        &router,
        post_json(
            "/api/master/upload",
            json!({ "object_id": "huge", "size_bytes": 4_000_000_000_000i64 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalid_request");

    let (status, _) = call(&router, get("/api/master/metadata?object_id=huge")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_plan_without_chunkservers_is_503() {
    let router = router(Vec::new());
    let (status, body) = call(
        &router,
        post_json(
            "/api/master/upload",
            json!({ "object_id": "x", "size_bytes": 10 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["kind"], "no_chunkservers_available");
}

#[tokio::test]
async fn test_chunkserver_membership_and_health() {
    let router = router(Vec::new());

    for endpoint in ["http://cs1", "http://cs2", "http://cs2"] {
        let (status, _) = call(
            &router,
            post_json(
                "/api/master/chunkservers/register",
                json!({ "endpoint": endpoint }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, list) = call(&router, get("/api/master/chunkservers")).await;
    assert_eq!(list, json!(["http://cs1", "http://cs2"]));

    let (_, health) = call(&router, get("/api/master/health/cluster")).await;
    assert_eq!(health["status"], "DEGRADED");
    assert_eq!(health["available_chunkservers"], 2);
    assert_eq!(health["required_for_replication"], 3);

    let (_, body) = call(
        &router,
        post_json(
            "/api/master/chunkservers/register",
            json!({ "endpoint": "http://cs3" }),
        ),
    )
    .await;
    assert_eq!(body["changed"], true);
    assert_eq!(body["total_chunkservers"], 3);

    let (_, health) = call(&router, get("/api/master/health/cluster")).await;
    assert_eq!(health["status"], "HEALTHY");

    let (status, body) = call(
        &router,
        post_json(
            "/api/master/chunkservers/unregister",
            json!({ "endpoint": "http://nowhere" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["changed"], false);
}

#[tokio::test]
async fn test_liveness_and_request_id() {
    let router = router(Vec::new());
    let response = router
        .clone()
        .oneshot(get("/api/master/health"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let (_, body) = call(&router, get("/api/master/health")).await;
    assert_eq!(body["status"], "UP");
}

#[tokio::test]
async fn test_stats() {
    let router = router(local_endpoints());
    for id in ["a", "b"] {
        call(
            &router,
            post_json(
                "/api/master/upload",
                json!({ "object_id": id, "size_bytes": 4 * 32768 }),
            ),
        )
        .await;
    }

    let (status, stats) = call(&router, get("/api/master/stats")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_files"], 2);
    assert_eq!(stats["total_unique_chunks"], 8);
    assert_eq!(stats["total_replicas"], 24);
    assert_eq!(stats["replication_efficiency"], 3.0);
    assert_eq!(stats["health_status"]["status"], "HEALTHY");
    assert_eq!(stats["persistence_stats"]["backend"], "memory");
}

#[tokio::test]
async fn test_delete_fans_out_over_http() {
    let (base, deletions) = start_mock_chunkservers().await;
    let endpoints = vec![
        format!("{}/cs1", base),
        format!("{}/broken", base),
        format!("{}/cs3", base),
    ];
    let router = router(endpoints);

    let (status, _) = call(
        &router,
        post_json(
            "/api/master/upload",
            json!({ "object_id": "img", "size_bytes": 100 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(&router, delete_req("/api/master/delete?object_id=img")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["deleted_replica_count"], 2);
    assert_eq!(body["failed_replica_count"], 1);

    let mut seen = deletions.lock().unwrap().clone();
    seen.sort();
    assert_eq!(
        seen,
        vec![
            ("cs1".to_string(), "img".to_string(), 0),
            ("cs3".to_string(), "img".to_string(), 0),
        ]
    );

    let (status, _) = call(&router, get("/api/master/metadata?object_id=img")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_slow_replica_times_out_as_failure() {
    let (base, deletions) = start_mock_chunkservers().await;
    let endpoints = vec![format!("{}/cs1", base), format!("{}/slow", base)];
    let router = router_with_timeout(endpoints, Duration::from_millis(300));

    let (status, _) = call(
        &router,
        post_json(
            "/api/master/upload",
            json!({ "object_id": "img", "size_bytes": 100 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let started = Instant::now();
    let (status, body) = call(&router, delete_req("/api/master/delete?object_id=img")).await;
    let elapsed = started.elapsed();

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted_replica_count"], 1);
    assert_eq!(body["failed_replica_count"], 1);
    assert!(body["failures"][0]["chunkserver_endpoint"]
        .as_str()
        .unwrap()
        .ends_with("/slow"));
    assert!(elapsed < Duration::from_millis(1500), "took {:?}", elapsed);

    assert_eq!(
        deletions.lock().unwrap().clone(),
        vec![("cs1".to_string(), "img".to_string(), 0)]
    );
    let (status, _) = call(&router, get("/api/master/metadata?object_id=img")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
