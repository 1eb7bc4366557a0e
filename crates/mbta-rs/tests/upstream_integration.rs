//! Integration tests against a fake upstream.
//!
//! These tests start a real axum server on a random port standing in for the
//! MBTA V3 API and drive the reqwest transport, pagination, retry, cache,
//! coalescer and tool dispatcher end to end.

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use mbta_rs::api::retry::RetryConfig;
use mbta_rs::client::SearchArgs;
use mbta_rs::tools::transit_tools;
use mbta_rs::{ApiError, ClientConfig, MbtaClient};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const API_KEY: &str = "test-key";
const JSONAPI: &str = "application/vnd.api+json";

/// Request counters and the last query seen per path.
#[derive(Default)]
struct Upstream {
    base: String,
    hits: Mutex<HashMap<&'static str, usize>>,
    last_query: Mutex<HashMap<&'static str, HashMap<String, String>>>,
    vehicle_calls: AtomicUsize,
}

impl Upstream {
    fn record(&self, path: &'static str, query: &HashMap<String, String>) {
        *self.hits.lock().unwrap().entry(path).or_default() += 1;
        self.last_query
            .lock()
            .unwrap()
            .insert(path, query.clone());
    }

    fn hits(&self, path: &'static str) -> usize {
        self.hits.lock().unwrap().get(path).copied().unwrap_or(0)
    }

    fn last_param(&self, path: &'static str, key: &str) -> Option<String> {
        self.last_query.lock().unwrap().get(path)?.get(key).cloned()
    }
}

fn document(status: StatusCode, body: Value) -> Response {
    (status, [(header::CONTENT_TYPE, JSONAPI)], body.to_string()).into_response()
}

/// Reject requests missing the JSON:API `Accept` header or the API key.
fn authorized(headers: &HeaderMap) -> Result<(), Response> {
    let accept = headers.get(header::ACCEPT).and_then(|v| v.to_str().ok());
    let key = headers.get("x-api-key").and_then(|v| v.to_str().ok());
    if accept == Some(JSONAPI) && key == Some(API_KEY) {
        Ok(())
    } else {
        Err(document(
            StatusCode::FORBIDDEN,
            json!({"errors": [{"status": "403", "code": "forbidden"}]}),
        ))
    }
}

fn station(id: &str, name: &str) -> Value {
    json!({"type": "stop", "id": id,
           "attributes": {"name": name, "latitude": 42.35, "longitude": -71.06, "location_type": 1}})
}

async fn stops(
    State(up): State<Arc<Upstream>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if let Err(rejection) = authorized(&headers) {
        return rejection;
    }
    up.record("stops", &query);
    match query.get("page[offset]").map(String::as_str) {
        None | Some("0") => document(
            StatusCode::OK,
            json!({
                "data": [station("place-pktrm", "Park Street"), station("place-harsq", "Harvard")],
                "links": {"next": format!(
                    "{}/stops?filter%5Blocation_type%5D=1&page%5Blimit%5D=2&page%5Boffset%5D=2",
                    up.base
                )}
            }),
        ),
        Some(_) => document(
            StatusCode::OK,
            json!({"data": [station("place-portr", "Porter")]}),
        ),
    }
}

async fn predictions(
    State(up): State<Arc<Upstream>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if let Err(rejection) = authorized(&headers) {
        return rejection;
    }
    up.record("predictions", &query);
    document(
        StatusCode::OK,
        json!({"data": [
            {"type": "prediction", "id": "prediction-1",
             "attributes": {"arrival_time": "2026-03-02T08:15:00-05:00",
                            "departure_time": "2026-03-02T08:16:00-05:00", "direction_id": 0},
             "relationships": {"route": {"data": {"type": "route", "id": "Red"}},
                               "stop": {"data": {"type": "stop", "id": "70075"}}}}
        ]}),
    )
}

async fn vehicles(
    State(up): State<Arc<Upstream>>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    up.record("vehicles", &query);
    if up.vehicle_calls.fetch_add(1, Ordering::SeqCst) == 0 {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            [(header::RETRY_AFTER, "0")],
            String::new(),
        )
            .into_response();
    }
    document(
        StatusCode::OK,
        json!({"data": [{"type": "vehicle", "id": "y1801", "attributes": {"label": "1801"}}]}),
    )
}

async fn alerts(
    State(up): State<Arc<Upstream>>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    up.record("alerts", &query);
    tokio::time::sleep(Duration::from_millis(50)).await;
    document(StatusCode::OK, json!({"data": []}))
}

async fn route(State(up): State<Arc<Upstream>>, Path(id): Path<String>) -> Response {
    up.record("route", &HashMap::new());
    if id == "Red" {
        return document(
            StatusCode::OK,
            json!({"data": {"type": "route", "id": "Red", "attributes": {"type": 1, "long_name": "Red Line"}}}),
        );
    }
    document(
        StatusCode::NOT_FOUND,
        json!({"errors": [{"status": "404", "code": "not_found"}]}),
    )
}

/// Spawn the fake upstream on port 0 and return it with its base URL.
async fn spawn_upstream() -> (Arc<Upstream>, String) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let upstream = Arc::new(Upstream {
        base: base.clone(),
        ..Default::default()
    });
    let app = Router::new()
        .route("/stops", get(stops))
        .route("/predictions", get(predictions))
        .route("/vehicles", get(vehicles))
        .route("/alerts", get(alerts))
        .route("/routes/{id}", get(route))
        .with_state(upstream.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (upstream, base)
}

fn client(base: &str) -> Arc<MbtaClient> {
    let retry = RetryConfig {
        max_attempts: 3,
        initial_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(50),
        multiplier: 2.0,
        jitter: false,
    };
    let config = ClientConfig::default()
        .with_api_key(API_KEY)
        .with_base_url(base)
        .with_timeout(Duration::from_secs(5))
        .with_retry(retry);
    Arc::new(MbtaClient::new(config).unwrap())
}

// ── Client ───────────────────────────────────────────────────────────

#[tokio::test]
async fn fetch_all_follows_next_links_then_serves_from_cache() {
    let (upstream, base) = spawn_upstream().await;
    let client = client(&base);

    let args = SearchArgs {
        query: "porter".into(),
        ..Default::default()
    };
    let found = client.search_stops(&args).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, "place-portr");
    assert_eq!(upstream.hits("stops"), 2);
    assert_eq!(upstream.last_param("stops", "page[offset]").as_deref(), Some("2"));

    // Same collection, different ranking query: one cached upstream result.
    let args = SearchArgs {
        query: "park".into(),
        limit: Some(1),
        ..Default::default()
    };
    let found = client.search_stops(&args).await.unwrap();
    assert_eq!(found[0].id, "place-pktrm");
    assert_eq!(upstream.hits("stops"), 2);
    assert_eq!(client.cache_stats().hits, 1);
}

#[tokio::test]
async fn missing_api_key_is_rejected_not_retried() {
    let (upstream, base) = spawn_upstream().await;
    let config = ClientConfig::default().with_base_url(&base);
    let client = MbtaClient::new(config).unwrap();

    let err = client
        .search_stops(&SearchArgs {
            query: "park".into(),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Rejected { status: 403, .. }), "{err:?}");
    assert_eq!(upstream.hits("stops"), 0);
    assert_eq!(client.cache_stats().entries, 0);
}

#[tokio::test]
async fn rate_limit_is_retried_and_success_cached() {
    let (upstream, base) = spawn_upstream().await;
    let tools = transit_tools(client(&base));

    let first = tools.dispatch("mbta_get_vehicles", &json!({})).await.unwrap();
    assert_eq!(first["records"][0]["id"], "y1801");
    assert_eq!(upstream.hits("vehicles"), 2);

    let second = tools.dispatch("mbta_get_vehicles", &json!({})).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(upstream.hits("vehicles"), 2);
}

#[tokio::test]
async fn concurrent_dispatches_share_one_request() {
    let (upstream, base) = spawn_upstream().await;
    let tools = Arc::new(transit_tools(client(&base)));

    let calls: Vec<_> = (0..6)
        .map(|_| {
            let tools = tools.clone();
            tokio::spawn(async move {
                tools
                    .dispatch("mbta_get_alerts", &json!({"route_id": "Red"}))
                    .await
            })
        })
        .collect();
    for call in calls {
        assert_eq!(call.await.unwrap().unwrap()["records"], json!([]));
    }
    assert_eq!(upstream.hits("alerts"), 1);
}

// ── Dispatcher ───────────────────────────────────────────────────────

#[tokio::test]
async fn predictions_for_stop_end_to_end() {
    let (upstream, base) = spawn_upstream().await;
    let tools = transit_tools(client(&base));

    let response = tools
        .call("mbta_get_predictions_for_stop", &json!({"stop_id": "place-pktrm"}))
        .await;
    assert!(!response.is_error, "{}", response.joined_text());

    let body: Value = serde_json::from_str(&response.joined_text()).unwrap();
    let record = &body["records"][0];
    assert_eq!(record["route_id"], "Red");
    assert_eq!(record["arrival_time"], "2026-03-02T08:15:00-05:00");
    assert_eq!(
        upstream.last_param("predictions", "filter[stop]").as_deref(),
        Some("place-pktrm")
    );
    assert!(upstream.last_param("predictions", "fields[prediction]").is_some());

    let response = tools.call("mbta_get_predictions_for_stop", &json!({})).await;
    assert!(response.is_error);
    let body: Value = serde_json::from_str(&response.joined_text()).unwrap();
    assert_eq!(body["fields"], json!(["stop_id"]));
    assert_eq!(upstream.hits("predictions"), 1);
}

#[tokio::test]
async fn unknown_route_is_reported_as_not_found() {
    let (upstream, base) = spawn_upstream().await;
    let client = client(&base);

    let route = client.route("Red").await.unwrap();
    assert_eq!(route.display_name(), "Red Line");

    let err = client.route("Purple").await.unwrap_err();
    assert_eq!(
        err,
        ApiError::NotFound {
            resource: "route 'Purple'".into()
        }
    );
    assert_eq!(upstream.hits("route"), 2);
}

#[tokio::test]
async fn unknown_tool_keeps_serving() {
    let (_upstream, base) = spawn_upstream().await;
    let tools = transit_tools(client(&base));

    let response = tools.call("mbta_teleport", &json!({})).await;
    assert!(response.is_error);
    assert!(response.joined_text().contains("unknown_tool"));

    let response = tools
        .call("mbta_get_transfer_stations", &json!({"line": "Red"}))
        .await;
    assert!(!response.is_error);
}
