//! Integration tests for facet resolution against a local mock of
//! `GET /behavior-logs/facets`.
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing::get};
use serde_json::json;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use watchtower_client::{ApiClient, ClientConfig, FacetCache, FacetStore, FetchError, FilterSelection};
use watchtower_wire::{EventType, FacetOptions, FacetQuery};

type Params = HashMap<String, String>;

#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<Params>>>);

impl Recorder {
    fn calls(&self) -> Vec<Params> {
        self.0.lock().expect("recorder").clone()
    }
}

async fn facets(State(recorder): State<Recorder>, Query(params): Query<Params>) -> Response {
    recorder.0.lock().expect("recorder").push(params.clone());
    match params.get("department").map(String::as_str) {
        Some("Broken") => StatusCode::BAD_GATEWAY.into_response(),
        Some(department) => Json(json!({
            "departments": ["Eng", "Ops"],
            "teams": [format!("{department}-Platform"), format!("{department}-Security")],
            "employees": ["ACM2278", 1042],
        }))
        .into_response(),
        None => Json(json!({
            "departments": ["Eng", "Ops", "Sales"],
            "teams": [],
            "employees": [],
        }))
        .into_response(),
    }
}

async fn serve(recorder: Recorder) -> SocketAddr {
    let app = Router::new()
        .route("/behavior-logs/facets", get(facets))
        .with_state(recorder);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app.into_make_service()).await;
    });
    addr
}

async fn facet_cache(config: ClientConfig) -> (FacetCache, Recorder) {
    let recorder = Recorder::default();
    let addr = serve(recorder.clone()).await;
    let config = ClientConfig {
        base_url: format!("http://{addr}"),
        ..config
    };
    let api = ApiClient::new(&config).expect("api client");
    (FacetCache::new(api, &config), recorder)
}

fn department(name: &str) -> FacetQuery {
    FacetQuery {
        department: Some(name.to_string()),
        ..FacetQuery::default()
    }
}

#[tokio::test]
async fn fresh_entry_skips_network_until_ttl() {
    let (cache, recorder) = facet_cache(ClientConfig {
        facet_ttl_ms: 200,
        ..ClientConfig::default()
    })
    .await;

    let first = cache.resolve_now(&department("Eng")).await.expect("facets");
    assert_eq!(first.teams, vec!["Eng-Platform", "Eng-Security"]);
    assert_eq!(first.employees, vec!["ACM2278", "1042"]);

    let second = cache.resolve_now(&department("Eng")).await.expect("cached");
    assert_eq!(first, second);
    assert_eq!(recorder.calls().len(), 1);

    tokio::time::sleep(Duration::from_millis(250)).await;
    cache.resolve_now(&department("Eng")).await.expect("refetched");
    assert_eq!(recorder.calls().len(), 2);
}

#[tokio::test]
async fn key_ignores_employee_and_sort() {
    let (cache, recorder) = facet_cache(ClientConfig::default()).await;
    let mut selection = FilterSelection::new(10);
    selection.select_department(Some("Eng".to_string()));
    cache.resolve_now(&selection.facet_query()).await.expect("facets");

    selection.select_employee(Some("ACM2278".to_string()));
    selection.sort_by(watchtower_wire::SortKey::User);
    cache.resolve_now(&selection.facet_query()).await.expect("facets");
    assert_eq!(recorder.calls().len(), 1);

    selection.toggle_event_type(EventType::Email);
    cache.resolve_now(&selection.facet_query()).await.expect("facets");
    let calls = recorder.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].get("event_types").map(String::as_str), Some("email"));
    assert!(!calls[1].contains_key("user"));
}

#[tokio::test]
async fn burst_coalesces_to_last_arguments() {
    let (cache, recorder) = facet_cache(ClientConfig::default()).await;

    let eng = department("Eng");
    let (first, second, third) = tokio::join!(
        cache.resolve_facets(&eng),
        async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            cache.resolve_facets(&department("Ops")).await
        },
        async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cache.resolve_facets(&department("Sales")).await
        },
    );

    assert_eq!(first, Err(FetchError::Superseded));
    assert_eq!(second, Err(FetchError::Superseded));
    let third = third.expect("last call resolves");
    assert_eq!(third.teams[0], "Sales-Platform");

    let calls = recorder.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].get("department").map(String::as_str), Some("Sales"));
}

#[tokio::test]
async fn failure_yields_error_and_caches_nothing() {
    let (cache, recorder) = facet_cache(ClientConfig::default()).await;

    let err = cache
        .resolve_now(&department("Broken"))
        .await
        .expect_err("bad gateway");
    assert_eq!(err, FetchError::Status { status: 502 });
    assert!(cache.store().is_empty());

    let fallback = cache
        .resolve_now(&department("Broken"))
        .await
        .unwrap_or_default();
    assert_eq!(fallback, FacetOptions::default());
    assert_eq!(recorder.calls().len(), 2);
}

#[tokio::test]
async fn shared_store_serves_other_caches() {
    let recorder = Recorder::default();
    let addr = serve(recorder.clone()).await;
    let config = ClientConfig::with_base_url(format!("http://{addr}"));
    let api = ApiClient::new(&config).expect("api client");
    let store = FacetStore::new();
    let first = FacetCache::with_store(api.clone(), &config, store.clone());
    let second = FacetCache::with_store(api, &config, store);

    first.resolve_now(&FacetQuery::default()).await.expect("facets");
    let reused = second.resolve_now(&FacetQuery::default()).await.expect("facets");
    assert_eq!(reused.departments.len(), 3);
    assert_eq!(recorder.calls().len(), 1);
}
