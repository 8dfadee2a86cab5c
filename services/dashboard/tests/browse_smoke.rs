//! Smoke test: a browse pass walks pages until the pager stops it.
use axum::extract::Query;
use axum::{Json, Router, routing::get};
use dashboard::browse::Browser;
use dashboard::config::DashboardConfig;
use serde_json::{Value, json};
use std::collections::HashMap;
use watchtower_client::{ApiClient, ClientConfig};
use watchtower_wire::{DateRange, EventTypeFilter};

async fn logs(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    if params.contains_key("include_total") {
        return Json(json!({ "items": [], "total": 25, "has_more": true }));
    }
    let offset: usize = match params.get("after_id") {
        Some(after_id) => after_id.parse().unwrap_or(0),
        None => params
            .get("offset")
            .and_then(|value| value.parse().ok())
            .unwrap_or(0),
    };
    let remaining = 25usize.saturating_sub(offset);
    let count = remaining.min(10);
    let items: Vec<Value> = (0..count)
        .map(|index| json!({ "id": offset + index, "timestamp": "2010-01-04T09:00:00", "event_type": "http" }))
        .collect();
    let next = offset + count;
    Json(json!({
        "items": items,
        "has_more": next < 25,
        "next_cursor": { "after_ts": "2010-01-04T09:00:00", "after_id": next },
    }))
}

async fn facets() -> Json<Value> {
    Json(json!({ "departments": ["Finance", "Research"], "teams": [], "employees": [] }))
}

async fn serve() -> String {
    let app = Router::new()
        .route("/behavior-logs", get(logs))
        .route("/behavior-logs/facets", get(facets));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app.into_make_service()).await;
    });
    format!("http://{addr}")
}

fn dashboard_config(base_url: String, pages: usize) -> DashboardConfig {
    DashboardConfig {
        client: ClientConfig::with_base_url(base_url),
        organization_id: None,
        pages,
        department: Some("Research".to_string()),
        team: None,
        event_types: EventTypeFilter::All,
        date_range: DateRange::from_digits("20100101"),
    }
}

#[tokio::test]
async fn browse_stops_at_last_page() {
    let base_url = serve().await;
    let config = dashboard_config(base_url, 10);
    let api = ApiClient::new(&config.client).expect("api client");
    let mut browser = Browser::new(api, &config);

    let summary = browser.run().await;
    assert_eq!(summary.pages, 3);
    assert_eq!(summary.rows, 25);
    assert_eq!(summary.total, Some(25));
    assert_eq!(summary.departments, 2);
    assert_eq!(summary.failures, 0);
    assert_eq!(browser.selection().descriptor().page, 2);
    assert_eq!(browser.logs().cached_pages(), 3);
}

#[tokio::test]
async fn browse_respects_page_limit() {
    let base_url = serve().await;
    let mut config = dashboard_config(base_url, 2);
    config.department = Some("Finance".to_string());
    let api = ApiClient::new(&config.client).expect("api client");
    let mut browser = Browser::new(api, &config);

    let summary = browser.run().await;
    assert_eq!(summary.pages, 2);
    assert_eq!(summary.rows, 20);
}

#[tokio::test]
async fn unreachable_api_degrades_to_empty_pages() {
    let config = dashboard_config("http://127.0.0.1:1".to_string(), 3);
    let api = ApiClient::new(&config.client).expect("api client");
    let mut browser = Browser::new(api, &config);

    let summary = browser.run().await;
    assert_eq!(summary.pages, 1);
    assert_eq!(summary.rows, 0);
    assert_eq!(summary.total, None);
    assert!(summary.failures >= 1);
}
