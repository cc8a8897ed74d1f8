//! Fake Mouser search endpoint served by axum on an ephemeral port

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const FAKE_API_KEY: &str = "test-key";

#[derive(Clone, Default)]
struct FakeState {
    requests: Arc<AtomicUsize>,
}

/// Running fake server
pub struct FakeMouser {
    pub base_url: String,
    requests: Arc<AtomicUsize>,
}

impl FakeMouser {
    /// Bind `127.0.0.1:0` and serve until the test runtime ends
    ///
    /// Part numbers with special behavior:
    /// - `R1-100K`: one match, description "Resistor 100k"
    /// - `ERRORS`: HTTP 200 with a non-empty `Errors` list
    /// - `BROKEN`: HTTP 500
    /// - `GARBAGE`: HTTP 200 with a non-JSON body
    /// - anything else: zero results
    pub async fn start() -> Self {
        let state = FakeState::default();
        let requests = state.requests.clone();

        let app = Router::new()
            .route("/api/v1/search/partnumber", post(search))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            requests,
        }
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

async fn search(
    State(state): State<FakeState>,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Response {
    state.requests.fetch_add(1, Ordering::SeqCst);

    if query.get("apiKey").map(String::as_str) != Some(FAKE_API_KEY) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let request = &body["SearchByPartRequest"];
    assert_eq!(request["partSearchOptions"], "Exact");
    let part_number = request["mouserPartNumber"].as_str().unwrap_or_default();

    match part_number {
        "R1-100K" => Json(json!({
            "Errors": [],
            "SearchResults": {
                "NumberOfResult": 1,
                "Parts": [{
                    "ManufacturerPartNumber": "R1-100K",
                    "Manufacturer": "Yageo",
                    "MouserPartNumber": "603-R1-100K",
                    "Description": "Resistor 100k",
                    "DataSheetUrl": "https://example.com/r1.pdf",
                    "ImagePath": "https://example.com/r1.jpg",
                    "ProductDetailUrl": "https://example.com/r1",
                    "Availability": "5000 In Stock"
                }]
            }
        }))
        .into_response(),
        "ERRORS" => Json(json!({
            "Errors": [{
                "Id": 0,
                "Code": "Invalid",
                "Message": "Invalid unique identifier.",
                "ResourceKey": "InvalidIdentifier",
                "ResourceFormatString": null,
                "ResourceFormatString2": null,
                "PropertyName": "API Key"
            }],
            "SearchResults": null
        }))
        .into_response(),
        "BROKEN" => (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded").into_response(),
        "GARBAGE" => (StatusCode::OK, "<html>not json</html>").into_response(),
        _ => Json(json!({
            "Errors": [],
            "SearchResults": { "NumberOfResult": 0, "Parts": [] }
        }))
        .into_response(),
    }
}
