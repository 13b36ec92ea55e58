use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::{Value, json};
use sheetcmd::command::CommandKind;
use sheetcmd::server::web::{router, router_at};
use sheetcmd::{CellAuthority, Graph, ItemId, RequestEnvelope, ServerRequest};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

fn authority() -> (Arc<Mutex<CellAuthority>>, ItemId) {
    let mut graph = Graph::new();
    let sheet = graph.add_sheet();
    (Arc::new(Mutex::new(CellAuthority::new(graph))), sheet)
}

fn envelope_request(uri: &str, request: ServerRequest) -> Request<Body> {
    let envelope = RequestEnvelope::new("doc", request);
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&envelope).expect("encode envelope")))
        .expect("request")
}

async fn decode_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn post_applies_request_and_reports_replaced_cells() {
    let (authority, sheet) = authority();
    let app = router(authority.clone());

    let first = app
        .clone()
        .oneshot(envelope_request(
            "/commands",
            ServerRequest::new(
                CommandKind::ServerSetCells,
                sheet,
                json!({"cells": [{"reference": "A1", "value": "5"}]}),
            ),
        ))
        .await
        .expect("first response");
    assert_eq!(first.status(), StatusCode::OK);
    let body = decode_json(first).await;
    assert_eq!(body["cells"][0]["value"], json!("5"));
    assert_eq!(body["oldcells"][0]["value"], json!(""));

    let second = app
        .clone()
        .oneshot(envelope_request(
            "/commands",
            ServerRequest::new(
                CommandKind::ServerDeleteCells,
                sheet,
                json!({"references": ["A1"]}),
            ),
        ))
        .await
        .expect("second response");
    assert_eq!(second.status(), StatusCode::OK);
    let body = decode_json(second).await;
    assert_eq!(body["cells"], json!([]));
    assert_eq!(body["oldcells"][0]["value"], json!("5"));

    let health = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("health response");
    assert_eq!(health.status(), StatusCode::OK);
    assert_eq!(decode_json(health).await["handled"], json!(2));
}

#[tokio::test]
async fn compound_request_answers_one_result_per_child() {
    let (authority, sheet) = authority();
    let app = router(authority.clone());

    let compound = ServerRequest::new(
        CommandKind::ServerCompound,
        sheet,
        json!({"requests": [
            ServerRequest::new(CommandKind::ServerSetCells, sheet, json!({"cells": [{"reference": "A1", "value": 1}]})),
            ServerRequest::new(CommandKind::ServerSetCells, sheet, json!({"cells": [{"reference": "A1", "value": 2}]})),
        ]}),
    );
    let response = app
        .oneshot(envelope_request("/commands", compound))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = decode_json(response).await;
    let results = body["results"].as_array().expect("results");
    assert_eq!(results.len(), 2);
    assert_eq!(results[1]["oldcells"][0]["value"], json!(1.0));

    let authority = authority.lock().expect("authority");
    let cells = authority.graph().sheet(sheet).expect("sheet");
    assert_eq!(cells.text(&"A1".parse().expect("reference")), "2");
}

#[tokio::test]
async fn errors_map_to_status_codes() {
    let (authority, sheet) = authority();
    let app = router_at("/api/commands", authority.clone());

    let missing = app
        .clone()
        .oneshot(envelope_request(
            "/api/commands",
            ServerRequest::new(CommandKind::ServerSetCells, ItemId(99), json!({"cells": []})),
        ))
        .await
        .expect("missing sheet response");
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    assert_eq!(decode_json(missing).await["code"], json!("not_found"));

    let unknown = app
        .clone()
        .oneshot(envelope_request(
            "/api/commands",
            ServerRequest {
                name: "command.server.MoveCommand".to_string(),
                streamsheet_id: sheet,
                info: json!({}),
            },
        ))
        .await
        .expect("unknown command response");
    assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);
    assert_eq!(decode_json(unknown).await["code"], json!("unknown_command"));

    let malformed = app
        .oneshot(envelope_request(
            "/api/commands",
            ServerRequest::new(CommandKind::ServerDeleteCells, sheet, json!({"cells": 3})),
        ))
        .await
        .expect("malformed response");
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);
    assert_eq!(decode_json(malformed).await["code"], json!("malformed_request"));

    assert_eq!(authority.lock().expect("authority").handled(), 0);
}
