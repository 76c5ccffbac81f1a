//! HTTP surface: the openclaw side channel and the debug endpoints.

use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use openclaw_protocol::{DebugLoadAck, DebugState, DirectiveAck, DirectiveRequest, WorldEventFeed};
use serde_json::json;

use crate::gateway::SharedGateway;
use crate::ws::ws_route;

/// Build the full application router.
pub fn app(gateway: SharedGateway) -> Router {
    Router::new()
        .route("/ws", get(ws_route))
        .route("/openclaw/directives", post(post_directive))
        .route("/openclaw/events", get(get_events))
        .route("/debug/state", get(get_debug_state))
        .route("/debug/load-state", post(post_load_state))
        .with_state(gateway)
}

/// `POST /openclaw/directives`: 202 on acceptance (including
/// duplicates), 400 otherwise. The body is always a directive ack.
async fn post_directive(
    State(gateway): State<SharedGateway>,
    body: String,
) -> (StatusCode, Json<DirectiveAck>) {
    let request: DirectiveRequest = match serde_json::from_str(&body) {
        Ok(request) => request,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(DirectiveAck {
                    accepted: false,
                    reason: "invalid_json".to_string(),
                    queued: 0,
                    tick: 0,
                }),
            );
        }
    };

    let ack = gateway.ingest_directive(&request);
    let status = if ack.accepted || ack.reason == "duplicate_ignored" {
        StatusCode::ACCEPTED
    } else {
        StatusCode::BAD_REQUEST
    };
    (status, Json(ack))
}

/// `GET /openclaw/events?since=&limit=&cursor=`.
async fn get_events(
    State(gateway): State<SharedGateway>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<WorldEventFeed>, (StatusCode, Json<serde_json::Value>)> {
    let mut since = 0_i64;
    if let Some(raw) = params.get("since") {
        match raw.parse::<i64>() {
            Ok(parsed) if parsed >= 0 => since = parsed,
            _ => {
                return Err((
                    StatusCode::BAD_REQUEST,
                    Json(json!({"error": "invalid_since"})),
                ));
            }
        }
    }

    let mut limit = 0_i64;
    if let Some(raw) = params.get("limit") {
        match raw.parse::<i64>() {
            Ok(parsed) if (1..=openclaw_world::MAX_WORLD_EVENTS as i64).contains(&parsed) => {
                limit = parsed;
            }
            _ => {
                return Err((
                    StatusCode::BAD_REQUEST,
                    Json(json!({"error": "invalid_limit"})),
                ));
            }
        }
    }

    let cursor = params
        .get("cursor")
        .map(|cursor| cursor.trim())
        .unwrap_or_default();
    Ok(Json(gateway.events_feed(since, cursor, limit)))
}

/// `GET /debug/state`: the full deterministic export.
async fn get_debug_state(State(gateway): State<SharedGateway>) -> Json<DebugState> {
    Json(gateway.export_state())
}

/// `POST /debug/load-state`: atomic import plus re-hydration fan-out.
async fn post_load_state(
    State(gateway): State<SharedGateway>,
    body: String,
) -> (StatusCode, Json<DebugLoadAck>) {
    let document: DebugState = match serde_json::from_str(&body) {
        Ok(document) => document,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(DebugLoadAck {
                    accepted: false,
                    reason: "invalid_json".to_string(),
                    ..Default::default()
                }),
            );
        }
    };

    match gateway.import_state(&document) {
        Ok(ack) => (StatusCode::ACCEPTED, Json(ack)),
        Err(error) => (
            StatusCode::BAD_REQUEST,
            Json(DebugLoadAck {
                accepted: false,
                reason: error.to_string(),
                ..Default::default()
            }),
        ),
    }
}
