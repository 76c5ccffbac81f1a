//! Side-channel and debug endpoint tests, driven without a listener
//! via tower's oneshot so ticks stay deterministic.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use openclaw_protocol::{ClientMessage, DebugState, JoinRequest};
use openclaw_server::{app, Gateway, SharedGateway};
use openclaw_world::WorldConfig;
use serde_json::{json, Value};
use tower::ServiceExt;

fn test_app() -> (Router, SharedGateway) {
    let gateway = Arc::new(Gateway::new(WorldConfig::default()));
    (app(gateway.clone()), gateway)
}

async fn request_json(
    router: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(match body {
            Some(value) => Body::from(value.to_string()),
            None => Body::empty(),
        })
        .expect("request");
    let response = router.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, value)
}

#[tokio::test]
async fn directive_lifecycle_over_http() {
    let (router, gateway) = test_app();

    let (status, ack) = request_json(
        &router,
        "POST",
        "/openclaw/directives",
        Some(json!({
            "directiveId": "d1",
            "type": "set_world_flag",
            "payload": {"key": "quest", "value": "ch1"},
        })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(ack["accepted"], true);
    assert_eq!(ack["queued"], 1);

    gateway.run_tick();

    let (status, feed) = request_json(&router, "GET", "/openclaw/events?since=0", None).await;
    assert_eq!(status, StatusCode::OK);
    let events = feed["events"].as_array().unwrap();
    let kinds: Vec<&str> = events
        .iter()
        .map(|event| event["type"].as_str().unwrap())
        .collect();
    assert!(kinds.contains(&"directive_queued"));
    assert!(kinds.contains(&"directive_applied"));
    let seqs: Vec<i64> = events.iter().map(|event| event["seq"].as_i64().unwrap()).collect();
    assert!(seqs.windows(2).all(|pair| pair[1] > pair[0]));

    // Re-posting the same id acknowledges without enqueueing.
    let (status, duplicate) = request_json(
        &router,
        "POST",
        "/openclaw/directives",
        Some(json!({
            "directiveId": "d1",
            "type": "set_world_flag",
            "payload": {"key": "quest", "value": "ch2"},
        })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(duplicate["accepted"], true);
    assert_eq!(duplicate["reason"], "duplicate_ignored");
    assert_eq!(duplicate["queued"], 0, "queue already drained");
}

#[tokio::test]
async fn directive_validation_errors() {
    let (router, _gateway) = test_app();

    let (status, ack) = request_json(
        &router,
        "POST",
        "/openclaw/directives",
        Some(json!({
            "directiveId": "blocked-1",
            "type": "mutate_blocks_directly",
            "payload": {},
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(ack["reason"], "directive_type_blocked");

    let (status, ack) = request_json(
        &router,
        "POST",
        "/openclaw/directives",
        Some(json!({
            "directiveId": "seeded-1",
            "worldSeed": "some-other-world",
            "type": "set_world_flag",
            "payload": {"key": "a", "value": "b"},
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(ack["reason"], "world_seed_mismatch");

    let request = Request::builder()
        .method("POST")
        .uri("/openclaw/directives")
        .body(Body::from("{not json"))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let ack: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(ack["reason"], "invalid_json");
}

#[tokio::test]
async fn directive_rate_limit_caps_ingest_per_tick() {
    let (router, _gateway) = test_app();
    for index in 0..10 {
        let (status, _) = request_json(
            &router,
            "POST",
            "/openclaw/directives",
            Some(json!({
                "directiveId": format!("rate-{index}"),
                "type": "emit_story_beat",
                "payload": {"beat": format!("beat {index}")},
            })),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED, "directive {index} in budget");
    }

    let (status, ack) = request_json(
        &router,
        "POST",
        "/openclaw/directives",
        Some(json!({
            "directiveId": "rate-11",
            "type": "emit_story_beat",
            "payload": {"beat": "over budget"},
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(ack["reason"], "directive_rate_limited");
}

#[tokio::test]
async fn event_feed_validates_parameters_and_cursors() {
    let (router, gateway) = test_app();

    let (status, body) = request_json(&router, "GET", "/openclaw/events?since=nope", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_since");

    let (status, body) = request_json(&router, "GET", "/openclaw/events?limit=0", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_limit");

    let (status, body) = request_json(&router, "GET", "/openclaw/events?limit=10000", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_limit");

    for index in 0..5 {
        let (status, _) = request_json(
            &router,
            "POST",
            "/openclaw/directives",
            Some(json!({
                "directiveId": format!("cursor-{index}"),
                "type": "emit_story_beat",
                "payload": {"beat": format!("beat {index}")},
            })),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
    }
    gateway.run_tick();

    let (_, first) = request_json(
        &router,
        "GET",
        "/openclaw/events?since=0&limit=3&cursor=auditor",
        None,
    )
    .await;
    let first_events = first["events"].as_array().unwrap();
    assert_eq!(first_events.len(), 3);

    // The cursor resumes where the last read stopped.
    let (_, second) = request_json(&router, "GET", "/openclaw/events?cursor=auditor", None).await;
    let second_events = second["events"].as_array().unwrap();
    assert!(!second_events.is_empty());
    assert_eq!(
        second_events[0]["seq"].as_i64().unwrap(),
        first_events[2]["seq"].as_i64().unwrap() + 1
    );
}

#[tokio::test]
async fn debug_state_round_trip_over_http() {
    let (router, gateway) = test_app();

    // Seed a player and a block through a synthetic connection.
    let (sender, mut outbox) = tokio::sync::mpsc::unbounded_channel();
    let connection_id = gateway.register_connection(sender);
    gateway.handle_message(
        connection_id,
        ClientMessage::Join(JoinRequest {
            world_seed: "seed-debug-load".to_string(),
            player_id: "player-load".to_string(),
            start_x: 3.0,
            start_z: 2.0,
        }),
    );
    gateway.handle_message(
        connection_id,
        ClientMessage::BlockAction(openclaw_protocol::BlockActionRequest {
            player_id: "player-load".to_string(),
            action: openclaw_protocol::BlockAction::Break,
            chunk_x: 0,
            chunk_z: 0,
            x: 1,
            y: 1,
            z: 1,
            block_type: String::new(),
        }),
    );
    gateway.run_tick();
    while outbox.try_recv().is_ok() {}

    let (status, exported) = request_json(&router, "GET", "/debug/state", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(exported["snapshot"]["worldSeed"], "seed-debug-load");
    assert!(!exported["blockDeltas"].as_array().unwrap().is_empty());

    let (status, ack) = request_json(&router, "POST", "/debug/load-state", Some(exported.clone())).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(ack["accepted"], true);
    assert_eq!(ack["playerCount"], 1);
    assert_eq!(ack["blockCount"], 1);

    let (_, reexported) = request_json(&router, "GET", "/debug/state", None).await;
    assert_eq!(reexported["blockDeltas"], exported["blockDeltas"]);
    assert_eq!(reexported["inventoryStates"], exported["inventoryStates"]);
    assert_eq!(reexported["containerStates"], exported["containerStates"]);
    assert_eq!(reexported["worldFlags"]["flags"], exported["worldFlags"]["flags"]);
    assert_eq!(
        reexported["directiveState"]["storyBeats"],
        exported["directiveState"]["storyBeats"]
    );

    // The import reset the event log to the single load marker.
    let (_, feed) = request_json(&router, "GET", "/openclaw/events?since=0", None).await;
    let events = feed["events"].as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["type"], "debug_state_loaded");
    assert_eq!(events[0]["seq"], 1);
}

#[tokio::test]
async fn load_state_rejects_invalid_documents() {
    let (router, _gateway) = test_app();

    let empty_seed = serde_json::to_value(DebugState::default()).unwrap();
    let (status, ack) = request_json(&router, "POST", "/debug/load-state", Some(empty_seed)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(ack["reason"], "invalid_world_seed");

    let mut negative_tick = DebugState::default();
    negative_tick.snapshot.world_seed = "seed".to_string();
    negative_tick.snapshot.tick = -1;
    let (status, ack) = request_json(
        &router,
        "POST",
        "/debug/load-state",
        Some(serde_json::to_value(negative_tick).unwrap()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(ack["reason"], "invalid_tick");

    let request = Request::builder()
        .method("POST")
        .uri("/debug/load-state")
        .body(Body::from("]["))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Wrong methods are rejected by routing.
    let request = Request::builder()
        .method("GET")
        .uri("/openclaw/directives")
        .body(Body::empty())
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}
