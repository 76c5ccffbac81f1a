//! End-to-end WebSocket scenarios against a live listener with the
//! real 20 Hz tick loop running.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use openclaw_server::{app, run_tick_loop, Gateway, SharedGateway};
use openclaw_world::WorldConfig;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn spawn_server() -> (SocketAddr, SharedGateway) {
    let gateway = Arc::new(Gateway::new(WorldConfig::default()));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    let router = app(gateway.clone());
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve");
    });
    tokio::spawn(run_tick_loop(gateway.clone()));
    (addr, gateway)
}

async fn connect(addr: SocketAddr) -> Client {
    let (socket, _) = connect_async(format!("ws://{addr}/ws"))
        .await
        .expect("websocket connect");
    socket
}

async fn send(client: &mut Client, kind: &str, payload: Value) {
    let frame = json!({"type": kind, "payload": payload}).to_string();
    client.send(Message::Text(frame)).await.expect("send frame");
}

async fn next_envelope(client: &mut Client) -> Value {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("read failed");
        if let Message::Text(text) = message {
            return serde_json::from_str(&text).expect("frame is json");
        }
    }
}

/// Read frames until one matches, with a bounded number of attempts.
async fn wait_for(client: &mut Client, kind: &str, matches: impl Fn(&Value) -> bool) -> Value {
    for _ in 0..400 {
        let envelope = next_envelope(client).await;
        if envelope["type"] == kind && matches(&envelope["payload"]) {
            return envelope["payload"].clone();
        }
    }
    panic!("never observed a matching {kind} envelope");
}

async fn join(client: &mut Client, seed: &str, player_id: &str, x: f64, z: f64) {
    send(
        client,
        "join",
        json!({"worldSeed": seed, "playerId": player_id, "startX": x, "startZ": z}),
    )
    .await;
    wait_for(client, "snapshot", |payload| {
        payload["players"].get(player_id).is_some()
    })
    .await;
}

#[tokio::test]
async fn movement_resumes_across_reconnect() {
    let (addr, _gateway) = spawn_server().await;

    let mut first = connect(addr).await;
    join(&mut first, "s1", "p", 2.0, -3.0).await;
    send(
        &mut first,
        "input",
        json!({"playerId": "p", "input": {"moveX": 1, "moveZ": 0}}),
    )
    .await;
    wait_for(&mut first, "snapshot", |payload| {
        payload["players"]["p"]["x"].as_f64().unwrap_or(0.0) > 2.0
    })
    .await;
    first.close(None).await.expect("close");

    // The reconnecting client sees the player frozen where the dropped
    // connection left it.
    let mut second = connect(addr).await;
    let initial = wait_for(&mut second, "snapshot", |payload| {
        payload["players"].get("p").is_some()
    })
    .await;
    let parked_x = initial["players"]["p"]["x"].as_f64().unwrap();
    assert!(parked_x > 2.0);

    tokio::time::sleep(Duration::from_millis(200)).await;
    let later = wait_for(&mut second, "snapshot", |payload| {
        payload["players"].get("p").is_some()
    })
    .await;
    let still_x = later["players"]["p"]["x"].as_f64().unwrap();
    assert!(
        (still_x - parked_x).abs() < 0.01,
        "input must be cleared on disconnect: {parked_x} vs {still_x}"
    );

    join(&mut second, "s1", "p", 0.0, 0.0).await;
    let rejoined_z = later["players"]["p"]["z"].as_f64().unwrap();
    send(
        &mut second,
        "input",
        json!({"playerId": "p", "input": {"moveX": 0, "moveZ": 1, "running": true}}),
    )
    .await;
    wait_for(&mut second, "snapshot", |payload| {
        payload["players"]["p"]["z"].as_f64().unwrap_or(f64::MIN) > rejoined_z
    })
    .await;
}

#[tokio::test]
async fn cooldown_rejects_then_recovers() {
    let (addr, _gateway) = spawn_server().await;
    let mut client = connect(addr).await;
    join(&mut client, "s-cooldown", "p", 0.0, 0.0).await;

    send(
        &mut client,
        "combat_action",
        json!({
            "playerId": "p", "actionId": "a-1", "slotId": "slot-2-ember-bolt",
            "kind": "spell", "targetWorldX": 4, "targetWorldZ": 0,
        }),
    )
    .await;
    let first = wait_for(&mut client, "combat_result", |payload| payload["actionId"] == "a-1").await;
    assert_eq!(first["accepted"], true);

    send(
        &mut client,
        "combat_action",
        json!({
            "playerId": "p", "actionId": "a-2", "slotId": "slot-2-ember-bolt",
            "kind": "spell", "targetWorldX": 4, "targetWorldZ": 0,
        }),
    )
    .await;
    let second = wait_for(&mut client, "combat_result", |payload| payload["actionId"] == "a-2").await;
    assert_eq!(second["accepted"], false);
    assert_eq!(second["reason"], "cooldown_active");
    assert!(second["cooldownRemainingMs"].as_i64().unwrap() > 0);

    // 20 cooldown ticks at 20 Hz; wait them out with margin.
    tokio::time::sleep(Duration::from_millis(1300)).await;
    send(
        &mut client,
        "combat_action",
        json!({
            "playerId": "p", "actionId": "a-3", "slotId": "slot-2-ember-bolt",
            "kind": "spell", "targetWorldX": 4, "targetWorldZ": 0,
        }),
    )
    .await;
    let third = wait_for(&mut client, "combat_result", |payload| payload["actionId"] == "a-3").await;
    assert_eq!(third["accepted"], true, "{third:?}");
}

#[tokio::test]
async fn block_break_pays_deterministic_loot() {
    let (addr, _gateway) = spawn_server().await;
    let mut client = connect(addr).await;
    join(&mut client, "s-loot", "p", 0.0, 0.0).await;

    send(
        &mut client,
        "block_action",
        json!({
            "playerId": "p", "action": "break",
            "chunkX": 0, "chunkZ": 0, "x": 1, "y": 1, "z": 1,
        }),
    )
    .await;

    let delta = wait_for(&mut client, "block_delta", |payload| payload["action"] == "break").await;
    assert_eq!(delta["x"], 1);

    let inventory = wait_for(&mut client, "inventory_state", |payload| {
        payload["playerId"] == "p"
    })
    .await;
    assert_eq!(inventory["resources"]["salvage"], 1);
    // Cell (0,0,1,1,1) rolls into the iron_ore band.
    assert_eq!(inventory["resources"]["iron_ore"], 1);
    assert_eq!(inventory["resources"]["wood"], 0);
}

#[tokio::test]
async fn shared_container_round_trip_replicates_to_peers() {
    let (addr, _gateway) = spawn_server().await;
    let mut depositor = connect(addr).await;
    let mut peer = connect(addr).await;
    join(&mut depositor, "s-container", "depositor", 0.0, 0.0).await;
    join(&mut peer, "s-container", "peer", 4.0, 0.0).await;

    // Earn one salvage by breaking a block.
    send(
        &mut depositor,
        "block_action",
        json!({
            "playerId": "depositor", "action": "break",
            "chunkX": 0, "chunkZ": 0, "x": 2, "y": 1, "z": 1,
        }),
    )
    .await;
    wait_for(&mut depositor, "inventory_state", |payload| {
        payload["resources"]["salvage"].as_i64().unwrap_or(0) >= 1
    })
    .await;

    send(
        &mut depositor,
        "container_action",
        json!({
            "playerId": "depositor", "actionId": "c-1",
            "containerId": "world:camp-shared", "operation": "deposit",
            "resourceId": "salvage", "amount": 1,
        }),
    )
    .await;
    let result = wait_for(&mut depositor, "container_result", |payload| {
        payload["actionId"] == "c-1"
    })
    .await;
    assert_eq!(result["accepted"], true);

    // The peer connection receives the shared container update.
    let container = wait_for(&mut peer, "container_state", |payload| {
        payload["containerId"] == "world:camp-shared"
            && payload["resources"]["salvage"].as_i64().unwrap_or(0) == 1
    })
    .await;
    assert_eq!(container["resources"]["salvage"], 1);

    // Withdrawing from a stranger's stash is forbidden.
    send(
        &mut peer,
        "container_action",
        json!({
            "playerId": "peer", "actionId": "c-2",
            "containerId": "player:depositor:stash", "operation": "withdraw",
            "resourceId": "salvage", "amount": 1,
        }),
    )
    .await;
    let forbidden = wait_for(&mut peer, "container_result", |payload| {
        payload["actionId"] == "c-2"
    })
    .await;
    assert_eq!(forbidden["accepted"], false);
    assert_eq!(forbidden["reason"], "container_forbidden");
}

#[tokio::test]
async fn jump_flag_round_trips_without_moving() {
    let (addr, gateway) = spawn_server().await;
    let mut client = connect(addr).await;
    join(&mut client, "s-jump", "hopper", 5.0, 5.0).await;

    send(
        &mut client,
        "input",
        json!({"playerId": "hopper", "input": {"moveX": 0, "moveZ": 0, "jump": true}}),
    )
    .await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    let snapshot = wait_for(&mut client, "snapshot", |payload| {
        payload["players"].get("hopper").is_some()
    })
    .await;
    assert_eq!(snapshot["players"]["hopper"]["x"], 5.0);
    assert_eq!(snapshot["players"]["hopper"]["z"], 5.0);
    assert_eq!(snapshot["players"]["hopper"]["speed"], 0.0);

    // The stored input still carries the flag authoritatively.
    let exported = gateway.export_state();
    assert!(exported.snapshot.players.contains_key("hopper"));
}

#[tokio::test]
async fn leave_removes_player_from_snapshots() {
    let (addr, _gateway) = spawn_server().await;
    let mut leaver = connect(addr).await;
    let mut watcher = connect(addr).await;
    join(&mut leaver, "s-leave", "leaver", 0.0, 0.0).await;
    join(&mut watcher, "s-leave", "watcher", 1.0, 0.0).await;

    wait_for(&mut watcher, "snapshot", |payload| {
        payload["players"].get("leaver").is_some()
    })
    .await;

    send(&mut leaver, "leave", json!({"playerId": "leaver"})).await;
    wait_for(&mut watcher, "snapshot", |payload| {
        payload["players"].get("leaver").is_none()
    })
    .await;
}
