//! Wire protocol for the world server.
//!
//! Every framed message is `{"type": <string>, "payload": <object>}`;
//! the enums below encode that envelope via serde's adjacent tagging.
//! Field names are camelCase on the wire, and optional fields are
//! omitted when absent or empty so that payloads stay byte-compatible
//! with existing clients.
//!
//! Rejections travel as short machine-readable reason codes on result
//! payloads (`invalid_payload`, `player_not_found`, `invalid_slot`,
//! `invalid_slot_kind`, `slot_not_equipped`, `unknown_target`,
//! `missing_target`, `target_defeated`, `target_out_of_range`,
//! `cooldown_active`, `insufficient_item`, `insufficient_resources`,
//! `container_insufficient_resources`, `container_forbidden`,
//! `invalid_operation`, `invalid_recipe`, `craft_target_slot_missing`,
//! `world_seed_mismatch`, `directive_type_blocked`,
//! `directive_rate_limited`, `directive_queue_full`, `invalid_json`,
//! `invalid_since`, `invalid_limit`, `invalid_world_seed`,
//! `invalid_tick`, `duplicate_ignored`), never as transport errors.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Free-form payload map carried by directives and world events.
pub type PayloadMap = Map<String, Value>;

fn is_empty_payload(payload: &PayloadMap) -> bool {
    payload.is_empty()
}

/// Messages a client may send over the stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientMessage {
    Join(JoinRequest),
    Leave(LeaveRequest),
    Input(InputMessage),
    BlockAction(BlockActionRequest),
    CombatAction(CombatActionRequest),
    InteractAction(InteractActionRequest),
    HotbarSelect(HotbarSelectRequest),
    CraftRequest(CraftRequest),
    ContainerAction(ContainerActionRequest),
}

/// Messages the server streams back.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerMessage {
    Snapshot(WorldSnapshot),
    BlockDelta(BlockDelta),
    CombatResult(CombatResult),
    InteractResult(InteractResult),
    HotbarState(HotbarState),
    InventoryState(InventoryState),
    HealthState(HealthState),
    CraftResult(CraftResult),
    ContainerResult(ContainerActionResult),
    ContainerState(ContainerState),
    WorldFlagState(WorldFlagState),
    WorldDirectiveState(DirectiveState),
    WorldEvent(WorldEvent),
}

/// Join a named world as a player.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct JoinRequest {
    pub world_seed: String,
    pub player_id: String,
    pub start_x: f64,
    pub start_z: f64,
}

/// Release a player id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct LeaveRequest {
    pub player_id: String,
}

/// Streamed intent for one player.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct InputMessage {
    pub player_id: String,
    pub input: InputState,
}

/// Raw movement intent; components are sanitized server-side.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct InputState {
    pub move_x: f64,
    pub move_z: f64,
    pub running: bool,
    pub jump: bool,
}

/// Place or break one block cell.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum BlockAction {
    Place,
    Break,
}

impl BlockAction {
    /// Wire spelling of the action.
    pub fn as_wire(self) -> &'static str {
        match self {
            BlockAction::Place => "place",
            BlockAction::Break => "break",
        }
    }
}

/// Block mutation request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BlockActionRequest {
    #[serde(default)]
    pub player_id: String,
    pub action: BlockAction,
    #[serde(default)]
    pub chunk_x: i64,
    #[serde(default)]
    pub chunk_z: i64,
    #[serde(default)]
    pub x: i64,
    #[serde(default)]
    pub y: i64,
    #[serde(default)]
    pub z: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub block_type: String,
}

/// A confirmed block override, replicated and exported.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BlockDelta {
    pub action: BlockAction,
    pub chunk_x: i64,
    pub chunk_z: i64,
    pub x: i64,
    pub y: i64,
    pub z: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub block_type: String,
}

/// Combat request against an optional target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct CombatActionRequest {
    pub player_id: String,
    pub action_id: String,
    pub slot_id: String,
    pub kind: String,
    pub target_id: String,
    pub target_label: String,
    pub target_world_x: Option<f64>,
    pub target_world_z: Option<f64>,
}

/// Outcome of a combat request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct CombatResult {
    pub action_id: String,
    pub player_id: String,
    pub slot_id: String,
    pub kind: String,
    pub accepted: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub reason: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub target_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub target_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_world_x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_world_z: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooldown_remaining_ms: Option<i64>,
    pub tick: i64,
}

/// Interaction request; shares the combat target fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct InteractActionRequest {
    pub player_id: String,
    pub action_id: String,
    pub target_id: String,
    pub target_label: String,
    pub target_world_x: Option<f64>,
    pub target_world_z: Option<f64>,
}

/// Outcome of an interaction request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct InteractResult {
    pub action_id: String,
    pub player_id: String,
    pub accepted: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub reason: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub target_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub target_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_world_x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_world_z: Option<f64>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub message: String,
    pub tick: i64,
}

/// Select a hotbar slot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct HotbarSelectRequest {
    pub player_id: String,
    pub slot_index: i64,
}

/// Per-player hotbar ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct HotbarState {
    pub player_id: String,
    pub slot_ids: Vec<String>,
    pub stack_counts: Vec<i64>,
    pub selected_index: i64,
    pub tick: i64,
}

/// Per-player resource tallies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct InventoryState {
    pub player_id: String,
    pub resources: BTreeMap<String, i64>,
    pub tick: i64,
}

/// Player health record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct HealthState {
    pub player_id: String,
    pub current: i64,
    pub max: i64,
    pub tick: i64,
}

/// Generated-entity health record keyed by target token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct EntityHealthState {
    pub target_id: String,
    pub entity_type: String,
    pub current: i64,
    pub max: i64,
    pub defeated_until_tick: i64,
    pub tick: i64,
}

/// Craft request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct CraftRequest {
    pub player_id: String,
    pub action_id: String,
    pub recipe_id: String,
    pub count: i64,
}

/// Outcome of a craft request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct CraftResult {
    pub action_id: String,
    pub player_id: String,
    pub recipe_id: String,
    pub count: i64,
    pub accepted: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub reason: String,
    pub tick: i64,
}

/// Deposit/withdraw request against a container.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ContainerActionRequest {
    pub player_id: String,
    pub action_id: String,
    pub container_id: String,
    pub operation: String,
    pub resource_id: String,
    pub amount: i64,
}

/// Outcome of a container action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ContainerActionResult {
    pub action_id: String,
    pub player_id: String,
    pub container_id: String,
    pub operation: String,
    pub resource_id: String,
    pub amount: i64,
    pub accepted: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub reason: String,
    pub tick: i64,
}

/// Container resource tallies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ContainerState {
    pub container_id: String,
    pub resources: BTreeMap<String, i64>,
    pub tick: i64,
}

/// One player entry inside a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct PlayerSnapshot {
    pub player_id: String,
    pub x: f64,
    pub z: f64,
    pub speed: f64,
}

/// Interest-scoped view of the world at a tick.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct WorldSnapshot {
    pub world_seed: String,
    pub tick: i64,
    pub players: BTreeMap<String, PlayerSnapshot>,
}

/// World flags replicated to all connections.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct WorldFlagState {
    pub flags: BTreeMap<String, String>,
    pub tick: i64,
}

/// Active spawn hint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct SpawnHint {
    pub hint_id: String,
    pub label: String,
    pub chunk_x: i64,
    pub chunk_z: i64,
}

/// Narrative state replicated to all connections.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct DirectiveState {
    pub story_beats: Vec<String>,
    pub spawn_hints: Vec<SpawnHint>,
    pub tick: i64,
}

/// Append-only world event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct WorldEvent {
    pub seq: i64,
    pub tick: i64,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub player_id: String,
    #[serde(skip_serializing_if = "is_empty_payload")]
    pub payload: PayloadMap,
}

/// Cursor-aware slice of the world event log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct WorldEventFeed {
    pub events: Vec<WorldEvent>,
    pub next: i64,
}

/// External planner directive as posted to the side channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct DirectiveRequest {
    pub directive_id: String,
    pub world_seed: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub ttl_ticks: i64,
    pub payload: PayloadMap,
}

/// Side-channel acknowledgment for a directive post.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct DirectiveAck {
    pub accepted: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub reason: String,
    pub queued: i64,
    pub tick: i64,
}

/// Full authoritative state document used by the debug endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct DebugState {
    pub snapshot: WorldSnapshot,
    pub block_deltas: Vec<BlockDelta>,
    pub hotbar_states: Vec<HotbarState>,
    pub inventory_states: Vec<InventoryState>,
    pub health_states: Vec<HealthState>,
    pub entity_health: Vec<EntityHealthState>,
    pub container_states: Vec<ContainerState>,
    pub world_flags: WorldFlagState,
    pub directive_state: DirectiveState,
}

/// Acknowledgment for a debug state import.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct DebugLoadAck {
    pub accepted: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub reason: String,
    pub tick: i64,
    pub player_count: i64,
    pub block_count: i64,
}
