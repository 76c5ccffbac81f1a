//! Connection registry, message dispatch, and the replication router.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::extract::ws::Message;
use openclaw_protocol::{
    ClientMessage, DebugLoadAck, DebugState, DirectiveAck, DirectiveRequest, ServerMessage,
    WorldEventFeed,
};
use openclaw_world::{
    break_resource_grants, private_container_owner, stash_container_id, ImportError, WorldConfig,
    WorldHub, SHARED_CONTAINER_ID,
};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use crate::{BLOCK_DELTA_CHUNK_RADIUS, COMBAT_REPLICATION_RADIUS, SNAPSHOT_REPLICATION_RADIUS};

/// Handle shared by every transport task.
pub type SharedGateway = Arc<Gateway>;

/// Identifier of one live connection.
pub type ConnectionId = u64;

/// A queued outbound frame: recipient plus its outbox and the payload.
type Outbound = (ConnectionId, UnboundedSender<Message>, Message);

struct Connection {
    sender: UnboundedSender<Message>,
    player_ids: HashSet<String>,
}

struct GatewayState {
    hub: WorldHub,
    connections: HashMap<ConnectionId, Connection>,
    next_connection_id: ConnectionId,
}

/// The single global lock around hub state and the connection set.
///
/// Every public method locks, mutates, collects the envelopes to send
/// into a local buffer, releases the lock, and only then pushes frames
/// into the per-connection outboxes.
pub struct Gateway {
    state: Mutex<GatewayState>,
}

impl Gateway {
    pub fn new(config: WorldConfig) -> Self {
        Self {
            state: Mutex::new(GatewayState {
                hub: WorldHub::with_config(config),
                connections: HashMap::new(),
                next_connection_id: 1,
            }),
        }
    }

    fn locked(&self) -> MutexGuard<'_, GatewayState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current tick (used by the debug endpoints and tests).
    pub fn tick(&self) -> i64 {
        self.locked().hub.tick()
    }

    /// Attach a connection and queue its hydration frames: the global
    /// snapshot (no anchors yet) followed by every block override.
    pub fn register_connection(&self, sender: UnboundedSender<Message>) -> ConnectionId {
        let mut out = Vec::new();
        let connection_id = {
            let mut state = self.locked();
            let connection_id = state.next_connection_id;
            state.next_connection_id += 1;
            state.connections.insert(
                connection_id,
                Connection {
                    sender,
                    player_ids: HashSet::new(),
                },
            );

            let snapshot = state
                .hub
                .snapshot_for(&HashSet::new(), SNAPSHOT_REPLICATION_RADIUS);
            state.push_to(&[connection_id], &ServerMessage::Snapshot(snapshot), &mut out);
            for delta in state.hub.list_block_deltas() {
                state.push_to(&[connection_id], &ServerMessage::BlockDelta(delta), &mut out);
            }
            connection_id
        };
        debug!(connection_id, "connection attached");
        self.deliver(out);
        connection_id
    }

    /// Detach a connection and stop its players from drifting.
    pub fn unregister_connection(&self, connection_id: ConnectionId) {
        let mut state = self.locked();
        if let Some(connection) = state.connections.remove(&connection_id) {
            state.hub.clear_inputs(connection.player_ids.iter());
            debug!(connection_id, "connection detached");
        }
    }

    /// Dispatch one decoded client message.
    ///
    /// Messages naming a player the connection has not joined as are
    /// silently ignored.
    pub fn handle_message(&self, connection_id: ConnectionId, message: ClientMessage) {
        let mut out = Vec::new();
        {
            let mut state = self.locked();
            match message {
                ClientMessage::Join(request) => {
                    if state.hub.join(&request) {
                        if let Some(connection) = state.connections.get_mut(&connection_id) {
                            connection.player_ids.insert(request.player_id.clone());
                        }
                        state.queue_join_hydration(connection_id, &request.player_id, &mut out);
                    }
                }
                ClientMessage::Leave(request) => {
                    if state.owns(connection_id, &request.player_id) {
                        state.hub.leave(&request.player_id);
                        if let Some(connection) = state.connections.get_mut(&connection_id) {
                            connection.player_ids.remove(&request.player_id);
                        }
                    }
                }
                ClientMessage::Input(request) => {
                    if state.owns(connection_id, &request.player_id) {
                        state.hub.set_input(&request);
                    }
                }
                ClientMessage::BlockAction(request) => {
                    if state.owns(connection_id, &request.player_id) {
                        state.apply_block_action(&request, &mut out);
                    }
                }
                ClientMessage::CombatAction(request) => {
                    if state.owns(connection_id, &request.player_id) {
                        state.apply_combat_action(&request, &mut out);
                    }
                }
                ClientMessage::InteractAction(request) => {
                    if state.owns(connection_id, &request.player_id) {
                        let result = state.hub.apply_interact_action(&request);
                        let targets = state.owner_connections(&request.player_id);
                        state.push_to(&targets, &ServerMessage::InteractResult(result), &mut out);
                    }
                }
                ClientMessage::HotbarSelect(request) => {
                    if state.owns(connection_id, &request.player_id) {
                        if let Some(hotbar) = state.hub.apply_hotbar_selection(&request) {
                            let targets = state.owner_connections(&request.player_id);
                            state.push_to(&targets, &ServerMessage::HotbarState(hotbar), &mut out);
                        }
                    }
                }
                ClientMessage::CraftRequest(request) => {
                    if state.owns(connection_id, &request.player_id) {
                        let (result, inventory, hotbar) = state.hub.apply_craft_request(&request);
                        let targets = state.owner_connections(&request.player_id);
                        state.push_to(&targets, &ServerMessage::CraftResult(result), &mut out);
                        if let Some(inventory) = inventory {
                            state.push_to(&targets, &ServerMessage::InventoryState(inventory), &mut out);
                        }
                        if let Some(hotbar) = hotbar {
                            state.push_to(&targets, &ServerMessage::HotbarState(hotbar), &mut out);
                        }
                    }
                }
                ClientMessage::ContainerAction(request) => {
                    if state.owns(connection_id, &request.player_id) {
                        state.apply_container_action(&request, &mut out);
                    }
                }
            }
        }
        self.deliver(out);
    }

    /// One simulation step plus its replication: scoped snapshots for
    /// every connection, and flag/directive broadcasts when directive
    /// processing changed them.
    pub fn run_tick(&self) {
        let mut out = Vec::new();
        {
            let mut state = self.locked();
            let directive_state_changed = state.hub.advance_tick();

            let connection_ids: Vec<ConnectionId> = state.connections.keys().copied().collect();
            for connection_id in connection_ids {
                let owned = state.connections[&connection_id].player_ids.clone();
                let snapshot = state.hub.snapshot_for(&owned, SNAPSHOT_REPLICATION_RADIUS);
                state.push_to(&[connection_id], &ServerMessage::Snapshot(snapshot), &mut out);
            }

            if directive_state_changed {
                let targets = state.all_connections();
                let flags = state.hub.world_flag_state();
                state.push_to(&targets, &ServerMessage::WorldFlagState(flags), &mut out);
                let directives = state.hub.world_directive_state();
                state.push_to(
                    &targets,
                    &ServerMessage::WorldDirectiveState(directives),
                    &mut out,
                );
            }
        }
        self.deliver(out);
    }

    /// Side-channel directive intake.
    pub fn ingest_directive(&self, request: &DirectiveRequest) -> DirectiveAck {
        self.locked().hub.ingest_directive(request)
    }

    /// Side-channel event feed read.
    pub fn events_feed(&self, since: i64, cursor: &str, limit: i64) -> WorldEventFeed {
        self.locked().hub.events_for_cursor(since, cursor, limit)
    }

    /// Debug export of the full world.
    pub fn export_state(&self) -> DebugState {
        self.locked().hub.export_state()
    }

    /// Debug import plus the full re-hydration fan-out.
    pub fn import_state(&self, document: &DebugState) -> Result<DebugLoadAck, ImportError> {
        let mut out = Vec::new();
        let ack = {
            let mut state = self.locked();
            let ack = state.hub.import_state(document)?;

            let connection_ids: Vec<ConnectionId> = state.connections.keys().copied().collect();
            for connection_id in connection_ids {
                let owned = state.connections[&connection_id].player_ids.clone();
                let snapshot = state.hub.snapshot_for(&owned, SNAPSHOT_REPLICATION_RADIUS);
                state.push_to(&[connection_id], &ServerMessage::Snapshot(snapshot), &mut out);
            }

            let everyone = state.all_connections();
            for delta in state.hub.list_block_deltas() {
                state.push_to(&everyone, &ServerMessage::BlockDelta(delta), &mut out);
            }

            let exported = state.hub.export_state();
            for hotbar in exported.hotbar_states {
                let targets = state.owner_connections(&hotbar.player_id);
                state.push_to(&targets, &ServerMessage::HotbarState(hotbar), &mut out);
            }
            for inventory in exported.inventory_states {
                let targets = state.owner_connections(&inventory.player_id);
                state.push_to(&targets, &ServerMessage::InventoryState(inventory), &mut out);
            }
            for container in exported.container_states {
                match private_container_owner(&container.container_id) {
                    Some(owner) => {
                        let targets = state.owner_connections(owner);
                        state.push_to(&targets, &ServerMessage::ContainerState(container), &mut out);
                    }
                    None => {
                        state.push_to(&everyone, &ServerMessage::ContainerState(container), &mut out);
                    }
                }
            }
            state.push_to(
                &everyone,
                &ServerMessage::WorldFlagState(exported.world_flags),
                &mut out,
            );
            state.push_to(
                &everyone,
                &ServerMessage::WorldDirectiveState(exported.directive_state),
                &mut out,
            );
            ack
        };
        self.deliver(out);
        Ok(ack)
    }

    /// Push queued frames into their outboxes; a dead outbox detaches
    /// the connection.
    fn deliver(&self, out: Vec<Outbound>) {
        let mut failed = Vec::new();
        for (connection_id, sender, message) in out {
            if sender.send(message).is_err() {
                failed.push(connection_id);
            }
        }
        for connection_id in failed {
            warn!(connection_id, "outbox closed, detaching connection");
            self.unregister_connection(connection_id);
        }
    }
}

impl Default for Gateway {
    fn default() -> Self {
        Self::new(WorldConfig::default())
    }
}

impl GatewayState {
    fn owns(&self, connection_id: ConnectionId, player_id: &str) -> bool {
        !player_id.is_empty()
            && self
                .connections
                .get(&connection_id)
                .is_some_and(|connection| connection.player_ids.contains(player_id))
    }

    fn queue_join_hydration(
        &mut self,
        connection_id: ConnectionId,
        player_id: &str,
        out: &mut Vec<Outbound>,
    ) {
        let targets = [connection_id];
        let owned = self
            .connections
            .get(&connection_id)
            .map(|connection| connection.player_ids.clone())
            .unwrap_or_default();

        let snapshot = self.hub.snapshot_for(&owned, SNAPSHOT_REPLICATION_RADIUS);
        self.push_to(&targets, &ServerMessage::Snapshot(snapshot), out);
        if let Some(hotbar) = self.hub.hotbar_state_for(player_id) {
            self.push_to(&targets, &ServerMessage::HotbarState(hotbar), out);
        }
        if let Some(inventory) = self.hub.inventory_state_for(player_id) {
            self.push_to(&targets, &ServerMessage::InventoryState(inventory), out);
        }
        if let Some(health) = self.hub.health_state_for(player_id) {
            self.push_to(&targets, &ServerMessage::HealthState(health), out);
        }
        if let Some(container) = self.hub.container_state(SHARED_CONTAINER_ID) {
            self.push_to(&targets, &ServerMessage::ContainerState(container), out);
        }
        if let Some(container) = self.hub.container_state(&stash_container_id(player_id)) {
            self.push_to(&targets, &ServerMessage::ContainerState(container), out);
        }
        let flags = self.hub.world_flag_state();
        self.push_to(&targets, &ServerMessage::WorldFlagState(flags), out);
        let directives = self.hub.world_directive_state();
        self.push_to(&targets, &ServerMessage::WorldDirectiveState(directives), out);
    }

    fn apply_block_action(
        &mut self,
        request: &openclaw_protocol::BlockActionRequest,
        out: &mut Vec<Outbound>,
    ) {
        let Some(delta) = self.hub.apply_block_action(request) else {
            return;
        };
        let is_break = delta.action == openclaw_protocol::BlockAction::Break;
        let targets =
            self.chunk_connections(delta.chunk_x, delta.chunk_z, BLOCK_DELTA_CHUNK_RADIUS);
        self.push_to(&targets, &ServerMessage::BlockDelta(delta), out);

        if is_break {
            let grants = break_resource_grants(request);
            if let Some(inventory) = self.hub.award_resources(&request.player_id, &grants) {
                let owners = self.owner_connections(&inventory.player_id);
                self.push_to(&owners, &ServerMessage::InventoryState(inventory), out);
            }
        }
    }

    fn apply_combat_action(
        &mut self,
        request: &openclaw_protocol::CombatActionRequest,
        out: &mut Vec<Outbound>,
    ) {
        let outcome = self.hub.apply_combat_action(request);
        let accepted = outcome.result.accepted;
        let combat_scope = self.combat_connections(&request.player_id, COMBAT_REPLICATION_RADIUS);
        self.push_to(&combat_scope, &ServerMessage::CombatResult(outcome.result), out);

        for health in outcome.health_updates {
            let owners = self.owner_connections(&health.player_id);
            self.push_to(&owners, &ServerMessage::HealthState(health), out);
        }
        for inventory in outcome.inventory_updates {
            let owners = self.owner_connections(&inventory.player_id);
            self.push_to(&owners, &ServerMessage::InventoryState(inventory), out);
        }
        for event in outcome.world_events {
            self.push_to(&combat_scope, &ServerMessage::WorldEvent(event), out);
        }

        if accepted && request.kind == "item" {
            if let Some(hotbar) = self.hub.hotbar_state_for(&request.player_id) {
                let owners = self.owner_connections(&request.player_id);
                self.push_to(&owners, &ServerMessage::HotbarState(hotbar), out);
            }
        }
    }

    fn apply_container_action(
        &mut self,
        request: &openclaw_protocol::ContainerActionRequest,
        out: &mut Vec<Outbound>,
    ) {
        let (result, inventory, container) = self.hub.apply_container_action(request);
        let owners = self.owner_connections(&request.player_id);
        self.push_to(&owners, &ServerMessage::ContainerResult(result), out);
        if let Some(inventory) = inventory {
            self.push_to(&owners, &ServerMessage::InventoryState(inventory), out);
        }
        if let Some(container) = container {
            match private_container_owner(&container.container_id) {
                Some(owner) => {
                    let stash_owners = self.owner_connections(owner);
                    self.push_to(&stash_owners, &ServerMessage::ContainerState(container), out);
                }
                None => {
                    let everyone = self.all_connections();
                    self.push_to(&everyone, &ServerMessage::ContainerState(container), out);
                }
            }
        }
    }

    fn all_connections(&self) -> Vec<ConnectionId> {
        self.connections.keys().copied().collect()
    }

    fn owner_connections(&self, player_id: &str) -> Vec<ConnectionId> {
        self.connections
            .iter()
            .filter(|(_, connection)| connection.player_ids.contains(player_id))
            .map(|(connection_id, _)| *connection_id)
            .collect()
    }

    /// Connections owning the actor, plus those owning any player
    /// within `radius` of the actor.
    fn combat_connections(&self, actor_id: &str, radius: f64) -> Vec<ConnectionId> {
        let actor_position = self.hub.player_position(actor_id);
        self.connections
            .iter()
            .filter(|(_, connection)| {
                connection.player_ids.iter().any(|player_id| {
                    if player_id == actor_id {
                        return true;
                    }
                    let (Some(actor), Some(position)) =
                        (actor_position, self.hub.player_position(player_id))
                    else {
                        return false;
                    };
                    position.distance(actor) <= radius
                })
            })
            .map(|(connection_id, _)| *connection_id)
            .collect()
    }

    /// Connections owning any player whose chunk is within `radius`
    /// chunks of the mutated one.
    fn chunk_connections(&self, chunk_x: i64, chunk_z: i64, radius: i64) -> Vec<ConnectionId> {
        self.connections
            .iter()
            .filter(|(_, connection)| {
                connection.player_ids.iter().any(|player_id| {
                    let Some(position) = self.hub.player_position(player_id) else {
                        return false;
                    };
                    let player_chunk_x = (position.x / 64.0).floor() as i64;
                    let player_chunk_z = (position.y / 64.0).floor() as i64;
                    (player_chunk_x - chunk_x).abs() <= radius
                        && (player_chunk_z - chunk_z).abs() <= radius
                })
            })
            .map(|(connection_id, _)| *connection_id)
            .collect()
    }

    fn push_to(&self, targets: &[ConnectionId], message: &ServerMessage, out: &mut Vec<Outbound>) {
        if targets.is_empty() {
            return;
        }
        let text = match serde_json::to_string(message) {
            Ok(text) => text,
            Err(error) => {
                warn!(%error, "failed to encode envelope");
                return;
            }
        };
        for connection_id in targets {
            if let Some(connection) = self.connections.get(connection_id) {
                out.push((
                    *connection_id,
                    connection.sender.clone(),
                    Message::Text(text.clone()),
                ));
            }
        }
    }
}
