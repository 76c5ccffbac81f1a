//! The hub: world identity, players, movement, and scoped snapshots.

use std::collections::{BTreeMap, HashMap, HashSet};

use glam::DVec2;
use openclaw_protocol::{
    HealthState, HotbarState, InputMessage, InputState, InventoryState, JoinRequest, PlayerSnapshot,
    WorldSnapshot,
};
use serde_json::json;
use tracing::debug;

use crate::blocks::BlockStore;
use crate::directives::{DirectiveQueue, SpawnHintEntry};
use crate::events::EventLog;
use crate::inventory::stash_container_id;
use crate::{sanitize_number, DEFAULT_WORLD_SEED, SHARED_CONTAINER_ID};

/// Simulation tuning shared by movement and cooldown math.
#[derive(Debug, Clone, Copy)]
pub struct WorldConfig {
    pub tick_rate_hz: f64,
    pub walk_speed: f64,
    pub run_multiplier: f64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 20.0,
            walk_speed: 6.0,
            run_multiplier: 1.35,
        }
    }
}

/// One player's authoritative state.
#[derive(Debug, Clone)]
pub(crate) struct PlayerState {
    pub(crate) player_id: String,
    pub(crate) position: DVec2,
    pub(crate) input: InputState,
}

/// Authoritative world state. See the crate docs for the locking model.
pub struct WorldHub {
    pub(crate) config: WorldConfig,
    pub(crate) world_seed: String,
    pub(crate) tick: i64,

    pub(crate) players: HashMap<String, PlayerState>,
    pub(crate) blocks: BlockStore,
    pub(crate) hotbars: HashMap<String, HotbarState>,
    pub(crate) inventories: HashMap<String, InventoryState>,
    pub(crate) health: HashMap<String, HealthState>,
    pub(crate) entity_health: HashMap<String, openclaw_protocol::EntityHealthState>,
    pub(crate) containers: HashMap<String, openclaw_protocol::ContainerState>,
    pub(crate) cooldowns: HashMap<String, HashMap<String, i64>>,

    pub(crate) world_flags: BTreeMap<String, String>,
    pub(crate) story_beats: Vec<String>,
    pub(crate) spawn_hints: HashMap<String, SpawnHintEntry>,
    pub(crate) directives: DirectiveQueue,
    pub(crate) events: EventLog,
}

impl WorldHub {
    /// Create a hub with the default configuration and seed.
    pub fn new() -> Self {
        Self::with_config(WorldConfig::default())
    }

    /// Create a hub with explicit tuning.
    pub fn with_config(config: WorldConfig) -> Self {
        Self {
            config,
            world_seed: DEFAULT_WORLD_SEED.to_string(),
            tick: 0,
            players: HashMap::new(),
            blocks: BlockStore::default(),
            hotbars: HashMap::new(),
            inventories: HashMap::new(),
            health: HashMap::new(),
            entity_health: HashMap::new(),
            containers: HashMap::new(),
            cooldowns: HashMap::new(),
            world_flags: BTreeMap::new(),
            story_beats: Vec::new(),
            spawn_hints: HashMap::new(),
            directives: DirectiveQueue::default(),
            events: EventLog::default(),
        }
    }

    pub fn config(&self) -> WorldConfig {
        self.config
    }

    pub fn world_seed(&self) -> &str {
        &self.world_seed
    }

    pub fn tick(&self) -> i64 {
        self.tick
    }

    /// Current position of a player, if joined.
    pub fn player_position(&self, player_id: &str) -> Option<DVec2> {
        self.players.get(player_id).map(|state| state.position)
    }

    /// Register a player. Rejoining with a known id keeps position and
    /// ledgers but clears the stored input.
    ///
    /// Returns false when the player id is empty.
    pub fn join(&mut self, request: &JoinRequest) -> bool {
        if request.player_id.is_empty() {
            return false;
        }
        if !request.world_seed.is_empty() {
            self.world_seed = request.world_seed.clone();
        }
        if let Some(existing) = self.players.get_mut(&request.player_id) {
            existing.input = InputState::default();
        } else {
            self.players.insert(
                request.player_id.clone(),
                PlayerState {
                    player_id: request.player_id.clone(),
                    position: DVec2::new(request.start_x, request.start_z),
                    input: InputState::default(),
                },
            );
        }
        self.ensure_hotbar(&request.player_id);
        self.ensure_inventory(&request.player_id);
        self.ensure_health(&request.player_id);
        self.ensure_container(SHARED_CONTAINER_ID);
        self.ensure_container(&stash_container_id(&request.player_id));
        let tick = self.tick;
        self.events.record(
            tick,
            "player_joined",
            &request.player_id,
            json!({"x": request.start_x, "z": request.start_z}),
        );
        debug!(player_id = %request.player_id, seed = %self.world_seed, "player joined");
        true
    }

    /// Remove a player and the ledgers that die with it. Containers
    /// (including the stash) survive for a later rejoin.
    pub fn leave(&mut self, player_id: &str) {
        self.players.remove(player_id);
        self.cooldowns.remove(player_id);
        self.hotbars.remove(player_id);
        self.inventories.remove(player_id);
        self.health.remove(player_id);
        let tick = self.tick;
        self.events
            .record(tick, "player_left", player_id, json!({}));
        debug!(player_id, "player left");
    }

    /// Overwrite a player's stored input after sanitizing the axes.
    pub fn set_input(&mut self, message: &InputMessage) {
        if let Some(player) = self.players.get_mut(&message.player_id) {
            player.input = InputState {
                move_x: sanitize_number(message.input.move_x),
                move_z: sanitize_number(message.input.move_z),
                running: message.input.running,
                jump: message.input.jump,
            };
        }
    }

    /// Zero the inputs of the given players so they stop drifting once
    /// their connection is gone.
    pub fn clear_inputs<'a>(&mut self, player_ids: impl IntoIterator<Item = &'a String>) {
        for player_id in player_ids {
            if let Some(player) = self.players.get_mut(player_id) {
                player.input = InputState::default();
            }
        }
    }

    /// Advance the simulation one tick: integrate movement, prune
    /// expired spawn hints, apply the directive budget.
    ///
    /// Returns true when flag/directive state changed and must be
    /// re-broadcast.
    pub fn advance_tick(&mut self) -> bool {
        self.tick += 1;
        let delta_seconds = 1.0 / self.config.tick_rate_hz;
        for player in self.players.values_mut() {
            let direction = normalize(player.input.move_x, player.input.move_z);
            let mut speed = self.config.walk_speed;
            if player.input.running {
                speed *= self.config.run_multiplier;
            }
            player.position += direction * speed * delta_seconds;
        }
        let mut state_changed = self.prune_expired_spawn_hints();
        if self.apply_directive_budget() {
            state_changed = true;
        }
        state_changed
    }

    /// Global snapshot of every player.
    pub fn snapshot(&self) -> WorldSnapshot {
        let players = self
            .players
            .values()
            .map(|state| (state.player_id.clone(), self.player_snapshot(state)))
            .collect();
        WorldSnapshot {
            world_seed: self.world_seed.clone(),
            tick: self.tick,
            players,
        }
    }

    /// Interest-scoped snapshot for a connection owning `owned_ids`.
    ///
    /// Owned players are always present; others only within `radius` of
    /// some owned anchor. A connection with no live anchors receives the
    /// global snapshot.
    pub fn snapshot_for(&self, owned_ids: &HashSet<String>, radius: f64) -> WorldSnapshot {
        if self.players.is_empty() {
            return WorldSnapshot {
                world_seed: self.world_seed.clone(),
                tick: self.tick,
                players: BTreeMap::new(),
            };
        }

        let anchors: Vec<DVec2> = owned_ids
            .iter()
            .filter_map(|player_id| self.players.get(player_id))
            .map(|state| state.position)
            .collect();
        if owned_ids.is_empty() || anchors.is_empty() {
            return self.snapshot();
        }

        let mut players = BTreeMap::new();
        for (player_id, state) in &self.players {
            if owned_ids.contains(player_id) {
                players.insert(player_id.clone(), self.player_snapshot(state));
                continue;
            }
            if anchors
                .iter()
                .any(|anchor| state.position.distance(*anchor) <= radius)
            {
                players.insert(player_id.clone(), self.player_snapshot(state));
            }
        }

        WorldSnapshot {
            world_seed: self.world_seed.clone(),
            tick: self.tick,
            players,
        }
    }

    pub(crate) fn player_snapshot(&self, state: &PlayerState) -> PlayerSnapshot {
        let direction = normalize(state.input.move_x, state.input.move_z);
        let speed = if direction == DVec2::ZERO {
            0.0
        } else if state.input.running {
            self.config.walk_speed * self.config.run_multiplier
        } else {
            self.config.walk_speed
        };
        PlayerSnapshot {
            player_id: state.player_id.clone(),
            x: state.position.x,
            z: state.position.y,
            speed,
        }
    }
}

impl Default for WorldHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Unit vector along (x, z), or zero when the motion vector is zero.
fn normalize(x: f64, z: f64) -> DVec2 {
    let vector = DVec2::new(x, z);
    let length = vector.length();
    if length <= 0.0 {
        DVec2::ZERO
    } else {
        vector / length
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn join(hub: &mut WorldHub, player_id: &str, x: f64, z: f64) {
        assert!(hub.join(&JoinRequest {
            world_seed: "seed-hub".to_string(),
            player_id: player_id.to_string(),
            start_x: x,
            start_z: z,
        }));
    }

    #[test]
    fn test_join_registers_player_and_ledgers() {
        let mut hub = WorldHub::new();
        join(&mut hub, "p1", 2.0, -3.0);

        assert_eq!(hub.world_seed(), "seed-hub");
        assert_eq!(hub.player_position("p1"), Some(DVec2::new(2.0, -3.0)));
        assert!(hub.hotbar_state_for("p1").is_some());
        assert!(hub.inventory_state_for("p1").is_some());
        assert!(hub.health_state_for("p1").is_some());
        assert!(hub.container_state(SHARED_CONTAINER_ID).is_some());
        assert!(hub.container_state("player:p1:stash").is_some());
    }

    #[test]
    fn test_join_with_empty_player_id_is_rejected() {
        let mut hub = WorldHub::new();
        assert!(!hub.join(&JoinRequest::default()));
        assert!(hub.players.is_empty());
    }

    #[test]
    fn test_rejoin_keeps_position_and_clears_input() {
        let mut hub = WorldHub::new();
        join(&mut hub, "p1", 2.0, -3.0);
        hub.set_input(&InputMessage {
            player_id: "p1".to_string(),
            input: InputState {
                move_x: 1.0,
                move_z: 0.0,
                running: false,
                jump: false,
            },
        });
        hub.advance_tick();
        let moved = hub.player_position("p1").unwrap();
        assert!(moved.x > 2.0);

        join(&mut hub, "p1", 0.0, 0.0);
        assert_eq!(hub.player_position("p1"), Some(moved));
        assert_eq!(hub.players["p1"].input, InputState::default());
    }

    #[test]
    fn test_leave_drops_player_state() {
        let mut hub = WorldHub::new();
        join(&mut hub, "p1", 0.0, 0.0);
        hub.leave("p1");
        assert!(hub.player_position("p1").is_none());
        assert!(hub.hotbar_state_for("p1").is_none());
        // The stash container outlives the player.
        assert!(hub.container_state("player:p1:stash").is_some());
    }

    #[test]
    fn test_movement_integrates_normalized_input() {
        let mut hub = WorldHub::new();
        join(&mut hub, "p1", 0.0, 0.0);
        hub.set_input(&InputMessage {
            player_id: "p1".to_string(),
            input: InputState {
                move_x: 3.0,
                move_z: 4.0,
                running: false,
                jump: false,
            },
        });
        hub.advance_tick();

        let position = hub.player_position("p1").unwrap();
        let expected_step = 6.0 / 20.0;
        assert!((position.length() - expected_step).abs() < 1e-9);
        assert!((position.x - expected_step * 0.6).abs() < 1e-9);
        assert!((position.y - expected_step * 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_running_scales_speed() {
        let mut hub = WorldHub::new();
        join(&mut hub, "walk", 0.0, 0.0);
        join(&mut hub, "run", 0.0, 0.0);
        for (player_id, running) in [("walk", false), ("run", true)] {
            hub.set_input(&InputMessage {
                player_id: player_id.to_string(),
                input: InputState {
                    move_x: 1.0,
                    move_z: 0.0,
                    running,
                    jump: false,
                },
            });
        }
        hub.advance_tick();
        let walk = hub.player_position("walk").unwrap().x;
        let run = hub.player_position("run").unwrap().x;
        assert!((run / walk - 1.35).abs() < 1e-9);
    }

    #[test]
    fn test_input_sanitizes_non_finite_axes() {
        let mut hub = WorldHub::new();
        join(&mut hub, "p1", 0.0, 0.0);
        hub.set_input(&InputMessage {
            player_id: "p1".to_string(),
            input: InputState {
                move_x: f64::NAN,
                move_z: f64::INFINITY,
                running: true,
                jump: true,
            },
        });
        hub.advance_tick();
        assert_eq!(hub.player_position("p1"), Some(DVec2::ZERO));
        // The jump flag passes through untouched.
        assert!(hub.players["p1"].input.jump);
    }

    #[test]
    fn test_snapshot_reports_derived_speed() {
        let mut hub = WorldHub::new();
        join(&mut hub, "still", 0.0, 0.0);
        join(&mut hub, "moving", 0.0, 0.0);
        hub.set_input(&InputMessage {
            player_id: "moving".to_string(),
            input: InputState {
                move_x: 0.0,
                move_z: 1.0,
                running: true,
                jump: false,
            },
        });

        let snapshot = hub.snapshot();
        assert_eq!(snapshot.players["still"].speed, 0.0);
        assert!((snapshot.players["moving"].speed - 6.0 * 1.35).abs() < 1e-9);
    }

    #[test]
    fn test_scoped_snapshot_filters_by_anchor_distance() {
        let mut hub = WorldHub::new();
        join(&mut hub, "actor", 0.0, 0.0);
        join(&mut hub, "near", 12.0, 4.0);
        join(&mut hub, "far", 320.0, 320.0);

        let owned: HashSet<String> = ["actor".to_string()].into();
        let snapshot = hub.snapshot_for(&owned, 160.0);
        assert!(snapshot.players.contains_key("actor"));
        assert!(snapshot.players.contains_key("near"));
        assert!(!snapshot.players.contains_key("far"));
    }

    #[test]
    fn test_scoped_snapshot_without_anchor_is_global() {
        let mut hub = WorldHub::new();
        join(&mut hub, "p-a", 0.0, 0.0);
        join(&mut hub, "p-b", 999.0, 999.0);

        let snapshot = hub.snapshot_for(&HashSet::new(), 160.0);
        assert_eq!(snapshot.players.len(), 2);
    }

    #[test]
    fn test_clear_inputs_stops_drift() {
        let mut hub = WorldHub::new();
        join(&mut hub, "p1", 0.0, 0.0);
        hub.set_input(&InputMessage {
            player_id: "p1".to_string(),
            input: InputState {
                move_x: 1.0,
                move_z: 0.0,
                running: false,
                jump: false,
            },
        });
        hub.clear_inputs(&["p1".to_string()]);
        hub.advance_tick();
        assert_eq!(hub.player_position("p1"), Some(DVec2::ZERO));
    }
}
