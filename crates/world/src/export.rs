//! Debug snapshot: whole-world export and atomic import.

use std::collections::{BTreeMap, HashMap};

use glam::DVec2;
use openclaw_protocol::{
    ContainerState, DebugLoadAck, DebugState, EntityHealthState, HealthState, HotbarState,
    InputState, InventoryState, SpawnHint, WorldFlagState,
};
use openclaw_worldgen::parse_target_token;
use serde_json::json;
use thiserror::Error;
use tracing::info;

use crate::blocks::{BlockKey, BlockStore};
use crate::directives::SpawnHintEntry;
use crate::health::entity_base_health;
use crate::hotbar::{default_slot_ids, default_stack_counts};
use crate::hub::{PlayerState, WorldHub};
use crate::inventory::{default_resource_map, normalize_resource_map, stash_container_id};
use crate::{
    sanitize_number, MAX_SPAWN_HINT_TTL_TICKS, MAX_STORY_BEATS, PLAYER_MAX_HEALTH,
    SHARED_CONTAINER_ID,
};

/// Validation failures for a debug state import.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImportError {
    #[error("invalid_world_seed")]
    InvalidWorldSeed,
    #[error("invalid_tick")]
    InvalidTick,
}

impl WorldHub {
    /// Export the full authoritative state with deterministic ordering.
    pub fn export_state(&self) -> DebugState {
        let hotbar_states = sorted_values(&self.hotbars);
        let inventory_states = sorted_values(&self.inventories);
        let health_states = sorted_values(&self.health);
        let entity_health = sorted_values(&self.entity_health);
        let container_states = sorted_values(&self.containers);

        let mut hint_ids: Vec<&String> = self.spawn_hints.keys().collect();
        hint_ids.sort();
        let spawn_hints: Vec<SpawnHint> = hint_ids
            .into_iter()
            .filter(|hint_id| self.spawn_hints[*hint_id].expire_tick > self.tick)
            .map(|hint_id| self.spawn_hints[hint_id].hint.clone())
            .collect();

        DebugState {
            snapshot: self.snapshot(),
            block_deltas: self.blocks.list_deltas(),
            hotbar_states,
            inventory_states,
            health_states,
            entity_health,
            container_states,
            world_flags: WorldFlagState {
                flags: self.world_flags.clone(),
                tick: self.tick,
            },
            directive_state: openclaw_protocol::DirectiveState {
                story_beats: self.story_beats.clone(),
                spawn_hints,
                tick: self.tick,
            },
        }
    }

    /// Validate and atomically replace the authoritative state.
    ///
    /// Cooldowns, the directive queue (and its dedup memory), and the
    /// event log reset; default containers and per-player ledgers are
    /// rebuilt before the `debug_state_loaded` event is recorded.
    pub fn import_state(&mut self, state: &DebugState) -> Result<DebugLoadAck, ImportError> {
        let world_seed = state.snapshot.world_seed.trim().to_string();
        if world_seed.is_empty() {
            return Err(ImportError::InvalidWorldSeed);
        }
        if state.snapshot.tick < 0 {
            return Err(ImportError::InvalidTick);
        }
        let imported_tick = state.snapshot.tick;

        let mut players = HashMap::new();
        for (player_id, snapshot) in &state.snapshot.players {
            let player_id = player_id.trim();
            if player_id.is_empty() {
                continue;
            }
            players.insert(
                player_id.to_string(),
                PlayerState {
                    player_id: player_id.to_string(),
                    position: DVec2::new(sanitize_number(snapshot.x), sanitize_number(snapshot.z)),
                    input: InputState::default(),
                },
            );
        }

        let mut blocks = BlockStore::default();
        for delta in &state.block_deltas {
            let key = BlockKey::new(delta.chunk_x, delta.chunk_z, delta.x, delta.y, delta.z);
            if !key.in_bounds() {
                continue;
            }
            match delta.action {
                openclaw_protocol::BlockAction::Break => blocks.remove(key),
                openclaw_protocol::BlockAction::Place => {
                    let block_type = delta.block_type.trim();
                    let block_type = if block_type.is_empty() { "dirt" } else { block_type };
                    blocks.place(key, block_type.to_string());
                }
            }
        }

        let mut hotbars = HashMap::new();
        for hotbar in &state.hotbar_states {
            let player_id = hotbar.player_id.trim();
            if player_id.is_empty() {
                continue;
            }
            let mut slot_ids = hotbar.slot_ids.clone();
            if slot_ids.is_empty() {
                slot_ids = default_slot_ids();
            }
            let mut stack_counts = hotbar.stack_counts.clone();
            if stack_counts.len() != slot_ids.len() {
                stack_counts = default_stack_counts(&slot_ids);
            }
            let mut selected_index = hotbar.selected_index;
            if selected_index < 0 || selected_index >= slot_ids.len() as i64 {
                selected_index = 0;
            }
            let tick = if hotbar.tick < 0 { imported_tick } else { hotbar.tick };
            hotbars.insert(
                player_id.to_string(),
                HotbarState {
                    player_id: player_id.to_string(),
                    slot_ids,
                    stack_counts,
                    selected_index,
                    tick,
                },
            );
        }

        let mut inventories = HashMap::new();
        for inventory in &state.inventory_states {
            let player_id = inventory.player_id.trim();
            if player_id.is_empty() {
                continue;
            }
            let tick = if inventory.tick < 0 { imported_tick } else { inventory.tick };
            inventories.insert(
                player_id.to_string(),
                InventoryState {
                    player_id: player_id.to_string(),
                    resources: normalize_resource_map(&inventory.resources),
                    tick,
                },
            );
        }

        let mut health = HashMap::new();
        for record in &state.health_states {
            let player_id = record.player_id.trim();
            if player_id.is_empty() {
                continue;
            }
            let max = if record.max <= 0 { PLAYER_MAX_HEALTH } else { record.max };
            let current = record.current.clamp(0, max);
            let tick = if record.tick < 0 { imported_tick } else { record.tick };
            health.insert(
                player_id.to_string(),
                HealthState {
                    player_id: player_id.to_string(),
                    current,
                    max,
                    tick,
                },
            );
        }

        let mut entity_health = HashMap::new();
        for record in &state.entity_health {
            let target_id = record.target_id.trim();
            if target_id.is_empty() {
                continue;
            }
            let Some(token) = parse_target_token(target_id) else {
                continue;
            };
            let Some(base_health) = entity_base_health(token.kind) else {
                continue;
            };
            let max = if record.max <= 0 { base_health } else { record.max };
            let current = record.current.clamp(0, max);
            let defeated_until_tick = record.defeated_until_tick.max(0);
            let tick = if record.tick < 0 { imported_tick } else { record.tick };
            entity_health.insert(
                target_id.to_string(),
                EntityHealthState {
                    target_id: target_id.to_string(),
                    entity_type: token.kind.as_wire().to_string(),
                    current,
                    max,
                    defeated_until_tick,
                    tick,
                },
            );
        }

        let mut containers = HashMap::new();
        for container in &state.container_states {
            let container_id = container.container_id.trim();
            if container_id.is_empty() {
                continue;
            }
            let tick = if container.tick < 0 { imported_tick } else { container.tick };
            containers.insert(
                container_id.to_string(),
                ContainerState {
                    container_id: container_id.to_string(),
                    resources: normalize_resource_map(&container.resources),
                    tick,
                },
            );
        }

        let mut world_flags = BTreeMap::new();
        for (key, value) in &state.world_flags.flags {
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            world_flags.insert(key.to_string(), value.clone());
        }

        let mut story_beats: Vec<String> = state
            .directive_state
            .story_beats
            .iter()
            .map(|beat| beat.trim().to_string())
            .filter(|beat| !beat.is_empty())
            .collect();
        if story_beats.len() > MAX_STORY_BEATS {
            let excess = story_beats.len() - MAX_STORY_BEATS;
            story_beats.drain(..excess);
        }

        let mut spawn_hints = HashMap::new();
        for hint in &state.directive_state.spawn_hints {
            let hint_id = hint.hint_id.trim();
            if hint_id.is_empty() {
                continue;
            }
            let label = hint.label.trim();
            let label = if label.is_empty() { "spawn_hint" } else { label };
            spawn_hints.insert(
                hint_id.to_string(),
                SpawnHintEntry {
                    hint: SpawnHint {
                        hint_id: hint_id.to_string(),
                        label: label.to_string(),
                        chunk_x: hint.chunk_x,
                        chunk_z: hint.chunk_z,
                    },
                    expire_tick: imported_tick + MAX_SPAWN_HINT_TTL_TICKS,
                },
            );
        }

        self.world_seed = world_seed;
        self.tick = imported_tick;
        self.players = players;
        self.blocks = blocks;
        self.cooldowns = HashMap::new();
        self.hotbars = hotbars;
        self.inventories = inventories;
        self.health = health;
        self.entity_health = entity_health;
        self.containers = containers;
        self.world_flags = world_flags;
        self.story_beats = story_beats;
        self.spawn_hints = spawn_hints;
        self.directives.reset();
        self.events.reset();

        // Rebuild defaults only where the document was silent: touching
        // existing records would restamp their ticks and break the
        // export/import/export equality guarantee.
        let tick = self.tick;
        insert_default_container(&mut self.containers, SHARED_CONTAINER_ID, tick);
        let player_ids: Vec<String> = self.players.keys().cloned().collect();
        for player_id in player_ids {
            self.hotbars
                .entry(player_id.clone())
                .or_insert_with(|| HotbarState {
                    player_id: player_id.clone(),
                    slot_ids: default_slot_ids(),
                    stack_counts: default_stack_counts(&default_slot_ids()),
                    selected_index: 0,
                    tick,
                });
            self.inventories
                .entry(player_id.clone())
                .or_insert_with(|| InventoryState {
                    player_id: player_id.clone(),
                    resources: default_resource_map(),
                    tick,
                });
            self.health
                .entry(player_id.clone())
                .or_insert_with(|| HealthState {
                    player_id: player_id.clone(),
                    current: PLAYER_MAX_HEALTH,
                    max: PLAYER_MAX_HEALTH,
                    tick,
                });
            insert_default_container(&mut self.containers, &stash_container_id(&player_id), tick);
        }

        let player_count = self.players.len() as i64;
        let block_count = self.blocks.len() as i64;
        let tick = self.tick;
        self.events.record(
            tick,
            "debug_state_loaded",
            "debug",
            json!({"playerCount": player_count, "blockCount": block_count}),
        );
        info!(player_count, block_count, tick, "debug state imported");

        Ok(DebugLoadAck {
            accepted: true,
            reason: String::new(),
            tick: self.tick,
            player_count,
            block_count,
        })
    }
}

fn sorted_values<T: Clone>(map: &HashMap<String, T>) -> Vec<T> {
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();
    keys.into_iter().map(|key| map[key].clone()).collect()
}

fn insert_default_container(
    containers: &mut HashMap<String, ContainerState>,
    container_id: &str,
    tick: i64,
) {
    containers
        .entry(container_id.to_string())
        .or_insert_with(|| ContainerState {
            container_id: container_id.to_string(),
            resources: default_resource_map(),
            tick,
        });
}
