//! Combat engine: slot configs, cooldowns, target validation, effects.
//!
//! Also hosts the interact pipeline, which shares the target
//! resolution rules.

use std::collections::BTreeMap;

use glam::DVec2;
use openclaw_protocol::{
    CombatActionRequest, CombatResult, HealthState, InteractActionRequest, InteractResult,
    InventoryState, WorldEvent,
};
use openclaw_worldgen::{fnv1a_32, is_combatant_token, resolve_target_position, EntityKind};
use serde_json::json;

use crate::hub::WorldHub;
use crate::{sanitize_number, INTERACTION_RANGE};

/// Static configuration of one combat slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlotConfig {
    pub kind: &'static str,
    pub cooldown_ticks: i64,
    pub max_range: f64,
    pub requires_target: bool,
    pub damage: i64,
    pub heal: i64,
}

/// Look up the static config for a slot id.
pub fn slot_config(slot_id: &str) -> Option<SlotConfig> {
    match slot_id {
        "slot-1-rust-blade" => Some(SlotConfig {
            kind: "melee",
            cooldown_ticks: 12,
            max_range: 3.4,
            requires_target: true,
            damage: 2,
            heal: 0,
        }),
        "slot-2-ember-bolt" => Some(SlotConfig {
            kind: "spell",
            cooldown_ticks: 20,
            max_range: 11.5,
            requires_target: true,
            damage: 3,
            heal: 0,
        }),
        "slot-3-frost-bind" => Some(SlotConfig {
            kind: "spell",
            cooldown_ticks: 29,
            max_range: 8.5,
            requires_target: true,
            damage: 2,
            heal: 0,
        }),
        "slot-4-bandage" => Some(SlotConfig {
            kind: "item",
            cooldown_ticks: 42,
            max_range: 0.0,
            requires_target: false,
            damage: 0,
            heal: 2,
        }),
        "slot-5-bomb" => Some(SlotConfig {
            kind: "item",
            cooldown_ticks: 33,
            max_range: 9.5,
            requires_target: true,
            damage: 4,
            heal: 0,
        }),
        _ => None,
    }
}

/// Everything an accepted or rejected combat action produced.
#[derive(Debug, Clone, Default)]
pub struct CombatOutcome {
    pub result: CombatResult,
    pub health_updates: Vec<HealthState>,
    pub inventory_updates: Vec<InventoryState>,
    pub world_events: Vec<WorldEvent>,
}

/// Loot for defeating an entity, rolled from the token and defeat tick.
pub(crate) fn entity_loot(target_id: &str, kind: EntityKind, tick: i64) -> BTreeMap<String, i64> {
    let mut grants = BTreeMap::new();
    grants.insert("salvage".to_string(), 1_i64);
    let roll = i64::from(fnv1a_32(&format!("{target_id}:{tick}")) % 100);
    let extra = match kind {
        EntityKind::WildMon => match roll {
            0..=34 => "fiber",
            35..=59 => "coal",
            60..=79 => "iron_ore",
            _ => "salvage",
        },
        EntityKind::Npc => match roll {
            0..=39 => "wood",
            40..=69 => "fiber",
            _ => "salvage",
        },
        _ => return grants,
    };
    *grants.entry(extra.to_string()).or_insert(0) += 1;
    grants
}

impl WorldHub {
    /// Authoritative target coordinates for a token, if it resolves.
    ///
    /// Player ids resolve to live positions; generated-entity tokens
    /// re-run chunk generation. The actor can never target itself.
    pub(crate) fn resolve_target_coordinates(
        &self,
        actor_id: &str,
        target_id: &str,
    ) -> Option<(f64, f64)> {
        if target_id.is_empty() || target_id == actor_id {
            return None;
        }
        if let Some(target) = self.players.get(target_id) {
            return Some((target.position.x, target.position.y));
        }
        resolve_target_position(
            target_id,
            &self.world_seed,
            self.tick,
            self.config.tick_rate_hz,
        )
    }

    /// Run the combat pipeline for one request.
    ///
    /// Any rejection leaves cooldowns and stacks untouched and logs a
    /// `combat_rejected` event carrying the reason.
    pub fn apply_combat_action(&mut self, request: &CombatActionRequest) -> CombatOutcome {
        let mut outcome = CombatOutcome {
            result: CombatResult {
                action_id: request.action_id.clone(),
                player_id: request.player_id.clone(),
                slot_id: request.slot_id.clone(),
                kind: request.kind.clone(),
                target_id: request.target_id.trim().to_string(),
                target_label: request.target_label.trim().to_string(),
                target_world_x: request.target_world_x,
                target_world_z: request.target_world_z,
                tick: self.tick,
                ..Default::default()
            },
            ..Default::default()
        };

        if request.player_id.is_empty()
            || request.action_id.is_empty()
            || request.slot_id.is_empty()
            || request.kind.is_empty()
        {
            return self.reject_combat(outcome, "invalid_payload");
        }

        let Some(actor_position) = self.player_position(&request.player_id) else {
            return self.reject_combat(outcome, "player_not_found");
        };

        let Some(slot) = slot_config(&request.slot_id) else {
            return self.reject_combat(outcome, "invalid_slot");
        };
        if request.kind != slot.kind {
            return self.reject_combat(outcome, "invalid_slot_kind");
        }

        let Some(slot_index) = crate::hotbar::slot_index(
            self.ensure_hotbar(&request.player_id),
            &request.slot_id,
        ) else {
            return self.reject_combat(outcome, "slot_not_equipped");
        };

        if slot.requires_target {
            let resolved = self
                .resolve_target_coordinates(&request.player_id, &outcome.result.target_id);
            match resolved {
                Some((world_x, world_z)) => {
                    outcome.result.target_world_x = Some(world_x);
                    outcome.result.target_world_z = Some(world_z);
                    if outcome.result.target_label.is_empty() {
                        outcome.result.target_label = outcome.result.target_id.clone();
                    }
                }
                None => match (request.target_world_x, request.target_world_z) {
                    (Some(world_x), Some(world_z)) => {
                        outcome.result.target_world_x = Some(sanitize_number(world_x));
                        outcome.result.target_world_z = Some(sanitize_number(world_z));
                    }
                    _ if !outcome.result.target_id.is_empty() => {
                        return self.reject_combat(outcome, "unknown_target");
                    }
                    _ => {
                        return self.reject_combat(outcome, "missing_target");
                    }
                },
            }

            if !outcome.result.target_id.is_empty()
                && !self.players.contains_key(&outcome.result.target_id)
                && is_combatant_token(&outcome.result.target_id)
                && !self.is_entity_available(&outcome.result.target_id)
            {
                return self.reject_combat(outcome, "target_defeated");
            }

            let target = DVec2::new(
                sanitize_number(outcome.result.target_world_x.unwrap_or(0.0)),
                sanitize_number(outcome.result.target_world_z.unwrap_or(0.0)),
            );
            let distance = target.distance(actor_position);
            if slot.max_range > 0.0 && distance > slot.max_range {
                return self.reject_combat(outcome, "target_out_of_range");
            }
        }

        let ready_at = self
            .cooldowns
            .get(&request.player_id)
            .and_then(|slots| slots.get(&request.slot_id))
            .copied()
            .unwrap_or(0);
        if self.tick < ready_at {
            let remaining_ticks = ready_at - self.tick;
            outcome.result.cooldown_remaining_ms =
                Some((remaining_ticks as f64 * (1000.0 / self.config.tick_rate_hz)) as i64);
            return self.reject_combat(outcome, "cooldown_active");
        }

        if slot.kind == "item" {
            let tick = self.tick;
            let hotbar = self.ensure_hotbar(&request.player_id);
            if hotbar.stack_counts[slot_index] <= 0 {
                return self.reject_combat(outcome, "insufficient_item");
            }
            hotbar.stack_counts[slot_index] -= 1;
            hotbar.tick = tick;
        }

        let next_ready = self.tick + slot.cooldown_ticks;
        self.cooldowns
            .entry(request.player_id.clone())
            .or_default()
            .insert(request.slot_id.clone(), next_ready);
        outcome.result.accepted = true;

        self.apply_combat_effects(&mut outcome, slot);
        self.record_combat_event(&outcome.result);
        outcome
    }

    fn reject_combat(&mut self, mut outcome: CombatOutcome, reason: &str) -> CombatOutcome {
        outcome.result.accepted = false;
        outcome.result.reason = reason.to_string();
        self.record_combat_event(&outcome.result);
        outcome
    }

    fn apply_combat_effects(&mut self, outcome: &mut CombatOutcome, slot: SlotConfig) {
        let tick = self.tick;
        let result = outcome.result.clone();

        if slot.heal > 0 {
            let state = self.ensure_health(&result.player_id);
            let next = (state.current + slot.heal).min(state.max);
            if next != state.current {
                state.current = next;
                state.tick = tick;
                let snapshot = state.clone();
                outcome.health_updates.push(snapshot.clone());
                self.events.record(
                    tick,
                    "player_healed",
                    &result.player_id,
                    json!({
                        "delta": slot.heal,
                        "current": snapshot.current,
                        "max": snapshot.max,
                    }),
                );
            }
        }

        if slot.damage > 0 && !result.target_id.is_empty() {
            if self.players.contains_key(&result.target_id) {
                let state = self.ensure_health(&result.target_id);
                let next = (state.current - slot.damage).max(0);
                if next != state.current {
                    state.current = next;
                    state.tick = tick;
                    let snapshot = state.clone();
                    outcome.health_updates.push(snapshot.clone());
                    self.events.record(
                        tick,
                        "player_damaged",
                        &result.target_id,
                        json!({
                            "delta": -slot.damage,
                            "current": snapshot.current,
                            "max": snapshot.max,
                            "source": result.player_id,
                            "slotId": result.slot_id,
                        }),
                    );
                }
            } else if let Some((entity, defeated_now)) =
                self.apply_entity_damage(&result.target_id, slot.damage)
            {
                self.events.record(
                    tick,
                    "entity_damaged",
                    &result.player_id,
                    json!({
                        "targetId": entity.target_id,
                        "entityType": entity.entity_type,
                        "current": entity.current,
                        "max": entity.max,
                        "source": result.player_id,
                        "slotId": result.slot_id,
                        "respawnTick": entity.defeated_until_tick,
                    }),
                );
                if defeated_now {
                    let kind = EntityKind::from_wire(&entity.entity_type)
                        .unwrap_or(EntityKind::WildMon);
                    let loot = entity_loot(&entity.target_id, kind, tick);
                    if let Some(inventory) = self.grant_loot(&result.player_id, &loot) {
                        outcome.inventory_updates.push(inventory);
                    }
                    let event = self.events.record(
                        tick,
                        "entity_defeated",
                        &result.player_id,
                        json!({
                            "targetId": entity.target_id,
                            "entityType": entity.entity_type,
                            "source": result.player_id,
                            "slotId": result.slot_id,
                            "respawnTick": entity.defeated_until_tick,
                            "loot": loot,
                        }),
                    );
                    outcome.world_events.push(event);
                }
            }
        }
    }

    fn record_combat_event(&mut self, result: &CombatResult) {
        let kind = if result.accepted {
            "combat_confirmed"
        } else {
            "combat_rejected"
        };
        let mut payload = json!({
            "actionId": result.action_id,
            "slotId": result.slot_id,
            "kind": result.kind,
        });
        if !result.reason.is_empty() {
            payload["reason"] = json!(result.reason);
        }
        if !result.target_id.is_empty() {
            payload["targetId"] = json!(result.target_id);
        }
        if !result.target_label.is_empty() {
            payload["targetLabel"] = json!(result.target_label);
        }
        if let Some(remaining) = result.cooldown_remaining_ms {
            if remaining > 0 {
                payload["cooldownRemainingMs"] = json!(remaining);
            }
        }
        let tick = self.tick;
        self.events.record(tick, kind, &result.player_id, payload);
    }

    /// Run the interact pipeline for one request.
    pub fn apply_interact_action(&mut self, request: &InteractActionRequest) -> InteractResult {
        let mut result = InteractResult {
            action_id: request.action_id.clone(),
            player_id: request.player_id.clone(),
            target_id: request.target_id.trim().to_string(),
            target_label: request.target_label.trim().to_string(),
            target_world_x: request.target_world_x,
            target_world_z: request.target_world_z,
            tick: self.tick,
            ..Default::default()
        };

        if request.player_id.is_empty() || request.action_id.is_empty() {
            result.reason = "invalid_payload".to_string();
            return result;
        }
        let Some(actor_position) = self.player_position(&request.player_id) else {
            result.reason = "player_not_found".to_string();
            return result;
        };

        if !result.target_id.is_empty() {
            match self.resolve_target_coordinates(&request.player_id, &result.target_id) {
                Some((world_x, world_z)) => {
                    result.target_world_x = Some(world_x);
                    result.target_world_z = Some(world_z);
                    if result.target_label.is_empty() {
                        result.target_label = result.target_id.clone();
                    }
                }
                None => {
                    if request.target_world_x.is_none() || request.target_world_z.is_none() {
                        result.reason = "unknown_target".to_string();
                        return result;
                    }
                }
            }
        } else if request.target_world_x.is_none() || request.target_world_z.is_none() {
            result.reason = "missing_target".to_string();
            return result;
        }

        let (Some(world_x), Some(world_z)) = (result.target_world_x, result.target_world_z) else {
            result.reason = "missing_target".to_string();
            return result;
        };

        let distance = DVec2::new(sanitize_number(world_x), sanitize_number(world_z))
            .distance(actor_position);
        if distance > INTERACTION_RANGE {
            result.reason = "target_out_of_range".to_string();
            return result;
        }

        result.accepted = true;
        result.message = if result.target_label.is_empty() {
            "Interaction accepted.".to_string()
        } else {
            format!("{} acknowledges you.", result.target_label)
        };
        let tick = self.tick;
        self.events.record(
            tick,
            "interaction",
            &request.player_id,
            json!({
                "targetId": result.target_id,
                "targetLabel": result.target_label,
                "distance": distance,
            }),
        );
        result
    }
}
