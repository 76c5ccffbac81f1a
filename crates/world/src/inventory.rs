//! Inventory and container ledgers over the shared resource schema.

use std::collections::BTreeMap;

use openclaw_protocol::{ContainerActionRequest, ContainerActionResult, ContainerState, InventoryState};
use serde_json::json;

use crate::hub::WorldHub;
use crate::RESOURCE_IDS;

/// Zeroed resource map over the known schema.
pub(crate) fn default_resource_map() -> BTreeMap<String, i64> {
    RESOURCE_IDS
        .iter()
        .map(|resource_id| (resource_id.to_string(), 0))
        .collect()
}

/// Project arbitrary resource counts onto the schema; unknown keys drop.
pub(crate) fn normalize_resource_map(resources: &BTreeMap<String, i64>) -> BTreeMap<String, i64> {
    let mut normalized = default_resource_map();
    for (resource_id, amount) in resources {
        if normalized.contains_key(resource_id) {
            normalized.insert(resource_id.clone(), *amount);
        }
    }
    normalized
}

/// Private stash container id for a player.
pub fn stash_container_id(player_id: &str) -> String {
    format!("player:{player_id}:stash")
}

/// Owner of a `player:<id>:stash` container, when the id has that shape.
pub fn private_container_owner(container_id: &str) -> Option<&str> {
    let owner = container_id.strip_prefix("player:")?.strip_suffix(":stash")?;
    if owner.is_empty() {
        None
    } else {
        Some(owner)
    }
}

/// Access policy: `world:*` is public, a stash belongs to its owner.
pub fn can_access_container(player_id: &str, container_id: &str) -> bool {
    if container_id.starts_with("world:") {
        return true;
    }
    private_container_owner(container_id) == Some(player_id)
}

impl WorldHub {
    pub(crate) fn ensure_inventory(&mut self, player_id: &str) -> &mut InventoryState {
        let tick = self.tick;
        let state = self
            .inventories
            .entry(player_id.to_string())
            .or_insert_with(|| InventoryState {
                player_id: player_id.to_string(),
                resources: default_resource_map(),
                tick,
            });
        state.resources = normalize_resource_map(&state.resources);
        state.tick = tick;
        state
    }

    pub(crate) fn ensure_container(&mut self, container_id: &str) -> &mut ContainerState {
        let tick = self.tick;
        let state = self
            .containers
            .entry(container_id.to_string())
            .or_insert_with(|| ContainerState {
                container_id: container_id.to_string(),
                resources: default_resource_map(),
                tick,
            });
        state.resources = normalize_resource_map(&state.resources);
        state.tick = tick;
        state
    }

    /// Current inventory for a joined player.
    pub fn inventory_state_for(&mut self, player_id: &str) -> Option<InventoryState> {
        if !self.players.contains_key(player_id) {
            return None;
        }
        Some(self.ensure_inventory(player_id).clone())
    }

    /// Current contents of a container (created on first access).
    pub fn container_state(&mut self, container_id: &str) -> Option<ContainerState> {
        if container_id.is_empty() {
            return None;
        }
        Some(self.ensure_container(container_id).clone())
    }

    /// Grant resources and log one `inventory_updated` event per grant.
    ///
    /// Used for block-break loot; combat loot goes through the quiet
    /// [`WorldHub::grant_loot`] so only `entity_defeated` carries it.
    pub fn award_resources(
        &mut self,
        player_id: &str,
        grants: &BTreeMap<String, i64>,
    ) -> Option<InventoryState> {
        if !self.players.contains_key(player_id) {
            return None;
        }
        let tick = self.tick;
        let mut events = Vec::new();
        let changed = {
            let state = self.ensure_inventory(player_id);
            let mut changed = false;
            for (resource_id, amount) in grants {
                if resource_id.is_empty() || *amount <= 0 {
                    continue;
                }
                let total = state.resources.entry(resource_id.clone()).or_insert(0);
                *total += amount;
                events.push(json!({
                    "resource": resource_id,
                    "amount": amount,
                    "total": *total,
                }));
                changed = true;
            }
            if changed {
                state.tick = tick;
            }
            changed
        };
        if !changed {
            return None;
        }
        for payload in events {
            self.events.record(tick, "inventory_updated", player_id, payload);
        }
        Some(self.inventories[player_id].clone())
    }

    /// Grant resources without event noise (combat loot).
    pub(crate) fn grant_loot(
        &mut self,
        player_id: &str,
        grants: &BTreeMap<String, i64>,
    ) -> Option<InventoryState> {
        if !self.players.contains_key(player_id) {
            return None;
        }
        let tick = self.tick;
        let state = self.ensure_inventory(player_id);
        let mut changed = false;
        for (resource_id, amount) in grants {
            if resource_id.is_empty() || *amount <= 0 {
                continue;
            }
            *state.resources.entry(resource_id.clone()).or_insert(0) += amount;
            changed = true;
        }
        if !changed {
            return None;
        }
        state.tick = tick;
        Some(state.clone())
    }

    /// Deposit to or withdraw from a container, both sides atomically.
    pub fn apply_container_action(
        &mut self,
        request: &ContainerActionRequest,
    ) -> (
        ContainerActionResult,
        Option<InventoryState>,
        Option<ContainerState>,
    ) {
        let mut result = ContainerActionResult {
            action_id: request.action_id.clone(),
            player_id: request.player_id.clone(),
            container_id: request.container_id.clone(),
            operation: request.operation.clone(),
            resource_id: request.resource_id.clone(),
            amount: request.amount,
            accepted: false,
            reason: String::new(),
            tick: self.tick,
        };

        if request.player_id.is_empty()
            || request.action_id.is_empty()
            || request.container_id.is_empty()
            || request.resource_id.is_empty()
            || request.amount <= 0
        {
            result.reason = "invalid_payload".to_string();
            self.record_container_event(&result);
            return (result, None, None);
        }
        if !self.players.contains_key(&request.player_id) {
            result.reason = "player_not_found".to_string();
            self.record_container_event(&result);
            return (result, None, None);
        }
        if !can_access_container(&request.player_id, &request.container_id) {
            result.reason = "container_forbidden".to_string();
            self.record_container_event(&result);
            return (result, None, None);
        }
        if request.operation != "deposit" && request.operation != "withdraw" {
            result.reason = "invalid_operation".to_string();
            self.record_container_event(&result);
            return (result, None, None);
        }

        let tick = self.tick;
        let player_amount = *self
            .ensure_inventory(&request.player_id)
            .resources
            .get(&request.resource_id)
            .unwrap_or(&0);
        let container_amount = *self
            .ensure_container(&request.container_id)
            .resources
            .get(&request.resource_id)
            .unwrap_or(&0);

        let (next_player, next_container) = if request.operation == "deposit" {
            if player_amount < request.amount {
                result.reason = "insufficient_resources".to_string();
                self.record_container_event(&result);
                return (result, None, None);
            }
            (player_amount - request.amount, container_amount + request.amount)
        } else {
            if container_amount < request.amount {
                result.reason = "container_insufficient_resources".to_string();
                self.record_container_event(&result);
                return (result, None, None);
            }
            (player_amount + request.amount, container_amount - request.amount)
        };

        {
            let inventory = self.ensure_inventory(&request.player_id);
            inventory
                .resources
                .insert(request.resource_id.clone(), next_player);
            inventory.tick = tick;
        }
        {
            let container = self.ensure_container(&request.container_id);
            container
                .resources
                .insert(request.resource_id.clone(), next_container);
            container.tick = tick;
        }

        result.accepted = true;
        self.record_container_event(&result);
        let inventory = self.inventories[&request.player_id].clone();
        let container = self.containers[&request.container_id].clone();
        (result, Some(inventory), Some(container))
    }

    fn record_container_event(&mut self, result: &ContainerActionResult) {
        let kind = if result.accepted {
            "container_action_applied"
        } else {
            "container_action_rejected"
        };
        let mut payload = json!({
            "actionId": result.action_id,
            "containerId": result.container_id,
            "operation": result.operation,
            "resourceId": result.resource_id,
            "amount": result.amount,
        });
        if !result.reason.is_empty() {
            payload["reason"] = json!(result.reason);
        }
        let tick = self.tick;
        self.events.record(tick, kind, &result.player_id, payload);
    }
}
