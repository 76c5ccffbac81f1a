//! Per-player hotbar ledger: fixed slot layout, stacks, selection.

use openclaw_protocol::{HotbarSelectRequest, HotbarState};
use serde_json::json;

use crate::hub::WorldHub;
use crate::DEFAULT_HOTBAR_SLOT_IDS;

/// Initial stack count for a slot id.
pub(crate) fn default_stack_count(slot_id: &str) -> i64 {
    match slot_id {
        "slot-4-bandage" => 3,
        "slot-5-bomb" => 2,
        _ => 0,
    }
}

pub(crate) fn default_stack_counts(slot_ids: &[String]) -> Vec<i64> {
    slot_ids
        .iter()
        .map(|slot_id| default_stack_count(slot_id))
        .collect()
}

pub(crate) fn default_slot_ids() -> Vec<String> {
    DEFAULT_HOTBAR_SLOT_IDS
        .iter()
        .map(|slot_id| slot_id.to_string())
        .collect()
}

/// Index of a slot id within a hotbar, if equipped.
pub(crate) fn slot_index(state: &HotbarState, slot_id: &str) -> Option<usize> {
    state.slot_ids.iter().position(|candidate| candidate == slot_id)
}

impl WorldHub {
    /// Fetch-or-rebuild a player's hotbar.
    ///
    /// A missing or malformed ledger (empty layout, mismatched stack
    /// list, out-of-range selection) is reset to defaults; every access
    /// refreshes the tick stamp.
    pub(crate) fn ensure_hotbar(&mut self, player_id: &str) -> &mut HotbarState {
        let tick = self.tick;
        let state = self
            .hotbars
            .entry(player_id.to_string())
            .or_insert_with(|| HotbarState {
                player_id: player_id.to_string(),
                slot_ids: default_slot_ids(),
                stack_counts: default_stack_counts(&default_slot_ids()),
                selected_index: 0,
                tick,
            });
        if state.slot_ids.is_empty() {
            state.slot_ids = default_slot_ids();
        }
        if state.stack_counts.len() != state.slot_ids.len() {
            state.stack_counts = default_stack_counts(&state.slot_ids);
        }
        if state.selected_index < 0 || state.selected_index >= state.slot_ids.len() as i64 {
            state.selected_index = 0;
        }
        state.tick = tick;
        state
    }

    /// Change the selected slot. Rejects unknown players and
    /// out-of-range indices.
    pub fn apply_hotbar_selection(&mut self, request: &HotbarSelectRequest) -> Option<HotbarState> {
        if !self.players.contains_key(&request.player_id) {
            return None;
        }
        let tick = self.tick;
        let state = self.ensure_hotbar(&request.player_id);
        if request.slot_index < 0 || request.slot_index >= state.slot_ids.len() as i64 {
            return None;
        }
        state.selected_index = request.slot_index;
        state.tick = tick;
        let snapshot = state.clone();
        let slot_id = snapshot.slot_ids[request.slot_index as usize].clone();
        self.events.record(
            tick,
            "hotbar_selected",
            &request.player_id,
            json!({"slotIndex": request.slot_index, "slotId": slot_id}),
        );
        Some(snapshot)
    }

    /// Current hotbar for a joined player.
    pub fn hotbar_state_for(&mut self, player_id: &str) -> Option<HotbarState> {
        if !self.players.contains_key(player_id) {
            return None;
        }
        Some(self.ensure_hotbar(player_id).clone())
    }
}
