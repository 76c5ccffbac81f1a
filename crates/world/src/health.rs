//! Player and generated-entity health records.

use openclaw_protocol::{EntityHealthState, HealthState};
use openclaw_worldgen::{parse_target_token, EntityKind};

use crate::hub::WorldHub;
use crate::{ENTITY_RESPAWN_TICKS, PLAYER_MAX_HEALTH};

/// Base health pool for an attackable entity kind.
pub(crate) fn entity_base_health(kind: EntityKind) -> Option<i64> {
    match kind {
        EntityKind::Npc => Some(6),
        EntityKind::WildMon => Some(8),
        _ => None,
    }
}

impl WorldHub {
    /// Fetch-or-create a player's health, clamping current into
    /// `[0, max]` and refreshing the tick stamp.
    pub(crate) fn ensure_health(&mut self, player_id: &str) -> &mut HealthState {
        let tick = self.tick;
        let state = self
            .health
            .entry(player_id.to_string())
            .or_insert_with(|| HealthState {
                player_id: player_id.to_string(),
                current: PLAYER_MAX_HEALTH,
                max: PLAYER_MAX_HEALTH,
                tick,
            });
        if state.max <= 0 {
            state.max = PLAYER_MAX_HEALTH;
        }
        state.current = state.current.clamp(0, state.max);
        state.tick = tick;
        state
    }

    /// Current health for a joined player.
    pub fn health_state_for(&mut self, player_id: &str) -> Option<HealthState> {
        if !self.players.contains_key(player_id) {
            return None;
        }
        Some(self.ensure_health(player_id).clone())
    }

    /// Fetch-or-create an entity health record for a target token.
    ///
    /// A record whose respawn tick has elapsed resets to full health.
    pub(crate) fn ensure_entity_health(&mut self, target_id: &str) -> Option<&mut EntityHealthState> {
        let token = parse_target_token(target_id)?;
        let base_health = entity_base_health(token.kind)?;
        let tick = self.tick;
        let state = self
            .entity_health
            .entry(target_id.to_string())
            .or_insert_with(|| EntityHealthState {
                target_id: target_id.to_string(),
                entity_type: token.kind.as_wire().to_string(),
                current: base_health,
                max: base_health,
                defeated_until_tick: 0,
                tick,
            });
        if state.max <= 0 {
            state.max = base_health;
        }
        if state.defeated_until_tick > 0 && tick >= state.defeated_until_tick {
            state.current = state.max;
            state.defeated_until_tick = 0;
        }
        state.current = state.current.clamp(0, state.max);
        state.tick = tick;
        Some(state)
    }

    /// Whether a generated entity can currently be targeted.
    pub(crate) fn is_entity_available(&mut self, target_id: &str) -> bool {
        let tick = self.tick;
        match self.ensure_entity_health(target_id) {
            Some(state) => !(state.defeated_until_tick > tick && state.current <= 0),
            None => false,
        }
    }

    /// Apply damage to a generated entity.
    ///
    /// Returns the updated record and whether this hit caused the
    /// defeat transition. Hits on an already-defeated entity are
    /// absorbed without effect.
    pub(crate) fn apply_entity_damage(
        &mut self,
        target_id: &str,
        damage: i64,
    ) -> Option<(EntityHealthState, bool)> {
        if damage <= 0 {
            return None;
        }
        let tick = self.tick;
        let state = self.ensure_entity_health(target_id)?;
        if state.defeated_until_tick > tick && state.current <= 0 {
            return Some((state.clone(), false));
        }
        let next = (state.current - damage).max(0);
        let defeated_now = state.current > 0 && next == 0;
        state.current = next;
        state.tick = tick;
        if defeated_now {
            state.defeated_until_tick = tick + ENTITY_RESPAWN_TICKS;
        }
        Some((state.clone(), defeated_now))
    }
}
