//! Authoritative world simulation.
//!
//! [`WorldHub`] owns every piece of mutable world state: players and
//! their inputs, block overrides, per-player ledgers (hotbar, inventory,
//! health), shared and private containers, generated-entity health,
//! combat cooldowns, the directive queue, and the world event log.
//!
//! The hub performs no I/O. Every operation takes `&mut self`, mutates
//! state atomically, and returns the typed result plus copies of any
//! state the caller must replicate. The transport layer is responsible
//! for holding the one global lock around each call and for fanning the
//! returned envelopes out with the appropriate scope.

mod blocks;
mod combat;
mod craft;
mod directives;
mod events;
mod export;
mod health;
mod hotbar;
mod hub;
mod inventory;

pub use blocks::{break_resource_grants, BlockKey};
pub use combat::{slot_config, CombatOutcome, SlotConfig};
pub use craft::{recipe_config, Ingredient, RecipeConfig, RecipeOutput};
pub use export::ImportError;
pub use hub::{WorldConfig, WorldHub};
pub use inventory::{can_access_container, private_container_owner, stash_container_id};

/// Container every world shares from the first join.
pub const SHARED_CONTAINER_ID: &str = "world:camp-shared";

/// Seed used until the first join names one.
pub const DEFAULT_WORLD_SEED: &str = "default-seed";

/// Full wire ids of the default hotbar layout, in slot order.
pub const DEFAULT_HOTBAR_SLOT_IDS: [&str; 5] = [
    "slot-1-rust-blade",
    "slot-2-ember-bolt",
    "slot-3-frost-bind",
    "slot-4-bandage",
    "slot-5-bomb",
];

/// Resource schema shared by inventories and containers.
pub const RESOURCE_IDS: [&str; 7] = [
    "salvage",
    "wood",
    "stone",
    "fiber",
    "coal",
    "iron_ore",
    "iron_ingot",
];

/// Starting and ceiling player health.
pub const PLAYER_MAX_HEALTH: i64 = 10;

/// Ticks a defeated entity stays unavailable before its health resets.
pub const ENTITY_RESPAWN_TICKS: i64 = 600;

/// World event log retention.
pub const MAX_WORLD_EVENTS: usize = 512;

/// Event feed cursors remembered before LRU eviction.
pub const MAX_EVENT_CURSORS: usize = 128;

/// Directive queue capacity.
pub const MAX_QUEUED_DIRECTIVES: usize = 128;

/// Directives accepted per tick.
pub const MAX_DIRECTIVES_PER_TICK: i64 = 10;

/// Queue-head directives applied per tick.
pub const MAX_DIRECTIVES_APPLIED_PER_TICK: usize = 8;

/// Directive TTL default in ticks.
pub const DEFAULT_DIRECTIVE_TTL_TICKS: i64 = 240;

/// Directive TTL ceiling in ticks.
pub const MAX_DIRECTIVE_TTL_TICKS: i64 = 2000;

/// Spawn hint TTL default in ticks.
pub const DEFAULT_SPAWN_HINT_TTL_TICKS: i64 = 600;

/// Spawn hint TTL ceiling in ticks.
pub const MAX_SPAWN_HINT_TTL_TICKS: i64 = 4000;

/// Story beats retained in the directive state.
pub const MAX_STORY_BEATS: usize = 32;

/// Maximum distance for an accepted interaction.
pub const INTERACTION_RANGE: f64 = 3.4;

/// Replace non-finite doubles with zero before they reach the simulation.
pub fn sanitize_number(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}
