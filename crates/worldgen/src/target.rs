//! Target token parsing and authoritative coordinate resolution.
//!
//! A non-player target token is `chunkX:chunkZ:entityType:index`. The
//! index refers into the deterministically generated entity list for
//! that chunk (see [`crate::chunk`]).

use std::f64::consts::PI;

use crate::chunk::{generate_chunk_entities, EntityKind};
use crate::rng::fnv1a_32;
use crate::CHUNK_SIZE;

const WANDER_RADIUS_MIN: f64 = 0.6;
const WANDER_RADIUS_MAX: f64 = 1.8;
const WANDER_SPEED_MIN: f64 = 0.02;
const WANDER_SPEED_MAX: f64 = 0.06;
const WANDER_SWAY_MIN: f64 = 0.8;
const WANDER_SWAY_MAX: f64 = 1.4;

/// Parsed non-player target token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetToken {
    pub chunk_x: i32,
    pub chunk_z: i32,
    pub kind: EntityKind,
    pub index: usize,
}

/// Parse a `chunkX:chunkZ:entityType:index` token.
///
/// Returns `None` for malformed tokens, unknown entity types, and
/// negative indices. Player ids never parse (they carry no colons in
/// this shape).
pub fn parse_target_token(token: &str) -> Option<TargetToken> {
    let mut parts = token.split(':');
    let chunk_x = parts.next()?.parse::<i32>().ok()?;
    let chunk_z = parts.next()?.parse::<i32>().ok()?;
    let kind = EntityKind::from_wire(parts.next()?)?;
    let index = parts.next()?.parse::<usize>().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(TargetToken {
        chunk_x,
        chunk_z,
        kind,
        index,
    })
}

/// True when the token names an attackable generated entity.
pub fn is_combatant_token(token: &str) -> bool {
    parse_target_token(token).is_some_and(|parsed| parsed.kind.is_combatant())
}

/// Resolve a non-player token to world coordinates at the given tick.
///
/// Combatant entities get a time-varying wander offset superimposed on
/// their generated cell position; resolution fails when the index is out
/// of bounds or the entity at that index has a different type.
pub fn resolve_target_position(
    token: &str,
    world_seed: &str,
    tick: i64,
    tick_rate_hz: f64,
) -> Option<(f64, f64)> {
    let parsed = parse_target_token(token)?;
    if !parsed.kind.is_combatant() {
        return None;
    }

    let entities = generate_chunk_entities(parsed.chunk_x, parsed.chunk_z, world_seed);
    let entity = entities.get(parsed.index)?;
    if entity.kind != parsed.kind {
        return None;
    }

    let mut world_x = (f64::from(parsed.chunk_x) * CHUNK_SIZE) + entity.x;
    let mut world_z = (f64::from(parsed.chunk_z) * CHUNK_SIZE) + entity.z;
    let (offset_x, offset_z) = wander_offset(token, tick, tick_rate_hz);
    world_x += offset_x;
    world_z += offset_z;
    Some((world_x, world_z))
}

/// Deterministic wander offset for a combatant entity at a tick.
///
/// Radius, angular speed, sway, and phases are all seeded from FNV
/// hashes of the token, so every observer computes the same offset.
pub fn wander_offset(token: &str, tick: i64, tick_rate_hz: f64) -> (f64, f64) {
    let rate = if tick_rate_hz > 0.0 { tick_rate_hz } else { 20.0 };
    let unit_a = f64::from(fnv1a_32(&format!("{token}:a")) % 1000) / 1000.0;
    let unit_b = f64::from(fnv1a_32(&format!("{token}:b")) % 1000) / 1000.0;
    let unit_c = f64::from(fnv1a_32(&format!("{token}:c")) % 1000) / 1000.0;

    let radius = WANDER_RADIUS_MIN + (unit_a * (WANDER_RADIUS_MAX - WANDER_RADIUS_MIN));
    let speed_cycles = WANDER_SPEED_MIN + (unit_b * (WANDER_SPEED_MAX - WANDER_SPEED_MIN));
    let sway = WANDER_SWAY_MIN + (unit_c * (WANDER_SWAY_MAX - WANDER_SWAY_MIN));
    let phase_a = unit_a * PI * 2.0;
    let phase_b = unit_c * PI * 2.0;

    let seconds = tick as f64 / rate;
    let angle = seconds * speed_cycles * PI * 2.0;
    (
        (angle + phase_a).cos() * radius,
        (angle * sway + phase_b).sin() * radius * 0.7,
    )
}

/// Scan chunks near the origin for the first resolvable combatant token.
///
/// Test helper shared with the server integration suite.
pub fn find_combatant_token(world_seed: &str, tick: i64, tick_rate_hz: f64) -> Option<(String, f64, f64)> {
    for chunk_x in -2..=2 {
        for chunk_z in -2..=2 {
            let entities = generate_chunk_entities(chunk_x, chunk_z, world_seed);
            for (index, entity) in entities.iter().enumerate() {
                if !entity.kind.is_combatant() {
                    continue;
                }
                let token = format!("{chunk_x}:{chunk_z}:{}:{index}", entity.kind.as_wire());
                if let Some((world_x, world_z)) =
                    resolve_target_position(&token, world_seed, tick, tick_rate_hz)
                {
                    return Some((token, world_x, world_z));
                }
            }
        }
    }
    None
}
