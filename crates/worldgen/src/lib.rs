//! Deterministic world generation for the authoritative world server.
//!
//! Target tokens reference entities by index inside a chunk's generated
//! entity list, so the hash functions, PRNG sequence, and traversal order
//! in this crate are part of the wire contract. Every client and server
//! that resolves a token must reproduce the exact same entity list for a
//! given (seed, chunk) pair.

pub mod chunk;
pub mod noise;
pub mod rng;
pub mod target;
pub mod terrain;

pub use chunk::{generate_chunk_entities, ChunkEntity, EntityKind};
pub use rng::{fnv1a_32, hash_chunk_seed, Mulberry32};
pub use target::{
    find_combatant_token, is_combatant_token, parse_target_token, resolve_target_position,
    wander_offset, TargetToken,
};
pub use terrain::{sample_terrain, TerrainSample};

/// Side length of one chunk in world units.
pub const CHUNK_SIZE: f64 = 64.0;

/// Cells per chunk axis; each cell spans `CHUNK_SIZE / CHUNK_GRID_CELLS` units.
pub const CHUNK_GRID_CELLS: i64 = 16;

/// Upper bound for terrain height indices.
pub const TERRAIN_MAX_HEIGHT: i64 = 8;
