//! Block override store: placed and removed cells plus break loot.

use std::collections::{BTreeMap, HashMap, HashSet};

use openclaw_protocol::{BlockAction, BlockActionRequest, BlockDelta};
use serde_json::json;

use crate::hub::WorldHub;

/// Key of one block cell: chunk coordinates plus chunk-local cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockKey {
    pub chunk_x: i64,
    pub chunk_z: i64,
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

impl BlockKey {
    pub fn new(chunk_x: i64, chunk_z: i64, x: i64, y: i64, z: i64) -> Self {
        Self {
            chunk_x,
            chunk_z,
            x,
            y,
            z,
        }
    }

    /// True when every local axis lies in the valid `0..=64` range.
    pub fn in_bounds(&self) -> bool {
        (0..=64).contains(&self.x) && (0..=64).contains(&self.y) && (0..=64).contains(&self.z)
    }
}

/// Placed/removed overrides. A key is never in both sets.
#[derive(Debug, Default, Clone)]
pub struct BlockStore {
    pub(crate) placed: HashMap<BlockKey, String>,
    pub(crate) removed: HashSet<BlockKey>,
}

impl BlockStore {
    pub(crate) fn place(&mut self, key: BlockKey, block_type: String) {
        self.removed.remove(&key);
        self.placed.insert(key, block_type);
    }

    pub(crate) fn remove(&mut self, key: BlockKey) {
        self.placed.remove(&key);
        self.removed.insert(key);
    }

    pub(crate) fn len(&self) -> usize {
        self.placed.len() + self.removed.len()
    }

    /// Every override as a delta, in the stable total order: key fields,
    /// then place before break, then block type.
    pub(crate) fn list_deltas(&self) -> Vec<BlockDelta> {
        let mut deltas: Vec<BlockDelta> = self
            .placed
            .iter()
            .map(|(key, block_type)| BlockDelta {
                action: BlockAction::Place,
                chunk_x: key.chunk_x,
                chunk_z: key.chunk_z,
                x: key.x,
                y: key.y,
                z: key.z,
                block_type: block_type.clone(),
            })
            .chain(self.removed.iter().map(|key| BlockDelta {
                action: BlockAction::Break,
                chunk_x: key.chunk_x,
                chunk_z: key.chunk_z,
                x: key.x,
                y: key.y,
                z: key.z,
                block_type: String::new(),
            }))
            .collect();
        deltas.sort_by(|left, right| {
            (left.chunk_x, left.chunk_z, left.x, left.y, left.z, left.action, &left.block_type)
                .cmp(&(
                    right.chunk_x,
                    right.chunk_z,
                    right.x,
                    right.y,
                    right.z,
                    right.action,
                    &right.block_type,
                ))
        });
        deltas
    }
}

impl WorldHub {
    /// Apply a break/place request. Out-of-range coordinates are
    /// silently rejected; no delta is produced.
    pub fn apply_block_action(&mut self, request: &BlockActionRequest) -> Option<BlockDelta> {
        let key = BlockKey::new(request.chunk_x, request.chunk_z, request.x, request.y, request.z);
        if !key.in_bounds() {
            return None;
        }

        match request.action {
            BlockAction::Break => {
                self.blocks.remove(key);
                let tick = self.tick;
                self.events.record(
                    tick,
                    "block_broken",
                    &request.player_id,
                    json!({
                        "chunkX": key.chunk_x,
                        "chunkZ": key.chunk_z,
                        "x": key.x,
                        "y": key.y,
                        "z": key.z,
                    }),
                );
                Some(BlockDelta {
                    action: BlockAction::Break,
                    chunk_x: key.chunk_x,
                    chunk_z: key.chunk_z,
                    x: key.x,
                    y: key.y,
                    z: key.z,
                    block_type: String::new(),
                })
            }
            BlockAction::Place => {
                let block_type = if request.block_type.is_empty() {
                    "dirt".to_string()
                } else {
                    request.block_type.clone()
                };
                self.blocks.place(key, block_type.clone());
                let tick = self.tick;
                self.events.record(
                    tick,
                    "block_placed",
                    &request.player_id,
                    json!({
                        "chunkX": key.chunk_x,
                        "chunkZ": key.chunk_z,
                        "x": key.x,
                        "y": key.y,
                        "z": key.z,
                        "blockType": block_type,
                    }),
                );
                Some(BlockDelta {
                    action: BlockAction::Place,
                    chunk_x: key.chunk_x,
                    chunk_z: key.chunk_z,
                    x: key.x,
                    y: key.y,
                    z: key.z,
                    block_type,
                })
            }
        }
    }

    /// Deterministically ordered list of every block override.
    pub fn list_block_deltas(&self) -> Vec<BlockDelta> {
        self.blocks.list_deltas()
    }
}

/// Resources granted for breaking a block.
///
/// Every break yields one salvage; the extra grant is a deterministic
/// roll over the block key so repeated breaks of the same cell always
/// pay out the same bundle.
pub fn break_resource_grants(request: &BlockActionRequest) -> BTreeMap<String, i64> {
    let mut grants = BTreeMap::new();
    grants.insert("salvage".to_string(), 1);
    let roll = break_resource_roll(request);
    let extra = match roll {
        0..=29 => "wood",
        30..=54 => "stone",
        55..=74 => "fiber",
        75..=89 => "coal",
        90..=97 => "iron_ore",
        _ => "salvage",
    };
    *grants.entry(extra.to_string()).or_insert(0) += 1;
    grants
}

fn break_resource_roll(request: &BlockActionRequest) -> i64 {
    let value = request.chunk_x.wrapping_mul(73856093)
        ^ request.chunk_z.wrapping_mul(19349663)
        ^ request.x.wrapping_mul(83492791)
        ^ request.y.wrapping_mul(1237)
        ^ request.z.wrapping_mul(29791);
    (value.unsigned_abs() % 100) as i64
}
