//! Terrain sampling: layered noise plus the carved path mask.

use crate::noise::{fbm_noise, ridge_noise, smooth_step};
use crate::rng::fnv1a_32;

/// One sampled terrain cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TerrainSample {
    /// Continuous height before flooring.
    pub height: f64,
    /// Height clamped to `[1, max_height]`.
    pub height_index: i64,
    /// Moisture field in `[0, 1]`; > 0.78 reads as water.
    pub moisture: f64,
    /// Ridge layer contribution.
    pub ridge: f64,
    /// True when the path mask dominates this cell.
    pub path: bool,
    /// Raw path mask in `[0, 1]`.
    pub path_mask: f64,
}

/// Sample the terrain fields at a global cell coordinate.
pub fn sample_terrain(cell_x: i64, cell_z: i64, world_seed: &str, max_height: i64) -> TerrainSample {
    let seed = fnv1a_32(world_seed);
    let base = fbm_noise(cell_x as f64 * 0.06, cell_z as f64 * 0.06, seed, 4, 0.5, 2.0);
    let ridge = ridge_noise(cell_x as f64 * 0.11, cell_z as f64 * 0.11, seed);
    let slope = fbm_noise(
        cell_x as f64 * 0.02 - 11.0,
        cell_z as f64 * 0.02 + 7.0,
        seed,
        2,
        0.55,
        2.0,
    );
    let path_mask = resolve_path_mask(cell_x, cell_z);

    let mut height = 2.0 + ((base * 0.62) + (ridge * 0.22) + (slope * 0.16)) * max_height as f64;
    height -= path_mask * 1.25;
    if height < 1.0 {
        height = 1.0;
    }

    let moisture = fbm_noise(
        cell_x as f64 * 0.08 + 17.0,
        cell_z as f64 * 0.05 - 9.0,
        seed,
        3,
        0.5,
        2.0,
    );
    let height_index = (height.floor() as i64).clamp(1, max_height);

    TerrainSample {
        height,
        height_index,
        moisture,
        ridge,
        path: path_mask > 0.45,
        path_mask,
    }
}

/// Path mask: a gently bending north-south lane plus periodic cross roads.
pub fn resolve_path_mask(cell_x: i64, cell_z: i64) -> f64 {
    let bend = ((cell_z as f64 + 18.0) * 0.09).sin() * 2.4;
    let lane_center = 8.0 + bend;
    let lane_offset = (mod_float(cell_x as f64, 16.0) - lane_center).abs();
    let lane_mask = smooth_falloff(lane_offset, 0.4, 2.2);

    let cross_offset = (mod_float(cell_z as f64, 29.0) - 12.0).abs();
    let cross_mask = smooth_falloff(cross_offset, 0.45, 2.1);

    lane_mask.max(cross_mask)
}

fn smooth_falloff(distance: f64, inner: f64, outer: f64) -> f64 {
    if distance <= inner {
        return 1.0;
    }
    if distance >= outer {
        return 0.0;
    }
    let t = (distance - inner) / (outer - inner);
    1.0 - smooth_step(t)
}

fn mod_float(value: f64, modulus: f64) -> f64 {
    let result = value % modulus;
    if result < 0.0 {
        result + modulus
    } else {
        result
    }
}
