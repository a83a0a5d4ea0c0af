use glam::Vec2;

use crate::ecs::components::CraftKind;
use crate::phase::Phase;

/// Per-craft read model used by decisions and collision queries.
/// Stored alongside the spatial hash to avoid ECS lookups in hot paths.
#[derive(Debug, Clone, Copy)]
pub struct CraftSnapshot {
    pub entity: hecs::Entity,
    pub kind: CraftKind,
    pub pos: Vec2,
    pub vel: Vec2,
    pub angle: f32,
    pub health: f32,
    pub max_health: f32,
    pub phase: Phase,
    pub shielded: bool,
    pub is_alpha: bool,
    /// Has a squad or assigned target (allies only).
    pub engaged: bool,
    pub healing_cooldown: u32,
    pub enemy_firing_range: f32,
    pub radius: f32,
    pub size: f32,
}

impl CraftSnapshot {
    pub fn health_ratio(&self) -> f32 {
        if self.max_health <= 0.0 {
            return 0.0;
        }
        (self.health / self.max_health).clamp(0.0, 1.0)
    }
}

/// Snapshot vectors, index-aligned with the arena's craft collections.
#[derive(Debug, Default)]
pub struct Snapshots {
    pub allies: Vec<CraftSnapshot>,
    pub hostiles: Vec<CraftSnapshot>,
}

impl Snapshots {
    pub fn ally(&self, e: hecs::Entity) -> Option<&CraftSnapshot> {
        self.allies.iter().find(|s| s.entity == e)
    }

    pub fn hostile(&self, e: hecs::Entity) -> Option<&CraftSnapshot> {
        self.hostiles.iter().find(|s| s.entity == e)
    }
}

/// Cell size for collision broad phase. Larger than any radius pair.
pub const GRID_CELL: f32 = 128.0;
const GRID_TABLE: usize = 1024;

/// One grid per collidable collection, holding indices into it.
pub struct CraftGrids {
    pub allied: SpatialHash,
    pub hostile: SpatialHash,
    pub obstacles: SpatialHash,
}

impl CraftGrids {
    pub fn new() -> Self {
        Self {
            allied: SpatialHash::new(GRID_CELL, GRID_TABLE),
            hostile: SpatialHash::new(GRID_CELL, GRID_TABLE),
            obstacles: SpatialHash::new(GRID_CELL, GRID_TABLE),
        }
    }
}

impl Default for CraftGrids {
    fn default() -> Self {
        Self::new()
    }
}

/// Spatial hash grid for O(1) neighbor queries.
///
/// Cell size should be at least the largest query radius.
/// Uses a multiplicative hash, so distinct cells can share a bucket:
/// callers filter by distance and dedupe.
pub struct SpatialHash {
    cell_size: f32,
    inv_cell_size: f32,
    table_size: usize,
    /// Each bucket holds collection indices. Pre-allocated, cleared each rebuild.
    buckets: Vec<Vec<u32>>,
}

impl SpatialHash {
    pub fn new(cell_size: f32, table_size: usize) -> Self {
        let mut buckets = Vec::with_capacity(table_size);
        for _ in 0..table_size {
            buckets.push(Vec::with_capacity(8));
        }
        Self {
            cell_size,
            inv_cell_size: 1.0 / cell_size,
            table_size,
            buckets,
        }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            bucket.clear(); // keeps allocation
        }
    }

    pub fn insert(&mut self, pos: Vec2, index: u32) {
        let hash = self.hash(pos);
        self.buckets[hash].push(index);
    }

    /// Visit every index in the cell containing `pos` and the 8 around it.
    pub fn query_neighbors(&self, pos: Vec2, mut callback: impl FnMut(u32)) {
        let (cx, cy) = self.cell_coords(pos);
        for dy in -1i32..=1 {
            for dx in -1i32..=1 {
                let hash = self.hash_cell(cx.wrapping_add(dx), cy.wrapping_add(dy));
                for &index in &self.buckets[hash] {
                    callback(index);
                }
            }
        }
    }

    /// Neighbor indices into `out`, sorted and without duplicates.
    pub fn candidates(&self, pos: Vec2, out: &mut Vec<u32>) {
        out.clear();
        self.query_neighbors(pos, |i| out.push(i));
        out.sort_unstable();
        out.dedup();
    }

    fn cell_coords(&self, pos: Vec2) -> (i32, i32) {
        let cx = (pos.x * self.inv_cell_size).floor() as i32;
        let cy = (pos.y * self.inv_cell_size).floor() as i32;
        (cx, cy)
    }

    fn hash(&self, pos: Vec2) -> usize {
        let (cx, cy) = self.cell_coords(pos);
        self.hash_cell(cx, cy)
    }

    fn hash_cell(&self, cx: i32, cy: i32) -> usize {
        let h = (cx as u32).wrapping_mul(73856093) ^ (cy as u32).wrapping_mul(19349663);
        (h as usize) % self.table_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_query() {
        let mut grid = SpatialHash::new(GRID_CELL, 256);
        grid.insert(Vec2::new(100.0, 100.0), 0);
        grid.insert(Vec2::new(180.0, 150.0), 1);
        grid.insert(Vec2::new(900.0, 500.0), 2);

        let mut found = Vec::new();
        grid.candidates(Vec2::new(105.0, 102.0), &mut found);
        assert!(found.contains(&0));
        assert!(found.contains(&1));
    }

    #[test]
    fn candidates_are_deduplicated() {
        // A one-bucket table maps every cell to the same bucket.
        let mut grid = SpatialHash::new(64.0, 1);
        grid.insert(Vec2::new(10.0, 10.0), 7);
        let mut found = Vec::new();
        grid.candidates(Vec2::new(10.0, 10.0), &mut found);
        assert_eq!(found, vec![7]);
    }

    #[test]
    fn clear_and_reuse() {
        let mut grid = SpatialHash::new(64.0, 256);
        grid.insert(Vec2::new(50.0, 50.0), 42);
        grid.clear();

        let mut found = Vec::new();
        grid.query_neighbors(Vec2::new(50.0, 50.0), |idx| found.push(idx));
        assert!(found.is_empty());
    }
}
