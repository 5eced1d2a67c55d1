//! Uniform grid spatial hash on the ground plane.
//!
//! Radius queries only visit the cells overlapping the query circle, so
//! their cost scales with local density rather than with world size.

use std::collections::HashMap;

use crate::ids::ObjectId;
use crate::math::Vec3;

type Cell = (i32, i32);

/// Spatial index of object positions.
#[derive(Debug, Clone)]
pub struct SpatialGrid {
    cell_size: f32,
    cells: HashMap<Cell, Vec<ObjectId>>,
}

impl SpatialGrid {
    /// Create an empty grid.
    #[must_use]
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size: if cell_size > 0.0 { cell_size } else { 1.0 },
            cells: HashMap::new(),
        }
    }

    fn cell_of(&self, pos: Vec3) -> Cell {
        (
            (pos.x / self.cell_size).floor() as i32,
            (pos.z / self.cell_size).floor() as i32,
        )
    }

    /// Index an object at a position.
    pub fn insert(&mut self, id: ObjectId, pos: Vec3) {
        let cell = self.cell_of(pos);
        self.cells.entry(cell).or_default().push(id);
    }

    /// Drop an object indexed at `pos`.
    pub fn remove(&mut self, id: ObjectId, pos: Vec3) {
        let cell = self.cell_of(pos);
        if let Some(bucket) = self.cells.get_mut(&cell) {
            if let Some(i) = bucket.iter().position(|o| *o == id) {
                bucket.swap_remove(i);
            }
            if bucket.is_empty() {
                self.cells.remove(&cell);
            }
        }
    }

    /// Move an object between cells if needed.
    pub fn update(&mut self, id: ObjectId, old: Vec3, new: Vec3) {
        if self.cell_of(old) != self.cell_of(new) {
            self.remove(id, old);
            self.insert(id, new);
        }
    }

    /// Objects whose cell overlaps the circle. Unsorted and unfiltered:
    /// callers check the exact distance.
    #[must_use]
    pub fn candidates(&self, center: Vec3, radius: f32) -> Vec<ObjectId> {
        let radius = radius.max(0.0);
        let (min_x, min_z) = self.cell_of(Vec3::new(center.x - radius, 0.0, center.z - radius));
        let (max_x, max_z) = self.cell_of(Vec3::new(center.x + radius, 0.0, center.z + radius));
        let mut out = Vec::new();
        for cx in min_x..=max_x {
            for cz in min_z..=max_z {
                if let Some(bucket) = self.cells.get(&(cx, cz)) {
                    out.extend_from_slice(bucket);
                }
            }
        }
        out
    }

    /// Number of indexed objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.values().map(Vec::len).sum()
    }

    /// Whether nothing is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates_cover_neighbouring_cells() {
        let mut grid = SpatialGrid::new(10.0);
        grid.insert(ObjectId(1), Vec3::new(1.0, 0.0, 1.0));
        grid.insert(ObjectId(2), Vec3::new(12.0, 0.0, 1.0));
        grid.insert(ObjectId(3), Vec3::new(95.0, 0.0, 95.0));
        let mut found = grid.candidates(Vec3::new(9.0, 0.0, 1.0), 4.0);
        found.sort();
        assert_eq!(found, vec![ObjectId(1), ObjectId(2)]);
    }

    #[test]
    fn test_update_moves_between_cells() {
        let mut grid = SpatialGrid::new(10.0);
        let old = Vec3::new(1.0, 0.0, 1.0);
        let new = Vec3::new(55.0, 0.0, 55.0);
        grid.insert(ObjectId(7), old);
        grid.update(ObjectId(7), old, new);
        assert!(grid.candidates(old, 1.0).is_empty());
        assert_eq!(grid.candidates(new, 1.0), vec![ObjectId(7)]);
        assert_eq!(grid.len(), 1);
    }

    #[test]
    fn test_negative_coordinates() {
        let mut grid = SpatialGrid::new(10.0);
        grid.insert(ObjectId(4), Vec3::new(-3.0, 0.0, -3.0));
        assert_eq!(grid.candidates(Vec3::new(-1.0, 0.0, -1.0), 0.5), vec![ObjectId(4)]);
        grid.remove(ObjectId(4), Vec3::new(-3.0, 0.0, -3.0));
        assert!(grid.is_empty());
    }
}
