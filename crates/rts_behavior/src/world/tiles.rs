//! Tile occupancy for footprint placement.

use crate::math::Vec3;

/// Width and height of an object's footprint, in tiles.
pub type Footprint = (u32, u32);

/// Occupancy bitmap over the map's tiles.
#[derive(Debug, Clone)]
pub struct TileMap {
    width: u32,
    height: u32,
    tile_size: f32,
    occupied: Vec<bool>,
}

impl TileMap {
    /// Create a map with every tile free.
    #[must_use]
    pub fn new(width: u32, height: u32, tile_size: f32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            tile_size: if tile_size > 0.0 { tile_size } else { 1.0 },
            occupied: vec![false; (width as usize) * (height as usize)],
        }
    }

    /// Map size in tiles.
    #[must_use]
    pub const fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Edge length of one tile.
    #[must_use]
    pub const fn tile_size(&self) -> f32 {
        self.tile_size
    }

    /// Map extent in world units.
    #[must_use]
    pub fn extent(&self) -> (f32, f32) {
        (
            self.width as f32 * self.tile_size,
            self.height as f32 * self.tile_size,
        )
    }

    /// Clamp a point into the map.
    #[must_use]
    pub fn clamp(&self, pos: Vec3) -> Vec3 {
        let (w, h) = self.extent();
        Vec3::new(pos.x.clamp(0.0, w), pos.y, pos.z.clamp(0.0, h))
    }

    fn index(&self, x: u32, z: u32) -> usize {
        (z as usize) * (self.width as usize) + (x as usize)
    }

    /// Corner tile of a footprint centred on `pos`.
    fn footprint_origin(&self, pos: Vec3, footprint: Footprint) -> (i64, i64) {
        let cx = (pos.x / self.tile_size).floor() as i64;
        let cz = (pos.z / self.tile_size).floor() as i64;
        (cx - i64::from(footprint.0 / 2), cz - i64::from(footprint.1 / 2))
    }

    fn fits(&self, x: i64, z: i64, footprint: Footprint) -> bool {
        if x < 0
            || z < 0
            || x + i64::from(footprint.0) > i64::from(self.width)
            || z + i64::from(footprint.1) > i64::from(self.height)
        {
            return false;
        }
        for dz in 0..footprint.1 {
            for dx in 0..footprint.0 {
                if self.occupied[self.index(x as u32 + dx, z as u32 + dz)] {
                    return false;
                }
            }
        }
        true
    }

    fn centre_of(&self, x: i64, z: i64, footprint: Footprint) -> Vec3 {
        Vec3::new(
            (x as f32 + footprint.0 as f32 / 2.0) * self.tile_size,
            0.0,
            (z as f32 + footprint.1 as f32 / 2.0) * self.tile_size,
        )
    }

    /// Mark (or clear) the tiles covered by a footprint centred on `pos`.
    pub fn set_occupied(&mut self, pos: Vec3, footprint: Footprint, occupied: bool) {
        let (ox, oz) = self.footprint_origin(pos, footprint);
        for dz in 0..i64::from(footprint.1) {
            for dx in 0..i64::from(footprint.0) {
                let (x, z) = (ox + dx, oz + dz);
                if x >= 0 && z >= 0 && x < i64::from(self.width) && z < i64::from(self.height) {
                    let i = self.index(x as u32, z as u32);
                    self.occupied[i] = occupied;
                }
            }
        }
    }

    /// Whether the tile containing `pos` is occupied.
    #[must_use]
    pub fn is_occupied(&self, pos: Vec3) -> bool {
        let x = (pos.x / self.tile_size).floor() as i64;
        let z = (pos.z / self.tile_size).floor() as i64;
        if x < 0 || z < 0 || x >= i64::from(self.width) || z >= i64::from(self.height) {
            return true;
        }
        self.occupied[self.index(x as u32, z as u32)]
    }

    /// Centre of the free placement nearest to `pos`, searching outward
    /// one ring of tiles at a time.
    #[must_use]
    pub fn nearest_free(&self, pos: Vec3, footprint: Footprint) -> Option<Vec3> {
        let footprint = (footprint.0.max(1), footprint.1.max(1));
        let (ox, oz) = self.footprint_origin(pos, footprint);
        let max_ring = i64::from(self.width.max(self.height));
        for ring in 0..=max_ring {
            let mut best: Option<(f32, Vec3)> = None;
            for dz in -ring..=ring {
                for dx in -ring..=ring {
                    if dx.abs() != ring && dz.abs() != ring {
                        continue;
                    }
                    let (x, z) = (ox + dx, oz + dz);
                    if !self.fits(x, z, footprint) {
                        continue;
                    }
                    let centre = self.centre_of(x, z, footprint);
                    let dist = centre.distance_xz(pos);
                    if best.map_or(true, |(d, _)| dist < d) {
                        best = Some((dist, centre));
                    }
                }
            }
            if let Some((_, centre)) = best {
                return Some(Vec3::new(centre.x, pos.y, centre.z));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_position_is_unchanged_tile() {
        let map = TileMap::new(10, 10, 1.0);
        let found = map.nearest_free(Vec3::new(4.5, 0.0, 4.5), (1, 1)).unwrap();
        assert_eq!(found, Vec3::new(4.5, 0.0, 4.5));
    }

    #[test]
    fn test_occupied_tile_moves_outward() {
        let mut map = TileMap::new(10, 10, 1.0);
        map.set_occupied(Vec3::new(4.5, 0.0, 4.5), (1, 1), true);
        let found = map.nearest_free(Vec3::new(4.5, 0.0, 4.5), (1, 1)).unwrap();
        assert_ne!(found, Vec3::new(4.5, 0.0, 4.5));
        assert!((found.distance_xz(Vec3::new(4.5, 0.0, 4.5)) - 1.0).abs() < 1e-5);
        assert!(!map.is_occupied(found));
    }

    #[test]
    fn test_full_map_has_no_placement() {
        let mut map = TileMap::new(2, 2, 1.0);
        map.set_occupied(Vec3::new(1.0, 0.0, 1.0), (2, 2), true);
        assert!(map.nearest_free(Vec3::new(1.0, 0.0, 1.0), (1, 1)).is_none());
    }

    #[test]
    fn test_clamp() {
        let map = TileMap::new(4, 4, 2.0);
        assert_eq!(map.clamp(Vec3::new(-1.0, 3.0, 20.0)), Vec3::new(0.0, 3.0, 8.0));
    }
}
