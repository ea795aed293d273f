//! Uniform-cell 3D spatial hash for neuron neighborhood queries
//!
//! Cell edge is twice the configured competition radius, so a radius
//! query at the default radius touches at most a 2x2x2 block of cells.
//! Not thread-safe by contract; the world rebuilds the index once per
//! tick when topology has changed. Cleared buckets keep their allocation
//! so steady-state ticks do not allocate.

use std::collections::HashMap;

use crate::ids::{NeuronId, Vec3};

type CellKey = (i64, i64, i64);

/// Uniform-cell spatial hash over neuron positions.
#[derive(Debug)]
pub struct SpatialIndex {
    cell_edge: f32,
    cells: HashMap<CellKey, Vec<(NeuronId, Vec3)>>,
}

impl SpatialIndex {
    /// Create an index with the given cell edge length.
    pub fn new(cell_edge: f32) -> Self {
        debug_assert!(cell_edge > 0.0);
        Self {
            cell_edge,
            cells: HashMap::new(),
        }
    }

    /// Remove all entries, keeping bucket allocations.
    pub fn clear(&mut self) {
        for bucket in self.cells.values_mut() {
            bucket.clear();
        }
    }

    /// Insert a neuron at its position.
    pub fn insert(&mut self, id: NeuronId, position: Vec3) {
        let key = self.cell_of(&position);
        self.cells.entry(key).or_default().push((id, position));
    }

    /// All neurons within `radius` of `center`, excluding `exclude`,
    /// each emitted at most once, sorted by id.
    pub fn find_neighbors(
        &self,
        center: &Vec3,
        radius: f32,
        exclude: Option<NeuronId>,
    ) -> Vec<(NeuronId, Vec3)> {
        let mut found = Vec::new();
        if radius < 0.0 {
            return found;
        }
        let radius_sq = radius * radius;

        let lo = self.cell_of(&Vec3::new(
            center.x - radius,
            center.y - radius,
            center.z - radius,
        ));
        let hi = self.cell_of(&Vec3::new(
            center.x + radius,
            center.y + radius,
            center.z + radius,
        ));

        for cx in lo.0..=hi.0 {
            for cy in lo.1..=hi.1 {
                for cz in lo.2..=hi.2 {
                    let Some(bucket) = self.cells.get(&(cx, cy, cz)) else {
                        continue;
                    };
                    for &(id, pos) in bucket {
                        if Some(id) == exclude {
                            continue;
                        }
                        if pos.distance_squared(center) <= radius_sq {
                            found.push((id, pos));
                        }
                    }
                }
            }
        }

        found.sort_by_key(|(id, _)| *id);
        found.dedup_by_key(|(id, _)| *id);
        found
    }

    fn cell_of(&self, position: &Vec3) -> CellKey {
        (
            (position.x / self.cell_edge).floor() as i64,
            (position.y / self.cell_edge).floor() as i64,
            (position.z / self.cell_edge).floor() as i64,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_with(points: &[(u64, f32, f32, f32)]) -> SpatialIndex {
        let mut index = SpatialIndex::new(10.0);
        for &(id, x, y, z) in points {
            index.insert(NeuronId::new(id), Vec3::new(x, y, z));
        }
        index
    }

    #[test]
    fn test_radius_query() {
        let index = index_with(&[
            (1, 0.0, 0.0, 0.0),
            (2, 3.0, 0.0, 0.0),
            (3, 11.0, 0.0, 0.0),
        ]);
        let found = index.find_neighbors(&Vec3::ZERO, 5.0, None);
        let ids: Vec<u64> = found.iter().map(|(id, _)| id.raw()).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_exclude_center_neuron() {
        let index = index_with(&[(1, 0.0, 0.0, 0.0), (2, 1.0, 0.0, 0.0)]);
        let found = index.find_neighbors(&Vec3::ZERO, 5.0, Some(NeuronId::new(1)));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, NeuronId::new(2));
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let index = index_with(&[(1, 5.0, 0.0, 0.0)]);
        assert_eq!(index.find_neighbors(&Vec3::ZERO, 5.0, None).len(), 1);
        assert_eq!(index.find_neighbors(&Vec3::ZERO, 4.999, None).len(), 0);
    }

    #[test]
    fn test_query_spanning_cells() {
        // Straddles the cell boundary at x = 10
        let index = index_with(&[(1, 9.5, 0.0, 0.0), (2, 10.5, 0.0, 0.0)]);
        let found = index.find_neighbors(&Vec3::new(10.0, 0.0, 0.0), 1.0, None);
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_negative_coordinates() {
        let index = index_with(&[(1, -9.5, -0.5, 0.0), (2, -10.5, -0.5, 0.0)]);
        let found = index.find_neighbors(&Vec3::new(-10.0, -0.5, 0.0), 1.0, None);
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_clear_keeps_working() {
        let mut index = index_with(&[(1, 0.0, 0.0, 0.0)]);
        index.clear();
        assert!(index.find_neighbors(&Vec3::ZERO, 100.0, None).is_empty());
        index.insert(NeuronId::new(2), Vec3::ZERO);
        assert_eq!(index.find_neighbors(&Vec3::ZERO, 1.0, None).len(), 1);
    }

    #[test]
    fn test_results_sorted_by_id() {
        let index = index_with(&[(9, 1.0, 0.0, 0.0), (2, 2.0, 0.0, 0.0), (5, 0.5, 0.0, 0.0)]);
        let found = index.find_neighbors(&Vec3::ZERO, 5.0, None);
        let ids: Vec<u64> = found.iter().map(|(id, _)| id.raw()).collect();
        assert_eq!(ids, vec![2, 5, 9]);
    }
}
