//! Bounded 2D arena. Each cell is a `u16`: empty, barrier, or the index of
//! the agent standing there.

use crate::geometry::Coord;
use crate::rng;
use serde::{Deserialize, Serialize};

/// Cell value for an unoccupied cell. Agent index 0 is reserved so this
/// doubles as "no agent".
pub const EMPTY: u16 = 0;

/// Cell value for an impassable barrier cell.
pub const BARRIER: u16 = 0xffff;

/// The simulation arena: a `W x H` map of `u16` cells plus bookkeeping for
/// barrier cells. Every live agent's location satisfies
/// `grid.at(agent.loc) == agent.index`, and `barrier_locations` lists exactly
/// the cells holding [`BARRIER`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Grid {
    size_x: u16,
    size_y: u16,
    /// Column-major cell data: `data[x * size_y + y]`.
    data: Vec<u16>,
    barrier_locations: Vec<Coord>,
    barrier_centers: Vec<Coord>,
}

impl Grid {
    /// Allocate an empty grid of the given dimensions.
    pub fn new(size_x: u16, size_y: u16) -> Grid {
        Grid {
            size_x,
            size_y,
            data: vec![EMPTY; size_x as usize * size_y as usize],
            barrier_locations: Vec::new(),
            barrier_centers: Vec::new(),
        }
    }

    /// Clear every cell to [`EMPTY`] and forget recorded barriers.
    pub fn zero_fill(&mut self) {
        self.data.fill(EMPTY);
        self.barrier_locations.clear();
        self.barrier_centers.clear();
    }

    #[inline]
    pub fn size_x(&self) -> u16 {
        self.size_x
    }

    #[inline]
    pub fn size_y(&self) -> u16 {
        self.size_y
    }

    #[inline]
    fn offset(&self, loc: Coord) -> usize {
        loc.x as usize * self.size_y as usize + loc.y as usize
    }

    #[inline]
    pub fn in_bounds(&self, loc: Coord) -> bool {
        loc.x >= 0 && (loc.x as u16) < self.size_x && loc.y >= 0 && (loc.y as u16) < self.size_y
    }

    #[inline]
    pub fn at(&self, loc: Coord) -> u16 {
        self.data[self.offset(loc)]
    }

    #[inline]
    pub fn at_xy(&self, x: u16, y: u16) -> u16 {
        self.data[x as usize * self.size_y as usize + y as usize]
    }

    #[inline]
    pub fn set(&mut self, loc: Coord, val: u16) {
        let offset = self.offset(loc);
        self.data[offset] = val;
    }

    #[inline]
    pub fn set_xy(&mut self, x: u16, y: u16, val: u16) {
        self.data[x as usize * self.size_y as usize + y as usize] = val;
    }

    #[inline]
    pub fn is_empty_at(&self, loc: Coord) -> bool {
        self.at(loc) == EMPTY
    }

    #[inline]
    pub fn is_barrier_at(&self, loc: Coord) -> bool {
        self.at(loc) == BARRIER
    }

    /// Occupied means neither empty nor barrier: an agent index.
    #[inline]
    pub fn is_occupied_at(&self, loc: Coord) -> bool {
        let v = self.at(loc);
        v != EMPTY && v != BARRIER
    }

    /// True on any of the four edges.
    #[inline]
    pub fn is_border(&self, loc: Coord) -> bool {
        loc.x == 0
            || loc.x == self.size_x as i16 - 1
            || loc.y == 0
            || loc.y == self.size_y as i16 - 1
    }

    /// Find an unoccupied cell by rejection sampling. The caller guarantees
    /// the grid is not full (config validation caps the population at a
    /// quarter of the cells).
    pub fn find_empty_location(&self) -> Coord {
        loop {
            let loc = Coord::new(
                rng::random_range(0, self.size_x as u32 - 1) as i16,
                rng::random_range(0, self.size_y as u32 - 1) as i16,
            );
            if self.is_empty_at(loc) {
                return loc;
            }
        }
    }

    /// Visit every in-bounds cell within Euclidean distance `radius` of
    /// `center`, including the center itself. Radius 1.0 yields the 5-cell
    /// plus-cross, 1.5 the full Moore neighborhood.
    pub fn visit_neighborhood(&self, center: Coord, radius: f32, mut f: impl FnMut(Coord)) {
        let dx_lo = -(radius as i32).min(center.x as i32);
        let dx_hi = (radius as i32).min(self.size_x as i32 - center.x as i32 - 1);
        for dx in dx_lo..=dx_hi {
            let x = center.x + dx as i16;
            let extent_y = (radius * radius - (dx * dx) as f32).sqrt() as i32;
            let dy_lo = -extent_y.min(center.y as i32);
            let dy_hi = extent_y.min(self.size_y as i32 - center.y as i32 - 1);
            for dy in dy_lo..=dy_hi {
                f(Coord::new(x, center.y + dy as i16));
            }
        }
    }

    /// Write a barrier cell and record it.
    pub fn set_barrier(&mut self, loc: Coord) {
        self.set(loc, BARRIER);
        self.barrier_locations.push(loc);
    }

    /// Record a centroid anchor for challenges that navigate by barrier.
    pub fn add_barrier_center(&mut self, loc: Coord) {
        self.barrier_centers.push(loc);
    }

    pub fn barrier_locations(&self) -> &[Coord] {
        &self.barrier_locations
    }

    pub fn barrier_centers(&self) -> &[Coord] {
        &self.barrier_centers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_classification() {
        let mut grid = Grid::new(16, 16);
        let loc = Coord::new(3, 4);
        assert!(grid.is_empty_at(loc));
        assert!(!grid.is_occupied_at(loc));

        grid.set(loc, 7);
        assert!(grid.is_occupied_at(loc));
        assert!(!grid.is_empty_at(loc));
        assert!(!grid.is_barrier_at(loc));

        grid.set_barrier(Coord::new(5, 5));
        assert!(grid.is_barrier_at(Coord::new(5, 5)));
        assert!(!grid.is_occupied_at(Coord::new(5, 5)));
    }

    #[test]
    fn test_bounds_and_border() {
        let grid = Grid::new(10, 8);
        assert!(grid.in_bounds(Coord::new(0, 0)));
        assert!(grid.in_bounds(Coord::new(9, 7)));
        assert!(!grid.in_bounds(Coord::new(10, 0)));
        assert!(!grid.in_bounds(Coord::new(-1, 3)));
        assert!(grid.is_border(Coord::new(0, 4)));
        assert!(grid.is_border(Coord::new(4, 7)));
        assert!(!grid.is_border(Coord::new(4, 4)));
    }

    #[test]
    fn test_barrier_bookkeeping() {
        let mut grid = Grid::new(12, 12);
        grid.set_barrier(Coord::new(1, 1));
        grid.set_barrier(Coord::new(2, 1));
        assert_eq!(grid.barrier_locations().len(), 2);

        // every recorded location is a BARRIER cell and vice versa
        let mut found = 0;
        for x in 0..12 {
            for y in 0..12 {
                if grid.at_xy(x, y) == BARRIER {
                    found += 1;
                    assert!(grid
                        .barrier_locations()
                        .contains(&Coord::new(x as i16, y as i16)));
                }
            }
        }
        assert_eq!(found, grid.barrier_locations().len());

        grid.zero_fill();
        assert!(grid.barrier_locations().is_empty());
        assert!(grid.is_empty_at(Coord::new(1, 1)));
    }

    #[test]
    fn test_visit_neighborhood_radius_one() {
        let grid = Grid::new(9, 9);
        let mut cells = Vec::new();
        grid.visit_neighborhood(Coord::new(4, 4), 1.0, |c| cells.push(c));
        // plus-cross: center and 4 orthogonal neighbors
        assert_eq!(cells.len(), 5);
        assert!(cells.contains(&Coord::new(4, 4)));
        assert!(cells.contains(&Coord::new(3, 4)));
        assert!(cells.contains(&Coord::new(5, 4)));
        assert!(cells.contains(&Coord::new(4, 3)));
        assert!(cells.contains(&Coord::new(4, 5)));
    }

    #[test]
    fn test_visit_neighborhood_radius_one_point_five() {
        let grid = Grid::new(9, 9);
        let mut count = 0;
        let mut saw_diagonal = false;
        grid.visit_neighborhood(Coord::new(4, 4), 1.5, |c| {
            count += 1;
            if c == Coord::new(3, 3) {
                saw_diagonal = true;
            }
        });
        // full Moore neighborhood
        assert_eq!(count, 9);
        assert!(saw_diagonal);
    }

    #[test]
    fn test_visit_neighborhood_clips_to_bounds() {
        let grid = Grid::new(9, 9);
        let mut cells = Vec::new();
        grid.visit_neighborhood(Coord::new(0, 0), 1.5, |c| cells.push(c));
        assert_eq!(cells.len(), 4); // corner quadrant only
        for c in cells {
            assert!(grid.in_bounds(c));
        }
    }

    #[test]
    fn test_visit_neighborhood_visits_once() {
        let grid = Grid::new(32, 32);
        let mut seen = std::collections::HashSet::new();
        grid.visit_neighborhood(Coord::new(16, 16), 4.0, |c| {
            assert!(seen.insert((c.x, c.y)), "cell visited twice: {c:?}");
            let dx = (c.x - 16) as f32;
            let dy = (c.y - 16) as f32;
            assert!((dx * dx + dy * dy).sqrt() <= 4.0 + 1e-6);
        });
        assert!(seen.len() > 25);
    }

    #[test]
    fn test_find_empty_location_skips_occupied() {
        crate::rng::seed_thread(true, 42, 0);
        let mut grid = Grid::new(4, 4);
        // fill everything except one cell
        for x in 0..4i16 {
            for y in 0..4i16 {
                if (x, y) != (2, 3) {
                    grid.set(Coord::new(x, y), 9);
                }
            }
        }
        assert_eq!(grid.find_empty_location(), Coord::new(2, 3));
    }
}
