//! Barrier presets: static impassable cells painted before agents spawn.

use crate::geometry::Coord;
use crate::grid::Grid;
use crate::rng;

/// Paint the barrier layout selected by `barrier_type` onto an empty grid.
/// Every painted cell lands in `grid.barrier_locations()`; presets built
/// around anchor points also record `grid.barrier_centers()` for the
/// challenges that navigate by them. Called once per generation, after the
/// grid is zeroed and before the population is placed.
pub fn place_barriers(grid: &mut Grid, barrier_type: u32) {
    let size_x = grid.size_x() as i16;
    let size_y = grid.size_y() as i16;

    match barrier_type {
        // open arena
        0 => {}

        // vertical bar in a constant location
        1 => {
            let min_x = size_x / 2;
            let max_x = min_x + 1;
            let min_y = size_y / 4;
            let max_y = min_y + size_y / 2;
            fill_box(grid, min_x, min_y, max_x, max_y);
        }

        // vertical bar in a random location each generation
        2 => {
            let min_x = rng::random_range(20, size_x as u32 - 20) as i16;
            let max_x = min_x + 1;
            let min_y = rng::random_range(20, size_y as u32 / 2 - 20) as i16;
            let max_y = min_y + size_y / 2;
            fill_box(grid, min_x, min_y, max_x, max_y);
        }

        // five staggered blocks
        3 => {
            let block_size_x = 2i16;
            let block_size_y = size_x / 3;

            let mut x0 = size_x / 4 - block_size_x / 2;
            let mut y0 = size_y / 4 - block_size_y / 2;
            let mut x1 = x0 + block_size_x;
            let mut y1 = y0 + block_size_y;

            fill_box(grid, x0, y0, x1, y1);
            x0 += size_x / 2;
            x1 = x0 + block_size_x;
            fill_box(grid, x0, y0, x1, y1);
            y0 += size_y / 2;
            y1 = y0 + block_size_y;
            fill_box(grid, x0, y0, x1, y1);
            x0 -= size_x / 2;
            x1 = x0 + block_size_x;
            fill_box(grid, x0, y0, x1, y1);
            x0 = size_x / 2 - block_size_x / 2;
            x1 = x0 + block_size_x;
            y0 = size_y / 2 - block_size_y / 2;
            y1 = y0 + block_size_y;
            fill_box(grid, x0, y0, x1, y1);
        }

        // horizontal bar in a constant location
        4 => {
            let min_x = size_x / 4;
            let max_x = min_x + size_x / 2;
            let min_y = size_y / 2 + size_y / 4;
            let max_y = min_y + 2;
            fill_box(grid, min_x, min_y, max_x, max_y);
        }

        // one floating island at a random location each generation, with
        // room reserved for sibling islands kept apart by a margin
        5 => {
            let radius = 3.0f32;
            let margin = 2 * radius as i16;

            let random_loc = |grid: &Grid| {
                Coord::new(
                    rng::random_range(margin as u32, (grid.size_x() as i16 - margin) as u32)
                        as i16,
                    rng::random_range(margin as u32, (grid.size_y() as i16 - margin) as u32)
                        as i16,
                )
            };

            let center0 = random_loc(grid);
            let mut center1;
            loop {
                center1 = random_loc(grid);
                if (center0 - center1).length() >= margin as u32 {
                    break;
                }
            }
            loop {
                let center2 = random_loc(grid);
                if (center0 - center2).length() >= margin as u32
                    && (center1 - center2).length() >= margin as u32
                {
                    break;
                }
            }

            grid.add_barrier_center(center0);
            fill_disc(grid, center0, radius);
        }

        // five round spots along the vertical midline
        6 => {
            let number_of_locations = 5i16;
            let radius = 5.0f32;
            let vertical_slice_size = size_y / (number_of_locations + 1);

            for n in 1..=number_of_locations {
                let loc = Coord::new(size_x / 2, n * vertical_slice_size);
                fill_disc(grid, loc, radius);
                grid.add_barrier_center(loc);
            }
        }

        _ => unreachable!("unknown barrier type {barrier_type}"),
    }
}

fn fill_box(grid: &mut Grid, min_x: i16, min_y: i16, max_x: i16, max_y: i16) {
    for x in min_x..=max_x {
        for y in min_y..=max_y {
            grid.set_barrier(Coord::new(x, y));
        }
    }
}

fn fill_disc(grid: &mut Grid, center: Coord, radius: f32) {
    let mut cells = Vec::new();
    grid.visit_neighborhood(center, radius, |loc| cells.push(loc));
    for loc in cells {
        grid.set_barrier(loc);
    }
}
