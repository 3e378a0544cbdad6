//! The sensor battery: every input a neural network can read.
//!
//! All sensors return a value in `[0.0, 1.0]`. Anything outside that range
//! (or NaN) is a soft correctness bug: it is logged and clamped, never fatal.

use crate::agent::Agent;
use crate::geometry::{Coord, Dir};
use crate::genome;
use crate::grid::Grid;
use crate::rng;
use crate::world::TickView;
use log::warn;

/// Number of compiled-in sensors; genome source numbers reduce modulo this.
pub const NUM_SENSES: usize = 21;

/// Input sensors available to neural networks. Each reads either the agent's
/// own state or the world around it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Sensor {
    /// Normalized distance from the west edge
    LocX,
    /// Normalized distance from the south edge
    LocY,
    /// Distance to the nearest east/west edge
    BoundaryDistX,
    /// Distance to the nearest edge on either axis
    BoundaryDist,
    /// Distance to the nearest north/south edge
    BoundaryDistY,
    /// Genome similarity of the agent directly ahead
    GeneticSimFwd,
    /// X component of the last movement
    LastMoveDirX,
    /// Y component of the last movement
    LastMoveDirY,
    /// Long-range forward probe for other agents
    LongProbePopFwd,
    /// Long-range forward probe for barriers
    LongProbeBarFwd,
    /// Occupancy fraction of the local neighborhood
    Population,
    /// Population density projected along the movement axis
    PopulationFwd,
    /// Population density projected 90 degrees off the movement axis
    PopulationLr,
    /// Internal oscillator, period settable by an action
    Osc1,
    /// Age relative to the generation length
    Age,
    /// Differential barrier distance along the movement axis
    BarrierFwd,
    /// Differential barrier distance 90 degrees off the movement axis
    BarrierLr,
    /// Uniform random value each read
    Random,
    /// Mean pheromone intensity on layer 0 nearby
    Signal0,
    /// Layer-0 pheromone density along the movement axis
    Signal0Fwd,
    /// Layer-0 pheromone density 90 degrees off the movement axis
    Signal0Lr,
}

const ALL_SENSORS: [Sensor; NUM_SENSES] = [
    Sensor::LocX,
    Sensor::LocY,
    Sensor::BoundaryDistX,
    Sensor::BoundaryDist,
    Sensor::BoundaryDistY,
    Sensor::GeneticSimFwd,
    Sensor::LastMoveDirX,
    Sensor::LastMoveDirY,
    Sensor::LongProbePopFwd,
    Sensor::LongProbeBarFwd,
    Sensor::Population,
    Sensor::PopulationFwd,
    Sensor::PopulationLr,
    Sensor::Osc1,
    Sensor::Age,
    Sensor::BarrierFwd,
    Sensor::BarrierLr,
    Sensor::Random,
    Sensor::Signal0,
    Sensor::Signal0Fwd,
    Sensor::Signal0Lr,
];

impl Sensor {
    /// Sensor for a compiled connection's source number (already reduced
    /// modulo [`NUM_SENSES`]).
    #[inline]
    pub fn from_index(index: u8) -> Sensor {
        ALL_SENSORS[index as usize % NUM_SENSES]
    }

    /// Mnemonic name for logs and reports.
    pub fn name(self) -> &'static str {
        match self {
            Sensor::LocX => "LOC_X",
            Sensor::LocY => "LOC_Y",
            Sensor::BoundaryDistX => "BOUNDARY_DIST_X",
            Sensor::BoundaryDist => "BOUNDARY_DIST",
            Sensor::BoundaryDistY => "BOUNDARY_DIST_Y",
            Sensor::GeneticSimFwd => "GENETIC_SIM_FWD",
            Sensor::LastMoveDirX => "LAST_MOVE_DIR_X",
            Sensor::LastMoveDirY => "LAST_MOVE_DIR_Y",
            Sensor::LongProbePopFwd => "LONGPROBE_POP_FWD",
            Sensor::LongProbeBarFwd => "LONGPROBE_BAR_FWD",
            Sensor::Population => "POPULATION",
            Sensor::PopulationFwd => "POPULATION_FWD",
            Sensor::PopulationLr => "POPULATION_LR",
            Sensor::Osc1 => "OSC1",
            Sensor::Age => "AGE",
            Sensor::BarrierFwd => "BARRIER_FWD",
            Sensor::BarrierLr => "BARRIER_LR",
            Sensor::Random => "RANDOM",
            Sensor::Signal0 => "SIGNAL0",
            Sensor::Signal0Fwd => "SIGNAL0_FWD",
            Sensor::Signal0Lr => "SIGNAL0_LR",
        }
    }

    /// Pheromone sensors only work when at least one signal layer exists;
    /// the rest are always available.
    pub fn is_enabled(self, view: &TickView) -> bool {
        match self {
            Sensor::Signal0 | Sensor::Signal0Fwd | Sensor::Signal0Lr => {
                view.signals.num_layers() > 0
            }
            _ => true,
        }
    }
}

/// Directional density of occupied cells around `loc`, projected onto `dir`.
/// Each occupied neighbor contributes its projection onto the axis divided by
/// its squared distance, so nearby cells dominate. The aggregate is scaled by
/// an empiric maximum and shifted into `[0, 1]` with 0.5 meaning balanced.
fn population_density_along_axis(view: &TickView, loc: Coord, dir: Dir) -> f32 {
    debug_assert!(dir != Dir::Center);

    let dir_vec = dir.as_normalized_coord();
    let len = ((dir_vec.x as f64).powi(2) + (dir_vec.y as f64).powi(2)).sqrt();
    let unit_x = dir_vec.x as f64 / len;
    let unit_y = dir_vec.y as f64 / len;

    let mut sum = 0.0f64;
    let radius = view.config.sensors.population_sensor_radius;
    view.grid.visit_neighborhood(loc, radius, |tloc| {
        if tloc != loc && view.grid.is_occupied_at(tloc) {
            let offset = tloc - loc;
            let proj = unit_x * offset.x as f64 + unit_y * offset.y as f64;
            sum += proj / (offset.x as f64 * offset.x as f64 + offset.y as f64 * offset.y as f64);
        }
    });

    let max_sum_mag = 6.0 * radius as f64;
    debug_assert!(sum >= -max_sum_mag && sum <= max_sum_mag);
    ((sum / max_sum_mag + 1.0) / 2.0) as f32
}

/// Compare free distance before the first barrier in the forward and reverse
/// directions along `dir`, up to `probe_distance` cells each way. A walk that
/// leaves the grid counts as fully open. 0.5 means balanced.
fn short_probe_barrier_distance(grid: &Grid, loc0: Coord, dir: Dir, probe_distance: u32) -> f32 {
    let mut count_fwd = 0u32;
    let mut remaining = probe_distance;
    let mut loc = loc0 + dir;
    while remaining > 0 && grid.in_bounds(loc) && !grid.is_barrier_at(loc) {
        count_fwd += 1;
        loc = loc + dir;
        remaining -= 1;
    }
    if remaining > 0 && !grid.in_bounds(loc) {
        count_fwd = probe_distance;
    }

    let mut count_rev = 0u32;
    let mut remaining = probe_distance;
    let mut loc = loc0 - dir;
    while remaining > 0 && grid.in_bounds(loc) && !grid.is_barrier_at(loc) {
        count_rev += 1;
        loc = loc - dir;
        remaining -= 1;
    }
    if remaining > 0 && !grid.in_bounds(loc) {
        count_rev = probe_distance;
    }

    let spread = count_fwd as f32 - count_rev as f32 + probe_distance as f32;
    (spread / 2.0) / probe_distance as f32
}

/// Mean pheromone intensity over the signal-sensor neighborhood, in `[0, 1]`.
fn signal_density(view: &TickView, layer: usize, loc: Coord) -> f32 {
    let mut count_locs = 0u32;
    let mut sum = 0u64;
    let radius = view.config.sensors.signal_sensor_radius as f32;
    view.grid.visit_neighborhood(loc, radius, |tloc| {
        count_locs += 1;
        sum += view.signals.magnitude(layer, tloc) as u64;
    });
    let max_sum = count_locs as f64 * crate::signals::SIGNAL_MAX as f64;
    (sum as f64 / max_sum) as f32
}

/// Directional pheromone density: like the population variant, but each
/// neighbor's contribution is scaled by its signal magnitude.
fn signal_density_along_axis(view: &TickView, layer: usize, loc: Coord, dir: Dir) -> f32 {
    debug_assert!(dir != Dir::Center);

    let dir_vec = dir.as_normalized_coord();
    let len = ((dir_vec.x as f64).powi(2) + (dir_vec.y as f64).powi(2)).sqrt();
    let unit_x = dir_vec.x as f64 / len;
    let unit_y = dir_vec.y as f64 / len;

    let mut sum = 0.0f64;
    let radius = view.config.sensors.signal_sensor_radius as f32;
    view.grid.visit_neighborhood(loc, radius, |tloc| {
        if tloc != loc {
            let offset = tloc - loc;
            let proj = unit_x * offset.x as f64 + unit_y * offset.y as f64;
            sum += proj * view.signals.magnitude(layer, tloc) as f64
                / (offset.x as f64 * offset.x as f64 + offset.y as f64 * offset.y as f64);
        }
    });

    let max_sum_mag = 6.0 * radius as f64 * crate::signals::SIGNAL_MAX as f64;
    debug_assert!(sum >= -max_sum_mag && sum <= max_sum_mag);
    ((sum / max_sum_mag + 1.0) / 2.0) as f32
}

/// Cells to the next occupied cell along `dir`, capped at `probe_distance`.
/// A barrier or the border before any agent reads as the full distance.
fn long_probe_population_fwd(grid: &Grid, mut loc: Coord, dir: Dir, probe_distance: u32) -> u32 {
    debug_assert!(probe_distance > 0);
    let mut count = 0;
    let mut remaining = probe_distance;
    loc = loc + dir;
    while remaining > 0 && grid.in_bounds(loc) && grid.is_empty_at(loc) {
        count += 1;
        loc = loc + dir;
        remaining -= 1;
    }
    if remaining > 0 && (!grid.in_bounds(loc) || grid.is_barrier_at(loc)) {
        probe_distance
    } else {
        count
    }
}

/// Cells to the next barrier along `dir`, capped at `probe_distance`. Agents
/// in the path do not stop the probe; leaving the grid reads as the cap.
fn long_probe_barrier_fwd(grid: &Grid, mut loc: Coord, dir: Dir, probe_distance: u32) -> u32 {
    debug_assert!(probe_distance > 0);
    let mut count = 0;
    let mut remaining = probe_distance;
    loc = loc + dir;
    while remaining > 0 && grid.in_bounds(loc) && !grid.is_barrier_at(loc) {
        count += 1;
        loc = loc + dir;
        remaining -= 1;
    }
    if remaining > 0 && !grid.in_bounds(loc) {
        probe_distance
    } else {
        count
    }
}

/// Resolve one sensor reading for an agent. Disabled sensors read 0. The
/// result is clamped to `[0, 1]`; out-of-range values are logged first.
pub fn sensor_value(agent: &Agent, sensor: Sensor, view: &TickView, step: u32) -> f32 {
    if !sensor.is_enabled(view) {
        return 0.0;
    }

    let grid = view.grid;
    let size_x = grid.size_x() as i32;
    let size_y = grid.size_y() as i32;
    let loc = agent.loc;

    let value: f32 = match sensor {
        Sensor::LocX => loc.x as f32 / (size_x - 1) as f32,
        Sensor::LocY => loc.y as f32 / (size_y - 1) as f32,
        Sensor::BoundaryDistX => {
            let min_dist_x = (loc.x as i32).min(size_x - loc.x as i32 - 1);
            min_dist_x as f32 / (size_x as f32 / 2.0)
        }
        Sensor::BoundaryDistY => {
            let min_dist_y = (loc.y as i32).min(size_y - loc.y as i32 - 1);
            min_dist_y as f32 / (size_y as f32 / 2.0)
        }
        Sensor::BoundaryDist => {
            let dist_x = (loc.x as i32).min(size_x - loc.x as i32 - 1);
            let dist_y = (loc.y as i32).min(size_y - loc.y as i32 - 1);
            let closest = dist_x.min(dist_y);
            let max_possible = (size_x / 2 - 1).max(size_y / 2 - 1);
            closest as f32 / max_possible as f32
        }
        Sensor::GeneticSimFwd => {
            let ahead = loc + agent.last_move_dir;
            if grid.in_bounds(ahead) && grid.is_occupied_at(ahead) {
                let other_index = grid.at(ahead) as usize;
                match view.genomes.get(other_index).and_then(|g| g.as_ref()) {
                    Some(other_genome) => genome::genome_similarity(
                        view.config.genome.comparison_method,
                        &agent.genome,
                        other_genome,
                    ),
                    None => 0.0,
                }
            } else {
                0.0
            }
        }
        Sensor::LastMoveDirX => {
            let last_x = agent.last_move_dir.as_normalized_coord().x;
            match last_x {
                -1 => 0.0,
                0 => 0.5,
                _ => 1.0,
            }
        }
        Sensor::LastMoveDirY => {
            let last_y = agent.last_move_dir.as_normalized_coord().y;
            match last_y {
                -1 => 0.0,
                0 => 0.5,
                _ => 1.0,
            }
        }
        Sensor::LongProbePopFwd => {
            long_probe_population_fwd(grid, loc, agent.last_move_dir, agent.long_probe_dist)
                as f32
                / agent.long_probe_dist as f32
        }
        Sensor::LongProbeBarFwd => {
            long_probe_barrier_fwd(grid, loc, agent.last_move_dir, agent.long_probe_dist) as f32
                / agent.long_probe_dist as f32
        }
        Sensor::Population => {
            let mut count_locs = 0u32;
            let mut count_occupied = 0u32;
            grid.visit_neighborhood(loc, view.config.sensors.population_sensor_radius, |tloc| {
                count_locs += 1;
                if grid.is_occupied_at(tloc) {
                    count_occupied += 1;
                }
            });
            count_occupied as f32 / count_locs as f32
        }
        Sensor::PopulationFwd => population_density_along_axis(view, loc, agent.last_move_dir),
        Sensor::PopulationLr => {
            population_density_along_axis(view, loc, agent.last_move_dir.rotate_90_cw())
        }
        Sensor::Osc1 => {
            let phase = (step % agent.osc_period) as f32 / agent.osc_period as f32;
            let factor = -(phase * 2.0 * std::f32::consts::PI).cos();
            debug_assert!((-1.0..=1.0).contains(&factor));
            ((factor + 1.0) / 2.0).clamp(0.0, 1.0)
        }
        Sensor::Age => agent.age as f32 / view.config.sim.steps_per_generation as f32,
        Sensor::BarrierFwd => short_probe_barrier_distance(
            grid,
            loc,
            agent.last_move_dir,
            view.config.sensors.short_probe_barrier_distance,
        ),
        Sensor::BarrierLr => short_probe_barrier_distance(
            grid,
            loc,
            agent.last_move_dir.rotate_90_cw(),
            view.config.sensors.short_probe_barrier_distance,
        ),
        Sensor::Random => rng::random_unit(),
        Sensor::Signal0 => signal_density(view, 0, loc),
        Sensor::Signal0Fwd => signal_density_along_axis(view, 0, loc, agent.last_move_dir),
        Sensor::Signal0Lr => {
            signal_density_along_axis(view, 0, loc, agent.last_move_dir.rotate_90_cw())
        }
    };

    if value.is_nan() || !(-0.01..=1.01).contains(&value) {
        warn!("sensor {} produced out-of-range value {}", sensor.name(), value);
    }
    value.clamp(0.0, 1.0)
}
