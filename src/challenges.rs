//! Survival challenges: the selection pressure that decides who reproduces.
//!
//! Each challenge is a pure predicate over an agent's end-of-generation
//! state, returning pass/fail plus a score in `[0, 1]` used for
//! fitness-weighted parent selection. A few challenges also act during the
//! generation through the per-step hook (flagging wall touches, killing
//! agents near radioactive walls, tracking visit sequences).

use crate::agent::Agent;
use crate::geometry::Coord;
use crate::grid::Grid;
use crate::rng;
use crate::world::World;
use serde::{Deserialize, Serialize};

/// The survival challenge menu. Ids are stable and sparse (config files
/// refer to them numerically).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Challenge {
    /// Inside a circle in the southwest quadrant, distance-weighted score
    Circle,
    /// East half of the arena
    RightHalf,
    /// Easternmost quarter
    RightQuarter,
    /// Off-border with a modest number of neighbors
    String,
    /// Near the arena center, distance-weighted score
    CenterWeighted,
    /// Near any corner
    Corner,
    /// Near any corner, distance-weighted score
    CornerWeighted,
    /// Everyone survives, scored by distance traveled from birth
    MigrateDistance,
    /// Near the center with a sparse local crowd
    CenterSparse,
    /// Westernmost eighth
    LeftEighth,
    /// Survive the per-step radiation deaths near the active wall
    RadioactiveWalls,
    /// On the border when the generation ends
    AgainstAnyWall,
    /// Touched any border at some point during the generation
    TouchAnyWall,
    /// Either the east or the west eighth
    EastWestEighths,
    /// Within range of the nearest barrier anchor, distance-weighted
    NearBarrier,
    /// Isolated pair: exactly one neighbor, who has no other neighbors
    Pairs,
    /// Visited barrier anchors in strict order, scored by visits
    LocationSequence,
    /// Southwest gathering zone; sacrifice-zone kin rescue survivors
    Altruism,
    /// Northeast sacrifice zone feeding the altruism challenge
    AltruismSacrifice,
    /// Near the center, flat score
    CenterUnweighted,
}

impl Challenge {
    /// Resolve a config id, or None for an unknown id.
    pub fn from_id(id: u32) -> Option<Challenge> {
        Some(match id {
            0 => Challenge::Circle,
            1 => Challenge::RightHalf,
            2 => Challenge::RightQuarter,
            3 => Challenge::String,
            4 => Challenge::CenterWeighted,
            5 => Challenge::Corner,
            6 => Challenge::CornerWeighted,
            7 => Challenge::MigrateDistance,
            8 => Challenge::CenterSparse,
            9 => Challenge::LeftEighth,
            10 => Challenge::RadioactiveWalls,
            11 => Challenge::AgainstAnyWall,
            12 => Challenge::TouchAnyWall,
            13 => Challenge::EastWestEighths,
            14 => Challenge::NearBarrier,
            15 => Challenge::Pairs,
            16 => Challenge::LocationSequence,
            17 => Challenge::Altruism,
            18 => Challenge::AltruismSacrifice,
            40 => Challenge::CenterUnweighted,
            _ => return None,
        })
    }

    /// The stable numeric id for snapshots and logs.
    pub fn id(self) -> u32 {
        match self {
            Challenge::Circle => 0,
            Challenge::RightHalf => 1,
            Challenge::RightQuarter => 2,
            Challenge::String => 3,
            Challenge::CenterWeighted => 4,
            Challenge::Corner => 5,
            Challenge::CornerWeighted => 6,
            Challenge::MigrateDistance => 7,
            Challenge::CenterSparse => 8,
            Challenge::LeftEighth => 9,
            Challenge::RadioactiveWalls => 10,
            Challenge::AgainstAnyWall => 11,
            Challenge::TouchAnyWall => 12,
            Challenge::EastWestEighths => 13,
            Challenge::NearBarrier => 14,
            Challenge::Pairs => 15,
            Challenge::LocationSequence => 16,
            Challenge::Altruism => 17,
            Challenge::AltruismSacrifice => 18,
            Challenge::CenterUnweighted => 40,
        }
    }

    /// Evaluate the survival criterion for one agent at generation end.
    /// Dead agents always fail with score 0.
    pub fn evaluate(self, agent: &Agent, grid: &Grid) -> (bool, f32) {
        if !agent.alive {
            return (false, 0.0);
        }

        let size_x = grid.size_x() as i16;
        let size_y = grid.size_y() as i16;
        let loc = agent.loc;

        match self {
            Challenge::Circle => {
                let safe_center = Coord::new(size_x / 4, size_y / 4);
                let radius = size_x as f32 / 4.0;
                let distance = (safe_center - loc).length() as f32;
                if distance <= radius {
                    (true, (radius - distance) / radius)
                } else {
                    (false, 0.0)
                }
            }

            Challenge::RightHalf => binary(loc.x > size_x / 2),

            Challenge::RightQuarter => binary(loc.x > size_x / 2 + size_x / 4),

            Challenge::LeftEighth => binary(loc.x < size_x / 8),

            Challenge::EastWestEighths => {
                binary(loc.x < size_x / 8 || loc.x >= size_x - size_x / 8)
            }

            Challenge::String => {
                let min_neighbors = 2;
                let max_neighbors = 22;
                if grid.is_border(loc) {
                    return (false, 0.0);
                }
                let mut count = 0;
                grid.visit_neighborhood(loc, 1.5, |tloc| {
                    if grid.is_occupied_at(tloc) {
                        count += 1;
                    }
                });
                binary(count >= min_neighbors && count <= max_neighbors)
            }

            Challenge::CenterWeighted => {
                let safe_center = Coord::new(size_x / 2, size_y / 2);
                let radius = size_x as f32 / 3.0;
                let distance = (safe_center - loc).length() as f32;
                if distance <= radius {
                    (true, (radius - distance) / radius)
                } else {
                    (false, 0.0)
                }
            }

            Challenge::CenterUnweighted => {
                let safe_center = Coord::new(size_x / 2, size_y / 2);
                let radius = size_x as f32 / 3.0;
                binary((safe_center - loc).length() as f32 <= radius)
            }

            Challenge::CenterSparse => {
                let safe_center = Coord::new(size_x / 2, size_y / 2);
                let outer_radius = size_x as f32 / 4.0;
                let inner_radius = 1.5;
                let min_neighbors = 5; // includes self
                let max_neighbors = 8;

                let distance = (safe_center - loc).length() as f32;
                if distance <= outer_radius {
                    let mut count = 0;
                    grid.visit_neighborhood(loc, inner_radius, |tloc| {
                        if grid.is_occupied_at(tloc) {
                            count += 1;
                        }
                    });
                    if count >= min_neighbors && count <= max_neighbors {
                        return (true, 1.0);
                    }
                }
                (false, 0.0)
            }

            Challenge::Corner => {
                debug_assert_eq!(size_x, size_y);
                let radius = size_x as f32 / 8.0;
                corner_test(loc, size_x, size_y, radius, false)
            }

            Challenge::CornerWeighted => {
                debug_assert_eq!(size_x, size_y);
                let radius = size_x as f32 / 4.0;
                corner_test(loc, size_x, size_y, radius, true)
            }

            // the real mechanism is the per-step radiation hook; anyone
            // still alive at the end passes
            Challenge::RadioactiveWalls => (true, 1.0),

            Challenge::AgainstAnyWall => binary(grid.is_border(loc)),

            Challenge::TouchAnyWall => binary(agent.challenge_bits != 0),

            Challenge::MigrateDistance => {
                let distance = (loc - agent.birth_loc).length() as f32;
                (true, distance / size_x.max(size_y) as f32)
            }

            Challenge::NearBarrier => {
                let radius = (size_x / 2) as f32;
                let min_distance = grid
                    .barrier_centers()
                    .iter()
                    .map(|center| (loc - *center).length() as f32)
                    .fold(f32::INFINITY, f32::min);
                if min_distance <= radius {
                    (true, 1.0 - min_distance / radius)
                } else {
                    (false, 0.0)
                }
            }

            Challenge::Pairs => {
                if grid.is_border(loc) {
                    return (false, 0.0);
                }
                let mut count = 0;
                for x in loc.x - 1..=loc.x + 1 {
                    for y in loc.y - 1..=loc.y + 1 {
                        let tloc = Coord::new(x, y);
                        if tloc != loc && grid.in_bounds(tloc) && grid.is_occupied_at(tloc) {
                            count += 1;
                            if count > 1 {
                                return (false, 0.0);
                            }
                            // the partner must have no neighbor besides us
                            for x1 in tloc.x - 1..=tloc.x + 1 {
                                for y1 in tloc.y - 1..=tloc.y + 1 {
                                    let tloc1 = Coord::new(x1, y1);
                                    if tloc1 != tloc
                                        && tloc1 != loc
                                        && grid.in_bounds(tloc1)
                                        && grid.is_occupied_at(tloc1)
                                    {
                                        return (false, 0.0);
                                    }
                                }
                            }
                        }
                    }
                }
                binary(count == 1)
            }

            Challenge::LocationSequence => {
                let count = agent.challenge_bits.count_ones();
                let max_bits = u32::BITS;
                if count > 0 {
                    (true, count as f32 / max_bits as f32)
                } else {
                    (false, 0.0)
                }
            }

            Challenge::Altruism => {
                let safe_center = Coord::new(size_x / 4, size_y / 4);
                let radius = size_x as f32 / 4.0;
                let distance = (safe_center - loc).length() as f32;
                if distance <= radius {
                    (true, (radius - distance) / radius)
                } else {
                    (false, 0.0)
                }
            }

            Challenge::AltruismSacrifice => {
                let radius = size_x as f32 / 4.0;
                let sacrifice_center = Coord::new(size_x - size_x / 4, size_y - size_y / 4);
                let distance = (sacrifice_center - loc).length() as f32;
                if distance <= radius {
                    (true, (radius - distance) / radius)
                } else {
                    (false, 0.0)
                }
            }
        }
    }

    /// Per-step hook, run serially before the queues drain. Most challenges
    /// do nothing here.
    pub fn apply_step(self, world: &mut World, step: u32) {
        match self {
            Challenge::RadioactiveWalls => {
                // west wall radioactive for the first half of the
                // generation, east wall for the second; death probability
                // falls off as 1/distance out to mid-arena
                let size_x = world.grid.size_x() as i16;
                let steps_per_generation = world.config.sim.steps_per_generation;
                let radioactive_x = if step < steps_per_generation / 2 {
                    0
                } else {
                    size_x - 1
                };

                let population = world.peeps.population() as u16;
                for index in 1..=population {
                    let agent = &world.peeps[index];
                    if !agent.alive {
                        continue;
                    }
                    let distance = (agent.loc.x - radioactive_x).abs();
                    if distance < size_x / 2 {
                        let chance_of_death = 1.0 / distance as f32;
                        if rng::random_unit() < chance_of_death {
                            world.peeps.queues.queue_for_death(index);
                        }
                    }
                }
            }

            Challenge::TouchAnyWall => {
                let World { grid, peeps, .. } = world;
                for agent in peeps.agents_mut() {
                    if grid.is_border(agent.loc) {
                        agent.challenge_bits = 1;
                    }
                }
            }

            Challenge::LocationSequence => {
                // bit n is earned only after bits 0..n, and only the first
                // unvisited anchor is checked each step
                let radius = 9.0f32;
                let World { grid, peeps, .. } = world;
                for agent in peeps.agents_mut() {
                    for (n, center) in grid.barrier_centers().iter().enumerate() {
                        let bit = 1u32 << n;
                        if agent.challenge_bits & bit == 0 {
                            if (agent.loc - *center).length() as f32 <= radius {
                                agent.challenge_bits |= bit;
                            }
                            break;
                        }
                    }
                }
            }

            _ => {}
        }
    }
}

#[inline]
fn binary(passed: bool) -> (bool, f32) {
    if passed {
        (true, 1.0)
    } else {
        (false, 0.0)
    }
}

/// Test distance to all four corners; weighted scoring uses the first corner
/// within range.
fn corner_test(loc: Coord, size_x: i16, size_y: i16, radius: f32, weighted: bool) -> (bool, f32) {
    let corners = [
        Coord::new(0, 0),
        Coord::new(0, size_y - 1),
        Coord::new(size_x - 1, 0),
        Coord::new(size_x - 1, size_y - 1),
    ];
    for corner in corners {
        let distance = (corner - loc).length() as f32;
        if distance <= radius {
            let score = if weighted {
                (radius - distance) / radius
            } else {
                1.0
            };
            return (true, score);
        }
    }
    (false, 0.0)
}
