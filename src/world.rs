//! The world value: grid, signal layers, population, and configuration.
//!
//! Everything the simulation touches hangs off [`World`], passed explicitly
//! wherever it is needed. The parallel per-agent phase borrows it through
//! [`TickView`], a read-only view plus the deferred queues.

use crate::agent::Agent;
use crate::barriers;
use crate::challenges::Challenge;
use crate::config::Config;
use crate::genome::{self, Genome};
use crate::geometry::Coord;
use crate::grid::Grid;
use crate::peeps::{ActionQueues, Peeps};
use crate::signals::Signals;
use serde::Serialize;
use std::sync::Arc;

/// Read-only view of the world handed to the parallel per-agent phase.
/// Agents read the grid, signals, config, and one another's genomes through
/// it, and push deferred effects onto the queues. All fields are shared
/// references, so the view is freely shared across worker threads.
pub struct TickView<'a> {
    pub grid: &'a Grid,
    pub signals: &'a Signals,
    pub config: &'a Config,
    /// Index-aligned genomes of live agents (None for dead or reserved).
    pub genomes: &'a [Option<Arc<Genome>>],
    pub queues: &'a ActionQueues,
}

/// The complete simulation state for one run.
pub struct World {
    pub grid: Grid,
    pub signals: Signals,
    pub peeps: Peeps,
    pub config: Config,
}

impl World {
    /// Allocate world structures per the config. The population is placed
    /// separately by [`World::init_generation`].
    pub fn new(config: Config) -> World {
        World {
            grid: Grid::new(config.world.grid_size_x, config.world.grid_size_y),
            signals: Signals::new(
                config.world.signal_layers,
                config.world.grid_size_x,
                config.world.grid_size_y,
            ),
            peeps: Peeps::new(config.sim.population),
            config,
        }
    }

    /// Reset the arena and place a full population, one agent per genome, at
    /// random empty cells. Used both for generation zero (random genomes)
    /// and for children of survivors.
    pub fn init_generation(&mut self, genomes: Vec<Genome>) {
        self.grid.zero_fill();
        barriers::place_barriers(&mut self.grid, self.config.world.barrier_type);
        self.signals.zero_fill();

        let mut agents = Vec::with_capacity(genomes.len());
        for (i, genome) in genomes.into_iter().enumerate() {
            let index = (i + 1) as u16;
            let loc = self.grid.find_empty_location();
            self.grid.set(loc, index);
            agents.push(Agent::new(index, loc, Arc::new(genome), &self.config));
        }
        self.peeps.repopulate(agents);
    }

    /// Reset the arena and place agents at explicit locations. Useful for
    /// embedders and tests that need deterministic placement.
    pub fn populate_at(&mut self, placements: Vec<(Coord, Genome)>) {
        self.grid.zero_fill();
        barriers::place_barriers(&mut self.grid, self.config.world.barrier_type);
        self.signals.zero_fill();

        let mut agents = Vec::with_capacity(placements.len());
        for (i, (loc, genome)) in placements.into_iter().enumerate() {
            let index = (i + 1) as u16;
            debug_assert!(self.grid.is_empty_at(loc));
            self.grid.set(loc, index);
            agents.push(Agent::new(index, loc, Arc::new(genome), &self.config));
        }
        self.peeps.repopulate(agents);
    }

    /// Fresh random genomes for a whole generation-zero population.
    pub fn random_genomes(&self) -> Vec<Genome> {
        (0..self.config.sim.population)
            .map(|_| genome::make_random_genome(&self.config))
            .collect()
    }

    /// Borrow a read-only tick view over this world. The genome snapshot is
    /// taken by the caller so its lifetime can span the parallel phase.
    pub fn tick_view<'a>(&'a self, genomes: &'a [Option<Arc<Genome>>]) -> TickView<'a> {
        TickView {
            grid: &self.grid,
            signals: &self.signals,
            config: &self.config,
            genomes,
            queues: &self.peeps.queues,
        }
    }

    /// Serial step-boundary work, in fixed order: challenge hook, death
    /// drain, move drain, queued pheromone deposits, signal fade.
    pub fn end_of_step(&mut self, challenge: Challenge, step: u32) {
        challenge.apply_step(self, step);

        let World {
            grid,
            signals,
            peeps,
            ..
        } = self;
        peeps.drain_death_queue(grid);
        peeps.drain_move_queue(grid);
        for (layer, loc) in peeps.queues.drain_deposits() {
            signals.deposit(layer as usize, loc);
        }
        for layer in 0..signals.num_layers() {
            signals.fade(layer);
        }
    }

    /// Count of agents still alive.
    pub fn live_count(&self) -> usize {
        self.peeps.agents().filter(|agent| agent.alive).count()
    }
}

/// What one frame snapshot carries to an external renderer: agent markers,
/// barrier geometry, raw signal layers, and the active challenge id.
#[derive(Clone, Debug, Serialize)]
pub struct Snapshot {
    pub generation: u32,
    pub step: u32,
    pub agents: Vec<AgentMarker>,
    pub barriers: Vec<Coord>,
    /// One flat column-major buffer per signal layer.
    pub signal_layers: Vec<Vec<u8>>,
    pub challenge: u32,
}

/// Position and display color of one live agent.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct AgentMarker {
    pub index: u16,
    pub x: i16,
    pub y: i16,
    /// Genome-derived color byte; kin tend to share colors.
    pub color: u8,
}

impl Snapshot {
    /// Capture the world as it stands at the end of a step.
    pub fn capture(world: &World, generation: u32, step: u32, challenge: Challenge) -> Snapshot {
        let agents = world
            .peeps
            .agents()
            .filter(|agent| agent.alive)
            .map(|agent| AgentMarker {
                index: agent.index,
                x: agent.loc.x,
                y: agent.loc.y,
                color: genome::genetic_color(&agent.genome),
            })
            .collect();
        let signal_layers = (0..world.signals.num_layers())
            .map(|layer| world.signals.layer_data(layer))
            .collect();
        Snapshot {
            generation,
            step,
            agents,
            barriers: world.grid.barrier_locations().to_vec(),
            signal_layers,
            challenge: challenge.id(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> Config {
        let mut config = Config::default();
        config.world.grid_size_x = 24;
        config.world.grid_size_y = 24;
        config.sim.population = 10;
        config.rng.deterministic = true;
        config
    }

    #[test]
    fn test_init_generation_places_everyone() {
        crate::rng::seed_thread(true, 61, 0);
        let mut world = World::new(small_config());
        let genomes = world.random_genomes();
        world.init_generation(genomes);

        assert_eq!(world.peeps.population(), 10);
        assert_eq!(world.live_count(), 10);

        // invariant: every live agent's cell holds its own index, no sharing
        let mut seen = std::collections::HashSet::new();
        for agent in world.peeps.agents() {
            assert_eq!(world.grid.at(agent.loc), agent.index);
            assert!(seen.insert((agent.loc.x, agent.loc.y)));
        }
    }

    #[test]
    fn test_init_generation_resets_arena() {
        crate::rng::seed_thread(true, 62, 0);
        let mut config = small_config();
        config.world.barrier_type = 1;
        let mut world = World::new(config);
        let genomes = world.random_genomes();
        world.init_generation(genomes);

        world.signals.deposit(0, Coord::new(5, 5));
        let barrier_count = world.grid.barrier_locations().len();
        assert!(barrier_count > 0);

        let genomes = world.random_genomes();
        world.init_generation(genomes);
        // signals cleared, barriers redrawn identically for the fixed preset
        assert_eq!(world.signals.magnitude(0, Coord::new(5, 5)), 0);
        assert_eq!(world.grid.barrier_locations().len(), barrier_count);
        assert_eq!(world.live_count(), 10);
    }

    #[test]
    fn test_end_of_step_drains_everything() {
        crate::rng::seed_thread(true, 63, 0);
        let mut world = World::new(small_config());
        let genomes = world.random_genomes();
        world.init_generation(genomes);

        let victim_loc = world.peeps[1u16].loc;
        world.peeps.queues.queue_for_death(1);
        world.peeps.queues.queue_deposit(0, Coord::new(12, 12));
        world.end_of_step(Challenge::Corner, 0);

        assert!(!world.peeps[1u16].alive);
        assert!(world.grid.is_empty_at(victim_loc));
        assert_eq!(world.peeps.queued_death_count(), 0);
        // deposit landed (center 3) then faded once
        assert_eq!(world.signals.magnitude(0, Coord::new(12, 12)), 2);
    }

    #[test]
    fn test_snapshot_capture() {
        crate::rng::seed_thread(true, 64, 0);
        let mut config = small_config();
        config.world.barrier_type = 4;
        let mut world = World::new(config);
        let genomes = world.random_genomes();
        world.init_generation(genomes);

        let snapshot = Snapshot::capture(&world, 3, 7, Challenge::CenterWeighted);
        assert_eq!(snapshot.generation, 3);
        assert_eq!(snapshot.step, 7);
        assert_eq!(snapshot.challenge, 4);
        assert_eq!(snapshot.agents.len(), 10);
        assert_eq!(snapshot.barriers.len(), world.grid.barrier_locations().len());
        assert_eq!(snapshot.signal_layers.len(), 1);
    }
}
