//! The generation/step scheduler and the reproduction pipeline.
//!
//! Three nested loops: generations, steps within a generation, and agents
//! within a step. The agent loop fans out across a rayon pool whose workers
//! each own a seeded thread-local RNG stream; everything at a step or
//! generation boundary runs on the orchestrating thread.

use crate::challenges::Challenge;
use crate::config::Config;
use crate::genome::{self, Genome};
use crate::peeps::Slot;
use crate::rng;
use crate::world::{Snapshot, TickView, World};
use log::info;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// What the generation-end callback receives.
#[derive(Clone, Copy, Debug)]
pub struct GenerationSummary {
    pub generation: u32,
    /// Agents that passed the survival criterion and seeded the next
    /// generation.
    pub survivors: u32,
    /// Deaths inflicted by other agents during the generation.
    pub murders: u32,
    /// Population genetic diversity in `[0, 1]`.
    pub diversity: f32,
}

type FrameCallback = Box<dyn FnMut(&Snapshot)>;
type GenerationCallback = Box<dyn FnMut(&GenerationSummary)>;

/// A configured, running simulation. Owns the world, the worker pool, and
/// the callbacks external collaborators hook in.
pub struct Simulation {
    world: World,
    challenge: Challenge,
    generation: u32,
    murders: u32,
    pool: rayon::ThreadPool,
    running: Arc<AtomicBool>,
    on_frame: Option<FrameCallback>,
    on_generation_end: Option<GenerationCallback>,
}

impl Simulation {
    /// Validate the config, seed the RNG streams, build the worker pool, and
    /// place generation zero.
    pub fn new(config: Config) -> Result<Simulation, String> {
        config.validate()?;
        let challenge = Challenge::from_id(config.sim.challenge)
            .ok_or_else(|| format!("unknown challenge id {}", config.sim.challenge))?;

        // Stream 0 belongs to the orchestrating thread; workers get 1..=N at
        // pool construction.
        let deterministic = config.rng.deterministic;
        let seed = config.rng.seed;
        rng::seed_thread(deterministic, seed, 0);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.sim.num_threads as usize)
            .start_handler(move |thread_index| {
                rng::seed_thread(deterministic, seed, thread_index as u32 + 1);
            })
            .build()
            .map_err(|e| e.to_string())?;

        let mut world = World::new(config);
        let genomes = world.random_genomes();
        world.init_generation(genomes);

        Ok(Simulation {
            world,
            challenge,
            generation: 0,
            murders: 0,
            pool,
            running: Arc::new(AtomicBool::new(true)),
            on_frame: None,
            on_generation_end: None,
        })
    }

    /// Register a renderer callback; fired after step boundaries on
    /// generations selected by `frame_stride`.
    pub fn on_frame(&mut self, callback: impl FnMut(&Snapshot) + 'static) {
        self.on_frame = Some(Box::new(callback));
    }

    /// Register a logger callback; fired once per completed generation.
    pub fn on_generation_end(&mut self, callback: impl FnMut(&GenerationSummary) + 'static) {
        self.on_generation_end = Some(Box::new(callback));
    }

    /// Handle for requesting a stop from another thread. The run loop polls
    /// it at the top of every step and exits at the next boundary.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Mutable world access for embedders that stage bespoke scenarios
    /// before running.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn challenge(&self) -> Challenge {
        self.challenge
    }

    /// Run until `max_generations` completes or a stop is requested. An
    /// extinct population resets the generation counter and reseeds, so a
    /// run can outlive its nominal generation budget under heavy selection.
    pub fn run(&mut self) {
        while self.running.load(Ordering::Relaxed)
            && self.generation < self.world.config.sim.max_generations
        {
            self.run_generation();
        }
        info!("simulation stopped at generation {}", self.generation);
    }

    /// Execute one full generation: all steps, then selection and respawn.
    pub fn run_generation(&mut self) {
        self.murders = 0;
        let steps = self.world.config.sim.steps_per_generation;
        for step in 0..steps {
            if !self.running.load(Ordering::Relaxed) {
                return;
            }
            self.run_step(step);
        }

        let survivors = self.spawn_next_generation();
        if survivors == 0 {
            self.generation = 0;
        } else {
            self.generation += 1;
        }
    }

    /// One simulation step: the parallel agent phase, then the serial
    /// boundary work, then optional frame emission.
    fn run_step(&mut self, step: u32) {
        let pool = &self.pool;
        {
            let World {
                grid,
                signals,
                peeps,
                config,
            } = &mut self.world;
            let genomes = peeps.genome_snapshot();
            let (slots, queues) = peeps.split_for_tick();
            let view = TickView {
                grid,
                signals,
                config,
                genomes: &genomes,
                queues,
            };
            pool.install(|| {
                slots.par_iter_mut().for_each(|slot| {
                    if let Slot::Agent(agent) = slot {
                        if agent.alive {
                            agent.tick(&view, step);
                        }
                    }
                });
            });
        }

        // Kills queued by agents count as murders; deaths added by the
        // challenge hook below do not.
        self.murders += self.world.peeps.queued_death_count() as u32;
        self.world.end_of_step(self.challenge, step);

        if let Some(callback) = &mut self.on_frame {
            let stride = self.world.config.sim.frame_stride;
            if stride > 0 && self.generation % stride == 0 {
                let snapshot =
                    Snapshot::capture(&self.world, self.generation, step, self.challenge);
                callback(&snapshot);
            }
        }
    }

    /// Apply the survival predicate, pick and sort parents, report the
    /// generation, and repopulate the world. Returns the survivor count.
    fn spawn_next_generation(&mut self) -> u32 {
        let world = &self.world;
        let population = world.peeps.population() as u16;

        // (index, score) of every agent eligible to parent. Genomes that
        // compiled to an empty network are never carried forward.
        let mut parents: Vec<(u16, f32)> = Vec::new();

        if self.challenge != Challenge::Altruism {
            for index in 1..=population {
                let agent = &world.peeps[index];
                let (passed, score) = self.challenge.evaluate(agent, &world.grid);
                if passed && !agent.nnet.connections.is_empty() {
                    parents.push((index, score));
                }
            }
        } else {
            // Kin selection: sacrifice-zone agents buy survival slots for
            // genetically similar agents in the spawning zone.
            let mut sacrifices: Vec<u16> = Vec::new();
            for index in 1..=population {
                let agent = &world.peeps[index];
                let (passed, score) = Challenge::Altruism.evaluate(agent, &world.grid);
                if passed && !agent.nnet.connections.is_empty() {
                    parents.push((index, score));
                } else {
                    let (sacrificed, _) =
                        Challenge::AltruismSacrifice.evaluate(agent, &world.grid);
                    if sacrificed && !agent.nnet.connections.is_empty() {
                        sacrifices.push(index);
                    }
                }
            }

            const GENERATIONS_BEFORE_KINSHIP: u32 = 10;
            const ALTRUISM_FACTOR: usize = 10;
            const KINSHIP_THRESHOLD: f32 = 0.7;

            if self.generation > GENERATIONS_BEFORE_KINSHIP && !parents.is_empty() {
                let method = world.config.genome.comparison_method;
                let mut surviving_kin: Vec<(u16, f32)> = Vec::new();
                for _ in 0..ALTRUISM_FACTOR {
                    for &sacrificed in &sacrifices {
                        // random search start so one lucky parent is not
                        // rescued over and over
                        let start = rng::random_range(0, parents.len() as u32 - 1) as usize;
                        for probe in 0..parents.len() {
                            let candidate = parents[(start + probe) % parents.len()];
                            let similarity = genome::genome_similarity(
                                method,
                                &world.peeps[sacrificed].genome,
                                &world.peeps[candidate.0].genome,
                            );
                            if similarity >= KINSHIP_THRESHOLD {
                                surviving_kin.push(candidate);
                                break;
                            }
                        }
                    }
                }
                info!(
                    "altruism: {} passed, {} sacrificed, {} saved",
                    parents.len(),
                    sacrifices.len(),
                    surviving_kin.len()
                );
                parents = surviving_kin;
            }
        }

        parents.sort_by(|a, b| b.1.total_cmp(&a.1));
        let parent_genomes: Vec<Arc<Genome>> = parents
            .iter()
            .map(|&(index, _)| world.peeps[index].genome.clone())
            .collect();
        let survivors = parent_genomes.len() as u32;

        let diversity =
            genome::genetic_diversity(&world.peeps, world.config.genome.comparison_method);
        let summary = GenerationSummary {
            generation: self.generation,
            survivors,
            murders: self.murders,
            diversity,
        };
        if let Some(callback) = &mut self.on_generation_end {
            callback(&summary);
        }

        if survivors > 0 {
            let children: Vec<Genome> = (0..self.world.config.sim.population)
                .map(|_| genome::generate_child_genome(&parent_genomes, &self.world.config))
                .collect();
            self.world.init_generation(children);
        } else {
            // extinction: restart from scratch with fresh random genomes
            let genomes = self.world.random_genomes();
            self.world.init_generation(genomes);
        }

        survivors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Coord;

    fn test_config() -> Config {
        let mut config = Config::default();
        config.world.grid_size_x = 32;
        config.world.grid_size_y = 32;
        config.sim.population = 20;
        config.sim.steps_per_generation = 10;
        config.sim.max_generations = 3;
        config.sim.num_threads = 1;
        config.sim.challenge = Challenge::MigrateDistance.id();
        config.rng.deterministic = true;
        config.rng.seed = 42;
        config
    }

    #[test]
    fn test_invalid_config_refused() {
        let mut config = test_config();
        config.sim.population = 0;
        assert!(Simulation::new(config).is_err());
    }

    #[test]
    fn test_generation_zero_placement() {
        let sim = Simulation::new(test_config()).unwrap();
        assert_eq!(sim.generation(), 0);
        assert_eq!(sim.world().live_count(), 20);

        let mut grid_agents = 0;
        for x in 0..32 {
            for y in 0..32 {
                let v = sim.world().grid.at_xy(x, y);
                if v != crate::grid::EMPTY && v != crate::grid::BARRIER {
                    grid_agents += 1;
                }
            }
        }
        assert_eq!(grid_agents, 20);
    }

    #[test]
    fn test_migrate_distance_always_advances() {
        let mut sim = Simulation::new(test_config()).unwrap();
        sim.run_generation();
        // everyone survives MIGRATE_DISTANCE, so the counter advances
        assert_eq!(sim.generation(), 1);
        assert_eq!(sim.world().live_count(), 20);
    }

    #[test]
    fn test_grid_invariant_after_generations() {
        let mut sim = Simulation::new(test_config()).unwrap();
        sim.run_generation();
        sim.run_generation();

        for agent in sim.world().peeps.agents() {
            assert!(agent.alive);
            assert_eq!(sim.world().grid.at(agent.loc), agent.index);
        }
    }

    #[test]
    fn test_extinction_resets_generation_counter() {
        let mut config = test_config();
        config.sim.challenge = Challenge::Pairs.id();
        config.sim.steps_per_generation = 1;
        let mut sim = Simulation::new(config).unwrap();

        // two agents far apart cannot form a pair within one step
        sim.world_mut().populate_at(vec![
            (Coord::new(4, 4), vec![crate::genome::Gene::random()]),
            (Coord::new(28, 28), vec![crate::genome::Gene::random()]),
        ]);
        sim.run_generation();

        assert_eq!(sim.generation(), 0);
        // reseeded with a fresh full population
        assert_eq!(sim.world().live_count(), 20);
    }

    #[test]
    fn test_generation_callback_fires() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let mut sim = Simulation::new(test_config()).unwrap();
        let seen: Rc<RefCell<Vec<(u32, u32)>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        sim.on_generation_end(move |summary| {
            sink.borrow_mut().push((summary.generation, summary.survivors));
        });

        sim.run_generation();
        sim.run_generation();

        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, 0);
        assert_eq!(seen[1].0, 1);
        assert_eq!(seen[0].1, 20);
    }

    #[test]
    fn test_frame_callback_respects_stride() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let mut config = test_config();
        config.sim.frame_stride = 2;
        let mut sim = Simulation::new(config).unwrap();
        let frames: Rc<RefCell<u32>> = Rc::new(RefCell::new(0));
        let sink = frames.clone();
        sim.on_frame(move |snapshot| {
            assert_eq!(snapshot.agents.len(), 20);
            *sink.borrow_mut() += 1;
        });

        sim.run_generation(); // generation 0: emits every step
        sim.run_generation(); // generation 1: skipped by the stride
        assert_eq!(*frames.borrow(), 10);
    }

    #[test]
    fn test_stop_handle_halts_run() {
        let mut config = test_config();
        config.sim.max_generations = 1_000_000;
        let mut sim = Simulation::new(config).unwrap();
        let stop = sim.stop_handle();
        stop.store(false, Ordering::Relaxed);
        sim.run(); // returns immediately instead of looping for a month
        assert_eq!(sim.generation(), 0);
    }

    #[test]
    fn test_single_thread_determinism() {
        let run_positions = || {
            let mut sim = Simulation::new(test_config()).unwrap();
            sim.run_generation();
            sim.run_generation();
            sim.world()
                .peeps
                .agents()
                .map(|agent| (agent.index, agent.loc.x, agent.loc.y))
                .collect::<Vec<_>>()
        };
        assert_eq!(run_positions(), run_positions());
    }

    #[test]
    fn test_murder_counting_with_kill_enabled() {
        let mut config = test_config();
        config.reproduction.kill_enable = true;
        config.sim.steps_per_generation = 5;
        let mut sim = Simulation::new(config).unwrap();
        sim.run_generation();
        // murders may well be zero with random genomes; the counter is
        // bounded by one kill per agent per step
        assert!(sim.murders <= 100);
    }
}
