//! # EVOLVARIUM
//!
//! Evolutionary neuroevolution simulator: a fixed-size population of agents
//! lives on a bounded 2D grid, each driven by a small recurrent neural
//! network compiled from its genome. Agents act in lockstep for a fixed
//! number of steps per generation; a survival challenge then selects the
//! parents whose genomes, recombined and mutated, seed the next generation.
//!
//! ## Features
//!
//! - **Parallel**: per-agent work fans out across a rayon pool; deferred
//!   move/death/signal queues keep the step race-free
//! - **Reproducible**: seeded per-thread RNG streams; single-threaded runs
//!   are bit-deterministic
//! - **Configurable**: YAML configuration with validation up front
//! - **Embeddable**: frame and generation callbacks for external renderers
//!   and loggers
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use evolvarium::{Config, Simulation};
//!
//! let mut config = Config::default();
//! config.sim.population = 500;
//! config.sim.max_generations = 50;
//!
//! let mut sim = Simulation::new(config).unwrap();
//! sim.on_generation_end(|summary| {
//!     println!("gen {}: {} survivors", summary.generation, summary.survivors);
//! });
//! sim.run();
//! ```

pub mod actions;
pub mod agent;
pub mod barriers;
pub mod brain;
pub mod challenges;
pub mod config;
pub mod genome;
pub mod geometry;
pub mod grid;
pub mod peeps;
pub mod rng;
pub mod sensors;
pub mod signals;
pub mod simulation;
pub mod world;

pub use challenges::Challenge;
pub use config::Config;
pub use simulation::{GenerationSummary, Simulation};
pub use world::{Snapshot, World};
