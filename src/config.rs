//! Configuration for the simulator.
//!
//! Supports YAML configuration files with sensible defaults. Every value is
//! validated once before the first generation; a bad configuration refuses
//! to start rather than being patched up at runtime.

use crate::challenges::Challenge;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub world: WorldConfig,
    #[serde(default)]
    pub sim: SimConfig,
    #[serde(default)]
    pub genome: GenomeConfig,
    #[serde(default)]
    pub mutation: MutationConfig,
    #[serde(default)]
    pub reproduction: ReproductionConfig,
    #[serde(default)]
    pub sensors: SensorConfig,
    #[serde(default)]
    pub rng: RngConfig,
}

/// Arena dimensions and static environment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Grid width in cells
    pub grid_size_x: u16,
    /// Grid height in cells
    pub grid_size_y: u16,
    /// Number of pheromone layers
    pub signal_layers: u16,
    /// Barrier preset id (0 = open arena)
    pub barrier_type: u32,
}

/// Run shape: population, generation length, parallelism, selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Number of agents per generation
    pub population: u32,
    /// Steps in one generation
    pub steps_per_generation: u32,
    /// Generations to run before stopping
    pub max_generations: u32,
    /// Worker threads for the per-agent phase (0 = one per core)
    pub num_threads: u16,
    /// Survival challenge id
    pub challenge: u32,
    /// Emit a frame snapshot every Nth generation (0 = never)
    pub frame_stride: u32,
}

/// Genome shape and comparison
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenomeConfig {
    /// Minimum gene count at generation zero
    pub initial_length_min: u32,
    /// Maximum gene count at generation zero
    pub initial_length_max: u32,
    /// Hard cap on gene count after mutation
    pub max_length: u32,
    /// Neuron budget per compiled network
    pub max_number_neurons: u32,
    /// 0 = Jaro-Winkler, 1 = bitwise Hamming, 2 = gene-atomic Hamming
    pub comparison_method: u32,
}

/// Mutation rates applied when children are generated
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MutationConfig {
    /// Per-gene probability of a structured bit flip
    pub point_mutation_rate: f64,
    /// Probability of one insertion-or-deletion event per child
    pub gene_insertion_deletion_rate: f64,
    /// Share of indel events that delete rather than insert
    pub deletion_ratio: f64,
}

/// Parent selection and recombination switches
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReproductionConfig {
    /// Two-parent crossover instead of cloning
    pub sexual_reproduction: bool,
    /// Bias parent picks toward higher survival scores
    pub choose_parents_by_fitness: bool,
    /// Allow the KILL_FORWARD action
    pub kill_enable: bool,
}

/// Sensor tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Neighborhood radius for population density sensors
    pub population_sensor_radius: f32,
    /// Neighborhood radius for pheromone sensors
    pub signal_sensor_radius: u32,
    /// Initial responsiveness for newborn agents
    pub responsiveness: f32,
    /// Response curve steepness, 1..=4
    pub responsiveness_curve_k_factor: u32,
    /// Initial forward probe reach in cells
    pub long_probe_distance: u32,
    /// Reach of the short differential barrier probe
    pub short_probe_barrier_distance: u32,
}

/// Random number generation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RngConfig {
    /// Reproducible per-thread streams derived from `seed`
    pub deterministic: bool,
    /// Base seed for deterministic mode
    pub seed: u32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            grid_size_x: 128,
            grid_size_y: 128,
            signal_layers: 1,
            barrier_type: 0,
        }
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            population: 1000,
            steps_per_generation: 300,
            max_generations: 200,
            num_threads: 0,
            challenge: 6,
            frame_stride: 0,
        }
    }
}

impl Default for GenomeConfig {
    fn default() -> Self {
        Self {
            initial_length_min: 24,
            initial_length_max: 24,
            max_length: 300,
            max_number_neurons: 5,
            comparison_method: 0,
        }
    }
}

impl Default for MutationConfig {
    fn default() -> Self {
        Self {
            point_mutation_rate: 0.001,
            gene_insertion_deletion_rate: 0.0,
            deletion_ratio: 0.5,
        }
    }
}

impl Default for ReproductionConfig {
    fn default() -> Self {
        Self {
            sexual_reproduction: true,
            choose_parents_by_fitness: true,
            kill_enable: false,
        }
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            population_sensor_radius: 2.5,
            signal_sensor_radius: 2,
            responsiveness: 0.5,
            responsiveness_curve_k_factor: 2,
            long_probe_distance: 16,
            short_probe_barrier_distance: 4,
        }
    }
}

impl Default for RngConfig {
    fn default() -> Self {
        Self {
            deterministic: false,
            seed: 12345678,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Validate configuration values. Failing any check is fatal for the run.
    pub fn validate(&self) -> Result<(), String> {
        if self.world.grid_size_x < 2 || self.world.grid_size_y < 2 {
            return Err("grid dimensions must be at least 2x2".to_string());
        }
        if self.sim.population == 0 {
            return Err("population must be > 0".to_string());
        }
        let capacity = self.world.grid_size_x as u32 * self.world.grid_size_y as u32;
        if self.sim.population > capacity / 4 {
            return Err(format!(
                "population {} exceeds a quarter of the grid capacity ({})",
                self.sim.population,
                capacity / 4
            ));
        }
        if self.sim.population > 0xfffe {
            return Err("population must fit in 16-bit agent indices".to_string());
        }
        if self.sim.steps_per_generation == 0 {
            return Err("steps_per_generation must be > 0".to_string());
        }
        if self.sim.max_generations == 0 {
            return Err("max_generations must be >= 1".to_string());
        }
        if Challenge::from_id(self.sim.challenge).is_none() {
            return Err(format!("unknown challenge id {}", self.sim.challenge));
        }
        if self.world.barrier_type > 6 {
            return Err(format!("unknown barrier type {}", self.world.barrier_type));
        }
        if self.genome.initial_length_min == 0 {
            return Err("genome initial_length_min must be > 0".to_string());
        }
        if self.genome.initial_length_min > self.genome.initial_length_max {
            return Err("genome initial_length_min must be <= initial_length_max".to_string());
        }
        if self.genome.max_length < self.genome.initial_length_max {
            return Err("genome max_length must cover the initial length range".to_string());
        }
        if self.genome.max_number_neurons == 0 || self.genome.max_number_neurons > 128 {
            // gene indices carry 7 bits, so larger budgets are unreachable
            return Err("max_number_neurons must be in 1..=128".to_string());
        }
        if self.genome.comparison_method > 2 {
            return Err("genome comparison_method must be 0, 1, or 2".to_string());
        }
        for (name, rate) in [
            ("point_mutation_rate", self.mutation.point_mutation_rate),
            (
                "gene_insertion_deletion_rate",
                self.mutation.gene_insertion_deletion_rate,
            ),
            ("deletion_ratio", self.mutation.deletion_ratio),
        ] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(format!("{name} must be in [0, 1]"));
            }
        }
        if self.sensors.population_sensor_radius <= 0.0 {
            return Err("population_sensor_radius must be > 0".to_string());
        }
        if self.sensors.signal_sensor_radius == 0 {
            return Err("signal_sensor_radius must be > 0".to_string());
        }
        if self.sensors.responsiveness < 0.0 {
            return Err("responsiveness must be >= 0".to_string());
        }
        if !(1..=4).contains(&self.sensors.responsiveness_curve_k_factor) {
            return Err("responsiveness_curve_k_factor must be in 1..=4".to_string());
        }
        if self.sensors.long_probe_distance == 0 {
            return Err("long_probe_distance must be > 0".to_string());
        }
        if self.sensors.short_probe_barrier_distance == 0 {
            return Err("short_probe_barrier_distance must be > 0".to_string());
        }
        Ok(())
    }
}
