//! EVOLVARIUM - CLI entry point.

use clap::{Parser, Subcommand};
use evolvarium::{Config, Simulation};
use log::{info, warn};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "evolvarium")]
#[command(version)]
#[command(about = "Evolutionary neuroevolution simulator on a 2D grid")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulation
    Run {
        /// Configuration file (YAML)
        #[arg(short, long, default_value = "evolvarium.yaml")]
        config: PathBuf,

        /// Override the configured number of generations
        #[arg(short, long)]
        generations: Option<u32>,

        /// Override the RNG seed (implies deterministic mode)
        #[arg(long)]
        seed: Option<u32>,

        /// Quiet mode (suppress per-generation lines)
        #[arg(short, long)]
        quiet: bool,
    },

    /// Write a default configuration file
    Init {
        /// Output path
        #[arg(short, long, default_value = "evolvarium.yaml")]
        output: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            config,
            generations,
            seed,
            quiet,
        } => run_simulation(config, generations, seed, quiet),
        Commands::Init { output } => generate_config(output),
    }
}

fn run_simulation(
    config_path: PathBuf,
    generations: Option<u32>,
    seed: Option<u32>,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = if config_path.exists() {
        Config::from_file(&config_path)?
    } else {
        warn!(
            "config file {} not found, using defaults",
            config_path.display()
        );
        Config::default()
    };

    if let Some(generations) = generations {
        config.sim.max_generations = generations;
    }
    if let Some(seed) = seed {
        config.rng.deterministic = true;
        config.rng.seed = seed;
    }

    let max_generations = config.sim.max_generations;
    info!(
        "starting: grid {}x{}, population {}, challenge {}, {} generations",
        config.world.grid_size_x,
        config.world.grid_size_y,
        config.sim.population,
        config.sim.challenge,
        max_generations
    );

    let mut sim = Simulation::new(config)?;
    if !quiet {
        sim.on_generation_end(|summary| {
            info!(
                "generation {}: {} survivors, {} murders, diversity {:.3}",
                summary.generation, summary.survivors, summary.murders, summary.diversity
            );
        });
    }

    let started = Instant::now();
    sim.run();
    let elapsed = started.elapsed();

    info!(
        "finished {} generations in {:.1}s",
        max_generations,
        elapsed.as_secs_f64()
    );
    Ok(())
}

fn generate_config(output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    config.save(&output)?;
    info!("wrote default configuration to {}", output.display());
    Ok(())
}
