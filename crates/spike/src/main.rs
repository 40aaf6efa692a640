use anyhow::{Context, Result};
use clap::Parser;
use snake_evo_core::config::{EvolutionConfig, TrialConfig};
use snake_evo_core::population::Population;
use std::fs;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "snake-evo")]
#[command(version, about = "Evolve Snake-playing neural networks with a genetic algorithm")]
struct Cli {
    /// Number of networks per generation
    #[arg(long, default_value = "100")]
    population_size: usize,

    /// Probability that each weight or bias is perturbed in a mutated child
    #[arg(long, default_value = "0.2")]
    mutation_rate: f64,

    /// Number of evaluate/select/reproduce cycles
    #[arg(long, default_value = "100")]
    generations: usize,

    /// Independent games played per network when scoring fitness
    #[arg(long, default_value = "5")]
    trials: usize,

    /// Top networks kept unchanged each generation (at least 2)
    #[arg(long, default_value = "5")]
    selected: usize,

    #[arg(long, default_value = "16")]
    grid_height: usize,

    #[arg(long, default_value = "16")]
    grid_width: usize,

    #[arg(long, default_value = "3")]
    initial_length: usize,

    /// Moves allowed between meals before the snake starves
    #[arg(long, default_value = "100")]
    move_limit: u32,

    /// Hidden layer widths, comma separated
    #[arg(long, value_delimiter = ',', default_value = "16,16")]
    hidden: Vec<usize>,

    #[arg(long, default_value = "42")]
    seed: u64,

    /// Evaluate networks on the current thread only
    #[arg(long)]
    sequential: bool,

    /// Write the JSON run summary here instead of stdout
    #[arg(long)]
    summary_out: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Cli {
    fn evolution_config(&self) -> EvolutionConfig {
        EvolutionConfig {
            seed: self.seed,
            population_size: self.population_size,
            mutation_rate: self.mutation_rate,
            generations: self.generations,
            trials_per_network: self.trials,
            selected_count: self.selected,
            hidden_widths: self.hidden.clone(),
            trial: TrialConfig {
                grid_height: self.grid_height,
                grid_width: self.grid_width,
                initial_length: self.initial_length,
                move_limit: self.move_limit,
            },
            parallel: !self.sequential,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    let config = cli.evolution_config();
    info!(
        population_size = config.population_size,
        generations = config.generations,
        trials = config.trials_per_network,
        selected = config.selected_count,
        "starting evolution"
    );
    let mut population = Population::try_new(config).context("invalid configuration")?;
    let summary = population.run().context("evolution failed")?;

    if let Some(best) = summary
        .stats
        .iter()
        .max_by(|a, b| a.best_fitness.total_cmp(&b.best_fitness))
    {
        info!(
            generation = best.generation + 1,
            fitness = best.best_fitness,
            seed = best.best_trial.as_ref().map(|t| t.seed),
            "best generation"
        );
    }

    let json = summary.to_json_pretty()?;
    match &cli.summary_out {
        Some(path) => {
            fs::write(path, json)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), "wrote run summary");
        }
        None => println!("{json}"),
    }
    Ok(())
}
