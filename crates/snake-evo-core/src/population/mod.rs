pub mod metrics;

pub use metrics::*;

use crate::config::{ConfigError, EvolutionConfig, TrialConfig};
use crate::genome;
use crate::nn::{Network, NetworkError};
use crate::snake::{Action, Snake, SnakeError, SENSE_LEN};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha12Rng;
use rayon::prelude::*;
use std::{error::Error, fmt};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub enum EvolutionError {
    Config(ConfigError),
    Network(NetworkError),
    Snake(SnakeError),
    /// Selection needs fitness from an evaluation pass over the current generation.
    NotEvaluated,
}

impl fmt::Display for EvolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvolutionError::Config(e) => write!(f, "{e}"),
            EvolutionError::Network(e) => write!(f, "{e}"),
            EvolutionError::Snake(e) => write!(f, "{e}"),
            EvolutionError::NotEvaluated => {
                write!(f, "population must be evaluated before selection")
            }
        }
    }
}

impl From<ConfigError> for EvolutionError {
    fn from(err: ConfigError) -> Self {
        EvolutionError::Config(err)
    }
}

impl From<NetworkError> for EvolutionError {
    fn from(err: NetworkError) -> Self {
        EvolutionError::Network(err)
    }
}

impl From<SnakeError> for EvolutionError {
    fn from(err: SnakeError) -> Self {
        EvolutionError::Snake(err)
    }
}

impl Error for EvolutionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            EvolutionError::Config(e) => Some(e),
            EvolutionError::Network(e) => Some(e),
            EvolutionError::Snake(e) => Some(e),
            EvolutionError::NotEvaluated => None,
        }
    }
}

/// Fixed-size pool of snake controllers evolved by a genetic algorithm.
pub struct Population {
    pub(crate) networks: Vec<Network>,
    /// One record per network from the latest evaluation pass; empty when stale.
    pub(crate) records: Vec<NetworkRecord>,
    pub(crate) config: EvolutionConfig,
    pub(crate) rng: ChaCha12Rng,
    pub(crate) generation: usize,
}

impl Population {
    pub fn new(config: EvolutionConfig) -> Self {
        Self::try_new(config).unwrap_or_else(|e| panic!("{e}"))
    }

    pub fn try_new(config: EvolutionConfig) -> Result<Self, EvolutionError> {
        config.validate()?;
        let mut population = Self {
            networks: Vec::new(),
            records: Vec::new(),
            rng: ChaCha12Rng::seed_from_u64(config.seed),
            generation: 0,
            config,
        };
        population.initialize(population.config.population_size)?;
        Ok(population)
    }

    /// Replace the pool with `size` freshly initialized networks and reset the
    /// generation counter.
    pub fn initialize(&mut self, size: usize) -> Result<(), EvolutionError> {
        if size == 0 {
            return Err(ConfigError::EmptyPopulation.into());
        }
        if size < self.config.selected_count {
            return Err(ConfigError::SelectedExceedsPopulation {
                selected: self.config.selected_count,
                population: size,
            }
            .into());
        }
        let mut networks = Vec::with_capacity(size);
        for _ in 0..size {
            let mut network =
                Network::try_new(SENSE_LEN, &self.config.hidden_widths, Action::ALL.len())?;
            network.initialize_parameters(&mut self.rng);
            networks.push(network);
        }
        self.networks = networks;
        self.records.clear();
        self.generation = 0;
        self.config.population_size = size;
        Ok(())
    }

    /// Run `trials_per_network` independent trials for every network and store
    /// the mean food eaten as its fitness.
    ///
    /// All networks in one pass see the same set of distinct trial seeds.
    pub fn evaluate(
        &mut self,
        trials_per_network: usize,
        move_limit: u32,
    ) -> Result<(), EvolutionError> {
        if trials_per_network == 0 {
            return Err(ConfigError::ZeroTrials.into());
        }
        let trial = TrialConfig {
            move_limit,
            ..self.config.trial
        };
        trial.validate()?;

        let base_seed: u64 = self.rng.random();
        let seeds: Vec<u64> = (0..trials_per_network as u64)
            .map(|i| base_seed.wrapping_add(i))
            .collect();

        let records: Result<Vec<NetworkRecord>, SnakeError> = if self.config.parallel {
            self.networks
                .par_iter()
                .map(|network| evaluate_network(network, trial, &seeds))
                .collect()
        } else {
            self.networks
                .iter()
                .map(|network| evaluate_network(network, trial, &seeds))
                .collect()
        };
        self.records = records?;
        debug!(
            generation = self.generation,
            networks = self.networks.len(),
            trials_per_network,
            base_seed,
            "evaluation pass complete"
        );
        Ok(())
    }

    /// Keep the `selected_count` fittest networks and refill the pool with
    /// children bred from them, then advance the generation counter.
    pub fn select_and_reproduce(&mut self, selected_count: usize) -> Result<(), EvolutionError> {
        if selected_count < 2 {
            return Err(ConfigError::SelectedTooFew(selected_count).into());
        }
        if selected_count > self.networks.len() {
            return Err(ConfigError::SelectedExceedsPopulation {
                selected: selected_count,
                population: self.networks.len(),
            }
            .into());
        }
        if !self.is_evaluated() {
            return Err(EvolutionError::NotEvaluated);
        }

        let ranking = self.ranking();
        let elites: Vec<Network> = ranking[..selected_count]
            .iter()
            .map(|&i| self.networks[i].clone())
            .collect();

        let size = self.networks.len();
        let mut next = elites.clone();
        next.reserve(size - selected_count);
        let mut crossovers = 0;
        while next.len() < size {
            let child = if self.rng.random_bool(0.5) {
                let a = &elites[self.rng.random_range(0..selected_count)];
                let b = &elites[self.rng.random_range(0..selected_count)];
                crossovers += 1;
                genome::crossover(a, b, &mut self.rng)?
            } else {
                let parent = &elites[self.rng.random_range(0..selected_count)];
                genome::mutate(parent, self.config.mutation_rate, &mut self.rng)
            };
            next.push(child);
        }
        debug!(
            generation = self.generation,
            selected_count,
            crossovers,
            mutations = size - selected_count - crossovers,
            "bred next generation"
        );

        self.networks = next;
        self.records.clear();
        self.generation += 1;
        Ok(())
    }

    /// Mutated copy of `network` using this population's mutation rate.
    pub fn mutation(&mut self, network: &Network) -> Network {
        genome::mutate(network, self.config.mutation_rate, &mut self.rng)
    }

    pub fn crossover(&mut self, a: &Network, b: &Network) -> Result<Network, EvolutionError> {
        Ok(genome::crossover(a, b, &mut self.rng)?)
    }

    /// Network indices sorted by fitness, best first. Equal fitness keeps the
    /// current order. Empty if the generation has not been evaluated.
    pub fn ranking(&self) -> Vec<usize> {
        if !self.is_evaluated() {
            return Vec::new();
        }
        let mut order: Vec<usize> = (0..self.networks.len()).collect();
        order.sort_by(|&a, &b| self.records[b].fitness.total_cmp(&self.records[a].fitness));
        order
    }

    pub fn fittest(&self) -> Option<(&Network, &NetworkRecord)> {
        let best = *self.ranking().first()?;
        Some((&self.networks[best], &self.records[best]))
    }

    /// Evolve for `config.generations` generations, logging per-generation
    /// statistics.
    pub fn run(&mut self) -> Result<RunSummary, EvolutionError> {
        let generations = self.config.generations;
        let mut stats = Vec::with_capacity(generations);
        for _ in 0..generations {
            self.evaluate(self.config.trials_per_network, self.config.trial.move_limit)?;
            if let Some(gen_stats) = self.generation_stats() {
                info!(
                    generation = gen_stats.generation + 1,
                    best = gen_stats.best_fitness,
                    mean = gen_stats.mean_fitness,
                    worst = gen_stats.worst_fitness,
                    "generation evaluated"
                );
                stats.push(gen_stats);
            }
            self.select_and_reproduce(self.config.selected_count)?;
        }
        Ok(RunSummary {
            schema_version: 1,
            generations,
            population_size: self.networks.len(),
            stats,
        })
    }

    pub fn is_evaluated(&self) -> bool {
        !self.networks.is_empty() && self.records.len() == self.networks.len()
    }

    pub fn networks(&self) -> &[Network] {
        &self.networks
    }

    pub fn records(&self) -> &[NetworkRecord] {
        &self.records
    }

    pub fn generation(&self) -> usize {
        self.generation
    }

    pub fn size(&self) -> usize {
        self.networks.len()
    }

    pub fn mutation_rate(&self) -> f64 {
        self.config.mutation_rate
    }

    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }
}

fn evaluate_network(
    network: &Network,
    trial: TrialConfig,
    seeds: &[u64],
) -> Result<NetworkRecord, SnakeError> {
    let trials = seeds
        .iter()
        .map(|&seed| -> Result<TrialRecord, SnakeError> {
            let outcome = Snake::try_new(network, trial, seed)?.run_to_end();
            Ok(TrialRecord {
                seed,
                trial,
                eaten: outcome.eaten,
                steps: outcome.steps,
                cause: outcome.cause,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(NetworkRecord::from_trials(trials))
}
