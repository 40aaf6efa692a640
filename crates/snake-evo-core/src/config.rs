use serde::{Deserialize, Serialize};
use std::{error::Error, fmt};

/// Grid and budget settings for a single fitness trial.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialConfig {
    pub grid_height: usize,
    pub grid_width: usize,
    pub initial_length: usize,
    /// Moves allowed between meals before the snake starves.
    pub move_limit: u32,
}

impl Default for TrialConfig {
    fn default() -> Self {
        Self {
            grid_height: 16,
            grid_width: 16,
            initial_length: 3,
            move_limit: 100,
        }
    }
}

impl TrialConfig {
    /// Longest initial body the horizontal spawn layout can always fit.
    pub fn max_initial_length(&self) -> usize {
        self.grid_width.div_ceil(2)
    }

    pub fn cell_count(&self) -> usize {
        self.grid_height.saturating_mul(self.grid_width)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid_height == 0 || self.grid_width == 0 {
            return Err(ConfigError::EmptyGrid {
                height: self.grid_height,
                width: self.grid_width,
            });
        }
        if self.grid_height > i32::MAX as usize || self.grid_width > i32::MAX as usize {
            return Err(ConfigError::GridTooLarge {
                height: self.grid_height,
                width: self.grid_width,
            });
        }
        if self.initial_length == 0 || self.initial_length > self.max_initial_length() {
            return Err(ConfigError::InitialLength {
                length: self.initial_length,
                max: self.max_initial_length(),
            });
        }
        if self.move_limit == 0 {
            return Err(ConfigError::ZeroMoveLimit);
        }
        Ok(())
    }
}

/// Parameters of a full evolutionary run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvolutionConfig {
    pub seed: u64,
    pub population_size: usize,
    /// Probability that any single weight or bias is perturbed during mutation.
    pub mutation_rate: f64,
    pub generations: usize,
    pub trials_per_network: usize,
    /// Number of top-ranked networks carried into the next generation.
    pub selected_count: usize,
    pub hidden_widths: Vec<usize>,
    pub trial: TrialConfig,
    /// Evaluate networks on the rayon thread pool.
    pub parallel: bool,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            population_size: 100,
            mutation_rate: 0.2,
            generations: 100,
            trials_per_network: 5,
            selected_count: 5,
            hidden_widths: vec![16, 16],
            trial: TrialConfig::default(),
            parallel: true,
        }
    }
}

impl EvolutionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.trial.validate()?;
        if self.population_size == 0 {
            return Err(ConfigError::EmptyPopulation);
        }
        if !self.mutation_rate.is_finite() || !(0.0..=1.0).contains(&self.mutation_rate) {
            return Err(ConfigError::MutationRate(self.mutation_rate));
        }
        if self.trials_per_network == 0 {
            return Err(ConfigError::ZeroTrials);
        }
        if self.selected_count < 2 {
            return Err(ConfigError::SelectedTooFew(self.selected_count));
        }
        if self.selected_count > self.population_size {
            return Err(ConfigError::SelectedExceedsPopulation {
                selected: self.selected_count,
                population: self.population_size,
            });
        }
        if let Some(index) = self.hidden_widths.iter().position(|&w| w == 0) {
            return Err(ConfigError::ZeroHiddenWidth { index });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    EmptyGrid { height: usize, width: usize },
    GridTooLarge { height: usize, width: usize },
    InitialLength { length: usize, max: usize },
    ZeroMoveLimit,
    EmptyPopulation,
    MutationRate(f64),
    ZeroTrials,
    SelectedTooFew(usize),
    SelectedExceedsPopulation { selected: usize, population: usize },
    ZeroHiddenWidth { index: usize },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::EmptyGrid { height, width } => {
                write!(f, "grid must have positive area (got {height}x{width})")
            }
            ConfigError::GridTooLarge { height, width } => {
                write!(f, "grid {height}x{width} exceeds supported dimensions")
            }
            ConfigError::InitialLength { length, max } => {
                write!(
                    f,
                    "initial_length ({length}) must be between 1 and {max}; \
                     the body spawns horizontally within half the grid width"
                )
            }
            ConfigError::ZeroMoveLimit => write!(f, "move_limit must be positive"),
            ConfigError::EmptyPopulation => write!(f, "population_size must be positive"),
            ConfigError::MutationRate(rate) => {
                write!(f, "mutation_rate ({rate}) must be within [0, 1]")
            }
            ConfigError::ZeroTrials => write!(f, "trials_per_network must be positive"),
            ConfigError::SelectedTooFew(selected) => {
                write!(f, "selected_count ({selected}) must be at least 2")
            }
            ConfigError::SelectedExceedsPopulation {
                selected,
                population,
            } => write!(
                f,
                "selected_count ({selected}) exceeds population_size ({population})"
            ),
            ConfigError::ZeroHiddenWidth { index } => {
                write!(f, "hidden layer {index} must have positive width")
            }
        }
    }
}

impl Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(TrialConfig::default().validate(), Ok(()));
        assert_eq!(EvolutionConfig::default().validate(), Ok(()));
    }

    #[test]
    fn rejects_degenerate_grid() {
        let trial = TrialConfig {
            grid_height: 0,
            ..TrialConfig::default()
        };
        assert_eq!(
            trial.validate(),
            Err(ConfigError::EmptyGrid {
                height: 0,
                width: 16
            })
        );
    }

    #[test]
    fn initial_length_bounded_by_half_width() {
        let odd = TrialConfig {
            grid_width: 7,
            initial_length: 4,
            ..TrialConfig::default()
        };
        assert_eq!(odd.validate(), Ok(()));

        let too_long = TrialConfig {
            grid_width: 6,
            initial_length: 4,
            ..TrialConfig::default()
        };
        assert_eq!(
            too_long.validate(),
            Err(ConfigError::InitialLength { length: 4, max: 3 })
        );
        let message = too_long.validate().unwrap_err().to_string();
        assert!(message.contains("half the grid width"), "{message}");
    }

    #[test]
    fn rejects_selection_below_two() {
        let config = EvolutionConfig {
            selected_count: 1,
            ..EvolutionConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err, ConfigError::SelectedTooFew(1));
        assert!(err.to_string().contains("selected_count"));
    }

    #[test]
    fn rejects_out_of_range_mutation_rate() {
        for rate in [-0.1, 1.5, f64::NAN] {
            let config = EvolutionConfig {
                mutation_rate: rate,
                ..EvolutionConfig::default()
            };
            assert!(matches!(
                config.validate(),
                Err(ConfigError::MutationRate(_))
            ));
        }
    }

    #[test]
    fn rejects_zero_hidden_width() {
        let config = EvolutionConfig {
            hidden_widths: vec![8, 0],
            ..EvolutionConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroHiddenWidth { index: 1 })
        );
    }
}
