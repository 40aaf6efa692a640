//! Neuroevolution of Snake controllers.
//!
//! Small feed-forward [`nn::Network`]s are scored by playing seeded games of
//! [`snake::Snake`] and bred by a [`population::Population`] using elitist
//! selection, single-point crossover and additive mutation.

pub mod config;
pub mod genome;
pub mod nn;
pub mod population;
pub mod snake;
