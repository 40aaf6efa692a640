use snake_evo_core::config::{EvolutionConfig, TrialConfig};
use snake_evo_core::population::Population;
use std::time::Instant;

fn main() {
    let config = EvolutionConfig {
        seed: 42,
        population_size: 200,
        trials_per_network: 10,
        selected_count: 10,
        trial: TrialConfig {
            move_limit: 200,
            ..TrialConfig::default()
        },
        ..EvolutionConfig::default()
    };
    println!(
        "Benchmarking evaluation of {} networks x {} trials on a {}x{} grid",
        config.population_size,
        config.trials_per_network,
        config.trial.grid_height,
        config.trial.grid_width
    );

    let mut sequential = Population::new(EvolutionConfig {
        parallel: false,
        ..config.clone()
    });
    let mut parallel = Population::new(config.clone());

    let passes = 5;

    let start = Instant::now();
    for _ in 0..passes {
        sequential
            .evaluate(config.trials_per_network, config.trial.move_limit)
            .expect("sequential evaluation failed");
    }
    let duration_sequential = start.elapsed();
    println!("Time for {} passes sequential: {:?}", passes, duration_sequential);
    println!("Avg time per pass (sequential): {:?}", duration_sequential / passes);

    let start = Instant::now();
    for _ in 0..passes {
        parallel
            .evaluate(config.trials_per_network, config.trial.move_limit)
            .expect("parallel evaluation failed");
    }
    let duration_parallel = start.elapsed();
    println!("Time for {} passes parallel: {:?}", passes, duration_parallel);
    println!("Avg time per pass (parallel): {:?}", duration_parallel / passes);

    assert_eq!(
        sequential.records(),
        parallel.records(),
        "parallel evaluation must match sequential results"
    );
    let speedup = duration_sequential.as_secs_f64() / duration_parallel.as_secs_f64().max(1e-9);
    println!("Speedup: {:.2}x", speedup);
}
