//! Runs the reader/writer workload simulation.
//!
//! Usage: `cargo run --example simulate [config.toml]`

extern crate rw_guard;

use std::env;
use std::error::Error;

use rw_guard::simulation::{Simulation, SimulationConfig};

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_thread_names(true)
        .init();

    let config = match env::args().nth(1) {
        Some(path) => SimulationConfig::load(path)?,
        None => SimulationConfig::default(),
    };

    let report = Simulation::new(config)?.run()?;
    println!(
        "{} reads, {} writes, final value {} in {:.2?}",
        report.reads, report.writes, report.final_value, report.elapsed
    );

    Ok(())
}
