//! Reader/writer workload simulation.
//!
//! Spawns a set of reader and writer threads around one `ReadWriteGuard`.
//! Each task performs a random number of operations with a random pause
//! between them. The guarded resource is a counter that writers bump and
//! readers observe, so a finished run can be checked for lost writes.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, sleep, JoinHandle};
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use tracing::{debug, info};

use crate::caller::{ReaderId, WriterId};
use crate::error::{ConfigError, SimulationError};
use crate::guard::ReadWriteGuard;

/// Workload parameters, loadable from TOML. Missing keys take the defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig
{
    pub readers: u32,
    pub writers: u32,
    /// Each task runs `0..max_operations` operations. Must be at least 1.
    pub max_operations: u32,
    /// Pause after each operation, drawn from `0..max_pause_ms`.
    pub max_pause_ms: u64,
    pub read_work_ms: u64,
    pub write_work_ms: u64,
    /// Fixes operation counts, pauses and start order. Entropy when absent.
    pub seed: Option<u64>,
}

impl Default for SimulationConfig
{
    fn default() -> SimulationConfig {
        SimulationConfig {
            readers: 10,
            writers: 10,
            max_operations: 5,
            max_pause_ms: 1000,
            read_work_ms: 1000,
            write_work_ms: 1000,
            seed: None,
        }
    }
}

impl SimulationConfig
{
    pub fn from_toml_str(source: &str) -> Result<SimulationConfig, ConfigError> {
        let config: SimulationConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<SimulationConfig, ConfigError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        SimulationConfig::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_operations == 0 {
            return Err(ConfigError::Invalid {
                field: "max_operations",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    fn task_rng(&self, task_idx: u64) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(task_idx)),
            None => StdRng::from_entropy(),
        }
    }
}

/// Totals of a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationReport
{
    pub reads: u64,
    pub writes: u64,
    /// Counter value left in the resource. Equals `writes`.
    pub final_value: u64,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Copy)]
enum Task {
    Reader(ReaderId),
    Writer(WriterId),
}

#[derive(Debug)]
pub struct Simulation
{
    config: SimulationConfig,
    guard: Arc<ReadWriteGuard<u64>>,
}

impl Simulation
{
    pub fn new(config: SimulationConfig) -> Result<Simulation, ConfigError> {
        config.validate()?;
        Ok(Simulation {
            config,
            guard: Arc::new(ReadWriteGuard::new(0)),
        })
    }

    pub fn guard(&self) -> &ReadWriteGuard<u64> {
        &self.guard
    }

    /// Starts every task in shuffled order and waits for all of them.
    pub fn run(&self) -> Result<SimulationReport, SimulationError> {
        let config = &self.config;
        let mut tasks: Vec<Task> = (0..config.readers).map(|i| Task::Reader(ReaderId(i)))
            .chain((0..config.writers).map(|i| Task::Writer(WriterId(i))))
            .collect();
        tasks.shuffle(&mut config.task_rng(u64::from(config.readers) + u64::from(config.writers)));

        self.guard.write(WriterId(config.writers), |value| *value = 0);
        info!(readers = config.readers, writers = config.writers, "starting simulation");
        let now = Instant::now();

        let mut handles: Vec<(Task, JoinHandle<u64>)> = Vec::with_capacity(tasks.len());
        for (task_idx, task) in tasks.into_iter().enumerate() {
            let guard = self.guard.clone();
            let rng = config.task_rng(task_idx as u64);
            let config = config.clone();
            let name = task_name(task);

            let spawned = thread::Builder::new()
                .name(name.clone())
                .spawn(move || run_task(task, &guard, &config, rng));
            match spawned {
                Ok(handle) => handles.push((task, handle)),
                Err(source) => {
                    // Tasks already running still hold the guard; wait them out.
                    let _ = join_tasks(handles);
                    return Err(SimulationError::Spawn { task: name, source });
                }
            }
        }

        let (reads, writes) = join_tasks(handles)?;

        let report = SimulationReport {
            reads,
            writes,
            final_value: self.guard.read(ReaderId(config.readers), |value| *value),
            elapsed: now.elapsed(),
        };
        info!(reads, writes, final_value = report.final_value, elapsed = ?report.elapsed, "simulation finished");
        Ok(report)
    }
}

/// Joins every handle, even after one has panicked, and sums the operations
/// per role. The first panicked task is reported.
fn join_tasks(handles: Vec<(Task, JoinHandle<u64>)>) -> Result<(u64, u64), SimulationError> {
    let mut reads = 0;
    let mut writes = 0;
    let mut panicked = None;

    for (task, handle) in handles {
        match (task, handle.join()) {
            (Task::Reader(_), Ok(ops)) => reads += ops,
            (Task::Writer(_), Ok(ops)) => writes += ops,
            (_, Err(_)) => {
                panicked.get_or_insert_with(|| task_name(task));
            }
        }
    }

    match panicked {
        Some(task) => Err(SimulationError::TaskPanicked { task }),
        None => Ok((reads, writes)),
    }
}

fn task_name(task: Task) -> String {
    match task {
        Task::Reader(reader) => reader.to_string(),
        Task::Writer(writer) => writer.to_string(),
    }
}

fn run_task(task: Task, guard: &ReadWriteGuard<u64>, config: &SimulationConfig, mut rng: StdRng) -> u64 {
    let operations = rng.gen_range(0..config.max_operations);
    let read_work = Duration::from_millis(config.read_work_ms);
    let write_work = Duration::from_millis(config.write_work_ms);

    for _ in 0..operations {
        match task {
            Task::Reader(reader) => guard.read(reader, |value| {
                debug!(%reader, value = *value, "reading");
                sleep(read_work);
            }),
            Task::Writer(writer) => guard.write(writer, |value| {
                *value += 1;
                debug!(%writer, value = *value, "writing");
                sleep(write_work);
            }),
        }

        let pause = if config.max_pause_ms == 0 { 0 } else { rng.gen_range(0..config.max_pause_ms) };
        sleep(Duration::from_millis(pause));
    }

    u64::from(operations)
}
