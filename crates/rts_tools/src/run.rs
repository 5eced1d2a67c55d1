//! Headless scenario runs.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rts_behavior::config::SimulationConfig;
use rts_behavior::gameset::GameSet;
use rts_behavior::replay::ReplayLog;
use rts_behavior::scenario::{Scenario, ScenarioDef};
use rts_behavior::simulation::Simulation;
use serde::Serialize;

use crate::Result;

/// Inputs of a headless run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Gameset file.
    pub gameset: PathBuf,
    /// Scenario file.
    pub scenario: PathBuf,
    /// Number of ticks to simulate.
    pub ticks: u64,
    /// Simulation config file; defaults when absent.
    pub config: Option<PathBuf>,
    /// Seed override.
    pub seed: Option<u64>,
    /// Where to write the replay log.
    pub replay: Option<PathBuf>,
}

/// What a run produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    /// Scenario file name.
    pub scenario: String,
    /// Seed used.
    pub seed: u64,
    /// Ticks simulated.
    pub ticks: u64,
    /// Simulation time at the end, in seconds.
    pub final_time: f64,
    /// State hash at the end.
    pub final_hash: u64,
    /// Objects alive at the end.
    pub objects: usize,
    /// Notifications emitted, by kind.
    pub notifications: BTreeMap<&'static str, usize>,
    /// Idle edges seen.
    pub idle_edges: usize,
    /// Scripted commands executed.
    pub commands_run: usize,
}

fn config_for(options: &RunOptions) -> Result<SimulationConfig> {
    let mut config = match &options.config {
        Some(path) => SimulationConfig::load(path)?,
        None => SimulationConfig::default(),
    };
    if let Some(seed) = options.seed {
        config.seed = seed;
    }
    Ok(config)
}

fn scenario_name(path: &Path) -> String {
    path.file_stem()
        .map_or_else(|| path.display().to_string(), |s| s.to_string_lossy().into_owned())
}

/// Load the inputs, run the scenario and optionally save a replay.
///
/// # Errors
///
/// Returns the first content error from loading or from any tick.
pub fn run_scenario(options: &RunOptions) -> Result<RunSummary> {
    let gameset = Arc::new(GameSet::load(&options.gameset)?);
    let def = ScenarioDef::load(&options.scenario)?;
    let config = config_for(options)?;
    let seed = config.seed;

    let mut sim = Simulation::new(gameset, config);
    let scenario = Scenario::install(&def, &mut sim)?;

    let name = scenario_name(&options.scenario);
    let mut log = ReplayLog::new(name.clone(), seed);
    let mut summary = RunSummary {
        scenario: name,
        seed,
        ..RunSummary::default()
    };

    for _ in 0..options.ticks {
        summary.commands_run += scenario.run_commands(&mut sim)?;
        let events = sim.tick()?;
        for n in &events.notifications {
            tracing::debug!(tick = events.tick, object = n.object().0, kind = n.kind(), "notification");
            *summary.notifications.entry(n.kind()).or_default() += 1;
        }
        summary.idle_edges += events.went_idle.len();
        if options.replay.is_some() {
            log.record(&events, sim.state_hash());
        }
    }

    summary.ticks = sim.get_tick();
    summary.final_time = sim.now().to_num::<f64>();
    summary.final_hash = sim.state_hash();
    summary.objects = sim.world().sorted_ids().len();

    if let Some(path) = &options.replay {
        log.save(path)?;
        tracing::info!(path = %path.display(), ticks = log.final_tick(), "replay written");
    }
    Ok(summary)
}
