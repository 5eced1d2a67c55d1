//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the simulation produces identical
//! results given identical inputs.
//!
//! # Testing Strategy
//!
//! Sources of non-determinism this harness is meant to catch:
//!
//! - **Time drift**: simulation time is fixed-point
//!   ([`rts_behavior::math::GameTime`]), never accumulated floats.
//! - **HashMap iteration order**: objects are always processed in sorted
//!   id order, and spatial queries return sorted ids.
//! - **Randomness**: every `RANDOM_*` node draws from the world's seeded
//!   generator.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: individual evaluators and state machines
//! 2. **Property tests**: random inputs must still produce deterministic outputs
//! 3. **Integration tests**: full scenarios are reproducible
//! 4. **Parallel tests**: running N simulations on N threads all match

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use rts_behavior::replay::ReplayLog;
use rts_behavior::simulation::Simulation;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// All distinct hashes (one for a deterministic simulation).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the simulation was deterministic.
    ///
    /// # Panics
    ///
    /// Panics if the simulation produced different hashes across runs.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Simulation is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a state machine several times and compare final hashes.
///
/// ```
/// use rts_test_utils::determinism::verify_determinism;
///
/// let result = verify_determinism(3, 10, || 0u64, |n| *n += 3, |n| *n);
/// result.assert_deterministic();
/// ```
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);
    for _ in 0..runs {
        let mut state = setup();
        for _ in 0..ticks {
            step(&mut state);
        }
        hashes.push(hash(&state));
    }
    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);
    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Advance a simulation by one tick, panicking on content errors.
///
/// # Panics
///
/// Panics if the tick fails.
pub fn tick_or_panic(sim: &mut Simulation) {
    if let Err(err) = sim.tick() {
        panic!("tick {} failed: {err}", sim.get_tick() + 1);
    }
}

/// Run a simulation twice with identical setup and compare final hashes.
pub fn verify_simulation_determinism<F>(setup_fn: F, num_ticks: u64) -> bool
where
    F: Fn() -> Simulation,
{
    verify_determinism(2, num_ticks, &setup_fn, tick_or_panic, Simulation::state_hash)
        .is_deterministic
}

/// Result of parallel simulation runs.
#[derive(Debug, Clone)]
pub struct ParallelSimResult {
    /// Final state hash from each simulation.
    pub hashes: Vec<u64>,
    /// Number of ticks each simulation ran.
    pub ticks: u64,
    /// Number of simulations run.
    pub num_sims: usize,
}

impl ParallelSimResult {
    /// Whether all simulations produced identical results.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.hashes.windows(2).all(|w| w[0] == w[1])
    }

    /// Assert all simulations matched.
    ///
    /// # Panics
    ///
    /// Panics if simulations produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic() {
            let mut unique: Vec<u64> = self.hashes.clone();
            unique.sort_unstable();
            unique.dedup();
            panic!(
                "Parallel simulations diverged!\n\
                 Simulations: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {}\n\
                 All hashes: {:?}",
                self.num_sims,
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run N simulations on scoped threads and collect final hashes.
///
/// # Panics
///
/// Panics if a simulation thread panics.
pub fn run_parallel_simulations<F>(setup_fn: F, num_sims: usize, num_ticks: u64) -> ParallelSimResult
where
    F: Fn() -> Simulation + Sync,
{
    let hashes = thread::scope(|s| {
        let handles: Vec<_> = (0..num_sims)
            .map(|_| {
                s.spawn(|| {
                    let mut sim = setup_fn();
                    for _ in 0..num_ticks {
                        tick_or_panic(&mut sim);
                    }
                    sim.state_hash()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("simulation thread panicked"))
            .collect()
    });

    ParallelSimResult {
        hashes,
        ticks: num_ticks,
        num_sims,
    }
}

/// Compare two runs tick by tick.
///
/// Returns `None` if they never differ, `Some(tick)` for the first tick
/// whose state hashes differ.
pub fn find_first_divergence<F>(setup_fn: F, num_ticks: u64) -> Option<u64>
where
    F: Fn() -> Simulation,
{
    let mut sim1 = setup_fn();
    let mut sim2 = setup_fn();
    if sim1.state_hash() != sim2.state_hash() {
        return Some(0);
    }
    for tick in 1..=num_ticks {
        tick_or_panic(&mut sim1);
        tick_or_panic(&mut sim2);
        if sim1.state_hash() != sim2.state_hash() {
            return Some(tick);
        }
    }
    None
}

/// Record a replay of `num_ticks` ticks.
///
/// # Panics
///
/// Panics if a tick fails.
pub fn record_replay(sim: &mut Simulation, scenario_id: &str, num_ticks: u64) -> ReplayLog {
    let mut log = ReplayLog::new(scenario_id, sim.world().config().seed);
    for _ in 0..num_ticks {
        match sim.tick() {
            Ok(events) => log.record(&events, sim.state_hash()),
            Err(err) => panic!("tick {} failed: {err}", sim.get_tick() + 1),
        }
    }
    log
}

/// Whether two runs produce byte-identical replay logs.
pub fn verify_replay_determinism<F>(setup_fn: F, num_ticks: u64) -> bool
where
    F: Fn() -> Simulation,
{
    let a = record_replay(&mut setup_fn(), "a", num_ticks);
    let b = record_replay(&mut setup_fn(), "a", num_ticks);
    match (a.to_bytes(), b.to_bytes()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for simulation inputs.
pub mod strategies {
    use proptest::prelude::*;
    use rts_behavior::math::Vec3;
    use rts_behavior::orders::AssignMode;
    use rts_behavior::script::Arg;

    /// A ground-plane position inside a 200 x 200 area.
    pub fn arb_ground_position() -> impl Strategy<Value = Vec3> {
        (0i32..200, 0i32..200).prop_map(|(x, z)| Vec3::new(x as f32, 0.0, z as f32))
    }

    /// Any assignment mode.
    pub fn arb_assign_mode() -> impl Strategy<Value = AssignMode> {
        prop_oneof![
            Just(AssignMode::DoFirst),
            Just(AssignMode::DoLast),
            Just(AssignMode::ForgetEverythingElse),
        ]
    }

    /// A small integer-valued numeric constant.
    pub fn arb_small_constant() -> impl Strategy<Value = Arg> {
        (-20i32..20).prop_map(|n| Arg::Num(n as f32))
    }

    /// A random numeric expression over constants and arithmetic.
    pub fn arb_numeric_expr() -> impl Strategy<Value = Arg> {
        arb_small_constant().prop_recursive(4, 32, 2, |inner| {
            let ops = prop_oneof![
                Just("ADDITION"),
                Just("SUBTRACTION"),
                Just("MULTIPLICATION"),
                Just("DIVISION"),
                Just("LESS_THAN"),
                Just("AND"),
                Just("OR"),
            ];
            (ops, inner.clone(), inner).prop_map(|(op, a, b)| Arg::node(op, vec![a, b]))
        })
    }

    /// Per-tick lateness: most ticks are on time, some overshoot by up to
    /// `max_overshoot_ms`.
    pub fn arb_tick_overshoots(
        len: usize,
        max_overshoot_ms: u32,
    ) -> impl Strategy<Value = Vec<u32>> {
        proptest::collection::vec(
            prop_oneof![3 => Just(0u32), 1 => 0..=max_overshoot_ms],
            1..len,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{crowded_gather_simulation, gather_simulation};
    use proptest::prelude::*;
    use rts_behavior::prelude::*;

    #[test]
    fn test_verify_determinism_detects_divergence() {
        let counter = std::cell::Cell::new(0u64);
        let result = verify_determinism(
            2,
            1,
            || {
                counter.set(counter.get() + 1);
                counter.get()
            },
            |_| {},
            |n| *n,
        );
        assert!(!result.is_deterministic);
        assert_eq!(result.unique_hashes().len(), 2);
    }

    #[test]
    fn test_gather_scenario_is_deterministic() {
        let result = verify_determinism(
            3,
            300,
            || {
                let (sim, scenario) = gather_simulation();
                (sim, scenario)
            },
            |(sim, scenario)| {
                scenario.run_commands(sim).unwrap();
                tick_or_panic(sim);
            },
            |(sim, _)| sim.state_hash(),
        );
        result.assert_deterministic();
    }

    #[test]
    fn test_crowded_gather_has_no_divergence() {
        assert_eq!(
            find_first_divergence(|| crowded_gather_simulation(2, 12), 200),
            None
        );
    }

    #[test]
    fn test_parallel_gather_simulations() {
        run_parallel_simulations(|| crowded_gather_simulation(2, 8), 4, 150).assert_deterministic();
    }

    #[test]
    fn test_replays_are_byte_identical() {
        assert!(verify_replay_determinism(|| crowded_gather_simulation(1, 6), 120));
    }

    #[test]
    fn test_compute_hash_is_stable() {
        assert_eq!(compute_hash(&(1u32, "a")), compute_hash(&(1u32, "a")));
    }

    proptest! {
        /// Random numeric expressions evaluate to the same value every time.
        #[test]
        fn prop_numeric_expressions_are_pure(expr in strategies::arb_numeric_expr()) {
            let gs = GameSet::default();
            let node = rts_behavior::script::NumericNode::compile(&expr, gs.symbols()).unwrap();
            let world = World::new(&SimulationConfig::default());
            let ctx = ExecutionContext::new(&gs);
            let a = node.eval(&ctx, &world).unwrap();
            let b = node.eval(&ctx, &world).unwrap();
            prop_assert_eq!(a.to_bits(), b.to_bits());
        }

        /// Random gather worlds stay deterministic.
        #[test]
        fn prop_crowds_are_deterministic(peasants in 1usize..10) {
            prop_assert!(verify_simulation_determinism(
                || crowded_gather_simulation(1, peasants),
                60,
            ));
        }
    }
}
