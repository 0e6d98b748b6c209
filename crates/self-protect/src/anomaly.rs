use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::debug;

use shroud_host::env::{env_bool, env_duration_micros, env_duration_millis, env_f64, env_u32};
use shroud_host::Clock;

pub const DEFAULT_SUSPICION_THRESHOLD: f64 = 0.3;
pub const DEFAULT_EXECUTION_PROBABILITY: f64 = 0.8;

const TIMING_TOO_FAST_SCORE: f64 = 0.9;
const TIMING_TOO_SLOW_SCORE: f64 = 0.7;
const RECURSION_SCORE: f64 = 0.8;
const DRIFT_SCORE: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeKind {
    Timing,
    RecursionDepth,
    TimeDrift,
}

impl ProbeKind {
    pub const ALL: [ProbeKind; 3] = [Self::Timing, Self::RecursionDepth, Self::TimeDrift];

    pub fn weight(self) -> f64 {
        match self {
            Self::Timing => 0.6,
            Self::RecursionDepth => 0.7,
            Self::TimeDrift => 0.8,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Self::Timing => "timing",
            Self::RecursionDepth => "recursion_depth",
            Self::TimeDrift => "time_drift",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnomalyConfig {
    pub execution_probability: f64,
    pub suspicion_threshold: f64,
    pub enable_timing_probe: bool,
    pub enable_recursion_probe: bool,
    pub enable_drift_probe: bool,
    pub timing_iterations: u32,
    pub timing_min_expected: Duration,
    pub timing_max_expected: Duration,
    pub recursion_depth: u32,
    pub drift_iterations: u32,
    pub drift_monotonic_threshold: Duration,
    pub drift_wall_threshold: Duration,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            execution_probability: env_f64(
                "SHROUD_ANOMALY_EXECUTION_PROBABILITY",
                DEFAULT_EXECUTION_PROBABILITY,
            ),
            suspicion_threshold: DEFAULT_SUSPICION_THRESHOLD,
            enable_timing_probe: env_bool("SHROUD_ANOMALY_ENABLE_TIMING", true),
            enable_recursion_probe: env_bool("SHROUD_ANOMALY_ENABLE_RECURSION", true),
            enable_drift_probe: env_bool("SHROUD_ANOMALY_ENABLE_DRIFT", true),
            timing_iterations: env_u32("SHROUD_ANOMALY_TIMING_ITERATIONS", 100_000),
            timing_min_expected: env_duration_micros(
                "SHROUD_ANOMALY_TIMING_MIN_MICROS",
                Duration::from_micros(1),
            ),
            timing_max_expected: env_duration_millis(
                "SHROUD_ANOMALY_TIMING_MAX_MILLIS",
                Duration::from_millis(500),
            ),
            recursion_depth: 64,
            drift_iterations: env_u32("SHROUD_ANOMALY_DRIFT_ITERATIONS", 50_000),
            drift_monotonic_threshold: env_duration_millis(
                "SHROUD_ANOMALY_DRIFT_MONOTONIC_MILLIS",
                Duration::from_secs(1),
            ),
            drift_wall_threshold: env_duration_millis(
                "SHROUD_ANOMALY_DRIFT_WALL_MILLIS",
                Duration::from_secs(1),
            ),
        }
    }
}

impl AnomalyConfig {
    pub fn enabled_probes(&self) -> Vec<ProbeKind> {
        ProbeKind::ALL
            .into_iter()
            .filter(|probe| match probe {
                ProbeKind::Timing => self.enable_timing_probe,
                ProbeKind::RecursionDepth => self.enable_recursion_probe,
                ProbeKind::TimeDrift => self.enable_drift_probe,
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    pub probe: ProbeKind,
    pub score: f64,
    pub weight: f64,
    pub detail: String,
}

impl fmt::Display for ProbeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} score={:.2} weight={:.1} ({})",
            self.probe.code(),
            self.score,
            self.weight,
            self.detail
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectionVerdict {
    pub results: Vec<ProbeResult>,
    pub score: f64,
    pub threshold: f64,
    pub suspicious: bool,
}

impl DetectionVerdict {
    fn from_results(results: Vec<ProbeResult>, threshold: f64) -> Self {
        let score = if results.is_empty() {
            0.0
        } else {
            let weighted: f64 = results.iter().map(|r| r.weight * r.score).sum();
            weighted / results.len() as f64
        };
        Self {
            suspicious: score > threshold,
            results,
            score,
            threshold,
        }
    }

    pub fn executed_count(&self) -> usize {
        self.results.len()
    }

    pub fn executed_probes(&self) -> Vec<ProbeKind> {
        self.results.iter().map(|r| r.probe).collect()
    }

    pub fn flagged_codes(&self) -> Vec<&'static str> {
        self.results
            .iter()
            .filter(|r| r.score > 0.0)
            .map(|r| r.probe.code())
            .collect()
    }

    pub fn summary(&self) -> String {
        let probes = self
            .results
            .iter()
            .map(ProbeResult::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        format!(
            "score={:.3} threshold={:.2} suspicious={} [{}]",
            self.score, self.threshold, self.suspicious, probes
        )
    }
}

pub struct AnomalyDetector {
    config: AnomalyConfig,
    clock: Arc<dyn Clock>,
    rng: StdRng,
}

impl AnomalyDetector {
    pub fn new(config: AnomalyConfig, clock: Arc<dyn Clock>) -> Self {
        Self::with_rng(config, clock, StdRng::from_entropy())
    }

    pub fn with_rng(config: AnomalyConfig, clock: Arc<dyn Clock>, rng: StdRng) -> Self {
        Self { config, clock, rng }
    }

    /// Runs a shuffled, randomly sampled subset of the enabled probes.
    ///
    /// Each probe runs with the configured probability; when the draw selects
    /// nothing one probe is forced so every invocation measures something.
    pub fn evaluate(&mut self) -> DetectionVerdict {
        let mut probes = self.config.enabled_probes();
        if probes.is_empty() {
            return DetectionVerdict::from_results(Vec::new(), self.config.suspicion_threshold);
        }
        probes.shuffle(&mut self.rng);

        let configured = self.config.execution_probability;
        let probability = if configured.is_finite() {
            configured.clamp(0.0, 1.0)
        } else {
            DEFAULT_EXECUTION_PROBABILITY
        };
        let mut selected = Vec::with_capacity(probes.len());
        for probe in &probes {
            if self.rng.gen_bool(probability) {
                selected.push(*probe);
            }
        }
        if selected.is_empty() {
            if let Some(forced) = probes.choose(&mut self.rng) {
                selected.push(*forced);
            }
        }

        let results = selected
            .into_iter()
            .map(|probe| self.run_probe(probe))
            .collect::<Vec<_>>();
        let verdict = DetectionVerdict::from_results(results, self.config.suspicion_threshold);
        debug!(
            score = verdict.score,
            executed = verdict.executed_count(),
            suspicious = verdict.suspicious,
            "anomaly detector evaluated"
        );
        verdict
    }

    pub fn run_probe(&self, probe: ProbeKind) -> ProbeResult {
        let (score, detail) = match probe {
            ProbeKind::Timing => self.probe_timing(),
            ProbeKind::RecursionDepth => self.probe_recursion(),
            ProbeKind::TimeDrift => self.probe_drift(),
        };
        ProbeResult {
            probe,
            score,
            weight: probe.weight(),
            detail,
        }
    }

    fn probe_timing(&self) -> (f64, String) {
        let start = self.clock.wall();
        std::hint::black_box(timing_workload(self.config.timing_iterations));
        let elapsed = self.clock.wall().saturating_sub(start);

        let score = if elapsed < self.config.timing_min_expected {
            TIMING_TOO_FAST_SCORE
        } else if elapsed > self.config.timing_max_expected {
            TIMING_TOO_SLOW_SCORE
        } else {
            0.0
        };
        (
            score,
            format!(
                "elapsed={}us expected={}..{}us",
                elapsed.as_micros(),
                self.config.timing_min_expected.as_micros(),
                self.config.timing_max_expected.as_micros()
            ),
        )
    }

    fn probe_recursion(&self) -> (f64, String) {
        let expected = self.config.recursion_depth;
        match catch_unwind(AssertUnwindSafe(|| measure_recursion_depth(expected))) {
            Ok(depth) if depth == expected => (0.0, format!("depth={}", depth)),
            Ok(depth) => (
                RECURSION_SCORE,
                format!("depth={} expected={}", depth, expected),
            ),
            Err(_) => (RECURSION_SCORE, "recursion probe panicked".to_string()),
        }
    }

    fn probe_drift(&self) -> (f64, String) {
        let monotonic_start = self.clock.monotonic();
        let wall_start = self.clock.wall();
        std::hint::black_box(timing_workload(self.config.drift_iterations));
        let monotonic_delta = self.clock.monotonic().saturating_sub(monotonic_start);
        let wall_delta = self.clock.wall().saturating_sub(wall_start);

        let stalled = monotonic_delta > self.config.drift_monotonic_threshold
            && wall_delta > self.config.drift_wall_threshold;
        let score = if stalled { DRIFT_SCORE } else { 0.0 };
        (
            score,
            format!(
                "monotonic={}ms wall={}ms",
                monotonic_delta.as_millis(),
                wall_delta.as_millis()
            ),
        )
    }
}

impl fmt::Debug for AnomalyDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnomalyDetector")
            .field("config", &self.config)
            .finish()
    }
}

/// Fixed CPU-bound workload shared by the timing and drift probes.
pub fn timing_workload(iterations: u32) -> u64 {
    let mut state = 0u64;
    for i in 0..iterations {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(u64::from(i));
        state = std::hint::black_box(state);
    }
    state
}

pub fn measure_recursion_depth(target: u32) -> u32 {
    fn descend(remaining: u32, depth: u32) -> u32 {
        if remaining == 0 {
            return depth;
        }
        descend(std::hint::black_box(remaining - 1), depth + 1)
    }
    descend(target, 0)
}
