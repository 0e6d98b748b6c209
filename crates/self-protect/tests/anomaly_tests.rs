use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use self_protect::{AnomalyConfig, AnomalyDetector, ProbeKind};
use shroud_host::testing::ManualClock;
use shroud_host::SystemClock;

fn only(probe: ProbeKind) -> AnomalyConfig {
    AnomalyConfig {
        execution_probability: 1.0,
        enable_timing_probe: probe == ProbeKind::Timing,
        enable_recursion_probe: probe == ProbeKind::RecursionDepth,
        enable_drift_probe: probe == ProbeKind::TimeDrift,
        ..AnomalyConfig::default()
    }
}

fn detector(config: AnomalyConfig, clock: &ManualClock, seed: u64) -> AnomalyDetector {
    AnomalyDetector::with_rng(config, Arc::new(clock.clone()), StdRng::seed_from_u64(seed))
}

#[test]
fn undisturbed_process_rarely_looks_suspicious() {
    let mut detector = AnomalyDetector::with_rng(
        AnomalyConfig::default(),
        Arc::new(SystemClock::new()),
        StdRng::seed_from_u64(1),
    );

    let suspicious = (0..1_000)
        .filter(|_| detector.evaluate().suspicious)
        .count();
    assert!(suspicious < 50, "suspicious verdicts: {}", suspicious);
}

#[test]
fn slowed_timing_probe_crosses_threshold() {
    let clock = ManualClock::new();
    clock.set_auto_advance(Duration::from_secs(1));
    let mut detector = detector(only(ProbeKind::Timing), &clock, 3);

    let verdict = detector.evaluate();
    assert_eq!(verdict.executed_probes(), vec![ProbeKind::Timing]);
    assert!((verdict.score - 0.42).abs() < 1e-9);
    assert!(verdict.suspicious);
    assert_eq!(verdict.flagged_codes(), vec!["timing"]);
}

#[test]
fn frozen_clock_reads_as_too_fast() {
    let clock = ManualClock::new();
    let detector = detector(only(ProbeKind::Timing), &clock, 3);

    let result = detector.run_probe(ProbeKind::Timing);
    assert!((result.score - 0.9).abs() < 1e-9);
    assert!((result.weight - 0.6).abs() < 1e-9);
}

#[test]
fn stalled_execution_trips_drift_probe() {
    let clock = ManualClock::new();
    clock.set_auto_advance(Duration::from_secs(2));
    let mut detector = detector(only(ProbeKind::TimeDrift), &clock, 5);

    let verdict = detector.evaluate();
    assert!((verdict.score - 0.72).abs() < 1e-9);
    assert!(verdict.suspicious);
}

#[test]
fn short_steps_keep_drift_probe_quiet() {
    let clock = ManualClock::new();
    clock.set_auto_advance(Duration::from_millis(1));
    let mut detector = detector(only(ProbeKind::TimeDrift), &clock, 5);

    let verdict = detector.evaluate();
    assert_eq!(verdict.score, 0.0);
    assert!(!verdict.suspicious);
}

#[test]
fn recursion_probe_matches_configured_depth() {
    let clock = ManualClock::new();
    let detector = detector(only(ProbeKind::RecursionDepth), &clock, 9);
    let result = detector.run_probe(ProbeKind::RecursionDepth);
    assert_eq!(result.score, 0.0);
    assert_eq!(result.detail, "depth=64");
}

#[test]
fn zero_probability_still_runs_exactly_one_probe() {
    let clock = ManualClock::new();
    clock.set_auto_advance(Duration::from_millis(1));
    let config = AnomalyConfig {
        execution_probability: 0.0,
        enable_timing_probe: true,
        enable_recursion_probe: true,
        enable_drift_probe: true,
        ..AnomalyConfig::default()
    };
    let mut detector = detector(config, &clock, 11);

    for _ in 0..50 {
        let verdict = detector.evaluate();
        assert_eq!(verdict.executed_count(), 1);
        assert!(!verdict.suspicious);
    }
}

#[test]
fn all_probes_disabled_yields_clean_empty_verdict() {
    let clock = ManualClock::new();
    let config = AnomalyConfig {
        enable_timing_probe: false,
        enable_recursion_probe: false,
        enable_drift_probe: false,
        ..AnomalyConfig::default()
    };
    let mut detector = detector(config, &clock, 13);

    let verdict = detector.evaluate();
    assert_eq!(verdict.executed_count(), 0);
    assert_eq!(verdict.score, 0.0);
    assert!(!verdict.suspicious);
}

#[test]
fn wall_jump_outside_probe_window_is_not_drift() {
    let clock = ManualClock::new();
    clock.set_auto_advance(Duration::from_millis(1));
    clock.skew_wall(Duration::from_secs(3_600));
    let mut detector = detector(only(ProbeKind::TimeDrift), &clock, 17);

    let verdict = detector.evaluate();
    assert_eq!(verdict.score, 0.0);
    assert!(!verdict.suspicious);
}

#[test]
fn non_finite_probability_falls_back_to_default_sampling() {
    let clock = ManualClock::new();
    clock.set_auto_advance(Duration::from_millis(1));
    let config = AnomalyConfig {
        execution_probability: f64::NAN,
        enable_timing_probe: true,
        enable_recursion_probe: true,
        enable_drift_probe: true,
        ..AnomalyConfig::default()
    };
    let mut detector = detector(config, &clock, 19);

    for _ in 0..20 {
        let verdict = detector.evaluate();
        assert!(verdict.executed_count() >= 1);
        assert!(!verdict.suspicious);
    }
}
