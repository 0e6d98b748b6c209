use std::sync::Arc;
use std::time::Duration;

use self_protect::{
    wrap, AnomalyConfig, ConstantId, FatalReason, GuardCapabilities, GuardConfig, GuardContext,
    GuardError, ProtectedRoutine, RecordingTerminator, SecureStoreConfig, StateRestorer,
    StaticSource,
};
use shroud_host::testing::{ManualClock, MockTransport};
use shroud_telemetry::TelemetryConfig;

#[derive(Debug, Default)]
struct CountingRestorer {
    restores: usize,
}

impl StateRestorer for CountingRestorer {
    fn restore_state(&mut self) -> anyhow::Result<usize> {
        self.restores += 1;
        Ok(3)
    }
}

struct Harness {
    ctx: GuardContext,
    clock: ManualClock,
    transport: MockTransport,
    terminator: RecordingTerminator,
    source: StaticSource,
}

fn harness() -> Harness {
    let clock = ManualClock::starting_at(1_700_000_000_000);
    clock.set_auto_advance(Duration::from_millis(1));
    let transport = MockTransport::new();
    let terminator = RecordingTerminator::new();
    let source = StaticSource::with_entries(
        ProtectedRoutine::ALL
            .into_iter()
            .map(|routine| (routine, routine.name().as_bytes().to_vec())),
    );
    let config = GuardConfig {
        store: SecureStoreConfig {
            ttl: Duration::from_secs(3_600),
        },
        anomaly: AnomalyConfig {
            execution_probability: 1.0,
            enable_timing_probe: true,
            enable_recursion_probe: true,
            enable_drift_probe: true,
            ..AnomalyConfig::default()
        },
        telemetry: TelemetryConfig::enabled_for("http://collector.invalid/ingest", "bench-1"),
    };
    let ctx = GuardContext::with_seed(
        config,
        GuardCapabilities {
            clock: Arc::new(clock.clone()),
            transport: Box::new(transport.clone()),
            routines: Box::new(source.clone()),
            terminator: Box::new(terminator.clone()),
        },
        7,
    );
    Harness {
        ctx,
        clock,
        transport,
        terminator,
        source,
    }
}

#[test]
fn clean_checkpoint_reports_no_violations() {
    let mut h = harness();
    let mut restorer = CountingRestorer::default();

    let report = h.ctx.checkpoint(&mut restorer).expect("clean checkpoint");
    assert!(report.is_clean());
    assert_eq!(report.summary(), "ok");
    assert_eq!(report.verdict.executed_count(), 3);
    assert_eq!(h.terminator.halt_count(), 0);
    assert_eq!(restorer.restores, 0);
}

#[test]
fn integrity_violation_terminates_exactly_once() {
    let mut h = harness();
    let mut restorer = CountingRestorer::default();
    h.ctx.note("session armed");

    h.source
        .set(ProtectedRoutine::ApplyTransforms, b"nop sled".to_vec());
    let err = h.ctx.checkpoint(&mut restorer).expect_err("tampered routine");
    assert_eq!(
        err,
        GuardError::IntegrityViolation {
            routines: vec!["apply_transforms".to_string()],
        }
    );
    assert!(err.is_fatal());
    assert_eq!(h.terminator.halt_count(), 1);
    assert_eq!(restorer.restores, 1);
    assert_eq!(h.transport.request_count(), 1);
    assert_eq!(h.ctx.telemetry().pending(), 0);

    let again = h.ctx.checkpoint(&mut restorer).expect_err("still shut down");
    assert_eq!(again, err);
    let direct = h
        .ctx
        .terminate_fatally(FatalReason::InspectionUiVisible, &mut restorer);
    assert_eq!(direct, err);
    assert_eq!(h.terminator.halt_count(), 1);
    assert_eq!(restorer.restores, 1);
    assert_eq!(h.transport.request_count(), 1);
}

#[test]
fn fatal_note_reaches_collector_before_halt() {
    let mut h = harness();
    let mut restorer = CountingRestorer::default();

    h.ctx
        .terminate_fatally(FatalReason::InspectionUiVisible, &mut restorer);

    let requests = h.transport.requests();
    assert_eq!(requests.len(), 1);
    let body: serde_json::Value = serde_json::from_str(&requests[0].body).expect("json body");
    let hex = body["messages"][0]["msg"].as_str().expect("msg field");
    let plain = h.ctx.telemetry().cipher().decrypt_hex(hex).expect("decrypt");
    assert!(plain.contains("fatal inspection_ui_visible"));
    assert_eq!(
        h.terminator.reasons(),
        vec![FatalReason::InspectionUiVisible]
    );
}

#[test]
fn hostile_timing_takes_fatal_path() {
    let mut h = harness();
    let mut restorer = CountingRestorer::default();

    h.clock.set_auto_advance(Duration::from_secs(1));
    let err = h.ctx.checkpoint(&mut restorer).expect_err("hostile timing");
    assert_eq!(err.code(), "terminated");
    match h.terminator.reasons().as_slice() {
        [FatalReason::HostileObservation { score, probes }] => {
            assert!(*score > 0.3);
            assert!(probes.contains(&"timing".to_string()));
        }
        other => panic!("unexpected halts: {:?}", other),
    }
    assert_eq!(restorer.restores, 1);
}

#[test]
fn protected_constants_survive_checkpoints_and_expiry() {
    let mut h = harness();
    let mut restorer = CountingRestorer::default();
    h.ctx.protect_constants();
    for id in ConstantId::ALL {
        assert!(h.ctx.store().contains(id.key()));
    }

    assert_eq!(h.ctx.constant(ConstantId::RecordBaseOffset), 0x1A8);
    h.ctx.checkpoint(&mut restorer).expect("clean checkpoint");
    assert_eq!(h.ctx.constant(ConstantId::RecordStride), 0x30);

    h.clock.advance(Duration::from_secs(3_700));
    assert_eq!(h.ctx.constant(ConstantId::HeaderMagic), 0x4954_454D);
    assert_eq!(h.ctx.constant(ConstantId::HeaderMagic), 0x4954_454D);
}

#[test]
fn abort_flushes_and_restores_without_halting() {
    let mut h = harness();
    let mut restorer = CountingRestorer::default();
    h.ctx.note("editing inventory");

    let err = h.ctx.abort_input("user cancelled", &mut restorer);
    assert_eq!(
        err,
        GuardError::InputAborted {
            reason: "user cancelled".to_string(),
        }
    );
    assert!(!err.is_fatal());
    assert_eq!(h.terminator.halt_count(), 0);
    assert_eq!(restorer.restores, 1);
    assert_eq!(h.transport.request_count(), 1);

    let later = h.ctx.checkpoint(&mut restorer).expect_err("shut down");
    assert_eq!(later, err);
    assert_eq!(restorer.restores, 1);
}

#[test]
fn transport_failure_during_fatal_path_still_halts() {
    let mut h = harness();
    let mut restorer = CountingRestorer::default();
    h.transport.fail_with("connection refused");

    h.ctx
        .terminate_fatally(FatalReason::InspectionUiVisible, &mut restorer);
    assert_eq!(h.terminator.halt_count(), 1);
    assert_eq!(restorer.restores, 1);
    assert_eq!(h.ctx.telemetry().pending(), 0);
}

#[test]
fn guarded_call_skips_operation_after_violation() {
    let mut h = harness();
    let mut editor = wrap(CountingRestorer::default());

    let out = editor
        .call(&mut h.ctx, |inner| inner.restores + 10)
        .expect("clean call");
    assert_eq!(out, 10);
    assert_eq!(editor.calls(), 1);

    h.source.remove(ProtectedRoutine::SplitValue);
    let mut ran = false;
    let result = editor.call(&mut h.ctx, |_| ran = true);
    assert!(result.is_err());
    assert!(!ran);
    assert_eq!(editor.calls(), 1);
    assert_eq!(editor.inner().restores, 1);
}
