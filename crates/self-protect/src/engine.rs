use std::sync::{Arc, Mutex};

use anyhow::Result;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tracing::{debug, error, info, warn};

use shroud_host::{Clock, Transport};
use shroud_telemetry::{FlushOutcome, TelemetryChannel, TelemetryConfig};

use crate::anomaly::{AnomalyConfig, AnomalyDetector, DetectionVerdict};
use crate::constants::{ConstantId, ConstantProvider};
use crate::error::{GuardError, GuardResult};
use crate::integrity::{IntegrityMonitor, IntegrityReport, ProtectedRoutine, RoutineSource};
use crate::secure_store::{SecureStoreConfig, SecureValueStore};

#[derive(Debug, Clone, Default)]
pub struct GuardConfig {
    pub store: SecureStoreConfig,
    pub anomaly: AnomalyConfig,
    pub telemetry: TelemetryConfig,
}

/// Undoes whatever the host workflow changed in the target process.
pub trait StateRestorer {
    /// Returns how many entries were put back.
    fn restore_state(&mut self) -> Result<usize>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoState;

impl StateRestorer for NoState {
    fn restore_state(&mut self) -> Result<usize> {
        Ok(0)
    }
}

/// Final step of the fatal path.
pub trait Terminator {
    fn halt(&mut self, reason: &FatalReason);
}

#[derive(Debug, Clone, Copy)]
pub struct ProcessExit {
    exit_code: i32,
}

impl ProcessExit {
    pub fn new(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

impl Default for ProcessExit {
    fn default() -> Self {
        Self::new(70)
    }
}

impl Terminator for ProcessExit {
    fn halt(&mut self, reason: &FatalReason) {
        error!(code = reason.code(), exit_code = self.exit_code, "halting process");
        std::process::exit(self.exit_code);
    }
}

/// Records halts instead of exiting; clones share the record.
#[derive(Debug, Clone, Default)]
pub struct RecordingTerminator {
    halts: Arc<Mutex<Vec<FatalReason>>>,
}

impl RecordingTerminator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn halt_count(&self) -> usize {
        self.lock().len()
    }

    pub fn reasons(&self) -> Vec<FatalReason> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<FatalReason>> {
        self.halts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Terminator for RecordingTerminator {
    fn halt(&mut self, reason: &FatalReason) {
        self.lock().push(reason.clone());
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FatalReason {
    IntegrityViolation { routines: Vec<ProtectedRoutine> },
    HostileObservation { score: f64, probes: Vec<String> },
    InspectionUiVisible,
}

impl FatalReason {
    pub fn code(&self) -> &'static str {
        match self {
            Self::IntegrityViolation { .. } => "integrity_violation",
            Self::HostileObservation { .. } => "hostile_observation",
            Self::InspectionUiVisible => "inspection_ui_visible",
        }
    }

    pub fn detail(&self) -> String {
        match self {
            Self::IntegrityViolation { routines } => format!(
                "protected routines changed: {}",
                routines
                    .iter()
                    .map(|routine| routine.name())
                    .collect::<Vec<_>>()
                    .join(",")
            ),
            Self::HostileObservation { score, probes } => format!(
                "anomaly score {:.3} from probes {}",
                score,
                probes.join(",")
            ),
            Self::InspectionUiVisible => "inspection ui opened while armed".to_string(),
        }
    }

    pub fn to_error(&self) -> GuardError {
        match self {
            Self::IntegrityViolation { routines } => GuardError::IntegrityViolation {
                routines: routines
                    .iter()
                    .map(|routine| routine.name().to_string())
                    .collect(),
            },
            _ => GuardError::Terminated {
                reason: self.detail(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Shutdown {
    Fatal(FatalReason),
    Aborted(String),
}

impl Shutdown {
    fn to_error(&self) -> GuardError {
        match self {
            Self::Fatal(reason) => reason.to_error(),
            Self::Aborted(reason) => GuardError::InputAborted {
                reason: reason.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GuardReport {
    pub integrity: IntegrityReport,
    pub verdict: DetectionVerdict,
}

impl GuardReport {
    pub fn is_clean(&self) -> bool {
        self.integrity.is_clean() && !self.verdict.suspicious
    }

    pub fn violation_codes(&self) -> Vec<String> {
        let mut codes = self
            .integrity
            .tampered
            .iter()
            .map(|routine| format!("integrity_mismatch:{}", routine.name()))
            .collect::<Vec<_>>();
        if self.verdict.suspicious {
            codes.extend(
                self.verdict
                    .flagged_codes()
                    .into_iter()
                    .map(|code| format!("anomaly:{}", code)),
            );
        }
        codes
    }

    pub fn summary(&self) -> String {
        if self.is_clean() {
            return "ok".to_string();
        }
        format!(
            "tampered=[{}] {}",
            self.integrity.tampered_names().join(","),
            self.verdict.summary()
        )
    }
}

/// Injected capabilities the subsystem runs on.
pub struct GuardCapabilities {
    pub clock: Arc<dyn Clock>,
    pub transport: Box<dyn Transport>,
    pub routines: Box<dyn RoutineSource>,
    pub terminator: Box<dyn Terminator>,
}

/// Every piece of protection state for one process run, passed by reference
/// to each operation instead of living in globals.
pub struct GuardContext {
    clock: Arc<dyn Clock>,
    store: SecureValueStore,
    constants: ConstantProvider,
    detector: AnomalyDetector,
    integrity: IntegrityMonitor,
    routines: Box<dyn RoutineSource>,
    telemetry: TelemetryChannel,
    terminator: Box<dyn Terminator>,
    shutdown: Option<Shutdown>,
}

impl GuardContext {
    pub fn new(config: GuardConfig, capabilities: GuardCapabilities) -> Self {
        Self::build(config, capabilities, &mut StdRng::from_entropy())
    }

    /// Same as `new` with every random source derived from `seed`.
    pub fn with_seed(config: GuardConfig, capabilities: GuardCapabilities, seed: u64) -> Self {
        Self::build(config, capabilities, &mut StdRng::seed_from_u64(seed))
    }

    fn build(config: GuardConfig, capabilities: GuardCapabilities, seeds: &mut StdRng) -> Self {
        let GuardCapabilities {
            clock,
            transport,
            routines,
            terminator,
        } = capabilities;
        let process_start_unix_millis = clock.wall_unix_millis();

        let integrity = IntegrityMonitor::capture(routines.as_ref());
        let store = SecureValueStore::with_rng(
            config.store,
            Arc::clone(&clock),
            StdRng::seed_from_u64(seeds.next_u64()),
        );
        let detector = AnomalyDetector::with_rng(
            config.anomaly,
            Arc::clone(&clock),
            StdRng::seed_from_u64(seeds.next_u64()),
        );
        let constants = ConstantProvider::with_rng(StdRng::seed_from_u64(seeds.next_u64()));
        let telemetry = TelemetryChannel::with_rng(
            config.telemetry,
            transport,
            Arc::clone(&clock),
            process_start_unix_millis,
            StdRng::seed_from_u64(seeds.next_u64()),
        );

        info!(
            baselined_routines = integrity.baseline().len(),
            telemetry_enabled = telemetry.is_enabled(),
            "guard context initialised"
        );

        Self {
            clock,
            store,
            constants,
            detector,
            integrity,
            routines,
            telemetry,
            terminator,
            shutdown: None,
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn store(&self) -> &SecureValueStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut SecureValueStore {
        &mut self.store
    }

    pub fn integrity(&self) -> &IntegrityMonitor {
        &self.integrity
    }

    pub fn telemetry(&self) -> &TelemetryChannel {
        &self.telemetry
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_some()
    }

    /// Queues a diagnostic line; transport problems stay local.
    pub fn note(&mut self, message: &str) {
        if let Some(outcome) = self.telemetry.append(message) {
            log_flush_outcome(&outcome);
        }
    }

    pub fn flush_telemetry(&mut self) -> FlushOutcome {
        let outcome = self.telemetry.flush();
        log_flush_outcome(&outcome);
        outcome
    }

    pub fn encode(&mut self, value: u32, id: &str) {
        self.store.encode(value, id);
    }

    /// Reads a secured value. Checksum mismatches are reported and the
    /// reconstructed value is still handed back.
    pub fn decode(&mut self, id: &str) -> GuardResult<u32> {
        match self.store.decode(id) {
            Ok(decoded) => {
                if let Some(mismatch) = decoded.checksum_error(id) {
                    self.note(&mismatch.to_string());
                }
                Ok(decoded.value)
            }
            Err(err) => {
                warn!(id, code = err.code(), error = %err, "secure value unavailable");
                Err(err)
            }
        }
    }

    pub fn protect_constants(&mut self) {
        for id in ConstantId::ALL {
            let value = self.constants.resolve(id);
            self.store.encode(value, id.key());
        }
        debug!(count = ConstantId::ALL.len(), "protected constants encoded");
    }

    /// Returns a protected constant, re-deriving and re-securing it when its
    /// record is missing or expired.
    pub fn constant(&mut self, id: ConstantId) -> u32 {
        match self.decode(id.key()) {
            Ok(value) => value,
            Err(_) => {
                let value = self.constants.resolve(id);
                self.store.encode(value, id.key());
                value
            }
        }
    }

    pub fn evaluate(&mut self) -> GuardReport {
        GuardReport {
            integrity: self.integrity.verify(self.routines.as_ref()),
            verdict: self.detector.evaluate(),
        }
    }

    /// Runs integrity verification and anomaly detection, taking the fatal
    /// path on any violation. After shutdown every checkpoint fails fast
    /// without repeating cleanup.
    pub fn checkpoint(&mut self, restorer: &mut dyn StateRestorer) -> GuardResult<GuardReport> {
        if let Some(shutdown) = &self.shutdown {
            return Err(shutdown.to_error());
        }

        let integrity = self.integrity.verify(self.routines.as_ref());
        if !integrity.is_clean() {
            return Err(self.terminate_fatally(
                FatalReason::IntegrityViolation {
                    routines: integrity.tampered,
                },
                restorer,
            ));
        }

        let verdict = self.detector.evaluate();
        if verdict.suspicious {
            let reason = FatalReason::HostileObservation {
                score: verdict.score,
                probes: verdict
                    .flagged_codes()
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
            };
            return Err(self.terminate_fatally(reason, restorer));
        }

        Ok(GuardReport { integrity, verdict })
    }

    /// Single-pass fatal cleanup: flush telemetry, restore host state, halt.
    /// Later calls return the original error and do nothing else.
    pub fn terminate_fatally(
        &mut self,
        reason: FatalReason,
        restorer: &mut dyn StateRestorer,
    ) -> GuardError {
        if let Some(shutdown) = &self.shutdown {
            return shutdown.to_error();
        }
        error!(code = reason.code(), detail = %reason.detail(), "fatal guard condition");
        self.shutdown = Some(Shutdown::Fatal(reason.clone()));

        self.run_cleanup(&format!("fatal {}: {}", reason.code(), reason.detail()), restorer);
        self.terminator.halt(&reason);
        reason.to_error()
    }

    /// Orderly early exit requested by the host workflow. Cleanup runs once
    /// but the process is not halted here.
    pub fn abort_input(&mut self, reason: &str, restorer: &mut dyn StateRestorer) -> GuardError {
        if let Some(shutdown) = &self.shutdown {
            return shutdown.to_error();
        }
        info!(reason, "input aborted; shutting down guard");
        self.shutdown = Some(Shutdown::Aborted(reason.to_string()));
        self.run_cleanup(&format!("input aborted: {}", reason), restorer);
        GuardError::InputAborted {
            reason: reason.to_string(),
        }
    }

    fn run_cleanup(&mut self, note: &str, restorer: &mut dyn StateRestorer) {
        let queued = self.telemetry.append(note);
        let outcome = match queued {
            Some(outcome) => outcome,
            None => self.telemetry.flush(),
        };
        log_flush_outcome(&outcome);

        match restorer.restore_state() {
            Ok(restored) => info!(restored, "host state restored"),
            Err(err) => error!(error = %err, "host state restoration failed"),
        }
    }
}

impl std::fmt::Debug for GuardContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardContext")
            .field("store", &self.store)
            .field("detector", &self.detector)
            .field("integrity", &self.integrity)
            .field("telemetry", &self.telemetry)
            .field("shutdown", &self.shutdown)
            .finish()
    }
}

fn log_flush_outcome(outcome: &FlushOutcome) {
    match outcome {
        FlushOutcome::Dropped { count, detail } => {
            let err = GuardError::TransportFailure {
                detail: detail.clone(),
            };
            warn!(count, error = %err, "telemetry batch lost");
        }
        FlushOutcome::Delivered { count, status } => {
            debug!(count, status, "telemetry batch flushed");
        }
        FlushOutcome::Skipped => {}
    }
}
