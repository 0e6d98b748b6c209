mod anomaly;
mod constants;
mod engine;
mod error;
mod guard;
mod integrity;
mod secure_store;

pub use anomaly::{
    measure_recursion_depth, timing_workload, AnomalyConfig, AnomalyDetector, DetectionVerdict,
    ProbeKind, ProbeResult,
};
pub use constants::{ConstantId, ConstantProvider};
pub use engine::{
    FatalReason, GuardCapabilities, GuardConfig, GuardContext, GuardReport, NoState, ProcessExit,
    RecordingTerminator, StateRestorer, Terminator,
};
pub use error::{GuardError, GuardResult};
pub use guard::{wrap, Guarded};
pub use integrity::{
    rolling_hash, IntegrityBaseline, IntegrityMonitor, IntegrityReport, MachineCodeSource,
    ProtectedRoutine, RoutineSource, StaticSource,
};
pub use secure_store::{
    apply_transforms, derive_part_keys, invert_transforms, part_checksum, split_value,
    ChecksumStatus, Decoded, SecureStoreConfig, SecureValueStore, SecuredValue,
    DEFAULT_SECURE_VALUE_TTL,
};
