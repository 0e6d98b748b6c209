use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use tracing::{debug, warn};

use crate::anomaly::timing_workload;
use crate::secure_store::{
    apply_transforms, derive_part_keys, invert_transforms, part_checksum, split_value,
};

pub const MACHINE_CODE_WINDOW: usize = 32;
const HASH_BASE: u32 = 31;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProtectedRoutine {
    SplitValue,
    DeriveKeys,
    ApplyTransforms,
    InvertTransforms,
    PartChecksum,
    RollingHash,
    TimingWorkload,
    TelemetryCipher,
}

impl ProtectedRoutine {
    pub const ALL: [ProtectedRoutine; 8] = [
        Self::SplitValue,
        Self::DeriveKeys,
        Self::ApplyTransforms,
        Self::InvertTransforms,
        Self::PartChecksum,
        Self::RollingHash,
        Self::TimingWorkload,
        Self::TelemetryCipher,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::SplitValue => "split_value",
            Self::DeriveKeys => "derive_part_keys",
            Self::ApplyTransforms => "apply_transforms",
            Self::InvertTransforms => "invert_transforms",
            Self::PartChecksum => "part_checksum",
            Self::RollingHash => "rolling_hash",
            Self::TimingWorkload => "timing_workload",
            Self::TelemetryCipher => "xor_keystream",
        }
    }
}

/// Supplies the stable representation a routine is hashed over.
pub trait RoutineSource {
    fn representation(&self, routine: ProtectedRoutine) -> Option<Vec<u8>>;
}

/// Reads a fixed window of each routine's compiled code.
#[derive(Debug, Clone, Copy)]
pub struct MachineCodeSource {
    window: usize,
}

impl MachineCodeSource {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
        }
    }
}

impl Default for MachineCodeSource {
    fn default() -> Self {
        Self::new(MACHINE_CODE_WINDOW)
    }
}

impl RoutineSource for MachineCodeSource {
    fn representation(&self, routine: ProtectedRoutine) -> Option<Vec<u8>> {
        let address = routine_address(routine);
        // SAFETY: the address is the entry point of a function compiled into
        // this binary; its code lives in a mapped, readable text segment and
        // a small window past an entry point stays inside that segment.
        let bytes = unsafe { std::slice::from_raw_parts(address as *const u8, self.window) };
        Some(bytes.to_vec())
    }
}

fn routine_address(routine: ProtectedRoutine) -> usize {
    match routine {
        ProtectedRoutine::SplitValue => {
            let f: fn(u32, &mut StdRng) -> [u32; 4] = split_value;
            f as usize
        }
        ProtectedRoutine::DeriveKeys => {
            let f: fn(u32) -> [u32; 4] = derive_part_keys;
            f as usize
        }
        ProtectedRoutine::ApplyTransforms => {
            let f: fn([u32; 4], &[u32; 4]) -> [u32; 4] = apply_transforms;
            f as usize
        }
        ProtectedRoutine::InvertTransforms => {
            let f: fn([u32; 4], &[u32; 4]) -> [u32; 4] = invert_transforms;
            f as usize
        }
        ProtectedRoutine::PartChecksum => {
            let f: fn(&[u32; 4]) -> u16 = part_checksum;
            f as usize
        }
        ProtectedRoutine::RollingHash => {
            let f: fn(&[u8]) -> u32 = rolling_hash;
            f as usize
        }
        ProtectedRoutine::TimingWorkload => {
            let f: fn(u32) -> u64 = timing_workload;
            f as usize
        }
        ProtectedRoutine::TelemetryCipher => {
            let f: fn(&[u8], &[u8]) -> Vec<u8> = shroud_telemetry::xor_keystream;
            f as usize
        }
    }
}

/// Caller-supplied representations, shared between clones so a host can
/// update what it protects after handing the source over.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    entries: Arc<Mutex<HashMap<ProtectedRoutine, Vec<u8>>>>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: impl IntoIterator<Item = (ProtectedRoutine, Vec<u8>)>) -> Self {
        let source = Self::default();
        for (routine, bytes) in entries {
            source.set(routine, bytes);
        }
        source
    }

    pub fn set(&self, routine: ProtectedRoutine, bytes: Vec<u8>) {
        self.lock().insert(routine, bytes);
    }

    pub fn remove(&self, routine: ProtectedRoutine) {
        self.lock().remove(&routine);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ProtectedRoutine, Vec<u8>>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl RoutineSource for StaticSource {
    fn representation(&self, routine: ProtectedRoutine) -> Option<Vec<u8>> {
        self.lock().get(&routine).cloned()
    }
}

/// Polynomial rolling hash, base 31, modulo 2^32.
pub fn rolling_hash(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |hash, byte| {
        hash.wrapping_mul(HASH_BASE).wrapping_add(u32::from(*byte))
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IntegrityBaseline {
    hashes: BTreeMap<ProtectedRoutine, u32>,
}

impl IntegrityBaseline {
    pub fn get(&self, routine: ProtectedRoutine) -> Option<u32> {
        self.hashes.get(&routine).copied()
    }

    pub fn routines(&self) -> Vec<ProtectedRoutine> {
        self.hashes.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IntegrityReport {
    pub checked: usize,
    pub tampered: Vec<ProtectedRoutine>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.tampered.is_empty()
    }

    pub fn tampered_names(&self) -> Vec<String> {
        self.tampered
            .iter()
            .map(|routine| routine.name().to_string())
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct IntegrityMonitor {
    baseline: IntegrityBaseline,
}

impl IntegrityMonitor {
    pub fn capture(source: &dyn RoutineSource) -> Self {
        Self::capture_routines(source, &ProtectedRoutine::ALL)
    }

    pub fn capture_routines(source: &dyn RoutineSource, routines: &[ProtectedRoutine]) -> Self {
        let mut hashes = BTreeMap::new();
        for routine in routines {
            match source.representation(*routine) {
                Some(bytes) => {
                    hashes.insert(*routine, rolling_hash(&bytes));
                }
                None => warn!(
                    routine = routine.name(),
                    "no representation available; routine left out of baseline"
                ),
            }
        }
        debug!(routines = hashes.len(), "integrity baseline captured");
        Self {
            baseline: IntegrityBaseline { hashes },
        }
    }

    pub fn baseline(&self) -> &IntegrityBaseline {
        &self.baseline
    }

    /// Recomputes every baselined hash. A routine whose representation
    /// disappeared counts as tampered.
    pub fn verify(&self, source: &dyn RoutineSource) -> IntegrityReport {
        let mut report = IntegrityReport::default();
        for (routine, expected) in &self.baseline.hashes {
            report.checked += 1;
            let observed = source.representation(*routine).map(|bytes| rolling_hash(&bytes));
            if observed != Some(*expected) {
                warn!(
                    routine = routine.name(),
                    expected = *expected,
                    observed = ?observed,
                    "protected routine hash changed"
                );
                report.tampered.push(*routine);
            }
        }
        report
    }
}
