use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use shroud_host::env::env_u64;
use shroud_host::Clock;

use crate::error::{GuardError, GuardResult};

pub const DEFAULT_SECURE_VALUE_TTL: Duration = Duration::from_secs(60 * 60);
const CHECKSUM_WEIGHTS: [u32; 4] = [1, 3, 5, 7];

#[derive(Debug, Clone)]
pub struct SecureStoreConfig {
    pub ttl: Duration,
}

impl Default for SecureStoreConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(env_u64(
                "SHROUD_SECURE_VALUE_TTL_SECS",
                DEFAULT_SECURE_VALUE_TTL.as_secs(),
            )),
        }
    }
}

/// A constant held only as four transformed parts plus a masked checksum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecuredValue {
    id: String,
    fields: [u32; 4],
    masked_checksum: u32,
    keys: [u32; 4],
    base_key: u32,
    created_at: Duration,
    tampered: bool,
}

impl SecuredValue {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> Duration {
        self.created_at
    }

    pub fn is_tampered(&self) -> bool {
        self.tampered
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumStatus {
    Verified,
    Mismatch { expected: u16, observed: u16 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoded {
    pub value: u32,
    pub checksum: ChecksumStatus,
}

impl Decoded {
    pub fn is_verified(&self) -> bool {
        self.checksum == ChecksumStatus::Verified
    }

    pub fn checksum_error(&self, id: &str) -> Option<GuardError> {
        match self.checksum {
            ChecksumStatus::Verified => None,
            ChecksumStatus::Mismatch { expected, observed } => Some(GuardError::ChecksumMismatch {
                id: id.to_string(),
                expected,
                observed,
            }),
        }
    }
}

pub struct SecureValueStore {
    config: SecureStoreConfig,
    records: HashMap<String, SecuredValue>,
    clock: Arc<dyn Clock>,
    process_start: Duration,
    rng: StdRng,
}

impl SecureValueStore {
    pub fn new(config: SecureStoreConfig, clock: Arc<dyn Clock>) -> Self {
        Self::with_rng(config, clock, StdRng::from_entropy())
    }

    pub fn with_rng(config: SecureStoreConfig, clock: Arc<dyn Clock>, rng: StdRng) -> Self {
        let process_start = clock.monotonic();
        Self {
            config,
            records: HashMap::new(),
            clock,
            process_start,
            rng,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    pub fn record(&self, id: &str) -> Option<&SecuredValue> {
        self.records.get(id)
    }

    pub fn encode(&mut self, value: u32, id: &str) {
        let now = self.clock.monotonic();
        let elapsed_millis = now.saturating_sub(self.process_start).as_millis() as u32;
        let base_key = elapsed_millis.wrapping_add(self.rng.gen::<u32>());
        let keys = derive_part_keys(base_key);
        let parts = split_value(value, &mut self.rng);
        let fields = apply_transforms(parts, &keys);
        let masked_checksum = u32::from(part_checksum(&parts)) ^ (base_key & 0xFFFF);

        let record = SecuredValue {
            id: id.to_string(),
            fields,
            masked_checksum,
            keys,
            base_key,
            created_at: now,
            tampered: false,
        };
        if self.records.insert(id.to_string(), record).is_some() {
            debug!(id, "secure value overwritten");
        }
    }

    /// Reconstructs the value stored under `id`.
    ///
    /// A checksum mismatch flags the record and is logged, but the
    /// reconstructed sum is still returned.
    pub fn decode(&mut self, id: &str) -> GuardResult<Decoded> {
        let ttl = self.config.ttl;
        let now = self.clock.monotonic();
        let Some(record) = self.records.get_mut(id) else {
            return Err(GuardError::NotFound { id: id.to_string() });
        };

        let age = now.saturating_sub(record.created_at);
        if age > ttl {
            self.records.remove(id);
            debug!(id, age_secs = age.as_secs(), "secure value expired; evicted");
            return Err(GuardError::Expired {
                id: id.to_string(),
                age_secs: age.as_secs(),
            });
        }

        let parts = invert_transforms(record.fields, &record.keys);
        let observed = part_checksum(&parts);
        let expected = (record.masked_checksum ^ (record.base_key & 0xFFFF)) as u16;
        let checksum = if observed == expected {
            ChecksumStatus::Verified
        } else {
            record.tampered = true;
            warn!(
                id,
                expected = expected,
                observed = observed,
                "secure value checksum mismatch; returning reconstructed value"
            );
            ChecksumStatus::Mismatch { expected, observed }
        };

        let value = parts.iter().fold(0u32, |sum, part| sum.wrapping_add(*part));
        Ok(Decoded { value, checksum })
    }

    /// Decodes and removes the record in one step.
    pub fn take(&mut self, id: &str) -> GuardResult<Decoded> {
        let decoded = self.decode(id)?;
        self.records.remove(id);
        Ok(decoded)
    }

    pub fn purge_expired(&mut self) -> usize {
        let ttl = self.config.ttl;
        let now = self.clock.monotonic();
        let before = self.records.len();
        self.records.retain(|_, record| now.saturating_sub(record.created_at) <= ttl);
        before - self.records.len()
    }

    #[cfg(test)]
    pub(crate) fn corrupt_field(&mut self, id: &str, index: usize, mask: u32) {
        if let Some(record) = self.records.get_mut(id) {
            record.fields[index] ^= mask;
        }
    }
}

impl std::fmt::Debug for SecureValueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureValueStore")
            .field("ttl", &self.config.ttl)
            .field("records", &self.records.len())
            .finish()
    }
}

/// Splits `value` into four parts that sum to it exactly. No part exceeds
/// the budget left after the parts before it.
pub fn split_value(value: u32, rng: &mut StdRng) -> [u32; 4] {
    let first = rng.gen_range(0..=value);
    let mut remaining = value - first;
    let second = rng.gen_range(0..=remaining);
    remaining -= second;
    let third = rng.gen_range(0..=remaining);
    remaining -= third;
    [first, second, third, remaining]
}

/// Per-part keys for a base key. The multiplication key is always odd so it
/// has an inverse modulo 2^32.
pub fn derive_part_keys(base_key: u32) -> [u32; 4] {
    let mut keys = [0u32; 4];
    for (index, key) in keys.iter_mut().enumerate() {
        let salt = (index as u32 + 1).wrapping_mul(0x9E37_79B9);
        let mixed = (base_key ^ salt).rotate_left(5 + index as u32 * 7);
        *key = mixed.wrapping_mul(0x85EB_CA6B) ^ (mixed >> 13);
    }
    keys[0] |= 1;
    keys
}

pub fn apply_transforms(parts: [u32; 4], keys: &[u32; 4]) -> [u32; 4] {
    [
        parts[0].wrapping_mul(keys[0]),
        parts[1] ^ keys[1],
        parts[2].wrapping_add(keys[2]),
        parts[3].wrapping_sub(keys[3]),
    ]
}

pub fn invert_transforms(fields: [u32; 4], keys: &[u32; 4]) -> [u32; 4] {
    let fourth = fields[3].wrapping_add(keys[3]);
    let third = fields[2].wrapping_sub(keys[2]);
    let second = fields[1] ^ keys[1];
    let first = fields[0].wrapping_mul(multiplicative_inverse(keys[0]));
    [first, second, third, fourth]
}

pub fn part_checksum(parts: &[u32; 4]) -> u16 {
    let weighted = parts
        .iter()
        .zip(CHECKSUM_WEIGHTS)
        .fold(0u32, |sum, (part, weight)| {
            sum.wrapping_add(part.wrapping_mul(weight))
        });
    (weighted & 0xFFFF) as u16
}

// Newton iteration; each step doubles the number of correct low bits.
fn multiplicative_inverse(odd: u32) -> u32 {
    let mut inverse = odd;
    for _ in 0..4 {
        inverse = inverse.wrapping_mul(2u32.wrapping_sub(odd.wrapping_mul(inverse)));
    }
    inverse
}
