#![no_main]

use std::sync::Arc;

use libfuzzer_sys::fuzz_target;
use rand::rngs::StdRng;
use rand::SeedableRng;
use self_protect::{
    apply_transforms, derive_part_keys, invert_transforms, SecureStoreConfig, SecureValueStore,
};
use shroud_host::testing::ManualClock;

fn word(data: &[u8], offset: usize) -> u32 {
    let mut bytes = [0u8; 4];
    for (i, b) in bytes.iter_mut().enumerate() {
        *b = data.get(offset + i).copied().unwrap_or(0);
    }
    u32::from_le_bytes(bytes)
}

fuzz_target!(|data: &[u8]| {
    let value = word(data, 0);
    let base_key = word(data, 4);
    let seed = u64::from(word(data, 8)) << 32 | u64::from(word(data, 12));

    let keys = derive_part_keys(base_key);
    let parts = [value, base_key, !value, value ^ base_key];
    assert_eq!(invert_transforms(apply_transforms(parts, &keys), &keys), parts);

    let mut store = SecureValueStore::with_rng(
        SecureStoreConfig::default(),
        Arc::new(ManualClock::new()),
        StdRng::seed_from_u64(seed),
    );
    let id = String::from_utf8_lossy(&data[data.len().min(16)..]).to_string();
    store.encode(value, &id);
    let decoded = store.decode(&id).expect("fresh record decodes");
    assert_eq!(decoded.value, value);
    assert!(decoded.is_verified());
});
