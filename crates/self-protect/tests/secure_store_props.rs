use std::sync::Arc;

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use self_protect::{SecureStoreConfig, SecureValueStore, DEFAULT_SECURE_VALUE_TTL};
use shroud_host::testing::ManualClock;

proptest! {
    #[test]
    fn decode_recovers_every_value_below_two_to_the_31(value in 0u32..(1u32 << 31), seed in any::<u64>()) {
        let clock = ManualClock::new();
        let mut store = SecureValueStore::with_rng(
            SecureStoreConfig { ttl: DEFAULT_SECURE_VALUE_TTL },
            Arc::new(clock),
            StdRng::seed_from_u64(seed),
        );
        store.encode(value, "prop");
        let decoded = store.decode("prop").expect("decode");
        prop_assert_eq!(decoded.value, value);
        prop_assert!(decoded.is_verified());
    }
}
