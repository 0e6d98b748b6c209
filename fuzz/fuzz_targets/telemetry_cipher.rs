#![no_main]

use libfuzzer_sys::fuzz_target;
use shroud_telemetry::TelemetryCipher;

fuzz_target!(|data: &[u8]| {
    let split = data.len() / 2;
    let host_id = String::from_utf8_lossy(&data[..split]).to_string();
    let start_ms = data.len() as u64 * 7_919;
    let cipher = TelemetryCipher::derive(&host_id, start_ms);

    let plain = String::from_utf8_lossy(&data[split..]).to_string();
    let hex = cipher.encrypt_hex(&plain);
    assert_eq!(cipher.decrypt_hex(&hex).as_deref(), Some(plain.as_str()));

    let _ = cipher.decrypt_hex(&String::from_utf8_lossy(data));
});
