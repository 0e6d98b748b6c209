pub const KEY_LEN: usize = 16;

/// Repeating-key XOR cipher for diagnostic text.
///
/// The key is a pure function of the host identifier and the process start
/// time, so a collector holding both can recover the plaintext. This hides
/// messages from casual inspection only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryCipher {
    key: [u8; KEY_LEN],
}

impl TelemetryCipher {
    pub fn derive(host_id: &str, process_start_unix_millis: u64) -> Self {
        let mut seed: u32 = 0x811C_9DC5;
        for byte in host_id.as_bytes() {
            seed ^= u32::from(*byte);
            seed = seed.wrapping_mul(0x0100_0193);
        }
        seed ^= process_start_unix_millis as u32;
        seed ^= (process_start_unix_millis >> 32) as u32;
        seed = seed.rotate_left(7) | 1;

        let mut key = [0u8; KEY_LEN];
        for slot in key.iter_mut() {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            *slot = (seed >> 24) as u8;
        }
        Self { key }
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn encrypt_hex(&self, plaintext: &str) -> String {
        encode_hex_upper(&xor_keystream(plaintext.as_bytes(), &self.key))
    }

    pub fn decrypt_hex(&self, ciphertext_hex: &str) -> Option<String> {
        let bytes = decode_hex(ciphertext_hex)?;
        String::from_utf8(xor_keystream(&bytes, &self.key)).ok()
    }
}

pub fn xor_keystream(data: &[u8], key: &[u8]) -> Vec<u8> {
    if key.is_empty() {
        return data.to_vec();
    }
    data.iter()
        .zip(key.iter().cycle())
        .map(|(byte, k)| byte ^ k)
        .collect()
}

pub fn encode_hex_upper(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}

fn decode_hex(raw: &str) -> Option<Vec<u8>> {
    let raw = raw.trim();
    if raw.len() % 2 != 0 {
        return None;
    }
    raw.as_bytes()
        .chunks(2)
        .map(|pair| {
            let high = (pair[0] as char).to_digit(16)?;
            let low = (pair[1] as char).to_digit(16)?;
            Some(((high << 4) | low) as u8)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_deterministic_per_host_and_start_time() {
        let a = TelemetryCipher::derive("host-a", 1_700_000_000_000);
        let b = TelemetryCipher::derive("host-a", 1_700_000_000_000);
        let other_host = TelemetryCipher::derive("host-b", 1_700_000_000_000);
        let other_start = TelemetryCipher::derive("host-a", 1_700_000_000_001);
        assert_eq!(a, b);
        assert_ne!(a.key(), other_host.key());
        assert_ne!(a.key(), other_start.key());
    }

    #[test]
    fn ciphertext_is_upper_hex_and_decrypts() {
        let cipher = TelemetryCipher::derive("host-a", 42);
        let hex = cipher.encrypt_hex("[42] integrity ok");
        assert_eq!(hex.len(), "[42] integrity ok".len() * 2);
        assert!(hex
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
        assert_eq!(cipher.decrypt_hex(&hex).as_deref(), Some("[42] integrity ok"));
    }

    #[test]
    fn decrypt_rejects_malformed_hex() {
        let cipher = TelemetryCipher::derive("host-a", 42);
        assert_eq!(cipher.decrypt_hex("ABC"), None);
        assert_eq!(cipher.decrypt_hex("ZZ"), None);
    }

    #[test]
    fn empty_key_leaves_data_unchanged() {
        assert_eq!(xor_keystream(b"abc", &[]), b"abc".to_vec());
    }
}
