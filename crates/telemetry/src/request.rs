use anyhow::{Context, Result};
use rand::seq::SliceRandom;
use rand::Rng;

use shroud_host::NetworkRequest;

use crate::types::{CollectorPayload, TelemetryMessage};

pub const GENERIC_USER_AGENTS: [&str; 4] = [
    "Mozilla/5.0 (Linux; Android 13; K) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Mobile Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64; rv:122.0) Gecko/20100101 Firefox/122.0",
    "okhttp/4.12.0",
];

pub const DECOY_QUERY_KEYS: [&str; 8] = ["_", "cb", "r", "v", "ref", "src", "lang", "tz"];

const QUERY_TIMESTAMP: &str = "ts";
const QUERY_SESSION: &str = "sid";

/// Builds the one request a flush sends.
///
/// Header values and decoy query parameters change on every call so two
/// flushes never present an identical fingerprint.
pub(crate) fn build_collector_request<R: Rng + ?Sized>(
    collector_url: &str,
    messages: &[TelemetryMessage],
    session_id: &str,
    now_unix_millis: u64,
    rng: &mut R,
) -> Result<NetworkRequest> {
    let body = serde_json::to_string(&CollectorPayload::from_messages(messages))
        .context("failed serializing telemetry batch payload")?;

    let mut request = NetworkRequest::post(collector_url, body);

    let mut query = vec![
        (QUERY_TIMESTAMP.to_string(), now_unix_millis.to_string()),
        (QUERY_SESSION.to_string(), session_id.to_string()),
    ];
    let decoy_keys: Vec<&str> = DECOY_QUERY_KEYS.choose_multiple(rng, 2).copied().collect();
    for key in decoy_keys {
        query.push((key.to_string(), format!("{:08x}", rng.gen::<u32>())));
    }
    query.shuffle(rng);
    request.query = query;

    let user_agent = GENERIC_USER_AGENTS
        .choose(rng)
        .copied()
        .unwrap_or(GENERIC_USER_AGENTS[0]);
    let client_version = format!(
        "{}.{}.{}",
        rng.gen_range(1..6),
        rng.gen_range(0..20),
        rng.gen_range(0..100)
    );
    let jitter_millis: u64 = rng.gen_range(0..1_500);
    request.headers = vec![
        ("Content-Type".to_string(), "application/json".to_string()),
        ("User-Agent".to_string(), user_agent.to_string()),
        ("X-Client-Version".to_string(), client_version),
        (
            "X-Client-Time".to_string(),
            now_unix_millis.saturating_sub(jitter_millis).to_string(),
        ),
    ];
    Ok(request)
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    fn sample_messages() -> Vec<TelemetryMessage> {
        vec![
            TelemetryMessage {
                created_at_unix_millis: 1,
                ciphertext_hex: "0A0B".to_string(),
            },
            TelemetryMessage {
                created_at_unix_millis: 2,
                ciphertext_hex: "FF00".to_string(),
            },
        ]
    }

    #[test]
    fn body_matches_collector_wire_contract() {
        let mut rng = StdRng::seed_from_u64(7);
        let request = build_collector_request(
            "http://collector.invalid/ingest",
            &sample_messages(),
            "sid-1",
            1_000,
            &mut rng,
        )
        .expect("build request");
        assert_eq!(request.method, "POST");
        assert_eq!(
            request.body,
            r#"{"messages":[{"msg":"0A0B"},{"msg":"FF00"}]}"#
        );
    }

    #[test]
    fn query_carries_freshness_session_and_two_decoys() {
        let mut rng = StdRng::seed_from_u64(11);
        let request = build_collector_request(
            "http://collector.invalid/ingest",
            &sample_messages(),
            "sid-abc",
            123_456,
            &mut rng,
        )
        .expect("build request");
        assert_eq!(request.query_value("ts"), Some("123456"));
        assert_eq!(request.query_value("sid"), Some("sid-abc"));
        let decoys = request
            .query
            .iter()
            .filter(|(key, _)| DECOY_QUERY_KEYS.contains(&key.as_str()))
            .count();
        assert_eq!(decoys, 2);
        assert_eq!(request.query.len(), 4);
    }

    #[test]
    fn headers_include_content_type_generic_agent_and_synthetic_fields() {
        let mut rng = StdRng::seed_from_u64(3);
        let request = build_collector_request(
            "http://collector.invalid/ingest",
            &sample_messages(),
            "sid",
            10_000,
            &mut rng,
        )
        .expect("build request");
        assert_eq!(request.header("content-type"), Some("application/json"));
        let agent = request.header("user-agent").expect("user agent");
        assert!(GENERIC_USER_AGENTS.contains(&agent));
        assert!(request.header("x-client-version").is_some());
        let client_time: u64 = request
            .header("x-client-time")
            .expect("client time")
            .parse()
            .expect("numeric client time");
        assert!(client_time <= 10_000);
    }
}
