//! Verify the classifier against JSON test vectors stored in `test-vectors/`.
//!
//! Each case is either a raw response (`status` + `body`) or a transport
//! failure, paired with the exact `Outcome` it must produce. Payloads are
//! compared as parsed JSON so field ordering in the vector file is irrelevant.

use authclient_core::{classify, Dispatched, HttpResponse, Outcome, TransportError};
use serde_json::Value;

fn dispatched(case: &Value) -> Dispatched {
    if let Some(response) = case.get("response") {
        return Ok(HttpResponse {
            status: response["status"].as_u64().unwrap() as u16,
            headers: Vec::new(),
            body: response["body"].as_str().unwrap().to_string(),
        });
    }

    let failure = &case["failure"];
    let message = failure["message"].as_str().unwrap_or_default().to_string();
    Err(match failure["kind"].as_str().unwrap() {
        "timeout" => TransportError::Timeout,
        "cancelled" => TransportError::Cancelled,
        "connection" => TransportError::Connection(message),
        "bad_response" => TransportError::BadResponse {
            status: failure["status"].as_u64().unwrap() as u16,
            body: failure["body"].as_str().unwrap().to_string(),
        },
        "unknown" => TransportError::Unknown(message),
        other => panic!("unknown failure kind: {other}"),
    })
}

fn expected(case: &Value) -> Outcome {
    let e = &case["expected"];
    Outcome {
        is_success: e["is_success"].as_bool().unwrap(),
        status_code: e["status_code"].as_u64().unwrap() as u16,
        payload: match &e["payload"] {
            Value::Null => None,
            other => Some(other.clone()),
        },
        error_message: e["error_message"].as_str().unwrap().to_string(),
    }
}

#[test]
fn classify_test_vectors() {
    let raw = include_str!("../../test-vectors/classify.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    let cases = vectors["cases"].as_array().unwrap();
    assert!(!cases.is_empty());

    for case in cases {
        let name = case["name"].as_str().unwrap();
        let input = dispatched(case);
        let outcome = classify(&input);
        assert_eq!(outcome, expected(case), "{name}");

        // Classifying the same input again yields the same value.
        assert_eq!(classify(&input), outcome, "{name}: idempotence");
    }
}

#[test]
fn vectors_respect_outcome_invariants() {
    let raw = include_str!("../../test-vectors/classify.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let outcome = classify(&dispatched(case));
        if outcome.is_success {
            assert!((200..=299).contains(&outcome.status_code), "{name}");
            assert!(outcome.error_message.is_empty(), "{name}");
        } else {
            assert!(!outcome.error_message.is_empty(), "{name}");
        }
    }
}
