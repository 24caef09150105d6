//! Response classification.
//!
//! # Design
//! `classify` is a pure function from what a transport produced to an
//! `Outcome`. The server speaks several dialects: bare arrays, objects with
//! or without a `success` flag, `errorSources` lists on validation failures,
//! plain text on crashes. Each shape maps to exactly one `match` arm here so
//! nothing above this module needs to look at a body again.

use serde_json::{Map, Value};

use crate::error::TransportError;
use crate::http::HttpResponse;
use crate::outcome::{Outcome, STATUS_CANCELLED, STATUS_CONNECTION, STATUS_TIMEOUT, STATUS_UNKNOWN};

/// What a single transport attempt produced.
pub type Dispatched = Result<HttpResponse, TransportError>;

pub const TIMEOUT_MESSAGE: &str = "Request timeout. Please try again.";
pub const CANCELLED_MESSAGE: &str = "Request cancelled";
pub const CONNECTION_MESSAGE: &str =
    "Network connection failed. Please check your internet connection.";
pub const UNKNOWN_TRANSPORT_MESSAGE: &str = "An unexpected error occurred";
pub const UNKNOWN_ERROR_MESSAGE: &str = "Unknown error occurred";
pub const VALIDATION_MESSAGE: &str = "Validation error";
pub const VALIDATION_ENTRY_MESSAGE: &str = "Unknown error";
pub const SERVER_ERROR_MESSAGE: &str = "An unexpected error occurred!";
pub const INTERNAL_SERVER_ERROR_MESSAGE: &str = "Internal Server Error";
pub const UNEXPECTED_MESSAGE: &str = "Unexpected error occurred";

/// Classify a transport result into an `Outcome`.
pub fn classify(dispatched: &Dispatched) -> Outcome {
    match dispatched {
        Ok(response) => classify_response(response.status, &response.body),
        Err(err) => classify_failure(err),
    }
}

/// Classify a transport failure.
pub fn classify_failure(err: &TransportError) -> Outcome {
    match err {
        TransportError::Timeout => Outcome::failure(STATUS_TIMEOUT, None, TIMEOUT_MESSAGE),
        TransportError::Cancelled => Outcome::failure(STATUS_CANCELLED, None, CANCELLED_MESSAGE),
        TransportError::Connection(_) => {
            Outcome::failure(STATUS_CONNECTION, None, CONNECTION_MESSAGE)
        }
        TransportError::BadResponse { status, body } => classify_response(*status, body),
        TransportError::Unknown(message) => {
            let message = if message.trim().is_empty() {
                UNKNOWN_TRANSPORT_MESSAGE
            } else {
                message.as_str()
            };
            Outcome::failure(STATUS_UNKNOWN, None, message)
        }
    }
}

/// Classify a status code and raw body.
pub fn classify_response(status: u16, body: &str) -> Outcome {
    let payload = decode_body(body);
    let carried = match &payload {
        Value::Null => None,
        other => Some(other.clone()),
    };

    if (200..=299).contains(&status) {
        return match &payload {
            Value::Array(_) => Outcome::success(status, carried),
            Value::Object(map) => match map.get("success") {
                None | Some(Value::Bool(true)) => Outcome::success(status, carried),
                Some(_) => {
                    let message = message_field(map).unwrap_or(UNKNOWN_ERROR_MESSAGE);
                    Outcome::failure(status, carried, message)
                }
            },
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {
                Outcome::success(status, carried)
            }
        };
    }

    let message = match status {
        400 => validation_message(&payload),
        500 => match &payload {
            Value::Object(map) => message_field(map).unwrap_or(SERVER_ERROR_MESSAGE).to_string(),
            _ => INTERNAL_SERVER_ERROR_MESSAGE.to_string(),
        },
        _ => match &payload {
            Value::Object(map) => message_field(map).unwrap_or(UNEXPECTED_MESSAGE).to_string(),
            _ => UNEXPECTED_MESSAGE.to_string(),
        },
    };
    Outcome::failure(status, carried, message)
}

/// Decode a raw body: empty is `Null`, JSON is parsed, anything else is kept
/// as a JSON string.
pub fn decode_body(body: &str) -> Value {
    if body.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()))
}

fn message_field(map: &Map<String, Value>) -> Option<&str> {
    map.get("message")
        .and_then(Value::as_str)
        .filter(|m| !m.trim().is_empty())
}

fn validation_message(payload: &Value) -> String {
    let sources = match payload {
        Value::Object(map) => map.get("errorSources"),
        _ => None,
    };
    match sources {
        Some(Value::Array(entries)) if !entries.is_empty() => entries
            .iter()
            .map(|entry| {
                entry
                    .get("message")
                    .and_then(Value::as_str)
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or(VALIDATION_ENTRY_MESSAGE)
            })
            .collect::<Vec<_>>()
            .join(", "),
        _ => VALIDATION_MESSAGE.to_string(),
    }
}
