//! The normalized result of every client operation.

use serde::Serialize;
use serde_json::Value;

/// Synthetic status for a transport timeout.
pub const STATUS_TIMEOUT: u16 = 408;
/// Synthetic status for a cancelled request.
pub const STATUS_CANCELLED: u16 = 499;
/// Synthetic status for a transport failure of unknown kind.
pub const STATUS_UNKNOWN: u16 = 500;
/// Synthetic status for a failed connection.
pub const STATUS_CONNECTION: u16 = 503;

/// Success flag, status, optional payload and error message of a call.
///
/// `error_message` is empty exactly when `is_success` is true.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    pub is_success: bool,
    pub status_code: u16,
    pub payload: Option<Value>,
    pub error_message: String,
}

impl Outcome {
    pub fn success(status_code: u16, payload: Option<Value>) -> Self {
        Self {
            is_success: true,
            status_code,
            payload,
            error_message: String::new(),
        }
    }

    pub fn failure(status_code: u16, payload: Option<Value>, message: impl Into<String>) -> Self {
        Self {
            is_success: false,
            status_code,
            payload,
            error_message: message.into(),
        }
    }

    /// True for a failed call the server rejected as unauthenticated.
    pub fn is_unauthorized(&self) -> bool {
        !self.is_success && self.status_code == 401
    }

    /// Deserialize the payload into a concrete type.
    pub fn payload_as<T: serde::de::DeserializeOwned>(&self) -> Option<T> {
        self.payload
            .as_ref()
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_has_empty_message() {
        let outcome = Outcome::success(200, Some(json!([1, 2])));
        assert!(outcome.is_success);
        assert!(outcome.error_message.is_empty());
    }

    #[test]
    fn only_failed_401_is_unauthorized() {
        assert!(Outcome::failure(401, None, "Unauthorized").is_unauthorized());
        assert!(!Outcome::failure(403, None, "Forbidden").is_unauthorized());
        assert!(!Outcome::success(200, None).is_unauthorized());
    }

    #[test]
    fn payload_as_deserializes_typed_values() {
        #[derive(serde::Deserialize, Debug, PartialEq)]
        struct Order {
            id: String,
        }
        let outcome = Outcome::success(200, Some(json!({"id": "o-1"})));
        assert_eq!(
            outcome.payload_as::<Order>(),
            Some(Order {
                id: "o-1".to_string()
            })
        );
        assert_eq!(outcome.payload_as::<Vec<u32>>(), None);
    }
}
