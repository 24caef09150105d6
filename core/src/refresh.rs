//! Access token refresh.
//!
//! # Design
//! A refresh exchanges the stored refresh token for a new token pair at
//! `/auth/refresh`. The coordinator reports only whether a retry is worth
//! making; why a refresh failed is logged and otherwise swallowed.
//!
//! Refreshes are serialized. When several calls hit a 401 at once, the first
//! one through the gate performs the exchange. The others find that the
//! stored access token no longer matches the one their request carried and
//! go straight to their retry, so a rotating refresh token is never spent
//! twice.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::classify::classify;
use crate::config::ClientConfig;
use crate::credentials::CredentialStore;
use crate::error::RefreshError;
use crate::http::{AuthEndpoint, HttpMethod, HttpRequest, RequestBody};
use crate::transport::Transport;

/// Token pair returned by the refresh endpoint, either at the top level of
/// the body or under `data`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenPair {
    #[serde(alias = "access_token")]
    access_token: String,
    #[serde(default, alias = "refresh_token")]
    refresh_token: Option<String>,
}

impl TokenPair {
    fn from_payload(payload: &Value) -> Option<Self> {
        [payload.get("data"), Some(payload)]
            .into_iter()
            .flatten()
            .filter_map(|candidate| serde_json::from_value::<TokenPair>(candidate.clone()).ok())
            .find(|pair| !pair.access_token.trim().is_empty())
    }
}

/// Exchanges refresh tokens for new credentials.
pub struct RefreshCoordinator {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    store: Arc<dyn CredentialStore>,
    gate: Mutex<()>,
}

impl RefreshCoordinator {
    pub fn new(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        store: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            config,
            transport,
            store,
            gate: Mutex::new(()),
        }
    }

    /// Try to obtain fresh credentials after a 401. `stale_token` is the
    /// stored access token as it was read before the rejected request.
    ///
    /// Returns `true` when the store now holds an access token worth retrying
    /// with. On any failure other than a missing refresh token, every stored
    /// credential is cleared.
    pub async fn attempt_refresh(&self, stale_token: Option<&str>) -> bool {
        let _guard = self.gate.lock().await;

        let current = self.store.access_token().await;
        if current.is_some() && current.as_deref() != stale_token {
            debug!("credentials changed while waiting, skipping refresh");
            return true;
        }

        match self.refresh().await {
            Ok(()) => {
                debug!("access token refreshed");
                true
            }
            Err(RefreshError::MissingRefreshToken) => {
                debug!("no refresh token stored, not refreshing");
                false
            }
            Err(err) => {
                warn!(error = %err, "token refresh failed, clearing stored credentials");
                self.store.clear_all().await;
                false
            }
        }
    }

    async fn refresh(&self) -> Result<(), RefreshError> {
        let refresh_token = self
            .store
            .refresh_token()
            .await
            .filter(|t| !t.trim().is_empty())
            .ok_or(RefreshError::MissingRefreshToken)?;

        let request = HttpRequest {
            method: HttpMethod::Post,
            url: self.config.url(AuthEndpoint::Refresh.path()),
            query: Vec::new(),
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: RequestBody::Json(json!({ "refreshToken": refresh_token })),
        };

        let outcome = classify(&self.transport.send(&request).await);
        if !outcome.is_success {
            return Err(RefreshError::Rejected {
                status: outcome.status_code,
                message: outcome.error_message,
            });
        }

        let tokens = outcome
            .payload
            .as_ref()
            .and_then(TokenPair::from_payload)
            .ok_or(RefreshError::MissingAccessToken)?;

        self.store.save_access_token(tokens.access_token).await;
        if let Some(refresh_token) = tokens.refresh_token.filter(|t| !t.trim().is_empty()) {
            self.store.save_refresh_token(refresh_token).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::MemoryCredentialStore;
    use crate::error::TransportError;
    use crate::http::HttpResponse;
    use crate::transport::ProgressCallback;
    use async_trait::async_trait;
    use std::path::Path;

    struct FixedTransport {
        reply: Result<HttpResponse, TransportError>,
        calls: std::sync::Mutex<Vec<HttpRequest>>,
    }

    impl FixedTransport {
        fn new(reply: Result<HttpResponse, TransportError>) -> Arc<Self> {
            Arc::new(Self {
                reply,
                calls: std::sync::Mutex::new(Vec::new()),
            })
        }

        fn ok(status: u16, body: Value) -> Arc<Self> {
            Self::new(Ok(HttpResponse {
                status,
                headers: Vec::new(),
                body: body.to_string(),
            }))
        }

        fn calls(&self) -> Vec<HttpRequest> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for FixedTransport {
        async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
            self.calls.lock().unwrap().push(request.clone());
            self.reply.clone()
        }

        async fn download(
            &self,
            request: &HttpRequest,
            _destination: &Path,
            _progress: Option<&ProgressCallback>,
        ) -> Result<HttpResponse, TransportError> {
            self.send(request).await
        }
    }

    fn coordinator(
        transport: Arc<FixedTransport>,
        store: Arc<MemoryCredentialStore>,
    ) -> RefreshCoordinator {
        RefreshCoordinator::new(ClientConfig::default(), transport, store)
    }

    fn store(access: Option<&str>, refresh: Option<&str>) -> Arc<MemoryCredentialStore> {
        Arc::new(MemoryCredentialStore::with_tokens(
            access.map(str::to_string),
            refresh.map(str::to_string),
        ))
    }

    #[test]
    fn token_pair_is_found_under_data_or_top_level() {
        let nested = json!({"success": true, "data": {"accessToken": "a", "refreshToken": "r"}});
        let pair = TokenPair::from_payload(&nested).unwrap();
        assert_eq!(pair.access_token, "a");
        assert_eq!(pair.refresh_token.as_deref(), Some("r"));

        let flat = json!({"access_token": "b"});
        let pair = TokenPair::from_payload(&flat).unwrap();
        assert_eq!(pair.access_token, "b");
        assert_eq!(pair.refresh_token, None);

        assert!(TokenPair::from_payload(&json!({"data": {"accessToken": ""}})).is_none());
        assert!(TokenPair::from_payload(&json!([1, 2])).is_none());
    }

    #[tokio::test]
    async fn successful_refresh_persists_both_tokens() {
        let transport = FixedTransport::ok(
            200,
            json!({"success": true, "data": {"accessToken": "new-a", "refreshToken": "new-r"}}),
        );
        let store = store(Some("old-a"), Some("old-r"));
        let refreshed = coordinator(transport.clone(), store.clone())
            .attempt_refresh(Some("old-a"))
            .await;

        assert!(refreshed);
        assert_eq!(store.access_token().await.as_deref(), Some("new-a"));
        assert_eq!(store.refresh_token().await.as_deref(), Some("new-r"));

        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].url, "http://localhost:3000/auth/refresh");
        assert_eq!(calls[0].body, RequestBody::Json(json!({"refreshToken": "old-r"})));
        assert_eq!(calls[0].header("authorization"), None);
    }

    #[tokio::test]
    async fn refresh_without_new_refresh_token_keeps_the_old_one() {
        let transport = FixedTransport::ok(200, json!({"accessToken": "new-a"}));
        let store = store(Some("old-a"), Some("old-r"));
        assert!(coordinator(transport, store.clone()).attempt_refresh(Some("old-a")).await);
        assert_eq!(store.refresh_token().await.as_deref(), Some("old-r"));
    }

    #[tokio::test]
    async fn missing_refresh_token_makes_no_call_and_keeps_credentials() {
        let transport = FixedTransport::ok(200, json!({"accessToken": "x"}));
        let store = store(Some("old-a"), None);
        assert!(!coordinator(transport.clone(), store.clone()).attempt_refresh(Some("old-a")).await);
        assert!(transport.calls().is_empty());
        assert_eq!(store.access_token().await.as_deref(), Some("old-a"));
    }

    #[tokio::test]
    async fn rejected_refresh_clears_credentials() {
        let transport = FixedTransport::new(Err(TransportError::BadResponse {
            status: 401,
            body: r#"{"message":"refresh token expired"}"#.to_string(),
        }));
        let store = store(Some("old-a"), Some("old-r"));
        assert!(!coordinator(transport, store.clone()).attempt_refresh(Some("old-a")).await);
        assert_eq!(store.access_token().await, None);
        assert_eq!(store.refresh_token().await, None);
    }

    #[tokio::test]
    async fn response_without_access_token_clears_credentials() {
        let transport = FixedTransport::ok(200, json!({"success": true, "data": {}}));
        let store = store(Some("old-a"), Some("old-r"));
        assert!(!coordinator(transport, store.clone()).attempt_refresh(Some("old-a")).await);
        assert_eq!(store.refresh_token().await, None);
    }

    #[tokio::test]
    async fn transport_failure_during_refresh_clears_credentials() {
        let transport = FixedTransport::new(Err(TransportError::Timeout));
        let store = store(Some("old-a"), Some("old-r"));
        assert!(!coordinator(transport, store.clone()).attempt_refresh(Some("old-a")).await);
        assert_eq!(store.access_token().await, None);
    }

    #[tokio::test]
    async fn already_rotated_credentials_skip_the_refresh_call() {
        let transport = FixedTransport::ok(200, json!({"accessToken": "unused"}));
        let store = store(Some("rotated-a"), Some("rotated-r"));
        assert!(coordinator(transport.clone(), store).attempt_refresh(Some("stale-a")).await);
        assert!(transport.calls().is_empty());
    }
}
