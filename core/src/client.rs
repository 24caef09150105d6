//! The client façade.
//!
//! # Design
//! Every operation runs the same cycle: read the current access token, build
//! an `HttpRequest` from the caller's `RequestDescriptor`, dispatch it,
//! classify the result. A 401 on a descriptor that is not one of the reserved
//! auth endpoints hands over to the `RefreshCoordinator`; if it reports fresh
//! credentials the same descriptor is dispatched once more with new headers
//! and that classification is final, whatever it says. There is no other
//! retry path.
//!
//! `ApiClient` is cheap to clone. Clones share the transport, the credential
//! store and the refresh gate.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::classify::classify;
use crate::config::ClientConfig;
use crate::credentials::CredentialStore;
use crate::error::{ClientError, ValidationError};
use crate::http::{
    AuthEndpoint, HttpMethod, HttpRequest, MultipartFile, RequestBody, RequestDescriptor,
};
use crate::outcome::Outcome;
use crate::refresh::RefreshCoordinator;
use crate::transport::{ProgressCallback, ReqwestTransport, Transport};

struct DownloadTarget {
    destination: PathBuf,
    progress: Option<ProgressCallback>,
}

/// Authenticated REST client.
#[derive(Clone)]
pub struct ApiClient {
    config: Arc<ClientConfig>,
    transport: Arc<dyn Transport>,
    store: Arc<dyn CredentialStore>,
    refresher: Arc<RefreshCoordinator>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.config.base_url)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a client that talks HTTP through reqwest.
    pub fn new(config: ClientConfig, store: Arc<dyn CredentialStore>) -> Result<Self, ClientError> {
        config.validate()?;
        let transport = Arc::new(ReqwestTransport::new(&config)?);
        Ok(Self::with_transport(config, transport, store))
    }

    /// Create a client over an arbitrary transport.
    pub fn with_transport(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        store: Arc<dyn CredentialStore>,
    ) -> Self {
        let refresher = Arc::new(RefreshCoordinator::new(
            config.clone(),
            transport.clone(),
            store.clone(),
        ));
        Self {
            config: Arc::new(config),
            transport,
            store,
            refresher,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    pub fn request(&self, method: HttpMethod, path: &str) -> RequestBuilder<'_> {
        RequestBuilder {
            client: self,
            descriptor: RequestDescriptor::new(method, path),
        }
    }

    pub fn get(&self, path: &str) -> RequestBuilder<'_> {
        self.request(HttpMethod::Get, path)
    }

    pub fn post(&self, path: &str) -> RequestBuilder<'_> {
        self.request(HttpMethod::Post, path)
    }

    pub fn put(&self, path: &str) -> RequestBuilder<'_> {
        self.request(HttpMethod::Put, path)
    }

    pub fn patch(&self, path: &str) -> RequestBuilder<'_> {
        self.request(HttpMethod::Patch, path)
    }

    pub fn delete(&self, path: &str) -> RequestBuilder<'_> {
        self.request(HttpMethod::Delete, path)
    }

    /// POST to one of the reserved auth endpoints. A 401 here is final.
    pub async fn auth(&self, endpoint: AuthEndpoint, body: Value) -> Outcome {
        self.execute(RequestDescriptor::auth(endpoint, body)).await
    }

    pub async fn execute(&self, descriptor: RequestDescriptor) -> Outcome {
        self.run(&descriptor, None).await
    }

    /// Upload an image as `multipart/form-data`.
    ///
    /// Only `.jpg`, `.jpeg`, `.png` and `.gif` files are accepted; anything
    /// else is rejected before a request is made.
    pub async fn upload(
        &self,
        path: &str,
        file: impl AsRef<Path>,
        field_name: &str,
        fields: &[(&str, &str)],
    ) -> Result<Outcome, ValidationError> {
        let file = file.as_ref();
        let content_type = image_content_type(file)?;
        let bytes = tokio::fs::read(file)
            .await
            .map_err(|source| ValidationError::UnreadableFile {
                path: file.display().to_string(),
                source,
            })?;
        let file_name = file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut descriptor = RequestDescriptor::new(HttpMethod::Post, path);
        descriptor.body = RequestBody::Multipart {
            file: MultipartFile {
                field_name: field_name.to_string(),
                file_name,
                content_type: content_type.to_string(),
                bytes,
            },
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        };
        Ok(self.run(&descriptor, None).await)
    }

    /// Download `path` into `destination`.
    ///
    /// On success the payload is the destination path.
    pub async fn download(
        &self,
        path: &str,
        destination: impl AsRef<Path>,
        progress: Option<ProgressCallback>,
    ) -> Outcome {
        let target = DownloadTarget {
            destination: destination.as_ref().to_path_buf(),
            progress,
        };
        let descriptor = RequestDescriptor::new(HttpMethod::Get, path);
        let mut outcome = self.run(&descriptor, Some(&target)).await;
        if outcome.is_success && outcome.payload.is_none() {
            outcome.payload = Some(Value::String(target.destination.display().to_string()));
        }
        outcome
    }

    /// Build the concrete request for one attempt at `descriptor`.
    pub fn build_request(&self, descriptor: &RequestDescriptor, token: Option<&str>) -> HttpRequest {
        let mut headers = vec![(
            "Content-Type".to_string(),
            descriptor.body.content_type().to_string(),
        )];
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            headers.push(("Authorization".to_string(), format!("Bearer {token}")));
        }
        HttpRequest {
            method: descriptor.method,
            url: self.config.url(&descriptor.path),
            query: descriptor.query.clone(),
            headers,
            body: descriptor.body.clone(),
        }
    }

    async fn run(&self, descriptor: &RequestDescriptor, download: Option<&DownloadTarget>) -> Outcome {
        // The refresh gate compares against what the store held, not the
        // override, so an override never masks a stale stored token.
        let stored = self.store.access_token().await;
        let token = descriptor.token.clone().or_else(|| stored.clone());

        let first = self.attempt(descriptor, token.as_deref(), download).await;
        if !first.is_unauthorized() || !descriptor.refresh_eligible() {
            return first;
        }

        debug!(method = descriptor.method.as_str(), path = %descriptor.path, "unauthorized, attempting token refresh");
        if !self.refresher.attempt_refresh(stored.as_deref()).await {
            return first;
        }

        let refreshed = self.store.access_token().await;
        let retried = self.attempt(descriptor, refreshed.as_deref(), download).await;
        debug!(
            method = descriptor.method.as_str(),
            path = %descriptor.path,
            status = retried.status_code,
            success = retried.is_success,
            "retried after token refresh"
        );
        retried
    }

    async fn attempt(
        &self,
        descriptor: &RequestDescriptor,
        token: Option<&str>,
        download: Option<&DownloadTarget>,
    ) -> Outcome {
        let request = self.build_request(descriptor, token);
        let dispatched = match download {
            None => self.transport.send(&request).await,
            Some(target) => {
                self.transport
                    .download(&request, &target.destination, target.progress.as_ref())
                    .await
            }
        };
        classify(&dispatched)
    }
}

/// Per-call options for a REST request.
pub struct RequestBuilder<'a> {
    client: &'a ApiClient,
    descriptor: RequestDescriptor,
}

impl<'a> RequestBuilder<'a> {
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.descriptor = self.descriptor.with_query(key, value);
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.descriptor = self.descriptor.with_json(body);
        self
    }

    /// Use `token` instead of the stored access token for the first attempt.
    pub fn bearer(mut self, token: impl Into<String>) -> Self {
        self.descriptor = self.descriptor.with_token(token);
        self
    }

    pub fn descriptor(&self) -> &RequestDescriptor {
        &self.descriptor
    }

    pub async fn send(self) -> Outcome {
        self.client.execute(self.descriptor).await
    }
}

/// MIME type of an uploadable image, judged by its extension.
pub fn image_content_type(path: &Path) -> Result<&'static str, ValidationError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .ok_or_else(|| ValidationError::MissingExtension(path.display().to_string()))?;
    match extension.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Ok("image/jpeg"),
        "png" => Ok("image/png"),
        "gif" => Ok("image/gif"),
        _ => Err(ValidationError::UnsupportedFileType {
            extension: extension.to_string(),
        }),
    }
}
