//! Request dispatch.
//!
//! # Design
//! `Transport` is the only seam that performs I/O. It takes a fully built
//! `HttpRequest` and reports either a 2xx `HttpResponse` or a
//! `TransportError`; every non-2xx answer comes back as
//! `TransportError::BadResponse` with the status and raw body. What the body
//! means is left to the classifier.
//!
//! `ReqwestTransport` is the production implementation. Tests substitute
//! their own implementations to script responses and count calls.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{ClientError, TransportError};
use crate::http::{HttpMethod, HttpRequest, HttpResponse, RequestBody};

/// Download progress: bytes received so far, and the total when the server
/// announced one.
pub type ProgressCallback = Arc<dyn Fn(u64, Option<u64>) + Send + Sync>;

/// Performs HTTP attempts.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and buffer the response body.
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;

    /// Send a request and stream a 2xx response body into `destination`.
    /// The returned response has an empty body.
    async fn download(
        &self,
        request: &HttpRequest,
        destination: &Path,
        progress: Option<&ProgressCallback>,
    ) -> Result<HttpResponse, TransportError>;
}

/// `Transport` backed by a `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    request_timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.receive_timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        debug!(
            base_url = %config.base_url,
            connect_timeout_ms = config.connect_timeout.as_millis() as u64,
            receive_timeout_ms = config.receive_timeout.as_millis() as u64,
            "HTTP transport initialized"
        );

        Ok(Self {
            client,
            request_timeout: config.send_timeout + config.receive_timeout,
        })
    }

    fn build(&self, request: &HttpRequest) -> Result<reqwest::RequestBuilder, TransportError> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, &request.url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            // reqwest writes its own multipart content type with the boundary.
            if request.body.is_multipart() && name.eq_ignore_ascii_case("content-type") {
                continue;
            }
            builder = builder.header(name.as_str(), value.as_str());
        }

        let builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Multipart { file, fields } => {
                let mut form = reqwest::multipart::Form::new();
                for (name, value) in fields {
                    form = form.text(name.clone(), value.clone());
                }
                let part = reqwest::multipart::Part::bytes(file.bytes.clone())
                    .file_name(file.file_name.clone())
                    .mime_str(&file.content_type)?;
                builder.multipart(form.part(file.field_name.clone(), part))
            }
        };
        Ok(builder)
    }

    async fn execute(
        &self,
        request: &HttpRequest,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, TransportError> {
        debug!(method = request.method.as_str(), url = %request.url, "dispatching request");

        let response = builder.send().await.map_err(|e| {
            let err = TransportError::from(e);
            warn!(method = request.method.as_str(), url = %request.url, error = %err, "transport failure");
            err
        })?;

        let status = response.status().as_u16();
        debug!(method = request.method.as_str(), url = %request.url, status, "response received");

        if response.status().is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(TransportError::BadResponse { status, body })
    }
}

fn collect_headers(headers: &reqwest::header::HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

async fn write_body(
    response: reqwest::Response,
    destination: &Path,
    progress: Option<&ProgressCallback>,
) -> Result<u64, TransportError> {
    if let Some(parent) = destination.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let total = response.content_length();
    let mut file = tokio::fs::File::create(destination).await?;
    let mut stream = response.bytes_stream();
    let mut received: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        received += chunk.len() as u64;
        if let Some(progress) = progress {
            progress(received, total);
        }
    }
    file.flush().await?;
    Ok(received)
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let builder = self.build(request)?.timeout(self.request_timeout);
        let response = self.execute(request, builder).await?;

        let status = response.status().as_u16();
        let headers = collect_headers(response.headers());
        let body = response.text().await?;
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    async fn download(
        &self,
        request: &HttpRequest,
        destination: &Path,
        progress: Option<&ProgressCallback>,
    ) -> Result<HttpResponse, TransportError> {
        // No overall deadline here: a large file may legitimately take longer
        // than one request timeout. Stalls are caught by the read timeout.
        let builder = self.build(request)?;
        let response = self.execute(request, builder).await?;

        let status = response.status().as_u16();
        let headers = collect_headers(response.headers());

        match write_body(response, destination, progress).await {
            Ok(bytes) => {
                debug!(url = %request.url, bytes, path = %destination.display(), "download complete");
                Ok(HttpResponse {
                    status,
                    headers,
                    body: String::new(),
                })
            }
            Err(err) => {
                warn!(url = %request.url, error = %err, "download failed, removing partial file");
                let _ = tokio::fs::remove_file(destination).await;
                Err(err)
            }
        }
    }
}
