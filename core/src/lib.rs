//! Authenticated REST client core.
//!
//! # Overview
//! Issues REST calls, folds every server answer or transport failure into a
//! single `Outcome` shape, and recovers from expired sessions with one
//! refresh-and-retry cycle per call.
//!
//! # Design
//! - `ApiClient` is the façade. It is built once and cloned by handle; there
//!   is no global instance.
//! - `Transport` is the only I/O seam. `ReqwestTransport` is the real one,
//!   tests plug in scripted fakes.
//! - `classify` is pure: same input, same `Outcome`.
//! - `RefreshCoordinator` exchanges the refresh token and never reports its
//!   own errors; a failed refresh just means the original 401 stands.
//! - Credentials live behind the injected `CredentialStore` trait.

pub mod classify;
pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod http;
pub mod outcome;
pub mod refresh;
pub mod transport;

pub use classify::{classify, Dispatched};
pub use client::{image_content_type, ApiClient, RequestBuilder};
pub use config::ClientConfig;
pub use credentials::{CredentialStore, MemoryCredentialStore};
pub use error::{ClientError, TransportError, ValidationError};
pub use http::{
    AuthEndpoint, HttpMethod, HttpRequest, HttpResponse, MultipartFile, RequestBody,
    RequestDescriptor,
};
pub use outcome::Outcome;
pub use refresh::RefreshCoordinator;
pub use transport::{ProgressCallback, ReqwestTransport, Transport};
