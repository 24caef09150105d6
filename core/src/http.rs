//! HTTP request and response types described as plain data.
//!
//! # Design
//! A call starts life as a `RequestDescriptor`: what the caller asked for,
//! with a path relative to the API base URL. Each attempt turns the
//! descriptor into an `HttpRequest` carrying the absolute URL and the headers
//! current at that moment, so the retry after a token refresh is built from
//! the same descriptor with fresh headers. Transports only ever see
//! `HttpRequest` and hand back `HttpResponse`.
//!
//! Whether a call targets one of the reserved auth endpoints is recorded on
//! the descriptor when it is constructed, so the refresh decision never has to
//! inspect the path again.

use serde_json::Value;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// The fixed set of authentication endpoints.
///
/// A 401 from any of these is returned to the caller as-is; it never starts
/// a token refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthEndpoint {
    Login,
    Register,
    Logout,
    Refresh,
}

impl AuthEndpoint {
    pub const ALL: [AuthEndpoint; 4] = [
        AuthEndpoint::Login,
        AuthEndpoint::Register,
        AuthEndpoint::Logout,
        AuthEndpoint::Refresh,
    ];

    pub fn path(self) -> &'static str {
        match self {
            AuthEndpoint::Login => "/auth/login",
            AuthEndpoint::Register => "/auth/register",
            AuthEndpoint::Logout => "/auth/logout",
            AuthEndpoint::Refresh => "/auth/refresh",
        }
    }

    /// Exact lookup of a request path. A single trailing slash is ignored;
    /// anything else (sub-paths, query strings) does not match.
    pub fn from_path(path: &str) -> Option<Self> {
        let trimmed = match path.strip_suffix('/') {
            Some(rest) if !rest.is_empty() => rest,
            _ => path,
        };
        Self::ALL.into_iter().find(|endpoint| endpoint.path() == trimmed)
    }
}

/// A file attached to a multipart upload, already read into memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartFile {
    pub field_name: String,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Request payload.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Multipart {
        file: MultipartFile,
        fields: Vec<(String, String)>,
    },
}

impl RequestBody {
    pub fn is_multipart(&self) -> bool {
        matches!(self, RequestBody::Multipart { .. })
    }

    /// Value of the `Content-Type` header for this body.
    pub fn content_type(&self) -> &'static str {
        if self.is_multipart() {
            "multipart/form-data"
        } else {
            "application/json"
        }
    }
}

/// What the caller asked for, independent of any particular attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    pub method: HttpMethod,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
    /// Explicit bearer token for the first attempt. When absent the stored
    /// access token is used.
    pub token: Option<String>,
    pub auth_endpoint: Option<AuthEndpoint>,
}

impl RequestDescriptor {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        let path = path.into();
        let auth_endpoint = AuthEndpoint::from_path(&path);
        Self {
            method,
            path,
            query: Vec::new(),
            body: RequestBody::Empty,
            token: None,
            auth_endpoint,
        }
    }

    /// A POST to one of the reserved auth endpoints.
    pub fn auth(endpoint: AuthEndpoint, body: Value) -> Self {
        Self {
            method: HttpMethod::Post,
            path: endpoint.path().to_string(),
            query: Vec::new(),
            body: RequestBody::Json(body),
            token: None,
            auth_endpoint: Some(endpoint),
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Whether a 401 on this call may be answered with a refresh and retry.
    pub fn refresh_eligible(&self) -> bool {
        self.auth_endpoint.is_none()
    }
}

/// One concrete attempt at a call, ready for a transport.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
}

impl HttpRequest {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A raw HTTP response described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn auth_endpoints_match_exact_paths() {
        assert_eq!(AuthEndpoint::from_path("/auth/login"), Some(AuthEndpoint::Login));
        assert_eq!(AuthEndpoint::from_path("/auth/refresh/"), Some(AuthEndpoint::Refresh));
        assert_eq!(AuthEndpoint::from_path("/auth/login/history"), None);
        assert_eq!(AuthEndpoint::from_path("/v2/auth/login"), None);
        assert_eq!(AuthEndpoint::from_path("/orders"), None);
        assert_eq!(AuthEndpoint::from_path("/"), None);
    }

    #[test]
    fn descriptor_marks_reserved_endpoints_at_construction() {
        let login = RequestDescriptor::new(HttpMethod::Post, "/auth/login");
        assert_eq!(login.auth_endpoint, Some(AuthEndpoint::Login));
        assert!(!login.refresh_eligible());

        let orders = RequestDescriptor::new(HttpMethod::Get, "/orders");
        assert!(orders.refresh_eligible());
    }

    #[test]
    fn auth_descriptor_posts_json() {
        let desc = RequestDescriptor::auth(AuthEndpoint::Register, json!({"email": "a@b.c"}));
        assert_eq!(desc.method, HttpMethod::Post);
        assert_eq!(desc.path, "/auth/register");
        assert_eq!(desc.body, RequestBody::Json(json!({"email": "a@b.c"})));
        assert!(!desc.refresh_eligible());
    }

    #[test]
    fn query_parameters_keep_insertion_order() {
        let desc = RequestDescriptor::new(HttpMethod::Get, "/orders")
            .with_query("page", "2")
            .with_query("limit", "10")
            .with_query("page", "3");
        assert_eq!(
            desc.query,
            vec![
                ("page".to_string(), "2".to_string()),
                ("limit".to_string(), "10".to_string()),
                ("page".to_string(), "3".to_string()),
            ]
        );
    }

    #[test]
    fn content_type_follows_body_kind() {
        assert_eq!(RequestBody::Empty.content_type(), "application/json");
        let multipart = RequestBody::Multipart {
            file: MultipartFile {
                field_name: "image".to_string(),
                file_name: "a.png".to_string(),
                content_type: "image/png".to_string(),
                bytes: vec![1, 2, 3],
            },
            fields: Vec::new(),
        };
        assert_eq!(multipart.content_type(), "multipart/form-data");
    }

    #[test]
    fn header_lookup_ignores_case() {
        let req = HttpRequest {
            method: HttpMethod::Get,
            url: "http://localhost/orders".to_string(),
            query: Vec::new(),
            headers: vec![("authorization".to_string(), "Bearer t".to_string())],
            body: RequestBody::Empty,
        };
        assert_eq!(req.header("Authorization"), Some("Bearer t"));
        assert_eq!(req.header("content-type"), None);
    }
}
