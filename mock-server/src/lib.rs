use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use axum::{
    extract::{Multipart, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::debug;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub item: String,
    pub quantity: u32,
    pub status: String,
}

#[derive(Deserialize)]
pub struct OrderInput {
    pub item: Option<String>,
    pub quantity: Option<u32>,
    pub status: Option<String>,
}

#[derive(Deserialize)]
pub struct Credentials {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredUpload {
    pub field_name: String,
    pub file_name: String,
    pub content_type: String,
    pub size: usize,
    pub fields: HashMap<String, String>,
}

/// Server-side state. Public so tests can seed users and files, expire
/// tokens, and count refresh calls.
#[derive(Default)]
pub struct Store {
    users: HashMap<String, String>,
    access_tokens: HashSet<String>,
    refresh_tokens: HashSet<String>,
    orders: HashMap<Uuid, Order>,
    files: HashMap<String, Vec<u8>>,
    uploads: Vec<StoredUpload>,
    refresh_calls: usize,
}

impl Store {
    pub fn add_user(&mut self, email: &str, password: &str) {
        self.users.insert(email.to_string(), password.to_string());
    }

    pub fn add_file(&mut self, name: &str, bytes: Vec<u8>) {
        self.files.insert(name.to_string(), bytes);
    }

    pub fn issue_tokens(&mut self) -> TokenPair {
        let pair = TokenPair {
            access_token: Uuid::new_v4().to_string(),
            refresh_token: Uuid::new_v4().to_string(),
        };
        self.access_tokens.insert(pair.access_token.clone());
        self.refresh_tokens.insert(pair.refresh_token.clone());
        pair
    }

    /// Invalidate every access token; refresh tokens stay valid.
    pub fn expire_access_tokens(&mut self) {
        self.access_tokens.clear();
    }

    pub fn revoke_refresh_tokens(&mut self) {
        self.refresh_tokens.clear();
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls
    }

    pub fn uploads(&self) -> &[StoredUpload] {
        &self.uploads
    }
}

pub type Db = Arc<RwLock<Store>>;

/// Error responses in the API's envelope format.
#[derive(Debug)]
pub enum ApiError {
    Unauthorized(&'static str),
    NotFound(&'static str),
    Conflict(&'static str),
    Validation(Vec<(&'static str, &'static str)>),
    BadRequest(String),
    UnsupportedMediaType(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Unauthorized(message) => (
                StatusCode::UNAUTHORIZED,
                json!({"success": false, "message": message}),
            ),
            ApiError::NotFound(message) => (
                StatusCode::NOT_FOUND,
                json!({"success": false, "message": message}),
            ),
            ApiError::Conflict(message) => (
                StatusCode::CONFLICT,
                json!({"success": false, "message": message}),
            ),
            ApiError::Validation(sources) => {
                let sources: Vec<Value> = sources
                    .into_iter()
                    .map(|(path, message)| json!({"path": path, "message": message}))
                    .collect();
                (
                    StatusCode::BAD_REQUEST,
                    json!({"success": false, "message": "Validation error", "errorSources": sources}),
                )
            }
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                json!({"success": false, "message": message}),
            ),
            ApiError::UnsupportedMediaType(message) => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                json!({"success": false, "message": message}),
            ),
        };
        (status, Json(body)).into_response()
    }
}

fn envelope(message: &str, data: impl Serialize) -> Json<Value> {
    Json(json!({"success": true, "message": message, "data": data}))
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

fn authorize(store: &Store, headers: &HeaderMap) -> Result<(), ApiError> {
    match bearer(headers) {
        Some(token) if store.access_tokens.contains(token) => Ok(()),
        Some(_) => Err(ApiError::Unauthorized("Access token expired")),
        None => Err(ApiError::Unauthorized("Authentication required")),
    }
}

pub fn app() -> Router {
    app_with_state(Db::default())
}

pub fn app_with_state(db: Db) -> Router {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/refresh", post(refresh))
        .route("/orders", get(list_orders).post(create_order))
        .route(
            "/orders/{id}",
            get(get_order)
                .put(replace_order)
                .patch(update_order)
                .delete(delete_order),
        )
        .route("/uploads", post(upload))
        .route("/files/{name}", get(download_file))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    run_with_state(listener, Db::default()).await
}

pub async fn run_with_state(listener: TcpListener, db: Db) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_state(db)).await
}

fn credentials(input: Credentials) -> Result<(String, String), ApiError> {
    let mut sources = Vec::new();
    let email = input.email.filter(|e| !e.trim().is_empty());
    let password = input.password.filter(|p| !p.is_empty());
    if email.is_none() {
        sources.push(("email", "Email is required"));
    }
    if password.is_none() {
        sources.push(("password", "Password is required"));
    }
    match (email, password) {
        (Some(email), Some(password)) => Ok((email, password)),
        _ => Err(ApiError::Validation(sources)),
    }
}

async fn register(
    State(db): State<Db>,
    Json(input): Json<Credentials>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let (email, password) = credentials(input)?;
    let mut store = db.write().await;
    if store.users.contains_key(&email) {
        return Err(ApiError::Conflict("Email already registered"));
    }
    store.users.insert(email.clone(), password);
    Ok((
        StatusCode::CREATED,
        envelope("Registration successful", json!({"email": email})),
    ))
}

async fn login(
    State(db): State<Db>,
    Json(input): Json<Credentials>,
) -> Result<Json<Value>, ApiError> {
    let (email, password) = credentials(input)?;
    let mut store = db.write().await;
    if store.users.get(&email) != Some(&password) {
        debug!(%email, "login rejected");
        return Err(ApiError::Unauthorized("Invalid email or password"));
    }
    let tokens = store.issue_tokens();
    Ok(envelope("Login successful", tokens))
}

async fn logout(State(db): State<Db>, headers: HeaderMap) -> Result<Json<Value>, ApiError> {
    let mut store = db.write().await;
    authorize(&store, &headers)?;
    if let Some(token) = bearer(&headers) {
        store.access_tokens.remove(token);
    }
    Ok(envelope("Logged out", Value::Null))
}

async fn refresh(
    State(db): State<Db>,
    Json(input): Json<RefreshRequest>,
) -> Result<Json<Value>, ApiError> {
    let mut store = db.write().await;
    store.refresh_calls += 1;
    let token = input
        .refresh_token
        .ok_or(ApiError::Validation(vec![("refreshToken", "Refresh token is required")]))?;
    if !store.refresh_tokens.remove(&token) {
        debug!(calls = store.refresh_calls, "rejected unknown refresh token");
        return Err(ApiError::Unauthorized("Invalid refresh token"));
    }
    let tokens = store.issue_tokens();
    debug!(calls = store.refresh_calls, "refresh token rotated");
    Ok(envelope("Token refreshed", tokens))
}

async fn list_orders(State(db): State<Db>, headers: HeaderMap) -> Result<Json<Vec<Order>>, ApiError> {
    let store = db.read().await;
    authorize(&store, &headers)?;
    let mut orders: Vec<Order> = store.orders.values().cloned().collect();
    orders.sort_by(|a, b| a.item.cmp(&b.item));
    Ok(Json(orders))
}

fn validate_order(input: &OrderInput) -> Vec<(&'static str, &'static str)> {
    let mut sources = Vec::new();
    if input.item.as_deref().map_or(true, |i| i.trim().is_empty()) {
        sources.push(("item", "Item is required"));
    }
    match input.quantity {
        None => sources.push(("quantity", "Quantity is required")),
        Some(0) => sources.push(("quantity", "Quantity must be positive")),
        Some(_) => {}
    }
    sources
}

async fn create_order(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<OrderInput>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let mut store = db.write().await;
    authorize(&store, &headers)?;
    let sources = validate_order(&input);
    if !sources.is_empty() {
        return Err(ApiError::Validation(sources));
    }
    let order = Order {
        id: Uuid::new_v4(),
        item: input.item.unwrap_or_default(),
        quantity: input.quantity.unwrap_or_default(),
        status: input.status.unwrap_or_else(|| "pending".to_string()),
    };
    store.orders.insert(order.id, order.clone());
    Ok((StatusCode::CREATED, envelope("Order created", order)))
}

async fn get_order(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let store = db.read().await;
    authorize(&store, &headers)?;
    let order = store.orders.get(&id).ok_or(ApiError::NotFound("Order not found"))?;
    Ok(envelope("Order retrieved", order))
}

async fn replace_order(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(input): Json<OrderInput>,
) -> Result<Json<Value>, ApiError> {
    let mut store = db.write().await;
    authorize(&store, &headers)?;
    let sources = validate_order(&input);
    if !sources.is_empty() {
        return Err(ApiError::Validation(sources));
    }
    let order = store.orders.get_mut(&id).ok_or(ApiError::NotFound("Order not found"))?;
    order.item = input.item.unwrap_or_default();
    order.quantity = input.quantity.unwrap_or_default();
    order.status = input.status.unwrap_or_else(|| "pending".to_string());
    Ok(envelope("Order replaced", order.clone()))
}

async fn update_order(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(input): Json<OrderInput>,
) -> Result<Json<Value>, ApiError> {
    let mut store = db.write().await;
    authorize(&store, &headers)?;
    if input.quantity == Some(0) {
        return Err(ApiError::Validation(vec![("quantity", "Quantity must be positive")]));
    }
    let order = store.orders.get_mut(&id).ok_or(ApiError::NotFound("Order not found"))?;
    if let Some(item) = input.item {
        order.item = item;
    }
    if let Some(quantity) = input.quantity {
        order.quantity = quantity;
    }
    if let Some(status) = input.status {
        order.status = status;
    }
    Ok(envelope("Order updated", order.clone()))
}

async fn delete_order(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let mut store = db.write().await;
    authorize(&store, &headers)?;
    store
        .orders
        .remove(&id)
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or(ApiError::NotFound("Order not found"))
}

async fn upload(
    State(db): State<Db>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    authorize(&*db.read().await, &headers)?;

    let mut file = None;
    let mut fields = HashMap::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let content_type = field.content_type().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.to_string()))?;
                file = Some((name, file_name, content_type, bytes.len()));
            }
            None => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.to_string()))?;
                fields.insert(name, value);
            }
        }
    }

    let (field_name, file_name, content_type, size) =
        file.ok_or(ApiError::Validation(vec![("file", "A file is required")]))?;
    if !content_type.starts_with("image/") {
        return Err(ApiError::UnsupportedMediaType(format!(
            "Unsupported content type: {content_type}"
        )));
    }

    let stored = StoredUpload {
        field_name,
        file_name,
        content_type,
        size,
        fields,
    };
    db.write().await.uploads.push(stored.clone());
    Ok((StatusCode::CREATED, envelope("File uploaded", stored)))
}

async fn download_file(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    let store = db.read().await;
    authorize(&store, &headers)?;
    let bytes = store
        .files
        .get(&name)
        .cloned()
        .ok_or(ApiError::NotFound("File not found"))?;
    Ok(([(header::CONTENT_TYPE, "application/octet-stream")], bytes).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_serializes_to_json() {
        let order = Order {
            id: Uuid::nil(),
            item: "Tea".to_string(),
            quantity: 2,
            status: "pending".to_string(),
        };
        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(json["id"], "00000000-0000-0000-0000-000000000000");
        assert_eq!(json["item"], "Tea");
        assert_eq!(json["quantity"], 2);
    }

    #[test]
    fn token_pair_uses_camel_case() {
        let pair = TokenPair {
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
        };
        let json = serde_json::to_value(&pair).unwrap();
        assert_eq!(json, json!({"accessToken": "a", "refreshToken": "r"}));
    }

    #[test]
    fn validate_order_reports_every_missing_field() {
        let input = OrderInput {
            item: None,
            quantity: None,
            status: None,
        };
        assert_eq!(
            validate_order(&input),
            vec![("item", "Item is required"), ("quantity", "Quantity is required")]
        );
    }

    #[test]
    fn refresh_rotates_tokens_in_store() {
        let mut store = Store::default();
        let first = store.issue_tokens();
        assert!(store.refresh_tokens.contains(&first.refresh_token));
        store.expire_access_tokens();
        assert!(!store.access_tokens.contains(&first.access_token));
        assert!(store.refresh_tokens.contains(&first.refresh_token));
    }

    #[test]
    fn bearer_strips_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer abc".parse().unwrap());
        assert_eq!(bearer(&headers), Some("abc"));
        headers.insert(header::AUTHORIZATION, "Basic abc".parse().unwrap());
        assert_eq!(bearer(&headers), None);
    }
}
