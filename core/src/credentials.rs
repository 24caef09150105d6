//! Credential storage contract.
//!
//! The client reads tokens from the store right before each attempt and
//! writes them only after a successful refresh. Persistence is the store's
//! business; `MemoryCredentialStore` keeps everything in process and backs
//! the tests.

use async_trait::async_trait;
use tokio::sync::RwLock;

/// Access to the current access and refresh tokens.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn access_token(&self) -> Option<String>;
    async fn refresh_token(&self) -> Option<String>;
    async fn save_access_token(&self, token: String);
    async fn save_refresh_token(&self, token: String);
    /// Remove every stored credential.
    async fn clear_all(&self);
}

#[derive(Debug, Default, Clone)]
struct Tokens {
    access: Option<String>,
    refresh: Option<String>,
}

/// In-memory `CredentialStore`.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    tokens: RwLock<Tokens>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(access: Option<String>, refresh: Option<String>) -> Self {
        Self {
            tokens: RwLock::new(Tokens { access, refresh }),
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn access_token(&self) -> Option<String> {
        self.tokens.read().await.access.clone()
    }

    async fn refresh_token(&self) -> Option<String> {
        self.tokens.read().await.refresh.clone()
    }

    async fn save_access_token(&self, token: String) {
        self.tokens.write().await.access = Some(token);
    }

    async fn save_refresh_token(&self, token: String) {
        self.tokens.write().await.refresh = Some(token);
    }

    async fn clear_all(&self) {
        *self.tokens.write().await = Tokens::default();
    }
}
