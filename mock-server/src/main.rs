use std::sync::Arc;

use tokio::{net::TcpListener, sync::RwLock};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("127.0.0.1:{port}");

    let mut store = mock_server::Store::default();
    store.add_user("demo@example.com", "password");
    store.add_file("sample.bin", (0..=255u8).cycle().take(64 * 1024).collect());
    let db = Arc::new(RwLock::new(store));

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "mock API listening");
    mock_server::run_with_state(listener, db).await
}
