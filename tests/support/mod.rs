//! Shared helpers for integration tests

#![allow(dead_code)]

use std::env;
use std::path::PathBuf;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// The fixed catalog the stub service returns for `/products`
pub const CATALOG_JSON: &str = r#"[
    {"id":1,"name":"Laptop","description":"High-performance laptop","price":1299.99,"category":"Electronics"},
    {"id":2,"name":"Coffee Mug","description":"Keep your coffee hot","price":15.99,"category":"Office"},
    {"id":3,"name":"Keyboard","description":"Mechanical keyboard","price":89.99,"category":"Electronics"}
]"#;

/// Helper to get the path to the drydock binary
pub fn drydock_bin() -> PathBuf {
    // In tests, the binary should be at target/debug/drydock
    let mut path = env::current_exe()
        .expect("Failed to get current executable path")
        .parent()
        .expect("No parent")
        .to_path_buf();

    // If we're in deps/, go up one more level
    if path.ends_with("deps") {
        path = path.parent().expect("No parent").to_path_buf();
    }

    path.join("drydock")
}

/// Serves canned responses for `/app/` and `/products` on an ephemeral
/// port, standing in for the deployed service. Runs until the runtime
/// shuts down.
pub async fn spawn_stub_service() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                let n = socket.read(&mut buf).await.unwrap_or(0);
                let request = String::from_utf8_lossy(&buf[..n]);

                let (status, body) = if request.starts_with("GET /products") {
                    ("200 OK", CATALOG_JSON.to_string())
                } else if request.starts_with("GET /app/") {
                    ("200 OK", "<html>estore</html>".to_string())
                } else {
                    ("404 Not Found", String::new())
                };

                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
            });
        }
    });

    port
}
