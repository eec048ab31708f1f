//! Push channel tests over a real socket
//!
//! The router is served on an ephemeral loopback port and browsers are played
//! by a WebSocket client.

use futures::StreamExt;
use reloadwatch_server::{build_router, AppState, Broadcaster, ClientRegistry};
use reloadwatch_watcher::ReloadTick;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::{connect_async, tungstenite::Message};

type TestResult = Result<(), Box<dyn std::error::Error>>;

async fn serve(root: &TempDir, registry: Arc<ClientRegistry>) -> std::io::Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = build_router(AppState {
        registry,
        root_dir: root.path().to_path_buf(),
    });
    tokio::spawn(async move { axum::serve(listener, app).await });
    Ok(addr)
}

/// Registration happens after the upgrade completes, so poll for it
async fn wait_for_clients(registry: &ClientRegistry, expected: usize) -> bool {
    timeout(Duration::from_secs(2), async {
        while registry.len().await != expected {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .is_ok()
}

#[tokio::test]
async fn test_client_receives_delay_then_close() -> TestResult {
    let root = TempDir::new()?;
    let registry = Arc::new(ClientRegistry::new());
    let addr = serve(&root, Arc::clone(&registry)).await?;

    let (mut ws, _) = connect_async(format!("ws://{addr}/ws")).await?;
    assert!(wait_for_clients(&registry, 1).await);

    let broadcaster = Broadcaster::new(Arc::clone(&registry), 2.5);
    broadcaster
        .notify(&ReloadTick {
            paths: vec![PathBuf::from("index.html")],
        })
        .await;

    let first = timeout(Duration::from_secs(2), ws.next())
        .await?
        .ok_or("socket ended before the reload message")??;
    match first {
        Message::Text(text) => assert_eq!(text.as_str(), "2500"),
        other => panic!("expected the reload delay, got {other:?}"),
    }

    let second = timeout(Duration::from_secs(2), ws.next()).await?;
    assert!(matches!(second, Some(Ok(Message::Close(_))) | None));
    assert!(registry.is_empty().await);
    Ok(())
}

#[tokio::test]
async fn test_disconnected_client_is_unregistered() -> TestResult {
    let root = TempDir::new()?;
    let registry = Arc::new(ClientRegistry::new());
    let addr = serve(&root, Arc::clone(&registry)).await?;

    let (mut ws, _) = connect_async(format!("ws://{addr}/ws")).await?;
    assert!(wait_for_clients(&registry, 1).await);

    ws.close(None).await?;
    drop(ws);

    assert!(wait_for_clients(&registry, 0).await);
    Ok(())
}

#[tokio::test]
async fn test_each_connection_gets_one_message() -> TestResult {
    let root = TempDir::new()?;
    let registry = Arc::new(ClientRegistry::new());
    let addr = serve(&root, Arc::clone(&registry)).await?;

    let (mut a, _) = connect_async(format!("ws://{addr}/ws")).await?;
    let (mut b, _) = connect_async(format!("ws://{addr}/ws")).await?;
    assert!(wait_for_clients(&registry, 2).await);

    let report = registry.broadcast("0").await;
    assert_eq!(report.notified, 2);

    for ws in [&mut a, &mut b] {
        let message = timeout(Duration::from_secs(2), ws.next())
            .await?
            .ok_or("socket ended before the reload message")??;
        assert_eq!(message, Message::Text("0".into()));
    }
    Ok(())
}
