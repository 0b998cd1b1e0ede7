//! `HttpProber` against real sockets.

use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use pm_domain::{Node, NodeStatus, Protocol};
use pm_watchdog::{HttpProber, ProbeFailure, ProbeResult, Prober};

fn node_at(port: u16) -> Node {
    Node {
        id: format!("local-{port}"),
        ip: "127.0.0.1".into(),
        port,
        protocol: Protocol::Http,
        status: NodeStatus::Dead,
        latency: 0,
        last_checked: None,
        country: None,
    }
}

async fn serve(app: Router) -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    port
}

#[tokio::test]
async fn responding_node_is_active() {
    let port = serve(Router::new().route("/", get(|| async { "ok" }))).await;
    let prober = HttpProber::new().unwrap();

    let result = prober.probe(&node_at(port), Duration::from_secs(2)).await;
    assert!(result.is_active(), "got {result:?}");
}

#[tokio::test]
async fn error_status_still_counts_as_alive() {
    let port = serve(Router::new().route(
        "/",
        get(|| async { (StatusCode::BAD_REQUEST, "proxy expects CONNECT") }),
    ))
    .await;
    let prober = HttpProber::new().unwrap();

    let result = prober.probe(&node_at(port), Duration::from_secs(2)).await;
    assert!(result.is_active(), "got {result:?}");
}

#[tokio::test]
async fn slow_node_times_out() {
    let port = serve(Router::new().route(
        "/",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            "late"
        }),
    ))
    .await;
    let prober = HttpProber::new().unwrap();

    let result = prober.probe(&node_at(port), Duration::from_millis(100)).await;
    assert_eq!(
        result,
        ProbeResult::Dead {
            reason: ProbeFailure::Timeout
        }
    );
}

#[tokio::test]
async fn closed_port_is_dead() {
    // Bind then drop to get a port nothing listens on.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let prober = HttpProber::new().unwrap();

    let result = prober.probe(&node_at(port), Duration::from_secs(2)).await;
    assert!(matches!(result, ProbeResult::Dead { .. }), "got {result:?}");
}
