use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        DefaultBodyLimit, State,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use canvas_core::{
    FileUpdateReport, FullSnapshotReport, MemoryWriteReport, MessageReport, Report, Snapshot,
    StateAggregator, StepReport,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tracing::{debug, info, warn};

use crate::Config;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AckResponse {
    pub ok: bool,
    pub message: String,
}

pub struct HubState {
    canvas: Arc<StateAggregator>,
    conn_counter: AtomicU64,
    poll_interval: Duration,
    write_timeout: Duration,
    max_body_bytes: usize,
}

impl HubState {
    pub fn new(config: Config, canvas: Arc<StateAggregator>) -> Self {
        Self {
            canvas,
            conn_counter: AtomicU64::new(0),
            poll_interval: config.poll_interval,
            write_timeout: config.write_timeout,
            max_body_bytes: config.max_body_bytes,
        }
    }

    fn next_conn_id(&self) -> String {
        let id = self.conn_counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("conn-{id}")
    }

    fn ingest(&self, report: Report) -> (StatusCode, Json<AckResponse>) {
        match self.canvas.ingest(&report) {
            Ok(message) => {
                info!(
                    event = "report_accepted",
                    kind = report.kind(),
                    revision = self.canvas.revision()
                );
                (StatusCode::OK, Json(AckResponse { ok: true, message }))
            }
            Err(err) => {
                warn!(event = "report_rejected", kind = report.kind(), error = %err);
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(AckResponse {
                        ok: false,
                        message: err.to_string(),
                    }),
                )
            }
        }
    }

    /// Pushes the snapshot to one websocket subscriber: once on connect, then
    /// on every poll tick where the revision moved.
    async fn stream_snapshots(self: Arc<Self>, socket: WebSocket) {
        let conn_id = self.next_conn_id();
        let (mut ws_sender, mut ws_receiver) = socket.split();
        let mut ticker = tokio::time::interval(self.poll_interval);
        let mut last_sent: Option<u64> = None;
        info!(event = "snapshot_subscriber_connected", conn_id = %conn_id);

        let reason = loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if last_sent == Some(self.canvas.revision()) {
                        continue;
                    }
                    let snapshot = self.canvas.snapshot();
                    let text = match snapshot.to_json() {
                        Ok(value) => value,
                        Err(err) => {
                            warn!(event = "snapshot_encode_error", conn_id = %conn_id, error = %err);
                            continue;
                        }
                    };
                    let send = ws_sender.send(Message::Text(text));
                    match tokio::time::timeout(self.write_timeout, send).await {
                        Ok(Ok(())) => {
                            debug!(event = "snapshot_pushed", conn_id = %conn_id, revision = snapshot.revision);
                            last_sent = Some(snapshot.revision);
                        }
                        Ok(Err(err)) => {
                            warn!(event = "send_error", conn_id = %conn_id, error = %err);
                            break "send_error";
                        }
                        Err(_) => {
                            warn!(event = "write_timeout", conn_id = %conn_id);
                            break "write_timeout";
                        }
                    }
                }
                incoming = ws_receiver.next() => {
                    match incoming {
                        Some(Ok(Message::Close(_))) | None => break "disconnect",
                        Some(Ok(_)) => {}
                        Some(Err(err)) => {
                            warn!(event = "read_error", conn_id = %conn_id, error = %err);
                            break "read_error";
                        }
                    }
                }
            }
        };

        info!(event = "snapshot_subscriber_disconnected", conn_id = %conn_id, reason = reason);
    }
}

pub fn build_router(hub: Arc<HubState>) -> Router {
    let body_limit = hub.max_body_bytes;
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/state", get(get_state))
        .route("/api/report", post(report))
        .route("/api/canvas_report_step", post(report_step))
        .route("/api/canvas_report_memory_write", post(report_memory_write))
        .route("/api/canvas_report_file_update", post(report_file_update))
        .route("/api/canvas_report_message_sent", post(report_message_sent))
        .route("/api/canvas_full_state_snapshot", post(full_state_snapshot))
        .route("/ws", get(ws_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(hub)
}

async fn get_state(State(hub): State<Arc<HubState>>) -> Json<Snapshot> {
    Json(hub.canvas.snapshot())
}

async fn report(
    State(hub): State<Arc<HubState>>,
    Json(body): Json<Report>,
) -> impl IntoResponse {
    hub.ingest(body)
}

async fn report_step(
    State(hub): State<Arc<HubState>>,
    Json(body): Json<StepReport>,
) -> impl IntoResponse {
    hub.ingest(Report::Step(body))
}

async fn report_memory_write(
    State(hub): State<Arc<HubState>>,
    Json(body): Json<MemoryWriteReport>,
) -> impl IntoResponse {
    hub.ingest(Report::MemoryWrite(body))
}

async fn report_file_update(
    State(hub): State<Arc<HubState>>,
    Json(body): Json<FileUpdateReport>,
) -> impl IntoResponse {
    hub.ingest(Report::FileUpdate(body))
}

async fn report_message_sent(
    State(hub): State<Arc<HubState>>,
    Json(body): Json<MessageReport>,
) -> impl IntoResponse {
    hub.ingest(Report::MessageSent(body))
}

async fn full_state_snapshot(
    State(hub): State<Arc<HubState>>,
    Json(body): Json<FullSnapshotReport>,
) -> impl IntoResponse {
    hub.ingest(Report::FullSnapshot(body))
}

async fn ws_handler(ws: WebSocketUpgrade, State(hub): State<Arc<HubState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| hub.stream_snapshots(socket))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_config() -> Config {
        Config {
            addr: "127.0.0.1:0".to_string(),
            allow_remote: false,
            debug: false,
            demo: false,
            poll_interval: Duration::from_millis(100),
            write_timeout: Duration::from_secs(1),
            max_body_bytes: 4 * 1024,
            log_dir: String::new(),
        }
    }

    fn test_app() -> (Router, Arc<StateAggregator>) {
        let canvas = Arc::new(StateAggregator::new());
        let hub = Arc::new(HubState::new(test_config(), canvas.clone()));
        (build_router(hub), canvas)
    }

    async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> (StatusCode, Vec<u8>) {
        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, bytes.to_vec())
    }

    #[tokio::test]
    async fn health_endpoint_answers_ok() {
        let (app, _) = test_app();
        let resp = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn step_report_is_acknowledged() {
        let (app, canvas) = test_app();
        let (status, body) = post_json(
            app,
            "/api/canvas_report_step",
            serde_json::json!({
                "agent_name": "SystemAgent",
                "thought": "Starting up and checking the task",
                "tool_call": "check_task()"
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let ack: AckResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            ack,
            AckResponse {
                ok: true,
                message: "Step from SystemAgent reported to Canvas.".to_string()
            }
        );
        assert_eq!(canvas.snapshot().graph.edges.len(), 1);
    }

    #[tokio::test]
    async fn invalid_tier_is_rejected_with_message() {
        let (app, canvas) = test_app();
        let (status, body) = post_json(
            app,
            "/api/canvas_report_memory_write",
            serde_json::json!({"tier": "bogus", "key": "k", "value": "v"}),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let ack: AckResponse = serde_json::from_slice(&body).unwrap();
        assert!(!ack.ok);
        assert!(ack.message.contains("bogus"));
        assert_eq!(canvas.revision(), 0);
    }

    #[tokio::test]
    async fn message_priority_defaults_when_missing() {
        let (app, canvas) = test_app();
        let (status, _) = post_json(
            app,
            "/api/canvas_report_message_sent",
            serde_json::json!({"from_agent": "A", "to_agent": "all", "message": "hi"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(canvas.snapshot().messages.contains("[NORMAL] A → all"));
    }

    #[tokio::test]
    async fn partial_snapshot_reports_error_but_applies_memory() {
        let (app, canvas) = test_app();
        let (status, body) = post_json(
            app,
            "/api/canvas_full_state_snapshot",
            serde_json::json!({
                "workspace_tree": "{broken",
                "permanent_memory": {"system_config": "macOS"},
                "task_memory": {}
            }),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let ack: AckResponse = serde_json::from_slice(&body).unwrap();
        assert!(ack.message.contains("error parsing workspace tree"));
        assert!(canvas.snapshot().memory.permanent.contains("[system_config]"));
    }

    #[tokio::test]
    async fn tagged_report_endpoint_routes_by_type() {
        let (app, canvas) = test_app();
        let (status, _) = post_json(
            app,
            "/api/report",
            serde_json::json!({
                "type": "file_update",
                "payload": {"path": "/workspace/output/report.md", "content": "# Report"}
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(canvas.snapshot().workspace.contains("report.md"));
    }

    #[tokio::test]
    async fn oversized_bodies_are_refused() {
        let (app, canvas) = test_app();
        let (status, _) = post_json(
            app,
            "/api/canvas_report_file_update",
            serde_json::json!({"path": "big.txt", "content": "x".repeat(8 * 1024)}),
        )
        .await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(canvas.revision(), 0);
    }

    #[tokio::test]
    async fn state_endpoint_returns_snapshot_json() {
        let (app, canvas) = test_app();
        canvas.report_step("Sys", "plan", "delegate('Search')").unwrap();
        canvas
            .report_message_sent("Sys", "Search", "go", "high")
            .unwrap();

        let resp = app
            .oneshot(Request::builder().uri("/api/state").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["graph"]["nodes"].as_array().map(Vec::len), Some(3));
        assert_eq!(json["graph"]["edges"][1]["id"], "e1");
        assert!(json["messages"]
            .as_str()
            .unwrap()
            .lines()
            .next()
            .unwrap()
            .contains("[HIGH] Sys → Search"));
        assert_eq!(json["memory"]["task"], "### Task Memory\n---\n");
        assert_eq!(json["workspace"], "");
    }

    async fn next_snapshot<S>(stream: &mut S) -> Snapshot
    where
        S: futures_util::Stream<
                Item = Result<
                    tokio_tungstenite::tungstenite::Message,
                    tokio_tungstenite::tungstenite::Error,
                >,
            > + Unpin,
    {
        loop {
            let frame = tokio::time::timeout(Duration::from_secs(5), stream.next())
                .await
                .expect("snapshot push timed out")
                .expect("websocket closed")
                .expect("websocket frame");
            if let tokio_tungstenite::tungstenite::Message::Text(text) = frame {
                return serde_json::from_str(&text).expect("snapshot json");
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn websocket_pushes_snapshot_on_connect_and_on_change() {
        let (app, canvas) = test_app();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let (mut stream, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
            .await
            .expect("connect websocket");
        let initial = next_snapshot(&mut stream).await;
        assert_eq!(initial.revision, 0);
        assert!(initial.graph.nodes.is_empty());

        canvas.report_file_update("a.txt", "alpha").unwrap();
        let updated = next_snapshot(&mut stream).await;
        assert_eq!(updated.revision, 1);
        assert!(updated.workspace.contains("alpha"));
    }
}
