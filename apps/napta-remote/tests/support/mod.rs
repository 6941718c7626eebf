#![allow(dead_code)]

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{FromRequest, Multipart, Path, Request, State};
use axum::http::{header::CONTENT_TYPE, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

pub const WAIT: Duration = Duration::from_secs(3);

/// Pushed through [`Backend::push`] to make the display hang up.
pub const HANG_UP: &str = "__hang_up__";

/// id, playable, requires_image
pub const SCRIPTS: [(&str, bool, bool); 4] = [
    ("s1", false, false),
    ("s2", true, false),
    ("s3", true, false),
    ("photo", false, true),
];

#[derive(Default)]
pub struct BackendState {
    pub current: String,
    pub rest_requests: usize,
    pub frames: Vec<String>,
    pub open_channels: usize,
    pub taken_slots: Vec<u32>,
    pub last_image: Option<Vec<u8>>,
}

pub type Shared = Arc<Mutex<BackendState>>;

#[derive(Clone)]
struct AppState {
    shared: Shared,
    push: broadcast::Sender<String>,
}

/// Stand-in for the display: the script REST API plus the control channel.
pub struct Backend {
    pub base_url: String,
    pub channel_url: String,
    pub state: Shared,
    push: broadcast::Sender<String>,
}

impl Backend {
    pub async fn spawn(current: &str) -> Self {
        let state: Shared = Arc::new(Mutex::new(BackendState {
            current: current.to_string(),
            ..Default::default()
        }));
        let (push, _) = broadcast::channel(16);
        let app = Router::new()
            .route("/scripts", get(list))
            .route("/scripts/change", post(change))
            .route("/scripts/:script_id/playable", get(playable))
            .route("/ws", get(channel))
            .with_state(AppState {
                shared: state.clone(),
                push: push.clone(),
            });
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });
        Self {
            base_url: format!("http://{addr}"),
            channel_url: format!("ws://{addr}/ws"),
            state,
            push,
        }
    }

    /// Sends a frame to every open channel.
    pub fn push(&self, frame: impl Into<String>) {
        let _ = self.push.send(frame.into());
    }

    pub fn set_current(&self, script_id: &str) {
        self.state.lock().unwrap().current = script_id.to_string();
    }

    pub fn rest_requests(&self) -> usize {
        self.state.lock().unwrap().rest_requests
    }

    pub fn open_channels(&self) -> usize {
        self.state.lock().unwrap().open_channels
    }

    pub fn frames(&self) -> Vec<Value> {
        self.state
            .lock()
            .unwrap()
            .frames
            .iter()
            .map(|frame| serde_json::from_str(frame).expect("json frame"))
            .collect()
    }
}

/// Awaits `future`, failing the test if it does not finish within [`WAIT`].
pub async fn within<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(WAIT, future)
        .await
        .expect("operation timed out")
}

/// Polls `check` until it holds or [`WAIT`] elapses.
pub async fn eventually(mut check: impl FnMut() -> bool) {
    tokio::time::timeout(WAIT, async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not met in time");
}

fn script_json(id: &str) -> Value {
    match SCRIPTS.iter().find(|(script_id, _, _)| *script_id == id) {
        Some((script_id, is_playable, requires_image)) => json!({
            "script_id": script_id,
            "script_name": format!("Script {script_id}"),
            "is_playable": is_playable,
            "requires_image": requires_image,
        }),
        None => Value::Null,
    }
}

async fn list(State(app): State<AppState>) -> Json<Value> {
    let mut state = app.shared.lock().unwrap();
    state.rest_requests += 1;
    let scripts: Vec<_> = SCRIPTS.iter().map(|(id, _, _)| script_json(id)).collect();
    Json(json!({ "scripts": scripts, "current_script": script_json(&state.current) }))
}

async fn change(State(app): State<AppState>, request: Request) -> Response {
    let is_multipart = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/form-data"));

    let (script_id, image) = if is_multipart {
        let mut multipart = match Multipart::from_request(request, &()).await {
            Ok(multipart) => multipart,
            Err(err) => return err.into_response(),
        };
        let mut script_id = String::new();
        let mut image = None;
        while let Ok(Some(field)) = multipart.next_field().await {
            let name = field.name().map(str::to_owned);
            match name.as_deref() {
                Some("script_id") => script_id = field.text().await.unwrap_or_default(),
                Some("image") => image = field.bytes().await.ok().map(|bytes| bytes.to_vec()),
                _ => {}
            }
        }
        (script_id, image)
    } else {
        match Json::<Value>::from_request(request, &()).await {
            Ok(Json(body)) => {
                let script_id = body
                    .get("script_id")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                (script_id, None)
            }
            Err(err) => return err.into_response(),
        }
    };

    let mut state = app.shared.lock().unwrap();
    state.rest_requests += 1;
    if !SCRIPTS.iter().any(|(id, _, _)| *id == script_id) {
        let detail = Json(json!({"detail": "unknown script"}));
        return (StatusCode::BAD_REQUEST, detail).into_response();
    }
    state.current = script_id;
    state.last_image = image;
    Json(json!("OK")).into_response()
}

async fn playable(State(app): State<AppState>, Path(script_id): Path<String>) -> Response {
    app.shared.lock().unwrap().rest_requests += 1;
    match script_id.as_str() {
        "s2" => Json(json!({
            "keys": ["UP", "DOWN", "LEFT", "RIGHT"],
            "min_player_number": 1,
            "max_player_number": 2
        }))
        .into_response(),
        "s3" => Json(json!({
            "keys": ["UP"],
            "min_player_number": 1,
            "max_player_number": 0
        }))
        .into_response(),
        _ => (
            StatusCode::NOT_FOUND,
            Json(json!({"detail": format!("{script_id} is not playable")})),
        )
            .into_response(),
    }
}

async fn channel(ws: WebSocketUpgrade, State(app): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| serve_channel(socket, app))
}

async fn serve_channel(socket: WebSocket, app: AppState) {
    let mut pushes = app.push.subscribe();
    app.shared.lock().unwrap().open_channels += 1;
    let (mut sink, mut stream) = socket.split();

    let waiting = json!({"type": "status", "data": "WAITING"}).to_string();
    if sink.send(Message::Text(waiting)).await.is_ok() {
        loop {
            tokio::select! {
                incoming = stream.next() => {
                    let Some(Ok(Message::Text(text))) = incoming else { break };
                    let reply = {
                        let mut state = app.shared.lock().unwrap();
                        state.frames.push(text.clone());
                        reply_for(&state, &text)
                    };
                    if let Some(reply) = reply {
                        if sink.send(Message::Text(reply)).await.is_err() {
                            break;
                        }
                    }
                }
                pushed = pushes.recv() => {
                    match pushed {
                        Ok(frame) if frame == HANG_UP => {
                            let _ = sink.send(Message::Close(None)).await;
                            break;
                        }
                        Ok(frame) => {
                            if sink.send(Message::Text(frame)).await.is_err() {
                                break;
                            }
                        }
                        Err(_) => break,
                    }
                }
            }
        }
    }

    app.shared.lock().unwrap().open_channels -= 1;
}

fn reply_for(state: &BackendState, text: &str) -> Option<String> {
    let frame: Value = serde_json::from_str(text).ok()?;
    if frame["type"] != "choose_player" {
        return None;
    }
    let slot = frame["data"]["player_number"].as_u64()? as u32;
    let reply = if state.taken_slots.contains(&slot) {
        json!({"type": "error", "data": "slot taken"})
    } else {
        json!({"type": "status", "data": "READY"})
    };
    Some(reply.to_string())
}
