//! Axum-based gateway: hosts the viewer WebSocket and static frontend, and
//! wires the live-feed ingress into the character core.

use aiko_core::{
    CharacterStore, CompletionProvider, CoreConfig, EventRouter, GroqClient, MockClient,
    ObserverRegistry, Responder, WebcastSource, EVENT_QUEUE_DEPTH,
};
use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    response::IntoResponse,
    routing::get,
    Router,
};
use std::path::Path as StdPath;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::services::{ServeDir, ServeFile};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// Pre-flight check: config loads, the port is bindable, and credentials are present.
fn run_verify() -> Result<(), String> {
    let config = CoreConfig::load().map_err(|e| format!("Config load failed: {}", e))?;

    print!("Checking port {}... ", config.port);
    let addr = std::net::SocketAddr::from(([127, 0, 0, 1], config.port));
    match std::net::TcpListener::bind(addr) {
        Ok(listener) => {
            drop(listener);
            println!("OK (available)");
        }
        Err(e) => {
            return Err(format!("Port {} BLOCKED: {}", config.port, e));
        }
    }

    print!("Checking GROQ_API_KEY... ");
    match std::env::var("GROQ_API_KEY") {
        Ok(key) if !key.is_empty() => println!("OK (set)"),
        _ => println!("MISSING (chat replies will fall back)"),
    }

    print!("Checking stream_username... ");
    if config.stream_username.is_empty() {
        println!("MISSING (live ingestion disabled)");
    } else {
        println!("OK ({})", config.stream_username);
    }

    println!("\nAll systems GO. Ready to start gateway.");
    Ok(())
}

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env::var calls)
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[aiko-gateway] .env not loaded: {} (using system environment)", e);
    }

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--verify") {
        match run_verify() {
            Ok(()) => std::process::exit(0),
            Err(e) => {
                eprintln!("PRE-FLIGHT FAILED: {}", e);
                std::process::exit(1);
            }
        }
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(CoreConfig::load().expect("load CoreConfig"));

    let store = Arc::new(CharacterStore::new(config.character_name.clone()));
    let observers = Arc::new(ObserverRegistry::new());

    let provider: Arc<dyn CompletionProvider> = if config.llm_mode == "mock" {
        Arc::new(MockClient::default())
    } else {
        match GroqClient::from_env() {
            Ok(client) => Arc::new(client),
            Err(e) => {
                tracing::error!("{e}; chat replies will use the fallback message");
                Arc::new(GroqClient::new(""))
            }
        }
    };
    let responder = Arc::new(Responder::new(provider));

    let router = Arc::new(EventRouter::new(
        Arc::clone(&store),
        responder,
        Arc::clone(&observers),
    ));
    let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
    tokio::spawn(router.run(event_rx));

    if config.stream_username.is_empty() {
        tracing::error!("stream_username not configured; live ingestion disabled");
    } else {
        let source = WebcastSource::new(&config.webcast_url, &config.stream_username);
        tokio::spawn(async move {
            if let Err(e) = source.run(event_tx).await {
                tracing::error!(target: "aiko::ingress", "live stream connection failed: {e}");
            }
        });
    }

    let app = build_app(AppState {
        config: Arc::clone(&config),
        store,
        observers,
    });

    let addr = std::net::SocketAddr::from(([127, 0, 0, 1], config.port));
    tracing::info!("{} listening on {}", config.app_name, addr);
    axum::serve(tokio::net::TcpListener::bind(addr).await.unwrap(), app)
        .await
        .unwrap();
}

fn build_app(state: AppState) -> Router {
    let frontend_enabled = state.config.frontend_enabled;

    let mut app = Router::new()
        .route("/api/v1/health", get(health))
        .route("/v1/status", get(status))
        .route("/ws", get(observer_upgrade))
        .with_state(state);

    if frontend_enabled {
        let frontend_dir = StdPath::new("frontend");
        // Map `/` -> `frontend/index.html`, everything else under `/` to the dir
        app = app.route_service("/", ServeFile::new(frontend_dir.join("index.html")));
        app = app.fallback_service(ServeDir::new(frontend_dir));
    }

    app
}

#[derive(Clone)]
struct AppState {
    config: Arc<CoreConfig>,
    store: Arc<CharacterStore>,
    observers: Arc<ObserverRegistry>,
}

/// GET /api/v1/health – liveness check for the viewer page and scripts.
async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}

/// GET /v1/status – app identity and current connection count.
async fn status(State(state): State<AppState>) -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "app_name": state.config.app_name,
        "character_name": state.config.character_name,
        "port": state.config.port,
        "llm_mode": state.config.llm_mode,
        "stream_username": state.config.stream_username,
        "observers": state.observers.len(),
    }))
}

/// GET /ws – upgrades an observer connection and joins it to the registry.
async fn observer_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| observer_socket(socket, state))
}

/// Per-observer pump: join (init-first), forward queued envelopes to the
/// socket, answer pings, and leave on any exit path.
async fn observer_socket(mut socket: WebSocket, state: AppState) {
    let id = Uuid::new_v4();
    let (tx, mut rx) = mpsc::unbounded_channel();
    state.observers.join(id, tx, state.store.snapshot());

    loop {
        tokio::select! {
            queued = rx.recv() => {
                let Some(envelope) = queued else { break };
                let payload = match serde_json::to_string(&envelope) {
                    Ok(p) => p,
                    Err(e) => {
                        tracing::warn!(target: "aiko::observers", "envelope serialization failed: {e}");
                        continue;
                    }
                };
                if socket.send(Message::Text(payload)).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Ping(payload))) => {
                        if socket.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }

    state.observers.leave(id);
}
