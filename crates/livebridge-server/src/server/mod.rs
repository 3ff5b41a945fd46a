pub mod shutdown;

use std::sync::Arc;

use axum::Router;
use axum::extract::{State, WebSocketUpgrade};
use axum::response::{Html, Response};
use axum::routing::get;
use livebridge_core::{
    BridgeConfig, ChangeDetector, Dispatcher, FileChanged, HttpUpstream, WebhookAlerter,
};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::errors::ServerError;
use crate::session;

pub const STATUS_PAGE: &str = "<html><body><h1>Serving</h1></body></html>";

#[derive(Clone)]
struct AppState {
    dispatcher: Arc<Dispatcher>,
    shutdown: CancellationToken,
}

/// Run the bridge until SIGTERM/SIGINT.
///
/// Startup order:
/// 1. Validate the watched file and archive directory
/// 2. Bind the HTTP/websocket listener
/// 3. Start the watch loop and the dispatch loop
/// 4. Serve `/` and `/ws` until shutdown
pub async fn run_server(config: BridgeConfig) -> Result<(), ServerError> {
    let shutdown = CancellationToken::new();

    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = shutdown::wait_for_shutdown_signal(signal_shutdown).await {
            error!(
                event = "server.signal_handler_failed",
                error = %e,
                "SIGTERM/SIGINT will not trigger graceful shutdown",
            );
        }
    });

    run_until(config, shutdown).await
}

/// Bind the configured address and serve until `shutdown` is cancelled.
pub async fn run_until(config: BridgeConfig, shutdown: CancellationToken) -> Result<(), ServerError> {
    let (changes_tx, changes_rx) = mpsc::unbounded_channel();
    let detector = ChangeDetector::new(&config.watch, changes_tx)?;

    let addr = config.server.bind;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;

    serve_with(config, detector, changes_rx, listener, shutdown).await
}

/// Serve on an already-bound listener. Used by tests to bind port 0.
pub async fn serve(
    config: BridgeConfig,
    listener: TcpListener,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    let (changes_tx, changes_rx) = mpsc::unbounded_channel();
    let detector = ChangeDetector::new(&config.watch, changes_tx)?;
    serve_with(config, detector, changes_rx, listener, shutdown).await
}

async fn serve_with(
    config: BridgeConfig,
    mut detector: ChangeDetector,
    changes: mpsc::UnboundedReceiver<FileChanged>,
    listener: TcpListener,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    let upstream = Arc::new(HttpUpstream::from_config(&config.upstream)?);
    let alerter = Arc::new(WebhookAlerter::from_config(&config.alert)?);
    if !alerter.is_enabled() {
        info!(event = "server.alert_webhook_disabled");
    }
    let dispatcher = Arc::new(Dispatcher::from_config(&config, upstream, alerter));

    detector.watch()?;
    let watch_task = tokio::spawn(detector.run(shutdown.clone()));
    let dispatch_task = tokio::spawn(dispatch_loop(
        dispatcher.clone(),
        changes,
        shutdown.clone(),
    ));

    let app = router(AppState {
        dispatcher,
        shutdown: shutdown.clone(),
    });

    info!(
        event = "server.started",
        pid = std::process::id(),
        addr = %listener.local_addr()?,
        watched = %config.watch.path.display(),
        upstream = %config.upstream.base_url,
    );

    let graceful = shutdown.clone();
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move { graceful.cancelled().await })
        .await;

    info!(event = "server.shutdown_started");
    shutdown.cancel();
    for task in [watch_task, dispatch_task] {
        if let Err(e) = task.await {
            error!(event = "server.task_join_failed", error = %e);
        }
    }

    served?;
    info!(event = "server.shutdown_completed");
    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(status_page))
        .route("/ws", get(ws_upgrade))
        .with_state(state)
}

async fn status_page() -> Html<&'static str> {
    Html(STATUS_PAGE)
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| session::run_session(socket, state.dispatcher, state.shutdown))
}

/// Spawn one refresh per change signal so slow upstream calls never delay
/// the next one.
async fn dispatch_loop(
    dispatcher: Arc<Dispatcher>,
    mut changes: mpsc::UnboundedReceiver<FileChanged>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            change = changes.recv() => {
                let Some(change) = change else { break };
                let dispatcher = dispatcher.clone();
                tokio::spawn(async move {
                    dispatcher.on_file_changed(change).await;
                });
            }
            _ = shutdown.cancelled() => break,
        }
    }
    info!(event = "server.dispatch.loop_stopped");
}
