mod auth;
mod autoleave;
mod cli;
mod config;
mod handlers;
mod keys;
mod notifications;
mod reconcile;
mod store;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_util::task::TaskTracker;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::{
    auth::TokenValidator,
    autoleave::{AutoLeaveScheduler, GraphCallControl, WebhookNotifier},
    cli::Cli,
    config::Config,
    handlers::{build_router, AppState},
    keys::fetch_signing_keys,
    store::MeetingStore,
};

#[tokio::main]
async fn main() {
    // Default to WARN level if RUST_LOG is not set
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "warn");
    }
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(port) = cli.port {
        config.port = port;
    }
    info!("Starting call-relay on port {}", config.port);

    let http = reqwest::Client::new();

    // Signing keys are fetched once; validation never re-fetches on a miss.
    let keys = match fetch_signing_keys(&http, &config.openid_config_url).await {
        Ok(keys) => Arc::new(keys),
        Err(e) => {
            error!("Failed to fetch signing keys: {}", e);
            std::process::exit(1);
        }
    };

    let store = MeetingStore::new();
    let validator = TokenValidator::new(keys, config.app_id.clone());
    let call_control = Arc::new(GraphCallControl::new(
        http.clone(),
        config.graph_base_url.clone(),
        config.graph_token.clone(),
    ));
    let scheduler = AutoLeaveScheduler::new(
        store.clone(),
        call_control,
        Duration::from_secs(config.auto_leave_delay_seconds),
    );
    let notifier = Arc::new(WebhookNotifier::new(
        http.clone(),
        config.after_meeting_url.clone(),
    ));

    let state = AppState {
        store,
        validator,
        scheduler,
        notifier,
        app_id: config.app_id.clone(),
        tasks: TaskTracker::new(),
    };

    let app = build_router(state).layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    info!("call-relay listening on {}", addr);

    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
