use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use digicompras_api as api;

/// JSON-line intent adapter: the delivery layer (or a developer) writes one
/// [`api::handlers::Intent`] per stdin line and reads replies and outbound
/// notifications as JSON on stdout.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = api::config::load_config()?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);

    // Events
    let (event_tx, event_rx) = mpsc::channel(cfg.event_channel_capacity);
    let event_sender = api::events::EventSender::new(event_tx);
    tokio::spawn(api::events::process_events(event_rx));

    // Gateway: real PIX client when a token is configured, in-memory otherwise
    let gateway: Arc<dyn api::gateway::PaymentGateway> = if cfg.gateway.access_token.is_empty() {
        warn!("no gateway access token configured; using the in-memory gateway");
        Arc::new(api::gateway::InMemoryGateway::new())
    } else {
        Arc::new(api::gateway::PixGateway::new(&cfg.gateway)?)
    };

    // Outbound notifications drain to stdout for the delivery layer to pick up
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<api::notifications::OutboundMessage>(64);
    let notifier: Arc<dyn api::notifications::Notifier> = if cfg.admin_chat_id == 0 {
        info!("admin chat id not configured; admin notifications disabled");
        Arc::new(api::notifications::NullNotifier)
    } else {
        Arc::new(api::notifications::ChannelNotifier::new(outbound_tx))
    };
    tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            match serde_json::to_string(&message) {
                Ok(json) => println!("{{\"outbound\": {json}}}"),
                Err(e) => error!(error = %e, "failed to encode outbound message"),
            }
        }
    });

    let state = api::AppState::initialize(cfg, gateway, notifier, event_sender)?;
    info!("digicompras-api ready, reading intents from stdin");

    let dispatcher = state.dispatcher.clone();
    let stdin_loop = async {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let line = line.trim().to_string();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<api::handlers::Intent>(&line) {
                Ok(intent) => {
                    let reply = dispatcher.handle(intent).await;
                    match serde_json::to_string(&reply) {
                        Ok(json) => println!("{json}"),
                        Err(e) => error!(error = %e, "failed to encode reply"),
                    }
                }
                Err(e) => {
                    warn!(error = %e, "unparseable intent line");
                    println!("{{\"error\": \"unparseable intent\"}}");
                }
            }
        }
    };

    tokio::select! {
        _ = stdin_loop => info!("stdin closed, shutting down"),
        _ = shutdown_signal() => info!("shutdown signal received"),
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => error!(error = %e, "failed to install signal handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
