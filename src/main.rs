use std::sync::Arc;

use anyhow::Context;
use tg_gatekeeper::channels::{Outbound, TelegramChannel, webhook_routes};
use tg_gatekeeper::config::{GatekeeperConfig, StoreLocation, UpdateMode};
use tg_gatekeeper::dispatcher::{Dispatcher, EchoHandler};
use tg_gatekeeper::store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = GatekeeperConfig::from_env().context("loading configuration")?;

    eprintln!("🚪 tg-gatekeeper v{}", env!("CARGO_PKG_VERSION"));
    match config.admin.admin_id() {
        Some(admin) => eprintln!("   Admin: {admin}"),
        None => {
            eprintln!("   Admin: none (access requests will not be delivered)");
            tracing::warn!("TG_ADMIN_USER_ID not set, nobody can approve access requests");
        }
    }

    // ── Store ───────────────────────────────────────────────────────────
    match &config.store {
        StoreLocation::Memory => eprintln!("   Store: in-memory"),
        StoreLocation::File(path) => eprintln!("   Store: {}", path.display()),
    }
    let store = store::open(&config.store, config.store_timeout)
        .await
        .context("opening user store")?;

    // ── Telegram ────────────────────────────────────────────────────────
    let telegram = Arc::new(TelegramChannel::new(config.bot_token.clone()));
    telegram
        .health_check()
        .await
        .context("Telegram getMe failed, check BOT_TOKEN")?;

    let outbound: Arc<dyn Outbound> = telegram.clone();
    let dispatcher = Arc::new(Dispatcher::assemble(
        store,
        Arc::clone(&outbound),
        config.admin.clone(),
        config.send_timeout,
        Arc::new(EchoHandler::new(outbound)),
    ));

    match &config.mode {
        UpdateMode::Polling => {
            eprintln!("   Updates: long-polling\n");
            telegram.delete_webhook().await?;
            let events = telegram.start_polling();
            tokio::select! {
                _ = dispatcher.run(events) => {}
                _ = tokio::signal::ctrl_c() => tracing::info!("Shutting down"),
            }
        }
        UpdateMode::Webhook { url, port, secret } => {
            eprintln!("   Updates: webhook {url} (listening on {port})\n");
            let (app, events) = webhook_routes(secret.clone());
            let listener = tokio::net::TcpListener::bind(("0.0.0.0", *port))
                .await
                .with_context(|| format!("binding webhook port {port}"))?;
            telegram.set_webhook(url, secret.as_deref()).await?;
            tracing::info!(port, "Webhook server started");

            tokio::spawn(dispatcher.run(events));
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = tokio::signal::ctrl_c().await;
                    tracing::info!("Shutting down");
                })
                .await
                .context("webhook server failed")?;
        }
    }

    Ok(())
}
