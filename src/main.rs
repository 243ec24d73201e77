use std::sync::Arc;

use anyhow::Context;

use wa_relay::config::RelayConfig;
use wa_relay::routing::{CategoryRegistry, IntentRouter, ProcessLauncher};
use wa_relay::scheduler::{Announcement, Scheduler, Trigger};
use wa_relay::webhook::{AppState, webhook_routes};
use wa_relay::whatsapp::{DeliveryGateway, MessageSender};

/// Id of the job built from the `RELAY_ANNOUNCE_*` settings.
const DAILY_ANNOUNCEMENT_JOB: &str = "daily-announcement";

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

    let config = RelayConfig::from_env().context("failed to load configuration")?;

    eprintln!("📨 wa-relay v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Webhook: http://{}/webhook", config.server.bind_addr());
    eprintln!("   Graph API: {}", config.whatsapp.messages_url());

    // ── Delivery ─────────────────────────────────────────────────────────
    let gateway: Arc<dyn MessageSender> = Arc::new(DeliveryGateway::new(config.whatsapp.clone()));

    // ── Routing ──────────────────────────────────────────────────────────
    let registry = Arc::new(CategoryRegistry::with_default_categories(&config.launch));
    eprintln!(
        "   Categories: {}",
        registry
            .rules()
            .iter()
            .map(|r| r.prefix.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    let router = Arc::new(IntentRouter::new(registry, Arc::new(ProcessLauncher::new())));

    // ── Scheduler ────────────────────────────────────────────────────────
    let scheduler = Scheduler::new(config.scheduler_tick);
    if let Some(announcement) = &config.announcement {
        let job = scheduler
            .register(
                DAILY_ANNOUNCEMENT_JOB,
                Trigger::daily(announcement.hour, announcement.minute),
                Arc::new(Announcement::new(
                    announcement.recipient.clone(),
                    announcement.text.clone(),
                    Arc::clone(&gateway),
                )),
            )
            .await?;
        eprintln!(
            "   Announcement: daily at {:02}:{:02} (next: {})",
            announcement.hour,
            announcement.minute,
            job.next_fire
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "never".to_string())
        );
    } else {
        eprintln!("   Announcement: disabled");
    }
    scheduler.start()?;

    // ── HTTP ─────────────────────────────────────────────────────────────
    let app = webhook_routes(AppState::new(router, gateway, &config.whatsapp));
    let listener = tokio::net::TcpListener::bind(config.server.bind_addr())
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind_addr()))?;
    tracing::info!(addr = %config.server.bind_addr(), "Webhook server started");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    scheduler.shutdown().await;
    served.context("webhook server failed")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
