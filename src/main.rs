use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;

use visa_sentinel::core::config;
use visa_sentinel::{
    api, AppState, EmailTrackingClient, NotificationDispatcher, RedisRegistry, StatusPageDriver,
    Sweeper,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=warn"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    info!("Starting visa-sentinel");

    let cfg = Arc::new(config::load_config());

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .context("building http client")?;

    let registry = Arc::new(RedisRegistry::connect(&cfg.resolve_redis_url()).await?);
    let status_probe = Arc::new(StatusPageDriver::new(
        cfg.resolve_status_page_url(),
        cfg.captcha.clone(),
        http_client.clone(),
    ));
    let passport_probe = Arc::new(EmailTrackingClient::new(cfg.mail.clone()));

    // The webhook is where every result ends up; refuse to start without it.
    let webhook_url = cfg
        .resolve_webhook_url()
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    let sink = Arc::new(NotificationDispatcher::new(http_client.clone(), webhook_url));

    let sweeper = Arc::new(Sweeper::new(
        registry.clone(),
        status_probe.clone(),
        passport_probe.clone(),
        sink.clone(),
        Duration::from_secs(cfg.resolve_sweep_interval_secs()),
        Duration::from_secs(cfg.resolve_attempt_timeout_secs()),
    ));
    tokio::spawn(sweeper.run());

    let state = AppState {
        http_client,
        registry,
        status_probe,
        passport_probe,
        sink,
        config: cfg.clone(),
    };
    let app = api::router(state);

    let addr = cfg.resolve_listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
