mod config;
mod control;
mod error;
mod watchdog;
mod web;

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use tracing_subscriber::EnvFilter;

use control::DeviceState;

#[tokio::main]
async fn main() -> Result<()> {
    // ── Logging ─────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // ── Config (file or preset) ─────────────────────────────────────
    let cfg = config::from_env()?;
    info!(
        fire_enabled = cfg.fire.enabled,
        field1 = ?cfg.field1,
        field2 = ?cfg.field2,
        liveness_timeout_sec = cfg.liveness_timeout_sec,
        "config loaded"
    );

    // ── Shared state (ephemeral, reset on restart) ──────────────────
    let shared = Arc::new(RwLock::new(DeviceState::new(
        cfg.policy(),
        cfg.liveness_timeout(),
    )));
    {
        let mut st = shared.write().await;
        st.record_system("hub started".to_string());
    }

    // ── Liveness watchdog ───────────────────────────────────────────
    tokio::spawn(watchdog::run(Arc::clone(&shared), cfg.watchdog_interval()));

    // ── Web server ──────────────────────────────────────────────────
    web::serve(shared, cfg.web_port).await
}
