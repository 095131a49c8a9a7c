//! Standalone calendar engine.
//!
//! Recomputes the projection on every transition and prints it as one JSON
//! line per recompute. Settings come from `YIDCAL_CONFIG` or the default
//! `yidcal.toml` search path.
//!
//! # Environment Variables
//!
//! - `YIDCAL_CONFIG`: Path to the TOML settings file
//! - `RUST_LOG`: Log level (default: info)

use std::env;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use yidcal_rust::models::config::EngineSettings;
use yidcal_rust::scheduler::{next_wake, AlarmSlot, TokioScheduler};
use yidcal_rust::Pipeline;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    FmtSubscriber::builder()
        .with_max_level(
            env::var("RUST_LOG")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(Level::INFO),
        )
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let settings = EngineSettings::from_env()?;
    info!(
        "Starting engine at {:.4},{:.4} ({})",
        settings.location.latitude,
        settings.location.longitude,
        settings.location.timezone
    );
    let pipeline = Arc::new(Pipeline::new(settings)?);

    let (tx, mut rx) = mpsc::unbounded_channel::<()>();
    let alarm = AlarmSlot::new(TokioScheduler::new());
    tx.send(())?;

    loop {
        tokio::select! {
            wake = rx.recv() => {
                if wake.is_none() {
                    break;
                }
                let now = Utc::now();
                let projection = pipeline.recompute(now);
                println!("{}", serde_json::to_string(&projection)?);

                let at = next_wake(projection.next_transition, now);
                let tx = tx.clone();
                alarm.arm(at, Box::new(move || {
                    let _ = tx.send(());
                }));
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }

    alarm.disarm();
    Ok(())
}
