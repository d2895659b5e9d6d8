use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use sqlx::SqlitePool;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::db::SharingStatusRepository;
use crate::error::AppResult;
use crate::AppState;

/// Periodic bulk expiry of elapsed temporary sessions.
///
/// Reads already normalize expired sessions, so a late or skipped sweep only
/// delays the stored flag, never what clients see.
pub struct ExpirySweeper;

impl ExpirySweeper {
    /// Expire every temporary session whose `expires_at` is before `now`.
    /// Idempotent; returns the number of sessions this call closed.
    pub async fn sweep(pool: &SqlitePool, now: NaiveDateTime) -> AppResult<u64> {
        let expired = SharingStatusRepository::expire_all_elapsed(pool, now).await?;
        if expired > 0 {
            tracing::info!("Expired {} temporary sharing session(s)", expired);
        } else {
            tracing::debug!("No temporary sharing sessions to expire");
        }
        Ok(expired)
    }

    pub fn spawn(state: Arc<AppState>, shutdown: broadcast::Sender<()>) -> JoinHandle<()> {
        let mut shutdown_rx = shutdown.subscribe();
        let interval = Duration::from_secs(state.config.sharing.sweeper_interval_seconds);

        tokio::spawn(async move {
            tracing::info!(
                "Sharing expiry sweeper started (interval: {}s)",
                interval.as_secs()
            );
            loop {
                if let Err(e) = Self::sweep(&state.db, state.clock.now()).await {
                    tracing::warn!("Sharing expiry sweep failed: {:?}", e);
                }

                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        tracing::info!("Sharing expiry sweeper shutting down");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {}
                }
            }
        })
    }
}
