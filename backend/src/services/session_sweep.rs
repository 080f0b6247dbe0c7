use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::time;

use crate::services::session_store::{SessionStore, StoreError};

/// Start the expired-session sweep.
///
/// Refresh already rejects expired sessions on its own; this only keeps the
/// table from accumulating rows nobody will present again. Runs forever.
pub async fn start_sweeper(store: Arc<dyn SessionStore>, interval: std::time::Duration) {
    log::info!("Expired session sweep started, running every {} seconds", interval.as_secs());

    let mut ticker = time::interval(interval);
    // The first tick completes immediately; skip it so startup stays quiet.
    ticker.tick().await;

    loop {
        ticker.tick().await;

        match sweep_expired_sessions(store.as_ref(), Utc::now()).await {
            Ok(removed) => log::debug!("Expired session sweep removed {} sessions", removed),
            Err(e) => log::error!("Error sweeping expired sessions: {}", e),
        }
    }
}

pub async fn sweep_expired_sessions(store: &dyn SessionStore, now: DateTime<Utc>) -> Result<u64, StoreError> {
    let removed = store.delete_expired(now).await?;
    if removed > 0 {
        log::info!("Removed {} expired sessions", removed);
    }
    Ok(removed)
}
