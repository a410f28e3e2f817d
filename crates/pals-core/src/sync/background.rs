//! Periodic background sync

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::engine::SyncEngine;

/// Shortest period the loop will tick at
const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Handle to a running background sync loop.
///
/// The loop fires its first cycle one interval after start. Cancelling stops
/// future ticks; a cycle already in flight runs to completion. Dropping the
/// handle cancels the loop.
pub struct BackgroundSync {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl SyncEngine {
    /// Spawn a loop calling [`SyncEngine::sync_now`] every `interval`.
    ///
    /// Intervals shorter than one second are raised to one second.
    pub fn start_background(self: &Arc<Self>, interval: Duration) -> BackgroundSync {
        if interval < MIN_INTERVAL {
            tracing::warn!(?interval, "Background sync interval too short; using 1s");
        }
        let interval = interval.max(MIN_INTERVAL);
        let token = CancellationToken::new();
        let handle = tokio::spawn(run_background(
            Arc::clone(self),
            interval,
            token.child_token(),
        ));
        BackgroundSync {
            token,
            handle: Some(handle),
        }
    }
}

impl BackgroundSync {
    /// Stop scheduling further cycles
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel and wait for the loop, including any in-flight cycle, to exit
    pub async fn shutdown(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(error) = handle.await {
                tracing::warn!("Background sync task ended abnormally: {}", error);
            }
        }
    }
}

impl Drop for BackgroundSync {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn run_background(engine: Arc<SyncEngine>, period: Duration, token: CancellationToken) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tracing::info!(interval_secs = period.as_secs(), "Background sync started");

    loop {
        tokio::select! {
            biased;
            () = token.cancelled() => break,
            _ = ticker.tick() => {
                engine.sync_now().await;
            }
        }
    }

    tracing::info!("Background sync stopped");
}
