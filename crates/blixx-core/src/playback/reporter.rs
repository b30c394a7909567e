use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use super::PlaybackClock;
use crate::api::ApiClient;

/// How often watch progress is reported while playing
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(10);

/// Background task that reports watch progress for one movie.
///
/// Ticks every interval; paused ticks are skipped. Failed reports are
/// logged and never stop the task. The task ends when the reporter is
/// stopped or dropped.
pub struct ProgressReporter {
    movie_id: i64,
    handle: JoinHandle<()>,
}

impl ProgressReporter {
    pub fn start(
        client: Arc<ApiClient>,
        movie_id: i64,
        total_duration: u64,
        clock: Arc<dyn PlaybackClock>,
        every: Duration,
    ) -> Self {
        debug!(movie_id, interval_secs = every.as_secs(), "Starting watch progress reporter");

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                if clock.is_paused() {
                    continue;
                }

                let watched = clock.position_secs().max(0.0).floor() as u64;
                if let Err(e) = client.record_watch(movie_id, watched, total_duration).await {
                    warn!(movie_id, watched, error = %e, "Failed to record watch progress");
                }
            }
        });

        Self { movie_id, handle }
    }

    pub fn movie_id(&self) -> i64 {
        self.movie_id
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Cancel the task. Any report already in flight is abandoned.
    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        self.handle.abort();
        debug!(movie_id = self.movie_id, "Watch progress reporter stopped");
    }
}
