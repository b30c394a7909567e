use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::{PlaybackClock, ProgressReporter, DEFAULT_REPORT_INTERVAL};
use crate::api::{ApiClient, ApiError};
use crate::models::{Movie, StreamInfo};

/// The movie currently playing and where to stream it from.
#[derive(Debug, Clone)]
pub struct NowPlaying {
    pub movie: Movie,
    pub stream: StreamInfo,
}

impl NowPlaying {
    /// Total running time in seconds
    pub fn total_duration(&self) -> u64 {
        self.movie.duration_secs()
    }
}

/// Owns the playback session and its progress reporter.
///
/// Only one movie plays at a time: starting another one, finishing, or
/// stopping cancels the previous reporter.
pub struct Player {
    client: Arc<ApiClient>,
    report_every: Duration,
    current: Option<(NowPlaying, ProgressReporter)>,
}

impl Player {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self::with_interval(client, DEFAULT_REPORT_INTERVAL)
    }

    pub fn with_interval(client: Arc<ApiClient>, report_every: Duration) -> Self {
        Self {
            client,
            report_every,
            current: None,
        }
    }

    /// Fetch the movie and its stream URL, then start reporting progress
    /// as read from `clock`.
    pub async fn play(
        &mut self,
        movie_id: i64,
        clock: Arc<dyn PlaybackClock>,
    ) -> Result<&NowPlaying, ApiError> {
        self.stop();

        let movie = self.client.movie(movie_id).await?;
        let stream = self.client.stream_url(movie_id).await?;
        let now_playing = NowPlaying { movie, stream };

        let reporter = ProgressReporter::start(
            Arc::clone(&self.client),
            movie_id,
            now_playing.total_duration(),
            clock,
            self.report_every,
        );
        info!(movie_id, title = %now_playing.movie.title, "Playback started");

        let (now_playing, _) = self.current.insert((now_playing, reporter));
        Ok(now_playing)
    }

    pub fn now_playing(&self) -> Option<&NowPlaying> {
        self.current.as_ref().map(|(playing, _)| playing)
    }

    /// Stop reporting without marking the movie watched.
    pub fn stop(&mut self) {
        if let Some((playing, reporter)) = self.current.take() {
            reporter.stop();
            info!(movie_id = playing.movie.id, "Playback stopped");
        }
    }

    /// Playback reached the end: stop reporting and record the movie as
    /// fully watched. A failed final report is logged, not returned.
    pub async fn finish(&mut self) {
        let Some((playing, reporter)) = self.current.take() else {
            return;
        };
        reporter.stop();

        let total = playing.total_duration();
        match self.client.record_watch(playing.movie.id, total, total).await {
            Ok(_) => info!(movie_id = playing.movie.id, "Playback finished"),
            Err(e) => warn!(movie_id = playing.movie.id, error = %e, "Error recording watch"),
        }
    }
}
