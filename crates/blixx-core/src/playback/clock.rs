use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

/// Where playback currently is. Implemented by whatever drives the video.
pub trait PlaybackClock: Send + Sync {
    /// Seconds into the movie
    fn position_secs(&self) -> f64;

    fn is_paused(&self) -> bool;
}

#[derive(Debug)]
struct ClockState {
    elapsed: Duration,
    running_since: Option<Instant>,
}

/// Clock that advances with wall time while playing.
#[derive(Debug)]
pub struct WallClock {
    state: Mutex<ClockState>,
}

impl WallClock {
    /// A clock that starts playing immediately from `start`.
    pub fn playing_from(start: Duration) -> Self {
        Self {
            state: Mutex::new(ClockState {
                elapsed: start,
                running_since: Some(Instant::now()),
            }),
        }
    }

    pub fn paused_at(position: Duration) -> Self {
        Self {
            state: Mutex::new(ClockState {
                elapsed: position,
                running_since: None,
            }),
        }
    }

    pub fn pause(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(since) = state.running_since.take() {
            state.elapsed += since.elapsed();
        }
    }

    pub fn resume(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.running_since.is_none() {
            state.running_since = Some(Instant::now());
        }
    }

    pub fn seek(&self, position: Duration) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.elapsed = position;
        if state.running_since.is_some() {
            state.running_since = Some(Instant::now());
        }
    }
}

impl PlaybackClock for WallClock {
    fn position_secs(&self) -> f64 {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let running = state
            .running_since
            .map(|since| since.elapsed())
            .unwrap_or_default();
        (state.elapsed + running).as_secs_f64()
    }

    fn is_paused(&self) -> bool {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.running_since.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_wall_clock_advances_only_while_playing() {
        let clock = WallClock::playing_from(Duration::from_secs(5));
        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(clock.position_secs().floor(), 15.0);

        clock.pause();
        assert!(clock.is_paused());
        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(clock.position_secs().floor(), 15.0);

        clock.resume();
        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(clock.position_secs().floor(), 17.0);

        clock.seek(Duration::from_secs(100));
        assert_eq!(clock.position_secs().floor(), 100.0);
    }
}
