//! Playback session tracking.
//!
//! While a movie plays, a `ProgressReporter` posts the current position
//! to the watch endpoint on a fixed interval. `Player` ties that task to
//! the playback session so it is cancelled when playback ends or another
//! movie starts.

pub mod clock;
pub mod player;
pub mod reporter;

pub use clock::{PlaybackClock, WallClock};
pub use player::{NowPlaying, Player};
pub use reporter::{ProgressReporter, DEFAULT_REPORT_INTERVAL};
