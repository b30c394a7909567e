use chrono::NaiveDateTime;
use serde::Deserialize;

/// Presigned streaming location for a movie (`GET /stream/{id}/url`).
#[derive(Debug, Clone, Deserialize)]
pub struct StreamInfo {
    pub movie_id: i64,
    pub stream_url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub resolution: Option<String>,
    /// Seconds until `stream_url` stops working
    #[serde(default)]
    pub expires_in: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WatchEntry {
    pub id: i64,
    #[serde(default)]
    pub user_id: Option<i64>,
    pub movie_id: i64,
    #[serde(default)]
    pub watch_time: u64,
    #[serde(default)]
    pub total_duration: u64,
    #[serde(default)]
    pub progress_percentage: u32,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub viewed_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub last_watched: Option<NaiveDateTime>,
}

/// Body of a successful `POST /stream/{id}/watch`.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchRecorded {
    #[serde(default)]
    pub message: Option<String>,
    pub watch_entry: WatchEntry,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WatchHistoryPage {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub pages: u64,
    #[serde(default)]
    pub current_page: u64,
    #[serde(default)]
    pub watch_history: Vec<WatchEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_watch_history() {
        let json = r#"{"total":1,"pages":1,"current_page":1,"watch_history":[{"id":9,"user_id":7,"movie_id":3,"watch_time":600,"total_duration":6960,"progress_percentage":9,"is_completed":false,"viewed_at":"2024-03-02T20:00:00","last_watched":"2024-03-02T20:10:00"}]}"#;

        let page: WatchHistoryPage = serde_json::from_str(json).expect("valid history JSON");
        assert_eq!(page.watch_history.len(), 1);
        let entry = &page.watch_history[0];
        assert_eq!(entry.movie_id, 3);
        assert_eq!(entry.progress_percentage, 9);
        assert!(!entry.is_completed);
        assert!(entry.last_watched.is_some());
    }

    #[test]
    fn test_parse_stream_info() {
        let json = r#"{"movie_id":3,"stream_url":"https://cdn.example.com/v/3.mp4?sig=abc","title":"Arrival","duration":116,"resolution":"1080p","expires_in":3600}"#;

        let info: StreamInfo = serde_json::from_str(json).expect("valid stream JSON");
        assert_eq!(info.movie_id, 3);
        assert_eq!(info.expires_in, Some(3600));
    }
}
