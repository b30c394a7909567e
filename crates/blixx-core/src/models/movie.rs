use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::User;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Movie {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub release_date: Option<NaiveDate>,
    /// Running time in minutes
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub poster_url: Option<String>,
    #[serde(default)]
    pub backdrop_url: Option<String>,
    #[serde(default)]
    pub tmdb_id: Option<i64>,
    #[serde(default)]
    pub resolution: Option<String>,
    #[serde(default)]
    pub view_count: Option<u64>,
    #[serde(default)]
    pub is_public: Option<bool>,
    #[serde(default)]
    pub is_featured: Option<bool>,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub updated_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub uploader_id: Option<i64>,
    /// Only included on the movie detail endpoint
    #[serde(default)]
    pub uploader: Option<User>,
}

impl Movie {
    /// Total running time in seconds, as reported to the watch endpoint.
    pub fn duration_secs(&self) -> u64 {
        self.duration.map(|m| u64::from(m) * 60).unwrap_or(0)
    }

    pub fn rating_display(&self) -> String {
        match self.rating {
            Some(r) => format!("{:.1}/10", r),
            None => "N/A".to_string(),
        }
    }
}

/// A page of movies from any of the paginated listing endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct MoviePage {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub pages: u64,
    #[serde(default)]
    pub current_page: u64,
    /// Echoed back by the search endpoint
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub movies: Vec<Movie>,
}

/// Editable movie metadata for `PUT /movies/{id}`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MovieUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_featured: Option<bool>,
}
