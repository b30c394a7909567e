//! Text formatting for terminal output.

use blixx_core::models::{Movie, User, WatchEntry};

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// Format an optional string, returning a default if None
pub fn format_optional(value: &Option<String>, default: &str) -> String {
    value.as_deref().unwrap_or(default).to_string()
}

/// Seconds as `H:MM:SS`, or `M:SS` under an hour
pub fn format_duration(secs: u64) -> String {
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}

pub fn movie_row(movie: &Movie) -> String {
    format!(
        "{:>6}  {:<40}  {:>8}  {:>6} views",
        movie.id,
        truncate_string(&movie.title, 40),
        movie.rating_display(),
        movie.view_count.unwrap_or(0)
    )
}

pub fn movie_detail(movie: &Movie) -> String {
    let mut lines = vec![
        format!("{} (#{})", movie.title, movie.id),
        format!("  Genre:    {}", format_optional(&movie.genre, "Unknown")),
        format!(
            "  Duration: {}",
            movie
                .duration
                .map(|m| format!("{} min", m))
                .unwrap_or_else(|| "Unknown".to_string())
        ),
        format!("  Rating:   {}", movie.rating_display()),
        format!("  Views:    {}", movie.view_count.unwrap_or(0)),
    ];
    if let Some(ref uploader) = movie.uploader {
        lines.push(format!("  Uploader: {}", uploader.display_name()));
    }
    lines.push(String::new());
    lines.push(format_optional(&movie.description, "No description available"));
    lines.join("\n")
}

pub fn user_summary(user: &User) -> String {
    let mut line = format!("{} ({})", user.display_name(), user.username);
    if let Some(ref email) = user.email {
        line.push_str(&format!(" <{}>", email));
    }
    if let Some(uploads) = user.total_uploads {
        line.push_str(&format!(", {} uploads", uploads));
    }
    line
}

pub fn watch_row(entry: &WatchEntry) -> String {
    let last = entry
        .last_watched
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{:>6}  {:>3}%  {:>9} / {:<9}  {}{}",
        entry.movie_id,
        entry.progress_percentage,
        format_duration(entry.watch_time),
        format_duration(entry.total_duration),
        last,
        if entry.is_completed { "  (completed)" } else { "" }
    )
}
