//! Movie upload form and its progress/abort plumbing.

use std::path::Path;

use anyhow::{Context, Result};
use tokio::sync::oneshot;

/// Receives percent complete (0-100) while an upload body is sent
pub type ProgressFn = Box<dyn FnMut(f64) + Send>;

/// Multipart fields for `POST /movies/upload`.
#[derive(Debug, Clone, Default)]
pub struct UploadForm {
    pub file_name: String,
    pub content: Vec<u8>,
    pub title: String,
    pub description: String,
    pub genre: String,
    pub is_public: bool,
    pub tmdb_id: Option<i64>,
}

impl UploadForm {
    pub fn new(file_name: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content,
            ..Default::default()
        }
    }

    /// Read a video file from disk into a form named after the file.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow::anyhow!("{} is not a file", path.display()))?;
        Ok(Self::new(file_name, content))
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = genre.into();
        self
    }

    pub fn public(mut self, is_public: bool) -> Self {
        self.is_public = is_public;
        self
    }

    pub fn tmdb_id(mut self, tmdb_id: i64) -> Self {
        self.tmdb_id = Some(tmdb_id);
        self
    }

    /// MIME type for the file part, from its extension.
    pub fn content_type(&self) -> &'static str {
        let ext = Path::new(&self.file_name)
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase());
        match ext.as_deref() {
            Some("mp4") => "video/mp4",
            Some("mkv") => "video/x-matroska",
            Some("avi") => "video/x-msvideo",
            Some("mov") => "video/quicktime",
            _ => "application/octet-stream",
        }
    }

    /// Non-file multipart fields, in send order.
    pub fn text_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("title", self.title.clone()),
            ("description", self.description.clone()),
            ("genre", self.genre.clone()),
            ("is_public", self.is_public.to_string()),
        ];
        if let Some(id) = self.tmdb_id {
            fields.push(("tmdb_id", id.to_string()));
        }
        fields
    }
}

/// An upload request: the form plus optional progress and abort hooks.
pub struct Upload {
    pub(crate) form: UploadForm,
    pub(crate) progress: Option<ProgressFn>,
    pub(crate) abort: Option<oneshot::Receiver<()>>,
}

impl Upload {
    pub fn new(form: UploadForm) -> Self {
        Self {
            form,
            progress: None,
            abort: None,
        }
    }

    pub fn on_progress(mut self, progress: impl FnMut(f64) + Send + 'static) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    /// Make the upload cancellable through the returned handle.
    pub fn abortable(mut self) -> (Self, AbortHandle) {
        let (tx, rx) = oneshot::channel();
        self.abort = Some(rx);
        (self, AbortHandle { tx: Some(tx) })
    }
}

/// Cancels an in-flight upload. Dropping the handle does not abort.
#[derive(Debug)]
pub struct AbortHandle {
    tx: Option<oneshot::Sender<()>>,
}

impl AbortHandle {
    pub fn abort(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Resolves only when the handle explicitly aborts.
pub(crate) async fn aborted(signal: oneshot::Receiver<()>) {
    if signal.await.is_err() {
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_from_extension() {
        assert_eq!(UploadForm::new("a.mp4", vec![]).content_type(), "video/mp4");
        assert_eq!(UploadForm::new("a.MKV", vec![]).content_type(), "video/x-matroska");
        assert_eq!(UploadForm::new("a.mov", vec![]).content_type(), "video/quicktime");
        assert_eq!(UploadForm::new("notes", vec![]).content_type(), "application/octet-stream");
    }

    #[test]
    fn test_text_fields() {
        let form = UploadForm::new("arrival.mp4", vec![0; 4])
            .title("Arrival")
            .genre("Sci-Fi")
            .public(true);
        let fields = form.text_fields();
        assert!(fields.contains(&("title", "Arrival".to_string())));
        assert!(fields.contains(&("is_public", "true".to_string())));
        assert!(!fields.iter().any(|(name, _)| *name == "tmdb_id"));

        let fields = form.tmdb_id(329865).text_fields();
        assert!(fields.contains(&("tmdb_id", "329865".to_string())));
    }

    #[tokio::test]
    async fn test_dropped_handle_does_not_abort() {
        let (upload, handle) = Upload::new(UploadForm::default()).abortable();
        drop(handle);
        let signal = upload.abort.unwrap();
        let result =
            tokio::time::timeout(std::time::Duration::from_millis(20), aborted(signal)).await;
        assert!(result.is_err());
    }
}
