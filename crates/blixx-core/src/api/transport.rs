//! Request/response descriptors and the HTTP transport seam.
//!
//! `ApiClient` decides *what* to send (credentials, retries); a
//! `Transport` only moves bytes. `ReqwestTransport` is the production
//! implementation.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, Method};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use super::upload::{ProgressFn, UploadForm};
use super::ApiError;

/// Size of each streamed chunk of an upload body
const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// One outgoing API call, relative to the client's base address.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub endpoint: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

impl ApiRequest {
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::GET, endpoint)
    }

    pub fn post(endpoint: impl Into<String>) -> Self {
        Self::new(Method::POST, endpoint)
    }

    pub fn put(endpoint: impl Into<String>) -> Self {
        Self::new(Method::PUT, endpoint)
    }

    pub fn delete(endpoint: impl Into<String>) -> Self {
        Self::new(Method::DELETE, endpoint)
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn header(mut self, name: header::HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Serialize `body` as the JSON payload and set the content type.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ApiError> {
        let bytes = serde_json::to_vec(body).map_err(|e| ApiError::Encode(e.to_string()))?;
        self.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        self.body = Some(bytes);
        Ok(self)
    }

    /// Value of the Authorization header, if set
    pub fn authorization(&self) -> Option<&str> {
        self.headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
    }
}

/// Status and raw body of a completed HTTP exchange.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }

    /// Parse the body as JSON. An empty body is `null`.
    pub fn json_value(&self) -> Result<serde_json::Value, ApiError> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_slice(&self.body)
            .map_err(|e| ApiError::InvalidResponse(format!("Body is not JSON: {}", e)))
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_slice(&self.body).map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }
}

/// Build the `Authorization: Bearer` value for a token.
pub fn bearer(token: &str) -> Result<HeaderValue, ApiError> {
    let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
        .map_err(|_| ApiError::InvalidToken)?;
    value.set_sensitive(true);
    Ok(value)
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` to `base_url` + `request.endpoint`.
    ///
    /// Any HTTP status is a successful exchange; only transport failures
    /// are errors (`ApiError::Network`).
    async fn send(&self, base_url: &str, request: &ApiRequest) -> Result<ApiResponse, ApiError>;

    /// POST a multipart upload, reporting percent complete to `progress`.
    ///
    /// Transport failures are `ApiError::UploadFailed`.
    async fn upload(
        &self,
        base_url: &str,
        endpoint: &str,
        headers: HeaderMap,
        form: UploadForm,
        progress: Option<ProgressFn>,
    ) -> Result<ApiResponse, ApiError>;
}

/// Transport backed by a pooled `reqwest::Client`.
/// Clone is cheap - reqwest::Client uses Arc internally.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Build a transport. Without a timeout, requests rely on the
    /// connection's own failure detection.
    pub fn new(timeout: Option<Duration>) -> Result<Self, ApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    fn url(base_url: &str, endpoint: &str) -> String {
        format!("{}{}", base_url.trim_end_matches('/'), endpoint)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, base_url: &str, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let url = Self::url(base_url, &request.endpoint);

        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .headers(request.headers.clone());
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(ref body) = request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();
        debug!(method = %request.method, url = %url, status, "Response received");

        Ok(ApiResponse { status, body })
    }

    async fn upload(
        &self,
        base_url: &str,
        endpoint: &str,
        headers: HeaderMap,
        form: UploadForm,
        progress: Option<ProgressFn>,
    ) -> Result<ApiResponse, ApiError> {
        let url = Self::url(base_url, endpoint);
        let content_type = form.content_type();
        let fields = form.text_fields();
        let UploadForm {
            file_name, content, ..
        } = form;

        let total = content.len() as u64;
        let stream = progress_stream(content, progress);

        let file_part = Part::stream_with_length(Body::wrap_stream(stream), total)
            .file_name(file_name)
            .mime_str(content_type)
            .map_err(|e| ApiError::UploadFailed(e.to_string()))?;

        let mut multipart = Form::new().part("file", file_part);
        for (name, value) in fields {
            multipart = multipart.text(name, value);
        }

        let response = self
            .client
            .post(&url)
            .headers(headers)
            .multipart(multipart)
            .send()
            .await
            .map_err(|e| ApiError::UploadFailed(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| ApiError::UploadFailed(e.to_string()))?
            .to_vec();
        debug!(url = %url, status, bytes = total, "Upload finished");

        Ok(ApiResponse { status, body })
    }
}

/// Split an upload body into chunks, reporting percent complete to
/// `progress` as each chunk is handed to the connection. Empty content
/// reports 100 up front since no chunk will ever be pulled.
fn progress_stream(
    content: Vec<u8>,
    progress: Option<ProgressFn>,
) -> impl Stream<Item = Result<Vec<u8>, std::io::Error>> + Send + Sync + 'static {
    let total = content.len() as u64;
    let chunks: Vec<Vec<u8>> = content
        .chunks(UPLOAD_CHUNK_SIZE)
        .map(<[u8]>::to_vec)
        .collect();

    let mut progress = progress;
    if total == 0 {
        if let Some(ref mut callback) = progress {
            callback(100.0);
        }
    }

    let progress = progress.map(Mutex::new);
    let mut sent: u64 = 0;
    futures::stream::iter(chunks.into_iter().map(move |chunk| {
        sent += chunk.len() as u64;
        if let Some(ref callback) = progress {
            let mut callback = callback.lock().unwrap_or_else(|e| e.into_inner());
            (&mut *callback)(sent as f64 / total as f64 * 100.0);
        }
        Ok(chunk)
    }))
}
