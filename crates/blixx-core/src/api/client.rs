//! Session-aware client for the BLIXX REST API.
//!
//! `ApiClient` attaches the held access token to every call. When the
//! server answers 401 it refreshes the token once and re-sends the
//! original request once; if the refresh fails the session is torn down
//! and the call fails with `ApiError::AuthenticationFailed`.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use reqwest::header::{self, HeaderMap};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use super::transport::{bearer, ApiRequest, ApiResponse, ReqwestTransport, Transport};
use super::upload::{aborted, Upload};
use super::ApiError;
use crate::auth::{Session, SessionStore};
use crate::models::{
    LoginResponse, Movie, MoviePage, MovieUpdate, ProfileUpdate, RefreshResponse, StreamInfo,
    User, WatchHistoryPage, WatchRecorded,
};

// ============================================================================
// Constants
// ============================================================================

/// Default page for paginated listings
pub const DEFAULT_PAGE: u32 = 1;

/// Default page size for paginated listings
pub const DEFAULT_PER_PAGE: u32 = 20;

/// Default TMDB trending window
pub const DEFAULT_TIME_WINDOW: &str = "week";

const LOGIN_ENDPOINT: &str = "/auth/login";
const REGISTER_ENDPOINT: &str = "/auth/register";
const REFRESH_ENDPOINT: &str = "/auth/refresh";
const UPLOAD_ENDPOINT: &str = "/movies/upload";

pub struct ApiClient {
    base_url: String,
    transport: Arc<dyn Transport>,
    store: Arc<dyn SessionStore>,
    session: Mutex<Session>,
    // Serializes refreshes so concurrent 401s share one refresh
    refresh_gate: tokio::sync::Mutex<()>,
}

impl ApiClient {
    /// Create a client backed by reqwest, restoring any stored session.
    pub fn new(
        base_url: impl Into<String>,
        store: Arc<dyn SessionStore>,
        timeout: Option<Duration>,
    ) -> Result<Self, ApiError> {
        let transport = ReqwestTransport::new(timeout)?;
        Ok(Self::with_transport(base_url, store, Arc::new(transport)))
    }

    pub fn with_transport(
        base_url: impl Into<String>,
        store: Arc<dyn SessionStore>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let session = Session::load(store.as_ref());
        debug!(
            authenticated = session.is_authenticated(),
            "Session restored from storage"
        );
        Self {
            base_url: base_url.into(),
            transport,
            store,
            session: Mutex::new(session),
            refresh_gate: tokio::sync::Mutex::new(()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn lock_session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn current_access_token(&self) -> Option<String> {
        self.lock_session().access_token.clone()
    }

    /// Snapshot of the in-memory session
    pub fn session(&self) -> Session {
        self.lock_session().clone()
    }

    // ===== Request Lifecycle =====

    /// Send `request` with credentials attached and return the parsed JSON body.
    pub async fn request(&self, request: ApiRequest) -> Result<Value, ApiError> {
        let result = self.execute(&request).await;
        if let Err(ref e) = result {
            error!(
                method = %request.method,
                endpoint = %request.endpoint,
                error = %e.log_excerpt(),
                "API request failed"
            );
        }
        result
    }

    /// Like `request`, decoding the body into `T`.
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
    ) -> Result<T, ApiError> {
        let endpoint = request.endpoint.clone();
        let value = self.request(request).await?;
        serde_json::from_value(value).map_err(|e| {
            let err = ApiError::InvalidResponse(e.to_string());
            error!(endpoint = %endpoint, error = %err, "Unexpected response shape");
            err
        })
    }

    async fn execute(&self, request: &ApiRequest) -> Result<Value, ApiError> {
        let (response, sent_token) = self.attempt(request).await?;

        // At most one retry: a 401 on the retried request is returned as-is
        let response = if response.is_unauthorized() {
            debug!(endpoint = %request.endpoint, "Access token rejected, refreshing");
            self.recover(sent_token.as_deref()).await?;
            let (retried, _) = self.attempt(request).await?;
            retried
        } else {
            response
        };

        Self::into_json(response)
    }

    /// Send once with whatever access token is held right now.
    async fn attempt(
        &self,
        request: &ApiRequest,
    ) -> Result<(ApiResponse, Option<String>), ApiError> {
        let token = self.current_access_token();
        let mut outgoing = request.clone();
        if let Some(ref token) = token {
            outgoing.headers.insert(header::AUTHORIZATION, bearer(token)?);
        }
        let response = self.transport.send(&self.base_url, &outgoing).await?;
        Ok((response, token))
    }

    /// Get a usable access token after `stale` was rejected.
    async fn recover(&self, stale: Option<&str>) -> Result<(), ApiError> {
        let _gate = self.refresh_gate.lock().await;

        match self.current_access_token() {
            Some(current) if Some(current.as_str()) != stale => {
                debug!("Access token was refreshed by another request");
                return Ok(());
            }
            None if stale.is_some() => {
                // A concurrent refresh failed and cleared the session
                return Err(ApiError::AuthenticationFailed);
            }
            _ => {}
        }

        if self.refresh_locked().await {
            Ok(())
        } else {
            self.logout();
            Err(ApiError::AuthenticationFailed)
        }
    }

    fn into_json(response: ApiResponse) -> Result<Value, ApiError> {
        if response.is_success() {
            response.json_value()
        } else {
            Err(ApiError::from_status(response.status, &response.body))
        }
    }

    // ===== Authentication =====

    /// Sign in and replace any existing session with the issued tokens.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let request = ApiRequest::post(LOGIN_ENDPOINT)
            .json(&json!({ "username": username, "password": password }))?;
        let data: LoginResponse = self.request_json(request).await?;

        {
            let mut session = self.lock_session();
            session.establish(
                data.access_token.clone(),
                data.refresh_token.clone(),
                data.user.clone(),
            );
            if let Err(e) = session.persist(self.store.as_ref()) {
                warn!(error = %e, "Failed to save session");
            }
        }

        info!(username = %data.user.username, "Logged in");
        Ok(data)
    }

    /// Create an account. Does not sign in.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<Value, ApiError> {
        let request = ApiRequest::post(REGISTER_ENDPOINT).json(&json!({
            "username": username,
            "email": email,
            "password": password,
        }))?;
        self.request(request).await
    }

    /// Exchange the refresh token for a new access token.
    ///
    /// Returns `false` without touching the network if no refresh token is
    /// held. Never clears the session on failure; that is the caller's call.
    pub async fn refresh_access_token(&self) -> bool {
        let _gate = self.refresh_gate.lock().await;
        self.refresh_locked().await
    }

    async fn refresh_locked(&self) -> bool {
        let Some(refresh_token) = self.lock_session().refresh_token.clone() else {
            debug!("No refresh token held");
            return false;
        };

        let authorization = match bearer(&refresh_token) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Token refresh failed");
                return false;
            }
        };
        // Sent directly: the refresh call is never itself refreshed
        let request =
            ApiRequest::post(REFRESH_ENDPOINT).header(header::AUTHORIZATION, authorization);

        let response = match self.transport.send(&self.base_url, &request).await {
            Ok(response) if response.is_success() => response,
            Ok(response) => {
                warn!(status = response.status, "Token refresh rejected");
                return false;
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed");
                return false;
            }
        };

        let refreshed: RefreshResponse = match response.json() {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "Token refresh returned an unexpected body");
                return false;
            }
        };

        let mut session = self.lock_session();
        session.access_token = Some(refreshed.access_token);
        if let Err(e) = session.persist_access_token(self.store.as_ref()) {
            warn!(error = %e, "Failed to save refreshed access token");
        }
        info!("Access token refreshed");
        true
    }

    /// Forget the session in memory and in storage. Safe to call twice.
    pub fn logout(&self) {
        self.lock_session().clear();
        if let Err(e) = Session::erase(self.store.as_ref()) {
            warn!(error = %e, "Failed to clear stored session");
        }
        info!("Logged out");
    }

    /// True while an access token is held. Says nothing about validity.
    pub fn is_authenticated(&self) -> bool {
        self.lock_session().is_authenticated()
    }

    /// Last-known user from storage, for rendering without a round trip.
    pub fn stored_user(&self) -> Option<User> {
        Session::stored_user(self.store.as_ref())
    }

    // ===== Users =====

    pub async fn current_user(&self) -> Result<User, ApiError> {
        self.request_json(ApiRequest::get("/users/me")).await
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<User, ApiError> {
        self.request_json(ApiRequest::put("/users/me").json(update)?).await
    }

    pub async fn user_profile(&self, user_id: i64) -> Result<User, ApiError> {
        self.request_json(ApiRequest::get(format!("/users/{}", user_id))).await
    }

    pub async fn user_movies(&self, page: u32, per_page: u32) -> Result<MoviePage, ApiError> {
        self.request_json(paged("/users/me/movies", page, per_page)).await
    }

    // ===== Movies =====

    pub async fn movies(&self, page: u32, per_page: u32) -> Result<MoviePage, ApiError> {
        self.request_json(paged("/movies", page, per_page)).await
    }

    pub async fn movie(&self, movie_id: i64) -> Result<Movie, ApiError> {
        self.request_json(ApiRequest::get(format!("/movies/{}", movie_id))).await
    }

    pub async fn search_movies(
        &self,
        query: &str,
        page: u32,
        per_page: u32,
    ) -> Result<MoviePage, ApiError> {
        let request = ApiRequest::get("/movies/search")
            .query("q", query)
            .query("page", page)
            .query("per_page", per_page);
        self.request_json(request).await
    }

    pub async fn featured_movies(&self, page: u32, per_page: u32) -> Result<MoviePage, ApiError> {
        self.request_json(paged("/movies/featured", page, per_page)).await
    }

    pub async fn update_movie(
        &self,
        movie_id: i64,
        update: &MovieUpdate,
    ) -> Result<Movie, ApiError> {
        let request = ApiRequest::put(format!("/movies/{}", movie_id)).json(update)?;
        self.request_json(request).await
    }

    pub async fn delete_movie(&self, movie_id: i64) -> Result<Value, ApiError> {
        self.request(ApiRequest::delete(format!("/movies/{}", movie_id))).await
    }

    /// Upload a movie file with progress reporting.
    ///
    /// Uses its own transport path and does not refresh an expired access
    /// token: a 401 here fails the upload with `UploadRejected`.
    pub async fn upload_movie(&self, upload: Upload) -> Result<Value, ApiError> {
        let result = self.execute_upload(upload).await;
        if let Err(ref e) = result {
            error!(error = %e.log_excerpt(), "Movie upload failed");
        }
        result
    }

    async fn execute_upload(&self, upload: Upload) -> Result<Value, ApiError> {
        let Upload {
            form,
            progress,
            abort,
        } = upload;

        let mut headers = HeaderMap::new();
        if let Some(token) = self.current_access_token() {
            headers.insert(header::AUTHORIZATION, bearer(&token)?);
        }

        info!(file = %form.file_name, bytes = form.content.len(), "Uploading movie");
        let send = self
            .transport
            .upload(&self.base_url, UPLOAD_ENDPOINT, headers, form, progress);

        let response = match abort {
            Some(signal) => tokio::select! {
                response = send => response?,
                _ = aborted(signal) => return Err(ApiError::UploadAborted),
            },
            None => send.await?,
        };

        if !response.is_success() {
            return Err(ApiError::upload_rejected(response.status, &response.body));
        }
        response.json_value()
    }

    // ===== Streaming =====

    pub async fn stream_url(&self, movie_id: i64) -> Result<StreamInfo, ApiError> {
        self.request_json(ApiRequest::get(format!("/stream/{}/url", movie_id))).await
    }

    /// Report how far into a movie the user is, in seconds.
    pub async fn record_watch(
        &self,
        movie_id: i64,
        watch_time: u64,
        total_duration: u64,
    ) -> Result<WatchRecorded, ApiError> {
        let request = ApiRequest::post(format!("/stream/{}/watch", movie_id)).json(&json!({
            "watch_time": watch_time,
            "total_duration": total_duration,
        }))?;
        self.request_json(request).await
    }

    pub async fn watch_history(
        &self,
        page: u32,
        per_page: u32,
    ) -> Result<WatchHistoryPage, ApiError> {
        self.request_json(paged("/stream/history", page, per_page)).await
    }

    // ===== TMDB =====

    pub async fn search_tmdb(&self, query: &str, page: u32) -> Result<Value, ApiError> {
        let request = ApiRequest::get("/movies/tmdb/search")
            .query("q", query)
            .query("page", page);
        self.request(request).await
    }

    pub async fn trending_movies(&self, time_window: &str, page: u32) -> Result<Value, ApiError> {
        let request = ApiRequest::get("/movies/tmdb/trending")
            .query("time_window", time_window)
            .query("page", page);
        self.request(request).await
    }
}

fn paged(endpoint: &str, page: u32, per_page: u32) -> ApiRequest {
    ApiRequest::get(endpoint)
        .query("page", page)
        .query("per_page", per_page)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::transport::mock::{MockTransport, Reply};
    use crate::api::upload::UploadForm;
    use crate::auth::{MemoryStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const BASE: &str = "http://localhost:5000/api";

    fn login_reply() -> Reply {
        Reply::Json(
            200,
            json!({
                "message": "Login successful",
                "access_token": "A1",
                "refresh_token": "R1",
                "user": {"id": 7, "username": "alice"}
            }),
        )
    }

    fn user_reply() -> Reply {
        Reply::Json(200, json!({"id": 7, "username": "alice"}))
    }

    fn client(transport: &Arc<MockTransport>, store: &Arc<MemoryStore>) -> ApiClient {
        ApiClient::with_transport(BASE, store.clone(), transport.clone())
    }

    /// Client already holding A1/R1 for alice
    fn signed_in(transport: &Arc<MockTransport>, store: &Arc<MemoryStore>) -> ApiClient {
        store
            .set_many(&[
                (ACCESS_TOKEN_KEY, "A1"),
                (REFRESH_TOKEN_KEY, "R1"),
                (USER_KEY, r#"{"id":7,"username":"alice"}"#),
            ])
            .unwrap();
        client(transport, store)
    }

    #[tokio::test]
    async fn test_login_establishes_session() {
        let transport = Arc::new(MockTransport::scripted(vec![login_reply()]));
        let store = Arc::new(MemoryStore::new());
        let api = client(&transport, &store);
        assert!(!api.is_authenticated());

        let data = api.login("alice", "pw").await.unwrap();
        assert_eq!(data.access_token, "A1");

        assert!(api.is_authenticated());
        assert_eq!(api.stored_user().unwrap().username, "alice");
        assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("A1"));
        assert_eq!(store.get(REFRESH_TOKEN_KEY).unwrap().as_deref(), Some("R1"));

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, reqwest::Method::POST);
        assert_eq!(requests[0].endpoint, "/auth/login");
        assert_eq!(
            requests[0].body,
            Some(json!({"username": "alice", "password": "pw"}))
        );
    }

    #[tokio::test]
    async fn test_session_restored_from_store() {
        let transport = Arc::new(MockTransport::scripted(vec![user_reply()]));
        let store = Arc::new(MemoryStore::new());
        let api = signed_in(&transport, &store);

        assert!(api.is_authenticated());
        api.current_user().await.unwrap();
        assert_eq!(transport.requests()[0].authorization.as_deref(), Some("Bearer A1"));
    }

    #[tokio::test]
    async fn test_no_authorization_without_token() {
        let transport = Arc::new(MockTransport::scripted(vec![Reply::Json(
            200,
            json!({"total": 0, "pages": 0, "current_page": 1, "movies": []}),
        )]));
        let store = Arc::new(MemoryStore::new());
        let api = client(&transport, &store);

        api.movies(1, 20).await.unwrap();
        assert_eq!(transport.requests()[0].authorization, None);
    }

    #[tokio::test]
    async fn test_bearer_overrides_caller_authorization() {
        let transport = Arc::new(MockTransport::scripted(vec![Reply::Json(200, json!({}))]));
        let store = Arc::new(MemoryStore::new());
        let api = signed_in(&transport, &store);

        let request = ApiRequest::get("/users/me").header(
            header::AUTHORIZATION,
            header::HeaderValue::from_static("Bearer caller"),
        );
        api.request(request).await.unwrap();
        assert_eq!(transport.requests()[0].authorization.as_deref(), Some("Bearer A1"));
    }

    #[tokio::test]
    async fn test_refresh_and_retry_once() {
        let transport = Arc::new(MockTransport::scripted(vec![
            Reply::Json(401, json!({"msg": "Token has expired"})),
            Reply::Json(200, json!({"access_token": "A2"})),
            user_reply(),
        ]));
        let store = Arc::new(MemoryStore::new());
        let api = signed_in(&transport, &store);

        let user = api.current_user().await.unwrap();
        assert_eq!(user.username, "alice");

        let requests = transport.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].authorization.as_deref(), Some("Bearer A1"));
        assert_eq!(requests[1].endpoint, "/auth/refresh");
        assert_eq!(requests[1].authorization.as_deref(), Some("Bearer R1"));
        assert_eq!(requests[2].endpoint, "/users/me");
        assert_eq!(requests[2].authorization.as_deref(), Some("Bearer A2"));

        let session = api.session();
        assert_eq!(session.access_token(), Some("A2"));
        assert_eq!(session.refresh_token(), Some("R1"));
        assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("A2"));
        assert_eq!(store.get(REFRESH_TOKEN_KEY).unwrap().as_deref(), Some("R1"));
    }

    #[tokio::test]
    async fn test_failed_refresh_clears_session() {
        let transport = Arc::new(MockTransport::scripted(vec![
            Reply::Json(401, json!({"msg": "Token has expired"})),
            Reply::Json(401, json!({"msg": "Token has expired"})),
        ]));
        let store = Arc::new(MemoryStore::new());
        let api = signed_in(&transport, &store);

        let err = api.current_user().await.unwrap_err();
        assert!(err.is_auth_failure());

        assert!(!api.is_authenticated());
        assert_eq!(api.session(), Session::default());
        assert!(api.stored_user().is_none());
        assert!(store.is_empty());
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_refresh_network_error_clears_session() {
        let transport = Arc::new(MockTransport::scripted(vec![
            Reply::Json(401, json!({})),
            Reply::NetworkError("connection reset"),
        ]));
        let store = Arc::new(MemoryStore::new());
        let api = signed_in(&transport, &store);

        let err = api.movie(3).await.unwrap_err();
        assert!(matches!(err, ApiError::AuthenticationFailed));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_retry_is_bounded_to_one() {
        let transport = Arc::new(MockTransport::scripted(vec![
            Reply::Json(401, json!({})),
            Reply::Json(200, json!({"access_token": "A2"})),
            Reply::Json(401, json!({"error": "Token revoked"})),
        ]));
        let store = Arc::new(MemoryStore::new());
        let api = signed_in(&transport, &store);

        let err = api.current_user().await.unwrap_err();
        assert_eq!(err.status(), Some(401));
        assert_eq!(err.to_string(), "Token revoked");
        assert_eq!(transport.requests().len(), 3);
        assert_eq!(transport.count("/auth/refresh"), 1);
        // The refreshed token is kept; this was not a refresh failure
        assert_eq!(api.session().access_token(), Some("A2"));
    }

    #[tokio::test]
    async fn test_refresh_without_refresh_token_makes_no_call() {
        let transport = Arc::new(MockTransport::scripted(vec![]));
        let store = Arc::new(MemoryStore::new());
        let api = client(&transport, &store);

        assert!(!api.refresh_access_token().await);
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_failure_does_not_clear_session() {
        let transport = Arc::new(MockTransport::scripted(vec![Reply::Json(
            500,
            json!({"error": "boom"}),
        )]));
        let store = Arc::new(MemoryStore::new());
        let api = signed_in(&transport, &store);

        assert!(!api.refresh_access_token().await);
        assert_eq!(api.session().access_token(), Some("A1"));
        assert_eq!(store.get(REFRESH_TOKEN_KEY).unwrap().as_deref(), Some("R1"));
    }

    #[tokio::test]
    async fn test_unauthorized_without_session() {
        let transport = Arc::new(MockTransport::scripted(vec![Reply::Json(
            401,
            json!({"error": "Invalid username or password"}),
        )]));
        let store = Arc::new(MemoryStore::new());
        let api = client(&transport, &store);

        let err = api.login("alice", "wrong").await.unwrap_err();
        assert!(err.is_auth_failure());
        assert!(!api.is_authenticated());
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let transport = Arc::new(MockTransport::scripted(vec![]));
        let store = Arc::new(MemoryStore::new());
        let api = signed_in(&transport, &store);

        api.logout();
        api.logout();
        assert!(!api.is_authenticated());
        assert!(api.stored_user().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_register_leaves_session_alone() {
        let transport = Arc::new(MockTransport::scripted(vec![Reply::Json(
            201,
            json!({"message": "User created successfully", "user": {"id": 8, "username": "bob"}}),
        )]));
        let store = Arc::new(MemoryStore::new());
        let api = signed_in(&transport, &store);

        let body = api.register("bob", "bob@example.com", "pw").await.unwrap();
        assert_eq!(body["user"]["username"], "bob");

        let requests = transport.requests();
        assert_eq!(requests[0].endpoint, "/auth/register");
        assert_eq!(
            requests[0].body,
            Some(json!({"username": "bob", "email": "bob@example.com", "password": "pw"}))
        );
        assert_eq!(api.session().access_token(), Some("A1"));
        assert_eq!(api.stored_user().map(|u| u.username), Some("alice".to_string()));
    }

    #[tokio::test]
    async fn test_http_error_messages() {
        let transport = Arc::new(MockTransport::scripted(vec![
            Reply::Json(404, json!({"error": "Movie not found"})),
            Reply::Raw(500, "Internal Server Error"),
            Reply::NetworkError("connection refused"),
        ]));
        let store = Arc::new(MemoryStore::new());
        let api = client(&transport, &store);

        let err = api.movie(42).await.unwrap_err();
        assert_eq!(err.to_string(), "Movie not found");
        assert_eq!(err.status(), Some(404));

        let err = api.movie(42).await.unwrap_err();
        assert_eq!(err.to_string(), "HTTP Error: 500");

        let err = api.movie(42).await.unwrap_err();
        assert!(matches!(err, ApiError::Network(_)));
    }

    #[tokio::test]
    async fn test_unexpected_body_is_invalid_response() {
        let transport = Arc::new(MockTransport::scripted(vec![Reply::Json(
            200,
            json!({"unexpected": true}),
        )]));
        let store = Arc::new(MemoryStore::new());
        let api = client(&transport, &store);

        let err = api.stream_url(3).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_endpoint_requests() {
        let transport = Arc::new(MockTransport::new(|req| match req.endpoint.as_str() {
            "/movies/tmdb/search" | "/movies/tmdb/trending" => {
                Reply::Json(200, json!({"results": []}))
            }
            "/stream/3/watch" => Reply::Json(
                201,
                json!({
                    "message": "Watch progress recorded",
                    "watch_entry": {"id": 1, "movie_id": 3}
                }),
            ),
            "/movies/3" if req.method == reqwest::Method::DELETE => {
                Reply::Json(200, json!({"message": "Movie deleted successfully"}))
            }
            _ => Reply::Json(200, json!({"movies": []})),
        }));
        let store = Arc::new(MemoryStore::new());
        let api = signed_in(&transport, &store);

        api.movies(2, 12).await.unwrap();
        api.search_movies("the matrix", 1, 12).await.unwrap();
        api.featured_movies(DEFAULT_PAGE, DEFAULT_PER_PAGE).await.unwrap();
        api.trending_movies(DEFAULT_TIME_WINDOW, 1).await.unwrap();
        api.record_watch(3, 600, 6960).await.unwrap();
        api.delete_movie(3).await.unwrap();

        let requests = transport.requests();

        let listing = &requests[0];
        assert_eq!(listing.method, reqwest::Method::GET);
        assert_eq!(listing.endpoint, "/movies");
        assert_eq!(listing.query_value("page"), Some("2"));
        assert_eq!(listing.query_value("per_page"), Some("12"));

        let search = &requests[1];
        assert_eq!(search.endpoint, "/movies/search");
        assert_eq!(search.query_value("q"), Some("the matrix"));

        let featured = &requests[2];
        assert_eq!(featured.endpoint, "/movies/featured");
        assert_eq!(featured.query_value("per_page"), Some("20"));

        let trending = &requests[3];
        assert_eq!(trending.query_value("time_window"), Some("week"));

        let watch = &requests[4];
        assert_eq!(watch.method, reqwest::Method::POST);
        assert_eq!(watch.body, Some(json!({"watch_time": 600, "total_duration": 6960})));

        assert_eq!(requests[5].method, reqwest::Method::DELETE);
        assert!(requests.iter().all(|r| r.authorization.as_deref() == Some("Bearer A1")));
    }

    #[tokio::test]
    async fn test_concurrent_unauthorized_share_one_refresh() {
        let refreshes = Arc::new(AtomicUsize::new(0));
        let counter = refreshes.clone();
        let transport = Arc::new(MockTransport::new(move |req| {
            match (req.endpoint.as_str(), req.authorization.as_deref()) {
                ("/auth/refresh", _) => {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Reply::Json(200, json!({"access_token": "A2"}))
                }
                (_, Some("Bearer A2")) => user_reply(),
                _ => Reply::Json(401, json!({})),
            }
        }));
        let store = Arc::new(MemoryStore::new());
        let api = signed_in(&transport, &store);

        let (first, second) = tokio::join!(api.current_user(), api.current_user());
        assert!(first.is_ok());
        assert!(second.is_ok());
        assert_eq!(refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(transport.count("/users/me"), 4);
    }

    #[tokio::test]
    async fn test_upload_attaches_token_and_reports_progress() {
        let transport = Arc::new(MockTransport::scripted(vec![Reply::Json(
            201,
            json!({
                "message": "Movie uploaded successfully",
                "movie": {"id": 9, "title": "Arrival"}
            }),
        )]));
        let store = Arc::new(MemoryStore::new());
        let api = signed_in(&transport, &store);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let form = UploadForm::new("arrival.mp4", vec![0; 16]).title("Arrival");
        let upload = Upload::new(form).on_progress(move |p| sink.lock().unwrap().push(p));

        let body = api.upload_movie(upload).await.unwrap();
        assert_eq!(body["movie"]["id"], 9);
        assert_eq!(*seen.lock().unwrap(), vec![50.0, 100.0]);

        let requests = transport.requests();
        assert_eq!(requests[0].endpoint, "/movies/upload");
        assert_eq!(requests[0].authorization.as_deref(), Some("Bearer A1"));
        assert!(requests[0].fields.contains(&("title", "Arrival".to_string())));
    }

    #[tokio::test]
    async fn test_upload_does_not_refresh_on_unauthorized() {
        let transport = Arc::new(MockTransport::scripted(vec![Reply::Json(
            401,
            json!({"error": "Token has expired"}),
        )]));
        let store = Arc::new(MemoryStore::new());
        let api = signed_in(&transport, &store);

        let upload = Upload::new(UploadForm::new("arrival.mp4", vec![0; 16]));
        let err = api.upload_movie(upload).await.unwrap_err();
        assert!(matches!(err, ApiError::UploadRejected(ref m) if m == "Token has expired"));

        // No refresh attempted and the session is left alone
        assert_eq!(transport.count("/auth/refresh"), 0);
        assert_eq!(transport.requests().len(), 1);
        assert_eq!(api.session().access_token(), Some("A1"));
    }

    #[tokio::test]
    async fn test_upload_abort() {
        let transport = Arc::new(MockTransport::scripted(vec![Reply::Hang]));
        let store = Arc::new(MemoryStore::new());
        let api = signed_in(&transport, &store);

        let (upload, mut handle) = Upload::new(UploadForm::new("a.mp4", vec![1, 2, 3])).abortable();
        let abort = async {
            tokio::task::yield_now().await;
            handle.abort();
        };
        let (result, _) = tokio::join!(api.upload_movie(upload), abort);
        assert!(matches!(result, Err(ApiError::UploadAborted)));
    }

    #[tokio::test]
    async fn test_upload_transport_failure() {
        let transport = Arc::new(MockTransport::scripted(vec![Reply::NetworkError("broken pipe")]));
        let store = Arc::new(MemoryStore::new());
        let api = client(&transport, &store);

        let err = api
            .upload_movie(Upload::new(UploadForm::new("a.mp4", vec![1])))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::UploadFailed(_)));
    }
}
