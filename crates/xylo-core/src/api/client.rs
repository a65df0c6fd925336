use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::error::{ApiError, ApiErrorKind, ApiResult, classify_reqwest_error};
use super::identity::Credentials;
use super::{
    AddSource, AddedFile, ChatReply, FileItem, SaveWidgetResponse, SavedWidget, TokenResponse,
};
use crate::config::Config;

#[derive(Serialize)]
struct ChatRequest<'a> {
    query: &'a str,
    file_id: &'a str,
}

#[derive(Serialize)]
struct ConnectRequest<'a> {
    url: &'a str,
}

#[derive(Serialize)]
struct RegisterRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct SaveWidgetRequest<'a> {
    title: &'a str,
    vis_type: &'a str,
    payload: &'a Value,
}

/// HTTP client for the analytics backend.
///
/// Every request carries the identity resolved from [`Credentials`] plus the
/// configured extra headers.
#[derive(Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    headers: BTreeMap<String, String>,
    credentials: Arc<Credentials>,
    chat_timeout: Option<Duration>,
}

impl ApiClient {
    /// Creates a client for `base_url` with no timeouts and no extra headers.
    pub fn new(base_url: impl Into<String>, credentials: Arc<Credentials>) -> ApiResult<Self> {
        Self::build(base_url.into(), credentials, None, None, BTreeMap::new())
    }

    /// Creates a client from configuration (base URL, timeouts, headers).
    pub fn from_config(config: &Config, credentials: Arc<Credentials>) -> anyhow::Result<Self> {
        let base_url = config.effective_base_url()?;
        Ok(Self::build(
            base_url,
            credentials,
            config.request_timeout(),
            config.chat_timeout(),
            config.headers.clone(),
        )?)
    }

    fn build(
        base_url: String,
        credentials: Arc<Credentials>,
        request_timeout: Option<Duration>,
        chat_timeout: Option<Duration>,
        headers: BTreeMap<String, String>,
    ) -> ApiResult<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(|e| {
            ApiError::new(
                ApiErrorKind::Transport,
                format!("Failed to build HTTP client: {e}"),
            )
        })?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            headers,
            credentials,
            chat_timeout,
        })
    }

    /// Overrides the per-question chat deadline.
    #[must_use]
    pub fn with_chat_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.chat_timeout = timeout;
        self
    }

    // ------------------------------------------------------------------
    // Account
    // ------------------------------------------------------------------

    /// `POST /token` (form-encoded). Returns the access token.
    pub async fn login(&self, username: &str, password: &str) -> ApiResult<String> {
        let request = self
            .anonymous(Method::POST, "/token")
            .form(&[("username", username), ("password", password)]);
        let response: TokenResponse = self.send_json(request).await?;
        tracing::info!(username, "logged in");
        Ok(response.access_token)
    }

    /// `POST /register` (JSON). Returns the access token.
    pub async fn register(&self, email: &str, password: &str) -> ApiResult<String> {
        let request = self
            .anonymous(Method::POST, "/register")
            .json(&RegisterRequest { email, password });
        let response: TokenResponse = self.send_json(request).await?;
        tracing::info!(email, "registered");
        Ok(response.access_token)
    }

    // ------------------------------------------------------------------
    // Files
    // ------------------------------------------------------------------

    /// `GET /files`.
    pub async fn list_files(&self) -> ApiResult<Vec<FileItem>> {
        let files: Vec<FileItem> = self.send_json(self.request(Method::GET, "/files")).await?;
        tracing::debug!(count = files.len(), "listed files");
        Ok(files)
    }

    /// Uploads a local file or links a remote one.
    pub async fn add(&self, source: &AddSource) -> ApiResult<AddedFile> {
        match source {
            AddSource::Upload { path } => self.upload(path).await,
            AddSource::Url { url } => self.connect_url(url).await,
        }
    }

    /// `POST /upload` with multipart field `file`.
    pub async fn upload(&self, path: &std::path::Path) -> ApiResult<AddedFile> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ApiError::io(format!("Failed to read {}: {e}", path.display())))?;
        let file_name = path
            .file_name()
            .map_or_else(|| "upload".to_string(), |n| n.to_string_lossy().into_owned());

        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name);
        let form = reqwest::multipart::Form::new().part("file", part);
        let added: AddedFile = self
            .send_json(self.request(Method::POST, "/upload").multipart(form))
            .await?;
        tracing::info!(file_id = %added.file_id, "uploaded file");
        Ok(added)
    }

    /// `POST /connect_url`.
    pub async fn connect_url(&self, url: &str) -> ApiResult<AddedFile> {
        let request = self
            .request(Method::POST, "/connect_url")
            .json(&ConnectRequest { url });
        let added: AddedFile = self.send_json(request).await?;
        tracing::info!(file_id = %added.file_id, "connected url");
        Ok(added)
    }

    /// `DELETE /files/{id}`. The response body is ignored.
    pub async fn delete_file(&self, id: &str) -> ApiResult<()> {
        let path = format!("/files/{id}");
        self.send_empty(self.request(Method::DELETE, &path)).await?;
        tracing::info!(file_id = id, "deleted file");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Chat
    // ------------------------------------------------------------------

    /// `POST /chat`, bounded by the chat deadline.
    pub async fn chat(&self, query: &str, file_id: &str) -> ApiResult<ChatReply> {
        let mut request = self
            .request(Method::POST, "/chat")
            .json(&ChatRequest { query, file_id });
        if let Some(timeout) = self.chat_timeout {
            request = request.timeout(timeout);
        }
        let reply: ChatReply = self.send_json(request).await?;
        tracing::info!(file_id, kind = ?reply.kind, "chat reply received");
        Ok(reply)
    }

    // ------------------------------------------------------------------
    // Saved dashboard
    // ------------------------------------------------------------------

    /// `POST /widget/save`. Returns the stored id when the backend reports one.
    pub async fn save_widget(
        &self,
        title: &str,
        vis_type: &str,
        payload: &Value,
    ) -> ApiResult<Option<String>> {
        let request = self
            .request(Method::POST, "/widget/save")
            .json(&SaveWidgetRequest {
                title,
                vis_type,
                payload,
            });
        let response: SaveWidgetResponse = self.send_json(request).await?;
        tracing::info!(title, id = ?response.id, "widget saved");
        Ok(response.id)
    }

    /// `GET /dashboard`.
    pub async fn dashboard(&self) -> ApiResult<Vec<SavedWidget>> {
        self.send_json(self.request(Method::GET, "/dashboard")).await
    }

    // ------------------------------------------------------------------
    // Plumbing
    // ------------------------------------------------------------------

    /// A request with extra headers but no identity (login/register).
    fn anonymous(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.headers
            .iter()
            .fold(self.http.request(method, url), |req, (name, value)| {
                req.header(name.as_str(), value.as_str())
            })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let (name, value) = self.credentials.identity().header();
        self.anonymous(method, path).header(name, value)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> ApiResult<T> {
        let response = request
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::http_status(status.as_u16(), &body));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError {
            details: Some(String::from_utf8_lossy(&bytes).into_owned()),
            ..ApiError::parse(format!("Unexpected response shape: {e}"))
        })
    }

    async fn send_empty(&self, request: RequestBuilder) -> ApiResult<()> {
        let response = request
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::http_status(status.as_u16(), &body));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::tempdir;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::config::IdentityMode;
    use crate::session::SessionStore;
    use crate::store::TokenStore;

    fn session_client(server: &MockServer) -> ApiClient {
        let creds = Credentials::session_only(SessionStore::detached());
        ApiClient::new(server.uri(), Arc::new(creds)).unwrap()
    }

    #[tokio::test]
    async fn test_list_files_sends_session_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files"))
            .and(header("X-Session-ID", "server-side-render"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "1", "filename": "a.csv", "source": "upload"}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let files = session_client(&server).list_files().await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].filename, "a.csv");
    }

    #[tokio::test]
    async fn test_bearer_identity_and_extra_header() {
        let dir = tempdir().unwrap();
        let tokens = TokenStore::open(dir.path().join("access_token"));
        tokens.set("tok-9").unwrap();
        let creds = Credentials::new(
            SessionStore::open(dir.path().join("session_id")),
            Some(tokens),
            IdentityMode::Auto,
        );

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/dashboard"))
            .and(header("Authorization", "Bearer tok-9"))
            .and(header("ngrok-skip-browser-warning", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let mut config = Config {
            base_url_override: Some(server.uri()),
            ..Config::default()
        };
        config
            .headers
            .insert("ngrok-skip-browser-warning".into(), "true".into());
        let client = ApiClient::from_config(&config, Arc::new(creds)).unwrap();
        assert!(client.dashboard().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_chat_posts_query_and_file_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat"))
            .and(body_json(json!({"query": "total sales?", "file_id": "7"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"type": "text", "payload": "42"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let reply = session_client(&server).chat("total sales?", "7").await.unwrap();
        assert_eq!(reply.kind.as_deref(), Some("text"));
        assert_eq!(reply.payload, json!("42"));
    }

    #[tokio::test]
    async fn test_http_error_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/files/9"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"detail": "File not found"})),
            )
            .mount(&server)
            .await;

        let err = session_client(&server).delete_file("9").await.unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::HttpStatus);
        assert_eq!(err.status, Some(404));
        assert!(err.message.contains("File not found"));
    }

    #[tokio::test]
    async fn test_unexpected_body_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>tunnel</html>"))
            .mount(&server)
            .await;

        let err = session_client(&server).list_files().await.unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::Parse);
        assert_eq!(err.details.as_deref(), Some("<html>tunnel</html>"));
    }

    #[tokio::test]
    async fn test_chat_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"type": "text", "payload": "late"}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let client = session_client(&server).with_chat_timeout(Some(Duration::from_millis(50)));
        let err = client.chat("q", "1").await.unwrap_err();
        assert!(err.is_timeout(), "unexpected error: {err:?}");
    }

    #[tokio::test]
    async fn test_upload_sends_multipart_file() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("sales.csv");
        std::fs::write(&file, "month,revenue\nJan,100\n").unwrap();

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"file_id": "11", "filename": "sales.csv"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let added = session_client(&server)
            .add(&AddSource::Upload { path: file })
            .await
            .unwrap();
        assert_eq!(added.file_id, "11");

        let requests = server.received_requests().await.unwrap();
        let body = String::from_utf8_lossy(&requests[0].body);
        assert!(body.contains("name=\"file\""));
        assert!(body.contains("filename=\"sales.csv\""));
        assert!(body.contains("Jan,100"));
    }

    #[tokio::test]
    async fn test_upload_missing_file_is_io_error() {
        let server = MockServer::start().await;
        let err = session_client(&server)
            .upload(std::path::Path::new("/definitely/not/here.csv"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::Io);
    }

    #[tokio::test]
    async fn test_login_uses_form_without_identity() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({"access_token": "abc", "token_type": "bearer"}),
            ))
            .expect(1)
            .mount(&server)
            .await;

        let token = session_client(&server).login("ada", "pw").await.unwrap();
        assert_eq!(token, "abc");

        let requests = server.received_requests().await.unwrap();
        assert!(!requests[0].headers.contains_key("x-session-id"));
        assert_eq!(
            String::from_utf8_lossy(&requests[0].body),
            "username=ada&password=pw"
        );
    }
}
