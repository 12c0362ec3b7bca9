//! OtherLink HTTP client adapter
//!
//! Every call gets the stored bearer token (when one is bound), a JSON
//! content type unless it is a multipart upload, and a hard per-call
//! deadline covering both the request and the body read.

pub mod error;

use error::ClientError;
use otherlink_core::{ApiConfig, StorageKey, TokenStore};
use reqwest::{Client, ClientBuilder, Method, RequestBuilder, StatusCode, header};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const USER_AGENT: &str = concat!("otherlink-client/", env!("CARGO_PKG_VERSION"));

/// Raw response captured inside the deadline
struct RawResponse {
    status: StatusCode,
    path: String,
    is_json: bool,
    bytes: Vec<u8>,
}

/// OtherLink API client
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    timeout: Duration,
    store: Option<Arc<dyn TokenStore>>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("has_store", &self.store.is_some())
            .finish()
    }
}

impl ApiClient {
    /// Create a new client with default configuration
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::builder().base_url(base_url).build()
    }

    /// Create a client from the `api` configuration section
    pub fn from_config(config: &ApiConfig) -> Result<Self, ClientError> {
        Self::builder()
            .base_url(config.base_url.clone())
            .timeout(config.timeout())
            .build()
    }

    /// Create a new client builder
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Same client reading its bearer token from `store`
    pub fn with_token_store(&self, store: Arc<dyn TokenStore>) -> Self {
        Self {
            store: Some(store),
            ..self.clone()
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn stored_token(&self) -> Option<String> {
        self.store
            .as_ref()
            .and_then(|store| store.get(StorageKey::AccessToken))
            .filter(|token| !token.is_empty())
    }

    /// Create a JSON request builder carrying the stored access token
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut request = self
            .client
            .request(method, self.url(path))
            .header(header::CONTENT_TYPE, "application/json");

        if let Some(token) = self.stored_token() {
            request = request.bearer_auth(token);
        }

        request
    }

    /// Create a JSON request builder with an explicit bearer token
    pub fn request_with_token(&self, method: Method, path: &str, token: &str) -> RequestBuilder {
        self.client
            .request(method, self.url(path))
            .header(header::CONTENT_TYPE, "application/json")
            .bearer_auth(token)
    }

    /// Create a request without a JSON content type, for multipart bodies
    pub fn multipart_request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut request = self.client.request(method, self.url(path));
        if let Some(token) = self.stored_token() {
            request = request.bearer_auth(token);
        }
        request
    }

    /// Execute a request and normalize the response to JSON
    ///
    /// A 2xx response without a JSON content type (or with an empty body)
    /// yields `Value::Null`.
    pub async fn execute_json(&self, request: RequestBuilder) -> Result<Value, ClientError> {
        let raw = self
            .with_deadline(async move {
                let response = request.send().await?;
                let status = response.status();
                let path = response.url().path().to_string();
                let is_json = response
                    .headers()
                    .get(header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .is_some_and(|ct| ct.contains("application/json"));
                let bytes = response.bytes().await?.to_vec();
                Ok(RawResponse {
                    status,
                    path,
                    is_json,
                    bytes,
                })
            })
            .await?;

        debug!(path = %raw.path, status = raw.status.as_u16(), "Received response");

        if raw.status.is_success() {
            if raw.is_json && !raw.bytes.is_empty() {
                Ok(serde_json::from_slice(&raw.bytes)?)
            } else {
                Ok(Value::Null)
            }
        } else {
            let body = serde_json::from_slice(&raw.bytes).unwrap_or(Value::Null);
            Err(ClientError::from_status(raw.status, body))
        }
    }

    /// Execute a request and deserialize the response
    pub async fn execute<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ClientError> {
        let value = self.execute_json(request).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.execute(self.request(Method::GET, path)).await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.execute(self.request(Method::POST, path).json(body))
            .await
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.execute(self.request(Method::PUT, path).json(body))
            .await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.execute(self.request(Method::DELETE, path)).await
    }

    /// Send a multipart form (the browser sets the boundary header itself)
    pub async fn upload<T: DeserializeOwned>(
        &self,
        path: &str,
        form: reqwest::multipart::Form,
    ) -> Result<T, ClientError> {
        self.execute(self.multipart_request(Method::POST, path).multipart(form))
            .await
    }

    #[cfg(not(target_arch = "wasm32"))]
    async fn with_deadline<T>(
        &self,
        fut: impl Future<Output = Result<T, reqwest::Error>>,
    ) -> Result<T, ClientError> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(ClientError::from),
            Err(_) => {
                debug!(timeout_ms = self.timeout.as_millis() as u64, "Request timed out");
                Err(ClientError::Timeout(self.timeout))
            }
        }
    }

    #[cfg(target_arch = "wasm32")]
    async fn with_deadline<T>(
        &self,
        fut: impl Future<Output = Result<T, reqwest::Error>>,
    ) -> Result<T, ClientError> {
        use futures::future::{Either, select};

        let millis = u32::try_from(self.timeout.as_millis()).unwrap_or(u32::MAX);
        let timer = gloo_timers::future::TimeoutFuture::new(millis);
        futures::pin_mut!(fut);

        match select(fut, timer).await {
            Either::Left((result, _)) => result.map_err(ClientError::from),
            Either::Right(_) => Err(ClientError::Timeout(self.timeout)),
        }
    }
}

/// Builder for ApiClient
#[derive(Default)]
pub struct ApiClientBuilder {
    base_url: Option<String>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
    store: Option<Arc<dyn TokenStore>>,
}

impl ApiClientBuilder {
    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the per-call deadline
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Read the bearer token from `store` on every call
    pub fn token_store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Build the client
    pub fn build(self) -> Result<ApiClient, ClientError> {
        let base_url = self
            .base_url
            .ok_or_else(|| ClientError::Configuration("base_url is required".into()))?;

        url::Url::parse(&base_url)
            .map_err(|e| ClientError::Configuration(format!("invalid base_url: {e}")))?;

        // Ensure base_url ends without a trailing slash
        let base_url = base_url.trim_end_matches('/').to_string();

        let mut client_builder = ClientBuilder::new();

        #[cfg(not(target_arch = "wasm32"))]
        {
            client_builder = client_builder
                .user_agent(self.user_agent.unwrap_or_else(|| USER_AGENT.to_string()));
        }

        // Browsers own the User-Agent header
        #[cfg(target_arch = "wasm32")]
        let _ = (self.user_agent, USER_AGENT);

        let client = client_builder.build()?;

        Ok(ApiClient {
            client,
            base_url,
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
            store: self.store,
        })
    }
}
