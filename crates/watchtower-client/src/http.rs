//! HTTP access to the dashboard REST API.
//!
//! # Purpose
//! One [`ApiClient`] is built per process and shared by the log and facet
//! caches. It attaches the bearer credential, applies the request timeout,
//! and maps every failure onto [`FetchError`].
//!
//! # Auth interception
//! Session failures are reported to an [`AuthObserver`] registered when the
//! client is built. The observer sees every 401/403/422 response from any
//! endpoint; nothing patches a shared global.
use anyhow::{Context, Result};
use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::AUTHORIZATION;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{FetchError, FetchResult};

/// Source of the bearer credential; consulted on every request.
pub trait CredentialProvider: Send + Sync {
    fn bearer_token(&self) -> Option<String>;
}

/// Fixed credential, or none.
#[derive(Clone, Default)]
pub struct StaticCredential(Option<String>);

impl StaticCredential {
    pub fn new(token: Option<String>) -> Self {
        Self(token.filter(|token| !token.is_empty()))
    }
}

impl fmt::Debug for StaticCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print the token itself.
        f.debug_tuple("StaticCredential")
            .field(&self.0.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl CredentialProvider for StaticCredential {
    fn bearer_token(&self) -> Option<String> {
        self.0.clone()
    }
}

impl<F> CredentialProvider for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn bearer_token(&self) -> Option<String> {
        self()
    }
}

/// Notified whenever the server rejects a request as unauthenticated.
pub trait AuthObserver: Send + Sync {
    fn on_auth_failure(&self, status: u16, path: &str);
}

impl<F> AuthObserver for F
where
    F: Fn(u16, &str) + Send + Sync,
{
    fn on_auth_failure(&self, status: u16, path: &str) {
        self(status, path)
    }
}

/// Statuses the server uses for missing, expired or invalid sessions.
pub fn is_auth_failure(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::UNPROCESSABLE_ENTITY
    )
}

#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    base_url: String,
    http: reqwest::Client,
    credentials: Arc<dyn CredentialProvider>,
    auth_observer: Option<Arc<dyn AuthObserver>>,
}

pub struct ApiClientBuilder {
    config: ClientConfig,
    credentials: Option<Arc<dyn CredentialProvider>>,
    auth_observer: Option<Arc<dyn AuthObserver>>,
}

impl ApiClientBuilder {
    pub fn credentials(mut self, credentials: impl CredentialProvider + 'static) -> Self {
        self.credentials = Some(Arc::new(credentials));
        self
    }

    pub fn auth_observer(mut self, observer: impl AuthObserver + 'static) -> Self {
        self.auth_observer = Some(Arc::new(observer));
        self
    }

    pub fn build(self) -> Result<ApiClient> {
        let http = reqwest::Client::builder()
            .timeout(self.config.request_timeout())
            .build()
            .context("build http client")?;
        let credentials = self.credentials.unwrap_or_else(|| {
            Arc::new(StaticCredential::new(self.config.bearer_token.clone()))
        });
        Ok(ApiClient {
            inner: Arc::new(ApiClientInner {
                base_url: self.config.base_url.trim_end_matches('/').to_string(),
                http,
                credentials,
                auth_observer: self.auth_observer,
            }),
        })
    }
}

impl ApiClient {
    pub fn builder(config: &ClientConfig) -> ApiClientBuilder {
        ApiClientBuilder {
            config: config.clone(),
            credentials: None,
            auth_observer: None,
        }
    }

    pub fn new(config: &ClientConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Issues one GET and returns the raw body of a 2xx response.
    pub async fn get(&self, path: &str, params: &[(&str, String)]) -> FetchResult<Bytes> {
        let url = format!("{}{}", self.inner.base_url, path);
        let mut request = self.inner.http.get(&url).query(params);
        // A missing credential is not an error here; the server answers 401.
        if let Some(token) = self.inner.credentials.bearer_token() {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        let started = Instant::now();
        let response = request.send().await.map_err(|err| {
            warn!(path, error = %err, "request failed");
            t_counter!("watchtower_client_fetch_errors_total", "kind" => "transport").increment(1);
            FetchError::from(err)
        })?;
        let status = response.status();
        debug!(path, status = status.as_u16(), "response received");

        if is_auth_failure(status) {
            if let Some(observer) = &self.inner.auth_observer {
                observer.on_auth_failure(status.as_u16(), path);
            }
            t_counter!("watchtower_client_fetch_errors_total", "kind" => "auth").increment(1);
            return Err(FetchError::Unauthorized {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            t_counter!("watchtower_client_fetch_errors_total", "kind" => "status").increment(1);
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(FetchError::from)?;
        t_histogram!("watchtower_client_fetch_seconds").record(started.elapsed().as_secs_f64());
        Ok(body)
    }
}
