//! Authenticated transport for the GitFlic REST API.
//!
//! Every call goes through the same steps:
//!
//! 1. the cookie warmup gate is passed (cloud host only),
//! 2. one HTTP round-trip is made with JSON headers and the `token` scheme,
//! 3. error statuses are translated into [`GfError`] sentinels, with plain
//!    403s classified by probing `/user/me`,
//! 4. network failures and anti-bot blocks are retried by [`RetryPolicy`].

use std::fmt;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use futures::StreamExt;
use log::{debug, warn};
use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION, CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::cookies::{ResettableJar, WarmupGate};
use super::request::ApiRequest;
use super::retry::RetryPolicy;
use crate::auth::Token;
use crate::error::{GfError, Result};

/// Host of the hosted service; only it sits behind the anti-bot intermediary.
pub const CLOUD_HOST: &str = "gitflic.ru";

/// Marker the intermediary puts in the body of its 403 responses.
const ANTI_BOT_SIGNATURE: &str = "AuthenticationException";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

const CLI_USER_AGENT: &str = concat!("gf/", env!("CARGO_PKG_VERSION"));

const REQUEST_ID_HEADER: &str = "x-request-id";

/// API base URL for a configured host.
pub fn api_base_url(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host == CLOUD_HOST || host == format!("api.{CLOUD_HOST}") {
        format!("https://api.{CLOUD_HOST}")
    } else {
        format!("https://{host}/rest-api")
    }
}

/// Whether calls to `host` need anti-bot cookies first.
pub fn is_cloud_host(host: &str) -> bool {
    host.contains(CLOUD_HOST)
}

/// Main site for an API base, used for cookie warmup. `None` off the cloud host.
pub fn main_site_url(api_base: &Url) -> Option<Url> {
    let host = api_base.host_str()?;
    if !is_cloud_host(host) {
        return None;
    }
    let site = host.strip_prefix("api.").unwrap_or(host);
    Url::parse(&format!("{}://{site}/", api_base.scheme())).ok()
}

pub struct ClientBuilder {
    base_url: String,
    token: Option<Token>,
    user_agent: Option<String>,
    warmup_url: Option<Url>,
    retry: RetryPolicy,
    timeout: Duration,
}

impl ClientBuilder {
    pub fn token(mut self, token: Option<Token>) -> Self {
        self.token = token;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Primes cookies from `url` before the first call, whatever the host.
    pub fn warmup_url(mut self, url: Url) -> Self {
        self.warmup_url = Some(url);
        self
    }

    #[cfg(test)]
    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[cfg(test)]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<Client> {
        Url::parse(&self.base_url)
            .map_err(|e| GfError::Config(format!("Invalid API base URL {}: {e}", self.base_url)))?;

        let user_agent = self
            .user_agent
            .unwrap_or_else(|| CLI_USER_AGENT.to_string());

        let jar = Arc::new(ResettableJar::default());
        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .cookie_provider(Arc::clone(&jar))
            .build()
            .map_err(|e| GfError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Client {
            http,
            base: self.base_url.trim_end_matches('/').to_string(),
            token: RwLock::new(self.token),
            jar,
            gate: WarmupGate::default(),
            warmup_url: self.warmup_url,
            retry: self.retry,
            timeout: self.timeout,
        })
    }
}

/// GitFlic API client.
///
/// Safe to share between tasks; warmup happens at most once per client no
/// matter how many calls race for it.
pub struct Client {
    http: reqwest::Client,
    base: String,
    token: RwLock<Option<Token>>,
    jar: Arc<ResettableJar>,
    gate: WarmupGate,
    warmup_url: Option<Url>,
    retry: RetryPolicy,
    timeout: Duration,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("base", &self.base)
            .field("has_token", &self.has_token())
            .field("warmup_url", &self.warmup_url)
            .field("cookies_ready", &self.cookies_ready())
            .finish()
    }
}

/// Streaming body of a file download.
pub struct Download {
    pub file_name: Option<String>,
    response: Response,
}

impl fmt::Debug for Download {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Download")
            .field("file_name", &self.file_name)
            .field("content_length", &self.content_length())
            .finish()
    }
}

impl Download {
    pub fn content_length(&self) -> Option<u64> {
        self.response.content_length()
    }

    /// Copies the body into `writer`, reporting bytes written so far to `progress`.
    pub async fn write_to<W>(
        self,
        cancel: &CancellationToken,
        writer: &mut W,
        progress: impl Fn(u64),
    ) -> Result<u64>
    where
        W: AsyncWrite + Unpin,
    {
        let mut stream = self.response.bytes_stream();
        let mut written = 0u64;
        loop {
            let chunk = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(GfError::Cancelled),
                chunk = stream.next() => chunk,
            };
            let Some(chunk) = chunk else { break };
            let chunk = chunk?;
            writer.write_all(&chunk).await?;
            written += chunk.len() as u64;
            progress(written);
        }
        writer.flush().await?;
        Ok(written)
    }
}

impl Client {
    /// Builder with the CLI user-agent and no cookie warmup.
    pub fn builder(base_url: impl Into<String>) -> ClientBuilder {
        ClientBuilder {
            base_url: base_url.into(),
            token: None,
            user_agent: None,
            warmup_url: None,
            retry: RetryPolicy::default(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Client for a configured host name. The cloud host gets the browser
    /// user-agent and warms up from its main site.
    pub fn from_host(host: &str, token: Option<Token>) -> Result<Self> {
        let base_url = api_base_url(host);
        let site = Url::parse(&base_url).ok().and_then(|url| main_site_url(&url));
        let mut builder = Self::builder(base_url).token(token);
        if let Some(site) = site {
            builder = builder.user_agent(BROWSER_USER_AGENT).warmup_url(site);
        }
        builder.build()
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    pub fn has_token(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Replaces the bearer token for subsequent calls.
    pub fn set_token(&self, token: Option<Token>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = token;
    }

    pub fn cookies_ready(&self) -> bool {
        self.warmup_url.is_none() || self.gate.is_ready()
    }

    /// Primes anti-bot cookies once. Failures are logged and otherwise ignored;
    /// a cancelled warmup leaves the gate armed.
    pub async fn ensure_ready(&self, cancel: &CancellationToken) {
        let Some(url) = self.warmup_url.as_ref() else {
            return;
        };

        self.gate
            .ensure(|| async {
                debug!("Priming cookies from {url}");
                let request = self.http.get(url.clone()).timeout(self.timeout).send();
                let result = tokio::select! {
                    _ = cancel.cancelled() => return false,
                    result = request => result,
                };
                match result {
                    Ok(response) => debug!("Cookie warmup answered {}", response.status()),
                    Err(e) => debug!("Cookie warmup failed: {e}"),
                }
                true
            })
            .await;
    }

    /// Drops all cookies; the next call warms up again.
    pub async fn reset_cookies(&self) {
        self.gate.reset(&self.jar).await;
    }

    /// Performs `req` with retries and decodes the body.
    ///
    /// Returns `None` for `204 No Content` and empty bodies.
    pub async fn execute<T: DeserializeOwned>(
        &self,
        cancel: &CancellationToken,
        req: &ApiRequest,
    ) -> Result<Option<T>> {
        let (status, body) = self.execute_raw(cancel, req).await?;
        decode_body(status, &body)
    }

    /// Like [`execute`](Self::execute) but leaves `target` untouched when there is no body.
    pub async fn execute_into<T: DeserializeOwned>(
        &self,
        cancel: &CancellationToken,
        req: &ApiRequest,
        target: &mut T,
    ) -> Result<()> {
        if let Some(value) = self.execute(cancel, req).await? {
            *target = value;
        }
        Ok(())
    }

    /// Performs `req` and requires a JSON body.
    pub async fn json<T: DeserializeOwned>(
        &self,
        cancel: &CancellationToken,
        req: &ApiRequest,
    ) -> Result<T> {
        self.execute(cancel, req).await?.ok_or(GfError::EmptyBody)
    }

    /// Performs `req`, ignoring whatever body comes back.
    pub async fn send(&self, cancel: &CancellationToken, req: &ApiRequest) -> Result<()> {
        self.execute_raw(cancel, req).await.map(|_| ())
    }

    pub async fn execute_raw(
        &self,
        cancel: &CancellationToken,
        req: &ApiRequest,
    ) -> Result<(StatusCode, Vec<u8>)> {
        self.retry
            .run(cancel, |attempt| async move {
                if attempt > 0 {
                    debug!("Attempt {} for {} {}", attempt + 1, req.method, req.path);
                }
                let result = self.send_once(cancel, req).await;
                self.diagnose(cancel, req.diagnose, result).await
            })
            .await
    }

    /// Uploads one file as a multipart form field.
    ///
    /// Not retried: the body stream is consumed by the first attempt.
    pub async fn upload<R>(
        &self,
        cancel: &CancellationToken,
        path: &str,
        field: &str,
        file_name: &str,
        reader: R,
    ) -> Result<Option<Value>>
    where
        R: AsyncRead + Send + Sync + 'static,
    {
        self.ensure_ready(cancel).await;

        let url = self.url(path, &[])?;
        let part = Part::stream(reqwest::Body::wrap_stream(ReaderStream::new(reader)))
            .file_name(file_name.to_string());
        let form = Form::new().part(field.to_string(), part);

        debug!("POST {url} (multipart field {field}, file {file_name})");
        let builder = self
            .http
            .post(url)
            .header(ACCEPT, "application/json")
            .multipart(form);

        let result = match self.dispatch(cancel, self.authorize(builder)).await {
            Ok(response) => self.read_response(cancel, response).await,
            Err(e) => Err(e),
        };
        let (status, body) = self.diagnose(cancel, true, result).await?;
        decode_body(status, &body)
    }

    /// Starts a download. Only obtaining the response is retried; the body is
    /// streamed by the caller without a per-request deadline.
    pub async fn download(&self, cancel: &CancellationToken, req: &ApiRequest) -> Result<Download> {
        self.retry
            .run(cancel, |_| async move {
                self.ensure_ready(cancel).await;
                let url = self.url(&req.path, &req.query)?;
                debug!("{} {url} (download)", req.method);
                let builder = self.http.request(req.method.to_reqwest(), url);
                let response = self.dispatch(cancel, self.authorize(builder)).await?;

                if response.status().as_u16() >= 400 {
                    let result = self.read_response(cancel, response).await.map(|_| ());
                    let result = self.diagnose(cancel, req.diagnose, result).await;
                    return Err(result.err().unwrap_or(GfError::EmptyBody));
                }

                let file_name = response
                    .headers()
                    .get(CONTENT_DISPOSITION)
                    .and_then(|v| v.to_str().ok())
                    .and_then(file_name_from_disposition);
                Ok(Download { file_name, response })
            })
            .await
    }

    fn url(&self, path: &str, query: &[(String, String)]) -> Result<Url> {
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
        let mut url = Url::parse(&format!("{}{path}", self.base))
            .map_err(|e| GfError::InvalidInput(format!("invalid request path {path}: {e}")))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        let token = self.token.read().unwrap_or_else(PoisonError::into_inner);
        match token.as_ref() {
            Some(token) => builder.header(AUTHORIZATION, token.header_value()),
            None => builder,
        }
    }

    async fn dispatch(&self, cancel: &CancellationToken, builder: RequestBuilder) -> Result<Response> {
        tokio::select! {
            _ = cancel.cancelled() => Err(GfError::Cancelled),
            response = builder.send() => Ok(response?),
        }
    }

    /// One round-trip with status translation but without 403 diagnosis.
    async fn send_once(
        &self,
        cancel: &CancellationToken,
        req: &ApiRequest,
    ) -> Result<(StatusCode, Vec<u8>)> {
        self.ensure_ready(cancel).await;

        let url = self.url(&req.path, &req.query)?;
        let mut builder = self
            .http
            .request(req.method.to_reqwest(), url.clone())
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .timeout(self.timeout);
        if let Some(body) = &req.body {
            builder = builder.body(serde_json::to_vec(body)?);
        }

        debug!("{} {url}", req.method);
        let response = self.dispatch(cancel, self.authorize(builder)).await?;
        self.read_response(cancel, response).await
    }

    async fn read_response(
        &self,
        cancel: &CancellationToken,
        response: Response,
    ) -> Result<(StatusCode, Vec<u8>)> {
        let status = response.status();
        let request_id = request_id(response.headers());
        debug!("{} {} -> {status}", response.url().path(), request_id.as_deref().unwrap_or("-"));

        let body = tokio::select! {
            _ = cancel.cancelled() => return Err(GfError::Cancelled),
            body = response.bytes() => body?.to_vec(),
        };

        if status.as_u16() < 400 {
            return Ok((status, body));
        }

        Err(self.triage(status, request_id, &body).await)
    }

    async fn triage(&self, status: StatusCode, request_id: Option<String>, body: &[u8]) -> GfError {
        match status.as_u16() {
            401 => GfError::Unauthorized,
            403 if String::from_utf8_lossy(body).contains(ANTI_BOT_SIGNATURE) => {
                warn!("Request blocked by anti-bot protection, resetting cookies");
                self.reset_cookies().await;
                GfError::AntiBotBlock
            }
            403 => GfError::Forbidden,
            404 => GfError::NotFound,
            405 => GfError::MethodNotAllowed,
            code => GfError::Api {
                status: code,
                message: error_message(body),
                request_id,
            },
        }
    }

    /// Splits a plain 403 into permission denied or a dead token.
    ///
    /// The probe goes through [`send_once`](Self::send_once), which never
    /// diagnoses, so a 403 from `/user/me` cannot trigger another probe.
    async fn diagnose<T>(&self, cancel: &CancellationToken, enabled: bool, result: Result<T>) -> Result<T> {
        match result {
            Err(GfError::Forbidden) if enabled => {}
            other => return other,
        }

        let probe = ApiRequest::get("/user/me").without_diagnosis();
        let verdict = match self.send_once(cancel, &probe).await {
            Ok(_) => GfError::Forbidden,
            Err(e) if e.is_unauthorized() || e.is_forbidden() => GfError::TokenInvalid,
            Err(GfError::Cancelled) => GfError::Cancelled,
            Err(e) => {
                debug!("Token check after 403 was inconclusive: {e}");
                GfError::Forbidden
            }
        };
        debug!("403 diagnosed as {verdict:?}");
        Err(verdict)
    }
}

fn decode_body<T: DeserializeOwned>(status: StatusCode, body: &[u8]) -> Result<Option<T>> {
    if status == StatusCode::NO_CONTENT || body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    Ok(Some(serde_json::from_slice(body)?))
}

fn request_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// `message` or `error` from a JSON error body.
fn error_message(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    ["message", "error"]
        .iter()
        .find_map(|key| value.get(key).and_then(Value::as_str))
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

/// File name announced by a `Content-Disposition` header, reduced to its basename.
pub fn file_name_from_disposition(header: &str) -> Option<String> {
    let mut plain = None;
    for param in header.split(';').map(str::trim) {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"');
        match key.trim().to_ascii_lowercase().as_str() {
            "filename*" => {
                let encoded = value.rsplit("''").next().unwrap_or(value);
                if let Ok(decoded) = urlencoding::decode(encoded) {
                    return safe_file_name(&decoded);
                }
            }
            "filename" => plain = safe_file_name(value),
            _ => {}
        }
    }
    plain
}

/// Last path component of `name`, rejecting empty and dot names.
pub fn safe_file_name(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name).trim();
    if base.is_empty() || base == "." || base == ".." {
        return None;
    }
    Path::new(base)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
}
