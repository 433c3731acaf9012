//! Transport seam.
//!
//! A [`Transport`] performs the actual network exchange for a generated
//! request. One transport is installed process-wide; [`crate::fetch`] reads it
//! once per call, so swapping it with [`set_global_transport`] affects every
//! later call (last writer wins) while requests already in flight keep the
//! transport they started with.
//!
//! With the `default-transport` feature the initial transport is
//! [`ReqwestTransport`]. Without it, calls fail until a transport is installed.

#[cfg(feature = "default-transport")]
mod reqwest;
#[cfg(feature = "default-transport")]
pub use self::reqwest::ReqwestTransport;

use core::{
    fmt,
    sync::atomic::{AtomicBool, Ordering},
};
use std::sync::{Arc, PoisonError, RwLock};

use async_lock::Mutex;
use futures_util::future::BoxFuture;
use http::{HeaderMap, StatusCode};
use http_kit::{Body, utils::Bytes};
use once_cell::sync::Lazy;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::{Error, Result, request::RequestInit};

/// Performs the network exchange for a generated request.
///
/// Async closures taking `(Url, RequestInit)` implement this trait, which
/// keeps test doubles short:
///
/// ```
/// use http::StatusCode;
/// use url::Url;
/// use zenschema::{RequestInit, transport::{RawResponse, set_global_transport}};
///
/// set_global_transport(|_url: Url, _init: RequestInit| async {
///     Ok::<_, zenschema::Error>(RawResponse::new(StatusCode::OK, r#"{"ok":true}"#))
/// });
/// ```
pub trait Transport: Send + Sync + 'static {
    /// Send the request and resolve to the raw response.
    fn send(&self, url: Url, init: RequestInit) -> BoxFuture<'static, Result<RawResponse>>;
}

impl<F, Fut> Transport for F
where
    F: Fn(Url, RequestInit) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<RawResponse>> + Send + 'static,
{
    fn send(&self, url: Url, init: RequestInit) -> BoxFuture<'static, Result<RawResponse>> {
        Box::pin(self(url, init))
    }
}

/// Transport installed when no default transport is compiled in.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredTransport;

impl Transport for UnconfiguredTransport {
    fn send(&self, url: Url, _init: RequestInit) -> BoxFuture<'static, Result<RawResponse>> {
        Box::pin(async move {
            Err(Error::transport(format!(
                "no transport configured for {url}; enable the `default-transport` feature or call `set_global_transport`"
            )))
        })
    }
}

static GLOBAL_TRANSPORT: Lazy<RwLock<Arc<dyn Transport>>> =
    Lazy::new(|| RwLock::new(default_transport()));

fn default_transport() -> Arc<dyn Transport> {
    #[cfg(feature = "default-transport")]
    {
        Arc::new(ReqwestTransport::new())
    }
    #[cfg(not(feature = "default-transport"))]
    {
        Arc::new(UnconfiguredTransport)
    }
}

/// Transport currently installed for the process.
#[must_use]
pub fn global_transport() -> Arc<dyn Transport> {
    GLOBAL_TRANSPORT
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Install `transport` for every later call, returning the previous one.
pub fn set_global_transport(transport: impl Transport) -> Arc<dyn Transport> {
    replace_global_transport(Arc::new(transport))
}

/// Install an already shared transport, returning the previous one.
pub fn replace_global_transport(transport: Arc<dyn Transport>) -> Arc<dyn Transport> {
    debug!("replacing global transport");
    let mut slot = GLOBAL_TRANSPORT
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    core::mem::replace(&mut *slot, transport)
}

/// Reinstall the default transport, returning the previous one.
pub fn reset_global_transport() -> Arc<dyn Transport> {
    replace_global_transport(default_transport())
}

/// How the response was obtained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ResponseType {
    /// Ordinary same-origin or non-browser response.
    #[default]
    Basic,
    /// Cross-origin response.
    Cors,
    /// Network error placeholder.
    Error,
    /// Opaque cross-origin response.
    Opaque,
    /// Opaque redirect.
    OpaqueRedirect,
}

/// Unvalidated response returned by a transport.
///
/// The body can be read once. Readers take `&self`; after the first read every
/// further read fails with [`Error::BodyUsed`].
pub struct RawResponse {
    status: StatusCode,
    status_text: String,
    headers: HeaderMap,
    url: Option<Url>,
    redirected: bool,
    kind: ResponseType,
    body: Mutex<Option<Body>>,
    used: AtomicBool,
}

impl RawResponse {
    /// Create a response with `status` and `body`.
    #[must_use]
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self::from_body(status, Body::from(body.into()))
    }

    /// Create a response around an existing (possibly streaming) body.
    #[must_use]
    pub fn from_body(status: StatusCode, body: Body) -> Self {
        Self {
            status,
            status_text: status.canonical_reason().unwrap_or_default().to_owned(),
            headers: HeaderMap::new(),
            url: None,
            redirected: false,
            kind: ResponseType::Basic,
            body: Mutex::new(Some(body)),
            used: AtomicBool::new(false),
        }
    }

    /// Convert an `http_kit` response, recording the URL it came from.
    #[must_use]
    pub fn from_http(response: http_kit::Response, url: Option<Url>) -> Self {
        let (parts, body) = response.into_parts();
        Self::from_body(parts.status, body)
            .with_headers(parts.headers)
            .with_url(url)
    }

    /// Replace the headers.
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Replace the status text.
    #[must_use]
    pub fn with_status_text(mut self, status_text: impl Into<String>) -> Self {
        self.status_text = status_text.into();
        self
    }

    /// Set the final URL.
    #[must_use]
    pub fn with_url(mut self, url: Option<Url>) -> Self {
        self.url = url;
        self
    }

    /// Mark whether the response went through redirects.
    #[must_use]
    pub const fn with_redirected(mut self, redirected: bool) -> Self {
        self.redirected = redirected;
        self
    }

    /// Set the response type.
    #[must_use]
    pub const fn with_type(mut self, kind: ResponseType) -> Self {
        self.kind = kind;
        self
    }

    /// Status code.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Reason phrase.
    #[must_use]
    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    /// Whether the status is in `200..=299`.
    #[must_use]
    pub fn ok(&self) -> bool {
        self.status.is_success()
    }

    /// Response headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Final URL, if the transport reported one.
    #[must_use]
    pub const fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    /// Whether redirects were followed.
    #[must_use]
    pub const fn redirected(&self) -> bool {
        self.redirected
    }

    /// Response type.
    #[must_use]
    pub const fn response_type(&self) -> ResponseType {
        self.kind
    }

    /// Whether the body has been taken.
    #[must_use]
    pub fn body_used(&self) -> bool {
        self.used.load(Ordering::Acquire)
    }

    /// Take the body stream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BodyUsed`] if the body was already taken.
    pub async fn take_body(&self) -> Result<Body> {
        let body = self.body.lock().await.take().ok_or(Error::BodyUsed)?;
        self.used.store(true, Ordering::Release);
        Ok(body)
    }

    /// Read the whole body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BodyUsed`] on a second read, or [`Error::Body`] when reading fails.
    pub async fn bytes(&self) -> Result<Bytes> {
        Ok(self.take_body().await?.into_bytes().await?)
    }

    /// Read the body as UTF-8 text, replacing invalid sequences.
    ///
    /// # Errors
    ///
    /// Same as [`RawResponse::bytes`].
    pub async fn text(&self) -> Result<String> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Read and decode the body as JSON.
    ///
    /// # Errors
    ///
    /// Same as [`RawResponse::bytes`], plus [`Error::Json`] for malformed JSON.
    pub async fn json(&self) -> Result<Value> {
        let bytes = self.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Clone the response, buffering the body so both copies can read it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BodyUsed`] if the body was already taken.
    pub async fn try_clone(&self) -> Result<Self> {
        let mut slot = self.body.lock().await;
        let body = slot.take().ok_or(Error::BodyUsed)?;
        let bytes = match body.into_bytes().await {
            Ok(bytes) => bytes,
            Err(err) => {
                // The stream is gone either way; leave this response consumed.
                self.used.store(true, Ordering::Release);
                return Err(err.into());
            }
        };
        *slot = Some(Body::from(bytes.clone()));
        drop(slot);

        Ok(Self {
            status: self.status,
            status_text: self.status_text.clone(),
            headers: self.headers.clone(),
            url: self.url.clone(),
            redirected: self.redirected,
            kind: self.kind,
            body: Mutex::new(Some(Body::from(bytes))),
            used: AtomicBool::new(false),
        })
    }
}

impl fmt::Debug for RawResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("url", &self.url)
            .field("redirected", &self.redirected)
            .field("type", &self.kind)
            .field("body_used", &self.body_used())
            .finish_non_exhaustive()
    }
}
