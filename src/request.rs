//! Per-call request configuration and the transport-ready request it turns into.

use core::fmt;
use std::sync::Arc;

use http::{HeaderMap, Method};
use http_kit::utils::Bytes;
use serde_json::{Map, Value};
use url::Url;

use crate::{
    Error, Result,
    multipart::{Blob, FormData},
    schema::{RequestSchema, Validator},
    signal::AbortSignal,
};

/// Raw key/value input for path, search params and headers.
///
/// An entry without a value is "undefined": it is dropped before validation,
/// which is different from an explicit JSON `null`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    entries: Vec<(String, Option<Value>)>,
}

impl Params {
    /// Create an empty set of parameters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a JSON object.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RequestConfig`] when `value` is not an object.
    pub fn from_json(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(map.into()),
            other => Err(Error::config(format!(
                "expected an object of parameters, got {other}"
            ))),
        }
    }

    /// Set `key` to `value` (builder-style).
    #[must_use]
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, Some(value.into()));
        self
    }

    /// Mark `key` as undefined (builder-style).
    #[must_use]
    pub fn unset(mut self, key: impl Into<String>) -> Self {
        self.insert(key, None);
        self
    }

    /// Insert or replace an entry.
    pub fn insert(&mut self, key: impl Into<String>, value: Option<Value>) {
        let key = key.into();
        if let Some(entry) = self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            entry.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    /// Value stored for `key`; `Some(None)` means present but undefined.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Option<&Value>> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value.as_ref())
    }

    /// Iterate over entries, including undefined ones.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&Value>)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_ref()))
    }

    /// Whether there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// JSON object of every defined entry.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.entries
                .iter()
                .filter_map(|(key, value)| value.clone().map(|value| (key.clone(), value)))
                .collect(),
        )
    }
}

impl From<Map<String, Value>> for Params {
    fn from(map: Map<String, Value>) -> Self {
        Self {
            entries: map.into_iter().map(|(key, value)| (key, Some(value))).collect(),
        }
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for Params
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from(entries: [(K, V); N]) -> Self {
        entries
            .into_iter()
            .fold(Self::new(), |params, (key, value)| params.set(key, value))
    }
}

impl<K: Into<String>> FromIterator<(K, Option<Value>)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, Option<Value>)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (key, value) in iter {
            params.insert(key, value);
        }
        params
    }
}

/// One value of a request `form`.
#[derive(Debug, Clone, PartialEq)]
pub enum FormValue {
    /// Scalar value, stringified into a text part.
    Value(Value),
    /// Binary value, passed through unchanged as a file part.
    Blob(Blob),
}

impl From<Value> for FormValue {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<Blob> for FormValue {
    fn from(blob: Blob) -> Self {
        Self::Blob(blob)
    }
}

impl From<&str> for FormValue {
    fn from(text: &str) -> Self {
        Self::Value(Value::from(text))
    }
}

impl From<String> for FormValue {
    fn from(text: String) -> Self {
        Self::Value(Value::from(text))
    }
}

impl From<i64> for FormValue {
    fn from(number: i64) -> Self {
        Self::Value(Value::from(number))
    }
}

impl From<f64> for FormValue {
    fn from(number: f64) -> Self {
        Self::Value(Value::from(number))
    }
}

impl From<bool> for FormValue {
    fn from(flag: bool) -> Self {
        Self::Value(Value::from(flag))
    }
}

/// Raw form object, converted into [`FormData`] by the request generator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Form {
    entries: Vec<(String, Option<FormValue>)>,
}

impl Form {
    /// Create an empty form.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key` to `value` (builder-style).
    #[must_use]
    pub fn set(mut self, key: impl Into<String>, value: impl Into<FormValue>) -> Self {
        self.insert(key, Some(value.into()));
        self
    }

    /// Mark `key` as undefined (builder-style).
    #[must_use]
    pub fn unset(mut self, key: impl Into<String>) -> Self {
        self.insert(key, None);
        self
    }

    /// Insert or replace an entry.
    pub fn insert(&mut self, key: impl Into<String>, value: Option<FormValue>) {
        let key = key.into();
        if let Some(entry) = self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            entry.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    /// Iterate over defined entries in insertion order.
    pub fn defined(&self) -> impl Iterator<Item = (&str, &FormValue)> {
        self.entries
            .iter()
            .filter_map(|(key, value)| value.as_ref().map(|value| (key.as_str(), value)))
    }
}

/// Body handed to the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// Structured value; the transport sends it as JSON.
    Json(Value),
    /// Text, sent as is.
    Text(String),
    /// Raw bytes, sent as is.
    Bytes(Bytes),
    /// Multipart form; never JSON-serialized.
    Multipart(FormData),
}

impl RequestBody {
    /// Whether this body is a structured value rather than text, bytes or a form.
    #[must_use]
    pub const fn is_structured(&self) -> bool {
        matches!(self, Self::Json(_))
    }
}

impl From<Value> for RequestBody {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => Self::Text(text),
            other => Self::Json(other),
        }
    }
}

impl From<String> for RequestBody {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for RequestBody {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<Bytes> for RequestBody {
    fn from(bytes: Bytes) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes.into())
    }
}

impl From<FormData> for RequestBody {
    fn from(form: FormData) -> Self {
        Self::Multipart(form)
    }
}

/// Whether cookies and credentials accompany the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Credentials {
    /// Never send credentials.
    Omit,
    /// Send credentials to the same origin only.
    SameOrigin,
    /// Always send credentials.
    Include,
}

/// How the transport may use its HTTP cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheMode {
    /// Transport default.
    Default,
    /// Bypass the cache entirely.
    NoStore,
    /// Fetch from the network and refresh the cache.
    Reload,
    /// Revalidate before using a cached entry.
    NoCache,
    /// Use any cached entry, stale or not.
    ForceCache,
    /// Only use cached entries.
    OnlyIfCached,
}

/// How the transport treats redirects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RedirectMode {
    /// Follow redirects.
    Follow,
    /// Fail on redirects.
    Error,
    /// Return redirect responses as is.
    Manual,
}

/// Transport options passed through the generator untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransportOptions {
    /// Credentials policy.
    pub credentials: Option<Credentials>,
    /// Cache mode.
    pub cache: Option<CacheMode>,
    /// Redirect policy.
    pub redirect: Option<RedirectMode>,
    /// Keep the request alive past the caller.
    pub keepalive: bool,
    /// Cancellation signal.
    pub signal: Option<AbortSignal>,
}

/// Transport-ready request options produced by the generator.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestInit {
    /// HTTP method.
    pub method: Method,
    /// Final header set.
    pub headers: HeaderMap,
    /// Final body, if any.
    pub body: Option<RequestBody>,
    /// Passthrough transport options.
    pub options: TransportOptions,
}

impl Default for RequestInit {
    fn default() -> Self {
        Self {
            method: Method::GET,
            headers: HeaderMap::new(),
            body: None,
            options: TransportOptions::default(),
        }
    }
}

/// Output of the request generator.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedRequest {
    /// Final URL with path placeholders and search params applied.
    pub url: Url,
    /// Final request options.
    pub init: RequestInit,
}

/// Partial override returned by a `refine` callback.
///
/// Every field left as `None` keeps the generated value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestPatch {
    /// Replacement URL.
    pub url: Option<Url>,
    /// Replacement method.
    pub method: Option<Method>,
    /// Replacement header set.
    pub headers: Option<HeaderMap>,
    /// Replacement body; `Some(None)` removes the body.
    pub body: Option<Option<RequestBody>>,
    /// Replacement transport options.
    pub options: Option<TransportOptions>,
}

impl RequestPatch {
    /// A patch that changes nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the URL.
    #[must_use]
    pub fn url(mut self, url: Url) -> Self {
        self.url = Some(url);
        self
    }

    /// Replace the method.
    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Replace the header set.
    #[must_use]
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = Some(headers);
        self
    }

    /// Replace (or remove, with `None`) the body.
    #[must_use]
    pub fn body(mut self, body: Option<RequestBody>) -> Self {
        self.body = Some(body);
        self
    }

    /// Replace the transport options.
    #[must_use]
    pub fn options(mut self, options: TransportOptions) -> Self {
        self.options = Some(options);
        self
    }

    pub(crate) fn apply(self, generated: GeneratedRequest) -> GeneratedRequest {
        let GeneratedRequest { url, init } = generated;
        GeneratedRequest {
            url: self.url.unwrap_or(url),
            init: RequestInit {
                method: self.method.unwrap_or(init.method),
                headers: self.headers.unwrap_or(init.headers),
                body: self.body.unwrap_or(init.body),
                options: self.options.unwrap_or(init.options),
            },
        }
    }
}

/// Last-stage hook adjusting the generated request.
pub type Refine = Arc<dyn Fn(&Url, &RequestInit) -> RequestPatch + Send + Sync>;

/// Everything needed to generate one request.
#[derive(Clone, Default)]
pub struct RequestConfig {
    /// HTTP method; `GET` when unset.
    pub method: Option<Method>,
    /// Validators for the request parts and the response.
    pub schema: RequestSchema,
    /// Raw values for `{{key}}` URL placeholders.
    pub path: Option<Params>,
    /// Raw query string parameters.
    pub search_params: Option<Params>,
    /// Raw headers.
    pub headers: Option<Params>,
    /// Raw body; exclusive with `form`.
    pub body: Option<RequestBody>,
    /// Raw form; exclusive with `body`.
    pub form: Option<Form>,
    /// Passthrough transport options.
    pub options: TransportOptions,
    /// Last-stage override hook.
    pub refine: Option<Refine>,
}

impl RequestConfig {
    /// Create an empty `GET` configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the method.
    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Set the schema descriptor.
    #[must_use]
    pub fn schema(mut self, schema: RequestSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Set the response validator only.
    #[must_use]
    pub fn response_schema(mut self, validator: impl Validator + 'static) -> Self {
        self.schema = self.schema.response(validator);
        self
    }

    /// Set raw path values.
    #[must_use]
    pub fn path(mut self, path: impl Into<Params>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set raw search params.
    #[must_use]
    pub fn search_params(mut self, params: impl Into<Params>) -> Self {
        self.search_params = Some(params.into());
        self
    }

    /// Set raw headers.
    #[must_use]
    pub fn headers(mut self, headers: impl Into<Params>) -> Self {
        self.headers = Some(headers.into());
        self
    }

    /// Set the raw body.
    #[must_use]
    pub fn body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set the raw form.
    #[must_use]
    pub fn form(mut self, form: Form) -> Self {
        self.form = Some(form);
        self
    }

    /// Set the passthrough transport options.
    #[must_use]
    pub fn options(mut self, options: TransportOptions) -> Self {
        self.options = options;
        self
    }

    /// Attach an abort signal.
    #[must_use]
    pub fn signal(mut self, signal: AbortSignal) -> Self {
        self.options.signal = Some(signal);
        self
    }

    /// Install the last-stage override hook.
    #[must_use]
    pub fn refine<F>(mut self, refine: F) -> Self
    where
        F: Fn(&Url, &RequestInit) -> RequestPatch + Send + Sync + 'static,
    {
        self.refine = Some(Arc::new(refine));
        self
    }

    pub(crate) fn method_or_default(&self) -> Method {
        self.method.clone().unwrap_or(Method::GET)
    }
}

impl fmt::Debug for RequestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestConfig")
            .field("method", &self.method)
            .field("schema", &self.schema)
            .field("path", &self.path)
            .field("search_params", &self.search_params)
            .field("headers", &self.headers)
            .field("body", &self.body)
            .field("form", &self.form)
            .field("options", &self.options)
            .field("refine", &self.refine.is_some())
            .finish()
    }
}
