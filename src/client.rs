use core::pin::Pin;
use std::sync::Arc;

use http::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::{
    Result,
    generate::IntoUrl,
    request::{Form, Params, RequestBody, RequestConfig, RequestInit, RequestPatch, TransportOptions},
    response::Response,
    schema::{RequestSchema, Validator},
    signal::AbortSignal,
    transport::Transport,
};

/// Typed request builder; await it to send the request.
///
/// ```no_run
/// # async fn example() -> zenschema::Result<()> {
/// use zenschema::schema::{RequestSchema, Schema};
///
/// let todo = zenschema::get("https://jsonplaceholder.typicode.com/todos/{{id}}")
///     .schema(
///         RequestSchema::new()
///             .path(Schema::object([("id", Schema::integer())]))
///             .response(Schema::object([("title", Schema::string())])),
///     )
///     .path([("id", 1)])
///     .json()
///     .await?;
/// println!("{}", todo["title"]);
/// # Ok(())
/// # }
/// ```
#[must_use = "requests do nothing unless awaited"]
pub struct FetchBuilder {
    url: Result<Url>,
    config: RequestConfig,
    transport: Option<Arc<dyn Transport>>,
}

impl IntoFuture for FetchBuilder {
    type Output = Result<Response>;

    type IntoFuture = Pin<Box<dyn Future<Output = Result<Response>> + Send + 'static>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            let url = self.url?;
            let transport = self.transport.unwrap_or_else(crate::global_transport);
            crate::fetch_with(transport.as_ref(), url, self.config).await
        })
    }
}

impl FetchBuilder {
    /// Start a request with `method` to `url`.
    #[must_use]
    pub fn new(method: Method, url: impl IntoUrl) -> Self {
        Self {
            url: url.into_url(),
            config: RequestConfig::new().method(method),
            transport: None,
        }
    }

    /// Replace the whole configuration, keeping the method if the new one has none.
    #[must_use]
    pub fn config(mut self, config: RequestConfig) -> Self {
        let method = self.config.method.take();
        self.config = config;
        if self.config.method.is_none() {
            self.config.method = method;
        }
        self
    }

    /// Set the schema descriptor.
    #[must_use]
    pub fn schema(mut self, schema: RequestSchema) -> Self {
        self.config.schema = schema;
        self
    }

    /// Set the response validator only.
    #[must_use]
    pub fn response_schema(mut self, validator: impl Validator + 'static) -> Self {
        self.config = self.config.response_schema(validator);
        self
    }

    /// Set raw path values.
    #[must_use]
    pub fn path(mut self, path: impl Into<Params>) -> Self {
        self.config.path = Some(path.into());
        self
    }

    /// Set raw search params.
    #[must_use]
    pub fn search_params(mut self, params: impl Into<Params>) -> Self {
        self.config.search_params = Some(params.into());
        self
    }

    /// Set raw headers, replacing any set before.
    #[must_use]
    pub fn headers(mut self, headers: impl Into<Params>) -> Self {
        self.config.headers = Some(headers.into());
        self
    }

    /// Add one header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config
            .headers
            .get_or_insert_with(Params::new)
            .insert(name, Some(value.into()));
        self
    }

    /// Set the raw body.
    #[must_use]
    pub fn body(mut self, body: impl Into<RequestBody>) -> Self {
        self.config.body = Some(body.into());
        self
    }

    /// Send `value` as JSON, adding a JSON content type unless one is set.
    #[must_use]
    pub fn json_body(mut self, value: Value) -> Self {
        let headers = self.config.headers.get_or_insert_with(Params::new);
        let has_content_type = headers
            .iter()
            .any(|(name, value)| value.is_some() && name.eq_ignore_ascii_case("content-type"));
        if !has_content_type {
            headers.insert("content-type", Some(Value::from("application/json")));
        }
        self.config.body = Some(RequestBody::from(value));
        self
    }

    /// Set the raw form.
    #[must_use]
    pub fn form(mut self, form: Form) -> Self {
        self.config.form = Some(form);
        self
    }

    /// Set the passthrough transport options.
    #[must_use]
    pub fn options(mut self, options: TransportOptions) -> Self {
        self.config.options = options;
        self
    }

    /// Attach an abort signal.
    #[must_use]
    pub fn signal(mut self, signal: AbortSignal) -> Self {
        self.config.options.signal = Some(signal);
        self
    }

    /// Install the last-stage override hook.
    #[must_use]
    pub fn refine<F>(mut self, refine: F) -> Self
    where
        F: Fn(&Url, &RequestInit) -> RequestPatch + Send + Sync + 'static,
    {
        self.config = self.config.refine(refine);
        self
    }

    /// Send through `transport` instead of the global one.
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Send the request and return the validated JSON body.
    ///
    /// # Errors
    ///
    /// Any request, transport or validation error.
    pub async fn json(self) -> Result<Value> {
        let response = self.await?;
        response.json().await
    }

    /// Send the request and deserialize the validated JSON body.
    ///
    /// # Errors
    ///
    /// Any request, transport or validation error.
    pub async fn json_as<T: DeserializeOwned>(self) -> Result<T> {
        let response = self.await?;
        response.json_as().await
    }

    /// Send the request and return the validated text body.
    ///
    /// # Errors
    ///
    /// Any request, transport, schema or validation error.
    pub async fn text(self) -> Result<String> {
        let response = self.await?;
        response.text().await
    }
}

impl core::fmt::Debug for FetchBuilder {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FetchBuilder")
            .field("url", &self.url)
            .field("config", &self.config)
            .field("custom_transport", &self.transport.is_some())
            .finish()
    }
}
