//! # Schema-driven HTTP requests
//! Zenschema turns a URL plus a set of validators into a fully formed HTTP
//! request, sends it through a pluggable transport and hands back a response
//! whose body is validated only when it is read.
//!
//! - Path placeholders (`{{id}}`), search params, headers and bodies are
//!   validated before anything leaves the process
//! - Validation failures carry every issue with its location
//! - Response bodies are validated lazily against the response schema
//! - The transport is a trait; the default one is built on `reqwest`
//!
//! # Quick start
//! ```rust,no_run
//! # async fn example() -> zenschema::Result<()> {
//! use zenschema::{RequestConfig, fetch, request::Params, schema::{RequestSchema, Schema}};
//!
//! let config = RequestConfig::new()
//!     .schema(
//!         RequestSchema::new()
//!             .path(Schema::object([("id", Schema::integer())]))
//!             .response(Schema::object([
//!                 ("id", Schema::integer()),
//!                 ("title", Schema::string()),
//!             ])),
//!     )
//!     .path(Params::new().set("id", 1));
//!
//! let response = fetch("https://jsonplaceholder.typicode.com/todos/{{id}}", config).await?;
//! let todo = response.json().await?;
//! println!("{}", todo["title"]);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod multipart;
pub mod request;
pub mod schema;
pub mod signal;
pub mod transport;

mod client;
mod generate;
mod response;

pub use client::FetchBuilder;
pub use error::{Error, ErrorKind, Result};
pub use generate::{IntoUrl, generate_request};
pub use http::{HeaderMap, Method, StatusCode};
pub use request::{GeneratedRequest, RequestConfig, RequestInit};
pub use response::Response;
pub use transport::{Transport, global_transport, set_global_transport};
pub use url::Url;

use tracing::debug;

/// Generate a request from `config`, send it through the global transport and
/// wrap the reply for lazy validation.
///
/// The global transport is read once, when the call starts.
///
/// # Errors
///
/// Any error of [`generate_request`], or the transport's error.
pub async fn fetch(url: impl IntoUrl, config: RequestConfig) -> Result<Response> {
    let transport = global_transport();
    fetch_with(transport.as_ref(), url, config).await
}

/// Like [`fetch`], but through an explicit transport.
///
/// # Errors
///
/// Any error of [`generate_request`], or the transport's error.
pub async fn fetch_with(
    transport: &dyn Transport,
    url: impl IntoUrl,
    config: RequestConfig,
) -> Result<Response> {
    let GeneratedRequest { url, init } = generate_request(url, &config)?;
    debug!(method = %init.method, %url, "sending request");

    let raw = transport.send(url, init).await?;
    debug!(status = %raw.status(), "response received");

    Ok(Response::new(raw, config.schema.response))
}

/// Start building a request with `method`.
#[must_use]
pub fn request(method: Method, url: impl IntoUrl) -> FetchBuilder {
    FetchBuilder::new(method, url)
}

/// Start building a `GET` request.
#[must_use]
pub fn get(url: impl IntoUrl) -> FetchBuilder {
    request(Method::GET, url)
}

/// Start building a `POST` request.
#[must_use]
pub fn post(url: impl IntoUrl) -> FetchBuilder {
    request(Method::POST, url)
}

/// Start building a `PUT` request.
#[must_use]
pub fn put(url: impl IntoUrl) -> FetchBuilder {
    request(Method::PUT, url)
}

/// Start building a `PATCH` request.
#[must_use]
pub fn patch(url: impl IntoUrl) -> FetchBuilder {
    request(Method::PATCH, url)
}

/// Start building a `DELETE` request.
#[must_use]
pub fn delete(url: impl IntoUrl) -> FetchBuilder {
    request(Method::DELETE, url)
}
