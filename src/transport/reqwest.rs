use core::pin::pin;

use futures_util::future::{BoxFuture, Either, select};
use http::{HeaderMap, HeaderValue, header::CONTENT_TYPE};
use http_kit::Body;
use tracing::{debug, trace};
use url::Url;

use super::{RawResponse, Transport};
use crate::{
    Error, Result,
    request::{RequestBody, RequestInit, TransportOptions},
};

/// Default transport backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: ::reqwest::Client,
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ReqwestTransport {
    /// Create a transport with a default client.
    #[must_use]
    pub fn new() -> Self {
        Self::with_client(::reqwest::Client::new())
    }

    /// Create a transport around a preconfigured client.
    #[must_use]
    pub const fn with_client(client: ::reqwest::Client) -> Self {
        Self { client }
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, url: Url, init: RequestInit) -> BoxFuture<'static, Result<RawResponse>> {
        let client = self.client.clone();
        Box::pin(async move {
            let RequestInit {
                method,
                mut headers,
                body,
                options,
            } = init;
            log_ignored_options(&options);

            let mut request = client.request(method, url.clone());
            if let Some(body) = body {
                request = request.body(encode_body(body, &mut headers));
            }
            let request = request.headers(headers);

            let exchange = pin!(async move {
                let response = request.send().await.map_err(Error::transport)?;
                into_raw(response, &url).await
            });

            match options.signal {
                Some(signal) => {
                    let aborted = pin!(signal.aborted());
                    match select(exchange, aborted).await {
                        Either::Left((result, _)) => result,
                        Either::Right(((), _)) => {
                            debug!("request aborted by signal");
                            Err(Error::Aborted)
                        }
                    }
                }
                None => exchange.await,
            }
        })
    }
}

fn encode_body(body: RequestBody, headers: &mut HeaderMap) -> ::reqwest::Body {
    match body {
        RequestBody::Json(value) => {
            default_content_type(headers, "application/json");
            value.to_string().into()
        }
        RequestBody::Text(text) => {
            default_content_type(headers, "text/plain;charset=UTF-8");
            text.into()
        }
        RequestBody::Bytes(bytes) => bytes.into(),
        RequestBody::Multipart(form) => {
            let (boundary, bytes) = form.encode();
            let is_multipart = headers
                .get(CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .is_some_and(|value| value.starts_with("multipart/form-data"));
            // The boundary only exists now, so a non-multipart content type has to go.
            if !is_multipart
                && let Ok(value) =
                    HeaderValue::from_str(&format!("multipart/form-data; boundary={boundary}"))
            {
                headers.insert(CONTENT_TYPE, value);
            }
            bytes.into()
        }
    }
}

fn default_content_type(headers: &mut HeaderMap, value: &'static str) {
    headers
        .entry(CONTENT_TYPE)
        .or_insert_with(|| HeaderValue::from_static(value));
}

fn log_ignored_options(options: &TransportOptions) {
    if options.credentials.is_some()
        || options.cache.is_some()
        || options.redirect.is_some()
        || options.keepalive
    {
        trace!(?options, "reqwest transport ignores per-request fetch options");
    }
}

async fn into_raw(response: ::reqwest::Response, requested: &Url) -> Result<RawResponse> {
    let status = response.status();
    let headers = response.headers().clone();
    let final_url = response.url().clone();
    let redirected = final_url != *requested;
    trace!(%status, %final_url, redirected, "response head received");

    let bytes = response.bytes().await.map_err(Error::transport)?;
    Ok(RawResponse::from_body(status, Body::from(bytes))
        .with_headers(headers)
        .with_url(Some(final_url))
        .with_redirected(redirected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multipart::FormData;
    use serde_json::json;

    #[test]
    fn structured_bodies_default_to_json() {
        let mut headers = HeaderMap::new();
        let _ = encode_body(RequestBody::Json(json!({"a": 1})), &mut headers);
        assert_eq!(headers[CONTENT_TYPE], "application/json");
    }

    #[test]
    fn explicit_content_type_is_kept_for_text() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let _ = encode_body(RequestBody::Text("{}".into()), &mut headers);
        assert_eq!(headers[CONTENT_TYPE], "application/json");
    }

    #[test]
    fn multipart_overrides_foreign_content_type() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let mut form = FormData::new().boundary("b0");
        form.append_text("a", "1");
        let _ = encode_body(RequestBody::Multipart(form), &mut headers);
        assert_eq!(headers[CONTENT_TYPE], "multipart/form-data; boundary=b0");
    }
}
