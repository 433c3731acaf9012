//! Lazily validating response wrapper.
//!
//! Metadata is available as soon as the response arrives; the body is only
//! read and validated when a body accessor runs. Nothing is cached: the body
//! stream is single-use, so a second accessor call fails with
//! [`Error::BodyUsed`] instead of replaying a stored value.

use core::fmt;

use http::{HeaderMap, StatusCode};
use http_kit::{Body, utils::Bytes};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::{
    Error, Result,
    schema::{SchemaKind, SharedValidator},
    transport::{RawResponse, ResponseType},
};

/// Response whose body is validated on demand against an optional schema.
pub struct Response {
    raw: RawResponse,
    schema: Option<SharedValidator>,
    status: StatusCode,
    status_text: String,
    headers: HeaderMap,
    url: Option<Url>,
    redirected: bool,
    kind: ResponseType,
    body_used: bool,
}

impl Response {
    /// Wrap `raw`, validating bodies against `schema` when one is given.
    ///
    /// Metadata is copied from `raw` at this point.
    #[must_use]
    pub fn new(raw: RawResponse, schema: Option<SharedValidator>) -> Self {
        Self {
            status: raw.status(),
            status_text: raw.status_text().to_owned(),
            headers: raw.headers().clone(),
            url: raw.url().cloned(),
            redirected: raw.redirected(),
            kind: raw.response_type(),
            body_used: raw.body_used(),
            raw,
            schema,
        }
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

    /// Whether the body was already used when this wrapper was created.
    ///
    /// This is a snapshot; [`RawResponse::body_used`] on [`Response::raw`]
    /// reflects reads made through the wrapper.
    #[must_use]
    pub const fn body_used(&self) -> bool {
        self.body_used
    }

    /// Validator applied by [`Response::json`] and [`Response::text`].
    #[must_use]
    pub const fn schema(&self) -> Option<&SharedValidator> {
        self.schema.as_ref()
    }

    /// Underlying raw response.
    #[must_use]
    pub const fn raw(&self) -> &RawResponse {
        &self.raw
    }

    /// Unwrap the raw response, dropping the schema.
    #[must_use]
    pub fn into_raw(self) -> RawResponse {
        self.raw
    }

    /// Decode the body as JSON without consulting the schema.
    ///
    /// # Errors
    ///
    /// Only body and decoding errors ([`Error::BodyUsed`], [`Error::Body`], [`Error::Json`]).
    pub async fn unsafe_json(&self) -> Result<Value> {
        self.raw.json().await
    }

    /// Read the body as text without consulting the schema.
    ///
    /// # Errors
    ///
    /// Only body errors ([`Error::BodyUsed`], [`Error::Body`]).
    pub async fn unsafe_text(&self) -> Result<String> {
        self.raw.text().await
    }

    /// Decode the body as JSON and validate it.
    ///
    /// Returns the validated value when a schema is set, otherwise the raw value.
    ///
    /// # Errors
    ///
    /// [`Error::ResponseValidation`] with every issue when the body does not
    /// match the schema, plus the errors of [`Response::unsafe_json`].
    pub async fn json(&self) -> Result<Value> {
        let data = self.unsafe_json().await?;
        let Some(schema) = &self.schema else {
            return Ok(data);
        };
        schema.safe_parse(&data).map_err(|issues| {
            debug!(status = %self.status, issues = issues.len(), "response body failed validation");
            Error::ResponseValidation(issues)
        })
    }

    /// Validate the JSON body, then deserialize it into `T`.
    ///
    /// # Errors
    ///
    /// The errors of [`Response::json`], plus [`Error::Json`] when the validated
    /// value does not fit `T`.
    pub async fn json_as<T: DeserializeOwned>(&self) -> Result<T> {
        let value = self.json().await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Read the body as text and validate it.
    ///
    /// The schema must describe a plain string. The text itself is returned,
    /// not the validator's output.
    ///
    /// # Errors
    ///
    /// [`Error::Schema`] when the schema is not a string schema,
    /// [`Error::ResponseValidation`] when the text fails it, plus the errors of
    /// [`Response::unsafe_text`].
    pub async fn text(&self) -> Result<String> {
        let data = self.unsafe_text().await?;
        if let Some(schema) = &self.schema {
            if schema.kind() != SchemaKind::String {
                return Err(Error::Schema("response schema must be a string".to_owned()));
            }
            schema
                .safe_parse(&Value::String(data.clone()))
                .map_err(Error::ResponseValidation)?;
        }
        Ok(data)
    }

    /// Read the raw body bytes; never validated.
    ///
    /// # Errors
    ///
    /// Only body errors ([`Error::BodyUsed`], [`Error::Body`]).
    pub async fn bytes(&self) -> Result<Bytes> {
        self.raw.bytes().await
    }

    /// Take the raw body stream; never validated.
    ///
    /// # Errors
    ///
    /// [`Error::BodyUsed`] if the body was already taken.
    pub async fn take_body(&self) -> Result<Body> {
        self.raw.take_body().await
    }

    /// Clone into an independent wrapper sharing the same schema.
    ///
    /// # Errors
    ///
    /// [`Error::BodyUsed`] when the body was already consumed.
    pub async fn try_clone(&self) -> Result<Self> {
        let raw = self.raw.try_clone().await?;
        Ok(Self::new(raw, self.schema.clone()))
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("url", &self.url)
            .field("redirected", &self.redirected)
            .field("has_schema", &self.schema.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use core::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::schema::{Schema, Typed, Validator};
    use serde_json::json;

    fn todo_schema() -> SharedValidator {
        Arc::new(Schema::object([
            ("user_id", Schema::integer()),
            ("id", Schema::integer()),
            ("title", Schema::string()),
            ("completed", Schema::boolean()),
        ]))
    }

    fn response(body: &'static str, schema: Option<SharedValidator>) -> Response {
        Response::new(RawResponse::new(StatusCode::OK, body), schema)
    }

    #[tokio::test]
    async fn json_returns_validated_value() {
        let response = response(
            r#"{"user_id":1,"id":2,"title":"t","completed":false,"extra":1}"#,
            Some(todo_schema()),
        );
        assert_eq!(
            response.json().await.unwrap(),
            json!({"user_id": 1, "id": 2, "title": "t", "completed": false})
        );
    }

    #[tokio::test]
    async fn json_reports_every_mismatch() {
        let response = response(
            r#"{"user_id":"1","id":2,"title":3}"#,
            Some(todo_schema()),
        );
        let err = response.json().await.unwrap_err();
        let Error::ResponseValidation(issues) = err else {
            panic!("expected response validation error, got {err:?}");
        };
        let paths: Vec<String> = issues.iter().map(crate::schema::Issue::path_string).collect();
        assert_eq!(paths, vec!["user_id", "title", "completed"]);
    }

    #[tokio::test]
    async fn json_without_schema_is_raw() {
        let response = response(r#"[1,2]"#, None);
        assert_eq!(response.json().await.unwrap(), json!([1, 2]));
    }

    #[tokio::test]
    async fn unsafe_json_skips_validation() {
        let response = response(r#"{"unexpected":true}"#, Some(todo_schema()));
        assert_eq!(
            response.unsafe_json().await.unwrap(),
            json!({"unexpected": true})
        );
    }

    #[tokio::test]
    async fn text_requires_string_schema() {
        let response = response("plain", Some(todo_schema()));
        let err = response.text().await.unwrap_err();
        assert!(err.is_schema_error());
        assert_eq!(err.to_string(), "response schema must be a string");
    }

    #[tokio::test]
    async fn text_validates_against_string_schema() {
        let ok = response("plain", Some(Arc::new(Schema::string())));
        assert_eq!(ok.text().await.unwrap(), "plain");

        let rejecting = response("no", Some(Arc::new(StringEquals("yes"))));
        assert!(matches!(
            rejecting.text().await,
            Err(Error::ResponseValidation(_))
        ));
    }

    /// Object-shaped validator that counts how often it runs.
    struct CountingObject(Arc<AtomicUsize>);

    impl Validator for CountingObject {
        fn safe_parse(&self, input: &Value) -> core::result::Result<Value, crate::schema::Issues> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(input.clone())
        }

        fn kind(&self) -> SchemaKind {
            SchemaKind::Object
        }
    }

    #[tokio::test]
    async fn text_with_non_string_schema_never_validates() {
        let calls = Arc::new(AtomicUsize::new(0));
        let response = response(
            "anything",
            Some(Arc::new(CountingObject(Arc::clone(&calls)))),
        );
        let err = response.text().await.unwrap_err();
        assert!(matches!(err, Error::Schema(ref message) if message == "response schema must be a string"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn text_accepts_typed_string_schema() {
        let response = response("hello", Some(Arc::new(Typed::<String>::new())));
        assert_eq!(response.text().await.unwrap(), "hello");
    }

    struct StringEquals(&'static str);

    impl Validator for StringEquals {
        fn safe_parse(&self, input: &Value) -> core::result::Result<Value, crate::schema::Issues> {
            if input.as_str() == Some(self.0) {
                Ok(input.clone())
            } else {
                Err(crate::schema::Issue::custom(format!("expected {}", self.0)).into())
            }
        }

        fn kind(&self) -> SchemaKind {
            SchemaKind::String
        }
    }

    #[tokio::test]
    async fn accessors_are_not_memoized() {
        let response = response(r#"{"a":1}"#, None);
        assert!(response.json().await.is_ok());
        assert!(matches!(response.json().await, Err(Error::BodyUsed)));
        assert!(matches!(response.unsafe_text().await, Err(Error::BodyUsed)));
    }

    #[tokio::test]
    async fn clones_share_schema_but_not_body() {
        let original = response(r#"{"user_id":"bad"}"#, Some(todo_schema()));
        let copy = original.try_clone().await.unwrap();
        assert!(Arc::ptr_eq(
            copy.schema().unwrap(),
            original.schema().unwrap()
        ));
        assert!(copy.json().await.is_err());
        assert!(original.unsafe_json().await.is_ok());
        assert!(matches!(original.try_clone().await, Err(Error::BodyUsed)));
    }

    #[tokio::test]
    async fn metadata_is_a_snapshot() {
        let raw = RawResponse::new(StatusCode::ACCEPTED, "x");
        let response = Response::new(raw, None);
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert!(response.ok());
        assert!(!response.body_used());
        let _ = response.unsafe_text().await.unwrap();
        assert!(!response.body_used());
        assert!(response.raw().body_used());
    }

    #[tokio::test]
    async fn json_as_deserializes_validated_value() {
        #[derive(serde::Deserialize)]
        struct Todo {
            id: u32,
            title: String,
        }
        let response = response(
            r#"{"user_id":1,"id":2,"title":"t","completed":true}"#,
            Some(todo_schema()),
        );
        let todo: Todo = response.json_as().await.unwrap();
        assert_eq!(todo.id, 2);
        assert_eq!(todo.title, "t");
    }
}
