//! Validator capability and request/response schema descriptors.
//!
//! A [`Validator`] is anything that can check a [`Value`] and either hand back
//! the (possibly transformed) value or the complete list of [`Issue`]s it found.
//! A [`RequestSchema`] names an optional validator for each part of a request
//! and for the response body.
//!
//! Two ready-made validators ship with the crate: the structural [`Schema`]
//! builder and the serde-backed [`Typed`]. Plain closures work too:
//!
//! ```
//! use serde_json::{Value, json};
//! use zenschema::schema::{Issue, Issues, RequestSchema, Validator};
//!
//! let even = |value: &Value| match value.as_i64() {
//!     Some(n) if n % 2 == 0 => Ok(value.clone()),
//!     _ => Err(Issues::from(Issue::custom("expected an even number"))),
//! };
//! assert!(even.safe_parse(&json!(4)).is_ok());
//!
//! let schema = RequestSchema::new().response(even);
//! assert!(schema.response.is_some());
//! ```

mod typed;
mod value;

use core::fmt;
use std::sync::Arc;

use serde_json::Value;

pub use typed::Typed;
pub use value::Schema;

/// Broad shape a validator accepts.
///
/// Used where the shape matters before any value is inspected, for example
/// when a text body is checked against a response schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaKind {
    /// Plain string.
    String,
    /// Any JSON number.
    Number,
    /// Boolean.
    Boolean,
    /// JSON `null`.
    Null,
    /// Array of values.
    Array,
    /// Object with named fields.
    Object,
    /// Accepts anything.
    Any,
    /// Shape unknown to this crate (closures, custom validators).
    Other,
}

/// Validation capability consumed by the request generator and the response wrapper.
pub trait Validator: Send + Sync {
    /// Validate `input`, returning the validated value or every issue found.
    ///
    /// # Errors
    ///
    /// Returns the full list of issues when `input` does not satisfy the validator.
    fn safe_parse(&self, input: &Value) -> Result<Value, Issues>;

    /// Strict variant of [`Validator::safe_parse`].
    ///
    /// Callers treat a failure here as the validator's own error and propagate it
    /// untouched instead of wrapping it into a request validation error.
    ///
    /// # Errors
    ///
    /// Returns the full list of issues when `input` does not satisfy the validator.
    fn parse(&self, input: &Value) -> Result<Value, Issues> {
        self.safe_parse(input)
    }

    /// Declared shape of accepted values.
    fn kind(&self) -> SchemaKind {
        SchemaKind::Other
    }
}

impl<F> Validator for F
where
    F: Fn(&Value) -> Result<Value, Issues> + Send + Sync,
{
    fn safe_parse(&self, input: &Value) -> Result<Value, Issues> {
        self(input)
    }
}

/// Shared, immutable validator handle.
pub type SharedValidator = Arc<dyn Validator>;

/// Optional validators for each part of a request and for its response.
#[derive(Clone, Default)]
pub struct RequestSchema {
    /// Validates the values substituted into `{{key}}` URL placeholders.
    pub path: Option<SharedValidator>,
    /// Validates the query string parameters.
    pub search_params: Option<SharedValidator>,
    /// Validates the request headers.
    pub headers: Option<SharedValidator>,
    /// Validates the request body or form.
    pub body: Option<SharedValidator>,
    /// Validates the response body when it is read.
    pub response: Option<SharedValidator>,
}

impl RequestSchema {
    /// Create a descriptor without any validators.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the path validator.
    #[must_use]
    pub fn path(mut self, validator: impl Validator + 'static) -> Self {
        self.path = Some(Arc::new(validator));
        self
    }

    /// Attach the search params validator.
    #[must_use]
    pub fn search_params(mut self, validator: impl Validator + 'static) -> Self {
        self.search_params = Some(Arc::new(validator));
        self
    }

    /// Attach the headers validator.
    #[must_use]
    pub fn headers(mut self, validator: impl Validator + 'static) -> Self {
        self.headers = Some(Arc::new(validator));
        self
    }

    /// Attach the body validator.
    #[must_use]
    pub fn body(mut self, validator: impl Validator + 'static) -> Self {
        self.body = Some(Arc::new(validator));
        self
    }

    /// Attach the response validator.
    #[must_use]
    pub fn response(mut self, validator: impl Validator + 'static) -> Self {
        self.response = Some(Arc::new(validator));
        self
    }
}

impl fmt::Debug for RequestSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestSchema")
            .field("path", &self.path.is_some())
            .field("search_params", &self.search_params.is_some())
            .field("headers", &self.headers.is_some())
            .field("body", &self.body.is_some())
            .field("response", &self.response.is_some())
            .finish()
    }
}

/// One step into a nested value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Object key.
    Key(String),
    /// Array index.
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => write!(f, "{key}"),
            Self::Index(index) => write!(f, "{index}"),
        }
    }
}

/// Category of a validation issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IssueCode {
    /// Value had the wrong type.
    InvalidType,
    /// Value did not equal the expected literal.
    InvalidLiteral,
    /// Required field was missing.
    Required,
    /// Failure reported by a custom validator.
    Custom,
}

/// A single validation failure located by its path inside the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    /// Location of the offending value, empty for the root.
    pub path: Vec<PathSegment>,
    /// Category of the failure.
    pub code: IssueCode,
    /// Human readable description.
    pub message: String,
}

impl Issue {
    /// Create an issue at the root of the input.
    #[must_use]
    pub fn new(code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            path: Vec::new(),
            code,
            message: message.into(),
        }
    }

    /// Create a [`IssueCode::Custom`] issue at the root of the input.
    #[must_use]
    pub fn custom(message: impl Into<String>) -> Self {
        Self::new(IssueCode::Custom, message)
    }

    /// Prefix the issue path with `segment`.
    #[must_use]
    pub fn within(mut self, segment: PathSegment) -> Self {
        self.path.insert(0, segment);
        self
    }

    /// Dotted rendering of the path, `""` for the root.
    #[must_use]
    pub fn path_string(&self) -> String {
        self.path
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path_string(), self.message)
        }
    }
}

/// Every issue found while validating one value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Issues(Vec<Issue>);

impl Issues {
    /// Create an empty issue list.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Append one issue.
    pub fn push(&mut self, issue: Issue) {
        self.0.push(issue);
    }

    /// Append every issue of `other`, prefixing their paths with `segment`.
    pub fn extend_within(&mut self, segment: &PathSegment, other: Self) {
        self.0
            .extend(other.0.into_iter().map(|issue| issue.within(segment.clone())));
    }

    /// Whether no issue was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of issues.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate over the issues.
    pub fn iter(&self) -> core::slice::Iter<'_, Issue> {
        self.0.iter()
    }

    /// Borrow the issues as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[Issue] {
        &self.0
    }

    /// `Ok(value)` when empty, otherwise `Err(self)`.
    ///
    /// # Errors
    ///
    /// Returns `self` when at least one issue was recorded.
    pub fn into_result<T>(self, value: T) -> Result<T, Self> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

impl From<Issue> for Issues {
    fn from(issue: Issue) -> Self {
        Self(vec![issue])
    }
}

impl From<Vec<Issue>> for Issues {
    fn from(issues: Vec<Issue>) -> Self {
        Self(issues)
    }
}

impl IntoIterator for Issues {
    type Item = Issue;
    type IntoIter = std::vec::IntoIter<Issue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Issues {
    type Item = &'a Issue;
    type IntoIter = core::slice::Iter<'a, Issue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for Issues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, issue) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}
