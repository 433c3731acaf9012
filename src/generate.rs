//! Request generation.
//!
//! [`generate_request`] turns a URL and a [`RequestConfig`] into the exact URL
//! and [`RequestInit`] handed to the transport. Stages run in a fixed order:
//!
//! 1. path placeholders (`{{key}}`) are validated, percent-encoded and substituted
//! 2. search params are validated and set on the query string
//! 3. headers are validated and flattened to strings
//! 4. the body or form is validated and encoded; structured bodies are
//!    serialized when the content type is JSON
//! 5. the `refine` hook may override any part of the result
//!
//! The body stage reads the content type resolved by the header stage, so the
//! order is part of the contract. Generation is pure: identical inputs give
//! identical output.

use http::{HeaderMap, HeaderName, HeaderValue, Method, header::CONTENT_TYPE};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use serde_json::{Map, Value};
use tracing::trace;
use url::Url;

use crate::{
    Error, Result,
    multipart::FormData,
    request::{Form, FormValue, GeneratedRequest, Params, RequestBody, RequestConfig, RequestInit},
    schema::SharedValidator,
};

/// Anything that can be turned into a [`Url`].
pub trait IntoUrl {
    /// Parse or convert into a URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] when the input is not an absolute URL.
    fn into_url(self) -> Result<Url>;
}

impl IntoUrl for Url {
    fn into_url(self) -> Result<Url> {
        Ok(self)
    }
}

impl IntoUrl for &Url {
    fn into_url(self) -> Result<Url> {
        Ok(self.clone())
    }
}

impl IntoUrl for &str {
    fn into_url(self) -> Result<Url> {
        Ok(Url::parse(self)?)
    }
}

impl IntoUrl for String {
    fn into_url(self) -> Result<Url> {
        self.as_str().into_url()
    }
}

impl IntoUrl for &String {
    fn into_url(self) -> Result<Url> {
        self.as_str().into_url()
    }
}

/// Generate the final URL and request options for `config`.
///
/// # Errors
///
/// - [`Error::RequestConfig`] when the configuration is inconsistent with its schema
/// - [`Error::RequestValidation`] when path or body values fail their schema
/// - [`Error::Validator`] when search params or headers fail their schema
/// - [`Error::InvalidUrl`] / [`Error::InvalidHeader`] for values that cannot be sent
///
/// # Example
/// ```
/// use serde_json::json;
/// use zenschema::{RequestConfig, generate_request, request::Params, schema::{RequestSchema, Schema}};
///
/// let config = RequestConfig::new()
///     .schema(RequestSchema::new().path(Schema::object([("id", Schema::number())])))
///     .path(Params::new().set("id", 42));
///
/// let generated = generate_request("https://x/items/{{id}}", &config).unwrap();
/// assert_eq!(generated.url.as_str(), "https://x/items/42");
/// ```
pub fn generate_request(url: impl IntoUrl, config: &RequestConfig) -> Result<GeneratedRequest> {
    let method = config.method_or_default();
    let schema = &config.schema;

    let mut url = apply_path(url.into_url()?, schema.path.as_ref(), config.path.as_ref())?;
    trace!(%url, "path applied");

    apply_search_params(
        &mut url,
        schema.search_params.as_ref(),
        config.search_params.as_ref(),
    )?;
    trace!(%url, "search params applied");

    let headers = resolve_headers(schema.headers.as_ref(), config.headers.as_ref())?;
    trace!(count = headers.len(), "headers resolved");

    let body = resolve_body(
        &method,
        schema.body.as_ref(),
        config.body.as_ref(),
        config.form.as_ref(),
        &headers,
    )?;
    trace!(has_body = body.is_some(), "body resolved");

    let generated = GeneratedRequest {
        url,
        init: RequestInit {
            method,
            headers,
            body,
            options: config.options.clone(),
        },
    };

    Ok(match &config.refine {
        Some(refine) => {
            trace!("applying refine hook");
            refine(&generated.url, &generated.init).apply(generated)
        }
        None => generated,
    })
}

fn apply_path(url: Url, schema: Option<&SharedValidator>, path: Option<&Params>) -> Result<Url> {
    let values = match (schema, path) {
        (None, None) => return Ok(url),
        (Some(_), None) => {
            return Err(Error::config(
                "path schema is defined but no path was provided",
            ));
        }
        (Some(validator), Some(path)) => validator
            .safe_parse(&path.to_value())
            .map_err(Error::RequestValidation)?,
        (None, Some(path)) => path.to_value(),
    };

    let Value::Object(values) = values else {
        return Err(Error::config("path values must be an object"));
    };

    let template = decode_braces(url.as_str());
    let rendered = render_template(&template, &values)?;
    Ok(Url::parse(&rendered)?)
}

/// Undo the percent-encoding URL parsing applies to `{` and `}`.
fn decode_braces(raw: &str) -> String {
    let mut decoded = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(index) = rest.find('%') {
        decoded.push_str(&rest[..index]);
        let escape = rest.get(index..index + 3);
        match escape {
            Some(e) if e.eq_ignore_ascii_case("%7B") => decoded.push('{'),
            Some(e) if e.eq_ignore_ascii_case("%7D") => decoded.push('}'),
            _ => {
                decoded.push('%');
                rest = &rest[index + 1..];
                continue;
            }
        }
        rest = &rest[index + 3..];
    }
    decoded.push_str(rest);
    decoded
}

/// Characters escaped in substituted values, so a value always stays inside
/// its own path segment or query value.
const PLACEHOLDER_VALUE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'+')
    .add(b'/')
    .add(b'<')
    .add(b'=')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Substitute `{{key}}` placeholders with escaped values; unknown keys render
/// as empty strings.
fn render_template(template: &str, values: &Map<String, Value>) -> Result<String> {
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        let Some(len) = rest[start + 2..].find("}}") else {
            break;
        };
        rendered.push_str(&rest[..start]);
        let key = rest[start + 2..start + 2 + len].trim();
        if let Some(value) = values.get(key) {
            let text = scalar_string(value)
                .ok_or_else(|| Error::config(format!("path value `{key}` must be a scalar")))?;
            if text == "." || text == ".." {
                return Err(Error::config(format!(
                    "path value `{key}` cannot be a dot segment"
                )));
            }
            rendered.extend(utf8_percent_encode(&text, PLACEHOLDER_VALUE));
        }
        rest = &rest[start + 2 + len + 2..];
    }
    rendered.push_str(rest);
    Ok(rendered)
}

fn apply_search_params(
    url: &mut Url,
    schema: Option<&SharedValidator>,
    params: Option<&Params>,
) -> Result<()> {
    let values = match (schema, params) {
        (None, None) => return Ok(()),
        (Some(_), None) => {
            return Err(Error::config(
                "search params schema is defined but no search params were provided",
            ));
        }
        (Some(validator), Some(params)) => validator
            .parse(&params.to_value())
            .map_err(Error::Validator)?,
        (None, Some(params)) => params.to_value(),
    };

    let Value::Object(values) = values else {
        return Err(Error::config("search params must be an object"));
    };

    let mut pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    for (key, value) in &values {
        let value = param_string(value).ok_or_else(|| {
            Error::config(format!("search param `{key}` must be a scalar or a list"))
        })?;
        set_pair(&mut pairs, key, value);
    }

    if pairs.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(pairs);
    }
    Ok(())
}

/// Replace the first pair named `key`, drop the rest, or append when absent.
fn set_pair(pairs: &mut Vec<(String, String)>, key: &str, value: String) {
    match pairs.iter().position(|(existing, _)| existing == key) {
        Some(first) => {
            pairs[first].1 = value;
            let mut index = 0;
            pairs.retain(|(existing, _)| {
                let keep = index == first || existing != key;
                index += 1;
                keep
            });
        }
        None => pairs.push((key.to_owned(), value)),
    }
}

fn resolve_headers(schema: Option<&SharedValidator>, headers: Option<&Params>) -> Result<HeaderMap> {
    let values = match (schema, headers) {
        (None, None) => return Ok(HeaderMap::new()),
        (Some(_), None) => {
            return Err(Error::config(
                "headers schema is defined but no headers were provided",
            ));
        }
        (Some(validator), Some(headers)) => validator
            .parse(&headers.to_value())
            .map_err(Error::Validator)?,
        // Without a schema, only undefined entries are dropped.
        (None, Some(headers)) => headers.to_value(),
    };

    let Value::Object(values) = values else {
        return Err(Error::config("headers must be an object"));
    };

    let mut map = HeaderMap::with_capacity(values.len());
    for (key, value) in &values {
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|err| Error::InvalidHeader(format!("{key}: {err}")))?;
        let text = param_string(value)
            .ok_or_else(|| Error::config(format!("header `{key}` must be a scalar or a list")))?;
        let value = HeaderValue::from_str(&text)
            .map_err(|err| Error::InvalidHeader(format!("{key}: {err}")))?;
        map.insert(name, value);
    }
    Ok(map)
}

fn is_bodyless(method: &Method) -> bool {
    *method == Method::GET || *method == Method::HEAD || *method == Method::OPTIONS
}

fn resolve_body(
    method: &Method,
    schema: Option<&SharedValidator>,
    body: Option<&RequestBody>,
    form: Option<&Form>,
    headers: &HeaderMap,
) -> Result<Option<RequestBody>> {
    if body.is_some() && form.is_some() {
        return Err(Error::config("`body` and `form` cannot be used together"));
    }

    let has_body = body.is_some() || form.is_some();
    if has_body && is_bodyless(method) {
        return Err(Error::config(format!(
            "request with {method} method cannot have a body"
        )));
    }
    if schema.is_some() && !has_body {
        return Err(Error::config(
            "body schema is defined but neither body nor form was provided",
        ));
    }

    let resolved = match (body, form) {
        (_, Some(form)) => RequestBody::Multipart(form_data(form, schema)?),
        (Some(body), None) => validate_body(body, schema)?,
        (None, None) => return Ok(None),
    };

    if is_json(headers)
        && let RequestBody::Json(value) = &resolved
    {
        return Ok(Some(RequestBody::Text(value.to_string())));
    }
    Ok(Some(resolved))
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.to_ascii_lowercase().contains("application/json"))
}

fn validate_body(body: &RequestBody, schema: Option<&SharedValidator>) -> Result<RequestBody> {
    let Some(validator) = schema else {
        return Ok(body.clone());
    };
    let input = match body {
        RequestBody::Json(value) => value.clone(),
        RequestBody::Text(text) => Value::String(text.clone()),
        RequestBody::Bytes(_) | RequestBody::Multipart(_) => {
            return Err(Error::config(
                "binary bodies cannot be validated against a body schema",
            ));
        }
    };
    let validated = validator
        .safe_parse(&input)
        .map_err(Error::RequestValidation)?;
    Ok(RequestBody::from(validated))
}

fn form_data(form: &Form, schema: Option<&SharedValidator>) -> Result<FormData> {
    let fields: Vec<(String, FormValue)> = match schema {
        None => form
            .defined()
            .map(|(key, value)| (key.to_owned(), value.clone()))
            .collect(),
        Some(validator) => validated_form(form, validator)?,
    };

    let mut data = FormData::new();
    for (key, value) in fields {
        match value {
            FormValue::Blob(blob) => data.append_blob(key, blob),
            FormValue::Value(value) => {
                let text = match value {
                    Value::String(text) => text,
                    Value::Number(number) => number.to_string(),
                    Value::Bool(flag) => flag.to_string(),
                    other => {
                        return Err(Error::config(format!(
                            "form field `{key}` must be a string, number, boolean or binary value, got {other}"
                        )));
                    }
                };
                data.append_text(key, text);
            }
        }
    }
    Ok(data)
}

/// Validate the scalar part of a form; binary entries skip validation and keep their place.
fn validated_form(form: &Form, validator: &SharedValidator) -> Result<Vec<(String, FormValue)>> {
    let scalars: Map<String, Value> = form
        .defined()
        .filter_map(|(key, value)| match value {
            FormValue::Value(value) => Some((key.to_owned(), value.clone())),
            FormValue::Blob(_) => None,
        })
        .collect();

    let Value::Object(mut validated) = validator
        .safe_parse(&Value::Object(scalars))
        .map_err(Error::RequestValidation)?
    else {
        return Err(Error::config("form schema must produce an object"));
    };

    let mut fields = Vec::new();
    for (key, value) in form.defined() {
        match value {
            FormValue::Blob(blob) => fields.push((key.to_owned(), FormValue::Blob(blob.clone()))),
            FormValue::Value(_) => {
                if let Some(value) = validated.remove(key) {
                    fields.push((key.to_owned(), FormValue::Value(value)));
                }
            }
        }
    }
    fields.extend(
        validated
            .into_iter()
            .map(|(key, value)| (key, FormValue::Value(value))),
    );
    Ok(fields)
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null => Some("null".to_owned()),
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Scalars as text; lists joined with commas.
fn param_string(value: &Value) -> Option<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(scalar_string)
            .collect::<Option<Vec<_>>>()
            .map(|items| items.join(",")),
        other => scalar_string(other),
    }
}
