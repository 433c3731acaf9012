use serde_json::{Map, Number, Value};

use super::{Issue, IssueCode, Issues, PathSegment, SchemaKind, Validator};

/// Structural validator over JSON values.
///
/// Objects keep only their declared fields, and every failing field is
/// reported rather than only the first one.
///
/// ```
/// use serde_json::json;
/// use zenschema::schema::{Schema, Validator};
///
/// let todo = Schema::object([
///     ("id", Schema::integer()),
///     ("title", Schema::string()),
///     ("done", Schema::boolean().optional()),
/// ]);
///
/// let value = todo.safe_parse(&json!({"id": 1, "title": "write", "extra": true})).unwrap();
/// assert_eq!(value, json!({"id": 1, "title": "write"}));
///
/// let issues = todo.safe_parse(&json!({"id": "x", "title": 3})).unwrap_err();
/// assert_eq!(issues.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    shape: Shape,
    optional: bool,
    nullable: bool,
    coerce: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum Shape {
    String,
    Number,
    Integer,
    Boolean,
    Null,
    Any,
    Literal(Value),
    Array(Box<Schema>),
    Object(Vec<(String, Schema)>),
    Record(Box<Schema>),
}

impl Schema {
    const fn from_shape(shape: Shape) -> Self {
        Self {
            shape,
            optional: false,
            nullable: false,
            coerce: false,
        }
    }

    /// Accept strings.
    #[must_use]
    pub const fn string() -> Self {
        Self::from_shape(Shape::String)
    }

    /// Accept any JSON number.
    #[must_use]
    pub const fn number() -> Self {
        Self::from_shape(Shape::Number)
    }

    /// Accept numbers without a fractional part.
    #[must_use]
    pub const fn integer() -> Self {
        Self::from_shape(Shape::Integer)
    }

    /// Accept booleans.
    #[must_use]
    pub const fn boolean() -> Self {
        Self::from_shape(Shape::Boolean)
    }

    /// Accept only `null`.
    #[must_use]
    pub const fn null() -> Self {
        Self::from_shape(Shape::Null)
    }

    /// Accept anything.
    #[must_use]
    pub const fn any() -> Self {
        Self::from_shape(Shape::Any)
    }

    /// Accept exactly `value`.
    #[must_use]
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::from_shape(Shape::Literal(value.into()))
    }

    /// Accept arrays whose elements all satisfy `item`.
    #[must_use]
    pub fn array(item: Self) -> Self {
        Self::from_shape(Shape::Array(Box::new(item)))
    }

    /// Accept objects with the given fields; undeclared fields are dropped.
    #[must_use]
    pub fn object<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Self)>,
    {
        Self::from_shape(Shape::Object(
            fields
                .into_iter()
                .map(|(key, schema)| (key.into(), schema))
                .collect(),
        ))
    }

    /// Accept objects whose values all satisfy `value`.
    #[must_use]
    pub fn record(value: Self) -> Self {
        Self::from_shape(Shape::Record(Box::new(value)))
    }

    /// Allow the field to be absent from its parent object.
    #[must_use]
    pub const fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Also accept `null`.
    #[must_use]
    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Convert between strings and scalars before checking.
    ///
    /// Path, query and header values usually arrive as strings; a coercing
    /// number schema accepts `"42"` and yields `42`.
    #[must_use]
    pub const fn coerce(mut self) -> Self {
        self.coerce = true;
        self
    }

    fn check(&self, value: &Value) -> Result<Value, Issues> {
        if value.is_null() && self.nullable {
            return Ok(Value::Null);
        }

        match &self.shape {
            Shape::Any => Ok(value.clone()),
            Shape::String => match value {
                Value::String(_) => Ok(value.clone()),
                Value::Number(n) if self.coerce => Ok(Value::String(n.to_string())),
                Value::Bool(b) if self.coerce => Ok(Value::String(b.to_string())),
                _ => Err(mismatch("string", value)),
            },
            Shape::Number => match value {
                Value::Number(_) => Ok(value.clone()),
                Value::String(s) if self.coerce => {
                    parse_number(s).ok_or_else(|| mismatch("number", value))
                }
                _ => Err(mismatch("number", value)),
            },
            Shape::Integer => {
                let candidate = match value {
                    Value::String(s) if self.coerce => parse_number(s),
                    Value::Number(_) => Some(value.clone()),
                    _ => None,
                };
                match candidate {
                    Some(Value::Number(n)) if is_integral(&n) => Ok(Value::Number(n)),
                    _ => Err(mismatch("integer", value)),
                }
            }
            Shape::Boolean => match value {
                Value::Bool(_) => Ok(value.clone()),
                Value::String(s) if self.coerce && s == "true" => Ok(Value::Bool(true)),
                Value::String(s) if self.coerce && s == "false" => Ok(Value::Bool(false)),
                _ => Err(mismatch("boolean", value)),
            },
            Shape::Null => match value {
                Value::Null => Ok(Value::Null),
                _ => Err(mismatch("null", value)),
            },
            Shape::Literal(expected) => {
                if value == expected {
                    Ok(value.clone())
                } else {
                    Err(Issues::from(Issue::new(
                        IssueCode::InvalidLiteral,
                        format!("expected literal {expected}"),
                    )))
                }
            }
            Shape::Array(item) => {
                let Value::Array(elements) = value else {
                    return Err(mismatch("array", value));
                };
                let mut issues = Issues::new();
                let mut output = Vec::with_capacity(elements.len());
                for (index, element) in elements.iter().enumerate() {
                    match item.check(element) {
                        Ok(checked) => output.push(checked),
                        Err(nested) => issues.extend_within(&PathSegment::Index(index), nested),
                    }
                }
                issues.into_result(Value::Array(output))
            }
            Shape::Object(fields) => {
                let Value::Object(map) = value else {
                    return Err(mismatch("object", value));
                };
                let mut issues = Issues::new();
                let mut output = Map::new();
                for (key, field) in fields {
                    let segment = PathSegment::Key(key.clone());
                    match map.get(key) {
                        None if field.optional => {}
                        None => issues.push(
                            Issue::new(IssueCode::Required, "required").within(segment),
                        ),
                        Some(present) => match field.check(present) {
                            Ok(checked) => {
                                output.insert(key.clone(), checked);
                            }
                            Err(nested) => issues.extend_within(&segment, nested),
                        },
                    }
                }
                issues.into_result(Value::Object(output))
            }
            Shape::Record(entry) => {
                let Value::Object(map) = value else {
                    return Err(mismatch("object", value));
                };
                let mut issues = Issues::new();
                let mut output = Map::new();
                for (key, present) in map {
                    match entry.check(present) {
                        Ok(checked) => {
                            output.insert(key.clone(), checked);
                        }
                        Err(nested) => {
                            issues.extend_within(&PathSegment::Key(key.clone()), nested);
                        }
                    }
                }
                issues.into_result(Value::Object(output))
            }
        }
    }
}

impl Validator for Schema {
    fn safe_parse(&self, input: &Value) -> Result<Value, Issues> {
        self.check(input)
    }

    fn kind(&self) -> SchemaKind {
        match self.shape {
            Shape::String => SchemaKind::String,
            Shape::Number | Shape::Integer => SchemaKind::Number,
            Shape::Boolean => SchemaKind::Boolean,
            Shape::Null => SchemaKind::Null,
            Shape::Any => SchemaKind::Any,
            Shape::Array(_) => SchemaKind::Array,
            Shape::Object(_) | Shape::Record(_) => SchemaKind::Object,
            Shape::Literal(_) => SchemaKind::Other,
        }
    }
}

fn mismatch(expected: &str, received: &Value) -> Issues {
    Issues::from(Issue::new(
        IssueCode::InvalidType,
        format!("expected {expected}, received {}", type_name(received)),
    ))
}

const fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn parse_number(raw: &str) -> Option<Value> {
    let raw = raw.trim();
    if let Ok(integer) = raw.parse::<i64>() {
        return Some(Value::from(integer));
    }
    raw.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}

fn is_integral(number: &Number) -> bool {
    number.is_i64() || number.is_u64() || number.as_f64().is_some_and(|f| f.fract() == 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn object_reports_every_failing_field() {
        let schema = Schema::object([
            ("user_id", Schema::number()),
            ("title", Schema::string()),
            ("completed", Schema::boolean()),
        ]);
        let issues = schema
            .safe_parse(&json!({"user_id": "1", "title": false}))
            .unwrap_err();

        let paths: Vec<String> = issues.iter().map(Issue::path_string).collect();
        assert_eq!(paths, vec!["user_id", "title", "completed"]);
        assert_eq!(issues.as_slice()[2].code, IssueCode::Required);
    }

    #[test]
    fn object_strips_undeclared_fields() {
        let schema = Schema::object([("a", Schema::integer())]);
        let value = schema.safe_parse(&json!({"a": 1, "b": 2})).unwrap();
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn optional_fields_may_be_missing() {
        let schema = Schema::object([("a", Schema::string().optional())]);
        assert_eq!(schema.safe_parse(&json!({})).unwrap(), json!({}));
    }

    #[test]
    fn nested_array_issues_carry_indices() {
        let schema = Schema::array(Schema::object([("id", Schema::integer())]));
        let issues = schema
            .safe_parse(&json!([{"id": 1}, {"id": "two"}, {"id": 3.5}]))
            .unwrap_err();
        let paths: Vec<String> = issues.iter().map(Issue::path_string).collect();
        assert_eq!(paths, vec!["1.id", "2.id"]);
    }

    #[test]
    fn coercion_converts_strings() {
        assert_eq!(
            Schema::integer().coerce().safe_parse(&json!("42")).unwrap(),
            json!(42)
        );
        assert_eq!(
            Schema::boolean().coerce().safe_parse(&json!("true")).unwrap(),
            json!(true)
        );
        assert_eq!(
            Schema::string().coerce().safe_parse(&json!(7)).unwrap(),
            json!("7")
        );
        assert!(Schema::integer().safe_parse(&json!("42")).is_err());
    }

    #[test]
    fn literal_and_nullable() {
        assert!(Schema::literal("on").safe_parse(&json!("on")).is_ok());
        assert!(Schema::literal("on").safe_parse(&json!("off")).is_err());
        assert!(Schema::string().nullable().safe_parse(&Value::Null).is_ok());
        assert!(Schema::string().safe_parse(&Value::Null).is_err());
    }

    #[test]
    fn record_validates_every_value() {
        let schema = Schema::record(Schema::string());
        let issues = schema
            .safe_parse(&json!({"a": "x", "b": 1, "c": true}))
            .unwrap_err();
        assert_eq!(issues.len(), 2);
    }

    #[test]
    fn kinds() {
        assert_eq!(Schema::string().kind(), SchemaKind::String);
        assert_eq!(Schema::integer().kind(), SchemaKind::Number);
        assert_eq!(Schema::record(Schema::any()).kind(), SchemaKind::Object);
        assert_eq!(Schema::literal(1).kind(), SchemaKind::Other);
    }
}
