use core::{fmt, marker::PhantomData};

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use super::{Issue, IssueCode, Issues, SchemaKind, Validator};

/// Validator backed by a serde type.
///
/// A value is valid when it deserializes into `T`; the validated value is `T`
/// serialized back, so serde defaults and renames apply.
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use serde_json::json;
/// use zenschema::schema::{Typed, Validator};
///
/// #[derive(Serialize, Deserialize)]
/// struct Todo {
///     id: u64,
///     #[serde(default)]
///     completed: bool,
/// }
///
/// let value = Typed::<Todo>::new().safe_parse(&json!({"id": 1})).unwrap();
/// assert_eq!(value, json!({"id": 1, "completed": false}));
/// ```
pub struct Typed<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> Typed<T> {
    /// Create the validator.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for Typed<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Typed<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Typed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Typed")
            .field("type", &core::any::type_name::<T>())
            .finish()
    }
}

impl<T> Validator for Typed<T>
where
    T: Serialize + DeserializeOwned,
{
    fn safe_parse(&self, input: &Value) -> Result<Value, Issues> {
        let typed: T = serde_json::from_value(input.clone())
            .map_err(|err| Issues::from(Issue::new(IssueCode::InvalidType, err.to_string())))?;
        serde_json::to_value(&typed).map_err(|err| Issues::from(Issue::custom(err.to_string())))
    }

    /// [`SchemaKind::String`] when `T` can be read from a JSON string, so
    /// `Typed::<String>` works with text responses.
    fn kind(&self) -> SchemaKind {
        if serde_json::from_value::<T>(Value::String(String::new())).is_ok() {
            SchemaKind::String
        } else {
            SchemaKind::Other
        }
    }
}
