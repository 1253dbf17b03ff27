//! Representation of IR values.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::DxFile;
use crate::FileRef;
use crate::PrimitiveType;
use crate::Type;

/// A type alias to a JSON map (object).
pub type JsonMap = serde_json::Map<String, serde_json::Value>;

/// Represents a struct value.
///
/// Members are stored in declaration order; an absent optional member is
/// stored as [`Value::Null`].
#[derive(Debug, Clone, PartialEq)]
pub struct Struct {
    /// The name of the struct's type.
    name: Arc<String>,
    /// The members of the struct.
    members: Arc<IndexMap<String, Value>>,
}

impl Struct {
    /// Constructs a new struct value.
    pub fn new<N, V>(name: impl Into<String>, members: impl IntoIterator<Item = (N, V)>) -> Self
    where
        N: Into<String>,
        V: Into<Value>,
    {
        Self {
            name: Arc::new(name.into()),
            members: Arc::new(
                members
                    .into_iter()
                    .map(|(n, v)| (n.into(), v.into()))
                    .collect(),
            ),
        }
    }

    /// Gets the name of the struct's type.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gets the members of the struct.
    pub fn members(&self) -> &IndexMap<String, Value> {
        &self.members
    }
}

/// Represents an IR value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// The value is absent (an unset optional).
    Null,
    /// The value is a `Boolean`.
    Boolean(bool),
    /// The value is an `Int`.
    Integer(i64),
    /// The value is a `Float`.
    Float(f64),
    /// The value is a `String`.
    String(Arc<String>),
    /// The value is a `File`.
    File(FileRef),
    /// The value is an `Array`.
    Array(Arc<Vec<Value>>),
    /// The value is a `Map`.
    ///
    /// Entries are kept in insertion order.
    Map(Arc<Vec<(Value, Value)>>),
    /// The value is a struct.
    Struct(Struct),
    /// The value is an untyped object.
    Hash(Arc<JsonMap>),
}

impl Value {
    /// Creates a new `String` value.
    pub fn new_string(s: impl Into<String>) -> Self {
        Self::String(Arc::new(s.into()))
    }

    /// Creates a new `Array` value.
    pub fn new_array<V: Into<Value>>(elements: impl IntoIterator<Item = V>) -> Self {
        Self::Array(Arc::new(elements.into_iter().map(Into::into).collect()))
    }

    /// Creates a new `Map` value.
    pub fn new_map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<Value>,
        V: Into<Value>,
    {
        Self::Map(Arc::new(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        ))
    }

    /// Determines if the value is `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Gets the value as a `Boolean`.
    ///
    /// Returns `None` if the value is not a `Boolean`.
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Self::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    /// Gets the value as an `Int`.
    ///
    /// Returns `None` if the value is not an `Int`.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Gets the value as a `Float`.
    ///
    /// Returns `None` if the value is not a `Float`.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Gets the value as a `String`.
    ///
    /// Returns `None` if the value is not a `String`.
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Gets the value as a `File`.
    ///
    /// Returns `None` if the value is not a `File`.
    pub fn as_file(&self) -> Option<&FileRef> {
        match self {
            Self::File(f) => Some(f),
            _ => None,
        }
    }

    /// Gets the value as an `Array`.
    ///
    /// Returns `None` if the value is not an `Array`.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(v) => Some(v),
            _ => None,
        }
    }

    /// Gets the value as a `Map`.
    ///
    /// Returns `None` if the value is not a `Map`.
    pub fn as_map(&self) -> Option<&[(Value, Value)]> {
        match self {
            Self::Map(v) => Some(v),
            _ => None,
        }
    }

    /// Gets the value as a struct.
    ///
    /// Returns `None` if the value is not a struct.
    pub fn as_struct(&self) -> Option<&Struct> {
        match self {
            Self::Struct(v) => Some(v),
            _ => None,
        }
    }

    /// Gets the value as an untyped object.
    ///
    /// Returns `None` if the value is not an untyped object.
    pub fn as_hash(&self) -> Option<&JsonMap> {
        match self {
            Self::Hash(v) => Some(v),
            _ => None,
        }
    }

    /// Determines if the value is compatible with the given type.
    ///
    /// This is a shallow structural check used to reject values that were
    /// paired with the wrong declared type; it does not coerce.
    pub fn matches(&self, ty: &Type) -> bool {
        match (ty, self) {
            (Type::Optional(_), Self::Null) => true,
            (Type::Optional(inner), v) => v.matches(inner),
            (Type::Primitive(PrimitiveType::Boolean), Self::Boolean(_))
            | (Type::Primitive(PrimitiveType::Integer), Self::Integer(_))
            | (Type::Primitive(PrimitiveType::Float), Self::Float(_) | Self::Integer(_))
            | (Type::Primitive(PrimitiveType::String), Self::String(_))
            | (Type::Primitive(PrimitiveType::File), Self::File(_))
            | (Type::Hash, Self::Hash(_)) => true,
            (Type::Array(ty), Self::Array(elements)) => {
                (!ty.is_non_empty() || !elements.is_empty())
                    && elements.iter().all(|e| e.matches(ty.element_type()))
            }
            (Type::Map(ty), Self::Map(entries)) => entries
                .iter()
                .all(|(k, v)| k.matches(ty.key_type()) && v.matches(ty.value_type())),
            (Type::Struct(ty), Self::Struct(s)) => {
                ty.name().as_str() == s.name()
                    && ty.members().iter().all(|(name, ty)| {
                        s.members()
                            .get(name)
                            .map(|v| v.matches(ty))
                            .unwrap_or_else(|| ty.is_optional())
                    })
            }
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "None"),
            Self::Boolean(v) => write!(f, "{v}"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v:?}"),
            Self::String(s) => write!(f, "\"{s}\""),
            Self::File(file) => write!(f, "\"{file}\""),
            Self::Array(elements) => {
                write!(f, "[")?;
                for (i, e) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{e}")?;
                }
                write!(f, "]")
            }
            Self::Map(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            Self::Struct(s) => {
                write!(f, "{name} {{", name = s.name())?;
                for (i, (k, v)) in s.members().iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, " {k}: {v}")?;
                }
                write!(f, " }}")
            }
            Self::Hash(map) => write!(f, "object {}", serde_json::Value::Object((**map).clone())),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::new_string(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::new_string(value)
    }
}

impl From<FileRef> for Value {
    fn from(value: FileRef) -> Self {
        Self::File(value)
    }
}

impl From<DxFile> for Value {
    fn from(value: DxFile) -> Self {
        Self::File(FileRef::Handle(value))
    }
}

impl From<Struct> for Value {
    fn from(value: Struct) -> Self {
        Self::Struct(value)
    }
}

impl From<JsonMap> for Value {
    fn from(value: JsonMap) -> Self {
        Self::Hash(Arc::new(value))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Null)
    }
}
