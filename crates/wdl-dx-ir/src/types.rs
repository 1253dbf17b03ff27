//! Representation of IR types.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

/// Represents a primitive IR type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    /// The type is a `Boolean`.
    Boolean,
    /// The type is an `Int`.
    Integer,
    /// The type is a `Float`.
    Float,
    /// The type is a `String`.
    String,
    /// The type is a `File`.
    File,
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean => write!(f, "Boolean"),
            Self::Integer => write!(f, "Int"),
            Self::Float => write!(f, "Float"),
            Self::String => write!(f, "String"),
            Self::File => write!(f, "File"),
        }
    }
}

/// Represents the type of an array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayType {
    /// The element type of the array.
    element: Box<Type>,
    /// Whether or not the array type is non-empty.
    non_empty: bool,
}

impl ArrayType {
    /// Constructs a new array type.
    pub fn new(element: impl Into<Type>) -> Self {
        Self {
            element: Box::new(element.into()),
            non_empty: false,
        }
    }

    /// Constructs a new non-empty array type.
    pub fn non_empty(element: impl Into<Type>) -> Self {
        Self {
            element: Box::new(element.into()),
            non_empty: true,
        }
    }

    /// Gets the array's element type.
    pub fn element_type(&self) -> &Type {
        &self.element
    }

    /// Determines if the array type is non-empty.
    pub fn is_non_empty(&self) -> bool {
        self.non_empty
    }
}

impl fmt::Display for ArrayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Array[{ty}]", ty = self.element)?;

        if self.non_empty {
            write!(f, "+")?;
        }

        Ok(())
    }
}

/// Represents the type of a map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapType {
    /// The key type of the map.
    key: Box<Type>,
    /// The value type of the map.
    value: Box<Type>,
}

impl MapType {
    /// Constructs a new map type.
    pub fn new(key: impl Into<Type>, value: impl Into<Type>) -> Self {
        Self {
            key: Box::new(key.into()),
            value: Box::new(value.into()),
        }
    }

    /// Gets the key type of the map.
    pub fn key_type(&self) -> &Type {
        &self.key
    }

    /// Gets the value type of the map.
    pub fn value_type(&self) -> &Type {
        &self.value
    }
}

impl fmt::Display for MapType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Map[{key}, {value}]", key = self.key, value = self.value)
    }
}

/// Represents the type of a struct (a named schema).
///
/// Member order is the declaration order and is significant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructType {
    /// The name of the struct.
    name: Arc<String>,
    /// The members of the struct.
    members: Arc<IndexMap<String, Type>>,
}

impl StructType {
    /// Constructs a new struct type definition.
    pub fn new<N, T>(name: impl Into<String>, members: impl IntoIterator<Item = (N, T)>) -> Self
    where
        N: Into<String>,
        T: Into<Type>,
    {
        Self {
            name: Arc::new(name.into()),
            members: Arc::new(
                members
                    .into_iter()
                    .map(|(n, ty)| (n.into(), ty.into()))
                    .collect(),
            ),
        }
    }

    /// Gets the name of the struct.
    pub fn name(&self) -> &Arc<String> {
        &self.name
    }

    /// Gets the members of the struct.
    pub fn members(&self) -> &IndexMap<String, Type> {
        &self.members
    }
}

impl fmt::Display for StructType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{name}", name = self.name)
    }
}

/// Represents an IR type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    /// The type is a primitive type.
    Primitive(PrimitiveType),
    /// The type is an array type.
    Array(ArrayType),
    /// The type is a map type.
    Map(MapType),
    /// The type is an optional type.
    Optional(Box<Type>),
    /// The type is a struct type.
    Struct(StructType),
    /// The type is an untyped object (a hash).
    Hash,
}

impl Type {
    /// Wraps the type in an optional type.
    ///
    /// An already optional type is returned unchanged.
    pub fn optional(self) -> Self {
        match self {
            Self::Optional(_) => self,
            ty => Self::Optional(Box::new(ty)),
        }
    }

    /// Determines if the type is optional.
    pub fn is_optional(&self) -> bool {
        matches!(self, Self::Optional(_))
    }

    /// Gets the type with any optional wrapper removed.
    pub fn require(&self) -> &Type {
        match self {
            Self::Optional(inner) => inner.require(),
            ty => ty,
        }
    }

    /// Casts the type to a primitive type.
    ///
    /// Returns `None` if the type is not primitive.
    pub fn as_primitive(&self) -> Option<PrimitiveType> {
        match self {
            Self::Primitive(ty) => Some(*ty),
            _ => None,
        }
    }

    /// Converts the type to an array type.
    ///
    /// Returns `None` if the type is not an array type.
    pub fn as_array(&self) -> Option<&ArrayType> {
        match self {
            Self::Array(ty) => Some(ty),
            _ => None,
        }
    }

    /// Converts the type to a map type.
    ///
    /// Returns `None` if the type is not a map type.
    pub fn as_map(&self) -> Option<&MapType> {
        match self {
            Self::Map(ty) => Some(ty),
            _ => None,
        }
    }

    /// Converts the type to a struct type.
    ///
    /// Returns `None` if the type is not a struct type.
    pub fn as_struct(&self) -> Option<&StructType> {
        match self {
            Self::Struct(ty) => Some(ty),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive(ty) => ty.fmt(f),
            Self::Array(ty) => ty.fmt(f),
            Self::Map(ty) => ty.fmt(f),
            Self::Optional(ty) => write!(f, "{ty}?"),
            Self::Struct(ty) => ty.fmt(f),
            Self::Hash => write!(f, "Object"),
        }
    }
}

impl From<PrimitiveType> for Type {
    fn from(ty: PrimitiveType) -> Self {
        Self::Primitive(ty)
    }
}

impl From<ArrayType> for Type {
    fn from(ty: ArrayType) -> Self {
        Self::Array(ty)
    }
}

impl From<MapType> for Type {
    fn from(ty: MapType) -> Self {
        Self::Map(ty)
    }
}

impl From<StructType> for Type {
    fn from(ty: StructType) -> Self {
        Self::Struct(ty)
    }
}
