//! Type-directed conversion between values and their JSON encoding.

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Number;
use serde_json::Value as JsonValue;
use serde_json::json;
use wdl_dx_ir::PrimitiveType;
use wdl_dx_ir::Struct;
use wdl_dx_ir::Type;
use wdl_dx_ir::Value;

use crate::Error;
use crate::FileDescCache;
use crate::JsonMap;
use crate::Result;
use crate::codec::file_link;
use crate::codec::is_forward_reference;
use crate::codec::parse_file_ref;
use crate::extract::map_entries;

/// Converts a value to JSON according to its declared type.
///
/// Every file must be a handle or a path resolved by the cache.
pub(crate) fn value_to_json(cache: &FileDescCache, ty: &Type, value: &Value) -> Result<JsonValue> {
    match (ty, value) {
        (Type::Optional(_), Value::Null) => Ok(JsonValue::Null),
        (Type::Optional(inner), value) => value_to_json(cache, inner, value),
        (_, Value::Null) => Err(Error::MalformedField(format!(
            "a value is required for non-optional type `{ty}`"
        ))),
        (Type::Primitive(PrimitiveType::Boolean), Value::Boolean(v)) => Ok(JsonValue::Bool(*v)),
        (Type::Primitive(PrimitiveType::Integer), Value::Integer(v)) => Ok(json!(v)),
        (Type::Primitive(PrimitiveType::Float), Value::Integer(v)) => Ok(json!(*v as f64)),
        (Type::Primitive(PrimitiveType::Float), Value::Float(v)) => Number::from_f64(*v)
            .map(JsonValue::Number)
            .ok_or_else(|| Error::MalformedField(format!("float `{v}` cannot be encoded as JSON"))),
        (Type::Primitive(PrimitiveType::String), Value::String(s)) => {
            Ok(JsonValue::String(s.to_string()))
        }
        (Type::Primitive(PrimitiveType::File), Value::File(file)) => {
            let handle = cache
                .resolve(file)
                .ok_or_else(|| Error::InvalidFileReference {
                    reference: file.to_string(),
                    reason: "the path was not resolved before serialization".to_string(),
                })?;
            Ok(file_link(&handle))
        }
        (Type::Array(array_ty), Value::Array(elements)) => {
            if array_ty.is_non_empty() && elements.is_empty() {
                return Err(Error::MalformedField(format!(
                    "an empty array cannot have type `{ty}`"
                )));
            }

            elements
                .iter()
                .map(|e| value_to_json(cache, array_ty.element_type(), e))
                .collect::<Result<Vec<_>>>()
                .map(JsonValue::Array)
        }
        (Type::Map(map_ty), Value::Map(entries)) => {
            let mut keys = Vec::with_capacity(entries.len());
            let mut values = Vec::with_capacity(entries.len());
            for (k, v) in entries.iter() {
                keys.push(value_to_json(cache, map_ty.key_type(), k)?);
                values.push(value_to_json(cache, map_ty.value_type(), v)?);
            }

            Ok(json!({ "keys": keys, "values": values }))
        }
        (Type::Struct(struct_ty), Value::Struct(s)) if struct_ty.name().as_str() == s.name() => {
            if let Some(unknown) = s
                .members()
                .keys()
                .find(|k| !struct_ty.members().contains_key(k.as_str()))
            {
                return Err(Error::MalformedField(format!(
                    "struct `{struct_ty}` does not have a member named `{unknown}`"
                )));
            }

            let mut fields = JsonMap::new();
            for (name, member_ty) in struct_ty.members() {
                let member = s.members().get(name).unwrap_or(&Value::Null);
                let json = value_to_json(cache, member_ty, member).map_err(|e| match e {
                    Error::MalformedField(msg) => {
                        Error::MalformedField(format!("member `{name}` of `{struct_ty}`: {msg}"))
                    }
                    e => e,
                })?;
                fields.insert(name.clone(), json);
            }

            Ok(JsonValue::Object(fields))
        }
        (Type::Hash, Value::Hash(map)) => Ok(JsonValue::Object((**map).clone())),
        _ => Err(Error::MalformedField(format!(
            "value `{value}` does not have type `{ty}`"
        ))),
    }
}

/// Converts JSON to a value according to its declared type.
///
/// Files are resolved through the cache; forward references are rejected
/// because they can only be resolved by the platform.
pub(crate) fn json_to_value(cache: &FileDescCache, ty: &Type, json: &JsonValue) -> Result<Value> {
    match (ty, json) {
        (Type::Optional(_), JsonValue::Null) => Ok(Value::Null),
        (Type::Optional(inner), json) => json_to_value(cache, inner, json),
        (Type::Primitive(PrimitiveType::Boolean), JsonValue::Bool(v)) => Ok(Value::Boolean(*v)),
        (Type::Primitive(PrimitiveType::Integer), JsonValue::Number(n)) => n
            .as_i64()
            .map(Value::Integer)
            .ok_or_else(|| Error::mismatch(ty, json)),
        (Type::Primitive(PrimitiveType::Float), JsonValue::Number(n)) => n
            .as_f64()
            .map(Value::Float)
            .ok_or_else(|| Error::mismatch(ty, json)),
        (Type::Primitive(PrimitiveType::String), JsonValue::String(s)) => {
            Ok(Value::new_string(s.as_str()))
        }
        (Type::Primitive(PrimitiveType::File), json) => {
            if is_forward_reference(json) {
                return Err(Error::MalformedField(format!(
                    "`{json}` is a deferred link and cannot be resolved locally"
                )));
            }

            let file = parse_file_ref(json).ok_or_else(|| Error::mismatch(ty, json))?;
            let handle = cache
                .resolve(&file)
                .ok_or_else(|| Error::InvalidFileReference {
                    reference: file.to_string(),
                    reason: "the path was not resolved".to_string(),
                })?;
            Ok(Value::from(handle))
        }
        (Type::Array(array_ty), JsonValue::Array(elements)) => {
            if array_ty.is_non_empty() && elements.is_empty() {
                return Err(Error::MalformedField(format!(
                    "an empty array cannot have type `{ty}`"
                )));
            }

            elements
                .iter()
                .map(|e| json_to_value(cache, array_ty.element_type(), e))
                .collect::<Result<Vec<_>>>()
                .map(|elements| Value::Array(Arc::new(elements)))
        }
        (Type::Map(map_ty), json) => map_entries(map_ty, json)?
            .iter()
            .map(|(k, v)| {
                Ok((
                    json_to_value(cache, map_ty.key_type(), k)?,
                    json_to_value(cache, map_ty.value_type(), v)?,
                ))
            })
            .collect::<Result<Vec<_>>>()
            .map(|entries| Value::Map(Arc::new(entries))),
        (Type::Struct(struct_ty), JsonValue::Object(fields)) => {
            if let Some(unknown) = fields
                .keys()
                .find(|k| !struct_ty.members().contains_key(k.as_str()))
            {
                return Err(Error::MalformedField(format!(
                    "struct `{struct_ty}` does not have a member named `{unknown}`"
                )));
            }

            let mut members = IndexMap::with_capacity(struct_ty.members().len());
            for (name, member_ty) in struct_ty.members() {
                let value = match fields.get(name) {
                    Some(json) => json_to_value(cache, member_ty, json)?,
                    None if member_ty.is_optional() => Value::Null,
                    None => {
                        return Err(Error::MalformedField(format!(
                            "struct `{struct_ty}` is missing required member `{name}`"
                        )));
                    }
                };

                members.insert(name.clone(), value);
            }

            Ok(Struct::new(struct_ty.name().as_str(), members).into())
        }
        (Type::Hash, JsonValue::Object(map)) => Ok(Value::Hash(Arc::new(map.clone()))),
        _ => Err(Error::mismatch(ty, json)),
    }
}
