//! Extraction of file references from typed JSON values.

use serde_json::Value as JsonValue;
use wdl_dx_ir::FileRef;
use wdl_dx_ir::MapType;
use wdl_dx_ir::PrimitiveType;
use wdl_dx_ir::Type;

use crate::Error;
use crate::Result;
use crate::codec::parse_file_ref;
use crate::codec::unwrap_complex;

/// Gets the entries of a JSON-encoded map.
///
/// A map is either a `{"keys": [...], "values": [...]}` pair or, when the
/// key type is a string or file, a plain JSON object.
///
/// The two encodings overlap: a plain object whose only members are `keys`
/// and `values`, both arrays, is read as the paired encoding. Maps are
/// always written in the paired encoding, so such an object is never
/// produced by serialization.
pub(crate) fn map_entries(
    ty: &MapType,
    json: &JsonValue,
) -> Result<Vec<(JsonValue, JsonValue)>> {
    let JsonValue::Object(map) = json else {
        return Err(Error::mismatch(ty, json));
    };

    if map.len() == 2
        && let (Some(JsonValue::Array(keys)), Some(JsonValue::Array(values))) =
            (map.get("keys"), map.get("values"))
    {
        if keys.len() != values.len() {
            return Err(Error::MalformedField(format!(
                "map has {keys} keys but {values} values",
                keys = keys.len(),
                values = values.len()
            )));
        }

        return Ok(keys.iter().cloned().zip(values.iter().cloned()).collect());
    }

    match ty.key_type().require() {
        Type::Primitive(PrimitiveType::String | PrimitiveType::File) => Ok(map
            .iter()
            .map(|(k, v)| (JsonValue::String(k.clone()), v.clone()))
            .collect()),
        _ => Err(Error::mismatch(ty, json)),
    }
}

/// Extracts every file reference embedded in a JSON value of the given
/// type.
///
/// An absent optional contributes no references, and neither does an
/// untyped object.
pub fn extract_files(ty: &Type, json: &JsonValue) -> Result<Vec<FileRef>> {
    let mut files = Vec::new();
    extract_into(ty, json, &mut files)?;
    Ok(files)
}

/// Extracts every file reference from a wire field.
///
/// This is the same as [`extract_files`] but accepts a complex value that is
/// still wrapped in its `{"___": ...}` wire envelope.
pub fn extract_field_files(ty: &Type, json: &JsonValue) -> Result<Vec<FileRef>> {
    extract_files(ty, unwrap_complex(json).unwrap_or(json))
}

/// Recursively extracts file references into the given vector.
fn extract_into(ty: &Type, json: &JsonValue, files: &mut Vec<FileRef>) -> Result<()> {
    match (ty, json) {
        (Type::Optional(_), JsonValue::Null) => Ok(()),
        (Type::Optional(inner), json) => extract_into(inner, json, files),
        (Type::Primitive(PrimitiveType::File), json) => {
            let file = parse_file_ref(json).ok_or_else(|| Error::mismatch(ty, json))?;
            files.push(file);
            Ok(())
        }
        (Type::Primitive(_), _) => Ok(()),
        (Type::Array(array_ty), JsonValue::Array(elements)) => {
            for element in elements {
                extract_into(array_ty.element_type(), element, files)?;
            }

            Ok(())
        }
        (Type::Map(map_ty), json) => {
            for (k, v) in map_entries(map_ty, json)? {
                extract_into(map_ty.key_type(), &k, files)?;
                extract_into(map_ty.value_type(), &v, files)?;
            }

            Ok(())
        }
        (Type::Struct(struct_ty), JsonValue::Object(fields)) => {
            for (name, member_ty) in struct_ty.members() {
                match fields.get(name) {
                    Some(value) => extract_into(member_ty, value, files)?,
                    None if member_ty.is_optional() => {}
                    None => {
                        return Err(Error::MalformedField(format!(
                            "struct `{struct_ty}` is missing required member `{name}`"
                        )));
                    }
                }
            }

            Ok(())
        }
        (Type::Hash, _) => Ok(()),
        (Type::Array(_), _) | (Type::Struct(_), _) => Err(Error::mismatch(ty, json)),
    }
}
