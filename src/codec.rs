//! Wire encoding helpers.
//!
//! Platform field names may not contain dots, complex values are wrapped in
//! a single-key object, and large opaque blobs stored in executable details
//! are gzip-compressed and base64-encoded.

use std::io::Read;
use std::io::Write;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde_json::Value as JsonValue;
use serde_json::json;
use wdl_dx_ir::DxFile;
use wdl_dx_ir::DxPath;
use wdl_dx_ir::FILE_ID_PREFIX;
use wdl_dx_ir::FileRef;

use crate::Error;
use crate::Result;

/// The key of a platform link object.
pub const DX_LINK_KEY: &str = "$dnanexus_link";

/// The key wrapping a complex value in a wire field.
pub const COMPLEX_VALUE_KEY: &str = "___";

/// The suffix of the companion field listing the files of a complex value.
pub const FLAT_FILES_SUFFIX: &str = "___dxfiles";

/// The encoding of a dot in a field name.
const DOT_ENCODING: &str = "___";

/// Encodes the dots in a parameter name for use as a field name.
pub fn encode_dots(name: &str) -> String {
    name.replace('.', DOT_ENCODING)
}

/// Decodes a field name back to a parameter name.
pub fn decode_dots(name: &str) -> String {
    name.replace(DOT_ENCODING, ".")
}

/// Gets the name of the companion flat-files field for a field.
pub fn flat_files_field(field: &str) -> String {
    format!("{field}{FLAT_FILES_SUFFIX}")
}

/// Creates the link object for a file handle.
pub fn file_link(file: &DxFile) -> JsonValue {
    match file.project() {
        Some(project) => json!({ DX_LINK_KEY: { "project": project, "id": file.id() } }),
        None => json!({ DX_LINK_KEY: file.id() }),
    }
}

/// Parses a file reference from JSON.
///
/// Accepts a `dx://` path string, a bare `file-xxxx` identifier, or a link
/// object whose target is a file identifier.
///
/// Returns `None` if the JSON is not a file reference; in particular, a
/// forward reference to an execution output is not a file reference.
pub fn parse_file_ref(json: &JsonValue) -> Option<FileRef> {
    match json {
        JsonValue::String(s) => {
            if let Some(path) = DxPath::parse(s) {
                return Some(FileRef::Path(path));
            }

            s.starts_with(FILE_ID_PREFIX)
                .then(|| FileRef::Handle(DxFile::new(s.as_str(), None)))
        }
        JsonValue::Object(map) if map.len() == 1 => match map.get(DX_LINK_KEY)? {
            JsonValue::String(id) if id.starts_with(FILE_ID_PREFIX) => {
                Some(FileRef::Handle(DxFile::new(id.as_str(), None)))
            }
            JsonValue::Object(link) => {
                let id = link.get("id")?.as_str()?;
                if !id.starts_with(FILE_ID_PREFIX) {
                    return None;
                }

                let project = link
                    .get("project")
                    .and_then(JsonValue::as_str)
                    .map(str::to_string);
                Some(FileRef::Handle(DxFile::new(id, project)))
            }
            _ => None,
        },
        _ => None,
    }
}

/// Determines if the JSON is a forward reference to an execution output or a
/// workflow input.
///
/// Forward references are resolved by the platform and can never be
/// dereferenced locally.
pub fn is_forward_reference(json: &JsonValue) -> bool {
    json.get(DX_LINK_KEY)
        .and_then(JsonValue::as_object)
        .map(|link| {
            link.contains_key("job")
                || link.contains_key("analysis")
                || link.contains_key("workflowInputField")
        })
        .unwrap_or(false)
}

/// Unwraps a complex wire value.
///
/// Returns `None` if the value is not a `{"___": ...}` wrapper.
pub fn unwrap_complex(json: &JsonValue) -> Option<&JsonValue> {
    match json {
        JsonValue::Object(map) if map.len() == 1 => map.get(COMPLEX_VALUE_KEY),
        _ => None,
    }
}

/// Wraps a complex wire value.
pub fn wrap_complex(json: JsonValue) -> JsonValue {
    json!({ COMPLEX_VALUE_KEY: json })
}

/// Gzip-compresses and base64-encodes a string.
pub fn gzip_base64_encode(s: &str) -> Result<String> {
    let compress = || -> std::io::Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(s.as_bytes())?;
        encoder.finish()
    };

    compress()
        .map(|bytes| BASE64_STANDARD.encode(bytes))
        .map_err(|e| Error::MalformedField(format!("failed to compress blob: {e}")))
}

/// Decodes a base64-encoded, gzip-compressed string.
pub fn base64_gunzip_decode(s: &str) -> Result<String> {
    let bytes = BASE64_STANDARD
        .decode(s.trim())
        .map_err(|e| Error::MalformedField(format!("blob is not valid base64: {e}")))?;

    let mut decoder = GzDecoder::new(bytes.as_slice());
    let mut decoded = String::new();
    decoder
        .read_to_string(&mut decoded)
        .map_err(|e| Error::MalformedField(format!("blob is not valid gzip text: {e}")))?;
    Ok(decoded)
}
