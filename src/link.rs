//! Implementation of parameter links: the wire form of job inputs and
//! outputs.
//!
//! A parameter is flattened into one or two platform fields. A "native"
//! parameter (a primitive, or an array of primitives) is a single field
//! holding the plain JSON value. Any other parameter is wrapped as
//! `{"___": json}` and paired with a `<name>___dxfiles` field listing every
//! file link inside the value, so the platform can grant access to them.

use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use serde_json::json;
use tracing::debug;
use wdl_dx_ir::FileRef;
use wdl_dx_ir::Type;
use wdl_dx_ir::Value;

use crate::Error;
use crate::FileDescCache;
use crate::JsonMap;
use crate::Result;
use crate::codec::DX_LINK_KEY;
use crate::codec::FLAT_FILES_SUFFIX;
use crate::codec::decode_dots;
use crate::codec::encode_dots;
use crate::codec::file_link;
use crate::codec::flat_files_field;
use crate::codec::unwrap_complex;
use crate::codec::wrap_complex;
use crate::extract_files;

mod json;

/// Represents a reference to an execution that has been launched but not
/// necessarily completed.
///
/// An execution reference can only be written into a wire field for the
/// platform to resolve; it cannot be resolved locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionRef {
    /// The execution is a job.
    Job(String),
    /// The execution is a stage of an analysis.
    Analysis {
        /// The analysis identifier.
        id: String,
        /// The stage identifier.
        stage: String,
    },
}

impl ExecutionRef {
    /// Creates the forward-reference JSON for a field of the execution's
    /// output.
    fn link(&self, field: &str) -> JsonValue {
        match self {
            Self::Job(id) => json!({ DX_LINK_KEY: { "job": id, "field": field } }),
            Self::Analysis { id, stage } => {
                json!({ DX_LINK_KEY: { "analysis": id, "stage": stage, "field": field } })
            }
        }
    }
}

/// Represents a typed parameter in its wire form.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterLink {
    /// The parameter is a concrete value.
    Value {
        /// The declared type of the parameter.
        ty: Type,
        /// The JSON encoding of the value.
        json: JsonValue,
    },
    /// The parameter is the output of another execution.
    Exec {
        /// The execution producing the output.
        execution: ExecutionRef,
        /// The name of the output.
        output: String,
        /// The declared type of the parameter.
        ty: Type,
    },
    /// The parameter is an input of the enclosing workflow.
    WorkflowInput {
        /// The name of the workflow input.
        name: String,
        /// The declared type of the parameter.
        ty: Type,
    },
}

impl ParameterLink {
    /// Gets the declared type of the link.
    pub fn ty(&self) -> &Type {
        match self {
            Self::Value { ty, .. } | Self::Exec { ty, .. } | Self::WorkflowInput { ty, .. } => ty,
        }
    }

    /// Determines if the link holds a value that can be read locally.
    ///
    /// Links to execution outputs and workflow inputs are only resolved by
    /// the platform.
    pub fn is_locally_resolvable(&self) -> bool {
        matches!(self, Self::Value { .. })
    }
}

/// Determines if a type is encoded as a single plain field.
///
/// Native types are primitives and arrays of primitives, optionally
/// wrapped in an optional.
pub fn is_native(ty: &Type) -> bool {
    match ty.require() {
        Type::Primitive(_) => true,
        Type::Array(array_ty) => matches!(array_ty.element_type(), Type::Primitive(_)),
        Type::Map(_) | Type::Struct(_) | Type::Hash | Type::Optional(_) => false,
    }
}

/// Serializes values and links into wire fields.
#[derive(Debug, Clone, Copy)]
pub struct ParameterLinkSerializer<'a> {
    /// The cache used to resolve file paths.
    cache: &'a FileDescCache,
}

impl<'a> ParameterLinkSerializer<'a> {
    /// Constructs a new serializer.
    ///
    /// Every file path serialized must have been resolved into the cache.
    pub fn new(cache: &'a FileDescCache) -> Self {
        Self { cache }
    }

    /// Converts a value to JSON according to its declared type.
    pub fn value_to_json(&self, ty: &Type, value: &Value) -> Result<JsonValue> {
        json::value_to_json(self.cache, ty, value)
    }

    /// Creates a link for a concrete value.
    pub fn create_link(&self, ty: &Type, value: &Value) -> Result<ParameterLink> {
        Ok(ParameterLink::Value {
            ty: ty.clone(),
            json: self.value_to_json(ty, value)?,
        })
    }

    /// Creates the wire fields of a named parameter holding a value.
    ///
    /// An absent optional produces no fields.
    pub fn create_fields(&self, name: &str, ty: &Type, value: &Value) -> Result<JsonMap> {
        let link = self.create_link(ty, value)?;
        self.create_fields_from_link(&link, name)
    }

    /// Creates the wire fields of a named parameter from a link.
    pub fn create_fields_from_link(&self, link: &ParameterLink, name: &str) -> Result<JsonMap> {
        let field = encode_dots(name);
        let native = is_native(link.ty());
        let mut fields = JsonMap::new();

        match link {
            ParameterLink::Value { json: JsonValue::Null, ty } if ty.is_optional() => {}
            ParameterLink::Value { ty, json } if native => {
                debug!("serializing native field `{field}` of type `{ty}`");
                fields.insert(field, json.clone());
            }
            ParameterLink::Value { ty, json } => {
                let files = extract_files(ty, json)?
                    .iter()
                    .map(|f| match f {
                        FileRef::Handle(handle) => Ok(file_link(handle)),
                        FileRef::Path(path) => Err(Error::InvalidFileReference {
                            reference: path.to_string(),
                            reason: "the path was not resolved before serialization".to_string(),
                        }),
                    })
                    .collect::<Result<Vec<_>>>()?;

                debug!(
                    "serializing complex field `{field}` of type `{ty}` with {count} file(s)",
                    count = files.len()
                );
                fields.insert(flat_files_field(&field), JsonValue::Array(files));
                fields.insert(field, wrap_complex(json.clone()));
            }
            ParameterLink::Exec {
                execution, output, ..
            } => {
                let output = encode_dots(output);
                if !native {
                    fields.insert(
                        flat_files_field(&field),
                        execution.link(&flat_files_field(&output)),
                    );
                }

                fields.insert(field, execution.link(&output));
            }
            ParameterLink::WorkflowInput { name, .. } => {
                let input = encode_dots(name);
                if !native {
                    fields.insert(
                        flat_files_field(&field),
                        json!({ DX_LINK_KEY: { "workflowInputField": flat_files_field(&input) } }),
                    );
                }

                fields.insert(field, json!({ DX_LINK_KEY: { "workflowInputField": input } }));
            }
        }

        Ok(fields)
    }
}

/// Deserializes wire fields into values.
#[derive(Debug, Clone, Copy)]
pub struct ParameterLinkDeserializer<'a> {
    /// The cache used to attach file descriptions.
    cache: &'a FileDescCache,
}

impl<'a> ParameterLinkDeserializer<'a> {
    /// Constructs a new deserializer.
    pub fn new(cache: &'a FileDescCache) -> Self {
        Self { cache }
    }

    /// Converts JSON to a value according to its declared type.
    pub fn json_to_value(&self, ty: &Type, json: &JsonValue) -> Result<Value> {
        json::json_to_value(self.cache, ty, json)
    }

    /// Deserializes the wire fields of the declared parameters.
    ///
    /// A missing optional parameter is `Null`; a missing required parameter
    /// is omitted from the result. Fields that do not belong to a declared
    /// parameter are ignored.
    pub fn deserialize_input_map(
        &self,
        declared: &IndexMap<String, Type>,
        wire: &JsonMap,
    ) -> Result<IndexMap<String, Value>> {
        let mut values = IndexMap::with_capacity(declared.len());
        for (name, ty) in declared {
            let field = encode_dots(name);
            let json = match wire.get(&field) {
                Some(json) => json,
                None if ty.is_optional() => {
                    values.insert(name.clone(), Value::Null);
                    continue;
                }
                None => {
                    debug!("required input `{name}` is not present");
                    continue;
                }
            };

            let value = if is_native(ty) || json.is_null() {
                self.json_to_value(ty, json)?
            } else {
                let inner = unwrap_complex(json).ok_or_else(|| {
                    Error::MalformedField(format!(
                        "field `{field}` of type `{ty}` is not a wrapped complex value"
                    ))
                })?;
                self.json_to_value(ty, inner)?
            };

            values.insert(name.clone(), value);
        }

        for field in wire.keys() {
            let name = field.strip_suffix(FLAT_FILES_SUFFIX).unwrap_or(field);
            if !declared.contains_key(&decode_dots(name)) {
                debug!("ignoring undeclared input field `{field}`");
            }
        }

        Ok(values)
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;
    use wdl_dx_ir::ArrayType;
    use wdl_dx_ir::DxFile;
    use wdl_dx_ir::FileDescribe;
    use wdl_dx_ir::MapType;
    use wdl_dx_ir::PrimitiveType;
    use wdl_dx_ir::Struct;
    use wdl_dx_ir::StructType;

    use super::*;

    fn file(id: &str) -> Value {
        DxFile::new(id, Some("project-1".to_string())).into()
    }

    fn to_map(value: JsonValue) -> JsonMap {
        match value {
            JsonValue::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn native_types() {
        let int = Type::from(PrimitiveType::Integer);
        assert!(is_native(&int));
        assert!(is_native(&ArrayType::new(PrimitiveType::File).into()));
        assert!(is_native(&Type::from(ArrayType::new(PrimitiveType::File)).optional()));
        assert!(!is_native(&ArrayType::new(int.clone().optional()).into()));
        assert!(!is_native(&ArrayType::new(ArrayType::new(int.clone())).into()));
        assert!(!is_native(&MapType::new(PrimitiveType::String, int).into()));
        assert!(!is_native(&Type::Hash));
    }

    #[test]
    fn native_fields() {
        let cache = FileDescCache::new();
        let serializer = ParameterLinkSerializer::new(&cache);
        let ty = Type::from(ArrayType::new(PrimitiveType::File));
        let fields = serializer
            .create_fields("call.reads", &ty, &Value::new_array([file("file-1")]))
            .unwrap();
        assert_eq!(
            JsonValue::Object(fields),
            json!({
                "call___reads": [{"$dnanexus_link": {"project": "project-1", "id": "file-1"}}]
            })
        );

        let ty = Type::from(PrimitiveType::Integer).optional();
        assert!(serializer.create_fields("x", &ty, &Value::Null).unwrap().is_empty());
    }

    #[test]
    fn complex_fields_round_trip() {
        let cache = FileDescCache::new();
        let ty = Type::from(MapType::new(
            PrimitiveType::String,
            StructType::new(
                "Pair",
                [("left", PrimitiveType::File), ("right", PrimitiveType::File)],
            ),
        ));
        let value = Value::new_map([(
            "a",
            Struct::new("Pair", [("left", file("file-1")), ("right", file("file-2"))]),
        )]);

        let fields = ParameterLinkSerializer::new(&cache)
            .create_fields("pairs", &ty, &value)
            .unwrap();
        assert_eq!(
            fields["pairs___dxfiles"],
            json!([
                {"$dnanexus_link": {"project": "project-1", "id": "file-1"}},
                {"$dnanexus_link": {"project": "project-1", "id": "file-2"}}
            ])
        );
        assert_eq!(
            fields["pairs"]["___"]["keys"],
            json!(["a"])
        );

        let declared = IndexMap::from([("pairs".to_string(), ty)]);
        let values = ParameterLinkDeserializer::new(&cache)
            .deserialize_input_map(&declared, &fields)
            .unwrap();
        assert_eq!(values["pairs"], value);
    }

    #[test]
    fn input_map_absences() {
        let cache = FileDescCache::new();
        let declared = IndexMap::from([
            ("a.x".to_string(), Type::from(PrimitiveType::Integer)),
            ("a.y".to_string(), Type::from(PrimitiveType::String).optional()),
            ("a.z".to_string(), Type::from(PrimitiveType::Float)),
        ]);
        let wire = to_map(json!({"a___x": 1, "unknown": true}));

        let values = ParameterLinkDeserializer::new(&cache)
            .deserialize_input_map(&declared, &wire)
            .unwrap();
        assert_eq!(
            values,
            IndexMap::from([
                ("a.x".to_string(), Value::from(1i64)),
                ("a.y".to_string(), Value::Null),
            ])
        );
    }

    #[test]
    fn unwrapped_complex_fields_are_rejected() {
        let cache = FileDescCache::new();
        let declared = IndexMap::from([("h".to_string(), Type::Hash)]);
        let e = ParameterLinkDeserializer::new(&cache)
            .deserialize_input_map(&declared, &to_map(json!({"h": {"a": 1}})))
            .unwrap_err();
        assert!(matches!(e, Error::MalformedField(_)));
    }

    #[test]
    fn file_descriptions_are_attached() {
        let describe = Arc::new(FileDescribe {
            id: "file-1".to_string(),
            project: "project-1".to_string(),
            name: "reads.fq".to_string(),
            folder: "/data".to_string(),
            size: Some(42),
        });
        let cache = crate::BulkFileResolver::new(&StaticClient(describe.clone()))
            .resolve_refs([FileRef::Handle(DxFile::new("file-1", None))])
            .unwrap();

        let value = ParameterLinkDeserializer::new(&cache)
            .json_to_value(
                &PrimitiveType::File.into(),
                &json!({"$dnanexus_link": "file-1"}),
            )
            .unwrap();
        let handle = value.as_file().and_then(FileRef::as_handle).unwrap();
        assert_eq!(handle.describe(), Some(describe.as_ref()));
    }

    #[test]
    fn execution_links() {
        let cache = FileDescCache::new();
        let serializer = ParameterLinkSerializer::new(&cache);
        let link = ParameterLink::Exec {
            execution: ExecutionRef::Job("job-1".to_string()),
            output: "call.out".to_string(),
            ty: PrimitiveType::File.into(),
        };
        assert!(!link.is_locally_resolvable());
        assert_eq!(
            JsonValue::Object(serializer.create_fields_from_link(&link, "out").unwrap()),
            json!({"out": {"$dnanexus_link": {"job": "job-1", "field": "call___out"}}})
        );

        let link = ParameterLink::Exec {
            execution: ExecutionRef::Analysis {
                id: "analysis-1".to_string(),
                stage: "stage-1".to_string(),
            },
            output: "m".to_string(),
            ty: MapType::new(PrimitiveType::String, PrimitiveType::File).into(),
        };
        assert_eq!(
            JsonValue::Object(serializer.create_fields_from_link(&link, "m").unwrap()),
            json!({
                "m": {"$dnanexus_link": {
                    "analysis": "analysis-1",
                    "stage": "stage-1",
                    "field": "m"
                }},
                "m___dxfiles": {"$dnanexus_link": {
                    "analysis": "analysis-1",
                    "stage": "stage-1",
                    "field": "m___dxfiles"
                }}
            })
        );

        let link = ParameterLink::WorkflowInput {
            name: "x".to_string(),
            ty: PrimitiveType::Integer.into(),
        };
        assert!(!link.is_locally_resolvable());
        assert_eq!(
            JsonValue::Object(serializer.create_fields_from_link(&link, "stage.x").unwrap()),
            json!({"stage___x": {"$dnanexus_link": {"workflowInputField": "x"}}})
        );

        let declared = IndexMap::from([("out".to_string(), Type::from(PrimitiveType::File))]);
        let wire = to_map(json!({"out": {"$dnanexus_link": {"job": "job-1", "field": "out"}}}));
        assert!(
            ParameterLinkDeserializer::new(&cache)
                .deserialize_input_map(&declared, &wire)
                .is_err()
        );
    }

    /// A client that describes every object as the same file.
    struct StaticClient(Arc<FileDescribe>);

    impl crate::PlatformClient for StaticClient {
        fn resolve_paths(
            &self,
            _: &[wdl_dx_ir::DxPath],
        ) -> std::result::Result<
            std::collections::HashMap<wdl_dx_ir::DxPath, crate::ObjectHandle>,
            crate::PlatformError,
        > {
            Ok(Default::default())
        }

        fn describe_objects(
            &self,
            _: &[crate::ObjectHandle],
        ) -> std::result::Result<Vec<crate::ObjectDescribe>, crate::PlatformError> {
            Ok(vec![crate::ObjectDescribe {
                id: self.0.id.clone(),
                class: crate::FILE_CLASS.to_string(),
                project: self.0.project.clone(),
                name: self.0.name.clone(),
                folder: self.0.folder.clone(),
                size: self.0.size,
            }])
        }

        fn describe_job(
            &self,
            id: &str,
        ) -> std::result::Result<crate::JobDescribe, crate::PlatformError> {
            Err(crate::PlatformError::NotFound(id.to_string()))
        }

        fn describe_executable(
            &self,
            id: &str,
        ) -> std::result::Result<crate::ExecutableDescribe, crate::PlatformError> {
            Err(crate::PlatformError::NotFound(id.to_string()))
        }

        fn describe_project(
            &self,
            id: &str,
        ) -> std::result::Result<crate::ProjectDescribe, crate::PlatformError> {
            Err(crate::PlatformError::NotFound(id.to_string()))
        }
    }
}
