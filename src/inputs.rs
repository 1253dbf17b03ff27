//! Implementation of input translation.
//!
//! An input document is a flat JSON object keyed by fully-qualified names
//! (e.g. `wf.x` or `wf.call.y`). Translation maps each key onto exactly one
//! declared parameter and produces the wire fields of the stage that
//! receives it.

use std::path::Path;

use serde_json::Value as JsonValue;
use tracing::debug;
use tracing::info;

use crate::Bundle;
use crate::BulkFileResolver;
use crate::CallableKind;
use crate::Error;
use crate::ExactlyOnce;
use crate::FileDescCache;
use crate::JsonMap;
use crate::Parameter;
use crate::ParameterLinkDeserializer;
use crate::ParameterLinkSerializer;
use crate::PlatformClient;
use crate::Result;

/// The identifier of the stage receiving the inputs of a workflow itself.
pub const COMMON_STAGE_ID: &str = "stage-common";

/// Parses an input document from a JSON file.
///
/// The document must be a JSON object.
pub fn read_input_document(path: impl AsRef<Path>) -> Result<JsonMap> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;

    match serde_json::from_str::<JsonValue>(&contents).map_err(|e| {
        Error::MalformedField(format!(
            "failed to parse input file `{path}`: {e}",
            path = path.display()
        ))
    })? {
        JsonValue::Object(map) => Ok(map),
        _ => Err(Error::MalformedField(format!(
            "input file `{path}` must contain a JSON object",
            path = path.display()
        ))),
    }
}

/// Translates an input document into the wire fields of a bundle's stages.
#[derive(Debug)]
pub struct InputTranslator<'a> {
    /// The bundle being translated.
    bundle: &'a Bundle,
    /// The tracker over the fields of the input document.
    tracker: ExactlyOnce,
    /// The descriptions of every file mentioned by the input document.
    cache: FileDescCache,
}

impl<'a> InputTranslator<'a> {
    /// Constructs a new translator.
    ///
    /// Every file mentioned by the inputs is resolved up front.
    pub fn new(
        bundle: &'a Bundle,
        name: impl Into<String>,
        inputs: JsonMap,
        client: &dyn PlatformClient,
    ) -> Result<Self> {
        let cache = BulkFileResolver::new(client).resolve_bundle(bundle, &inputs)?;
        Ok(Self::with_cache(bundle, name, inputs, cache))
    }

    /// Constructs a new translator with an already built file cache.
    pub fn with_cache(
        bundle: &'a Bundle,
        name: impl Into<String>,
        inputs: JsonMap,
        cache: FileDescCache,
    ) -> Self {
        Self {
            bundle,
            tracker: ExactlyOnce::new(name, inputs),
            cache,
        }
    }

    /// Gets the file cache built for the input document.
    pub fn cache(&self) -> &FileDescCache {
        &self.cache
    }

    /// Translates the inputs with the given prefix into the fields of a
    /// stage.
    ///
    /// The input for a parameter is looked up as `<prefix>.<name>`. When a
    /// stage identifier is given, every produced field is keyed as
    /// `<stage>.<field>`.
    pub fn translate_stage(
        &mut self,
        stage: Option<&str>,
        prefix: &str,
        params: &[Parameter],
    ) -> Result<JsonMap> {
        let deserializer = ParameterLinkDeserializer::new(&self.cache);
        let serializer = ParameterLinkSerializer::new(&self.cache);

        let mut fields = JsonMap::new();
        for param in params {
            let key = format!("{prefix}.{name}", name = param.name());
            let Some(json) = self.tracker.get(&key) else {
                continue;
            };

            let value = deserializer.json_to_value(param.ty(), &json).map_err(|e| match e {
                Error::MalformedField(msg) => {
                    Error::MalformedField(format!("input `{key}`: {msg}"))
                }
                e => e,
            })?;

            for (field, json) in serializer.create_fields(param.name(), param.ty(), &value)? {
                let field = match stage {
                    Some(stage) => format!("{stage}.{field}"),
                    None => field,
                };

                fields.insert(field, json);
            }
        }

        debug!(
            "translated {count} field(s) for `{prefix}`",
            count = fields.len()
        );
        Ok(fields)
    }

    /// Translates the inputs of the bundle's primary callable.
    ///
    /// For a workflow, the workflow's own inputs go to the common stage and
    /// each call's inputs go to the call's stage. For a task, the fields are
    /// not keyed by stage.
    ///
    /// Every field of the input document must be consumed.
    pub fn translate(mut self) -> Result<JsonMap> {
        let bundle = self.bundle;
        let primary = bundle.primary().ok_or_else(|| {
            Error::InvalidState("the bundle does not have a primary callable".to_string())
        })?;

        info!(
            "translating inputs `{name}` for `{callable}`",
            name = self.tracker.name(),
            callable = primary.name()
        );

        let mut fields = JsonMap::new();
        match primary.kind() {
            CallableKind::Task => {
                fields.extend(self.translate_stage(None, primary.name(), primary.inputs())?);
            }
            CallableKind::Workflow(stages) => {
                fields.extend(self.translate_stage(
                    Some(COMMON_STAGE_ID),
                    primary.name(),
                    primary.inputs(),
                )?);

                for stage in stages {
                    let callee = bundle.callable(stage.callee()).ok_or_else(|| {
                        Error::InvalidState(format!(
                            "stage `{stage}` calls unknown callable `{callee}`",
                            stage = stage.id(),
                            callee = stage.callee()
                        ))
                    })?;

                    let prefix = format!("{wf}.{call}", wf = primary.name(), call = stage.call());
                    fields.extend(self.translate_stage(
                        Some(stage.id()),
                        &prefix,
                        callee.inputs(),
                    )?);
                }
            }
        }

        self.finish()?;
        Ok(fields)
    }

    /// Finishes translation by checking that every input was consumed.
    pub fn finish(&self) -> Result<()> {
        self.tracker.check_all_used()
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wdl_dx_ir::PrimitiveType;
    use wdl_dx_ir::Type;

    use super::*;
    use crate::Callable;
    use crate::Stage;

    fn inputs(json: JsonValue) -> JsonMap {
        match json {
            JsonValue::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    fn bundle() -> Bundle {
        Bundle::new(Some("wf".to_string()), [
            Callable::task(
                "add",
                [
                    Parameter::new("a", PrimitiveType::Integer),
                    Parameter::new("b", Type::from(PrimitiveType::Integer).optional()),
                ],
                [Parameter::new("sum", PrimitiveType::Integer)],
            ),
            Callable::workflow(
                "wf",
                [
                    Parameter::new("x", PrimitiveType::Integer),
                    Parameter::new("y", PrimitiveType::String),
                ],
                Vec::new(),
                [Stage::new("stage-1", "add_1", "add")],
            ),
        ])
    }

    #[test]
    fn translates_a_stage() {
        let bundle = bundle();
        let mut translator = InputTranslator::with_cache(
            &bundle,
            "inputs.json",
            inputs(json!({"wf.x": 5, "wf.y": "hello"})),
            FileDescCache::new(),
        );

        let wf = bundle.callable("wf").unwrap();
        let fields = translator
            .translate_stage(Some("stage"), "wf", wf.inputs())
            .unwrap();
        assert_eq!(
            JsonValue::Object(fields),
            json!({"stage.x": 5, "stage.y": "hello"})
        );
        translator.finish().unwrap();
    }

    #[test]
    fn rejects_unused_inputs() {
        let bundle = bundle();
        let mut translator = InputTranslator::with_cache(
            &bundle,
            "inputs.json",
            inputs(json!({"wf.x": 5, "wf.y": "hello", "wf.z": true})),
            FileDescCache::new(),
        );

        let wf = bundle.callable("wf").unwrap();
        translator
            .translate_stage(Some("stage"), "wf", wf.inputs())
            .unwrap();
        assert_eq!(
            translator.finish().unwrap_err().to_string(),
            "input `inputs.json` has fields that do not map to any parameter: wf.z"
        );
    }

    #[test]
    fn translates_a_workflow() {
        let bundle = bundle();
        let fields = InputTranslator::with_cache(
            &bundle,
            "inputs.json",
            inputs(json!({"wf.x": 1, "wf.y": "a", "wf.add_1.a": 2})),
            FileDescCache::new(),
        )
        .translate()
        .unwrap();

        assert_eq!(
            JsonValue::Object(fields),
            json!({
                "stage-common.x": 1,
                "stage-common.y": "a",
                "stage-1.a": 2
            })
        );
    }

    #[test]
    fn reports_the_offending_input() {
        let bundle = bundle();
        let e = InputTranslator::with_cache(
            &bundle,
            "inputs.json",
            inputs(json!({"wf.x": "five"})),
            FileDescCache::new(),
        )
        .translate()
        .unwrap_err();
        assert_eq!(
            e.to_string(),
            "malformed field: input `wf.x`: cannot deserialize value `\"five\"` to type `Int`"
        );
    }
}
