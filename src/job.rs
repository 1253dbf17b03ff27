//! Implementation of the metadata context of an executing job.
//!
//! A job process reads its inputs and the details of its job and executable
//! through a [`JobMetadataSource`], runs the task, and finally writes either
//! an output artifact or an error artifact, never both.

use std::any::Any;
use std::cell::Cell;
use std::cell::OnceCell;
use std::cell::RefCell;
use std::collections::HashSet;
use std::error::Error as _;
use std::fmt;
use std::panic;
use std::panic::AssertUnwindSafe;

use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use serde_json::json;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;
use wdl_dx_ir::FileRef;
use wdl_dx_ir::Type;
use wdl_dx_ir::Value;

use crate::AccessLevel;
use crate::BulkFileResolver;
use crate::Error;
use crate::FileDescCache;
use crate::JsonMap;
use crate::ParameterLink;
use crate::ParameterLinkDeserializer;
use crate::ParameterLinkSerializer;
use crate::PlatformClient;
use crate::Result;
use crate::codec::base64_gunzip_decode;
use crate::config::RUNTIME_ATTRIBUTE_KEYS;
use crate::config::check_keys;
use crate::resolver::job_file_refs;

pub mod fixture;
mod instance;
mod worker;

pub use instance::*;
pub use worker::*;

/// The job detail holding the index of the first element of a scatter
/// chunk.
pub const SCATTER_START_DETAIL: &str = "continueStart";

/// The executable detail holding the size of a scatter chunk.
pub const SCATTER_CHUNK_SIZE_DETAIL: &str = "scatterChunkSize";

/// The executable detail holding the compressed instance-type table.
pub const INSTANCE_TYPE_DB_DETAIL: &str = "instanceTypeDB";

/// The executable detail holding the default runtime attributes.
pub const RUNTIME_ATTRIBUTES_DETAIL: &str = "runtimeAttrs";

/// The executable details holding the compressed source text, newest first.
pub const SOURCE_CODE_DETAILS: &[&str] = &["sourceCode", "womSourceCode"];

/// The executable details holding the source language, newest first.
pub const LANGUAGE_DETAILS: &[&str] = &["language", "wdlVersion"];

/// The executable detail holding whether workspace destruction is delayed.
pub const DELAY_WORKSPACE_DESTRUCTION_DETAIL: &str = "delayWorkspaceDestruction";

/// The executable detail holding the path of the block a job executes.
pub const BLOCK_PATH_DETAIL: &str = "blockPath";

/// The default number of scatter elements a single job executes.
pub const DEFAULT_SCATTER_CHUNK_SIZE: usize = 500;

/// The maximum number of scatter elements a single job executes.
pub const MAX_SCATTER_CHUNK_SIZE: usize = 1000;

/// The maximum length, in characters, of an error artifact message.
pub const MAX_ERROR_MESSAGE_LEN: usize = 8192;

/// Represents the state of a job process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// The job's inputs have not been read.
    Uninitialized,
    /// The job's inputs have been read.
    InputsLoaded,
    /// The job's output artifact has been written.
    OutputsWritten,
    /// The job's error artifact has been written.
    ErrorWritten,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::InputsLoaded => write!(f, "inputs loaded"),
            Self::OutputsWritten => write!(f, "outputs written"),
            Self::ErrorWritten => write!(f, "error written"),
        }
    }
}

/// Represents an artifact written by a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Artifact {
    /// The output artifact.
    Output,
    /// The error artifact.
    Error,
}

impl Artifact {
    /// Gets the file name of the artifact in the job's home directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Output => "job_output.json",
            Self::Error => "job_error.json",
        }
    }
}

/// Represents the language of the source a job executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceLanguage {
    /// WDL `draft-2`.
    WdlDraft2,
    /// WDL 1.0.
    Wdl1_0,
    /// WDL 1.1.
    Wdl1_1,
    /// WDL 1.2.
    Wdl1_2,
}

impl SourceLanguage {
    /// Parses a source language from its detail value.
    ///
    /// Both version strings (`1.0`) and language tags (`WDL_v1.0`) are
    /// accepted.
    pub fn parse(s: &str) -> Option<Self> {
        let version = s
            .strip_prefix("WDL_v")
            .or_else(|| s.strip_prefix("WDL_"))
            .unwrap_or(s);

        match version {
            "draft-2" | "draft2" => Some(Self::WdlDraft2),
            "1.0" | "1_0" => Some(Self::Wdl1_0),
            "1.1" | "1_1" => Some(Self::Wdl1_1),
            "1.2" | "1_2" => Some(Self::Wdl1_2),
            _ => None,
        }
    }
}

impl fmt::Display for SourceLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WdlDraft2 => write!(f, "WDL draft-2"),
            Self::Wdl1_0 => write!(f, "WDL 1.0"),
            Self::Wdl1_1 => write!(f, "WDL 1.1"),
            Self::Wdl1_2 => write!(f, "WDL 1.2"),
        }
    }
}

/// A trait implemented by sources of job metadata.
pub trait JobMetadataSource {
    /// Reads the raw wire inputs of the job.
    fn raw_inputs(&self) -> Result<JsonMap>;

    /// Gets a detail of the job.
    fn job_detail(&self, name: &str) -> Result<Option<JsonValue>>;

    /// Gets a detail of the job's executable.
    fn executable_detail(&self, name: &str) -> Result<Option<JsonValue>>;

    /// Gets the identifier of the project the job runs in.
    fn project(&self) -> Result<String>;

    /// Gets the platform client.
    fn client(&self) -> &dyn PlatformClient;

    /// Writes an artifact of the job.
    fn write_artifact(&self, artifact: Artifact, json: &JsonValue) -> Result<()>;
}

/// Initializes a one-time slot with a fallible function.
fn init<T>(cell: &OnceCell<T>, f: impl FnOnce() -> Result<T>) -> Result<&T> {
    if let Some(value) = cell.get() {
        return Ok(value);
    }

    let value = f()?;
    Ok(cell.get_or_init(|| value))
}

/// Formats the payload of a panic for display.
fn format_panic_payload(payload: &Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Collects the unresolved paths of a value.
fn collect_paths(value: &Value, files: &mut Vec<FileRef>) {
    match value {
        Value::File(file @ FileRef::Path(_)) => files.push(file.clone()),
        Value::Array(elements) => elements.iter().for_each(|e| collect_paths(e, files)),
        Value::Map(entries) => entries.iter().for_each(|(k, v)| {
            collect_paths(k, files);
            collect_paths(v, files);
        }),
        Value::Struct(s) => s.members().values().for_each(|v| collect_paths(v, files)),
        Value::Null
        | Value::Boolean(_)
        | Value::Integer(_)
        | Value::Float(_)
        | Value::String(_)
        | Value::File(FileRef::Handle(_))
        | Value::Hash(_) => {}
    }
}

/// Builds the message of an error artifact.
///
/// The message includes the error's sources, has control characters
/// replaced, and is truncated to [`MAX_ERROR_MESSAGE_LEN`] characters.
fn sanitize_error_message(e: &Error) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(e) = source {
        message.push_str(": ");
        message.push_str(&e.to_string());
        source = e.source();
    }

    let mut sanitized: String = message
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .take(MAX_ERROR_MESSAGE_LEN)
        .collect();

    if message.chars().count() > MAX_ERROR_MESSAGE_LEN {
        sanitized.push_str("...");
    }

    sanitized
}

/// Exposes the metadata of an executing job.
///
/// Every accessor reads its detail at most once.
pub struct JobMetaContext<S> {
    /// The source of the job metadata.
    source: S,
    /// The state of the job.
    state: Cell<JobState>,
    /// The raw wire inputs.
    raw_inputs: OnceCell<JsonMap>,
    /// The descriptions of the files referenced by the job's inputs.
    file_cache: RefCell<FileDescCache>,
    /// The inputs whose files have been resolved into the file cache.
    resolved_inputs: RefCell<HashSet<String>>,
    /// The instance-type table.
    instance_type_db: OnceCell<InstanceTypeDb>,
    /// The index of the first element of the job's scatter chunk.
    scatter_start: OnceCell<usize>,
    /// The size of a scatter chunk.
    scatter_size: OnceCell<usize>,
    /// The default runtime attributes.
    runtime_attributes: OnceCell<JsonMap>,
    /// The source language.
    language: OnceCell<SourceLanguage>,
    /// The source text.
    source_text: OnceCell<String>,
    /// Whether or not workspace destruction is delayed.
    delay_workspace_destruction: OnceCell<bool>,
    /// The path of the block the job executes.
    block_path: OnceCell<Vec<usize>>,
}

impl<S: JobMetadataSource> JobMetaContext<S> {
    /// Constructs a new job metadata context.
    pub fn new(source: S) -> Self {
        Self {
            source,
            state: Cell::new(JobState::Uninitialized),
            raw_inputs: OnceCell::new(),
            file_cache: RefCell::new(FileDescCache::new()),
            resolved_inputs: RefCell::new(HashSet::new()),
            instance_type_db: OnceCell::new(),
            scatter_start: OnceCell::new(),
            scatter_size: OnceCell::new(),
            runtime_attributes: OnceCell::new(),
            language: OnceCell::new(),
            source_text: OnceCell::new(),
            delay_workspace_destruction: OnceCell::new(),
            block_path: OnceCell::new(),
        }
    }

    /// Gets the source of the job metadata.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Gets the state of the job.
    pub fn state(&self) -> JobState {
        self.state.get()
    }

    /// Gets the raw wire inputs of the job.
    pub fn raw_inputs(&self) -> Result<&JsonMap> {
        init(&self.raw_inputs, || {
            let inputs = self.source.raw_inputs()?;
            info!("loaded {count} raw input field(s)", count = inputs.len());
            if self.state.get() == JobState::Uninitialized {
                self.state.set(JobState::InputsLoaded);
            }

            Ok(inputs)
        })
    }

    /// Gets the values of the job's declared inputs.
    ///
    /// Only the files referenced by the declared inputs are resolved. Files
    /// of an input are resolved once; a later call declaring additional
    /// inputs issues one batch of requests for the files that are not yet
    /// cached.
    pub fn input_values(
        &self,
        declared: &IndexMap<String, Type>,
    ) -> Result<IndexMap<String, Value>> {
        let inputs = self.raw_inputs()?;
        let unresolved: Vec<_> = {
            let resolved = self.resolved_inputs.borrow();
            declared
                .iter()
                .filter(|(name, _)| !resolved.contains(name.as_str()))
                .collect()
        };

        if !unresolved.is_empty() {
            let files: Vec<_> = job_file_refs(unresolved.iter().copied(), inputs)?
                .into_iter()
                .filter(|f| !self.file_cache.borrow().contains(f))
                .collect();

            if !files.is_empty() {
                let cache = BulkFileResolver::new(self.source.client()).resolve_refs(files)?;
                self.file_cache.borrow_mut().merge(cache);
            }

            self.resolved_inputs
                .borrow_mut()
                .extend(unresolved.into_iter().map(|(name, _)| name.clone()));
        }

        ParameterLinkDeserializer::new(&self.file_cache.borrow())
            .deserialize_input_map(declared, inputs)
    }

    /// Gets a non-negative integer detail.
    fn usize_detail(name: &str, value: &JsonValue) -> Result<usize> {
        value
            .as_u64()
            .and_then(|v| usize::try_from(v).ok())
            .ok_or_else(|| {
                Error::MalformedField(format!(
                    "detail `{name}` must be a non-negative integer, but found `{value}`"
                ))
            })
    }

    /// Gets the index of the first element of the job's scatter chunk.
    ///
    /// Defaults to zero.
    pub fn scatter_start(&self) -> Result<usize> {
        init(&self.scatter_start, || {
            match self.source.job_detail(SCATTER_START_DETAIL)? {
                Some(value) => Self::usize_detail(SCATTER_START_DETAIL, &value),
                None => {
                    debug!("job detail `{SCATTER_START_DETAIL}` is not present; starting at 0");
                    Ok(0)
                }
            }
        })
        .copied()
    }

    /// Gets the number of scatter elements a single job executes.
    ///
    /// Defaults to [`DEFAULT_SCATTER_CHUNK_SIZE`].
    pub fn scatter_size(&self) -> Result<usize> {
        init(&self.scatter_size, || {
            let Some(value) = self.source.executable_detail(SCATTER_CHUNK_SIZE_DETAIL)? else {
                warn!(
                    "executable detail `{SCATTER_CHUNK_SIZE_DETAIL}` is not present; using the \
                     default chunk size of {DEFAULT_SCATTER_CHUNK_SIZE}"
                );
                return Ok(DEFAULT_SCATTER_CHUNK_SIZE);
            };

            let size = Self::usize_detail(SCATTER_CHUNK_SIZE_DETAIL, &value)?;
            if !(1..=MAX_SCATTER_CHUNK_SIZE).contains(&size) {
                return Err(Error::MalformedField(format!(
                    "detail `{SCATTER_CHUNK_SIZE_DETAIL}` must be between 1 and \
                     {MAX_SCATTER_CHUNK_SIZE}, but found {size}"
                )));
            }

            Ok(size)
        })
        .copied()
    }

    /// Gets a required string detail that is base64-encoded and gzipped.
    fn compressed_detail(name: &str, value: &JsonValue) -> Result<String> {
        let encoded = value.as_str().ok_or_else(|| {
            Error::MalformedField(format!("detail `{name}` must be a string, but found `{value}`"))
        })?;

        base64_gunzip_decode(encoded)
    }

    /// Gets the first executable detail of a list of detail names.
    ///
    /// Finding a detail other than the first is logged as a legacy fallback.
    fn executable_detail_with_fallback(
        &self,
        names: &[&str],
    ) -> Result<Option<(String, JsonValue)>> {
        for (i, name) in names.iter().enumerate() {
            if let Some(value) = self.source.executable_detail(name)? {
                if i > 0 {
                    warn!(
                        "executable detail `{name}` is deprecated; the executable should be \
                         recompiled to use `{current}`",
                        current = names[0]
                    );
                }

                return Ok(Some((name.to_string(), value)));
            }
        }

        Ok(None)
    }

    /// Gets the instance-type table of the executable.
    pub fn instance_type_db(&self) -> Result<&InstanceTypeDb> {
        init(&self.instance_type_db, || {
            let value = self
                .source
                .executable_detail(INSTANCE_TYPE_DB_DETAIL)?
                .ok_or_else(|| Error::MissingMetadata(INSTANCE_TYPE_DB_DETAIL.to_string()))?;

            let db: InstanceTypeDb =
                serde_json::from_str(&Self::compressed_detail(INSTANCE_TYPE_DB_DETAIL, &value)?)?;
            debug!("loaded {count} instance type(s)", count = db.len());
            Ok(db)
        })
    }

    /// Gets the default runtime attributes of the executable.
    ///
    /// Every attribute must be a supported runtime attribute.
    pub fn default_runtime_attributes(&self) -> Result<&JsonMap> {
        init(&self.runtime_attributes, || {
            match self.source.executable_detail(RUNTIME_ATTRIBUTES_DETAIL)? {
                None | Some(JsonValue::Null) => Ok(JsonMap::new()),
                Some(JsonValue::Object(attrs)) => {
                    check_keys(RUNTIME_ATTRIBUTES_DETAIL, &attrs, RUNTIME_ATTRIBUTE_KEYS)?;
                    Ok(attrs)
                }
                Some(value) => Err(Error::MalformedField(format!(
                    "detail `{RUNTIME_ATTRIBUTES_DETAIL}` must be an object, but found `{value}`"
                ))),
            }
        })
    }

    /// Gets the source text the job executes.
    pub fn source_text(&self) -> Result<&str> {
        init(&self.source_text, || {
            let (name, value) = self
                .executable_detail_with_fallback(SOURCE_CODE_DETAILS)?
                .ok_or_else(|| Error::MissingMetadata(SOURCE_CODE_DETAILS[0].to_string()))?;

            Self::compressed_detail(&name, &value)
        })
        .map(String::as_str)
    }

    /// Gets the language of the source the job executes.
    ///
    /// Defaults to WDL 1.0.
    pub fn language(&self) -> Result<SourceLanguage> {
        init(&self.language, || {
            let Some((name, value)) = self.executable_detail_with_fallback(LANGUAGE_DETAILS)?
            else {
                warn!(
                    "executable detail `{detail}` is not present; assuming {default}",
                    detail = LANGUAGE_DETAILS[0],
                    default = SourceLanguage::Wdl1_0
                );
                return Ok(SourceLanguage::Wdl1_0);
            };

            value
                .as_str()
                .and_then(SourceLanguage::parse)
                .ok_or_else(|| {
                    Error::MalformedField(format!(
                        "detail `{name}` is not a supported language: `{value}`"
                    ))
                })
        })
        .copied()
    }

    /// Gets whether or not destruction of the job's workspace is delayed.
    ///
    /// Defaults to `false`.
    pub fn delay_workspace_destruction(&self) -> Result<bool> {
        init(&self.delay_workspace_destruction, || {
            match self
                .source
                .executable_detail(DELAY_WORKSPACE_DESTRUCTION_DETAIL)?
            {
                None | Some(JsonValue::Null) => Ok(false),
                Some(JsonValue::Bool(delay)) => Ok(delay),
                Some(value) => Err(Error::MalformedField(format!(
                    "detail `{DELAY_WORKSPACE_DESTRUCTION_DETAIL}` must be a boolean, but found \
                     `{value}`"
                ))),
            }
        })
        .copied()
    }

    /// Gets the path of the block the job executes.
    ///
    /// Defaults to an empty path.
    pub fn block_path(&self) -> Result<&[usize]> {
        init(&self.block_path, || {
            match self.source.executable_detail(BLOCK_PATH_DETAIL)? {
                None | Some(JsonValue::Null) => Ok(Vec::new()),
                Some(JsonValue::Array(elements)) => elements
                    .iter()
                    .map(|e| Self::usize_detail(BLOCK_PATH_DETAIL, e))
                    .collect(),
                Some(value) => Err(Error::MalformedField(format!(
                    "detail `{BLOCK_PATH_DETAIL}` must be an array, but found `{value}`"
                ))),
            }
        })
        .map(Vec::as_slice)
    }

    /// Checks that the job has at least the given access to its project.
    pub fn check_project_access(&self, level: AccessLevel) -> Result<()> {
        let project = self.source.project()?;
        let describe = self.source.client().describe_project(&project)?;
        if describe.level < level {
            return Err(Error::Permission(format!(
                "project `{project}` requires `{level}` access, but the job has `{actual}` access",
                actual = describe.level
            )));
        }

        Ok(())
    }

    /// Ensures the job is in a state that may write outputs.
    fn ensure_outputs_writable(&self) -> Result<()> {
        match self.state.get() {
            JobState::InputsLoaded => Ok(()),
            state => Err(Error::InvalidState(format!(
                "cannot write outputs of a job that is {state}"
            ))),
        }
    }

    /// Writes the output artifact of the job.
    ///
    /// Every value must match its declared type. Outputs with a `Null` value
    /// are omitted regardless of their type.
    pub fn write_outputs(&self, outputs: IndexMap<String, (Type, Value)>) -> Result<()> {
        self.ensure_outputs_writable()?;

        let mut paths = Vec::new();
        for (name, (ty, value)) in &outputs {
            if !value.is_null() && !value.matches(ty) {
                return Err(Error::MalformedField(format!(
                    "output `{name}` has a value that does not match its type `{ty}`"
                )));
            }

            collect_paths(value, &mut paths);
        }

        let cache = if paths.is_empty() {
            FileDescCache::new()
        } else {
            BulkFileResolver::new(self.source.client()).resolve_refs(paths)?
        };

        let serializer = ParameterLinkSerializer::new(&cache);
        let mut fields = JsonMap::new();
        for (name, (ty, value)) in &outputs {
            if value.is_null() {
                debug!("omitting output `{name}` with no value");
                continue;
            }

            fields.extend(serializer.create_fields(name, ty, value)?);
        }

        self.source
            .write_artifact(Artifact::Output, &JsonValue::Object(fields))?;
        self.state.set(JobState::OutputsWritten);
        info!("wrote {count} output(s)", count = outputs.len());
        Ok(())
    }

    /// Writes the output artifact of a job whose outputs are links to
    /// other executions.
    pub fn write_output_links(&self, links: IndexMap<String, ParameterLink>) -> Result<()> {
        self.ensure_outputs_writable()?;

        let cache = FileDescCache::new();
        let serializer = ParameterLinkSerializer::new(&cache);
        let mut fields = JsonMap::new();
        for (name, link) in &links {
            fields.extend(serializer.create_fields_from_link(link, name)?);
        }

        self.source
            .write_artifact(Artifact::Output, &JsonValue::Object(fields))?;
        self.state.set(JobState::OutputsWritten);
        info!("wrote {count} output link(s)", count = links.len());
        Ok(())
    }

    /// Writes the error artifact of the job.
    pub fn write_error(&self, e: &Error) -> Result<()> {
        match self.state.get() {
            JobState::Uninitialized | JobState::InputsLoaded => {}
            state => {
                return Err(Error::InvalidState(format!(
                    "cannot write an error for a job that is {state}"
                )));
            }
        }

        let kind = e.kind();
        let json = json!({
            "error": {
                "type": kind.as_str(),
                "message": sanitize_error_message(e),
            }
        });

        self.source.write_artifact(Artifact::Error, &json)?;
        self.state.set(JobState::ErrorWritten);
        Ok(())
    }

    /// Runs a task at the job process boundary.
    ///
    /// An error returned by the task, or a panic of the task, is written to
    /// the error artifact and then returned. A failure to write the artifact
    /// is logged and the task's error is still returned.
    pub fn run(&self, f: impl FnOnce(&Self) -> Result<()>) -> Result<()> {
        let e = match panic::catch_unwind(AssertUnwindSafe(|| f(self))) {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(e)) => e,
            Err(payload) => Error::Panic(format_panic_payload(&payload)),
        };

        error!("job failed: {e}");
        if self.state.get() != JobState::ErrorWritten
            && let Err(write_error) = self.write_error(&e)
        {
            error!("failed to write the error artifact of the job: {write_error}");
        }

        Err(e)
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;
    use wdl_dx_ir::PrimitiveType;

    use super::*;
    use crate::ExecutableDescribe;
    use crate::JobDescribe;
    use crate::ObjectDescribe;
    use crate::ObjectHandle;
    use crate::PlatformError;
    use crate::ProjectDescribe;
    use crate::codec::gzip_base64_encode;
    use crate::job::fixture::StaticJobMeta;

    /// A client that grants a fixed access level and knows no objects.
    struct ProjectClient(AccessLevel);

    impl PlatformClient for ProjectClient {
        fn resolve_paths(
            &self,
            _: &[wdl_dx_ir::DxPath],
        ) -> std::result::Result<HashMap<wdl_dx_ir::DxPath, ObjectHandle>, PlatformError> {
            Ok(Default::default())
        }

        fn describe_objects(
            &self,
            _: &[ObjectHandle],
        ) -> std::result::Result<Vec<ObjectDescribe>, PlatformError> {
            Ok(Vec::new())
        }

        fn describe_job(&self, id: &str) -> std::result::Result<JobDescribe, PlatformError> {
            Err(PlatformError::NotFound(id.to_string()))
        }

        fn describe_executable(
            &self,
            id: &str,
        ) -> std::result::Result<ExecutableDescribe, PlatformError> {
            Err(PlatformError::NotFound(id.to_string()))
        }

        fn describe_project(
            &self,
            id: &str,
        ) -> std::result::Result<ProjectDescribe, PlatformError> {
            Ok(ProjectDescribe {
                id: id.to_string(),
                level: self.0,
            })
        }
    }

    fn context() -> StaticJobMeta<ProjectClient> {
        StaticJobMeta::new(ProjectClient(AccessLevel::View))
    }

    #[test]
    #[traced_test]
    fn scatter_defaults() {
        let ctx = JobMetaContext::new(context());
        assert_eq!(ctx.scatter_start().unwrap(), 0);
        assert_eq!(ctx.scatter_size().unwrap(), DEFAULT_SCATTER_CHUNK_SIZE);
        assert!(logs_contain("using the default chunk size of 500"));

        let ctx = JobMetaContext::new(
            context()
                .with_job_detail(SCATTER_START_DETAIL, json!(1000))
                .with_executable_detail(SCATTER_CHUNK_SIZE_DETAIL, json!(250)),
        );
        assert_eq!(ctx.scatter_start().unwrap(), 1000);
        assert_eq!(ctx.scatter_size().unwrap(), 250);

        for size in [json!(0), json!(1001), json!("10")] {
            let ctx = JobMetaContext::new(
                context().with_executable_detail(SCATTER_CHUNK_SIZE_DETAIL, size),
            );
            assert!(matches!(ctx.scatter_size(), Err(Error::MalformedField(_))));
        }
    }

    #[test]
    #[traced_test]
    fn legacy_source_code() {
        let ctx = JobMetaContext::new(context().with_executable_detail(
            "womSourceCode",
            json!(gzip_base64_encode("version 1.0\n").unwrap()),
        ));
        assert_eq!(ctx.source_text().unwrap(), "version 1.0\n");
        assert!(logs_contain("executable detail `womSourceCode` is deprecated"));

        let ctx = JobMetaContext::new(context());
        let e = ctx.source_text().unwrap_err();
        assert_eq!(e.to_string(), "missing required metadata `sourceCode`");
        assert_eq!(e.kind(), crate::ErrorKind::AppInternalError);
    }

    #[test]
    #[traced_test]
    fn language_fallbacks() {
        let ctx =
            JobMetaContext::new(context().with_executable_detail("language", json!("WDL_v1.1")));
        assert_eq!(ctx.language().unwrap(), SourceLanguage::Wdl1_1);

        let ctx =
            JobMetaContext::new(context().with_executable_detail("wdlVersion", json!("draft-2")));
        assert_eq!(ctx.language().unwrap(), SourceLanguage::WdlDraft2);
        assert!(logs_contain("executable detail `wdlVersion` is deprecated"));

        let ctx = JobMetaContext::new(context());
        assert_eq!(ctx.language().unwrap(), SourceLanguage::Wdl1_0);
        assert!(logs_contain("assuming WDL 1.0"));

        let ctx = JobMetaContext::new(context().with_executable_detail("language", json!("CWL")));
        assert!(ctx.language().is_err());
    }

    #[test]
    fn instance_types() {
        let db = json!({
            "instanceTypes": {
                "mem1_ssd1_v2_x2": {
                    "name": "mem1_ssd1_v2_x2",
                    "memoryMB": 4096,
                    "diskGB": 80,
                    "cpu": 2,
                    "price": 0.1
                }
            }
        });

        let ctx = JobMetaContext::new(context().with_executable_detail(
            INSTANCE_TYPE_DB_DETAIL,
            json!(gzip_base64_encode(&db.to_string()).unwrap()),
        ));
        let db = ctx.instance_type_db().unwrap();
        assert_eq!(db.len(), 1);
        assert_eq!(db.get("mem1_ssd1_v2_x2").unwrap().memory_mb, 4096);
        assert_eq!(db.get("mem1_ssd1_v2_x2").unwrap().gpu, 0);

        let ctx = JobMetaContext::new(context());
        assert!(matches!(
            ctx.instance_type_db(),
            Err(Error::MissingMetadata(_))
        ));
    }

    #[test]
    fn simple_details() {
        let ctx = JobMetaContext::new(
            context()
                .with_executable_detail(
                    RUNTIME_ATTRIBUTES_DETAIL,
                    json!({"docker": "ubuntu", "cpu": 4}),
                )
                .with_executable_detail(DELAY_WORKSPACE_DESTRUCTION_DETAIL, json!(true))
                .with_executable_detail(BLOCK_PATH_DETAIL, json!([1, 0, 2])),
        );
        assert_eq!(ctx.default_runtime_attributes().unwrap().len(), 2);
        assert!(ctx.delay_workspace_destruction().unwrap());
        assert_eq!(ctx.block_path().unwrap(), [1, 0, 2]);

        let ctx = JobMetaContext::new(context());
        assert!(ctx.default_runtime_attributes().unwrap().is_empty());
        assert!(!ctx.delay_workspace_destruction().unwrap());
        assert!(ctx.block_path().unwrap().is_empty());

        let ctx = JobMetaContext::new(
            context().with_executable_detail(RUNTIME_ATTRIBUTES_DETAIL, json!({"image": "ubuntu"})),
        );
        assert!(matches!(
            ctx.default_runtime_attributes(),
            Err(Error::UnsupportedKeys { .. })
        ));
    }

    #[test]
    fn project_access() {
        let ctx = JobMetaContext::new(context());
        ctx.check_project_access(AccessLevel::View).unwrap();
        let e = ctx.check_project_access(AccessLevel::Contribute).unwrap_err();
        assert_eq!(
            e.to_string(),
            "permission denied: project `project-test` requires `CONTRIBUTE` access, but the job \
             has `VIEW` access"
        );
    }

    #[test]
    fn writes_outputs_once() {
        let ctx = JobMetaContext::new(context().with_inputs(json!({"x": 1})));
        assert!(ctx.write_outputs(IndexMap::new()).is_err());

        let declared = IndexMap::from([("x".to_string(), Type::from(PrimitiveType::Integer))]);
        let inputs = ctx.input_values(&declared).unwrap();
        assert_eq!(ctx.state(), JobState::InputsLoaded);

        let e = ctx
            .write_outputs(IndexMap::from([(
                "y".to_string(),
                (Type::from(PrimitiveType::String), inputs["x"].clone()),
            )]))
            .unwrap_err();
        assert_eq!(
            e.to_string(),
            "malformed field: output `y` has a value that does not match its type `String`"
        );
        assert_eq!(ctx.state(), JobState::InputsLoaded);
        assert_eq!(ctx.source().artifact(Artifact::Output), None);

        ctx.write_outputs(IndexMap::from([
            ("y".to_string(), (Type::from(PrimitiveType::Integer), inputs["x"].clone())),
            (
                "z".to_string(),
                (Type::from(PrimitiveType::String).optional(), Value::Null),
            ),
        ]))
        .unwrap();
        assert_eq!(ctx.state(), JobState::OutputsWritten);
        assert_eq!(ctx.source().artifact(Artifact::Output), Some(json!({"y": 1})));

        assert!(matches!(
            ctx.write_outputs(IndexMap::new()),
            Err(Error::InvalidState(_))
        ));
        assert!(ctx.write_error(&Error::Permission("x".to_string())).is_err());
    }

    #[test]
    fn runs_at_the_process_boundary() {
        let ctx = JobMetaContext::new(context());
        let e = ctx
            .run(|ctx| {
                ctx.raw_inputs()?;
                Err(Error::MalformedField("bad\ninput".to_string()))
            })
            .unwrap_err();
        assert!(matches!(e, Error::MalformedField(_)));
        assert_eq!(ctx.state(), JobState::ErrorWritten);
        assert_eq!(
            ctx.source().artifact(Artifact::Error),
            Some(json!({
                "error": {"type": "AppError", "message": "malformed field: bad input"}
            }))
        );
    }

    #[test]
    fn writes_an_error_for_a_panic() {
        let ctx = JobMetaContext::new(context());
        let e = ctx
            .run(|ctx| {
                ctx.raw_inputs()?;
                panic!("index out of bounds");
            })
            .unwrap_err();
        assert!(matches!(e, Error::Panic(_)));
        assert_eq!(ctx.state(), JobState::ErrorWritten);
        assert_eq!(
            ctx.source().artifact(Artifact::Error),
            Some(json!({
                "error": {
                    "type": "AppInternalError",
                    "message": "the job panicked: index out of bounds"
                }
            }))
        );
    }

    /// A source whose artifacts can never be written.
    struct ReadOnlyJobMeta(StaticJobMeta<ProjectClient>);

    impl JobMetadataSource for ReadOnlyJobMeta {
        fn raw_inputs(&self) -> Result<JsonMap> {
            self.0.raw_inputs()
        }

        fn job_detail(&self, name: &str) -> Result<Option<JsonValue>> {
            self.0.job_detail(name)
        }

        fn executable_detail(&self, name: &str) -> Result<Option<JsonValue>> {
            self.0.executable_detail(name)
        }

        fn project(&self) -> Result<String> {
            self.0.project()
        }

        fn client(&self) -> &dyn PlatformClient {
            self.0.client()
        }

        fn write_artifact(&self, artifact: Artifact, _: &JsonValue) -> Result<()> {
            Err(Error::Io {
                path: artifact.file_name().into(),
                source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            })
        }
    }

    #[test]
    #[traced_test]
    fn keeps_the_task_error_when_the_artifact_fails() {
        let ctx = JobMetaContext::new(ReadOnlyJobMeta(context()));
        let e = ctx
            .run(|_| Err(Error::MissingMetadata("sourceCode".to_string())))
            .unwrap_err();
        assert!(matches!(e, Error::MissingMetadata(_)));
        assert_eq!(ctx.state(), JobState::Uninitialized);
        assert!(logs_contain("failed to write the error artifact of the job"));
    }

    #[test]
    fn error_messages_are_sanitized() {
        let long = "x".repeat(MAX_ERROR_MESSAGE_LEN * 2);
        let message = sanitize_error_message(&Error::InvalidState(long));
        assert_eq!(message.chars().count(), MAX_ERROR_MESSAGE_LEN + 3);
        assert!(message.ends_with("..."));

        let e = Error::Platform(anyhow::anyhow!("connection reset"));
        assert_eq!(
            sanitize_error_message(&e),
            "platform request failed: connection reset"
        );
    }
}
