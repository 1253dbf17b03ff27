//! An in-memory job metadata source.
//!
//! The fixture never touches the file system and records every artifact it
//! is asked to write, which makes job execution deterministic under test.

use std::cell::RefCell;
use std::collections::HashMap;

use serde_json::Value as JsonValue;

use super::Artifact;
use super::JobMetadataSource;
use crate::Error;
use crate::JsonMap;
use crate::PlatformClient;
use crate::Result;

/// The project of a fixture unless one is set.
pub const DEFAULT_PROJECT: &str = "project-test";

/// A job metadata source with fixed inputs and details.
pub struct StaticJobMeta<C> {
    /// The raw wire inputs.
    inputs: JsonValue,
    /// The job details.
    job_details: JsonMap,
    /// The executable details.
    executable_details: JsonMap,
    /// The project identifier.
    project: String,
    /// The platform client.
    client: C,
    /// The written artifacts.
    artifacts: RefCell<HashMap<Artifact, JsonValue>>,
}

impl<C: PlatformClient> StaticJobMeta<C> {
    /// Constructs a new fixture with no inputs or details.
    pub fn new(client: C) -> Self {
        Self {
            inputs: JsonValue::Object(JsonMap::new()),
            job_details: JsonMap::new(),
            executable_details: JsonMap::new(),
            project: DEFAULT_PROJECT.to_string(),
            client,
            artifacts: Default::default(),
        }
    }

    /// Sets the raw wire inputs.
    ///
    /// Reading inputs that are not a JSON object fails.
    pub fn with_inputs(mut self, inputs: JsonValue) -> Self {
        self.inputs = inputs;
        self
    }

    /// Sets a job detail.
    pub fn with_job_detail(mut self, name: impl Into<String>, value: JsonValue) -> Self {
        self.job_details.insert(name.into(), value);
        self
    }

    /// Sets an executable detail.
    pub fn with_executable_detail(mut self, name: impl Into<String>, value: JsonValue) -> Self {
        self.executable_details.insert(name.into(), value);
        self
    }

    /// Sets the project.
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = project.into();
        self
    }

    /// Gets the platform client.
    pub fn platform_client(&self) -> &C {
        &self.client
    }

    /// Gets a written artifact.
    pub fn artifact(&self, artifact: Artifact) -> Option<JsonValue> {
        self.artifacts.borrow().get(&artifact).cloned()
    }
}

impl<C: PlatformClient> JobMetadataSource for StaticJobMeta<C> {
    fn raw_inputs(&self) -> Result<JsonMap> {
        match &self.inputs {
            JsonValue::Object(inputs) => Ok(inputs.clone()),
            _ => Err(Error::MalformedField(
                "job inputs must be a JSON object".to_string(),
            )),
        }
    }

    fn job_detail(&self, name: &str) -> Result<Option<JsonValue>> {
        Ok(self.job_details.get(name).cloned())
    }

    fn executable_detail(&self, name: &str) -> Result<Option<JsonValue>> {
        Ok(self.executable_details.get(name).cloned())
    }

    fn project(&self) -> Result<String> {
        Ok(self.project.clone())
    }

    fn client(&self) -> &dyn PlatformClient {
        &self.client
    }

    fn write_artifact(&self, artifact: Artifact, json: &JsonValue) -> Result<()> {
        self.artifacts.borrow_mut().insert(artifact, json.clone());
        Ok(())
    }
}
