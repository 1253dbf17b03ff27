//! Helpers shared by the integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;

use serde_json::Value as JsonValue;
use wdl_dx::AccessLevel;
use wdl_dx::ExecutableDescribe;
use wdl_dx::FILE_CLASS;
use wdl_dx::JobDescribe;
use wdl_dx::JsonMap;
use wdl_dx::ObjectDescribe;
use wdl_dx::ObjectHandle;
use wdl_dx::PlatformClient;
use wdl_dx::PlatformError;
use wdl_dx::ProjectDescribe;
use wdl_dx_ir::DxPath;

/// The project every mock object lives in.
pub const PROJECT: &str = "project-mock";

/// A platform client backed by a fixed set of files that records every
/// request it receives.
#[derive(Default)]
pub struct MockClient {
    /// The object identifiers of the known paths.
    paths: HashMap<String, String>,
    /// The names of the known file objects.
    files: HashMap<String, String>,
    /// The access level granted on every project.
    level: Option<AccessLevel>,
    /// The recorded requests.
    requests: RefCell<Vec<String>>,
}

impl MockClient {
    /// Constructs an empty client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file at the given folder path.
    pub fn with_file(mut self, id: &str, path: &str) -> Self {
        let name = path.rsplit('/').next().unwrap_or(path).to_string();
        self.paths
            .insert(format!("dx://{PROJECT}:{path}"), id.to_string());
        self.files.insert(id.to_string(), name);
        self
    }

    /// Sets the access level granted on every project.
    pub fn with_access(mut self, level: AccessLevel) -> Self {
        self.level = Some(level);
        self
    }

    /// Gets the recorded requests.
    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }

    /// Records a request.
    fn record(&self, request: impl Into<String>) {
        self.requests.borrow_mut().push(request.into());
    }
}

impl PlatformClient for MockClient {
    fn resolve_paths(
        &self,
        paths: &[DxPath],
    ) -> Result<HashMap<DxPath, ObjectHandle>, PlatformError> {
        self.record(format!("resolve {count}", count = paths.len()));
        Ok(paths
            .iter()
            .filter_map(|p| {
                let id = self.paths.get(p.as_str())?;
                Some((p.clone(), ObjectHandle {
                    id: id.clone(),
                    project: Some(PROJECT.to_string()),
                }))
            })
            .collect())
    }

    fn describe_objects(
        &self,
        objects: &[ObjectHandle],
    ) -> Result<Vec<ObjectDescribe>, PlatformError> {
        self.record(format!("describe {count}", count = objects.len()));
        Ok(objects
            .iter()
            .filter_map(|o| {
                let name = self.files.get(&o.id)?;
                Some(ObjectDescribe {
                    id: o.id.clone(),
                    class: FILE_CLASS.to_string(),
                    project: PROJECT.to_string(),
                    name: name.clone(),
                    folder: "/".to_string(),
                    size: Some(100),
                })
            })
            .collect())
    }

    fn describe_job(&self, id: &str) -> Result<JobDescribe, PlatformError> {
        self.record(format!("describe job {id}"));
        Err(PlatformError::NotFound(id.to_string()))
    }

    fn describe_executable(&self, id: &str) -> Result<ExecutableDescribe, PlatformError> {
        self.record(format!("describe executable {id}"));
        Err(PlatformError::NotFound(id.to_string()))
    }

    fn describe_project(&self, id: &str) -> Result<ProjectDescribe, PlatformError> {
        self.record(format!("describe project {id}"));
        match self.level {
            Some(level) => Ok(ProjectDescribe {
                id: id.to_string(),
                level,
            }),
            None => Err(PlatformError::PermissionDenied {
                object: id.to_string(),
            }),
        }
    }
}

/// Converts a JSON value into a JSON map.
pub fn object(json: JsonValue) -> JsonMap {
    match json {
        JsonValue::Object(map) => map,
        _ => panic!("expected a JSON object"),
    }
}
