//! The seam to the remote platform API.
//!
//! The client itself (transport, authentication, retries) lives outside of
//! this crate; translation and job execution only need the handful of
//! batched describe and resolve calls declared here.

use std::collections::HashMap;
use std::fmt;

use serde::Deserialize;
use thiserror::Error;
use wdl_dx_ir::DxPath;
use wdl_dx_ir::FileDescribe;

use crate::Error;
use crate::JsonMap;

/// The object class of a platform file.
pub const FILE_CLASS: &str = "file";

/// An error returned by a [`PlatformClient`].
#[derive(Error, Debug)]
pub enum PlatformError {
    /// The caller lacks access to an object.
    #[error("permission denied for `{object}`")]
    PermissionDenied {
        /// The object that was denied.
        object: String,
    },

    /// An object does not exist.
    #[error("object `{0}` was not found")]
    NotFound(String),

    /// The request itself failed.
    #[error(transparent)]
    Request(#[from] anyhow::Error),
}

impl From<PlatformError> for Error {
    fn from(e: PlatformError) -> Self {
        match e {
            PlatformError::PermissionDenied { object } => {
                Self::Permission(format!("access to `{object}` was denied"))
            }
            e => Self::Platform(e.into()),
        }
    }
}

/// Represents a handle to a platform object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectHandle {
    /// The object identifier.
    pub id: String,
    /// The project containing the object, if known.
    pub project: Option<String>,
}

/// Represents the description of a platform object.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectDescribe {
    /// The object identifier.
    pub id: String,
    /// The class of the object (e.g. `file` or `applet`).
    pub class: String,
    /// The project containing the object.
    pub project: String,
    /// The name of the object.
    pub name: String,
    /// The folder containing the object.
    #[serde(default)]
    pub folder: String,
    /// The size of the object in bytes, if known.
    #[serde(default)]
    pub size: Option<u64>,
}

impl ObjectDescribe {
    /// Converts the description into a file description.
    ///
    /// Returns `None` if the object is not a file.
    pub fn into_file(self) -> Option<FileDescribe> {
        (self.class == FILE_CLASS).then(|| FileDescribe {
            id: self.id,
            project: self.project,
            name: self.name,
            folder: self.folder,
            size: self.size,
        })
    }
}

/// Represents the description of a job.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDescribe {
    /// The job identifier.
    pub id: String,
    /// The project the job runs in.
    pub project: String,
    /// The identifier of the executable the job runs.
    pub executable: String,
    /// The details of the job.
    #[serde(default)]
    pub details: JsonMap,
}

/// Represents the description of an executable (an applet or a workflow).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutableDescribe {
    /// The executable identifier.
    pub id: String,
    /// The details of the executable.
    #[serde(default)]
    pub details: JsonMap,
}

/// Represents a permission level on a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccessLevel {
    /// No access.
    None,
    /// Read-only access.
    View,
    /// Upload access.
    Upload,
    /// Read/write access.
    Contribute,
    /// Full access.
    Administer,
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "NONE"),
            Self::View => write!(f, "VIEW"),
            Self::Upload => write!(f, "UPLOAD"),
            Self::Contribute => write!(f, "CONTRIBUTE"),
            Self::Administer => write!(f, "ADMINISTER"),
        }
    }
}

/// Represents the description of a project.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProjectDescribe {
    /// The project identifier.
    pub id: String,
    /// The caller's access level.
    pub level: AccessLevel,
}

/// A trait implemented by clients of the remote platform API.
///
/// Every method is a single blocking request; implementations own any retry
/// policy.
pub trait PlatformClient {
    /// Resolves a batch of paths to object handles in one request.
    ///
    /// Paths that do not resolve are absent from the returned map.
    fn resolve_paths(
        &self,
        paths: &[DxPath],
    ) -> Result<HashMap<DxPath, ObjectHandle>, PlatformError>;

    /// Describes a batch of objects in one request.
    fn describe_objects(
        &self,
        objects: &[ObjectHandle],
    ) -> Result<Vec<ObjectDescribe>, PlatformError>;

    /// Describes a job.
    fn describe_job(&self, id: &str) -> Result<JobDescribe, PlatformError>;

    /// Describes an executable.
    fn describe_executable(&self, id: &str) -> Result<ExecutableDescribe, PlatformError>;

    /// Describes a project from the caller's point of view.
    fn describe_project(&self, id: &str) -> Result<ProjectDescribe, PlatformError>;
}
