//! Representation of platform file references.

use std::fmt;
use std::hash::Hash;
use std::hash::Hasher;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;

/// The URI scheme prefix of a platform-qualified path.
pub const DX_URI_PREFIX: &str = "dx://";

/// The prefix of a platform file object identifier.
pub const FILE_ID_PREFIX: &str = "file-";

/// Represents an unresolved, platform-qualified file path.
///
/// A path has the form `dx://<project>:<path-or-id>`, for example
/// `dx://project-xxxx:/reads/sample.bam` or `dx://project-xxxx:file-yyyy`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DxPath(Arc<String>);

impl DxPath {
    /// Parses a platform-qualified path.
    ///
    /// Returns `None` if the string does not start with `dx://` or has an
    /// empty body.
    pub fn parse(s: &str) -> Option<Self> {
        let body = s.strip_prefix(DX_URI_PREFIX)?;
        if body.is_empty() {
            return None;
        }

        Some(Self(Arc::new(s.to_string())))
    }

    /// Gets the path as a string, including the `dx://` prefix.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Gets the project component of the path, if there is one.
    pub fn project(&self) -> Option<&str> {
        let body = &self.0[DX_URI_PREFIX.len()..];
        body.split_once(':').map(|(project, _)| project)
    }

    /// Gets the component following the project.
    ///
    /// This is either an absolute folder path or an object identifier.
    pub fn object(&self) -> &str {
        let body = &self.0[DX_URI_PREFIX.len()..];
        match body.split_once(':') {
            Some((_, object)) => object,
            None => body,
        }
    }
}

impl fmt::Display for DxPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{path}", path = self.0)
    }
}

/// Represents a description of a platform file object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDescribe {
    /// The file object identifier.
    pub id: String,
    /// The project containing the file.
    pub project: String,
    /// The name of the file.
    pub name: String,
    /// The folder containing the file.
    pub folder: String,
    /// The size of the file in bytes, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// Represents a resolved platform file handle.
///
/// Two handles are equal when their identifier and project are equal; the
/// cached description does not participate in equality.
#[derive(Debug, Clone)]
pub struct DxFile {
    /// The file object identifier.
    id: Arc<String>,
    /// The project containing the file, if known.
    project: Option<Arc<String>>,
    /// The cached description of the file.
    describe: Option<Arc<FileDescribe>>,
}

impl DxFile {
    /// Constructs a new file handle from an object identifier.
    pub fn new(id: impl Into<String>, project: Option<String>) -> Self {
        Self {
            id: Arc::new(id.into()),
            project: project.map(Arc::new),
            describe: None,
        }
    }

    /// Constructs a file handle from a file description.
    pub fn from_describe(describe: Arc<FileDescribe>) -> Self {
        Self {
            id: Arc::new(describe.id.clone()),
            project: Some(Arc::new(describe.project.clone())),
            describe: Some(describe),
        }
    }

    /// Gets the file object identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Gets the project containing the file, if known.
    pub fn project(&self) -> Option<&str> {
        self.project.as_deref().map(String::as_str)
    }

    /// Gets the cached description of the file, if there is one.
    pub fn describe(&self) -> Option<&FileDescribe> {
        self.describe.as_deref()
    }
}

impl PartialEq for DxFile {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.project == other.project
    }
}

impl Eq for DxFile {}

impl Hash for DxFile {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.project.hash(state);
    }
}

impl fmt::Display for DxFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.project {
            Some(project) => write!(f, "{DX_URI_PREFIX}{project}:{id}", id = self.id),
            None => write!(f, "{DX_URI_PREFIX}{id}", id = self.id),
        }
    }
}

/// Represents a reference to a platform file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FileRef {
    /// The reference is an already resolved handle.
    Handle(DxFile),
    /// The reference is an unresolved path.
    Path(DxPath),
}

impl FileRef {
    /// Gets the reference as a resolved handle.
    ///
    /// Returns `None` if the reference is an unresolved path.
    pub fn as_handle(&self) -> Option<&DxFile> {
        match self {
            Self::Handle(file) => Some(file),
            Self::Path(_) => None,
        }
    }
}

impl fmt::Display for FileRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Handle(file) => file.fmt(f),
            Self::Path(path) => path.fmt(f),
        }
    }
}

impl From<DxFile> for FileRef {
    fn from(file: DxFile) -> Self {
        Self::Handle(file)
    }
}

impl From<DxPath> for FileRef {
    fn from(path: DxPath) -> Self {
        Self::Path(path)
    }
}
