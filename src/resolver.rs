//! Implementation of bulk file resolution.

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexSet;
use serde_json::Value as JsonValue;
use tracing::debug;
use tracing::info;
use wdl_dx_ir::DxFile;
use wdl_dx_ir::DxPath;
use wdl_dx_ir::FileDescribe;
use wdl_dx_ir::FileRef;
use wdl_dx_ir::Type;

use crate::Bundle;
use crate::Error;
use crate::JsonMap;
use crate::ObjectHandle;
use crate::PlatformClient;
use crate::Result;
use crate::codec::encode_dots;
use crate::extract_field_files;

/// A cache of file descriptions built by resolution passes.
///
/// Entries are never replaced; a cache only grows by merging the result of
/// a later pass.
#[derive(Debug, Clone, Default)]
pub struct FileDescCache {
    /// The file descriptions by object identifier.
    files: HashMap<String, Arc<FileDescribe>>,
    /// The object identifiers of resolved paths.
    paths: HashMap<DxPath, String>,
}

impl FileDescCache {
    /// Constructs an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the description of a file by object identifier.
    pub fn describe(&self, id: &str) -> Option<&Arc<FileDescribe>> {
        self.files.get(id)
    }

    /// Resolves a file reference against the cache.
    ///
    /// A handle is always resolvable; its description is attached when the
    /// cache has one. A path is resolvable only if it was resolved by the
    /// pass that built the cache.
    pub fn resolve(&self, file: &FileRef) -> Option<DxFile> {
        match file {
            FileRef::Handle(handle) => Some(
                self.files
                    .get(handle.id())
                    .map(|d| DxFile::from_describe(d.clone()))
                    .unwrap_or_else(|| handle.clone()),
            ),
            FileRef::Path(path) => {
                let id = self.paths.get(path)?;
                self.files.get(id).map(|d| DxFile::from_describe(d.clone()))
            }
        }
    }

    /// Determines if a file reference is fully resolved by the cache.
    ///
    /// A handle is fully resolved only if the cache has its description.
    pub fn contains(&self, file: &FileRef) -> bool {
        match file {
            FileRef::Handle(handle) => self.files.contains_key(handle.id()),
            FileRef::Path(path) => self.paths.contains_key(path),
        }
    }

    /// Merges the entries of another cache into this one.
    ///
    /// Existing entries are kept.
    pub fn merge(&mut self, other: FileDescCache) {
        for (id, file) in other.files {
            self.files.entry(id).or_insert(file);
        }

        for (path, id) in other.paths {
            self.paths.entry(path).or_insert(id);
        }
    }

    /// Gets the number of described files in the cache.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Determines if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Resolves every file mentioned by a set of inputs in at most two batched
/// platform requests: one to resolve paths and one to describe objects.
pub struct BulkFileResolver<'a> {
    /// The platform client.
    client: &'a dyn PlatformClient,
}

impl<'a> BulkFileResolver<'a> {
    /// Constructs a new resolver.
    pub fn new(client: &'a dyn PlatformClient) -> Self {
        Self { client }
    }

    /// Resolves every file reachable from the declared inputs of every
    /// callable in the bundle.
    ///
    /// Inputs are looked up by their fully-qualified name.
    pub fn resolve_bundle(&self, bundle: &Bundle, inputs: &JsonMap) -> Result<FileDescCache> {
        let mut files = Vec::new();
        for (key, ty) in bundle.input_keys() {
            if let Some(value) = inputs.get(&key) {
                files.extend(extract_field_files(ty, value)?);
            }
        }

        self.resolve_refs(files)
    }

    /// Resolves the given file references.
    pub fn resolve_refs(&self, files: impl IntoIterator<Item = FileRef>) -> Result<FileDescCache> {
        let mut handles = IndexSet::new();
        let mut paths = IndexSet::new();
        for file in files {
            match file {
                FileRef::Handle(handle) => {
                    handles.insert(ObjectHandle {
                        id: handle.id().to_string(),
                        project: handle.project().map(str::to_string),
                    });
                }
                FileRef::Path(path) => {
                    paths.insert(path);
                }
            }
        }

        let mut cache = FileDescCache::new();
        if !paths.is_empty() {
            let paths: Vec<_> = paths.into_iter().collect();
            info!("resolving {count} file path(s)", count = paths.len());
            let resolved = self.client.resolve_paths(&paths)?;

            for path in paths {
                let handle = resolved
                    .get(&path)
                    .ok_or_else(|| Error::InvalidFileReference {
                        reference: path.to_string(),
                        reason: "the path does not exist".to_string(),
                    })?;

                cache.paths.insert(path, handle.id.clone());
                handles.insert(handle.clone());
            }
        }

        if handles.is_empty() {
            return Ok(cache);
        }

        let handles: Vec<_> = handles.into_iter().collect();
        info!("describing {count} file(s)", count = handles.len());
        let expected: HashSet<_> = handles.iter().map(|h| h.id.as_str()).collect();
        for describe in self.client.describe_objects(&handles)? {
            if !expected.contains(describe.id.as_str()) {
                debug!("ignoring unrequested description of `{id}`", id = describe.id);
                continue;
            }

            let id = describe.id.clone();
            let class = describe.class.clone();
            let file = describe
                .into_file()
                .ok_or_else(|| Error::InvalidFileReference {
                    reference: id.clone(),
                    reason: format!("expected a file object, but found a `{class}` object"),
                })?;

            cache.files.insert(id, Arc::new(file));
        }

        if let Some(missing) = handles.iter().find(|h| !cache.files.contains_key(&h.id)) {
            return Err(Error::InvalidFileReference {
                reference: missing.id.clone(),
                reason: "the file could not be described".to_string(),
            });
        }

        Ok(cache)
    }
}

/// Collects the file references of a single job's wire inputs.
///
/// Only the declared parameters are examined, so the resolution scope is
/// narrower than a whole bundle.
pub(crate) fn job_file_refs<'a>(
    declared: impl IntoIterator<Item = (&'a String, &'a Type)>,
    inputs: &JsonMap,
) -> Result<Vec<FileRef>> {
    let mut files = Vec::new();
    for (name, ty) in declared {
        let field = encode_dots(name);
        if let Some(value) = inputs.get(&field) {
            if matches!(value, JsonValue::Null) {
                continue;
            }

            files.extend(extract_field_files(ty, value)?);
        }
    }

    Ok(files)
}
