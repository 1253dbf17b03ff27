//! Implementation of the job metadata source of a platform worker.

use std::cell::OnceCell;
use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::debug;
use tracing::warn;

use super::Artifact;
use super::JobMetadataSource;
use crate::Error;
use crate::ExecutableDescribe;
use crate::JobDescribe;
use crate::JsonMap;
use crate::PlatformClient;
use crate::Result;

/// The environment variable holding the identifier of the running job.
pub const JOB_ID_ENV: &str = "DX_JOB_ID";

/// The environment variable holding the home directory of the worker.
const HOME_ENV: &str = "HOME";

/// The home directory of a worker when `HOME` is not set.
const DEFAULT_HOME: &str = "/home/dnanexus";

/// The file name of the job input artifact.
pub const JOB_INPUT_FILE: &str = "job_input.json";

/// The file name of the execution descriptor artifact.
pub const EXECUTABLE_FILE: &str = "dnanexus-executable.json";

/// Represents the execution descriptor artifact.
#[derive(Debug, Deserialize)]
struct ExecutableFile {
    /// The identifier of the executable.
    id: String,
}

/// Reads a JSON file, returning `None` if it does not exist.
fn read_json(path: &Path) -> Result<Option<JsonValue>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(Error::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    Ok(Some(serde_json::from_str(&contents)?))
}

/// A job metadata source backed by the home directory of a platform worker.
///
/// The job and its executable are each described at most once.
pub struct WorkerJobMeta<C> {
    /// The home directory of the worker.
    home: PathBuf,
    /// The identifier of the running job.
    job_id: String,
    /// The platform client.
    client: C,
    /// The description of the job.
    job: OnceCell<JobDescribe>,
    /// The description of the job's executable.
    executable: OnceCell<ExecutableDescribe>,
}

impl<C: PlatformClient> WorkerJobMeta<C> {
    /// Constructs a new worker job metadata source.
    pub fn new(home: impl Into<PathBuf>, job_id: impl Into<String>, client: C) -> Self {
        Self {
            home: home.into(),
            job_id: job_id.into(),
            client,
            job: OnceCell::new(),
            executable: OnceCell::new(),
        }
    }

    /// Constructs a worker job metadata source from the environment of the
    /// running job.
    pub fn from_env(client: C) -> Result<Self> {
        let job_id =
            std::env::var(JOB_ID_ENV).map_err(|_| Error::MissingMetadata(JOB_ID_ENV.to_string()))?;
        let home = std::env::var_os(HOME_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_HOME));

        Ok(Self::new(home, job_id, client))
    }

    /// Gets the home directory of the worker.
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Gets the identifier of the running job.
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Gets the description of the job.
    fn job(&self) -> Result<&JobDescribe> {
        super::init(&self.job, || {
            debug!("describing job `{id}`", id = self.job_id);
            Ok(self.client.describe_job(&self.job_id)?)
        })
    }

    /// Gets the description of the job's executable.
    ///
    /// The executable identifier is read from the execution descriptor
    /// artifact when it is present.
    fn executable(&self) -> Result<&ExecutableDescribe> {
        super::init(&self.executable, || {
            let id = match read_json(&self.home.join(EXECUTABLE_FILE))? {
                Some(json) => serde_json::from_value::<ExecutableFile>(json)?.id,
                None => self.job()?.executable.clone(),
            };

            debug!("describing executable `{id}`");
            Ok(self.client.describe_executable(&id)?)
        })
    }
}

impl<C: PlatformClient> JobMetadataSource for WorkerJobMeta<C> {
    fn raw_inputs(&self) -> Result<JsonMap> {
        let path = self.home.join(JOB_INPUT_FILE);
        match read_json(&path)? {
            Some(JsonValue::Object(inputs)) => Ok(inputs),
            Some(_) => Err(Error::MalformedField(format!(
                "job input file `{path}` must contain a JSON object",
                path = path.display()
            ))),
            None => {
                warn!(
                    "job input file `{path}` does not exist; assuming no inputs",
                    path = path.display()
                );
                Ok(JsonMap::new())
            }
        }
    }

    fn job_detail(&self, name: &str) -> Result<Option<JsonValue>> {
        Ok(self.job()?.details.get(name).cloned())
    }

    fn executable_detail(&self, name: &str) -> Result<Option<JsonValue>> {
        Ok(self.executable()?.details.get(name).cloned())
    }

    fn project(&self) -> Result<String> {
        Ok(self.job()?.project.clone())
    }

    fn client(&self) -> &dyn PlatformClient {
        &self.client
    }

    fn write_artifact(&self, artifact: Artifact, json: &JsonValue) -> Result<()> {
        let path = self.home.join(artifact.file_name());
        let contents = serde_json::to_string_pretty(json)?;
        fs::write(&path, contents).map_err(|source| Error::Io { path, source })
    }
}
