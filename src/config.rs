//! Implementation of the extras configuration file.
//!
//! The extras file supplies defaults that are not expressible in a workflow
//! document: default runtime attributes, platform attributes for tasks,
//! a private Docker registry, and a custom output reorganization applet.
//!
//! Every object in the file is checked against an allow-list of keys before
//! it is deserialized so that a misspelled key is reported along with the
//! keys that are supported.

use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::debug;
use wdl_dx_ir::DxPath;

use crate::Error;
use crate::JsonMap;
use crate::Result;

/// The supported top-level keys of the extras file.
pub const TOP_LEVEL_KEYS: &[&str] = &[
    "custom_reorg",
    "default_runtime_attributes",
    "default_task_dx_attributes",
    "delay_workspace_destruction",
    "docker_registry",
    "ignore_reuse",
    "per_task_dx_attributes",
];

/// The supported runtime attribute keys.
///
/// This applies both to the extras file and to the default runtime
/// attributes stored in executable details.
pub const RUNTIME_ATTRIBUTE_KEYS: &[&str] = &[
    "container",
    "continueOnReturnCode",
    "cpu",
    "disks",
    "docker",
    "dx_instance_type",
    "gpu",
    "maxRetries",
    "memory",
    "preemptible",
    "returnCodes",
];

/// The supported keys of a task's platform attributes.
const TASK_DX_ATTRIBUTE_KEYS: &[&str] = &["details", "runSpec"];

/// The supported keys of a run specification.
const RUN_SPEC_KEYS: &[&str] = &[
    "access",
    "executionPolicy",
    "restartableEntryPoints",
    "timeoutPolicy",
];

/// The supported keys of the Docker registry configuration.
const DOCKER_REGISTRY_KEYS: &[&str] = &["credentials", "registry", "username"];

/// The supported keys of the custom reorganization configuration.
const CUSTOM_REORG_KEYS: &[&str] = &["app_id", "conf"];

/// The prefixes of a reorganization executable identifier.
const REORG_ID_PREFIXES: &[&str] = &["applet-", "app-"];

/// Checks that an object only has keys from the given allow-list.
pub(crate) fn check_keys(context: &str, object: &JsonMap, supported: &[&str]) -> Result<()> {
    let keys: Vec<_> = object
        .keys()
        .filter(|k| !supported.contains(&k.as_str()))
        .cloned()
        .collect();

    if keys.is_empty() {
        return Ok(());
    }

    Err(Error::UnsupportedKeys {
        context: context.to_string(),
        keys,
        supported: supported.iter().map(|s| s.to_string()).collect(),
    })
}

/// Gets a value as an object, if it is one.
///
/// Values of other shapes are left for typed deserialization to reject.
fn as_object(value: Option<&JsonValue>) -> Option<&JsonMap> {
    value.and_then(JsonValue::as_object)
}

/// Represents the run specification of a task.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RunSpec {
    /// The access requirements of the task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access: Option<JsonMap>,
    /// The execution policy (restart behavior) of the task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_policy: Option<JsonMap>,
    /// The entry points that may be restarted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restartable_entry_points: Option<String>,
    /// The timeout policy of the task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_policy: Option<JsonMap>,
}

/// Represents the platform attributes of a task.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DxAttributes {
    /// The run specification of the task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_spec: Option<RunSpec>,
    /// Additional details of the task's executable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<JsonMap>,
}

impl DxAttributes {
    /// Checks the keys of an attributes object and its run specification.
    fn check_keys(context: &str, object: &JsonMap) -> Result<()> {
        check_keys(context, object, TASK_DX_ATTRIBUTE_KEYS)?;
        if let Some(run_spec) = as_object(object.get("runSpec")) {
            check_keys(&format!("{context}.runSpec"), run_spec, RUN_SPEC_KEYS)?;
        }

        Ok(())
    }
}

/// Represents a private Docker registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct DockerRegistry {
    /// The host name of the registry.
    pub registry: String,
    /// The user name to log in with.
    pub username: String,
    /// The platform path of the file holding the registry credentials.
    pub credentials: String,
}

impl DockerRegistry {
    /// Validates the Docker registry configuration.
    pub fn validate(&self) -> Result<()> {
        if self.registry.is_empty() {
            return Err(Error::MalformedField(
                "configuration value `docker_registry.registry` cannot be empty".to_string(),
            ));
        }

        if DxPath::parse(&self.credentials).is_none() {
            return Err(Error::MalformedField(format!(
                "configuration value `docker_registry.credentials` must be a `dx://` path, but \
                 found `{credentials}`",
                credentials = self.credentials
            )));
        }

        Ok(())
    }
}

/// Represents a custom reorganization of workflow outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct CustomReorg {
    /// The identifier of the reorganization applet or app.
    pub app_id: String,
    /// The platform path of the reorganization configuration file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conf: Option<String>,
}

impl CustomReorg {
    /// Validates the custom reorganization configuration.
    pub fn validate(&self) -> Result<()> {
        if !REORG_ID_PREFIXES
            .iter()
            .any(|prefix| self.app_id.starts_with(prefix))
        {
            return Err(Error::MalformedField(format!(
                "configuration value `custom_reorg.app_id` must be an applet or app identifier, \
                 but found `{id}`",
                id = self.app_id
            )));
        }

        if let Some(conf) = &self.conf
            && DxPath::parse(conf).is_none()
        {
            return Err(Error::MalformedField(format!(
                "configuration value `custom_reorg.conf` must be a `dx://` path, but found \
                 `{conf}`"
            )));
        }

        Ok(())
    }
}

/// Represents the extras configuration file.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct Extras {
    /// The runtime attributes applied to tasks that do not specify them.
    #[serde(default, skip_serializing_if = "JsonMap::is_empty")]
    pub default_runtime_attributes: JsonMap,
    /// The platform attributes applied to every task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_task_dx_attributes: Option<DxAttributes>,
    /// The platform attributes of specific tasks, by task name.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub per_task_dx_attributes: IndexMap<String, DxAttributes>,
    /// The private Docker registry to log in to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker_registry: Option<DockerRegistry>,
    /// The custom reorganization of workflow outputs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_reorg: Option<CustomReorg>,
    /// Whether or not job reuse is disabled.
    #[serde(default)]
    pub ignore_reuse: bool,
    /// Whether or not destruction of job workspaces is delayed.
    #[serde(default)]
    pub delay_workspace_destruction: bool,
}

impl Extras {
    /// Parses the extras configuration from a JSON string.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let value: JsonValue = serde_json::from_str(s)
            .map_err(|e| Error::MalformedField(format!("invalid extras file: {e}")))?;

        let Some(object) = value.as_object() else {
            return Err(Error::MalformedField(
                "the extras file must contain a JSON object".to_string(),
            ));
        };

        check_keys("extras", object, TOP_LEVEL_KEYS)?;

        if let Some(attrs) = as_object(object.get("default_runtime_attributes")) {
            check_keys("default_runtime_attributes", attrs, RUNTIME_ATTRIBUTE_KEYS)?;
        }

        if let Some(attrs) = as_object(object.get("default_task_dx_attributes")) {
            DxAttributes::check_keys("default_task_dx_attributes", attrs)?;
        }

        if let Some(tasks) = as_object(object.get("per_task_dx_attributes")) {
            for (task, attrs) in tasks {
                if let Some(attrs) = attrs.as_object() {
                    DxAttributes::check_keys(&format!("per_task_dx_attributes.{task}"), attrs)?;
                }
            }
        }

        if let Some(registry) = as_object(object.get("docker_registry")) {
            check_keys("docker_registry", registry, DOCKER_REGISTRY_KEYS)?;
        }

        if let Some(reorg) = as_object(object.get("custom_reorg")) {
            check_keys("custom_reorg", reorg, CUSTOM_REORG_KEYS)?;
        }

        let extras: Self = serde_json::from_value(value)
            .map_err(|e| Error::MalformedField(format!("invalid extras file: {e}")))?;
        extras.validate()?;

        debug!(
            "loaded extras with {count} per-task attribute override(s)",
            count = extras.per_task_dx_attributes.len()
        );
        Ok(extras)
    }

    /// Reads the extras configuration from a file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_json_str(&contents)
    }

    /// Validates the extras configuration.
    pub fn validate(&self) -> Result<()> {
        if let Some(registry) = &self.docker_registry {
            registry.validate()?;
        }

        if let Some(reorg) = &self.custom_reorg {
            reorg.validate()?;
        }

        Ok(())
    }

    /// Gets the platform attributes of a task.
    ///
    /// Attributes specific to the task take precedence over the defaults.
    pub fn task_dx_attributes(&self, task: &str) -> Option<&DxAttributes> {
        self.per_task_dx_attributes
            .get(task)
            .or(self.default_task_dx_attributes.as_ref())
    }
}
