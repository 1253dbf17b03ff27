//! Representation of the instance-type table carried by an executable.

use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;

/// Represents the resources of a platform instance type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceType {
    /// The name of the instance type (e.g. `mem1_ssd1_v2_x4`).
    pub name: String,
    /// The memory of the instance, in mebibytes.
    #[serde(rename = "memoryMB")]
    pub memory_mb: u64,
    /// The local disk space of the instance, in gibibytes.
    #[serde(rename = "diskGB")]
    pub disk_gb: u64,
    /// The number of CPUs of the instance.
    pub cpu: u32,
    /// The number of GPUs of the instance.
    #[serde(default)]
    pub gpu: u32,
    /// The hourly price of the instance, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
}

/// Represents the table of instance types available to an executable.
///
/// The table is only carried for the task; choosing an instance type is the
/// responsibility of the caller.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceTypeDb {
    /// The instance types, by name.
    #[serde(default)]
    instance_types: IndexMap<String, InstanceType>,
}

impl InstanceTypeDb {
    /// Gets an instance type by name.
    pub fn get(&self, name: &str) -> Option<&InstanceType> {
        self.instance_types.get(name)
    }

    /// Iterates the instance types in the table.
    pub fn iter(&self) -> impl Iterator<Item = &InstanceType> {
        self.instance_types.values()
    }

    /// Gets the number of instance types in the table.
    pub fn len(&self) -> usize {
        self.instance_types.len()
    }

    /// Determines if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.instance_types.is_empty()
    }
}
