//! Submitted workload definitions and the secrets blocks they declare.
//!
//! A [`Workload`] is the job as handed to admission. Its secrets blocks are
//! extracted once into a [`SecretsBlocks`] aggregate (task group → task →
//! block) so every check can iterate a flat view instead of nesting loops.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use anyhow::Context;
use serde::Deserialize;
use thiserror::Error;

/// Cluster name used when a secrets block leaves `cluster` empty.
pub const DEFAULT_CLUSTER: &str = "default";

/// Structural problems in a submitted workload.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkloadError {
    /// Two tasks with secrets blocks share a group and task name.
    #[error("task {task:?} in group {group:?} is declared more than once")]
    DuplicateTask {
        /// Group name.
        group: String,
        /// Task name.
        task: String,
    },
}

/// Opaque credential submitted alongside a workload.
///
/// Debug output always shows `__REDACTED__`; the value is never logged.
/// Deserialize-only: a workload is never serialized back out.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    /// Wrap a raw credential string.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the raw value. Use only when handing it to the lookup client.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// True when no credential text was supplied (whitespace counts as empty).
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("__REDACTED__")
    }
}

/// A task's declared dependency on a secrets cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SecretsBlock {
    /// Secrets cluster name. Empty means [`DEFAULT_CLUSTER`].
    pub cluster: String,
    /// Target namespace in the secrets backend. Empty means the cluster default.
    pub namespace: String,
    /// Policies the task needs.
    pub policies: Vec<String>,
}

impl SecretsBlock {
    /// Build a block for `cluster` with the given namespace and policies.
    pub fn new<I, S>(cluster: impl Into<String>, namespace: impl Into<String>, policies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cluster: cluster.into(),
            namespace: namespace.into(),
            policies: policies.into_iter().map(Into::into).collect(),
        }
    }

    /// Cluster this block refers to, resolving the empty name to the default.
    pub fn cluster_id(&self) -> &str {
        if self.cluster.is_empty() {
            DEFAULT_CLUSTER
        } else {
            &self.cluster
        }
    }
}

/// A single task inside a task group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Task {
    /// Task name, unique within its group.
    pub name: String,
    /// Optional secrets block.
    pub secrets: Option<SecretsBlock>,
}

/// A named group of tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TaskGroup {
    /// Group name, unique within the workload.
    pub name: String,
    /// Tasks in the group.
    pub tasks: Vec<Task>,
}

/// The workload definition submitted for admission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Workload {
    /// Workload identifier.
    pub id: String,
    /// Scheduler namespace the workload is submitted into.
    pub namespace: String,
    /// Task groups.
    pub task_groups: Vec<TaskGroup>,
    /// Credential submitted for secrets access, if any.
    pub credential: Option<Credential>,
}

impl Workload {
    /// Parse a workload from its JSON submission form.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not a valid workload document.
    pub fn from_json(payload: &str) -> anyhow::Result<Self> {
        serde_json::from_str(payload).context("failed to parse workload definition")
    }

    /// Extract every declared secrets block, keyed by group then task.
    ///
    /// # Errors
    ///
    /// Returns `WorkloadError::DuplicateTask` when two blocks land on the same
    /// group/task key, since one of them would otherwise go unchecked.
    pub fn secrets_blocks(&self) -> Result<SecretsBlocks, WorkloadError> {
        let mut blocks = SecretsBlocks::default();
        for group in &self.task_groups {
            for task in &group.tasks {
                if let Some(block) = &task.secrets {
                    blocks.insert(&group.name, &task.name, block.clone())?;
                }
            }
        }
        Ok(blocks)
    }

    /// The submitted credential, or `None` when absent or blank.
    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref().filter(|c| !c.is_empty())
    }
}

/// Secrets blocks of one workload, grouped by task group then task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretsBlocks {
    groups: BTreeMap<String, BTreeMap<String, SecretsBlock>>,
}

impl SecretsBlocks {
    /// Record the block declared by `task` in `group`.
    ///
    /// # Errors
    ///
    /// Returns `WorkloadError::DuplicateTask` if the task already has a block.
    pub fn insert(
        &mut self,
        group: &str,
        task: &str,
        block: SecretsBlock,
    ) -> Result<(), WorkloadError> {
        match self.groups.entry(group.to_owned()).or_default().entry(task.to_owned()) {
            Entry::Occupied(_) => Err(WorkloadError::DuplicateTask {
                group: group.to_owned(),
                task: task.to_owned(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(block);
                Ok(())
            }
        }
    }

    /// Look up the block for a specific task.
    pub fn get(&self, group: &str, task: &str) -> Option<&SecretsBlock> {
        self.groups.get(group).and_then(|tasks| tasks.get(task))
    }

    /// True when the workload declares no secrets blocks.
    pub fn is_empty(&self) -> bool {
        self.groups.values().all(BTreeMap::is_empty)
    }

    /// Number of declared blocks.
    pub fn len(&self) -> usize {
        self.groups.values().map(BTreeMap::len).sum()
    }

    /// Flat view over every block, in group/task name order.
    pub fn all_blocks(&self) -> impl Iterator<Item = &SecretsBlock> {
        self.groups.values().flat_map(BTreeMap::values)
    }

    /// Union of required policies across all blocks.
    pub fn required_policies(&self) -> BTreeSet<String> {
        self.all_blocks()
            .flat_map(|b| b.policies.iter().cloned())
            .collect()
    }

    /// Distinct clusters referenced by the blocks.
    pub fn clusters(&self) -> BTreeSet<&str> {
        self.all_blocks().map(SecretsBlock::cluster_id).collect()
    }
}
