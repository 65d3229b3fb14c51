//! Namespace checks.
//!
//! Two unrelated namespaces meet here:
//! - the scheduler namespace a workload is submitted into, which may limit
//!   which secrets clusters it can reference ([`NamespaceCompatibility`])
//! - the secrets-backend namespace each block targets, which the credential
//!   must be able to reach ([`NamespaceMatcher`])

use std::collections::{BTreeSet, HashMap};

use regex::Regex;
use thiserror::Error;

use crate::admission::AdmissionError;
use crate::config::{NamespaceRule, ServerConfig};
use crate::token::TokenSecret;
use crate::workload::{SecretsBlocks, Workload};

// ---------------------------------------------------------------------------
// Scheduler namespace vs. cluster
// ---------------------------------------------------------------------------

/// Rejection from a [`NamespaceCompatibility`] check. Surfaced verbatim.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct NamespaceCompatibilityError(pub String);

/// Decides whether a workload's scheduler namespace may use the clusters its
/// blocks reference.
pub trait NamespaceCompatibility: Send + Sync {
    /// Check every referenced cluster.
    ///
    /// # Errors
    ///
    /// Returns a [`NamespaceCompatibilityError`] describing the rejection.
    fn check(
        &self,
        workload: &Workload,
        blocks: &SecretsBlocks,
    ) -> Result<(), NamespaceCompatibilityError>;
}

/// Permits every cluster in every namespace.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAllNamespaces;

impl NamespaceCompatibility for AllowAllNamespaces {
    fn check(&self, _: &Workload, _: &SecretsBlocks) -> Result<(), NamespaceCompatibilityError> {
        Ok(())
    }
}

/// Enforces per-namespace allowed/denied cluster patterns.
///
/// Namespaces without a rule accept every cluster.
#[derive(Debug, Default, Clone)]
pub struct NamespaceClusterRules {
    rules: HashMap<String, NamespaceRule>,
}

impl NamespaceClusterRules {
    /// Build from explicit rules keyed by scheduler namespace.
    pub fn new(rules: HashMap<String, NamespaceRule>) -> Self {
        Self { rules }
    }

    /// Build from the server's `[namespaces]` table.
    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(config.namespaces.clone())
    }
}

impl NamespaceCompatibility for NamespaceClusterRules {
    fn check(
        &self,
        workload: &Workload,
        blocks: &SecretsBlocks,
    ) -> Result<(), NamespaceCompatibilityError> {
        let Some(rule) = self.rules.get(&workload.namespace) else {
            return Ok(());
        };

        let offending: Vec<&str> = blocks
            .clusters()
            .into_iter()
            .filter(|cluster| !cluster_permitted(rule, cluster))
            .collect();
        if offending.is_empty() {
            return Ok(());
        }
        Err(NamespaceCompatibilityError(format!(
            "namespace {:?} does not allow Vault clusters: {}",
            workload.namespace,
            offending.join(", ")
        )))
    }
}

fn cluster_permitted(rule: &NamespaceRule, cluster: &str) -> bool {
    if rule.denied.iter().any(|p| glob_match(p, cluster)) {
        return false;
    }
    rule.allowed.is_empty() || rule.allowed.iter().any(|p| glob_match(p, cluster))
}

/// Match `value` against a pattern where `*` stands for any run of characters.
pub fn glob_match(pattern: &str, value: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == value;
    }
    let escaped: Vec<String> = pattern.split('*').map(regex::escape).collect();
    match Regex::new(&format!("^{}$", escaped.join(".*"))) {
        Ok(re) => re.is_match(value),
        Err(_) => false,
    }
}

// ---------------------------------------------------------------------------
// Credential vs. backend namespace
// ---------------------------------------------------------------------------

/// Decides whether a token can reach a backend namespace.
pub trait NamespaceMatcher: Send + Sync {
    /// True when `token` may access `namespace`.
    fn covers(&self, token: &TokenSecret, namespace: &str) -> bool;
}

/// A token reaches its own namespace and every namespace nested below it.
/// Root-namespace tokens reach everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct HierarchicalNamespaceMatcher;

impl NamespaceMatcher for HierarchicalNamespaceMatcher {
    fn covers(&self, token: &TokenSecret, namespace: &str) -> bool {
        let home = token.namespace_path.trim_matches('/');
        if home.is_empty() {
            return true;
        }
        let target = namespace.trim_matches('/');
        target == home
            || target
                .strip_prefix(home)
                .is_some_and(|rest| rest.starts_with('/'))
    }
}

/// Backend namespaces targeted by the blocks, falling back to each cluster's
/// configured default. Blocks with neither, or naming only the root (`/`),
/// are omitted.
pub fn declared_namespaces(config: &ServerConfig, blocks: &SecretsBlocks) -> BTreeSet<String> {
    blocks
        .all_blocks()
        .filter_map(|block| {
            if block.namespace.is_empty() {
                config
                    .cluster(block.cluster_id())
                    .and_then(|c| c.namespace.clone())
            } else {
                Some(block.namespace.clone())
            }
        })
        .filter(|ns| !ns.trim_matches('/').is_empty())
        .collect()
}

/// Check the token against every namespace the workload's blocks target.
///
/// # Errors
///
/// Returns `AdmissionError::NamespaceMismatch` listing every namespace the
/// token cannot reach.
pub fn check_token_namespaces(
    config: &ServerConfig,
    blocks: &SecretsBlocks,
    token: &TokenSecret,
    matcher: &dyn NamespaceMatcher,
) -> Result<(), AdmissionError> {
    let namespaces: Vec<String> = declared_namespaces(config, blocks)
        .into_iter()
        .filter(|ns| !matcher.covers(token, ns))
        .collect();
    if namespaces.is_empty() {
        Ok(())
    } else {
        Err(AdmissionError::NamespaceMismatch { namespaces })
    }
}
