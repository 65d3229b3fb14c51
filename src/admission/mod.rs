//! Workload admission: validators that run before a job enters scheduling.
//!
//! Every validator returns a [`ValidationOutcome`]: advisory warnings plus
//! an optional hard [`AdmissionError`]. Validators compose through
//! [`AdmissionChain`], which stops at the first rejection.
//!
//! The secrets-cluster validator lives in [`secrets`] and is assembled from
//! the checks in [`cluster`], [`namespace`] and [`policy`].

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::token::LookupError;
use crate::workload::{Workload, WorkloadError};

pub mod cluster;
pub mod namespace;
pub mod policy;
pub mod secrets;

pub use namespace::NamespaceCompatibilityError;
pub use secrets::{SecretsAdmission, DEPRECATED_CREDENTIAL_WARNING};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a workload was rejected. Every variant is terminal.
#[derive(Debug, Error)]
pub enum AdmissionError {
    /// The workload's secrets blocks cannot be extracted unambiguously.
    #[error(transparent)]
    InvalidWorkload(#[from] WorkloadError),
    /// A referenced cluster is missing from configuration or disabled.
    #[error("Vault {cluster:?} {detail} but used in the job")]
    ClusterDisabled {
        /// Offending cluster name.
        cluster: String,
        /// "not configured" or "not enabled".
        detail: &'static str,
    },
    /// Authentication is required but no credential was supplied.
    #[error("Vault used in the job but missing Vault token")]
    MissingCredential,
    /// The credential lookup failed or was cancelled.
    #[error("failed to lookup Vault token: {0}")]
    CredentialLookup(#[source] LookupError),
    /// The looked-up token did not expose readable policies.
    #[error("failed to lookup Vault token policies: {0}")]
    TokenPolicies(#[source] LookupError),
    /// The credential cannot reach one or more declared namespaces.
    #[error(
        "Vault token doesn't allow access to the following namespaces: {}",
        .namespaces.join(", ")
    )]
    NamespaceMismatch {
        /// Uncovered namespaces, sorted.
        namespaces: Vec<String>,
    },
    /// The credential lacks one or more required policies.
    #[error(
        "Vault token doesn't allow access to the following policies: {}",
        .policies.join(", ")
    )]
    InsufficientPolicy {
        /// Missing policies, sorted.
        policies: Vec<String>,
    },
    /// The scheduler namespace rejected a referenced cluster.
    #[error(transparent)]
    NamespaceCompatibility(#[from] NamespaceCompatibilityError),
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Result of validating one workload.
///
/// Warnings may accompany an error when the failure happens after a
/// warning was attached.
#[derive(Debug, Default)]
pub struct ValidationOutcome {
    /// Advisory messages; never block admission.
    pub warnings: Vec<String>,
    /// Hard failure, if any.
    pub error: Option<AdmissionError>,
}

impl ValidationOutcome {
    /// Outcome with no warnings and no error.
    pub fn admitted() -> Self {
        Self::default()
    }

    /// Outcome rejecting with `error` and no warnings.
    pub fn rejected(error: AdmissionError) -> Self {
        Self {
            warnings: Vec::new(),
            error: Some(error),
        }
    }

    /// Append an advisory warning.
    #[must_use]
    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    /// Keep accumulated warnings and reject with `error`.
    #[must_use]
    pub fn fail(mut self, error: AdmissionError) -> Self {
        self.error = Some(error);
        self
    }

    /// True when no hard error was recorded.
    pub fn is_admitted(&self) -> bool {
        self.error.is_none()
    }

    /// Split into warnings and a `Result`.
    pub fn into_parts(self) -> (Vec<String>, Result<(), AdmissionError>) {
        let result = match self.error {
            Some(e) => Err(e),
            None => Ok(()),
        };
        (self.warnings, result)
    }
}

// ---------------------------------------------------------------------------
// Validator chain
// ---------------------------------------------------------------------------

/// A single admission check over a submitted workload.
#[async_trait]
pub trait AdmissionValidator: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Validate the workload. Long-running work must stop when `cancel` fires.
    async fn validate(&self, workload: &Workload, cancel: &CancellationToken)
        -> ValidationOutcome;
}

/// Runs validators in registration order, stopping at the first rejection.
#[derive(Default)]
pub struct AdmissionChain {
    validators: Vec<Arc<dyn AdmissionValidator>>,
}

impl AdmissionChain {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a validator.
    #[must_use]
    pub fn with(mut self, validator: Arc<dyn AdmissionValidator>) -> Self {
        self.validators.push(validator);
        self
    }

    /// Names of the registered validators, in order.
    pub fn names(&self) -> Vec<&'static str> {
        self.validators.iter().map(|v| v.name()).collect()
    }

    /// Run every validator, concatenating warnings until one rejects.
    pub async fn validate(
        &self,
        workload: &Workload,
        cancel: &CancellationToken,
    ) -> ValidationOutcome {
        let mut combined = ValidationOutcome::admitted();
        for validator in &self.validators {
            let outcome = validator.validate(workload, cancel).await;
            combined.warnings.extend(outcome.warnings);
            if let Some(error) = outcome.error {
                warn!(
                    validator = validator.name(),
                    workload = %workload.id,
                    error = %error,
                    "admission rejected"
                );
                return combined.fail(error);
            }
        }
        combined
    }
}
