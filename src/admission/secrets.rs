//! Secrets-cluster admission: the fixed validation pipeline.
//!
//! Steps, stopping at the first hard failure (after the blocks are extracted
//! without duplicate task keys):
//! 1. every referenced cluster is configured and enabled
//! 2. decide whether any cluster requires authentication
//! 3. the scheduler namespace may use those clusters
//! 4. without required auth, admit
//! 5. a credential must be present
//! 6. attach the deprecation warning (kept on every later path)
//! 7. look the credential up, honouring cancellation and the lookup timeout
//! 8. the credential reaches every declared namespace
//! 9. the credential holds every required policy

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::admission::cluster::{check_clusters_enabled, requires_auth};
use crate::admission::namespace::{
    check_token_namespaces, HierarchicalNamespaceMatcher, NamespaceClusterRules,
    NamespaceCompatibility, NamespaceMatcher,
};
use crate::admission::policy::check_token_policies;
use crate::admission::{AdmissionError, AdmissionValidator, ValidationOutcome};
use crate::config::ServerConfig;
use crate::token::{LookupError, TokenLookup, TokenSecret};
use crate::workload::{Credential, SecretsBlocks, Workload};

/// Warning returned whenever a submitted credential is used.
pub const DEPRECATED_CREDENTIAL_WARNING: &str = "Setting a Vault token when submitting a job is \
     deprecated and will be removed in a future release. Migrate your Vault configuration to use \
     workload identity";

/// A check run against the looked-up token once authentication is required.
type TokenCheck = fn(&SecretsAdmission, &SecretsBlocks, &TokenSecret) -> Result<(), AdmissionError>;

/// Admission validator for workloads that reference secrets clusters.
pub struct SecretsAdmission {
    config: Arc<ServerConfig>,
    lookup: Arc<dyn TokenLookup>,
    compatibility: Arc<dyn NamespaceCompatibility>,
    matcher: Arc<dyn NamespaceMatcher>,
}

impl SecretsAdmission {
    /// Create the validator with namespace rules taken from `config` and
    /// hierarchical namespace matching.
    pub fn new(config: Arc<ServerConfig>, lookup: Arc<dyn TokenLookup>) -> Self {
        let compatibility = Arc::new(NamespaceClusterRules::from_config(&config));
        Self {
            config,
            lookup,
            compatibility,
            matcher: Arc::new(HierarchicalNamespaceMatcher),
        }
    }

    /// Replace the scheduler-namespace compatibility check.
    #[must_use]
    pub fn with_compatibility(mut self, compatibility: Arc<dyn NamespaceCompatibility>) -> Self {
        self.compatibility = compatibility;
        self
    }

    /// Replace the backend namespace matcher.
    #[must_use]
    pub fn with_matcher(mut self, matcher: Arc<dyn NamespaceMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    /// Run the pipeline over one workload.
    pub async fn check(&self, workload: &Workload, cancel: &CancellationToken) -> ValidationOutcome {
        let blocks = match workload.secrets_blocks() {
            Ok(blocks) => blocks,
            Err(e) => return ValidationOutcome::rejected(e.into()),
        };
        if blocks.is_empty() {
            return ValidationOutcome::admitted();
        }
        debug!(workload = %workload.id, blocks = blocks.len(), "validating secrets blocks");

        if let Err(e) = check_clusters_enabled(&self.config, &blocks) {
            return ValidationOutcome::rejected(e);
        }
        let auth_required = requires_auth(&self.config, &blocks);

        if let Err(e) = self.compatibility.check(workload, &blocks) {
            return ValidationOutcome::rejected(e.into());
        }
        if !auth_required {
            debug!(workload = %workload.id, "no cluster requires authentication");
            return ValidationOutcome::admitted();
        }

        let Some(credential) = workload.credential() else {
            return ValidationOutcome::rejected(AdmissionError::MissingCredential);
        };
        let outcome = ValidationOutcome::admitted().with_warning(DEPRECATED_CREDENTIAL_WARNING);

        let token = match self.lookup_token(credential, cancel).await {
            Ok(token) => token,
            Err(e) => {
                warn!(workload = %workload.id, error = %e, "credential lookup failed");
                return outcome.fail(AdmissionError::CredentialLookup(e));
            }
        };

        let token_checks: [TokenCheck; 2] = [Self::authorize_namespaces, Self::authorize_policies];
        for check in token_checks {
            if let Err(e) = check(self, &blocks, &token) {
                return outcome.fail(e);
            }
        }

        info!(
            workload = %workload.id,
            accessor = %token.accessor,
            "secrets access authorized"
        );
        outcome
    }

    async fn lookup_token(
        &self,
        credential: &Credential,
        cancel: &CancellationToken,
    ) -> Result<TokenSecret, LookupError> {
        let timeout = self.config.lookup.timeout();
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(LookupError::Cancelled),
            result = tokio::time::timeout(timeout, self.lookup.lookup(credential)) => match result {
                Ok(lookup) => lookup,
                Err(_) => Err(LookupError::Timeout(timeout)),
            },
        }
    }

    fn authorize_namespaces(
        &self,
        blocks: &SecretsBlocks,
        token: &TokenSecret,
    ) -> Result<(), AdmissionError> {
        check_token_namespaces(&self.config, blocks, token, self.matcher.as_ref())
    }

    fn authorize_policies(
        &self,
        blocks: &SecretsBlocks,
        token: &TokenSecret,
    ) -> Result<(), AdmissionError> {
        check_token_policies(blocks, token)
    }
}

#[async_trait]
impl AdmissionValidator for SecretsAdmission {
    fn name(&self) -> &'static str {
        "secrets"
    }

    async fn validate(
        &self,
        workload: &Workload,
        cancel: &CancellationToken,
    ) -> ValidationOutcome {
        self.check(workload, cancel).await
    }
}
