//! Policy coverage of a looked-up credential.
//!
//! Required policies are the union over every secrets block in the workload,
//! never a per-block comparison. A token holding the root policy skips the
//! comparison entirely.

use std::collections::BTreeSet;

use crate::admission::AdmissionError;
use crate::token::{TokenSecret, ROOT_POLICY};
use crate::workload::SecretsBlocks;

/// Whether `want` is contained in `have`, plus the missing elements in order.
pub fn is_subset(have: &BTreeSet<String>, want: &BTreeSet<String>) -> (bool, Vec<String>) {
    let offending: Vec<String> = want.difference(have).cloned().collect();
    (offending.is_empty(), offending)
}

/// Check that `granted` covers `required`.
///
/// # Errors
///
/// Returns `AdmissionError::InsufficientPolicy` listing the missing policies
/// alphabetically.
pub fn check_policy_subset(
    required: &BTreeSet<String>,
    granted: &BTreeSet<String>,
) -> Result<(), AdmissionError> {
    if required.is_empty() || granted.contains(ROOT_POLICY) {
        return Ok(());
    }
    match is_subset(granted, required) {
        (true, _) => Ok(()),
        (false, policies) => Err(AdmissionError::InsufficientPolicy { policies }),
    }
}

/// Check the token against every policy the workload's blocks require.
///
/// # Errors
///
/// Returns `AdmissionError::TokenPolicies` if the token's policies cannot be
/// read, or `AdmissionError::InsufficientPolicy` if any are missing.
pub fn check_token_policies(
    blocks: &SecretsBlocks,
    token: &TokenSecret,
) -> Result<(), AdmissionError> {
    let required = blocks.required_policies();
    if required.is_empty() || token.is_root() {
        return Ok(());
    }
    let granted = token.policies().map_err(AdmissionError::TokenPolicies)?;
    check_policy_subset(&required, &granted)
}
