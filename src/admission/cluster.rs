//! Cluster enablement and authentication requirement checks.

use crate::admission::AdmissionError;
use crate::config::ServerConfig;
use crate::workload::SecretsBlocks;

/// Fail unless every referenced cluster is configured and enabled.
///
/// Reports the first offending cluster in group/task order.
///
/// # Errors
///
/// Returns `AdmissionError::ClusterDisabled` naming the cluster.
pub fn check_clusters_enabled(
    config: &ServerConfig,
    blocks: &SecretsBlocks,
) -> Result<(), AdmissionError> {
    for block in blocks.all_blocks() {
        let cluster = block.cluster_id();
        let detail = match config.cluster(cluster) {
            None => "not configured",
            Some(c) if !c.enabled => "not enabled",
            Some(_) => continue,
        };
        return Err(AdmissionError::ClusterDisabled {
            cluster: cluster.to_owned(),
            detail,
        });
    }
    Ok(())
}

/// True when any referenced cluster refuses unauthenticated access.
///
/// Unknown clusters count as requiring authentication.
pub fn requires_auth(config: &ServerConfig, blocks: &SecretsBlocks) -> bool {
    blocks
        .all_blocks()
        .any(|b| config.cluster(b.cluster_id()).map_or(true, |c| c.requires_auth()))
}
