//! Per-directory deployment configuration.
//!
//! Each deployment directory carries a `kubernetesinit.yaml` describing how
//! its manifests are applied: the target namespace, the retry limit for
//! apply/wait commands, and the ordered wait expressions to run after a
//! successful apply. Missing fields fall back to defaults, so a config file
//! only needs to override what it cares about.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Well-known configuration file name looked up in every candidate
/// directory.
pub const CONFIG_FILE_NAME: &str = "kubernetesinit.yaml";

#[derive(Debug, Clone, Deserialize)]
pub struct DeploymentConfig {
    /// Schema tag, recorded but not interpreted.
    #[serde(default, rename = "apiVersion")]
    pub api_version: String,

    /// Document kind tag, recorded but not interpreted.
    #[serde(default)]
    pub kind: String,

    /// Target namespace for wait commands. Passed to the cluster-control
    /// tool even when empty.
    #[serde(default)]
    pub namespace: String,

    /// Deployment mode. Only kustomize-style rendering is implemented.
    #[serde(default = "default_deploy_type", rename = "type")]
    pub deploy_type: String,

    /// Maximum attempts for the apply command and for each wait command.
    #[serde(default = "default_retry_limit", rename = "retryLimit")]
    pub retry_limit: u32,

    /// Cluster-control wait sub-commands, run in declared order after a
    /// successful apply.
    #[serde(default)]
    pub wait: Vec<String>,
}

fn default_deploy_type() -> String {
    "kustomize".to_string()
}

fn default_retry_limit() -> u32 {
    3
}

impl DeploymentConfig {
    /// Load and decode the configuration at `path`. A missing or malformed
    /// file is an error; field values are not validated beyond decoding.
    pub async fn load(path: &Path) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;

        serde_yaml::from_str(&contents)
            .with_context(|| format!("invalid deployment config in {}", path.display()))
    }
}
