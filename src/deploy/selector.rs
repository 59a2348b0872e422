//! Selection of deployment target directories.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::CONFIG_FILE_NAME;

/// List the immediate children of `root` that are deployable for
/// `environment`: those with an `<environment>` subdirectory and a
/// `kubernetesinit.yaml` at their top level. Children failing either check
/// are excluded, not errors. Results follow glob enumeration order
/// (lexicographic).
pub fn discover_targets(root: &Path, environment: &str) -> Result<Vec<PathBuf>> {
    let pattern = root.join("*");
    let pattern = pattern.to_string_lossy();

    let entries = glob::glob(&pattern)
        .with_context(|| format!("failed to list entries under {}", root.display()))?;

    let mut targets = Vec::new();
    for entry in entries {
        let path = entry.with_context(|| format!("failed to read entry under {}", root.display()))?;
        if is_deploy_target(&path, environment) {
            targets.push(path);
        } else {
            tracing::debug!("Skipping {}: not a deploy target", path.display());
        }
    }

    Ok(targets)
}

fn is_deploy_target(path: &Path, environment: &str) -> bool {
    path.join(environment).is_dir() && path.join(CONFIG_FILE_NAME).is_file()
}
