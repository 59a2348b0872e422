//! Deployment orchestration across environment directories.
//!
//! For every selected directory the protocol is: resolve its configuration,
//! render the environment overlay into a scoped temporary artifact, apply
//! the artifact under retry, pause for cluster state to settle, then run
//! each configured wait command under the same retry limit. The first
//! failing directory aborts the run.

pub mod executor;
pub mod retry;
pub mod selector;

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::{DeploymentConfig, CONFIG_FILE_NAME};
use crate::subprocess::{ProcessCommand, ProcessCommandBuilder, SubprocessManager};
use executor::CommandExecutor;
use retry::{run_with_retry, RetrySettings, DEFAULT_RETRY_DELAY};

pub const RENDER_TOOL: &str = "kustomize";
pub const CLUSTER_TOOL: &str = "kubectl";

const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(1);

/// One deployment run, as resolved from the command line.
#[derive(Debug, Clone)]
pub struct DeployRequest {
    pub root: PathBuf,
    pub environment: String,
    pub kubectl_options: String,
    pub dry_run: bool,
}

/// Deploy every valid environment directory under the request's root.
pub async fn run(request: &DeployRequest, subprocess: SubprocessManager) -> Result<()> {
    resolve_tools()?;

    let orchestrator = Orchestrator::new(subprocess, request.dry_run, &request.kubectl_options)?;
    orchestrator
        .deploy_all(&request.root, &request.environment)
        .await
}

/// Both external tools must be resolvable before any directory is touched.
fn resolve_tools() -> Result<()> {
    for tool in [RENDER_TOOL, CLUSTER_TOOL] {
        which::which(tool).map_err(|_| anyhow!("required tool not found on PATH: {tool}"))?;
    }
    Ok(())
}

pub struct Orchestrator {
    executor: CommandExecutor,
    kubectl_args: Vec<String>,
    retry_delay: Duration,
    settle_delay: Duration,
}

impl Orchestrator {
    pub fn new(
        subprocess: SubprocessManager,
        dry_run: bool,
        kubectl_options: &str,
    ) -> Result<Self> {
        let kubectl_args = shell_words::split(kubectl_options)
            .with_context(|| format!("invalid kubectl options: {kubectl_options}"))?;

        Ok(Self {
            executor: CommandExecutor::new(subprocess, dry_run),
            kubectl_args,
            retry_delay: DEFAULT_RETRY_DELAY,
            settle_delay: DEFAULT_SETTLE_DELAY,
        })
    }

    /// Override the retry and post-apply settle delays.
    pub fn with_delays(mut self, retry_delay: Duration, settle_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self.settle_delay = settle_delay;
        self
    }

    /// Process every deploy target under `root` in selector order, with a
    /// blank line separating consecutive directories' output.
    pub async fn deploy_all(&self, root: &Path, environment: &str) -> Result<()> {
        let targets = selector::discover_targets(root, environment)?;
        tracing::info!(
            "Deploying {} directories under {} for environment {}",
            targets.len(),
            root.display(),
            environment
        );

        for (index, directory) in targets.iter().enumerate() {
            if index > 0 {
                println!();
            }
            self.deploy_directory(directory, environment).await?;
        }

        Ok(())
    }

    /// Run the render, apply, settle, wait protocol for one directory.
    pub async fn deploy_directory(&self, directory: &Path, environment: &str) -> Result<()> {
        let config = DeploymentConfig::load(&directory.join(CONFIG_FILE_NAME)).await?;

        if config.deploy_type != "kustomize" {
            return Err(anyhow!(
                "unsupported deployment type {:?} in {}",
                config.deploy_type,
                directory.display()
            ));
        }

        // Removed on every exit path when dropped, including early failure
        // returns.
        let artifact = tempfile::Builder::new()
            .prefix("kubeinit-render-")
            .suffix(".yaml")
            .tempfile()
            .context("failed to create temporary render artifact")?;

        self.render(directory, environment, artifact.path()).await?;

        let retry = RetrySettings::new(config.retry_limit).with_delay(self.retry_delay);

        self.apply(&retry, artifact.path()).await?;

        if !self.executor.dry_run() {
            // Give asynchronous cluster state a moment to settle before the
            // wait commands are issued.
            tokio::time::sleep(self.settle_delay).await;
        }

        for expression in &config.wait {
            self.wait(&retry, &config.namespace, expression).await?;
        }

        Ok(())
    }

    /// Render the directory's environment overlay into `artifact`. Rendering
    /// runs exactly once; a failure is fatal for the directory. The artifact
    /// is fully written and closed before the apply step reads it.
    async fn render(&self, directory: &Path, environment: &str, artifact: &Path) -> Result<()> {
        let overlay = directory.join(environment);
        let command = ProcessCommandBuilder::new(RENDER_TOOL)
            .arg("build")
            .arg(&overlay.to_string_lossy())
            .build();

        let manifests = self.executor.capture(&command).await?;

        tokio::fs::write(artifact, manifests)
            .await
            .with_context(|| format!("failed to write render artifact {}", artifact.display()))
    }

    /// Apply the rendered artifact on the cluster-control tool's stdin. The
    /// artifact is reread on every attempt, so each retry is a pure function
    /// of the descriptor.
    async fn apply(&self, retry: &RetrySettings, artifact: &Path) -> Result<()> {
        let command = self.cluster_command().args(["apply", "-f", "-"]).build();

        run_with_retry(retry, || {
            let command = command.clone();
            async move {
                let manifests = tokio::fs::read_to_string(artifact).await.with_context(|| {
                    format!("failed to read render artifact {}", artifact.display())
                })?;

                let command = ProcessCommand {
                    stdin: Some(manifests),
                    ..command
                };
                self.executor.run(&command).await?;
                Ok(())
            }
        })
        .await
    }

    /// Run one configured wait expression against the configured namespace.
    async fn wait(&self, retry: &RetrySettings, namespace: &str, expression: &str) -> Result<()> {
        let wait_args = shell_words::split(expression)
            .with_context(|| format!("invalid wait expression: {expression}"))?;

        let command = self
            .cluster_command()
            .args(["-n", namespace])
            .args(&wait_args)
            .build();

        run_with_retry(retry, || {
            let command = command.clone();
            async move {
                self.executor.run(&command).await?;
                Ok(())
            }
        })
        .await
    }

    fn cluster_command(&self) -> ProcessCommandBuilder {
        ProcessCommandBuilder::new(CLUSTER_TOOL).args(&self.kubectl_args)
    }
}
