//! Dry-run-aware command execution.

use crate::subprocess::{ExitStatus, ProcessCommand, ProcessError, SubprocessManager};

/// Runs process descriptors through the subprocess layer, honoring dry-run
/// mode. Every invocation announces its command line on stdout exactly once,
/// whether or not the process is actually launched.
pub struct CommandExecutor {
    subprocess: SubprocessManager,
    dry_run: bool,
}

impl CommandExecutor {
    pub fn new(subprocess: SubprocessManager, dry_run: bool) -> Self {
        Self { subprocess, dry_run }
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    /// Execute `command`, passing its stdout through to our stdout. Stderr
    /// is always passed through unparsed. A non-zero exit becomes
    /// [`ProcessError::ExitCode`] so callers can recover the code.
    pub async fn run(&self, command: &ProcessCommand) -> Result<(), ProcessError> {
        let output = match self.execute(command).await? {
            Some(output) => output,
            None => return Ok(()),
        };

        if !output.stdout.is_empty() {
            print!("{}", output.stdout);
        }

        Self::check_status(output.status)
    }

    /// Execute `command` and return its stdout to the caller instead of
    /// printing it.
    pub async fn capture(&self, command: &ProcessCommand) -> Result<String, ProcessError> {
        let output = match self.execute(command).await? {
            Some(output) => output,
            None => return Ok(String::new()),
        };

        let stdout = output.stdout;
        Self::check_status(output.status)?;
        Ok(stdout)
    }

    async fn execute(
        &self,
        command: &ProcessCommand,
    ) -> Result<Option<crate::subprocess::ProcessOutput>, ProcessError> {
        println!("Run:  {}", command.display());
        if self.dry_run {
            return Ok(None);
        }

        let output = self.subprocess.runner().run(command.clone()).await?;
        if !output.stderr.is_empty() {
            eprint!("{}", output.stderr);
        }
        Ok(Some(output))
    }

    fn check_status(status: ExitStatus) -> Result<(), ProcessError> {
        match status {
            ExitStatus::Success => Ok(()),
            ExitStatus::Error(code) => Err(ProcessError::ExitCode(code)),
            ExitStatus::Signal(signal) => Err(ProcessError::Signal(signal)),
        }
    }
}
