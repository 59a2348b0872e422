use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;

use super::error::ProcessError;

/// A single external process invocation, fully described by value.
///
/// Carries no state after completion; retried invocations rebuild their
/// behavior from the descriptor alone.
#[derive(Debug, Clone)]
pub struct ProcessCommand {
    pub program: String,
    pub args: Vec<String>,
    pub stdin: Option<String>,
}

impl ProcessCommand {
    /// The command line as shown to the user, program and arguments joined
    /// by single spaces.
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    Error(i32),
    Signal(i32),
}

impl ExitStatus {
    pub fn success(&self) -> bool {
        matches!(self, ExitStatus::Success)
    }

    pub fn code(&self) -> Option<i32> {
        match self {
            ExitStatus::Success => Some(0),
            ExitStatus::Error(code) => Some(*code),
            ExitStatus::Signal(_) => None,
        }
    }

    fn from_std(status: std::process::ExitStatus) -> Self {
        if status.success() {
            ExitStatus::Success
        } else if let Some(code) = status.code() {
            ExitStatus::Error(code)
        } else {
            signal_status(status)
        }
    }
}

#[cfg(unix)]
fn signal_status(status: std::process::ExitStatus) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;
    match status.signal() {
        Some(signal) => ExitStatus::Signal(signal),
        None => ExitStatus::Error(1),
    }
}

#[cfg(not(unix))]
fn signal_status(_status: std::process::ExitStatus) -> ExitStatus {
    ExitStatus::Error(1)
}

#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, command: ProcessCommand) -> Result<ProcessOutput, ProcessError>;
}

pub struct TokioProcessRunner;

impl TokioProcessRunner {
    async fn spawn(command: &ProcessCommand) -> Result<tokio::process::Child, ProcessError> {
        let stdin = if command.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        };

        let mut child = tokio::process::Command::new(&command.program)
            .args(&command.args)
            .stdin(stdin)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ProcessError::CommandNotFound(command.program.clone())
                } else {
                    ProcessError::Io(e)
                }
            })?;

        if let Some(stdin_data) = &command.stdin {
            Self::feed_stdin(&mut child, stdin_data).await?;
        }

        Ok(child)
    }

    async fn feed_stdin(
        child: &mut tokio::process::Child,
        stdin_data: &str,
    ) -> Result<(), ProcessError> {
        if let Some(mut stdin) = child.stdin.take() {
            use tokio::io::AsyncWriteExt;
            stdin
                .write_all(stdin_data.as_bytes())
                .await
                .map_err(ProcessError::Io)?;
            stdin.shutdown().await.map_err(ProcessError::Io)?;
        }
        Ok(())
    }

    fn log_result(result: &ProcessOutput, command: &ProcessCommand) {
        match &result.status {
            ExitStatus::Success => tracing::debug!(
                "Subprocess completed successfully in {:?}: {}",
                result.duration,
                command.display()
            ),
            ExitStatus::Error(code) => tracing::debug!(
                "Subprocess failed with exit code {} in {:?}: {}",
                code,
                result.duration,
                command.display()
            ),
            ExitStatus::Signal(signal) => tracing::warn!(
                "Subprocess terminated by signal {} in {:?}: {}",
                signal,
                result.duration,
                command.display()
            ),
        }
    }
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, command: ProcessCommand) -> Result<ProcessOutput, ProcessError> {
        let start = std::time::Instant::now();

        tracing::debug!("Executing subprocess: {}", command.display());

        let child = Self::spawn(&command).await?;
        let output = child.wait_with_output().await.map_err(ProcessError::Io)?;

        let result = ProcessOutput {
            status: ExitStatus::from_std(output.status),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration: start.elapsed(),
        };

        Self::log_result(&result, &command);

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_command() -> ProcessCommand {
        ProcessCommand {
            program: "echo".to_string(),
            args: vec!["test".to_string()],
            stdin: None,
        }
    }

    #[test]
    fn test_display_with_args() {
        let command = test_command();
        assert_eq!(command.display(), "echo test");
    }

    #[test]
    fn test_display_without_args() {
        let mut command = test_command();
        command.args.clear();
        assert_eq!(command.display(), "echo");
    }

    #[tokio::test]
    async fn test_run_captures_stdout() {
        let output = TokioProcessRunner.run(test_command()).await.unwrap();
        assert!(output.status.success());
        assert_eq!(output.stdout, "test\n");
        assert!(output.stderr.is_empty());
    }

    #[tokio::test]
    async fn test_run_with_stdin() {
        let command = ProcessCommand {
            program: "cat".to_string(),
            args: vec![],
            stdin: Some("piped input".to_string()),
        };

        let output = TokioProcessRunner.run(command).await.unwrap();
        assert!(output.status.success());
        assert_eq!(output.stdout, "piped input");
    }

    #[tokio::test]
    async fn test_run_nonzero_exit() {
        let command = ProcessCommand {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), "exit 7".to_string()],
            stdin: None,
        };

        let output = TokioProcessRunner.run(command).await.unwrap();
        assert_eq!(output.status, ExitStatus::Error(7));
        assert_eq!(output.status.code(), Some(7));
    }

    #[tokio::test]
    async fn test_run_command_not_found() {
        let command = ProcessCommand {
            program: "nonexistent_command_12345".to_string(),
            args: vec![],
            stdin: None,
        };

        let result = TokioProcessRunner.run(command).await;
        match result.unwrap_err() {
            ProcessError::CommandNotFound(program) => {
                assert_eq!(program, "nonexistent_command_12345");
            }
            other => panic!("Expected CommandNotFound, got {other:?}"),
        }
    }
}
