#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Command not found: {0}")]
    CommandNotFound(String),

    #[error("Process exited with code {0}")]
    ExitCode(i32),

    #[error("Process terminated by signal {0}")]
    Signal(i32),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Mock expectation not met: {0}")]
    MockExpectationNotMet(String),
}

impl ProcessError {
    /// The process exit code carried by this error, if it represents a
    /// non-zero exit.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ProcessError::ExitCode(code) => Some(*code),
            _ => None,
        }
    }
}
