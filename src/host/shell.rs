use std::path::Path;

use async_trait::async_trait;

use crate::config::ShellProfile;
use crate::error::Result;

/// Output of a finished (or killed) terminal command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellOutput {
    /// `None` when the process was killed or terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub killed: bool,
}

/// A shell currently running a command on the agent's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningShell {
    pub shell: String,
    pub command: String,
}

/// Runs agent commands in named shells. One command per shell at a time.
#[async_trait]
pub trait ShellHost: Send + Sync {
    async fn execute(&self, profile: &ShellProfile, command: &str, cwd: &Path) -> Result<ShellOutput>;

    /// Returns `false` when nothing was running in that shell.
    async fn kill(&self, shell: &str) -> Result<bool>;

    fn running(&self) -> Vec<RunningShell>;

    fn is_running(&self, shell: &str) -> bool {
        self.running().iter().any(|r| r.shell == shell)
    }
}
