pub mod permissions;

use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use permissions::{Permission, PermissionConfig, PermissionLevel};

/// Top-level configuration from `.neuropilot.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub permissions: PermissionConfig,
    #[serde(default)]
    pub terminal: TerminalConfig,
}

/// `[workspace]` section: which paths the agent may see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Globs (relative to the workspace root) the agent may access.
    pub include: Vec<String>,
    /// Globs the agent may never access. Exclude wins over include.
    pub exclude: Vec<String>,
    /// Escape hatch: every path is accessible.
    pub allow_unsafe_paths: bool,
    /// Push file contents whenever the active editor changes.
    pub send_contents_on_file_change: bool,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            include: vec!["**/*".into()],
            exclude: Vec::new(),
            allow_unsafe_paths: false,
            send_contents_on_file_change: false,
        }
    }
}

/// `[terminal]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalConfig {
    pub shells: Vec<ShellProfile>,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        let shells = if cfg!(windows) {
            vec![ShellProfile::new("pwsh", "pwsh", &["-NoProfile", "-Command"])]
        } else {
            vec![
                ShellProfile::new("bash", "bash", &["-c"]),
                ShellProfile::new("sh", "sh", &["-c"]),
            ]
        };
        Self { shells }
    }
}

impl TerminalConfig {
    pub fn profile(&self, name: &str) -> Option<&ShellProfile> {
        self.shells.iter().find(|s| s.name == name)
    }
}

/// A shell the agent may run commands in. The command is appended as the
/// last argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShellProfile {
    pub name: String,
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl ShellProfile {
    pub fn new(name: &str, program: &str, args: &[&str]) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

impl Config {
    /// Load config from a TOML file. Returns default if file doesn't exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Generate a starter config file.
    pub fn starter_toml() -> &'static str {
        r#"# NeuroPilot bridge configuration

[workspace]
# Globs (relative to the workspace root) the agent may access.
include = ["**/*"]
# Globs the agent may never access. Exclude wins over include.
exclude = ["**/node_modules/**", "**/target/**"]
# Let the agent access every path, including hidden files and paths
# outside the workspace. Dangerous.
allow_unsafe_paths = false
# Push file contents to the agent whenever the active editor changes.
send_contents_on_file_change = false

[permissions]
# off: actions are not exposed. copilot: every run needs your approval.
# autopilot: actions run without asking.
open_files = "autopilot"
edit_active_document = "copilot"
create = "copilot"
rename = "copilot"
delete = "off"
terminal_access = "off"
access_linting_analysis = "autopilot"

# Individual actions to hide even when their permission is on.
# disabled_actions = ["read_file"]

# [[terminal.shells]]
# name = "bash"
# program = "bash"
# args = ["-c"]
"#
    }
}

/// Live access to the current configuration.
///
/// Every check reads through the provider, so a settings change is visible
/// to the very next validation.
pub trait ConfigProvider: Send + Sync {
    fn current(&self) -> Arc<Config>;
}

/// Configuration that the host swaps out on a settings change.
#[derive(Debug, Default)]
pub struct SharedConfig {
    inner: RwLock<Arc<Config>>,
}

impl SharedConfig {
    pub fn new(config: Config) -> Self {
        Self {
            inner: RwLock::new(Arc::new(config)),
        }
    }

    pub fn replace(&self, config: Config) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(config);
    }

    /// Apply an in-place change to a copy of the current configuration.
    pub fn update(&self, change: impl FnOnce(&mut Config)) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = Config::clone(&guard);
        change(&mut next);
        *guard = Arc::new(next);
    }
}

impl ConfigProvider for SharedConfig {
    fn current(&self) -> Arc<Config> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
