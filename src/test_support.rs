//! Shared fixtures for unit tests: a `/work` workspace on in-memory
//! backends with every capability on autopilot.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::config::{Config, PermissionConfig, PermissionLevel, ShellProfile, SharedConfig};
use crate::context::ActionContext;
use crate::error::Result;
use crate::host::memory::{MemoryEditor, MemoryFs, RecordingTransport, StaticDiagnostics};
use crate::host::{RunningShell, ShellHost, ShellOutput};
use crate::safety::WorkspaceRoot;

pub const ROOT: &str = "/work";

/// A shell host that echoes instead of spawning processes.
#[derive(Debug, Default)]
pub struct ScriptedShells {
    running: Mutex<Vec<RunningShell>>,
    executed: Mutex<Vec<(String, String)>>,
}

impl ScriptedShells {
    pub fn set_running(&self, shell: &str, command: &str) {
        self.running.lock().unwrap().push(RunningShell {
            shell: shell.into(),
            command: command.into(),
        });
    }

    pub fn running_commands(&self) -> Vec<RunningShell> {
        self.running.lock().unwrap().clone()
    }

    pub fn executed(&self) -> Vec<(String, String)> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl ShellHost for ScriptedShells {
    async fn execute(&self, profile: &ShellProfile, command: &str, _cwd: &Path) -> Result<ShellOutput> {
        self.executed
            .lock()
            .unwrap()
            .push((profile.name.clone(), command.to_string()));
        let stdout = command
            .strip_prefix("echo ")
            .map(|rest| format!("{rest}\n"))
            .unwrap_or_default();
        Ok(ShellOutput {
            exit_code: Some(0),
            stdout,
            stderr: String::new(),
            killed: false,
        })
    }

    async fn kill(&self, shell: &str) -> Result<bool> {
        let mut running = self.running.lock().unwrap();
        let before = running.len();
        running.retain(|r| r.shell != shell);
        Ok(running.len() != before)
    }

    fn running(&self) -> Vec<RunningShell> {
        self.running_commands()
    }
}

pub struct Harness {
    pub ctx: Arc<ActionContext>,
    pub fs: Arc<MemoryFs>,
    pub editor: Arc<MemoryEditor>,
    pub transport: Arc<RecordingTransport>,
    pub config: Arc<SharedConfig>,
    pub diagnostics: Arc<StaticDiagnostics>,
    pub shells: Arc<ScriptedShells>,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(Some(WorkspaceRoot::new(ROOT)), default_config(), true)
    }

    pub fn with_config(config: Config) -> Self {
        Self::build(Some(WorkspaceRoot::new(ROOT)), config, true)
    }

    pub fn without_workspace() -> Self {
        Self::build(None, default_config(), true)
    }

    pub fn without_shells() -> Self {
        Self::build(Some(WorkspaceRoot::new(ROOT)), default_config(), false)
    }

    fn build(root: Option<WorkspaceRoot>, config: Config, with_shells: bool) -> Self {
        let fs = Arc::new(MemoryFs::new());
        fs.insert_dir(ROOT);
        let editor = Arc::new(MemoryEditor::new(fs.clone()));
        let transport = Arc::new(RecordingTransport::new());
        let config = Arc::new(SharedConfig::new(config));
        let diagnostics = Arc::new(StaticDiagnostics::default());
        let shells = Arc::new(ScriptedShells::default());

        let mut ctx = ActionContext::new(
            root,
            config.clone(),
            fs.clone(),
            editor.clone(),
            transport.clone(),
        )
        .with_diagnostics(diagnostics.clone());
        if with_shells {
            ctx = ctx.with_shells(shells.clone());
        }

        Self {
            ctx: Arc::new(ctx),
            fs,
            editor,
            transport,
            config,
            diagnostics,
            shells,
        }
    }
}

pub fn default_config() -> Config {
    let mut config = Config {
        permissions: PermissionConfig::all(PermissionLevel::Autopilot),
        ..Config::default()
    };
    config.terminal.shells = vec![
        ShellProfile::new("bash", "bash", &["-c"]),
        ShellProfile::new("sh", "sh", &["-c"]),
    ];
    config
}
