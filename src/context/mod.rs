//! What handlers and validators see: the host collaborators, live
//! configuration, the virtual cursor, and the reporter that pushes context
//! messages back to the agent.

pub mod cursor;
pub mod fence;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{Config, ConfigProvider, Permission, PermissionLevel};
use crate::host::memory::StaticDiagnostics;
use crate::host::{ContextMessage, Diagnostics, Editor, ShellHost, Transport, WorkspaceFs};
use crate::safety::{self, to_relative, WorkspaceRoot};

pub use cursor::{CursorState, Position, VirtualCursor, CURSOR_MARKER};
pub use fence::{fenced, get_fence};

/// Pushes context messages to the agent, decoupled from action replies.
#[derive(Clone)]
pub struct Reporter {
    transport: Arc<dyn Transport>,
}

impl Reporter {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    pub fn send(&self, text: impl Into<String>) {
        self.push(text.into(), false);
    }

    /// Context the agent should read but not react to.
    pub fn send_silent(&self, text: impl Into<String>) {
        self.push(text.into(), true);
    }

    fn push(&self, text: String, silent: bool) {
        tracing::debug!(silent, len = text.len(), "sending context");
        self.transport.send_context(ContextMessage { text, silent });
    }
}

/// Standard reply when a path fails the safety check.
pub fn no_access(path: &str) -> String {
    format!("You do not have permission to access {path}.")
}

/// An agent-supplied path resolved against the workspace root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    pub relative: String,
    pub absolute: PathBuf,
}

pub struct ActionContext {
    root: Option<WorkspaceRoot>,
    config: Arc<dyn ConfigProvider>,
    pub fs: Arc<dyn WorkspaceFs>,
    pub editor: Arc<dyn Editor>,
    pub diagnostics: Arc<dyn Diagnostics>,
    pub shells: Option<Arc<dyn ShellHost>>,
    pub reporter: Reporter,
    pub cursor: CursorState,
}

impl ActionContext {
    pub fn new(
        root: Option<WorkspaceRoot>,
        config: Arc<dyn ConfigProvider>,
        fs: Arc<dyn WorkspaceFs>,
        editor: Arc<dyn Editor>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            root,
            config,
            fs,
            editor,
            diagnostics: Arc::new(StaticDiagnostics::default()),
            shells: None,
            reporter: Reporter::new(transport),
            cursor: CursorState::default(),
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn Diagnostics>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn with_shells(mut self, shells: Arc<dyn ShellHost>) -> Self {
        self.shells = Some(shells);
        self
    }

    pub fn root(&self) -> Option<&WorkspaceRoot> {
        self.root.as_ref()
    }

    /// The configuration as of right now.
    pub fn config(&self) -> Arc<Config> {
        self.config.current()
    }

    pub fn permission_level(&self, permission: Permission) -> PermissionLevel {
        self.config().permissions.level(permission)
    }

    pub fn is_path_neuro_safe(&self, path: &Path) -> bool {
        self.is_path_neuro_safe_with(path, true)
    }

    pub fn is_path_neuro_safe_with(&self, path: &Path, check_patterns: bool) -> bool {
        let config = self.config();
        safety::is_path_neuro_safe(self.root(), &config.workspace, path, check_patterns)
    }

    /// Resolve a relative agent path; `None` without an open workspace.
    pub fn resolve(&self, path: &str) -> Option<ResolvedPath> {
        let root = self.root()?;
        let relative = to_relative(path);
        Some(ResolvedPath {
            absolute: root.resolve(&relative),
            relative,
        })
    }

    pub fn display_path(&self, absolute: &Path) -> String {
        match self.root() {
            Some(root) => root.display_relative(absolute),
            None => absolute.display().to_string(),
        }
    }
}
