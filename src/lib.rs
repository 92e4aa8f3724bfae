//! NeuroPilot bridge: permission-gated workspace actions for an external AI agent.
//!
//! The agent sends `{name, params}` requests. Each request passes the
//! permission gate, schema and path checks, then runs a handler against
//! the editor host. Outcomes reach the agent as context pushes.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use neuropilot::host::memory::{MemoryEditor, MemoryFs, RecordingTransport};
//! use neuropilot::{ActionContext, ActionData, ActionRegistry, Dispatcher, SharedConfig, WorkspaceRoot};
//!
//! # async fn demo() -> neuropilot::error::Result<()> {
//! let config = neuropilot::load_config(Path::new("."), None)?;
//! let fs = Arc::new(MemoryFs::new());
//! let ctx = ActionContext::new(
//!     Some(WorkspaceRoot::new("/work")),
//!     Arc::new(SharedConfig::new(config)),
//!     fs.clone(),
//!     Arc::new(MemoryEditor::new(fs)),
//!     Arc::new(RecordingTransport::new()),
//! );
//! let dispatcher = Dispatcher::new(Arc::new(ctx), ActionRegistry::new());
//! dispatcher.register_actions();
//! let dispatched = dispatcher
//!     .dispatch(ActionData::new("get_files", serde_json::json!({})))
//!     .await;
//! println!("{:?}", dispatched.result);
//! # Ok(())
//! # }
//! ```

pub mod actions;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod gate;
pub mod host;
pub mod safety;
pub mod validation;

#[cfg(test)]
mod test_support;

use std::path::{Path, PathBuf};

pub use actions::{ActionData, ActionDescriptor, ActionRegistry};
pub use config::{Config, ConfigProvider, Permission, PermissionLevel, SharedConfig};
pub use context::ActionContext;
pub use dispatch::{ActionOutcome, Dispatched, Dispatcher};
pub use error::{BridgeError, Result};
pub use gate::PermissionGate;
pub use safety::WorkspaceRoot;
pub use validation::ValidationResult;

/// Name of the per-workspace configuration file.
pub const CONFIG_FILE: &str = ".neuropilot.toml";

/// Load the configuration for a workspace: `config_path` when given,
/// otherwise `.neuropilot.toml` in `root`. A missing file yields defaults.
pub fn load_config(root: &Path, config_path: Option<&Path>) -> Result<Config> {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| root.join(CONFIG_FILE));
    let config = Config::load(&path)?;
    tracing::debug!(path = %path.display(), "configuration loaded");
    Ok(config)
}

/// The workspace root for a list of open folders. Only the first folder counts.
pub fn workspace_root(folders: &[PathBuf]) -> Option<WorkspaceRoot> {
    WorkspaceRoot::from_folders(folders)
}
