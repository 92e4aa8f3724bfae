//! Collaborator interfaces of the editor host.
//!
//! The bridge never touches the OS or UI directly; it talks to these traits.
//! `memory` provides in-process backends, `local` (feature `local`) backs the
//! file system and terminals with tokio.

pub mod diagnostics;
pub mod editor;
pub mod fs;
#[cfg(feature = "local")]
pub mod local;
pub mod memory;
pub mod shell;
pub mod transport;

pub use diagnostics::{Diagnostic, DiagnosticSeverity, Diagnostics};
pub use editor::{Editor, EditorView, ShowOptions, Tab, TextDocument};
pub use fs::{path_exists, DeleteOptions, FileStat, FileType, WorkspaceFs};
pub use shell::{RunningShell, ShellHost, ShellOutput};
pub use transport::{
    ActionRegistration, ActionResult, ConfirmationRequest, Confirmer, ContextMessage, Transport,
};
