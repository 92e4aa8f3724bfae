use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::Result;

/// A text document as the editor sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextDocument {
    pub path: PathBuf,
    pub language_id: String,
    pub text: String,
}

/// An editor showing a document in a view column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorView {
    pub path: PathBuf,
    pub view_column: u32,
}

/// A text tab inside a tab group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tab {
    pub view_column: u32,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShowOptions {
    /// Column to show the document in; the active column when `None`.
    pub view_column: Option<u32>,
    /// Keep focus on the currently active editor.
    pub preserve_focus: bool,
    pub preview: bool,
}

/// The editor/UI surface of the host.
#[async_trait]
pub trait Editor: Send + Sync {
    async fn open_document(&self, path: &Path) -> Result<TextDocument>;

    async fn show_document(&self, path: &Path, options: ShowOptions) -> Result<EditorView>;

    fn active_editor(&self) -> Option<EditorView>;

    fn visible_editors(&self) -> Vec<EditorView>;

    fn tabs(&self) -> Vec<Tab>;

    async fn close_tab(&self, tab: &Tab) -> Result<()>;

    /// Replace the whole text of an open document.
    async fn apply_edit(&self, path: &Path, text: String) -> Result<()>;
}

/// Language identifier used for content fences.
pub fn language_id_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "rs" => "rust",
        "py" => "python",
        "ts" | "tsx" => "typescript",
        "js" | "jsx" | "mjs" | "cjs" => "javascript",
        "sh" | "bash" | "zsh" => "shellscript",
        "json" => "json",
        "toml" => "toml",
        "yml" | "yaml" => "yaml",
        "md" | "markdown" => "markdown",
        "html" | "htm" => "html",
        "css" => "css",
        "c" | "h" => "c",
        "cpp" | "hpp" | "cc" => "cpp",
        "go" => "go",
        _ => "plaintext",
    }
}
