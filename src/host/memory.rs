//! In-memory host backends.
//!
//! Used by the test suite and by the CLI as a headless editor. They follow
//! the semantics of the editor host closely enough that handlers cannot
//! tell them apart from the real thing.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::diagnostics::{Diagnostic, Diagnostics};
use super::editor::{language_id_for, Editor, EditorView, ShowOptions, Tab, TextDocument};
use super::fs::{DeleteOptions, FileStat, FileType, WorkspaceFs};
use super::transport::{
    ActionRegistration, ConfirmationRequest, Confirmer, ContextMessage, Transport,
};
use crate::error::{BridgeError, Result};
use crate::safety::{normalize_path, GlobFilter};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone)]
enum Entry {
    File(Vec<u8>),
    Dir,
}

/// A file system held in a sorted map of absolute paths.
#[derive(Debug, Default)]
pub struct MemoryFs {
    entries: Mutex<BTreeMap<PathBuf, Entry>>,
    trash: bool,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend deletes go to a trash can.
    pub fn with_trash(mut self) -> Self {
        self.trash = true;
        self
    }

    pub fn insert_file(&self, path: impl Into<PathBuf>, content: impl Into<Vec<u8>>) {
        let path = path.into();
        let mut entries = lock(&self.entries);
        add_parents(&mut entries, &path);
        entries.insert(path, Entry::File(content.into()));
    }

    pub fn insert_dir(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        let mut entries = lock(&self.entries);
        add_parents(&mut entries, &path);
        entries.insert(path, Entry::Dir);
    }

    pub fn contains(&self, path: &Path) -> bool {
        lock(&self.entries).contains_key(path)
    }

    pub fn file_text(&self, path: &Path) -> Option<String> {
        match lock(&self.entries).get(path) {
            Some(Entry::File(bytes)) => Some(String::from_utf8_lossy(bytes).into_owned()),
            _ => None,
        }
    }
}

fn add_parents(entries: &mut BTreeMap<PathBuf, Entry>, path: &Path) {
    let mut current = path.parent();
    while let Some(parent) = current {
        if parent.as_os_str().is_empty() || parent.parent().is_none() {
            break;
        }
        entries.entry(parent.to_path_buf()).or_insert(Entry::Dir);
        current = parent.parent();
    }
}

fn not_found(path: &Path) -> BridgeError {
    BridgeError::NotFound(path.display().to_string())
}

#[async_trait]
impl WorkspaceFs for MemoryFs {
    async fn stat(&self, path: &Path) -> Result<FileStat> {
        match lock(&self.entries).get(path) {
            Some(Entry::File(bytes)) => Ok(FileStat {
                file_type: FileType::File,
                size: bytes.len() as u64,
            }),
            Some(Entry::Dir) => Ok(FileStat {
                file_type: FileType::Directory,
                size: 0,
            }),
            None => Err(not_found(path)),
        }
    }

    async fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        match lock(&self.entries).get(path) {
            Some(Entry::File(bytes)) => Ok(bytes.clone()),
            Some(Entry::Dir) => Err(BridgeError::Host(format!(
                "{} is a directory",
                path.display()
            ))),
            None => Err(not_found(path)),
        }
    }

    async fn write_file(&self, path: &Path, content: &[u8]) -> Result<()> {
        let mut entries = lock(&self.entries);
        if let Some(Entry::Dir) = entries.get(path) {
            return Err(BridgeError::Host(format!("{} is a directory", path.display())));
        }
        add_parents(&mut entries, path);
        entries.insert(path.to_path_buf(), Entry::File(content.to_vec()));
        Ok(())
    }

    async fn create_directory(&self, path: &Path) -> Result<()> {
        let mut entries = lock(&self.entries);
        match entries.get(path) {
            Some(Entry::File(_)) => Err(BridgeError::AlreadyExists(path.display().to_string())),
            Some(Entry::Dir) => Ok(()),
            None => {
                add_parents(&mut entries, path);
                entries.insert(path.to_path_buf(), Entry::Dir);
                Ok(())
            }
        }
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let mut entries = lock(&self.entries);
        if !entries.contains_key(from) {
            return Err(not_found(from));
        }
        if entries.contains_key(to) {
            return Err(BridgeError::AlreadyExists(to.display().to_string()));
        }

        let moved: Vec<PathBuf> = entries
            .keys()
            .filter(|k| k.starts_with(from))
            .cloned()
            .collect();
        for old in moved {
            if let Some(entry) = entries.remove(&old) {
                let suffix = old.strip_prefix(from).unwrap_or(Path::new(""));
                let new = if suffix.as_os_str().is_empty() {
                    to.to_path_buf()
                } else {
                    to.join(suffix)
                };
                entries.insert(new, entry);
            }
        }
        add_parents(&mut entries, to);
        Ok(())
    }

    async fn delete(&self, path: &Path, options: DeleteOptions) -> Result<()> {
        let mut entries = lock(&self.entries);
        let Some(entry) = entries.get(path) else {
            return Err(not_found(path));
        };
        if let Entry::Dir = entry {
            let has_children = entries.keys().any(|k| k != path && k.starts_with(path));
            if has_children && !options.recursive {
                return Err(BridgeError::Host(format!(
                    "{} is not empty",
                    path.display()
                )));
            }
        }
        entries.retain(|k, _| !k.starts_with(path));
        Ok(())
    }

    async fn find_files(&self, root: &Path, filter: &GlobFilter) -> Result<Vec<PathBuf>> {
        let entries = lock(&self.entries);
        let files = entries
            .iter()
            .filter(|(_, entry)| matches!(entry, Entry::File(_)))
            .filter_map(|(path, _)| {
                let relative = path.strip_prefix(root).ok()?;
                let relative = normalize_path(&relative.to_string_lossy());
                filter.matches(&relative).then(|| path.clone())
            })
            .collect();
        Ok(files)
    }

    fn supports_trash(&self) -> bool {
        self.trash
    }
}

#[derive(Debug, Default)]
struct TabGroup {
    tabs: Vec<PathBuf>,
    active: Option<usize>,
}

#[derive(Debug, Default)]
struct EditorState {
    groups: BTreeMap<u32, TabGroup>,
    active_column: Option<u32>,
    buffers: HashMap<PathBuf, String>,
}

/// A headless editor: tab groups keyed by view column, document buffers
/// written through to a [`WorkspaceFs`].
pub struct MemoryEditor {
    fs: Arc<dyn WorkspaceFs>,
    state: Mutex<EditorState>,
    fail_ui: AtomicBool,
}

impl MemoryEditor {
    pub fn new(fs: Arc<dyn WorkspaceFs>) -> Self {
        Self {
            fs,
            state: Mutex::new(EditorState::default()),
            fail_ui: AtomicBool::new(false),
        }
    }

    /// Make every show/close call fail, to exercise best-effort paths.
    pub fn set_failing(&self, failing: bool) {
        self.fail_ui.store(failing, Ordering::SeqCst);
    }

    fn check_ui(&self) -> Result<()> {
        if self.fail_ui.load(Ordering::SeqCst) {
            return Err(BridgeError::Host("editor UI unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Editor for MemoryEditor {
    async fn open_document(&self, path: &Path) -> Result<TextDocument> {
        let cached = lock(&self.state).buffers.get(path).cloned();
        let text = match cached {
            Some(text) => text,
            None => {
                let bytes = self.fs.read_file(path).await?;
                let text = String::from_utf8_lossy(&bytes).into_owned();
                lock(&self.state)
                    .buffers
                    .insert(path.to_path_buf(), text.clone());
                text
            }
        };
        Ok(TextDocument {
            path: path.to_path_buf(),
            language_id: language_id_for(path).to_string(),
            text,
        })
    }

    async fn show_document(&self, path: &Path, options: ShowOptions) -> Result<EditorView> {
        self.check_ui()?;
        self.open_document(path).await?;

        let mut state = lock(&self.state);
        let column = options
            .view_column
            .or(state.active_column)
            .unwrap_or(1);
        let group = state.groups.entry(column).or_default();
        let index = match group.tabs.iter().position(|t| t == path) {
            Some(index) => index,
            None => {
                group.tabs.push(path.to_path_buf());
                group.tabs.len() - 1
            }
        };
        group.active = Some(index);
        if !options.preserve_focus || state.active_column.is_none() {
            state.active_column = Some(column);
        }
        Ok(EditorView {
            path: path.to_path_buf(),
            view_column: column,
        })
    }

    fn active_editor(&self) -> Option<EditorView> {
        let state = lock(&self.state);
        let column = state.active_column?;
        let group = state.groups.get(&column)?;
        let path = group.tabs.get(group.active?)?;
        Some(EditorView {
            path: path.clone(),
            view_column: column,
        })
    }

    fn visible_editors(&self) -> Vec<EditorView> {
        let state = lock(&self.state);
        state
            .groups
            .iter()
            .filter_map(|(column, group)| {
                let path = group.tabs.get(group.active?)?;
                Some(EditorView {
                    path: path.clone(),
                    view_column: *column,
                })
            })
            .collect()
    }

    fn tabs(&self) -> Vec<Tab> {
        let state = lock(&self.state);
        state
            .groups
            .iter()
            .flat_map(|(column, group)| {
                group.tabs.iter().map(move |path| Tab {
                    view_column: *column,
                    path: path.clone(),
                })
            })
            .collect()
    }

    async fn close_tab(&self, tab: &Tab) -> Result<()> {
        self.check_ui()?;
        let mut state = lock(&self.state);
        let Some(group) = state.groups.get_mut(&tab.view_column) else {
            return Err(not_found(&tab.path));
        };
        let Some(index) = group.tabs.iter().position(|t| *t == tab.path) else {
            return Err(not_found(&tab.path));
        };
        group.tabs.remove(index);
        group.active = match group.active {
            _ if group.tabs.is_empty() => None,
            Some(active) if active > index => Some(active - 1),
            Some(active) => Some(active.min(group.tabs.len() - 1)),
            None => None,
        };
        if group.tabs.is_empty() {
            state.groups.remove(&tab.view_column);
            if state.active_column == Some(tab.view_column) {
                state.active_column = state.groups.keys().next().copied();
            }
        }

        let still_open = state
            .groups
            .values()
            .any(|g| g.tabs.iter().any(|t| *t == tab.path));
        if !still_open {
            state.buffers.remove(&tab.path);
        }
        Ok(())
    }

    async fn apply_edit(&self, path: &Path, text: String) -> Result<()> {
        self.fs.write_file(path, text.as_bytes()).await?;
        lock(&self.state).buffers.insert(path.to_path_buf(), text);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Recorded {
    registered: Vec<ActionRegistration>,
    contexts: Vec<ContextMessage>,
}

/// A transport that records everything sent to the agent.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    recorded: Mutex<Recorded>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registered_names(&self) -> Vec<String> {
        lock(&self.recorded)
            .registered
            .iter()
            .map(|r| r.name.clone())
            .collect()
    }

    pub fn contexts(&self) -> Vec<String> {
        lock(&self.recorded)
            .contexts
            .iter()
            .map(|c| c.text.clone())
            .collect()
    }

    pub fn messages(&self) -> Vec<ContextMessage> {
        lock(&self.recorded).contexts.clone()
    }

    pub fn clear_contexts(&self) {
        lock(&self.recorded).contexts.clear();
    }
}

impl Transport for RecordingTransport {
    fn register_actions(&self, actions: Vec<ActionRegistration>) {
        let mut recorded = lock(&self.recorded);
        for action in actions {
            match recorded.registered.iter_mut().find(|r| r.name == action.name) {
                Some(existing) => *existing = action,
                None => recorded.registered.push(action),
            }
        }
    }

    fn unregister_actions(&self, names: Vec<String>) {
        lock(&self.recorded)
            .registered
            .retain(|r| !names.contains(&r.name));
    }

    fn send_context(&self, message: ContextMessage) {
        lock(&self.recorded).contexts.push(message);
    }
}

/// Diagnostics from a fixed list.
#[derive(Debug, Default)]
pub struct StaticDiagnostics {
    diagnostics: Mutex<Vec<Diagnostic>>,
}

impl StaticDiagnostics {
    pub fn new(diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            diagnostics: Mutex::new(diagnostics),
        }
    }

    pub fn push(&self, diagnostic: Diagnostic) {
        lock(&self.diagnostics).push(diagnostic);
    }
}

impl Diagnostics for StaticDiagnostics {
    fn all(&self) -> Vec<Diagnostic> {
        lock(&self.diagnostics).clone()
    }
}

/// Answers every confirmation the same way and remembers what was asked.
#[derive(Debug, Default)]
pub struct AutoConfirm {
    approve: bool,
    requests: Mutex<Vec<ConfirmationRequest>>,
}

impl AutoConfirm {
    pub fn approve() -> Self {
        Self {
            approve: true,
            requests: Mutex::default(),
        }
    }

    pub fn deny() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<ConfirmationRequest> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl Confirmer for AutoConfirm {
    async fn confirm(&self, request: &ConfirmationRequest) -> bool {
        lock(&self.requests).push(request.clone());
        self.approve
    }
}
