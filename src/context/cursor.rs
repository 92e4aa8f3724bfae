use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::safety::path::{is_same_or_descendant, is_same_or_descendant_exact, retarget};

/// Marker inserted into file contents at the virtual cursor.
pub const CURSOR_MARKER: &str = "<<<|>>>";

/// Zero-based line/column (column counted in characters).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl std::fmt::Display for Position {
    /// 1-based, the way the agent sees it.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}, column {}", self.line + 1, self.column + 1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualCursor {
    pub path: PathBuf,
    pub position: Position,
}

/// The agent's edit position, independent of the user's selection.
#[derive(Debug, Default)]
pub struct CursorState {
    inner: Mutex<Option<VirtualCursor>>,
}

impl CursorState {
    fn lock(&self) -> MutexGuard<'_, Option<VirtualCursor>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, path: &Path) -> Option<Position> {
        self.lock()
            .as_ref()
            .filter(|c| c.path == path)
            .map(|c| c.position)
    }

    pub fn current(&self) -> Option<VirtualCursor> {
        self.lock().clone()
    }

    pub fn set(&self, path: &Path, position: Position) {
        *self.lock() = Some(VirtualCursor {
            path: path.to_path_buf(),
            position,
        });
    }

    pub fn clear(&self) {
        *self.lock() = None;
    }

    /// Clear the cursor if it lives in `path` or below it.
    pub fn clear_under(&self, path: &Path) {
        let mut guard = self.lock();
        if guard
            .as_ref()
            .is_some_and(|c| is_same_or_descendant_exact(&c.path, path))
        {
            *guard = None;
        }
    }

    /// Follow a rename of `old` (file or folder) to `new`.
    pub fn retarget(&self, old: &Path, new: &Path) {
        if let Some(cursor) = self.lock().as_mut() {
            if is_same_or_descendant(&cursor.path, old) {
                cursor.path = retarget(&cursor.path, old, new);
            }
        }
    }
}

/// Byte offset of `position` in `text`, clamped to the text.
pub fn offset_at(text: &str, position: Position) -> usize {
    let mut offset = 0;
    for (index, line) in text.split('\n').enumerate() {
        if index == position.line {
            let column = line
                .char_indices()
                .nth(position.column)
                .map(|(i, _)| i)
                .unwrap_or(line.len());
            return offset + column;
        }
        offset += line.len() + 1;
    }
    text.len()
}

/// Position of the byte `offset` in `text`.
pub fn position_at(text: &str, offset: usize) -> Position {
    let offset = offset.min(text.len());
    let before = text.get(..offset).unwrap_or(text);
    let line = before.matches('\n').count();
    let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
    let column = before[line_start..].chars().count();
    Position { line, column }
}

/// `text` with the cursor marker inserted at `position`.
pub fn render_with_cursor(text: &str, position: Position) -> String {
    let offset = offset_at(text, position);
    let mut out = String::with_capacity(text.len() + CURSOR_MARKER.len());
    out.push_str(&text[..offset]);
    out.push_str(CURSOR_MARKER);
    out.push_str(&text[offset..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_round_trip_through_positions() {
        let text = "ab\ncdé\n\nx";
        assert_eq!(offset_at(text, Position::new(1, 2)), 5);
        assert_eq!(position_at(text, 5), Position::new(1, 2));
        assert_eq!(offset_at(text, Position::new(1, 99)), 7);
        assert_eq!(offset_at(text, Position::new(9, 0)), text.len());
    }

    #[test]
    fn marker_is_inserted() {
        assert_eq!(render_with_cursor("hello\nworld", Position::new(1, 0)), "hello\n<<<|>>>world");
        assert_eq!(render_with_cursor("", Position::default()), "<<<|>>>");
    }

    #[test]
    fn cursor_is_per_file() {
        let state = CursorState::default();
        state.set(Path::new("/w/a.txt"), Position::new(2, 3));
        assert_eq!(state.get(Path::new("/w/a.txt")), Some(Position::new(2, 3)));
        assert_eq!(state.get(Path::new("/w/b.txt")), None);
    }

    #[test]
    fn cursor_follows_folder_rename_and_clears_on_delete() {
        let state = CursorState::default();
        state.set(Path::new("/w/src/a.rs"), Position::new(1, 1));
        state.retarget(Path::new("/w/src"), Path::new("/w/lib"));
        assert_eq!(state.get(Path::new("/w/lib/a.rs")), Some(Position::new(1, 1)));
        state.clear_under(Path::new("/w/lib"));
        assert!(state.current().is_none());
    }

    #[test]
    fn clearing_does_not_touch_a_differently_cased_file() {
        let state = CursorState::default();
        state.set(Path::new("/w/a.txt"), Position::new(2, 0));
        state.clear_under(Path::new("/w/A.txt"));
        assert_eq!(state.get(Path::new("/w/a.txt")), Some(Position::new(2, 0)));
    }

    #[test]
    fn display_is_one_based() {
        assert_eq!(Position::new(0, 4).to_string(), "line 1, column 5");
    }
}
