//! Line-oriented editing of the active document.
//!
//! Lines and columns are 1-based in parameters and messages, 0-based in
//! [`Position`]. Every edit replaces the document text through
//! [`Editor::apply_edit`](crate::host::Editor::apply_edit) and moves the
//! virtual cursor.

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use regex::Regex;
use serde_json::json;

use super::{object_schema, ActionData, ActionDescriptor, HandlerReply, PromptGenerator};
use crate::config::Permission;
use crate::context::cursor::render_with_cursor;
use crate::context::{fenced, no_access, ActionContext, Position, CURSOR_MARKER};
use crate::host::TextDocument;
use crate::validation::{ValidationResult, Validators};

pub fn actions() -> Vec<ActionDescriptor> {
    let line = json!({ "type": "integer", "minimum": 1 });
    vec![
        ActionDescriptor::new(
            "get_cursor",
            "Get the position of your cursor and the contents of the current file.",
            Permission::EditActiveDocument,
            handle_get_cursor,
        )
        .with_validators(Validators::sync(vec![active_document_validation]))
        .with_prompt(PromptGenerator::Fixed("get the cursor position and the current file")),
        ActionDescriptor::new(
            "place_cursor",
            "Place your cursor at the given line and column of the current file.",
            Permission::EditActiveDocument,
            handle_place_cursor,
        )
        .with_schema(object_schema(
            json!({ "line": line, "column": line }),
            &["line", "column"],
        ))
        .with_validators(Validators::sync(vec![
            active_document_validation,
            place_cursor_validation,
        ]))
        .with_prompt(PromptGenerator::Dynamic(|data| {
            format!(
                "place the cursor at line {}, column {}",
                data.u64_param("line").unwrap_or_default(),
                data.u64_param("column").unwrap_or_default()
            )
        })),
        ActionDescriptor::new(
            "insert_lines",
            "Insert lines of text below the given line, or below your cursor if no line is given. Line 0 inserts at the top of the file.",
            Permission::EditActiveDocument,
            handle_insert_lines,
        )
        .with_schema(object_schema(
            json!({
                "text": { "type": "string" },
                "insertUnder": { "type": "integer", "minimum": 0 },
            }),
            &["text"],
        ))
        .with_validators(Validators::sync(vec![
            active_document_validation,
            insert_lines_validation,
        ]))
        .with_prompt(PromptGenerator::Dynamic(insert_lines_prompt)),
        ActionDescriptor::new(
            "rewrite_lines",
            "Replace a range of lines (inclusive) with new content.",
            Permission::EditActiveDocument,
            handle_rewrite_lines,
        )
        .with_schema(object_schema(
            json!({ "startLine": line, "endLine": line, "content": { "type": "string" } }),
            &["startLine", "endLine", "content"],
        ))
        .with_validators(Validators::sync(vec![
            active_document_validation,
            line_range_validation,
        ]))
        .with_prompt(PromptGenerator::Dynamic(|data| {
            format!(
                "rewrite lines {}-{} with {} line(s)",
                data.u64_param("startLine").unwrap_or_default(),
                data.u64_param("endLine").unwrap_or_default(),
                line_count(data.str_param("content").unwrap_or_default())
            )
        })),
        ActionDescriptor::new(
            "delete_lines",
            "Delete a range of lines (inclusive).",
            Permission::EditActiveDocument,
            handle_delete_lines,
        )
        .with_schema(object_schema(
            json!({ "startLine": line, "endLine": line }),
            &["startLine", "endLine"],
        ))
        .with_validators(Validators::sync(vec![
            active_document_validation,
            line_range_validation,
        ]))
        .with_prompt(PromptGenerator::Dynamic(|data| {
            format!(
                "delete lines {}-{}",
                data.u64_param("startLine").unwrap_or_default(),
                data.u64_param("endLine").unwrap_or_default()
            )
        })),
        ActionDescriptor::new(
            "find_text",
            "Find lines containing the given text or regular expression. Your cursor moves to the first match.",
            Permission::EditActiveDocument,
            handle_find_text,
        )
        .with_schema(object_schema(
            json!({
                "find": { "type": "string", "minLength": 1 },
                "useRegex": { "type": "boolean" },
            }),
            &["find"],
        ))
        .with_validators(Validators::sync(vec![
            active_document_validation,
            find_text_validation,
        ]))
        .with_prompt(PromptGenerator::Dynamic(|data| {
            let find = data.str_param("find").unwrap_or_default();
            if data.bool_param("useRegex").unwrap_or(false) {
                format!("find text matching /{}/", regex::escape(find))
            } else {
                format!("find \"{find}\"")
            }
        })),
        ActionDescriptor::new(
            "rewrite_all",
            "Replace the entire contents of the current file.",
            Permission::EditActiveDocument,
            handle_rewrite_all,
        )
        .with_schema(object_schema(json!({ "content": { "type": "string" } }), &["content"]))
        .with_validators(Validators::sync(vec![active_document_validation]))
        .with_prompt(PromptGenerator::Dynamic(|data| {
            format!(
                "rewrite the whole file with {} line(s)",
                line_count(data.str_param("content").unwrap_or_default())
            )
        })),
    ]
}

fn insert_lines_prompt(data: &ActionData) -> String {
    let lines = line_count(data.str_param("text").unwrap_or_default());
    match data.u64_param("insertUnder") {
        Some(under) => format!("insert {lines} line(s) below line {under}"),
        None => format!("insert {lines} line(s) below the cursor"),
    }
}

fn line_count(text: &str) -> usize {
    text.split('\n').count()
}

/// The active editor's document, resolved and safety-checked.
struct ActiveDocument {
    relative: String,
    document: TextDocument,
}

impl ActiveDocument {
    fn lines(&self) -> Vec<&str> {
        self.document.text.split('\n').collect()
    }
}

async fn active_document(ctx: &ActionContext) -> Result<ActiveDocument, String> {
    let Some(active) = ctx.editor.active_editor() else {
        return Err("No active text editor.".into());
    };
    let relative = ctx.display_path(&active.path);
    if !ctx.is_path_neuro_safe(&active.path) {
        return Err(no_access(&relative));
    }
    match ctx.editor.open_document(&active.path).await {
        Ok(document) => Ok(ActiveDocument { relative, document }),
        Err(e) => {
            tracing::error!(path = %relative, error = %e, "failed to read active document");
            Err(format!("Failed to read file {relative}"))
        }
    }
}

fn active_document_validation<'a>(
    ctx: &'a ActionContext,
    _data: &'a ActionData,
) -> BoxFuture<'a, ValidationResult> {
    async move {
        match active_document(ctx).await {
            Ok(_) => ValidationResult::accept(),
            Err(message) => ValidationResult::fail(message),
        }
    }
    .boxed()
}

fn place_cursor_validation<'a>(
    ctx: &'a ActionContext,
    data: &'a ActionData,
) -> BoxFuture<'a, ValidationResult> {
    async move {
        let Ok(active) = active_document(ctx).await else {
            return ValidationResult::accept();
        };
        let lines = active.lines();
        let line = data.u64_param("line").unwrap_or_default() as usize;
        let column = data.u64_param("column").unwrap_or_default() as usize;
        if line == 0 || line > lines.len() {
            return ValidationResult::fail(format!(
                "Line {line} is out of bounds, the file has {} line(s).",
                lines.len()
            ));
        }
        let width = lines[line - 1].chars().count();
        if column == 0 || column > width + 1 {
            return ValidationResult::fail(format!(
                "Column {column} is out of bounds, line {line} has {width} character(s)."
            ));
        }
        ValidationResult::accept()
    }
    .boxed()
}

fn insert_lines_validation<'a>(
    ctx: &'a ActionContext,
    data: &'a ActionData,
) -> BoxFuture<'a, ValidationResult> {
    async move {
        let Ok(active) = active_document(ctx).await else {
            return ValidationResult::accept();
        };
        let count = active.lines().len() as u64;
        match data.u64_param("insertUnder") {
            Some(under) if under > count => ValidationResult::fail(format!(
                "Line {under} is out of bounds, the file has {count} line(s)."
            )),
            _ => ValidationResult::accept(),
        }
    }
    .boxed()
}

fn line_range_validation<'a>(
    ctx: &'a ActionContext,
    data: &'a ActionData,
) -> BoxFuture<'a, ValidationResult> {
    async move {
        let Ok(active) = active_document(ctx).await else {
            return ValidationResult::accept();
        };
        let count = active.lines().len() as u64;
        let start = data.u64_param("startLine").unwrap_or_default();
        let end = data.u64_param("endLine").unwrap_or_default();
        if start > end {
            return ValidationResult::fail(format!(
                "Start line {start} is after end line {end}."
            ));
        }
        if start == 0 || end > count {
            return ValidationResult::fail(format!(
                "Lines {start}-{end} are out of bounds, the file has {count} line(s)."
            ));
        }
        ValidationResult::accept()
    }
    .boxed()
}

fn find_pattern(data: &ActionData) -> Result<Regex, regex::Error> {
    let find = data.str_param("find").unwrap_or_default();
    if data.bool_param("useRegex").unwrap_or(false) {
        Regex::new(find)
    } else {
        Regex::new(&regex::escape(find))
    }
}

fn find_text_validation<'a>(
    _ctx: &'a ActionContext,
    data: &'a ActionData,
) -> BoxFuture<'a, ValidationResult> {
    async move {
        match find_pattern(data) {
            Ok(_) => ValidationResult::accept(),
            Err(e) => ValidationResult::retry(format!("Invalid regular expression: {e}")),
        }
    }
    .boxed()
}

/// Write `text` to the active document and leave the cursor at `cursor`.
async fn commit(
    ctx: &ActionContext,
    active: &ActiveDocument,
    text: String,
    cursor: Position,
) -> Result<(), HandlerReply> {
    if let Err(e) = ctx.editor.apply_edit(&active.document.path, text).await {
        tracing::error!(path = %active.relative, error = %e, "failed to edit document");
        return Err(HandlerReply::Failure(format!("Failed to edit file {}", active.relative)));
    }
    ctx.cursor.set(&active.document.path, cursor);
    tracing::info!(path = %active.relative, %cursor, "edited document");
    Ok(())
}

/// Position just after the last character of `inserted`, which starts at
/// the beginning of 0-based line `first_line`.
fn end_of(inserted: &[&str], first_line: usize) -> Position {
    let last = inserted.len().saturating_sub(1);
    let column = inserted.last().map(|l| l.chars().count()).unwrap_or(0);
    Position::new(first_line + last, column)
}

macro_rules! active_or_fail {
    ($ctx:expr) => {
        match active_document($ctx).await {
            Ok(active) => active,
            Err(message) => return HandlerReply::Failure(message),
        }
    };
}

pub fn handle_get_cursor<'a>(ctx: &'a ActionContext, _data: &'a ActionData) -> BoxFuture<'a, HandlerReply> {
    async move {
        let active = active_or_fail!(ctx);
        let position = ctx.cursor.get(&active.document.path).unwrap_or_default();
        let content = render_with_cursor(&active.document.text, position);
        HandlerReply::Success(format!(
            "In file {}\n\nCursor is at {position}.\n\nContent (cursor position denoted by `{CURSOR_MARKER}`):\n\n{}",
            active.relative,
            fenced(&content, Some(&active.document.language_id))
        ))
    }
    .boxed()
}

pub fn handle_place_cursor<'a>(ctx: &'a ActionContext, data: &'a ActionData) -> BoxFuture<'a, HandlerReply> {
    async move {
        let active = active_or_fail!(ctx);
        let line = data.u64_param("line").unwrap_or(1).max(1) as usize;
        let column = data.u64_param("column").unwrap_or(1).max(1) as usize;
        let position = Position::new(line - 1, column - 1);
        ctx.cursor.set(&active.document.path, position);
        HandlerReply::Success(format!("Cursor placed at {position}."))
    }
    .boxed()
}

pub fn handle_insert_lines<'a>(ctx: &'a ActionContext, data: &'a ActionData) -> BoxFuture<'a, HandlerReply> {
    async move {
        let active = active_or_fail!(ctx);
        let text = data.str_param("text").unwrap_or_default();
        let mut lines = active.lines();
        let under = match data.u64_param("insertUnder") {
            Some(under) => under as usize,
            None => {
                ctx.cursor
                    .get(&active.document.path)
                    .unwrap_or_default()
                    .line
                    + 1
            }
        }
        .min(lines.len());

        let inserted: Vec<&str> = text.split('\n').collect();
        lines.splice(under..under, inserted.iter().copied());
        let cursor = end_of(&inserted, under);

        if let Err(reply) = commit(ctx, &active, lines.join("\n"), cursor).await {
            return reply;
        }
        let place = match under {
            0 => "at the top of the file".to_string(),
            n => format!("below line {n}"),
        };
        HandlerReply::Success(format!(
            "Inserted {} line(s) {place} in {}. Cursor is now at {cursor}.",
            inserted.len(),
            active.relative
        ))
    }
    .boxed()
}

pub fn handle_rewrite_lines<'a>(ctx: &'a ActionContext, data: &'a ActionData) -> BoxFuture<'a, HandlerReply> {
    async move {
        let active = active_or_fail!(ctx);
        let mut lines = active.lines();
        let start = (data.u64_param("startLine").unwrap_or(1).max(1) as usize).min(lines.len());
        let end = (data.u64_param("endLine").unwrap_or(1) as usize).clamp(start, lines.len());
        let content = data.str_param("content").unwrap_or_default();

        let replacement: Vec<&str> = content.split('\n').collect();
        lines.splice(start - 1..end, replacement.iter().copied());
        let cursor = end_of(&replacement, start - 1);

        if let Err(reply) = commit(ctx, &active, lines.join("\n"), cursor).await {
            return reply;
        }
        HandlerReply::Success(format!(
            "Rewrote lines {start}-{end} of {} with {} line(s).",
            active.relative,
            replacement.len()
        ))
    }
    .boxed()
}

pub fn handle_delete_lines<'a>(ctx: &'a ActionContext, data: &'a ActionData) -> BoxFuture<'a, HandlerReply> {
    async move {
        let active = active_or_fail!(ctx);
        let mut lines = active.lines();
        let start = (data.u64_param("startLine").unwrap_or(1).max(1) as usize).min(lines.len());
        let end = (data.u64_param("endLine").unwrap_or(1) as usize).clamp(start, lines.len());

        lines.drain(start - 1..end);
        if lines.is_empty() {
            lines.push("");
        }
        let cursor = Position::new((start - 1).min(lines.len() - 1), 0);

        if let Err(reply) = commit(ctx, &active, lines.join("\n"), cursor).await {
            return reply;
        }
        HandlerReply::Success(format!("Deleted lines {start}-{end} of {}.", active.relative))
    }
    .boxed()
}

pub fn handle_find_text<'a>(ctx: &'a ActionContext, data: &'a ActionData) -> BoxFuture<'a, HandlerReply> {
    async move {
        let active = active_or_fail!(ctx);
        let find = data.str_param("find").unwrap_or_default();
        let pattern = match find_pattern(data) {
            Ok(pattern) => pattern,
            Err(e) => return HandlerReply::Failure(format!("Invalid regular expression: {e}")),
        };

        let mut first = None;
        let mut found = Vec::new();
        for (index, line) in active.lines().into_iter().enumerate() {
            if let Some(m) = pattern.find(line) {
                first.get_or_insert(Position::new(index, line[..m.start()].chars().count()));
                found.push(format!("{}: {line}", index + 1));
            }
        }

        let Some(position) = first else {
            return HandlerReply::Success(format!("No matches found for \"{find}\" in {}.", active.relative));
        };
        ctx.cursor.set(&active.document.path, position);
        HandlerReply::Success(format!(
            "Found {} matching line(s) for \"{find}\" in {}. Cursor moved to {position}.\n\n{}",
            found.len(),
            active.relative,
            fenced(&found.join("\n"), None)
        ))
    }
    .boxed()
}

pub fn handle_rewrite_all<'a>(ctx: &'a ActionContext, data: &'a ActionData) -> BoxFuture<'a, HandlerReply> {
    async move {
        let active = active_or_fail!(ctx);
        let content = data.str_param("content").unwrap_or_default();
        if let Err(reply) = commit(ctx, &active, content.to_string(), Position::default()).await {
            return reply;
        }
        HandlerReply::Success(format!(
            "Rewrote {} with {} line(s).",
            active.relative,
            line_count(content)
        ))
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{Editor, ShowOptions};
    use crate::test_support::Harness;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    async fn open(h: &Harness, path: &str, text: &str) {
        h.fs.insert_file(path, text);
        h.editor
            .show_document(Path::new(path), ShowOptions::default())
            .await
            .unwrap();
    }

    fn text(h: &Harness, path: &str) -> String {
        h.fs.file_text(Path::new(path)).unwrap()
    }

    fn cursor(h: &Harness, path: &str) -> Option<Position> {
        h.ctx.cursor.get(Path::new(path))
    }

    #[tokio::test]
    async fn needs_an_active_safe_document() {
        let h = Harness::new();
        let data = ActionData::new("get_cursor", json!({}));
        assert_eq!(
            active_document_validation(&h.ctx, &data).await,
            ValidationResult::fail("No active text editor.")
        );
        open(&h, "/work/.secret", "x").await;
        assert_eq!(
            active_document_validation(&h.ctx, &data).await,
            ValidationResult::fail("You do not have permission to access .secret.")
        );
    }

    #[tokio::test]
    async fn get_cursor_shows_marker() {
        let h = Harness::new();
        open(&h, "/work/a.txt", "one\ntwo").await;
        h.ctx.cursor.set(Path::new("/work/a.txt"), Position::new(1, 1));
        let reply = handle_get_cursor(&h.ctx, &ActionData::new("get_cursor", json!({}))).await;
        assert_eq!(
            reply,
            HandlerReply::Success(
                "In file a.txt\n\nCursor is at line 2, column 2.\n\nContent (cursor position denoted by `<<<|>>>`):\n\n```plaintext\none\nt<<<|>>>wo\n```".into()
            )
        );
    }

    #[tokio::test]
    async fn place_cursor_is_bounds_checked() {
        let h = Harness::new();
        open(&h, "/work/a.txt", "one\ntwo").await;
        let ok = ActionData::new("place_cursor", json!({ "line": 2, "column": 4 }));
        let bad_line = ActionData::new("place_cursor", json!({ "line": 3, "column": 1 }));
        let bad_column = ActionData::new("place_cursor", json!({ "line": 1, "column": 5 }));
        assert!(place_cursor_validation(&h.ctx, &ok).await.is_accept());
        assert!(!place_cursor_validation(&h.ctx, &bad_line).await.is_accept());
        assert!(!place_cursor_validation(&h.ctx, &bad_column).await.is_accept());

        handle_place_cursor(&h.ctx, &ok).await;
        assert_eq!(cursor(&h, "/work/a.txt"), Some(Position::new(1, 3)));
    }

    #[tokio::test]
    async fn insert_lines_below_cursor_and_at_top() {
        let h = Harness::new();
        open(&h, "/work/a.txt", "one\ntwo").await;

        let data = ActionData::new("insert_lines", json!({ "text": "x\ny" }));
        handle_insert_lines(&h.ctx, &data).await;
        assert_eq!(text(&h, "/work/a.txt"), "one\nx\ny\ntwo");
        assert_eq!(cursor(&h, "/work/a.txt"), Some(Position::new(2, 1)));

        let data = ActionData::new("insert_lines", json!({ "text": "top", "insertUnder": 0 }));
        let reply = handle_insert_lines(&h.ctx, &data).await;
        assert_eq!(text(&h, "/work/a.txt"), "top\none\nx\ny\ntwo");
        assert!(matches!(reply, HandlerReply::Success(m) if m.contains("at the top of the file")));

        let past_end = ActionData::new("insert_lines", json!({ "text": "z", "insertUnder": 9 }));
        assert!(!insert_lines_validation(&h.ctx, &past_end).await.is_accept());
    }

    #[tokio::test]
    async fn rewrite_and_delete_ranges() {
        let h = Harness::new();
        open(&h, "/work/a.txt", "1\n2\n3\n4").await;

        let data = ActionData::new(
            "rewrite_lines",
            json!({ "startLine": 2, "endLine": 3, "content": "two" }),
        );
        handle_rewrite_lines(&h.ctx, &data).await;
        assert_eq!(text(&h, "/work/a.txt"), "1\ntwo\n4");
        assert_eq!(cursor(&h, "/work/a.txt"), Some(Position::new(1, 3)));

        let data = ActionData::new("delete_lines", json!({ "startLine": 1, "endLine": 2 }));
        handle_delete_lines(&h.ctx, &data).await;
        assert_eq!(text(&h, "/work/a.txt"), "4");

        let data = ActionData::new("delete_lines", json!({ "startLine": 1, "endLine": 1 }));
        handle_delete_lines(&h.ctx, &data).await;
        assert_eq!(text(&h, "/work/a.txt"), "");
    }

    #[tokio::test]
    async fn ranges_are_validated() {
        let h = Harness::new();
        open(&h, "/work/a.txt", "1\n2").await;
        let reversed = ActionData::new("delete_lines", json!({ "startLine": 2, "endLine": 1 }));
        let past_end = ActionData::new("delete_lines", json!({ "startLine": 1, "endLine": 3 }));
        let ok = ActionData::new("delete_lines", json!({ "startLine": 1, "endLine": 2 }));
        assert!(!line_range_validation(&h.ctx, &reversed).await.is_accept());
        assert!(!line_range_validation(&h.ctx, &past_end).await.is_accept());
        assert!(line_range_validation(&h.ctx, &ok).await.is_accept());
    }

    #[tokio::test]
    async fn find_text_moves_cursor_to_first_match() {
        let h = Harness::new();
        open(&h, "/work/a.rs", "fn a() {}\nfn b() {}\nlet c = a();").await;

        let data = ActionData::new("find_text", json!({ "find": "a()" }));
        let reply = handle_find_text(&h.ctx, &data).await;
        assert_eq!(
            reply,
            HandlerReply::Success(
                "Found 2 matching line(s) for \"a()\" in a.rs. Cursor moved to line 1, column 4.\n\n```\n1: fn a() {}\n3: let c = a();\n```".into()
            )
        );

        let data = ActionData::new("find_text", json!({ "find": r"fn \w\(", "useRegex": true }));
        handle_find_text(&h.ctx, &data).await;
        assert_eq!(cursor(&h, "/work/a.rs"), Some(Position::new(0, 0)));

        let bad = ActionData::new("find_text", json!({ "find": "(", "useRegex": true }));
        assert!(matches!(
            find_text_validation(&h.ctx, &bad).await,
            ValidationResult::Retry(_)
        ));
    }

    #[tokio::test]
    async fn rewrite_all_resets_cursor() {
        let h = Harness::new();
        open(&h, "/work/a.txt", "old").await;
        h.ctx.cursor.set(Path::new("/work/a.txt"), Position::new(0, 3));
        let data = ActionData::new("rewrite_all", json!({ "content": "new\ncontent" }));
        let reply = handle_rewrite_all(&h.ctx, &data).await;
        assert_eq!(reply, HandlerReply::Success("Rewrote a.txt with 2 line(s).".into()));
        assert_eq!(text(&h, "/work/a.txt"), "new\ncontent");
        assert_eq!(cursor(&h, "/work/a.txt"), Some(Position::default()));
    }

    #[test]
    fn prompts_reflect_parameters() {
        let data = ActionData::new("insert_lines", json!({ "text": "a\nb" }));
        assert_eq!(insert_lines_prompt(&data), "insert 2 line(s) below the cursor");
        let data = ActionData::new("insert_lines", json!({ "text": "one", "insertUnder": 7 }));
        assert_eq!(insert_lines_prompt(&data), "insert 1 line(s) below line 7");

        let rewrite = actions().into_iter().find(|a| a.name == "rewrite_lines").unwrap();
        let data = ActionData::new(
            "rewrite_lines",
            json!({ "startLine": 5, "endLine": 10, "content": "a\nb\nc" }),
        );
        assert_eq!(rewrite.prompt(&data), "rewrite lines 5-10 with 3 line(s)");
    }

    #[test]
    fn find_text_prompt_escapes_regex_patterns() {
        let find = actions().into_iter().find(|a| a.name == "find_text").unwrap();
        let regex = ActionData::new("find_text", json!({ "find": "foo(bar)", "useRegex": true }));
        assert_eq!(find.prompt(&regex), r"find text matching /foo\(bar\)/");
        let plain = ActionData::new("find_text", json!({ "find": "baz", "useRegex": false }));
        assert_eq!(find.prompt(&plain), "find \"baz\"");
    }
}
