//! Workspace file actions.
//!
//! Every mutation goes through [`WorkspaceFs`](crate::host::WorkspaceFs).
//! Host failures are logged and reported as "Failed to ..." context, never
//! propagated. Editor clean-up after a rename or delete is best-effort.

use std::path::{Path, PathBuf};

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde_json::json;

use super::{object_schema, resolve_safe, ActionData, ActionDescriptor, HandlerReply, PromptGenerator};
use crate::config::Permission;
use crate::context::{fenced, ActionContext, CURSOR_MARKER};
use crate::context::cursor::render_with_cursor;
use crate::host::{DeleteOptions, ShowOptions};
use crate::safety::path::{
    compare_workspace_paths, is_same_or_descendant, is_same_or_descendant_exact, retarget,
};
use crate::safety::GlobFilter;
use crate::validation::{
    binary_file_validation, delete_validation, neuro_safe_validation, rename_validation,
    workspace_open_validation, Validators,
};

pub fn actions() -> Vec<ActionDescriptor> {
    vec![
        ActionDescriptor::new(
            "get_files",
            "Get a list of files in the workspace.",
            Permission::OpenFiles,
            handle_get_files,
        )
        .with_validators(Validators::sync(vec![workspace_open_validation]))
        .with_prompt(PromptGenerator::Fixed("get a list of files in the workspace")),
        ActionDescriptor::new(
            "open_file",
            "Open a file in the workspace. You cannot open a binary file directly.",
            Permission::OpenFiles,
            handle_open_file,
        )
        .with_schema(object_schema(json!({ "filePath": { "type": "string" } }), &["filePath"]))
        .with_validators(
            Validators::sync(vec![neuro_safe_validation]).with_deferred(vec![binary_file_validation]),
        )
        .with_prompt(PromptGenerator::Dynamic(|data| {
            format!("open the file \"{}\"", data.str_param("filePath").unwrap_or_default())
        })),
        ActionDescriptor::new(
            "read_file",
            "Read a file's contents without opening it.",
            Permission::OpenFiles,
            handle_read_file,
        )
        .with_schema(object_schema(json!({ "filePath": { "type": "string" } }), &["filePath"]))
        .with_validators(
            Validators::sync(vec![neuro_safe_validation]).with_deferred(vec![binary_file_validation]),
        )
        .with_prompt(PromptGenerator::Dynamic(|data| {
            format!(
                "read the file \"{}\" (without opening it)",
                data.str_param("filePath").unwrap_or_default()
            )
        })),
        ActionDescriptor::new(
            "create_file",
            "Create a new file at the specified path. The path should include the name of the new file.",
            Permission::Create,
            handle_create_file,
        )
        .with_schema(object_schema(json!({ "filePath": { "type": "string" } }), &["filePath"]))
        .with_validators(Validators::sync(vec![neuro_safe_validation]))
        .with_prompt(PromptGenerator::Dynamic(|data| {
            format!("create the file \"{}\"", data.str_param("filePath").unwrap_or_default())
        })),
        ActionDescriptor::new(
            "create_folder",
            "Create a new folder at the specified path. The path should include the name of the new folder.",
            Permission::Create,
            handle_create_folder,
        )
        .with_schema(object_schema(json!({ "folderPath": { "type": "string" } }), &["folderPath"]))
        .with_validators(Validators::sync(vec![neuro_safe_validation]))
        .with_prompt(PromptGenerator::Dynamic(|data| {
            format!("create the folder \"{}\"", data.str_param("folderPath").unwrap_or_default())
        })),
        ActionDescriptor::new(
            "rename_file_or_folder",
            "Rename a file or folder. Specify the full relative path for both the old and new names.",
            Permission::Rename,
            handle_rename_file_or_folder,
        )
        .with_schema(object_schema(
            json!({
                "oldPath": { "type": "string" },
                "newPath": { "type": "string" },
            }),
            &["oldPath", "newPath"],
        ))
        .with_validators(Validators::sync(vec![rename_validation]))
        .with_prompt(PromptGenerator::Dynamic(|data| {
            format!(
                "rename \"{}\" to \"{}\"",
                data.str_param("oldPath").unwrap_or_default(),
                data.str_param("newPath").unwrap_or_default()
            )
        })),
        ActionDescriptor::new(
            "delete_file_or_folder",
            "Delete a file or folder. If you want to delete a folder, set the \"recursive\" parameter to true.",
            Permission::Delete,
            handle_delete_file_or_folder,
        )
        .with_schema(object_schema(
            json!({
                "path": { "type": "string" },
                "recursive": { "type": "boolean" },
            }),
            &["path"],
        ))
        .with_validators(Validators::sync(vec![delete_validation]))
        .with_prompt(PromptGenerator::Dynamic(|data| {
            format!("delete \"{}\"", data.str_param("path").unwrap_or_default())
        })),
    ]
}

pub fn handle_get_files<'a>(ctx: &'a ActionContext, _data: &'a ActionData) -> BoxFuture<'a, HandlerReply> {
    async move {
        let Some(root) = ctx.root() else {
            return HandlerReply::Failure("No open workspace to get files from.".into());
        };
        let config = ctx.config();
        let filter = match GlobFilter::from_config(&config.workspace) {
            Ok(filter) => filter,
            Err(e) => {
                tracing::error!(error = %e, "cannot list workspace files");
                return HandlerReply::Failure("Failed to get files in workspace".into());
            }
        };
        let files = match ctx.fs.find_files(root.path(), &filter).await {
            Ok(files) => files,
            Err(e) => {
                tracing::error!(error = %e, "cannot list workspace files");
                return HandlerReply::Failure("Failed to get files in workspace".into());
            }
        };

        let mut paths: Vec<String> = files
            .iter()
            .filter(|p| ctx.is_path_neuro_safe_with(p, false))
            .filter_map(|p| root.relative_of(p))
            .collect();
        paths.sort_by(|a, b| compare_workspace_paths(a, b));

        tracing::info!(count = paths.len(), "sending list of files in workspace");
        HandlerReply::Success(format!("Files in workspace:\n\n{}", paths.join("\n")))
    }
    .boxed()
}

pub fn handle_open_file<'a>(ctx: &'a ActionContext, data: &'a ActionData) -> BoxFuture<'a, HandlerReply> {
    async move {
        let file = data.str_param("filePath").unwrap_or_default();
        let resolved = match resolve_safe(ctx, file) {
            Ok(resolved) => resolved,
            Err(reply) => return reply,
        };

        let shown = async {
            let document = ctx.editor.open_document(&resolved.absolute).await?;
            ctx.editor
                .show_document(&resolved.absolute, ShowOptions::default())
                .await?;
            Ok::<_, crate::error::BridgeError>(document)
        }
        .await;
        let document = match shown {
            Ok(document) => document,
            Err(e) => {
                tracing::error!(path = %resolved.relative, error = %e, "failed to open file");
                return HandlerReply::Failure(format!("Failed to open file {file}"));
            }
        };
        tracing::info!(path = %resolved.relative, "opened file");

        let position = ctx.cursor.get(&resolved.absolute).unwrap_or_default();
        if ctx.permission_level(Permission::EditActiveDocument).is_enabled() {
            ctx.cursor.set(&resolved.absolute, position);
        }

        // With contents-on-change on, the active-editor notification sends them.
        if ctx.config().workspace.send_contents_on_file_change {
            return HandlerReply::Success(format!("Opened file {file}"));
        }
        let content = render_with_cursor(&document.text, position);
        HandlerReply::Success(format!(
            "Opened file {file}\n\nContent (cursor position denoted by `{CURSOR_MARKER}`):\n\n{}",
            fenced(&content, Some(&document.language_id))
        ))
    }
    .boxed()
}

pub fn handle_read_file<'a>(ctx: &'a ActionContext, data: &'a ActionData) -> BoxFuture<'a, HandlerReply> {
    async move {
        let file = data.str_param("filePath").unwrap_or_default();
        let resolved = match resolve_safe(ctx, file) {
            Ok(resolved) => resolved,
            Err(reply) => return reply,
        };
        match ctx.fs.read_file(&resolved.absolute).await {
            Ok(bytes) => {
                let content = String::from_utf8_lossy(&bytes);
                HandlerReply::Success(format!(
                    "Contents of the file {file}:\n\n{}",
                    fenced(&content, None)
                ))
            }
            Err(e) => {
                tracing::error!(path = %resolved.relative, error = %e, "couldn't read file");
                HandlerReply::Failure(format!("Couldn't read file {file}."))
            }
        }
    }
    .boxed()
}

pub fn handle_create_file<'a>(ctx: &'a ActionContext, data: &'a ActionData) -> BoxFuture<'a, HandlerReply> {
    async move {
        let resolved = match resolve_safe(ctx, data.str_param("filePath").unwrap_or_default()) {
            Ok(resolved) => resolved,
            Err(reply) => return reply,
        };
        let relative = &resolved.relative;

        if ctx.fs.stat(&resolved.absolute).await.is_ok() {
            return HandlerReply::Failure(format!(
                "Could not create file: File {relative} already exists"
            ));
        }
        if let Err(e) = ctx.fs.write_file(&resolved.absolute, &[]).await {
            tracing::error!(path = %relative, error = %e, "failed to create file");
            return HandlerReply::Failure(format!("Failed to create file {relative}"));
        }
        tracing::info!(path = %relative, "created file");
        ctx.reporter.send(format!("Created file {relative}"));

        if !ctx.permission_level(Permission::OpenFiles).is_enabled() {
            return HandlerReply::Silent;
        }
        let opened = async {
            ctx.editor.open_document(&resolved.absolute).await?;
            ctx.editor
                .show_document(&resolved.absolute, ShowOptions::default())
                .await
        }
        .await;
        match opened {
            Ok(_) => HandlerReply::Success(format!("Opened new file {relative}")),
            Err(e) => {
                tracing::error!(path = %relative, error = %e, "failed to open new file");
                HandlerReply::Failure(format!("Failed to open new file {relative}"))
            }
        }
    }
    .boxed()
}

pub fn handle_create_folder<'a>(ctx: &'a ActionContext, data: &'a ActionData) -> BoxFuture<'a, HandlerReply> {
    async move {
        let resolved = match resolve_safe(ctx, data.str_param("folderPath").unwrap_or_default()) {
            Ok(resolved) => resolved,
            Err(reply) => return reply,
        };
        let relative = &resolved.relative;

        if ctx.fs.stat(&resolved.absolute).await.is_ok() {
            return HandlerReply::Failure(format!(
                "Could not create folder: Folder {relative} already exists"
            ));
        }
        if let Err(e) = ctx.fs.create_directory(&resolved.absolute).await {
            tracing::error!(path = %relative, error = %e, "failed to create folder");
            return HandlerReply::Failure(format!("Failed to create folder {relative}"));
        }
        tracing::info!(path = %relative, "created folder");
        HandlerReply::Success(format!("Created folder {relative}"))
    }
    .boxed()
}

/// A visible editor showing the renamed path or something below it.
struct RetargetedEditor {
    path: PathBuf,
    view_column: u32,
    was_active: bool,
}

fn same_path(a: &Path, b: &Path) -> bool {
    a.to_string_lossy().to_lowercase() == b.to_string_lossy().to_lowercase()
}

pub fn handle_rename_file_or_folder<'a>(
    ctx: &'a ActionContext,
    data: &'a ActionData,
) -> BoxFuture<'a, HandlerReply> {
    async move {
        let old = match resolve_safe(ctx, data.str_param("oldPath").unwrap_or_default()) {
            Ok(resolved) => resolved,
            Err(reply) => return reply,
        };
        let new = match resolve_safe(ctx, data.str_param("newPath").unwrap_or_default()) {
            Ok(resolved) => resolved,
            Err(reply) => return reply,
        };

        // Capture the editor layout before the paths change underneath it.
        let active_before = ctx.editor.active_editor();
        let affected: Vec<RetargetedEditor> = ctx
            .editor
            .visible_editors()
            .into_iter()
            .filter(|e| is_same_or_descendant(&e.path, &old.absolute))
            .map(|e| RetargetedEditor {
                was_active: active_before
                    .as_ref()
                    .is_some_and(|a| same_path(&a.path, &e.path)),
                path: e.path,
                view_column: e.view_column,
            })
            .collect();

        if ctx.fs.stat(&new.absolute).await.is_ok() {
            return HandlerReply::Failure(format!("Could not rename: {} already exists", new.relative));
        }
        if let Err(e) = ctx.fs.rename(&old.absolute, &new.absolute).await {
            tracing::error!(from = %old.relative, to = %new.relative, error = %e, "failed to rename");
            return HandlerReply::Failure(format!(
                "Failed to rename {} to {}",
                old.relative, new.relative
            ));
        }
        tracing::info!(from = %old.relative, to = %new.relative, "renamed");
        ctx.cursor.retarget(&old.absolute, &new.absolute);

        for editor in &affected {
            let target = retarget(&editor.path, &old.absolute, &new.absolute);
            let options = ShowOptions {
                view_column: Some(editor.view_column),
                preserve_focus: !editor.was_active,
                preview: false,
            };
            if let Err(e) = ctx.editor.show_document(&target, options).await {
                tracing::warn!(path = %target.display(), error = %e, "could not retarget editor");
            }
        }

        for tab in ctx.editor.tabs() {
            if is_same_or_descendant(&tab.path, &old.absolute) {
                if let Err(e) = ctx.editor.close_tab(&tab).await {
                    tracing::warn!(path = %tab.path.display(), error = %e, "could not close stale tab");
                }
            }
        }

        if let Some(active) = active_before {
            let target = if is_same_or_descendant(&active.path, &old.absolute) {
                retarget(&active.path, &old.absolute, &new.absolute)
            } else {
                active.path
            };
            let options = ShowOptions {
                view_column: Some(active.view_column),
                preserve_focus: false,
                preview: false,
            };
            if let Err(e) = ctx.editor.show_document(&target, options).await {
                tracing::warn!(path = %target.display(), error = %e, "could not restore focus");
            }
        }

        HandlerReply::Success(format!("Renamed {} to {}", old.relative, new.relative))
    }
    .boxed()
}

pub fn handle_delete_file_or_folder<'a>(
    ctx: &'a ActionContext,
    data: &'a ActionData,
) -> BoxFuture<'a, HandlerReply> {
    async move {
        let resolved = match resolve_safe(ctx, data.str_param("path").unwrap_or_default()) {
            Ok(resolved) => resolved,
            Err(reply) => return reply,
        };
        let relative = &resolved.relative;
        let recursive = data.bool_param("recursive").unwrap_or(false);

        let stat = match ctx.fs.stat(&resolved.absolute).await {
            Ok(stat) => stat,
            Err(_) => return HandlerReply::Failure(format!("Could not delete: {relative} does not exist")),
        };
        if stat.is_dir() && !recursive {
            return HandlerReply::Failure(format!(
                "Could not delete: {relative} is a directory cannot be deleted without the \"recursive\" parameter"
            ));
        }
        if !stat.is_dir() && recursive {
            return HandlerReply::Failure(format!(
                "Could not delete: {relative} is a file and cannot be deleted with the \"recursive\" parameter"
            ));
        }

        let options = DeleteOptions {
            recursive,
            use_trash: ctx.fs.supports_trash(),
        };
        if let Err(e) = ctx.fs.delete(&resolved.absolute, options).await {
            tracing::error!(path = %relative, error = %e, "failed to delete");
            return HandlerReply::Failure(format!("Failed to delete {relative}"));
        }
        ctx.cursor.clear_under(&resolved.absolute);

        for tab in ctx.editor.tabs() {
            if is_same_or_descendant_exact(&tab.path, &resolved.absolute) {
                if let Err(e) = ctx.editor.close_tab(&tab).await {
                    tracing::warn!(path = %tab.path.display(), error = %e, "could not close deleted tab");
                }
            }
        }

        tracing::info!(path = %relative, "deleted");
        HandlerReply::Success(format!("Deleted {relative}"))
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PermissionLevel;
    use crate::context::Position;
    use crate::host::{Editor, WorkspaceFs};
    use crate::test_support::{default_config, Harness};
    use pretty_assertions::assert_eq;

    fn file(name: &str, params: serde_json::Value) -> ActionData {
        ActionData::new(name, params)
    }

    #[tokio::test]
    async fn create_file_then_open_it() {
        let h = Harness::new();
        let reply = handle_create_file(&h.ctx, &file("create_file", json!({ "filePath": "new.txt" }))).await;
        assert_eq!(reply, HandlerReply::Success("Opened new file new.txt".into()));
        assert_eq!(h.transport.contexts(), vec!["Created file new.txt"]);
        assert_eq!(h.fs.file_text(Path::new("/work/new.txt")).as_deref(), Some(""));
        assert_eq!(h.editor.active_editor().unwrap().path, PathBuf::from("/work/new.txt"));
    }

    #[tokio::test]
    async fn create_file_without_open_permission_stays_closed() {
        let h = Harness::new();
        h.config
            .update(|c| c.permissions.set_level(Permission::OpenFiles, PermissionLevel::Off));
        let reply = handle_create_file(&h.ctx, &file("create_file", json!({ "filePath": "new.txt" }))).await;
        assert_eq!(reply, HandlerReply::Silent);
        assert!(h.editor.active_editor().is_none());
    }

    #[tokio::test]
    async fn create_existing_file_does_not_touch_it() {
        let h = Harness::new();
        h.fs.insert_file("/work/existing.txt", "keep");
        let reply =
            handle_create_file(&h.ctx, &file("create_file", json!({ "filePath": "existing.txt" }))).await;
        assert_eq!(
            reply,
            HandlerReply::Failure("Could not create file: File existing.txt already exists".into())
        );
        assert_eq!(h.fs.file_text(Path::new("/work/existing.txt")).as_deref(), Some("keep"));
    }

    #[tokio::test]
    async fn open_failure_is_reported_apart_from_creation() {
        let h = Harness::new();
        h.editor.set_failing(true);
        let reply = handle_create_file(&h.ctx, &file("create_file", json!({ "filePath": "a.txt" }))).await;
        assert_eq!(reply, HandlerReply::Failure("Failed to open new file a.txt".into()));
        assert_eq!(h.transport.contexts(), vec!["Created file a.txt"]);
        assert!(h.fs.contains(Path::new("/work/a.txt")));
    }

    #[tokio::test]
    async fn create_folder_once() {
        let h = Harness::new();
        let data = file("create_folder", json!({ "folderPath": "src/util/" }));
        assert_eq!(
            handle_create_folder(&h.ctx, &data).await,
            HandlerReply::Success("Created folder src/util".into())
        );
        assert!(h.fs.stat(Path::new("/work/src/util")).await.unwrap().is_dir());
        assert_eq!(
            handle_create_folder(&h.ctx, &data).await,
            HandlerReply::Failure("Could not create folder: Folder src/util already exists".into())
        );
    }

    #[tokio::test]
    async fn rename_retargets_active_editor() {
        let h = Harness::new();
        h.fs.insert_file("/work/old.txt", "hello");
        h.editor
            .show_document(Path::new("/work/old.txt"), ShowOptions::default())
            .await
            .unwrap();
        h.ctx.cursor.set(Path::new("/work/old.txt"), Position::new(0, 2));

        let data = file("rename_file_or_folder", json!({ "oldPath": "old.txt", "newPath": "new.txt" }));
        let reply = handle_rename_file_or_folder(&h.ctx, &data).await;
        assert_eq!(reply, HandlerReply::Success("Renamed old.txt to new.txt".into()));

        let active = h.editor.active_editor().unwrap();
        assert_eq!(active.path, PathBuf::from("/work/new.txt"));
        assert_eq!(active.view_column, 1);
        assert!(h.editor.tabs().iter().all(|t| t.path != Path::new("/work/old.txt")));
        assert_eq!(h.ctx.cursor.get(Path::new("/work/new.txt")), Some(Position::new(0, 2)));
    }

    #[tokio::test]
    async fn folder_rename_keeps_columns_and_focus() {
        let h = Harness::new();
        h.fs.insert_file("/work/src/a.rs", "a");
        h.fs.insert_file("/work/notes.md", "n");
        h.editor
            .show_document(Path::new("/work/notes.md"), ShowOptions::default())
            .await
            .unwrap();
        let beside = ShowOptions {
            view_column: Some(2),
            preserve_focus: true,
            preview: false,
        };
        h.editor.show_document(Path::new("/work/src/a.rs"), beside).await.unwrap();

        let data = file("rename_file_or_folder", json!({ "oldPath": "src", "newPath": "lib" }));
        handle_rename_file_or_folder(&h.ctx, &data).await;

        let visible = h.editor.visible_editors();
        assert!(visible
            .iter()
            .any(|e| e.path == Path::new("/work/lib/a.rs") && e.view_column == 2));
        assert_eq!(h.editor.active_editor().unwrap().path, PathBuf::from("/work/notes.md"));
    }

    #[tokio::test]
    async fn rename_onto_existing_path_changes_nothing() {
        let h = Harness::new();
        h.fs.insert_file("/work/a.txt", "a");
        h.fs.insert_file("/work/b.txt", "b");
        let data = file("rename_file_or_folder", json!({ "oldPath": "a.txt", "newPath": "b.txt" }));
        assert_eq!(
            handle_rename_file_or_folder(&h.ctx, &data).await,
            HandlerReply::Failure("Could not rename: b.txt already exists".into())
        );
        assert_eq!(h.fs.file_text(Path::new("/work/a.txt")).as_deref(), Some("a"));
        assert_eq!(h.fs.file_text(Path::new("/work/b.txt")).as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn rename_survives_failing_editor() {
        let h = Harness::new();
        h.fs.insert_file("/work/old.txt", "x");
        h.editor
            .show_document(Path::new("/work/old.txt"), ShowOptions::default())
            .await
            .unwrap();
        h.editor.set_failing(true);
        let data = file("rename_file_or_folder", json!({ "oldPath": "old.txt", "newPath": "new.txt" }));
        assert_eq!(
            handle_rename_file_or_folder(&h.ctx, &data).await,
            HandlerReply::Success("Renamed old.txt to new.txt".into())
        );
        assert!(h.fs.contains(Path::new("/work/new.txt")));
    }

    #[tokio::test]
    async fn delete_matrix() {
        let h = Harness::new();
        h.fs.insert_file("/work/dir/a.txt", "a");
        h.fs.insert_file("/work/b.txt", "b");

        let reply = handle_delete_file_or_folder(&h.ctx, &file("delete_file_or_folder", json!({ "path": "dir" }))).await;
        assert!(matches!(reply, HandlerReply::Failure(_)));
        let reply = handle_delete_file_or_folder(
            &h.ctx,
            &file("delete_file_or_folder", json!({ "path": "b.txt", "recursive": true })),
        )
        .await;
        assert!(matches!(reply, HandlerReply::Failure(_)));
        assert!(h.fs.contains(Path::new("/work/dir/a.txt")));
        assert!(h.fs.contains(Path::new("/work/b.txt")));

        let reply = handle_delete_file_or_folder(
            &h.ctx,
            &file("delete_file_or_folder", json!({ "path": "dir", "recursive": true })),
        )
        .await;
        assert_eq!(reply, HandlerReply::Success("Deleted dir".into()));
        let reply = handle_delete_file_or_folder(&h.ctx, &file("delete_file_or_folder", json!({ "path": "b.txt" }))).await;
        assert_eq!(reply, HandlerReply::Success("Deleted b.txt".into()));
        assert!(!h.fs.contains(Path::new("/work/dir")));
        assert!(!h.fs.contains(Path::new("/work/b.txt")));
    }

    #[tokio::test]
    async fn delete_closes_tabs_and_clears_cursor() {
        let h = Harness::new();
        h.fs.insert_file("/work/a.txt", "a");
        h.editor
            .show_document(Path::new("/work/a.txt"), ShowOptions::default())
            .await
            .unwrap();
        h.ctx.cursor.set(Path::new("/work/a.txt"), Position::default());

        handle_delete_file_or_folder(&h.ctx, &file("delete_file_or_folder", json!({ "path": "a.txt" }))).await;
        assert!(h.editor.tabs().is_empty());
        assert!(h.ctx.cursor.current().is_none());
    }

    #[tokio::test]
    async fn get_files_is_sorted_and_filtered() {
        let h = Harness::new();
        for path in ["c/d", "a/b/c", "b.txt", "a/a.txt", "a.txt", ".git/config", "target/out"] {
            h.fs.insert_file(format!("/work/{path}"), "");
        }
        h.config
            .update(|c| c.workspace.exclude = vec!["target/**".into()]);

        let reply = handle_get_files(&h.ctx, &file("get_files", json!({}))).await;
        assert_eq!(
            reply,
            HandlerReply::Success("Files in workspace:\n\na.txt\nb.txt\na/a.txt\na/b/c\nc/d".into())
        );
    }

    #[tokio::test]
    async fn open_file_renders_cursor_marker() {
        let h = Harness::new();
        h.fs.insert_file("/work/main.rs", "fn main() {}\n");
        let reply = handle_open_file(&h.ctx, &file("open_file", json!({ "filePath": "main.rs" }))).await;
        assert_eq!(
            reply,
            HandlerReply::Success(
                "Opened file main.rs\n\nContent (cursor position denoted by `<<<|>>>`):\n\n```rust\n<<<|>>>fn main() {}\n\n```".into()
            )
        );
        assert_eq!(h.ctx.cursor.get(Path::new("/work/main.rs")), Some(Position::default()));
    }

    #[tokio::test]
    async fn open_file_leaves_no_cursor_without_editing() {
        let mut config = default_config();
        config
            .permissions
            .set_level(Permission::EditActiveDocument, PermissionLevel::Off);
        let h = Harness::with_config(config);
        h.fs.insert_file("/work/main.rs", "fn main() {}\n");
        let reply = handle_open_file(&h.ctx, &file("open_file", json!({ "filePath": "main.rs" }))).await;
        assert!(matches!(reply, HandlerReply::Success(t) if t.contains("<<<|>>>fn main()")));
        assert!(h.ctx.cursor.current().is_none());
    }

    #[tokio::test]
    async fn delete_spares_a_file_differing_only_in_case() {
        let h = Harness::new();
        h.fs.insert_file("/work/A.txt", "upper");
        h.fs.insert_file("/work/a.txt", "lower");
        h.editor
            .show_document(Path::new("/work/a.txt"), ShowOptions::default())
            .await
            .unwrap();
        h.ctx.cursor.set(Path::new("/work/a.txt"), Position::new(0, 1));

        let reply = handle_delete_file_or_folder(&h.ctx, &file("delete_file_or_folder", json!({ "path": "A.txt" }))).await;
        assert_eq!(reply, HandlerReply::Success("Deleted A.txt".into()));
        assert!(!h.fs.contains(Path::new("/work/A.txt")));
        assert!(h.fs.contains(Path::new("/work/a.txt")));
        assert_eq!(h.editor.tabs().len(), 1);
        assert_eq!(h.ctx.cursor.get(Path::new("/work/a.txt")), Some(Position::new(0, 1)));
    }

    #[tokio::test]
    async fn read_file_is_fenced_without_opening() {
        let h = Harness::new();
        h.fs.insert_file("/work/README.md", "```sh\nls\n```");
        let reply = handle_read_file(&h.ctx, &file("read_file", json!({ "filePath": "README.md" }))).await;
        assert_eq!(
            reply,
            HandlerReply::Success("Contents of the file README.md:\n\n````\n```sh\nls\n```\n````".into())
        );
        assert!(h.editor.active_editor().is_none());

        let reply = handle_read_file(&h.ctx, &file("read_file", json!({ "filePath": "missing.md" }))).await;
        assert_eq!(reply, HandlerReply::Failure("Couldn't read file missing.md.".into()));
    }

    #[tokio::test]
    async fn handlers_recheck_safety() {
        let h = Harness::new();
        let reply = handle_create_file(&h.ctx, &file("create_file", json!({ "filePath": ".env" }))).await;
        assert_eq!(
            reply,
            HandlerReply::Failure("You do not have permission to access .env.".into())
        );
        assert!(!h.fs.contains(Path::new("/work/.env")));
    }

    #[test]
    fn prompts_name_the_paths() {
        let actions = actions();
        let prompt = |name: &str, params| {
            actions
                .iter()
                .find(|a| a.name == name)
                .unwrap()
                .prompt(&ActionData::new(name, params))
        };
        assert_eq!(prompt("open_file", json!({ "filePath": "a.txt" })), "open the file \"a.txt\"");
        assert_eq!(
            prompt("rename_file_or_folder", json!({ "oldPath": "a", "newPath": "b" })),
            "rename \"a\" to \"b\""
        );
        assert_eq!(prompt("delete_file_or_folder", json!({ "path": "x" })), "delete \"x\"");
    }
}
