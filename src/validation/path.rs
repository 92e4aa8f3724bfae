//! Path-bearing parameter checks: safety, existence, type.

use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use super::ValidationResult;
use crate::actions::ActionData;
use crate::context::ActionContext;
use crate::host::path_exists;
use crate::safety::is_binary;

/// Actions whose `filePath`/`folderPath` must already exist. For every other
/// action using these parameters the path must not exist yet.
const MUST_EXIST: &[&str] = &["open_file", "read_file"];

/// Check one agent-supplied relative path.
///
/// `should_exist = true` fails when the path is missing, `false` fails when
/// it is present. `path_type` only shapes the message.
pub async fn validate_path(
    ctx: &ActionContext,
    path: &str,
    should_exist: bool,
    path_type: &str,
) -> ValidationResult {
    if path.is_empty() {
        return ValidationResult::terminal("No file path specified.");
    }
    let Some(resolved) = ctx.resolve(path) else {
        return ValidationResult::fail("No open workspace.");
    };
    if !ctx.is_path_neuro_safe(&resolved.absolute) {
        return ValidationResult::fail(format!("You are not allowed to access this {path_type}."));
    }

    let exists = path_exists(ctx.fs.as_ref(), &resolved.absolute).await;
    match (should_exist, exists) {
        (false, true) => ValidationResult::fail(format!("{path_type} \"{path}\" already exists.")),
        (true, false) => ValidationResult::fail(format!("{path_type} \"{path}\" doesn't exist.")),
        _ => ValidationResult::accept(),
    }
}

/// Safety + existence for `filePath` and `folderPath`.
pub fn neuro_safe_validation<'a>(
    ctx: &'a ActionContext,
    data: &'a ActionData,
) -> BoxFuture<'a, ValidationResult> {
    async move {
        let should_exist = MUST_EXIST.contains(&data.name.as_str());
        if let Some(file) = data.str_param("filePath") {
            let result = validate_path(ctx, file, should_exist, "file").await;
            if !result.is_accept() {
                return result;
            }
        }
        if let Some(folder) = data.str_param("folderPath") {
            return validate_path(ctx, folder, should_exist, "folder").await;
        }
        ValidationResult::accept()
    }
    .boxed()
}

/// `path` must exist and its type must agree with `recursive`: directories
/// need `recursive = true`, files need `recursive = false`.
pub fn delete_validation<'a>(
    ctx: &'a ActionContext,
    data: &'a ActionData,
) -> BoxFuture<'a, ValidationResult> {
    async move {
        let path = data.str_param("path").unwrap_or_default();
        let recursive = data.bool_param("recursive").unwrap_or(false);
        let path_type = if recursive { "folder" } else { "file" };

        let check = validate_path(ctx, path, true, path_type).await;
        if !check.is_accept() {
            return check;
        }

        let Some(resolved) = ctx.resolve(path) else {
            return ValidationResult::fail("No open workspace.");
        };
        match ctx.fs.stat(&resolved.absolute).await {
            Ok(stat) if !stat.is_dir() && recursive => {
                ValidationResult::fail(format!("Cannot delete file {path} with recursive."))
            }
            Ok(stat) if stat.is_dir() && !recursive => {
                ValidationResult::fail(format!("Cannot delete directory {path} without recursive."))
            }
            Ok(_) => ValidationResult::accept(),
            Err(_) => ValidationResult::fail(format!("{path_type} \"{path}\" doesn't exist.")),
        }
    }
    .boxed()
}

/// `oldPath` must exist, `newPath` must not.
pub fn rename_validation<'a>(
    ctx: &'a ActionContext,
    data: &'a ActionData,
) -> BoxFuture<'a, ValidationResult> {
    async move {
        let old = data.str_param("oldPath").unwrap_or_default();
        let new = data.str_param("newPath").unwrap_or_default();

        let check = validate_path(ctx, old, true, "path").await;
        if !check.is_accept() {
            return check;
        }
        validate_path(ctx, new, false, "path").await
    }
    .boxed()
}

/// Refuse to open or read binary files.
pub fn binary_file_validation<'a>(
    ctx: &'a ActionContext,
    data: &'a ActionData,
) -> BoxFuture<'a, ValidationResult> {
    async move {
        let file = data.str_param("filePath").unwrap_or_default();
        let Some(resolved) = ctx.resolve(file) else {
            return ValidationResult::fail("No open workspace.");
        };
        match ctx.fs.read_file(&resolved.absolute).await {
            Ok(bytes) if is_binary(&bytes) => ValidationResult::fail("You cannot open a binary file."),
            Ok(_) => ValidationResult::accept(),
            Err(e) => {
                tracing::error!(path = %resolved.relative, error = %e, "could not read file for binary check");
                ValidationResult::fail(format!("Could not read file {file}."))
            }
        }
    }
    .boxed()
}

/// A workspace folder must be open.
pub fn workspace_open_validation<'a>(
    ctx: &'a ActionContext,
    _data: &'a ActionData,
) -> BoxFuture<'a, ValidationResult> {
    async move {
        match ctx.root() {
            Some(_) => ValidationResult::accept(),
            None => ValidationResult::fail("No open workspace to get files from."),
        }
    }
    .boxed()
}
