use std::collections::BTreeMap;
use std::path::Path;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde_json::json;

use super::{object_schema, resolve_safe, ActionData, ActionDescriptor, HandlerReply, PromptGenerator};
use crate::config::Permission;
use crate::context::ActionContext;
use crate::host::Diagnostic;
use crate::safety::path::is_same_or_descendant_exact;
use crate::validation::{validate_path, workspace_open_validation, ValidationResult, Validators};

pub fn actions() -> Vec<ActionDescriptor> {
    vec![
        ActionDescriptor::new(
            "get_file_lint_problems",
            "Get linting problems (errors, warnings, hints) for a file.",
            Permission::AccessLintingAnalysis,
            handle_get_file_lint_problems,
        )
        .with_schema(object_schema(json!({ "file": { "type": "string" } }), &["file"]))
        .with_validators(Validators::sync(vec![lint_path_validation]))
        .with_prompt(PromptGenerator::Dynamic(|data| {
            format!(
                "get linting problems for the file \"{}\"",
                data.str_param("file").unwrap_or_default()
            )
        })),
        ActionDescriptor::new(
            "get_folder_lint_problems",
            "Get linting problems for every file in a folder.",
            Permission::AccessLintingAnalysis,
            handle_get_folder_lint_problems,
        )
        .with_schema(object_schema(json!({ "folder": { "type": "string" } }), &["folder"]))
        .with_validators(Validators::sync(vec![lint_path_validation]))
        .with_prompt(PromptGenerator::Dynamic(|data| {
            format!(
                "get linting problems for the folder \"{}\"",
                data.str_param("folder").unwrap_or_default()
            )
        })),
        ActionDescriptor::new(
            "get_workspace_lint_problems",
            "Get linting problems for the whole workspace.",
            Permission::AccessLintingAnalysis,
            handle_get_workspace_lint_problems,
        )
        .with_validators(Validators::sync(vec![workspace_open_validation]))
        .with_prompt(PromptGenerator::Fixed("get linting problems for the workspace")),
    ]
}

/// `file` / `folder` must be accessible and exist.
fn lint_path_validation<'a>(ctx: &'a ActionContext, data: &'a ActionData) -> BoxFuture<'a, ValidationResult> {
    async move {
        if let Some(file) = data.str_param("file") {
            return validate_path(ctx, file, true, "file").await;
        }
        if let Some(folder) = data.str_param("folder") {
            return validate_path(ctx, folder, true, "folder").await;
        }
        ValidationResult::accept()
    }
    .boxed()
}

fn format_diagnostic(d: &Diagnostic) -> String {
    let source = d
        .source
        .as_deref()
        .map(|s| format!(" ({s})"))
        .unwrap_or_default();
    format!("- {}:{} [{}] {}{source}", d.line, d.column, d.severity, d.message)
}

/// Diagnostics for accessible files under `base`, grouped by relative path.
fn grouped(ctx: &ActionContext, base: Option<&Path>) -> BTreeMap<String, Vec<Diagnostic>> {
    let mut groups: BTreeMap<String, Vec<Diagnostic>> = BTreeMap::new();
    for diagnostic in ctx.diagnostics.all() {
        if base.is_some_and(|b| !is_same_or_descendant_exact(&diagnostic.path, b)) {
            continue;
        }
        if !ctx.is_path_neuro_safe(&diagnostic.path) {
            continue;
        }
        groups
            .entry(ctx.display_path(&diagnostic.path))
            .or_default()
            .push(diagnostic);
    }
    for list in groups.values_mut() {
        list.sort_by_key(|d| (d.line, d.column));
    }
    groups
}

fn render_groups(groups: &BTreeMap<String, Vec<Diagnostic>>) -> String {
    groups
        .iter()
        .map(|(path, list)| {
            let lines: Vec<String> = list.iter().map(format_diagnostic).collect();
            format!("{path}:\n{}", lines.join("\n"))
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn handle_get_file_lint_problems<'a>(
    ctx: &'a ActionContext,
    data: &'a ActionData,
) -> BoxFuture<'a, HandlerReply> {
    async move {
        let resolved = match resolve_safe(ctx, data.str_param("file").unwrap_or_default()) {
            Ok(resolved) => resolved,
            Err(reply) => return reply,
        };
        let mut problems: Vec<Diagnostic> = ctx
            .diagnostics
            .all()
            .into_iter()
            .filter(|d| d.path == resolved.absolute)
            .collect();
        if problems.is_empty() {
            return HandlerReply::Success(format!("No linting problems found for {}.", resolved.relative));
        }
        problems.sort_by_key(|d| (d.line, d.column));
        let lines: Vec<String> = problems.iter().map(format_diagnostic).collect();
        HandlerReply::Success(format!(
            "Linting problems for {}:\n\n{}",
            resolved.relative,
            lines.join("\n")
        ))
    }
    .boxed()
}

pub fn handle_get_folder_lint_problems<'a>(
    ctx: &'a ActionContext,
    data: &'a ActionData,
) -> BoxFuture<'a, HandlerReply> {
    async move {
        let resolved = match resolve_safe(ctx, data.str_param("folder").unwrap_or_default()) {
            Ok(resolved) => resolved,
            Err(reply) => return reply,
        };
        let groups = grouped(ctx, Some(&resolved.absolute));
        if groups.is_empty() {
            return HandlerReply::Success(format!(
                "No linting problems found in folder {}.",
                resolved.relative
            ));
        }
        HandlerReply::Success(format!(
            "Linting problems in folder {}:\n\n{}",
            resolved.relative,
            render_groups(&groups)
        ))
    }
    .boxed()
}

pub fn handle_get_workspace_lint_problems<'a>(
    ctx: &'a ActionContext,
    _data: &'a ActionData,
) -> BoxFuture<'a, HandlerReply> {
    async move {
        let groups = grouped(ctx, None);
        if groups.is_empty() {
            return HandlerReply::Success("No linting problems found in the workspace.".into());
        }
        HandlerReply::Success(format!(
            "Linting problems in the workspace:\n\n{}",
            render_groups(&groups)
        ))
    }
    .boxed()
}
