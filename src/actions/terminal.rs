//! Terminal access: run commands in configured shells.

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde_json::json;

use super::{object_schema, ActionData, ActionDescriptor, HandlerReply, PromptGenerator};
use crate::config::Permission;
use crate::context::{fenced, ActionContext};
use crate::host::ShellOutput;
use crate::validation::{ValidationResult, Validators};

pub fn actions() -> Vec<ActionDescriptor> {
    let shell = json!({ "type": "string", "minLength": 1 });
    vec![
        ActionDescriptor::new(
            "execute_in_terminal",
            "Run a command in one of the configured shells. The output is sent back once the command finishes.",
            Permission::TerminalAccess,
            handle_execute_in_terminal,
        )
        .with_schema(object_schema(
            json!({ "command": { "type": "string", "minLength": 1 }, "shell": shell }),
            &["command", "shell"],
        ))
        .with_validators(Validators::sync(vec![
            shell_validation,
            shell_idle_validation,
        ]))
        .with_prompt(PromptGenerator::Dynamic(|data| {
            format!(
                "run \"{}\" in the {} terminal",
                data.str_param("command").unwrap_or_default(),
                data.str_param("shell").unwrap_or_default()
            )
        })),
        ActionDescriptor::new(
            "kill_terminal_process",
            "Kill the command currently running in a shell.",
            Permission::TerminalAccess,
            handle_kill_terminal_process,
        )
        .with_schema(object_schema(json!({ "shell": shell }), &["shell"]))
        .with_validators(Validators::sync(vec![
            shell_validation,
            shell_busy_validation,
        ]))
        .with_prompt(PromptGenerator::Dynamic(|data| {
            format!(
                "kill the process running in the {} terminal",
                data.str_param("shell").unwrap_or_default()
            )
        })),
        ActionDescriptor::new(
            "get_currently_running_shells",
            "List the shells that are currently running a command.",
            Permission::TerminalAccess,
            handle_get_currently_running_shells,
        )
        .with_prompt(PromptGenerator::Fixed("get the list of currently running shells")),
    ]
}

/// A shell host exists and `shell` names a configured profile.
fn shell_validation<'a>(ctx: &'a ActionContext, data: &'a ActionData) -> BoxFuture<'a, ValidationResult> {
    async move {
        if ctx.shells.is_none() {
            return ValidationResult::fail("Terminal access is not available.");
        }
        let shell = data.str_param("shell").unwrap_or_default();
        let config = ctx.config();
        if config.terminal.profile(shell).is_some() {
            return ValidationResult::accept();
        }
        let available: Vec<&str> = config.terminal.shells.iter().map(|s| s.name.as_str()).collect();
        ValidationResult::fail(format!(
            "Unknown shell \"{shell}\". Available shells: {}.",
            available.join(", ")
        ))
    }
    .boxed()
}

fn shell_idle_validation<'a>(ctx: &'a ActionContext, data: &'a ActionData) -> BoxFuture<'a, ValidationResult> {
    async move {
        let shell = data.str_param("shell").unwrap_or_default();
        match &ctx.shells {
            Some(shells) if shells.is_running(shell) => ValidationResult::fail(format!(
                "The {shell} terminal is already running a command."
            )),
            _ => ValidationResult::accept(),
        }
    }
    .boxed()
}

fn shell_busy_validation<'a>(ctx: &'a ActionContext, data: &'a ActionData) -> BoxFuture<'a, ValidationResult> {
    async move {
        let shell = data.str_param("shell").unwrap_or_default();
        match &ctx.shells {
            Some(shells) if !shells.is_running(shell) => ValidationResult::fail(format!(
                "The {shell} terminal is not running anything."
            )),
            _ => ValidationResult::accept(),
        }
    }
    .boxed()
}

fn render_output(command: &str, shell: &str, output: &ShellOutput) -> String {
    let status = match (output.killed, output.exit_code) {
        (true, _) => "was killed".to_string(),
        (false, Some(code)) => format!("exited with code {code}"),
        (false, None) => "was terminated by a signal".to_string(),
    };
    let mut text = format!("Command \"{command}\" in the {shell} terminal {status}.");
    if !output.stdout.is_empty() {
        text.push_str(&format!("\n\nOutput:\n\n{}", fenced(output.stdout.trim_end(), None)));
    }
    if !output.stderr.is_empty() {
        text.push_str(&format!("\n\nErrors:\n\n{}", fenced(output.stderr.trim_end(), None)));
    }
    text
}

pub fn handle_execute_in_terminal<'a>(
    ctx: &'a ActionContext,
    data: &'a ActionData,
) -> BoxFuture<'a, HandlerReply> {
    async move {
        let command = data.str_param("command").unwrap_or_default();
        let shell = data.str_param("shell").unwrap_or_default();
        let Some(shells) = &ctx.shells else {
            return HandlerReply::Failure("Terminal access is not available.".into());
        };
        let Some(root) = ctx.root() else {
            return HandlerReply::Failure("No open workspace to run commands in.".into());
        };
        let config = ctx.config();
        let Some(profile) = config.terminal.profile(shell) else {
            return HandlerReply::Failure(format!("Unknown shell \"{shell}\"."));
        };

        tracing::info!(shell, command, "running terminal command");
        match shells.execute(profile, command, root.path()).await {
            Ok(output) => HandlerReply::Success(render_output(command, shell, &output)),
            Err(e) => {
                tracing::error!(shell, command, error = %e, "terminal command failed");
                HandlerReply::Failure(format!("Failed to run \"{command}\" in the {shell} terminal"))
            }
        }
    }
    .boxed()
}

pub fn handle_kill_terminal_process<'a>(
    ctx: &'a ActionContext,
    data: &'a ActionData,
) -> BoxFuture<'a, HandlerReply> {
    async move {
        let shell = data.str_param("shell").unwrap_or_default();
        let Some(shells) = &ctx.shells else {
            return HandlerReply::Failure("Terminal access is not available.".into());
        };
        match shells.kill(shell).await {
            Ok(true) => {
                tracing::info!(shell, "killed terminal process");
                HandlerReply::Success(format!("Killed the process running in the {shell} terminal."))
            }
            Ok(false) => HandlerReply::Failure(format!("The {shell} terminal is not running anything.")),
            Err(e) => {
                tracing::error!(shell, error = %e, "failed to kill terminal process");
                HandlerReply::Failure(format!("Failed to kill the process in the {shell} terminal"))
            }
        }
    }
    .boxed()
}

pub fn handle_get_currently_running_shells<'a>(
    ctx: &'a ActionContext,
    _data: &'a ActionData,
) -> BoxFuture<'a, HandlerReply> {
    async move {
        let running = ctx.shells.as_ref().map(|s| s.running()).unwrap_or_default();
        if running.is_empty() {
            return HandlerReply::Success("No shells are currently running.".into());
        }
        let lines: Vec<String> = running
            .iter()
            .map(|r| format!("- {}: {}", r.shell, r.command))
            .collect();
        HandlerReply::Success(format!("Currently running shells:\n\n{}", lines.join("\n")))
    }
    .boxed()
}
