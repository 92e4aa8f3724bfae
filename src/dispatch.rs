//! Action dispatch.
//!
//! A request goes through the registry lookup, the permission check, the
//! schema check and the sync validators before anything is replied. The
//! rest runs in a spawned task: deferred validators, user confirmation for
//! Copilot-level actions, then the handler. Its outcome reaches the agent
//! only as context.
//!
//! One semaphore permit guards deferred validation. It is taken when a
//! request arrives and held until the deferred validators of that request
//! have resolved; a request arriving meanwhile is rejected.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;

use crate::actions::{ActionData, ActionDescriptor, ActionRegistry, HandlerReply};
use crate::config::Permission;
use crate::context::cursor::render_with_cursor;
use crate::context::{fenced, ActionContext, CURSOR_MARKER};
use crate::gate::PermissionGate;
use crate::host::{ActionResult, ConfirmationRequest, Confirmer};
use crate::validation::{check_schema, run_deferred, run_sync};

/// How an accepted action eventually ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Completed,
    /// A deferred validator failed.
    Rejected(String),
    /// The user refused a Copilot-level action.
    Denied,
    Failed(String),
}

/// Immediate reply plus the still-running remainder of the action.
#[derive(Debug)]
pub struct Dispatched {
    pub result: ActionResult,
    /// `None` when the action was rejected before the reply.
    pub completion: Option<JoinHandle<ActionOutcome>>,
}

impl Dispatched {
    fn rejected(result: ActionResult) -> Self {
        Self {
            result,
            completion: None,
        }
    }

    /// Wait for the deferred stage.
    pub async fn outcome(self) -> Option<ActionOutcome> {
        let handle = self.completion?;
        Some(match handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "action task failed");
                ActionOutcome::Failed("The action could not be completed.".into())
            }
        })
    }
}

pub struct Dispatcher {
    ctx: Arc<ActionContext>,
    registry: Arc<ActionRegistry>,
    gate: PermissionGate,
    confirmer: Option<Arc<dyn Confirmer>>,
    validation_permit: Arc<Semaphore>,
}

impl Dispatcher {
    pub fn new(ctx: Arc<ActionContext>, registry: ActionRegistry) -> Self {
        Self {
            ctx,
            registry: Arc::new(registry),
            gate: PermissionGate::new(),
            confirmer: None,
            validation_permit: Arc::new(Semaphore::new(1)),
        }
    }

    /// Without a confirmer every Copilot-level action is denied.
    pub fn with_confirmer(mut self, confirmer: Arc<dyn Confirmer>) -> Self {
        self.confirmer = Some(confirmer);
        self
    }

    pub fn context(&self) -> &Arc<ActionContext> {
        &self.ctx
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    pub fn gate(&self) -> &PermissionGate {
        &self.gate
    }

    pub async fn dispatch(&self, data: ActionData) -> Dispatched {
        let Some(descriptor) = self.registry.get(&data.name) else {
            tracing::warn!(action = %data.name, "unknown action");
            return Dispatched::rejected(ActionResult::failure(format!(
                "Unknown action {}.",
                data.name
            )));
        };
        let config = self.ctx.config();
        if !descriptor.is_enabled(&config) {
            tracing::warn!(action = %data.name, "action is not enabled");
            return Dispatched::rejected(ActionResult::failure(format!(
                "You do not have permission to use the action {}.",
                data.name
            )));
        }

        let Ok(permit) = self.validation_permit.clone().try_acquire_owned() else {
            tracing::warn!(action = %data.name, "previous action still in validation");
            return Dispatched::rejected(ActionResult::failure(
                "Another action is still being validated. Try again once it has finished.",
            ));
        };

        if let Some(schema) = &descriptor.schema {
            let verdict = check_schema(descriptor.name, schema, &data.params_or_empty());
            if !verdict.is_accept() {
                tracing::warn!(action = %data.name, verdict = ?verdict, "schema check failed");
                return Dispatched::rejected(verdict.into_action_result());
            }
        }

        let verdict = run_sync(&descriptor.validators.sync, &self.ctx, &data).await;
        if !verdict.is_accept() {
            tracing::warn!(
                action = %data.name,
                terminal = verdict.is_terminal(),
                verdict = ?verdict,
                "action rejected"
            );
            return Dispatched::rejected(verdict.into_action_result());
        }

        let confirmation = descriptor
            .requires_confirmation(&config)
            .then(|| descriptor.prompt(&data));
        let result = match &confirmation {
            Some(prompt) => ActionResult::success(Some(format!("Requested permission to {prompt}"))),
            None => verdict.into_action_result(),
        };
        let permit = if descriptor.validators.deferred.is_empty() {
            drop(permit);
            None
        } else {
            Some(permit)
        };
        tracing::debug!(action = %data.name, "action accepted");

        let pending = Pending {
            ctx: self.ctx.clone(),
            descriptor: descriptor.clone(),
            data,
            permit,
            confirmer: self.confirmer.clone(),
            confirmation,
        };
        Dispatched {
            result,
            completion: Some(tokio::spawn(pending.run())),
        }
    }

    /// Permission gate: bring the transport's registered set in line with
    /// the current permissions.
    pub fn register_actions(&self) {
        let config = self.ctx.config();
        self.gate
            .sync(&self.registry, &config, self.ctx.reporter.transport());
    }

    /// Settings changed.
    pub fn reload(&self) {
        self.register_actions();

        let editing = self.ctx.permission_level(Permission::EditActiveDocument);
        if let Some(cursor) = self.ctx.cursor.current() {
            if !editing.is_enabled() || !self.ctx.is_path_neuro_safe(&cursor.path) {
                tracing::info!(path = %cursor.path.display(), "revoking virtual cursor");
                self.ctx.cursor.clear();
            }
        }
    }

    pub fn reconnect(&self) {
        let config = self.ctx.config();
        self.gate
            .reconnect(&self.registry, &config, self.ctx.reporter.transport());
    }

    /// The user switched editors. The virtual cursor follows to accessible
    /// files; with `send_contents_on_file_change` the content is pushed.
    pub async fn on_active_editor_changed(&self, path: &Path) {
        let ctx = &self.ctx;
        if !ctx.is_path_neuro_safe(path) {
            tracing::debug!(path = %path.display(), "active editor is not accessible");
            return;
        }
        let position = ctx.cursor.get(path).unwrap_or_default();
        if ctx.permission_level(Permission::EditActiveDocument).is_enabled() {
            ctx.cursor.set(path, position);
        }
        if !ctx.config().workspace.send_contents_on_file_change {
            return;
        }

        let relative = ctx.display_path(path);
        match ctx.editor.open_document(path).await {
            Ok(document) => {
                let content = render_with_cursor(&document.text, position);
                ctx.reporter.send_silent(format!(
                    "Switched to file {relative}\n\nContent (cursor position denoted by `{CURSOR_MARKER}`):\n\n{}",
                    fenced(&content, Some(&document.language_id))
                ));
            }
            Err(e) => {
                tracing::error!(path = %relative, error = %e, "failed to read active document");
            }
        }
    }

    pub fn on_file_closed(&self, path: &Path) {
        self.ctx.cursor.clear_under(path);
    }
}

/// The part of an action that runs after the reply.
struct Pending {
    ctx: Arc<ActionContext>,
    descriptor: ActionDescriptor,
    data: ActionData,
    permit: Option<OwnedSemaphorePermit>,
    confirmer: Option<Arc<dyn Confirmer>>,
    /// Prompt to confirm, for Copilot-level actions.
    confirmation: Option<String>,
}

impl Pending {
    async fn run(self) -> ActionOutcome {
        let Self {
            ctx,
            descriptor,
            data,
            permit,
            confirmer,
            confirmation,
        } = self;
        let name = descriptor.name;

        if let Some(permit) = permit {
            let verdict = run_deferred(&descriptor.validators.deferred, &ctx, &data).await;
            drop(permit);
            if !verdict.is_accept() {
                let message = verdict.message().unwrap_or("Validation failed.").to_string();
                tracing::warn!(action = name, %message, "rejected by deferred validation");
                ctx.reporter
                    .send(format!("Action {name} was rejected: {message}"));
                return ActionOutcome::Rejected(message);
            }
        }

        if let Some(prompt) = confirmation {
            let request = ConfirmationRequest {
                action: name.to_string(),
                prompt,
            };
            let approved = match &confirmer {
                Some(confirmer) => confirmer.confirm(&request).await,
                None => {
                    tracing::warn!(action = name, "no confirmer configured, denying");
                    false
                }
            };
            if !approved {
                tracing::info!(action = name, "request denied");
                ctx.reporter
                    .send(format!("Request to {} was denied.", request.prompt));
                return ActionOutcome::Denied;
            }
        }

        match (descriptor.handler)(ctx.as_ref(), &data).await {
            HandlerReply::Success(text) => {
                ctx.reporter.send(text);
                ActionOutcome::Completed
            }
            HandlerReply::Failure(text) => {
                ctx.reporter.send(text.clone());
                ActionOutcome::Failed(text)
            }
            HandlerReply::Silent => ActionOutcome::Completed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::PromptGenerator;
    use crate::config::PermissionLevel;
    use crate::context::Position;
    use crate::host::memory::AutoConfirm;
    use crate::host::{Editor, ShowOptions, Transport};
    use crate::test_support::Harness;
    use crate::validation::{ValidationResult, Validators};
    use futures_util::future::BoxFuture;
    use futures_util::FutureExt;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::time::Duration;

    fn dispatcher(h: &Harness) -> Dispatcher {
        Dispatcher::new(h.ctx.clone(), ActionRegistry::new())
    }

    fn slow_rejection<'a>(_: &'a ActionContext, _: &'a ActionData) -> BoxFuture<'a, ValidationResult> {
        async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            ValidationResult::fail("too slow")
        }
        .boxed()
    }

    fn done<'a>(_: &'a ActionContext, _: &'a ActionData) -> BoxFuture<'a, HandlerReply> {
        async { HandlerReply::Success("done".into()) }.boxed()
    }

    #[tokio::test]
    async fn unknown_and_disabled_actions_are_rejected() {
        let h = Harness::new();
        let d = dispatcher(&h);
        let out = d.dispatch(ActionData::new("format_disk", json!({}))).await;
        assert!(!out.result.success);
        assert!(out.completion.is_none());

        h.config
            .update(|c| c.permissions.set_level(Permission::Delete, PermissionLevel::Off));
        let out = d
            .dispatch(ActionData::new("delete_file_or_folder", json!({ "path": "a" })))
            .await;
        assert_eq!(
            out.result,
            ActionResult::failure("You do not have permission to use the action delete_file_or_folder.")
        );
    }

    #[tokio::test]
    async fn schema_mismatch_asks_for_retry() {
        let h = Harness::new();
        let out = dispatcher(&h)
            .dispatch(ActionData::new("create_file", json!({ "path": "a.txt" })))
            .await;
        assert!(out.result.retry);
        assert!(out.completion.is_none());
    }

    #[tokio::test]
    async fn sync_failure_is_the_reply() {
        let h = Harness::new();
        h.fs.insert_file("/work/a.txt", "");
        let out = dispatcher(&h)
            .dispatch(ActionData::new("create_file", json!({ "filePath": "a.txt" })))
            .await;
        assert_eq!(out.result, ActionResult::failure("file \"a.txt\" already exists."));
        assert!(h.transport.contexts().is_empty());
    }

    #[tokio::test]
    async fn empty_path_is_a_terminal_failure() {
        let h = Harness::new();
        let out = dispatcher(&h)
            .dispatch(ActionData::new("open_file", json!({ "filePath": "" })))
            .await;
        assert_eq!(out.result, ActionResult::failure("No file path specified."));
    }

    #[tokio::test]
    async fn autopilot_runs_handler_and_pushes_context() {
        let h = Harness::new();
        let out = dispatcher(&h)
            .dispatch(ActionData::new("create_file", json!({ "filePath": "new.txt" })))
            .await;
        assert_eq!(out.result, ActionResult::success(None));
        assert_eq!(out.outcome().await, Some(ActionOutcome::Completed));
        assert_eq!(
            h.transport.contexts(),
            vec!["Created file new.txt", "Opened new file new.txt"]
        );
    }

    #[tokio::test]
    async fn copilot_asks_first() {
        let h = Harness::new();
        h.config
            .update(|c| c.permissions.set_level(Permission::Create, PermissionLevel::Copilot));
        let confirmer = Arc::new(AutoConfirm::approve());
        let d = dispatcher(&h).with_confirmer(confirmer.clone());

        let out = d
            .dispatch(ActionData::new("create_folder", json!({ "folderPath": "src" })))
            .await;
        assert_eq!(
            out.result.message.as_deref(),
            Some("Requested permission to create the folder \"src\"")
        );
        assert_eq!(out.outcome().await, Some(ActionOutcome::Completed));
        assert_eq!(confirmer.requests()[0].prompt, "create the folder \"src\"");
        assert!(h.fs.contains(Path::new("/work/src")));
    }

    #[tokio::test]
    async fn denied_request_changes_nothing() {
        let h = Harness::new();
        h.config
            .update(|c| c.permissions.set_level(Permission::Create, PermissionLevel::Copilot));
        let d = dispatcher(&h).with_confirmer(Arc::new(AutoConfirm::deny()));

        let out = d
            .dispatch(ActionData::new("create_file", json!({ "filePath": "a.txt" })))
            .await;
        assert_eq!(out.outcome().await, Some(ActionOutcome::Denied));
        assert_eq!(
            h.transport.contexts(),
            vec!["Request to create the file \"a.txt\" was denied."]
        );
        assert!(!h.fs.contains(Path::new("/work/a.txt")));
    }

    #[tokio::test]
    async fn deferred_rejection_blocks_until_resolved() {
        let h = Harness::new();
        let mut registry = ActionRegistry::new();
        registry.register(
            ActionDescriptor::new("slow", "Slow check.", Permission::OpenFiles, done)
                .with_validators(Validators::none().with_deferred(vec![slow_rejection]))
                .with_prompt(PromptGenerator::Fixed("run the slow check")),
        );
        let d = Dispatcher::new(h.ctx.clone(), registry);

        let first = d.dispatch(ActionData::new("slow", json!({}))).await;
        assert!(first.result.success);

        let second = d.dispatch(ActionData::new("get_files", json!({}))).await;
        assert!(!second.result.success);
        assert!(!second.result.retry);

        assert_eq!(
            first.outcome().await,
            Some(ActionOutcome::Rejected("too slow".into()))
        );
        assert_eq!(h.transport.contexts(), vec!["Action slow was rejected: too slow"]);

        let third = d.dispatch(ActionData::new("get_files", json!({}))).await;
        assert!(third.result.success);
        assert_eq!(third.outcome().await, Some(ActionOutcome::Completed));
    }

    #[tokio::test]
    async fn binary_file_is_rejected_after_reply() {
        let h = Harness::new();
        h.fs.insert_file("/work/blob.bin", vec![0u8, 159, 146, 150]);
        let out = dispatcher(&h)
            .dispatch(ActionData::new("open_file", json!({ "filePath": "blob.bin" })))
            .await;
        assert!(out.result.success);
        assert_eq!(
            out.outcome().await,
            Some(ActionOutcome::Rejected("You cannot open a binary file.".into()))
        );
        assert!(h.editor.active_editor().is_none());
    }

    #[tokio::test]
    async fn reload_reregisters_and_revokes_cursor() {
        let h = Harness::new();
        let d = dispatcher(&h);
        d.register_actions();
        assert!(h.transport.registered_names().contains(&"place_cursor".to_string()));

        h.ctx.cursor.set(Path::new("/work/a.txt"), Position::new(1, 0));
        h.config.update(|c| {
            c.permissions
                .set_level(Permission::EditActiveDocument, PermissionLevel::Off)
        });
        d.reload();
        assert!(h.ctx.cursor.current().is_none());
        assert!(!h.transport.registered_names().contains(&"place_cursor".to_string()));
    }

    #[tokio::test]
    async fn cursor_is_revoked_when_file_becomes_unsafe() {
        let h = Harness::new();
        let d = dispatcher(&h);
        h.ctx.cursor.set(Path::new("/work/secret/a.txt"), Position::default());
        h.config
            .update(|c| c.workspace.exclude = vec!["secret/**".into()]);
        d.reload();
        assert!(h.ctx.cursor.current().is_none());
    }

    #[tokio::test]
    async fn editor_change_pushes_content_silently() {
        let h = Harness::new();
        h.config
            .update(|c| c.workspace.send_contents_on_file_change = true);
        h.fs.insert_file("/work/a.py", "print(1)");
        h.editor
            .show_document(Path::new("/work/a.py"), ShowOptions::default())
            .await
            .unwrap();

        let d = dispatcher(&h);
        d.on_active_editor_changed(Path::new("/work/a.py")).await;
        let messages = h.transport.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].silent);
        assert_eq!(
            messages[0].text,
            "Switched to file a.py\n\nContent (cursor position denoted by `<<<|>>>`):\n\n```python\n<<<|>>>print(1)\n```"
        );

        d.on_file_closed(Path::new("/work/a.py"));
        assert!(h.ctx.cursor.current().is_none());
    }

    #[tokio::test]
    async fn reconnect_sends_full_registration() {
        let h = Harness::new();
        let d = dispatcher(&h);
        d.register_actions();
        h.transport.unregister_actions(h.transport.registered_names());
        d.reconnect();
        assert_eq!(
            h.transport.registered_names().len(),
            ActionRegistry::new().iter().count()
        );
    }
}
