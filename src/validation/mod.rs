//! The validation pipeline.
//!
//! Validators are plain function pointers returning a boxed future, so the
//! pipeline awaits every unit the same way. The `sync` group runs in
//! declaration order before the reply and stops at the first non-accept
//! verdict. The `deferred` group runs concurrently after the reply; any
//! failure in it overrides every success.

pub mod path;

use futures_util::future::{join_all, BoxFuture};
use serde_json::Value;

use crate::actions::ActionData;
use crate::context::ActionContext;
use crate::host::ActionResult;

pub use path::{
    binary_file_validation, delete_validation, neuro_safe_validation, rename_validation,
    validate_path, workspace_open_validation,
};

pub type ValidatorFn =
    for<'a> fn(&'a ActionContext, &'a ActionData) -> BoxFuture<'a, ValidationResult>;

/// Verdict of one validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Accept(Option<String>),
    /// `terminal` failures are raised before anything capability-related is
    /// attempted (e.g. an empty path) and must never be retried.
    Fail { message: String, terminal: bool },
    /// Ask the transport to re-prompt the agent.
    Retry(String),
}

impl ValidationResult {
    pub fn accept() -> Self {
        Self::Accept(None)
    }

    pub fn accept_with(message: impl Into<String>) -> Self {
        Self::Accept(Some(message.into()))
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self::Fail {
            message: message.into(),
            terminal: false,
        }
    }

    pub fn terminal(message: impl Into<String>) -> Self {
        Self::Fail {
            message: message.into(),
            terminal: true,
        }
    }

    pub fn retry(message: impl Into<String>) -> Self {
        Self::Retry(message.into())
    }

    pub fn is_accept(&self) -> bool {
        matches!(self, Self::Accept(_))
    }

    /// A failure that retrying with other parameters of the same shape
    /// cannot fix, such as an empty path.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Fail { terminal: true, .. })
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Accept(message) => message.as_deref(),
            Self::Fail { message, .. } | Self::Retry(message) => Some(message),
        }
    }

    pub fn into_action_result(self) -> ActionResult {
        match self {
            Self::Accept(message) => ActionResult::success(message),
            Self::Fail { message, .. } => ActionResult::failure(message),
            Self::Retry(message) => ActionResult::retry(message),
        }
    }
}

/// Validators attached to an action.
#[derive(Clone, Default)]
pub struct Validators {
    /// Run before the reply, in order.
    pub sync: Vec<ValidatorFn>,
    /// Run after the reply, concurrently. New actions are refused until
    /// they all resolve.
    pub deferred: Vec<ValidatorFn>,
}

impl Validators {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn sync(validators: Vec<ValidatorFn>) -> Self {
        Self {
            sync: validators,
            deferred: Vec::new(),
        }
    }

    pub fn with_deferred(mut self, validators: Vec<ValidatorFn>) -> Self {
        self.deferred = validators;
        self
    }
}

/// Run validators in order; the first non-accept verdict wins. On success
/// the last accept message is kept.
pub async fn run_sync(
    validators: &[ValidatorFn],
    ctx: &ActionContext,
    data: &ActionData,
) -> ValidationResult {
    let mut accepted = ValidationResult::accept();
    for validator in validators {
        match validator(ctx, data).await {
            ValidationResult::Accept(None) => {}
            result @ ValidationResult::Accept(Some(_)) => accepted = result,
            failure => return failure,
        }
    }
    accepted
}

/// Run validators concurrently. Any failure rejects; among several failures
/// the first in declaration order is reported.
pub async fn run_deferred(
    validators: &[ValidatorFn],
    ctx: &ActionContext,
    data: &ActionData,
) -> ValidationResult {
    let results = join_all(validators.iter().map(|v| v(ctx, data))).await;
    results
        .into_iter()
        .find(|r| !r.is_accept())
        .unwrap_or_else(ValidationResult::accept)
}

/// Structural check of the parameters against the action's JSON schema.
/// A mismatch is a retry, not a plain failure.
pub fn check_schema(action: &str, schema: &Value, params: &Value) -> ValidationResult {
    let validator = match jsonschema::validator_for(schema) {
        Ok(validator) => validator,
        Err(e) => {
            tracing::error!(action, error = %e, "action has an invalid schema");
            return ValidationResult::fail(format!("Action {action} is misconfigured."));
        }
    };

    let mut errors = validator.iter_errors(params);
    match errors.next() {
        Some(first) => ValidationResult::retry(format!("Invalid parameters for {action}: {first}")),
        None => ValidationResult::accept(),
    }
}
