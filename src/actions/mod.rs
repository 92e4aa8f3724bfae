pub mod editing;
pub mod file;
pub mod lint;
pub mod terminal;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::{Config, Permission};
use crate::context::{no_access, ActionContext, ResolvedPath};
use crate::host::ActionRegistration;
use crate::validation::Validators;

/// An action request as delivered by the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionData {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub params: Value,
}

impl ActionData {
    pub fn new(name: impl Into<String>, params: Value) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            params,
        }
    }

    pub fn str_param(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }

    pub fn bool_param(&self, key: &str) -> Option<bool> {
        self.params.get(key).and_then(Value::as_bool)
    }

    pub fn u64_param(&self, key: &str) -> Option<u64> {
        self.params.get(key).and_then(Value::as_u64)
    }

    /// Parameters for schema checking; a missing object counts as `{}`.
    pub fn params_or_empty(&self) -> Value {
        match &self.params {
            Value::Null => Value::Object(Map::new()),
            other => other.clone(),
        }
    }
}

/// Builds the phrase used in confirmation requests, e.g.
/// `open the file "src/lib.rs"`.
#[derive(Clone, Copy)]
pub enum PromptGenerator {
    Fixed(&'static str),
    Dynamic(fn(&ActionData) -> String),
}

impl PromptGenerator {
    pub fn generate(&self, data: &ActionData) -> String {
        match self {
            Self::Fixed(text) => (*text).to_string(),
            Self::Dynamic(build) => build(data),
        }
    }
}

/// What a handler reports once its side effect has run. The text is pushed
/// to the agent as context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerReply {
    Success(String),
    Failure(String),
    /// Everything was already reported through the context reporter.
    Silent,
}

pub type HandlerFn = for<'a> fn(&'a ActionContext, &'a ActionData) -> BoxFuture<'a, HandlerReply>;

/// Static description of one action.
#[derive(Clone)]
pub struct ActionDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub schema: Option<Value>,
    /// Every listed capability must be enabled for the action to be exposed.
    pub permissions: Vec<Permission>,
    pub handler: HandlerFn,
    pub validators: Validators,
    pub prompt: PromptGenerator,
}

impl ActionDescriptor {
    pub fn new(
        name: &'static str,
        description: &'static str,
        permission: Permission,
        handler: HandlerFn,
    ) -> Self {
        Self {
            name,
            description,
            schema: None,
            permissions: vec![permission],
            handler,
            validators: Validators::none(),
            prompt: PromptGenerator::Fixed(name),
        }
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_validators(mut self, validators: Validators) -> Self {
        self.validators = validators;
        self
    }

    pub fn with_prompt(mut self, prompt: PromptGenerator) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn registration(&self) -> ActionRegistration {
        ActionRegistration {
            name: self.name.to_string(),
            description: self.description.to_string(),
            schema: self.schema.clone(),
        }
    }

    /// All gating capabilities are on and the action is not individually
    /// disabled.
    pub fn is_enabled(&self, config: &Config) -> bool {
        self.permissions
            .iter()
            .all(|p| config.permissions.level(*p).is_enabled())
            && config.permissions.is_action_enabled(self.name)
    }

    pub fn requires_confirmation(&self, config: &Config) -> bool {
        self.permissions
            .iter()
            .any(|p| config.permissions.level(*p).requires_confirmation())
    }

    pub fn prompt(&self, data: &ActionData) -> String {
        self.prompt.generate(data)
    }
}

/// Every action the bridge knows about, in registration order.
pub struct ActionRegistry {
    actions: Vec<ActionDescriptor>,
}

impl ActionRegistry {
    /// Registry with all built-in actions.
    pub fn new() -> Self {
        Self {
            actions: all_actions(),
        }
    }

    pub fn empty() -> Self {
        Self {
            actions: Vec::new(),
        }
    }

    /// Add an action, replacing any action of the same name.
    pub fn register(&mut self, descriptor: ActionDescriptor) {
        match self.actions.iter_mut().find(|a| a.name == descriptor.name) {
            Some(existing) => *existing = descriptor,
            None => self.actions.push(descriptor),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ActionDescriptor> {
        self.actions.iter().find(|a| a.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActionDescriptor> {
        self.actions.iter()
    }

    /// The actions that may currently be registered with the transport.
    pub fn enabled<'a>(&'a self, config: &'a Config) -> impl Iterator<Item = &'a ActionDescriptor> {
        self.actions.iter().filter(move |a| a.is_enabled(config))
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// All built-in actions grouped by capability.
pub fn all_actions() -> Vec<ActionDescriptor> {
    let mut actions = file::actions();
    actions.extend(editing::actions());
    actions.extend(lint::actions());
    actions.extend(terminal::actions());
    actions
}

/// Resolve an agent path for a handler and re-check its safety, since the
/// configuration may have changed since validation.
pub(crate) fn resolve_safe(
    ctx: &ActionContext,
    path: &str,
) -> std::result::Result<ResolvedPath, HandlerReply> {
    let Some(resolved) = ctx.resolve(path) else {
        return Err(HandlerReply::Failure("No open workspace.".into()));
    };
    if !ctx.is_path_neuro_safe(&resolved.absolute) {
        return Err(HandlerReply::Failure(no_access(&resolved.relative)));
    }
    Ok(resolved)
}

/// Closed object schema with the given properties and required keys.
pub(crate) fn object_schema(properties: Value, required: &[&str]) -> Value {
    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false,
    })
}
