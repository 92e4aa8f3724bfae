use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One entry of the action registration sent to the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRegistration {
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<serde_json::Value>,
}

/// An out-of-band message telling the agent what happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextMessage {
    pub text: String,
    #[serde(default)]
    pub silent: bool,
}

/// Immediate reply to an action request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Ask the transport to re-prompt the agent (forced actions only).
    #[serde(default)]
    pub retry: bool,
}

impl ActionResult {
    pub fn success(message: Option<String>) -> Self {
        Self {
            success: true,
            message,
            retry: false,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            retry: false,
        }
    }

    pub fn retry(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            retry: true,
        }
    }
}

/// The agent connection. Connection handling and wire format live behind
/// this trait.
pub trait Transport: Send + Sync {
    fn register_actions(&self, actions: Vec<ActionRegistration>);

    fn unregister_actions(&self, names: Vec<String>);

    fn send_context(&self, message: ContextMessage);
}

/// What the user is asked before a Copilot-level action runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationRequest {
    pub action: String,
    /// e.g. `open the file "src/lib.rs"`
    pub prompt: String,
}

/// Asks the human user to approve an action.
#[async_trait]
pub trait Confirmer: Send + Sync {
    async fn confirm(&self, request: &ConfirmationRequest) -> bool;
}
