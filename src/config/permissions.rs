use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// A capability gating a group of actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    OpenFiles,
    EditActiveDocument,
    Create,
    Rename,
    Delete,
    TerminalAccess,
    AccessLintingAnalysis,
}

impl Permission {
    pub const ALL: [Permission; 7] = [
        Self::OpenFiles,
        Self::EditActiveDocument,
        Self::Create,
        Self::Rename,
        Self::Delete,
        Self::TerminalAccess,
        Self::AccessLintingAnalysis,
    ];
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenFiles => write!(f, "Open Files"),
            Self::EditActiveDocument => write!(f, "Edit Active Document"),
            Self::Create => write!(f, "Create"),
            Self::Rename => write!(f, "Rename"),
            Self::Delete => write!(f, "Delete"),
            Self::TerminalAccess => write!(f, "Terminal Access"),
            Self::AccessLintingAnalysis => write!(f, "Access Linting Analysis"),
        }
    }
}

/// How much freedom the agent has for one capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionLevel {
    /// Actions are never registered.
    #[default]
    Off,
    /// Actions are registered but each run must be confirmed by the user.
    Copilot,
    /// Actions run without confirmation.
    Autopilot,
}

impl PermissionLevel {
    pub fn is_enabled(self) -> bool {
        self != Self::Off
    }

    pub fn requires_confirmation(self) -> bool {
        self == Self::Copilot
    }

    pub fn from_str_lenient(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "off" | "disabled" | "false" => Some(Self::Off),
            "copilot" | "confirm" => Some(Self::Copilot),
            "autopilot" | "on" | "true" => Some(Self::Autopilot),
            _ => None,
        }
    }
}

impl std::fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Off => write!(f, "off"),
            Self::Copilot => write!(f, "copilot"),
            Self::Autopilot => write!(f, "autopilot"),
        }
    }
}

/// `[permissions]` section of `.neuropilot.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionConfig {
    pub open_files: PermissionLevel,
    pub edit_active_document: PermissionLevel,
    pub create: PermissionLevel,
    pub rename: PermissionLevel,
    pub delete: PermissionLevel,
    pub terminal_access: PermissionLevel,
    pub access_linting_analysis: PermissionLevel,
    /// Individual actions switched off even when their capability is enabled.
    pub disabled_actions: HashSet<String>,
}

impl PermissionConfig {
    pub fn level(&self, permission: Permission) -> PermissionLevel {
        match permission {
            Permission::OpenFiles => self.open_files,
            Permission::EditActiveDocument => self.edit_active_document,
            Permission::Create => self.create,
            Permission::Rename => self.rename,
            Permission::Delete => self.delete,
            Permission::TerminalAccess => self.terminal_access,
            Permission::AccessLintingAnalysis => self.access_linting_analysis,
        }
    }

    pub fn set_level(&mut self, permission: Permission, level: PermissionLevel) {
        let slot = match permission {
            Permission::OpenFiles => &mut self.open_files,
            Permission::EditActiveDocument => &mut self.edit_active_document,
            Permission::Create => &mut self.create,
            Permission::Rename => &mut self.rename,
            Permission::Delete => &mut self.delete,
            Permission::TerminalAccess => &mut self.terminal_access,
            Permission::AccessLintingAnalysis => &mut self.access_linting_analysis,
        };
        *slot = level;
    }

    pub fn is_action_enabled(&self, name: &str) -> bool {
        !self.disabled_actions.contains(name)
    }

    /// Every capability at the given level.
    pub fn all(level: PermissionLevel) -> Self {
        let mut config = Self::default();
        for permission in Permission::ALL {
            config.set_level(permission, level);
        }
        config
    }
}
