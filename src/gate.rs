//! Keeps the set of actions registered with the transport equal to the set
//! the current permissions allow.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::actions::ActionRegistry;
use crate::config::Config;
use crate::host::Transport;

#[derive(Debug, Default)]
pub struct PermissionGate {
    registered: Mutex<Vec<String>>,
}

impl PermissionGate {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        self.registered.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Names last sent to the transport.
    pub fn registered(&self) -> Vec<String> {
        self.lock().clone()
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.lock().iter().any(|n| n == name)
    }

    /// Unregister actions that lost their permission and (re-)register every
    /// enabled action.
    pub fn sync(&self, registry: &ActionRegistry, config: &Config, transport: &dyn Transport) {
        let enabled: Vec<_> = registry.enabled(config).collect();
        let names: Vec<String> = enabled.iter().map(|a| a.name.to_string()).collect();

        let mut registered = self.lock();
        let stale: Vec<String> = registered
            .iter()
            .filter(|n| !names.contains(*n))
            .cloned()
            .collect();
        if !stale.is_empty() {
            tracing::info!(actions = ?stale, "unregistering actions");
            transport.unregister_actions(stale);
        }
        if !enabled.is_empty() {
            tracing::info!(count = enabled.len(), "registering actions");
            transport.register_actions(enabled.iter().map(|a| a.registration()).collect());
        }
        *registered = names;
    }

    /// A fresh connection knows nothing: send the full registration again.
    pub fn reconnect(&self, registry: &ActionRegistry, config: &Config, transport: &dyn Transport) {
        self.lock().clear();
        self.sync(registry, config, transport);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Permission, PermissionLevel};
    use crate::host::memory::RecordingTransport;
    use pretty_assertions::assert_eq;

    fn config(levels: &[(Permission, PermissionLevel)]) -> Config {
        let mut config = Config::default();
        for (permission, level) in levels {
            config.permissions.set_level(*permission, *level);
        }
        config
    }

    #[test]
    fn only_enabled_groups_are_registered() {
        let gate = PermissionGate::new();
        let transport = RecordingTransport::new();
        let registry = ActionRegistry::new();
        let config = config(&[
            (Permission::Create, PermissionLevel::Copilot),
            (Permission::Delete, PermissionLevel::Autopilot),
        ]);
        gate.sync(&registry, &config, &transport);
        assert_eq!(
            transport.registered_names(),
            vec!["create_file", "create_folder", "delete_file_or_folder"]
        );
        assert!(gate.is_registered("create_file"));
        assert!(!gate.is_registered("open_file"));
    }

    #[test]
    fn revoked_permission_unregisters() {
        let gate = PermissionGate::new();
        let transport = RecordingTransport::new();
        let registry = ActionRegistry::new();
        gate.sync(
            &registry,
            &config(&[
                (Permission::Rename, PermissionLevel::Autopilot),
                (Permission::TerminalAccess, PermissionLevel::Autopilot),
            ]),
            &transport,
        );
        gate.sync(
            &registry,
            &config(&[(Permission::Rename, PermissionLevel::Autopilot)]),
            &transport,
        );
        assert_eq!(transport.registered_names(), vec!["rename_file_or_folder"]);
        assert_eq!(gate.registered(), vec!["rename_file_or_folder"]);
    }

    #[test]
    fn disabled_action_stays_hidden_inside_enabled_group() {
        let gate = PermissionGate::new();
        let transport = RecordingTransport::new();
        let mut config = config(&[(Permission::AccessLintingAnalysis, PermissionLevel::Autopilot)]);
        config
            .permissions
            .disabled_actions
            .insert("get_workspace_lint_problems".into());
        gate.sync(&ActionRegistry::new(), &config, &transport);
        assert_eq!(
            transport.registered_names(),
            vec!["get_file_lint_problems", "get_folder_lint_problems"]
        );
    }

    #[test]
    fn reconnect_resends_everything() {
        let gate = PermissionGate::new();
        let registry = ActionRegistry::new();
        let config = config(&[(Permission::Rename, PermissionLevel::Autopilot)]);
        gate.sync(&registry, &config, &RecordingTransport::new());

        let fresh = RecordingTransport::new();
        gate.reconnect(&registry, &config, &fresh);
        assert_eq!(fresh.registered_names(), vec!["rename_file_or_folder"]);
    }
}
