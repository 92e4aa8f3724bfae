use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use neuropilot::config::Config;
use neuropilot::error::BridgeError;
use neuropilot::host::local::{LocalFs, ProcessShellHost};
use neuropilot::host::memory::{AutoConfirm, MemoryEditor};
use neuropilot::host::{ActionRegistration, ContextMessage, Transport};
use neuropilot::safety::{is_path_neuro_safe, WorkspaceRoot};
use neuropilot::{
    ActionContext, ActionData, ActionOutcome, ActionRegistry, Dispatcher, SharedConfig, CONFIG_FILE,
};

#[derive(Parser)]
#[command(
    name = "neuropilot",
    about = "Permission-gated workspace actions for an external AI agent",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every action with its capabilities and whether it is exposed
    ListActions {
        /// Config file path
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Output format (table, json)
        #[arg(long, short = 'f', default_value = "table")]
        format: String,
    },

    /// Generate a starter .neuropilot.toml config file
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },

    /// Check whether the agent may access a path
    CheckPath {
        /// Path, absolute or relative to the workspace root
        path: PathBuf,

        /// Workspace root
        #[arg(long, short = 'r', default_value = ".")]
        root: PathBuf,

        /// Config file path
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
    },

    /// Dispatch one action against a local workspace
    Run {
        /// Action name, e.g. get_files
        action: String,

        /// Action parameters as a JSON object
        #[arg(long, short = 'p', default_value = "{}")]
        params: String,

        /// Workspace root
        #[arg(long, short = 'r', default_value = ".")]
        root: PathBuf,

        /// Config file path
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Approve Copilot-level actions instead of denying them
        #[arg(long)]
        approve: bool,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::ListActions { config, format } => cmd_list_actions(config, format),
        Commands::Init { force } => cmd_init(force),
        Commands::CheckPath { path, root, config } => cmd_check_path(path, root, config),
        Commands::Run {
            action,
            params,
            root,
            config,
            approve,
        } => cmd_run(action, params, root, config, approve),
    };

    match result {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(e.exit_code());
        }
    }
}

/// Prints context pushes as they arrive.
struct StdoutTransport;

impl Transport for StdoutTransport {
    fn register_actions(&self, actions: Vec<ActionRegistration>) {
        tracing::debug!(count = actions.len(), "actions registered");
    }

    fn unregister_actions(&self, names: Vec<String>) {
        tracing::debug!(actions = ?names, "actions unregistered");
    }

    fn send_context(&self, message: ContextMessage) {
        let label = if message.silent { "context (silent)" } else { "context" };
        println!("--- {label} ---\n{}", message.text);
    }
}

fn load(root: &Path, config: Option<PathBuf>) -> Result<Config, BridgeError> {
    neuropilot::load_config(root, config.as_deref())
}

fn workspace(root: &Path) -> Result<WorkspaceRoot, BridgeError> {
    let canonical = std::fs::canonicalize(root)
        .map_err(|e| BridgeError::Config(format!("workspace root {}: {e}", root.display())))?;
    Ok(WorkspaceRoot::new(canonical))
}

fn cmd_list_actions(config: Option<PathBuf>, format_str: String) -> Result<i32, BridgeError> {
    let config = load(Path::new("."), config)?;
    let registry = ActionRegistry::new();

    match format_str.as_str() {
        "json" => {
            let actions: Vec<serde_json::Value> = registry
                .iter()
                .map(|a| {
                    serde_json::json!({
                        "name": a.name,
                        "description": a.description,
                        "permissions": a.permissions,
                        "enabled": a.is_enabled(&config),
                        "requires_confirmation": a.requires_confirmation(&config),
                        "schema": a.schema,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&actions)?);
        }
        _ => {
            println!("{:<30} {:<26} {:<10} STATUS", "NAME", "PERMISSION", "LEVEL");
            println!("{}", "-".repeat(80));
            for action in registry.iter() {
                let permission = action
                    .permissions
                    .iter()
                    .map(|p| p.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                let level = action
                    .permissions
                    .iter()
                    .map(|p| config.permissions.level(*p))
                    .min()
                    .unwrap_or_default();
                let status = if action.is_enabled(&config) {
                    "exposed"
                } else {
                    "hidden"
                };
                println!("{:<30} {:<26} {:<10} {}", action.name, permission, level.to_string(), status);
            }
        }
    }

    Ok(0)
}

fn cmd_init(force: bool) -> Result<i32, BridgeError> {
    let path = PathBuf::from(CONFIG_FILE);

    if path.exists() && !force {
        eprintln!("{CONFIG_FILE} already exists. Use --force to overwrite.");
        return Ok(1);
    }

    std::fs::write(&path, Config::starter_toml())?;
    println!("Created {CONFIG_FILE}");

    Ok(0)
}

fn cmd_check_path(path: PathBuf, root: PathBuf, config: Option<PathBuf>) -> Result<i32, BridgeError> {
    let config = load(&root, config)?;
    let root = workspace(&root)?;
    let absolute = if path.is_absolute() {
        path
    } else {
        root.resolve(&path.to_string_lossy())
    };

    // Exit code: 0 = accessible, 1 = blocked
    if is_path_neuro_safe(Some(&root), &config.workspace, &absolute, true) {
        println!("accessible: {}", root.display_relative(&absolute));
        Ok(0)
    } else {
        println!("blocked: {}", absolute.display());
        Ok(1)
    }
}

fn cmd_run(
    action: String,
    params: String,
    root: PathBuf,
    config: Option<PathBuf>,
    approve: bool,
) -> Result<i32, BridgeError> {
    let config = load(&root, config)?;
    let root = workspace(&root)?;
    let params: serde_json::Value = serde_json::from_str(&params)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let fs = Arc::new(LocalFs);
        let ctx = ActionContext::new(
            Some(root),
            Arc::new(SharedConfig::new(config)),
            fs.clone(),
            Arc::new(MemoryEditor::new(fs)),
            Arc::new(StdoutTransport),
        )
        .with_shells(Arc::new(ProcessShellHost::new()));

        let confirmer = if approve {
            AutoConfirm::approve()
        } else {
            AutoConfirm::deny()
        };
        let dispatcher =
            Dispatcher::new(Arc::new(ctx), ActionRegistry::new()).with_confirmer(Arc::new(confirmer));
        dispatcher.register_actions();

        let dispatched = dispatcher.dispatch(ActionData::new(action, params)).await;
        println!("{}", serde_json::to_string_pretty(&dispatched.result)?);
        let succeeded = dispatched.result.success;

        // Exit code: 0 = completed, 1 = rejected, denied or failed
        Ok::<_, BridgeError>(match dispatched.outcome().await {
            Some(ActionOutcome::Completed) if succeeded => 0,
            _ => 1,
        })
    })
}
