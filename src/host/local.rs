//! Local disk and process backends.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::oneshot;

use super::fs::{DeleteOptions, FileStat, FileType, WorkspaceFs};
use super::shell::{RunningShell, ShellHost, ShellOutput};
use crate::config::ShellProfile;
use crate::error::{BridgeError, Result};
use crate::safety::{normalize_path, GlobFilter};

fn map_io(path: &Path, e: std::io::Error) -> BridgeError {
    match e.kind() {
        ErrorKind::NotFound => BridgeError::NotFound(path.display().to_string()),
        ErrorKind::AlreadyExists => BridgeError::AlreadyExists(path.display().to_string()),
        _ => BridgeError::Io(e),
    }
}

/// The local disk through `tokio::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFs;

#[async_trait]
impl WorkspaceFs for LocalFs {
    async fn stat(&self, path: &Path) -> Result<FileStat> {
        let metadata = tokio::fs::metadata(path).await.map_err(|e| map_io(path, e))?;
        let file_type = if metadata.is_dir() {
            FileType::Directory
        } else {
            FileType::File
        };
        Ok(FileStat {
            file_type,
            size: metadata.len(),
        })
    }

    async fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        tokio::fs::read(path).await.map_err(|e| map_io(path, e))
    }

    async fn write_file(&self, path: &Path, content: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| map_io(parent, e))?;
        }
        tokio::fs::write(path, content)
            .await
            .map_err(|e| map_io(path, e))
    }

    async fn create_directory(&self, path: &Path) -> Result<()> {
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|e| map_io(path, e))
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        if tokio::fs::try_exists(to).await.unwrap_or(false) {
            return Err(BridgeError::AlreadyExists(to.display().to_string()));
        }
        if let Some(parent) = to.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| map_io(parent, e))?;
        }
        tokio::fs::rename(from, to)
            .await
            .map_err(|e| map_io(from, e))
    }

    async fn delete(&self, path: &Path, options: DeleteOptions) -> Result<()> {
        let stat = self.stat(path).await?;
        let result = match (stat.file_type, options.recursive) {
            (FileType::Directory, true) => tokio::fs::remove_dir_all(path).await,
            (FileType::Directory, false) => tokio::fs::remove_dir(path).await,
            (FileType::File, _) => tokio::fs::remove_file(path).await,
        };
        result.map_err(|e| map_io(path, e))
    }

    async fn find_files(&self, root: &Path, filter: &GlobFilter) -> Result<Vec<PathBuf>> {
        let root = root.to_path_buf();
        let filter = filter.clone();
        tokio::task::spawn_blocking(move || {
            let walker = ignore::WalkBuilder::new(&root)
                .standard_filters(false)
                .follow_links(false)
                .build();

            walker
                .flatten()
                .filter(|entry| entry.file_type().is_some_and(|t| t.is_file()))
                .filter_map(|entry| {
                    let relative = entry.path().strip_prefix(&root).ok()?;
                    let relative = normalize_path(&relative.to_string_lossy());
                    filter
                        .matches(&relative)
                        .then(|| entry.path().to_path_buf())
                })
                .collect()
        })
        .await
        .map_err(|e| BridgeError::Internal(format!("file walker panicked: {e}")))
    }
}

/// Stays in the map until `execute` returns, so a killed command that is
/// still winding down keeps its shell busy.
struct RunningEntry {
    command: String,
    /// Taken by the first `kill`.
    kill: Option<oneshot::Sender<()>>,
}

/// Terminal commands as child processes, one per shell at a time.
#[derive(Default)]
pub struct ProcessShellHost {
    running: Mutex<HashMap<String, RunningEntry>>,
}

impl ProcessShellHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn running_lock(&self) -> MutexGuard<'_, HashMap<String, RunningEntry>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn read_all<R: AsyncRead + Unpin>(reader: Option<R>) -> String {
    let mut buf = Vec::new();
    if let Some(mut reader) = reader {
        if let Err(e) = reader.read_to_end(&mut buf).await {
            tracing::warn!(error = %e, "failed to read terminal output");
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

#[async_trait]
impl ShellHost for ProcessShellHost {
    async fn execute(&self, profile: &ShellProfile, command: &str, cwd: &Path) -> Result<ShellOutput> {
        let terminal_err = |message: String| BridgeError::Terminal {
            shell: profile.name.clone(),
            message,
        };

        let (kill_tx, kill_rx) = oneshot::channel();
        {
            let mut running = self.running_lock();
            if running.contains_key(&profile.name) {
                return Err(terminal_err("a command is already running".into()));
            }
            running.insert(
                profile.name.clone(),
                RunningEntry {
                    command: command.to_string(),
                    kill: Some(kill_tx),
                },
            );
        }

        let spawned = Command::new(&profile.program)
            .args(&profile.args)
            .arg(command)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();
        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                self.running_lock().remove(&profile.name);
                return Err(terminal_err(format!("failed to start {}: {e}", profile.program)));
            }
        };

        let stdout = tokio::spawn(read_all(child.stdout.take()));
        let stderr = tokio::spawn(read_all(child.stderr.take()));

        let finished = tokio::select! {
            status = child.wait() => Some(status),
            _ = kill_rx => None,
        };
        let outcome = match finished {
            Some(status) => status.map(|s| (s.code(), false)),
            None => {
                if let Err(e) = child.start_kill() {
                    tracing::warn!(shell = %profile.name, error = %e, "failed to kill terminal process");
                }
                let _ = child.wait().await;
                Ok((None, true))
            }
        };
        self.running_lock().remove(&profile.name);
        let (exit_code, killed) = outcome?;

        Ok(ShellOutput {
            exit_code,
            stdout: stdout.await.unwrap_or_default(),
            stderr: stderr.await.unwrap_or_default(),
            killed,
        })
    }

    async fn kill(&self, shell: &str) -> Result<bool> {
        let sender = self
            .running_lock()
            .get_mut(shell)
            .and_then(|entry| entry.kill.take());
        match sender {
            // A failed send means the command finished on its own.
            Some(sender) => Ok(sender.send(()).is_ok()),
            None => Ok(false),
        }
    }

    fn running(&self) -> Vec<RunningShell> {
        let mut shells: Vec<RunningShell> = self
            .running_lock()
            .iter()
            .map(|(shell, entry)| RunningShell {
                shell: shell.clone(),
                command: entry.command.clone(),
            })
            .collect();
        shells.sort_by(|a, b| a.shell.cmp(&b.shell));
        shells
    }
}
