use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::Result;
use crate::safety::GlobFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    File,
    Directory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub file_type: FileType,
    pub size: u64,
}

impl FileStat {
    pub fn is_dir(&self) -> bool {
        self.file_type == FileType::Directory
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteOptions {
    pub recursive: bool,
    pub use_trash: bool,
}

/// The host's virtual file system.
///
/// Every mutation made on the agent's behalf goes through this trait so
/// local, remote and in-memory workspaces behave the same.
#[async_trait]
pub trait WorkspaceFs: Send + Sync {
    async fn stat(&self, path: &Path) -> Result<FileStat>;

    async fn read_file(&self, path: &Path) -> Result<Vec<u8>>;

    async fn write_file(&self, path: &Path, content: &[u8]) -> Result<()>;

    async fn create_directory(&self, path: &Path) -> Result<()>;

    /// Fails if `to` already exists.
    async fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    async fn delete(&self, path: &Path, options: DeleteOptions) -> Result<()>;

    /// Absolute paths of all files under `root` whose root-relative path
    /// passes `filter`.
    async fn find_files(&self, root: &Path, filter: &GlobFilter) -> Result<Vec<PathBuf>>;

    /// Whether deletes can go to the OS trash instead of being permanent.
    fn supports_trash(&self) -> bool {
        false
    }
}

/// Existence check: any stat error counts as "does not exist".
pub async fn path_exists(fs: &dyn WorkspaceFs, path: &Path) -> bool {
    fs.stat(path).await.is_ok()
}
