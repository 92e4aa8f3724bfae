use std::cmp::Ordering;
use std::path::{Path, PathBuf};

/// Normalize a path to POSIX separators.
///
/// Backslashes become `/`, repeated separators collapse and `.` segments
/// are dropped. `..` is kept so the safety check can reject it.
pub fn normalize_path(path: &str) -> String {
    let unified = path.replace('\\', "/");
    let absolute = unified.starts_with('/');
    let trailing = unified.len() > 1 && unified.ends_with('/');

    let segments: Vec<&str> = unified
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect();

    let mut out = String::with_capacity(unified.len());
    if absolute {
        out.push('/');
    }
    out.push_str(&segments.join("/"));
    if trailing && !segments.is_empty() {
        out.push('/');
    }
    out
}

/// Normalize an agent-supplied relative path and strip leading and
/// trailing separators.
pub fn to_relative(path: &str) -> String {
    normalize_path(path).trim_matches('/').to_string()
}

/// The single authoritative workspace folder.
///
/// Multi-root workspaces are not supported: only the first folder is used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceRoot {
    path: PathBuf,
    normalized: String,
}

impl WorkspaceRoot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let normalized = normalize_path(&path.to_string_lossy())
            .trim_end_matches('/')
            .to_string();
        Self { path, normalized }
    }

    /// Pick folder 0 of an open workspace.
    pub fn from_folders(folders: &[PathBuf]) -> Option<Self> {
        folders.first().map(|f| Self::new(f.clone()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The root as a normalized POSIX string, without trailing separator.
    pub fn as_normalized(&self) -> &str {
        &self.normalized
    }

    /// Join an agent-supplied relative path onto the root.
    pub fn resolve(&self, relative: &str) -> PathBuf {
        let relative = to_relative(relative);
        if relative.is_empty() {
            self.path.clone()
        } else {
            self.path.join(relative)
        }
    }

    /// Workspace-relative form of an absolute path, or `None` when the
    /// path lies outside the root.
    pub fn relative_of(&self, absolute: &Path) -> Option<String> {
        let normalized = normalize_path(&absolute.to_string_lossy());
        let normalized = normalized.trim_end_matches('/');
        if normalized == self.normalized {
            return Some(String::new());
        }
        normalized
            .strip_prefix(&self.normalized)
            .and_then(|rest| rest.strip_prefix('/'))
            .map(str::to_string)
    }

    /// Relative path for display, falling back to the absolute path.
    pub fn display_relative(&self, absolute: &Path) -> String {
        self.relative_of(absolute)
            .unwrap_or_else(|| normalize_path(&absolute.to_string_lossy()))
    }
}

fn contains_normalized(path: &str, base: &str) -> bool {
    let base = base.trim_end_matches('/');
    path == base || path.starts_with(&format!("{base}/"))
}

/// Whether `path` is `base` or lies underneath it. Case-insensitive, the
/// way editor URIs are compared when retargeting tabs after a rename.
pub fn is_same_or_descendant(path: &Path, base: &Path) -> bool {
    contains_normalized(
        &normalize_path(&path.to_string_lossy()).to_lowercase(),
        &normalize_path(&base.to_string_lossy()).to_lowercase(),
    )
}

/// Case-sensitive variant for deletes and closes: `A.txt` and `a.txt` may be
/// different files.
pub fn is_same_or_descendant_exact(path: &Path, base: &Path) -> bool {
    contains_normalized(
        &normalize_path(&path.to_string_lossy()),
        &normalize_path(&base.to_string_lossy()),
    )
}

/// Map `path` (equal to or below `old_base`) onto `new_base`.
pub fn retarget(path: &Path, old_base: &Path, new_base: &Path) -> PathBuf {
    let path_str = normalize_path(&path.to_string_lossy());
    let old_len = normalize_path(&old_base.to_string_lossy())
        .trim_end_matches('/')
        .len();
    let suffix = path_str.get(old_len..).unwrap_or_default();
    let segments: Vec<&str> = suffix.split('/').filter(|s| !s.is_empty()).collect();
    segments
        .iter()
        .fold(new_base.to_path_buf(), |acc, seg| acc.join(seg))
}

/// Ordering for workspace listings.
///
/// Compares segment by segment. At the first differing segment, a path that
/// ends there sorts before one that continues deeper; when both end (or both
/// continue) the segments compare lexicographically. A prefix path sorts
/// before its extensions.
pub fn compare_workspace_paths(a: &str, b: &str) -> Ordering {
    let a_parts: Vec<&str> = a.split('/').collect();
    let b_parts: Vec<&str> = b.split('/').collect();

    for (i, (a_seg, b_seg)) in a_parts.iter().zip(b_parts.iter()).enumerate() {
        if a_seg != b_seg {
            let a_ends = a_parts.len() == i + 1;
            let b_ends = b_parts.len() == i + 1;
            return match (a_ends, b_ends) {
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                _ => a_seg.cmp(b_seg),
            };
        }
    }
    a_parts.len().cmp(&b_parts.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn normalizes_windows_separators() {
        assert_eq!(normalize_path("C:\\work\\src\\main.rs"), "C:/work/src/main.rs");
        assert_eq!(normalize_path("/a//b/./c/"), "/a/b/c/");
        assert_eq!(normalize_path("./src/lib.rs"), "src/lib.rs");
        assert_eq!(normalize_path("a/../b"), "a/../b");
    }

    #[test]
    fn relative_strips_slashes() {
        assert_eq!(to_relative("/src/"), "src");
        assert_eq!(to_relative("\\docs\\a.md"), "docs/a.md");
    }

    #[test]
    fn root_resolves_and_relativizes() {
        let root = WorkspaceRoot::new("/work/project");
        assert_eq!(root.resolve("/src/lib.rs"), PathBuf::from("/work/project/src/lib.rs"));
        assert_eq!(
            root.relative_of(Path::new("/work/project/src/lib.rs")).as_deref(),
            Some("src/lib.rs")
        );
        assert_eq!(root.relative_of(Path::new("/work/project")).as_deref(), Some(""));
        assert_eq!(root.relative_of(Path::new("/work/projectile/a")), None);
        assert_eq!(root.relative_of(Path::new("/etc/passwd")), None);
    }

    #[test]
    fn first_folder_is_authoritative() {
        let folders = vec![PathBuf::from("/one"), PathBuf::from("/two")];
        let root = WorkspaceRoot::from_folders(&folders).unwrap();
        assert_eq!(root.path(), Path::new("/one"));
        assert!(WorkspaceRoot::from_folders(&[]).is_none());
    }

    #[test]
    fn descendant_matching_ignores_case() {
        let base = Path::new("/w/Src");
        assert!(is_same_or_descendant(Path::new("/w/src"), base));
        assert!(is_same_or_descendant(Path::new("/w/src/a.rs"), base));
        assert!(!is_same_or_descendant(Path::new("/w/src2/a.rs"), base));
        assert!(is_same_or_descendant(Path::new("/w/SRC/a.rs"), base));
    }

    #[test]
    fn exact_containment_respects_case() {
        let base = Path::new("/w/A.txt");
        assert!(is_same_or_descendant_exact(Path::new("/w/A.txt"), base));
        assert!(!is_same_or_descendant_exact(Path::new("/w/a.txt"), base));
        assert!(is_same_or_descendant_exact(Path::new("/w/dir/x.rs"), Path::new("/w/dir/")));
        assert!(!is_same_or_descendant_exact(Path::new("/w/dir2/x.rs"), Path::new("/w/dir")));
    }

    #[test]
    fn retargets_descendants() {
        assert_eq!(
            retarget(Path::new("/w/old/a/b.rs"), Path::new("/w/old"), Path::new("/w/new")),
            PathBuf::from("/w/new/a/b.rs")
        );
        assert_eq!(
            retarget(Path::new("/w/old.txt"), Path::new("/w/old.txt"), Path::new("/w/new.txt")),
            PathBuf::from("/w/new.txt")
        );
    }

    #[test]
    fn workspace_listing_order() {
        let mut paths = vec!["a/b/c", "b.txt", "a/b", "a/a.txt", "c/d", "a.txt"];
        paths.sort_by(|a, b| compare_workspace_paths(a, b));
        assert_eq!(paths, vec!["a.txt", "b.txt", "a/a.txt", "a/b", "a/b/c", "c/d"]);
    }

    #[test]
    fn prefix_sorts_first() {
        assert_eq!(compare_workspace_paths("a/b", "a/b/c"), Ordering::Less);
        assert_eq!(compare_workspace_paths("a/b/c", "a/b"), Ordering::Greater);
        assert_eq!(compare_workspace_paths("x/a", "x/b"), Ordering::Less);
    }
}
