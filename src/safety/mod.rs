//! Path safety: decides which paths the agent may touch.
//!
//! Nothing here is cached. Every call compiles the include/exclude globs
//! from the configuration it is handed, so a settings change applies to the
//! next check.

pub mod binary;
pub mod path;

use std::path::Path;

use glob::{MatchOptions, Pattern};

use crate::config::WorkspaceConfig;
use crate::error::{BridgeError, Result};

pub use binary::is_binary;
pub use path::{normalize_path, to_relative, WorkspaceRoot};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Compiled include/exclude glob pair, matched against workspace-relative
/// POSIX paths.
#[derive(Debug, Clone)]
pub struct GlobFilter {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl GlobFilter {
    /// Compile the glob lists. An empty include list means `**`.
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self> {
        let include = if include.iter().all(|p| p.trim().is_empty()) {
            vec![compile("**")?]
        } else {
            compile_all(include)?
        };
        Ok(Self {
            include,
            exclude: compile_all(exclude)?,
        })
    }

    pub fn from_config(config: &WorkspaceConfig) -> Result<Self> {
        Self::new(&config.include, &config.exclude)
    }

    /// Exclude wins over include.
    pub fn matches(&self, relative: &str) -> bool {
        self.include
            .iter()
            .any(|p| p.matches_with(relative, MATCH_OPTIONS))
            && !self
                .exclude
                .iter()
                .any(|p| p.matches_with(relative, MATCH_OPTIONS))
    }
}

fn compile(pattern: &str) -> Result<Pattern> {
    Pattern::new(pattern.trim()).map_err(|e| BridgeError::Glob {
        pattern: pattern.to_string(),
        message: e.msg.to_string(),
    })
}

fn compile_all(patterns: &[String]) -> Result<Vec<Pattern>> {
    patterns
        .iter()
        .filter(|p| !p.trim().is_empty())
        .map(|p| compile(p))
        .collect()
}

/// Whether the agent may access `path`.
///
/// `check_patterns = false` skips the glob test, for listings that were
/// already produced through the same globs.
pub fn is_path_neuro_safe(
    root: Option<&WorkspaceRoot>,
    config: &WorkspaceConfig,
    path: &Path,
    check_patterns: bool,
) -> bool {
    if config.allow_unsafe_paths {
        return true;
    }

    let Some(root) = root else {
        return false;
    };
    let Some(relative) = root.relative_of(path) else {
        return false;
    };
    if relative.is_empty() {
        return false;
    }

    let unsafe_segment = relative
        .split('/')
        .any(|seg| seg == ".." || seg.starts_with('.') || seg.starts_with('~'));
    if unsafe_segment {
        return false;
    }

    if !check_patterns {
        return true;
    }

    match GlobFilter::from_config(config) {
        Ok(filter) => filter.matches(&relative),
        Err(e) => {
            tracing::warn!(error = %e, "invalid workspace glob, denying access");
            false
        }
    }
}
