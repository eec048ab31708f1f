//! Path ignore rules
//!
//! A path is ignored when its full string matches one of the user-supplied
//! regular expressions, or when its base filename is hidden (`.` prefix) or
//! an editor lock/auto-save file (`#` prefix).

use regex::Regex;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Marker editors put in the names of their temporary files
const TEMP_FILE_MARKER: char = '#';

/// Compiled ignore rules, immutable after construction
///
/// Cloning is cheap and the rules can be evaluated from any thread.
#[derive(Debug, Clone, Default)]
pub struct IgnoreMatcher {
    /// Compiled user patterns
    patterns: Arc<Vec<Regex>>,
}

impl IgnoreMatcher {
    /// Create a matcher with only the built-in rules
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile a set of patterns
    ///
    /// Empty entries are skipped. A pattern that fails to compile is dropped
    /// with a warning; the others are still used.
    pub fn from_patterns<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let compiled = patterns
            .into_iter()
            .filter_map(|p| {
                let p = p.as_ref().trim();
                if p.is_empty() {
                    return None;
                }
                match Regex::new(p) {
                    Ok(re) => Some(re),
                    Err(e) => {
                        warn!("Can not compile ignore pattern {p:?}, dropping it: {e}");
                        None
                    }
                }
            })
            .collect::<Vec<_>>();

        debug!("Compiled {} ignore pattern(s)", compiled.len());
        Self {
            patterns: Arc::new(compiled),
        }
    }

    /// Compile a comma-separated pattern list such as `\.log$,node_modules`
    pub fn from_list(list: &str) -> Self {
        Self::from_patterns(list.split(','))
    }

    /// Number of patterns that compiled
    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    /// Check if a path should be ignored
    pub fn should_ignore(&self, path: &Path) -> bool {
        let path_str = path.to_string_lossy();
        if self.patterns.iter().any(|p| p.is_match(&path_str)) {
            trace!("Path {:?} matches ignore pattern", path);
            return true;
        }

        match base_name(path) {
            Some(name) if name.len() > 1 && (name.starts_with('.') || name.starts_with('#')) => {
                trace!("Ignoring hidden or lock file: {:?}", path);
                true
            }
            _ => false,
        }
    }

    /// Check if the base filename carries the editor temp-file marker anywhere
    pub fn is_temp_file(path: &Path) -> bool {
        base_name(path).is_some_and(|name| name.contains(TEMP_FILE_MARKER))
    }
}

fn base_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}
