//! Loading ignore rules for a share root

use crate::error::ApiError;
use crate::filter::matcher::Matcher;
use crate::tree::path::normalize_path_string;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

/// Name of the ignore file read from the share root.
pub const IGNORE_FILE: &str = ".gitignore";

/// Read `<root>/.gitignore` (missing is fine) and compile it together with
/// any extra patterns from configuration. Extra patterns come first, so the
/// ignore file can still negate them.
pub fn load_matcher(root: &Path, extra_patterns: &[String]) -> Result<Matcher, ApiError> {
    let text = read_ignore_file(root)?;
    let mut combined = String::new();
    for pattern in extra_patterns {
        combined.push_str(pattern);
        combined.push('\n');
    }
    combined.push_str(&text);

    let matcher = Matcher::compile(&combined);
    debug!(root = %root.display(), patterns = matcher.len(), "Loaded ignore rules");
    Ok(matcher)
}

/// Contents of the root ignore file, or an empty string when there is none.
pub fn read_ignore_file(root: &Path) -> Result<String, ApiError> {
    let path = root.join(IGNORE_FILE);
    match fs::read_to_string(&path) {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(ApiError::ConfigError(format!(
            "Failed to read {}: {}",
            path.display(),
            e
        ))),
    }
}

/// True when `path` is the root ignore file itself.
pub fn is_ignore_file(root: &Path, path: &Path) -> bool {
    path.parent() == Some(root) && path.file_name().map_or(false, |n| n == IGNORE_FILE)
}

/// Express `path` relative to the directory holding the ignore file, with
/// `/` separators, ready for [`Matcher::is_ignored`].
pub fn relative_to_ignore_dir(ignore_dir: &str, path: &str) -> String {
    let dir = normalize_path_string(ignore_dir);
    let normalized = normalize_path_string(path);
    if dir.is_empty() {
        return normalized;
    }
    match normalized.strip_prefix(&dir) {
        Some("") => String::new(),
        Some(rest) if rest.starts_with('/') => rest.trim_start_matches('/').to_string(),
        _ => normalized,
    }
}
