//! Path and URL helpers shared by backends and the tree engine.

use std::env;
use std::path::{Component, PathBuf};

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::BackendError;

lazy_static! {
    static ref SCHEME: Regex = Regex::new(r"^([A-Za-z][A-Za-z0-9+.\-]*)://").unwrap();
    static ref ENV_VAR: Regex = Regex::new(r"\$(?:\{([A-Za-z_][A-Za-z0-9_]*)\}|([A-Za-z_][A-Za-z0-9_]*))").unwrap();
}

/// Join a backend path and a single child segment with `/`.
pub fn join(base: &str, segment: &str) -> String {
    if base.is_empty() {
        return segment.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        segment.trim_start_matches('/')
    )
}

/// Last `/`-separated component of a backend path.
pub fn basename(path: &str) -> &str {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
}

/// URL scheme of `location`, if it carries one (`http`, `webhdfs`, ...).
pub fn scheme_of(location: &str) -> Option<&str> {
    SCHEME
        .captures(location)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Expand `$VAR` and `${VAR}` references. Unset variables are left as written.
fn expand_vars(input: &str) -> String {
    ENV_VAR
        .replace_all(input, |caps: &Captures| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            env::var(name).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
}

/// Normalize a local location into an absolute path.
///
/// Strips a `file://` prefix, expands environment variables, anchors relative
/// paths at the current directory and folds `.` / `..` components lexically.
pub fn resolve_local_path(location: &str) -> Result<PathBuf, BackendError> {
    let stripped = location.strip_prefix("file://").unwrap_or(location);
    let expanded = PathBuf::from(expand_vars(stripped));

    let absolute = if expanded.is_absolute() {
        expanded
    } else {
        let cwd = env::current_dir().map_err(|error| BackendError::io(".", error))?;
        cwd.join(expanded)
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(BackendError::InvalidPath {
            message: format!("cannot resolve local location '{}'", location),
        });
    }
    Ok(normalized)
}

/// Same as [`resolve_local_path`], rendered as a `file://` URL.
pub fn resolve_file_url(location: &str) -> Result<String, BackendError> {
    Ok(format!("file://{}", resolve_local_path(location)?.display()))
}
