//! Lazily resolved CSRF crumb.
//!
//! # Design
//! The crumb comes from an optional file. It is read at most once per
//! provider: the first successful resolution is stored in a `OnceCell` and
//! never refreshed. Concurrent first callers block on the cell instead of
//! racing to read the file. A failed read stores nothing, so the next call
//! tries again.

use std::io;
use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing::debug;

use crate::error::{ConfigurationError, Result, SecurityError};

/// Name of the request header that carries the crumb.
pub const CRUMB_HEADER: &str = ".crumb";

#[derive(Debug, Default)]
pub struct CrumbProvider {
    source: Option<PathBuf>,
    value: OnceCell<Option<String>>,
}

impl CrumbProvider {
    /// An empty path disables the crumb: no file is read and no header sent.
    pub fn new(source: impl Into<PathBuf>) -> Self {
        let source = source.into();
        Self {
            source: (!source.as_os_str().is_empty()).then_some(source),
            value: OnceCell::new(),
        }
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Read the crumb file unless a value is already cached.
    pub fn resolve_if_needed(&self) -> Result<()> {
        self.value.get_or_try_init(|| match &self.source {
            Some(path) => read_crumb(path).map(Some),
            None => Ok(None),
        })?;
        Ok(())
    }

    /// True once a value, possibly empty, has been cached.
    pub fn has_crumb(&self) -> bool {
        self.value().is_some()
    }

    pub fn value(&self) -> Option<&str> {
        self.value.get().and_then(|v| v.as_deref())
    }
}

fn read_crumb(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => SecurityError::from(ConfigurationError::CrumbFileNotFound {
            path: path.to_path_buf(),
        }),
        _ => SecurityError::CrumbUnreadable {
            path: path.to_path_buf(),
            source: e,
        },
    })?;
    // Whatever was read is cached; invalid UTF-8 becomes U+FFFD.
    let mut value = match String::from_utf8(bytes) {
        Ok(value) => value,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    };
    if value.ends_with('\n') {
        value.pop();
    }
    debug!(path = %path.display(), "crumb resolved");
    Ok(value)
}
