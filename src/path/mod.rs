//! UTF-8 path handling for model locations.
//!
//! Model directories travel through logs and error messages, so they are
//! kept as camino `Utf8PathBuf`s from the moment they are read.

pub use camino::{Utf8Path, Utf8PathBuf};

use std::fmt;

/// Errors that can occur while turning raw paths into UTF-8 paths.
#[derive(Debug, Clone, PartialEq)]
pub enum PathError {
    /// Path contains non-UTF-8 characters.
    NonUtf8 { path: std::path::PathBuf },
    /// The working directory needed to resolve a relative path is unavailable.
    NoCurrentDir { reason: String },
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathError::NonUtf8 { path } => {
                write!(f, "Path is not valid UTF-8: {}", path.display())
            }
            PathError::NoCurrentDir { reason } => {
                write!(f, "Cannot resolve relative path: {}", reason)
            }
        }
    }
}

impl std::error::Error for PathError {}

pub fn from_std_path(path: &std::path::Path) -> Result<Utf8PathBuf, PathError> {
    Utf8PathBuf::from_path_buf(path.to_path_buf()).map_err(|_| PathError::NonUtf8 {
        path: path.to_path_buf(),
    })
}

/// Absolute paths pass through; relative ones are joined onto `base`.
pub fn resolve_under(base: &Utf8Path, raw: &str) -> Utf8PathBuf {
    let path = Utf8Path::new(raw);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Resolve `raw` against the process working directory.
pub fn resolve_from_cwd(raw: &str) -> Result<Utf8PathBuf, PathError> {
    let cwd = std::env::current_dir().map_err(|e| PathError::NoCurrentDir {
        reason: e.to_string(),
    })?;
    let cwd = from_std_path(&cwd)?;
    Ok(resolve_under(&cwd, raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("/models/ce", "/models/ce"; "absolute passes through")]
    #[test_case("models/ce", "/srv/app/models/ce"; "relative joins base")]
    #[test_case("./models", "/srv/app/./models"; "dot prefix kept")]
    fn test_resolve_under(raw: &str, expected: &str) {
        let base = Utf8PathBuf::from("/srv/app");
        assert_eq!(resolve_under(&base, raw).as_str(), expected);
    }

    #[test]
    fn resolve_from_cwd_is_absolute() {
        let resolved = resolve_from_cwd("models").unwrap();
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("models"));
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_is_rejected() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let raw = std::path::Path::new(OsStr::from_bytes(b"/tmp/\xff"));
        let err = from_std_path(raw).unwrap_err();
        assert!(err.to_string().contains("not valid UTF-8"));
    }
}
