//! Extension filter used by `list-by-extension`, `copy` and
//! `delete-by-extension`.

use std::fmt;

use crate::error::PreflightError;

/// A file extension (including the leading dot) taken from the configured
/// allow-set. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extension(String);

impl Extension {
    /// Accepts `raw` only if it is one of the `allowed` extensions.
    ///
    /// # Examples
    ///
    /// ```
    /// use treewalk::extension::Extension;
    ///
    /// let allowed = vec![".txt".to_string(), ".c".to_string()];
    /// assert!(Extension::parse(".txt", &allowed).is_ok());
    /// assert!(Extension::parse(".exe", &allowed).is_err());
    /// ```
    pub fn parse(raw: &str, allowed: &[String]) -> Result<Self, PreflightError> {
        if raw.is_empty() || !allowed.iter().any(|ext| ext == raw) {
            return Err(PreflightError::InvalidExtension(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Returns true when `name` ends in `ext`.
///
/// With no extension configured every name matches. Otherwise the part of
/// `name` starting at its last `.` must equal `ext` exactly (case-sensitive),
/// and a name without any dot never matches.
pub fn has_extension(name: &str, ext: Option<&str>) -> bool {
    let Some(ext) = ext else {
        return true;
    };
    name.rfind('.').is_some_and(|dot| &name[dot..] == ext)
}
