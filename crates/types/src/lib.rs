//! Validated domain types shared across the chunkd workspace.
//!
//! Uploads are keyed by a client-declared *logical file name*. That name is
//! interpolated into filesystem paths (`<chunk>_<name>`, the final artifact,
//! the merge staging file), so it must never be able to escape the upload
//! directory or collide with internal naming. [`FileName`] guarantees this
//! once constructed.

/// Errors that can occur when creating a validated file name.
#[derive(Debug, thiserror::Error)]
pub enum FileNameError {
    /// The input was empty or contained only whitespace
    #[error("file name cannot be empty")]
    Empty,
    /// The input contained a path separator or NUL byte
    #[error("file name contains forbidden character: {0:?}")]
    ForbiddenCharacter(char),
    /// The input started with a dot (reserved for staging files) or was a
    /// relative path component
    #[error("file name cannot start with a dot")]
    LeadingDot,
}

/// A logical upload file name, safe to join onto the upload directory.
///
/// The input is trimmed of leading and trailing whitespace during
/// construction. Guarantees once constructed:
///
/// - at least one non-whitespace character,
/// - no `/`, `\` or NUL,
/// - does not start with `.` (merge staging files are dotted siblings of the
///   final artifact, and `.`/`..` must never reach a path join).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileName(String);

impl FileName {
    /// Creates a new `FileName` from the given input.
    ///
    /// # Errors
    ///
    /// Returns [`FileNameError`] if the trimmed input is empty, contains a
    /// path separator or NUL, or starts with a dot.
    pub fn new(input: impl AsRef<str>) -> Result<Self, FileNameError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(FileNameError::Empty);
        }
        if let Some(bad) = trimmed.chars().find(|c| matches!(c, '/' | '\\' | '\0')) {
            return Err(FileNameError::ForbiddenCharacter(bad));
        }
        if trimmed.starts_with('.') {
            return Err(FileNameError::LeadingDot);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the inner name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FileName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for FileName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for FileName {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for FileName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = <String as serde::Deserialize>::deserialize(deserializer)?;
        FileName::new(&s).map_err(serde::de::Error::custom)
    }
}
