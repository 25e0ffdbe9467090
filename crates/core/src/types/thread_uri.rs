use std::fmt;

use crate::error::CoreError;

const MAX_URI_LEN: usize = 256;

/// Path of the page a thread is attached to, e.g. `/posts/hello/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ThreadUri(String);

impl ThreadUri {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl TryFrom<&str> for ThreadUri {
    type Error = CoreError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(CoreError::InvalidUri("empty uri".to_string()));
        }
        if trimmed.len() > MAX_URI_LEN || !trimmed.starts_with('/') {
            return Err(CoreError::InvalidUri(trimmed.to_string()));
        }
        if trimmed.chars().any(|ch| ch.is_whitespace() || ch.is_control()) {
            return Err(CoreError::InvalidUri(trimmed.to_string()));
        }
        Ok(ThreadUri(trimmed.to_string()))
    }
}

impl fmt::Display for ThreadUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
