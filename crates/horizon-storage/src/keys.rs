//! Storage keys for the flat upload root.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::{Component, Path};

use crate::traits::StorageError;

const MAX_FILENAME_LENGTH: usize = 255;
const FORBIDDEN_CHARS: &[char] = &['/', '\\', ':', '\0'];

/// A filename guaranteed to be a single normal path component.
///
/// Construction is the only place names are checked; everything downstream
/// joins a `FileName` onto the upload root without further parsing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileName(String);

impl FileName {
    pub fn parse(name: &str) -> Result<Self, StorageError> {
        if name.is_empty() {
            return Err(StorageError::InvalidKey("empty file name".to_string()));
        }
        if name.len() > MAX_FILENAME_LENGTH {
            return Err(StorageError::InvalidKey(format!(
                "file name longer than {} bytes",
                MAX_FILENAME_LENGTH
            )));
        }
        if name.contains("..") || name.contains(FORBIDDEN_CHARS) {
            return Err(StorageError::InvalidKey(format!(
                "file name contains invalid characters: {}",
                name
            )));
        }

        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(FileName(name.to_string())),
            _ => Err(StorageError::InvalidKey(format!(
                "file name is not a single path component: {}",
                name
            ))),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl Display for FileName {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

impl AsRef<Path> for FileName {
    fn as_ref(&self) -> &Path {
        Path::new(&self.0)
    }
}
