//! Directory-backed asset storage.

use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::PathBuf;

use crate::hal::{AssetError, AssetStore};

/// Serves files from a single flat directory, like a SPIFFS partition.
#[derive(Debug, Clone)]
pub struct DirectoryAssets {
    root: PathBuf,
}

impl DirectoryAssets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }
}

/// Names are plain file names: no separators, no parent references.
fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

impl AssetStore for DirectoryAssets {
    fn open(&self, name: &str) -> Result<Box<dyn BufRead + Send>, AssetError> {
        if !is_plain_name(name) {
            return Err(AssetError::NotFound(name.to_string()));
        }
        let file = File::open(self.root.join(name)).map_err(|source| match source.kind() {
            ErrorKind::NotFound => AssetError::NotFound(name.to_string()),
            _ => AssetError::Io {
                name: name.to_string(),
                source,
            },
        })?;
        Ok(Box::new(BufReader::new(file)))
    }
}
