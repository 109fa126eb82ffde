//! Item body texts, one plain-text file per book.
//!
//! Texts live in a directory as `<item_id>.text`. A missing file is not an
//! error: the item simply has no text and the row is filtered out later.

use crate::error::{DataLoadError, Result};
use crate::types::ItemId;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::warn;

const TEXT_EXTENSION: &str = "text";

/// Directory of item texts keyed by item id
#[derive(Debug, Clone)]
pub struct ItemTexts {
    dir: PathBuf,
}

impl ItemTexts {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, item_id: ItemId) -> PathBuf {
        self.dir.join(format!("{}.{}", item_id, TEXT_EXTENSION))
    }

    /// Read an item's text; an absent file yields an empty string
    pub fn read(&self, item_id: ItemId) -> Result<String> {
        match fs::read(self.path_for(item_id)) {
            Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn write(&self, item_id: ItemId, text: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.path_for(item_id), text)?;
        Ok(())
    }

    /// Read every text in the directory, sorted by item id.
    ///
    /// Files whose stem is not an item id are skipped with a warning. The
    /// directory itself must exist.
    pub fn read_all(&self) -> Result<Vec<(ItemId, String)>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| match e.kind() {
            ErrorKind::NotFound => DataLoadError::FileNotFound {
                path: self.dir.display().to_string(),
            },
            _ => DataLoadError::IoError(e),
        })?;

        let mut texts = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let stem = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.split('.').next())
                .unwrap_or_default();
            match stem.parse::<ItemId>() {
                Ok(item_id) => {
                    let text = String::from_utf8_lossy(&fs::read(&path)?).into_owned();
                    texts.push((item_id, text));
                }
                Err(_) => warn!("Skipping non-item file in texts directory: {:?}", path),
            }
        }

        texts.sort_by_key(|(item_id, _)| *item_id);
        Ok(texts)
    }
}
