//! Publication text on disk.

use std::path::{Path, PathBuf};

use tracing::debug;

use pubcompare_shared::{DocumentSource, PubCompareError, Result};

/// Reads UTF-8 publications from the filesystem, truncated to `max_chars`.
#[derive(Debug, Clone)]
pub struct FsDocumentSource {
    max_chars: usize,
}

impl FsDocumentSource {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }
}

impl DocumentSource for FsDocumentSource {
    fn read(&self, path: &Path) -> Result<String> {
        let text = std::fs::read_to_string(path).map_err(|e| PubCompareError::io(path, e))?;
        let total = text.chars().count();
        if total > self.max_chars {
            debug!(path = %path.display(), total, max = self.max_chars, "truncating publication");
        }
        Ok(truncate_chars(&text, self.max_chars))
    }
}

/// First `max_chars` characters of `text`, never splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// File names of the `.txt` publications in `dir`, sorted.
pub fn list_publications(dir: &Path) -> Result<Vec<String>> {
    let entries = std::fs::read_dir(dir).map_err(|e| PubCompareError::io(dir, e))?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| PubCompareError::io(dir, e))?;
        let path = entry.path();
        let is_txt = path.extension().is_some_and(|ext| ext == "txt");
        if is_txt && path.is_file() {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

/// Resolve a selected publication name against the publications directory.
pub fn publication_path(dir: &Path, name: &str) -> PathBuf {
    let candidate = Path::new(name);
    if candidate.is_absolute() || candidate.components().count() > 1 {
        candidate.to_path_buf()
    } else {
        dir.join(name)
    }
}
