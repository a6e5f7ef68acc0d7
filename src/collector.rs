//! Page collection for finished chapter directories.
//!
//! A finished chapter directory holds `001.<ext>`, `002.<ext>`, ... Because the names are
//! fixed-width, plain lexicographic order is page order.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tokio::fs::read_dir;

use crate::error::{Error, Result};
use crate::path_utils::{get_file_name_lossy, is_hidden_file};

/// Returns true if `path` has one of `extensions` (case-insensitive).
pub fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .is_some_and(|e| extensions.contains(&e.as_str()))
}

/// Lists the files directly inside `dir` whose extension is in `extensions`, sorted by name.
///
/// Hidden files and subdirectories are ignored.
///
/// # Returns
///
/// * `Ok(Vec<PathBuf>)` - Matching files, possibly empty
/// * `Err(Error::NotFound)` - `dir` does not exist or is not a directory
pub async fn list_pages(dir: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(Error::NotFound(format!("Chapter directory {:?}", dir)));
    }

    let mut entries = read_dir(dir).await?;
    let mut pages = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !entry.file_type().await?.is_file() || is_hidden_file(&path) {
            continue;
        }
        if has_extension(&path, extensions) {
            pages.push(path);
        }
    }

    pages.par_sort_by_key(|p| get_file_name_lossy(p));
    Ok(pages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ACCEPTED_EXTENSIONS, DOCUMENT_EXTENSIONS};

    #[test]
    fn test_has_extension() {
        assert!(has_extension(Path::new("001.JPG"), ACCEPTED_EXTENSIONS));
        assert!(has_extension(Path::new("002.webp"), ACCEPTED_EXTENSIONS));
        assert!(!has_extension(Path::new("002.webp"), DOCUMENT_EXTENSIONS));
        assert!(!has_extension(Path::new("debug_page.html"), ACCEPTED_EXTENSIONS));
        assert!(!has_extension(Path::new("README"), ACCEPTED_EXTENSIONS));
    }

    #[tokio::test]
    async fn test_list_pages_missing_dir() {
        let result = list_pages(Path::new("tests/tmp/definitely-missing"), ACCEPTED_EXTENSIONS).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}
