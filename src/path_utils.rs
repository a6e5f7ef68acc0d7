//! Path utilities for chapter storage naming and lossy path display.
//!
//! Chapter directories are derived from chapter titles. Only `/`, `\` and `:` are
//! replaced; everything else in the title is kept as-is so directories stay readable.

use std::path::{Path, PathBuf};

use crate::types::DirectoryNaming;

/// Converts a path to a string with fallback to lossy conversion.
pub fn path_to_string_lossy(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

/// Gets the file name from a path with fallback to lossy conversion.
///
/// # Returns
///
/// * `String` - The file name, or `"unknown"` when the path has none
pub fn get_file_name_lossy(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Checks if a filename starts with a dot (hidden file).
pub fn is_hidden_file(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}

/// Sanitizes a chapter title for use as a directory name by replacing
/// path separators and colons with `-`.
///
/// # Arguments
///
/// * `title` - The chapter title as scraped
///
/// # Returns
///
/// * `String` - The sanitized title
pub fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '-',
            c => c,
        })
        .collect()
}

/// Derives the storage directory name for a chapter.
///
/// # Arguments
///
/// * `title` - The chapter title
/// * `position` - 1-based position of the chapter in the batch
/// * `naming` - The naming scheme to apply
pub fn chapter_directory_name(title: &str, position: usize, naming: DirectoryNaming) -> String {
    let sanitized = sanitize_title(title);
    match naming {
        DirectoryNaming::SanitizedTitle => sanitized,
        DirectoryNaming::IndexedTitle => format!("{:04} - {}", position, sanitized),
    }
}

/// Checks that `dir` names an entry directly inside `root`.
///
/// Fails for paths that collapse onto `root` or leave it, such as those built from an
/// empty title, `.` or `..`.
pub fn is_direct_child(dir: &Path, root: &Path) -> bool {
    let named = dir
        .file_name()
        .is_some_and(|name| name != "." && name != "..");
    named && dir.parent().is_some_and(|parent| parent == root)
}

/// Returns `<dir>.<extension>`, the sibling output path of a chapter directory.
pub fn sibling_with_extension(dir: &Path, extension: &str) -> PathBuf {
    let mut name = dir.as_os_str().to_os_string();
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_get_file_name_lossy() {
        let path = Path::new("downloads/Chapter 1/001.jpg");
        assert_eq!(get_file_name_lossy(path), "001.jpg");
        assert_eq!(get_file_name_lossy(Path::new("/")), "unknown");
    }

    #[test]
    fn test_is_hidden_file() {
        assert!(is_hidden_file(Path::new(".DS_Store")));
        assert!(!is_hidden_file(Path::new("001.png")));
    }

    #[test]
    fn test_sanitize_title() {
        assert_eq!(sanitize_title("Vol.1 Ch.2: Start"), "Vol.1 Ch.2- Start");
        assert_eq!(sanitize_title("a/b\\c"), "a-b-c");
        assert_eq!(sanitize_title("What? <Really>"), "What? <Really>");
    }

    #[test]
    fn test_sanitized_titles_can_collide() {
        assert_eq!(sanitize_title("Ch 1: A"), sanitize_title("Ch 1/ A"));
        assert_ne!(
            chapter_directory_name("Ch 1: A", 1, DirectoryNaming::IndexedTitle),
            chapter_directory_name("Ch 1/ A", 2, DirectoryNaming::IndexedTitle)
        );
    }

    #[test]
    fn test_chapter_directory_name() {
        assert_eq!(
            chapter_directory_name("Chapter 3", 3, DirectoryNaming::SanitizedTitle),
            "Chapter 3"
        );
        assert_eq!(
            chapter_directory_name("Chapter 3", 3, DirectoryNaming::IndexedTitle),
            "0003 - Chapter 3"
        );
    }

    #[test]
    fn test_is_direct_child() {
        let root = Path::new("downloads");
        assert!(is_direct_child(&root.join("Chapter 1"), root));
        assert!(is_direct_child(&root.join("-"), root));
        assert!(!is_direct_child(&root.join(""), root));
        assert!(!is_direct_child(&root.join("."), root));
        assert!(!is_direct_child(&root.join(".."), root));
        assert!(!is_direct_child(&root.join("a").join("b"), root));
        assert!(!is_direct_child(Path::new("elsewhere/Chapter 1"), root));
    }

    #[test]
    fn test_sibling_with_extension() {
        let dir = Path::new("downloads/Chapter 1.5");
        assert_eq!(
            sibling_with_extension(dir, "cbz"),
            PathBuf::from("downloads/Chapter 1.5.cbz")
        );
    }
}
