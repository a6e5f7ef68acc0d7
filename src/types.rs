//! Core data types, enums, and reports for the Yomikomi pipeline.
//!
//! This module defines the fundamental data structures used throughout Yomikomi:
//! - The chapter and image model (`Chapter`, `ImageTask`, `ImageResult`, `ChapterOutcome`)
//! - Packaging outputs (`ArchiveFormat`, `ArchiveOutcome`)
//! - Enumerations for run settings (`FetchMode`, `ConvertMode`, `DirectoryNaming`)
//! - Orchestrator state and reporting (`PipelineStage`, `ChapterReport`, `BatchReport`)

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Error, Result};

/// Extensions a downloaded page may be stored under, and that the archive converter packs.
pub const ACCEPTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif"];
/// Extensions the PDF document converter can embed as pages.
pub const DOCUMENT_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];
/// Extension used when a page URL carries no recognised extension.
pub const DEFAULT_EXTENSION: &str = "jpg";

/// One unit of content: a title and the URL of the page that lists its images.
///
/// Chapters are identified by URL; indexers deduplicate on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Chapter {
    pub title: String,
    pub url: String,
}

impl Chapter {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
        }
    }
}

/// A single image to fetch. `index` is the position in the site-declared order
/// and is the only key used to order the final pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageTask {
    pub index: usize,
    pub source_url: String,
}

/// The outcome of exactly one [`ImageTask`].
///
/// `storage_path` is only set when `accepted` is true.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageResult {
    pub index: usize,
    pub storage_path: Option<PathBuf>,
    pub accepted: bool,
}

impl ImageResult {
    pub fn accepted(index: usize, storage_path: PathBuf) -> Self {
        Self {
            index,
            storage_path: Some(storage_path),
            accepted: true,
        }
    }

    pub fn rejected(index: usize) -> Self {
        Self {
            index,
            storage_path: None,
            accepted: false,
        }
    }
}

/// Result of assembling one chapter into its directory.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChapterOutcome {
    pub directory: PathBuf,
    pub success: bool,
    pub accepted_count: usize,
}

impl ChapterOutcome {
    /// Builds an outcome whose `success` flag follows `accepted_count > 0`.
    pub fn new(directory: PathBuf, accepted_count: usize) -> Self {
        Self {
            directory,
            success: accepted_count > 0,
            accepted_count,
        }
    }

    pub fn failed(directory: PathBuf) -> Self {
        Self::new(directory, 0)
    }
}

/// Output packaging of a finished chapter.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ArchiveFormat {
    /// Comic book ZIP (`.cbz`)
    Archive,
    /// Paginated PDF document (`.pdf`), one image per page
    Document,
    /// EPUB 3 ebook (`.epub`), one XHTML page per image
    Ebook,
}

impl ArchiveFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveFormat::Archive => "cbz",
            ArchiveFormat::Document => "pdf",
            ArchiveFormat::Ebook => "epub",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ArchiveFormat::Archive => "CBZ",
            ArchiveFormat::Document => "PDF",
            ArchiveFormat::Ebook => "EPUB",
        }
    }

    /// The page extensions this format can carry.
    pub fn eligible_extensions(&self) -> &'static [&'static str] {
        match self {
            ArchiveFormat::Archive => ACCEPTED_EXTENSIONS,
            ArchiveFormat::Document => DOCUMENT_EXTENSIONS,
            ArchiveFormat::Ebook => ACCEPTED_EXTENSIONS,
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of one converter run. `path` is `None` on failure or when no eligible pages exist.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArchiveOutcome {
    pub format: ArchiveFormat,
    pub path: Option<PathBuf>,
}

impl ArchiveOutcome {
    pub fn produced(format: ArchiveFormat, path: PathBuf) -> Self {
        Self {
            format,
            path: Some(path),
        }
    }

    pub fn absent(format: ArchiveFormat) -> Self {
        Self { format, path: None }
    }

    pub fn is_produced(&self) -> bool {
        self.path.is_some()
    }
}

/// How chapters are scheduled during the fetch stage.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FetchMode {
    /// One chapter at a time, one image at a time, with a pacing delay between chapters.
    Sequential,
    /// Chapters and their images fanned out under the configured concurrency limit.
    #[default]
    Concurrent,
}

/// Which converters run after fetching.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConvertMode {
    #[default]
    None,
    Archive,
    Document,
    /// Archive and document.
    Both,
    Ebook,
    /// Archive, document and ebook.
    All,
}

impl ConvertMode {
    /// Requested formats, archive first.
    pub fn formats(&self) -> Vec<ArchiveFormat> {
        match self {
            ConvertMode::None => Vec::new(),
            ConvertMode::Archive => vec![ArchiveFormat::Archive],
            ConvertMode::Document => vec![ArchiveFormat::Document],
            ConvertMode::Both => vec![ArchiveFormat::Archive, ArchiveFormat::Document],
            ConvertMode::Ebook => vec![ArchiveFormat::Ebook],
            ConvertMode::All => vec![
                ArchiveFormat::Archive,
                ArchiveFormat::Document,
                ArchiveFormat::Ebook,
            ],
        }
    }
}

impl FromStr for ConvertMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(ConvertMode::None),
            "cbz" | "archive" => Ok(ConvertMode::Archive),
            "pdf" | "document" => Ok(ConvertMode::Document),
            "both" => Ok(ConvertMode::Both),
            "epub" | "ebook" => Ok(ConvertMode::Ebook),
            "all" => Ok(ConvertMode::All),
            other => Err(Error::Unsupported(format!("Convert mode '{}'", other))),
        }
    }
}

/// How a chapter's storage directory name is derived from its title.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DirectoryNaming {
    /// `<root>/<sanitized title>`; titles differing only in `/`, `\` or `:` share a directory.
    #[default]
    SanitizedTitle,
    /// `<root>/<NNNN> - <sanitized title>` using the 1-based position in the batch.
    IndexedTitle,
}

/// Orchestrator state.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PipelineStage {
    #[default]
    Idle,
    Fetching,
    Converting,
    CleaningUp,
    Done,
    Failed,
}

/// Per-chapter line of the final aggregate, for chapters that fetched at least one page.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChapterReport {
    pub title: String,
    pub directory: PathBuf,
    pub accepted_count: usize,
    pub archives: Vec<ArchiveOutcome>,
    pub sources_removed: bool,
}

impl ChapterReport {
    pub fn produced_formats(&self) -> Vec<ArchiveFormat> {
        self.archives
            .iter()
            .filter(|a| a.is_produced())
            .map(|a| a.format)
            .collect()
    }
}

/// Aggregate result of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BatchReport {
    pub requested_chapters: usize,
    pub completed: Vec<ChapterReport>,
    pub failed_titles: Vec<String>,
    pub stage: PipelineStage,
}

impl BatchReport {
    pub fn successful_chapters(&self) -> usize {
        self.completed.len()
    }

    pub fn produced_conversions(&self) -> usize {
        self.completed
            .iter()
            .map(|c| c.archives.iter().filter(|a| a.is_produced()).count())
            .sum()
    }

    /// A batch succeeds when at least one chapter made it through fetching.
    pub fn is_success(&self) -> bool {
        self.stage == PipelineStage::Done && !self.completed.is_empty()
    }
}

/// Utility function: Determines file type and MIME type from a file path
///
/// # Supported formats
///
/// - JPEG/JPG: image/jpeg
/// - PNG: image/png
/// - WebP: image/webp
/// - GIF: image/gif
pub fn get_file_info(image_path: &Path) -> Result<(&'static str, &'static str)> {
    let extension = image_path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match extension.as_deref() {
        Some("jpg") | Some("jpeg") => Ok(("jpg", "image/jpeg")),
        Some("png") => Ok(("png", "image/png")),
        Some("webp") => Ok(("webp", "image/webp")),
        Some("gif") => Ok(("gif", "image/gif")),
        _ => Err(Error::Unsupported(format!("Image format {:#?}", extension))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chapter_outcome_success_follows_count() {
        assert!(!ChapterOutcome::new(PathBuf::from("a"), 0).success);
        assert!(ChapterOutcome::new(PathBuf::from("a"), 3).success);
    }

    #[test]
    fn test_document_extensions_are_subset_of_archive() {
        for ext in DOCUMENT_EXTENSIONS {
            assert!(ACCEPTED_EXTENSIONS.contains(ext));
        }
        assert!(!DOCUMENT_EXTENSIONS.contains(&"webp"));
        assert!(!DOCUMENT_EXTENSIONS.contains(&"gif"));
    }

    #[test]
    fn test_convert_mode_parsing() {
        assert_eq!("both".parse::<ConvertMode>().unwrap(), ConvertMode::Both);
        assert_eq!("CBZ".parse::<ConvertMode>().unwrap(), ConvertMode::Archive);
        assert_eq!("pdf".parse::<ConvertMode>().unwrap(), ConvertMode::Document);
        assert_eq!("none".parse::<ConvertMode>().unwrap(), ConvertMode::None);
        assert!("zip".parse::<ConvertMode>().is_err());
        assert_eq!("epub".parse::<ConvertMode>().unwrap(), ConvertMode::Ebook);
        assert_eq!(
            ConvertMode::Both.formats(),
            vec![ArchiveFormat::Archive, ArchiveFormat::Document]
        );
        assert_eq!(ConvertMode::All.formats().len(), 3);
        assert_eq!(ArchiveFormat::Document.extension(), "pdf");
        assert_eq!(ArchiveFormat::Ebook.extension(), "epub");
    }

    #[test]
    fn test_get_file_info() {
        assert_eq!(get_file_info(Path::new("001.JPEG")).unwrap().0, "jpg");
        assert_eq!(get_file_info(Path::new("001.gif")).unwrap().1, "image/gif");
        assert!(get_file_info(Path::new("notes.txt")).is_err());
    }
}
