//! Generator module provides the packaging stage: a common generator interface, the CBZ
//! archive, PDF document and EPUB ebook generators, and [`ArchiveBuilder`], which runs a
//! generator over a finished chapter directory without ever failing the batch.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::warn;
use tokio::fs;

use crate::collector::list_pages;
use crate::error::Result;
use crate::path_utils::{get_file_name_lossy, path_to_string_lossy, sibling_with_extension};
use crate::progress::ProgressTracker;
use crate::types::{ArchiveFormat, ArchiveOutcome};

pub mod cbz;
pub mod epub;
pub mod pdf;

use cbz::Cbz;
use epub::EPub;
use pdf::Pdf;

/// Common interface for all file generators.
#[async_trait]
pub trait Generator {
    /// Creates a new generator writing `<output_dir>/<base_filename>.<ext>`.
    fn new(output_dir: &Path, base_filename: &str) -> Result<Self>
    where
        Self: Sized;

    /// Adds a page to the generated file.
    async fn add_page(&mut self, image_path: &Path) -> Result<&mut Self>
    where
        Self: Sized;

    /// Embeds descriptive metadata.
    ///
    /// # Parameters
    /// * `title` - Chapter title
    /// * `source_url` - Where the chapter was downloaded from, if known
    /// * `total_pages` - Number of pages in this file
    async fn set_metadata(
        &mut self,
        title: &str,
        source_url: Option<&str>,
        total_pages: usize,
    ) -> Result<&mut Self>
    where
        Self: Sized;

    /// Finalizes the file and returns its path.
    async fn save(self) -> Result<PathBuf>;
}

/// Packages a finished chapter directory into its sibling `<dir>.cbz`, `<dir>.pdf` or
/// `<dir>.epub`.
#[derive(Debug, Clone)]
pub struct ArchiveBuilder {
    embed_comic_info: bool,
    progress: ProgressTracker,
}

impl ArchiveBuilder {
    /// # Arguments
    ///
    /// * `embed_comic_info` - Add a `ComicInfo.xml` entry to CBZ archives
    /// * `progress` - Sink for status lines
    pub fn new(embed_comic_info: bool, progress: ProgressTracker) -> Self {
        Self {
            embed_comic_info,
            progress,
        }
    }

    /// Builds `format` from the pages in `chapter_dir`.
    ///
    /// Never fails: a missing directory, no eligible pages, or any I/O or encoding error
    /// produce an absent outcome and a status line. A partially written output is removed.
    pub async fn build(
        &self,
        format: ArchiveFormat,
        chapter_dir: &Path,
        title: &str,
        source_url: Option<&str>,
    ) -> ArchiveOutcome {
        let label = format.label();
        let pages = match list_pages(chapter_dir, format.eligible_extensions()).await {
            Ok(pages) => pages,
            Err(e) => {
                self.progress
                    .line(format!("Cannot create {} for {}: {}", label, title, e));
                return ArchiveOutcome::absent(format);
            }
        };
        if pages.is_empty() {
            self.progress.line(format!(
                "No images found in {} to create {}",
                path_to_string_lossy(chapter_dir),
                label
            ));
            return ArchiveOutcome::absent(format);
        }

        match self
            .generate(format, chapter_dir, title, source_url, &pages)
            .await
        {
            Ok(path) => {
                self.progress.line(format!(
                    "Created {} file: {}",
                    label,
                    path_to_string_lossy(&path)
                ));
                ArchiveOutcome::produced(format, path)
            }
            Err(e) => {
                self.progress
                    .line(format!("Error creating {} file: {}", label, e));
                let partial = sibling_with_extension(chapter_dir, format.extension());
                if partial.exists() {
                    if let Err(e) = fs::remove_file(&partial).await {
                        warn!("Could not remove partial output {:?}: {}", partial, e);
                    }
                }
                ArchiveOutcome::absent(format)
            }
        }
    }

    async fn generate(
        &self,
        format: ArchiveFormat,
        chapter_dir: &Path,
        title: &str,
        source_url: Option<&str>,
        pages: &[PathBuf],
    ) -> Result<PathBuf> {
        let output_dir = chapter_dir
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let base_filename = get_file_name_lossy(chapter_dir);

        match format {
            ArchiveFormat::Archive => {
                let mut generator = Cbz::new(&output_dir, &base_filename)?;
                for page in pages {
                    generator.add_page(page).await?;
                }
                if self.embed_comic_info {
                    generator
                        .set_metadata(title, source_url, pages.len())
                        .await?;
                }
                generator.save().await
            }
            ArchiveFormat::Document => {
                let mut generator = Pdf::new(&output_dir, &base_filename)?;
                generator
                    .set_metadata(title, source_url, pages.len())
                    .await?;
                for page in pages {
                    generator.add_page(page).await?;
                }
                generator.save().await
            }
            ArchiveFormat::Ebook => {
                let mut generator = EPub::new(&output_dir, &base_filename)?;
                generator.set_cover(&pages[0])?;
                generator
                    .set_metadata(title, source_url, pages.len())
                    .await?;
                for page in pages {
                    generator.add_page(page).await?;
                }
                generator.save().await
            }
        }
    }
}
