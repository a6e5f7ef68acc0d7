use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, warn};
use tokio::fs;

use crate::collector::list_pages;
use crate::download::image_pool::ImageFetchPool;
use crate::download::worker::ImageFetchWorker;
use crate::path_utils::{chapter_directory_name, is_direct_child, path_to_string_lossy};
use crate::progress::ProgressTracker;
use crate::source::{ImageSource, PageFetcher};
use crate::types::{
    ACCEPTED_EXTENSIONS, Chapter, ChapterOutcome, DEFAULT_EXTENSION, DirectoryNaming, ImageResult,
    ImageTask,
};

/// Final file name of the `slot`-th accepted page (1-based).
pub fn page_file_name(slot: usize, extension: &str) -> String {
    format!("{:03}.{}", slot, extension)
}

/// Renames the accepted results to `001.<ext>`, `002.<ext>`, ... in ascending task index.
///
/// Rejected results are skipped without leaving a hole. A result whose rename fails is
/// dropped as well and does not consume a slot.
///
/// # Returns
///
/// * `usize` - The number of pages now stored under their final names
pub async fn finalize_pages(mut results: Vec<ImageResult>, chapter_dir: &Path) -> usize {
    results.sort_by_key(|r| r.index);

    let mut accepted_count = 0;
    for result in results.into_iter().filter(|r| r.accepted) {
        let Some(temp_path) = result.storage_path else {
            continue;
        };
        let extension = temp_path
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_else(|| DEFAULT_EXTENSION.to_string());
        let final_path = chapter_dir.join(page_file_name(accepted_count + 1, &extension));

        match fs::rename(&temp_path, &final_path).await {
            Ok(()) => accepted_count += 1,
            Err(e) => {
                warn!(
                    "Could not rename {} to {}: {}",
                    path_to_string_lossy(&temp_path),
                    path_to_string_lossy(&final_path),
                    e
                );
                let _ = fs::remove_file(&temp_path).await;
            }
        }
    }
    accepted_count
}

/// Downloads one chapter into its own directory and leaves it as a gap-free page sequence.
pub struct ChapterAssembler {
    page_fetcher: Arc<dyn PageFetcher>,
    image_source: Arc<dyn ImageSource>,
    output_root: PathBuf,
    naming: DirectoryNaming,
    progress: ProgressTracker,
}

impl ChapterAssembler {
    pub fn new(
        page_fetcher: Arc<dyn PageFetcher>,
        image_source: Arc<dyn ImageSource>,
        output_root: PathBuf,
        naming: DirectoryNaming,
        progress: ProgressTracker,
    ) -> Self {
        Self {
            page_fetcher,
            image_source,
            output_root,
            naming,
            progress,
        }
    }

    /// Directory a chapter is stored in.
    ///
    /// # Arguments
    ///
    /// * `chapter` - The chapter
    /// * `position` - 1-based position of the chapter in the batch
    pub fn chapter_directory(&self, chapter: &Chapter, position: usize) -> PathBuf {
        self.output_root
            .join(chapter_directory_name(&chapter.title, position, self.naming))
    }

    /// Fetches and assembles `chapter`, using `max_concurrency` for its image fan-out.
    ///
    /// Never fails: discovery errors, an empty image list or a directory that cannot be
    /// created all yield an unsuccessful [`ChapterOutcome`].
    pub async fn assemble(
        &self,
        chapter: &Chapter,
        position: usize,
        max_concurrency: usize,
    ) -> ChapterOutcome {
        let title = &chapter.title;
        let chapter_dir = self.chapter_directory(chapter, position);
        self.progress.line(format!("Downloading chapter: {}", title));

        if !is_direct_child(&chapter_dir, &self.output_root) {
            self.progress.line(format!(
                "[{}] Chapter title does not give a usable directory name, skipping",
                title
            ));
            return ChapterOutcome::failed(chapter_dir);
        }

        if let Err(e) = fs::create_dir_all(&chapter_dir).await {
            self.progress.line(format!(
                "[{}] Could not create {}: {}",
                title,
                path_to_string_lossy(&chapter_dir),
                e
            ));
            return ChapterOutcome::failed(chapter_dir);
        }
        self.clear_stale_pages(&chapter_dir).await;

        let urls = match self.page_fetcher.image_urls(&chapter.url, &chapter_dir).await {
            Ok(urls) => urls,
            Err(e) => {
                self.progress.line(format!(
                    "[{}] Error in {} processing: {}",
                    title,
                    self.page_fetcher.mode(),
                    e
                ));
                return ChapterOutcome::failed(chapter_dir);
            }
        };
        if urls.is_empty() {
            self.progress
                .line(format!("[{}] No images found. Saved page source for debugging.", title));
            return ChapterOutcome::failed(chapter_dir);
        }
        self.progress
            .line(format!("[{}] Found {} images", title, urls.len()));

        let tasks: Vec<ImageTask> = urls
            .into_iter()
            .enumerate()
            .map(|(index, source_url)| ImageTask { index, source_url })
            .collect();

        let referer = self.page_fetcher.page_url(&chapter.url);
        let worker = Arc::new(ImageFetchWorker::new(
            Arc::clone(&self.image_source),
            self.progress.clone(),
            title,
        ));
        let results = ImageFetchPool::new(worker)
            .fetch_all(tasks, &referer, &chapter_dir, max_concurrency)
            .await;

        let accepted_count = finalize_pages(results, &chapter_dir).await;
        if accepted_count > 0 {
            self.progress.line(format!(
                "[{}] Chapter downloaded successfully with {} valid images",
                title, accepted_count
            ));
        } else {
            self.progress
                .line(format!("[{}] Chapter has no valid images", title));
        }
        ChapterOutcome::new(chapter_dir, accepted_count)
    }

    /// Removes page files left behind by an earlier run so the directory only ever holds
    /// this run's sequence.
    async fn clear_stale_pages(&self, chapter_dir: &Path) {
        let Ok(stale) = list_pages(chapter_dir, ACCEPTED_EXTENSIONS).await else {
            return;
        };
        for path in stale {
            debug!("Removing stale page {}", path_to_string_lossy(&path));
            if let Err(e) = fs::remove_file(&path).await {
                warn!("Could not remove stale page {:?}: {}", path, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_file_name() {
        assert_eq!(page_file_name(1, "jpg"), "001.jpg");
        assert_eq!(page_file_name(12, "webp"), "012.webp");
    }
}
