use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;

use crate::path_utils::path_to_string_lossy;
use crate::progress::ProgressTracker;
use crate::source::ImageSource;
use crate::types::{ACCEPTED_EXTENSIONS, DEFAULT_EXTENSION, ImageResult, ImageTask};
use crate::validator;

/// Derives the storage extension for an image URL.
///
/// The query string and fragment are dropped, the extension is read from the last path
/// segment and lowercased. Anything outside [`ACCEPTED_EXTENSIONS`] falls back to
/// [`DEFAULT_EXTENSION`].
pub fn derive_extension(url: &str) -> &'static str {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let segment = path.rsplit('/').next().unwrap_or_default();
    let Some((_, extension)) = segment.rsplit_once('.') else {
        return DEFAULT_EXTENSION;
    };
    let extension = extension.to_ascii_lowercase();
    ACCEPTED_EXTENSIONS
        .iter()
        .find(|known| **known == extension)
        .copied()
        .unwrap_or(DEFAULT_EXTENSION)
}

/// Name of the temporary file an accepted image is written to before renaming.
pub fn temp_file_name(index: usize, extension: &str) -> String {
    format!("temp_{:03}.{}", index, extension)
}

/// Fetches, validates and stores a single image.
///
/// Every failure is absorbed into a rejected [`ImageResult`]; nothing escapes `fetch`.
pub struct ImageFetchWorker {
    source: Arc<dyn ImageSource>,
    progress: ProgressTracker,
    label: String,
}

impl ImageFetchWorker {
    /// # Arguments
    ///
    /// * `source` - Where image bytes come from
    /// * `progress` - Sink for status lines
    /// * `label` - Chapter title used to prefix status lines
    pub fn new(source: Arc<dyn ImageSource>, progress: ProgressTracker, label: &str) -> Self {
        Self {
            source,
            progress,
            label: label.to_string(),
        }
    }

    pub async fn fetch(&self, task: &ImageTask, referer: &str, dest_dir: &Path) -> ImageResult {
        let number = task.index + 1;
        self.progress
            .line(format!("[{}] Downloading image {}", self.label, number));

        let bytes = match self.source.fetch(&task.source_url, referer).await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.progress.line(format!(
                    "[{}] Error downloading image {}: {}",
                    self.label, number, e
                ));
                return ImageResult::rejected(task.index);
            }
        };

        if !validator::validate(&bytes) {
            self.progress.line(format!(
                "[{}] Skipping image {} as it appears to be an icon or small image",
                self.label, number
            ));
            return ImageResult::rejected(task.index);
        }

        let extension = derive_extension(&task.source_url);
        let path: PathBuf = dest_dir.join(temp_file_name(task.index, extension));
        if let Err(e) = tokio::fs::write(&path, &bytes).await {
            self.progress.line(format!(
                "[{}] Error saving image {} to {}: {}",
                self.label,
                number,
                path_to_string_lossy(&path),
                e
            ));
            return ImageResult::rejected(task.index);
        }

        debug!("Stored {} ({} bytes)", path_to_string_lossy(&path), bytes.len());
        self.progress
            .line(format!("[{}] Downloaded image {}", self.label, number));
        ImageResult::accepted(task.index, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_extension() {
        assert_eq!(derive_extension("https://cdn.example/a/001.PNG"), "png");
        assert_eq!(derive_extension("https://cdn.example/a/001.webp?token=a.b"), "webp");
        assert_eq!(derive_extension("https://cdn.example/a/001.jpeg#frag"), "jpeg");
        assert_eq!(derive_extension("https://cdn.example/a/001.gif"), "gif");
        assert_eq!(derive_extension("https://cdn.example/a/001.avif"), "jpg");
        assert_eq!(derive_extension("https://cdn.example/a/image"), "jpg");
        assert_eq!(derive_extension("https://cdn.example.com/"), "jpg");
    }

    #[test]
    fn test_temp_file_name() {
        assert_eq!(temp_file_name(0, "png"), "temp_000.png");
        assert_eq!(temp_file_name(42, "jpg"), "temp_042.jpg");
        assert_eq!(temp_file_name(1234, "jpg"), "temp_1234.jpg");
    }
}
