use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use tokio::fs;

use crate::download::chapter_pool::FETCH_PROGRESS_SPAN;
use crate::download::{ChapterAssembler, ChapterFetchPool};
use crate::error::{Error, Result};
use crate::generator::ArchiveBuilder;
use crate::path_utils::{is_direct_child, path_to_string_lossy};
use crate::progress::{LogProgress, ProgressSink, ProgressTracker};
use crate::selection::ChapterSelection;
use crate::source::{ChapterIndexer, ImageSource, PageFetcher};
use crate::types::{
    BatchReport, Chapter, ChapterOutcome, ChapterReport, ConvertMode, DirectoryNaming, FetchMode,
    PipelineStage,
};

/// Upper bound of the progress bar before the final 100% report.
const CONVERT_PROGRESS_END: u8 = 95;

/// The Yomikomi run configuration, built declaratively using the builder pattern.
///
/// Holds the run settings and the site collaborators. Once built, it drives the whole
/// pipeline: fetch the chapters, package them, optionally remove the source images.
///
/// - [`index`](YomikomiConfig::index): Discover a series' chapters
/// - [`run`](YomikomiConfig::run): Run the pipeline over a chapter list
/// - [`run_selection`](YomikomiConfig::run_selection): Index, select and run in one call
///
/// ## Builder Pattern
///
/// ```rust,no_run
/// # use yomikomi::prelude::*;
/// # fn main() -> yomikomi::error::Result<()> {
/// let config = YomikomiConfig::builder()
///     .output_root(PathBuf::from("./downloads"))
///     .mode(FetchMode::Concurrent)
///     .concurrency(4_usize)
///     .convert(ConvertMode::Archive)
///     .page_fetcher(Arc::new(HttpPageFetcher::new(DEFAULT_BASE_URL)?))
///     .image_source(Arc::new(HttpImageSource::new()?))
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, derive_builder::Builder)]
#[builder(setter(into, strip_option), build_fn(validate = "Self::validate"))]
pub struct YomikomiConfig {
    /// Directory that receives one subdirectory per chapter plus the packaged files.
    #[builder(default = "PathBuf::from(\"downloads\")")]
    pub output_root: PathBuf,

    /// Fetch chapters concurrently or one at a time.
    #[builder(default)]
    pub mode: FetchMode,

    /// Concurrency limit applied to both the chapter level and the image level.
    /// Ignored in [`FetchMode::Sequential`], where both levels run with a limit of 1.
    #[builder(default = "5")]
    pub concurrency: usize,

    /// Which packaged formats to produce after fetching.
    #[builder(default)]
    pub convert: ConvertMode,

    /// Remove a chapter's image directory once at least one requested format was produced.
    #[builder(default = "false")]
    pub delete_sources_after_convert: bool,

    /// Wait between consecutive chapters in [`FetchMode::Sequential`].
    #[builder(default = "Duration::from_secs(2)")]
    pub pacing_delay: Duration,

    /// How chapter directories are named.
    #[builder(default)]
    pub directory_naming: DirectoryNaming,

    /// Add a `ComicInfo.xml` entry to CBZ archives.
    #[builder(default = "false")]
    pub embed_comic_info: bool,

    /// Source of each chapter's image URLs.
    #[builder(setter(custom))]
    pub page_fetcher: Arc<dyn PageFetcher>,

    /// Source of image bytes.
    #[builder(setter(custom))]
    pub image_source: Arc<dyn ImageSource>,

    /// Source of a series' chapter list. Only needed for [`index`](YomikomiConfig::index).
    #[builder(setter(custom), default)]
    pub chapter_indexer: Option<Arc<dyn ChapterIndexer>>,

    /// Where status lines and percentages go.
    #[builder(setter(custom), default = "Arc::new(LogProgress)")]
    pub progress: Arc<dyn ProgressSink>,
}

impl std::fmt::Debug for YomikomiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YomikomiConfig")
            .field("output_root", &self.output_root)
            .field("mode", &self.mode)
            .field("concurrency", &self.concurrency)
            .field("convert", &self.convert)
            .field(
                "delete_sources_after_convert",
                &self.delete_sources_after_convert,
            )
            .field("pacing_delay", &self.pacing_delay)
            .field("directory_naming", &self.directory_naming)
            .field("embed_comic_info", &self.embed_comic_info)
            .field("page_fetcher", &self.page_fetcher.mode())
            .field(
                "chapter_indexer",
                &self.chapter_indexer.as_ref().map(|i| i.mode()),
            )
            .finish()
    }
}

impl YomikomiConfigBuilder {
    pub fn page_fetcher(&mut self, page_fetcher: Arc<dyn PageFetcher>) -> &mut Self {
        self.page_fetcher = Some(page_fetcher);
        self
    }

    pub fn image_source(&mut self, image_source: Arc<dyn ImageSource>) -> &mut Self {
        self.image_source = Some(image_source);
        self
    }

    pub fn chapter_indexer(&mut self, chapter_indexer: Arc<dyn ChapterIndexer>) -> &mut Self {
        self.chapter_indexer = Some(Some(chapter_indexer));
        self
    }

    pub fn progress(&mut self, progress: Arc<dyn ProgressSink>) -> &mut Self {
        self.progress = Some(progress);
        self
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if let Some(concurrency) = self.concurrency {
            if concurrency < 1 {
                return Err("Concurrency must be at least 1.".to_string());
            }
        }
        if let Some(root) = &self.output_root {
            if root.as_os_str().is_empty() {
                return Err("Output root must not be empty.".to_string());
            }
        }
        Ok(())
    }
}

fn enter(stage: &mut PipelineStage, next: PipelineStage) {
    debug!("pipeline stage {:?} -> {:?}", stage, next);
    *stage = next;
}

impl YomikomiConfig {
    /// Creates a new builder for configuring `YomikomiConfig`.
    pub fn builder() -> YomikomiConfigBuilder {
        YomikomiConfigBuilder::default()
    }

    /// Re-checks the settings and creates the output root.
    ///
    /// # Returns
    ///
    /// * `Ok(&self)` - Ready to run
    /// * `Err(Error)` - Invalid settings or the output root cannot be created
    pub async fn preflight_check(&self) -> Result<&Self> {
        if self.concurrency < 1 {
            return Err(Error::Other("Concurrency must be at least 1.".to_string()));
        }
        if self.output_root.as_os_str().is_empty() {
            return Err(Error::Other("Output root is required".to_string()));
        }
        fs::create_dir_all(&self.output_root).await.map_err(|e| {
            Error::InvalidPath(
                self.output_root.clone(),
                format!("Cannot create output root: {}", e),
            )
        })?;
        if !self.output_root.is_dir() {
            return Err(Error::InvalidPath(
                self.output_root.clone(),
                "Output root is not a directory.".to_string(),
            ));
        }
        Ok(self)
    }

    /// Discovers the chapters of `series_url` with the configured chapter indexer.
    pub async fn index(&self, series_url: &str) -> Result<Vec<Chapter>> {
        let indexer = self
            .chapter_indexer
            .as_ref()
            .ok_or_else(|| Error::Other("No chapter indexer configured".to_string()))?;
        self.preflight_check().await?;

        let progress = ProgressTracker::new(Arc::clone(&self.progress));
        progress.line(format!("Fetching chapter information from {}...", series_url));
        let chapters = indexer.index(series_url, &self.output_root).await?;
        progress.line(format!("Found {} chapter(s).", chapters.len()));
        Ok(chapters)
    }

    /// Indexes `series_url`, applies `selection` and runs the pipeline on the result.
    pub async fn run_selection(
        &self,
        series_url: &str,
        selection: ChapterSelection,
    ) -> Result<BatchReport> {
        let chapters = self.index(series_url).await?;
        let selected = selection.apply(&chapters)?;
        self.run(selected).await
    }

    /// Runs the full pipeline over `chapters`.
    ///
    /// Per-chapter and per-format failures never abort the batch; they show up in the
    /// returned [`BatchReport`]. Only an empty chapter list or an unusable output root
    /// are returned as errors.
    pub async fn run(&self, chapters: Vec<Chapter>) -> Result<BatchReport> {
        let progress = ProgressTracker::new(Arc::clone(&self.progress));
        let mut stage = PipelineStage::Idle;

        if chapters.is_empty() {
            enter(&mut stage, PipelineStage::Failed);
            progress.line("Select at least one chapter before downloading.");
            return Err(Error::EmptySelection(
                "Select at least one chapter before downloading.".to_string(),
            ));
        }
        self.preflight_check().await?;

        let mut report = BatchReport {
            requested_chapters: chapters.len(),
            ..Default::default()
        };

        enter(&mut stage, PipelineStage::Fetching);
        let successful = self.fetch_stage(chapters, &progress, &mut report).await;
        progress.percent(FETCH_PROGRESS_SPAN);

        if successful.is_empty() {
            progress.line("No chapters finished successfully.");
            enter(&mut stage, PipelineStage::Done);
            report.stage = stage;
            progress.percent(100);
            return Ok(report);
        }

        enter(&mut stage, PipelineStage::Converting);
        report.completed = self.convert_stage(&successful, &progress).await;

        if self.delete_sources_after_convert {
            enter(&mut stage, PipelineStage::CleaningUp);
            self.cleanup_stage(&mut report.completed, &progress).await;
        }

        enter(&mut stage, PipelineStage::Done);
        report.stage = stage;
        progress.line(format!(
            "Download complete. {}/{} chapter(s) fetched, {} file(s) created.",
            report.successful_chapters(),
            report.requested_chapters,
            report.produced_conversions()
        ));
        progress.percent(100);
        Ok(report)
    }

    async fn fetch_stage(
        &self,
        chapters: Vec<Chapter>,
        progress: &ProgressTracker,
        report: &mut BatchReport,
    ) -> Vec<(Chapter, ChapterOutcome)> {
        let assembler = Arc::new(ChapterAssembler::new(
            Arc::clone(&self.page_fetcher),
            Arc::clone(&self.image_source),
            self.output_root.clone(),
            self.directory_naming,
            progress.clone(),
        ));
        let pool = ChapterFetchPool::new(assembler, progress.clone());

        let outcomes = match self.mode {
            FetchMode::Concurrent => {
                progress.line(format!(
                    "Downloading {} chapter(s) in {} threads.",
                    chapters.len(),
                    self.concurrency
                ));
                pool.fetch_all(chapters, self.concurrency).await
            }
            FetchMode::Sequential => {
                progress.line(format!(
                    "Downloading {} chapter(s) in sequential mode.",
                    chapters.len()
                ));
                pool.fetch_sequential(chapters, self.pacing_delay).await
            }
        };

        let mut successful = Vec::new();
        for (chapter, outcome) in outcomes {
            if outcome.success {
                successful.push((chapter, outcome));
            } else {
                report.failed_titles.push(chapter.title);
            }
        }
        successful
    }

    async fn convert_stage(
        &self,
        successful: &[(Chapter, ChapterOutcome)],
        progress: &ProgressTracker,
    ) -> Vec<ChapterReport> {
        let mut reports: Vec<ChapterReport> = successful
            .iter()
            .map(|(chapter, outcome)| ChapterReport {
                title: chapter.title.clone(),
                directory: outcome.directory.clone(),
                accepted_count: outcome.accepted_count,
                archives: Vec::new(),
                sources_removed: false,
            })
            .collect();

        let formats = self.convert.formats();
        if formats.is_empty() {
            return reports;
        }

        let builder = ArchiveBuilder::new(self.embed_comic_info, progress.clone());
        let span = (CONVERT_PROGRESS_END - FETCH_PROGRESS_SPAN) as usize / formats.len();
        let total = successful.len();

        for (phase, format) in formats.into_iter().enumerate() {
            progress.line(format!("{} conversion running...", format.label()));
            for (i, ((chapter, outcome), chapter_report)) in
                successful.iter().zip(reports.iter_mut()).enumerate()
            {
                if !outcome.directory.is_dir() {
                    progress.line(format!(
                        "Sources missing for {}, skipping {}.",
                        chapter.title,
                        format.label()
                    ));
                } else {
                    let archive = builder
                        .build(format, &outcome.directory, &chapter.title, Some(&chapter.url))
                        .await;
                    if !archive.is_produced() {
                        progress.line(format!(
                            "{} failed for {}",
                            format.label(),
                            chapter.title
                        ));
                    }
                    chapter_report.archives.push(archive);
                }

                let done = (i + 1) * span / total;
                let value = FETCH_PROGRESS_SPAN as usize + phase * span + done;
                progress.percent(value.min(CONVERT_PROGRESS_END as usize) as u8);
            }
        }
        reports
    }

    async fn cleanup_stage(&self, reports: &mut [ChapterReport], progress: &ProgressTracker) {
        let mut removed: HashSet<PathBuf> = HashSet::new();
        for report in reports.iter_mut() {
            if report.produced_formats().is_empty() {
                continue;
            }
            if removed.contains(&report.directory) {
                continue;
            }
            if !is_direct_child(&report.directory, &self.output_root) {
                warn!(
                    "Refusing to remove {:?}, it is not a chapter directory of {:?}",
                    report.directory, self.output_root
                );
                continue;
            }
            match fs::remove_dir_all(&report.directory).await {
                Ok(()) => {
                    progress.line(format!("Removed source images for {}.", report.title));
                    report.sources_removed = true;
                    removed.insert(report.directory.clone());
                }
                Err(e) => {
                    progress.line(format!(
                        "Cleanup failed for {} ({}): {}",
                        report.title,
                        path_to_string_lossy(&report.directory),
                        e
                    ));
                }
            }
        }
    }
}
