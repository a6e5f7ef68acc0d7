//! Yomikomi - Manga Chapter Downloader Library
//!
//! This crate downloads a series' chapters as page images, keeps only the images that look
//! like real manga pages, renames them into a gap-free `001.jpg, 002.png, ...` sequence and
//! optionally packages every chapter as a CBZ archive, a PDF document and/or an EPUB ebook.
//!
//! # Getting Started
//!
//! Configure a run with [`YomikomiConfig`]'s builder, pick the chapters (index a series
//! page, then apply a [`ChapterSelection`]) and execute the pipeline.
//!
//! ```rust,no_run
//! use yomikomi::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> yomikomi::error::Result<()> {
//!     let config = YomikomiConfig::builder()
//!         .output_root(PathBuf::from("./downloads"))
//!         .mode(FetchMode::Concurrent)
//!         .concurrency(5_usize)
//!         .convert(ConvertMode::Both)
//!         .delete_sources_after_convert(true)
//!         .page_fetcher(Arc::new(HttpPageFetcher::new(DEFAULT_BASE_URL)?))
//!         .image_source(Arc::new(HttpImageSource::new()?))
//!         .chapter_indexer(Arc::new(HttpChapterIndexer::new()?))
//!         .build()?;
//!
//!     let selection: ChapterSelection = "1-3".parse()?;
//!     let report = config
//!         .run_selection("https://mangapark.net/title/12345-some-series", selection)
//!         .await?;
//!
//!     println!(
//!         "{}/{} chapters, {} files created",
//!         report.successful_chapters(),
//!         report.requested_chapters,
//!         report.produced_conversions()
//!     );
//!     Ok(())
//! }
//! ```
//!
//! Site access goes through the [`source::ImageSource`], [`source::PageFetcher`] and
//! [`source::ChapterIndexer`] traits, so the pipeline can be driven by any site or by
//! in-memory fixtures. With the `browser` feature, headless Chrome variants of the page
//! fetcher and indexer are available in [`source::browser`].

pub mod collector;
pub mod download;
pub mod error;
pub mod generator;
pub mod path_utils;
pub mod progress;
pub mod selection;
pub mod source;
pub mod types;
pub mod validator;
pub mod yomikomi;

pub use selection::ChapterSelection;
pub use yomikomi::{YomikomiConfig, YomikomiConfigBuilder};

pub use types::{
    ArchiveFormat, ArchiveOutcome, BatchReport, Chapter, ChapterOutcome, ChapterReport,
    ConvertMode, DirectoryNaming, FetchMode, ImageResult, ImageTask, PipelineStage,
};

/// Prelude module for convenient imports.
///
/// Re-exports the configuration, the core types, the default HTTP collaborators and the
/// progress sinks, so a single `use yomikomi::prelude::*;` is enough for a typical run.
pub mod prelude {
    pub use super::{
        ArchiveFormat, ArchiveOutcome, BatchReport, Chapter, ChapterOutcome, ChapterReport,
        ChapterSelection, ConvertMode, DirectoryNaming, FetchMode, PipelineStage,
        YomikomiConfig, YomikomiConfigBuilder, error, generator, types,
    };
    pub use crate::progress::{
        ChannelProgress, LogProgress, NullProgress, ProgressEvent, ProgressSink,
    };
    pub use crate::source::http::{HttpChapterIndexer, HttpPageFetcher};
    pub use crate::source::{
        ChapterIndexer, DEFAULT_BASE_URL, HttpImageSource, ImageSource, PageFetcher,
    };
    pub use std::path::{Path, PathBuf};
    pub use std::sync::Arc;
}
