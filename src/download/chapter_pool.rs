use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use log::warn;
use tokio::spawn;
use tokio::sync::Semaphore;
use tokio::time::sleep;

use crate::download::assembler::ChapterAssembler;
use crate::error::Result;
use crate::progress::ProgressTracker;
use crate::types::{Chapter, ChapterOutcome};

/// Share of the overall progress bar covered by the fetch stage.
pub const FETCH_PROGRESS_SPAN: u8 = 60;

fn fetch_percent(done: usize, total: usize) -> u8 {
    (done * FETCH_PROGRESS_SPAN as usize / total.max(1)) as u8
}

/// Runs chapter assemblies, either fanned out or one at a time.
///
/// In concurrent mode every chapter task opens its own image pool with the same
/// concurrency limit as the chapter level.
pub struct ChapterFetchPool {
    assembler: Arc<ChapterAssembler>,
    progress: ProgressTracker,
}

impl ChapterFetchPool {
    pub fn new(assembler: Arc<ChapterAssembler>, progress: ProgressTracker) -> Self {
        Self {
            assembler,
            progress,
        }
    }

    fn report(&self, chapter: &Chapter, outcome: &ChapterOutcome) {
        if outcome.success {
            self.progress
                .line(format!("Completed download of chapter: {}", chapter.title));
        } else {
            self.progress.line(format!(
                "Chapter download completed but may have issues: {}",
                chapter.title
            ));
        }
    }

    /// Assembles all chapters with at most `max_concurrency` chapters in flight.
    ///
    /// Returns one entry per chapter, in completion order.
    pub async fn fetch_all(
        &self,
        chapters: Vec<Chapter>,
        max_concurrency: usize,
    ) -> Vec<(Chapter, ChapterOutcome)> {
        let max_concurrency = max_concurrency.max(1);
        let semaphore = Arc::new(Semaphore::new(max_concurrency));
        let total = chapters.len();

        let mut pending = FuturesUnordered::new();
        for (i, chapter) in chapters.into_iter().enumerate() {
            let position = i + 1;
            let semaphore = Arc::clone(&semaphore);
            let assembler = Arc::clone(&self.assembler);
            let task_chapter = chapter.clone();

            let handle = spawn(async move {
                let _permit = semaphore.acquire().await?;
                Result::Ok(
                    assembler
                        .assemble(&task_chapter, position, max_concurrency)
                        .await,
                )
            });
            pending.push(async move { (chapter, position, handle.await) });
        }

        let mut outcomes = Vec::with_capacity(total);
        while let Some((chapter, position, joined)) = pending.next().await {
            let outcome = match joined {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(e)) => {
                    warn!("Chapter task for {} could not start: {}", chapter.title, e);
                    ChapterOutcome::failed(self.assembler.chapter_directory(&chapter, position))
                }
                Err(e) => {
                    self.progress
                        .line(format!("Chapter download failed for {}: {}", chapter.title, e));
                    ChapterOutcome::failed(self.assembler.chapter_directory(&chapter, position))
                }
            };
            self.report(&chapter, &outcome);
            outcomes.push((chapter, outcome));
            self.progress.percent(fetch_percent(outcomes.len(), total));
        }
        outcomes
    }

    /// Assembles chapters one after another with single-image fetching, waiting
    /// `pacing_delay` between consecutive chapters.
    ///
    /// Returns one entry per chapter, in input order.
    pub async fn fetch_sequential(
        &self,
        chapters: Vec<Chapter>,
        pacing_delay: Duration,
    ) -> Vec<(Chapter, ChapterOutcome)> {
        let total = chapters.len();
        let mut outcomes = Vec::with_capacity(total);

        for (i, chapter) in chapters.into_iter().enumerate() {
            if i > 0 && !pacing_delay.is_zero() {
                sleep(pacing_delay).await;
            }
            self.progress
                .line(format!("[{}/{}] {}", i + 1, total, chapter.title));
            let outcome = self.assembler.assemble(&chapter, i + 1, 1).await;
            self.report(&chapter, &outcome);
            outcomes.push((chapter, outcome));
            self.progress.percent(fetch_percent(i + 1, total));
        }
        outcomes
    }
}
