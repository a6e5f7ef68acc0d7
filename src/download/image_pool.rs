use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use log::warn;
use tokio::spawn;
use tokio::sync::Semaphore;

use crate::download::worker::ImageFetchWorker;
use crate::error::Result;
use crate::types::{ImageResult, ImageTask};

/// Fans a chapter's image tasks out over at most `max_concurrency` in-flight fetches.
///
/// Results come back in completion order. Exactly one [`ImageResult`] is produced per task,
/// including for tasks whose spawned future panicked.
pub struct ImageFetchPool {
    worker: Arc<ImageFetchWorker>,
}

impl ImageFetchPool {
    pub fn new(worker: Arc<ImageFetchWorker>) -> Self {
        Self { worker }
    }

    pub async fn fetch_all(
        &self,
        tasks: Vec<ImageTask>,
        referer: &str,
        dest_dir: &Path,
        max_concurrency: usize,
    ) -> Vec<ImageResult> {
        let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
        let referer: Arc<str> = Arc::from(referer);
        let dest_dir: Arc<PathBuf> = Arc::new(dest_dir.to_path_buf());
        let total = tasks.len();

        let mut pending = FuturesUnordered::new();
        for task in tasks {
            let index = task.index;
            let semaphore = Arc::clone(&semaphore);
            let worker = Arc::clone(&self.worker);
            let referer = Arc::clone(&referer);
            let dest_dir = Arc::clone(&dest_dir);

            let handle = spawn(async move {
                let _permit = semaphore.acquire().await?;
                Result::Ok(worker.fetch(&task, &referer, &dest_dir).await)
            });
            pending.push(async move { (index, handle.await) });
        }

        let mut results = Vec::with_capacity(total);
        while let Some((index, joined)) = pending.next().await {
            match joined {
                Ok(Ok(result)) => results.push(result),
                Ok(Err(e)) => {
                    warn!("Image task {} could not start: {}", index, e);
                    results.push(ImageResult::rejected(index));
                }
                Err(e) => {
                    warn!("Image task {} failed: {}", index, e);
                    results.push(ImageResult::rejected(index));
                }
            }
        }
        results
    }
}
