//! Common test utilities for the Yomikomi crate.
//!
//! Provides test directory setup, generated page and icon images, and in-memory
//! implementations of the site traits so the whole pipeline runs without a network.

use async_trait::async_trait;
use image::{ImageFormat, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng, distributions::Alphanumeric};
use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::fs;
use yomikomi::error::{Error, Result};
use yomikomi::prelude::*;
use yomikomi::progress::ProgressEvent;

#[allow(dead_code)]
pub const TEST_TMP_DIR: &str = "tests/tmp";
#[allow(dead_code)]
pub const TEST_TIMEOUT: Duration = Duration::from_secs(30);
#[allow(dead_code)]
pub const LONG_TEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Creates a fresh, uniquely named output root under `tests/tmp`.
#[allow(dead_code)]
pub async fn setup_test_dir(sub_path: &str) -> PathBuf {
    let rand_string: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();
    let test_dir = PathBuf::from(TEST_TMP_DIR).join(format!("{}-{}", sub_path, rand_string));
    if test_dir.exists() {
        fs::remove_dir_all(&test_dir).await.unwrap();
    }
    fs::create_dir_all(&test_dir).await.unwrap();
    test_dir
}

fn noise_image(width: u32, height: u32, seed: u64) -> RgbImage {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut buf = vec![0u8; (width * height * 3) as usize];
    rng.fill(&mut buf[..]);
    RgbImage::from_raw(width, height, buf).unwrap()
}

fn encode(img: &RgbImage, format: ImageFormat) -> Vec<u8> {
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), format).unwrap();
    bytes
}

/// A tall noise page that passes every validator threshold.
#[allow(dead_code)]
pub fn page_png(seed: u64) -> Vec<u8> {
    encode(&noise_image(420, 560, seed), ImageFormat::Png)
}

/// Same as [`page_png`], JPEG encoded.
#[allow(dead_code)]
pub fn page_jpeg(seed: u64) -> Vec<u8> {
    encode(&noise_image(420, 560, seed), ImageFormat::Jpeg)
}

/// Same as [`page_png`], lossless WebP encoded.
#[allow(dead_code)]
pub fn page_webp(seed: u64) -> Vec<u8> {
    encode(&noise_image(420, 560, seed), ImageFormat::WebP)
}

/// A 64x64 icon the validator rejects.
#[allow(dead_code)]
pub fn icon_png() -> Vec<u8> {
    encode(&noise_image(64, 64, 7), ImageFormat::Png)
}

fn jitter(max_delay_ms: u64) -> Duration {
    if max_delay_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..=max_delay_ms))
}

/// What [`MockImageSource`] answers for one URL.
#[derive(Debug, Clone)]
pub enum MockImage {
    Bytes(Vec<u8>),
    Fail,
}

/// In-memory image host with random per-request latency.
///
/// Unknown URLs fail. Tracks the number of requests and the peak number of requests
/// in flight at once.
#[derive(Debug, Default)]
pub struct MockImageSource {
    images: HashMap<String, MockImage>,
    max_delay_ms: u64,
    requests: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    referers: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl MockImageSource {
    pub fn new(max_delay_ms: u64) -> Self {
        Self {
            max_delay_ms,
            ..Default::default()
        }
    }

    pub fn insert(&mut self, url: impl Into<String>, image: MockImage) {
        self.images.insert(url.into(), image);
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn referers(&self) -> Vec<String> {
        self.referers.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageSource for MockImageSource {
    async fn fetch(&self, url: &str, referer: &str) -> Result<Vec<u8>> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.referers.lock().unwrap().push(referer.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(jitter(self.max_delay_ms)).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        match self.images.get(url) {
            Some(MockImage::Bytes(bytes)) => Ok(bytes.clone()),
            Some(MockImage::Fail) => Err(Error::HttpStatus(url.to_string(), 503)),
            None => Err(Error::HttpStatus(url.to_string(), 404)),
        }
    }
}

/// Maps chapter URLs to image URL lists. Unknown chapters fail discovery.
///
/// Relative chapter URLs resolve against `base` when one is set. Tracks the peak number
/// of discovery calls in flight at once.
#[derive(Debug, Default)]
pub struct MockPageFetcher {
    pages: HashMap<String, Vec<String>>,
    base: Option<String>,
    delay: Duration,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

#[allow(dead_code)]
impl MockPageFetcher {
    pub fn insert(&mut self, chapter_url: impl Into<String>, image_urls: Vec<String>) {
        self.pages.insert(chapter_url.into(), image_urls);
    }

    pub fn set_base(&mut self, base: impl Into<String>) {
        self.base = Some(base.into());
    }

    pub fn set_delay(&mut self, delay: Duration) {
        self.delay = delay;
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetcher for MockPageFetcher {
    fn mode(&self) -> &'static str {
        "mock"
    }

    fn page_url(&self, chapter_url: &str) -> String {
        match &self.base {
            Some(base) if chapter_url.starts_with('/') => format!("{}{}", base, chapter_url),
            _ => chapter_url.to_string(),
        }
    }

    async fn image_urls(&self, chapter_url: &str, _chapter_dir: &Path) -> Result<Vec<String>> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.pages
            .get(chapter_url)
            .cloned()
            .ok_or_else(|| Error::DiscoveryFailed(chapter_url.to_string()))
    }
}

/// Returns a fixed chapter list.
#[derive(Debug, Default)]
pub struct MockChapterIndexer {
    pub chapters: Vec<Chapter>,
}

#[async_trait]
impl ChapterIndexer for MockChapterIndexer {
    fn mode(&self) -> &'static str {
        "mock"
    }

    async fn index(&self, series_url: &str, _output_root: &Path) -> Result<Vec<Chapter>> {
        if self.chapters.is_empty() {
            return Err(Error::DiscoveryFailed(series_url.to_string()));
        }
        Ok(self.chapters.clone())
    }
}

/// Records every progress event.
#[derive(Debug, Default)]
pub struct MemoryProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

#[allow(dead_code)]
impl MemoryProgress {
    pub fn lines(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::Line(l) => Some(l.clone()),
                ProgressEvent::Percent(_) => None,
            })
            .collect()
    }

    pub fn percents(&self) -> Vec<u8> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::Percent(p) => Some(*p),
                ProgressEvent::Line(_) => None,
            })
            .collect()
    }

    pub fn has_line(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.contains(needle))
    }
}

impl ProgressSink for MemoryProgress {
    fn line(&self, message: &str) {
        self.events
            .lock()
            .unwrap()
            .push(ProgressEvent::Line(message.to_string()));
    }

    fn percent(&self, value: u8) {
        self.events
            .lock()
            .unwrap()
            .push(ProgressEvent::Percent(value));
    }
}

/// Forwards to a [`MemoryProgress`] and deletes `target` the first time a line contains
/// every one of `triggers`.
#[derive(Debug)]
pub struct RemovingProgress {
    pub inner: Arc<MemoryProgress>,
    triggers: Vec<String>,
    target: PathBuf,
    fired: Mutex<bool>,
}

#[allow(dead_code)]
impl RemovingProgress {
    pub fn new(inner: Arc<MemoryProgress>, triggers: &[&str], target: PathBuf) -> Self {
        Self {
            inner,
            triggers: triggers.iter().map(|t| t.to_string()).collect(),
            target,
            fired: Mutex::new(false),
        }
    }
}

impl ProgressSink for RemovingProgress {
    fn line(&self, message: &str) {
        self.inner.line(message);
        let mut fired = self.fired.lock().unwrap();
        if !*fired && self.triggers.iter().all(|t| message.contains(t.as_str())) {
            *fired = true;
            std::fs::remove_dir_all(&self.target).unwrap();
        }
    }

    fn percent(&self, value: u8) {
        self.inner.percent(value);
    }
}

/// One chapter of a fake site: its title and the images its page lists, in page order.
#[derive(Debug, Clone)]
pub struct FakeChapter {
    pub title: String,
    pub images: Vec<MockImage>,
}

#[allow(dead_code)]
impl FakeChapter {
    pub fn new(title: &str, images: Vec<MockImage>) -> Self {
        Self {
            title: title.to_string(),
            images,
        }
    }

    fn url(&self, position: usize) -> String {
        format!("https://site.test/title/1/c{}", position)
    }
}

/// Wires a set of fake chapters into a page fetcher, an image source and a chapter list.
#[allow(dead_code)]
pub fn fake_site(
    chapters: &[FakeChapter],
    max_delay_ms: u64,
) -> (MockPageFetcher, MockImageSource, Vec<Chapter>) {
    let mut fetcher = MockPageFetcher::default();
    let mut source = MockImageSource::new(max_delay_ms);
    let mut list = Vec::new();

    for (position, chapter) in chapters.iter().enumerate() {
        let chapter_url = chapter.url(position + 1);
        let mut urls = Vec::new();
        for (i, image) in chapter.images.iter().enumerate() {
            let ext = match image {
                MockImage::Bytes(bytes) if bytes.starts_with(&[0x89, b'P', b'N', b'G']) => "png",
                MockImage::Bytes(bytes) if bytes.starts_with(b"RIFF") => "webp",
                _ => "jpg",
            };
            let url = format!("https://cdn.test/{}/{}.{}?t=1", position + 1, i, ext);
            source.insert(url.clone(), image.clone());
            urls.push(url);
        }
        fetcher.insert(chapter_url.clone(), urls);
        list.push(Chapter::new(chapter.title.clone(), chapter_url));
    }
    (fetcher, source, list)
}

/// Regular file names in `dir`, sorted.
#[allow(dead_code)]
pub async fn file_names(dir: &Path) -> Vec<String> {
    let mut names = Vec::new();
    let mut entries = fs::read_dir(dir).await.unwrap();
    while let Some(entry) = entries.next_entry().await.unwrap() {
        if entry.file_type().await.unwrap().is_file() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
    }
    names.sort();
    names
}

/// Entry names of a ZIP file (CBZ or EPUB), in archive order.
#[allow(dead_code)]
pub async fn zip_entry_names(path: &Path) -> Vec<String> {
    assert!(path.is_file(), "Output ZIP file does not exist: {:?}", path);
    let file = fs::File::open(path).await.unwrap();
    let file_std = file.into_std().await;
    let mut zip = zip::ZipArchive::new(file_std).unwrap();
    (0..zip.len())
        .map(|i| zip.by_index(i).unwrap().name().to_string())
        .collect()
}

/// Reads one entry of a ZIP file as bytes.
#[allow(dead_code)]
pub async fn zip_entry_bytes(path: &Path, name: &str) -> Vec<u8> {
    let file = fs::File::open(path).await.unwrap();
    let file_std = file.into_std().await;
    let mut archive = zip::ZipArchive::new(file_std).unwrap();
    let mut entry = archive.by_name(name).unwrap();
    let mut content = Vec::new();
    std::io::Read::read_to_end(&mut entry, &mut content).unwrap();
    content
}
