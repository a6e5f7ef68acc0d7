//! Collaborators that talk to the content site.
//!
//! The download core only sees three capabilities:
//! - [`ImageSource`]: raw bytes for one image URL, sent with a referer
//! - [`PageFetcher`]: the ordered image URLs of one chapter page
//! - [`ChapterIndexer`]: the chapter list of a series page
//!
//! Plain-request implementations live in [`http`]. With the `browser` feature, headless
//! Chrome implementations live in `browser`. Which one runs is decided when the
//! pipeline is configured, never inside the download logic.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use reqwest::header::REFERER;
use url::Url;

use crate::error::{Error, Result};
use crate::path_utils::path_to_string_lossy;
use crate::types::Chapter;

#[cfg(feature = "browser")]
pub mod browser;
pub mod http;

/// Site the relative chapter links are resolved against when no page URL is at hand.
pub const DEFAULT_BASE_URL: &str = "https://mangapark.net";

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Retrieves the raw bytes of a single image.
#[async_trait]
pub trait ImageSource: Send + Sync {
    /// Fetches `url`, sending `referer` as the `Referer` header.
    ///
    /// Transport failures and non-success statuses are errors.
    async fn fetch(&self, url: &str, referer: &str) -> Result<Vec<u8>>;
}

/// Retrieves the ordered list of image URLs shown on a chapter page.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Short label used in logs and debug file names (e.g. `"request"`).
    fn mode(&self) -> &'static str;

    /// The absolute address of a chapter page, also sent as the referer for its images.
    fn page_url(&self, chapter_url: &str) -> String {
        chapter_url.to_string()
    }

    /// Returns the chapter's image URLs in page order.
    ///
    /// An empty list means the page held no images; implementations dump the page to
    /// `chapter_dir/debug_page.html` in that case.
    async fn image_urls(&self, chapter_url: &str, chapter_dir: &Path) -> Result<Vec<String>>;
}

/// Discovers the chapters of a series page.
#[async_trait]
pub trait ChapterIndexer: Send + Sync {
    /// Short label used in logs and debug file names (e.g. `"request"`).
    fn mode(&self) -> &'static str;

    /// Returns the chapters with the first chapter at index 0, deduplicated by URL.
    ///
    /// When no chapter links are found the page is dumped to
    /// `output_root/debug_page_<mode>.html` and [`Error::DiscoveryFailed`] is returned.
    async fn index(&self, series_url: &str, output_root: &Path) -> Result<Vec<Chapter>>;
}

/// CSS selectors tried in order when looking for chapter links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSelectors {
    pub primary: String,
    pub fallbacks: Vec<String>,
}

impl IndexSelectors {
    /// Only the site's own chapter-link class.
    pub fn primary_only() -> Self {
        Self {
            primary: r"a.link-hover.link-primary.visited\:text-accent".to_string(),
            fallbacks: Vec::new(),
        }
    }

    /// The site class followed by progressively looser link patterns.
    pub fn with_fallbacks() -> Self {
        Self {
            fallbacks: vec![
                r#"a[href*="/title/"][href*="/chapter"]"#.to_string(),
                r#"a[href*="/c"]"#.to_string(),
                ".chapter-list a".to_string(),
                "[data-mal-sync-episode] a".to_string(),
                r#"a[href*="chapter"]"#.to_string(),
            ],
            ..Self::primary_only()
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary.as_str()).chain(self.fallbacks.iter().map(|s| s.as_str()))
    }
}

impl Default for IndexSelectors {
    fn default() -> Self {
        Self::primary_only()
    }
}

/// CSS selectors tried in order when looking for page images.
pub const PAGE_IMAGE_SELECTORS: &[&str] = &["img.w-full.h-full", "main img"];

/// Builds the shared HTTP client used by the request-mode collaborators.
pub fn build_client() -> Result<Client> {
    Ok(Client::builder()
        .user_agent(DEFAULT_USER_AGENT)
        .timeout(DEFAULT_TIMEOUT)
        .build()?)
}

/// Plain HTTP image retrieval.
#[derive(Debug, Clone)]
pub struct HttpImageSource {
    client: Client,
}

impl HttpImageSource {
    pub fn new() -> Result<Self> {
        Ok(Self::with_client(build_client()?))
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ImageSource for HttpImageSource {
    async fn fetch(&self, url: &str, referer: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .header(REFERER, referer)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus(url.to_string(), status.as_u16()));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

/// Resolves `href` against `base`, keeping absolute `http(s)` links as they are.
pub fn resolve_url(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    if href.starts_with("http") {
        return Some(href.to_string());
    }
    base.join(href).ok().map(|u| u.to_string())
}

/// The looser link filter applied to fallback matches.
pub fn looks_like_chapter_link(title: &str, href: &str) -> bool {
    title.chars().count() >= 3 && (href.contains("/title/") || href.contains("/c"))
}

/// Removes URL duplicates (first occurrence wins) and reverses so the oldest chapter is first.
pub fn finalize_chapter_list(chapters: Vec<Chapter>) -> Vec<Chapter> {
    let mut seen = HashSet::new();
    let mut unique: Vec<Chapter> = chapters
        .into_iter()
        .filter(|c| seen.insert(c.url.clone()))
        .collect();
    unique.reverse();
    unique
}

/// Writes a page dump for diagnosis. Failures are logged, never returned.
pub async fn write_debug_page(path: PathBuf, html: &str) -> Option<PathBuf> {
    if let Some(parent) = path.parent() {
        if let Err(e) = tokio::fs::create_dir_all(parent).await {
            warn!("Could not create debug directory {:?}: {}", parent, e);
            return None;
        }
    }
    match tokio::fs::write(&path, html).await {
        Ok(()) => {
            debug!("Debug page saved to: {}", path_to_string_lossy(&path));
            Some(path)
        }
        Err(e) => {
            warn!("Could not save debug page {:?}: {}", path, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_url() {
        let base = Url::parse("https://mangapark.net/title/123-series").unwrap();
        assert_eq!(
            resolve_url(&base, "/title/123-series/c1").as_deref(),
            Some("https://mangapark.net/title/123-series/c1")
        );
        assert_eq!(
            resolve_url(&base, "https://cdn.example/1.jpg").as_deref(),
            Some("https://cdn.example/1.jpg")
        );
        assert_eq!(resolve_url(&base, "  "), None);
    }

    #[test]
    fn test_looks_like_chapter_link() {
        assert!(looks_like_chapter_link("Ch.1", "/title/1/c1"));
        assert!(!looks_like_chapter_link("1", "/title/1/c1"));
        assert!(!looks_like_chapter_link("About us", "/about"));
    }

    #[test]
    fn test_finalize_chapter_list() {
        let chapters = vec![
            Chapter::new("Ch.3", "u3"),
            Chapter::new("Ch.2", "u2"),
            Chapter::new("Ch.3 again", "u3"),
            Chapter::new("Ch.1", "u1"),
        ];
        let result = finalize_chapter_list(chapters);
        assert_eq!(
            result,
            vec![
                Chapter::new("Ch.1", "u1"),
                Chapter::new("Ch.2", "u2"),
                Chapter::new("Ch.3", "u3"),
            ]
        );
    }

    #[test]
    fn test_selector_order() {
        let selectors = IndexSelectors::with_fallbacks();
        let all: Vec<&str> = selectors.iter().collect();
        assert_eq!(all.len(), 6);
        assert!(all[0].starts_with("a.link-hover"));
        assert_eq!(IndexSelectors::default().iter().count(), 1);
    }
}
