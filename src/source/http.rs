//! Plain-request collaborators: one GET per page, parsed with CSS selectors.

use std::path::Path;

use async_trait::async_trait;
use log::{debug, info};
use reqwest::Client;
use scraper::{Html, Selector};
use url::Url;

use crate::error::{Error, Result};
use crate::source::{
    ChapterIndexer, IndexSelectors, PAGE_IMAGE_SELECTORS, PageFetcher, build_client,
    finalize_chapter_list, looks_like_chapter_link, resolve_url, write_debug_page,
};
use crate::types::Chapter;

const MODE: &str = "request";

fn parse_selector(raw: &str) -> Result<Selector> {
    Selector::parse(raw).map_err(|e| Error::Other(format!("Invalid selector '{}': {}", raw, e)))
}

/// Extracts chapter links from a series page.
///
/// Matches of the first selector are taken as-is unless `strict` is set; matches of the
/// fallback selectors always have to pass [`looks_like_chapter_link`]. The first selector
/// with at least one match wins. Returns the links in document order.
pub fn extract_chapters(
    html: &str,
    base: &Url,
    selectors: &IndexSelectors,
    strict: bool,
) -> Result<Vec<Chapter>> {
    let document = Html::parse_document(html);

    for (position, raw) in selectors.iter().enumerate() {
        let selector = parse_selector(raw)?;
        let elements: Vec<_> = document.select(&selector).collect();
        if elements.is_empty() {
            continue;
        }
        if position > 0 {
            info!("Found chapters using selector: {}", raw);
        }
        info!("Found {} potential chapters", elements.len());

        let filter = strict || position > 0;
        let chapters = elements
            .into_iter()
            .filter_map(|element| {
                let title = element.text().collect::<String>().trim().to_string();
                let href = element.value().attr("href")?;
                if filter && !looks_like_chapter_link(&title, href) {
                    return None;
                }
                let url = resolve_url(base, href)?;
                Some(Chapter::new(title, url))
            })
            .collect();
        return Ok(chapters);
    }

    Ok(Vec::new())
}

/// Extracts image sources from a chapter page, trying [`PAGE_IMAGE_SELECTORS`] in order.
pub fn extract_image_urls(html: &str, base: &Url) -> Result<Vec<String>> {
    let document = Html::parse_document(html);

    for raw in PAGE_IMAGE_SELECTORS {
        let selector = parse_selector(raw)?;
        let urls: Vec<String> = document
            .select(&selector)
            .filter_map(|img| img.value().attr("src"))
            .filter_map(|src| resolve_url(base, src))
            .collect();
        if !urls.is_empty() {
            return Ok(urls);
        }
    }
    Ok(Vec::new())
}

/// Fetches a chapter page over HTTP and reads its `<img>` sources.
#[derive(Debug, Clone)]
pub struct HttpPageFetcher {
    client: Client,
    base_url: Url,
}

impl HttpPageFetcher {
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self::with_client(build_client()?, Url::parse(base_url)?))
    }

    pub fn with_client(client: Client, base_url: Url) -> Self {
        Self { client, base_url }
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    fn mode(&self) -> &'static str {
        MODE
    }

    fn page_url(&self, chapter_url: &str) -> String {
        self.base_url
            .join(chapter_url)
            .map(String::from)
            .unwrap_or_else(|_| chapter_url.to_string())
    }

    async fn image_urls(&self, chapter_url: &str, chapter_dir: &Path) -> Result<Vec<String>> {
        let page_url = self.base_url.join(chapter_url)?;
        debug!("GET {}", page_url);
        let html = self
            .client
            .get(page_url.clone())
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let urls = extract_image_urls(&html, &page_url)?;
        if urls.is_empty() {
            write_debug_page(chapter_dir.join("debug_page.html"), &html).await;
        }
        Ok(urls)
    }
}

/// Fetches a series page over HTTP and reads its chapter links.
#[derive(Debug, Clone)]
pub struct HttpChapterIndexer {
    client: Client,
    selectors: IndexSelectors,
}

impl HttpChapterIndexer {
    pub fn new() -> Result<Self> {
        Ok(Self::with_client(build_client()?))
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            selectors: IndexSelectors::primary_only(),
        }
    }

    /// Replaces the selector strategy.
    pub fn selectors(mut self, selectors: IndexSelectors) -> Self {
        self.selectors = selectors;
        self
    }
}

#[async_trait]
impl ChapterIndexer for HttpChapterIndexer {
    fn mode(&self) -> &'static str {
        MODE
    }

    async fn index(&self, series_url: &str, output_root: &Path) -> Result<Vec<Chapter>> {
        info!("Fetching chapter information from: {}", series_url);
        let base = Url::parse(series_url)?;
        let html = self
            .client
            .get(base.clone())
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let chapters = extract_chapters(&html, &base, &self.selectors, false)?;
        if chapters.is_empty() {
            let dump = output_root.join(format!("debug_page_{}.html", MODE));
            write_debug_page(dump.clone(), &html).await;
            return Err(Error::DiscoveryFailed(format!(
                "no chapter elements found on {} (page saved to {:?})",
                series_url, dump
            )));
        }

        let chapters = finalize_chapter_list(chapters);
        info!("Found {} unique chapters", chapters.len());
        Ok(chapters)
    }
}
