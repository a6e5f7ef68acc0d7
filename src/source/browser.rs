//! Headless Chrome collaborators for pages that only render their content with JavaScript.
//!
//! Each call launches its own browser, switches the site's safe-browsing setting to show
//! all content, loads the page and waits for it to render. Everything here is blocking and
//! runs inside `spawn_blocking`.

use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;

use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use log::{info, warn};
use tokio::task::spawn_blocking;
use url::Url;

use crate::error::{Error, Result};
use crate::source::http::extract_chapters;
use crate::source::{
    ChapterIndexer, IndexSelectors, PAGE_IMAGE_SELECTORS, PageFetcher, finalize_chapter_list,
    resolve_url, write_debug_page,
};
use crate::types::Chapter;

const MODE: &str = "browser";
const SETTINGS_PATH: &str = "/site-settings?group=safeBrowsing";
const ALL_CONTENT_RADIO: &str = r#"input[type="radio"][name="safe_reading"][value="2"]"#;
const SERIES_RENDER_WAIT: Duration = Duration::from_secs(8);
const CHAPTER_RENDER_WAIT: Duration = Duration::from_secs(5);
const IMAGE_WAIT_TIMEOUT: Duration = Duration::from_secs(20);

fn browser_err(e: impl std::fmt::Display) -> Error {
    Error::Browser(e.to_string())
}

fn launch(base_url: &Url) -> Result<(Browser, Arc<Tab>)> {
    let options = LaunchOptions::default_builder()
        .headless(true)
        .window_size(Some((1920, 1080)))
        .args(vec![
            OsStr::new("--disable-gpu"),
            OsStr::new("--disable-web-security"),
            OsStr::new("--disable-features=VizDisplayCompositor"),
        ])
        .build()
        .map_err(browser_err)?;
    let browser = Browser::new(options).map_err(browser_err)?;
    let tab = browser.new_tab().map_err(browser_err)?;

    if let Err(e) = enable_all_content(&tab, base_url) {
        warn!(
            "Could not enable the all-content setting, some chapters may be hidden: {}",
            e
        );
    }
    Ok((browser, tab))
}

fn enable_all_content(tab: &Tab, base_url: &Url) -> Result<()> {
    let settings = base_url.join(SETTINGS_PATH)?;
    tab.navigate_to(settings.as_str())
        .map_err(browser_err)?
        .wait_until_navigated()
        .map_err(browser_err)?;
    tab.wait_for_element_with_custom_timeout(ALL_CONTENT_RADIO, Duration::from_secs(10))
        .map_err(browser_err)?
        .click()
        .map_err(browser_err)?;
    sleep(Duration::from_secs(2));
    Ok(())
}

fn load(tab: &Tab, url: &str, settle: Duration) -> Result<()> {
    tab.navigate_to(url)
        .map_err(browser_err)?
        .wait_until_navigated()
        .map_err(browser_err)?;
    sleep(settle);
    Ok(())
}

/// Reads chapter image URLs from a rendered chapter page.
#[derive(Debug, Clone)]
pub struct BrowserPageFetcher {
    base_url: Url,
}

impl BrowserPageFetcher {
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            base_url: Url::parse(base_url)?,
        })
    }
}

#[async_trait]
impl PageFetcher for BrowserPageFetcher {
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
        let base_url = self.base_url.clone();

        let (urls, html) = spawn_blocking(move || -> Result<(Vec<String>, String)> {
            let (_browser, tab) = launch(&base_url)?;
            load(&tab, page_url.as_str(), CHAPTER_RENDER_WAIT)?;

            if let Err(e) =
                tab.wait_for_element_with_custom_timeout(PAGE_IMAGE_SELECTORS[0], IMAGE_WAIT_TIMEOUT)
            {
                info!("Timeout waiting for images: {}", e);
            }

            for selector in PAGE_IMAGE_SELECTORS {
                let elements = tab.find_elements(selector).unwrap_or_default();
                let urls: Vec<String> = elements
                    .iter()
                    .filter_map(|img| img.get_attribute_value("src").ok().flatten())
                    .filter_map(|src| resolve_url(&page_url, &src))
                    .collect();
                if !urls.is_empty() {
                    return Ok((urls, String::new()));
                }
            }
            let html = tab.get_content().map_err(browser_err)?;
            Ok((Vec::new(), html))
        })
        .await??;

        if urls.is_empty() {
            write_debug_page(chapter_dir.join("debug_page.html"), &html).await;
        }
        Ok(urls)
    }
}

/// Reads the chapter list from a rendered series page, with the looser fallback selectors.
#[derive(Debug, Clone)]
pub struct BrowserChapterIndexer {
    base_url: Url,
    selectors: IndexSelectors,
}

impl BrowserChapterIndexer {
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            base_url: Url::parse(base_url)?,
            selectors: IndexSelectors::with_fallbacks(),
        })
    }

    pub fn selectors(mut self, selectors: IndexSelectors) -> Self {
        self.selectors = selectors;
        self
    }
}

#[async_trait]
impl ChapterIndexer for BrowserChapterIndexer {
    fn mode(&self) -> &'static str {
        MODE
    }

    async fn index(&self, series_url: &str, output_root: &Path) -> Result<Vec<Chapter>> {
        info!("Fetching chapter information from: {}", series_url);
        let page_url = Url::parse(series_url)?;
        let base_url = self.base_url.clone();
        let target = page_url.to_string();

        let html = spawn_blocking(move || -> Result<String> {
            let (_browser, tab) = launch(&base_url)?;
            load(&tab, &target, SERIES_RENDER_WAIT)?;
            tab.get_content().map_err(browser_err)
        })
        .await??;

        let chapters = extract_chapters(&html, &page_url, &self.selectors, true)?;
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
