use std::fs::File;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::generator::Generator;
use crate::path_utils::path_to_string_lossy;
use crate::types::get_file_info;
use async_trait::async_trait;
use epub_builder::{EpubBuilder, EpubContent, EpubVersion, ReferenceType, ZipLibrary};
use memmap2::MmapOptions;
use tokio::task::spawn_blocking;

/// Generates the XHTML wrapper for one image page.
///
/// # Arguments
///
/// * `image_source` - Path of the image relative to the EPUB content root
/// * `page_title` - Title used for the page and its alt text
fn generate_xhtml(image_source: &str, page_title: &str) -> String {
    const TEMPLATE: &str = include_str!("../../templates/Epub.xhtml");
    TEMPLATE
        .replace("%title%", page_title)
        .replace("%src%", image_source)
        .replace("%alt%", page_title)
}

/// A generator for EPUB 3 ebooks, one XHTML page per image.
pub struct EPub {
    epub: EpubBuilder<ZipLibrary>,
    output_path: PathBuf,
    page_count: usize,
}

impl EPub {
    /// Sets the cover image for the EPUB file.
    pub fn set_cover(&mut self, cover_image_path: &Path) -> Result<&mut Self> {
        let (cover_extension, cover_mime) = get_file_info(cover_image_path)?;

        let cover_file = File::open(cover_image_path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to open cover image '{}': {}",
                    path_to_string_lossy(cover_image_path),
                    e
                ),
            ))
        })?;

        let internal_cover_path = format!("images/cover.{}", cover_extension);
        self.epub
            .add_cover_image(internal_cover_path, cover_file, cover_mime)?;
        Ok(self)
    }

    /// Adds a resource to the EPUB using memory mapping for efficient handling of large files.
    ///
    /// # Arguments
    ///
    /// * `resource_path` - Path of the resource inside the EPUB (e.g., "images/page_001.jpg")
    /// * `image_path` - Path to the image file on the filesystem
    pub async fn add_resource_mmap(
        &mut self,
        resource_path: &str,
        image_path: &Path,
    ) -> Result<&mut Self> {
        let (_, image_mime) = get_file_info(image_path)?;

        let file = tokio::fs::File::open(image_path).await.map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to open image file '{}': {}",
                    path_to_string_lossy(image_path),
                    e
                ),
            ))
        })?;

        let file_std = file.into_std().await;
        let mmap = spawn_blocking(move || unsafe { MmapOptions::new().map(&file_std) })
            .await
            .map_err(|e| Error::AsyncTaskError(e.to_string()))??;

        self.epub
            .add_resource(resource_path, Cursor::new(&mmap[..]), image_mime)?;

        Ok(self)
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }
}

#[async_trait]
impl Generator for EPub {
    fn new(output_dir: &Path, base_filename: &str) -> Result<Self> {
        let mut epub = EpubBuilder::new(ZipLibrary::new()?)?;

        epub.epub_version(EpubVersion::V30);

        epub.stylesheet(include_bytes!("../../templates/Epub.css").as_slice())?;

        if !output_dir.exists() {
            std::fs::create_dir_all(output_dir)?;
        }

        Ok(EPub {
            epub,
            output_path: output_dir.join(format!("{}.epub", base_filename)),
            page_count: 0,
        })
    }

    async fn add_page(&mut self, image_path: &Path) -> Result<&mut Self> {
        let (image_extension, _) = get_file_info(image_path)?;

        let number = self.page_count + 1;
        let image_name = format!("images/page_{:03}.{}", number, image_extension);
        let page_title = format!("Page {}", number);
        let xhtml_content = generate_xhtml(&image_name, &page_title);

        self.add_resource_mmap(&image_name, image_path).await?;

        let mut content = EpubContent::new(
            format!("pages/page_{:03}.xhtml", number),
            xhtml_content.as_bytes(),
        )
        .title(&page_title);
        if number == 1 {
            content = content.reftype(ReferenceType::Text);
        }
        self.epub.add_content(content)?;

        self.page_count = number;
        Ok(self)
    }

    async fn set_metadata(
        &mut self,
        title: &str,
        source_url: Option<&str>,
        _total_pages: usize,
    ) -> Result<&mut Self> {
        self.epub.metadata("title", title)?;
        self.epub.metadata("lang", "en")?;
        self.epub.metadata("generator", "yomikomi")?;
        if let Some(url) = source_url {
            self.epub.metadata("description", format!("Source: {}", url))?;
        }
        Ok(self)
    }

    async fn save(mut self) -> Result<PathBuf> {
        let file = File::create(&self.output_path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to create EPUB file '{}': {}",
                    path_to_string_lossy(&self.output_path),
                    e
                ),
            ))
        })?;

        self.epub.generate(file)?;
        Ok(self.output_path)
    }
}
