use crate::error::{Error, Result};
use crate::generator::Generator;
use crate::path_utils::{get_file_name_lossy, path_to_string_lossy};
use crate::types::get_file_info;
use async_trait::async_trait;
use chrono::prelude::*;
use memmap2::MmapOptions;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::task::spawn_blocking;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// A generator for creating CBZ (Comic Book ZIP) files.
///
/// Pages are stored flat under their own file names, so a chapter directory of
/// `001.jpg`, `002.png`, ... becomes an archive with exactly those entries.
pub struct Cbz {
    zip: Option<ZipWriter<File>>,
    options: SimpleFileOptions,
    output_path: PathBuf,
    page_count: usize,
}

impl Cbz {
    /// Number of pages added so far.
    pub fn page_count(&self) -> usize {
        self.page_count
    }
}

#[async_trait]
impl Generator for Cbz {
    fn new(output_dir: &Path, base_filename: &str) -> Result<Self> {
        let options: SimpleFileOptions = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(0o644);

        if !output_dir.exists() {
            std::fs::create_dir_all(output_dir)?;
        }

        let output_path = output_dir.join(format!("{}.cbz", base_filename));
        let file = File::create(&output_path)?;

        Ok(Cbz {
            zip: Some(ZipWriter::new(file)),
            options,
            output_path,
            page_count: 0,
        })
    }

    async fn add_page(&mut self, image_path: &Path) -> Result<&mut Self> {
        get_file_info(image_path)?;

        let file = fs::File::open(image_path).await.map_err(|e| {
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
        let options = self.options;
        let file_name = get_file_name_lossy(image_path);

        let zip = match self.zip.as_mut() {
            Some(z) => z,
            None => {
                return Err(Error::Unsupported("Zip writer not available".to_string()));
            }
        };

        // Create the read-only memory map
        let mmap = spawn_blocking(move || unsafe { MmapOptions::new().map(&file_std) })
            .await
            .map_err(|e| Error::AsyncTaskError(e.to_string()))??;

        zip.start_file(file_name, options)?;
        zip.write_all(&mmap[..])?;

        self.page_count += 1;
        Ok(self)
    }

    async fn set_metadata(
        &mut self,
        title: &str,
        source_url: Option<&str>,
        total_pages: usize,
    ) -> Result<&mut Self> {
        const TEMPLATE: &str = include_str!("../../templates/ComicInfo.xml");

        let escape_xml = |text: &str| -> String {
            text.replace('&', "&amp;")
                .replace('<', "&lt;")
                .replace('>', "&gt;")
                .replace('"', "&quot;")
                .replace('\'', "&apos;")
        };

        let now = Local::now();
        let xml = TEMPLATE
            .replace("%title%", &escape_xml(title))
            .replace("%pagecount%", &total_pages.to_string())
            .replace("%year%", &now.year().to_string())
            .replace("%month%", &now.month().to_string())
            .replace("%day%", &now.day().to_string())
            .replace("%web%", &escape_xml(source_url.unwrap_or("")));

        let zip = match self.zip.as_mut() {
            Some(z) => z,
            None => {
                return Err(Error::Unsupported("Zip writer not available".to_string()));
            }
        };

        zip.start_file("ComicInfo.xml", self.options)?;
        zip.write_all(xml.as_bytes())?;

        Ok(self)
    }

    async fn save(mut self) -> Result<PathBuf> {
        let zip = match self.zip.take() {
            Some(z) => z,
            None => {
                return Err(Error::Unsupported("Zip writer not available".to_string()));
            }
        };

        // Finish writing the zip file in a blocking task
        spawn_blocking(move || zip.finish().map(|_| ()).map_err(Error::Zip))
            .await
            .map_err(|e| Error::AsyncTaskError(e.to_string()))??;

        Ok(self.output_path)
    }
}
