use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use printpdf::image_crate::{self, DynamicImage, GenericImageView};
use printpdf::{Image, ImageTransform, Mm, PdfDocument};
use tokio::task::spawn_blocking;

use crate::error::{Error, Result};
use crate::generator::Generator;
use crate::path_utils::path_to_string_lossy;
use crate::types::{DOCUMENT_EXTENSIONS, get_file_info};

/// Resolution pages are laid out at; each page is exactly as large as its image.
const PDF_DPI: f32 = 96.0;

fn px_to_mm(px: u32) -> Mm {
    Mm(px as f32 * 25.4 / PDF_DPI)
}

/// A generator for paginated PDF documents, one full-page image per page.
///
/// Only JPEG and PNG pages are accepted. Pages are decoded and laid out when the document
/// is saved.
pub struct Pdf {
    output_path: PathBuf,
    title: String,
    pages: Vec<PathBuf>,
}

impl Pdf {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

fn load_page(path: &Path) -> Result<DynamicImage> {
    let image = image_crate::open(path).map_err(|e| {
        Error::Pdf(format!(
            "Failed to decode page '{}': {}",
            path_to_string_lossy(path),
            e
        ))
    })?;
    Ok(DynamicImage::ImageRgb8(image.to_rgb8()))
}

fn render(title: &str, pages: &[PathBuf], output_path: &Path) -> Result<()> {
    let Some((first, rest)) = pages.split_first() else {
        return Err(Error::Unsupported("PDF without pages".to_string()));
    };

    let first_image = load_page(first)?;
    let (doc, page, layer) = PdfDocument::new(
        title,
        px_to_mm(first_image.width()),
        px_to_mm(first_image.height()),
        "Page 1",
    );
    let transform = || ImageTransform {
        dpi: Some(PDF_DPI),
        ..Default::default()
    };
    Image::from_dynamic_image(&first_image)
        .add_to_layer(doc.get_page(page).get_layer(layer), transform());
    drop(first_image);

    for (i, path) in rest.iter().enumerate() {
        let image = load_page(path)?;
        let (page, layer) = doc.add_page(
            px_to_mm(image.width()),
            px_to_mm(image.height()),
            format!("Page {}", i + 2),
        );
        Image::from_dynamic_image(&image)
            .add_to_layer(doc.get_page(page).get_layer(layer), transform());
    }

    let file = File::create(output_path)?;
    doc.save(&mut BufWriter::new(file))
        .map_err(|e| Error::Pdf(e.to_string()))
}

#[async_trait]
impl Generator for Pdf {
    fn new(output_dir: &Path, base_filename: &str) -> Result<Self> {
        if !output_dir.exists() {
            std::fs::create_dir_all(output_dir)?;
        }

        Ok(Pdf {
            output_path: output_dir.join(format!("{}.pdf", base_filename)),
            title: base_filename.to_string(),
            pages: Vec::new(),
        })
    }

    async fn add_page(&mut self, image_path: &Path) -> Result<&mut Self> {
        let (image_extension, _) = get_file_info(image_path)?;
        if !DOCUMENT_EXTENSIONS.contains(&image_extension) {
            return Err(Error::Unsupported(format!(
                "PDF page format '{}'",
                image_extension
            )));
        }
        self.pages.push(image_path.to_path_buf());
        Ok(self)
    }

    async fn set_metadata(
        &mut self,
        title: &str,
        _source_url: Option<&str>,
        _total_pages: usize,
    ) -> Result<&mut Self> {
        self.title = title.to_string();
        Ok(self)
    }

    async fn save(self) -> Result<PathBuf> {
        let Pdf {
            output_path,
            title,
            pages,
        } = self;

        spawn_blocking(move || render(&title, &pages, &output_path).map(|_| output_path))
            .await
            .map_err(|e| Error::AsyncTaskError(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_only_jpeg_and_png_pages() {
        let dir = std::env::temp_dir().join("yomikomi-pdf-pages");
        let mut pdf = Pdf::new(&dir, "Chapter").unwrap();
        assert!(pdf.add_page(Path::new("001.jpg")).await.is_ok());
        assert!(pdf.add_page(Path::new("002.PNG")).await.is_ok());
        assert!(matches!(
            pdf.add_page(Path::new("003.webp")).await,
            Err(Error::Unsupported(_))
        ));
        assert_eq!(pdf.page_count(), 2);
        assert_eq!(pdf.output_path, dir.join("Chapter.pdf"));
    }

    #[test]
    fn test_px_to_mm() {
        assert!((px_to_mm(96).0 - 25.4).abs() < 1e-4);
    }
}
