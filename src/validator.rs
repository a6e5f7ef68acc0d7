//! Content-page heuristics for downloaded images.
//!
//! Chapter pages carry site chrome alongside the real pages: icons, avatars, banners and
//! tracking pixels. These are small, near-square or tiny on disk. An image is kept only if
//! it decodes and passes all four thresholds below.

use std::fmt;
use std::io::Cursor;

use image::ImageReader;
use log::{debug, info};

/// Width must be strictly greater than this many pixels.
pub const MIN_WIDTH: u32 = 400;
/// Height must be strictly greater than this many pixels.
pub const MIN_HEIGHT: u32 = 400;
/// `max(w/h, h/w)` must be at least this.
pub const MIN_ASPECT_RATIO: f64 = 1.2;
/// Encoded size must be strictly greater than this many KB (1 KB = 1024 bytes).
pub const MIN_SIZE_KB: f64 = 30.0;

/// Why a decoded image was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    TooSmall,
    TooSquare,
    FileTooSmall,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::TooSmall => write!(f, "too small (minimum {}x{})", MIN_WIDTH, MIN_HEIGHT),
            Rejection::TooSquare => {
                write!(f, "too square-like (minimum aspect ratio {})", MIN_ASPECT_RATIO)
            }
            Rejection::FileTooSmall => write!(f, "file size too small"),
        }
    }
}

/// Measurements and verdict for one image.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub width: u32,
    pub height: u32,
    pub aspect_ratio: f64,
    pub size_kb: f64,
    pub rejections: Vec<Rejection>,
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        self.rejections.is_empty()
    }

    /// Comma-separated rejection reasons, empty when accepted.
    pub fn reasons(&self) -> String {
        self.rejections
            .iter()
            .map(|r| r.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Applies the thresholds to already-known dimensions and encoded size.
///
/// # Arguments
///
/// * `width` - Decoded width in pixels
/// * `height` - Decoded height in pixels
/// * `byte_len` - Length of the encoded buffer in bytes
pub fn evaluate(width: u32, height: u32, byte_len: usize) -> Verdict {
    let (w, h) = (width as f64, height as f64);
    let aspect_ratio = if width == 0 || height == 0 {
        0.0
    } else {
        (w / h).max(h / w)
    };
    let size_kb = byte_len as f64 / 1024.0;

    let mut rejections = Vec::new();
    if width <= MIN_WIDTH || height <= MIN_HEIGHT {
        rejections.push(Rejection::TooSmall);
    }
    if aspect_ratio < MIN_ASPECT_RATIO {
        rejections.push(Rejection::TooSquare);
    }
    if size_kb <= MIN_SIZE_KB {
        rejections.push(Rejection::FileTooSmall);
    }

    Verdict {
        width,
        height,
        aspect_ratio,
        size_kb,
        rejections,
    }
}

/// Reads the image header from `bytes` and evaluates it.
///
/// Returns `None` if the format cannot be guessed or the dimensions cannot be read.
pub fn inspect(bytes: &[u8]) -> Option<Verdict> {
    let reader = match ImageReader::new(Cursor::new(bytes)).with_guessed_format() {
        Ok(reader) => reader,
        Err(e) => {
            info!("Error checking image dimensions: {}", e);
            return None;
        }
    };
    match reader.into_dimensions() {
        Ok((width, height)) => Some(evaluate(width, height, bytes.len())),
        Err(e) => {
            info!("Error checking image dimensions: {}", e);
            None
        }
    }
}

/// Decides whether `bytes` hold a genuine content page. Undecodable input is rejected.
pub fn validate(bytes: &[u8]) -> bool {
    let Some(verdict) = inspect(bytes) else {
        return false;
    };

    debug!(
        "Image dimensions: {}x{}, Aspect ratio: {:.2}, Size: {:.2}KB",
        verdict.width, verdict.height, verdict.aspect_ratio, verdict.size_kb
    );
    if !verdict.is_accepted() {
        info!("Image rejected: {}", verdict.reasons());
    }
    verdict.is_accepted()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};

    const KB: usize = 1024;

    #[test]
    fn test_width_below_threshold() {
        let verdict = evaluate(399, 500, 50 * KB);
        assert!(!verdict.is_accepted());
        assert_eq!(verdict.rejections, vec![Rejection::TooSmall]);
    }

    #[test]
    fn test_square_is_rejected() {
        let verdict = evaluate(500, 500, 50 * KB);
        assert!(!verdict.is_accepted());
        assert_eq!(verdict.rejections, vec![Rejection::TooSquare]);
        assert_eq!(verdict.aspect_ratio, 1.0);
    }

    #[test]
    fn test_small_file_is_rejected() {
        let verdict = evaluate(500, 800, 20 * KB);
        assert_eq!(verdict.rejections, vec![Rejection::FileTooSmall]);
    }

    #[test]
    fn test_page_is_accepted() {
        let verdict = evaluate(500, 800, 50 * KB);
        assert!(verdict.is_accepted());
        assert_eq!(verdict.reasons(), "");
    }

    #[test]
    fn test_boundaries_are_exclusive_except_aspect() {
        assert!(!evaluate(400, 800, 50 * KB).is_accepted());
        assert!(!evaluate(800, 400, 50 * KB).is_accepted());
        assert!(!evaluate(500, 800, 30 * KB).is_accepted());
        assert!(evaluate(500, 800, 30 * KB + 1).is_accepted());
        // 600 / 500 is exactly 1.2
        assert!(evaluate(500, 600, 50 * KB).is_accepted());
        // landscape pages count too
        assert!(evaluate(800, 500, 50 * KB).is_accepted());
    }

    #[test]
    fn test_multiple_reasons_are_reported() {
        let verdict = evaluate(32, 32, 2 * KB);
        assert_eq!(
            verdict.rejections,
            vec![
                Rejection::TooSmall,
                Rejection::TooSquare,
                Rejection::FileTooSmall
            ]
        );
        assert!(verdict.reasons().contains("too square-like"));
    }

    #[test]
    fn test_undecodable_bytes_are_rejected() {
        assert!(!validate(b"<html>not an image</html>"));
        assert!(!validate(&[]));
        assert!(inspect(&[0u8; 64]).is_none());
    }

    #[test]
    fn test_decoded_icon_is_rejected() {
        let img = RgbImage::from_pixel(64, 64, Rgb([200, 10, 10]));
        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, ImageFormat::Png).unwrap();
        let bytes = buffer.into_inner();

        let verdict = inspect(&bytes).unwrap();
        assert_eq!((verdict.width, verdict.height), (64, 64));
        assert!(!validate(&bytes));
    }
}
