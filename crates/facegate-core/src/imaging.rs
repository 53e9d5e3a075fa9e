//! Image loading. Everything downstream works on 8-bit RGB.

use image::{ImageReader, RgbImage};
use std::path::Path;

/// Decode an image file (PNG, JPEG, ...) into RGB. The format is sniffed from
/// the content, so the extension does not have to be accurate.
pub fn load_image_file(path: impl AsRef<Path>) -> Result<RgbImage, image::ImageError> {
    let path = path.as_ref();
    let image = ImageReader::open(path)?.with_guessed_format()?.decode()?.to_rgb8();
    tracing::debug!(path = %path.display(), width = image.width(), height = image.height(), "loaded image");
    Ok(image)
}

/// Decode in-memory image bytes into RGB, guessing the format from content.
pub fn load_image_bytes(bytes: &[u8]) -> Result<RgbImage, image::ImageError> {
    Ok(image::load_from_memory(bytes)?.to_rgb8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb};
    use std::io::Cursor;

    fn png_bytes(image: &RgbImage) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        image.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_load_image_bytes_keeps_rgb_order() {
        let src = RgbImage::from_pixel(4, 3, Rgb([10, 20, 30]));
        let decoded = load_image_bytes(&png_bytes(&src)).unwrap();
        assert_eq!(decoded.dimensions(), (4, 3));
        assert_eq!(decoded.get_pixel(0, 0), &Rgb([10, 20, 30]));
    }

    #[test]
    fn test_load_image_bytes_rejects_garbage() {
        assert!(load_image_bytes(b"definitely not an image").is_err());
    }

    #[test]
    fn test_load_image_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("face.png");
        RgbImage::from_pixel(2, 2, Rgb([1, 2, 3])).save(&path).unwrap();
        // Stored under a misleading name, as uploads may be.
        let renamed = dir.path().join("face.jpg");
        std::fs::rename(&path, &renamed).unwrap();
        let path = renamed;
        let loaded = load_image_file(&path).unwrap();
        assert_eq!(loaded.get_pixel(1, 1), &Rgb([1, 2, 3]));
    }

    #[test]
    fn test_load_image_file_missing() {
        assert!(load_image_file("/nonexistent/face.jpg").is_err());
    }
}
