use std::path::{Path, PathBuf};

use crate::error::ProcessError;

pub const THUMBNAIL_FILE: &str = "thumbnail.png";

/// Scales an image down to fit `width` x `height` and writes it as PNG to
/// `<out_dir>/thumbnail.png`.
pub fn render_image(
    source: &Path,
    out_dir: &Path,
    width: u32,
    height: u32,
) -> Result<PathBuf, ProcessError> {
    let _span = tracing::info_span!("processor.thumbnail").entered();

    let img = image::open(source)
        .map_err(|e| ProcessError::Thumbnail(format!("Failed to load image: {}", e)))?;

    let target = out_dir.join(THUMBNAIL_FILE);
    img.thumbnail(width, height)
        .save_with_format(&target, image::ImageFormat::Png)
        .map_err(|e| ProcessError::Thumbnail(format!("Failed to write thumbnail: {}", e)))?;

    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GenericImageView;

    #[test]
    fn test_thumbnail_fits_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("scan.png");
        image::RgbImage::new(800, 400).save(&source).unwrap();

        let out = render_image(&source, dir.path(), 200, 200).unwrap();

        let thumb = image::open(&out).unwrap();
        assert_eq!(thumb.dimensions(), (200, 100));
    }

    #[test]
    fn test_invalid_image() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("broken.png");
        std::fs::write(&source, b"nope").unwrap();

        let result = render_image(&source, dir.path(), 100, 100);
        assert!(matches!(result, Err(ProcessError::Thumbnail(_))));
    }
}
