//! Image file intake: extension check, then decode.

use std::path::Path;

use anyhow::Context;
use retinagrade_ai::open_image;
use retinagrade_ai::preprocess::PreprocessedTensor;

/// Extensions accepted for classification (compared case-insensitively).
pub const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif"];

pub fn is_allowed_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            ALLOWED_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
}

/// Validate, decode and preprocess one image file.
pub fn load_image_tensor(path: &Path) -> anyhow::Result<PreprocessedTensor> {
    anyhow::ensure!(
        is_allowed_image(path),
        "invalid file type: {} (expected one of {})",
        path.display(),
        ALLOWED_EXTENSIONS.join(", ")
    );
    let image = open_image(path).with_context(|| format!("reading {}", path.display()))?;
    let tensor = retinagrade_ai::preprocess(&image)
        .with_context(|| format!("preprocessing {}", path.display()))?;
    Ok(tensor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};

    #[test]
    fn accepts_known_extensions_case_insensitively() {
        for name in ["a.png", "b.JPG", "c.jpeg", "d.Gif", "dir.v2/e.PNG"] {
            assert!(is_allowed_image(Path::new(name)), "{name}");
        }
    }

    #[test]
    fn rejects_other_extensions() {
        for name in ["a.bmp", "b.tiff", "noext", ".png.txt", "archive.tar.gz"] {
            assert!(!is_allowed_image(Path::new(name)), "{name}");
        }
    }

    #[test]
    fn unsupported_extension_is_rejected_before_reading() {
        let err = load_image_tensor(Path::new("/nonexistent/scan.bmp")).unwrap_err();
        assert!(err.to_string().contains("invalid file type"), "{err}");
    }

    #[test]
    fn loads_png_into_tensor() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fundus.png");
        RgbImage::from_pixel(512, 384, Rgb([120, 40, 20]))
            .save_with_format(&path, ImageFormat::Png)
            .unwrap();

        let tensor = load_image_tensor(&path).unwrap();
        assert_eq!(tensor.shape(), [1, 224, 224, 3]);
    }

    #[test]
    fn corrupt_file_reports_context() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"not a jpeg").unwrap();

        let err = load_image_tensor(&path).unwrap_err();
        assert!(format!("{err:#}").contains("reading"), "{err:#}");
    }
}
