//! OCR fallback path: image normalization plus a text-recognition engine.

mod preprocessing;

pub use preprocessing::ImageNormalizer;

use std::path::Path;

use image::{DynamicImage, GrayImage};
use tracing::debug;

use crate::error::OcrError;

/// A text-recognition engine operating on a normalized label image.
///
/// The production implementation wraps Tesseract; tests substitute stubs.
pub trait TextRecognitionEngine: Send + Sync {
    /// Recognize text in a binarized single-channel image.
    ///
    /// Output is returned verbatim, noise included; the field extractor is
    /// responsible for finding values inside it.
    fn recognize(&self, image: &GrayImage) -> Result<String, OcrError>;
}

/// OCR adapter: normalizes an image, then delegates to the engine.
pub struct OcrAdapter<E> {
    normalizer: ImageNormalizer,
    engine: E,
}

impl<E: TextRecognitionEngine> OcrAdapter<E> {
    /// Create an adapter with default normalization settings.
    pub fn new(engine: E) -> Self {
        Self {
            normalizer: ImageNormalizer::new(),
            engine,
        }
    }

    /// Replace the normalizer configuration.
    pub fn with_normalizer(mut self, normalizer: ImageNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Recognize text in a loaded image.
    ///
    /// Engine faults propagate as [`OcrError`]; the pipeline decides how to
    /// handle them.
    pub fn recognize_text(&self, image: &DynamicImage) -> Result<String, OcrError> {
        let normalized = self.normalizer.normalize(image);
        let text = self.engine.recognize(&normalized)?;
        debug!("OCR recognized {} characters", text.len());
        Ok(text)
    }

    /// Load an image from disk and recognize text in it.
    ///
    /// A file that cannot be decoded yields [`OcrError::UnreadableImage`]
    /// without touching the engine.
    pub fn recognize_file(&self, path: &Path) -> Result<String, OcrError> {
        let image = image::open(path)
            .map_err(|e| OcrError::UnreadableImage(format!("{}: {}", path.display(), e)))?;
        self.recognize_text(&image)
    }
}

/// Tesseract-backed recognition engine.
///
/// Each call constructs a fresh engine instance, so the type holds only
/// configuration and concurrent recognitions stay independent.
#[cfg(feature = "native")]
pub struct TesseractEngine {
    language: String,
}

#[cfg(feature = "native")]
impl TesseractEngine {
    /// Create an engine reading its language pack from `CELLSCAN_OCR_LANG`
    /// (default `eng`).
    pub fn from_env() -> Self {
        Self {
            language: std::env::var("CELLSCAN_OCR_LANG").unwrap_or_else(|_| "eng".to_string()),
        }
    }

    /// Create an engine for an explicit language pack.
    pub fn with_language(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
        }
    }
}

#[cfg(feature = "native")]
impl TextRecognitionEngine for TesseractEngine {
    fn recognize(&self, image: &GrayImage) -> Result<String, OcrError> {
        use std::io::Cursor;

        use image::ImageFormat;
        use tesseract::{PageSegMode, Tesseract};

        let mut png = Vec::new();
        DynamicImage::ImageLuma8(image.clone())
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| OcrError::Preprocessing(format!("PNG encoding failed: {e}")))?;

        let tess = Tesseract::new(None, Some(&self.language))
            .map_err(|e| OcrError::EngineInit(e.to_string()))?;
        let mut tess = tess
            .set_image_from_mem(&png)
            .map_err(|e| OcrError::Recognition(e.to_string()))?;

        // Labels are a single uniform block of text (--psm 6); no column or
        // paragraph layout assumptions.
        tess.set_page_seg_mode(PageSegMode::PsmSingleBlock);

        tess.get_text()
            .map_err(|e| OcrError::Recognition(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct FixedTextEngine(&'static str);

    impl TextRecognitionEngine for FixedTextEngine {
        fn recognize(&self, _image: &GrayImage) -> Result<String, OcrError> {
            Ok(self.0.to_string())
        }
    }

    struct FailingEngine;

    impl TextRecognitionEngine for FailingEngine {
        fn recognize(&self, _image: &GrayImage) -> Result<String, OcrError> {
            Err(OcrError::Recognition("engine unavailable".to_string()))
        }
    }

    fn blank_image() -> DynamicImage {
        DynamicImage::ImageRgb8(image::RgbImage::from_pixel(32, 32, image::Rgb([200, 200, 200])))
    }

    #[test]
    fn test_adapter_returns_engine_output_verbatim() {
        let adapter = OcrAdapter::new(FixedTextEngine("C044160 6754E4 |noise|"));
        let text = adapter.recognize_text(&blank_image()).unwrap();
        assert_eq!(text, "C044160 6754E4 |noise|");
    }

    #[test]
    fn test_adapter_propagates_engine_faults() {
        let adapter = OcrAdapter::new(FailingEngine);
        let err = adapter.recognize_text(&blank_image()).unwrap_err();
        assert!(matches!(err, OcrError::Recognition(_)));
    }

    #[test]
    fn test_undecodable_file_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.png");
        std::fs::write(&path, b"not an image").unwrap();

        let adapter = OcrAdapter::new(FixedTextEngine("never reached"));
        let err = adapter.recognize_file(&path).unwrap_err();
        assert!(matches!(err, OcrError::UnreadableImage(_)));
    }

    #[test]
    fn test_custom_normalizer_feeds_the_engine() {
        let adapter = OcrAdapter::new(FixedTextEngine("C044160"))
            .with_normalizer(ImageNormalizer::new().with_tile_grid(2).with_clip_limit(3.0));
        let text = adapter.recognize_text(&blank_image()).unwrap();
        assert_eq!(text, "C044160");
    }
}
