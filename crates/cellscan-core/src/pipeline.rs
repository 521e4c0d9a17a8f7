//! Recognition pipeline: AI vision first, deterministic OCR fallback.

use std::path::Path;

use tracing::{info, warn};

use crate::error::OcrError;
use crate::extract::extract_battery_fields;
use crate::models::battery::{BatteryRecord, RecognitionMethod};
use crate::models::status::{MethodStatus, RecognitionStatus};
use crate::ocr::{OcrAdapter, TextRecognitionEngine};
use crate::vision::VisionAnalyzer;

/// The sole production entry point for recognizing battery cells in images.
///
/// Per image the pipeline is a two-stage state machine: attempt the vision
/// model, then attempt the OCR chain when the vision path yields nothing.
/// The fallback trigger is purely emptiness of the vision result, so an
/// unavailable provider and a confidently-empty response are handled
/// identically. Holds no state across invocations; independent calls may run
/// concurrently.
pub struct RecognitionPipeline<V, E> {
    vision: V,
    ocr: OcrAdapter<E>,
}

#[cfg(feature = "native")]
impl RecognitionPipeline<crate::vision::VisionModelClient, crate::ocr::TesseractEngine> {
    /// Build the production pipeline from environment configuration.
    pub fn from_env() -> Self {
        let vision = crate::vision::VisionModelClient::from_env();
        let ocr = OcrAdapter::new(crate::ocr::TesseractEngine::from_env());
        info!(
            "recognition pipeline initialized - AI vision available: {}",
            vision.is_available()
        );
        Self::new(vision, ocr)
    }
}

impl<V: VisionAnalyzer, E: TextRecognitionEngine> RecognitionPipeline<V, E> {
    /// Assemble a pipeline from explicit components.
    pub fn new(vision: V, ocr: OcrAdapter<E>) -> Self {
        Self { vision, ocr }
    }

    /// Recognize all battery cells in one image.
    ///
    /// Never fails: every fault degrades to an empty list, distinguishable
    /// only through logs. Each returned record is tagged with the image file
    /// name and the method that produced it.
    pub async fn process(&self, image_path: &Path) -> Vec<BatteryRecord> {
        let image_label = image_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();

        if self.vision.is_available() {
            info!("analyzing {} with the vision model", image_label);
            let records = self.vision.analyze(image_path, &image_label).await;

            if !records.is_empty() {
                info!(
                    "vision model identified {} batteries in {}",
                    records.len(),
                    image_label
                );
                return tag(records, &image_label, RecognitionMethod::AiVision);
            }
            warn!(
                "vision model found no batteries in {}, falling back to OCR",
                image_label
            );
        }

        self.process_with_ocr(image_path, &image_label)
    }

    /// Run the deterministic OCR chain on one image.
    fn process_with_ocr(&self, image_path: &Path, image_label: &str) -> Vec<BatteryRecord> {
        let text = match self.ocr.recognize_file(image_path) {
            Ok(text) => text,
            Err(OcrError::UnreadableImage(reason)) => {
                warn!("cannot load image: {}", reason);
                return Vec::new();
            }
            Err(e) => {
                warn!("OCR failed for {}: {}", image_label, e);
                return Vec::new();
            }
        };

        let records = extract_battery_fields(&text, image_label);
        info!(
            "traditional OCR identified {} batteries in {}",
            records.len(),
            image_label
        );

        tag(records, image_label, RecognitionMethod::TraditionalOcr)
    }

    /// Read-only status of both recognition methods.
    pub fn status(&self) -> RecognitionStatus {
        let vision_status = self.vision.describe();
        let preferred = if vision_status.available {
            vision_status.name.clone()
        } else {
            "Traditional OCR".to_string()
        };

        RecognitionStatus {
            methods: vec![
                vision_status,
                MethodStatus {
                    name: "Traditional OCR".to_string(),
                    available: true,
                    description: "Image preprocessing + Tesseract pattern extraction".to_string(),
                    model: None,
                },
            ],
            preferred,
        }
    }
}

/// Decorate records with provenance after extraction.
fn tag(
    records: Vec<BatteryRecord>,
    image_label: &str,
    method: RecognitionMethod,
) -> Vec<BatteryRecord> {
    records
        .into_iter()
        .map(|r| r.with_provenance(image_label, method))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use image::GrayImage;
    use pretty_assertions::assert_eq;

    use crate::error::OcrError;

    struct StubVision {
        available: bool,
        records: Vec<BatteryRecord>,
    }

    #[async_trait]
    impl VisionAnalyzer for StubVision {
        fn is_available(&self) -> bool {
            self.available
        }

        fn describe(&self) -> MethodStatus {
            MethodStatus {
                name: "AI Vision".to_string(),
                available: self.available,
                description: "stub".to_string(),
                model: None,
            }
        }

        async fn analyze(&self, _image_path: &Path, _image_label: &str) -> Vec<BatteryRecord> {
            self.records.clone()
        }
    }

    struct CountingEngine {
        text: &'static str,
        calls: AtomicUsize,
    }

    impl CountingEngine {
        fn new(text: &'static str) -> Self {
            Self {
                text,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl TextRecognitionEngine for &CountingEngine {
        fn recognize(&self, _image: &GrayImage) -> Result<String, OcrError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.text.to_string())
        }
    }

    fn write_test_image(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("cells.png");
        let img = image::RgbImage::from_pixel(32, 32, image::Rgb([180, 180, 180]));
        img.save(&path).unwrap();
        path
    }

    fn vision_record() -> BatteryRecord {
        BatteryRecord::new("C044160", "6754E4", 36.74, 10.8, 3.40)
    }

    #[tokio::test]
    async fn test_vision_result_is_preferred_and_tagged() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_image(&dir);

        let engine = CountingEngine::new("C099999 6754E4 30.0Wh 9.0Ah 3.3V");
        let pipeline = RecognitionPipeline::new(
            StubVision {
                available: true,
                records: vec![vision_record()],
            },
            OcrAdapter::new(&engine),
        );

        let records = pipeline.process(&path).await;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].serial_number, "C044160");
        assert_eq!(records[0].image_file, "cells.png");
        assert_eq!(records[0].recognition_method, Some(RecognitionMethod::AiVision));
        // The OCR chain must never run when vision produced records.
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_vision_result_falls_back_to_ocr() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_image(&dir);

        let engine = CountingEngine::new("C044160 6754E4 36.74Wh 10.8Ah 3.40V");
        let pipeline = RecognitionPipeline::new(
            StubVision {
                available: true,
                records: Vec::new(),
            },
            OcrAdapter::new(&engine),
        );

        let records = pipeline.process(&path).await;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].serial_number, "C044160");
        assert_eq!(
            records[0].recognition_method,
            Some(RecognitionMethod::TraditionalOcr)
        );
        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unavailable_vision_skips_straight_to_ocr() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_image(&dir);

        let engine = CountingEngine::new("C044160 6754E4 36.74Wh 10.8Ah 3.40V");
        let pipeline = RecognitionPipeline::new(
            StubVision {
                available: false,
                records: vec![vision_record()],
            },
            OcrAdapter::new(&engine),
        );

        let records = pipeline.process(&path).await;

        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].recognition_method,
            Some(RecognitionMethod::TraditionalOcr)
        );
    }

    #[tokio::test]
    async fn test_unreadable_image_returns_empty_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.png");
        std::fs::write(&path, b"not an image").unwrap();

        let engine = CountingEngine::new("C044160");
        let pipeline = RecognitionPipeline::new(
            StubVision {
                available: false,
                records: Vec::new(),
            },
            OcrAdapter::new(&engine),
        );

        let records = pipeline.process(&path).await;
        assert!(records.is_empty());
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_engine_fault_degrades_to_empty_list() {
        struct FailingEngine;
        impl TextRecognitionEngine for FailingEngine {
            fn recognize(&self, _image: &GrayImage) -> Result<String, OcrError> {
                Err(OcrError::Recognition("boom".to_string()))
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let path = write_test_image(&dir);

        let pipeline = RecognitionPipeline::new(
            StubVision {
                available: false,
                records: Vec::new(),
            },
            OcrAdapter::new(FailingEngine),
        );

        assert!(pipeline.process(&path).await.is_empty());
    }

    #[tokio::test]
    async fn test_repeated_processing_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_image(&dir);

        let engine = CountingEngine::new("C044160 C044161 6754E4 36.74Wh 10.8Ah 3.40V");
        let pipeline = RecognitionPipeline::new(
            StubVision {
                available: false,
                records: Vec::new(),
            },
            OcrAdapter::new(&engine),
        );

        let first = pipeline.process(&path).await;
        let second = pipeline.process(&path).await;

        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_status_reports_both_methods() {
        let engine = CountingEngine::new("");
        let pipeline = RecognitionPipeline::new(
            StubVision {
                available: false,
                records: Vec::new(),
            },
            OcrAdapter::new(&engine),
        );

        let status = pipeline.status();
        assert_eq!(status.methods.len(), 2);
        assert_eq!(status.preferred, "Traditional OCR");
        assert!(status.methods[1].available);

        let engine2 = CountingEngine::new("");
        let pipeline = RecognitionPipeline::new(
            StubVision {
                available: true,
                records: Vec::new(),
            },
            OcrAdapter::new(&engine2),
        );
        assert_eq!(pipeline.status().preferred, "AI Vision");
    }
}
