//! The face capability consumed by the service and the CLI.

use crate::detector::{DetectorError, FaceDetector};
use crate::recognizer::{FaceRecognizer, RecognizerError};
use crate::types::{Detection, Encoding, FaceLocation};
use image::RgbImage;
use std::path::{Path, PathBuf};
use thiserror::Error;

const DETECTOR_MODEL_FILE: &str = "det_10g.onnx";
const RECOGNIZER_MODEL_FILE: &str = "w600k_r50.onnx";

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer error: {0}")]
    Recognizer(#[from] RecognizerError),
}

/// Face detection and encoding over RGB images.
///
/// Implementations may keep per-call state (inference sessions), hence `&mut self`.
pub trait FaceEngine {
    /// Detect faces, highest confidence first.
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<Detection>, EngineError>;

    /// Encode one detected face.
    fn encode(&mut self, image: &RgbImage, face: &Detection) -> Result<Encoding, EngineError>;
}

impl<E: FaceEngine + ?Sized> FaceEngine for Box<E> {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<Detection>, EngineError> {
        (**self).detect(image)
    }

    fn encode(&mut self, image: &RgbImage, face: &Detection) -> Result<Encoding, EngineError> {
        (**self).encode(image, face)
    }
}

/// A detected face together with its encoding.
#[derive(Debug, Clone)]
pub struct AnalyzedFace {
    pub location: FaceLocation,
    pub encoding: Encoding,
}

/// Locations of all faces in `image`.
pub fn face_locations<E: FaceEngine + ?Sized>(
    engine: &mut E,
    image: &RgbImage,
) -> Result<Vec<FaceLocation>, EngineError> {
    Ok(engine.detect(image)?.into_iter().map(|d| d.location).collect())
}

/// Detect and encode faces in `image`, keeping at most `limit` of them.
pub fn face_encodings<E: FaceEngine + ?Sized>(
    engine: &mut E,
    image: &RgbImage,
    limit: Option<usize>,
) -> Result<Vec<AnalyzedFace>, EngineError> {
    let detections = engine.detect(image)?;
    let take = limit.unwrap_or(detections.len());
    tracing::debug!(found = detections.len(), encoding = take.min(detections.len()), "faces detected");

    detections
        .iter()
        .take(take)
        .map(|face| {
            Ok(AnalyzedFace {
                location: face.location,
                encoding: engine.encode(image, face)?,
            })
        })
        .collect()
}

/// Locations of the two ONNX models inside a model directory.
#[derive(Debug, Clone)]
pub struct ModelPaths {
    pub detector: PathBuf,
    pub recognizer: PathBuf,
}

impl ModelPaths {
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            detector: dir.join(DETECTOR_MODEL_FILE),
            recognizer: dir.join(RECOGNIZER_MODEL_FILE),
        }
    }
}

/// Model directory from `FACEGATE_MODEL_DIR`, or `./models`.
pub fn default_model_dir() -> PathBuf {
    std::env::var("FACEGATE_MODEL_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("models"))
}

/// SCRFD + ArcFace pipeline on ONNX Runtime.
pub struct OnnxEngine {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
}

impl OnnxEngine {
    /// Load both models. Fails fast if either file is missing.
    pub fn load(paths: &ModelPaths, intra_threads: usize) -> Result<Self, EngineError> {
        let detector = FaceDetector::load(&paths.detector, intra_threads)?;
        let recognizer = FaceRecognizer::load(&paths.recognizer, intra_threads)?;
        Ok(Self { detector, recognizer })
    }
}

impl FaceEngine for OnnxEngine {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<Detection>, EngineError> {
        Ok(self.detector.detect(image)?)
    }

    fn encode(&mut self, image: &RgbImage, face: &Detection) -> Result<Encoding, EngineError> {
        Ok(self.recognizer.encode(image, face)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reports one face per non-black pixel column band; encodes the band's colour.
    struct BandEngine;

    impl FaceEngine for BandEngine {
        fn detect(&mut self, image: &RgbImage) -> Result<Vec<Detection>, EngineError> {
            Ok(image
                .enumerate_pixels()
                .filter(|(_, y, p)| *y == 0 && p.0 != [0, 0, 0])
                .map(|(x, _, p)| Detection {
                    location: FaceLocation { top: 0, right: x + 1, bottom: 1, left: x },
                    confidence: p.0[0] as f32 / 255.0,
                    landmarks: None,
                })
                .collect())
        }

        fn encode(&mut self, image: &RgbImage, face: &Detection) -> Result<Encoding, EngineError> {
            let p = image.get_pixel(face.location.left, 0).0;
            Ok(Encoding(p.iter().map(|&c| c as f32).collect()))
        }
    }

    fn striped() -> RgbImage {
        let mut image = RgbImage::new(4, 1);
        image.put_pixel(1, 0, image::Rgb([200, 1, 2]));
        image.put_pixel(3, 0, image::Rgb([100, 3, 4]));
        image
    }

    #[test]
    fn test_face_locations() {
        let locations = face_locations(&mut BandEngine, &striped()).unwrap();
        assert_eq!(locations.len(), 2);
        assert_eq!(locations[0].left, 1);
        assert_eq!(locations[1].left, 3);
    }

    #[test]
    fn test_face_encodings_all() {
        let faces = face_encodings(&mut BandEngine, &striped(), None).unwrap();
        assert_eq!(faces.len(), 2);
        assert_eq!(faces[1].encoding.as_slice(), &[100.0, 3.0, 4.0]);
    }

    #[test]
    fn test_face_encodings_limited_to_first() {
        let faces = face_encodings(&mut BandEngine, &striped(), Some(1)).unwrap();
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].location.left, 1);
    }

    #[test]
    fn test_face_encodings_none() {
        let black = RgbImage::new(3, 3);
        assert!(face_encodings(&mut BandEngine, &black, None).unwrap().is_empty());
    }

    #[test]
    fn test_boxed_engine_dispatch() {
        let mut engine: Box<dyn FaceEngine> = Box::new(BandEngine);
        assert_eq!(face_locations(&mut engine, &striped()).unwrap().len(), 2);
    }

    #[test]
    fn test_model_paths_in_dir() {
        let paths = ModelPaths::in_dir("/opt/models");
        assert_eq!(paths.detector, PathBuf::from("/opt/models/det_10g.onnx"));
        assert_eq!(paths.recognizer, PathBuf::from("/opt/models/w600k_r50.onnx"));
    }

    #[test]
    fn test_onnx_engine_missing_models() {
        let err = OnnxEngine::load(&ModelPaths::in_dir("/nonexistent"), 1).err().unwrap();
        assert!(matches!(err, EngineError::Detector(DetectorError::ModelNotFound(_))));
    }
}
