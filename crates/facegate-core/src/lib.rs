//! Face detection, encoding and comparison.
//!
//! Uses SCRFD for face detection and an ArcFace-style network for encodings,
//! both running via ONNX Runtime. Consumers program against [`FaceEngine`].

pub mod alignment;
pub mod detector;
pub mod engine;
pub mod imaging;
pub mod recognizer;
pub mod types;

pub use engine::{
    default_model_dir, face_encodings, face_locations, AnalyzedFace, EngineError, FaceEngine,
    ModelPaths, OnnxEngine,
};
pub use imaging::{load_image_bytes, load_image_file};
pub use types::{
    compare_faces, face_distance, matches, Detection, Encoding, FaceLocation, DEFAULT_TOLERANCE,
};
