use serde::{Deserialize, Serialize};

/// Distance at or below which two encodings belong to the same person.
pub const DEFAULT_TOLERANCE: f32 = 0.6;

/// Region of a detected face in pixel coordinates, clamped to the image.
///
/// Serialized as `[top, right, bottom, left]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[u32; 4]", into = "[u32; 4]")]
pub struct FaceLocation {
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub left: u32,
}

impl FaceLocation {
    /// Build a location from a floating-point box, trimmed to `width` × `height`.
    pub fn from_box(x: f32, y: f32, w: f32, h: f32, width: u32, height: u32) -> Self {
        let clamp = |v: f32, max: u32| v.round().clamp(0.0, max as f32) as u32;
        Self {
            top: clamp(y, height),
            right: clamp(x + w, width),
            bottom: clamp(y + h, height),
            left: clamp(x, width),
        }
    }

    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }
}

impl From<[u32; 4]> for FaceLocation {
    fn from([top, right, bottom, left]: [u32; 4]) -> Self {
        Self { top, right, bottom, left }
    }
}

impl From<FaceLocation> for [u32; 4] {
    fn from(loc: FaceLocation) -> Self {
        [loc.top, loc.right, loc.bottom, loc.left]
    }
}

/// A face found by the detector.
#[derive(Debug, Clone)]
pub struct Detection {
    pub location: FaceLocation,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

/// Fixed-length vector describing one face, as produced by the recognizer.
///
/// Travels over the wire as a bare JSON array of numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Encoding(pub Vec<f32>);

impl Encoding {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Euclidean distance to `other`, or `None` when the dimensions differ.
    pub fn distance(&self, other: &Encoding) -> Option<f32> {
        if self.len() != other.len() {
            return None;
        }
        Some(
            self.0
                .iter()
                .zip(other.0.iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum::<f32>()
                .sqrt(),
        )
    }
}

impl From<Vec<f32>> for Encoding {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}

/// Distance from `candidate` to every encoding in `known`.
///
/// A dimension mismatch yields `f32::INFINITY` for that entry.
pub fn face_distance(known: &[Encoding], candidate: &Encoding) -> Vec<f32> {
    known
        .iter()
        .map(|k| k.distance(candidate).unwrap_or(f32::INFINITY))
        .collect()
}

/// For each encoding in `known`, whether `candidate` is within `tolerance` of it.
pub fn compare_faces(known: &[Encoding], candidate: &Encoding, tolerance: f32) -> Vec<bool> {
    face_distance(known, candidate)
        .into_iter()
        .map(|d| d <= tolerance)
        .collect()
}

/// Single-pair comparison. Absent inputs never match.
pub fn matches(known: Option<&Encoding>, unknown: Option<&Encoding>, tolerance: f32) -> bool {
    match (known, unknown) {
        (Some(known), Some(unknown)) => compare_faces(std::slice::from_ref(known), unknown, tolerance)
            .first()
            .copied()
            .unwrap_or(false),
        _ => false,
    }
}
