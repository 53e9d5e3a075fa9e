//! Live face verification against a stored user photo.

use facegate_core::{face_encodings, load_image_file, Encoding, EngineError, FaceEngine};
use facegate_hw::{Camera, CameraError};
use image::RgbImage;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

const PHOTO_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("No known face found for user: {0}")]
    NoKnownFace(String),
    #[error("Error: Could not open camera")]
    CameraOpen(#[source] CameraError),
    #[error("Error: Could not capture frame")]
    CameraRead(#[source] CameraError),
    #[error("No face detected in captured image")]
    NoFaceInFrame,
    #[error("Face verification failed!")]
    NoMatch,
    #[error("face engine error: {0}")]
    Engine(#[from] EngineError),
}

/// Something that can produce one live frame.
///
/// Fails with [`VerifyError::CameraOpen`] or [`VerifyError::CameraRead`].
pub trait FrameSource {
    fn capture(&mut self) -> Result<RgbImage, VerifyError>;
}

/// Opens the V4L2 device for a single read and releases it straight away.
pub struct V4lCamera {
    pub device: String,
}

impl FrameSource for V4lCamera {
    fn capture(&mut self) -> Result<RgbImage, VerifyError> {
        let camera = Camera::open(&self.device).map_err(VerifyError::CameraOpen)?;
        println!("Camera opened. Please look at the camera...");
        let frame = camera.capture_frame();
        drop(camera);
        let frame = frame.map_err(VerifyError::CameraRead)?;
        tracing::debug!(device = %self.device, sequence = frame.sequence, "frame captured");
        Ok(frame.image)
    }
}

/// First image file (by name) in `<photos_dir>/<username>`.
pub fn find_user_photo(photos_dir: &Path, username: &str) -> Option<PathBuf> {
    let mut components = Path::new(username).components();
    if !matches!((components.next(), components.next()), (Some(Component::Normal(_)), None)) {
        tracing::warn!(username, "rejecting username that is not a plain name");
        return None;
    }

    let user_dir = photos_dir.join(username);
    let entries = std::fs::read_dir(&user_dir).ok()?;

    let mut photos: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && has_photo_extension(path))
        .collect();
    photos.sort();
    photos.into_iter().next()
}

fn has_photo_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| PHOTO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Encoding of the first face in the user's reference photo.
pub fn load_known_face<E: FaceEngine + ?Sized>(
    engine: &mut E,
    photos_dir: &Path,
    username: &str,
) -> Result<Encoding, VerifyError> {
    let missing = || VerifyError::NoKnownFace(username.to_string());

    let path = find_user_photo(photos_dir, username).ok_or_else(missing)?;
    tracing::debug!(path = %path.display(), "reference photo");

    let image = load_image_file(&path).map_err(|e| {
        tracing::warn!(path = %path.display(), error = %e, "reference photo unreadable");
        missing()
    })?;

    face_encodings(engine, &image, Some(1))?
        .into_iter()
        .next()
        .map(|face| face.encoding)
        .ok_or_else(missing)
}

/// Compare every face in one live frame against the user's reference photo.
pub fn verify_user<E, S>(
    engine: &mut E,
    camera: &mut S,
    photos_dir: &Path,
    username: &str,
    tolerance: f32,
) -> Result<(), VerifyError>
where
    E: FaceEngine + ?Sized,
    S: FrameSource + ?Sized,
{
    let known = load_known_face(engine, photos_dir, username)?;
    let frame = camera.capture()?;

    let faces = face_encodings(engine, &frame, None)?;
    if faces.is_empty() {
        return Err(VerifyError::NoFaceInFrame);
    }

    for (i, face) in faces.iter().enumerate() {
        let distance = known.distance(&face.encoding);
        tracing::debug!(face = i, ?distance, "compared");
        if facegate_core::matches(Some(&known), Some(&face.encoding), tolerance) {
            return Ok(());
        }
    }
    Err(VerifyError::NoMatch)
}

/// Run the verification, reporting the outcome on stdout. True on match.
pub fn capture_and_verify_face<E, S>(
    engine: &mut E,
    camera: &mut S,
    photos_dir: &Path,
    username: &str,
    tolerance: f32,
) -> bool
where
    E: FaceEngine + ?Sized,
    S: FrameSource + ?Sized,
{
    match verify_user(engine, camera, photos_dir, username, tolerance) {
        Ok(()) => {
            println!("Face verification successful!");
            true
        }
        Err(e) => {
            println!("{e}");
            match std::error::Error::source(&e) {
                Some(cause) => tracing::info!(username, error = %e, cause = %cause, "verification failed"),
                None => tracing::info!(username, error = %e, "verification failed"),
            }
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facegate_core::{Detection, FaceLocation, DEFAULT_TOLERANCE};
    use image::Rgb;

    /// One face per distinct non-black colour in the top row, encoded as that colour.
    struct ColourEngine;

    impl FaceEngine for ColourEngine {
        fn detect(&mut self, image: &RgbImage) -> Result<Vec<Detection>, EngineError> {
            Ok((0..image.width())
                .filter(|&x| image.get_pixel(x, 0).0 != [0, 0, 0])
                .map(|x| Detection {
                    location: FaceLocation { top: 0, right: x + 1, bottom: 1, left: x },
                    confidence: 1.0,
                    landmarks: None,
                })
                .collect())
        }

        fn encode(&mut self, image: &RgbImage, face: &Detection) -> Result<Encoding, EngineError> {
            let p = image.get_pixel(face.location.left, 0).0;
            Ok(Encoding(p.iter().map(|&c| c as f32 / 255.0).collect()))
        }
    }

    enum Failure {
        Open,
        Read,
    }

    struct StubCamera {
        frame: Result<RgbImage, Failure>,
        calls: usize,
    }

    impl StubCamera {
        fn with(colours: &[[u8; 3]]) -> Self {
            let mut image = RgbImage::new(colours.len().max(1) as u32, 1);
            for (x, c) in colours.iter().enumerate() {
                image.put_pixel(x as u32, 0, Rgb(*c));
            }
            Self { frame: Ok(image), calls: 0 }
        }

        fn failing(failure: Failure) -> Self {
            Self { frame: Err(failure), calls: 0 }
        }
    }

    impl FrameSource for StubCamera {
        fn capture(&mut self) -> Result<RgbImage, VerifyError> {
            self.calls += 1;
            match &self.frame {
                Ok(image) => Ok(image.clone()),
                Err(Failure::Open) => Err(VerifyError::CameraOpen(CameraError::DeviceNotFound("/dev/video0".into()))),
                Err(Failure::Read) => Err(VerifyError::CameraRead(CameraError::CaptureFailed("no buffer".into()))),
            }
        }
    }

    fn photos_with(user: &str, file: &str, colour: [u8; 3]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let user_dir = dir.path().join(user);
        std::fs::create_dir_all(&user_dir).unwrap();
        RgbImage::from_pixel(2, 2, Rgb(colour))
            .save_with_format(user_dir.join(file), image::ImageFormat::Png)
            .unwrap();
        dir
    }

    #[test]
    fn test_no_image_files_skips_camera() {
        let dir = tempfile::tempdir().unwrap();
        let user_dir = dir.path().join("alice");
        std::fs::create_dir_all(&user_dir).unwrap();
        std::fs::write(user_dir.join("notes.txt"), "hello").unwrap();

        let mut camera = StubCamera::with(&[[255, 0, 0]]);
        let ok = capture_and_verify_face(&mut ColourEngine, &mut camera, dir.path(), "alice", DEFAULT_TOLERANCE);
        assert!(!ok);
        assert_eq!(camera.calls, 0);
    }

    #[test]
    fn test_missing_user_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut camera = StubCamera::with(&[[255, 0, 0]]);
        let err = verify_user(&mut ColourEngine, &mut camera, dir.path(), "bob", DEFAULT_TOLERANCE).unwrap_err();
        assert!(matches!(err, VerifyError::NoKnownFace(ref u) if u == "bob"));
        assert_eq!(camera.calls, 0);
    }

    #[test]
    fn test_reference_photo_without_face() {
        let dir = photos_with("alice", "me.png", [0, 0, 0]);
        let mut camera = StubCamera::with(&[[255, 0, 0]]);
        let err = verify_user(&mut ColourEngine, &mut camera, dir.path(), "alice", DEFAULT_TOLERANCE).unwrap_err();
        assert!(matches!(err, VerifyError::NoKnownFace(_)));
        assert_eq!(camera.calls, 0);
    }

    #[test]
    fn test_match_on_any_face_in_frame() {
        let dir = photos_with("alice", "me.PNG", [255, 0, 0]);
        let mut camera = StubCamera::with(&[[0, 0, 255], [250, 5, 0]]);
        assert!(capture_and_verify_face(&mut ColourEngine, &mut camera, dir.path(), "alice", DEFAULT_TOLERANCE));
        assert_eq!(camera.calls, 1);
    }

    #[test]
    fn test_no_match() {
        let dir = photos_with("alice", "me.jpg", [255, 0, 0]);
        let mut camera = StubCamera::with(&[[0, 255, 0], [0, 0, 255]]);
        let err = verify_user(&mut ColourEngine, &mut camera, dir.path(), "alice", DEFAULT_TOLERANCE).unwrap_err();
        assert!(matches!(err, VerifyError::NoMatch));
    }

    #[test]
    fn test_no_face_in_frame() {
        let dir = photos_with("alice", "me.png", [255, 0, 0]);
        let mut camera = StubCamera::with(&[[0, 0, 0]]);
        let err = verify_user(&mut ColourEngine, &mut camera, dir.path(), "alice", DEFAULT_TOLERANCE).unwrap_err();
        assert!(matches!(err, VerifyError::NoFaceInFrame));
    }

    #[test]
    fn test_camera_open_failure() {
        let dir = photos_with("alice", "me.png", [255, 0, 0]);
        let mut camera = StubCamera::failing(Failure::Open);
        let err = verify_user(&mut ColourEngine, &mut camera, dir.path(), "alice", DEFAULT_TOLERANCE).unwrap_err();
        assert!(matches!(err, VerifyError::CameraOpen(CameraError::DeviceNotFound(_))));
        assert_eq!(err.to_string(), "Error: Could not open camera");
    }

    #[test]
    fn test_camera_read_failure() {
        let dir = photos_with("alice", "me.png", [255, 0, 0]);
        let mut camera = StubCamera::failing(Failure::Read);
        let err = verify_user(&mut ColourEngine, &mut camera, dir.path(), "alice", DEFAULT_TOLERANCE).unwrap_err();
        assert!(matches!(err, VerifyError::CameraRead(_)));
        assert_eq!(err.to_string(), "Error: Could not capture frame");
    }

    #[test]
    fn test_find_user_photo_picks_first_by_name() {
        let dir = photos_with("carol", "b.png", [1, 1, 1]);
        let user_dir = dir.path().join("carol");
        std::fs::write(user_dir.join("a.jpeg"), b"x").unwrap();
        std::fs::write(user_dir.join("0.gif"), b"x").unwrap();
        assert_eq!(find_user_photo(dir.path(), "carol"), Some(user_dir.join("a.jpeg")));
    }

    #[test]
    fn test_find_user_photo_rejects_traversal() {
        let dir = photos_with("carol", "me.png", [1, 1, 1]);
        assert_eq!(find_user_photo(&dir.path().join("sub"), "../carol"), None);
        assert_eq!(find_user_photo(dir.path(), ""), None);
        assert!(find_user_photo(dir.path(), "carol").is_some());
    }
}
