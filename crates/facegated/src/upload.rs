//! Staging of uploaded images on disk.

use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const ALLOWED_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Whether `filename` ends in an allowed image extension (case-insensitive).
pub fn allowed_file(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Reduce a client-supplied name to a safe, flat ASCII filename.
///
/// Path separators become word breaks, whitespace runs become `_`, anything
/// outside `[A-Za-z0-9_.-]` is dropped and leading/trailing `.`/`_` are trimmed.
/// May return an empty string.
pub fn secure_filename(filename: &str) -> String {
    let flattened: String = filename
        .chars()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    flattened
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect::<String>()
        .trim_matches(|c| c == '.' || c == '_')
        .to_string()
}

/// An uploaded file staged under a unique name, removed when dropped.
#[derive(Debug)]
pub struct TempUpload {
    path: PathBuf,
}

impl TempUpload {
    /// Write `contents` into `dir` under `<uuid>_<secure name>`.
    pub async fn create(dir: &Path, original_name: &str, contents: &[u8]) -> std::io::Result<Self> {
        let id = Uuid::new_v4().simple();
        let safe = secure_filename(original_name);
        let name = if safe.is_empty() {
            id.to_string()
        } else {
            format!("{id}_{safe}")
        };

        let path = dir.join(name);
        // Claim the path first so the guard owns it even if the write fails.
        let guard = Self { path };
        tokio::fs::write(&guard.path, contents).await?;
        tracing::debug!(path = %guard.path.display(), bytes = contents.len(), "staged upload");
        Ok(guard)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempUpload {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "removed upload"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %self.path.display(), error = %e, "failed to remove upload"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_file() {
        assert!(allowed_file("face.png"));
        assert!(allowed_file("face.JPG"));
        assert!(allowed_file("archive.tar.jpeg"));
        assert!(!allowed_file("face.gif"));
        assert!(!allowed_file("png"));
        assert!(!allowed_file(""));
        assert!(!allowed_file("face."));
    }

    #[test]
    fn test_secure_filename() {
        assert_eq!(secure_filename("My cool movie.mov"), "My_cool_movie.mov");
        assert_eq!(secure_filename("../../../etc/passwd"), "etc_passwd");
        assert_eq!(secure_filename("i contain cool \u{fc}ml\u{e4}uts.txt"), "i_contain_cool_mluts.txt");
        assert_eq!(secure_filename("..\\windows\\photo.jpg"), "windows_photo.jpg");
        assert_eq!(secure_filename("___.png"), "png");
        assert_eq!(secure_filename("../.."), "");
    }

    #[tokio::test]
    async fn test_temp_upload_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let upload = TempUpload::create(dir.path(), "face.png", b"data").await.unwrap();
        let path = upload.path().to_path_buf();
        assert!(path.exists());
        assert!(path.file_name().unwrap().to_str().unwrap().ends_with("_face.png"));
        drop(upload);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_temp_upload_names_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let a = TempUpload::create(dir.path(), "same.jpg", b"a").await.unwrap();
        let b = TempUpload::create(dir.path(), "same.jpg", b"b").await.unwrap();
        assert_ne!(a.path(), b.path());
        assert_eq!(std::fs::read(a.path()).unwrap(), b"a");
        assert_eq!(std::fs::read(b.path()).unwrap(), b"b");
    }

    #[tokio::test]
    async fn test_temp_upload_write_failure() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        assert!(TempUpload::create(&missing, "face.png", b"x").await.is_err());
    }
}
