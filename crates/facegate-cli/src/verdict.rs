//! The single-line result file read by the calling system.

use std::path::Path;

pub const DEFAULT_OUTPUT: &str = "src/main/resources/templates/out.txt";

pub const SUCCESS_LINE: &str = "Verification successful: 1";
pub const FAILURE_LINE: &str = "Verification failed: 0";

/// Overwrite `path` with the verdict, creating parent directories.
pub fn write_verdict(path: &Path, verified: bool) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let line = if verified { SUCCESS_LINE } else { FAILURE_LINE };
    std::fs::write(path, line)?;
    tracing::debug!(path = %path.display(), verified, "verdict written");
    Ok(())
}
