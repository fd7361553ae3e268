//! Upload validation and temporary staging.
//!
//! Uploaded videos are copied into the work directory under a unique name
//! and removed again when the [`StagedUpload`] is dropped, whatever the
//! outcome of the analysis.

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use tempfile::TempPath;
use tracing::debug;
use uuid::Uuid;

use crate::error::{WorkerError, WorkerResult};

/// Container formats accepted for analysis.
pub const ALLOWED_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "flv", "wmv"];

/// 500 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 500 * 1024 * 1024;

/// Lowercased extension of `filename`, without the dot.
fn extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Check the filename and declared content type of an upload.
pub fn validate_upload(filename: &str, content_type: Option<&str>) -> WorkerResult<()> {
    if filename.trim().is_empty() {
        return Err(WorkerError::invalid_upload("No filename provided"));
    }

    match extension(filename) {
        Some(ext) if ALLOWED_EXTENSIONS.contains(&ext.as_str()) => {}
        other => {
            return Err(WorkerError::UnsupportedFormat(format!(
                "'{}' (allowed: {})",
                other.map(|e| format!(".{e}")).unwrap_or_else(|| filename.to_string()),
                ALLOWED_EXTENSIONS
                    .iter()
                    .map(|e| format!(".{e}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            )))
        }
    }

    if let Some(content_type) = content_type {
        if !content_type.starts_with("video/") {
            return Err(WorkerError::invalid_upload(format!(
                "File must be a video, got content type '{content_type}'"
            )));
        }
    }

    Ok(())
}

/// An upload copied into the work directory.
#[derive(Debug)]
pub struct StagedUpload {
    path: TempPath,
    filename: String,
    size: u64,
}

impl StagedUpload {
    /// Copy `reader` into a new file inside `work_dir`.
    ///
    /// The file is named `<uuid>_<filename>` plus a random suffix and keeps the
    /// original extension. Uploads over `max_bytes` are rejected and leave
    /// nothing behind.
    pub fn stage<R: Read>(
        mut reader: R,
        filename: &str,
        work_dir: &Path,
        max_bytes: u64,
    ) -> WorkerResult<Self> {
        std::fs::create_dir_all(work_dir)?;

        // Only the final component; uploads never choose their directory.
        let base = Path::new(filename)
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| WorkerError::invalid_upload(format!("Bad filename '{filename}'")))?;
        let stem = Path::new(base)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("upload");
        let suffix = extension(base).map(|e| format!(".{e}")).unwrap_or_default();

        let mut file = tempfile::Builder::new()
            .prefix(&format!("{}_{}_", Uuid::new_v4(), stem))
            .suffix(&suffix)
            .tempfile_in(work_dir)?;

        let copied = io::copy(&mut (&mut reader).take(max_bytes.saturating_add(1)), &mut file)?;
        if copied > max_bytes {
            return Err(WorkerError::FileTooLarge {
                size: copied,
                max: max_bytes,
            });
        }
        file.flush()?;

        let path = file.into_temp_path();
        debug!(path = %path.display(), size = copied, "Upload staged");

        Ok(Self {
            path,
            filename: base.to_string(),
            size: copied,
        })
    }

    /// Location of the staged file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Remove the staged file now, reporting any error.
    pub fn remove(self) -> WorkerResult<()> {
        self.path.close()?;
        Ok(())
    }
}

/// Stage a file that already exists on disk.
pub fn stage_file(input: &Path, work_dir: &Path, max_bytes: u64) -> WorkerResult<StagedUpload> {
    let filename = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let file = match std::fs::File::open(input) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(WorkerError::InputNotFound(input.display().to_string()))
        }
        Err(e) => return Err(e.into()),
    };

    StagedUpload::stage(file, &filename, work_dir, max_bytes)
}

/// Files currently in `dir`.
pub fn list_staged(dir: &Path) -> io::Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    std::fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_video_extensions() {
        for name in ["clip.mp4", "CLIP.MOV", "a.b.mkv", "x.avi", "y.flv", "z.wmv"] {
            assert!(validate_upload(name, Some("video/mp4")).is_ok(), "{name}");
        }
        assert!(validate_upload("clip.mp4", None).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_uploads() {
        assert!(matches!(
            validate_upload("", None),
            Err(WorkerError::InvalidUpload(_))
        ));
        assert!(matches!(
            validate_upload("notes.txt", None),
            Err(WorkerError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            validate_upload("noextension", None),
            Err(WorkerError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            validate_upload("clip.mp4", Some("application/octet-stream")),
            Err(WorkerError::InvalidUpload(_))
        ));
    }

    #[test]
    fn test_stage_and_cleanup_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let staged =
            StagedUpload::stage(&b"0123456789"[..], "holiday.mp4", dir.path(), 1024).unwrap();

        let path = staged.path().to_path_buf();
        let name = path.file_name().unwrap().to_str().unwrap().to_string();
        assert!(path.exists());
        assert!(name.contains("_holiday_"));
        assert!(name.ends_with(".mp4"));
        assert_eq!(staged.size(), 10);
        assert_eq!(staged.filename(), "holiday.mp4");

        drop(staged);
        assert!(!path.exists());
        assert!(list_staged(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_stage_rejects_oversized_upload() {
        let dir = tempfile::tempdir().unwrap();
        let err = StagedUpload::stage(&[0u8; 64][..], "big.mp4", dir.path(), 16).unwrap_err();

        assert!(matches!(err, WorkerError::FileTooLarge { max: 16, .. }));
        assert!(list_staged(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_stage_strips_directories() {
        let dir = tempfile::tempdir().unwrap();
        let staged = StagedUpload::stage(&b"x"[..], "../../etc/evil.mp4", dir.path(), 16).unwrap();

        assert_eq!(staged.path().parent(), Some(dir.path()));
        assert_eq!(staged.filename(), "evil.mp4");
        staged.remove().unwrap();
    }

    #[test]
    fn test_stage_file_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let err = stage_file(&dir.path().join("gone.mp4"), dir.path(), 16).unwrap_err();
        assert!(matches!(err, WorkerError::InputNotFound(_)));
    }
}
