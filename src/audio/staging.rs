//! Scoped on-disk staging for uploaded audio.
//!
//! The decoder and transcriber both read from a path, so uploads are written
//! to a temp file first. The file is removed when the `StagedUpload` drops,
//! whichever way the request ends.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use super::AudioError;

/// An uploaded byte stream written to a uniquely named temp file
pub struct StagedUpload {
    file: NamedTempFile,
}

impl StagedUpload {
    /// Write `bytes` into `dir` under a name derived from `request_id`.
    ///
    /// The original file extension is kept so the decoder's format hint works.
    pub fn stage(
        dir: &Path,
        request_id: &str,
        original_name: Option<&str>,
        bytes: &[u8],
    ) -> Result<Self, AudioError> {
        std::fs::create_dir_all(dir)?;

        let suffix = original_name
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|ext| format!(".{}", ext))
            .unwrap_or_default();

        let mut file = tempfile::Builder::new()
            .prefix(&format!("upload-{}-", request_id))
            .suffix(&suffix)
            .tempfile_in(dir)?;
        file.write_all(bytes)?;
        file.flush()?;

        debug!("Staged {} bytes at {:?}", bytes.len(), file.path());

        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Owned copy of the path, for moving into blocking tasks alongside `self`
    pub fn path_buf(&self) -> PathBuf {
        self.file.path().to_path_buf()
    }
}
