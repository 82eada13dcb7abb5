use std::path::{Path, PathBuf};

/// Removes an unfinished output file when dropped.
///
/// Created after the duplicate-output check, so it only ever deletes a file
/// this job created itself.
pub(crate) struct PartialOutput {
    path: PathBuf,
    keep: bool,
    committed: bool,
}

impl PartialOutput {
    pub(crate) fn new(path: &Path, keep: bool) -> Self {
        Self {
            path: path.to_path_buf(),
            keep,
            committed: false,
        }
    }

    /// The output is complete; keep it.
    pub(crate) fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for PartialOutput {
    fn drop(&mut self) {
        if self.committed || !self.path.exists() {
            return;
        }
        if self.keep {
            tracing::info!(path = ?self.path, "keeping partial output");
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = ?self.path, "removed partial output"),
            Err(e) => tracing::warn!(path = ?self.path, "failed to remove partial output: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uncommitted_output_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mp4");
        std::fs::write(&path, b"partial").unwrap();
        drop(PartialOutput::new(&path, false));
        assert!(!path.exists());
    }

    #[test]
    fn test_committed_or_kept_output_survives() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.mp4");
        let b = dir.path().join("b.mp4");
        std::fs::write(&a, b"done").unwrap();
        std::fs::write(&b, b"partial").unwrap();
        PartialOutput::new(&a, false).commit();
        drop(PartialOutput::new(&b, true));
        assert!(a.exists());
        assert!(b.exists());
    }
}
