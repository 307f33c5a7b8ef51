use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Byte-span replacement with before-text verification.
///
/// The patcher turns a located literal into one of these and commits it. The
/// span is checked against `expected_before` so a stale offset can never
/// splice text into the wrong place.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "Edit does nothing until splice() or commit() is called"]
pub struct Edit {
    /// Path of the file the edit targets
    pub file: PathBuf,
    /// Starting byte offset (inclusive)
    pub byte_start: usize,
    /// Ending byte offset (exclusive)
    pub byte_end: usize,
    /// Text to insert at [byte_start, byte_end)
    pub new_text: String,
    /// Exact text expected at the span before applying
    pub expected_before: String,
}

#[derive(Error, Debug)]
pub enum EditError {
    #[error("Before-text verification failed at {}:{byte_start}", .file.display())]
    BeforeTextMismatch {
        file: PathBuf,
        byte_start: usize,
        byte_end: usize,
        expected: String,
        found: String,
    },

    #[error("Invalid byte range: [{byte_start}, {byte_end}) in content of length {content_len}")]
    InvalidByteRange {
        byte_start: usize,
        byte_end: usize,
        content_len: usize,
    },

    #[error("File I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Edit {
    pub fn new(
        file: impl Into<PathBuf>,
        byte_start: usize,
        byte_end: usize,
        new_text: impl Into<String>,
        expected_before: impl Into<String>,
    ) -> Self {
        Self {
            file: file.into(),
            byte_start,
            byte_end,
            new_text: new_text.into(),
            expected_before: expected_before.into(),
        }
    }

    /// Check the span against `content` and return the text currently there.
    fn validate<'a>(&self, content: &'a str) -> Result<&'a str, EditError> {
        // `get` also rejects offsets that split a UTF-8 sequence
        let current = content
            .get(self.byte_start..self.byte_end)
            .ok_or(EditError::InvalidByteRange {
                byte_start: self.byte_start,
                byte_end: self.byte_end,
                content_len: content.len(),
            })?;

        if current != self.expected_before {
            return Err(EditError::BeforeTextMismatch {
                file: self.file.clone(),
                byte_start: self.byte_start,
                byte_end: self.byte_end,
                expected: self.expected_before.clone(),
                found: current.to_string(),
            });
        }

        Ok(current)
    }

    /// Produce the edited content in memory. Bytes outside the span are copied
    /// through untouched.
    pub fn splice(&self, content: &str) -> Result<String, EditError> {
        let current = self.validate(content)?;

        let mut out =
            String::with_capacity(content.len() - current.len() + self.new_text.len());
        out.push_str(&content[..self.byte_start]);
        out.push_str(&self.new_text);
        out.push_str(&content[self.byte_end..]);
        Ok(out)
    }

    /// Splice `content` (the file's current text) and persist the result.
    pub fn commit(&self, content: &str) -> Result<String, EditError> {
        let updated = self.splice(content)?;
        atomic_write(&self.file, updated.as_bytes())?;
        Ok(updated)
    }
}

/// Atomic file write: tempfile + fsync + rename.
///
/// Symlinks are followed, so the link stays a link and its target is
/// rewritten. The target keeps its permission bits and must itself be
/// writable. Either the full write lands or the original file is left as it
/// was.
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let target = fs::canonicalize(path)?;

    // Rename only needs a writable directory; refuse read-only targets
    OpenOptions::new().write(true).open(&target)?;
    let permissions = fs::metadata(&target)?.permissions();

    // Tempfile must live on the same filesystem for rename to be atomic
    let parent = target.parent().unwrap_or_else(|| Path::new("."));

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.as_file().set_permissions(permissions)?;

    temp.persist(&target).map_err(|e| e.error)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splice_replaces_only_span() {
        let edit = Edit::new("test.c", 6, 11, "there", "world");
        let out = edit.splice("hello world!").unwrap();
        assert_eq!(out, "hello there!");
    }

    #[test]
    fn test_splice_invalid_range() {
        let edit = Edit::new("test.c", 5, 20, "replacement", "");
        let result = edit.splice("hello world");
        assert!(matches!(result, Err(EditError::InvalidByteRange { .. })));
    }

    #[test]
    fn test_splice_inverted_range() {
        let edit = Edit::new("test.c", 10, 5, "replacement", "");
        let result = edit.splice("hello world");
        assert!(matches!(result, Err(EditError::InvalidByteRange { .. })));
    }

    #[test]
    fn test_splice_rejects_split_char() {
        // 'é' is two bytes; offset 2 lands inside it
        let edit = Edit::new("test.c", 2, 3, "x", "");
        let result = edit.splice("né!");
        assert!(matches!(result, Err(EditError::InvalidByteRange { .. })));
    }

    #[test]
    fn test_splice_before_text_mismatch() {
        let edit = Edit::new("test.c", 0, 5, "HELLO", "howdy");
        let result = edit.splice("hello world");
        assert!(matches!(result, Err(EditError::BeforeTextMismatch { .. })));
    }

    #[test]
    fn test_commit_writes_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("dcd.c");
        fs::write(&file_path, "original content").unwrap();

        let edit = Edit::new(&file_path, 0, 8, "modified", "original");
        let updated = edit.commit("original content").unwrap();

        assert_eq!(updated, "modified content");
        assert_eq!(fs::read_to_string(&file_path).unwrap(), "modified content");
    }

    #[test]
    fn test_commit_mismatch_leaves_file_alone() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("dcd.c");
        fs::write(&file_path, "original content").unwrap();

        let edit = Edit::new(&file_path, 0, 8, "modified", "ORIGINAL");
        assert!(edit.commit("original content").is_err());
        assert_eq!(fs::read_to_string(&file_path).unwrap(), "original content");
    }

    #[test]
    fn test_atomic_write_missing_target() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("absent.c");

        let result = atomic_write(&file_path, b"data");
        assert!(result.is_err());
        assert!(!file_path.exists());
    }

    #[test]
    #[cfg(unix)]
    fn test_atomic_write_preserves_mode() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("dcd.c");
        fs::write(&file_path, "before").unwrap();
        fs::set_permissions(&file_path, fs::Permissions::from_mode(0o644)).unwrap();

        atomic_write(&file_path, b"after").unwrap();

        let mode = fs::metadata(&file_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
        assert_eq!(fs::read_to_string(&file_path).unwrap(), "after");
    }

    #[test]
    #[cfg(unix)]
    fn test_atomic_write_follows_symlink() {
        use std::os::unix::fs::symlink;

        let temp_dir = tempfile::tempdir().unwrap();
        let real = temp_dir.path().join("real_dcd.c");
        let link = temp_dir.path().join("dcd.c");
        fs::write(&real, "before").unwrap();
        symlink(&real, &link).unwrap();

        atomic_write(&link, b"after").unwrap();

        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_link(&link).unwrap(), real);
        assert_eq!(fs::read_to_string(&real).unwrap(), "after");
    }

    #[test]
    #[cfg(unix)]
    fn test_atomic_write_rejects_read_only_target() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("dcd.c");
        fs::write(&file_path, "before").unwrap();
        fs::set_permissions(&file_path, fs::Permissions::from_mode(0o444)).unwrap();

        // root ignores mode bits
        if OpenOptions::new().write(true).open(&file_path).is_ok() {
            return;
        }

        let result = atomic_write(&file_path, b"after");
        assert!(matches!(
            result,
            Err(ref e) if e.kind() == io::ErrorKind::PermissionDenied
        ));
        assert_eq!(fs::read_to_string(&file_path).unwrap(), "before");

        let leftovers = fs::read_dir(temp_dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }
}
