//! Literal text patches with idempotency checks
//!
//! A [`TextPatch`] pairs a search literal with its replacement. Applying one
//! resolves to exactly one [`PatchOutcome`]:
//! - the search literal is present: its first occurrence is replaced
//! - the replacement is already present: nothing is written
//! - neither is present: nothing is written and the caller is told

use crate::edit::{Edit, EditError};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Rewrites TinyUSB's DWC2 RX FIFO sizing from double-buffered (2x) to
/// single-buffered (1x).
///
/// The ESP32-P4 high-speed DWC2 core has 4096 bytes of FIFO. Six CDC ports with
/// 512-byte bulk endpoints overrun it by 96 words at 2x; 1x is enough for CDC
/// serial traffic.
pub const DWC2_RX_FIFO: TextPatch = TextPatch {
    id: "dwc2-rx-fifo-1x",
    search: "+ 2 * ((largest_ep_size / 4) + 1)",
    replace: "+ 1 * ((largest_ep_size / 4) + 1)",
};

/// A compiled-in literal substitution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextPatch {
    /// Stable name used in logs
    pub id: &'static str,
    /// Exact text to find
    pub search: &'static str,
    /// Text that replaces the first occurrence of `search`
    pub replace: &'static str,
}

/// What applying a patch did (or would do) to a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "PatchOutcome should be checked for NotFound"]
pub enum PatchOutcome {
    /// The first occurrence of the search literal was replaced
    Patched,
    /// The replacement literal is already present; nothing written
    AlreadyPatched,
    /// Neither literal is present; nothing written
    NotFound,
}

impl PatchOutcome {
    /// `NotFound` means the upstream file changed under us and the build
    /// should stop.
    pub fn is_success(self) -> bool {
        !matches!(self, PatchOutcome::NotFound)
    }
}

impl fmt::Display for PatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchOutcome::Patched => write!(f, "patched"),
            PatchOutcome::AlreadyPatched => write!(f, "already patched"),
            PatchOutcome::NotFound => write!(f, "pattern not found"),
        }
    }
}

#[derive(Error, Debug)]
pub enum PatchError {
    #[error("failed to read {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to write {}: {source}", .path.display())]
    Write { path: PathBuf, source: EditError },
}

impl TextPatch {
    /// Decide the outcome for `content` without touching the filesystem.
    ///
    /// The search literal wins over the replacement: a file holding both is
    /// still `Patched`.
    pub fn evaluate(&self, content: &str) -> PatchOutcome {
        if content.contains(self.search) {
            PatchOutcome::Patched
        } else if content.contains(self.replace) {
            PatchOutcome::AlreadyPatched
        } else {
            PatchOutcome::NotFound
        }
    }

    /// Build the edit for the first occurrence of the search literal.
    pub fn locate(&self, file: &Path, content: &str) -> Option<Edit> {
        let byte_start = content.find(self.search)?;
        Some(Edit::new(
            file,
            byte_start,
            byte_start + self.search.len(),
            self.replace,
            self.search,
        ))
    }

    /// Preview the patch on an in-memory string without touching the
    /// filesystem.
    ///
    /// This is a diagnostic helper: [`TextPatch::apply`] writes through
    /// [`Edit`] and must produce the same text. Content is returned unchanged
    /// unless the outcome is `Patched`.
    pub fn rewrite(&self, content: &str) -> (PatchOutcome, String) {
        match self.evaluate(content) {
            PatchOutcome::Patched => {
                // `evaluate` saw the literal, so the first match exists
                let updated = content.replacen(self.search, self.replace, 1);
                (PatchOutcome::Patched, updated)
            }
            outcome => (outcome, content.to_string()),
        }
    }

    /// Read `path`, apply the patch, and write back only when it changed.
    pub fn apply(&self, path: &Path) -> Result<PatchOutcome, PatchError> {
        let content = fs::read_to_string(path).map_err(|source| PatchError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(patch = self.id, file = %path.display(), bytes = content.len(), "read target");

        let Some(edit) = self.locate(path, &content) else {
            let outcome = self.evaluate(&content);
            debug!(patch = self.id, %outcome, "no write needed");
            return Ok(outcome);
        };

        let occurrences = content.matches(self.search).count();
        if occurrences > 1 {
            debug!(
                patch = self.id,
                occurrences, "search literal occurs more than once; replacing the first only"
            );
        }

        edit.commit(&content).map_err(|source| PatchError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(patch = self.id, offset = edit.byte_start, "wrote patched file");

        Ok(PatchOutcome::Patched)
    }
}

/// Switch the DWC2 RX FIFO in `path` to single-buffered sizing.
pub fn patch(path: impl AsRef<Path>) -> Result<PatchOutcome, PatchError> {
    DWC2_RX_FIFO.apply(path.as_ref())
}
