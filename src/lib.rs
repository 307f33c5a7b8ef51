//! DWC2 FIFO Patch: build-time rewrite of TinyUSB's DWC2 RX FIFO sizing
//!
//! TinyUSB sizes the DWC2 receive FIFO with a 2x (double-buffered) multiplier.
//! On targets with a small shared FIFO that does not fit, so this crate swaps
//! the one literal expression for its 1x (single-buffered) form before the
//! firmware is compiled.
//!
//! # Architecture
//!
//! A [`TextPatch`] locates its search literal and compiles it down to an
//! [`Edit`], a verified byte-span replacement that is committed with an atomic
//! file write. Every run resolves to one [`PatchOutcome`].
//!
//! # Safety
//!
//! - The file is read once and written at most once
//! - Only the first occurrence of the search literal is replaced
//! - Atomic file writes (tempfile + fsync + rename), permissions preserved
//! - Idempotent: a patched file reports `AlreadyPatched` and is left alone
//!
//! # Example
//!
//! ```no_run
//! use dwc2_fifo_patch::{patch, PatchOutcome};
//!
//! match patch("components/tinyusb/src/portable/synopsys/dwc2/dcd_dwc2.c") {
//!     Ok(PatchOutcome::NotFound) => eprintln!("FIFO expression not found"),
//!     Ok(outcome) => println!("{outcome}"),
//!     Err(e) => eprintln!("patch failed: {e}"),
//! }
//! ```

pub mod edit;
pub mod patch;

// Re-exports
pub use edit::{atomic_write, Edit, EditError};
pub use patch::{patch, PatchError, PatchOutcome, TextPatch, DWC2_RX_FIFO};
