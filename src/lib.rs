//! Anchor Patcher: one-shot, line-anchored code insertion
//!
//! Reads a target file as lines, finds the first position matching an
//! [`AnchorPattern`], splices an [`InsertionBlock`] before or after it and
//! writes the file back.
//!
//! # Guarantees
//!
//! - No anchor, no write: a failed scan leaves the file byte-for-byte intact
//! - Earliest match wins when several positions match
//! - Splicing is pure; the snapshot is never mutated in place
//! - Already-present blocks are detected and skipped
//! - Atomic file writes (tempfile + fsync + rename), refused if the file
//!   changed since it was read
//!
//! Matching is purely textual. There is no understanding of the target
//! language's syntax.
//!
//! # Example
//!
//! ```no_run
//! use anchor_patcher::{AnchorPattern, InsertionBlock, Patcher, RunMode};
//!
//! let patcher = Patcher::new(
//!     AnchorPattern::marker_with_lookahead("};", 2, "Razorpay webhook handler"),
//!     InsertionBlock::from_text("\nexport const cancelPaymentHandler = handler;\n"),
//! );
//!
//! match patcher.run("src/controllers/order.controller.ts", RunMode::Apply) {
//!     Ok(outcome) => println!("{:?}", outcome),
//!     Err(e) => eprintln!("{}", e),
//! }
//! ```
//!
//! # Limitations
//!
//! No lock is taken on the target. A concurrent writer that changes the file
//! between the final hash check and the rename loses its update.

pub mod anchor;
pub mod config;
pub mod error;
pub mod lines;
pub mod patcher;
pub mod splice;

// Re-exports
pub use anchor::{AnchorPattern, Diagnosis, LineCondition, LinePredicate, NearMiss};
pub use config::{
    apply_patches, check_patches, load_from_path, load_from_str, ApplicationError, ConfigError,
    PatchConfig,
};
pub use error::PatchError;
pub use lines::{LineEnding, SourceFile};
pub use patcher::{commit, Change, PatchOutcome, Patcher, Placement, Plan, RunMode, Splice};
pub use splice::{insert, InsertionBlock};
