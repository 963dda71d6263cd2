//! Monthly double-entry journal: codec, invariant validation, and the
//! append-only write service.
//!
//! One file per (year, month) under `<root>/<YYYY>/<MM>/journal.csv`. Files
//! are append-only during normal operation; a mistake is reversed with a
//! voiding entry, never by deleting rows.

pub mod codec;
pub mod service;
pub mod validate;

pub use codec::{CodecError, HEADER, append_legs, read_legs, write_legs};
pub use service::{AddDoubleParams, JournalError, JournalService};
pub use validate::{AccountLookup, Invariant, ValidateOptions, Violation, validate_legs};
