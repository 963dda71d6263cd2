//! # tally-core
//!
//! Core library for tally - an agentic double-entry bookkeeping engine.
//!
//! This crate provides the ledger kernel that untrusted agent scripts drive
//! through the sandbox runtime: exact-decimal amounts, entry identifiers,
//! the monthly journal (codec, invariant validation, append service), the
//! chart of accounts, bank-file import, the agent audit log, repository
//! configuration, and the versioned-store adapter that gives every accepted
//! write an audit-trail commit.
//!
//! ## Invariants
//!
//! Every write to a monthly journal re-validates the combined state of the
//! month against six rules:
//!
//! 1. Every entry group balances: sum of debits equals sum of credits.
//! 2. Each leg carries exactly one of debit or credit, never both or neither.
//! 3. Every account id referenced exists in the chart of accounts.
//! 4. Every leg's date falls inside the month that owns the file.
//! 5. Base sequence numbers form a contiguous 1..N set.
//! 6. Monetary values carry at most two decimal places.
//!
//! ## Example
//!
//! ```rust,no_run
//! use tally_core::chart::ChartService;
//! use tally_core::journal::{AddDoubleParams, JournalService};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let chart = std::sync::Arc::new(ChartService::load("/path/to/books")?);
//! let journal = JournalService::new("/path/to/books", chart);
//!
//! let entry_id = journal.add_double(AddDoubleParams {
//!     date: chrono::NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
//!     description: "GitHub subscription".into(),
//!     debit_account: 5020,
//!     credit_account: 1010,
//!     amount: tally_core::amount::parse_amount("4.00")?,
//!     ..AddDoubleParams::default()
//! })?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod agentlog;
pub mod amount;
pub mod chart;
pub mod config;
pub mod entry_id;
pub mod import;
pub mod journal;
pub mod model;
pub mod vcs;

pub use chart::ChartService;
pub use config::Config;
pub use journal::{JournalService, Violation};
pub use model::{Account, AccountType, BankTransaction, EntryStatus, Leg};
pub use vcs::{GitStore, VersionedStore};
