//! Journal write service: read, validate, append.
//!
//! All mutation of a monthly journal goes through [`JournalService`]. A
//! proposed entry is validated together with everything already persisted
//! for the month, and either both legs are appended or nothing is written.

use std::fs::{self, OpenOptions};
use std::io::Write as _;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use tracing::debug;

use super::codec::{self, CodecError, HEADER};
use super::validate::{AccountLookup, ValidateOptions, Violation, validate_legs};
use crate::entry_id::{format_entry_id, leg_id, parse_entry_id};
use crate::model::{EntryStatus, Leg};

/// Error raised by journal operations.
#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    /// One or more invariants failed; nothing was written.
    #[error("validation failed: {}", format_violations(.0))]
    Validation(Vec<Violation>),

    /// A journal file could not be decoded or encoded.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// A filesystem operation failed.
    #[error("{action} {path}: {source}")]
    Io {
        /// What was being attempted.
        action: &'static str,
        /// The path involved.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },
}

fn format_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Parameters for creating a balanced two-legged entry.
#[derive(Debug, Clone, Default)]
pub struct AddDoubleParams {
    /// Transaction date; selects the monthly file.
    pub date: NaiveDate,
    /// Description shared by both legs.
    pub description: String,
    /// Account receiving the debit leg.
    pub debit_account: i64,
    /// Account receiving the credit leg.
    pub credit_account: i64,
    /// Amount posted to each side.
    pub amount: Decimal,
    /// Counterparty name.
    pub counterparty: String,
    /// Import reference.
    pub reference: String,
    /// Agent confidence.
    pub confidence: Decimal,
    /// Lifecycle status for both legs.
    pub status: EntryStatus,
    /// Evidence trail.
    pub evidence: String,
    /// Semicolon-separated tags.
    pub tags: String,
    /// Free-form notes.
    pub notes: String,
}

/// Append-only write service over the monthly journal files of one
/// repository.
pub struct JournalService {
    root: PathBuf,
    accounts: Arc<dyn AccountLookup + Send + Sync>,
    options: ValidateOptions,
    // Serializes read-validate-append cycles. Concurrent writers from other
    // processes are the scheduler's problem; one agent runs at a time.
    write_lock: Mutex<()>,
}

impl JournalService {
    /// Create a service rooted at `root` with the given account lookup.
    pub fn new(root: impl Into<PathBuf>, accounts: Arc<dyn AccountLookup + Send + Sync>) -> Self {
        Self {
            root: root.into(),
            accounts,
            options: ValidateOptions::default(),
            write_lock: Mutex::new(()),
        }
    }

    /// Override validation options, e.g. for books imported with sequence
    /// gaps.
    #[must_use]
    pub fn with_options(mut self, options: ValidateOptions) -> Self {
        self.options = options;
        self
    }

    /// Create a balanced double entry: a debit leg (`…a`) and a credit leg
    /// (`…b`) at the month's next sequence. The whole month - persisted
    /// legs plus the proposed pair - is re-validated; on any violation the
    /// call fails with the full list and writes nothing.
    ///
    /// Returns the new base entry id.
    ///
    /// # Errors
    ///
    /// [`JournalError::Validation`] aggregating every violation, or an I/O
    /// or codec error from reading or appending the month file.
    pub fn add_double(&self, params: AddDoubleParams) -> Result<String, JournalError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        let year = params.date.year();
        let month = params.date.month();

        let existing = self.read_month(year, month)?;
        let seq = next_seq(&existing);

        let entry_id = format_entry_id(year, month, seq);
        let template = Leg {
            entry_id: String::new(),
            date: params.date,
            account_id: 0,
            description: params.description,
            debit: Decimal::ZERO,
            credit: Decimal::ZERO,
            counterparty: params.counterparty,
            reference: params.reference,
            confidence: params.confidence,
            status: params.status,
            evidence: params.evidence,
            receipt_hash: String::new(),
            tags: params.tags,
            notes: params.notes,
        };
        let new_legs = vec![
            Leg {
                entry_id: leg_id(&entry_id, 0),
                account_id: params.debit_account,
                debit: params.amount,
                ..template.clone()
            },
            Leg {
                entry_id: leg_id(&entry_id, 1),
                account_id: params.credit_account,
                credit: params.amount,
                ..template
            },
        ];

        // Validate everything together before touching the file.
        let mut all_legs = existing;
        all_legs.extend(new_legs.iter().cloned());
        let violations = validate_legs(&all_legs, &self.accounts, year, month, &self.options);
        if !violations.is_empty() {
            return Err(JournalError::Validation(violations));
        }

        self.append(year, month, &new_legs)?;
        debug!(entry_id, year, month, "appended double entry");
        Ok(entry_id)
    }

    /// Read all legs for (`year`, `month`). A missing month file yields an
    /// empty list, not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or decoded.
    pub fn read_month(&self, year: i32, month: u32) -> Result<Vec<Leg>, JournalError> {
        let path = self.month_path(year, month);
        let file = match fs::File::open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(JournalError::Io {
                    action: "opening journal",
                    path,
                    source,
                });
            }
        };
        Ok(codec::read_legs(file)?)
    }

    /// The next available base sequence for (`year`, `month`): one greater
    /// than the largest parseable sequence, or 1 for an empty month.
    ///
    /// # Errors
    ///
    /// Returns an error if the month file cannot be read.
    pub fn next_entry_seq(&self, year: i32, month: u32) -> Result<u32, JournalError> {
        Ok(next_seq(&self.read_month(year, month)?))
    }

    fn append(&self, year: i32, month: u32, legs: &[Leg]) -> Result<(), JournalError> {
        let path = self.month_path(year, month);
        let dir = path.parent().expect("month path has a parent");
        fs::create_dir_all(dir).map_err(|source| JournalError::Io {
            action: "creating journal dir",
            path: dir.to_path_buf(),
            source,
        })?;

        let is_new = !path.exists();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| JournalError::Io {
                action: "opening journal",
                path: path.clone(),
                source,
            })?;

        if is_new {
            writeln!(file, "{HEADER}").map_err(|source| JournalError::Io {
                action: "writing header",
                path: path.clone(),
                source,
            })?;
        }

        codec::append_legs(&mut file, legs)?;
        Ok(())
    }

    fn month_path(&self, year: i32, month: u32) -> PathBuf {
        self.root
            .join(format!("{year:04}"))
            .join(format!("{month:02}"))
            .join("journal.csv")
    }
}

impl std::fmt::Debug for JournalService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JournalService")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

fn next_seq(legs: &[Leg]) -> u32 {
    legs.iter()
        .filter_map(|leg| parse_entry_id(&leg.entry_id).ok())
        .map(|(_, _, seq)| seq)
        .max()
        .unwrap_or(0)
        + 1
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use tempfile::TempDir;

    use super::*;
    use crate::amount::{format_amount, parse_amount};

    struct MockAccounts(HashSet<i64>);

    impl AccountLookup for MockAccounts {
        fn exists(&self, id: i64) -> bool {
            self.0.contains(&id)
        }
    }

    fn service(dir: &TempDir) -> JournalService {
        let accounts = Arc::new(MockAccounts([1010, 5020].into_iter().collect()));
        JournalService::new(dir.path(), accounts)
    }

    fn params(day: u32, amount: &str) -> AddDoubleParams {
        AddDoubleParams {
            date: NaiveDate::from_ymd_opt(2025, 1, day).unwrap(),
            description: "GitHub subscription".into(),
            debit_account: 5020,
            credit_account: 1010,
            amount: parse_amount(amount).unwrap(),
            confidence: parse_amount("0.98").unwrap(),
            status: EntryStatus::AutoConfirmed,
            ..AddDoubleParams::default()
        }
    }

    #[test]
    fn test_add_double_new_month() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir);

        let entry_id = svc.add_double(params(15, "4.00")).unwrap();
        assert_eq!(entry_id, "2025-01-001");

        assert!(dir.path().join("2025/01/journal.csv").exists());

        let legs = svc.read_month(2025, 1).unwrap();
        assert_eq!(legs.len(), 2);
        assert_eq!(legs[0].entry_id, "2025-01-001a");
        assert_eq!(legs[0].debit, parse_amount("4.00").unwrap());
        assert_eq!(legs[1].entry_id, "2025-01-001b");
        assert_eq!(legs[1].credit, parse_amount("4.00").unwrap());
    }

    #[test]
    fn test_sequencing_across_adds() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir);

        assert_eq!(svc.add_double(params(10, "10.00")).unwrap(), "2025-01-001");
        assert_eq!(svc.add_double(params(11, "20.00")).unwrap(), "2025-01-002");
        assert_eq!(svc.add_double(params(12, "30.00")).unwrap(), "2025-01-003");

        let legs = svc.read_month(2025, 1).unwrap();
        assert_eq!(legs.len(), 6);
        assert_eq!(svc.next_entry_seq(2025, 1).unwrap(), 4);
    }

    #[test]
    fn test_validation_failure_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir);

        svc.add_double(params(10, "10.00")).unwrap();
        let before = fs::read_to_string(dir.path().join("2025/01/journal.csv")).unwrap();

        // Unknown debit account: the month stays exactly as it was.
        let bad = AddDoubleParams {
            debit_account: 9999,
            ..params(20, "50.00")
        };
        let err = svc.add_double(bad).unwrap_err();
        match &err {
            JournalError::Validation(violations) => {
                assert!(!violations.is_empty());
            }
            other => panic!("expected Validation, got {other}"),
        }
        assert!(err.to_string().contains("unknown account 9999"));

        let after = fs::read_to_string(dir.path().join("2025/01/journal.csv")).unwrap();
        assert_eq!(before, after, "failed write must leave the file unchanged");
    }

    #[test]
    fn test_validation_error_aggregates_all_violations() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir);

        // Entry dated February posted with an unknown debit account; the
        // month is derived from the date, so the file under test is
        // 2025/02 and the unknown-account violation is aggregated with
        // nothing else wrong. Check aggregation with two distinct rules
        // instead: unknown account plus excess precision.
        let bad = AddDoubleParams {
            date: NaiveDate::from_ymd_opt(2025, 2, 15).unwrap(),
            debit_account: 9999,
            amount: parse_amount("10.005").unwrap(),
            ..params(15, "10.005")
        };
        let err = svc.add_double(bad).unwrap_err();
        let JournalError::Validation(violations) = &err else {
            panic!("expected Validation, got {err}");
        };
        let numbers: HashSet<u8> = violations.iter().map(|v| v.invariant.number()).collect();
        assert!(numbers.contains(&3));
        assert!(numbers.contains(&6));
        assert!(!dir.path().join("2025/02/journal.csv").exists());
    }

    #[test]
    fn test_decimal_sum_preserved() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir);

        // 0.1 + 0.2 computed in decimal arithmetic persists as 0.30.
        let amount = parse_amount("0.1").unwrap() + parse_amount("0.2").unwrap();
        svc.add_double(AddDoubleParams {
            amount,
            ..params(5, "0.00")
        })
        .unwrap();

        let text = fs::read_to_string(dir.path().join("2025/01/journal.csv")).unwrap();
        assert!(text.contains("0.30"));

        let legs = svc.read_month(2025, 1).unwrap();
        assert_eq!(legs[0].debit, parse_amount("0.30").unwrap());
        assert_eq!(format_amount(legs[0].debit), "0.30");
    }

    #[test]
    fn test_read_month_missing_is_empty() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir);
        assert!(svc.read_month(2031, 7).unwrap().is_empty());
        assert_eq!(svc.next_entry_seq(2031, 7).unwrap(), 1);
    }

    #[test]
    fn test_next_seq_skips_unparseable_ids() {
        let legs = vec![
            Leg {
                entry_id: "2025-01-004a".into(),
                ..Leg::default()
            },
            Leg {
                entry_id: "junk".into(),
                ..Leg::default()
            },
        ];
        assert_eq!(next_seq(&legs), 5);
        assert_eq!(next_seq(&[]), 1);
    }
}
