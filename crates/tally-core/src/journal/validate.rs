//! Invariant validation over the legs of one month.
//!
//! Validation never stops at the first problem: every violation found in
//! one pass is returned so callers can report them together.

use std::collections::{HashMap, HashSet};

use chrono::Datelike;
use rust_decimal::Decimal;

use crate::amount::{format_amount, has_cent_precision};
use crate::entry_id::parse_entry_id;
use crate::model::Leg;

/// Capability answering "does this account id exist in the chart?".
pub trait AccountLookup {
    /// Whether the chart contains `id`.
    fn exists(&self, id: i64) -> bool;
}

impl<T: AccountLookup + ?Sized> AccountLookup for std::sync::Arc<T> {
    fn exists(&self, id: i64) -> bool {
        (**self).exists(id)
    }
}

/// The six rules every committed month must satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invariant {
    /// 1: every entry group balances.
    GroupBalance,
    /// 2: exactly one of debit or credit per leg.
    SingleSide,
    /// 3: account ids exist in the chart.
    KnownAccount,
    /// 4: dates fall inside the owning month.
    DateInMonth,
    /// 5: base sequences form a contiguous 1..N set.
    Sequence,
    /// 6: amounts carry at most two decimal places.
    CentPrecision,
}

impl Invariant {
    /// The invariant's number, 1 through 6.
    #[must_use]
    pub const fn number(self) -> u8 {
        match self {
            Self::GroupBalance => 1,
            Self::SingleSide => 2,
            Self::KnownAccount => 3,
            Self::DateInMonth => 4,
            Self::Sequence => 5,
            Self::CentPrecision => 6,
        }
    }
}

/// A single invariant violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Which invariant was broken.
    pub invariant: Invariant,
    /// The offending entry or leg id.
    pub entry_id: String,
    /// Human-readable detail.
    pub detail: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invariant {} [{}]: {}",
            self.invariant.number(),
            self.entry_id,
            self.detail
        )
    }
}

/// Validation knobs.
#[derive(Debug, Clone, Copy)]
pub struct ValidateOptions {
    /// Require base sequences to form a contiguous 1..N set. Disable when
    /// checking imported legacy data whose numbering has gaps; the
    /// duplicate-free and parseable-id parts of the sequence invariant
    /// still apply.
    pub require_contiguous: bool,
}

impl Default for ValidateOptions {
    fn default() -> Self {
        Self {
            require_contiguous: true,
        }
    }
}

/// Check all six invariants over the legs of (`year`, `month`).
///
/// Returns every violation found, ordered: group-balance issues in
/// first-seen group order, then per-leg issues in input order, then the
/// sequence sweep.
#[must_use]
pub fn validate_legs(
    legs: &[Leg],
    accounts: &dyn AccountLookup,
    year: i32,
    month: u32,
    options: &ValidateOptions,
) -> Vec<Violation> {
    let mut violations = Vec::new();

    // Group legs by entry, preserving first-seen order.
    let mut groups: HashMap<&str, Vec<&Leg>> = HashMap::new();
    let mut group_order: Vec<&str> = Vec::new();
    for leg in legs {
        let group = leg.entry_group();
        if !groups.contains_key(group) {
            group_order.push(group);
        }
        groups.entry(group).or_default().push(leg);
    }

    // Invariant 1: debits equal credits within each entry group.
    for group in &group_order {
        let members = &groups[group];
        let total_debit: Decimal = members.iter().map(|leg| leg.debit).sum();
        let total_credit: Decimal = members.iter().map(|leg| leg.credit).sum();
        if total_debit != total_credit {
            violations.push(Violation {
                invariant: Invariant::GroupBalance,
                entry_id: (*group).to_string(),
                detail: format!(
                    "debits ({}) != credits ({})",
                    format_amount(total_debit),
                    format_amount(total_credit)
                ),
            });
        }
    }

    for leg in legs {
        // Invariant 2: exactly one side per leg.
        if leg.debit.is_zero() == leg.credit.is_zero() {
            violations.push(Violation {
                invariant: Invariant::SingleSide,
                entry_id: leg.entry_id.clone(),
                detail: "leg must have exactly one of debit or credit".to_string(),
            });
        }

        // Invariant 3: the account must exist in the chart.
        if !accounts.exists(leg.account_id) {
            violations.push(Violation {
                invariant: Invariant::KnownAccount,
                entry_id: leg.entry_id.clone(),
                detail: format!("unknown account {}", leg.account_id),
            });
        }

        // Invariant 4: the date belongs to the file's month.
        if leg.date.year() != year || leg.date.month() != month {
            violations.push(Violation {
                invariant: Invariant::DateInMonth,
                entry_id: leg.entry_id.clone(),
                detail: format!(
                    "date {} not in {year:04}-{month:02}",
                    leg.date.format("%Y-%m-%d")
                ),
            });
        }

        // Invariant 6: whole cents only.
        if !leg.debit.is_zero() && !has_cent_precision(leg.debit) {
            violations.push(Violation {
                invariant: Invariant::CentPrecision,
                entry_id: leg.entry_id.clone(),
                detail: format!("debit {} has more than 2 decimal places", leg.debit),
            });
        }
        if !leg.credit.is_zero() && !has_cent_precision(leg.credit) {
            violations.push(Violation {
                invariant: Invariant::CentPrecision,
                entry_id: leg.entry_id.clone(),
                detail: format!("credit {} has more than 2 decimal places", leg.credit),
            });
        }
    }

    // Invariant 5: base sequences are parseable and contiguous. Legs of the
    // same entry share a sequence, so the check runs over the set.
    let mut sequences: HashSet<u32> = HashSet::new();
    for leg in legs {
        match parse_entry_id(&leg.entry_id) {
            Ok((_, _, seq)) => {
                sequences.insert(seq);
            }
            Err(err) => violations.push(Violation {
                invariant: Invariant::Sequence,
                entry_id: leg.entry_id.clone(),
                detail: format!("invalid entry ID: {err}"),
            }),
        }
    }
    if options.require_contiguous {
        let count = u32::try_from(sequences.len()).unwrap_or(u32::MAX);
        for expected in 1..=count {
            if !sequences.contains(&expected) {
                violations.push(Violation {
                    invariant: Invariant::Sequence,
                    entry_id: format!("seq {expected}"),
                    detail: format!("missing sequence {expected} in 1..{count}"),
                });
            }
        }
    }

    violations
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::amount::parse_amount;
    use crate::entry_id::{format_entry_id, leg_id};
    use crate::model::EntryStatus;

    struct MockAccounts(HashSet<i64>);

    impl MockAccounts {
        fn new(ids: &[i64]) -> Self {
            Self(ids.iter().copied().collect())
        }
    }

    impl AccountLookup for MockAccounts {
        fn exists(&self, id: i64) -> bool {
            self.0.contains(&id)
        }
    }

    fn balanced_entry(seq: u32, debit_account: i64, credit_account: i64, amount: &str) -> Vec<Leg> {
        let amount = parse_amount(amount).unwrap();
        let entry = format_entry_id(2025, 1, seq);
        let date = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        vec![
            Leg {
                entry_id: leg_id(&entry, 0),
                date,
                account_id: debit_account,
                debit: amount,
                status: EntryStatus::AutoConfirmed,
                ..Leg::default()
            },
            Leg {
                entry_id: leg_id(&entry, 1),
                date,
                account_id: credit_account,
                credit: amount,
                status: EntryStatus::AutoConfirmed,
                ..Leg::default()
            },
        ]
    }

    fn default_accounts() -> MockAccounts {
        MockAccounts::new(&[1010, 1020, 2010, 3010, 4010, 5020])
    }

    #[test]
    fn test_balanced_entry_passes() {
        let legs = balanced_entry(1, 5020, 1010, "100.00");
        let violations = validate_legs(
            &legs,
            &default_accounts(),
            2025,
            1,
            &ValidateOptions::default(),
        );
        assert!(violations.is_empty(), "unexpected: {violations:?}");
    }

    #[test]
    fn test_unbalanced_group_flagged() {
        let mut legs = balanced_entry(1, 5020, 1010, "100.00");
        legs[1].credit = parse_amount("90.00").unwrap();

        let violations = validate_legs(
            &legs,
            &default_accounts(),
            2025,
            1,
            &ValidateOptions::default(),
        );
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].invariant, Invariant::GroupBalance);
        assert_eq!(violations[0].entry_id, "2025-01-001");
        assert!(violations[0].detail.contains("100.00"));
        assert!(violations[0].detail.contains("90.00"));
    }

    #[test]
    fn test_both_sides_flagged() {
        let mut legs = balanced_entry(1, 5020, 1010, "50.00");
        legs[0].credit = parse_amount("50.00").unwrap();

        let violations = validate_legs(
            &legs,
            &default_accounts(),
            2025,
            1,
            &ValidateOptions::default(),
        );
        // The doctored leg also unbalances the group; both rules report.
        assert!(
            violations
                .iter()
                .any(|v| v.invariant == Invariant::SingleSide && v.entry_id == "2025-01-001a")
        );
    }

    #[test]
    fn test_neither_side_flagged() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        let legs = vec![Leg {
            entry_id: "2025-01-001a".into(),
            date,
            account_id: 1010,
            ..Leg::default()
        }];

        let violations = validate_legs(
            &legs,
            &default_accounts(),
            2025,
            1,
            &ValidateOptions::default(),
        );
        assert!(
            violations
                .iter()
                .any(|v| v.invariant == Invariant::SingleSide)
        );
    }

    #[test]
    fn test_unknown_account_flagged() {
        let legs = balanced_entry(1, 9999, 1010, "25.00");
        let violations = validate_legs(
            &legs,
            &default_accounts(),
            2025,
            1,
            &ValidateOptions::default(),
        );
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].invariant, Invariant::KnownAccount);
        assert!(violations[0].detail.contains("9999"));
    }

    #[test]
    fn test_date_outside_month_flagged() {
        let mut legs = balanced_entry(1, 5020, 1010, "25.00");
        let outside = NaiveDate::from_ymd_opt(2025, 2, 15).unwrap();
        legs[0].date = outside;
        legs[1].date = outside;

        let violations = validate_legs(
            &legs,
            &default_accounts(),
            2025,
            1,
            &ValidateOptions::default(),
        );
        assert_eq!(violations.len(), 2);
        for violation in &violations {
            assert_eq!(violation.invariant, Invariant::DateInMonth);
            assert!(violation.detail.contains("2025-02-15"));
            assert!(violation.detail.contains("2025-01"));
        }
    }

    #[test]
    fn test_gap_in_sequence_flagged() {
        let mut legs = balanced_entry(1, 5020, 1010, "10.00");
        legs.extend(balanced_entry(3, 5020, 1010, "20.00"));

        let violations = validate_legs(
            &legs,
            &default_accounts(),
            2025,
            1,
            &ValidateOptions::default(),
        );
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].invariant, Invariant::Sequence);
        assert!(violations[0].detail.contains("missing sequence 2"));
    }

    #[test]
    fn test_gap_allowed_when_contiguity_disabled() {
        let mut legs = balanced_entry(1, 5020, 1010, "10.00");
        legs.extend(balanced_entry(3, 5020, 1010, "20.00"));

        let violations = validate_legs(
            &legs,
            &default_accounts(),
            2025,
            1,
            &ValidateOptions {
                require_contiguous: false,
            },
        );
        assert!(violations.is_empty(), "unexpected: {violations:?}");
    }

    #[test]
    fn test_unparseable_id_is_sequence_violation() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        let amount = parse_amount("5.00").unwrap();
        let legs = vec![
            Leg {
                entry_id: "not-an-id".into(),
                date,
                account_id: 5020,
                debit: amount,
                ..Leg::default()
            },
            Leg {
                entry_id: "not-an-id".into(),
                date,
                account_id: 1010,
                credit: amount,
                ..Leg::default()
            },
        ];

        let violations = validate_legs(
            &legs,
            &default_accounts(),
            2025,
            1,
            &ValidateOptions::default(),
        );
        assert!(
            violations
                .iter()
                .any(|v| v.invariant == Invariant::Sequence && v.detail.contains("invalid entry ID"))
        );
    }

    #[test]
    fn test_excess_precision_flagged() {
        let mut legs = balanced_entry(1, 5020, 1010, "10.005");
        legs[1].credit = parse_amount("10.005").unwrap();

        let violations = validate_legs(
            &legs,
            &default_accounts(),
            2025,
            1,
            &ValidateOptions::default(),
        );
        let precision: Vec<_> = violations
            .iter()
            .filter(|v| v.invariant == Invariant::CentPrecision)
            .collect();
        assert_eq!(precision.len(), 2);
        assert!(precision[0].detail.contains("debit 10.005"));
        assert!(precision[1].detail.contains("credit 10.005"));
    }

    #[test]
    fn test_violations_aggregate_in_order() {
        // Wrong month, unknown debit account, and an unbalanced pair, all
        // in one entry: every issue is reported in a single pass.
        let outside = NaiveDate::from_ymd_opt(2025, 2, 15).unwrap();
        let legs = vec![
            Leg {
                entry_id: "2025-01-001a".into(),
                date: outside,
                account_id: 9999,
                debit: parse_amount("100.00").unwrap(),
                ..Leg::default()
            },
            Leg {
                entry_id: "2025-01-001b".into(),
                date: outside,
                account_id: 1010,
                credit: parse_amount("50.00").unwrap(),
                ..Leg::default()
            },
        ];

        let violations = validate_legs(
            &legs,
            &default_accounts(),
            2025,
            1,
            &ValidateOptions::default(),
        );
        let numbers: Vec<u8> = violations.iter().map(|v| v.invariant.number()).collect();
        assert_eq!(numbers, vec![1, 3, 4, 4]);
    }

    #[test]
    fn test_empty_legs_pass() {
        let violations = validate_legs(
            &[],
            &default_accounts(),
            2025,
            1,
            &ValidateOptions::default(),
        );
        assert!(violations.is_empty());
    }

    #[test]
    fn test_multi_leg_entry_balances() {
        // One debit split across two credits.
        let date = NaiveDate::from_ymd_opt(2025, 1, 20).unwrap();
        let legs = vec![
            Leg {
                entry_id: "2025-01-001a".into(),
                date,
                account_id: 5020,
                debit: parse_amount("100.00").unwrap(),
                ..Leg::default()
            },
            Leg {
                entry_id: "2025-01-001b".into(),
                date,
                account_id: 1010,
                credit: parse_amount("60.00").unwrap(),
                ..Leg::default()
            },
            Leg {
                entry_id: "2025-01-001c".into(),
                date,
                account_id: 2010,
                credit: parse_amount("40.00").unwrap(),
                ..Leg::default()
            },
        ];

        let violations = validate_legs(
            &legs,
            &default_accounts(),
            2025,
            1,
            &ValidateOptions::default(),
        );
        assert!(violations.is_empty(), "unexpected: {violations:?}");
    }
}
