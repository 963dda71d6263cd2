//! Domain model: journal legs, chart entries, and bank transactions.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::entry_id;

/// Lifecycle state of a journal entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EntryStatus {
    /// Categorized by an agent above the auto-confirm threshold.
    AutoConfirmed,
    /// Waiting for a human to confirm the categorization.
    #[default]
    PendingReview,
    /// Confirmed by a human as-is.
    UserConfirmed,
    /// Corrected by a human before confirmation.
    UserCorrected,
    /// Reversed by a voiding entry.
    Voided,
    /// Confirmed during initial books bootstrap.
    BootstrapConfirmed,
}

impl EntryStatus {
    /// The on-disk text form of this status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AutoConfirmed => "auto-confirmed",
            Self::PendingReview => "pending-review",
            Self::UserConfirmed => "user-confirmed",
            Self::UserCorrected => "user-corrected",
            Self::Voided => "voided",
            Self::BootstrapConfirmed => "bootstrap-confirmed",
        }
    }
}

impl std::str::FromStr for EntryStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto-confirmed" => Ok(Self::AutoConfirmed),
            "pending-review" => Ok(Self::PendingReview),
            "user-confirmed" => Ok(Self::UserConfirmed),
            "user-corrected" => Ok(Self::UserCorrected),
            "voided" => Ok(Self::Voided),
            "bootstrap-confirmed" => Ok(Self::BootstrapConfirmed),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for a status string outside the known set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown entry status {0:?}")]
pub struct UnknownStatus(pub String);

/// A single row of a monthly journal: one side of a double-entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Leg {
    /// Leg id, `YYYY-MM-NNNx` where `x` is `a`, `b`, `c`...
    pub entry_id: String,
    /// Calendar date of the underlying transaction.
    pub date: NaiveDate,
    /// Chart-of-accounts id this leg posts to.
    pub account_id: i64,
    /// Human-readable description shared by the entry's legs.
    pub description: String,
    /// Debit amount; zero on the credit side.
    pub debit: Decimal,
    /// Credit amount; zero on the debit side.
    pub credit: Decimal,
    /// Counterparty name, if known.
    pub counterparty: String,
    /// Import reference linking back to the source transaction.
    pub reference: String,
    /// Agent confidence in [0, 1].
    pub confidence: Decimal,
    /// Lifecycle status.
    pub status: EntryStatus,
    /// Evidence trail (file paths, rule names).
    pub evidence: String,
    /// Hash of an attached receipt, if any.
    pub receipt_hash: String,
    /// Semicolon-separated tags.
    pub tags: String,
    /// Free-form notes.
    pub notes: String,
}

impl Leg {
    /// The base entry id shared by all legs of this entry:
    /// `2025-01-001a` -> `2025-01-001`.
    #[must_use]
    pub fn entry_group(&self) -> &str {
        entry_id::entry_group(&self.entry_id)
    }
}

/// Classification of accounts in the chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountType {
    /// Things the business owns.
    Asset,
    /// Things the business owes.
    Liability,
    /// Owner claims on the business.
    Equity,
    /// Income earned.
    Revenue,
    /// Costs incurred.
    Expense,
}

impl AccountType {
    /// The on-disk text form of this type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asset => "asset",
            Self::Liability => "liability",
            Self::Equity => "equity",
            Self::Revenue => "revenue",
            Self::Expense => "expense",
        }
    }
}

impl std::str::FromStr for AccountType {
    type Err = UnknownAccountType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asset" => Ok(Self::Asset),
            "liability" => Ok(Self::Liability),
            "equity" => Ok(Self::Equity),
            "revenue" => Ok(Self::Revenue),
            "expense" => Ok(Self::Expense),
            _ => Err(UnknownAccountType(s.to_string())),
        }
    }
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an account type string outside the known set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown account type {0:?}")]
pub struct UnknownAccountType(pub String);

/// A row in the chart of accounts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// Numeric account id.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Classification.
    pub account_type: AccountType,
    /// Parent account id; `None` means top-level.
    pub parent_id: Option<i64>,
    /// Tax form line mapping, if any.
    pub tax_line: String,
    /// Free-form description.
    pub description: String,
}

/// A parsed row from a bank export, inbound to the import primitives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankTransaction {
    /// Posting date.
    pub date: NaiveDate,
    /// Bank-provided description.
    pub description: String,
    /// Signed amount: negative is money out, positive is money in.
    pub amount: Decimal,
    /// Synthesized reference, stable per source row.
    pub reference: String,
    /// Bank transaction kind (`ACH_DEBIT`, ...), verbatim.
    pub kind: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            EntryStatus::AutoConfirmed,
            EntryStatus::PendingReview,
            EntryStatus::UserConfirmed,
            EntryStatus::UserCorrected,
            EntryStatus::Voided,
            EntryStatus::BootstrapConfirmed,
        ] {
            assert_eq!(status.as_str().parse::<EntryStatus>().unwrap(), status);
        }
        assert!("confirmed-ish".parse::<EntryStatus>().is_err());
    }

    #[test]
    fn test_account_type_round_trip() {
        for kind in [
            AccountType::Asset,
            AccountType::Liability,
            AccountType::Equity,
            AccountType::Revenue,
            AccountType::Expense,
        ] {
            assert_eq!(kind.as_str().parse::<AccountType>().unwrap(), kind);
        }
        assert!("contra-asset".parse::<AccountType>().is_err());
    }

    #[test]
    fn test_leg_entry_group() {
        let leg = Leg {
            entry_id: "2025-01-007b".into(),
            ..Leg::default()
        };
        assert_eq!(leg.entry_group(), "2025-01-007");
    }
}
