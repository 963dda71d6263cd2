//! Chart of accounts: codec, defaults, and in-memory lookup service.

mod codec;
mod defaults;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub use codec::{read_accounts, write_accounts};
pub use defaults::default_chart;

use crate::journal::AccountLookup;
use crate::model::{Account, AccountType};

/// Relative path of the chart file inside a repository.
pub const CHART_PATH: &str = "accounts/chart-of-accounts.csv";

/// Error raised by chart operations.
#[derive(Debug, thiserror::Error)]
pub enum ChartError {
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

    /// The underlying CSV reader or writer failed.
    #[error("reading chart rows: {0}")]
    Csv(#[from] csv::Error),

    /// A row did not have exactly six fields.
    #[error("row {row}: expected 6 fields, got {found}")]
    RowShape {
        /// 1-based row number, header included.
        row: usize,
        /// Field count actually present.
        found: usize,
    },

    /// An id cell was not an integer.
    #[error("row {row}: parsing {field} {text:?}: {source}")]
    Id {
        /// 1-based row number.
        row: usize,
        /// Which cell: `account_id` or `parent_id`.
        field: &'static str,
        /// The offending cell.
        text: String,
        /// The underlying parse error.
        source: std::num::ParseIntError,
    },

    /// An account type cell was outside the known set.
    #[error("row {row}: {source}")]
    Type {
        /// 1-based row number.
        row: usize,
        /// The underlying error.
        source: crate::model::UnknownAccountType,
    },
}

/// In-memory lookup over the chart of accounts. Immutable during a run.
#[derive(Debug, Clone)]
pub struct ChartService {
    accounts: Vec<Account>,
    by_id: HashMap<i64, usize>,
}

impl ChartService {
    /// Build a service from a list of accounts.
    #[must_use]
    pub fn new(accounts: Vec<Account>) -> Self {
        let by_id = accounts
            .iter()
            .enumerate()
            .map(|(index, account)| (account.id, index))
            .collect();
        Self { accounts, by_id }
    }

    /// Load `accounts/chart-of-accounts.csv` from a repository root.
    ///
    /// # Errors
    ///
    /// Returns an error if the chart file is missing or malformed.
    pub fn load(root: impl AsRef<Path>) -> Result<Self, ChartError> {
        let path = root.as_ref().join(CHART_PATH);
        let file = fs::File::open(&path).map_err(|source| ChartError::Io {
            action: "opening chart of accounts",
            path: path.clone(),
            source,
        })?;
        Ok(Self::new(read_accounts(file)?))
    }

    /// All accounts in chart order.
    #[must_use]
    pub fn all(&self) -> &[Account] {
        &self.accounts
    }

    /// Look up an account by id.
    #[must_use]
    pub fn get(&self, id: i64) -> Option<&Account> {
        self.by_id.get(&id).map(|&index| &self.accounts[index])
    }

    /// All accounts of the given type, in chart order.
    #[must_use]
    pub fn by_type(&self, account_type: AccountType) -> Vec<&Account> {
        self.accounts
            .iter()
            .filter(|account| account.account_type == account_type)
            .collect()
    }

    /// Write the chart back to `accounts/chart-of-accounts.csv` under
    /// `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn save(&self, root: impl AsRef<Path>) -> Result<(), ChartError> {
        let path = root.as_ref().join(CHART_PATH);
        let dir = path.parent().expect("chart path has a parent");
        fs::create_dir_all(dir).map_err(|source| ChartError::Io {
            action: "creating accounts dir",
            path: dir.to_path_buf(),
            source,
        })?;

        let file = fs::File::create(&path).map_err(|source| ChartError::Io {
            action: "creating chart of accounts",
            path: path.clone(),
            source,
        })?;
        write_accounts(file, &self.accounts)
    }
}

impl AccountLookup for ChartService {
    fn exists(&self, id: i64) -> bool {
        self.by_id.contains_key(&id)
    }
}
