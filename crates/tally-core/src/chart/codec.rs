//! Row codec for the chart-of-accounts file.
//!
//! Six columns: `account_id,account_name,account_type,parent_id,tax_line,
//! description`. An empty `parent_id` means top-level.

use std::io;

use super::ChartError;
use crate::model::{Account, AccountType};

const NUM_FIELDS: usize = 6;

const COL_ID: usize = 0;
const COL_NAME: usize = 1;
const COL_TYPE: usize = 2;
const COL_PARENT: usize = 3;
const COL_TAX_LINE: usize = 4;
const COL_DESCRIPTION: usize = 5;

const HEADER: [&str; NUM_FIELDS] = [
    "account_id",
    "account_name",
    "account_type",
    "parent_id",
    "tax_line",
    "description",
];

/// Read all accounts from a chart stream. Empty and header-only input both
/// yield an empty list.
///
/// # Errors
///
/// Returns a [`ChartError`] identifying the first malformed row.
pub fn read_accounts<R: io::Read>(reader: R) -> Result<Vec<Account>, ChartError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut accounts = Vec::new();
    for (index, record) in csv_reader.records().enumerate() {
        let row = index + 1;
        let record = record?;
        if record.len() != NUM_FIELDS {
            return Err(ChartError::RowShape {
                row,
                found: record.len(),
            });
        }
        if row == 1 {
            continue; // header
        }
        accounts.push(decode_account(&record, row)?);
    }
    Ok(accounts)
}

/// Write the header row followed by the given accounts.
///
/// # Errors
///
/// Returns a [`ChartError`] if the underlying writer fails.
pub fn write_accounts<W: io::Write>(writer: W, accounts: &[Account]) -> Result<(), ChartError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(HEADER)?;
    for account in accounts {
        csv_writer.write_record(&encode_account(account))?;
    }
    csv_writer.flush().map_err(csv::Error::from)?;
    Ok(())
}

fn encode_account(account: &Account) -> [String; NUM_FIELDS] {
    let mut row: [String; NUM_FIELDS] = Default::default();
    row[COL_ID] = account.id.to_string();
    row[COL_NAME] = account.name.clone();
    row[COL_TYPE] = account.account_type.as_str().to_string();
    if let Some(parent) = account.parent_id {
        row[COL_PARENT] = parent.to_string();
    }
    row[COL_TAX_LINE] = account.tax_line.clone();
    row[COL_DESCRIPTION] = account.description.clone();
    row
}

fn decode_account(record: &csv::StringRecord, row: usize) -> Result<Account, ChartError> {
    let id_text = &record[COL_ID];
    let id = id_text.parse().map_err(|source| ChartError::Id {
        row,
        field: "account_id",
        text: id_text.to_string(),
        source,
    })?;

    let parent_text = &record[COL_PARENT];
    let parent_id = if parent_text.is_empty() {
        None
    } else {
        Some(parent_text.parse().map_err(|source| ChartError::Id {
            row,
            field: "parent_id",
            text: parent_text.to_string(),
            source,
        })?)
    };

    let account_type: AccountType = record[COL_TYPE]
        .parse()
        .map_err(|source| ChartError::Type { row, source })?;

    Ok(Account {
        id,
        name: record[COL_NAME].to_string(),
        account_type,
        parent_id,
        tax_line: record[COL_TAX_LINE].to_string(),
        description: record[COL_DESCRIPTION].to_string(),
    })
}
