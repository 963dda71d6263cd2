//! Row codec for the monthly journal file.
//!
//! Fixed 14-column CSV layout. Debit and credit cells are blank when zero
//! and rendered with exactly two decimal places otherwise; dates use
//! `YYYY-MM-DD`. Standard CSV quoting applies for embedded commas, quotes,
//! and newlines.

use std::io;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::amount::format_amount;
use crate::model::{EntryStatus, Leg};

/// Header row of a journal file.
pub const HEADER: &str = "entry_id,date,account_id,description,debit,credit,counterparty,reference,confidence,status,evidence,receipt_hash,tags,notes";

const NUM_FIELDS: usize = 14;
const DATE_FORMAT: &str = "%Y-%m-%d";

const COL_ENTRY_ID: usize = 0;
const COL_DATE: usize = 1;
const COL_ACCOUNT_ID: usize = 2;
const COL_DESCRIPTION: usize = 3;
const COL_DEBIT: usize = 4;
const COL_CREDIT: usize = 5;
const COL_COUNTERPARTY: usize = 6;
const COL_REFERENCE: usize = 7;
const COL_CONFIDENCE: usize = 8;
const COL_STATUS: usize = 9;
const COL_EVIDENCE: usize = 10;
const COL_RECEIPT_HASH: usize = 11;
const COL_TAGS: usize = 12;
const COL_NOTES: usize = 13;

/// Error raised while encoding or decoding journal rows.
///
/// Row numbers are 1-based and count the header row.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The underlying CSV reader or writer failed.
    #[error("reading journal rows: {0}")]
    Csv(#[from] csv::Error),

    /// A row did not have exactly 14 fields.
    #[error("row {row}: expected {NUM_FIELDS} fields, got {found}")]
    RowShape {
        /// 1-based row number, header included.
        row: usize,
        /// Field count actually present.
        found: usize,
    },

    /// A date cell did not parse as `YYYY-MM-DD`.
    #[error("row {row}: parsing date {text:?}: {source}")]
    Date {
        /// 1-based row number.
        row: usize,
        /// The offending cell.
        text: String,
        /// The underlying parse error.
        source: chrono::ParseError,
    },

    /// An `account_id` cell was not an integer.
    #[error("row {row}: parsing account_id {text:?}: {source}")]
    AccountId {
        /// 1-based row number.
        row: usize,
        /// The offending cell.
        text: String,
        /// The underlying parse error.
        source: std::num::ParseIntError,
    },

    /// A monetary cell did not parse as a decimal.
    #[error("row {row}: parsing {field} {text:?}: {source}")]
    Amount {
        /// 1-based row number.
        row: usize,
        /// Which cell: `debit`, `credit`, or `confidence`.
        field: &'static str,
        /// The offending cell.
        text: String,
        /// The underlying parse error.
        source: rust_decimal::Error,
    },

    /// A status cell was outside the known set.
    #[error("row {row}: unknown status {text:?}")]
    Status {
        /// 1-based row number.
        row: usize,
        /// The offending cell.
        text: String,
    },
}

/// Read all legs from a journal stream.
///
/// Empty input, and input containing only the header row, both yield an
/// empty list.
///
/// # Errors
///
/// Returns a [`CodecError`] identifying the first malformed row.
pub fn read_legs<R: io::Read>(reader: R) -> Result<Vec<Leg>, CodecError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut legs = Vec::new();
    for (index, record) in csv_reader.records().enumerate() {
        let row = index + 1;
        let record = record?;
        if record.len() != NUM_FIELDS {
            return Err(CodecError::RowShape {
                row,
                found: record.len(),
            });
        }
        if row == 1 {
            continue; // header
        }
        legs.push(decode_leg(&record, row)?);
    }
    Ok(legs)
}

/// Write the header row followed by the given legs.
///
/// # Errors
///
/// Returns a [`CodecError`] if the underlying writer fails.
pub fn write_legs<W: io::Write>(writer: W, legs: &[Leg]) -> Result<(), CodecError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(HEADER.split(','))?;
    for leg in legs {
        csv_writer.write_record(&encode_leg(leg))?;
    }
    csv_writer.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Append legs to an existing journal stream, without a header.
///
/// # Errors
///
/// Returns a [`CodecError`] if the underlying writer fails.
pub fn append_legs<W: io::Write>(writer: W, legs: &[Leg]) -> Result<(), CodecError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for leg in legs {
        csv_writer.write_record(&encode_leg(leg))?;
    }
    csv_writer.flush().map_err(csv::Error::from)?;
    Ok(())
}

fn encode_leg(leg: &Leg) -> [String; NUM_FIELDS] {
    let mut row: [String; NUM_FIELDS] = Default::default();
    row[COL_ENTRY_ID] = leg.entry_id.clone();
    row[COL_DATE] = leg.date.format(DATE_FORMAT).to_string();
    row[COL_ACCOUNT_ID] = leg.account_id.to_string();
    row[COL_DESCRIPTION] = leg.description.clone();

    if !leg.debit.is_zero() {
        row[COL_DEBIT] = format_amount(leg.debit);
    }
    if !leg.credit.is_zero() {
        row[COL_CREDIT] = format_amount(leg.credit);
    }

    row[COL_COUNTERPARTY] = leg.counterparty.clone();
    row[COL_REFERENCE] = leg.reference.clone();

    if !leg.confidence.is_zero() {
        row[COL_CONFIDENCE] = leg.confidence.to_string();
    }

    row[COL_STATUS] = leg.status.as_str().to_string();
    row[COL_EVIDENCE] = leg.evidence.clone();
    row[COL_RECEIPT_HASH] = leg.receipt_hash.clone();
    row[COL_TAGS] = leg.tags.clone();
    row[COL_NOTES] = leg.notes.clone();
    row
}

fn decode_leg(record: &csv::StringRecord, row: usize) -> Result<Leg, CodecError> {
    let date_text = &record[COL_DATE];
    let date =
        NaiveDate::parse_from_str(date_text, DATE_FORMAT).map_err(|source| CodecError::Date {
            row,
            text: date_text.to_string(),
            source,
        })?;

    let account_text = &record[COL_ACCOUNT_ID];
    let account_id = account_text
        .parse()
        .map_err(|source| CodecError::AccountId {
            row,
            text: account_text.to_string(),
            source,
        })?;

    let status_text = &record[COL_STATUS];
    let status: EntryStatus = status_text.parse().map_err(|_| CodecError::Status {
        row,
        text: status_text.to_string(),
    })?;

    Ok(Leg {
        entry_id: record[COL_ENTRY_ID].to_string(),
        date,
        account_id,
        description: record[COL_DESCRIPTION].to_string(),
        debit: decode_amount(&record[COL_DEBIT], "debit", row)?,
        credit: decode_amount(&record[COL_CREDIT], "credit", row)?,
        counterparty: record[COL_COUNTERPARTY].to_string(),
        reference: record[COL_REFERENCE].to_string(),
        confidence: decode_amount(&record[COL_CONFIDENCE], "confidence", row)?,
        status,
        evidence: record[COL_EVIDENCE].to_string(),
        receipt_hash: record[COL_RECEIPT_HASH].to_string(),
        tags: record[COL_TAGS].to_string(),
        notes: record[COL_NOTES].to_string(),
    })
}

fn decode_amount(text: &str, field: &'static str, row: usize) -> Result<Decimal, CodecError> {
    if text.is_empty() {
        return Ok(Decimal::ZERO);
    }
    text.parse().map_err(|source| CodecError::Amount {
        row,
        field,
        text: text.to_string(),
        source,
    })
}
