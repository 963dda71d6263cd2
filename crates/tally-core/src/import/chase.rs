//! Parser for Chase checking-account CSV exports.

use std::io;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::{BankParser, ImportError};
use crate::model::BankTransaction;

const NUM_FIELDS: usize = 7;
const DATE_FORMAT: &str = "%m/%d/%Y";

const COL_DATE: usize = 1;
const COL_DESCRIPTION: usize = 2;
const COL_AMOUNT: usize = 3;
const COL_KIND: usize = 4;

/// Chase checking export: seven columns, posting date in `MM/DD/YYYY`.
#[derive(Debug, Clone, Copy)]
pub struct ChaseParser;

impl BankParser for ChaseParser {
    fn format(&self) -> &'static str {
        "chase"
    }

    fn parse(&self, reader: &mut dyn io::Read) -> Result<Vec<BankTransaction>, ImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut transactions = Vec::new();
        for (index, record) in csv_reader.records().enumerate() {
            let row = index + 1;
            let record = record?;
            if record.len() != NUM_FIELDS {
                return Err(ImportError::RowShape {
                    row,
                    expected: NUM_FIELDS,
                    found: record.len(),
                });
            }
            if row == 1 {
                continue; // header
            }
            transactions.push(decode_row(&record, row)?);
        }
        Ok(transactions)
    }
}

fn decode_row(record: &csv::StringRecord, row: usize) -> Result<BankTransaction, ImportError> {
    let date_text = &record[COL_DATE];
    let date =
        NaiveDate::parse_from_str(date_text, DATE_FORMAT).map_err(|source| ImportError::Date {
            row,
            text: date_text.to_string(),
            source,
        })?;

    let amount_text = &record[COL_AMOUNT];
    let amount: Decimal = amount_text.parse().map_err(|source| ImportError::Amount {
        row,
        text: amount_text.to_string(),
        source,
    })?;

    let description = record[COL_DESCRIPTION].to_string();
    let reference = make_reference(date, &description);

    Ok(BankTransaction {
        date,
        description,
        amount,
        reference,
        kind: record[COL_KIND].to_string(),
    })
}

/// Build a reference like `chase_20250103_GITHUB` from the posting date and
/// the first ten alphanumeric characters of the description.
fn make_reference(date: NaiveDate, description: &str) -> String {
    let prefix: String = description
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(10)
        .collect();
    format!("chase_{}_{prefix}", date.format("%Y%m%d"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Details,Posting Date,Description,Amount,Type,Balance,Check or Slip #
DEBIT,01/03/2025,GITHUB INC,-4.00,ACH_DEBIT,996.00,
CREDIT,01/10/2025,STRIPE PAYOUT,250.00,ACH_CREDIT,1246.00,
";

    #[test]
    fn test_parse_sample_export() {
        let mut reader = SAMPLE.as_bytes();
        let transactions = ChaseParser.parse(&mut reader).unwrap();
        assert_eq!(transactions.len(), 2);

        let github = &transactions[0];
        assert_eq!(github.date, NaiveDate::from_ymd_opt(2025, 1, 3).unwrap());
        assert_eq!(github.description, "GITHUB INC");
        assert_eq!(github.amount, "-4.00".parse().unwrap());
        assert_eq!(github.kind, "ACH_DEBIT");
        assert_eq!(github.reference, "chase_20250103_GITHUBINC");

        let stripe = &transactions[1];
        assert!(stripe.amount.is_sign_positive());
    }

    #[test]
    fn test_header_only_is_empty() {
        let mut reader =
            &b"Details,Posting Date,Description,Amount,Type,Balance,Check or Slip #\n"[..];
        assert!(ChaseParser.parse(&mut reader).unwrap().is_empty());
    }

    #[test]
    fn test_reference_truncates_to_ten() {
        let date = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();
        assert_eq!(
            make_reference(date, "AMAZON WEB SERVICES #123"),
            "chase_20250201_AMAZONWEBS"
        );
    }

    #[test]
    fn test_bad_amount_reports_row() {
        let input = "\
Details,Posting Date,Description,Amount,Type,Balance,Check or Slip #
DEBIT,01/03/2025,GITHUB INC,four,ACH_DEBIT,996.00,
";
        let mut reader = input.as_bytes();
        let err = ChaseParser.parse(&mut reader).unwrap_err();
        assert!(matches!(err, ImportError::Amount { row: 2, .. }));
    }

    #[test]
    fn test_wrong_shape_reports_row() {
        let input = "\
Details,Posting Date,Description,Amount,Type,Balance,Check or Slip #
DEBIT,01/03/2025,GITHUB INC
";
        let mut reader = input.as_bytes();
        let err = ChaseParser.parse(&mut reader).unwrap_err();
        assert!(matches!(
            err,
            ImportError::RowShape {
                row: 2,
                expected: 7,
                found: 3
            }
        ));
    }
}
