use std::fs::File;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::NaiveDate;
use getset::{CopyGetters, Getters};
use log::{debug, warn};
use rust_decimal::Decimal;
use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer};
use thiserror::Error;

const HEADER_COLUMNS: &[&str] = &["InvoiceID", "CustomerRef", "TxnDate", "RefNumber"];
const LINE_COLUMNS: &[&str] = &["InvoiceID", "ItemRef"];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open {}", path.display())]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{}: required column `{column}` not found", path.display())]
    MissingColumn { path: PathBuf, column: &'static str },
    #[error("failed to read CSV header row of {}", path.display())]
    Csv { path: PathBuf, source: csv::Error },
}

#[derive(Debug, Clone, PartialEq, Deserialize, Getters, CopyGetters)]
pub struct InvoiceHeader {
    #[serde(rename = "InvoiceID")]
    #[getset(get = "pub")]
    invoice_id: String,
    #[serde(rename = "CustomerRef")]
    #[getset(get = "pub")]
    customer_ref: String,
    #[serde(rename = "TxnDate", deserialize_with = "txn_date")]
    #[getset(get_copy = "pub")]
    txn_date: NaiveDate,
    #[serde(rename = "RefNumber")]
    #[getset(get = "pub")]
    ref_number: String,
}

impl InvoiceHeader {
    pub fn new(invoice_id: &str, customer_ref: &str, txn_date: NaiveDate, ref_number: &str) -> InvoiceHeader {
        InvoiceHeader {
            invoice_id: invoice_id.to_string(),
            customer_ref: customer_ref.to_string(),
            txn_date,
            ref_number: ref_number.to_string(),
        }
    }
}

/// A single line item. Empty numeric cells stay `None`: an absent value is
/// never sent, which is different from sending zero.
#[derive(Debug, Clone, PartialEq, Deserialize, Getters, CopyGetters)]
pub struct InvoiceLine {
    #[serde(rename = "InvoiceID")]
    #[getset(get = "pub")]
    invoice_id: String,
    #[serde(rename = "LineNum", default, deserialize_with = "informational_line_num")]
    #[getset(get_copy = "pub")]
    line_num: Option<u32>,
    #[serde(rename = "ItemRef")]
    #[getset(get = "pub")]
    item_ref: String,
    #[serde(rename = "Desc", default)]
    #[getset(get = "pub")]
    desc: Option<String>,
    #[serde(rename = "Quantity", default, deserialize_with = "optional_decimal")]
    #[getset(get_copy = "pub")]
    quantity: Option<Decimal>,
    #[serde(rename = "Rate", default, deserialize_with = "optional_decimal")]
    #[getset(get_copy = "pub")]
    rate: Option<Decimal>,
    #[serde(rename = "Amount", default, deserialize_with = "optional_decimal")]
    #[getset(get_copy = "pub")]
    amount: Option<Decimal>,
}

impl InvoiceLine {
    pub fn new(
        invoice_id: &str,
        line_num: Option<u32>,
        item_ref: &str,
        desc: Option<&str>,
        quantity: Option<Decimal>,
        rate: Option<Decimal>,
        amount: Option<Decimal>,
    ) -> InvoiceLine {
        InvoiceLine {
            invoice_id: invoice_id.to_string(),
            line_num,
            item_ref: item_ref.to_string(),
            desc: desc.map(str::to_string),
            quantity,
            rate,
            amount,
        }
    }
}

pub fn load_headers(path: impl AsRef<Path>) -> Result<Vec<InvoiceHeader>, LoadError> {
    read_records(path.as_ref(), HEADER_COLUMNS)
}

pub fn load_lines(path: impl AsRef<Path>) -> Result<Vec<InvoiceLine>, LoadError> {
    read_records(path.as_ref(), LINE_COLUMNS)
}

fn read_records<T: DeserializeOwned>(path: &Path, required: &[&'static str]) -> Result<Vec<T>, LoadError> {
    let file = File::open(path).map_err(|source| LoadError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(file);

    let columns = csv_reader
        .headers()
        .map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        })?
        .clone();
    if let Some(&column) = required.iter().find(|name| !columns.iter().any(|c| c == **name)) {
        return Err(LoadError::MissingColumn {
            path: path.to_path_buf(),
            column,
        });
    }

    let mut records = Vec::new();
    for record in csv_reader.deserialize::<T>() {
        match record {
            Ok(record) => records.push(record),
            Err(err) => warn!("skipping malformed row in {}, err={}", path.display(), err),
        }
    }

    debug!("loaded {} records from {}", records.len(), path.display());

    Ok(records)
}

/// Parses a transaction date, dropping any trailing time part.
pub fn parse_txn_date(raw: &str) -> Option<NaiveDate> {
    let date = raw.trim().split([' ', 'T']).next()?;
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(date, format).ok())
}

fn txn_date<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_txn_date(&raw).ok_or_else(|| de::Error::custom(format!("invalid TxnDate `{raw}`")))
}

/// LineNum is informational only, so a bad value never costs the row.
fn informational_line_num<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => match value.parse() {
            Ok(line_num) => Ok(Some(line_num)),
            Err(err) => {
                warn!("ignoring invalid LineNum `{}`, err={}", value, err);
                Ok(None)
            },
        },
    }
}

fn optional_decimal<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Decimal>, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => Decimal::from_str(value)
            .or_else(|_| Decimal::from_scientific(value))
            .map(Some)
            .map_err(|err| de::Error::custom(format!("invalid decimal `{value}`: {err}"))),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;
    use tempfile::NamedTempFile;

    use super::*;

    fn csv_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_load_headers() {
        let file = csv_file(
            "InvoiceID,CustomerRef,TxnDate,RefNumber\n\
             INV-1, CUST-A, 2024-01-05, REF100\n\
             INV-2,CUST-B,01/06/2024,REF101\n",
        );

        let headers = load_headers(file.path()).unwrap();

        assert_eq!(
            headers,
            vec![
                InvoiceHeader::new("INV-1", "CUST-A", date(2024, 1, 5), "REF100"),
                InvoiceHeader::new("INV-2", "CUST-B", date(2024, 1, 6), "REF101"),
            ]
        );
    }

    #[test]
    fn test_headers_bind_by_column_name() {
        let file = csv_file(
            "RefNumber,TxnDate,Notes,InvoiceID,CustomerRef\n\
             REF100,2024-01-05,ignored,INV-1,CUST-A\n",
        );

        let headers = load_headers(file.path()).unwrap();

        assert_eq!(headers, vec![InvoiceHeader::new("INV-1", "CUST-A", date(2024, 1, 5), "REF100")]);
    }

    #[test]
    fn test_headers_missing_required_column() {
        let file = csv_file("InvoiceID,CustomerRef,RefNumber\nINV-1,CUST-A,REF100\n");

        match load_headers(file.path()) {
            Err(LoadError::MissingColumn { column, .. }) => assert_eq!(column, "TxnDate"),
            other => panic!("expected missing column, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_file() {
        let err = load_headers("definitely-not-here/InvoiceHeader.csv").unwrap_err();

        assert!(matches!(err, LoadError::Open { .. }));
        assert!(err.to_string().contains("InvoiceHeader.csv"));
    }

    #[test]
    fn test_empty_numeric_cells_are_absent() {
        let file = csv_file(
            "InvoiceID,LineNum,ItemRef,Desc,Quantity,Rate,Amount\n\
             INV-1,1,WIDGET,,3,10,\n\
             INV-1,2,OOP,discount,,5,\n",
        );

        let lines = load_lines(file.path()).unwrap();

        assert_eq!(
            lines,
            vec![
                InvoiceLine::new("INV-1", Some(1), "WIDGET", None, Some(dec!(3)), Some(dec!(10)), None),
                InvoiceLine::new("INV-1", Some(2), "OOP", Some("discount"), None, Some(dec!(5)), None),
            ]
        );
    }

    #[test]
    fn test_decimal_scale_is_preserved() {
        let file = csv_file("InvoiceID,ItemRef,Quantity,Rate\nINV-1,WIDGET,1.50,0.125\n");

        let lines = load_lines(file.path()).unwrap();

        assert_eq!(lines[0].quantity().unwrap().to_string(), "1.50");
        assert_eq!(lines[0].rate().unwrap().to_string(), "0.125");
    }

    #[test]
    fn test_missing_optional_columns() {
        let file = csv_file("InvoiceID,ItemRef\nINV-1,WIDGET\n");

        let lines = load_lines(file.path()).unwrap();

        assert_eq!(lines, vec![InvoiceLine::new("INV-1", None, "WIDGET", None, None, None, None)]);
    }

    #[test]
    fn test_lines_missing_item_ref_column() {
        let file = csv_file("InvoiceID,Desc\nINV-1,thing\n");

        match load_lines(file.path()) {
            Err(LoadError::MissingColumn { column, .. }) => assert_eq!(column, "ItemRef"),
            other => panic!("expected missing column, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_line_num_keeps_row() {
        let file = csv_file(
            "InvoiceID,LineNum,ItemRef,Quantity,Rate\n\
             INV-1,1.0,WIDGET,3,10\n\
             INV-1,-1,GADGET,1,1\n\
             INV-1,2,OK,1,1\n",
        );

        let lines = load_lines(file.path()).unwrap();

        assert_eq!(
            lines,
            vec![
                InvoiceLine::new("INV-1", None, "WIDGET", None, Some(dec!(3)), Some(dec!(10)), None),
                InvoiceLine::new("INV-1", None, "GADGET", None, Some(dec!(1)), Some(dec!(1)), None),
                InvoiceLine::new("INV-1", Some(2), "OK", None, Some(dec!(1)), Some(dec!(1)), None),
            ]
        );
    }

    #[test]
    fn test_malformed_rows_are_skipped() {
        let file = csv_file(
            "InvoiceID,ItemRef,Quantity,Rate\n\
             INV-1,WIDGET,lots,10\n\
             INV-1,GADGET,2\n\
             INV-2,WIDGET,1,1\n",
        );

        let lines = load_lines(file.path()).unwrap();

        assert_eq!(
            lines,
            vec![
                InvoiceLine::new("INV-1", None, "GADGET", None, Some(dec!(2)), None, None),
                InvoiceLine::new("INV-2", None, "WIDGET", None, Some(dec!(1)), Some(dec!(1)), None),
            ]
        );
    }

    #[test]
    fn test_unparsable_date_row_is_skipped() {
        let file = csv_file(
            "InvoiceID,CustomerRef,TxnDate,RefNumber\n\
             INV-1,CUST-A,someday,REF100\n\
             INV-2,CUST-B,2024/02/29,REF101\n",
        );

        let headers = load_headers(file.path()).unwrap();

        assert_eq!(headers, vec![InvoiceHeader::new("INV-2", "CUST-B", date(2024, 2, 29), "REF101")]);
    }

    #[test]
    fn test_parse_txn_date_formats() {
        assert_eq!(parse_txn_date("2024-01-05"), Some(date(2024, 1, 5)));
        assert_eq!(parse_txn_date("2024/01/05"), Some(date(2024, 1, 5)));
        assert_eq!(parse_txn_date("1/5/2024"), Some(date(2024, 1, 5)));
        assert_eq!(parse_txn_date("1/5/2024 00:00:00"), Some(date(2024, 1, 5)));
        assert_eq!(parse_txn_date("2024-01-05T10:30:00"), Some(date(2024, 1, 5)));
        assert_eq!(parse_txn_date("2024-13-05"), None);
        assert_eq!(parse_txn_date(""), None);
    }
}
