use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::{tempdir, TempDir};

const HEADERS: &str = "InvoiceID,CustomerRef,TxnDate,RefNumber\n\
                       INV-1,CUST-A,2024-01-05,REF100\n";

const LINES: &str = "InvoiceID,LineNum,ItemRef,Desc,Quantity,Rate,Amount\n\
                     INV-1,1,WIDGET,,3,10,\n\
                     INV-1,2,OOP,discount,,5,\n";

fn workdir(headers: Option<&str>, lines: Option<&str>) -> TempDir {
    let dir = tempdir().unwrap();
    if let Some(headers) = headers {
        fs::write(dir.path().join("InvoiceHeader.csv"), headers).unwrap();
    }
    if let Some(lines) = lines {
        fs::write(dir.path().join("InvoiceLines.csv"), lines).unwrap();
    }
    dir
}

fn importer(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("invoice_importer").unwrap();
    cmd.current_dir(dir);
    cmd
}

#[test]
fn test_cli_missing_input_files() {
    let dir = workdir(None, None);

    importer(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unhandled error"))
        .stderr(predicate::str::contains("InvoiceHeader.csv"))
        .stdout(predicate::str::contains("Execution complete"));
}

#[test]
fn test_cli_missing_required_column() {
    let dir = workdir(Some(HEADERS), Some("InvoiceID,Desc,Quantity\nINV-1,thing,1\n"));

    importer(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load invoice lines"))
        .stderr(predicate::str::contains("ItemRef"));
}

#[test]
fn test_cli_unreachable_accounting_application() {
    let dir = workdir(Some(HEADERS), Some(LINES));

    importer(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to submit invoices"))
        .stdout(predicate::str::contains("✔").not())
        .stdout(predicate::str::contains("Execution complete"));

    assert!(!dir.path().join("InvoiceImportErrors.log").exists());
}
