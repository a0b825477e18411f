use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::importer::Submission;
use crate::quickbooks::InvoiceResponse;

#[derive(Debug, Clone, PartialEq)]
pub enum InvoiceOutcome {
    Created {
        invoice_id: String,
        txn_id: Option<String>,
    },
    Failed {
        invoice_id: String,
        status_code: i32,
        status_message: String,
    },
    NoResponse {
        invoice_id: String,
    },
}

impl InvoiceOutcome {
    pub fn from_response(invoice_id: &str, response: &InvoiceResponse) -> InvoiceOutcome {
        if response.is_success() {
            InvoiceOutcome::Created {
                invoice_id: invoice_id.to_string(),
                txn_id: response.txn_id.clone(),
            }
        } else {
            InvoiceOutcome::Failed {
                invoice_id: invoice_id.to_string(),
                status_code: response.status_code,
                status_message: response.status_message.clone(),
            }
        }
    }

    pub fn is_failure(&self) -> bool {
        !matches!(self, InvoiceOutcome::Created { .. })
    }
}

impl fmt::Display for InvoiceOutcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            InvoiceOutcome::Created { invoice_id, txn_id } => write!(
                f,
                "✔ Invoice {} created: TxnID={}",
                invoice_id,
                txn_id.as_deref().unwrap_or("(none)")
            ),
            InvoiceOutcome::Failed {
                invoice_id,
                status_code,
                status_message,
            } => write!(f, "✘ Invoice {} failed: Code={} – {}", invoice_id, status_code, status_message),
            InvoiceOutcome::NoResponse { invoice_id } => {
                write!(f, "✘ Invoice {} failed: no response returned", invoice_id)
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub created: usize,
    pub failed: usize,
}

/// Echoes each outcome as it is processed and keeps the failure lines for
/// the error log.
pub struct Reporter<W: Write> {
    out: W,
    failures: Vec<String>,
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W) -> Reporter<W> {
        Reporter {
            out,
            failures: Vec::new(),
        }
    }

    pub fn failures(&self) -> &[String] {
        &self.failures
    }

    /// Pairs response `i` with the invoice submitted at position `i`.
    ///
    /// Every outcome is recorded even if echoing fails; the first echo error
    /// is returned once all invoices have been processed.
    pub fn report(&mut self, submission: &Submission) -> io::Result<ImportSummary> {
        let mut summary = ImportSummary::default();
        let mut echo: io::Result<()> = Ok(());

        for (index, invoice_id) in submission.invoice_ids.iter().enumerate() {
            let outcome = match submission.responses.get(index) {
                Some(response) => {
                    check_request_id(index, invoice_id, response);
                    if !response.is_success() {
                        debug!(
                            "invoice {} rejected, code={} severity={}",
                            invoice_id, response.status_code, response.status_severity
                        );
                    }
                    InvoiceOutcome::from_response(invoice_id, response)
                },
                None => InvoiceOutcome::NoResponse {
                    invoice_id: invoice_id.clone(),
                },
            };

            let line = outcome.to_string();
            if echo.is_ok() {
                echo = writeln!(self.out, "{}", line);
            }
            if outcome.is_failure() {
                summary.failed += 1;
                self.failures.push(line);
            } else {
                summary.created += 1;
            }
        }

        let extra = submission.responses.len().saturating_sub(submission.invoice_ids.len());
        if extra > 0 {
            warn!("ignoring {} responses with no matching invoice request", extra);
        }

        echo.and_then(|_| self.out.flush())?;
        Ok(summary)
    }

    /// Writes one line per failed invoice. Nothing is written, and `None` is
    /// returned, when every invoice succeeded.
    pub fn write_error_log(&self, path: impl AsRef<Path>) -> io::Result<Option<PathBuf>> {
        if self.failures.is_empty() {
            return Ok(None);
        }

        let mut content = self.failures.join("\n");
        content.push('\n');
        fs::write(path.as_ref(), content)?;

        Ok(Some(path.as_ref().to_path_buf()))
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

fn check_request_id(index: usize, invoice_id: &str, response: &InvoiceResponse) {
    if let Some(request_id) = &response.request_id {
        if request_id.trim() != index.to_string() {
            warn!(
                "response {} carries requestID {} but was matched to invoice {} by position",
                index, request_id, invoice_id
            );
        }
    }
}
