use std::collections::{HashMap, HashSet};

use log::{debug, warn};

use crate::data::{InvoiceHeader, InvoiceLine};
use crate::quickbooks::{InvoiceAdd, InvoiceResponse, InvoiceSession, LineAdd, LineRate, SessionError};

/// Item whose rate is sent as a percentage and whose quantity is never sent.
pub const PERCENT_ITEM: &str = "OOP";

pub fn is_percent_item(item_ref: &str) -> bool {
    item_ref.eq_ignore_ascii_case(PERCENT_ITEM)
}

impl From<&InvoiceHeader> for InvoiceAdd {
    fn from(header: &InvoiceHeader) -> Self {
        InvoiceAdd {
            customer_ref: header.customer_ref().clone(),
            txn_date: header.txn_date(),
            ref_number: header.ref_number().clone(),
        }
    }
}

impl From<&InvoiceLine> for LineAdd {
    fn from(line: &InvoiceLine) -> Self {
        let percent = is_percent_item(line.item_ref());

        LineAdd {
            item_ref: line.item_ref().clone(),
            desc: line.desc().clone().filter(|desc| !desc.trim().is_empty()),
            quantity: line.quantity().filter(|_| !percent),
            rate: line.rate().map(|rate| {
                if percent {
                    LineRate::Percent(rate)
                } else {
                    LineRate::Rate(rate)
                }
            }),
        }
    }
}

/// Responses of one batch, alongside the InvoiceID of each request in the
/// order the requests were added.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub invoice_ids: Vec<String>,
    pub responses: Vec<InvoiceResponse>,
}

/// Holds an open session and tears it down exactly once when dropped,
/// whichever way the import leaves the scope.
pub struct SessionScope<'a, S: InvoiceSession> {
    session: &'a mut S,
}

impl<'a, S: InvoiceSession> SessionScope<'a, S> {
    pub fn open(session: &'a mut S) -> Result<SessionScope<'a, S>, SessionError> {
        let scope = SessionScope { session };
        scope.session.open_connection()?;
        scope.session.begin_session()?;
        Ok(scope)
    }

    pub fn session(&mut self) -> &mut S {
        &mut *self.session
    }
}

impl<S: InvoiceSession> Drop for SessionScope<'_, S> {
    fn drop(&mut self) {
        if let Err(err) = self.session.end_session() {
            warn!("failed to end session, err={}", err);
        }
        if let Err(err) = self.session.close_connection() {
            warn!("failed to close connection, err={}", err);
        }
    }
}

/// Builds one add-invoice request per header, in header order, with the
/// header's lines attached in file order, and submits them as one batch.
pub fn push_invoices<S: InvoiceSession>(
    session: &mut S,
    headers: &[InvoiceHeader],
    lines: &[InvoiceLine],
) -> Result<Submission, SessionError> {
    let mut lines_by_invoice: HashMap<&str, Vec<&InvoiceLine>> = HashMap::new();
    for line in lines {
        lines_by_invoice.entry(line.invoice_id().as_str()).or_default().push(line);
    }

    let known: HashSet<&str> = headers.iter().map(|header| header.invoice_id().as_str()).collect();
    let orphans = lines.iter().filter(|line| !known.contains(line.invoice_id().as_str())).count();
    if orphans > 0 {
        debug!("{} lines have no matching invoice header and will not be submitted", orphans);
    }

    let mut scope = SessionScope::open(session)?;

    let mut invoice_ids = Vec::with_capacity(headers.len());
    for header in headers {
        let handle = scope.session().add_invoice(&InvoiceAdd::from(header))?;
        invoice_ids.push(header.invoice_id().clone());

        for line in lines_by_invoice.get(header.invoice_id().as_str()).into_iter().flatten() {
            scope.session().add_line(handle, &LineAdd::from(*line))?;
        }
    }

    let responses = scope.session().submit()?;

    Ok(Submission { invoice_ids, responses })
}
