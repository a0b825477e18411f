use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

pub mod processor;
pub mod qbxml;
pub mod session;

pub use processor::{HttpRequestProcessor, RequestProcessor};
pub use session::QbXmlSession;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("cannot {operation} while session is {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },
    #[error("unknown invoice handle {0}")]
    UnknownInvoice(usize),
    #[error("request processor error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("request processor returned {status}: {body}")]
    Relay { status: u16, body: String },
    #[error("qbXML error: {0}")]
    Xml(String),
}

/// Lifecycle of a connection to the accounting application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Closed,
    Connected,
    InSession,
    Ended,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            SessionState::Closed => "closed",
            SessionState::Connected => "connected",
            SessionState::InSession => "in session",
            SessionState::Ended => "ended",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceAdd {
    pub customer_ref: String,
    pub txn_date: NaiveDate,
    pub ref_number: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LineRate {
    Rate(Decimal),
    /// Percentage value, 5 means 5%.
    Percent(Decimal),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineAdd {
    pub item_ref: String,
    pub desc: Option<String>,
    pub quantity: Option<Decimal>,
    pub rate: Option<LineRate>,
}

/// Position of an invoice request inside the pending batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvoiceHandle(pub usize);

#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceResponse {
    pub request_id: Option<String>,
    pub status_code: i32,
    pub status_severity: String,
    pub status_message: String,
    pub txn_id: Option<String>,
}

impl InvoiceResponse {
    pub fn is_success(&self) -> bool {
        self.status_code == 0
    }
}

/// The part of the accounting application's session API the importer needs.
///
/// Requests are staged with `add_invoice`/`add_line` and sent together by
/// `submit`, which returns exactly one response per staged invoice in the
/// order they were added.
pub trait InvoiceSession {
    fn open_connection(&mut self) -> Result<(), SessionError>;
    fn begin_session(&mut self) -> Result<(), SessionError>;

    fn add_invoice(&mut self, invoice: &InvoiceAdd) -> Result<InvoiceHandle, SessionError>;
    fn add_line(&mut self, invoice: InvoiceHandle, line: &LineAdd) -> Result<(), SessionError>;
    fn submit(&mut self) -> Result<Vec<InvoiceResponse>, SessionError>;

    /// No-op unless a session is open.
    fn end_session(&mut self) -> Result<(), SessionError>;
    /// No-op when already closed.
    fn close_connection(&mut self) -> Result<(), SessionError>;
}
