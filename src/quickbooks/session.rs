use log::{debug, info};

use super::qbxml::{self, InvoiceAddRq, MessageSet};
use super::{
    InvoiceAdd, InvoiceHandle, InvoiceResponse, InvoiceSession, LineAdd, RequestProcessor, SessionError, SessionState,
};
use crate::config::{ImportConfig, OpenMode};

/// `InvoiceSession` that stages requests as a qbXML message set and sends
/// them through a `RequestProcessor`.
pub struct QbXmlSession<P: RequestProcessor> {
    processor: P,
    app_id: String,
    app_name: String,
    company_file: String,
    open_mode: OpenMode,
    qbxml_version: (u8, u8),

    state: SessionState,
    ticket: Option<String>,
    message_set: MessageSet,
}

impl<P: RequestProcessor> QbXmlSession<P> {
    pub fn new(processor: P, config: &ImportConfig) -> QbXmlSession<P> {
        QbXmlSession {
            processor,
            app_id: config.app_id.clone(),
            app_name: config.app_name.clone(),
            company_file: config.company_file.clone(),
            open_mode: config.open_mode,
            qbxml_version: config.qbxml_version,
            state: SessionState::Closed,
            ticket: None,
            message_set: MessageSet::default(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn processor(&self) -> &P {
        &self.processor
    }

    fn expect_state(&self, operation: &'static str, expected: &[SessionState]) -> Result<(), SessionError> {
        if expected.contains(&self.state) {
            Ok(())
        } else {
            Err(SessionError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    fn ticket(&self, operation: &'static str) -> Result<&str, SessionError> {
        self.ticket.as_deref().ok_or(SessionError::InvalidState {
            operation,
            state: self.state,
        })
    }
}

impl<P: RequestProcessor> InvoiceSession for QbXmlSession<P> {
    fn open_connection(&mut self) -> Result<(), SessionError> {
        self.expect_state("open connection", &[SessionState::Closed])?;
        self.processor.open_connection(&self.app_id, &self.app_name)?;
        self.state = SessionState::Connected;
        Ok(())
    }

    fn begin_session(&mut self) -> Result<(), SessionError> {
        self.expect_state("begin session", &[SessionState::Connected])?;
        let ticket = self.processor.begin_session(&self.company_file, self.open_mode)?;
        self.ticket = Some(ticket);
        self.message_set = MessageSet::default();
        self.state = SessionState::InSession;
        Ok(())
    }

    fn add_invoice(&mut self, invoice: &InvoiceAdd) -> Result<InvoiceHandle, SessionError> {
        self.expect_state("add invoice", &[SessionState::InSession])?;
        self.message_set.requests.push(InvoiceAddRq {
            invoice: invoice.clone(),
            lines: Vec::new(),
        });
        Ok(InvoiceHandle(self.message_set.requests.len() - 1))
    }

    fn add_line(&mut self, invoice: InvoiceHandle, line: &LineAdd) -> Result<(), SessionError> {
        self.expect_state("add line", &[SessionState::InSession])?;
        let request = self
            .message_set
            .requests
            .get_mut(invoice.0)
            .ok_or(SessionError::UnknownInvoice(invoice.0))?;
        request.lines.push(line.clone());
        Ok(())
    }

    fn submit(&mut self) -> Result<Vec<InvoiceResponse>, SessionError> {
        self.expect_state("submit", &[SessionState::InSession])?;
        let message_set = std::mem::take(&mut self.message_set);
        if message_set.is_empty() {
            debug!("nothing to submit");
            return Ok(Vec::new());
        }

        let request = qbxml::encode_request(&message_set, self.qbxml_version)?;
        debug!("submitting {} invoice requests", message_set.requests.len());
        let ticket = self.ticket("submit")?.to_string();
        let response = self.processor.process_request(&ticket, &request)?;
        let responses = qbxml::decode_responses(&response)?;
        info!("received {} responses", responses.len());

        Ok(responses)
    }

    fn end_session(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::InSession {
            return Ok(());
        }

        // The session counts as ended even if the processor fails to end it.
        self.state = SessionState::Ended;
        let ticket = self.ticket.take();
        if let Some(ticket) = ticket {
            self.processor.end_session(&ticket)?;
        }
        Ok(())
    }

    fn close_connection(&mut self) -> Result<(), SessionError> {
        if self.state == SessionState::Closed {
            return Ok(());
        }
        self.expect_state("close connection", &[SessionState::Connected, SessionState::Ended])?;

        self.state = SessionState::Closed;
        self.processor.close_connection()
    }
}
