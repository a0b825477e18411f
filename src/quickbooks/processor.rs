use std::time::Duration;

use log::debug;
use reqwest::blocking::{Client, Response};

use super::SessionError;
use crate::config::OpenMode;

/// Connection and ticket contract of the accounting application's request
/// processor. One ticket identifies one open company-file session.
pub trait RequestProcessor {
    fn open_connection(&mut self, app_id: &str, app_name: &str) -> Result<(), SessionError>;
    fn begin_session(&mut self, company_file: &str, open_mode: OpenMode) -> Result<String, SessionError>;
    fn process_request(&mut self, ticket: &str, request: &str) -> Result<String, SessionError>;
    fn end_session(&mut self, ticket: &str) -> Result<(), SessionError>;
    fn close_connection(&mut self) -> Result<(), SessionError>;
}

/// Talks to a qbXML relay running next to the accounting application.
pub struct HttpRequestProcessor {
    endpoint: String,
    app_id: String,
    app_name: String,
    client: Option<Client>,
}

impl HttpRequestProcessor {
    pub fn new(endpoint: &str) -> HttpRequestProcessor {
        HttpRequestProcessor {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            app_id: String::new(),
            app_name: String::new(),
            client: None,
        }
    }

    fn client(&self, operation: &'static str) -> Result<&Client, SessionError> {
        self.client.as_ref().ok_or(SessionError::InvalidState {
            operation,
            state: super::SessionState::Closed,
        })
    }

    fn session_url(&self, ticket: &str) -> String {
        format!("{}/sessions/{}", self.endpoint, ticket)
    }
}

fn check_status(response: Response) -> Result<Response, SessionError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(SessionError::Relay {
            status: status.as_u16(),
            body: response.text().unwrap_or_default(),
        })
    }
}

impl RequestProcessor for HttpRequestProcessor {
    fn open_connection(&mut self, app_id: &str, app_name: &str) -> Result<(), SessionError> {
        // No timeout: a hung relay hangs the import.
        let client = Client::builder().timeout(None::<Duration>).build()?;
        self.client = Some(client);
        self.app_id = app_id.to_string();
        self.app_name = app_name.to_string();
        debug!("opened connection to {} as {}", self.endpoint, self.app_name);
        Ok(())
    }

    fn begin_session(&mut self, company_file: &str, open_mode: OpenMode) -> Result<String, SessionError> {
        let response = self
            .client("begin session")?
            .post(format!("{}/sessions", self.endpoint))
            .query(&[
                ("appID", self.app_id.as_str()),
                ("appName", self.app_name.as_str()),
                ("companyFile", company_file),
                ("openMode", open_mode.as_str()),
            ])
            .send()?;
        let ticket = check_status(response)?.text()?.trim().to_string();
        if ticket.is_empty() {
            return Err(SessionError::Relay {
                status: 200,
                body: "empty session ticket".to_string(),
            });
        }

        debug!("began session, ticket={}", ticket);
        Ok(ticket)
    }

    fn process_request(&mut self, ticket: &str, request: &str) -> Result<String, SessionError> {
        let response = self
            .client("process request")?
            .post(self.session_url(ticket))
            .header(reqwest::header::CONTENT_TYPE, "text/xml; charset=utf-8")
            .body(request.to_string())
            .send()?;
        Ok(check_status(response)?.text()?)
    }

    fn end_session(&mut self, ticket: &str) -> Result<(), SessionError> {
        let response = self.client("end session")?.delete(self.session_url(ticket)).send()?;
        check_status(response)?;
        debug!("ended session, ticket={}", ticket);
        Ok(())
    }

    fn close_connection(&mut self) -> Result<(), SessionError> {
        self.client = None;
        Ok(())
    }
}
