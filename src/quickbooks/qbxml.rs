use std::io::Cursor;

use quick_xml::events::{BytesDecl, BytesEnd, BytesPI, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use super::{InvoiceAdd, InvoiceResponse, LineAdd, LineRate, SessionError};

const ON_ERROR: &str = "continueOnError";

#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceAddRq {
    pub invoice: InvoiceAdd,
    pub lines: Vec<LineAdd>,
}

/// A batch of requests sent in one round trip.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MessageSet {
    pub requests: Vec<InvoiceAddRq>,
}

impl MessageSet {
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

fn xml_err(e: impl std::fmt::Display) -> SessionError {
    SessionError::Xml(e.to_string())
}

struct XmlWriter {
    writer: Writer<Cursor<Vec<u8>>>,
}

impl XmlWriter {
    fn new(version: (u8, u8)) -> Result<Self, SessionError> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
            .map_err(xml_err)?;
        let pi = format!("qbxml version=\"{}.{}\"", version.0, version.1);
        writer
            .write_event(Event::PI(BytesPI::new(pi.as_str())))
            .map_err(xml_err)?;
        Ok(XmlWriter { writer })
    }

    fn into_string(self) -> Result<String, SessionError> {
        String::from_utf8(self.writer.into_inner().into_inner()).map_err(xml_err)
    }

    fn start(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<&mut Self, SessionError> {
        let mut elem = BytesStart::new(name);
        for attr in attrs {
            elem.push_attribute(*attr);
        }
        self.writer.write_event(Event::Start(elem)).map_err(xml_err)?;
        Ok(self)
    }

    fn end(&mut self, name: &str) -> Result<&mut Self, SessionError> {
        self.writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(xml_err)?;
        Ok(self)
    }

    fn text(&mut self, name: &str, text: &str) -> Result<&mut Self, SessionError> {
        self.start(name, &[])?;
        self.writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(xml_err)?;
        self.end(name)
    }

    fn full_name_ref(&mut self, name: &str, full_name: &str) -> Result<&mut Self, SessionError> {
        self.start(name, &[])?;
        self.text("FullName", full_name)?;
        self.end(name)
    }
}

/// Serializes a message set into a qbXML request document. Each invoice is
/// tagged with its batch position as `requestID`.
pub fn encode_request(message_set: &MessageSet, version: (u8, u8)) -> Result<String, SessionError> {
    let mut w = XmlWriter::new(version)?;

    w.start("QBXML", &[])?;
    w.start("QBXMLMsgsRq", &[("onError", ON_ERROR)])?;
    for (index, request) in message_set.requests.iter().enumerate() {
        let request_id = index.to_string();
        w.start("InvoiceAddRq", &[("requestID", request_id.as_str())])?;
        w.start("InvoiceAdd", &[])?;
        w.full_name_ref("CustomerRef", &request.invoice.customer_ref)?;
        w.text("TxnDate", &request.invoice.txn_date.format("%Y-%m-%d").to_string())?;
        w.text("RefNumber", &request.invoice.ref_number)?;
        for line in &request.lines {
            write_line(&mut w, line)?;
        }
        w.end("InvoiceAdd")?;
        w.end("InvoiceAddRq")?;
    }
    w.end("QBXMLMsgsRq")?;
    w.end("QBXML")?;

    w.into_string()
}

fn write_line(w: &mut XmlWriter, line: &LineAdd) -> Result<(), SessionError> {
    // Element order is fixed by the qbXML schema.
    w.start("InvoiceLineAdd", &[])?;
    w.full_name_ref("ItemRef", &line.item_ref)?;
    if let Some(desc) = &line.desc {
        w.text("Desc", desc)?;
    }
    if let Some(quantity) = line.quantity {
        w.text("Quantity", &quantity.to_string())?;
    }
    match line.rate {
        Some(LineRate::Rate(rate)) => {
            w.text("Rate", &rate.to_string())?;
        },
        Some(LineRate::Percent(percent)) => {
            w.text("RatePercent", &percent.to_string())?;
        },
        None => {},
    }
    w.end("InvoiceLineAdd")?;
    Ok(())
}

fn is_response_element(name: &str) -> bool {
    name.ends_with("Rs") && name != "QBXMLMsgsRs"
}

/// `TxnID` directly under a `*Ret` element.
fn at_txn_id(path: &[String]) -> bool {
    match path {
        [.., parent, leaf] => parent.ends_with("Ret") && leaf == "TxnID",
        _ => false,
    }
}

fn response_from_attributes(start: &BytesStart) -> Result<InvoiceResponse, SessionError> {
    let mut request_id = None;
    let mut status_code: Option<i32> = None;
    let mut status_severity = String::new();
    let mut status_message = String::new();

    for attr in start.attributes() {
        let attr = attr.map_err(xml_err)?;
        let value = attr.unescape_value().map_err(xml_err)?.into_owned();
        match attr.key.as_ref() {
            b"requestID" => request_id = Some(value),
            b"statusCode" => {
                status_code = Some(
                    value
                        .trim()
                        .parse()
                        .map_err(|_| SessionError::Xml(format!("invalid statusCode `{value}`")))?,
                )
            },
            b"statusSeverity" => status_severity = value,
            b"statusMessage" => status_message = value,
            _ => {},
        }
    }

    let status_code = status_code.ok_or_else(|| SessionError::Xml("missing statusCode".to_string()))?;

    Ok(InvoiceResponse {
        request_id,
        status_code,
        status_severity,
        status_message,
        txn_id: None,
    })
}

/// Parses the responses of a qbXML response document, in document order.
pub fn decode_responses(xml: &str) -> Result<Vec<InvoiceResponse>, SessionError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut responses = Vec::new();
    let mut current: Option<InvoiceResponse> = None;
    let mut path: Vec<String> = Vec::new();

    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Start(ref e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if current.is_none() && is_response_element(&name) {
                    current = Some(response_from_attributes(e)?);
                }
                path.push(name);
            },
            Event::Empty(ref e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if current.is_none() && is_response_element(&name) {
                    responses.push(response_from_attributes(e)?);
                }
            },
            Event::Text(ref e) => {
                if let Some(response) = current.as_mut() {
                    if response.txn_id.is_none() && at_txn_id(&path) {
                        response.txn_id = Some(e.unescape().map_err(xml_err)?.into_owned());
                    }
                }
            },
            Event::End(_) => {
                let ended = path.pop().unwrap_or_default();
                if is_response_element(&ended) {
                    if let Some(response) = current.take() {
                        responses.push(response);
                    }
                }
            },
            Event::Eof => break,
            _ => {},
        }
    }

    if !path.is_empty() {
        return Err(SessionError::Xml(format!("unexpected end of document inside <{}>", path.join("/"))));
    }

    Ok(responses)
}
