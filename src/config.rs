use std::path::PathBuf;

pub const INVOICE_HEADER_FILE: &str = "InvoiceHeader.csv";
pub const INVOICE_LINES_FILE: &str = "InvoiceLines.csv";
pub const ERROR_LOG_FILE: &str = "InvoiceImportErrors.log";

pub const APP_NAME: &str = "InvoiceImporter";
pub const RELAY_URL: &str = "http://127.0.0.1:8421/qbxml";

/// How the accounting application should open the company file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    DontCare,
}

impl OpenMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpenMode::DontCare => "DontCare",
        }
    }
}

/// Fixed settings for one import run. There are no flags or config files;
/// the binary always runs with `ImportConfig::default()`.
#[derive(Debug, Clone)]
pub struct ImportConfig {
    pub header_path: PathBuf,
    pub lines_path: PathBuf,
    pub error_log_path: PathBuf,

    pub app_id: String,
    pub app_name: String,
    /// Empty means whichever company file is currently open.
    pub company_file: String,
    pub open_mode: OpenMode,
    pub qbxml_version: (u8, u8),

    pub relay_url: String,
}

impl Default for ImportConfig {
    fn default() -> Self {
        ImportConfig {
            header_path: PathBuf::from(INVOICE_HEADER_FILE),
            lines_path: PathBuf::from(INVOICE_LINES_FILE),
            error_log_path: PathBuf::from(ERROR_LOG_FILE),
            app_id: String::new(),
            app_name: APP_NAME.to_string(),
            company_file: String::new(),
            open_mode: OpenMode::DontCare,
            qbxml_version: (16, 0),
            relay_url: RELAY_URL.to_string(),
        }
    }
}
