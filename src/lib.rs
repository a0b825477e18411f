pub mod config;
pub mod data;
pub mod importer;
pub mod quickbooks;
pub mod report;
