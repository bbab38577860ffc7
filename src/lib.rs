//! Bill ingestion pipeline for a personal-finance client.
//!
//! Files selected by the user are registered with a remote language-model
//! provider and analyzed into structured bill records (vendor, amount, date,
//! category, line items). Each file is tracked through a
//! `processing -> completed | error` lifecycle with a manual retry path;
//! one file's failure never affects another's.

pub mod bill;
pub mod claude;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod store;

pub use bill::{BillCategory, BillEntry, BillFile, BillStatus, ExtractedBill};
pub use claude::{ClaudeClient, ExtractionBackend};
pub use config::AnalyzerConfig;
pub use error::AnalyzeError;
pub use pipeline::BillPipeline;
pub use store::BillStore;
