//! # Preenchedor Core
//!
//! Business logic for the enrollment-form assistant:
//! - CID normalisation onto the fixed checkbox vocabulary of the CIPTEA form ([`cid`])
//! - the person record and its strict JSON wire model ([`record`])
//! - AI extraction and postal-code enrichment ([`extraction`])
//! - the browser capability and its WebDriver client ([`browser`])
//! - declarative form filling ([`forms`]) and the end-to-end pipeline ([`pipeline`])
//!
//! File handling (document roles, organising, PDFs, collages) lives in `preenchedor_files`.
//!
//! **No UI concerns**: the operator surfaces are the `preenchedor` CLI and the
//! `preenchedor-run` job runner.

pub mod browser;
pub mod cid;
pub mod config;
pub mod constants;
pub mod extraction;
pub mod forms;
pub mod pipeline;
pub mod record;

mod error;

pub use config::CoreConfig;
pub use error::{CoreError, CoreResult};
pub use pipeline::{fill_forms, process_documents, FillReport, ProcessedDocuments};
pub use record::PersonRecord;
