//! Module for core business logic services.
//!
//! This module encapsulates the operations the console performs against
//! the remote APIs: listing and maintaining remittance documents,
//! managing the contacts agenda, uploading receipts for processing, and
//! exporting either dataset to a spreadsheet.

pub mod agenda;
pub mod common;
pub mod documentos;
pub mod export;
pub mod upload;

pub use agenda::AgendaService;
pub use documentos::DocumentosService;
pub use upload::UploadService;
