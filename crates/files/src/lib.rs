//! Preenchedor File Handling
//!
//! This crate owns everything the workflow does with document files on disk:
//!
//! - the fixed vocabulary of document roles ([`DocumentRole`]) and the operator-assembled
//!   [`DocumentSet`]
//! - copying documents into a per-beneficiary folder and deriving PDF companions
//!   ([`FilesService::organize`]), which produces an [`OrganizedFiles`] set
//! - building the collage image sent to the AI vision call ([`create_collage`])
//!
//! ## Folder Layout
//!
//! ```text
//! <data_dir>/
//! └── <sanitised_beneficiary_name>/
//!     ├── files.json               # manifest of the organised set
//!     ├── cpf_do_menor.jpg
//!     ├── cpf_do_menor.pdf
//!     ├── foto_3x4.jpg
//!     ├── …
//!     └── collage.jpg
//! ```
//!
//! ## Example Usage
//!
//! ```no_run
//! use preenchedor_files::{DocumentRole, DocumentSet, FilesService};
//! use preenchedor_types::NonEmptyText;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let service = FilesService::new(Path::new("/home/operator/.auto_preenchedor_data"))?;
//!
//! let mut documents = DocumentSet::new();
//! documents.insert(DocumentRole::BeneficiaryCpf, "scans/cpf.jpg");
//!
//! let organized = service.organize(&documents, &NonEmptyText::new("José De Açunsão")?)?;
//! println!("{:?}", organized.pdf(DocumentRole::BeneficiaryCpf));
//! # Ok(())
//! # }
//! ```

mod collage;
mod constants;
mod files;
mod pdf;
mod roles;

pub use collage::{create_collage, CollageLayout};
pub use constants::{COLLAGE_FILENAME, MANIFEST_FILENAME, PDF_KEY_SUFFIX};
pub use files::{sanitize_folder_name, FilesService, OrganizedFiles};
pub use pdf::convert_image_to_pdf;
pub use roles::{DocumentRole, DocumentSet};

/// Errors that can occur during file operations
#[derive(Debug, thiserror::Error)]
pub enum FilesError {
    /// Data directory could not be created or is not a directory
    #[error("Invalid data directory: {0}")]
    InvalidRootDirectory(String),

    /// Beneficiary name does not produce a usable folder name
    #[error("Invalid folder name: {0}")]
    InvalidFolderName(String),

    /// A role key outside the fixed document vocabulary
    #[error("Unknown document role: {0}")]
    UnknownRole(String),

    /// No manifest exists for the requested beneficiary folder
    #[error("Manifest not found: {0}")]
    ManifestNotFound(String),

    /// The manifest exists but could not be read or written
    #[error("Manifest error: {0}")]
    Manifest(#[from] serde_json::Error),

    /// Image decoding or encoding failed
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// PDF assembly failed
    #[error("PDF error: {0}")]
    Pdf(String),

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
