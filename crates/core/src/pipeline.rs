//! End-to-end workflow: documents in, filled browser tabs out.
//!
//! ```text
//! DocumentSet ─▶ organize ─▶ collage ─▶ vision call ─▶ structured parse ─▶ PersonRecord
//!                                                                             │
//!                         browser tabs ◀─ fill selected forms ◀───────────────┘
//! ```
//!
//! The record is returned between the two halves so the operator can review and edit
//! it before anything is typed into a remote form.

use crate::browser::Browser;
use crate::constants::{COLLAGE_COLUMNS, COLLAGE_TILE_SIZE};
use crate::extraction::{GenerativeModel, PostalLookup, StructuredExtractor};
use crate::forms::{attach_intermunicipal_files, fill_ciptea, fill_intermunicipal, FormKind, FormSelection};
use crate::record::PersonRecord;
use crate::{CoreError, CoreResult};
use preenchedor_files::{create_collage, CollageLayout, DocumentRole, DocumentSet, FilesService, OrganizedFiles};
use preenchedor_types::NonEmptyText;

/// Output of [`process_documents`].
#[derive(Debug)]
pub struct ProcessedDocuments {
    pub organized: OrganizedFiles,
    /// `None` when extraction was skipped or the model answer could not be parsed.
    pub record: Option<PersonRecord>,
    /// Required roles that were absent; extraction is skipped when this is non-empty.
    pub missing: Vec<DocumentRole>,
}

/// Organises the documents and extracts a record from them.
///
/// A person with only a CPF or only an RG scan gets the same file for both. When a
/// required document is still missing, or its path is not a file on disk, nothing is
/// organised and `record` is `None`.
///
/// # Errors
///
/// File, network and API failures are returned. A model answer that cannot be parsed
/// is not an error: `record` is `None`.
pub fn process_documents<M, P>(
    files_service: &FilesService,
    documents: &DocumentSet,
    beneficiary: &NonEmptyText,
    model: &M,
    postal: &P,
) -> CoreResult<ProcessedDocuments>
where
    M: GenerativeModel + ?Sized,
    P: PostalLookup + ?Sized,
{
    let mut documents = documents.clone();
    documents.fill_missing_id_pairs();

    let missing = documents.unavailable_required();
    if !missing.is_empty() {
        let names: Vec<&str> = missing.iter().map(|role| role.key()).collect();
        tracing::warn!("missing required documents: {}", names.join(", "));
        return Ok(ProcessedDocuments {
            organized: OrganizedFiles::new(files_service.beneficiary_folder(beneficiary)?),
            record: None,
            missing,
        });
    }

    tracing::info!("organising documents for {}", beneficiary);
    let organized = files_service.organize(&documents, beneficiary)?;

    let images = organized.data_images();
    if images.is_empty() {
        tracing::warn!("no readable documents to extract from");
        return Ok(ProcessedDocuments {
            organized,
            record: None,
            missing,
        });
    }

    let collage_path = organized.collage_path();
    let layout = CollageLayout::for_count(images.len(), COLLAGE_COLUMNS, COLLAGE_TILE_SIZE);
    create_collage(&images, &collage_path, layout)?;

    let extractor = StructuredExtractor::new(model, postal);
    let text = match extractor.extract_text(&collage_path) {
        Ok(text) => text,
        Err(CoreError::EmptyModelAnswer(reason)) => {
            tracing::warn!("vision call returned no text: {}", reason);
            return Ok(ProcessedDocuments {
                organized,
                record: None,
                missing,
            });
        }
        Err(e) => return Err(e),
    };
    let record = extractor.extract_record(&text)?;

    Ok(ProcessedDocuments {
        organized,
        record,
        missing,
    })
}

/// What happened to each selected form.
#[derive(Debug, Default)]
pub struct FillReport {
    pub completed: Vec<FormKind>,
    /// Fills that stopped early; their tabs are left open for manual completion.
    pub halted: Vec<CoreError>,
}

impl FillReport {
    pub fn is_complete(&self) -> bool {
        self.halted.is_empty()
    }
}

/// Fills the selected forms one after another in the same browser session.
///
/// A halted form does not stop the others.
///
/// # Errors
///
/// Returns `CoreError::InvalidInput` when no form is selected.
pub fn fill_forms<B: Browser + ?Sized>(
    browser: &mut B,
    record: &PersonRecord,
    files: &OrganizedFiles,
    selection: &FormSelection,
) -> CoreResult<FillReport> {
    if selection.is_empty() {
        return Err(CoreError::InvalidInput("select at least one form to fill".into()));
    }

    let mut report = FillReport::default();
    for form in selection.forms() {
        let result = match form {
            FormKind::Intermunicipal => fill_intermunicipal(browser, record).and_then(|()| {
                attach_intermunicipal_files(browser, files, selection.use_transit_card)
            }),
            FormKind::CipteaFirstIssue => fill_ciptea(browser, record, files, true),
            FormKind::CipteaReissue => fill_ciptea(browser, record, files, false),
        };

        match result {
            Ok(()) => report.completed.push(form),
            Err(e) => report.halted.push(e),
        }
    }

    tracing::info!(
        "{} form(s) filled, {} halted",
        report.completed.len(),
        report.halted.len()
    );
    Ok(report)
}
