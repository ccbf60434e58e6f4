//! Per-beneficiary document organisation
//!
//! This module provides [`FilesService`], which copies the operator's documents into a
//! dedicated folder under the data directory, derives PDF companions for the roles
//! whose upload fields expect PDFs, and records the result in a manifest.
//!
//! # Folder Naming
//!
//! The folder name is derived from the beneficiary's name by [`sanitize_folder_name`]:
//! accents are folded to ASCII, the result is lowercased, and spaces and path
//! separators become underscores, so `José De Açunsão` lands in `jose_de_acunsao/`.
//!
//! # Lifecycle
//!
//! Organising is destructive for the target folder: any files left there by a
//! previous run for the same beneficiary are removed first, so the folder always
//! mirrors the latest document set. Sources that already live in that folder are read
//! into memory before the clear, so re-organising from a previous run's copies works.
//! Source files elsewhere are never modified.

use crate::constants::{COLLAGE_FILENAME, MANIFEST_FILENAME, PDF_KEY_SUFFIX};
use crate::pdf::convert_image_to_pdf;
use crate::{DocumentRole, DocumentSet, FilesError};
use chrono::{DateTime, Utc};
use preenchedor_types::NonEmptyText;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Turns a person's name into a safe, ASCII folder name.
///
/// # Errors
///
/// Returns `FilesError::InvalidFolderName` if nothing usable is left after folding.
pub fn sanitize_folder_name(name: &str) -> Result<String, FilesError> {
    let folded: String = name
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .filter(|c| c.is_ascii())
        .collect();

    let cleaned: String = folded
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            ' ' | '/' | '\\' | ':' | '*' => '_',
            other => other,
        })
        .collect();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.' || c == '_') {
        return Err(FilesError::InvalidFolderName(name.to_owned()));
    }

    Ok(cleaned)
}

/// Result of organising a [`DocumentSet`]: role → copied original, and
/// role → PDF companion for the roles that have one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrganizedFiles {
    folder: PathBuf,
    originals: BTreeMap<DocumentRole, PathBuf>,
    pdfs: BTreeMap<DocumentRole, PathBuf>,
    organized_at: Option<DateTime<Utc>>,
}

/// On-disk manifest, keyed by role key and `<role>_pdf`.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestWire {
    organized_at: DateTime<Utc>,
    files: BTreeMap<String, PathBuf>,
}

impl OrganizedFiles {
    /// An empty set rooted at `folder`.
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
            ..Self::default()
        }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn organized_at(&self) -> Option<DateTime<Utc>> {
        self.organized_at
    }

    pub fn insert_original(&mut self, role: DocumentRole, path: impl Into<PathBuf>) {
        self.originals.insert(role, path.into());
    }

    pub fn insert_pdf(&mut self, role: DocumentRole, path: impl Into<PathBuf>) {
        self.pdfs.insert(role, path.into());
    }

    /// Copied original for a role.
    pub fn original(&self, role: DocumentRole) -> Option<&Path> {
        self.originals.get(&role).map(PathBuf::as_path)
    }

    /// PDF companion for a role.
    pub fn pdf(&self, role: DocumentRole) -> Option<&Path> {
        self.pdfs.get(&role).map(PathBuf::as_path)
    }

    pub fn is_empty(&self) -> bool {
        self.originals.is_empty() && self.pdfs.is_empty()
    }

    /// Where the extraction collage for this folder is written.
    pub fn collage_path(&self) -> PathBuf {
        self.folder.join(COLLAGE_FILENAME)
    }

    /// Copied originals that carry personal data, in role order.
    pub fn data_images(&self) -> Vec<&Path> {
        self.originals
            .iter()
            .filter(|(role, _)| role.carries_data())
            .map(|(_, path)| path.as_path())
            .collect()
    }

    /// Flat `key → path` view, where PDF companions use the `<role>_pdf` key.
    pub fn entries(&self) -> BTreeMap<String, PathBuf> {
        let originals = self
            .originals
            .iter()
            .map(|(role, path)| (role.key().to_owned(), path.clone()));
        let pdfs = self
            .pdfs
            .iter()
            .map(|(role, path)| (format!("{}{}", role.key(), PDF_KEY_SUFFIX), path.clone()));
        originals.chain(pdfs).collect()
    }

    /// Reads the manifest written by [`FilesService::organize`] from `folder`.
    ///
    /// # Errors
    ///
    /// Returns `FilesError::ManifestNotFound` when the folder has no manifest, or a
    /// parse error naming the unknown key when the manifest holds one.
    pub fn load(folder: &Path) -> Result<Self, FilesError> {
        let manifest_path = folder.join(MANIFEST_FILENAME);
        if !manifest_path.is_file() {
            return Err(FilesError::ManifestNotFound(
                manifest_path.display().to_string(),
            ));
        }

        let text = fs::read_to_string(&manifest_path)?;
        let wire: ManifestWire = serde_json::from_str(&text)?;

        let mut organized = OrganizedFiles::new(folder);
        organized.organized_at = Some(wire.organized_at);
        for (key, path) in wire.files {
            match key.strip_suffix(PDF_KEY_SUFFIX) {
                Some(role_key) => organized.insert_pdf(role_key.parse()?, path),
                None => organized.insert_original(key.parse()?, path),
            }
        }
        Ok(organized)
    }

    fn save(&self) -> Result<(), FilesError> {
        let wire = ManifestWire {
            organized_at: self.organized_at.unwrap_or_else(Utc::now),
            files: self.entries(),
        };
        let text = serde_json::to_string_pretty(&wire)?;
        fs::write(self.folder.join(MANIFEST_FILENAME), text)?;
        Ok(())
    }
}

/// Service that organises document files under a data directory.
///
/// The service is cheap to construct; the data directory is created on demand.
#[derive(Debug, Clone)]
pub struct FilesService {
    data_dir: PathBuf,
}

impl FilesService {
    /// Creates a service rooted at `data_dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns `FilesError::InvalidRootDirectory` if the path exists but is not a
    /// directory, or cannot be created.
    pub fn new(data_dir: &Path) -> Result<Self, FilesError> {
        if data_dir.exists() && !data_dir.is_dir() {
            return Err(FilesError::InvalidRootDirectory(format!(
                "Path is not a directory: {}",
                data_dir.display()
            )));
        }

        fs::create_dir_all(data_dir).map_err(|e| {
            FilesError::InvalidRootDirectory(format!(
                "Cannot create {}: {}",
                data_dir.display(),
                e
            ))
        })?;

        Ok(Self {
            data_dir: data_dir.to_path_buf(),
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Folder that holds the organised documents for `beneficiary`.
    pub fn beneficiary_folder(&self, beneficiary: &NonEmptyText) -> Result<PathBuf, FilesError> {
        Ok(self
            .data_dir
            .join(sanitize_folder_name(beneficiary.as_str())?))
    }

    /// Copies every present document into the beneficiary folder and derives PDFs.
    ///
    /// Documents whose source path is not a regular file are skipped with a warning.
    /// A source that is already a PDF serves as its own companion.
    ///
    /// # Errors
    ///
    /// Returns `FilesError` if the folder cannot be prepared, a copy fails, or a PDF
    /// derivative cannot be produced.
    pub fn organize(
        &self,
        documents: &DocumentSet,
        beneficiary: &NonEmptyText,
    ) -> Result<OrganizedFiles, FilesError> {
        let folder = self.beneficiary_folder(beneficiary)?;
        fs::create_dir_all(&folder)?;
        let canonical_folder = folder.canonicalize()?;

        let mut staged = Vec::with_capacity(documents.len());
        for (role, source) in documents.iter() {
            if !source.is_file() {
                tracing::warn!("{} does not exist, skipping {}", source.display(), role);
                continue;
            }

            // Anything inside the folder is removed by the clear below.
            let contents = if source.canonicalize()?.starts_with(&canonical_folder) {
                Some(fs::read(source)?)
            } else {
                None
            };
            staged.push((role, source, contents));
        }

        clear_files(&folder)?;

        let mut organized = OrganizedFiles::new(&folder);
        organized.organized_at = Some(Utc::now());

        for (role, source, contents) in staged {
            let extension = source
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| format!(".{e}"))
                .unwrap_or_default();
            let destination = folder.join(format!("{}{}", role.key(), extension));

            let copied = match contents {
                Some(bytes) => fs::write(&destination, bytes),
                None => fs::copy(source, &destination).map(|_| ()),
            };
            copied.map_err(|e| {
                FilesError::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to copy {} to {}: {}",
                        source.display(),
                        destination.display(),
                        e
                    ),
                ))
            })?;
            organized.insert_original(role, &destination);

            if !role.needs_pdf() {
                continue;
            }

            if is_pdf(&destination)? {
                organized.insert_pdf(role, &destination);
            } else {
                let pdf_path = destination.with_extension("pdf");
                convert_image_to_pdf(&destination, &pdf_path)?;
                organized.insert_pdf(role, pdf_path);
            }
        }

        organized.save()?;
        tracing::info!(
            "organised {} documents into {}",
            documents.len(),
            folder.display()
        );
        Ok(organized)
    }

    /// Loads the organised set previously written for `beneficiary`.
    pub fn load(&self, beneficiary: &NonEmptyText) -> Result<OrganizedFiles, FilesError> {
        OrganizedFiles::load(&self.beneficiary_folder(beneficiary)?)
    }
}

fn is_pdf(path: &Path) -> Result<bool, FilesError> {
    Ok(infer::get_from_path(path)?.is_some_and(|kind| kind.mime_type() == "application/pdf"))
}

fn clear_files(folder: &Path) -> Result<(), FilesError> {
    for entry in fs::read_dir(folder)? {
        let path = entry?.path();
        if path.is_file() {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    fn write_scan(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        RgbImage::from_pixel(16, 16, Rgb([200, 200, 200]))
            .save(&path)
            .unwrap();
        path
    }

    fn beneficiary(name: &str) -> NonEmptyText {
        NonEmptyText::new(name).unwrap()
    }

    #[test]
    fn sanitize_folds_accents_and_separators() {
        assert_eq!(
            sanitize_folder_name("José De Açunsão").unwrap(),
            "jose_de_acunsao"
        );
        assert_eq!(
            sanitize_folder_name("  Ana/Maria:Silva*  ").unwrap(),
            "ana_maria_silva_"
        );
    }

    #[test]
    fn sanitize_rejects_names_with_nothing_left() {
        assert!(matches!(
            sanitize_folder_name("..."),
            Err(FilesError::InvalidFolderName(_))
        ));
        assert!(matches!(
            sanitize_folder_name("漢字"),
            Err(FilesError::InvalidFolderName(_))
        ));
    }

    #[test]
    fn new_rejects_file_as_data_dir() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("file.txt");
        fs::write(&file, "not a directory").unwrap();

        assert!(matches!(
            FilesService::new(&file),
            Err(FilesError::InvalidRootDirectory(_))
        ));
    }

    #[test]
    fn organize_copies_documents_and_derives_pdfs() {
        let scans = TempDir::new().unwrap();
        let data = TempDir::new().unwrap();

        let mut documents = DocumentSet::new();
        documents.insert(
            DocumentRole::BeneficiaryCpf,
            write_scan(scans.path(), "cpf.png"),
        );
        documents.insert(DocumentRole::Photo, write_scan(scans.path(), "3x4.png"));

        let service = FilesService::new(data.path()).unwrap();
        let organized = service
            .organize(&documents, &beneficiary("Maria Sophia"))
            .unwrap();

        let folder = data.path().join("maria_sophia");
        assert_eq!(organized.folder(), folder);
        assert_eq!(
            organized.original(DocumentRole::BeneficiaryCpf),
            Some(folder.join("cpf_do_menor.png").as_path())
        );
        assert_eq!(
            organized.pdf(DocumentRole::BeneficiaryCpf),
            Some(folder.join("cpf_do_menor.pdf").as_path())
        );
        assert!(folder.join("cpf_do_menor.pdf").is_file());
        assert_eq!(organized.pdf(DocumentRole::Photo), None);
        assert!(folder.join(MANIFEST_FILENAME).is_file());
    }

    #[test]
    fn organize_skips_missing_sources() {
        let data = TempDir::new().unwrap();
        let mut documents = DocumentSet::new();
        documents.insert(DocumentRole::MedicalReport, "/nonexistent/laudo.jpg");

        let service = FilesService::new(data.path()).unwrap();
        let organized = service.organize(&documents, &beneficiary("Joao")).unwrap();

        assert!(organized.is_empty());
    }

    #[test]
    fn organize_clears_previous_run() {
        let scans = TempDir::new().unwrap();
        let data = TempDir::new().unwrap();
        let service = FilesService::new(data.path()).unwrap();

        let stale = data.path().join("joao").join("vem.jpg");
        fs::create_dir_all(stale.parent().unwrap()).unwrap();
        fs::write(&stale, b"old").unwrap();

        let mut documents = DocumentSet::new();
        documents.insert(DocumentRole::Photo, write_scan(scans.path(), "3x4.png"));
        service.organize(&documents, &beneficiary("Joao")).unwrap();

        assert!(!stale.exists());
    }

    #[test]
    fn organize_again_from_organised_copies() {
        let scans = TempDir::new().unwrap();
        let data = TempDir::new().unwrap();
        let service = FilesService::new(data.path()).unwrap();
        let joao = beneficiary("Joao");

        let mut documents = DocumentSet::new();
        documents.insert(DocumentRole::GuardianCpf, write_scan(scans.path(), "cpf.png"));
        documents.insert(DocumentRole::Photo, write_scan(scans.path(), "3x4.png"));
        let first = service.organize(&documents, &joao).unwrap();

        let mut again = DocumentSet::new();
        for role in [DocumentRole::GuardianCpf, DocumentRole::Photo] {
            again.insert(role, first.original(role).unwrap());
        }
        let second = service.organize(&again, &joao).unwrap();

        let cpf = data.path().join("joao").join("cpf_do_responsavel.png");
        assert_eq!(second.original(DocumentRole::GuardianCpf), Some(cpf.as_path()));
        assert!(image::open(&cpf).is_ok());
        assert!(cpf.with_extension("pdf").is_file());
        assert!(second.original(DocumentRole::Photo).unwrap().is_file());
    }

    #[test]
    fn organize_reuses_pdf_sources() {
        let scans = TempDir::new().unwrap();
        let data = TempDir::new().unwrap();
        let source = scans.path().join("laudo.pdf");
        fs::write(&source, b"%PDF-1.4\n%\xe2\xe3\xcf\xd3\n1 0 obj\n<<>>\nendobj\n").unwrap();

        let mut documents = DocumentSet::new();
        documents.insert(DocumentRole::MedicalReport, &source);

        let service = FilesService::new(data.path()).unwrap();
        let organized = service.organize(&documents, &beneficiary("Joao")).unwrap();

        assert_eq!(
            organized.pdf(DocumentRole::MedicalReport),
            organized.original(DocumentRole::MedicalReport)
        );
    }

    #[test]
    fn manifest_round_trips_through_load() {
        let scans = TempDir::new().unwrap();
        let data = TempDir::new().unwrap();

        let mut documents = DocumentSet::new();
        documents.insert(DocumentRole::GuardianRg, write_scan(scans.path(), "rg.png"));
        documents.insert(DocumentRole::TransitCard, write_scan(scans.path(), "vem.png"));

        let service = FilesService::new(data.path()).unwrap();
        let organized = service.organize(&documents, &beneficiary("Ana")).unwrap();
        let loaded = service.load(&beneficiary("Ana")).unwrap();

        assert_eq!(loaded, organized);
        assert!(loaded.entries().contains_key("rg_do_responsavel_pdf"));
        assert!(loaded.entries().contains_key("vem"));
    }

    #[test]
    fn load_without_manifest_fails() {
        let data = TempDir::new().unwrap();
        let service = FilesService::new(data.path()).unwrap();

        assert!(matches!(
            service.load(&beneficiary("Nobody")),
            Err(FilesError::ManifestNotFound(_))
        ));
    }
}
