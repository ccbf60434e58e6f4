//! Document roles and the operator-assembled document set.
//!
//! The role keys (`cpf_do_menor`, `laudo_medico`, …) are the vocabulary shared by the
//! organised folder, its manifest and the job files, so they are kept verbatim.

use crate::FilesError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// One slot of the document collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DocumentRole {
    /// Guardian's CPF card.
    #[serde(rename = "cpf_do_responsavel")]
    GuardianCpf,
    /// Guardian's RG (identity card).
    #[serde(rename = "rg_do_responsavel")]
    GuardianRg,
    /// Beneficiary's CPF card.
    #[serde(rename = "cpf_do_menor")]
    BeneficiaryCpf,
    /// Beneficiary's RG (identity card).
    #[serde(rename = "rg_do_menor")]
    BeneficiaryRg,
    #[serde(rename = "laudo_medico")]
    MedicalReport,
    #[serde(rename = "comprovante_residencia")]
    ProofOfResidence,
    /// 3x4 portrait of the beneficiary.
    #[serde(rename = "foto_3x4")]
    Photo,
    /// Alternate transit card (VEM), optional.
    #[serde(rename = "vem")]
    TransitCard,
}

impl DocumentRole {
    pub const ALL: [DocumentRole; 8] = [
        DocumentRole::GuardianCpf,
        DocumentRole::GuardianRg,
        DocumentRole::BeneficiaryCpf,
        DocumentRole::BeneficiaryRg,
        DocumentRole::MedicalReport,
        DocumentRole::ProofOfResidence,
        DocumentRole::Photo,
        DocumentRole::TransitCard,
    ];

    /// Roles the operator must supply before extraction can run.
    pub const REQUIRED: [DocumentRole; 5] = [
        DocumentRole::BeneficiaryCpf,
        DocumentRole::GuardianCpf,
        DocumentRole::MedicalReport,
        DocumentRole::ProofOfResidence,
        DocumentRole::Photo,
    ];

    /// Wire key of the role.
    pub fn key(self) -> &'static str {
        match self {
            DocumentRole::GuardianCpf => "cpf_do_responsavel",
            DocumentRole::GuardianRg => "rg_do_responsavel",
            DocumentRole::BeneficiaryCpf => "cpf_do_menor",
            DocumentRole::BeneficiaryRg => "rg_do_menor",
            DocumentRole::MedicalReport => "laudo_medico",
            DocumentRole::ProofOfResidence => "comprovante_residencia",
            DocumentRole::Photo => "foto_3x4",
            DocumentRole::TransitCard => "vem",
        }
    }

    /// Parse a wire key.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.key() == key)
    }

    /// Whether the organizer derives a PDF companion for this role.
    pub fn needs_pdf(self) -> bool {
        !matches!(self, DocumentRole::Photo | DocumentRole::TransitCard)
    }

    /// Whether the document carries personal data worth sending to AI extraction.
    ///
    /// The portrait and the transit card hold nothing the record needs.
    pub fn carries_data(self) -> bool {
        self.needs_pdf()
    }

    pub fn is_required(self) -> bool {
        Self::REQUIRED.contains(&self)
    }
}

impl std::fmt::Display for DocumentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for DocumentRole {
    type Err = FilesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_key(s.trim()).ok_or_else(|| FilesError::UnknownRole(s.to_owned()))
    }
}

/// Role → source path mapping assembled by the operator.
///
/// Each role appears at most once. Presence is optional at this level; use
/// [`DocumentSet::missing_required`] to check the required subset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentSet(BTreeMap<DocumentRole, PathBuf>);

impl DocumentSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the source path for a role, replacing any previous one.
    pub fn insert(&mut self, role: DocumentRole, path: impl Into<PathBuf>) {
        self.0.insert(role, path.into());
    }

    pub fn get(&self, role: DocumentRole) -> Option<&Path> {
        self.0.get(&role).map(PathBuf::as_path)
    }

    pub fn contains(&self, role: DocumentRole) -> bool {
        self.0.contains_key(&role)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DocumentRole, &Path)> {
        self.0.iter().map(|(role, path)| (*role, path.as_path()))
    }

    /// Uses a person's CPF scan as their RG scan (or the other way round) when only
    /// one of the two was supplied. Many scans show both numbers on one card.
    pub fn fill_missing_id_pairs(&mut self) {
        let pairs = [
            (DocumentRole::BeneficiaryCpf, DocumentRole::BeneficiaryRg),
            (DocumentRole::GuardianCpf, DocumentRole::GuardianRg),
        ];

        for (cpf, rg) in pairs {
            match (self.0.get(&cpf).cloned(), self.0.get(&rg).cloned()) {
                (Some(path), None) => {
                    self.0.insert(rg, path);
                }
                (None, Some(path)) => {
                    self.0.insert(cpf, path);
                }
                _ => {}
            }
        }
    }

    /// Required roles absent from the set, in [`DocumentRole::REQUIRED`] order.
    pub fn missing_required(&self) -> Vec<DocumentRole> {
        DocumentRole::REQUIRED
            .into_iter()
            .filter(|role| !self.0.contains_key(role))
            .collect()
    }

    /// Required roles that are absent or whose path is not a readable file on disk.
    pub fn unavailable_required(&self) -> Vec<DocumentRole> {
        DocumentRole::REQUIRED
            .into_iter()
            .filter(|role| !self.get(*role).is_some_and(Path::is_file))
            .collect()
    }
}

impl FromIterator<(DocumentRole, PathBuf)> for DocumentSet {
    fn from_iter<T: IntoIterator<Item = (DocumentRole, PathBuf)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
