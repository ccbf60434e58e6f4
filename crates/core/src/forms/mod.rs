//! Filling the third-party enrollment forms.
//!
//! Each form is described as data: a list of [`FieldSpec`]s (where the value comes from,
//! its fallback and how it is reshaped) and a list of [`UploadSpec`]s. When a remote page
//! changes its DOM, only these lists need to follow.
//!
//! A fill moves through [`FillStage`]s. There is no rollback: the first failure stops the
//! fill with [`CoreError::FormHalted`] and the tab is left as it is for the operator to
//! finish by hand.

mod ciptea;
mod intermunicipal;

pub use ciptea::fill_ciptea;
pub use intermunicipal::{attach_intermunicipal_files, fill_intermunicipal};

use crate::browser::{Browser, Locator, WaitCondition};
use crate::constants::{CIPTEA_FIRST_ISSUE_URL, CIPTEA_REISSUE_URL, INTERMUNICIPAL_URL};
use crate::record::{PersonRecord, RecordField};
use crate::{CoreError, CoreResult};
use preenchedor_files::{DocumentRole, OrganizedFiles};
use preenchedor_types::SlashDate;
use std::fmt;
use std::path::Path;

/// The target forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormKind {
    CipteaFirstIssue,
    CipteaReissue,
    Intermunicipal,
}

impl FormKind {
    pub fn url(self) -> &'static str {
        match self {
            FormKind::CipteaFirstIssue => CIPTEA_FIRST_ISSUE_URL,
            FormKind::CipteaReissue => CIPTEA_REISSUE_URL,
            FormKind::Intermunicipal => INTERMUNICIPAL_URL,
        }
    }
}

impl fmt::Display for FormKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FormKind::CipteaFirstIssue => "CIPTEA (first issuance)",
            FormKind::CipteaReissue => "CIPTEA (reissue)",
            FormKind::Intermunicipal => "intermunicipal pass",
        })
    }
}

/// Progress of a single form fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FillStage {
    NotStarted,
    TabOpened,
    FieldsFilled,
    CidsSelected,
    FilesAttached,
    Done,
}

impl fmt::Display for FillStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FillStage::NotStarted => "not started",
            FillStage::TabOpened => "tab opened",
            FillStage::FieldsFilled => "fields filled",
            FillStage::CidsSelected => "CIDs selected",
            FillStage::FilesAttached => "files attached",
            FillStage::Done => "done",
        })
    }
}

/// Which forms a run fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormSelection {
    pub ciptea_first_issue: bool,
    pub ciptea_reissue: bool,
    pub intermunicipal: bool,
    /// Attach the transit card instead of the medical report on the intermunicipal form.
    pub use_transit_card: bool,
}

impl Default for FormSelection {
    fn default() -> Self {
        Self {
            ciptea_first_issue: true,
            ciptea_reissue: false,
            intermunicipal: true,
            use_transit_card: false,
        }
    }
}

impl FormSelection {
    pub fn is_empty(&self) -> bool {
        !(self.ciptea_first_issue || self.ciptea_reissue || self.intermunicipal)
    }

    /// Selected forms in fill order. The intermunicipal form goes first so the CIPTEA
    /// tabs end up in front.
    pub fn forms(&self) -> Vec<FormKind> {
        [
            (self.intermunicipal, FormKind::Intermunicipal),
            (self.ciptea_first_issue, FormKind::CipteaFirstIssue),
            (self.ciptea_reissue, FormKind::CipteaReissue),
        ]
        .into_iter()
        .filter_map(|(selected, form)| selected.then_some(form))
        .collect()
    }
}

/// Where a field's value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSource {
    Record(RecordField),
    Literal(&'static str),
}

/// How a value is reshaped before it is typed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    None,
    /// `"Rua X, 12"` becomes `"Rua X N 12"`; the forms have no number field.
    AddressNumber,
    BirthDay,
    BirthMonth,
    BirthYear,
}

impl Transform {
    fn apply(self, value: &str) -> CoreResult<String> {
        match self {
            Transform::None => Ok(value.to_owned()),
            Transform::AddressNumber => Ok(value.replace(", ", " N ")),
            Transform::BirthDay => Ok(strip_one_zero(parse_date(value)?.day())),
            Transform::BirthMonth => Ok(strip_one_zero(parse_date(value)?.month())),
            Transform::BirthYear => Ok(parse_date(value)?.year().to_owned()),
        }
    }
}

fn parse_date(value: &str) -> CoreResult<SlashDate> {
    SlashDate::parse(value).map_err(|_| CoreError::InvalidDate(value.to_owned()))
}

fn strip_one_zero(part: &str) -> String {
    part.strip_prefix('0').unwrap_or(part).to_owned()
}

/// How the filler reaches an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// Immediate lookup.
    Find,
    /// Explicit wait until present; used for the first field of a freshly opened page.
    WaitPresent,
}

/// One text or dropdown field of a form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub locator: Locator,
    pub source: FieldSource,
    pub fallback: Option<&'static str>,
    pub transform: Transform,
    pub clear_first: bool,
    pub lookup: Lookup,
}

impl FieldSpec {
    pub const fn record(locator: Locator, field: RecordField) -> Self {
        Self {
            locator,
            source: FieldSource::Record(field),
            fallback: None,
            transform: Transform::None,
            clear_first: false,
            lookup: Lookup::Find,
        }
    }

    pub const fn literal(locator: Locator, value: &'static str) -> Self {
        Self {
            source: FieldSource::Literal(value),
            ..Self::record(locator, RecordField::BeneficiaryName)
        }
    }

    pub const fn or(mut self, fallback: &'static str) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub const fn transformed(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub const fn cleared(mut self) -> Self {
        self.clear_first = true;
        self
    }

    pub const fn anchor(mut self) -> Self {
        self.lookup = Lookup::WaitPresent;
        self
    }

    /// Text to type for this field: the record value, else the fallback, else empty.
    pub fn value(&self, record: &PersonRecord) -> CoreResult<String> {
        let raw = match self.source {
            FieldSource::Record(field) => record.get(field).or(self.fallback),
            FieldSource::Literal(value) => Some(value),
        };
        self.transform.apply(raw.unwrap_or_default())
    }
}

/// Which file of a role an upload field takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadFile {
    Pdf,
    Original,
}

/// One file-upload field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadSpec {
    pub locator: Locator,
    pub role: DocumentRole,
    pub file: UploadFile,
}

impl UploadSpec {
    pub const fn pdf(locator: Locator, role: DocumentRole) -> Self {
        Self {
            locator,
            role,
            file: UploadFile::Pdf,
        }
    }

    pub const fn original(locator: Locator, role: DocumentRole) -> Self {
        Self {
            locator,
            role,
            file: UploadFile::Original,
        }
    }

    pub fn path<'f>(&self, files: &'f OrganizedFiles) -> Option<&'f Path> {
        match self.file {
            UploadFile::Pdf => files.pdf(self.role),
            UploadFile::Original => files.original(self.role),
        }
    }
}

/// Types every field of `specs` in order.
pub(crate) fn fill_fields<B: Browser + ?Sized>(
    browser: &mut B,
    record: &PersonRecord,
    specs: &[FieldSpec],
) -> CoreResult<()> {
    for spec in specs {
        let value = spec.value(record)?;
        let element = match spec.lookup {
            Lookup::Find => browser.find(spec.locator)?,
            Lookup::WaitPresent => browser.wait_for(spec.locator, WaitCondition::Present)?,
        };
        if spec.clear_first {
            browser.clear(&element)?;
        }
        tracing::debug!("typing into {}", spec.locator);
        browser.send_keys(&element, &value)?;
    }
    Ok(())
}

pub(crate) fn halted(form: FormKind, stage: FillStage, source: CoreError) -> CoreError {
    tracing::warn!("{} halted at {}: {}", form, stage, source);
    CoreError::FormHalted {
        form,
        stage,
        source: Box::new(source),
    }
}

fn path_text(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_selection_fills_intermunicipal_then_first_issue() {
        let selection = FormSelection::default();
        assert_eq!(
            selection.forms(),
            vec![FormKind::Intermunicipal, FormKind::CipteaFirstIssue]
        );
        assert!(!selection.use_transit_card);
    }

    #[test]
    fn empty_selection_is_detected() {
        let selection = FormSelection {
            ciptea_first_issue: false,
            ciptea_reissue: false,
            intermunicipal: false,
            use_transit_card: true,
        };
        assert!(selection.is_empty());
        assert!(selection.forms().is_empty());
    }

    #[test]
    fn field_value_prefers_record_then_fallback() {
        let spec = FieldSpec::record(Locator::Name("EmailBeneficiario"), RecordField::Email)
            .or("test_email.com");

        let mut record = PersonRecord::default();
        assert_eq!(spec.value(&record).unwrap(), "test_email.com");

        record.email = Some("ana@example.com".into());
        assert_eq!(spec.value(&record).unwrap(), "ana@example.com");
    }

    #[test]
    fn field_value_is_empty_without_fallback() {
        let spec = FieldSpec::record(Locator::Name("NomeResponsavel"), RecordField::GuardianName);
        assert_eq!(spec.value(&PersonRecord::default()).unwrap(), "");
    }

    #[test]
    fn address_transform_inserts_number_marker() {
        assert_eq!(
            Transform::AddressNumber.apply("Rua das Flores, 123").unwrap(),
            "Rua das Flores N 123"
        );
        assert_eq!(Transform::AddressNumber.apply("").unwrap(), "");
    }

    #[test]
    fn birth_date_parts_drop_one_leading_zero() {
        assert_eq!(Transform::BirthDay.apply("05/03/2015").unwrap(), "5");
        assert_eq!(Transform::BirthMonth.apply("05/03/2015").unwrap(), "3");
        assert_eq!(Transform::BirthYear.apply("05/03/2015").unwrap(), "2015");
        assert_eq!(Transform::BirthDay.apply("15/10/2015").unwrap(), "15");
        assert_eq!(Transform::BirthMonth.apply("15/10/2015").unwrap(), "10");
    }

    #[test]
    fn malformed_birth_date_is_an_error() {
        assert!(matches!(
            Transform::BirthDay.apply("2015-03-05"),
            Err(CoreError::InvalidDate(_))
        ));
    }
}
