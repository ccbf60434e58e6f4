//! CIPTEA card application (first issuance and reissue share one layout).

use super::{fill_fields, halted, path_text, FieldSpec, FillStage, FormKind, Transform, UploadSpec};
use crate::browser::{Browser, Locator};
use crate::cid::{normalize, CidOption};
use crate::constants::CID_SETTLE_DELAY;
use crate::record::{PersonRecord, RecordField};
use crate::CoreResult;
use preenchedor_files::{DocumentRole, OrganizedFiles};
use std::collections::BTreeSet;

/// Used when the record has no diagnosis codes at all.
const DEFAULT_CIDS: [&str; 1] = ["10:F84.0"];

const CID_DROPDOWN: Locator = Locator::Name("cidSelect");

const BENEFICIARY_FIELDS: [FieldSpec; 9] = [
    FieldSpec::record(Locator::Name("NomeBeneficiario"), RecordField::BeneficiaryName).anchor(),
    // The site validates this field against the guardian's CPF.
    FieldSpec::record(Locator::Name("CpfBeneficiario"), RecordField::GuardianCpf),
    FieldSpec::record(Locator::Name("RgfBeneficiario"), RecordField::BeneficiaryRg),
    FieldSpec::record(Locator::Name("NascimentoBeneficiario"), RecordField::BirthDate)
        .or("01/01/2010")
        .cleared(),
    FieldSpec::record(Locator::Name("EmailBeneficiario"), RecordField::Email).or("test_email.com"),
    FieldSpec::record(Locator::Name("TelefoneBeneficiario"), RecordField::Phone).or("123456789"),
    FieldSpec::record(Locator::Name("CepBeneficiario"), RecordField::PostalCode).or("12345-678"),
    FieldSpec::record(Locator::Name("EnderecoBeneficiario"), RecordField::Address)
        .transformed(Transform::AddressNumber),
    FieldSpec::record(Locator::Name("CidadeBeneficiario"), RecordField::City).or("RECIFE"),
];

const GUARDIAN_FIELDS: [FieldSpec; 3] = [
    FieldSpec::record(Locator::Name("NomeResponsavel"), RecordField::GuardianName),
    FieldSpec::record(Locator::Name("CpfResponsavel"), RecordField::GuardianCpf),
    FieldSpec::record(Locator::Name("RgResponsavel"), RecordField::GuardianRg),
];

/// The photo goes last: the site resizes it server-side and that resets later inputs.
const UPLOADS: [UploadSpec; 7] = [
    UploadSpec::pdf(Locator::Id("idRImagemRg"), DocumentRole::GuardianRg),
    UploadSpec::pdf(Locator::Id("idRImagemCpf"), DocumentRole::GuardianCpf),
    UploadSpec::pdf(Locator::Id("idBImagemRg"), DocumentRole::BeneficiaryRg),
    UploadSpec::pdf(Locator::Id("idBImagemCpf"), DocumentRole::BeneficiaryCpf),
    UploadSpec::pdf(Locator::Id("idImagemLaudoMedico"), DocumentRole::MedicalReport),
    UploadSpec::pdf(Locator::Id("idImagemComprovanteResidencia"), DocumentRole::ProofOfResidence),
    UploadSpec::original(Locator::Id("idImagemFoto"), DocumentRole::Photo),
];

/// Fills the CIPTEA form in a new tab.
///
/// Order: beneficiary fields, guardian fields, CID checkboxes, uploads. Upload fields
/// without a file are located but left empty.
///
/// # Errors
///
/// Returns `CoreError::FormHalted` carrying the stage reached when any element is
/// missing or a value cannot be typed.
pub fn fill_ciptea<B: Browser + ?Sized>(
    browser: &mut B,
    record: &PersonRecord,
    files: &OrganizedFiles,
    first_issue: bool,
) -> CoreResult<()> {
    let form = if first_issue {
        FormKind::CipteaFirstIssue
    } else {
        FormKind::CipteaReissue
    };
    tracing::info!("filling {}", form);

    let mut stage = FillStage::NotStarted;
    run(browser, record, files, form, &mut stage).map_err(|e| halted(form, stage, e))?;

    tracing::info!("{} {}", form, FillStage::Done);
    Ok(())
}

fn run<B: Browser + ?Sized>(
    browser: &mut B,
    record: &PersonRecord,
    files: &OrganizedFiles,
    form: FormKind,
    stage: &mut FillStage,
) -> CoreResult<()> {
    browser.open_tab(form.url())?;
    *stage = FillStage::TabOpened;

    fill_fields(browser, record, &BENEFICIARY_FIELDS)?;
    fill_fields(browser, record, &GUARDIAN_FIELDS)?;
    *stage = FillStage::FieldsFilled;

    let options = selected_cids(record);
    if !options.is_empty() {
        select_cids(browser, &options)?;
        *stage = FillStage::CidsSelected;
    }

    attach(browser, files)
}

/// Checkbox options for the record's codes, falling back to `F84.0` when it has none.
pub fn selected_cids(record: &PersonRecord) -> BTreeSet<CidOption> {
    match &record.cids {
        Some(codes) => normalize(codes.as_slice()),
        None => normalize(DEFAULT_CIDS.as_slice()),
    }
}

fn select_cids<B: Browser + ?Sized>(
    browser: &mut B,
    options: &BTreeSet<CidOption>,
) -> CoreResult<()> {
    for option in options {
        let dropdown = browser.find(CID_DROPDOWN)?;
        browser.send_keys(&dropdown, option.revision().dropdown_label())?;
        browser.pause(CID_SETTLE_DELAY);

        let checkbox = browser.find(Locator::Id(option.id()))?;
        browser.click(&checkbox)?;
        tracing::debug!("checked {}", option);
    }
    Ok(())
}

fn attach<B: Browser + ?Sized>(browser: &mut B, files: &OrganizedFiles) -> CoreResult<()> {
    for upload in &UPLOADS {
        let element = browser.find(upload.locator)?;
        match upload.path(files) {
            Some(path) => browser.send_keys(&element, &path_text(path))?,
            None => tracing::debug!("no {} to upload into {}", upload.role, upload.locator),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::recording::{Action, RecordingBrowser};
    use crate::constants::{CIPTEA_FIRST_ISSUE_URL, CIPTEA_REISSUE_URL};
    use crate::CoreError;

    fn record() -> PersonRecord {
        PersonRecord {
            guardian_name: Some("Maria Silva".into()),
            beneficiary_name: Some("Joao Silva".into()),
            guardian_cpf: Some("123.456.789-00".into()),
            guardian_rg: Some("12.345.678-9".into()),
            beneficiary_rg: Some("98.765.432-1".into()),
            birth_date: Some("05/03/2015".into()),
            address: Some("Rua das Flores, 123".into()),
            cids: Some(vec!["11 6A02.Y".into(), "10 F84.1".into()]),
            ..PersonRecord::default()
        }
    }

    fn files() -> OrganizedFiles {
        let mut files = OrganizedFiles::new("/data/joao_silva");
        for role in DocumentRole::ALL {
            files.insert_original(role, format!("/data/joao_silva/{}.jpg", role.key()));
            if role.needs_pdf() {
                files.insert_pdf(role, format!("/data/joao_silva/{}.pdf", role.key()));
            }
        }
        files
    }

    #[test]
    fn fills_fields_with_values_and_fallbacks() {
        let mut browser = RecordingBrowser::new();
        fill_ciptea(&mut browser, &record(), &files(), true).unwrap();

        assert_eq!(browser.opened_urls(), vec![CIPTEA_FIRST_ISSUE_URL]);
        assert_eq!(
            browser.actions[1],
            Action::Wait(Locator::Name("NomeBeneficiario"), crate::browser::WaitCondition::Present)
        );
        assert_eq!(
            browser.sent_to(Locator::Name("CpfBeneficiario")),
            Some("123.456.789-00")
        );
        assert_eq!(
            browser.sent_to(Locator::Name("EnderecoBeneficiario")),
            Some("Rua das Flores N 123")
        );
        assert_eq!(
            browser.sent_to(Locator::Name("EmailBeneficiario")),
            Some("test_email.com")
        );
        assert_eq!(
            browser.sent_to(Locator::Name("CidadeBeneficiario")),
            Some("RECIFE")
        );
        assert!(browser
            .actions
            .contains(&Action::Clear(Locator::Name("NascimentoBeneficiario"))));
    }

    #[test]
    fn reissue_uses_second_url() {
        let mut browser = RecordingBrowser::new();
        fill_ciptea(&mut browser, &record(), &files(), false).unwrap();
        assert_eq!(browser.opened_urls(), vec![CIPTEA_REISSUE_URL]);
    }

    #[test]
    fn selects_cids_in_sorted_order_with_revision_switch() {
        let mut browser = RecordingBrowser::new();
        fill_ciptea(&mut browser, &record(), &files(), true).unwrap();

        assert_eq!(
            browser.clicked(),
            vec![Locator::Id("cid10_F84_1"), Locator::Id("cid11_6A02_Y")]
        );
        let dropdown: Vec<&str> = browser
            .sent()
            .into_iter()
            .filter(|(locator, _)| *locator == CID_DROPDOWN)
            .map(|(_, text)| text)
            .collect();
        assert_eq!(dropdown, vec!["CIDs 10 (10ª Revisão)", "CIDs 11 (11ª Revisão)"]);
        assert!(browser.actions.contains(&Action::Pause(CID_SETTLE_DELAY)));
    }

    #[test]
    fn missing_cids_default_to_f84_0() {
        let mut record = record();
        record.cids = None;
        assert_eq!(selected_cids(&record), BTreeSet::from([CidOption::F840]));

        record.cids = Some(vec!["12 Z99.9".into()]);
        assert!(selected_cids(&record).is_empty());
    }

    #[test]
    fn photo_is_uploaded_after_every_other_file() {
        let mut browser = RecordingBrowser::new();
        fill_ciptea(&mut browser, &record(), &files(), true).unwrap();

        let sent = browser.sent();
        let photo = sent
            .iter()
            .position(|(locator, _)| *locator == Locator::Id("idImagemFoto"))
            .unwrap();
        let other_uploads: Vec<usize> = UPLOADS[..UPLOADS.len() - 1]
            .iter()
            .map(|upload| {
                sent.iter()
                    .position(|(locator, _)| *locator == upload.locator)
                    .unwrap()
            })
            .collect();

        assert!(other_uploads.iter().all(|&index| index < photo));
        assert_eq!(photo, sent.len() - 1);
        assert_eq!(sent[photo].1, "/data/joao_silva/foto_3x4.jpg");
        assert_eq!(
            browser.sent_to(Locator::Id("idImagemLaudoMedico")),
            Some("/data/joao_silva/laudo_medico.pdf")
        );
    }

    #[test]
    fn upload_without_file_is_located_but_not_sent() {
        let mut files = OrganizedFiles::new("/data/joao_silva");
        files.insert_original(DocumentRole::Photo, "/data/joao_silva/foto_3x4.jpg");

        let mut browser = RecordingBrowser::new();
        fill_ciptea(&mut browser, &record(), &files, true).unwrap();

        assert!(browser
            .actions
            .contains(&Action::Find(Locator::Id("idRImagemRg"))));
        assert_eq!(browser.sent_to(Locator::Id("idRImagemRg")), None);
        assert_eq!(
            browser.sent_to(Locator::Id("idImagemFoto")),
            Some("/data/joao_silva/foto_3x4.jpg")
        );
    }

    #[test]
    fn missing_element_halts_with_stage() {
        let mut browser = RecordingBrowser::new().without(Locator::Id("cid11_6A02_Y"));
        let err = fill_ciptea(&mut browser, &record(), &files(), true).unwrap_err();

        match err {
            CoreError::FormHalted {
                form,
                stage,
                source,
            } => {
                assert_eq!(form, FormKind::CipteaFirstIssue);
                assert_eq!(stage, FillStage::FieldsFilled);
                assert!(matches!(*source, CoreError::ElementNotFound(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(browser.sent_to(Locator::Id("idImagemFoto")), None);
    }

    #[test]
    fn missing_upload_field_halts_after_cids() {
        let mut browser = RecordingBrowser::new().without(Locator::Id("idRImagemRg"));
        let err = fill_ciptea(&mut browser, &record(), &files(), true).unwrap_err();

        assert!(err.is_missing_element());
        assert!(matches!(
            err,
            CoreError::FormHalted {
                stage: FillStage::CidsSelected,
                ..
            }
        ));
        assert_eq!(browser.sent_to(Locator::Id("idImagemFoto")), None);
    }

    #[test]
    fn missing_anchor_times_out_after_tab_opened() {
        let mut browser = RecordingBrowser::new().without(Locator::Name("NomeBeneficiario"));
        let err = fill_ciptea(&mut browser, &record(), &files(), true).unwrap_err();

        assert!(err.is_missing_element());
        assert!(matches!(
            err,
            CoreError::FormHalted {
                stage: FillStage::TabOpened,
                ..
            }
        ));
    }
}
