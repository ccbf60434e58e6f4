//! Intermunicipal free-pass registration (a WPForms form).
//!
//! Field names are the form builder's positional identifiers; they carry no meaning of
//! their own and change whenever the site owner edits the form.

use super::{fill_fields, halted, path_text, FieldSpec, FillStage, FormKind, Transform, UploadSpec};
use crate::browser::{Browser, Locator, WaitCondition};
use crate::constants::{COOKIE_SETTLE_DELAY, LAYOUT_SETTLE_DELAY};
use crate::record::{PersonRecord, RecordField};
use crate::CoreResult;
use preenchedor_files::{DocumentRole, OrganizedFiles};

const BIRTH_DATE_FALLBACK: &str = "01/01/2010";

const FIELDS: [FieldSpec; 13] = [
    FieldSpec::record(Locator::Name("wpforms[fields][2]"), RecordField::MotherName).anchor(),
    FieldSpec::record(Locator::Name("wpforms[fields][1]"), RecordField::BeneficiaryName),
    FieldSpec::record(Locator::Name("wpforms[fields][22]"), RecordField::BeneficiaryCpf),
    FieldSpec::record(Locator::Name("wpforms[fields][4]"), RecordField::BeneficiaryRg),
    FieldSpec::record(Locator::Name("wpforms[fields][5][date][d]"), RecordField::BirthDate)
        .or(BIRTH_DATE_FALLBACK)
        .transformed(Transform::BirthDay),
    FieldSpec::record(Locator::Name("wpforms[fields][5][date][m]"), RecordField::BirthDate)
        .or(BIRTH_DATE_FALLBACK)
        .transformed(Transform::BirthMonth),
    FieldSpec::record(Locator::Name("wpforms[fields][5][date][y]"), RecordField::BirthDate)
        .or(BIRTH_DATE_FALLBACK)
        .transformed(Transform::BirthYear),
    FieldSpec::record(Locator::Name("wpforms[fields][32][address1]"), RecordField::Address)
        .transformed(Transform::AddressNumber),
    FieldSpec::literal(Locator::Name("wpforms[fields][32][city]"), "Recife"),
    FieldSpec::literal(Locator::Name("wpforms[fields][32][state]"), "Pernambuco"),
    FieldSpec::record(Locator::Name("wpforms[fields][32][postal]"), RecordField::PostalCode),
    FieldSpec::record(Locator::Name("wpforms[fields][30]"), RecordField::Phone),
    FieldSpec::record(Locator::Name("wpforms[fields][9]"), RecordField::Email),
];

const COOKIE_BUTTON: Locator = Locator::Css(".cli-plugin-button");

/// "Disability type: autism" radio button.
const DISABILITY_RADIO: Locator = Locator::Id("wpforms-8767-field_6_3");

/// "Has a transit card: yes" radio button.
const TRANSIT_CARD_RADIO: Locator = Locator::Id("wpforms-8767-field_28_1");

const LEADING_UPLOADS: [UploadSpec; 4] = [
    UploadSpec::pdf(Locator::Name("wpforms_8767_10"), DocumentRole::BeneficiaryRg),
    UploadSpec::pdf(Locator::Name("wpforms_8767_11"), DocumentRole::BeneficiaryCpf),
    UploadSpec::pdf(Locator::Name("wpforms_8767_12"), DocumentRole::ProofOfResidence),
    UploadSpec::original(Locator::Name("wpforms_8767_7"), DocumentRole::Photo),
];

const MEDICAL_REPORT_UPLOAD: UploadSpec =
    UploadSpec::pdf(Locator::Name("wpforms_8767_27"), DocumentRole::MedicalReport);

const TRANSIT_CARD_UPLOAD: UploadSpec =
    UploadSpec::original(Locator::Name("wpforms_8767_29"), DocumentRole::TransitCard);

const TRAILING_UPLOADS: [UploadSpec; 2] = [
    UploadSpec::pdf(Locator::Name("wpforms_8767_15"), DocumentRole::GuardianRg),
    UploadSpec::pdf(Locator::Name("wpforms_8767_16"), DocumentRole::GuardianCpf),
];

/// Fills the text fields of the intermunicipal form in a new tab.
///
/// The cookie banner is dismissed if it shows up; failing to do so is only logged.
/// Attachments are a separate step, see [`attach_intermunicipal_files`].
pub fn fill_intermunicipal<B: Browser + ?Sized>(
    browser: &mut B,
    record: &PersonRecord,
) -> CoreResult<()> {
    let form = FormKind::Intermunicipal;
    tracing::info!("filling {}", form);

    let mut stage = FillStage::NotStarted;
    run_fields(browser, record, &mut stage).map_err(|e| halted(form, stage, e))?;

    tracing::info!("{} {}", form, FillStage::FieldsFilled);
    Ok(())
}

fn run_fields<B: Browser + ?Sized>(
    browser: &mut B,
    record: &PersonRecord,
    stage: &mut FillStage,
) -> CoreResult<()> {
    browser.open_tab(FormKind::Intermunicipal.url())?;
    *stage = FillStage::TabOpened;

    fill_fields(browser, record, &FIELDS)?;
    dismiss_cookie_banner(browser);

    let radio = browser.find(DISABILITY_RADIO)?;
    browser.scroll_into_view(&radio)?;
    browser.pause(LAYOUT_SETTLE_DELAY);
    browser.click(&radio)
}

fn dismiss_cookie_banner<B: Browser + ?Sized>(browser: &mut B) {
    let dismissed = browser
        .wait_for(COOKIE_BUTTON, WaitCondition::Clickable)
        .and_then(|button| browser.click(&button));

    match dismissed {
        Ok(()) => browser.pause(COOKIE_SETTLE_DELAY),
        Err(e) => tracing::warn!("cookie banner not found or already dismissed: {}", e),
    }
}

/// Attaches the documents to the intermunicipal form already open in the current tab.
///
/// With `use_transit_card` the "has a transit card" option is ticked and the card is
/// uploaded in place of the medical report. Files missing on disk are skipped with a
/// warning and their fields stay empty.
pub fn attach_intermunicipal_files<B: Browser + ?Sized>(
    browser: &mut B,
    files: &OrganizedFiles,
    use_transit_card: bool,
) -> CoreResult<()> {
    let form = FormKind::Intermunicipal;
    run_attachments(browser, files, use_transit_card)
        .map_err(|e| halted(form, FillStage::FieldsFilled, e))?;

    tracing::info!("{} {}", form, FillStage::FilesAttached);
    Ok(())
}

fn run_attachments<B: Browser + ?Sized>(
    browser: &mut B,
    files: &OrganizedFiles,
    use_transit_card: bool,
) -> CoreResult<()> {
    for upload in &LEADING_UPLOADS {
        attach_file(browser, files, upload)?;
    }

    if use_transit_card {
        let radio = browser.wait_for(TRANSIT_CARD_RADIO, WaitCondition::Present)?;
        browser.click(&radio)?;
        browser.pause(LAYOUT_SETTLE_DELAY);
        attach_file(browser, files, &TRANSIT_CARD_UPLOAD)?;
    } else {
        attach_file(browser, files, &MEDICAL_REPORT_UPLOAD)?;
    }

    for upload in &TRAILING_UPLOADS {
        attach_file(browser, files, upload)?;
    }
    Ok(())
}

fn attach_file<B: Browser + ?Sized>(
    browser: &mut B,
    files: &OrganizedFiles,
    upload: &UploadSpec,
) -> CoreResult<()> {
    let Some(path) = upload.path(files) else {
        tracing::debug!("no {} to upload into {}", upload.role, upload.locator);
        return Ok(());
    };

    if !path.is_file() {
        tracing::warn!(
            "file not found: {}; skipping attachment for {}",
            path.display(),
            upload.locator
        );
        return Ok(());
    }

    let input = browser.wait_for(upload.locator, WaitCondition::Present)?;
    browser.send_keys(&input, &path_text(path))
}
