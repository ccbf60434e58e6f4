use anyhow::{Context, bail};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use preenchedor_core::browser::WebDriverSession;
use preenchedor_core::extraction::{GeminiClient, ViaCepClient};
use preenchedor_core::forms::FormSelection;
use preenchedor_core::{CoreConfig, fill_forms, process_documents};
use preenchedor_files::DocumentSet;
use preenchedor_types::NonEmptyText;

/// Name of the record file saved in the beneficiary folder.
const RECORD_FILENAME: &str = "record.json";

/// A job file describing one beneficiary's run.
///
/// ```yaml
/// beneficiary: João da Silva
/// documents:
///   cpf_do_menor: scans/cpf.jpg
///   cpf_do_responsavel: scans/cpf_mae.jpg
///   laudo_medico: scans/laudo.jpg
///   comprovante_residencia: scans/conta.jpg
///   foto_3x4: scans/foto.jpg
/// forms:
///   ciptea_reissue: true
/// ```
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Job {
    beneficiary: NonEmptyText,
    documents: DocumentSet,
    #[serde(default)]
    forms: JobForms,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct JobForms {
    ciptea_first_issue: bool,
    ciptea_reissue: bool,
    intermunicipal: bool,
    use_transit_card: bool,
}

impl Default for JobForms {
    fn default() -> Self {
        let selection = FormSelection::default();
        Self {
            ciptea_first_issue: selection.ciptea_first_issue,
            ciptea_reissue: selection.ciptea_reissue,
            intermunicipal: selection.intermunicipal,
            use_transit_card: selection.use_transit_card,
        }
    }
}

impl From<&JobForms> for FormSelection {
    fn from(forms: &JobForms) -> Self {
        Self {
            ciptea_first_issue: forms.ciptea_first_issue,
            ciptea_reissue: forms.ciptea_reissue,
            intermunicipal: forms.intermunicipal,
            use_transit_card: forms.use_transit_card,
        }
    }
}

fn load_job(path: &Path) -> anyhow::Result<Job> {
    let text =
        fs::read_to_string(path).with_context(|| format!("reading job {}", path.display()))?;
    let job: Job =
        serde_yaml::from_str(&text).with_context(|| format!("parsing job {}", path.display()))?;
    Ok(job)
}

/// Runs a job end to end: organise the documents, extract the record, fill the forms.
///
/// The record is saved as `record.json` in the beneficiary folder before any form is
/// touched. When extraction yields nothing the run stops there so the operator can
/// complete the record and use `preenchedor fill`.
///
/// # Environment Variables
/// - `PREENCHEDOR_DATA_DIR`: data directory (default: `~/.auto_preenchedor_data`)
/// - `GOOGLE_API_KEY`: key for the generative model
/// - `PREENCHEDOR_WEBDRIVER_URL`: WebDriver endpoint (default: `http://localhost:9515`)
fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("preenchedor=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let Some(job_path) = std::env::args_os().nth(1).map(PathBuf::from) else {
        bail!("usage: preenchedor-run <job.yaml>");
    };
    let job = load_job(&job_path)?;
    let selection = FormSelection::from(&job.forms);

    let config = CoreConfig::from_env()?;
    let files = preenchedor_files::FilesService::new(config.data_dir())?;
    let model = GeminiClient::from_config(&config)?;
    let postal = ViaCepClient::from_config(&config)?;

    let processed = process_documents(&files, &job.documents, &job.beneficiary, &model, &postal)?;
    if !processed.missing.is_empty() {
        let names: Vec<&str> = processed.missing.iter().map(|r| r.key()).collect();
        bail!("missing required documents: {}", names.join(", "));
    }

    let Some(record) = processed.record else {
        tracing::warn!("no record extracted for {}; forms were not filled", job.beneficiary);
        return Ok(());
    };

    let record_path = processed.organized.folder().join(RECORD_FILENAME);
    fs::write(&record_path, record.render_json()?)
        .with_context(|| format!("writing {}", record_path.display()))?;
    tracing::info!("record saved to {}", record_path.display());

    if selection.is_empty() {
        tracing::info!("no forms selected");
        return Ok(());
    }

    let mut browser = WebDriverSession::connect(&config)?;
    let report = fill_forms(&mut browser, &record, &processed.organized, &selection)?;
    for halted in &report.halted {
        tracing::warn!("{halted}");
    }
    tracing::info!("review the open browser tabs and submit the forms");

    Ok(())
}
