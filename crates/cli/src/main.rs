use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use preenchedor_core::browser::WebDriverSession;
use preenchedor_core::cid::normalize;
use preenchedor_core::config::write_api_key;
use preenchedor_core::extraction::{GeminiClient, ViaCepClient};
use preenchedor_core::forms::FormSelection;
use preenchedor_core::{fill_forms, process_documents, CoreConfig, PersonRecord};
use preenchedor_files::{DocumentRole, DocumentSet, FilesService};
use preenchedor_types::NonEmptyText;
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// File written next to the organised documents when `--output` is not given.
const RECORD_FILENAME: &str = "record.json";

#[derive(Parser)]
#[command(name = "preenchedor")]
#[command(about = "Extracts beneficiary data from documents and fills the enrollment forms")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Organise documents and extract the person record with the AI model
    Extract {
        /// Beneficiary's full name (names the document folder)
        #[arg(long)]
        name: String,
        /// Document as ROLE=PATH, e.g. cpf_do_menor=scans/cpf.jpg (repeatable)
        #[arg(long = "doc", value_parser = parse_document, required = true)]
        documents: Vec<(DocumentRole, PathBuf)>,
        /// Where to write the record JSON (default: <folder>/record.json)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Fill the selected forms from a record file and the organised documents
    Fill {
        /// Record JSON written by `extract` (and possibly edited)
        #[arg(long)]
        record: PathBuf,
        /// Beneficiary's full name, as given to `extract`
        #[arg(long)]
        name: String,
        /// Skip the CIPTEA first-issuance form
        #[arg(long)]
        skip_first_issue: bool,
        /// Also fill the CIPTEA reissue form
        #[arg(long)]
        reissue: bool,
        /// Skip the intermunicipal pass form
        #[arg(long)]
        skip_intermunicipal: bool,
        /// Attach the transit card instead of the medical report (intermunicipal form)
        #[arg(long)]
        transit_card: bool,
    },
    /// Show which CIPTEA checkboxes the given diagnosis codes map to
    Cids {
        /// Codes such as "10 F84.0" or "11 6A02.Y"
        codes: Vec<String>,
    },
    /// Store the Google Generative AI key in the data directory's .env
    ConfigureApiKey {
        /// API key
        key: String,
    },
}

fn parse_document(value: &str) -> Result<(DocumentRole, PathBuf), String> {
    let (role, path) = value
        .split_once('=')
        .ok_or_else(|| format!("expected ROLE=PATH, got {value:?}"))?;
    let role = role.parse::<DocumentRole>().map_err(|e| e.to_string())?;
    if path.trim().is_empty() {
        return Err(format!("missing path for {role}"));
    }
    Ok((role, PathBuf::from(path.trim())))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("preenchedor=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = CoreConfig::from_env()?;

    match cli.command {
        Commands::Extract {
            name,
            documents,
            output,
        } => {
            let beneficiary = NonEmptyText::new(&name).context("beneficiary name is empty")?;
            let documents: DocumentSet = documents.into_iter().collect();

            let files = FilesService::new(config.data_dir())?;
            let model = GeminiClient::from_config(&config)?;
            let postal = ViaCepClient::from_config(&config)?;

            let processed = process_documents(&files, &documents, &beneficiary, &model, &postal)?;
            if !processed.missing.is_empty() {
                let names: Vec<&str> = processed.missing.iter().map(|r| r.key()).collect();
                bail!("missing required documents: {}", names.join(", "));
            }

            let record = match processed.record {
                Some(record) => record,
                None => {
                    tracing::warn!(
                        "no record extracted for {}; writing a skeleton to complete by hand",
                        beneficiary
                    );
                    PersonRecord::skeleton(beneficiary.as_str())
                }
            };

            let output = output.unwrap_or_else(|| processed.organized.folder().join(RECORD_FILENAME));
            fs::write(&output, record.render_json()?)
                .with_context(|| format!("writing {}", output.display()))?;
            println!("Record written to {}", output.display());
        }
        Commands::Fill {
            record,
            name,
            skip_first_issue,
            reissue,
            skip_intermunicipal,
            transit_card,
        } => {
            let selection = FormSelection {
                ciptea_first_issue: !skip_first_issue,
                ciptea_reissue: reissue,
                intermunicipal: !skip_intermunicipal,
                use_transit_card: transit_card,
            };
            if selection.is_empty() {
                bail!("select at least one form to fill");
            }

            let text = fs::read_to_string(&record)
                .with_context(|| format!("reading {}", record.display()))?;
            let record = PersonRecord::parse_json(&text)?;

            let beneficiary = NonEmptyText::new(&name).context("beneficiary name is empty")?;
            let files = FilesService::new(config.data_dir())?.load(&beneficiary)?;

            let mut browser = WebDriverSession::connect(&config)?;
            let report = fill_forms(&mut browser, &record, &files, &selection)?;

            for form in &report.completed {
                tracing::info!("{} filled", form);
            }
            for halted in &report.halted {
                tracing::warn!("{}", halted);
            }
            println!("Review the open browser tabs and submit the forms.");
        }
        Commands::Cids { codes } => {
            let options = normalize(codes.as_slice());
            if options.is_empty() {
                println!("No matching CIPTEA options.");
            }
            for option in options {
                println!("{}\t{}", option.id(), option.code());
            }
        }
        Commands::ConfigureApiKey { key } => {
            let path = write_api_key(config.data_dir(), &key)?;
            println!("API key saved to {}", path.display());
        }
    }

    Ok(())
}
