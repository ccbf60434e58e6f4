use crate::browser::Locator;
use crate::forms::{FillStage, FormKind};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("GOOGLE_API_KEY is not configured; run `preenchedor configure-api-key <key>`")]
    MissingApiKey,
    #[error("configuration error: {0}")]
    Config(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to (de)serialize JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("record schema mismatch at {path}: {message}")]
    RecordSchema { path: String, message: String },
    #[error("file handling failed: {0}")]
    Files(#[from] preenchedor_files::FilesError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to write .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),

    #[error("generative model returned an error: {0}")]
    ModelResponse(String),
    #[error("generative model returned no text ({0})")]
    EmptyModelAnswer(String),
    #[error("malformed AI output: {0}")]
    MalformedAiOutput(String),

    #[error("invalid date {0:?}, expected DD/MM/YYYY")]
    InvalidDate(String),

    #[error("element not found: {0}")]
    ElementNotFound(Locator),
    #[error("timed out after {seconds}s waiting for {locator}")]
    WaitTimeout { locator: Locator, seconds: u64 },
    #[error("WebDriver error ({error}): {message}")]
    WebDriver { error: String, message: String },

    #[error("{form} halted at {stage}: {source}")]
    FormHalted {
        form: FormKind,
        stage: FillStage,
        #[source]
        source: Box<CoreError>,
    },
}

impl CoreError {
    /// True when the error means a DOM element could not be located.
    pub fn is_missing_element(&self) -> bool {
        match self {
            CoreError::ElementNotFound(_) | CoreError::WaitTimeout { .. } => true,
            CoreError::FormHalted { source, .. } => source.is_missing_element(),
            _ => false,
        }
    }
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
