//! Constants used throughout the preenchedor core crate.
//!
//! URLs and prompts here are contracts with third-party services; changing them
//! changes what the remote side sees.

use std::time::Duration;

/// Folder under the home directory used when no data directory is configured.
pub const DEFAULT_DATA_DIR_NAME: &str = ".auto_preenchedor_data";

/// Name of the environment file read from the data directory and the working directory.
pub const ENV_FILENAME: &str = ".env";

pub const API_KEY_ENV: &str = "GOOGLE_API_KEY";
pub const DATA_DIR_ENV: &str = "PREENCHEDOR_DATA_DIR";
pub const MODEL_ENV: &str = "PREENCHEDOR_MODEL";
pub const WEBDRIVER_URL_ENV: &str = "PREENCHEDOR_WEBDRIVER_URL";
pub const WAIT_SECS_ENV: &str = "PREENCHEDOR_WAIT_SECS";
pub const POSTAL_URL_ENV: &str = "PREENCHEDOR_POSTAL_URL";

pub const DEFAULT_MODEL: &str = "gemini-2.5-pro";
pub const DEFAULT_GENAI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:9515";
pub const DEFAULT_POSTAL_BASE_URL: &str = "https://viacep.com.br";
pub const DEFAULT_WAIT_SECS: u64 = 10;

/// Interval between element lookups during an explicit wait.
pub const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Collage geometry for the vision call.
pub const COLLAGE_COLUMNS: u32 = 3;
pub const COLLAGE_TILE_SIZE: u32 = 1500;

pub const CIPTEA_FIRST_ISSUE_URL: &str =
    "https://cipteape.com.br/gestao/FormularioSolicitacao/Cadastro";
pub const CIPTEA_REISSUE_URL: &str =
    "https://cipteape.com.br/gestao/FormularioSolicitacao/SegundaVia";
pub const INTERMUNICIPAL_URL: &str =
    "https://www.sjdh.pe.gov.br/cadastro-pe-livre-acesso-intermunicipal";

/// Settle delay after switching the CID revision dropdown.
pub const CID_SETTLE_DELAY: Duration = Duration::from_secs(1);
/// Settle delay after dismissing the cookie banner.
pub const COOKIE_SETTLE_DELAY: Duration = Duration::from_secs(1);
/// Settle delay after scrolling or toggling a radio button.
pub const LAYOUT_SETTLE_DELAY: Duration = Duration::from_millis(500);

pub const VISION_PROMPT: &str = "Extract all the text in this image and provide it as plain text.";

/// Few-shot schema shown to the structured-parsing call.
pub const RECORD_EXAMPLE: &str = r#"{
    "nome_do_responsavel": "maria",
    "nome_do_menor": "joao",
    "nome_da_mae_do_menor": "ana silva",
    "cpf_do_responsavel": "123.456.789-00",
    "rg_do_responsavel": "12.345.678-9",
    "cpf_do_menor": "987.654.321-00",
    "rg_do_menor": "98.765.432-1",
    "data_de_nascimento_do_menor": "DD/MM/YYYY",
    "endereço": "rua abc, 123",
    "cep": "12345-678",
    "cids": ["10 F84.0", "11 6A02"]
}"#;

/// Builds the structured-parsing prompt around the text returned by the vision call.
pub fn structured_prompt(extracted_text: &str) -> String {
    format!(
        "Extraia um objeto JSON com as chaves nome_do_responsavel, nome_do_menor, \
         nome_da_mae_do_menor, cpf_do_responsavel, rg_do_responsavel, cpf_do_menor, \
         rg_do_menor, data_de_nascimento_do_menor, endereço, cep, cids neste formato:\n\n\
         {RECORD_EXAMPLE}\n\n\
         Regras: se não houver RG, use o CPF da mesma pessoa; endereço contém só rua e \
         número separados por vírgula; cids podem ser 10 F84.0 até 10 F84.9 ou \
         11 6A02.0 até 11 6A02.5, 11 6A02.Y, 11 6A02.Z. Use null para valores ausentes.\n\n\
         Texto:\n\n{extracted_text}\n\n\
         Responda apenas com o objeto JSON."
    )
}
