//! Postal-code (CEP) to street lookup.

use crate::config::CoreConfig;
use crate::CoreResult;
use serde::Deserialize;
use std::time::Duration;

/// Resolves a Brazilian postal code to its street name.
pub trait PostalLookup {
    /// Street for `postal_code`, or `None` when the code is unknown or the lookup fails.
    fn street_for(&self, postal_code: &str) -> Option<String>;
}

/// ViaCEP client (`<base>/ws/<8 digits>/json/`).
pub struct ViaCepClient {
    http: reqwest::blocking::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct ViaCepAddress {
    #[serde(default)]
    logradouro: Option<String>,
    #[serde(default)]
    erro: Option<serde_json::Value>,
}

impl ViaCepClient {
    pub fn from_config(config: &CoreConfig) -> CoreResult<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            http,
            base_url: config.postal_base_url().trim_end_matches('/').to_owned(),
        })
    }

    fn lookup(&self, digits: &str) -> CoreResult<Option<String>> {
        let url = format!("{}/ws/{}/json/", self.base_url, digits);
        let address: ViaCepAddress = self.http.get(url).send()?.error_for_status()?.json()?;

        if address.erro.is_some() {
            return Ok(None);
        }
        Ok(address.logradouro.filter(|street| !street.trim().is_empty()))
    }
}

impl PostalLookup for ViaCepClient {
    fn street_for(&self, postal_code: &str) -> Option<String> {
        let Some(digits) = postal_code_digits(postal_code) else {
            tracing::warn!("postal code {:?} does not have 8 digits", postal_code);
            return None;
        };

        match self.lookup(&digits) {
            Ok(Some(street)) => Some(street),
            Ok(None) => {
                tracing::warn!("postal code {} not found", digits);
                None
            }
            Err(e) => {
                tracing::warn!("postal lookup for {} failed: {}", digits, e);
                None
            }
        }
    }
}

/// The 8 digits of a CEP written as `50000-000`, `50.000-000` or `50000000`.
pub fn postal_code_digits(postal_code: &str) -> Option<String> {
    let digits: String = postal_code
        .chars()
        .filter(|c| !matches!(c, '-' | '.' | ' '))
        .collect();

    (digits.len() == 8 && digits.chars().all(|c| c.is_ascii_digit())).then_some(digits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn postal_code_digits_accepts_common_formats() {
        assert_eq!(postal_code_digits("50000-000").as_deref(), Some("50000000"));
        assert_eq!(postal_code_digits("50.000-000").as_deref(), Some("50000000"));
        assert_eq!(postal_code_digits(" 50000000 ").as_deref(), Some("50000000"));
    }

    #[test]
    fn postal_code_digits_rejects_bad_codes() {
        assert_eq!(postal_code_digits("5000-000"), None);
        assert_eq!(postal_code_digits("5000A-000"), None);
        assert_eq!(postal_code_digits(""), None);
    }

    #[test]
    fn viacep_error_flag_parses() {
        let address: ViaCepAddress = serde_json::from_str(r#"{"erro": "true"}"#).unwrap();
        assert!(address.erro.is_some());
        assert!(address.logradouro.is_none());

        let address: ViaCepAddress = serde_json::from_str(
            r#"{"cep": "50000-000", "logradouro": "Rua das Flores", "bairro": "Boa Vista"}"#,
        )
        .unwrap();
        assert_eq!(address.logradouro.as_deref(), Some("Rua das Flores"));
    }
}
